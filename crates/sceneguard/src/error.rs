//! Unified error type for the application crate.

use std::path::PathBuf;

use sceneguard_session::SessionError;

/// Top-level error for everything [`SceneGuard`](crate::SceneGuard) and
/// [`Settings`](crate::Settings) can fail with.
#[derive(Debug, thiserror::Error)]
pub enum SceneGuardError {
    /// The session task is gone.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The settings file is not valid TOML, or has a field of the wrong type.
    #[error("invalid settings: {0}")]
    Config(#[from] toml::de::Error),

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A blank password was entered. Prompt again.
    #[error("password must not be empty")]
    EmptyPassword,
}
