//! # SceneGuard
//!
//! Keep sensitive files off stream. SceneGuard watches which file is
//! active in an editor and, when it matches one of the configured
//! patterns, cuts the streaming studio to a "secret" scene. Leaving the
//! file switches back to whatever was on program before.
//!
//! The heavy lifting lives in the sub-crates; this crate wires them to
//! user settings, a glob matcher and a credential store:
//!
//! ```text
//! SceneGuard (settings, commands, status)
//!     ↕
//! sceneguard-session (connection state machine, scene switching)
//!     ↕
//! sceneguard-client (RemoteClient seam) ← SimulatedStudio, or a real socket client
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sceneguard::prelude::*;
//!
//! # async fn run() -> Result<(), SceneGuardError> {
//! let settings = Settings::from_toml_str(r#"
//!     service_url = "localhost:4444"
//!     scene = "Hidden"
//!     file_names = ["*.secret.env", ".env"]
//! "#)?;
//!
//! let studio = Arc::new(SimulatedStudio::new("Live", 300).with_scene("Hidden"));
//! let mut guard = SceneGuardBuilder::new()
//!     .settings(settings)
//!     .build(studio, MemoryCredentialStore::new(), GlobMatcher);
//!
//! guard.activate().await?;
//! guard.active_editor_changed("deploy/.env").await?;
//! # Ok(())
//! # }
//! ```

mod app;
mod credentials;
mod error;
mod matcher;
mod settings;
mod sim;

pub use app::{SceneGuard, SceneGuardBuilder, Status};
pub use credentials::MemoryCredentialStore;
pub use error::SceneGuardError;
pub use matcher::GlobMatcher;
pub use settings::Settings;
pub use sim::SimulatedStudio;

pub use sceneguard_client::{ClientError, Notification, RemoteClient};
pub use sceneguard_protocol::{ProtocolError, Request};
pub use sceneguard_session::{
    spawn_session, ConnectionState, CredentialStore, FileMatcher, Observers,
    RetryPolicy, Secret, SessionConfig, SessionError, SessionHandle,
    SessionStatus,
};

/// Everything needed to embed SceneGuard, in one import.
pub mod prelude {
    pub use crate::{
        CredentialStore, FileMatcher, GlobMatcher, MemoryCredentialStore,
        Observers, RemoteClient, SceneGuard, SceneGuardBuilder,
        SceneGuardError, Settings, SimulatedStudio, Status,
    };
}
