//! User settings and the session config derived from them.

use std::path::Path;

use sceneguard_session::{RetryPolicy, Secret, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::SceneGuardError;

const DEFAULT_SERVICE_URL: &str = "localhost:4444";
const DEFAULT_SCENE: &str = "Scene";

/// Everything a user can configure.
///
/// Every field has a default, so a settings file only needs the keys it
/// changes:
///
/// ```toml
/// service_url = "localhost:4455"
/// use_password = true
/// scene = "BRB"
/// auto_switch_back = true
/// file_names = [".env", "*.pem", "secrets/*"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `host:port` of the studio's control socket.
    pub service_url: String,

    /// Look the password up in the credential store, keyed by `service_url`.
    pub use_password: bool,

    /// Scene to cut to while a sensitive file is active.
    pub scene: String,

    /// Restore the original scene when the active file stops matching.
    pub auto_switch_back: bool,

    /// File name patterns that mark a file as sensitive. Checked in order.
    pub file_names: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            use_password: false,
            scene: DEFAULT_SCENE.to_string(),
            auto_switch_back: true,
            file_names: Vec::new(),
        }
    }
}

impl Settings {
    /// Parses settings from TOML text. The result is [`validated`](Self::validated).
    pub fn from_toml_str(text: &str) -> Result<Self, SceneGuardError> {
        let settings: Settings = toml::from_str(text)?;
        Ok(settings.validated())
    }

    /// Reads and parses a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneGuardError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            SceneGuardError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Self::from_toml_str(&text)
    }

    /// Normalises user input: blank address or scene fall back to the
    /// defaults, patterns are trimmed, and blank or repeated patterns are
    /// dropped (first occurrence wins).
    pub fn validated(mut self) -> Self {
        self.service_url = self.service_url.trim().to_string();
        if self.service_url.is_empty() {
            self.service_url = DEFAULT_SERVICE_URL.to_string();
        }
        if self.scene.trim().is_empty() {
            self.scene = DEFAULT_SCENE.to_string();
        }

        let mut patterns: Vec<String> = Vec::with_capacity(self.file_names.len());
        for pattern in self.file_names {
            let pattern = pattern.trim();
            if !pattern.is_empty() && !patterns.iter().any(|p| p == pattern) {
                patterns.push(pattern.to_string());
            }
        }
        self.file_names = patterns;
        self
    }

    /// Builds the config for a new session.
    pub fn session_config(
        &self,
        credential: Option<Secret>,
        retry: RetryPolicy,
    ) -> SessionConfig {
        SessionConfig {
            service_address: self.service_url.clone(),
            credential,
            secret_scene: self.scene.clone(),
            auto_switch_back: self.auto_switch_back,
            patterns: self.file_names.clone(),
            retry,
            resume: None,
            resumed_scene: None,
        }
    }
}
