//! Session types: configuration, connection state and the status snapshot.

use std::fmt;
use std::time::Duration;

use crate::{SceneOriginals, Secret};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How hard the session tries to (re)connect before giving up.
///
/// Fixed ceiling, fixed delay, no backoff. The studio almost always runs
/// on the same machine, and a failed attempt nearly always means "not
/// started yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed in one episode before the session halts.
    pub max_attempts: u32,

    /// Wait between a failed attempt and the next one.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Everything a session needs, resolved once at construction.
///
/// Never mutated in place: a settings change tears the session down and
/// spawns a new one with a fresh config.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `host:port` of the studio's control socket.
    pub service_address: String,

    /// Password to present, if the studio requires one.
    pub credential: Option<Secret>,

    /// Scene to cut to while a sensitive file is active.
    pub secret_scene: String,

    /// Whether leaving a sensitive file restores the original scene.
    pub auto_switch_back: bool,

    /// File patterns handed to the [`FileMatcher`](crate::FileMatcher), in order.
    pub patterns: Vec<String>,

    pub retry: RetryPolicy,

    /// Set when the secret scene is already on program, e.g. because a
    /// previous session switched to it. The new session starts switched
    /// and reverts to these values.
    pub resume: Option<SceneOriginals>,

    /// The scene on program when the session starts switched. If it is
    /// not `secret_scene`, the next matching file moves program over.
    pub resumed_scene: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_address: "localhost:4444".to_string(),
            credential: None,
            secret_scene: "Scene".to_string(),
            auto_switch_back: true,
            patterns: Vec::new(),
            retry: RetryPolicy::default(),
            resume: None,
            resumed_scene: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle of the single connection a session owns.
///
/// ```text
///   Disconnected ──connect()──→ Connecting ──ConnectionOpened──→ Connected
///        ↑                          │  ↺ retry every `delay`          │
///        │                          │                                 │
///        └──── retries exhausted / auth failure      ConnectionClosed ┘
/// ```
///
/// "Retries exhausted" is not a state of its own: it is `Disconnected`
/// with the retry counter at its ceiling (or `auth_failed` set), and it
/// takes an explicit `connect(true)` to leave it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// A snapshot of the session as last published by its task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub connection: ConnectionState,

    /// Attempts made in the current episode. Zero while connected.
    pub retry_count: u32,

    /// Set when the studio rejected the credential; cleared only by
    /// `connect(true)`.
    pub auth_failed: bool,

    /// `true` while the secret scene is (believed to be) on program.
    pub scene_switched: bool,

    /// Secret scene last switched to, while `scene_switched`.
    pub switched_scene: Option<String>,

    /// Scene captured on the last switch into the secret scene.
    pub original_scene: Option<String>,

    /// Transition duration captured alongside `original_scene`.
    pub original_transition_ms: Option<u64>,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.connection == ConnectionState::Connecting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default_is_five_attempts_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.service_address, "localhost:4444");
        assert!(config.credential.is_none());
        assert!(config.auto_switch_back);
        assert!(config.patterns.is_empty());
        assert!(config.resume.is_none());
    }

    #[test]
    fn test_session_status_default_is_disconnected() {
        let status = SessionStatus::default();
        assert!(!status.is_connected());
        assert!(!status.is_connecting());
        assert!(!status.scene_switched);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
    }
}
