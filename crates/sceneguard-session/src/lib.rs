//! Connection and scene-switch management for SceneGuard.
//!
//! A session owns one connection to a streaming studio and does two jobs:
//!
//! 1. **Connection lifecycle**: connect, retry a fixed number of times,
//!    reconnect after an unexpected drop, and stop for good on a rejected
//!    password ([`spawn_session`], [`SessionHandle`]).
//! 2. **Scene switching**: cut to a secret scene while a sensitive file
//!    is active and restore what was on program afterwards
//!    ([`SessionHandle::auto_switch_scene`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Editor integration (above)  ← settings, commands, status indicator
//!     ↕
//! Session Layer (this crate)  ← connection state, retries, scene switching
//!     ↕
//! Client Layer (below)        ← RemoteClient trait, notifications
//! ```
//!
//! Matching file paths and storing passwords are left to the caller
//! through the [`FileMatcher`] and [`CredentialStore`] traits.

mod credential;
mod error;
mod manager;
mod matcher;
mod observer;
mod scene;
mod session;

pub use credential::{CredentialStore, Secret};
pub use error::SessionError;
pub use manager::{spawn_session, SessionHandle};
pub use matcher::FileMatcher;
pub use observer::{Hook, Observers};
pub use scene::SceneOriginals;
pub use session::{ConnectionState, RetryPolicy, SessionConfig, SessionStatus};
