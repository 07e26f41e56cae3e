//! Credential storage hook and the [`Secret`] wrapper.
//!
//! The password for the studio's control socket lives in whatever secret
//! store the host offers (OS keychain, encrypted file, memory). The
//! session layer only needs get/set/delete by key, so that is all the
//! [`CredentialStore`] trait asks for.

use std::fmt;

/// A password that never shows up in logs.
///
/// `Debug` prints a placeholder; use [`Secret::expose`] at the single
/// point where the real value is handed to the remote client.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Key/value secret storage, keyed by service address.
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns `true` if the backing store is usable at all.
    fn exists(&self) -> bool;

    /// Looks up the secret stored under `key`.
    fn get(&self, key: &str) -> Option<Secret>;

    /// Stores `secret` under `key`, replacing any previous value.
    fn set(&self, key: &str, secret: Secret);

    /// Removes the secret under `key`. Returns `true` if one was removed.
    fn delete(&self, key: &str) -> bool;
}
