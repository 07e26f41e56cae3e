//! In-memory [`CredentialStore`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use sceneguard_session::{CredentialStore, Secret};

/// A credential store that lives as long as the process.
///
/// Useful for tests and for hosts without a keychain. Can also pose as an
/// unavailable store, so the "no keychain" path can be exercised.
#[derive(Debug)]
pub struct MemoryCredentialStore {
    available: bool,
    secrets: Mutex<HashMap<String, Secret>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            available: true,
            secrets: Mutex::new(HashMap::new()),
        }
    }

    /// A store whose `exists()` is `false`.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    fn secrets(&self) -> MutexGuard<'_, HashMap<String, Secret>> {
        self.secrets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn exists(&self) -> bool {
        self.available
    }

    fn get(&self, key: &str) -> Option<Secret> {
        self.secrets().get(key).cloned()
    }

    fn set(&self, key: &str, secret: Secret) {
        self.secrets().insert(key.to_string(), secret);
    }

    fn delete(&self, key: &str) -> bool {
        self.secrets().remove(key).is_some()
    }
}
