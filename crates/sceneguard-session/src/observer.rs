//! Status hooks invoked by the session task.

use std::fmt;
use std::sync::Arc;

/// A no-argument callback, typically "refresh the status display".
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// The three hooks a session fires.
///
/// Hooks run on the session task, after the new status has been
/// published, so querying the [`SessionHandle`](crate::SessionHandle)
/// from inside a hook already sees the new state. Keep them short.
#[derive(Clone, Default)]
pub struct Observers {
    on_connected: Option<Hook>,
    on_disconnected: Option<Hook>,
    on_exhausted_retries: Option<Hook>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired when the connection opens.
    pub fn on_connected(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(hook));
        self
    }

    /// Fired when an open connection closes, or a pending attempt is cancelled.
    pub fn on_disconnected(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(hook));
        self
    }

    /// Fired once per episode when the session stops retrying, either
    /// because the attempt ceiling was reached or the credential was rejected.
    pub fn on_exhausted_retries(
        mut self,
        hook: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_exhausted_retries = Some(Arc::new(hook));
        self
    }

    pub(crate) fn connected(&self) {
        if let Some(hook) = &self.on_connected {
            hook();
        }
    }

    pub(crate) fn disconnected(&self) {
        if let Some(hook) = &self.on_disconnected {
            hook();
        }
    }

    pub(crate) fn exhausted_retries(&self) {
        if let Some(hook) = &self.on_exhausted_retries {
            hook();
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .field("on_exhausted_retries", &self.on_exhausted_retries.is_some())
            .finish()
    }
}
