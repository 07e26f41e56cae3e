//! Error types for the session layer.

use sceneguard_client::ClientError;
use sceneguard_protocol::ProtocolError;

/// Errors that can occur in the session layer.
///
/// Only [`SessionError::Unavailable`] ever reaches callers of
/// [`SessionHandle`](crate::SessionHandle). Remote failures are absorbed
/// and logged inside the session; the other variants exist so the
/// internal request helpers can use `?`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session task has stopped (after `shutdown`, or it panicked).
    #[error("session is no longer running")]
    Unavailable,

    /// The remote client failed to deliver a request.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The studio replied with something we couldn't interpret.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
