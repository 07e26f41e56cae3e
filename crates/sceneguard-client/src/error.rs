/// Errors reported by a [`RemoteClient`](crate::RemoteClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The socket could not be opened (studio not running, wrong port, ...).
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The studio rejected the password.
    ///
    /// The same attempt also produces a
    /// [`Notification::AuthenticationFailure`](crate::Notification).
    #[error("authentication rejected by studio")]
    AuthenticationFailed,

    /// A request was issued while no connection is open.
    #[error("not connected")]
    NotConnected,

    /// The request reached the studio but failed there or in transit.
    #[error("{request} failed: {reason}")]
    RequestFailed {
        request: &'static str,
        reason: String,
    },
}

impl ClientError {
    /// Returns `true` for credential rejections, which must never be retried.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }
}
