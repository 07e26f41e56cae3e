//! Remote control client abstraction for sceneguard.
//!
//! The studio's control socket is an external collaborator: sceneguard
//! never speaks its wire protocol directly. Instead it drives anything
//! that implements [`RemoteClient`]: a small request/response surface
//! plus a stream of [`Notification`]s.
//!
//! # Contract for implementors
//!
//! - `connect` resolves once the attempt is over. Every failed attempt
//!   also emits [`Notification::ConnectionClosed`]; a rejected password
//!   emits [`Notification::AuthenticationFailure`] first.
//! - A successful `connect` emits [`Notification::ConnectionOpened`].
//! - `disconnect` emits [`Notification::ConnectionClosed`] before it
//!   returns if a connection was open.
//! - Notifications go to every current [`subscribe`](RemoteClient::subscribe)r
//!   in the order the studio produced them.

mod error;

pub use error::ClientError;

use std::fmt;
use std::future::Future;

use sceneguard_protocol::Request;
use tokio::sync::broadcast;

/// Asynchronous connection events emitted by a [`RemoteClient`].
///
/// The same `ConnectionClosed` is emitted whether a connection dropped or
/// never opened at all; the session tells the two apart from its own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    ConnectionOpened,
    ConnectionClosed,
    AuthenticationFailure,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionOpened => write!(f, "ConnectionOpened"),
            Self::ConnectionClosed => write!(f, "ConnectionClosed"),
            Self::AuthenticationFailure => write!(f, "AuthenticationFailure"),
        }
    }
}

/// A client for the studio's control socket.
///
/// Shared between the session actor and the tasks it spawns, hence
/// `Send + Sync + 'static` and `&self` everywhere. The returned futures
/// must be `Send` because they run on spawned Tokio tasks.
pub trait RemoteClient: Send + Sync + 'static {
    /// Opens a connection to `address`, authenticating with `password`
    /// when the studio asks for one.
    fn connect(
        &self,
        address: &str,
        password: Option<&str>,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Closes the connection, if any.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    /// Sends a request and returns the studio's raw JSON reply.
    ///
    /// Decode it with [`sceneguard_protocol::decode_response`].
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<serde_json::Value, ClientError>> + Send;

    /// Subscribes to connection notifications emitted from now on.
    fn subscribe(&self) -> broadcast::Receiver<Notification>;
}
