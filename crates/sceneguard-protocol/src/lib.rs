//! Control-socket vocabulary for sceneguard.
//!
//! This crate defines what sceneguard says to the studio and what it
//! expects back:
//!
//! - **Requests** ([`Request`]): the handful of commands the session
//!   layer issues (version, transition duration, current scene).
//! - **Responses** ([`VersionInfo`], [`TransitionDuration`],
//!   [`CurrentScene`]): typed views of the JSON the studio replies with.
//! - **Errors** ([`ProtocolError`]): what can go wrong when a reply
//!   doesn't look like we expect.
//!
//! It knows nothing about sockets, framing or authentication. Those belong
//! to whoever implements the client seam in `sceneguard-client`.
//!
//! ```text
//! Client (connect/send) → Protocol (Request, responses) → Session (state machine)
//! ```

mod error;
mod types;

pub use error::ProtocolError;
pub use types::{
    decode_response, CurrentScene, Request, TransitionDuration, VersionInfo,
};
