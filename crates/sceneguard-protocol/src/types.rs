//! Request and response types for the studio control socket.
//!
//! Requests are serialized as internally tagged JSON objects, so
//! `Request::SetTransitionDuration { duration: 0 }` becomes
//! `{ "request-type": "SetTransitionDuration", "duration": 0 }`. That is
//! the shape the studio's websocket plugin accepts; the client
//! implementation only adds its own message id before sending.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A command sent to the studio.
///
/// Only the requests the scene switcher actually needs are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request-type")]
pub enum Request {
    /// Ask for studio and plugin versions. Informational only.
    GetVersion,

    /// Ask for the duration of the active transition, in milliseconds.
    GetTransitionDuration,

    /// Set the duration of the active transition, in milliseconds.
    /// `0` makes the next scene change instantaneous.
    SetTransitionDuration { duration: u64 },

    /// Ask which scene is currently on program.
    GetCurrentScene,

    /// Put `scene_name` on program using the active transition.
    SetCurrentScene {
        #[serde(rename = "scene-name")]
        scene_name: String,
    },
}

impl Request {
    /// The wire name of the request, as used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetVersion => "GetVersion",
            Self::GetTransitionDuration => "GetTransitionDuration",
            Self::SetTransitionDuration { .. } => "SetTransitionDuration",
            Self::GetCurrentScene => "GetCurrentScene",
            Self::SetCurrentScene { .. } => "SetCurrentScene",
        }
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Reply to [`Request::GetVersion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "obs-studio-version")]
    pub studio_version: String,
    #[serde(rename = "obs-websocket-version")]
    pub websocket_version: String,
}

/// Reply to [`Request::GetTransitionDuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDuration {
    #[serde(rename = "transition-duration")]
    pub duration_ms: u64,
}

/// Reply to [`Request::GetCurrentScene`].
///
/// The studio also lists the scene's sources; we only care about the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentScene {
    pub name: String,
}

/// Decodes the JSON reply to `request` into a typed response.
///
/// A reply carrying `"status": "error"` is turned into
/// [`ProtocolError::Rejected`] with the studio's message, before any
/// attempt to decode the payload.
pub fn decode_response<T: DeserializeOwned>(
    request: &Request,
    value: serde_json::Value,
) -> Result<T, ProtocolError> {
    if value.get("status").and_then(|s| s.as_str()) == Some("error") {
        let message = value
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(ProtocolError::Rejected {
            request: request.name(),
            message,
        });
    }
    serde_json::from_value(value).map_err(|source| ProtocolError::Decode {
        request: request.name(),
        source,
    })
}
