//! Error types for the protocol layer.

/// Errors that can occur while interpreting a studio reply.
///
/// Each crate in sceneguard defines its own error enum, so a
/// `ProtocolError` always means "the reply had the wrong shape", never
/// "the socket broke".
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The reply to `request` could not be decoded into the expected type.
    ///
    /// Usually a missing field or a studio plugin speaking a different
    /// protocol revision.
    #[error("malformed reply to {request}: {source}")]
    Decode {
        request: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The studio answered with an explicit error status.
    #[error("{request} rejected by studio: {message}")]
    Rejected {
        request: &'static str,
        message: String,
    },
}
