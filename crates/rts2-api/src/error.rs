use thiserror::Error;

/// Top-level error type for the `rts2-api` crate.
///
/// Covers every failure mode of the client: endpoint resolution,
/// HTTP transport, server-side rejection, JSON decoding, and cache
/// lookups. Consumers map these into their own diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid URL or port syntax. Fatal at client construction.
    #[error("Malformed endpoint: {message}")]
    MalformedEndpoint { message: String },

    /// HTTP transport error (connection refused, reset, stale socket).
    ///
    /// Shared-connection requests retry exactly once on a stale socket
    /// before surfacing this; explicit-connection requests surface it
    /// immediately.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-200 status with a server-supplied error message. Never retried.
    #[error("Server rejected request: {message}")]
    ServerRejected { message: String },

    /// JSON decoding failed, with the raw body for debugging. Never retried.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },

    /// Cache miss for a device value, with no (or exhausted) refresh option.
    #[error("Value {value} not known on device {device}")]
    NotFound { device: String, value: String },
}

impl Error {
    /// Returns `true` if this is a cache miss recoverable by a refresh.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The server's error message for a rejected request, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::ServerRejected { message } => Some(message),
            _ => None,
        }
    }
}

/// Send-phase failures indicating the connection went away under us:
/// the remote end closed or reset a pooled socket without the local
/// side noticing until the next request. Recoverable by reconnecting.
///
/// Timeouts and body/decode failures are excluded -- a fresh connection
/// would not help those.
pub(crate) fn is_stale_connection(err: &reqwest::Error) -> bool {
    err.is_connect()
        || (err.is_request() && !err.is_timeout() && !err.is_body() && !err.is_decode())
}
