use std::fmt;

/// Failures of the bundled JSON-RPC reader and of command-line input.
///
/// `Clone` so one failed fetch can be handed to every subscriber of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallCacheError {
    /// The HTTP request could not be sent or completed
    Request(String),
    /// HTTP status error from the node
    Http(u16),
    /// The node answered with a JSON-RPC error object
    Rpc { code: i64, message: String },
    /// Failed to serialize/deserialize JSON
    Json(String),
    /// The response was well-formed JSON but not what the call expects
    InvalidResponse(String),
    /// Arguments could not be ABI-encoded for the method signature
    Encoding(String),
    /// A `--watch` call description could not be parsed
    WatchSpec(String),
}

impl fmt::Display for CallCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "request failed: {e}"),
            Self::Http(status) => write!(f, "node HTTP {status}"),
            Self::Rpc { code, message } => write!(f, "JSON-RPC error {code}: {message}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::InvalidResponse(e) => write!(f, "invalid response: {e}"),
            Self::Encoding(e) => write!(f, "encoding error: {e}"),
            Self::WatchSpec(e) => write!(f, "invalid watch: {e}"),
        }
    }
}

impl std::error::Error for CallCacheError {}

impl From<serde_json::Error> for CallCacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<reqwest::Error> for CallCacheError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}
