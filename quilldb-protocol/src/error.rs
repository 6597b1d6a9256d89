//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("envelope of type {0} carries no decodable payload")]
    EmptyPayload(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
