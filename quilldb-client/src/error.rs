//! Client error types.

use quilldb_protocol::{ErrorInfo, ProtocolError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("connection pool closed")]
    PoolClosed,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("unexpected response shape: expected {0}")]
    UnexpectedResponse(&'static str),

    #[error("server error: {message}")]
    Server {
        code: i32,
        error_type: String,
        message: String,
        line: Option<u32>,
        column: Option<u32>,
    },
}

impl ClientError {
    /// Builds a typed server error from decoded error details.
    ///
    /// When the server sent no message, one is synthesized from the code
    /// and type.
    pub fn server(info: ErrorInfo) -> Self {
        let error_type = if info.error_type.is_empty() {
            "Unknown".to_string()
        } else {
            info.error_type
        };
        let message = info
            .message
            .unwrap_or_else(|| format!("Error {}: {}", info.code, error_type));
        ClientError::Server {
            code: info.code,
            error_type,
            message,
            line: info.line,
            column: info.column,
        }
    }
}
