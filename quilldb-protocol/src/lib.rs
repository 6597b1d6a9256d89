//! # quilldb-protocol
//!
//! Wire protocol implementation for QuillDB.
//!
//! This crate provides:
//! - Length-prefixed binary framing
//! - Envelope, Query, Response and Datum message types
//! - A streaming decoder for partial reads
//! - Protocol error types and constants

pub mod codec;
pub mod datum;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod query;
pub mod response;

pub use codec::{Decoder, Encoder};
pub use datum::Datum;
pub use envelope::{Envelope, MessageType};
pub use error::ProtocolError;
pub use frame::{Frame, LENGTH_PREFIX_SIZE};
pub use query::{ComparisonOp, CursorSpec, Expression, Query, QueryOp, QueryOptions};
pub use response::{
    Ack, CountResult, CursorPage, DocumentResult, ErrorInfo, NameList, QueryResultPayload,
    Response, ResponseMetadata, ResponsePayload, ValueResult, WriteReceipt, WriteStats,
};

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default port for a QuillDB server.
pub const DEFAULT_PORT: u16 = 6090;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Database used when the caller does not name one.
pub const DEFAULT_DATABASE: &str = "default";

/// Batch size assumed when neither client nor server names one.
pub const DEFAULT_BATCH_SIZE: u32 = 100;
