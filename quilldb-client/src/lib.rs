//! # quilldb-client
//!
//! Client library for QuillDB.
//!
//! This crate provides:
//! - A context-restricted query builder over immutable AST terms
//! - An async multiplexed TCP connection with per-request correlation
//! - Cursor-based pagination with query continuation
//! - A pooled one-shot transport alternative

pub mod builder;
pub mod client;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod pool;
pub mod result;
pub mod term;

pub use builder::{field, r};
pub use client::{Client, ClientConfig};
pub use connection::{Connection, ConnectionConfig, CursorResult, QueryOutcome, WriteOutcome};
pub use cursor::Cursor;
pub use error::ClientError;
pub use pool::{PoolConfig, PooledClient};
pub use result::QueryResult;
pub use term::{compile, Term};
