//! The wire-level envelope wrapping every message.

use crate::error::ProtocolError;
use crate::query::Query;
use crate::response::{ErrorInfo, Response};
use crate::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message direction/outcome carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Query,
    Response,
    Error,
}

/// Envelope carrying a version, correlation id, message type, and payload.
///
/// The payload is the JSON body of a [`Query`] for requests, and of a
/// [`Response`] or [`ErrorInfo`] for replies, per `message_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub version: u16,
    pub query_id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Wraps a query for sending.
    pub fn query(query_id: impl Into<String>, query: &Query) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: PROTOCOL_VERSION,
            query_id: query_id.into(),
            message_type: MessageType::Query,
            payload: serde_json::to_value(query)?,
        })
    }

    /// Wraps an arbitrary request payload (ping, auth) for sending.
    pub fn raw_query(query_id: impl Into<String>, payload: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            query_id: query_id.into(),
            message_type: MessageType::Query,
            payload,
        }
    }

    /// Wraps a successful response.
    pub fn response(query_id: impl Into<String>, response: &Response) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: PROTOCOL_VERSION,
            query_id: query_id.into(),
            message_type: MessageType::Response,
            payload: serde_json::to_value(response)?,
        })
    }

    /// Wraps a server error.
    pub fn error(query_id: impl Into<String>, info: &ErrorInfo) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: PROTOCOL_VERSION,
            query_id: query_id.into(),
            message_type: MessageType::Error,
            payload: serde_json::to_value(info)?,
        })
    }

    /// Decodes the payload as a response body.
    pub fn decode_response(&self) -> Result<Response, ProtocolError> {
        if self.payload.is_null() {
            return Err(ProtocolError::EmptyPayload("RESPONSE"));
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Decodes the payload as server error details.
    pub fn decode_error(&self) -> Result<ErrorInfo, ProtocolError> {
        if self.payload.is_null() {
            return Err(ProtocolError::EmptyPayload("ERROR"));
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
