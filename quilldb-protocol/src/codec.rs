//! Encoder and streaming decoder for framed envelopes.

use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::PROTOCOL_VERSION;
use bytes::{Bytes, BytesMut};

/// Encodes envelopes into framed bytes.
pub struct Encoder;

impl Encoder {
    /// Serializes an envelope and wraps it in a length-prefixed frame.
    pub fn encode_envelope(envelope: &Envelope) -> Result<BytesMut, ProtocolError> {
        let payload = serde_json::to_vec(envelope)?;
        Frame::new(Bytes::from(payload)).encode()
    }
}

/// Accumulates raw bytes and yields complete envelopes as they arrive.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame's envelope.
    ///
    /// Returns `Ok(None)` until a full frame has been buffered. An
    /// envelope carrying a protocol version this implementation does not
    /// speak is rejected.
    pub fn decode_envelope(&mut self) -> Result<Option<Envelope>, ProtocolError> {
        match Frame::decode(&mut self.buffer)? {
            Some(frame) => {
                let payload =
                    std::str::from_utf8(&frame.payload).map_err(|_| ProtocolError::InvalidUtf8)?;
                let envelope: Envelope = serde_json::from_str(payload)?;
                if envelope.version != PROTOCOL_VERSION {
                    return Err(ProtocolError::UnsupportedVersion(envelope.version));
                }
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
