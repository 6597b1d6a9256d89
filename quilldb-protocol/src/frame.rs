//! Length-prefixed binary framing.
//!
//! Every message on the wire is:
//!
//! ```text
//! +----------------+--------------------------+
//! | length         | payload                  |
//! | 4 bytes, BE    | length bytes (Envelope)  |
//! +----------------+--------------------------+
//! ```
//!
//! The payload is a JSON-serialized [`Envelope`](crate::Envelope). A single
//! socket read may contain zero, one, or many complete frames; [`Frame::decode`]
//! consumes exactly one frame at a time and leaves the rest buffered.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the big-endian length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// A wire frame: a length-prefixed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload (a serialized Envelope).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Encodes the frame as `[u32 BE length][payload]`.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let payload_len = self.payload.len() as u32;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + self.payload.len());
        buf.put_u32(payload_len);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes one frame from the buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was available,
    /// `Ok(None)` if more data is needed (the buffer is left untouched),
    /// or `Err` on protocol errors. The length prefix is only peeked until
    /// the full frame has arrived.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let total_len = LENGTH_PREFIX_SIZE + payload_len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        let payload = buf.split_to(payload_len as usize).freeze();

        Ok(Some(Self { payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let payload = Bytes::from(r#"{"version":1,"queryId":"query-1-0"}"#);
        let frame = Frame::new(payload.clone());

        let mut buf = frame.encode().unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.payload, payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(Bytes::new());
        let mut buf = frame.encode().unwrap();
        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE);

        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_partial_prefix() {
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        // Nothing consumed while incomplete.
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_partial_body() {
        let frame = Frame::new(Bytes::from(vec![7u8; 32]));
        let encoded = frame.encode().unwrap();

        let mut buf = BytesMut::from(&encoded[..20]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 20);

        buf.extend_from_slice(&encoded[20..]);
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload.len(), 32);
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let frame1 = Frame::new(Bytes::from_static(b"first"));
        let frame2 = Frame::new(Bytes::from_static(b"second"));

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame1.encode().unwrap());
        buf.extend_from_slice(&frame2.encode().unwrap());

        assert_eq!(
            Frame::decode(&mut buf).unwrap().unwrap().payload.as_ref(),
            b"first"
        );
        assert_eq!(
            Frame::decode(&mut buf).unwrap().unwrap().payload.as_ref(),
            b"second"
        );
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_frame_too_large_encode() {
        let huge = Bytes::from(vec![0u8; (MAX_PAYLOAD_SIZE + 1) as usize]);
        let result = Frame::new(huge).encode();
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_frame_too_large_decode() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_PAYLOAD_SIZE + 1);
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }
}
