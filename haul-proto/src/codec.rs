//! Length-prefixed frame codec
//!
//! Wire format: a u32 big-endian payload length followed by exactly that
//! many bytes of JSON. The decoder enforces a frame size cap so a bad or
//! hostile peer cannot make the daemon buffer unbounded input.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::Envelope;

const LENGTH_PREFIX_BYTES: usize = 4;

/// Codec turning a byte stream into [`Envelope`]s and back.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_frame: usize,
}

impl EnvelopeCodec {
    pub fn new(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, ProtocolError> {
        if src.len() < LENGTH_PREFIX_BYTES {
            return Ok(None);
        }

        let mut length_bytes = [0u8; LENGTH_PREFIX_BYTES];
        length_bytes.copy_from_slice(&src[..LENGTH_PREFIX_BYTES]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if length > self.max_frame {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                limit: self.max_frame,
            });
        }

        if src.len() < LENGTH_PREFIX_BYTES + length {
            // Reserve enough for the rest of this frame to arrive
            src.reserve(LENGTH_PREFIX_BYTES + length - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_BYTES);
        let payload = src.split_to(length);
        let envelope = serde_json::from_slice(&payload)?;
        Ok(Some(envelope))
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = ProtocolError;

    fn encode(&mut self, envelope: Envelope, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let payload = serde_json::to_vec(&envelope)?;
        if payload.len() > self.max_frame {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                limit: self.max_frame,
            });
        }

        dst.reserve(LENGTH_PREFIX_BYTES + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);
        Ok(())
    }
}
