use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::core::Error;
use super::frame::{self, FreeDFrame};
use super::FRAME_LEN;

/// FreeD codec for byte-stream carriers such as serial links or TCP.
///
/// Frames carry no length prefix or sync marker, so the decoder slides one
/// byte at a time until a 29-byte window passes the checksum.
#[derive(Debug, Clone, Default)]
pub struct FreeDCodec {
    skipped: u64,
}

impl FreeDCodec {
    /// Creates a new FreeD codec
    pub fn new() -> Self {
        FreeDCodec::default()
    }

    /// Bytes discarded while searching for a valid frame
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Decoder for FreeDCodec {
    type Item = FreeDFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.len() >= FRAME_LEN {
            match frame::decode(&src[..FRAME_LEN]) {
                Ok(frame) => {
                    src.advance(FRAME_LEN);
                    return Ok(Some(frame));
                }
                Err(e) => {
                    trace!(error = %e, "Resyncing FreeD stream");
                    src.advance(1);
                    self.skipped += 1;
                }
            }
        }

        // Need more data for a full frame
        src.reserve(FRAME_LEN - src.len());
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        // A tail shorter than a frame can never complete
        if !src.is_empty() {
            trace!(len = src.len(), "Discarding partial FreeD frame at end of stream");
            self.skipped += src.len() as u64;
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<FreeDFrame> for FreeDCodec {
    type Error = Error;

    fn encode(&mut self, item: FreeDFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.encode());
        Ok(())
    }
}
