//! FreeD protocol module
//!
//! This module decodes and encodes FreeD D1 camera tracking frames and
//! provides a stream codec for carriers without datagram boundaries.

pub mod codec;
pub mod frame;

pub use self::codec::FreeDCodec;
pub use self::frame::{checksum, decode, DecodeError, FreeDFrame};

// Constants
/// Size of a FreeD D1 frame in bytes
pub const FRAME_LEN: usize = 29;

/// Message type byte of the D1 camera position message
pub const MESSAGE_TYPE_D1: u8 = 0xD1;
