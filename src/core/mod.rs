//! Core types shared by the decoder and the relay
//!
//! This module contains the error type, process configuration and the
//! reference defaults of the relay.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{Config, OverflowPolicy, TickMode};

/// Default port the relay listens on
pub const DEFAULT_RECV_PORT: u16 = 6301;

/// Default port relayed frames are sent to
pub const DEFAULT_SEND_PORT: u16 = 6321;

/// Default receive buffer size in bytes
pub const MAX_PACKET_SIZE: usize = 1024;

/// Frames accumulated before the first release
pub const DEFAULT_FRAMES_TO_BUFFER: usize = 8;

/// Default output rate in frames per second
pub const DEFAULT_FRAME_RATE: f64 = 24.0;

/// Default queue bound, ten seconds of video at the default rate
pub const DEFAULT_CAPACITY: usize = 240;
