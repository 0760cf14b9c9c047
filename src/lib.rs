//! FreeD relay: camera tracking decoder and paced UDP rebroadcaster
//!
//! This library decodes FreeD D1 camera tracking frames and relays the raw
//! datagrams to a second destination at a fixed frame rate, smoothing out
//! bursty network arrival.
pub mod core;
pub mod protocol;
pub mod relay;
mod util;

// Re-export commonly used items
pub use crate::core::{Config, Error, OverflowPolicy, Result, TickMode};
pub use crate::protocol::{decode, DecodeError, FreeDCodec, FreeDFrame};
pub use crate::relay::{PacingBuffer, Relay, RelayObserver, RelayService, RelayStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
