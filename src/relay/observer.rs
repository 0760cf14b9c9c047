use std::io;

use tracing::{debug, info, trace, warn};

use crate::protocol::{DecodeError, FreeDFrame};
use super::RelayStats;

/// Hooks invoked by the relay as frames move through it.
///
/// Every method defaults to doing nothing.
pub trait RelayObserver {
    /// A datagram decoded as a FreeD frame
    fn on_decoded(&mut self, _frame: &FreeDFrame) {}

    /// A datagram did not decode. It is relayed regardless.
    fn on_decode_error(&mut self, _error: &DecodeError, _raw: &[u8]) {}

    /// The overflow policy discarded a frame
    fn on_dropped(&mut self, _raw: &[u8]) {}

    /// A frame was handed to the outbound transport
    fn on_sent(&mut self, _raw: &[u8]) {}

    /// The outbound transport failed to send a frame
    fn on_send_error(&mut self, _error: &io::Error) {}

    /// The inbound transport failed to receive
    fn on_recv_error(&mut self, _error: &io::Error) {}

    /// Periodic counters snapshot
    fn on_stats(&mut self, _stats: &RelayStats) {}
}

/// Observer that reports through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RelayObserver for TracingObserver {
    fn on_decoded(&mut self, frame: &FreeDFrame) {
        debug!(camera = frame.camera_id, "Received FreeD packet: {}", frame);
    }

    fn on_decode_error(&mut self, error: &DecodeError, raw: &[u8]) {
        warn!(len = raw.len(), "Not a FreeD packet: {}", error);
    }

    fn on_dropped(&mut self, raw: &[u8]) {
        warn!(len = raw.len(), "Pacing queue full, dropped a frame");
    }

    fn on_sent(&mut self, raw: &[u8]) {
        trace!(len = raw.len(), "Relayed frame");
    }

    fn on_send_error(&mut self, error: &io::Error) {
        warn!("Failed to relay frame: {}", error);
    }

    fn on_recv_error(&mut self, error: &io::Error) {
        warn!("Failed to receive datagram: {}", error);
    }

    fn on_stats(&mut self, stats: &RelayStats) {
        info!(
            received = stats.received,
            decoded = stats.decoded,
            decode_failures = stats.decode_failures,
            enqueued = stats.enqueued,
            relayed = stats.relayed,
            dropped = stats.dropped,
            send_errors = stats.send_errors,
            recv_errors = stats.recv_errors,
            "Relay statistics"
        );
    }
}
