//! Paced FreeD relay
//!
//! Every received datagram is decoded for observation and queued for
//! forwarding. On each tick the pacing buffer may release its oldest frame,
//! which is sent to the outbound transport. Decode failures never stop a
//! datagram from being relayed, and transport errors during steady-state
//! operation are reported and skipped.

mod buffer;
mod observer;
mod tick;
mod transport;

pub use self::buffer::PacingBuffer;
pub use self::observer::{RelayObserver, TracingObserver};
pub use self::tick::{Clock, ManualClock, SystemClock, Ticker};
pub use self::transport::{Inbound, Outbound, UdpInbound, UdpOutbound};

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::info;

use crate::core::{Config, OverflowPolicy, Result};
use crate::protocol::decode;
use crate::util::duration_to_secs;

/// Datagram as received, relayed untouched
pub type RawFrame = Bytes;

/// Running counters of the relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Datagrams received
    pub received: u64,
    /// Datagrams that decoded as FreeD frames
    pub decoded: u64,
    /// Datagrams that failed to decode
    pub decode_failures: u64,
    /// Datagrams accepted into the pacing queue
    pub enqueued: u64,
    /// Frames sent to the outbound transport
    pub relayed: u64,
    /// Frames discarded by the overflow policy
    pub dropped: u64,
    /// Failed sends
    pub send_errors: u64,
    /// Failed receives
    pub recv_errors: u64,
}

/// Relay state machine, free of I/O.
///
/// The caller feeds datagrams with [`Relay::ingest`], asks for due frames
/// with [`Relay::poll_release`] and reports transport outcomes back.
#[derive(Debug)]
pub struct Relay<O = TracingObserver> {
    buffer: PacingBuffer,
    observer: O,
    stats: RelayStats,
}

impl<O: RelayObserver> Relay<O> {
    /// Creates a relay around a pacing buffer
    pub fn new(buffer: PacingBuffer, observer: O) -> Self {
        Relay {
            buffer,
            observer,
            stats: RelayStats::default(),
        }
    }

    /// Decodes a datagram for observation and queues it for forwarding
    pub fn ingest(&mut self, raw: RawFrame) {
        self.stats.received += 1;

        match decode(&raw) {
            Ok(frame) => {
                self.stats.decoded += 1;
                self.observer.on_decoded(&frame);
            }
            Err(e) => {
                self.stats.decode_failures += 1;
                self.observer.on_decode_error(&e, &raw);
            }
        }

        match self.buffer.enqueue(raw) {
            Some(dropped) => {
                // DropNewest hands back the incoming datagram itself
                if self.buffer.overflow_policy() == OverflowPolicy::DropOldest {
                    self.stats.enqueued += 1;
                }
                self.stats.dropped += 1;
                self.observer.on_dropped(&dropped);
            }
            None => self.stats.enqueued += 1,
        }
    }

    /// Returns the frame due at `now`, if any
    pub fn poll_release(&mut self, now: Instant) -> Option<RawFrame> {
        self.buffer.try_release(now)
    }

    /// Records a successful send
    pub fn record_sent(&mut self, frame: &[u8]) {
        self.stats.relayed += 1;
        self.observer.on_sent(frame);
    }

    /// Records a failed send. The frame is not retried.
    pub fn record_send_error(&mut self, error: &std::io::Error) {
        self.stats.send_errors += 1;
        self.observer.on_send_error(error);
    }

    /// Records a failed receive
    pub fn record_recv_error(&mut self, error: &std::io::Error) {
        self.stats.recv_errors += 1;
        self.observer.on_recv_error(error);
    }

    /// Passes the current counters to the observer
    pub fn report_stats(&mut self) {
        self.observer.on_stats(&self.stats);
    }

    /// Current counters
    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// The pacing buffer
    pub fn buffer(&self) -> &PacingBuffer {
        &self.buffer
    }

    /// The observer
    pub fn observer(&self) -> &O {
        &self.observer
    }
}

/// Drives a [`Relay`] between an inbound and an outbound transport.
///
/// Runs as a single task: receive, ticks and stats reporting are multiplexed
/// with `select!`, so the buffer never needs a lock.
pub struct RelayService<I, T, C = SystemClock, O = TracingObserver> {
    relay: Relay<O>,
    inbound: I,
    outbound: T,
    clock: C,
    ticker: Ticker,
    stats_interval: Duration,
}

impl<I, T> RelayService<I, T>
where
    I: Inbound,
    T: Outbound,
{
    /// Builds a service with the system clock and tracing observer
    pub fn from_config(config: &Config, inbound: I, outbound: T) -> Result<Self> {
        let relay = Relay::new(PacingBuffer::from_config(config)?, TracingObserver);
        let ticker = Ticker::new(config.tick_mode, relay.buffer().frame_interval());
        Ok(RelayService::new(
            relay,
            inbound,
            outbound,
            SystemClock,
            ticker,
            config.stats_interval,
        ))
    }
}

impl<I, T, C, O> RelayService<I, T, C, O>
where
    I: Inbound,
    T: Outbound,
    C: Clock,
    O: RelayObserver,
{
    /// Creates a new relay service
    pub fn new(
        relay: Relay<O>,
        inbound: I,
        outbound: T,
        clock: C,
        ticker: Ticker,
        stats_interval: Duration,
    ) -> Self {
        RelayService {
            relay,
            inbound,
            outbound,
            clock,
            ticker,
            stats_interval,
        }
    }

    /// Runs one arrival-driven iteration: receive, ingest, one release check
    pub async fn run_once(&mut self) {
        let received = self.inbound.recv().await;
        self.handle_received(received).await;
    }

    /// Runs the relay until the task is dropped
    pub async fn run(&mut self) {
        let start = self.clock.now();
        let mut stats_timer = interval_at(
            tokio::time::Instant::now() + self.stats_interval,
            self.stats_interval,
        );
        stats_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            frame_interval_us = self.relay.buffer().frame_interval().as_micros() as u64,
            arrival_ticks = self.ticker.ticks_on_arrival(),
            "Relay running"
        );

        loop {
            tokio::select! {
                received = self.inbound.recv() => {
                    self.handle_received(received).await;
                }
                _ = self.ticker.tick() => {
                    self.release_due().await;
                }
                _ = stats_timer.tick() => {
                    let uptime = self.clock.now().saturating_duration_since(start);
                    info!(uptime_secs = duration_to_secs(uptime), queued = self.relay.buffer().len(), "Relay uptime");
                    self.relay.report_stats();
                }
            }
        }
    }

    async fn handle_received(&mut self, received: std::io::Result<RawFrame>) {
        match received {
            Ok(raw) => {
                self.relay.ingest(raw);
                if self.ticker.ticks_on_arrival() {
                    self.release_due().await;
                }
            }
            Err(e) => self.relay.record_recv_error(&e),
        }
    }

    /// Sends the due frame, if any
    async fn release_due(&mut self) {
        let Some(frame) = self.relay.poll_release(self.clock.now()) else {
            return;
        };

        match self.outbound.send(&frame).await {
            Ok(_) => self.relay.record_sent(&frame),
            Err(e) => self.relay.record_send_error(&e),
        }
    }

    /// The relay state machine
    pub fn relay(&self) -> &Relay<O> {
        &self.relay
    }

    /// Mutable access to the relay state machine
    pub fn relay_mut(&mut self) -> &mut Relay<O> {
        &mut self.relay
    }
}

/// Binds the UDP transports described by `config` and builds the service.
///
/// Socket setup failures are fatal and returned as errors.
pub async fn bind(config: &Config) -> Result<RelayService<UdpInbound, UdpOutbound>> {
    config.validate()?;
    let inbound = UdpInbound::bind(config.recv_socket_addr(), config.recv_buffer_size)?;
    let outbound = UdpOutbound::connect(config.send_socket_addr()).await?;
    info!(
        listen = %inbound.local_addr()?,
        destination = %outbound.destination(),
        frames_to_buffer = config.frames_to_buffer,
        frame_rate = config.frame_rate,
        "Relay sockets ready"
    );
    RelayService::from_config(config, inbound, outbound)
}
