use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// What to do with a frame when the pacing queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued frame to make room for the new one
    #[default]
    DropOldest,
    /// Keep the queue as is and discard the incoming frame
    DropNewest,
}

/// What drives the release check of the pacing buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickMode {
    /// One release check per received datagram
    #[default]
    Arrival,
    /// Release checks on a fixed timer at the frame rate, independent of input.
    /// Sparse input drains at a steady cadence instead of stalling.
    Timer,
}

/// Configuration for the relay process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the inbound socket binds to
    pub recv_addr: IpAddr,
    /// Port the inbound socket binds to
    pub recv_port: u16,
    /// Destination address for relayed frames
    pub send_addr: IpAddr,
    /// Destination port for relayed frames
    pub send_port: u16,
    /// Receive buffer size in bytes
    pub recv_buffer_size: usize,
    /// Frames to accumulate before the first release
    pub frames_to_buffer: usize,
    /// Output rate in frames per second
    pub frame_rate: f64,
    /// Maximum queued frames, `None` for unbounded
    pub capacity: Option<usize>,
    /// Overflow handling once `capacity` is reached
    pub overflow: OverflowPolicy,
    /// Release check driver
    pub tick_mode: TickMode,
    /// Interval between statistics log lines
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub stats_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            recv_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            recv_port: super::DEFAULT_RECV_PORT,
            send_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            send_port: super::DEFAULT_SEND_PORT,
            recv_buffer_size: super::MAX_PACKET_SIZE,
            frames_to_buffer: super::DEFAULT_FRAMES_TO_BUFFER,
            frame_rate: super::DEFAULT_FRAME_RATE,
            capacity: Some(super::DEFAULT_CAPACITY),
            overflow: OverflowPolicy::default(),
            tick_mode: TickMode::default(),
            stats_interval: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Parses a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Applies `FREED_RELAY_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides from any key lookup, e.g. the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_field(&lookup, "FREED_RELAY_RECV_ADDR", &mut self.recv_addr)?;
        override_field(&lookup, "FREED_RELAY_RECV_PORT", &mut self.recv_port)?;
        override_field(&lookup, "FREED_RELAY_SEND_ADDR", &mut self.send_addr)?;
        override_field(&lookup, "FREED_RELAY_SEND_PORT", &mut self.send_port)?;
        override_field(&lookup, "FREED_RELAY_FRAMES_TO_BUFFER", &mut self.frames_to_buffer)?;
        override_field(&lookup, "FREED_RELAY_FRAME_RATE", &mut self.frame_rate)?;
        Ok(())
    }

    /// Checks values that would make the relay misbehave
    pub fn validate(&self) -> Result<()> {
        crate::util::frame_interval(self.frame_rate)?;
        if self.recv_buffer_size < crate::protocol::FRAME_LEN {
            return Err(Error::config(format!(
                "recv_buffer_size must hold a FreeD frame ({} bytes), got {}",
                crate::protocol::FRAME_LEN,
                self.recv_buffer_size
            )));
        }
        if self.stats_interval.is_zero() {
            return Err(Error::config("stats_interval must be greater than zero"));
        }
        if let Some(capacity) = self.capacity {
            // The warm-up threshold must be reachable
            if capacity < self.frames_to_buffer.max(1) {
                return Err(Error::config(format!(
                    "capacity {} is smaller than frames_to_buffer {}",
                    capacity, self.frames_to_buffer
                )));
            }
        }
        Ok(())
    }

    /// Socket address the inbound transport binds to
    pub fn recv_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.recv_addr, self.recv_port)
    }

    /// Socket address relayed frames are sent to
    pub fn send_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.send_addr, self.send_port)
    }
}

fn override_field<F, T>(lookup: &F, key: &str, field: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *field = raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("Invalid {}={:?}: {}", key, raw, e)))?;
    }
    Ok(())
}
