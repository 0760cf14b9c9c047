//! Utility module
//!
//! This module provides timing helpers shared by the relay and its
//! configuration.

use std::time::Duration;

use crate::core::{Error, Result};

/// Converts a duration to a floating-point number of seconds
pub fn duration_to_secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

/// Time between frames at `frame_rate` frames per second.
///
/// Fails unless the rate is positive and gives an interval between one
/// nanosecond and `Duration::MAX`.
pub fn frame_interval(frame_rate: f64) -> Result<Duration> {
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return Err(Error::config(format!(
            "frame_rate must be a positive number, got {}",
            frame_rate
        )));
    }
    match Duration::try_from_secs_f64(1.0 / frame_rate) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => Err(Error::config(format!(
            "frame_rate {} is out of range for a frame interval",
            frame_rate
        ))),
    }
}
