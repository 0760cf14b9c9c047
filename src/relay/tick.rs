//! Release timing
//!
//! The relay asks the pacing buffer for a frame once per tick. A `Ticker`
//! decides where ticks come from and a `Clock` decides what "now" is, so
//! neither the decoder nor the buffer know how they are driven.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::core::TickMode;

/// Source of the current time for release decisions
pub trait Clock {
    /// Returns the current time
    fn now(&self) -> Instant;
}

/// Runtime clock. Follows tokio's clock, so paused test runtimes apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Clock that only moves when told to, for simulations and tests
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`
    pub fn new(start: Instant) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward by `step`
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Tick driver of the relay loop
#[derive(Debug)]
pub enum Ticker {
    /// Ticks only when a datagram arrives
    Arrival,
    /// Ticks on a fixed interval
    Timer(Interval),
}

impl Ticker {
    /// Creates the ticker for `mode`, using `period` for timer ticks
    pub fn new(mode: TickMode, period: Duration) -> Self {
        match mode {
            TickMode::Arrival => Ticker::Arrival,
            TickMode::Timer => {
                let mut timer = interval(period);
                // Late ticks shift the schedule instead of bursting
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Ticker::Timer(timer)
            }
        }
    }

    /// Whether every arrival is followed by a release check
    pub fn ticks_on_arrival(&self) -> bool {
        matches!(self, Ticker::Arrival)
    }

    /// Waits for the next timer tick. Never completes in arrival mode.
    pub async fn tick(&mut self) {
        match self {
            Ticker::Arrival => futures::future::pending::<()>().await,
            Ticker::Timer(timer) => {
                timer.tick().await;
            }
        }
    }
}
