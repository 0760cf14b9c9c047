use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::core::{Config, OverflowPolicy, Result};
use crate::util::frame_interval;
use super::RawFrame;

/// FIFO of raw frames released at a fixed frame rate.
///
/// Nothing is released until `frames_to_buffer` frames have been queued.
/// After that first fill the buffer drains one frame per eligible tick for
/// as long as frames remain, without waiting to refill.
#[derive(Debug)]
pub struct PacingBuffer {
    queue: VecDeque<RawFrame>,
    frames_to_buffer: usize,
    frame_interval: Duration,
    capacity: Option<usize>,
    overflow: OverflowPolicy,
    last_send: Option<Instant>,
    primed: bool,
}

impl PacingBuffer {
    /// Creates an unbounded buffer.
    ///
    /// Fails with a configuration error when `frame_rate` gives no usable
    /// frame interval.
    pub fn new(frames_to_buffer: usize, frame_rate: f64) -> Result<Self> {
        Ok(PacingBuffer {
            queue: VecDeque::with_capacity(frames_to_buffer),
            frames_to_buffer,
            frame_interval: frame_interval(frame_rate)?,
            capacity: None,
            overflow: OverflowPolicy::default(),
            last_send: None,
            primed: frames_to_buffer == 0,
        })
    }

    /// Creates a buffer from process configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let buffer = PacingBuffer::new(config.frames_to_buffer, config.frame_rate)?;
        Ok(match config.capacity {
            Some(capacity) => buffer.with_capacity(capacity, config.overflow),
            None => buffer,
        })
    }

    /// Bounds the queue to `capacity` frames
    pub fn with_capacity(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.capacity = Some(capacity);
        self.overflow = overflow;
        self
    }

    /// Appends a frame to the tail of the queue.
    ///
    /// Returns the frame discarded by the overflow policy, if any.
    pub fn enqueue(&mut self, raw: RawFrame) -> Option<RawFrame> {
        let dropped = match self.capacity {
            Some(capacity) if self.queue.len() >= capacity => match self.overflow {
                OverflowPolicy::DropNewest => return Some(raw),
                OverflowPolicy::DropOldest => self.queue.pop_front(),
            },
            _ => None,
        };

        self.queue.push_back(raw);
        if self.queue.len() >= self.frames_to_buffer {
            self.primed = true;
        }
        dropped
    }

    /// Pops the head frame if the buffer is primed and a frame interval has
    /// passed since the last release.
    pub fn try_release(&mut self, now: Instant) -> Option<RawFrame> {
        if !self.primed {
            return None;
        }

        if let Some(last) = self.last_send {
            if now.saturating_duration_since(last) < self.frame_interval {
                return None;
            }
        }

        let frame = self.queue.pop_front()?;
        self.last_send = Some(now);
        Some(frame)
    }

    /// Number of queued frames
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the warm-up threshold has been reached
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Minimum time between two releases
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Policy applied once the capacity is reached
    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    fn frame(n: u8) -> RawFrame {
        Bytes::from(vec![n; 4])
    }

    #[test]
    fn test_warm_up_gate() {
        let t0 = Instant::now();
        let mut buffer = PacingBuffer::new(8, 24.0).unwrap();

        for n in 0..7 {
            buffer.enqueue(frame(n));
            assert!(buffer.try_release(t0).is_none());
        }
        assert!(!buffer.is_primed());

        buffer.enqueue(frame(7));
        assert!(buffer.is_primed());
        assert_eq!(buffer.try_release(t0), Some(frame(0)));
        assert_eq!(buffer.len(), 7);
    }

    #[test]
    fn test_rate_limit() {
        let t0 = Instant::now();
        let mut buffer = PacingBuffer::new(2, 24.0).unwrap();
        let interval = buffer.frame_interval();
        for n in 0..4 {
            buffer.enqueue(frame(n));
        }

        assert_eq!(buffer.try_release(t0), Some(frame(0)));
        assert!(buffer.try_release(t0).is_none());
        assert!(buffer.try_release(t0 + interval / 2).is_none());
        assert_eq!(buffer.try_release(t0 + interval), Some(frame(1)));
        assert!(buffer.try_release(t0 + interval + interval / 2).is_none());
        assert_eq!(buffer.try_release(t0 + interval * 3), Some(frame(2)));
    }

    #[test]
    fn test_drains_below_threshold_after_warm_up() {
        let t0 = Instant::now();
        let mut buffer = PacingBuffer::new(3, 10.0).unwrap();
        let interval = buffer.frame_interval();
        for n in 0..3 {
            buffer.enqueue(frame(n));
        }

        let released: Vec<_> = (0..5)
            .filter_map(|tick| buffer.try_release(t0 + interval * tick))
            .collect();
        assert_eq!(released, vec![frame(0), frame(1), frame(2)]);
        assert!(buffer.is_empty());

        // An emptied buffer stays primed
        buffer.enqueue(frame(9));
        assert_eq!(buffer.try_release(t0 + interval * 6), Some(frame(9)));
    }

    #[test]
    fn test_zero_threshold_is_primed() {
        let mut buffer = PacingBuffer::new(0, 24.0).unwrap();
        assert!(buffer.is_primed());
        assert!(buffer.try_release(Instant::now()).is_none());
        buffer.enqueue(frame(1));
        assert_eq!(buffer.try_release(Instant::now()), Some(frame(1)));
    }

    #[test]
    fn test_drop_oldest() {
        let mut buffer = PacingBuffer::new(2, 24.0).unwrap().with_capacity(3, OverflowPolicy::DropOldest);
        for n in 0..3 {
            assert!(buffer.enqueue(frame(n)).is_none());
        }
        assert_eq!(buffer.enqueue(frame(3)), Some(frame(0)));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.try_release(Instant::now()), Some(frame(1)));
    }

    #[test]
    fn test_drop_newest() {
        let mut buffer = PacingBuffer::new(2, 24.0).unwrap().with_capacity(3, OverflowPolicy::DropNewest);
        for n in 0..3 {
            assert!(buffer.enqueue(frame(n)).is_none());
        }
        assert_eq!(buffer.enqueue(frame(3)), Some(frame(3)));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.try_release(Instant::now()), Some(frame(0)));
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.frames_to_buffer = 4;
        config.frame_rate = 50.0;
        config.capacity = None;
        let buffer = PacingBuffer::from_config(&config).unwrap();
        assert_eq!(buffer.frame_interval(), Duration::from_millis(20));
        assert!(!buffer.is_primed());
    }

    #[test]
    fn test_unusable_frame_rate_is_rejected() {
        assert!(PacingBuffer::new(8, 1e-300).is_err());
        assert!(PacingBuffer::new(8, 1e10).is_err());

        let mut config = Config::default();
        config.frame_rate = 0.0;
        assert!(PacingBuffer::from_config(&config).is_err());
    }

    proptest! {
        #[test]
        fn prop_fifo_order(threshold in 0usize..16, extra in 0usize..48) {
            let count = threshold + extra;
            let t0 = Instant::now();
            let mut buffer = PacingBuffer::new(threshold, 24.0).unwrap();
            let interval = buffer.frame_interval();
            let frames: Vec<_> = (0..count).map(|n| Bytes::from((n as u32).to_be_bytes().to_vec())).collect();
            for f in &frames {
                buffer.enqueue(f.clone());
            }

            let mut released = Vec::new();
            for tick in 0..(count as u32 + 1) {
                if let Some(f) = buffer.try_release(t0 + interval * tick) {
                    released.push(f);
                }
            }
            prop_assert_eq!(released, frames);
        }

        #[test]
        fn prop_releases_respect_frame_interval(
            steps in proptest::collection::vec(0u64..100, 1..200),
            frame_rate in 1.0f64..120.0,
        ) {
            let t0 = Instant::now();
            let mut buffer = PacingBuffer::new(4, frame_rate).unwrap();
            let interval = buffer.frame_interval();
            let mut now = t0;
            let mut last: Option<Instant> = None;

            for step in steps {
                now += Duration::from_millis(step);
                buffer.enqueue(Bytes::from_static(b"frame"));
                if buffer.try_release(now).is_some() {
                    if let Some(previous) = last {
                        prop_assert!(now - previous >= interval);
                    }
                    last = Some(now);
                }
            }
        }

        #[test]
        fn prop_capacity_is_never_exceeded(count in 0usize..100, capacity in 1usize..20, drop_newest in any::<bool>()) {
            let policy = if drop_newest { OverflowPolicy::DropNewest } else { OverflowPolicy::DropOldest };
            let mut buffer = PacingBuffer::new(1, 24.0).unwrap().with_capacity(capacity, policy);
            for n in 0..count {
                buffer.enqueue(Bytes::from(vec![n as u8]));
                prop_assert!(buffer.len() <= capacity);
            }
        }
    }
}
