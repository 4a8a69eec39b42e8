//! Frame-interval smoothing shared by all stream sessions

use parking_lot::Mutex;
use std::time::Instant;

/// Rolling average over the last `capacity` samples.
///
/// A filter built with capacity 0 has no backing storage and passes every
/// sample through unchanged.
#[derive(Debug)]
pub struct RaFilter {
    values: Vec<i64>,
    index: usize,
    count: usize,
    sum: i64,
}

impl RaFilter {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![0; capacity],
            index: 0,
            count: 0,
            sum: 0,
        }
    }

    /// A filter with no storage; `run` returns its input unchanged.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Records `value` and returns the smoothed estimate.
    ///
    /// The slot under the cursor is evicted from the running sum and
    /// replaced; the average uses truncating integer division.
    pub fn run(&mut self, value: i64) -> i64 {
        if self.values.is_empty() {
            return value;
        }

        self.sum -= self.values[self.index];
        self.values[self.index] = value;
        self.sum += value;
        self.index = (self.index + 1) % self.values.len();
        if self.count < self.values.len() {
            self.count += 1;
        }

        self.sum / self.count as i64
    }
}

struct TelemetryInner {
    filter: RaFilter,
    last_frame: Option<Instant>,
}

/// Process-wide stream telemetry: the rolling filter plus the free-running
/// last-frame clock, serialized under one lock because sessions on
/// different connections feed the same state.
pub struct StreamTelemetry {
    inner: Mutex<TelemetryInner>,
}

impl StreamTelemetry {
    pub fn new(filter_samples: usize) -> Self {
        Self {
            inner: Mutex::new(TelemetryInner {
                filter: RaFilter::new(filter_samples),
                last_frame: None,
            }),
        }
    }

    /// Seeds the last-frame clock if no session has set it yet.
    pub fn seed_clock(&self) {
        self.seed_clock_at(Instant::now());
    }

    /// Records a delivered frame: interval since the previous frame goes
    /// through the filter, and the clock advances. Returns the smoothed
    /// interval in milliseconds.
    pub fn record_frame(&self) -> i64 {
        self.record_frame_at(Instant::now())
    }

    /// Clears the clock so the next session reseeds it from scratch.
    pub fn reset_clock(&self) {
        self.inner.lock().last_frame = None;
    }

    pub(crate) fn seed_clock_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        if inner.last_frame.is_none() {
            inner.last_frame = Some(now);
        }
    }

    pub(crate) fn record_frame_at(&self, now: Instant) -> i64 {
        let mut inner = self.inner.lock();
        let elapsed_ms = match inner.last_frame {
            Some(last) => now.saturating_duration_since(last).as_millis() as i64,
            None => 0,
        };
        inner.last_frame = Some(now);
        inner.filter.run(elapsed_ms)
    }

    /// Whether any session currently drives the free-running clock.
    pub fn clock_is_set(&self) -> bool {
        self.inner.lock().last_frame.is_some()
    }
}
