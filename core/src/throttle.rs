//! Redraw throttle: minimum-interval gate between render materializations.
//!
//! Message arrival rate is unbounded; the throttle keeps the renderer from
//! becoming a bottleneck by bounding how often the buffer is materialized.

use std::time::{Duration, Instant};

/// Check/acknowledge gate with a minimum interval between redraws.
///
/// `should_redraw` never mutates state; callers acknowledge a successful
/// materialization with `mark_redrawn`, so a failed render does not
/// falsely advance the clock.
#[derive(Debug)]
pub struct RedrawThrottle {
    min_interval: Duration,
    last_redraw: Option<Instant>,
}

impl RedrawThrottle {
    /// Default minimum interval between redraws (matches the viewer's
    /// historical 250 ms cadence).
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_redraw: None,
        }
    }

    /// True iff enough time has passed since the last acknowledged redraw.
    /// Always true before the first acknowledgment.
    pub fn should_redraw(&self, now: Instant) -> bool {
        match self.last_redraw {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }

    /// Acknowledge a successful materialization at `now`.
    pub fn mark_redrawn(&mut self, now: Instant) {
        self.last_redraw = Some(now);
    }

    /// Forget the last redraw, as on session teardown.
    pub fn reset(&mut self) {
        self.last_redraw = None;
    }
}

impl Default for RedrawThrottle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}
