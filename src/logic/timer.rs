//! Countdown Timer
//!
//! Headless Pomodoro countdown. It only knows about the `Tracker` interface,
//! never about the pipeline behind it.

use std::time::Duration;

use crate::logic::telemetry::{Metadata, Tracker};

/// Component name used for timer events
pub const TIMER_COMPONENT: &str = "timer";

/// Parse `HH:MM:SS` into seconds. Zero or malformed input gives `None`.
pub fn parse_time_string(time_str: &str) -> Option<u64> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return None;
    };

    let h: u64 = h.trim().parse().ok()?;
    let m: u64 = m.trim().parse().ok()?;
    let s: u64 = s.trim().parse().ok()?;

    let total = h
        .checked_mul(3600)?
        .checked_add(m.checked_mul(60)?)?
        .checked_add(s)?;
    (total > 0).then_some(total)
}

/// Format seconds as `HH:MM:SS`
pub fn format_time(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

pub struct Countdown<'a> {
    tracker: &'a dyn Tracker,
    threshold: u64,
    tick: Duration,
}

impl<'a> Countdown<'a> {
    pub fn new(tracker: &'a dyn Tracker, threshold: u64) -> Self {
        Self {
            tracker,
            threshold,
            tick: Duration::from_secs(1),
        }
    }

    /// Override the one-second tick (tests, demos)
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Count down from `total_seconds` to zero, calling `on_tick` with the
    /// formatted remaining time each second.
    pub fn run(&self, total_seconds: u64, mut on_tick: impl FnMut(&str)) {
        let mut meta = Metadata::new();
        meta.insert("duration".to_string(), format_time(total_seconds));
        self.tracker.track("timer_start", TIMER_COMPONENT, Some(&meta));

        let mut remaining = total_seconds;
        loop {
            on_tick(&format_time(remaining));

            if remaining == self.threshold && self.threshold > 0 {
                self.tracker.track("timer_countdown", TIMER_COMPONENT, None);
            }
            if remaining == 0 {
                break;
            }

            std::thread::sleep(self.tick);
            remaining -= 1;
        }

        self.tracker.track("timer_complete", TIMER_COMPONENT, Some(&meta));
    }
}
