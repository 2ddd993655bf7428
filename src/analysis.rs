//! Timing summary of a recording
//!
//! Works on capture timestamps and key codes only; symbols are never
//! inspected.

use crate::keyboard::{KeyEvent, KeyEventKind};
use crate::utils::{ms_to_us, us_to_ms, MinMaxExt};
use std::collections::HashMap;
use std::fmt;

/// Count, range and mean of a set of microsecond samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleStats {
    pub count: usize,
    pub min_us: Option<i64>,
    pub max_us: Option<i64>,
    /// A sum of epoch-sized offsets exceeds i64
    total_us: i128,
}

impl SampleStats {
    pub fn add_sample(&mut self, value_us: i64) {
        self.count += 1;
        self.total_us += i128::from(value_us);
        self.min_us.update_min(value_us);
        self.max_us.update_max(value_us);
    }

    pub fn mean_us(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.total_us as f64 / self.count as f64)
    }

    pub fn mean_ms(&self) -> Option<f64> {
        self.mean_us().map(|us| us / 1000.0)
    }

    pub fn min_ms(&self) -> Option<f64> {
        self.min_us.map(us_to_ms)
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.max_us.map(us_to_ms)
    }
}

impl fmt::Display for SampleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min_ms(), self.mean_ms(), self.max_ms()) {
            (Some(min), Some(mean), Some(max)) => write!(
                f,
                "n={} min={:.3}ms mean={:.3}ms max={:.3}ms",
                self.count, min, mean, max
            ),
            _ => write!(f, "n=0"),
        }
    }
}

/// Aggregate timing figures for a recorded session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingSummary {
    /// All key-downs, repeats included
    pub key_downs: usize,
    pub key_ups: usize,
    /// Key-downs flagged as auto-repeat
    pub repeats: usize,
    /// Time between successive non-repeat key-downs
    pub intervals: SampleStats,
    /// Time from a key's first key-down to its key-up
    pub holds: SampleStats,
    /// Keys still held when the recording ended
    pub unreleased: usize,
    /// Source minus capture timestamp, for events carrying an OS timestamp
    pub clock_offset: SampleStats,
    /// Capture time between the first and last event
    pub span_ms: f64,
}

impl TimingSummary {
    pub fn from_events(events: &[KeyEvent]) -> Self {
        let mut summary = Self::default();
        let mut last_press_us: Option<i64> = None;
        let mut held_since: HashMap<i32, i64> = HashMap::new();

        for event in events {
            let capture_us = ms_to_us(event.capture_timestamp_ms);

            match event.kind {
                KeyEventKind::KeyDown => {
                    summary.key_downs += 1;
                    if event.is_repeat {
                        summary.repeats += 1;
                    } else {
                        if let Some(previous) = last_press_us {
                            summary.intervals.add_sample(capture_us - previous);
                        }
                        last_press_us = Some(capture_us);
                    }
                    held_since.entry(event.key_code).or_insert(capture_us);
                }
                KeyEventKind::KeyUp => {
                    summary.key_ups += 1;
                    if let Some(pressed_us) = held_since.remove(&event.key_code) {
                        summary.holds.add_sample(capture_us - pressed_us);
                    }
                }
                KeyEventKind::FlagsChanged => {}
            }

            if event.source_timestamp_ms != 0.0 {
                summary
                    .clock_offset
                    .add_sample(ms_to_us(event.source_timestamp_ms) - capture_us);
            }
        }

        summary.unreleased = held_since.len();
        if let (Some(first), Some(last)) = (events.first(), events.last()) {
            summary.span_ms = last.capture_timestamp_ms - first.capture_timestamp_ms;
        }
        summary
    }

    /// Spread of the source-to-capture offset: how much the two timelines drift
    pub fn clock_offset_spread_ms(&self) -> Option<f64> {
        match (self.clock_offset.min_us, self.clock_offset.max_us) {
            (Some(min), Some(max)) => Some(us_to_ms(max - min)),
            _ => None,
        }
    }

    /// Non-repeat key-downs per second over the recording span
    pub fn presses_per_second(&self) -> Option<f64> {
        if self.span_ms <= 0.0 {
            return None;
        }
        Some((self.key_downs - self.repeats) as f64 / (self.span_ms / 1000.0))
    }
}

impl fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Key downs: {} ({} repeats), key ups: {}, span {:.3}ms",
            self.key_downs, self.repeats, self.key_ups, self.span_ms
        )?;
        writeln!(f, "Press interval: {}", self.intervals)?;
        write!(f, "Hold duration: {}", self.holds)?;
        if self.unreleased > 0 {
            write!(f, " ({} unreleased)", self.unreleased)?;
        }
        if let Some(spread) = self.clock_offset_spread_ms() {
            write!(f, "\nClock offset spread: {:.3}ms", spread)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyEventKind::{FlagsChanged, KeyDown, KeyUp};
    use crate::test_helpers::recorded;

    #[test]
    fn empty_recording() {
        let summary = TimingSummary::from_events(&[]);
        assert_eq!(summary, TimingSummary::default());
        assert_eq!(summary.intervals.mean_ms(), None);
        assert_eq!(summary.presses_per_second(), None);
        assert_eq!(summary.intervals.to_string(), "n=0");
    }

    #[test]
    fn intervals_skip_repeats() {
        let events = [
            recorded(1, 0.0, KeyDown, 30, false),
            recorded(2, 300.0, KeyDown, 30, true),
            recorded(3, 330.0, KeyDown, 30, true),
            recorded(4, 400.0, KeyUp, 30, false),
            recorded(5, 500.0, KeyDown, 31, false),
            recorded(6, 550.0, KeyUp, 31, false),
            recorded(7, 600.0, KeyDown, 32, false),
            recorded(8, 700.0, KeyUp, 32, false),
        ];
        let summary = TimingSummary::from_events(&events);

        assert_eq!(summary.key_downs, 5);
        assert_eq!(summary.repeats, 2);
        assert_eq!(summary.key_ups, 3);
        assert_eq!(summary.intervals.count, 2);
        assert_eq!(summary.intervals.min_ms(), Some(100.0));
        assert_eq!(summary.intervals.max_ms(), Some(500.0));
        assert_eq!(summary.intervals.mean_ms(), Some(300.0));
        assert_eq!(summary.span_ms, 700.0);
        assert_eq!(summary.presses_per_second(), Some(3.0 / 0.7));
    }

    #[test]
    fn holds_run_from_first_down_to_up() {
        let events = [
            recorded(1, 10.0, KeyDown, 42, false),
            recorded(2, 20.0, KeyDown, 30, false),
            recorded(3, 520.0, KeyDown, 30, true),
            recorded(4, 600.0, KeyUp, 30, false),
            recorded(5, 650.0, KeyUp, 42, false),
            recorded(6, 700.0, KeyUp, 99, false),
            recorded(7, 800.0, KeyDown, 31, false),
        ];
        let summary = TimingSummary::from_events(&events);

        assert_eq!(summary.holds.count, 2);
        assert_eq!(summary.holds.min_ms(), Some(580.0));
        assert_eq!(summary.holds.max_ms(), Some(640.0));
        assert_eq!(summary.unreleased, 1);
    }

    #[test]
    fn clock_offset_ignores_absent_source_times() {
        let mut events = vec![
            recorded(1, 1.0, KeyDown, 30, false),
            recorded(2, 2.0, KeyUp, 30, false),
            recorded(3, 3.0, FlagsChanged, 300, false),
        ];
        events[0].source_timestamp_ms = 5001.0;
        events[1].source_timestamp_ms = 5002.5;

        let summary = TimingSummary::from_events(&events);
        assert_eq!(summary.clock_offset.count, 2);
        assert_eq!(summary.clock_offset.min_ms(), Some(5000.0));
        assert_eq!(summary.clock_offset_spread_ms(), Some(0.5));
        assert!(summary.to_string().contains("Clock offset spread: 0.500ms"));
    }

    #[test]
    fn epoch_sized_offsets_do_not_overflow() {
        // evdev stamps are wall-clock times since 1970
        let mut stats = SampleStats::default();
        let base_us: i64 = 1_700_000_000_000_000;
        for i in 0..100_000 {
            stats.add_sample(base_us + i);
        }
        assert_eq!(stats.count, 100_000);
        assert_eq!(stats.min_us, Some(base_us));
        assert_eq!(stats.max_us, Some(base_us + 99_999));
        let mean = stats.mean_us().unwrap();
        assert!((mean - (base_us as f64 + 49_999.5)).abs() < 1.0);
    }

    #[test]
    fn display_reports_counts() {
        let events = [
            recorded(1, 0.0, KeyDown, 30, false),
            recorded(2, 80.0, KeyUp, 30, false),
        ];
        let text = TimingSummary::from_events(&events).to_string();
        assert!(text.starts_with("Key downs: 1 (0 repeats), key ups: 1"));
        assert!(text.contains("Hold duration: n=1 min=80.000ms mean=80.000ms max=80.000ms"));
        assert!(!text.contains("unreleased"));
    }
}
