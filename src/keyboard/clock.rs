//! Clock correlation between the monotonic capture clock and OS event clocks
//!
//! Two timelines are recorded side by side for every event:
//!
//! - the capture timeline, read from a monotonic clock at the moment the
//!   event reaches the recorder and expressed relative to the session anchor
//! - the source timeline, taken from the OS's own event-post timestamp in
//!   whatever unit the platform delivers it
//!
//! No attempt is made to align the two domains.

use super::event::SourceTimestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Failure to obtain a usable monotonic clock
#[derive(Debug, Error)]
pub enum ClockError {
    /// Two consecutive reads went backwards
    #[error("clock {source_name} is not monotonic ({first_ns}ns then {second_ns}ns)")]
    NotMonotonic {
        source_name: &'static str,
        first_ns: u64,
        second_ns: u64,
    },
}

/// A monotonic nanosecond counter
pub trait Clock: Send {
    /// Nanoseconds since an arbitrary, fixed origin
    fn now_ns(&self) -> u64;

    /// Human-readable description written into the report header
    fn description(&self) -> &'static str;

    /// Verify the clock can be read. Called once at session construction.
    fn probe(&self) -> Result<(), ClockError> {
        let first_ns = self.now_ns();
        let second_ns = self.now_ns();
        if second_ns < first_ns {
            return Err(ClockError::NotMonotonic {
                source_name: self.description(),
                first_ns,
                second_ns,
            });
        }
        Ok(())
    }
}

/// Clock backed by `std::time::Instant`
///
/// `Instant` uses `QueryPerformanceCounter` on Windows,
/// `mach_absolute_time` on macOS and `CLOCK_MONOTONIC` on Linux.
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for InstantClock {
    #[inline]
    fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn description(&self) -> &'static str {
        "std::time::Instant"
    }
}

/// Manually advanced clock for deterministic tests and replays.
///
/// Clones share the same counter, so a test can keep one handle while the
/// session owns the other.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at_ns(nanos: u64) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(nanos)),
        }
    }

    pub fn advance_ns(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn advance_us(&self, micros: u64) {
        self.advance_ns(micros * 1_000);
    }

    pub fn advance_ms(&self, millis: u64) {
        self.advance_ns(millis * 1_000_000);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn description(&self) -> &'static str {
        "manual"
    }
}

/// Converts clock readings into the session's millisecond timelines
pub struct ClockCorrelator {
    clock: Box<dyn Clock>,
    anchor_ns: u64,
}

impl ClockCorrelator {
    /// Probe the clock and anchor the capture timeline at its current reading
    pub fn new(clock: Box<dyn Clock>) -> Result<Self, ClockError> {
        clock.probe()?;
        let anchor_ns = clock.now_ns();
        Ok(Self { clock, anchor_ns })
    }

    /// Milliseconds elapsed since the anchor, with sub-millisecond precision
    #[inline]
    pub fn now_capture_ms(&self) -> f64 {
        let elapsed_ns = self.clock.now_ns().saturating_sub(self.anchor_ns);
        elapsed_ns as f64 / 1_000_000.0
    }

    /// Express an OS event timestamp in milliseconds on its own clock domain
    pub fn translate_source_timestamp(&self, raw: SourceTimestamp) -> f64 {
        match raw {
            SourceTimestamp::Nanos(ns) => ns as f64 / 1_000_000.0,
            SourceTimestamp::TickMillis(ms) => ms as f64,
            SourceTimestamp::Timeval { secs, micros } => {
                secs as f64 * 1_000.0 + micros as f64 / 1_000.0
            }
            SourceTimestamp::Absent => 0.0,
        }
    }

    pub fn clock_source(&self) -> &'static str {
        self.clock.description()
    }
}

impl std::fmt::Debug for ClockCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockCorrelator")
            .field("clock", &self.clock.description())
            .field("anchor_ns", &self.anchor_ns)
            .finish()
    }
}
