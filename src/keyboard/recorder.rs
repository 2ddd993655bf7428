//! Bounded, append-only event log

use super::clock::ClockCorrelator;
use super::event::{EventFields, KeyEvent};

/// Default maximum number of events kept per session
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Upper bound on the allocation made up front
const PREALLOCATE_LIMIT: usize = 100_000;

/// In-memory event log with a fixed capacity.
///
/// Sequence numbers are assigned on insertion and equal the event's
/// position plus one, so lookups by sequence are direct indexing. Events
/// submitted while the log is full are discarded and counted.
#[derive(Debug)]
pub struct EventRecorder {
    events: Vec<KeyEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity.min(PREALLOCATE_LIMIT)),
            capacity,
            dropped: 0,
        }
    }

    /// Stamp and append an event.
    ///
    /// Returns the assigned sequence number, or `None` when the log is full.
    pub fn record(&mut self, fields: EventFields, clock: &ClockCorrelator) -> Option<u64> {
        if self.is_full() {
            self.dropped += 1;
            if self.dropped == 1 {
                log::warn!(
                    "Event log full at {} events; further events are dropped",
                    self.capacity
                );
            }
            return None;
        }

        let capture_timestamp_ms = clock.now_capture_ms();
        let source_timestamp_ms = clock.translate_source_timestamp(fields.source_timestamp);
        let sequence = self.events.len() as u64 + 1;

        self.events.push(KeyEvent {
            sequence,
            capture_timestamp_ms,
            source_timestamp_ms,
            kind: fields.kind,
            key_code: fields.key_code,
            scan_code: fields.scan_code,
            symbol: fields.symbol,
            modifiers: fields.modifiers,
            is_repeat: fields.is_repeat,
        });

        Some(sequence)
    }

    /// All recorded events in insertion order. Does not clear the log.
    pub fn drain(&self) -> &[KeyEvent] {
        &self.events
    }

    /// Look up an event by its sequence number
    pub fn get(&self, sequence: u64) -> Option<&KeyEvent> {
        let index = usize::try_from(sequence.checked_sub(1)?).ok()?;
        self.events.get(index)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    /// Number of events discarded because the log was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
