//! Recording session: classification, recording and termination

use crate::keyboard::{
    classify, CaptureMode, Clock, ClockCorrelator, ClockError, Disposition, EventFields,
    EventRecorder, KeyCodeSet, KeyEvent, KeyEventKind, KeySymbolResolver, RawEventSink,
    RawKeyEvent, RepeatHint, DEFAULT_CAPACITY,
};
use crate::report::{self, OutputFormat, ReportError, ReportMetadata};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Key codes below this bound get per-key latch state for `flags_changed`
const FLAGS_LATCH_RANGE: std::ops::Range<i32> = 0..256;

/// Failure to start a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Clock(#[from] ClockError),
}

/// Settings fixed at session creation
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of events kept
    pub capacity: usize,
    /// Numbering scheme of incoming key codes
    pub code_set: KeyCodeSet,
    /// Capture mode written to the header
    pub mode: CaptureMode,
    /// Platform identifier written to the header
    pub platform: String,
    /// Key code whose key-down ends the session without being recorded
    pub stop_key: Option<i32>,
    /// Treat a key-down for an already held key as a repeat when the
    /// adapter has no verified repeat signal
    pub infer_repeats: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            code_set: KeyCodeSet::native(),
            mode: CaptureMode::Terminal,
            platform: report::platform_identifier(),
            stop_key: None,
            infer_repeats: false,
        }
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Recording,
    Stopped,
}

/// Counters describing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub recorded: usize,
    pub dropped: u64,
    pub capacity: usize,
}

/// One capture run from start to report
pub struct Session {
    metadata: ReportMetadata,
    clock: ClockCorrelator,
    recorder: EventRecorder,
    resolver: KeySymbolResolver,
    stop_key: Option<i32>,
    infer_repeats: bool,
    /// Modifier keys currently latched down by `flags_changed` events
    flags_latched: HashSet<i32>,
    /// Keys with a key-down and no key-up yet
    held: HashSet<i32>,
    state: SessionState,
}

impl Session {
    /// Anchor the session clock and start recording.
    ///
    /// Fails only when the clock cannot be used.
    pub fn new(config: SessionConfig, clock: Box<dyn Clock>) -> Result<Self, SessionError> {
        let clock = ClockCorrelator::new(clock)?;
        let metadata = ReportMetadata::new(config.platform, config.mode, clock.clock_source());

        log::debug!(
            "Session started: capacity={} code_set={} clock={}",
            config.capacity,
            config.code_set.name(),
            clock.clock_source()
        );

        Ok(Self {
            metadata,
            clock,
            recorder: EventRecorder::new(config.capacity),
            resolver: KeySymbolResolver::new(config.code_set),
            stop_key: config.stop_key,
            infer_repeats: config.infer_repeats,
            flags_latched: HashSet::new(),
            held: HashSet::new(),
            state: SessionState::Recording,
        })
    }

    /// Classify and record one raw event
    pub fn deliver_raw_event(&mut self, raw: RawKeyEvent) -> Disposition {
        if self.state == SessionState::Stopped {
            return Disposition::Ignored;
        }

        if raw.kind == KeyEventKind::KeyDown && self.stop_key == Some(raw.key_code) {
            log::info!("Stop key pressed");
            self.request_stop();
            return Disposition::StopRequested;
        }

        let kind = match raw.kind {
            KeyEventKind::FlagsChanged => self.latch_flags(raw.key_code),
            other => other,
        };

        let is_repeat = match kind {
            KeyEventKind::KeyDown => {
                let already_held = !self.held.insert(raw.key_code);
                match raw.repeat {
                    RepeatHint::Reported(repeat) => repeat,
                    RepeatHint::Unknown => self.infer_repeats && already_held,
                }
            }
            KeyEventKind::KeyUp => {
                self.held.remove(&raw.key_code);
                false
            }
            KeyEventKind::FlagsChanged => false,
        };

        let fields = EventFields {
            kind,
            key_code: raw.key_code,
            scan_code: raw.scan_code,
            symbol: self.resolver.resolve(raw.key_code, raw.scan_code, &raw.layout),
            modifiers: classify(&raw.modifiers),
            is_repeat,
            source_timestamp: raw.source_timestamp,
        };

        match self.recorder.record(fields, &self.clock) {
            Some(sequence) => {
                if let Some(event) = self.recorder.get(sequence) {
                    log::debug!(
                        "[{}] {} {} (keycode={}) t={:.3}ms",
                        event.sequence,
                        event.kind,
                        event.symbol,
                        event.key_code,
                        event.capture_timestamp_ms
                    );
                }
                Disposition::Accepted(sequence)
            }
            None => Disposition::Dropped,
        }
    }

    /// Turn a modifier transition into key_down/key_up by toggling its latch
    fn latch_flags(&mut self, key_code: i32) -> KeyEventKind {
        if !FLAGS_LATCH_RANGE.contains(&key_code) {
            return KeyEventKind::FlagsChanged;
        }
        if self.flags_latched.remove(&key_code) {
            KeyEventKind::KeyUp
        } else {
            self.flags_latched.insert(key_code);
            KeyEventKind::KeyDown
        }
    }

    /// Stop accepting events. Idempotent.
    pub fn request_stop(&mut self) {
        if self.state == SessionState::Recording {
            self.state = SessionState::Stopped;
            log::info!(
                "Recording stopped after {} events ({} dropped)",
                self.recorder.len(),
                self.recorder.dropped()
            );
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SessionState::Stopped
    }

    /// Write the recording to `destination`.
    ///
    /// Stops the session first if it is still recording. The in-memory log
    /// is left untouched, so a failed write can be retried elsewhere.
    pub fn write_report(
        &mut self,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<(), ReportError> {
        self.request_stop();
        match report::write(&self.metadata, self.recorder.drain(), destination, format) {
            Ok(()) => {
                log::info!(
                    "Wrote {} events to {}",
                    self.recorder.len(),
                    destination.display()
                );
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to write recording to {}: {}", destination.display(), e);
                Err(e)
            }
        }
    }

    /// Recorded events in sequence order
    pub fn events(&self) -> &[KeyEvent] {
        self.recorder.drain()
    }

    pub fn metadata(&self) -> &ReportMetadata {
        &self.metadata
    }

    pub fn code_set(&self) -> KeyCodeSet {
        self.resolver.code_set()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            recorded: self.recorder.len(),
            dropped: self.recorder.dropped(),
            capacity: self.recorder.capacity(),
        }
    }
}

impl RawEventSink for Session {
    fn deliver_raw_event(&mut self, raw: RawKeyEvent) -> Disposition {
        Session::deliver_raw_event(self, raw)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("stats", &self.stats())
            .field("clock", &self.clock)
            .finish()
    }
}
