//! Keyboard event types shared by the recorder and the capture adapters

use super::keymap::LayoutSnapshot;
use super::modifiers::ModifierState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transition class of a keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEventKind {
    /// Key was pressed down (or auto-repeated)
    KeyDown,
    /// Key was released
    KeyUp,
    /// Modifier flags changed without a resolvable down/up direction
    FlagsChanged,
}

impl KeyEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyDown => "key_down",
            Self::KeyUp => "key_up",
            Self::FlagsChanged => "flags_changed",
        }
    }
}

impl fmt::Display for KeyEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key_down" => Ok(Self::KeyDown),
            "key_up" => Ok(Self::KeyUp),
            "flags_changed" => Ok(Self::FlagsChanged),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

/// A recorded keyboard event with both timelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// 1-based position in the session
    pub sequence: u64,
    /// Milliseconds since session start on the monotonic clock
    pub capture_timestamp_ms: f64,
    /// Milliseconds on the OS event clock (0.0 when unavailable)
    pub source_timestamp_ms: f64,
    /// Transition class
    pub kind: KeyEventKind,
    /// Platform-native key code
    pub key_code: i32,
    /// Hardware scan code, 0 when the platform does not expose one
    pub scan_code: i32,
    /// Printable character or canonical key name
    pub symbol: String,
    /// Canonical modifier descriptor (`shift+ctrl`, `none`, ...)
    pub modifiers: String,
    /// Whether this key-down is an auto-repeat
    pub is_repeat: bool,
}

/// Classified fields of an event, before the recorder stamps it
#[derive(Debug, Clone, PartialEq)]
pub struct EventFields {
    pub kind: KeyEventKind,
    pub key_code: i32,
    pub scan_code: i32,
    pub symbol: String,
    pub modifiers: String,
    pub is_repeat: bool,
    pub source_timestamp: SourceTimestamp,
}

/// OS-native event-post timestamp as delivered by an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceTimestamp {
    /// Nanoseconds on the OS event clock (`CGEventGetTimestamp`)
    Nanos(u64),
    /// Millisecond tick count (`GetMessageTime`, `KBDLLHOOKSTRUCT.time`)
    TickMillis(u32),
    /// Seconds and microseconds pair (evdev `timeval`)
    Timeval { secs: i64, micros: i64 },
    /// The platform supplied no event timestamp
    #[default]
    Absent,
}

/// What the adapter knows about auto-repeat for a key-down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatHint {
    /// The OS reported the repeat state directly
    Reported(bool),
    /// No verified repeat signal is available
    #[default]
    Unknown,
}

/// An unclassified key transition as produced by a capture adapter
#[derive(Debug, Clone, PartialEq)]
pub struct RawKeyEvent {
    pub kind: KeyEventKind,
    pub key_code: i32,
    pub scan_code: i32,
    /// Modifier keys held at the instant of the event
    pub modifiers: ModifierState,
    /// Keyboard layout state used for symbol resolution
    pub layout: LayoutSnapshot,
    pub source_timestamp: SourceTimestamp,
    pub repeat: RepeatHint,
}

impl RawKeyEvent {
    pub fn new(kind: KeyEventKind, key_code: i32) -> Self {
        Self {
            kind,
            key_code,
            scan_code: 0,
            modifiers: ModifierState::default(),
            layout: LayoutSnapshot::Unavailable,
            source_timestamp: SourceTimestamp::Absent,
            repeat: RepeatHint::Unknown,
        }
    }

    pub fn key_down(key_code: i32) -> Self {
        Self::new(KeyEventKind::KeyDown, key_code)
    }

    pub fn key_up(key_code: i32) -> Self {
        Self::new(KeyEventKind::KeyUp, key_code)
    }

    pub fn flags_changed(key_code: i32) -> Self {
        Self::new(KeyEventKind::FlagsChanged, key_code)
    }

    pub fn with_scan_code(mut self, scan_code: i32) -> Self {
        self.scan_code = scan_code;
        self
    }

    pub fn with_modifiers(mut self, modifiers: ModifierState) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_layout(mut self, layout: LayoutSnapshot) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_source_timestamp(mut self, source_timestamp: SourceTimestamp) -> Self {
        self.source_timestamp = source_timestamp;
        self
    }

    pub fn with_repeat(mut self, repeat: RepeatHint) -> Self {
        self.repeat = repeat;
        self
    }
}

/// Outcome of delivering a raw event to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Recorded under the given sequence number
    Accepted(u64),
    /// Discarded because the recorder is at capacity
    Dropped,
    /// The event was the configured stop key; the session is now stopped
    StopRequested,
    /// The session is already stopped
    Ignored,
}

impl Disposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Receiver of raw events; implemented by the session
pub trait RawEventSink {
    fn deliver_raw_event(&mut self, raw: RawKeyEvent) -> Disposition;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_roundtrip() {
        for kind in [KeyEventKind::KeyDown, KeyEventKind::KeyUp, KeyEventKind::FlagsChanged] {
            assert_eq!(kind.as_str().parse::<KeyEventKind>(), Ok(kind));
        }
        assert!("key_pressed".parse::<KeyEventKind>().is_err());
    }

    #[test]
    fn raw_event_builder_defaults() {
        let raw = RawKeyEvent::key_down(0x41);
        assert_eq!(raw.scan_code, 0);
        assert_eq!(raw.source_timestamp, SourceTimestamp::Absent);
        assert_eq!(raw.repeat, RepeatHint::Unknown);
        assert_eq!(raw.layout, LayoutSnapshot::Unavailable);

        let raw = raw
            .with_scan_code(30)
            .with_repeat(RepeatHint::Reported(true))
            .with_source_timestamp(SourceTimestamp::TickMillis(1500));
        assert_eq!(raw.scan_code, 30);
        assert_eq!(raw.repeat, RepeatHint::Reported(true));
        assert_eq!(raw.source_timestamp, SourceTimestamp::TickMillis(1500));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&KeyEventKind::FlagsChanged).unwrap();
        assert_eq!(json, "\"flags_changed\"");
    }
}
