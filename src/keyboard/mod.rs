//! Keyboard event capture, classification and recording

mod adapter;
mod clock;
mod event;
pub mod keymap;
mod modifiers;
mod poll_listener;
mod recorder;

#[cfg(target_os = "linux")]
mod evdev_listener;

pub use adapter::{CaptureAdapter, CaptureError, CaptureMode};
pub use clock::{Clock, ClockCorrelator, ClockError, InstantClock, ManualClock};
pub use event::{
    Disposition, EventFields, KeyEvent, KeyEventKind, RawEventSink, RawKeyEvent, RepeatHint,
    SourceTimestamp,
};
pub use keymap::{KeyCodeSet, KeySymbolResolver, LayoutSnapshot};
pub use modifiers::{classify, ModifierState};
pub use poll_listener::PollListener;
pub use recorder::{EventRecorder, DEFAULT_CAPACITY};

#[cfg(target_os = "linux")]
pub use evdev_listener::{evdev_status, EvdevListener};
