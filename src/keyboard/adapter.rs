//! Capture adapter interface
//!
//! An adapter is the only place that talks to an OS input API. It turns
//! whatever the OS delivers into [`RawKeyEvent`](super::RawKeyEvent)s and hands them to a
//! [`RawEventSink`], normally the recording session.

use super::event::RawEventSink;
use super::keymap::KeyCodeSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How an adapter acquires key events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Global capture without a window (hooks, event taps, evdev)
    #[default]
    Terminal,
    /// Events delivered to an application window
    Gui,
    /// Periodic sampling of the held-key set
    Poll,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Gui => "gui",
            Self::Poll => "poll",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terminal" => Ok(Self::Terminal),
            "gui" => Ok(Self::Gui),
            "poll" => Ok(Self::Poll),
            other => Err(format!("unknown capture mode '{}'", other)),
        }
    }
}

/// Failure to open a capture adapter
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(
        "no keyboard devices found (check read access to /dev/input, \
         e.g. membership in the 'input' group)"
    )]
    NoDevices,
    #[error("capture backend '{0}' is not supported on this platform")]
    Unsupported(&'static str),
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source of raw key events
pub trait CaptureAdapter {
    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;

    /// Capture mode recorded in the report header
    fn mode(&self) -> CaptureMode;

    /// Numbering scheme of the key codes this adapter produces
    fn code_set(&self) -> KeyCodeSet;

    /// Deliver every pending event to `sink` without blocking.
    /// Returns the number of events delivered.
    fn poll(&mut self, sink: &mut dyn RawEventSink) -> usize;
}
