//! Raw evdev-based keyboard capture for Linux
//!
//! Reads kernel input events directly from `/dev/input/event*`, which gives
//! the kernel's own event timestamp and a real auto-repeat flag
//! (`value == 2`). Requires read access to the input devices.

use super::adapter::{CaptureAdapter, CaptureError, CaptureMode};
use super::event::{RawEventSink, RawKeyEvent, RepeatHint, SourceTimestamp};
use super::keymap::{KeyCodeSet, LayoutSnapshot};
use super::modifiers::ModifierState;
use evdev::{Device, EventType, Key};
use nix::libc;
use std::collections::HashSet;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const KEY_RELEASE: i32 = 0;
const KEY_PRESS: i32 = 1;
const KEY_REPEAT: i32 = 2;
const CAPS_LOCK: u16 = 58;

/// A device is treated as a keyboard if it reports letter and enter keys
fn is_keyboard(device: &Device) -> bool {
    device.supported_keys().map_or(false, |keys| {
        keys.contains(Key::KEY_A) && keys.contains(Key::KEY_Z) && keys.contains(Key::KEY_ENTER)
    })
}

/// Find all readable keyboard devices
fn find_keyboard_devices() -> Vec<(PathBuf, Device)> {
    evdev::enumerate()
        .filter(|(_, device)| is_keyboard(device))
        .collect()
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    // SAFETY: fd is an open descriptor owned by `device`
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn timeval(timestamp: SystemTime) -> SourceTimestamp {
    match timestamp.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => SourceTimestamp::Timeval {
            secs: since_epoch.as_secs() as i64,
            micros: since_epoch.subsec_micros() as i64,
        },
        Err(_) => SourceTimestamp::Absent,
    }
}

/// Evdev-based keyboard listener
pub struct EvdevListener {
    devices: Vec<(PathBuf, Device)>,
    held: HashSet<u16>,
    caps_lock: bool,
}

impl EvdevListener {
    /// Open every accessible keyboard device in non-blocking mode
    pub fn new() -> Result<Self, CaptureError> {
        let devices = find_keyboard_devices();
        if devices.is_empty() {
            return Err(CaptureError::NoDevices);
        }
        for (path, device) in &devices {
            set_nonblocking(device)?;
            log::debug!(
                "Opened {} ({})",
                path.display(),
                device.name().unwrap_or("unnamed device")
            );
        }

        Ok(Self {
            devices,
            held: HashSet::new(),
            caps_lock: false,
        })
    }

    /// Get device paths
    pub fn device_paths(&self) -> Vec<&PathBuf> {
        self.devices.iter().map(|(path, _)| path).collect()
    }

    /// Build a raw event from one kernel key event
    fn translate(&mut self, code: u16, value: i32, timestamp: SystemTime) -> Option<RawKeyEvent> {
        let raw = match value {
            KEY_PRESS | KEY_REPEAT => {
                self.held.insert(code);
                if value == KEY_PRESS && code == CAPS_LOCK {
                    self.caps_lock = !self.caps_lock;
                }
                RawKeyEvent::key_down(code as i32)
            }
            KEY_RELEASE => {
                self.held.remove(&code);
                RawKeyEvent::key_up(code as i32)
            }
            _ => return None,
        };

        let modifiers = ModifierState::from_evdev_held(&self.held);
        Some(
            raw.with_scan_code(code as i32)
                .with_modifiers(modifiers)
                .with_layout(LayoutSnapshot::UsAnsi {
                    shift: modifiers.shift,
                    caps_lock: self.caps_lock,
                })
                .with_source_timestamp(timeval(timestamp))
                .with_repeat(RepeatHint::Reported(value == KEY_REPEAT)),
        )
    }
}

impl CaptureAdapter for EvdevListener {
    fn name(&self) -> &'static str {
        "evdev"
    }

    fn mode(&self) -> CaptureMode {
        CaptureMode::Terminal
    }

    fn code_set(&self) -> KeyCodeSet {
        KeyCodeSet::LinuxEvdev
    }

    fn poll(&mut self, sink: &mut dyn RawEventSink) -> usize {
        let mut pending = Vec::new();

        for (path, device) in &mut self.devices {
            match device.fetch_events() {
                Ok(events) => pending.extend(
                    events
                        .filter(|e| e.event_type() == EventType::KEY)
                        .map(|e| (e.code(), e.value(), e.timestamp())),
                ),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => log::warn!("Read from {} failed: {}", path.display(), e),
            }
        }

        let mut delivered = 0;
        for (code, value, timestamp) in pending {
            if let Some(raw) = self.translate(code, value, timestamp) {
                sink.deliver_raw_event(raw);
                delivered += 1;
            }
        }
        delivered
    }
}

/// Get a status message about evdev availability
pub fn evdev_status() -> String {
    match find_keyboard_devices().len() {
        0 => CaptureError::NoDevices.to_string(),
        n => format!("{} keyboard device(s) found", n),
    }
}
