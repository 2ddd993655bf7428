//! Cross-platform polling adapter built on `device_query`
//!
//! Samples the set of held keys on every poll and reports the differences
//! as key-down and key-up events. Key codes are translated to Linux evdev
//! numbering on every platform. There is no OS event timestamp and no
//! repeat signal on this path.

use super::adapter::{CaptureAdapter, CaptureMode};
use super::event::{RawEventSink, RawKeyEvent, RepeatHint, SourceTimestamp};
use super::keymap::{KeyCodeSet, LayoutSnapshot};
use super::modifiers::ModifierState;
use device_query::{DeviceQuery, DeviceState, Keycode};

const CAPS_LOCK: u16 = 58;

/// Keyboard listener that polls for key state changes
pub struct PollListener {
    device_state: DeviceState,
    last_keys: Vec<Keycode>,
    caps_lock: bool,
}

impl PollListener {
    pub fn new() -> Self {
        Self {
            device_state: DeviceState::new(),
            last_keys: Vec::new(),
            caps_lock: false,
        }
    }
}

impl Default for PollListener {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureAdapter for PollListener {
    fn name(&self) -> &'static str {
        "device_query"
    }

    fn mode(&self) -> CaptureMode {
        CaptureMode::Poll
    }

    fn code_set(&self) -> KeyCodeSet {
        KeyCodeSet::LinuxEvdev
    }

    fn poll(&mut self, sink: &mut dyn RawEventSink) -> usize {
        let current_keys = self.device_state.get_keys();
        let transitions = diff_keys(&self.last_keys, &current_keys);
        self.last_keys = current_keys;

        let held: Vec<u16> = self.last_keys.iter().filter_map(|k| evdev_code(*k)).collect();
        let modifiers = ModifierState::from_evdev_held(&held);

        let mut delivered = 0;
        for (code, pressed) in transitions {
            if pressed && code == CAPS_LOCK {
                self.caps_lock = !self.caps_lock;
            }
            let raw = if pressed {
                RawKeyEvent::key_down(code as i32)
            } else {
                RawKeyEvent::key_up(code as i32)
            };
            let raw = raw
                .with_scan_code(code as i32)
                .with_modifiers(modifiers)
                .with_layout(LayoutSnapshot::UsAnsi {
                    shift: modifiers.shift,
                    caps_lock: self.caps_lock,
                })
                .with_source_timestamp(SourceTimestamp::Absent)
                .with_repeat(RepeatHint::Unknown);
            sink.deliver_raw_event(raw);
            delivered += 1;
        }
        delivered
    }
}

/// Presses first, then releases, as (evdev code, pressed) pairs
fn diff_keys(previous: &[Keycode], current: &[Keycode]) -> Vec<(u16, bool)> {
    let pressed = current
        .iter()
        .filter(|k| !previous.contains(k))
        .filter_map(|k| evdev_code(*k))
        .map(|code| (code, true));
    let released = previous
        .iter()
        .filter(|k| !current.contains(k))
        .filter_map(|k| evdev_code(*k))
        .map(|code| (code, false));
    pressed.chain(released).collect()
}

/// Linux evdev code for a `device_query` key
pub fn evdev_code(key: Keycode) -> Option<u16> {
    use Keycode as K;
    let code = match key {
        K::Escape => 1,
        K::Key1 => 2, K::Key2 => 3, K::Key3 => 4, K::Key4 => 5, K::Key5 => 6,
        K::Key6 => 7, K::Key7 => 8, K::Key8 => 9, K::Key9 => 10, K::Key0 => 11,
        K::Minus => 12, K::Equal => 13, K::Backspace => 14, K::Tab => 15,
        K::Q => 16, K::W => 17, K::E => 18, K::R => 19, K::T => 20,
        K::Y => 21, K::U => 22, K::I => 23, K::O => 24, K::P => 25,
        K::LeftBracket => 26, K::RightBracket => 27, K::Enter => 28, K::LControl => 29,
        K::A => 30, K::S => 31, K::D => 32, K::F => 33, K::G => 34,
        K::H => 35, K::J => 36, K::K => 37, K::L => 38,
        K::Semicolon => 39, K::Apostrophe => 40, K::Grave => 41, K::LShift => 42,
        K::BackSlash => 43,
        K::Z => 44, K::X => 45, K::C => 46, K::V => 47, K::B => 48, K::N => 49, K::M => 50,
        K::Comma => 51, K::Dot => 52, K::Slash => 53, K::RShift => 54,
        K::NumpadMultiply => 55, K::LAlt => 56, K::Space => 57, K::CapsLock => 58,
        K::F1 => 59, K::F2 => 60, K::F3 => 61, K::F4 => 62, K::F5 => 63,
        K::F6 => 64, K::F7 => 65, K::F8 => 66, K::F9 => 67, K::F10 => 68,
        K::Numpad7 => 71, K::Numpad8 => 72, K::Numpad9 => 73, K::NumpadSubtract => 74,
        K::Numpad4 => 75, K::Numpad5 => 76, K::Numpad6 => 77, K::NumpadAdd => 78,
        K::Numpad1 => 79, K::Numpad2 => 80, K::Numpad3 => 81, K::Numpad0 => 82,
        K::F11 => 87, K::F12 => 88,
        K::RControl => 97, K::NumpadDivide => 98, K::RAlt => 100,
        K::Home => 102, K::Up => 103, K::PageUp => 104, K::Left => 105,
        K::Right => 106, K::End => 107, K::Down => 108, K::PageDown => 109,
        K::Insert => 110, K::Delete => 111,
        K::LMeta => 125, K::RMeta => 126,
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_reports_presses_then_releases() {
        let previous = vec![Keycode::A, Keycode::LShift];
        let current = vec![Keycode::LShift, Keycode::S, Keycode::D];
        assert_eq!(
            diff_keys(&previous, &current),
            vec![(31, true), (32, true), (30, false)]
        );
    }

    #[test]
    fn unchanged_keys_produce_nothing() {
        let keys = vec![Keycode::A];
        assert!(diff_keys(&keys, &keys).is_empty());
        assert!(diff_keys(&[], &[]).is_empty());
    }

    #[test]
    fn evdev_codes_match_kernel_numbering() {
        assert_eq!(evdev_code(Keycode::Escape), Some(1));
        assert_eq!(evdev_code(Keycode::A), Some(30));
        assert_eq!(evdev_code(Keycode::Enter), Some(28));
        assert_eq!(evdev_code(Keycode::RMeta), Some(126));
        assert_eq!(evdev_code(Keycode::Left), Some(105));
    }
}
