//! Modifier key snapshots and their canonical descriptor

use serde::{Deserialize, Serialize};

/// macOS `kCGEventFlagMaskShift`
pub const CG_FLAG_SHIFT: u64 = 0x0002_0000;
/// macOS `kCGEventFlagMaskControl`
pub const CG_FLAG_CONTROL: u64 = 0x0004_0000;
/// macOS `kCGEventFlagMaskAlternate`
pub const CG_FLAG_ALTERNATE: u64 = 0x0008_0000;
/// macOS `kCGEventFlagMaskCommand`
pub const CG_FLAG_COMMAND: u64 = 0x0010_0000;

/// Which modifier keys are held at the instant of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifierState {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Command on macOS, the Windows/Super key elsewhere
    pub cmd: bool,
}

impl ModifierState {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        cmd: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    /// Build from a macOS `CGEventFlags` bit mask
    pub fn from_cg_flags(flags: u64) -> Self {
        Self {
            shift: flags & CG_FLAG_SHIFT != 0,
            ctrl: flags & CG_FLAG_CONTROL != 0,
            alt: flags & CG_FLAG_ALTERNATE != 0,
            cmd: flags & CG_FLAG_COMMAND != 0,
        }
    }

    /// Build from a set of held Linux evdev key codes
    pub fn from_evdev_held<'a>(held: impl IntoIterator<Item = &'a u16>) -> Self {
        let mut state = Self::NONE;
        for code in held {
            match code {
                42 | 54 => state.shift = true,
                29 | 97 => state.ctrl = true,
                56 | 100 => state.alt = true,
                125 | 126 => state.cmd = true,
                _ => {}
            }
        }
        state
    }

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.cmd
    }

    /// Canonical descriptor, see [`classify`]
    pub fn describe(&self) -> String {
        classify(self)
    }
}

/// Join held modifiers with `+` in the fixed order shift, ctrl, alt, cmd,
/// or return `none` when nothing is held.
pub fn classify(state: &ModifierState) -> String {
    let parts: Vec<&str> = [
        (state.shift, "shift"),
        (state.ctrl, "ctrl"),
        (state.alt, "alt"),
        (state.cmd, "cmd"),
    ]
    .into_iter()
    .filter_map(|(held, name)| held.then_some(name))
    .collect();

    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join("+")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_is_none() {
        assert_eq!(classify(&ModifierState::default()), "none");
        assert!(!ModifierState::NONE.any());
    }

    #[test]
    fn order_is_fixed() {
        let state = ModifierState {
            ctrl: true,
            shift: true,
            ..ModifierState::NONE
        };
        assert_eq!(classify(&state), "shift+ctrl");

        let all = ModifierState {
            shift: true,
            ctrl: true,
            alt: true,
            cmd: true,
        };
        assert_eq!(all.describe(), "shift+ctrl+alt+cmd");

        let alt_cmd = ModifierState {
            cmd: true,
            alt: true,
            ..ModifierState::NONE
        };
        assert_eq!(alt_cmd.describe(), "alt+cmd");
    }

    #[test]
    fn every_combination_is_deterministic() {
        for bits in 0u8..16 {
            let state = ModifierState {
                shift: bits & 1 != 0,
                ctrl: bits & 2 != 0,
                alt: bits & 4 != 0,
                cmd: bits & 8 != 0,
            };
            let first = classify(&state);
            assert_eq!(first, classify(&state));
            assert!(first
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+'));
        }
    }

    #[test]
    fn cg_flags_decode() {
        let state = ModifierState::from_cg_flags(0x0012_0000);
        assert_eq!(state.describe(), "shift+cmd");
        assert_eq!(ModifierState::from_cg_flags(0x0008_0000).describe(), "alt");
        assert_eq!(ModifierState::from_cg_flags(0).describe(), "none");
    }

    #[test]
    fn evdev_held_keys_decode() {
        let held = [97u16, 30, 54];
        assert_eq!(ModifierState::from_evdev_held(&held).describe(), "shift+ctrl");
        assert_eq!(ModifierState::from_evdev_held(&[125u16]).describe(), "cmd");
    }
}
