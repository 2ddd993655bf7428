//! Key symbol resolution
//!
//! Raw key codes are turned into a short symbol in three steps:
//!
//! 1. layout-aware translation from the live [`LayoutSnapshot`], accepted
//!    only when it yields exactly one printable ASCII character
//! 2. the named-key table of the active [`KeyCodeSet`]
//! 3. a hexadecimal fallback (`vk_0x1b`), so every input has a symbol
//!
//! Symbols never contain the report's field separator or whitespace: space
//! and comma are always reported by name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Numbering scheme of the raw key codes an adapter delivers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCodeSet {
    /// Windows virtual-key codes (`VK_*`)
    WindowsVirtualKey,
    /// macOS virtual keycodes (`kVK_*`)
    MacVirtualKey,
    /// Linux input event codes (`KEY_*`)
    #[default]
    LinuxEvdev,
}

impl KeyCodeSet {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WindowsVirtualKey => "windows-vk",
            Self::MacVirtualKey => "macos-vk",
            Self::LinuxEvdev => "linux-evdev",
        }
    }

    /// Key-code set native to the platform this binary was built for
    pub fn native() -> Self {
        if cfg!(target_os = "windows") {
            Self::WindowsVirtualKey
        } else if cfg!(target_os = "macos") {
            Self::MacVirtualKey
        } else {
            Self::LinuxEvdev
        }
    }

    fn tables(&self) -> &'static KeyTables {
        match self {
            Self::WindowsVirtualKey => &WINDOWS_TABLES,
            Self::MacVirtualKey => &MAC_TABLES,
            Self::LinuxEvdev => &EVDEV_TABLES,
        }
    }
}

/// Keyboard layout state captured alongside an event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayoutSnapshot {
    /// No layout information; resolution starts at the named table
    #[default]
    Unavailable,
    /// Output of the platform's own translation (`ToUnicode`, `UCKeyTranslate`)
    Translated(String),
    /// Built-in US ANSI layout with the given shift and caps lock state
    UsAnsi { shift: bool, caps_lock: bool },
}

/// Named and printable tables for one key-code set
struct KeyTables {
    named: HashMap<i32, &'static str>,
    /// (unshifted, shifted) characters on a US ANSI layout
    us_ansi: HashMap<i32, (char, char)>,
}

impl KeyTables {
    fn build(named: &[(i32, &'static str)], us_ansi: &[(i32, char, char)]) -> Self {
        Self {
            named: named.iter().copied().collect(),
            us_ansi: us_ansi
                .iter()
                .map(|&(code, plain, shifted)| (code, (plain, shifted)))
                .collect(),
        }
    }
}

static WINDOWS_TABLES: LazyLock<KeyTables> = LazyLock::new(|| {
    let mut named: Vec<(i32, &'static str)> = vec![
        (0x08, "backspace"),
        (0x09, "tab"),
        (0x0D, "return"),
        (0x10, "shift"),
        (0x11, "ctrl"),
        (0x12, "alt"),
        (0x13, "pause"),
        (0x14, "capslock"),
        (0x1B, "escape"),
        (0x20, "space"),
        (0x21, "pageup"),
        (0x22, "pagedown"),
        (0x23, "end"),
        (0x24, "home"),
        (0x25, "left"),
        (0x26, "up"),
        (0x27, "right"),
        (0x28, "down"),
        (0x2C, "printscreen"),
        (0x2D, "insert"),
        (0x2E, "delete"),
        (0x5B, "win_l"),
        (0x5C, "win_r"),
        (0x5D, "menu"),
        (0x6A, "kp_multiply"),
        (0x6B, "kp_add"),
        (0x6D, "kp_subtract"),
        (0x6E, "kp_decimal"),
        (0x6F, "kp_divide"),
        (0x90, "numlock"),
        (0x91, "scrolllock"),
        (0xA0, "shift_l"),
        (0xA1, "shift_r"),
        (0xA2, "ctrl_l"),
        (0xA3, "ctrl_r"),
        (0xA4, "alt_l"),
        (0xA5, "alt_r"),
        (0xBC, "comma"),
    ];
    named.extend((0..10).map(|n| (0x60 + n, KEYPAD_DIGITS[n as usize])));
    named.extend((0..24).map(|n| (0x70 + n, FUNCTION_KEYS[n as usize])));

    let mut us_ansi: Vec<(i32, char, char)> = vec![
        (0xBA, ';', ':'),
        (0xBB, '=', '+'),
        (0xBC, ',', '<'),
        (0xBD, '-', '_'),
        (0xBE, '.', '>'),
        (0xBF, '/', '?'),
        (0xC0, '`', '~'),
        (0xDB, '[', '{'),
        (0xDC, '\\', '|'),
        (0xDD, ']', '}'),
        (0xDE, '\'', '"'),
    ];
    us_ansi.extend(
        "0123456789"
            .chars()
            .zip(")!@#$%^&*(".chars())
            .enumerate()
            .map(|(i, (plain, shifted))| (0x30 + i as i32, plain, shifted)),
    );
    us_ansi.extend(
        ('a'..='z')
            .enumerate()
            .map(|(i, c)| (0x41 + i as i32, c, c.to_ascii_uppercase())),
    );

    KeyTables::build(&named, &us_ansi)
});

static MAC_TABLES: LazyLock<KeyTables> = LazyLock::new(|| {
    let named: &[(i32, &'static str)] = &[
        (0x24, "return"),
        (0x30, "tab"),
        (0x31, "space"),
        (0x33, "backspace"),
        (0x35, "escape"),
        (0x36, "cmd_r"),
        (0x37, "cmd_l"),
        (0x38, "shift_l"),
        (0x39, "capslock"),
        (0x3A, "alt_l"),
        (0x3B, "ctrl_l"),
        (0x3C, "shift_r"),
        (0x3D, "alt_r"),
        (0x3E, "ctrl_r"),
        (0x3F, "fn"),
        (0x2B, "comma"),
        (0x41, "kp_decimal"),
        (0x43, "kp_multiply"),
        (0x45, "kp_add"),
        (0x47, "kp_clear"),
        (0x4B, "kp_divide"),
        (0x4C, "kp_enter"),
        (0x4E, "kp_subtract"),
        (0x51, "kp_equals"),
        (0x52, "kp_0"),
        (0x53, "kp_1"),
        (0x54, "kp_2"),
        (0x55, "kp_3"),
        (0x56, "kp_4"),
        (0x57, "kp_5"),
        (0x58, "kp_6"),
        (0x59, "kp_7"),
        (0x5B, "kp_8"),
        (0x5C, "kp_9"),
        (0x7A, "f1"),
        (0x78, "f2"),
        (0x63, "f3"),
        (0x76, "f4"),
        (0x60, "f5"),
        (0x61, "f6"),
        (0x62, "f7"),
        (0x64, "f8"),
        (0x65, "f9"),
        (0x6D, "f10"),
        (0x67, "f11"),
        (0x6F, "f12"),
        (0x69, "f13"),
        (0x6B, "f14"),
        (0x71, "f15"),
        (0x6A, "f16"),
        (0x40, "f17"),
        (0x72, "help"),
        (0x73, "home"),
        (0x74, "pageup"),
        (0x75, "delete"),
        (0x77, "end"),
        (0x79, "pagedown"),
        (0x7B, "left"),
        (0x7C, "right"),
        (0x7D, "down"),
        (0x7E, "up"),
    ];

    // kVK_ANSI_* positions are not alphabetical
    let us_ansi: &[(i32, char, char)] = &[
        (0x00, 'a', 'A'),
        (0x01, 's', 'S'),
        (0x02, 'd', 'D'),
        (0x03, 'f', 'F'),
        (0x04, 'h', 'H'),
        (0x05, 'g', 'G'),
        (0x06, 'z', 'Z'),
        (0x07, 'x', 'X'),
        (0x08, 'c', 'C'),
        (0x09, 'v', 'V'),
        (0x0B, 'b', 'B'),
        (0x0C, 'q', 'Q'),
        (0x0D, 'w', 'W'),
        (0x0E, 'e', 'E'),
        (0x0F, 'r', 'R'),
        (0x10, 'y', 'Y'),
        (0x11, 't', 'T'),
        (0x12, '1', '!'),
        (0x13, '2', '@'),
        (0x14, '3', '#'),
        (0x15, '4', '$'),
        (0x16, '6', '^'),
        (0x17, '5', '%'),
        (0x18, '=', '+'),
        (0x19, '9', '('),
        (0x1A, '7', '&'),
        (0x1B, '-', '_'),
        (0x1C, '8', '*'),
        (0x1D, '0', ')'),
        (0x1E, ']', '}'),
        (0x1F, 'o', 'O'),
        (0x20, 'u', 'U'),
        (0x21, '[', '{'),
        (0x22, 'i', 'I'),
        (0x23, 'p', 'P'),
        (0x25, 'l', 'L'),
        (0x26, 'j', 'J'),
        (0x27, '\'', '"'),
        (0x28, 'k', 'K'),
        (0x29, ';', ':'),
        (0x2A, '\\', '|'),
        (0x2B, ',', '<'),
        (0x2C, '/', '?'),
        (0x2D, 'n', 'N'),
        (0x2E, 'm', 'M'),
        (0x2F, '.', '>'),
        (0x32, '`', '~'),
    ];

    KeyTables::build(named, us_ansi)
});

static EVDEV_TABLES: LazyLock<KeyTables> = LazyLock::new(|| {
    let mut named: Vec<(i32, &'static str)> = vec![
        (1, "escape"),
        (14, "backspace"),
        (15, "tab"),
        (28, "return"),
        (29, "ctrl_l"),
        (42, "shift_l"),
        (51, "comma"),
        (54, "shift_r"),
        (55, "kp_multiply"),
        (56, "alt_l"),
        (57, "space"),
        (58, "capslock"),
        (69, "numlock"),
        (70, "scrolllock"),
        (71, "kp_7"),
        (72, "kp_8"),
        (73, "kp_9"),
        (74, "kp_subtract"),
        (75, "kp_4"),
        (76, "kp_5"),
        (77, "kp_6"),
        (78, "kp_add"),
        (79, "kp_1"),
        (80, "kp_2"),
        (81, "kp_3"),
        (82, "kp_0"),
        (83, "kp_decimal"),
        (87, "f11"),
        (88, "f12"),
        (96, "kp_enter"),
        (97, "ctrl_r"),
        (98, "kp_divide"),
        (99, "printscreen"),
        (100, "alt_r"),
        (102, "home"),
        (103, "up"),
        (104, "pageup"),
        (105, "left"),
        (106, "right"),
        (107, "end"),
        (108, "down"),
        (109, "pagedown"),
        (110, "insert"),
        (111, "delete"),
        (119, "pause"),
        (125, "meta_l"),
        (126, "meta_r"),
        (127, "menu"),
    ];
    // KEY_F1..KEY_F10 are contiguous
    named.extend((0..10).map(|n| (59 + n, FUNCTION_KEYS[n as usize])));

    let mut us_ansi: Vec<(i32, char, char)> = vec![
        (12, '-', '_'),
        (13, '=', '+'),
        (26, '[', '{'),
        (27, ']', '}'),
        (39, ';', ':'),
        (40, '\'', '"'),
        (41, '`', '~'),
        (43, '\\', '|'),
        (51, ',', '<'),
        (52, '.', '>'),
        (53, '/', '?'),
    ];
    us_ansi.extend(
        "1234567890"
            .chars()
            .zip("!@#$%^&*()".chars())
            .enumerate()
            .map(|(i, (plain, shifted))| (2 + i as i32, plain, shifted)),
    );
    for (start, row) in [(16, "qwertyuiop"), (30, "asdfghjkl"), (44, "zxcvbnm")] {
        us_ansi.extend(
            row.chars()
                .enumerate()
                .map(|(i, c)| (start + i as i32, c, c.to_ascii_uppercase())),
        );
    }

    KeyTables::build(&named, &us_ansi)
});

const KEYPAD_DIGITS: [&str; 10] = [
    "kp_0", "kp_1", "kp_2", "kp_3", "kp_4", "kp_5", "kp_6", "kp_7", "kp_8", "kp_9",
];

const FUNCTION_KEYS: [&str; 24] = [
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "f13", "f14",
    "f15", "f16", "f17", "f18", "f19", "f20", "f21", "f22", "f23", "f24",
];

/// Resolves raw key codes of one key-code set to symbols
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySymbolResolver {
    code_set: KeyCodeSet,
}

impl KeySymbolResolver {
    pub fn new(code_set: KeyCodeSet) -> Self {
        // Build the tables now rather than on the first event
        LazyLock::force(match code_set {
            KeyCodeSet::WindowsVirtualKey => &WINDOWS_TABLES,
            KeyCodeSet::MacVirtualKey => &MAC_TABLES,
            KeyCodeSet::LinuxEvdev => &EVDEV_TABLES,
        });
        Self { code_set }
    }

    pub fn code_set(&self) -> KeyCodeSet {
        self.code_set
    }

    /// Produce a symbol for the key. Never fails.
    pub fn resolve(&self, key_code: i32, scan_code: i32, layout: &LayoutSnapshot) -> String {
        if let Some(c) = self.translate(key_code, scan_code, layout) {
            return c.to_string();
        }
        if let Some(name) = self.named(key_code) {
            return name.to_string();
        }
        hex_symbol(key_code)
    }

    /// Canonical name for a non-printable key, if the table has one
    pub fn named(&self, key_code: i32) -> Option<&'static str> {
        self.code_set.tables().named.get(&key_code).copied()
    }

    fn translate(&self, key_code: i32, _scan_code: i32, layout: &LayoutSnapshot) -> Option<char> {
        let c = match layout {
            LayoutSnapshot::Unavailable => return None,
            LayoutSnapshot::Translated(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => return None,
                }
            }
            LayoutSnapshot::UsAnsi { shift, caps_lock } => {
                let &(plain, shifted) = self.code_set.tables().us_ansi.get(&key_code)?;
                let upper = if plain.is_ascii_alphabetic() {
                    *shift != *caps_lock
                } else {
                    *shift
                };
                if upper {
                    shifted
                } else {
                    plain
                }
            }
        };
        is_field_safe_printable(c).then_some(c)
    }
}

/// Printable ASCII (32..=126) minus the characters reported by name
fn is_field_safe_printable(c: char) -> bool {
    matches!(c as u32, 32..=126) && c != ' ' && c != ','
}

/// Terminal fallback symbol, e.g. `vk_0x1b`
pub fn hex_symbol(key_code: i32) -> String {
    format!("vk_0x{:02x}", key_code)
}

/// Resolve with a one-off resolver for the given key-code set
pub fn resolve(
    code_set: KeyCodeSet,
    key_code: i32,
    scan_code: i32,
    layout: &LayoutSnapshot,
) -> String {
    KeySymbolResolver::new(code_set).resolve(key_code, scan_code, layout)
}
