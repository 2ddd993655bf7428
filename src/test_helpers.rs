//! Shared test utilities
//!
//! Provides helpers for driving a session with synthetic raw events on a
//! manually advanced clock, and for building recorded events directly.

use crate::keyboard::{KeyEvent, KeyEventKind, ManualClock, RawKeyEvent};
use crate::session::{Session, SessionConfig, SessionError};

/// Default key code used in tests (evdev 30 = 'a')
pub const DEFAULT_KEY: i32 = 30;

/// Creates a session whose clock only moves when the returned handle is advanced.
pub fn manual_session(config: SessionConfig) -> Result<(ManualClock, Session), SessionError> {
    let clock = ManualClock::new();
    let session = Session::new(config, Box::new(clock.clone()))?;
    Ok((clock, session))
}

/// Creates a key-down raw event.
pub fn press(key_code: i32) -> RawKeyEvent {
    RawKeyEvent::key_down(key_code).with_scan_code(key_code)
}

/// Creates a key-up raw event.
pub fn release(key_code: i32) -> RawKeyEvent {
    RawKeyEvent::key_up(key_code).with_scan_code(key_code)
}

/// Presses `key_code`, advances the clock by `hold_ms`, then releases it.
pub fn tap(session: &mut Session, clock: &ManualClock, key_code: i32, hold_ms: u64) {
    session.deliver_raw_event(press(key_code));
    clock.advance_ms(hold_ms);
    session.deliver_raw_event(release(key_code));
}

/// Taps each key in turn, `gap_ms` apart, each held for `hold_ms`.
pub fn type_keys(
    session: &mut Session,
    clock: &ManualClock,
    keys: &[i32],
    hold_ms: u64,
    gap_ms: u64,
) {
    for &key in keys {
        tap(session, clock, key, hold_ms);
        clock.advance_ms(gap_ms);
    }
}

/// Creates a recorded event with full control over the timing fields.
pub fn recorded(
    sequence: u64,
    capture_timestamp_ms: f64,
    kind: KeyEventKind,
    key_code: i32,
    is_repeat: bool,
) -> KeyEvent {
    KeyEvent {
        sequence,
        capture_timestamp_ms,
        source_timestamp_ms: 0.0,
        kind,
        key_code,
        scan_code: key_code,
        symbol: crate::keyboard::keymap::hex_symbol(key_code),
        modifiers: "none".to_string(),
        is_repeat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_records_down_then_up() {
        let (clock, mut session) = manual_session(SessionConfig::default()).unwrap();
        tap(&mut session, &clock, DEFAULT_KEY, 40);

        let events = session.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, KeyEventKind::KeyDown);
        assert_eq!(events[1].kind, KeyEventKind::KeyUp);
        assert_eq!(events[1].capture_timestamp_ms - events[0].capture_timestamp_ms, 40.0);
    }

    #[test]
    fn type_keys_spaces_taps() {
        let (clock, mut session) = manual_session(SessionConfig::default()).unwrap();
        type_keys(&mut session, &clock, &[30, 31, 32], 10, 5);

        let downs: Vec<f64> = session
            .events()
            .iter()
            .filter(|e| e.kind == KeyEventKind::KeyDown)
            .map(|e| e.capture_timestamp_ms)
            .collect();
        assert_eq!(downs, vec![0.0, 15.0, 30.0]);
    }

    #[test]
    fn recorded_uses_hex_symbol() {
        let event = recorded(4, 1.5, KeyEventKind::KeyUp, 0x1ff, false);
        assert_eq!(event.symbol, "vk_0x1ff");
        assert_eq!(event.sequence, 4);
    }
}
