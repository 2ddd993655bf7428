//! Integration tests for the keyboard timing recorder
//!
//! These drive a full session with synthetic raw events on a manual clock,
//! write the recording to disk and read it back.

use keyboard_timing::analysis::TimingSummary;
use keyboard_timing::config::{Backend, Config};
use keyboard_timing::keyboard::{
    Disposition, KeyCodeSet, KeyEventKind, LayoutSnapshot, ModifierState, RawKeyEvent,
    RepeatHint, SourceTimestamp,
};
use keyboard_timing::report::{self, OutputFormat, ReportError};
use keyboard_timing::test_helpers::{manual_session, press, release, tap, type_keys};
use keyboard_timing::SessionConfig;
use std::fs;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const KEY_A: i32 = 30;
const KEY_ESC: i32 = 1;

fn evdev_config() -> SessionConfig {
    SessionConfig {
        code_set: KeyCodeSet::LinuxEvdev,
        platform: "Linux-x86_64".to_string(),
        ..SessionConfig::default()
    }
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "keyboard-timing-{}-{}",
        std::process::id(),
        name
    ))
}

fn us_layout(shift: bool) -> LayoutSnapshot {
    LayoutSnapshot::UsAnsi {
        shift,
        caps_lock: false,
    }
}

/// Data rows of a written CSV artifact with the timestamp columns removed
fn rows_without_times(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.starts_with('#'))
        .skip(1)
        .map(|l| {
            let fields: Vec<&str> = l.split(',').collect();
            let mut kept = vec![fields[0]];
            kept.extend_from_slice(&fields[3..]);
            kept.join(",")
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

#[test]
fn events_within_capacity_are_kept_in_order() {
    let (clock, mut session) = manual_session(evdev_config()).unwrap();
    let keys: Vec<i32> = (16..26).collect();
    type_keys(&mut session, &clock, &keys, 20, 30);

    let events = session.events();
    assert_eq!(events.len(), 20);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.sequence, i as u64 + 1);
        assert_eq!(event.key_code, keys[i / 2]);
    }
}

#[test]
fn overflow_keeps_first_events_untouched() {
    let (clock, mut session) = manual_session(SessionConfig {
        capacity: 5,
        ..evdev_config()
    })
    .unwrap();

    let mut dispositions = Vec::new();
    for key in 16..24 {
        dispositions.push(session.deliver_raw_event(press(key)));
        clock.advance_us(500);
    }

    assert_eq!(dispositions[4], Disposition::Accepted(5));
    assert!(dispositions[5..].iter().all(|d| *d == Disposition::Dropped));

    let codes: Vec<i32> = session.events().iter().map(|e| e.key_code).collect();
    assert_eq!(codes, vec![16, 17, 18, 19, 20]);
    assert_eq!(session.stats().dropped, 3);
    assert_eq!(session.events()[4].capture_timestamp_ms, 2.0);
}

#[test]
fn capture_timestamps_never_decrease() {
    let (clock, mut session) = manual_session(evdev_config()).unwrap();
    for step in [0, 3, 0, 1, 250, 0, 17] {
        clock.advance_us(step);
        session.deliver_raw_event(press(KEY_A));
        session.deliver_raw_event(release(KEY_A));
    }

    let times: Vec<f64> = session
        .events()
        .iter()
        .map(|e| e.capture_timestamp_ms)
        .collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn full_log_of_kernel_stamps_summarizes_without_overflow() {
    let (clock, mut session) = manual_session(evdev_config()).unwrap();
    for n in 0..100_000i64 {
        let raw = if n % 2 == 0 { press(KEY_A) } else { release(KEY_A) };
        session.deliver_raw_event(raw.with_source_timestamp(SourceTimestamp::Timeval {
            secs: 1_700_000_000 + n / 1000,
            micros: (n % 1000) * 1000,
        }));
        clock.advance_ms(1);
    }
    assert_eq!(session.stats().recorded, 100_000);

    let summary = TimingSummary::from_events(session.events());
    assert_eq!(summary.clock_offset.count, 100_000);
    assert_eq!(summary.clock_offset_spread_ms(), Some(0.0));
    assert_eq!(summary.clock_offset.mean_ms(), Some(1_700_000_000_000.0));
}

#[test]
fn stop_key_then_ignored_events() {
    let (clock, mut session) = manual_session(SessionConfig {
        stop_key: Some(KEY_ESC),
        ..evdev_config()
    })
    .unwrap();

    tap(&mut session, &clock, KEY_A, 10);
    assert_eq!(
        session.deliver_raw_event(press(KEY_ESC)),
        Disposition::StopRequested
    );
    tap(&mut session, &clock, KEY_A, 10);

    assert_eq!(session.events().len(), 2);
    assert!(session.events().iter().all(|e| e.key_code == KEY_A));
}

// ---------------------------------------------------------------------------
// Report files
// ---------------------------------------------------------------------------

#[test]
fn written_rows_match_classified_events() {
    let (clock, mut session) = manual_session(evdev_config()).unwrap();

    clock.advance_ms(5);
    session.deliver_raw_event(
        press(KEY_A)
            .with_layout(us_layout(false))
            .with_source_timestamp(SourceTimestamp::Timeval {
                secs: 1_700_000_000,
                micros: 100,
            }),
    );
    clock.advance_ms(120);
    session.deliver_raw_event(
        press(KEY_ESC)
            .with_layout(us_layout(true))
            .with_modifiers(ModifierState::shift()),
    );
    clock.advance_ms(60);
    session.deliver_raw_event(release(KEY_ESC).with_layout(us_layout(false)));

    let path = temp_path("roundtrip.csv");
    session.write_report(&path, OutputFormat::Csv).unwrap();
    let text = fs::read_to_string(&path).unwrap();

    assert_eq!(
        rows_without_times(&text),
        vec![
            "1,key_down,30,30,a,none,0",
            "2,key_down,1,1,escape,shift,0",
            "3,key_up,1,1,escape,none,0",
        ]
    );

    let data: Vec<&str> = text.lines().filter(|l| l.starts_with(char::is_numeric)).collect();
    assert!(data[0].starts_with("1,5.000,1700000000000.100,"));
    assert!(data[1].starts_with("2,125.000,0.000,"));
    assert!(data[2].starts_with("3,185.000,0.000,"));

    let recording = report::read(&path).unwrap();
    assert_eq!(recording.events, session.events());
    assert_eq!(&recording.metadata, session.metadata());

    let _ = fs::remove_file(&path);
}

#[test]
fn sub_microsecond_times_round_trip_to_one_us() {
    let (clock, mut session) = manual_session(evdev_config()).unwrap();

    clock.advance_ns(1_234_567);
    session.deliver_raw_event(press(KEY_A));
    clock.advance_ns(87_654_321);
    session.deliver_raw_event(release(KEY_A));
    clock.advance_ns(999_999);
    session.deliver_raw_event(press(KEY_ESC));

    let path = temp_path("subms.csv");
    session.write_report(&path, OutputFormat::Csv).unwrap();
    let recording = report::read(&path).unwrap();

    assert_eq!(recording.events.len(), 3);
    for (parsed, live) in recording.events.iter().zip(session.events()) {
        assert_eq!(parsed.sequence, live.sequence);
        assert_eq!(parsed.kind, live.kind);
        assert_eq!(parsed.key_code, live.key_code);
        assert_eq!(parsed.scan_code, live.scan_code);
        assert_eq!(parsed.symbol, live.symbol);
        assert_eq!(parsed.modifiers, live.modifiers);
        assert_eq!(parsed.is_repeat, live.is_repeat);
        assert!((parsed.capture_timestamp_ms - live.capture_timestamp_ms).abs() <= 0.0005);
    }

    let _ = fs::remove_file(&path);
}

#[test]
fn header_lines_describe_session() {
    let (_clock, mut session) = manual_session(evdev_config()).unwrap();
    session.deliver_raw_event(press(KEY_A));

    let path = temp_path("header.csv");
    session.write_report(&path, OutputFormat::Csv).unwrap();
    let text = fs::read_to_string(&path).unwrap();

    let header: Vec<&str> = text.lines().take_while(|l| l.starts_with('#')).collect();
    assert_eq!(header.len(), 5);
    assert!(header.iter().all(|l| l.starts_with("# ")));
    assert_eq!(header[0], "# platform=Linux-x86_64");
    assert_eq!(header[1], "# language=rust");
    assert_eq!(header[2], "# mode=terminal");
    assert_eq!(header[3], "# clock_source=manual");

    let start = header[4].strip_prefix("# start_time_utc=").unwrap();
    assert!(start.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(start).is_ok());
    assert_eq!(text.lines().nth(5), Some(report::COLUMNS));

    let _ = fs::remove_file(&path);
}

#[test]
fn failed_write_keeps_log_and_allows_retry() {
    let (clock, mut session) = manual_session(evdev_config()).unwrap();
    type_keys(&mut session, &clock, &[30, 31], 15, 15);
    let before = session.events().to_vec();

    // A regular file where a directory is needed
    let blocker = temp_path("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let bad = blocker.join("nested").join("out.csv");

    match session.write_report(&bad, OutputFormat::Csv) {
        Err(ReportError::Io { path, .. }) => assert!(path.starts_with(&blocker)),
        other => panic!("expected an I/O error, got {:?}", other),
    }
    assert!(session.is_stopped());
    assert_eq!(session.events(), &before[..]);

    let good = temp_path("retry").join("out.csv");
    session.write_report(&good, OutputFormat::Csv).unwrap();
    assert_eq!(report::read(&good).unwrap().events, before);

    let _ = fs::remove_file(&blocker);
    let _ = fs::remove_dir_all(temp_path("retry"));
}

#[test]
fn json_export_contains_every_event() {
    let (clock, mut session) = manual_session(evdev_config()).unwrap();
    type_keys(&mut session, &clock, &[30, 48, 46], 40, 10);

    let path = temp_path("export.json");
    session.write_report(&path, OutputFormat::Json).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["metadata"]["language"], "rust");
    assert_eq!(value["events"].as_array().map(|a| a.len()), Some(6));
    assert_eq!(value["events"][0]["kind"], "key_down");

    let recording = report::read(&path).unwrap();
    assert_eq!(recording.events, session.events());

    let _ = fs::remove_file(&path);
}

// ---------------------------------------------------------------------------
// Platform shapes
// ---------------------------------------------------------------------------

#[test]
fn mac_modifier_transitions_become_down_and_up() {
    let (clock, mut session) = manual_session(SessionConfig {
        code_set: KeyCodeSet::MacVirtualKey,
        ..SessionConfig::default()
    })
    .unwrap();

    // kVK_Command
    session.deliver_raw_event(
        RawKeyEvent::flags_changed(0x37)
            .with_modifiers(ModifierState::from_cg_flags(0x100000))
            .with_source_timestamp(SourceTimestamp::Nanos(9_000_000_000)),
    );
    clock.advance_ms(90);
    session.deliver_raw_event(RawKeyEvent::flags_changed(0x37));

    let events = session.events();
    assert_eq!(events[0].kind, KeyEventKind::KeyDown);
    assert_eq!(events[0].symbol, "cmd_l");
    assert_eq!(events[0].modifiers, "cmd");
    assert_eq!(events[0].source_timestamp_ms, 9000.0);
    assert_eq!(events[1].kind, KeyEventKind::KeyUp);
    assert_eq!(events[1].modifiers, "none");
}

#[test]
fn windows_translation_and_repeat_flag() {
    let (clock, mut session) = manual_session(SessionConfig {
        code_set: KeyCodeSet::WindowsVirtualKey,
        ..SessionConfig::default()
    })
    .unwrap();

    let key = |repeat: bool| {
        RawKeyEvent::key_down(0x41)
            .with_scan_code(0x1E)
            .with_layout(LayoutSnapshot::Translated("a".into()))
            .with_source_timestamp(SourceTimestamp::TickMillis(1_000))
            .with_repeat(RepeatHint::Reported(repeat))
    };
    session.deliver_raw_event(key(false));
    clock.advance_ms(500);
    session.deliver_raw_event(key(true));
    // comma never leaves the named table
    session.deliver_raw_event(
        RawKeyEvent::key_down(0xBC).with_layout(LayoutSnapshot::Translated(",".into())),
    );

    let events = session.events();
    assert_eq!(events[0].symbol, "a");
    assert!(!events[0].is_repeat);
    assert!(events[1].is_repeat);
    assert_eq!(events[2].symbol, "comma");

    let summary = TimingSummary::from_events(events);
    assert_eq!(summary.key_downs, 3);
    assert_eq!(summary.repeats, 1);
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn config_file_drives_session_settings() {
    let path = temp_path("config.toml");
    let mut config = Config::default();
    config.capture.capacity = 3;
    config.capture.stop_key = Some(KEY_ESC);
    config.capture.backend = Backend::Poll;
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let (clock, mut session) = manual_session(
        loaded.session_config(KeyCodeSet::LinuxEvdev, keyboard_timing::keyboard::CaptureMode::Poll),
    )
    .unwrap();
    type_keys(&mut session, &clock, &[30, 31], 5, 5);
    assert_eq!(session.stats().recorded, 3);
    assert_eq!(session.stats().dropped, 1);
    assert_eq!(session.metadata().mode.as_str(), "poll");

    let _ = fs::remove_file(&path);
}
