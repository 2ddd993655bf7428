//! Recording export and import
//!
//! The primary artifact is a CSV-like text file:
//!
//! ```text
//! # platform=Linux-x86_64
//! # language=rust
//! # mode=terminal
//! # clock_source=std::time::Instant
//! # start_time_utc=2024-05-01T12:00:00.000000Z
//! seq,timestamp_ms,event_timestamp_ms,event_type,keycode,scancode,character,modifiers,is_repeat
//! 1,105.250,1714564800105.000,key_down,30,30,a,none,0
//! ```
//!
//! A recording can also be exported as JSON, and a CSV artifact can be
//! parsed back into a [`Recording`].

use crate::keyboard::{CaptureMode, KeyEvent, KeyEventKind};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Column header line of the CSV artifact
pub const COLUMNS: &str =
    "seq,timestamp_ms,event_timestamp_ms,event_type,keycode,scancode,character,modifiers,is_repeat";

const START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Failure to persist or load a recording
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Malformed recording text
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("missing header field '{0}'")]
    MissingHeader(&'static str),
    #[error("line {line}: invalid header: {message}")]
    BadHeader { line: usize, message: String },
    #[error("missing or unexpected column header")]
    ColumnMismatch,
    #[error("line {line}: {message}")]
    Row { line: usize, message: String },
}

/// Output format of a recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(Self::Csv)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }
}

/// Header metadata of a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Operating system and architecture, e.g. `Linux-x86_64`
    pub platform: String,
    /// Implementation language of the recorder
    pub language: String,
    /// How events were captured
    pub mode: CaptureMode,
    /// Description of the monotonic clock
    pub clock_source: String,
    /// Wall-clock session start
    pub start_time_utc: DateTime<Utc>,
}

impl ReportMetadata {
    pub fn new(
        platform: impl Into<String>,
        mode: CaptureMode,
        clock_source: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            language: "rust".to_string(),
            mode,
            clock_source: clock_source.into(),
            // stored at the precision the header carries
            start_time_utc: Utc::now().trunc_subsecs(6),
        }
    }

    fn header_fields(&self) -> [(&'static str, String); 5] {
        [
            ("platform", self.platform.clone()),
            ("language", self.language.clone()),
            ("mode", self.mode.to_string()),
            ("clock_source", self.clock_source.clone()),
            ("start_time_utc", format_start_time(&self.start_time_utc)),
        ]
    }
}

/// Identifier of the running platform, e.g. `macOS-aarch64`
pub fn platform_identifier() -> String {
    let os = match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        other => other,
    };
    format!("{}-{}", os, std::env::consts::ARCH)
}

/// ISO-8601 UTC with six fractional digits and a `Z` suffix
pub fn format_start_time(time: &DateTime<Utc>) -> String {
    time.format(START_TIME_FORMAT).to_string()
}

/// A recording loaded back from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub metadata: ReportMetadata,
    pub events: Vec<KeyEvent>,
}

#[derive(Serialize)]
struct JsonRecording<'a> {
    metadata: &'a ReportMetadata,
    events: &'a [KeyEvent],
}

/// Format one event as a data row (without the trailing newline)
pub fn format_row(event: &KeyEvent) -> String {
    format!(
        "{},{:.3},{:.3},{},{},{},{},{},{}",
        event.sequence,
        event.capture_timestamp_ms,
        event.source_timestamp_ms,
        event.kind,
        event.key_code,
        event.scan_code,
        event.symbol,
        event.modifiers,
        u8::from(event.is_repeat),
    )
}

/// Write the CSV artifact to any writer
pub fn write_to<W: Write>(
    metadata: &ReportMetadata,
    events: &[KeyEvent],
    writer: &mut W,
) -> io::Result<()> {
    for (key, value) in metadata.header_fields() {
        writeln!(writer, "# {}={}", key, value)?;
    }
    writeln!(writer, "{}", COLUMNS)?;
    for event in events {
        writeln!(writer, "{}", format_row(event))?;
    }
    Ok(())
}

/// Render the CSV artifact as a string
pub fn to_csv_string(metadata: &ReportMetadata, events: &[KeyEvent]) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail
    let _ = write_to(metadata, events, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Render the recording as pretty-printed JSON
pub fn to_json(
    metadata: &ReportMetadata,
    events: &[KeyEvent],
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonRecording { metadata, events })
}

/// Write a recording to `destination`, creating parent directories as needed
pub fn write(
    metadata: &ReportMetadata,
    events: &[KeyEvent],
    destination: &Path,
    format: OutputFormat,
) -> Result<(), ReportError> {
    let io_err = |source: io::Error| ReportError::Io {
        path: destination.to_path_buf(),
        source,
    };

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file = File::create(destination).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    match format {
        OutputFormat::Csv => write_to(metadata, events, &mut writer).map_err(io_err)?,
        OutputFormat::Json => {
            let json = to_json(metadata, events)?;
            writer.write_all(json.as_bytes()).map_err(io_err)?;
            writer.write_all(b"\n").map_err(io_err)?;
        }
    }
    writer.flush().map_err(io_err)
}

/// Load a recording from disk; JSON files are detected by extension
pub fn read(path: &Path) -> Result<Recording, ReportError> {
    let text = fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    match OutputFormat::from_path(path) {
        Some(OutputFormat::Json) => Ok(serde_json::from_str(&text)?),
        _ => Ok(parse(&text)?),
    }
}

/// Parse CSV artifact text
///
/// Timestamps are written with three decimals, so parsed events match the
/// recorded ones to within 1 µs.
pub fn parse(text: &str) -> Result<Recording, ParseError> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

    let mut platform = None;
    let mut language = None;
    let mut mode = None;
    let mut clock_source = None;
    let mut start_time_utc = None;
    let mut saw_columns = false;

    for (line_no, line) in lines.by_ref() {
        let Some(header) = line.strip_prefix("# ") else {
            if line.trim_end() == COLUMNS {
                saw_columns = true;
                break;
            }
            return Err(ParseError::ColumnMismatch);
        };
        let (key, value) = header.split_once('=').ok_or_else(|| ParseError::BadHeader {
            line: line_no,
            message: "expected key=value".to_string(),
        })?;
        let bad = |message: String| ParseError::BadHeader {
            line: line_no,
            message,
        };
        match key {
            "platform" => platform = Some(value.to_string()),
            "language" => language = Some(value.to_string()),
            "mode" => mode = Some(value.parse::<CaptureMode>().map_err(bad)?),
            "clock_source" => clock_source = Some(value.to_string()),
            "start_time_utc" => {
                let parsed = DateTime::parse_from_rfc3339(value)
                    .map_err(|e| bad(format!("start_time_utc: {}", e)))?;
                start_time_utc = Some(parsed.with_timezone(&Utc));
            }
            // Unknown keys are tolerated for forward compatibility
            _ => {}
        }
    }

    if !saw_columns {
        return Err(ParseError::ColumnMismatch);
    }

    let metadata = ReportMetadata {
        platform: platform.ok_or(ParseError::MissingHeader("platform"))?,
        language: language.ok_or(ParseError::MissingHeader("language"))?,
        mode: mode.ok_or(ParseError::MissingHeader("mode"))?,
        clock_source: clock_source.ok_or(ParseError::MissingHeader("clock_source"))?,
        start_time_utc: start_time_utc.ok_or(ParseError::MissingHeader("start_time_utc"))?,
    };

    let mut events = Vec::new();
    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        events.push(parse_row(line).map_err(|message| ParseError::Row {
            line: line_no,
            message,
        })?);
    }

    Ok(Recording { metadata, events })
}

fn parse_row(line: &str) -> Result<KeyEvent, String> {
    let fields: Vec<&str> = line.split(',').collect();
    let [seq, ts, ets, kind, key_code, scan_code, symbol, modifiers, repeat] = fields[..] else {
        return Err(format!("expected 9 fields, found {}", fields.len()));
    };

    fn num<T: FromStr>(name: &str, value: &str) -> Result<T, String> {
        value
            .parse()
            .map_err(|_| format!("invalid {} '{}'", name, value))
    }

    Ok(KeyEvent {
        sequence: num("seq", seq)?,
        capture_timestamp_ms: num("timestamp_ms", ts)?,
        source_timestamp_ms: num("event_timestamp_ms", ets)?,
        kind: KeyEventKind::from_str(kind)?,
        key_code: num("keycode", key_code)?,
        scan_code: num("scancode", scan_code)?,
        symbol: symbol.to_string(),
        modifiers: modifiers.to_string(),
        is_repeat: match repeat {
            "0" => false,
            "1" => true,
            other => return Err(format!("invalid is_repeat '{}'", other)),
        },
    })
}
