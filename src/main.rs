//! Keyboard Timing - record key transitions with high-resolution timestamps
//!
//! Captures until Ctrl+C (or the configured stop key), then writes the
//! recording and prints a timing summary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use keyboard_timing::{
    analysis::TimingSummary,
    config::{Backend, Config},
    keyboard::{CaptureAdapter, InstantClock, PollListener},
    report::OutputFormat,
    Session,
};

#[cfg(target_os = "linux")]
use keyboard_timing::keyboard::{evdev_status, EvdevListener};

#[derive(Parser)]
#[command(name = "keyboard-timing")]
#[command(about = "Record keyboard events with monotonic and OS timestamps")]
#[command(version)]
struct Cli {
    /// Output file (.csv or .json); defaults to the configured output directory
    output: Option<PathBuf>,
    /// Maximum number of events to keep
    #[arg(long)]
    capacity: Option<usize>,
    /// Key code (decimal or 0x-prefixed hex) whose key-down stops recording
    #[arg(long, value_parser = parse_key_code)]
    stop_key: Option<i32>,
    /// Treat a key-down of an already held key as a repeat
    #[arg(long)]
    infer_repeats: bool,
    /// Capture backend: auto, evdev or poll
    #[arg(long)]
    backend: Option<Backend>,
    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log every recorded event
    #[arg(short, long)]
    verbose: bool,
}

fn parse_key_code(s: &str) -> Result<i32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid key code '{}': {}", s, e))
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            log::warn!("Using default config: {}", e);
            Config::default()
        }),
    };

    if let Some(capacity) = cli.capacity {
        config.capture.capacity = capacity;
    }
    if cli.stop_key.is_some() {
        config.capture.stop_key = cli.stop_key;
    }
    if cli.infer_repeats {
        config.capture.infer_repeats = true;
    }
    if let Some(backend) = cli.backend {
        config.capture.backend = backend;
    }
    Ok(config)
}

#[cfg(target_os = "linux")]
fn open_evdev() -> Result<Box<dyn CaptureAdapter>> {
    let listener = EvdevListener::new()?;
    log::info!("Evdev: {}", evdev_status());
    for path in listener.device_paths() {
        log::debug!("Reading {}", path.display());
    }
    Ok(Box::new(listener))
}

#[cfg(not(target_os = "linux"))]
fn open_evdev() -> Result<Box<dyn CaptureAdapter>> {
    Err(keyboard_timing::keyboard::CaptureError::Unsupported("evdev").into())
}

fn open_adapter(backend: Backend) -> Result<Box<dyn CaptureAdapter>> {
    match backend {
        Backend::Poll => Ok(Box::new(PollListener::new())),
        Backend::Evdev => open_evdev(),
        Backend::Auto => match open_evdev() {
            Ok(adapter) => Ok(adapter),
            Err(e) => {
                log::warn!("Evdev unavailable ({}), falling back to polling", e);
                Ok(Box::new(PollListener::new()))
            }
        },
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = load_config(&cli)?;
    let destination = cli.output.clone().unwrap_or_else(|| config.default_output_path());
    let format = OutputFormat::from_path(&destination).unwrap_or(config.output.format);

    let mut adapter = open_adapter(config.capture.backend)?;
    let mut session = Session::new(
        config.session_config(adapter.code_set(), adapter.mode()),
        Box::new(InstantClock::new()),
    )?;
    log::info!(
        "Recording with {} ({} mode, {} key codes)",
        adapter.name(),
        adapter.mode(),
        adapter.code_set().name()
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("installing Ctrl+C handler")?;

    eprintln!("Recording keyboard events. Press Ctrl+C to stop.");
    let interval = config.poll_interval();
    while running.load(Ordering::SeqCst) && !session.is_stopped() {
        adapter.poll(&mut session);
        thread::sleep(interval);
    }
    session.request_stop();

    session
        .write_report(&destination, format)
        .with_context(|| format!("writing recording to {}", destination.display()))?;

    let stats = session.stats();
    eprintln!("\nKeyboard timing session complete.");
    eprintln!("Events recorded: {} (capacity {})", stats.recorded, stats.capacity);
    if stats.dropped > 0 {
        eprintln!("Events dropped: {}", stats.dropped);
    }
    eprintln!("{}", TimingSummary::from_events(session.events()));
    eprintln!("Saved to {}", destination.display());

    Ok(())
}
