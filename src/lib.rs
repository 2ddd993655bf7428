//! Keyboard Timing - high-resolution keyboard event recorder
//!
//! Captures key transitions with a monotonic timestamp and, where the OS
//! provides one, its own event timestamp, and writes the session to a
//! self-describing CSV file for latency and timing analysis.

pub mod analysis;
pub mod config;
pub mod keyboard;
pub mod report;
pub mod session;
pub mod test_helpers;
pub mod utils;

pub use config::Config;
pub use session::{Session, SessionConfig};
