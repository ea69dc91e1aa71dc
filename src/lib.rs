//! Deepcool Rust Display Library
//!
//! A Rust driver for Deepcool liquid-cooler telemetry displays.
//!
//! # Features
//!
//! - Detect and classify display devices by USB product id (LD/CH series)
//! - Encode telemetry and table frames for the two known byte layouts
//! - Select host sensors (CPU/GPU temperature, load, power) heuristically
//! - Drive the periodic sample/encode/write session with clean shutdown
//!
//! # Example
//!
//! ```no_run
//! use deepcool_rust_display::config::ModeConfig;
//! use deepcool_rust_display::device::HidApiTransport;
//! use deepcool_rust_display::sensors::SystemProvider;
//! use deepcool_rust_display::session::TelemetrySession;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HidApiTransport::new()?;
//!     let provider = Box::new(SystemProvider::new());
//!
//!     match TelemetrySession::start(&transport, provider, ModeConfig::default()) {
//!         Some(session) => {
//!             std::thread::sleep(std::time::Duration::from_secs(30));
//!             session.stop();
//!         }
//!         None => println!("No display device connected."),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod sensors;
pub mod session;
pub mod storage;

// Re-exports for convenience
pub use config::ModeConfig;
pub use error::{DisplayError, Result};
pub use protocol::Series;
pub use session::TelemetrySession;
