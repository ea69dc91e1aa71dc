//! Custom error types for Deepcool display devices.
//!
//! This module provides fine-grained error handling for device communication,
//! packet construction, and configuration validation.

use thiserror::Error;

/// Main error type for display driver operations.
#[derive(Error, Debug)]
pub enum DisplayError {
    /// No matching display device during enumeration.
    ///
    /// This is a normal terminal outcome for a session, not a process
    /// failure: the driver simply does not start streaming.
    #[error("No Deepcool display found. Check USB connection and permissions.")]
    DeviceNotFound,

    /// HID communication error.
    #[error("HID communication error: {0}")]
    HidError(#[from] hidapi::HidError),

    /// Transport failure that is not tied to a hidapi error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration value out of valid range or unparseable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Config file could not be serialized or deserialized.
    #[error("Config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while handling the config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic invalid input error.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for display driver operations.
pub type Result<T> = std::result::Result<T, DisplayError>;
