//! # Error Types
//!
//! Custom error types for FBus Link using `thiserror`.

use thiserror::Error;

/// Main error type for FBus Link
#[derive(Debug, Error)]
pub enum FbusError {
    /// FBus framing errors (bad header, size or checksum)
    #[error("FBus protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial port could not be opened or used
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate link devices could be opened
    #[error("Link device not found (tried: {0})")]
    DeviceNotFound(String),

    /// Receiver was used before a tokio runtime was available
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for FBus Link
pub type Result<T> = std::result::Result<T, FbusError>;
