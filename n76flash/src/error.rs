//! Error types for n76flash.

use crate::session::FailureReason;
use std::io;
use thiserror::Error;

/// Result type for n76flash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for n76flash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, firmware file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error (open or configure failure).
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No usable serial device was found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The firmware image cannot be flashed.
    #[error("Invalid firmware image: {0}")]
    InvalidImage(String),

    /// The flash session ended in a failed state.
    #[error("Flash session failed: {0}")]
    Session(FailureReason),

    /// The operation was interrupted by the embedding application.
    #[error("Operation interrupted")]
    Interrupted,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The session failure reason, if this error ended a flash session.
    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Session(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<FailureReason> for Error {
    fn from(reason: FailureReason) -> Self {
        Self::Session(reason)
    }
}
