//! Port abstraction for serial communication.
//!
//! The protocol engine never talks to the OS directly. It drives a `Port`,
//! which keeps byte transfer separate from protocol logic so the engine can
//! run against a real UART or a scripted device in tests.
//!
//! ```text
//! +------------------+
//! |  Session engine  |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |    Transport     |   timeout modes, single-byte reads
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |    Port trait    |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! | NativePort       |
//! |  (serialport)    |
//! +------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

#[cfg(feature = "native")]
pub use native::NativePort;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Baud rate of the N76E003 UART bootloader.
pub const BOOTLOADER_BAUD: u32 = 19200;

/// Serial port configuration.
///
/// Line format is always 8 data bits, no parity, one stop bit and no flow
/// control; only the endpoint, speed and initial timeout vary.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Initial read timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: BOOTLOADER_BAUD,
            timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialConfig {
    /// Create a bootloader configuration for the given port.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte-level serial endpoint used by the transport.
pub trait Port: Read + Write + Send {
    /// Set the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Get the current timeout.
    fn timeout(&self) -> Duration;

    /// Discard any received but unread bytes.
    fn clear_input(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    /// Closing an already closed port is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}
