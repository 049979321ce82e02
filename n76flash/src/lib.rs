//! # n76flash
//!
//! A library for flashing Nuvoton N76E003 / MS51 microcontrollers through
//! their UART bootloader.
//!
//! This crate provides the protocol engine that talks to the bootloader over
//! a serial port:
//!
//! - Dallas/Maxim CRC8 block checksum
//! - Frame building and response classification
//! - A timeout-mode aware serial transport
//! - The handshake / erase / program / reset session state machine
//!
//! ## Protocol
//!
//! The link runs at 19200 baud, 8N1, without flow control. The host probes
//! with `SOH` until the bootloader answers `ACK`, erases with `SUB DEL`,
//! sends the image in 16-byte `STX ... CRC ETX` frames and finishes with
//! `EOT`, which resets the chip into the new application.
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//!
//! ## Example
//!
//! ```rust,no_run
//! use n76flash::{FirmwareImage, Session, SessionConfig, SessionEvent, Transport};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = FirmwareImage::from_file("firmware.bin")?;
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let port = n76flash::auto_detect_port("ttyUSB")?;
//!         let transport = Transport::open(&port.path.to_string_lossy())?;
//!
//!         let config = SessionConfig::default().with_max_tries(50);
//!         let mut session = Session::new(transport, &image, config);
//!         let report = session.run(|event| {
//!             if let SessionEvent::Block(progress) = event {
//!                 println!("Writing: {}%", progress.percent);
//!             }
//!         })?;
//!         println!("Wrote {} blocks", report.blocks);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod error;
pub mod host;
pub mod image;
pub mod port;
pub mod protocol;
pub mod session;
pub mod transport;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by long-running library loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications). Sessions consult
/// it between blocks and while waiting for a block acknowledgment.
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::native::NativePort;
pub use {
    error::{Error, Result},
    host::{
        DEFAULT_SEARCH_PREFIX, DetectedPort, auto_detect_port, discover_ports, resolve_port_path,
    },
    image::FirmwareImage,
    port::{BOOTLOADER_BAUD, Port, SerialConfig},
    protocol::{BLOCK_SIZE, Frame, Response, crc8},
    session::{
        DEFAULT_MAX_TRIES, FailureReason, Progress, Session, SessionConfig, SessionEvent,
        SessionReport, SessionState,
    },
    transport::{TimeoutMode, Transport},
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_interrupt_checker_toggle() {
        static FLAG: AtomicBool = AtomicBool::new(false);
        set_interrupt_checker(|| FLAG.load(Ordering::Relaxed));

        // Other tests never register a checker, so this one wins the OnceLock
        FLAG.store(true, Ordering::Relaxed);
        assert!(is_interrupted_requested());

        FLAG.store(false, Ordering::Relaxed);
        assert!(!is_interrupted_requested());
    }
}
