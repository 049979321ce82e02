//! Byte-level transport over a serial [`Port`].
//!
//! The bootloader answers every frame with a single byte, so the transport
//! only needs four operations: write a frame, read one byte, discard stale
//! input and switch between timeout modes.
//!
//! ## Timeout Modes
//!
//! - [`TimeoutMode::Handshake`] returns after the handshake timeout (1 s by
//!   default) or as soon as a byte arrives. Used while probing for the
//!   bootloader, where silence is expected.
//! - [`TimeoutMode::Bounded`] is the same with an explicit duration.
//! - [`TimeoutMode::Streaming`] blocks until at least one byte arrives. The
//!   wait is split into short poll slices so a cancellation request is
//!   noticed even when the device stops answering.

use crate::error::{Error, Result};
use crate::port::Port;
use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;

/// Default handshake read timeout.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Poll slice of a streaming read.
pub const STREAMING_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read timeout behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutMode {
    /// Bounded by the transport's handshake timeout.
    Handshake,
    /// Bounded by an explicit timeout.
    Bounded(Duration),
    /// Block until a byte arrives, without an upper bound.
    Streaming,
}

/// Cancellation hook consulted during streaming reads.
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// An opened serial connection to the bootloader.
///
/// The transport owns its port exclusively and closes it when dropped.
pub struct Transport<P: Port> {
    port: P,
    mode: TimeoutMode,
    handshake_timeout: Duration,
    poll_interval: Duration,
    cancel: CancelCheck,
    closed: bool,
}

impl<P: Port> Transport<P> {
    /// Wrap an already opened port.
    pub fn new(port: P) -> Self {
        Self {
            port,
            mode: TimeoutMode::Handshake,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            poll_interval: STREAMING_POLL_INTERVAL,
            cancel: Arc::new(crate::is_interrupted_requested),
            closed: false,
        }
    }

    /// Set the timeout used by [`TimeoutMode::Handshake`].
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the poll slice used by [`TimeoutMode::Streaming`].
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replace the cancellation hook.
    ///
    /// Defaults to the crate-wide checker registered with
    /// [`set_interrupt_checker`](crate::set_interrupt_checker).
    #[must_use]
    pub fn with_cancel_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.cancel = Arc::new(check);
        self
    }

    /// Get the port name/path.
    pub fn name(&self) -> &str {
        self.port
            .name()
    }

    /// Get the active timeout mode.
    pub fn mode(&self) -> TimeoutMode {
        self.mode
    }

    /// Get the handshake timeout.
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Switch the read timeout mode.
    pub fn configure(&mut self, mode: TimeoutMode) -> Result<()> {
        let timeout = match mode {
            TimeoutMode::Handshake => self.handshake_timeout,
            TimeoutMode::Bounded(timeout) => timeout,
            TimeoutMode::Streaming => self.poll_interval,
        };
        debug!("Timeout mode {mode:?} ({timeout:?} per read)");
        self.port
            .set_timeout(timeout)?;
        self.mode = mode;
        Ok(())
    }

    /// Write a complete frame.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("-> {bytes:02X?}");
        self.port
            .write_all_bytes(bytes)
    }

    /// Read a single response byte.
    ///
    /// Returns `None` when a bounded read times out. A streaming read only
    /// returns once a byte arrives, or fails with [`Error::Interrupted`] when
    /// the cancellation hook fires.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self
                .port
                .read(&mut buf)
            {
                Ok(n) if n > 0 => {
                    trace!("<- 0x{:02X}", buf[0]);
                    return Ok(Some(buf[0]));
                },
                Ok(_) => {},
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                    ) => {},
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }

            if self.mode != TimeoutMode::Streaming {
                trace!("<- (timeout)");
                return Ok(None);
            }
            if self.is_cancelled() {
                return Err(Error::Interrupted);
            }
        }
    }

    /// Discard any buffered, unread input.
    pub fn flush_input(&mut self) -> Result<()> {
        self.port
            .clear_input()
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        (self.cancel)()
    }

    /// Whether the port has been released.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the port. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.port
            .close()
    }
}

impl<P: Port> Drop for Transport<P> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(feature = "native")]
mod native_impl {
    use super::{Result, Transport};
    use crate::port::{NativePort, SerialConfig};

    impl Transport<NativePort> {
        /// Open the bootloader UART at `path` (19200 baud, 8N1, no flow
        /// control, raw mode).
        pub fn open(path: &str) -> Result<Self> {
            let port = NativePort::open(&SerialConfig::new(path))?;
            Ok(Self::new(port))
        }
    }
}
