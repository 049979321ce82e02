//! Flash session engine.
//!
//! A session drives the bootloader through four phases, each gated on a
//! single acknowledgment byte:
//!
//! ```text
//! Idle -> Handshaking -> Erasing -> Programming -> Finalizing -> Succeeded
//!              |             |            |              |
//!              +-------------+------------+--------------+----> Failed(reason)
//! ```
//!
//! Transitions only move forward. Whatever the outcome, the transport is
//! closed before [`Session::run`] returns.
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
//!         let transport = Transport::open("/dev/ttyUSB0")?;
//!         let mut session = Session::new(transport, &image, SessionConfig::default());
//!         session.run(|event| {
//!             if let SessionEvent::Block(progress) = event {
//!                 println!("Writing: {}%", progress.percent);
//!             }
//!         })?;
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::image::FirmwareImage;
use crate::port::Port;
use crate::protocol::frame::{Frame, Response};
use crate::transport::{TimeoutMode, Transport};
use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Default number of handshake retries.
pub const DEFAULT_MAX_TRIES: u32 = 25;

/// Pause after device chatter before probing again.
pub const SPURIOUS_BACKOFF: Duration = Duration::from_millis(200);

/// Default bound on the erase acknowledgment.
///
/// A full APROM erase takes close to a second.
pub const DEFAULT_ERASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Session tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Handshake retries after the first probe (at most `max_tries + 1`
    /// probes are sent).
    pub max_tries: u32,
    /// Pause after a spurious byte during the handshake.
    pub spurious_backoff: Duration,
    /// Bound on the wait for the erase acknowledgment.
    pub erase_timeout: Duration,
    /// Send a terminate frame when programming is aborted.
    pub reset_on_abort: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            spurious_backoff: SPURIOUS_BACKOFF,
            erase_timeout: DEFAULT_ERASE_TIMEOUT,
            reset_on_abort: false,
        }
    }
}

impl SessionConfig {
    /// Set the number of handshake retries.
    #[must_use]
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Set the pause after a spurious handshake byte.
    #[must_use]
    pub fn with_spurious_backoff(mut self, backoff: Duration) -> Self {
        self.spurious_backoff = backoff;
        self
    }

    /// Set the erase acknowledgment timeout.
    #[must_use]
    pub fn with_erase_timeout(mut self, timeout: Duration) -> Self {
        self.erase_timeout = timeout;
        self
    }

    /// Send a best-effort terminate frame after a programming abort.
    #[must_use]
    pub fn with_reset_on_abort(mut self, reset_on_abort: bool) -> Self {
        self.reset_on_abort = reset_on_abort;
        self
    }
}

/// Why a session failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// The bootloader never acknowledged a probe.
    #[error("no handshake after {attempts} attempts")]
    HandshakeTimeout {
        /// Probes sent.
        attempts: u32,
    },

    /// The erase command was not acknowledged.
    #[error("erase rejected ({0})")]
    EraseRejected(Response),

    /// The device refused a data block.
    #[error("block {block} rejected by device")]
    ProgramRejected {
        /// Zero-based block index.
        block: usize,
    },

    /// The device answered a data block with neither ACK nor NAK.
    #[error("unexpected response 0x{byte:02X} to block {block}")]
    UnexpectedResponse {
        /// Zero-based block index.
        block: usize,
        /// Byte received.
        byte: u8,
    },

    /// The terminate command was not acknowledged.
    #[error("reset rejected ({0})")]
    ResetRejected(Response),

    /// The embedding application requested cancellation.
    #[error("cancelled")]
    Cancelled,

    /// The serial link failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not started.
    #[default]
    Idle,
    /// Probing for the bootloader.
    Handshaking,
    /// Erasing program memory.
    Erasing,
    /// Sending data blocks.
    Programming,
    /// Sending the terminate command.
    Finalizing,
    /// Image written and device reset.
    Succeeded,
    /// Session aborted.
    Failed(FailureReason),
}

impl SessionState {
    fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Handshaking => 1,
            Self::Erasing => 2,
            Self::Programming => 3,
            Self::Finalizing => 4,
            Self::Succeeded | Self::Failed(_) => 5,
        }
    }

    /// Whether the session has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Programming progress after a block was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Zero-based index of the acknowledged block.
    pub block: usize,
    /// Total number of blocks.
    pub total_blocks: usize,
    /// Completion percentage.
    pub percent: u8,
}

impl Progress {
    /// Progress after block `block` of `total_blocks` was acknowledged.
    pub fn new(block: usize, total_blocks: usize) -> Self {
        Self {
            block,
            total_blocks,
            percent: progress_percent(block, total_blocks),
        }
    }
}

/// Percentage reported after block `index` of `total` is acknowledged.
///
/// `floor(index * 100 / total)`, except that the final block always reports
/// 100.
pub fn progress_percent(index: usize, total: usize) -> u8 {
    if index.saturating_add(1) >= total {
        return 100;
    }
    u8::try_from(index * 100 / total).unwrap_or(100)
}

/// Notification emitted while a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session entered a new state.
    State(SessionState),
    /// A handshake probe went unanswered.
    ProbeFailed {
        /// Zero-based attempt number.
        attempt: u32,
        /// What came back instead of ACK.
        response: Response,
    },
    /// A data block was acknowledged.
    Block(Progress),
}

/// Summary of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Probes sent before the handshake succeeded.
    pub probes: u32,
    /// Blocks written.
    pub blocks: usize,
    /// Image size in bytes (without padding).
    pub bytes: usize,
    /// Wall time of the whole session.
    pub elapsed: Duration,
}

/// A single flash session over an exclusively owned transport.
pub struct Session<'a, P: Port> {
    transport: Transport<P>,
    image: &'a FirmwareImage,
    config: SessionConfig,
    state: SessionState,
}

impl<'a, P: Port> Session<'a, P> {
    /// Create a session for `image` over `transport`.
    pub fn new(transport: Transport<P>, image: &'a FirmwareImage, config: SessionConfig) -> Self {
        Self {
            transport,
            image,
            config,
            state: SessionState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Transport<P> {
        &self.transport
    }

    /// Run the whole session: handshake, erase, program, finalize.
    ///
    /// `on_event` observes state changes, failed probes and per-block
    /// progress. The transport is closed on every exit path. A session can
    /// only run once.
    pub fn run<F>(&mut self, mut on_event: F) -> Result<SessionReport>
    where
        F: FnMut(&SessionEvent),
    {
        if self.state != SessionState::Idle {
            return Err(Error::Config("session has already run".into()));
        }

        let start = Instant::now();
        let outcome = self.drive(&mut on_event);

        let final_state = match &outcome {
            Ok(_) => SessionState::Succeeded,
            Err(Error::Session(reason)) => SessionState::Failed(reason.clone()),
            Err(e) => SessionState::Failed(FailureReason::Transport(e.to_string())),
        };
        self.transition(final_state, &mut on_event);

        if let Err(e) = self.transport.close() {
            warn!("Failed to close {}: {e}", self.transport.name());
        }

        let probes = outcome?;
        Ok(SessionReport {
            probes,
            blocks: self.image.block_count(),
            bytes: self.image.len(),
            elapsed: start.elapsed(),
        })
    }

    fn drive<F>(&mut self, on_event: &mut F) -> Result<u32>
    where
        F: FnMut(&SessionEvent),
    {
        let probes = self.handshake(on_event)?;
        self.erase(on_event)?;
        self.program(on_event)?;
        self.finalize(on_event)?;
        Ok(probes)
    }

    fn transition<F>(&mut self, next: SessionState, on_event: &mut F)
    where
        F: FnMut(&SessionEvent),
    {
        debug_assert!(
            next.rank() > self.state.rank(),
            "backward transition {:?} -> {next:?}",
            self.state
        );
        debug!("Session state: {:?} -> {next:?}", self.state);
        self.state = next;
        on_event(&SessionEvent::State(self.state.clone()));
    }

    /// Probe until the bootloader answers, returning the number of probes.
    fn handshake<F>(&mut self, on_event: &mut F) -> Result<u32>
    where
        F: FnMut(&SessionEvent),
    {
        self.transition(SessionState::Handshaking, on_event);
        self.transport
            .configure(TimeoutMode::Handshake)?;

        info!(
            "Connecting on {}, please reset the microcontroller...",
            self.transport.name()
        );

        let probe = Frame::probe().build();
        let max_tries = self.config.max_tries;
        for attempt in 0..=max_tries {
            if self.transport.is_cancelled() {
                return Err(FailureReason::Cancelled.into());
            }

            self.transport.write(&probe)?;
            let response = Response::classify(self.transport.read_byte()?);
            if response.is_ack() {
                info!("Handshake OK");
                return Ok(attempt.saturating_add(1));
            }

            on_event(&SessionEvent::ProbeFailed { attempt, response });
            if attempt == max_tries {
                warn!(
                    "No handshake after {} attempts, giving up",
                    attempt.saturating_add(1)
                );
                break;
            }

            match response {
                Response::Timeout => debug!("Try {attempt}: no response"),
                other => {
                    // Application output or line noise; let it drain, then drop it
                    debug!("Try {attempt}: {other}");
                    thread::sleep(self.config.spurious_backoff);
                    self.transport.flush_input()?;
                },
            }
        }

        Err(FailureReason::HandshakeTimeout {
            attempts: max_tries.saturating_add(1),
        }
        .into())
    }

    fn erase<F>(&mut self, on_event: &mut F) -> Result<()>
    where
        F: FnMut(&SessionEvent),
    {
        self.transition(SessionState::Erasing, on_event);
        self.transport
            .configure(TimeoutMode::Bounded(self.config.erase_timeout))?;

        info!("Erasing...");
        self.transport
            .write(&Frame::erase().build())?;

        match Response::classify(self.transport.read_byte()?) {
            Response::Ack => {
                info!("Erase done");
                Ok(())
            },
            other => Err(FailureReason::EraseRejected(other).into()),
        }
    }

    fn program<F>(&mut self, on_event: &mut F) -> Result<()>
    where
        F: FnMut(&SessionEvent),
    {
        self.transition(SessionState::Programming, on_event);
        self.transport
            .configure(TimeoutMode::Streaming)?;

        let image = self.image;
        let total = image.block_count();
        info!("Writing {} bytes in {total} blocks", image.len());

        for (index, block) in image
            .blocks()
            .enumerate()
        {
            if self.transport.is_cancelled() {
                warn!("Cancelled before block {index}");
                return Err(self.abort(FailureReason::Cancelled));
            }

            self.transport
                .write(&Frame::data(&block).build())?;

            let byte = match self.transport.read_byte() {
                Err(Error::Interrupted) => return Err(self.abort(FailureReason::Cancelled)),
                other => other?,
            };

            match Response::classify(byte) {
                Response::Ack => {
                    on_event(&SessionEvent::Block(Progress::new(index, total)));
                },
                Response::Nack => {
                    warn!("Block {index}/{total} rejected");
                    return Err(self.abort(FailureReason::ProgramRejected { block: index }));
                },
                Response::Spurious(_) | Response::Timeout => {
                    let byte = byte.unwrap_or_default();
                    warn!("Block {index}/{total}: unexpected response 0x{byte:02X}");
                    return Err(self.abort(FailureReason::UnexpectedResponse { block: index, byte }));
                },
            }
        }

        Ok(())
    }

    /// Leave programming early, optionally telling the device to reset.
    fn abort(&mut self, reason: FailureReason) -> Error {
        if self.config.reset_on_abort {
            debug!("Sending terminate after abort");
            let result = self
                .transport
                .configure(TimeoutMode::Handshake)
                .and_then(|()| {
                    self.transport
                        .write(&Frame::terminate().build())
                })
                .and_then(|()| self.transport.read_byte());
            match result {
                Ok(byte) => debug!("Terminate after abort: {}", Response::classify(byte)),
                Err(e) => warn!("Terminate after abort failed: {e}"),
            }
        }
        reason.into()
    }

    fn finalize<F>(&mut self, on_event: &mut F) -> Result<()>
    where
        F: FnMut(&SessionEvent),
    {
        self.transition(SessionState::Finalizing, on_event);
        self.transport
            .configure(TimeoutMode::Handshake)?;

        info!("Soft reset...");
        self.transport
            .write(&Frame::terminate().build())?;

        match Response::classify(self.transport.read_byte()?) {
            Response::Ack => {
                info!("Reset done");
                Ok(())
            },
            other => Err(FailureReason::ResetRejected(other).into()),
        }
    }
}
