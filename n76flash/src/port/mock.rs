//! Scripted in-memory port for protocol tests.
//!
//! Unlike `Cursor<Vec<u8>>`, reads and writes are independent: reads pop the
//! next scripted reply, writes are recorded for inspection. State lives behind
//! an `Arc<Mutex<_>>` so a test can keep a handle after the session has taken
//! ownership of the port.

use crate::error::Result;
use crate::port::Port;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Shared state of a [`MockPort`].
#[derive(Debug, Default)]
pub(crate) struct MockState {
    /// Scripted replies; `None` is one read timeout.
    pub replies: VecDeque<Option<u8>>,
    /// Each `write` call, in order.
    pub writes: Vec<Vec<u8>>,
    /// Timeouts applied via `set_timeout`.
    pub timeouts: Vec<Duration>,
    /// Number of input flushes.
    pub flushes: usize,
    /// Number of reads served.
    pub reads: usize,
    /// Whether `close` was called.
    pub closed: bool,
}

impl MockState {
    /// All bytes written, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.writes
            .concat()
    }

    /// Count written frames that start with `first`.
    pub fn frames_starting_with(&self, first: u8) -> usize {
        self.writes
            .iter()
            .filter(|w| w.first() == Some(&first))
            .count()
    }
}

/// Scripted serial port.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockPort {
    state: Arc<Mutex<MockState>>,
    timeout: Duration,
}

impl MockPort {
    /// Create a port answering with `replies` in order.
    pub fn new(replies: impl IntoIterator<Item = Option<u8>>) -> Self {
        let port = Self::default();
        port.state()
            .replies
            .extend(replies);
        port
    }

    /// Create a port that acknowledges `count` frames.
    pub fn acking(count: usize) -> Self {
        Self::new(std::iter::repeat_n(Some(crate::protocol::control::ACK), count))
    }

    /// Lock the shared state.
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl io::Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        // An exhausted script is an error rather than silence so a broken
        // test can never spin forever in streaming mode.
        let reply = state
            .replies
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "script exhausted"))?;
        state.reads += 1;
        match reply {
            Some(byte) if !buf.is_empty() => {
                buf[0] = byte;
                Ok(1)
            },
            Some(_) => Ok(0),
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
        }
    }
}

impl io::Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        state
            .writes
            .push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.state()
            .timeouts
            .push(timeout);
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_input(&mut self) -> Result<()> {
        self.state()
            .flushes += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn close(&mut self) -> Result<()> {
        self.state()
            .closed = true;
        Ok(())
    }
}
