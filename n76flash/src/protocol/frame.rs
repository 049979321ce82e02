//! N76E003 UART bootloader frames.
//!
//! The bootloader speaks a tiny byte-oriented protocol borrowed from the
//! ASCII control characters. Every frame the host sends is answered with a
//! single response byte.
//!
//! ## Frame Shapes
//!
//! ```text
//! Probe:      +-----+
//!             | SOH |
//!             +-----+
//!
//! Erase:      +-----+-----+
//!             | SUB | DEL |
//!             +-----+-----+
//!
//! Data:       +-----+----------------+-------+-----+
//!             | STX |  DATA (16)     | CRC8  | ETX |
//!             +-----+----------------+-------+-----+
//!             | 1   |      16        |   1   |  1  |
//!             +-----+----------------+-------+-----+
//!
//! Terminate:  +-----+
//!             | EOT |
//!             +-----+
//! ```
//!
//! The response is `ACK` (0x06) or `NAK` (0x15). Anything else is device
//! chatter (for example the running application printing on the same UART).

use crate::protocol::crc::crc8;

/// Size of a data block payload.
pub const BLOCK_SIZE: usize = 16;

/// Total length of a serialized data frame.
pub const DATA_FRAME_LEN: usize = BLOCK_SIZE + 3;

/// Byte used to pad the final block of an image.
pub const PAD_BYTE: u8 = 0xFF;

/// Protocol control characters.
pub mod control {
    /// Start of Heading: "are you there?" probe.
    pub const SOH: u8 = 0x01;
    /// Start of Text: data frame start.
    pub const STX: u8 = 0x02;
    /// End of Text: data frame end.
    pub const ETX: u8 = 0x03;
    /// End of Transmission: finish and soft reset.
    pub const EOT: u8 = 0x04;
    /// Acknowledge.
    pub const ACK: u8 = 0x06;
    /// Negative Acknowledge.
    pub const NAK: u8 = 0x15;
    /// Substitute: first byte of the erase command.
    pub const SUB: u8 = 0x1A;
    /// Delete: second byte of the erase command.
    pub const DEL: u8 = 0x7F;
}

/// Host command carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Bootloader presence probe (0x01).
    Probe = control::SOH,
    /// Erase program memory (0x1A 0x7F).
    Erase = control::SUB,
    /// Program one 16-byte block (0x02 ... 0x03).
    Data = control::STX,
    /// Finish the session and reset into the application (0x04).
    Terminate = control::EOT,
}

/// A single host-to-device frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    payload: Option<[u8; BLOCK_SIZE]>,
}

impl Frame {
    /// Build a probe frame.
    pub fn probe() -> Self {
        Self {
            command: Command::Probe,
            payload: None,
        }
    }

    /// Build an erase frame.
    pub fn erase() -> Self {
        Self {
            command: Command::Erase,
            payload: None,
        }
    }

    /// Build a data frame for one block.
    pub fn data(block: &[u8; BLOCK_SIZE]) -> Self {
        Self {
            command: Command::Data,
            payload: Some(*block),
        }
    }

    /// Build a terminate frame.
    pub fn terminate() -> Self {
        Self {
            command: Command::Terminate,
            payload: None,
        }
    }

    /// Get the command type.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Get the block payload of a data frame.
    pub fn payload(&self) -> Option<&[u8; BLOCK_SIZE]> {
        self.payload
            .as_ref()
    }

    /// Serialize the frame to wire bytes.
    pub fn build(&self) -> Vec<u8> {
        match (self.command, &self.payload) {
            (Command::Data, Some(block)) => {
                let mut buf = Vec::with_capacity(DATA_FRAME_LEN);
                buf.push(control::STX);
                buf.extend_from_slice(block);
                buf.push(crc8(block));
                buf.push(control::ETX);
                buf
            },
            (Command::Erase, _) => vec![control::SUB, control::DEL],
            (command, _) => vec![command as u8],
        }
    }
}

/// Classified device response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Positive acknowledgment.
    Ack,
    /// Negative acknowledgment.
    Nack,
    /// Any other non-zero byte.
    Spurious(u8),
    /// No byte arrived (or the line only delivered a zero byte).
    Timeout,
}

impl Response {
    /// Classify a single response byte.
    ///
    /// A zero byte is treated like silence, since an idle line read through
    /// a zeroed buffer is indistinguishable from it on the wire.
    pub fn classify(byte: Option<u8>) -> Self {
        match byte {
            Some(control::ACK) => Self::Ack,
            Some(control::NAK) => Self::Nack,
            None | Some(0x00) => Self::Timeout,
            Some(other) => Self::Spurious(other),
        }
    }

    /// Check if this is a positive acknowledgment.
    pub fn is_ack(self) -> bool {
        self == Self::Ack
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ack => write!(f, "ACK"),
            Self::Nack => write!(f, "NAK"),
            Self::Spurious(byte) => write!(f, "unexpected byte 0x{byte:02X}"),
            Self::Timeout => write!(f, "no response"),
        }
    }
}
