//! Protocol implementations.

pub mod crc;
pub mod frame;

// Re-export common types
pub use crc::crc8;
pub use frame::{BLOCK_SIZE, Command, Frame, Response, control};
