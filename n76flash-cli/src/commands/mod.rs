//! Command implementations.

pub(crate) mod flash;
