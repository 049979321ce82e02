//! Firmware images and their 16-byte transfer blocks.
//!
//! An image is a raw binary (as produced by `objcopy -O binary` or Keil's
//! `.bin` output). It is read into memory once and never modified; the
//! session walks it in [`BLOCK_SIZE`] blocks, padding the last one with
//! `0xFF` (the erased flash value).

use crate::error::{Error, Result};
use crate::protocol::frame::{BLOCK_SIZE, PAD_BYTE};
use log::debug;
use std::fs;
use std::path::Path;

/// An immutable firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    /// Load an image from a binary file.
    ///
    /// The file is read completely and closed before this returns.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        debug!("Loaded {} ({} bytes)", path.display(), data.len());
        Self::from_bytes(data)
    }

    /// Create an image from raw bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(Error::InvalidImage("image is empty".into()));
        }
        Ok(Self { data })
    }

    /// Image size in bytes (without padding).
    pub fn len(&self) -> usize {
        self.data
            .len()
    }

    /// Always `false`; empty images are rejected on construction.
    pub fn is_empty(&self) -> bool {
        self.data
            .is_empty()
    }

    /// Raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of 16-byte blocks, `ceil(len / 16)`.
    pub fn block_count(&self) -> usize {
        self.data
            .len()
            .div_ceil(BLOCK_SIZE)
    }

    /// Number of padding bytes appended to the final block.
    pub fn padding(&self) -> usize {
        self.block_count() * BLOCK_SIZE - self.data.len()
    }

    /// Get block `index`, padded with `0xFF` if it is a short final block.
    pub fn block(&self, index: usize) -> Option<[u8; BLOCK_SIZE]> {
        let start = index.checked_mul(BLOCK_SIZE)?;
        if start >= self.data.len() {
            return None;
        }
        let end = (start + BLOCK_SIZE).min(self.data.len());

        let mut block = [PAD_BYTE; BLOCK_SIZE];
        block[..end - start].copy_from_slice(&self.data[start..end]);
        Some(block)
    }

    /// Iterate over all blocks in transfer order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            image: self,
            next: 0,
        }
    }
}

/// Iterator over the padded blocks of a [`FirmwareImage`].
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    image: &'a FirmwareImage,
    next: usize,
}

impl Iterator for Blocks<'_> {
    type Item = [u8; BLOCK_SIZE];

    fn next(&mut self) -> Option<Self::Item> {
        let block = self
            .image
            .block(self.next)?;
        self.next += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .image
            .block_count()
            .saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Blocks<'_> {}
