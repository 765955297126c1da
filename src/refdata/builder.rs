//! Side File Builder
//!
//! Writes a fresh side file holding only the payloads that are still
//! referenced. Used by compaction.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::codec::RefSpan;
use crate::error::{HartoError, Result};

use super::SEPARATOR;

/// Builder for a compacted side file
pub struct SideFileBuilder {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Current write position (start of the next payload)
    current_offset: u64,
    /// Number of payloads written
    payload_count: u64,
}

impl SideFileBuilder {
    /// Create (or truncate) the output file
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            current_offset: 0,
            payload_count: 0,
        })
    }

    /// Copy one payload and return its new span
    pub fn add(&mut self, payload: &[u8]) -> Result<RefSpan> {
        let start = self.current_offset;
        self.writer.write_all(payload)?;
        self.writer.write_all(&[SEPARATOR])?;

        self.current_offset += payload.len() as u64 + 1;
        self.payload_count += 1;

        Ok(RefSpan::new(start, start + payload.len() as u64))
    }

    /// Number of payloads written so far
    pub fn payload_count(&self) -> u64 {
        self.payload_count
    }

    /// Flush and fsync; returns the final file size
    pub fn finish(self) -> Result<u64> {
        let file = self.writer.into_inner().map_err(|e| {
            HartoError::Io(std::io::Error::new(
                e.error().kind(),
                format!("Failed to flush side file {}: {}", self.path.display(), e),
            ))
        })?;
        file.sync_all()?;
        Ok(self.current_offset)
    }
}
