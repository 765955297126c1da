//! Ref-Data Module
//!
//! Append-only side files holding the unbounded payloads of `ref` fields.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────┬────┬──────────────────────┬────┬─────┐
//! │ payload 1            │ \n │ payload 2            │ \n │ ... │
//! └──────────────────────┴────┴──────────────────────┴────┴─────┘
//!  ^start₁               ^end₁ ^start₂               ^end₂
//! ```
//! A record slot stores `(start, end)`; the separator byte is not part of
//! the range. Bytes are never overwritten: an update appends a new payload
//! and orphans the old one until compaction rewrites the file.

mod builder;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::trace;

use crate::codec::RefSpan;
use crate::config::SyncStrategy;
use crate::error::{HartoError, Result};

pub use builder::SideFileBuilder;

/// Byte written after every payload
pub const SEPARATOR: u8 = b'\n';

/// Reads and appends ref payloads
#[derive(Debug, Clone, Copy)]
pub struct RefStore {
    sync_strategy: SyncStrategy,
}

impl RefStore {
    pub fn new(sync_strategy: SyncStrategy) -> Self {
        Self { sync_strategy }
    }

    /// Append a payload and return its span
    ///
    /// `start` is the side file's length before the write.
    pub fn append(&self, path: &Path, payload: &[u8]) -> Result<RefSpan> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let start = file.metadata()?.len();

        let mut buf = Vec::with_capacity(payload.len() + 1);
        buf.extend_from_slice(payload);
        buf.push(SEPARATOR);
        file.write_all(&buf)?;

        if self.sync_strategy == SyncStrategy::EveryWrite {
            file.sync_data()?;
        }

        let span = RefSpan::new(start, start + payload.len() as u64);
        trace!(path = %path.display(), start = span.start, end = span.end, "Ref payload appended");
        Ok(span)
    }

    /// Read the payload a span points at
    pub fn resolve(&self, path: &Path, span: RefSpan) -> Result<String> {
        if span.is_absent() {
            return Ok(String::new());
        }

        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        check_span(span, len)?;

        file.seek(SeekFrom::Start(span.start))?;
        let mut buf = vec![0u8; span.len() as usize];
        file.read_exact(&mut buf)?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Resolve a span against an in-memory copy of a side file
pub fn resolve_in(data: &[u8], span: RefSpan) -> Result<String> {
    if span.is_absent() {
        return Ok(String::new());
    }
    check_span(span, data.len() as u64)?;
    let bytes = &data[span.start as usize..span.end as usize];
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// A span is valid if it is ordered and ends inside the file
pub fn check_span(span: RefSpan, len: u64) -> Result<()> {
    if span.start > span.end || span.end > len {
        return Err(HartoError::InvalidRefRange {
            start: span.start,
            end: span.end,
            len,
        });
    }
    Ok(())
}
