//! Table Compaction
//!
//! Rewrites one table so that only live data remains.
//!
//! ## Steps (inside the table's exclusive section)
//! 1. Read the data file; keep whole slots whose id is not the tombstone id
//! 2. For each ref field, copy the payloads still referenced by live slots
//!    into `<side file>.compact` and point the slots at their new spans
//! 3. Write the live slots contiguously to `<data file>.compact`
//! 4. Rename the side files into place, then the data file
//!
//! Nothing is rewritten when there is no tombstone, no partial tail and no
//! orphaned side-file byte. A live slot whose span does not fit its side
//! file fails the table's compaction and leaves every file untouched, so
//! the record keeps reporting its corruption.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::catalog::{compaction_path, Table};
use crate::codec::{self, RefSpan, TOMBSTONE_ID};
use crate::error::Result;
use crate::field::REF_WIDTH;
use crate::refdata::{self, SideFileBuilder};
use crate::table::{read_or_empty, slot_id, TableManager};

/// Counters for one or more compacted tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Tables examined
    pub tables_scanned: usize,
    /// Tables whose files were rewritten
    pub tables_rewritten: usize,
    /// Tables whose compaction failed (logged, left untouched)
    pub tables_failed: usize,
    /// Tombstoned slots dropped from data files
    pub slots_removed: u64,
    /// Bytes dropped from data files (slots and partial tails)
    pub data_bytes_reclaimed: u64,
    /// Orphaned bytes dropped from side files
    pub ref_bytes_reclaimed: u64,
}

impl CompactionStats {
    /// Add another table's counters to these
    pub fn merge(&mut self, other: &CompactionStats) {
        self.tables_scanned += other.tables_scanned;
        self.tables_rewritten += other.tables_rewritten;
        self.tables_failed += other.tables_failed;
        self.slots_removed += other.slots_removed;
        self.data_bytes_reclaimed += other.data_bytes_reclaimed;
        self.ref_bytes_reclaimed += other.ref_bytes_reclaimed;
    }
}

/// One ref field's side file as seen by a compaction pass
struct SideFile {
    field: String,
    path: PathBuf,
    /// Offset of the span inside a slot
    offset: usize,
    data: Vec<u8>,
}

/// Compact one table
pub fn compact_table(tables: &TableManager, table: &Table) -> Result<CompactionStats> {
    tables.locks().with(table, || compact_locked(table))
}

fn compact_locked(table: &Table) -> Result<CompactionStats> {
    let mut stats = CompactionStats {
        tables_scanned: 1,
        ..Default::default()
    };

    // Deleted since it was listed
    if !table.data_path().exists() {
        debug!(table = %table.qualified_name(), "Table vanished before compaction");
        return Ok(stats);
    }

    let width = table.record_width();
    let data = fs::read(table.data_path())?;
    let tail = data.len() % width;

    let mut live: Vec<Vec<u8>> = data
        .chunks_exact(width)
        .filter(|slot| slot_id(table.fields(), slot) != TOMBSTONE_ID)
        .map(<[u8]>::to_vec)
        .collect();
    let slots_removed = (data.len() / width - live.len()) as u64;

    let mut sides = Vec::with_capacity(table.ref_paths().len());
    for (field, path) in table.ref_paths() {
        let offset = codec::field_offset(table.fields(), field).map_or(0, |(offset, _)| offset);
        sides.push(SideFile {
            field: field.clone(),
            path: path.clone(),
            offset,
            data: read_or_empty(path)?,
        });
    }

    let orphaned = sides.iter().any(|side| has_orphans(side, &live));
    if slots_removed == 0 && tail == 0 && !orphaned {
        debug!(table = %table.qualified_name(), "Nothing to compact");
        return Ok(stats);
    }

    for side in &sides {
        check_live_spans(table, side, &live)?;
    }

    // Side files first: slot spans are rewritten as payloads are copied
    let mut staged = Vec::with_capacity(sides.len() + 1);
    for side in &sides {
        let new_len = rebuild_side_file(table, side, &mut live)?;
        stats.ref_bytes_reclaimed += (side.data.len() as u64).saturating_sub(new_len);
        staged.push((compaction_path(&side.path), side.path.clone()));
    }

    let data_tmp = compaction_path(table.data_path());
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&data_tmp)?;
    for slot in &live {
        file.write_all(slot)?;
    }
    file.sync_all()?;
    staged.push((data_tmp, table.data_path().to_path_buf()));

    // A crash between renames leaves side files ahead of the data file
    for (from, to) in &staged {
        fs::rename(from, to)?;
    }

    stats.tables_rewritten = 1;
    stats.slots_removed = slots_removed;
    stats.data_bytes_reclaimed = (data.len() - live.len() * width) as u64;

    info!(
        table = %table.qualified_name(),
        live = live.len(),
        slots_removed,
        ref_bytes_reclaimed = stats.ref_bytes_reclaimed,
        "Table compacted"
    );
    Ok(stats)
}

/// True if the side file holds bytes no live slot points at
fn has_orphans(side: &SideFile, live: &[Vec<u8>]) -> bool {
    let referenced: u64 = live
        .iter()
        .map(|slot| span_at(slot, side.offset))
        .filter(|span| !span.is_absent())
        // Payload plus its separator byte
        .map(|span| span.len() + 1)
        .sum();
    side.data.len() as u64 > referenced
}

/// Fail if any live slot points outside the side file
fn check_live_spans(table: &Table, side: &SideFile, live: &[Vec<u8>]) -> Result<()> {
    let len = side.data.len() as u64;
    for slot in live {
        let span = span_at(slot, side.offset);
        if span.is_absent() {
            continue;
        }
        if let Err(e) = refdata::check_span(span, len) {
            error!(
                table = %table.qualified_name(),
                field = %side.field,
                id = slot_id(table.fields(), slot),
                error = %e,
                "Live record holds an unresolvable ref; table left uncompacted"
            );
            return Err(e);
        }
    }
    Ok(())
}

/// Copy referenced payloads into a fresh side file and repoint the slots
///
/// Returns the new side file's length. Spans are checked beforehand.
fn rebuild_side_file(table: &Table, side: &SideFile, live: &mut [Vec<u8>]) -> Result<u64> {
    let mut builder = SideFileBuilder::new(&compaction_path(&side.path))?;

    for slot in live.iter_mut() {
        let span = span_at(slot, side.offset);
        let target = &mut slot[side.offset..side.offset + REF_WIDTH];

        if span.is_absent() {
            continue;
        }

        refdata::check_span(span, side.data.len() as u64)?;
        let payload = &side.data[span.start as usize..span.end as usize];
        let moved = builder.add(payload)?;
        codec::write_span(moved, target);
    }

    debug!(
        table = %table.qualified_name(),
        field = %side.field,
        payloads = builder.payload_count(),
        "Side file rebuilt"
    );
    builder.finish()
}

fn span_at(slot: &[u8], offset: usize) -> RefSpan {
    codec::read_span(&slot[offset..offset + REF_WIDTH])
}
