//! Table Module
//!
//! CRUD over a table's primary data file and its ref side files.
//!
//! ## Responsibilities
//! - Insert: new id, ref payloads appended, slot appended
//! - Current records: lazy scan skipping tombstones and partial slots
//! - Update: ref payloads re-appended, slot overwritten in place
//! - Delete: id overwritten with the tombstone id in place
//!
//! ## Concurrency
//! Each operation runs inside the table's exclusive section (see
//! `TableLocks`), shared with the cleanup worker's compaction.

mod iter;
mod lock;
mod record;
mod validate;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::catalog::Table;
use crate::codec::{self, FieldValues, RefSpan, Value, TOMBSTONE_ID};
use crate::config::SyncStrategy;
use crate::error::{HartoError, Result};
use crate::field::{Field, ID_FIELD};
use crate::id::IdGenerator;
use crate::refdata::RefStore;

pub use iter::RecordIter;
pub use lock::TableLocks;
pub use record::Record;
pub use validate::{validate_insert, validate_update};

/// Record store over all tables of one database
#[derive(Debug)]
pub struct TableManager {
    /// Shared id source
    ids: IdGenerator,

    /// Side-file access
    refs: RefStore,

    /// Per-table exclusive sections (shared with compaction)
    locks: TableLocks,

    sync_strategy: SyncStrategy,
}

impl TableManager {
    pub fn new(ids: IdGenerator, sync_strategy: SyncStrategy) -> Self {
        Self {
            ids,
            refs: RefStore::new(sync_strategy),
            locks: TableLocks::new(),
            sync_strategy,
        }
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn locks(&self) -> &TableLocks {
        &self.locks
    }

    pub fn ref_store(&self) -> &RefStore {
        &self.refs
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert a record with a freshly generated id
    pub fn insert(&self, table: &Table, values: FieldValues) -> Result<Record> {
        validate_insert(table, &values)?;
        let id = self.ids.next_id();
        self.write_new(table, id, values)
    }

    /// Insert a record under an id issued earlier (transaction staging)
    pub(crate) fn insert_with_id(
        &self,
        table: &Table,
        id: u64,
        values: FieldValues,
    ) -> Result<Record> {
        validate_insert(table, &values)?;
        self.write_new(table, id, values)
    }

    /// Steps:
    /// 1. Append ref payloads and swap their text for spans
    /// 2. Encode the full slot
    /// 3. Append the slot at the end of the last whole slot
    fn write_new(&self, table: &Table, id: u64, values: FieldValues) -> Result<Record> {
        self.locks.with(table, || -> Result<Record> {
            let mut encoded = values.clone();
            encoded.insert(ID_FIELD.to_string(), Value::TimeId(id));
            self.append_refs(table, &values, &mut encoded)?;

            let bytes = codec::encode(table.fields(), &encoded)?;

            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(table.data_path())?;
            let offset = aligned_end(&mut file, table)?;
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&bytes)?;
            self.maybe_sync(&file)?;

            debug!(table = %table.qualified_name(), id, offset, "Record inserted");

            self.stored_record(table, offset, &bytes, &values)
        })
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Snapshot the table and return a lazy iterator over its live records
    pub fn current_records(&self, table: &Table) -> Result<RecordIter> {
        let (data, sides) = self.locks.with(table, || -> Result<_> {
            let data = Bytes::from(fs::read(table.data_path())?);

            let mut sides = Vec::with_capacity(table.ref_paths().len());
            for (field, path) in table.ref_paths() {
                sides.push((field.clone(), Bytes::from(read_or_empty(path)?)));
            }
            Ok((data, sides))
        })?;

        Ok(RecordIter::new(table.clone(), data, sides))
    }

    /// Find a live record by id (full scan)
    pub fn get(&self, table: &Table, id: u64) -> Result<Option<Record>> {
        for record in self.current_records(table)? {
            match record {
                Ok(record) if record.id() == id => return Ok(Some(record)),
                Ok(_) => {}
                Err(e) if e.is_corruption() => {
                    warn!(table = %table.qualified_name(), error = %e, "Skipping corrupt record");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Update / Delete
    // =========================================================================

    /// Overwrite a record's slot in place with the changed values
    ///
    /// Changed ref fields get new payloads appended; their old bytes stay in
    /// the side file until compaction. The id never changes.
    pub fn update(&self, table: &Table, record: &Record, changes: FieldValues) -> Result<Record> {
        validate_update(table, &changes)?;

        self.locks.with(table, || -> Result<Record> {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(table.data_path())?;
            let (offset, slot) = locate(&mut file, table, record.id(), record.slot_offset())?;

            let mut encoded = codec::decode(table.fields(), &slot)?.values;
            let spans = self.append_refs(table, &changes, &mut encoded)?;
            for (name, value) in &changes {
                if !spans.contains_key(name) {
                    encoded.insert(name.clone(), value.clone());
                }
            }

            let bytes = codec::encode(table.fields(), &encoded)?;
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&bytes)?;
            self.maybe_sync(&file)?;

            debug!(
                table = %table.qualified_name(),
                id = record.id(),
                offset,
                changed = changes.len(),
                "Record updated"
            );

            self.stored_record(table, offset, &bytes, &changes)
        })
    }

    /// Mark a record's slot as deleted
    ///
    /// The slot stays in the file until compaction removes it.
    pub fn delete(&self, table: &Table, record: &Record) -> Result<()> {
        self.locks.with(table, || -> Result<()> {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(table.data_path())?;
            let (offset, _) = locate(&mut file, table, record.id(), record.slot_offset())?;

            let id_offset = id_offset(table.fields());
            file.seek(SeekFrom::Start(offset + id_offset as u64))?;
            file.write_all(&TOMBSTONE_ID.to_le_bytes())?;
            self.maybe_sync(&file)?;

            debug!(table = %table.qualified_name(), id = record.id(), offset, "Record deleted");
            Ok(())
        })
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Append every ref payload in `supplied` and store its span in `encoded`
    fn append_refs(
        &self,
        table: &Table,
        supplied: &FieldValues,
        encoded: &mut FieldValues,
    ) -> Result<BTreeMap<String, RefSpan>> {
        let mut spans = BTreeMap::new();

        for (field, path) in table.ref_paths() {
            let Some(value) = supplied.get(field) else {
                continue;
            };
            let text = value.as_text().ok_or_else(|| HartoError::TypeMismatch {
                field: field.clone(),
                expected: "text",
                actual: value.type_name(),
            })?;

            let span = self.refs.append(path, text.as_bytes())?;
            encoded.insert(field.clone(), Value::Ref(span));
            spans.insert(field.clone(), span);
        }

        Ok(spans)
    }

    /// Decode the bytes just written back into a caller-facing record
    ///
    /// Ref text comes from `supplied` when the caller just wrote it, and from
    /// the side file otherwise. An unreadable unchanged ref is left as its
    /// span: the write already happened and must not be reported as failed.
    fn stored_record(
        &self,
        table: &Table,
        offset: u64,
        bytes: &[u8],
        supplied: &FieldValues,
    ) -> Result<Record> {
        let decoded = codec::decode(table.fields(), bytes)?;
        let id = decoded.id().unwrap_or(TOMBSTONE_ID);
        let mut values = decoded.values;
        let mut spans = BTreeMap::new();

        for (field, path) in table.ref_paths() {
            let Some(Value::Ref(span)) = values.get(field).cloned() else {
                continue;
            };
            spans.insert(field.clone(), span);

            let text = match supplied.get(field).and_then(Value::as_text) {
                Some(text) => text.to_string(),
                None => match self.refs.resolve(path, span) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(field = %field, error = %e, "Unchanged ref could not be resolved");
                        continue;
                    }
                },
            };
            values.insert(field.clone(), Value::Text(text));
        }

        Ok(Record::new(id, Some(offset), values, spans))
    }

    fn maybe_sync(&self, file: &File) -> Result<()> {
        if self.sync_strategy == SyncStrategy::EveryWrite {
            file.sync_data()?;
        }
        Ok(())
    }
}

/// Id stored in a slot
pub(crate) fn slot_id(fields: &[Field], slot: &[u8]) -> u64 {
    let start = id_offset(fields);
    slot.get(start..start + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .unwrap_or(TOMBSTONE_ID)
}

/// Offset of the `id` field inside a slot
pub(crate) fn id_offset(fields: &[Field]) -> usize {
    codec::field_offset(fields, ID_FIELD).map_or(0, |(offset, _)| offset)
}

/// End of the last whole slot
///
/// A trailing partial slot (an interrupted append) is cut off so the next
/// append starts on a slot boundary.
fn aligned_end(file: &mut File, table: &Table) -> Result<u64> {
    let width = table.record_width() as u64;
    let len = file.metadata()?.len();
    let aligned = len - len % width;

    if aligned != len {
        warn!(
            table = %table.qualified_name(),
            dropped = len - aligned,
            "Truncating incomplete trailing slot"
        );
        file.set_len(aligned)?;
    }
    Ok(aligned)
}

/// Find a record's slot, trying the remembered offset first
///
/// Compaction moves slots, so a stale offset falls back to a scan by id.
fn locate(
    file: &mut File,
    table: &Table,
    id: u64,
    hint: Option<u64>,
) -> Result<(u64, Vec<u8>)> {
    let width = table.record_width();
    let len = file.metadata()?.len();

    if let Some(offset) = hint {
        if offset % width as u64 == 0 && offset + width as u64 <= len {
            let mut slot = vec![0u8; width];
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut slot)?;
            if slot_id(table.fields(), &slot) == id {
                return Ok((offset, slot));
            }
        }
    }

    let mut data = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut data)?;

    data.chunks_exact(width)
        .enumerate()
        .find(|(_, slot)| id != TOMBSTONE_ID && slot_id(table.fields(), slot) == id)
        .map(|(i, slot)| ((i * width) as u64, slot.to_vec()))
        .ok_or(HartoError::RecordNotFound(id))
}

pub(crate) fn read_or_empty(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}
