//! Record Iterator
//!
//! Sequential iteration over the live slots of a table snapshot.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::catalog::Table;
use crate::codec::{self, Value};
use crate::error::Result;
use crate::refdata;

use super::Record;

/// Lazy iterator over a snapshot of a table's data and side files
///
/// The snapshot is taken inside the table's exclusive section; decoding
/// happens on demand afterwards. Cloning is cheap (the buffers are shared)
/// and `restart` rewinds to the first slot.
///
/// - Tombstoned slots are skipped.
/// - A trailing slice shorter than one slot is skipped.
/// - A corrupt slot yields `Err` and iteration continues with the next one.
#[derive(Debug, Clone)]
pub struct RecordIter {
    table: Table,
    data: Bytes,
    /// (field name, side file contents) for every ref field
    sides: Vec<(String, Bytes)>,
    width: usize,
    position: usize,
}

impl RecordIter {
    pub(crate) fn new(table: Table, data: Bytes, sides: Vec<(String, Bytes)>) -> Self {
        let width = table.record_width();
        Self {
            table,
            data,
            sides,
            width,
            position: 0,
        }
    }

    /// Rewind to the first slot
    pub fn restart(&mut self) {
        self.position = 0;
    }

    /// Number of whole slots in the snapshot, tombstones included
    pub fn slot_count(&self) -> usize {
        self.data.len() / self.width
    }

    /// Build a record from a decoded slot, resolving ref spans
    fn materialize(&self, offset: usize, slot: &[u8]) -> Result<Record> {
        let decoded = codec::decode(self.table.fields(), slot)?;
        let id = decoded.id().unwrap_or_default();

        let mut values = decoded.values;
        let mut spans = BTreeMap::new();

        for (field, side) in &self.sides {
            if let Some(Value::Ref(span)) = values.get(field).cloned() {
                let text = refdata::resolve_in(side, span)?;
                spans.insert(field.clone(), span);
                values.insert(field.clone(), Value::Text(text));
            }
        }

        Ok(Record::new(id, Some(offset as u64), values, spans))
    }
}

impl Iterator for RecordIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Stop at the last whole slot
            if self.position + self.width > self.data.len() {
                return None;
            }

            let offset = self.position;
            let slot = self.data.slice(offset..offset + self.width);
            self.position += self.width;

            if super::slot_id(self.table.fields(), &slot) == codec::TOMBSTONE_ID {
                continue;
            }

            return Some(self.materialize(offset, &slot));
        }
    }
}
