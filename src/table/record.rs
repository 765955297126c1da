//! Records as seen by callers

use std::collections::BTreeMap;

use crate::codec::{format_time_id, FieldValues, RefSpan, Value};

/// One live record with its `ref` fields resolved to text
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: u64,
    /// Byte offset of the slot in the data file (None until committed)
    slot: Option<u64>,
    /// Values keyed by field name, including `id`
    values: FieldValues,
    /// Side-file spans of the ref fields
    spans: BTreeMap<String, RefSpan>,
}

impl Record {
    pub(crate) fn new(
        id: u64,
        slot: Option<u64>,
        values: FieldValues,
        spans: BTreeMap<String, RefSpan>,
    ) -> Self {
        Self {
            id,
            slot,
            values,
            spans,
        }
    }

    /// The record's primary key
    pub fn id(&self) -> u64 {
        self.id
    }

    /// RFC 3339 rendering of the id's timestamp
    pub fn id_datetime(&self) -> String {
        format_time_id(self.id)
    }

    /// Byte offset of the slot when this record was read or written
    pub fn slot_offset(&self) -> Option<u64> {
        self.slot
    }

    /// Value of a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// All values, keyed by field name
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn into_values(self) -> FieldValues {
        self.values
    }

    /// Span of a ref field's payload in its side file
    pub fn ref_span(&self, field: &str) -> Option<RefSpan> {
        self.spans.get(field).copied()
    }
}
