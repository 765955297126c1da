//! Record encoding and decoding
//!
//! One record is the concatenation of each field's fixed-width encoding in
//! declared order. Nothing else is written: no header, no length prefix.

use chrono::{SecondsFormat, TimeZone, Utc};

use crate::error::{HartoError, Result};
use crate::field::{record_width, Field, FieldType, ID_FIELD};

use super::{FieldValues, RefSpan, Value, TOMBSTONE_ID};

/// A decoded slot
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// Values keyed by field name; `ref` fields hold their unresolved span
    pub values: FieldValues,

    /// RFC 3339 rendering of the `timeID` field, if the table has one
    pub id_datetime: Option<String>,
}

impl DecodedRecord {
    /// The record's id, or None if the slot has no `timeID` field
    pub fn id(&self) -> Option<u64> {
        self.values.get(ID_FIELD).and_then(Value::as_time_id)
    }

    /// True if the slot carries the tombstone id
    pub fn is_tombstone(&self) -> bool {
        self.id() == Some(TOMBSTONE_ID)
    }
}

/// Encode one record
///
/// Each field is looked up by name. A missing value fails for `not_null`
/// fields and is otherwise written as a zero-filled slot. `ref` fields must
/// already carry their resolved `Value::Ref` span.
pub fn encode(fields: &[Field], values: &FieldValues) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(record_width(fields));

    for field in fields {
        match values.get(&field.name) {
            Some(value) => encode_value(field, value, &mut buf)?,
            None if field.is_required() => {
                return Err(HartoError::MissingField(field.name.clone()));
            }
            None => buf.resize(buf.len() + field.width, 0),
        }
    }

    Ok(buf)
}

/// Decode one record from the first `record_width(fields)` bytes of `bytes`
pub fn decode(fields: &[Field], bytes: &[u8]) -> Result<DecodedRecord> {
    let width = record_width(fields);
    if bytes.len() < width {
        return Err(HartoError::MalformedRecord {
            expected: width,
            actual: bytes.len(),
        });
    }

    let mut values = FieldValues::new();
    let mut id_datetime = None;
    let mut offset = 0;

    for field in fields {
        let data = &bytes[offset..offset + field.width];
        let value = decode_value(field, data);

        if let Value::TimeId(nanos) = value {
            if field.name == ID_FIELD || id_datetime.is_none() {
                id_datetime = Some(format_time_id(nanos));
            }
        }

        values.insert(field.name.clone(), value);
        offset += field.width;
    }

    Ok(DecodedRecord {
        values,
        id_datetime,
    })
}

/// Render a `timeID` as an RFC 3339 UTC timestamp with nanoseconds
pub fn format_time_id(nanos: u64) -> String {
    let nanos = i64::try_from(nanos).unwrap_or(i64::MAX);
    Utc.timestamp_nanos(nanos)
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Byte offset of a field inside a slot
pub fn field_offset<'a>(fields: &'a [Field], name: &str) -> Option<(usize, &'a Field)> {
    let mut offset = 0;
    for field in fields {
        if field.name == name {
            return Some((offset, field));
        }
        offset += field.width;
    }
    None
}

/// Read a ref span from its 16-byte slot encoding
pub fn read_span(data: &[u8]) -> RefSpan {
    let (start, end) = data.split_at(data.len().min(8));
    RefSpan::new(le_u64(start), le_u64(end))
}

/// Write a ref span into a 16-byte slot encoding
pub fn write_span(span: RefSpan, out: &mut [u8]) {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&span.start.to_le_bytes());
    bytes[8..].copy_from_slice(&span.end.to_le_bytes());
    let n = out.len().min(16);
    out[..n].copy_from_slice(&bytes[..n]);
}

// =============================================================================
// Private Helpers
// =============================================================================

fn encode_value(field: &Field, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match (field.field_type, value) {
        (FieldType::String, Value::Text(s)) => {
            let bytes = truncate_text(s, field.width);
            buf.extend_from_slice(bytes);
            buf.resize(buf.len() + field.width - bytes.len(), 0);
        }
        (FieldType::Int, Value::Int(i)) => put_fixed(buf, &i.to_le_bytes(), field.width),
        (FieldType::Float, Value::Float(f)) => put_fixed(buf, &f.to_le_bytes(), field.width),
        (FieldType::TimeId, Value::TimeId(t)) => put_fixed(buf, &t.to_le_bytes(), field.width),
        (FieldType::Ref, Value::Ref(span)) => {
            let start = buf.len();
            buf.resize(start + field.width, 0);
            write_span(*span, &mut buf[start..]);
        }
        (field_type, value) => {
            return Err(HartoError::TypeMismatch {
                field: field.name.clone(),
                expected: expected_name(field_type),
                actual: value.type_name(),
            });
        }
    }
    Ok(())
}

fn decode_value(field: &Field, data: &[u8]) -> Value {
    match field.field_type {
        FieldType::String => {
            let end = data.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
            Value::Text(String::from_utf8_lossy(&data[..end]).into_owned())
        }
        FieldType::Int => Value::Int(le_u64(data) as i64),
        FieldType::Float => Value::Float(f64::from_bits(le_u64(data))),
        FieldType::TimeId => Value::TimeId(le_u64(data)),
        FieldType::Ref => Value::Ref(read_span(data)),
    }
}

/// What the codec expects to see for a field type
fn expected_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "text",
        FieldType::Int => "int",
        FieldType::Float => "float",
        FieldType::TimeId => "timeID",
        FieldType::Ref => "ref offsets",
    }
}

/// Longest prefix of `s` that fits in `width` bytes without splitting a char
fn truncate_text(s: &str, width: usize) -> &[u8] {
    if s.len() <= width {
        return s.as_bytes();
    }
    let mut end = width;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s.as_bytes()[..end]
}

/// Append `bytes` into exactly `width` bytes (truncate or zero-pad)
fn put_fixed(buf: &mut Vec<u8>, bytes: &[u8], width: usize) {
    let n = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..n]);
    buf.resize(buf.len() + width - n, 0);
}

/// Little-endian u64 from up to 8 bytes
fn le_u64(data: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    let n = data.len().min(8);
    bytes[..n].copy_from_slice(&data[..n]);
    u64::from_le_bytes(bytes)
}
