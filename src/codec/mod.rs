//! Codec Module
//!
//! Encodes and decodes fixed-width binary record slots.
//!
//! ## Slot Format
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────┐
//! │ id (8)       │ field 1 (w1) │ field 2 (w2) │ ... │
//! └──────────────┴──────────────┴──────────────┴─────┘
//! ```
//! - Numbers are little-endian; text is null padded (and truncated).
//! - A `ref` slot holds `start (8) | end (8)` into the field's side file.
//! - A deleted slot has its id overwritten with `TOMBSTONE_ID`.
//!
//! The codec never touches side files: `ref` values go in and come out as
//! `RefSpan`s, and the table layer owns resolution.

mod record;
mod value;

pub use record::{
    decode, encode, field_offset, format_time_id, read_span, write_span, DecodedRecord,
};
pub use value::{FieldValues, RefSpan, Value};

/// Id written over a deleted slot; never issued by the id generator
pub const TOMBSTONE_ID: u64 = 0;
