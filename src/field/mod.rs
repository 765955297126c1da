//! Field Module
//!
//! The fixed set of storable types, their binary widths, and the
//! constraint vocabulary.
//!
//! ## Widths
//! ```text
//! ┌──────────┬──────────────────────────────────────────────┐
//! │ string   │ N bytes (N >= 1), null padded                │
//! │ int      │ 8 bytes, little-endian i64                   │
//! │ float    │ 8 bytes, little-endian f64                   │
//! │ ref      │ 16 bytes, start (u64 LE) + end (u64 LE)      │
//! │ timeID   │ 8 bytes, little-endian u64 nanoseconds       │
//! └──────────┴──────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HartoError, Result};

/// Width of a `ref` field: two u64 offsets
pub const REF_WIDTH: usize = 16;

/// Width of a `timeID` field: u64 nanoseconds since the Unix epoch
pub const TIME_ID_WIDTH: usize = 8;

/// Width of `int` and `float` fields
pub const NUMERIC_WIDTH: usize = 8;

/// Name of the implicit primary key field
pub const ID_FIELD: &str = "id";

/// Logical type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "ref")]
    Ref,
    #[serde(rename = "timeID")]
    TimeId,
}

impl FieldType {
    /// Name as written in the table definition document
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Ref => "ref",
            FieldType::TimeId => "timeID",
        }
    }

    /// Parse a type name ("string", "int", "float", "ref", "timeID")
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldType::String),
            "int" => Some(FieldType::Int),
            "float" => Some(FieldType::Float),
            "ref" => Some(FieldType::Ref),
            "timeID" => Some(FieldType::TimeId),
            _ => None,
        }
    }

    /// The width this type requires, or None when any positive width works
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldType::String => None,
            FieldType::Int | FieldType::Float => Some(NUMERIC_WIDTH),
            FieldType::Ref => Some(REF_WIDTH),
            FieldType::TimeId => Some(TIME_ID_WIDTH),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    PrimaryKey,
    NotNull,
    Unique,
}

impl Constraint {
    /// Parse a constraint name ("primary_key", "not_null", "unique")
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "primary_key" => Some(Constraint::PrimaryKey),
            "not_null" => Some(Constraint::NotNull),
            "unique" => Some(Constraint::Unique),
            _ => None,
        }
    }
}

/// One named, typed, fixed-width column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Width of the field's slot in bytes
    #[serde(rename = "length")]
    pub width: usize,

    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Field {
    /// Create a field with no constraints
    pub fn new(name: impl Into<String>, field_type: FieldType, width: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            width,
            constraints: Vec::new(),
        }
    }

    /// `string` field of the given width
    pub fn string(name: impl Into<String>, width: usize) -> Self {
        Self::new(name, FieldType::String, width)
    }

    /// `int` field (8 bytes)
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int, NUMERIC_WIDTH)
    }

    /// `float` field (8 bytes)
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float, NUMERIC_WIDTH)
    }

    /// `ref` field (16 bytes of offsets)
    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Ref, REF_WIDTH)
    }

    /// Add a constraint
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    /// Shorthand for `with_constraint(Constraint::NotNull)`
    pub fn not_null(self) -> Self {
        self.with_constraint(Constraint::NotNull)
    }

    pub fn has_constraint(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }

    pub fn is_required(&self) -> bool {
        self.has_constraint(Constraint::NotNull)
    }

    /// Check this field's width against its type
    pub fn validate_width(&self) -> Result<()> {
        let ok = match self.field_type.fixed_width() {
            Some(expected) => self.width == expected,
            None => self.width >= 1,
        };

        if ok {
            return Ok(());
        }

        let expected = match self.field_type.fixed_width() {
            Some(w) => format!("{} bytes", w),
            None => "at least 1 byte".to_string(),
        };

        Err(HartoError::InvalidFieldWidth {
            field: self.name.clone(),
            field_type: self.field_type.to_string(),
            expected,
            actual: self.width,
        })
    }
}

/// The implicit primary key every table starts with
pub fn id_field() -> Field {
    Field::new(ID_FIELD, FieldType::TimeId, TIME_ID_WIDTH)
        .with_constraint(Constraint::PrimaryKey)
        .with_constraint(Constraint::NotNull)
        .with_constraint(Constraint::Unique)
}

/// Validate user-declared fields before a table is created
///
/// Rejects empty or duplicate names, a user field named `id`, and any
/// width that does not match its type.
pub fn validate_fields(fields: &[Field]) -> Result<()> {
    let mut seen = HashSet::new();

    for field in fields {
        if field.name.is_empty() {
            return Err(HartoError::InvalidName(
                "field names must not be empty".to_string(),
            ));
        }
        if field.name == ID_FIELD {
            return Err(HartoError::ImmutableField(ID_FIELD.to_string()));
        }
        if field.name.contains(['/', '\\', '.']) {
            return Err(HartoError::InvalidName(format!(
                "field name '{}' must not contain '/', '\\' or '.'",
                field.name
            )));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(HartoError::DuplicateField(field.name.clone()));
        }
        field.validate_width()?;
    }

    Ok(())
}

/// Total slot width of a record with these fields
pub fn record_width(fields: &[Field]) -> usize {
    fields.iter().map(|f| f.width).sum()
}
