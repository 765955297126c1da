//! Input validation
//!
//! Checks caller-supplied values against a table's fields before any file
//! is touched. Shared by direct writes and transaction staging.

use crate::catalog::Table;
use crate::codec::FieldValues;
use crate::error::{HartoError, Result};
use crate::field::{FieldType, ID_FIELD};

/// Validate the values of a new record
///
/// Rejects `id`, unknown fields, type mismatches and missing `not_null`
/// fields.
pub fn validate_insert(table: &Table, values: &FieldValues) -> Result<()> {
    validate_supplied(table, values)?;

    for field in table.fields().iter().filter(|f| f.name != ID_FIELD) {
        if field.is_required() && !values.contains_key(&field.name) {
            return Err(HartoError::MissingField(field.name.clone()));
        }
    }

    Ok(())
}

/// Validate the changed values of an update
pub fn validate_update(table: &Table, changes: &FieldValues) -> Result<()> {
    validate_supplied(table, changes)
}

fn validate_supplied(table: &Table, values: &FieldValues) -> Result<()> {
    for (name, value) in values {
        if name == ID_FIELD {
            return Err(HartoError::ImmutableField(name.clone()));
        }

        let field = table
            .definition()
            .field(name)
            .ok_or_else(|| HartoError::UnknownField(name.clone()))?;

        if !value.is_input_for(field.field_type) {
            return Err(HartoError::TypeMismatch {
                field: name.clone(),
                expected: input_name(field.field_type),
                actual: value.type_name(),
            });
        }
    }
    Ok(())
}

/// What a caller must supply for a field type
fn input_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String | FieldType::Ref => "text",
        FieldType::Int => "int",
        FieldType::Float => "float",
        FieldType::TimeId => "timeID",
    }
}
