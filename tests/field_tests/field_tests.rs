//! Tests for the field type system
//!
//! These tests verify:
//! - Type name parsing and fixed widths
//! - Width validation per type
//! - Field list validation (names, duplicates, reserved `id`)

use hartodb::field::{id_field, record_width, validate_fields, REF_WIDTH};
use hartodb::{Constraint, Field, FieldType, HartoError};

// =============================================================================
// Type Names
// =============================================================================

#[test]
fn test_field_type_parse_round_trip() {
    for ty in [
        FieldType::String,
        FieldType::Int,
        FieldType::Float,
        FieldType::Ref,
        FieldType::TimeId,
    ] {
        assert_eq!(FieldType::parse(ty.as_str()), Some(ty));
    }
    assert_eq!(FieldType::parse("timeID"), Some(FieldType::TimeId));
    assert_eq!(FieldType::parse("blob"), None);
}

#[test]
fn test_field_type_fixed_widths() {
    assert_eq!(FieldType::Int.fixed_width(), Some(8));
    assert_eq!(FieldType::Float.fixed_width(), Some(8));
    assert_eq!(FieldType::Ref.fixed_width(), Some(16));
    assert_eq!(FieldType::TimeId.fixed_width(), Some(8));
    assert_eq!(FieldType::String.fixed_width(), None);
}

#[test]
fn test_constraint_parse() {
    assert_eq!(Constraint::parse("not_null"), Some(Constraint::NotNull));
    assert_eq!(Constraint::parse("primary_key"), Some(Constraint::PrimaryKey));
    assert_eq!(Constraint::parse("unique"), Some(Constraint::Unique));
    assert_eq!(Constraint::parse("notnull"), None);
}

// =============================================================================
// Width Validation
// =============================================================================

#[test]
fn test_ref_width_must_be_16() {
    let ok = Field::reference("bio");
    assert_eq!(ok.width, REF_WIDTH);
    assert!(ok.validate_width().is_ok());

    let bad = Field::new("bio", FieldType::Ref, 8);
    match bad.validate_width() {
        Err(HartoError::InvalidFieldWidth { field, actual, .. }) => {
            assert_eq!(field, "bio");
            assert_eq!(actual, 8);
        }
        other => panic!("expected InvalidFieldWidth, got {:?}", other),
    }
}

#[test]
fn test_time_id_width_must_be_8() {
    assert!(Field::new("at", FieldType::TimeId, 8).validate_width().is_ok());
    assert!(Field::new("at", FieldType::TimeId, 4).validate_width().is_err());
}

#[test]
fn test_numeric_widths_must_be_8() {
    assert!(Field::new("n", FieldType::Int, 4).validate_width().is_err());
    assert!(Field::new("x", FieldType::Float, 16).validate_width().is_err());
}

#[test]
fn test_string_width_must_be_positive() {
    assert!(Field::string("s", 1).validate_width().is_ok());
    assert!(Field::string("s", 0).validate_width().is_err());
}

// =============================================================================
// Field Lists
// =============================================================================

#[test]
fn test_validate_fields_rejects_duplicates() {
    let fields = vec![Field::string("name", 8), Field::int("name")];
    assert!(matches!(
        validate_fields(&fields),
        Err(HartoError::DuplicateField(name)) if name == "name"
    ));
}

#[test]
fn test_validate_fields_rejects_user_id() {
    let fields = vec![Field::int("id")];
    assert!(matches!(
        validate_fields(&fields),
        Err(HartoError::ImmutableField(_))
    ));
}

#[test]
fn test_validate_fields_rejects_bad_names() {
    assert!(validate_fields(&[Field::int("")]).is_err());
    assert!(validate_fields(&[Field::int("a.b")]).is_err());
    assert!(validate_fields(&[Field::int("a/b")]).is_err());
}

#[test]
fn test_id_field_and_record_width() {
    let id = id_field();
    assert_eq!(id.name, "id");
    assert_eq!(id.field_type, FieldType::TimeId);
    assert!(id.has_constraint(Constraint::PrimaryKey));
    assert!(id.is_required());

    let fields = vec![id, Field::string("name", 16), Field::int("age"), Field::reference("bio")];
    assert_eq!(record_width(&fields), 8 + 16 + 8 + 16);
}

#[test]
fn test_with_constraint_is_idempotent() {
    let field = Field::int("age").not_null().not_null();
    assert_eq!(field.constraints, vec![Constraint::NotNull]);
}
