//! Table definitions
//!
//! The JSON document persisted next to a table's data file, and the
//! `Table` handle built from it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HartoError, Result};
use crate::field::{id_field, record_width, Field, FieldType, ID_FIELD};

use super::Layout;

/// Persisted table definition; the source of truth for decoding
///
/// ```json
/// {
///   "tableName": "users",
///   "createdAt": "2024-01-01T12:00:00+00:00",
///   "fields": [
///     { "name": "id", "type": "timeID", "length": 8,
///       "constraints": ["primary_key", "not_null", "unique"] },
///     { "name": "name", "type": "string", "length": 16, "constraints": [] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub table_name: String,
    pub created_at: String,
    pub fields: Vec<Field>,
}

impl TableDefinition {
    /// Build a definition from user fields, prepending the implicit `id`
    pub fn new(table_name: impl Into<String>, fields: Vec<Field>) -> Self {
        let mut all = Vec::with_capacity(fields.len() + 1);
        all.push(id_field());
        all.extend(fields);

        Self {
            table_name: table_name.into(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            fields: all,
        }
    }

    /// Read a definition document
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let definition: TableDefinition = serde_json::from_str(&json)?;
        definition.check()?;
        Ok(definition)
    }

    /// Write the definition document (pretty-printed)
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields of type `ref`, in declared order
    pub fn ref_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::Ref)
    }

    /// Width of one record slot
    pub fn record_width(&self) -> usize {
        record_width(&self.fields)
    }

    /// Sanity checks for a definition read from disk
    fn check(&self) -> Result<()> {
        match self.fields.first() {
            Some(f) if f.name == ID_FIELD && f.field_type == FieldType::TimeId => {}
            _ => {
                return Err(HartoError::Serialization(format!(
                    "table {} does not start with a timeID '{}' field",
                    self.table_name, ID_FIELD
                )));
            }
        }
        for field in &self.fields {
            field
                .validate_width()
                .map_err(|e| HartoError::Serialization(e.to_string()))?;
        }
        Ok(())
    }
}

/// Cheap, cloneable handle to one table
#[derive(Debug, Clone)]
pub struct Table {
    inner: Arc<TableInner>,
}

#[derive(Debug)]
struct TableInner {
    schema: String,
    definition: TableDefinition,
    data_path: PathBuf,
    definition_path: PathBuf,
    /// (field name, side file path) for every ref field
    ref_paths: Vec<(String, PathBuf)>,
}

impl Table {
    /// Build a handle from a definition and the layout it lives in
    pub fn new(schema: &str, definition: TableDefinition, layout: &Layout) -> Self {
        let name = definition.table_name.clone();
        let ref_paths = definition
            .ref_fields()
            .map(|f| (f.name.clone(), layout.ref_file(schema, &name, &f.name)))
            .collect();

        Self {
            inner: Arc::new(TableInner {
                schema: schema.to_string(),
                data_path: layout.data_file(schema, &name),
                definition_path: layout.definition_file(schema, &name),
                ref_paths,
                definition,
            }),
        }
    }

    pub fn schema(&self) -> &str {
        &self.inner.schema
    }

    pub fn name(&self) -> &str {
        &self.inner.definition.table_name
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.inner.definition
    }

    /// All fields, starting with `id`
    pub fn fields(&self) -> &[Field] {
        &self.inner.definition.fields
    }

    pub fn record_width(&self) -> usize {
        self.inner.definition.record_width()
    }

    pub fn data_path(&self) -> &Path {
        &self.inner.data_path
    }

    pub fn definition_path(&self) -> &Path {
        &self.inner.definition_path
    }

    /// Side file of a ref field
    pub fn ref_path(&self, field: &str) -> Option<&Path> {
        self.inner
            .ref_paths
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, path)| path.as_path())
    }

    /// (field name, side file) pairs for every ref field
    pub fn ref_paths(&self) -> &[(String, PathBuf)] {
        &self.inner.ref_paths
    }

    /// "schema.table", for logs and lock keys
    pub fn qualified_name(&self) -> String {
        Self::qualify(self.schema(), self.name())
    }

    /// "schema.table" for a table that need not be loaded
    pub fn qualify(schema: &str, table: &str) -> String {
        format!("{}.{}", schema, table)
    }
}
