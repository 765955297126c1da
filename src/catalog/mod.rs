//! Catalog Module
//!
//! Creates and validates schemas and tables, and persists table
//! definitions.
//!
//! ## Responsibilities
//! - Schema directories and their marker files
//! - Table name and field width validation before any file is created
//! - Data file, ref side files and definition document per table
//! - Enumerating schemas and tables for the cleanup worker
//!
//! Table creation and deletion touch several files and are not atomic: a
//! failure part-way leaves the files already created (or not yet removed) in
//! place, and the error is reported to the caller.

mod definition;
mod layout;

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::{HartoError, Result};
use crate::field::{validate_fields, Field};

pub use definition::{Table, TableDefinition};
pub use layout::{compaction_path, Layout, CATALOG_NAME, RESERVED_PREFIX};

/// Schema and table store rooted at one directory
#[derive(Debug, Clone)]
pub struct Catalog {
    layout: Layout,
}

impl Catalog {
    /// Create a catalog over an existing layout
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    /// Create a schema directory and its marker file
    ///
    /// Fails if the directory already exists.
    pub fn create_schema(&self, name: &str) -> Result<()> {
        validate_name("schema", name)?;

        let dir = self.layout.schema_dir(name);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(HartoError::SchemaExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.layout.schema_marker(name))?;

        info!(schema = name, "Schema created");
        Ok(())
    }

    /// True if the schema directory exists
    pub fn schema_exists(&self, name: &str) -> bool {
        !name.is_empty() && self.layout.schema_dir(name).is_dir()
    }

    /// Names of all schemas (directories holding a marker file), sorted
    pub fn list_schemas(&self) -> Result<Vec<String>> {
        let mut schemas = Vec::new();

        let entries = match fs::read_dir(self.layout.root()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(schemas),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.layout.schema_marker(&name).is_file() {
                schemas.push(name);
            }
        }

        schemas.sort();
        Ok(schemas)
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Create a table
    ///
    /// Steps:
    /// 1. Validate schema, table name and fields (no file touched yet)
    /// 2. Prepend the implicit `id` field
    /// 3. Create the data file and one side file per ref field
    /// 4. Write the definition document
    pub fn create_table(&self, schema: &str, name: &str, fields: Vec<Field>) -> Result<Table> {
        self.require_schema(schema)?;
        validate_table_name(name)?;

        let data_path = self.layout.data_file(schema, name);
        let definition_path = self.layout.definition_file(schema, name);
        if data_path.exists() || definition_path.exists() {
            return Err(HartoError::TableExists(name.to_string()));
        }

        validate_fields(&fields)?;
        let definition = TableDefinition::new(name, fields);

        // A concurrent create of the same name loses here
        match OpenOptions::new().write(true).create_new(true).open(&data_path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(HartoError::TableExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        for field in definition.ref_fields() {
            let path = self.layout.ref_file(schema, name, &field.name);
            OpenOptions::new().write(true).create(true).open(&path)?;
        }

        if let Err(e) = definition.write(&definition_path) {
            warn!(
                schema,
                table = name,
                error = %e,
                "Definition write failed; data files left in place"
            );
            return Err(e);
        }

        info!(
            schema,
            table = name,
            fields = definition.fields.len(),
            record_width = definition.record_width(),
            "Table created"
        );
        Ok(Table::new(schema, definition, &self.layout))
    }

    /// Load a table handle from its definition document
    pub fn table(&self, schema: &str, name: &str) -> Result<Table> {
        self.require_schema(schema)?;

        let path = self.layout.definition_file(schema, name);
        if !path.is_file() {
            return Err(HartoError::TableNotFound {
                schema: schema.to_string(),
                table: name.to_string(),
            });
        }

        let definition = TableDefinition::load(&path)?;
        debug!(schema, table = name, "Table definition loaded");
        Ok(Table::new(schema, definition, &self.layout))
    }

    /// Names of all tables in a schema, sorted
    pub fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        self.require_schema(schema)?;

        let mut tables = Vec::new();
        for entry in fs::read_dir(self.layout.schema_dir(schema))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(table) = self.layout.table_from_definition(&file_name) {
                tables.push(table);
            }
        }

        tables.sort();
        Ok(tables)
    }

    /// Delete a table
    ///
    /// Removes the definition document, then the data file, then any ref
    /// side files. Only the definition's presence is required: if it no
    /// longer parses, the side files are found by name instead. A failure is
    /// reported without restoring what was already removed.
    pub fn delete_table(&self, schema: &str, name: &str) -> Result<()> {
        self.require_schema(schema)?;

        let definition_path = self.layout.definition_file(schema, name);
        if !definition_path.is_file() {
            return Err(HartoError::TableNotFound {
                schema: schema.to_string(),
                table: name.to_string(),
            });
        }

        // Listed before the definition goes away
        let side_files: Vec<(String, PathBuf)> = match TableDefinition::load(&definition_path) {
            Ok(definition) => definition
                .ref_fields()
                .map(|f| (f.name.clone(), self.layout.ref_file(schema, name, &f.name)))
                .collect(),
            Err(e) => {
                warn!(
                    schema,
                    table = name,
                    error = %e,
                    "Definition unreadable; locating side files by name"
                );
                self.side_files_on_disk(schema, name)?
            }
        };

        fs::remove_file(&definition_path)?;

        match fs::remove_file(self.layout.data_file(schema, name)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(schema, table = name, "Data file was already gone");
            }
            Err(e) => {
                warn!(
                    schema,
                    table = name,
                    error = %e,
                    "Definition removed but data file could not be"
                );
                return Err(e.into());
            }
        }

        let mut first_error = None;
        for (field, path) in &side_files {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(schema, table = name, field = %field, error = %e, "Side file not removed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e.into());
        }

        info!(schema, table = name, "Table deleted");
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// (field, path) of every side file named after `table`
    fn side_files_on_disk(&self, schema: &str, table: &str) -> Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.layout.schema_dir(schema))? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(field) = self.layout.field_from_ref_file(table, &file_name) {
                files.push((field, entry.path()));
            }
        }
        Ok(files)
    }

    fn require_schema(&self, schema: &str) -> Result<()> {
        if schema.is_empty() {
            return Err(HartoError::InvalidName(
                "a schema has to be selected".to_string(),
            ));
        }
        if !self.schema_exists(schema) {
            return Err(HartoError::SchemaNotFound(schema.to_string()));
        }
        Ok(())
    }
}

/// Common rules for schema and table names
fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(HartoError::InvalidName(format!(
            "{} name must not be empty",
            kind
        )));
    }
    if name.starts_with(RESERVED_PREFIX) {
        return Err(HartoError::InvalidName(format!(
            "{} name '{}' must not start with '{}'",
            kind, name, RESERVED_PREFIX
        )));
    }
    if name.contains(['/', '\\']) {
        return Err(HartoError::InvalidName(format!(
            "{} name '{}' must not contain path separators",
            kind, name
        )));
    }
    Ok(())
}

fn validate_table_name(name: &str) -> Result<()> {
    validate_name("table", name)?;
    if name == CATALOG_NAME {
        return Err(HartoError::InvalidName(format!(
            "a table cannot be named \"{}\"",
            CATALOG_NAME
        )));
    }
    // '.' separates table, field and extension in side file names
    if name.contains('.') {
        return Err(HartoError::InvalidName(format!(
            "table name '{}' must not contain '.'",
            name
        )));
    }
    Ok(())
}
