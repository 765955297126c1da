//! On-disk layout
//!
//! Maps schemas, tables and ref fields to paths under the database root.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Name of the schema marker file stem; tables may not use it
pub const CATALOG_NAME: &str = "index";

/// Names starting with this prefix are reserved
pub const RESERVED_PREFIX: &str = ".";

/// Suffix of a file being rewritten by compaction
const COMPACTION_SUFFIX: &str = ".compact";

/// Path conventions for one database root
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    ext: String,
}

impl Layout {
    /// Create a layout for `root` using the extension `ext` (no leading dot)
    pub fn new(root: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ext: ext.into(),
        }
    }

    /// Database root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<schema>`
    pub fn schema_dir(&self, schema: &str) -> PathBuf {
        self.root.join(schema)
    }

    /// `<root>/<schema>/index.conf.<ext>`
    pub fn schema_marker(&self, schema: &str) -> PathBuf {
        self.schema_dir(schema)
            .join(format!("{}.conf.{}", CATALOG_NAME, self.ext))
    }

    /// `<root>/<schema>/<table>.<ext>`
    pub fn data_file(&self, schema: &str, table: &str) -> PathBuf {
        self.schema_dir(schema).join(format!("{}.{}", table, self.ext))
    }

    /// `<root>/<schema>/<table>.conf.<ext>`
    pub fn definition_file(&self, schema: &str, table: &str) -> PathBuf {
        self.schema_dir(schema)
            .join(format!("{}.conf.{}", table, self.ext))
    }

    /// `<root>/<schema>/<table>.<field>.data.<ext>`
    pub fn ref_file(&self, schema: &str, table: &str, field: &str) -> PathBuf {
        self.schema_dir(schema)
            .join(format!("{}.{}.data.{}", table, field, self.ext))
    }

    /// Table name of a definition file name, if it is one
    ///
    /// "users.conf.htdb" → Some("users"); "index.conf.htdb" → None
    pub fn table_from_definition(&self, file_name: &str) -> Option<String> {
        let suffix = format!(".conf.{}", self.ext);
        let table = file_name.strip_suffix(&suffix)?;
        if table.is_empty() || table == CATALOG_NAME || table.starts_with(RESERVED_PREFIX) {
            return None;
        }
        Some(table.to_string())
    }

    /// Field name of a side file name belonging to `table`, if it is one
    ///
    /// ("users", "users.bio.data.htdb") → Some("bio")
    pub fn field_from_ref_file(&self, table: &str, file_name: &str) -> Option<String> {
        let suffix = format!(".data.{}", self.ext);
        let field = file_name
            .strip_prefix(table)?
            .strip_prefix('.')?
            .strip_suffix(&suffix)?;
        if field.is_empty() {
            return None;
        }
        Some(field.to_string())
    }
}

/// Temporary path a compaction writes before renaming over `path`
pub fn compaction_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(COMPACTION_SUFFIX);
    PathBuf::from(name)
}
