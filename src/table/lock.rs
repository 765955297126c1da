//! Per-table exclusive sections
//!
//! Every write, every read snapshot and every compaction of a table runs
//! while holding that table's mutex, so a compaction never races a live
//! write and a reader never sees a half-rewritten file.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::Table;

/// Registry of table mutexes, keyed by "schema.table"
#[derive(Debug, Default)]
pub struct TableLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` inside the table's exclusive section
    pub fn with<R>(&self, table: &Table, f: impl FnOnce() -> R) -> R {
        self.with_key(&table.qualified_name(), f)
    }

    /// Run `f` inside the exclusive section of a table known only by name
    pub fn with_name<R>(&self, schema: &str, table: &str, f: impl FnOnce() -> R) -> R {
        self.with_key(&Table::qualify(schema, table), f)
    }

    /// Number of tables that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget a table's mutex (after the table is deleted)
    pub fn remove(&self, schema: &str, table: &str) {
        self.locks.lock().remove(&Table::qualify(schema, table));
    }

    fn with_key<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        let _guard = lock.lock();
        f()
    }
}
