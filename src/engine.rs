//! Engine Module
//!
//! The database handle that coordinates all components.
//!
//! ## Responsibilities
//! - Own the database root and thread it into every component
//! - Route catalog, record and transaction operations
//! - Own the cleanup worker's lifecycle
//!
//! One `Engine` corresponds to one root directory. Every component it
//! builds shares the same id cell, so ids are unique across direct writes
//! and transactions.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::catalog::{Catalog, Layout, Table};
use crate::cleanup::{CleanupWorker, CompactionStats, Compactor};
use crate::codec::FieldValues;
use crate::config::Config;
use crate::error::Result;
use crate::field::Field;
use crate::id::IdGenerator;
use crate::table::{Record, RecordIter, TableManager};
use crate::txn::{Transaction, TransactionManager};

/// The main database handle
///
/// ## Concurrency Model
///
/// - `Engine` is `Send + Sync`; share it behind an `Arc` for many callers.
/// - Writes, read snapshots and compactions of one table are serialized by
///   that table's lock; different tables proceed in parallel.
/// - Ids come from a lock-free generator shared by all components.
/// - The cleanup worker runs on its own thread and takes the same per-table
///   locks as callers.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Schemas, tables and their definition documents
    catalog: Catalog,

    /// Record CRUD (shared with transactions and the cleanup worker)
    tables: Arc<TableManager>,

    /// Staged operations
    transactions: TransactionManager,

    /// Background compaction
    worker: CleanupWorker,
}

impl Engine {
    /// Open or create a database with the given config
    ///
    /// On startup:
    /// 1. Create the root directory if needed
    /// 2. Build the id generator, catalog, table and transaction managers
    /// 3. Start the cleanup worker if an interval is configured
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Create root directory if it doesn't exist
        fs::create_dir_all(&config.root_dir)?;

        // Step 2: Components, all sharing one id cell
        let ids = IdGenerator::new();
        let layout = Layout::new(&config.root_dir, config.file_extension.clone());
        let catalog = Catalog::new(layout);
        let tables = Arc::new(TableManager::new(ids, config.sync_strategy));
        let transactions = TransactionManager::new(Arc::clone(&tables));
        let compactor = Arc::new(Compactor::new(catalog.clone(), Arc::clone(&tables)));
        let worker = CleanupWorker::new(compactor);

        // Step 3: Background cleanup
        if let Some(interval) = config.cleanup_interval {
            worker.start(interval)?;
        }

        info!(root = %config.root_dir.display(), "Database opened");

        Ok(Self {
            config,
            catalog,
            tables,
            transactions,
            worker,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified root directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().root_dir(path).build())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub fn create_schema(&self, name: &str) -> Result<()> {
        self.catalog.create_schema(name)
    }

    /// Create a table; the `id` field is added in front of `fields`
    pub fn create_table(&self, schema: &str, name: &str, fields: Vec<Field>) -> Result<Table> {
        self.catalog.create_table(schema, name, fields)
    }

    /// Load a table handle
    pub fn table(&self, schema: &str, name: &str) -> Result<Table> {
        self.catalog.table(schema, name)
    }

    /// Delete a table's files
    ///
    /// Runs inside the table's exclusive section so it never interleaves
    /// with a write or a compaction of the same table. The definition is not
    /// required to parse.
    pub fn delete_table(&self, schema: &str, name: &str) -> Result<()> {
        let locks = self.tables.locks();
        locks.with_name(schema, name, || self.catalog.delete_table(schema, name))?;
        locks.remove(schema, name);
        Ok(())
    }

    pub fn list_schemas(&self) -> Result<Vec<String>> {
        self.catalog.list_schemas()
    }

    pub fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        self.catalog.list_tables(schema)
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Insert a record with a freshly generated id
    pub fn insert(&self, table: &Table, values: FieldValues) -> Result<Record> {
        self.tables.insert(table, values)
    }

    /// Lazy iterator over a snapshot of the table's live records
    pub fn current_records(&self, table: &Table) -> Result<RecordIter> {
        self.tables.current_records(table)
    }

    /// Find a live record by id
    pub fn get(&self, table: &Table, id: u64) -> Result<Option<Record>> {
        self.tables.get(table, id)
    }

    /// Overwrite the changed fields of a record in place
    pub fn update(&self, table: &Table, record: &Record, changes: FieldValues) -> Result<Record> {
        self.tables.update(table, record, changes)
    }

    /// Tombstone a record
    pub fn delete(&self, table: &Table, record: &Record) -> Result<()> {
        self.tables.delete(table, record)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin(&self) -> Transaction {
        self.transactions.begin()
    }

    /// Apply a transaction's staged operations; see `TransactionManager::commit`
    pub fn commit(&self, tx: &mut Transaction) -> Result<Vec<Record>> {
        self.transactions.commit(tx)
    }

    pub fn rollback(&self, tx: &mut Transaction) -> Result<()> {
        self.transactions.rollback(tx)
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Run one cleanup cycle now
    ///
    /// Waits for a cycle already in flight on the worker thread.
    pub fn compact(&self) -> Result<CompactionStats> {
        self.worker.compactor().run_cycle()
    }

    pub fn start_cleanup_worker(&self, interval: Duration) -> Result<()> {
        self.worker.start(interval)
    }

    /// Stop the cleanup worker, waiting for an in-flight cycle
    pub fn stop_cleanup_worker(&self) -> Result<()> {
        self.worker.stop()
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Close the database gracefully
    ///
    /// Stops the cleanup worker if it is running
    pub fn close(self) -> Result<()> {
        if self.worker.is_running() {
            self.worker.stop()?;
        }
        info!(root = %self.config.root_dir.display(), "Database closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the root directory path
    pub fn root_dir(&self) -> &Path {
        &self.config.root_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the table manager
    pub fn tables(&self) -> &TableManager {
        &self.tables
    }
}
