//! Cleanup Module
//!
//! Background compaction of every table under the database root.
//!
//! ## Worker Loop
//! ```text
//!   start(interval) ──▶ thread: select! { stop ──▶ exit
//!                                         tick ──▶ run_cycle() }
//!   stop()          ──▶ send stop, join (waits for an in-flight cycle)
//! ```
//!
//! A cycle recomputes liveness from the files on disk; nothing is kept
//! between cycles, so the worker can be stopped and restarted freely. A
//! cycle mutex keeps at most one cycle in flight, whether it was started by
//! the timer or by a manual `run_cycle`.

mod compact;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, select, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::catalog::Catalog;
use crate::error::{HartoError, Result};
use crate::table::TableManager;

pub use compact::{compact_table, CompactionStats};

/// Runs compaction cycles over every table in a catalog
#[derive(Debug)]
pub struct Compactor {
    catalog: Catalog,
    tables: Arc<TableManager>,
    /// Held for the whole of a cycle
    cycle: Mutex<()>,
}

impl Compactor {
    pub fn new(catalog: Catalog, tables: Arc<TableManager>) -> Self {
        Self {
            catalog,
            tables,
            cycle: Mutex::new(()),
        }
    }

    /// Compact every table of every schema once
    ///
    /// A table that fails is logged, counted in `tables_failed` and skipped;
    /// the rest of the cycle continues.
    pub fn run_cycle(&self) -> Result<CompactionStats> {
        let _cycle = self.cycle.lock();
        let mut stats = CompactionStats::default();

        for schema in self.catalog.list_schemas()? {
            for name in self.catalog.list_tables(&schema)? {
                let table = match self.catalog.table(&schema, &name) {
                    Ok(table) => table,
                    Err(HartoError::TableNotFound { .. }) => continue,
                    Err(e) => {
                        error!(schema = %schema, table = %name, error = %e, "Cannot load table for compaction");
                        stats.tables_failed += 1;
                        continue;
                    }
                };

                match compact_table(&self.tables, &table) {
                    Ok(table_stats) => stats.merge(&table_stats),
                    Err(e) => {
                        error!(table = %table.qualified_name(), error = %e, "Compaction failed");
                        stats.tables_scanned += 1;
                        stats.tables_failed += 1;
                    }
                }
            }
        }

        debug!(?stats, "Cleanup cycle finished");
        Ok(stats)
    }
}

/// Handle to the running worker thread
#[derive(Debug)]
struct WorkerHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// Background cleanup worker with explicit start and stop
#[derive(Debug)]
pub struct CleanupWorker {
    compactor: Arc<Compactor>,
    handle: Mutex<Option<WorkerHandle>>,
}

impl CleanupWorker {
    pub fn new(compactor: Arc<Compactor>) -> Self {
        Self {
            compactor,
            handle: Mutex::new(None),
        }
    }

    /// The compactor shared with the worker thread
    pub fn compactor(&self) -> &Arc<Compactor> {
        &self.compactor
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Start the worker; the first cycle runs one interval after start
    pub fn start(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(HartoError::Worker(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }

        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Err(HartoError::Worker("cleanup worker already running".to_string()));
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let compactor = Arc::clone(&self.compactor);

        let thread = thread::Builder::new()
            .name("hartodb-cleanup".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                loop {
                    let stop = select! {
                        recv(stop_rx) -> _ => true,
                        recv(ticker) -> _ => {
                            match compactor.run_cycle() {
                                Ok(stats) if stats.tables_rewritten > 0 => info!(
                                    tables = stats.tables_rewritten,
                                    slots_removed = stats.slots_removed,
                                    ref_bytes_reclaimed = stats.ref_bytes_reclaimed,
                                    "Cleanup cycle reclaimed space"
                                ),
                                Ok(_) => {}
                                Err(e) => error!(error = %e, "Cleanup cycle failed"),
                            }
                            false
                        }
                    };
                    if stop {
                        break;
                    }
                }
                debug!("Cleanup worker exiting");
            })?;

        *handle = Some(WorkerHandle { stop_tx, thread });
        info!(interval_ms = interval.as_millis() as u64, "Cleanup worker started");
        Ok(())
    }

    /// Stop the worker, waiting for an in-flight cycle to finish
    pub fn stop(&self) -> Result<()> {
        let handle = self
            .handle
            .lock()
            .take()
            .ok_or_else(|| HartoError::Worker("cleanup worker is not running".to_string()))?;

        Self::shutdown(handle)?;
        info!("Cleanup worker stopped");
        Ok(())
    }

    fn shutdown(handle: WorkerHandle) -> Result<()> {
        // The receiver only disappears if the thread already exited
        let _ = handle.stop_tx.send(());
        handle
            .thread
            .join()
            .map_err(|_| HartoError::Worker("cleanup worker thread panicked".to_string()))
    }
}

impl Drop for CleanupWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            if let Err(e) = Self::shutdown(handle) {
                error!(error = %e, "Cleanup worker did not shut down cleanly");
            }
        }
    }
}
