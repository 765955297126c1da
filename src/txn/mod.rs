//! Transaction Module
//!
//! Stages inserts, updates and deletes in memory and applies them against
//! the table manager on commit.
//!
//! # Transaction States
//!
//! ```text
//! ┌───────┐   begin()   ┌──────┐
//! │ Start │────────────▶│ Open │──── stage_insert / stage_update / stage_delete
//! └───────┘             └──────┘
//!                          │
//!              ┌───────────┼─────────────┐
//!          commit()    commit() fails  rollback()
//!              │           │             │
//!              ▼           ▼             ▼
//!       ┌───────────┐ ┌────────┐ ┌────────────┐
//!       │ Committed │ │ Failed │ │ RolledBack │
//!       └───────────┘ └────────┘ └────────────┘
//! ```
//!
//! Staging validates input eagerly but never touches a file. A commit that
//! fails part-way leaves the operations already applied in place and reports
//! how far it got (`HartoError::PartialCommit`).
//!
//! A staged insert takes its id when it is staged, but its slot is only
//! appended at commit. A direct insert made in between therefore lands
//! earlier in the data file with a larger id: file order and id order agree
//! only for inserts that are not interleaved with an open transaction.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::Table;
use crate::codec::{FieldValues, Value};
use crate::error::{HartoError, Result};
use crate::field::ID_FIELD;
use crate::id::IdGenerator;
use crate::table::{validate_insert, validate_update, Record, TableManager};

/// The state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Operations can be staged
    Open,
    /// Every staged operation was applied
    Committed,
    /// Staged operations were discarded
    RolledBack,
    /// Commit stopped part-way; applied operations were kept
    Failed,
}

impl TxnState {
    /// True once the transaction can no longer be used
    pub fn is_ended(&self) -> bool {
        !matches!(self, TxnState::Open)
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnState::Open => write!(f, "open"),
            TxnState::Committed => write!(f, "committed"),
            TxnState::RolledBack => write!(f, "rolled back"),
            TxnState::Failed => write!(f, "failed"),
        }
    }
}

/// One staged operation
#[derive(Debug, Clone)]
enum StagedOp {
    Insert {
        table: Table,
        id: u64,
        values: FieldValues,
    },
    Update {
        table: Table,
        record: Record,
        changes: FieldValues,
    },
    Delete {
        table: Table,
        record: Record,
    },
}

impl StagedOp {
    fn kind(&self) -> &'static str {
        match self {
            StagedOp::Insert { .. } => "insert",
            StagedOp::Update { .. } => "update",
            StagedOp::Delete { .. } => "delete",
        }
    }
}

/// A transaction handle
///
/// Created by `TransactionManager::begin`. Staged operations live only in
/// this value until it is committed.
#[derive(Debug)]
pub struct Transaction {
    /// Unique transaction ID
    id: u64,
    /// Current state
    state: TxnState,
    /// Operations in staging order
    ops: Vec<StagedOp>,
    /// Id source for staged inserts
    ids: IdGenerator,
}

impl Transaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Number of staged operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Stage an insert
    ///
    /// The returned record carries the id the row will have once committed.
    /// It has no slot offset yet.
    pub fn stage_insert(&mut self, table: &Table, values: FieldValues) -> Result<Record> {
        self.ensure_open()?;
        validate_insert(table, &values)?;

        let id = self.ids.next_id();
        let mut provisional = values.clone();
        provisional.insert(ID_FIELD.to_string(), Value::TimeId(id));

        self.ops.push(StagedOp::Insert {
            table: table.clone(),
            id,
            values,
        });
        debug!(txn_id = self.id, table = %table.qualified_name(), id, "Insert staged");

        Ok(Record::new(id, None, provisional, Default::default()))
    }

    /// Stage an update of an existing (or staged) record
    ///
    /// Returns the record as it will read after the commit.
    pub fn stage_update(
        &mut self,
        table: &Table,
        record: &Record,
        changes: FieldValues,
    ) -> Result<Record> {
        self.ensure_open()?;
        validate_update(table, &changes)?;

        let mut merged = record.values().clone();
        merged.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        let provisional = Record::new(record.id(), record.slot_offset(), merged, Default::default());

        self.ops.push(StagedOp::Update {
            table: table.clone(),
            record: record.clone(),
            changes,
        });
        debug!(txn_id = self.id, table = %table.qualified_name(), id = record.id(), "Update staged");

        Ok(provisional)
    }

    /// Stage a delete
    pub fn stage_delete(&mut self, table: &Table, record: &Record) -> Result<()> {
        self.ensure_open()?;

        self.ops.push(StagedOp::Delete {
            table: table.clone(),
            record: record.clone(),
        });
        debug!(txn_id = self.id, table = %table.qualified_name(), id = record.id(), "Delete staged");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.is_ended() {
            return Err(HartoError::TransactionClosed {
                txn_id: self.id,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }
}

/// Applies staged operations against the table manager
#[derive(Debug, Clone)]
pub struct TransactionManager {
    tables: Arc<TableManager>,
    ids: IdGenerator,
}

impl TransactionManager {
    pub fn new(tables: Arc<TableManager>) -> Self {
        let ids = tables.ids().clone();
        Self { tables, ids }
    }

    /// Start a transaction with a fresh id and no staged operations
    pub fn begin(&self) -> Transaction {
        let id = self.ids.next_id();
        debug!(txn_id = id, "Transaction started");
        Transaction {
            id,
            state: TxnState::Open,
            ops: Vec::new(),
            ids: self.ids.clone(),
        }
    }

    /// Apply every staged operation in staging order
    ///
    /// Returns the stored records written by inserts and updates, in staging
    /// order. On the first failure the remaining operations are abandoned,
    /// the applied ones stay, and the transaction ends up `Failed`.
    pub fn commit(&self, tx: &mut Transaction) -> Result<Vec<Record>> {
        tx.ensure_open()?;

        let ops = std::mem::take(&mut tx.ops);
        let total = ops.len();
        let mut written = Vec::with_capacity(total);

        for (applied, op) in ops.into_iter().enumerate() {
            let kind = op.kind();
            let result = match op {
                StagedOp::Insert { table, id, values } => self
                    .tables
                    .insert_with_id(&table, id, values)
                    .map(Some),
                StagedOp::Update {
                    table,
                    record,
                    changes,
                } => self.tables.update(&table, &record, changes).map(Some),
                StagedOp::Delete { table, record } => {
                    self.tables.delete(&table, &record).map(|()| None)
                }
            };

            match result {
                Ok(Some(record)) => written.push(record),
                Ok(None) => {}
                Err(e) => {
                    tx.state = TxnState::Failed;
                    warn!(
                        txn_id = tx.id,
                        applied,
                        total,
                        operation = kind,
                        error = %e,
                        "Commit stopped part-way; applied operations are kept"
                    );
                    return Err(HartoError::PartialCommit {
                        txn_id: tx.id,
                        applied,
                        total,
                        source: Box::new(e),
                    });
                }
            }
        }

        tx.state = TxnState::Committed;
        info!(txn_id = tx.id, operations = total, "Transaction committed");
        Ok(written)
    }

    /// Discard every staged operation
    ///
    /// Nothing was written while staging, so there is nothing to undo.
    pub fn rollback(&self, tx: &mut Transaction) -> Result<()> {
        tx.ensure_open()?;

        let discarded = tx.ops.len();
        tx.ops.clear();
        tx.state = TxnState::RolledBack;

        debug!(txn_id = tx.id, discarded, "Transaction rolled back");
        Ok(())
    }
}
