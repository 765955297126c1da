//! Tests for the transaction manager
//!
//! These tests verify:
//! - Staging validates eagerly and touches no file
//! - Commit applies staged operations in order
//! - Rollback discards everything
//! - A failing commit keeps applied operations and reports progress

use std::fs;

use hartodb::config::Config;
use hartodb::txn::TxnState;
use hartodb::{Engine, Field, FieldValues, HartoError, Table, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (TempDir, Engine, Table) {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(Config::builder().root_dir(temp.path()).build()).unwrap();
    engine.create_schema("s").unwrap();
    let table = engine
        .create_table(
            "s",
            "accounts",
            vec![
                Field::string("owner", 16).not_null(),
                Field::int("balance"),
                Field::reference("notes"),
            ],
        )
        .unwrap();
    (temp, engine, table)
}

fn account(owner: &str, balance: i64) -> FieldValues {
    let mut values = FieldValues::new();
    values.insert("owner".into(), Value::from(owner));
    values.insert("balance".into(), Value::Int(balance));
    values
}

fn ids(engine: &Engine, table: &Table) -> Vec<u64> {
    engine
        .current_records(table)
        .unwrap()
        .map(|r| r.unwrap().id())
        .collect()
}

fn data_len(table: &Table) -> u64 {
    fs::metadata(table.data_path()).unwrap().len()
}

// =============================================================================
// Staging
// =============================================================================

#[test]
fn test_begin_assigns_fresh_ids() {
    let (_temp, engine, _table) = setup();

    let a = engine.begin();
    let b = engine.begin();

    assert_ne!(a.id(), b.id());
    assert_eq!(a.state(), TxnState::Open);
    assert!(a.is_empty());
}

#[test]
fn test_stage_insert_touches_no_file() {
    let (_temp, engine, table) = setup();
    let mut tx = engine.begin();

    let mut values = account("alice", 100);
    values.insert("notes".into(), Value::from("vip"));
    let provisional = tx.stage_insert(&table, values).unwrap();

    assert_eq!(tx.len(), 1);
    assert_eq!(provisional.slot_offset(), None);
    assert_eq!(provisional.get("id"), Some(&Value::TimeId(provisional.id())));
    assert_eq!(data_len(&table), 0);
    assert_eq!(fs::metadata(table.ref_path("notes").unwrap()).unwrap().len(), 0);
}

#[test]
fn test_stage_insert_validates_eagerly() {
    let (_temp, engine, table) = setup();
    let mut tx = engine.begin();

    let mut values = FieldValues::new();
    values.insert("balance".into(), Value::Int(5));
    assert!(matches!(
        tx.stage_insert(&table, values),
        Err(HartoError::MissingField(_))
    ));

    let mut values = account("bob", 1);
    values.insert("balance".into(), Value::Float(1.5));
    assert!(matches!(
        tx.stage_insert(&table, values),
        Err(HartoError::TypeMismatch { .. })
    ));

    assert!(tx.is_empty());
}

// =============================================================================
// Commit
// =============================================================================

#[test]
fn test_commit_applies_in_order() {
    let (_temp, engine, table) = setup();
    let mut tx = engine.begin();

    let a = tx.stage_insert(&table, account("alice", 10)).unwrap();
    let b = tx.stage_insert(&table, account("bob", 20)).unwrap();
    assert!(ids(&engine, &table).is_empty());

    let written = engine.commit(&mut tx).unwrap();

    assert_eq!(tx.state(), TxnState::Committed);
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].id(), a.id());
    assert_eq!(written[1].id(), b.id());
    assert_eq!(ids(&engine, &table), vec![a.id(), b.id()]);
}

#[test]
fn test_staged_insert_keeps_id_from_staging_time() {
    let (_temp, engine, table) = setup();
    let mut tx = engine.begin();

    let staged = tx.stage_insert(&table, account("staged", 1)).unwrap();
    let direct = engine.insert(&table, account("direct", 2)).unwrap();
    engine.commit(&mut tx).unwrap();

    // File order follows commit, ids follow staging
    assert!(staged.id() < direct.id());
    assert_eq!(ids(&engine, &table), vec![direct.id(), staged.id()]);
}

#[test]
fn test_commit_update_of_staged_insert() {
    let (_temp, engine, table) = setup();
    let mut tx = engine.begin();

    let provisional = tx.stage_insert(&table, account("carol", 1)).unwrap();
    let mut changes = FieldValues::new();
    changes.insert("balance".into(), Value::Int(99));
    changes.insert("notes".into(), Value::from("raised"));
    let expected = tx.stage_update(&table, &provisional, changes).unwrap();
    assert_eq!(expected.get("balance"), Some(&Value::Int(99)));

    engine.commit(&mut tx).unwrap();

    let stored = engine.get(&table, provisional.id()).unwrap().unwrap();
    assert_eq!(stored.get("balance"), Some(&Value::Int(99)));
    assert_eq!(stored.get("notes"), Some(&Value::from("raised")));
    assert_eq!(stored.get("owner"), Some(&Value::from("carol")));
}

#[test]
fn test_commit_staged_delete() {
    let (_temp, engine, table) = setup();
    let keep = engine.insert(&table, account("keep", 1)).unwrap();
    let gone = engine.insert(&table, account("gone", 2)).unwrap();

    let mut tx = engine.begin();
    tx.stage_delete(&table, &gone).unwrap();
    assert_eq!(ids(&engine, &table).len(), 2);

    let written = engine.commit(&mut tx).unwrap();
    assert!(written.is_empty());
    assert_eq!(ids(&engine, &table), vec![keep.id()]);
}

#[test]
fn test_empty_commit_succeeds() {
    let (_temp, engine, _table) = setup();
    let mut tx = engine.begin();

    assert!(engine.commit(&mut tx).unwrap().is_empty());
    assert_eq!(tx.state(), TxnState::Committed);
}

#[test]
fn test_partial_commit_keeps_applied_operations() {
    let (_temp, engine, table) = setup();
    let victim = engine.insert(&table, account("victim", 1)).unwrap();
    engine.delete(&table, &victim).unwrap();

    let mut tx = engine.begin();
    let first = tx.stage_insert(&table, account("first", 1)).unwrap();
    let mut changes = FieldValues::new();
    changes.insert("balance".into(), Value::Int(2));
    // Staging succeeds; the record is already gone when the commit runs
    tx.stage_update(&table, &victim, changes).unwrap();
    tx.stage_insert(&table, account("never", 3)).unwrap();

    match engine.commit(&mut tx) {
        Err(HartoError::PartialCommit {
            txn_id,
            applied,
            total,
            source,
        }) => {
            assert_eq!(txn_id, tx.id());
            assert_eq!(applied, 1);
            assert_eq!(total, 3);
            assert!(matches!(*source, HartoError::RecordNotFound(_)));
        }
        other => panic!("expected PartialCommit, got {:?}", other),
    }

    assert_eq!(tx.state(), TxnState::Failed);
    assert_eq!(ids(&engine, &table), vec![first.id()]);
}

// =============================================================================
// Rollback / Ended Transactions
// =============================================================================

#[test]
fn test_rollback_discards_staged_operations() {
    let (_temp, engine, table) = setup();
    let mut tx = engine.begin();
    tx.stage_insert(&table, account("alice", 10)).unwrap();

    engine.rollback(&mut tx).unwrap();

    assert_eq!(tx.state(), TxnState::RolledBack);
    assert!(tx.is_empty());
    assert_eq!(data_len(&table), 0);
}

#[test]
fn test_ended_transaction_rejects_use() {
    let (_temp, engine, table) = setup();
    let mut tx = engine.begin();
    engine.commit(&mut tx).unwrap();

    assert!(matches!(
        tx.stage_insert(&table, account("late", 1)),
        Err(HartoError::TransactionClosed { .. })
    ));
    assert!(matches!(
        engine.commit(&mut tx),
        Err(HartoError::TransactionClosed { .. })
    ));
    assert!(matches!(
        engine.rollback(&mut tx),
        Err(HartoError::TransactionClosed { .. })
    ));
}
