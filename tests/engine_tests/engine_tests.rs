//! Tests for Engine
//!
//! These tests verify:
//! - Engine lifecycle (open/close, config-driven worker)
//! - Catalog routing and table lookup across reopen
//! - Concurrent access patterns
//! - Response classification for entry points

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hartodb::config::{Config, SyncStrategy};
use hartodb::{Engine, ErrorClass, Field, FieldValues, HartoError, Response, Status, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .root_dir(temp_dir.path())
        .sync_strategy(SyncStrategy::EveryWrite) // Sync every write for test reliability
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn named(name: &str) -> FieldValues {
    let mut values = FieldValues::new();
    values.insert("name".into(), Value::from(name));
    values
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_engine_open_creates_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("mydb");

    let engine = Engine::open(Config::builder().root_dir(&root).build()).unwrap();

    assert!(root.is_dir());
    assert_eq!(engine.root_dir(), root.as_path());
    assert!(!engine.is_cleanup_running());
}

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.root_dir, std::path::PathBuf::from("./hartoDB"));
    assert_eq!(config.file_extension, "htdb");
    assert_eq!(config.sync_strategy, SyncStrategy::OsManaged);
    assert!(config.cleanup_interval.is_none());

    let config = Config::builder().file_extension(".db").build();
    assert_eq!(config.file_extension, "db");
}

#[test]
fn test_custom_extension_is_used() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .root_dir(temp_dir.path())
        .file_extension("db")
        .build();
    let engine = Engine::open(config).unwrap();

    engine.create_schema("s").unwrap();
    engine
        .create_table("s", "t", vec![Field::reference("r")])
        .unwrap();

    let dir = temp_dir.path().join("s");
    assert!(dir.join("index.conf.db").is_file());
    assert!(dir.join("t.db").is_file());
    assert!(dir.join("t.conf.db").is_file());
    assert!(dir.join("t.r.data.db").is_file());
}

#[test]
fn test_cleanup_interval_starts_worker_on_open() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .root_dir(temp_dir.path())
        .cleanup_interval(Duration::from_millis(50))
        .build();

    let engine = Engine::open(config).unwrap();
    assert!(engine.is_cleanup_running());

    engine.close().unwrap();
}

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let id;

    {
        let engine = Engine::open_path(temp_dir.path()).unwrap();
        engine.create_schema("s").unwrap();
        let table = engine
            .create_table("s", "t", vec![Field::string("name", 8), Field::reference("bio")])
            .unwrap();
        let mut values = named("persist");
        values.insert("bio".into(), Value::from("kept across restarts"));
        id = engine.insert(&table, values).unwrap().id();
        engine.close().unwrap();
    }

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.list_schemas().unwrap(), vec!["s"]);
    assert_eq!(engine.list_tables("s").unwrap(), vec!["t"]);

    let table = engine.table("s", "t").unwrap();
    let record = engine.get(&table, id).unwrap().unwrap();
    assert_eq!(record.get("name"), Some(&Value::from("persist")));
    assert_eq!(record.get("bio"), Some(&Value::from("kept across restarts")));

    // New ids keep increasing past the ones already stored
    let next = engine.insert(&table, named("later")).unwrap();
    assert!(next.id() > id);
}

#[test]
fn test_delete_table() {
    let (_temp, engine) = setup_temp_engine();
    engine.create_schema("s").unwrap();
    engine
        .create_table("s", "t", vec![Field::string("name", 8)])
        .unwrap();

    engine.delete_table("s", "t").unwrap();

    assert!(engine.list_tables("s").unwrap().is_empty());
    assert!(matches!(
        engine.table("s", "t"),
        Err(HartoError::TableNotFound { .. })
    ));
    assert!(engine.tables().locks().is_empty());
}

#[test]
fn test_delete_table_with_unreadable_definition() {
    let (temp, engine) = setup_temp_engine();
    engine.create_schema("s").unwrap();
    let table = engine
        .create_table("s", "p", vec![Field::string("name", 8), Field::reference("bio")])
        .unwrap();
    engine.insert(&table, named("x")).unwrap();

    fs::write(table.definition_path(), "{ not json").unwrap();
    assert!(engine.table("s", "p").is_err());

    engine.delete_table("s", "p").unwrap();

    assert!(!table.definition_path().exists());
    assert!(!table.data_path().exists());
    assert!(!temp.path().join("s").join("p.bio.data.htdb").exists());
    assert!(engine.tables().locks().is_empty());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_engine_concurrent_writes_across_tables() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    engine.create_schema("s").unwrap();

    let mut handles = vec![];
    for t in 0..4 {
        let engine = Arc::clone(&engine);
        let table = engine
            .create_table("s", &format!("t{}", t), vec![Field::string("name", 16)])
            .unwrap();
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                engine
                    .insert(&table, named(&format!("thread{}_{}", t, i)))
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        let table = engine.table("s", &format!("t{}", t)).unwrap();
        let names: Vec<String> = engine
            .current_records(&table)
            .unwrap()
            .map(|r| r.unwrap().get("name").unwrap().to_string())
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("thread{}_{}", t, i)).collect();
        assert_eq!(names, expected);
    }
}

#[test]
fn test_engine_concurrent_reads_during_writes() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    engine.create_schema("s").unwrap();
    let table = engine
        .create_table("s", "t", vec![Field::string("name", 16)])
        .unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        let table = table.clone();
        thread::spawn(move || {
            for i in 0..200 {
                engine.insert(&table, named(&format!("n{}", i))).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let table = table.clone();
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..50 {
                    // Snapshots only ever grow and never hold a torn slot
                    let count = engine
                        .current_records(&table)
                        .unwrap()
                        .map(|r| r.unwrap())
                        .count();
                    assert!(count >= last);
                    last = count;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(engine.current_records(&table).unwrap().count(), 200);
}

// =============================================================================
// Response Classification
// =============================================================================

#[test]
fn test_error_classes() {
    assert_eq!(HartoError::MissingField("x".into()).class(), ErrorClass::Client);
    assert_eq!(HartoError::SchemaNotFound("s".into()).class(), ErrorClass::Client);
    assert_eq!(
        HartoError::InvalidRefRange { start: 0, end: 9, len: 1 }.class(),
        ErrorClass::Server
    );
    assert_eq!(
        HartoError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).class(),
        ErrorClass::Server
    );
}

#[test]
fn test_response_from_result() {
    let (_temp, engine) = setup_temp_engine();

    let ok = Response::from_result(engine.create_schema("s"), |_| "created".to_string());
    assert_eq!(ok.status, Status::Ok);
    assert_eq!(ok.status.code(), 200);
    assert_eq!(ok.message, "created");

    let dup = Response::from_result(engine.create_schema("s"), |_| String::new());
    assert_eq!(dup.status, Status::ClientError);
    assert_eq!(dup.status.code(), 406);
    assert!(dup.message.contains("already exists"));

    let failed: hartodb::Result<()> = Err(HartoError::Worker("boom".into()));
    let server = Response::from_result(failed, |_| String::new());
    assert_eq!(server.status, Status::ServerError);
    assert_eq!(server.to_string(), "500 Cleanup worker error: boom");
}
