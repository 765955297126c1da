//! Tests for the ref-data side store
//!
//! These tests verify:
//! - Append returns the payload's span and writes a separator
//! - Resolve reads back the payload and rejects bad ranges
//! - The compaction builder lays payloads out contiguously

use std::fs;

use hartodb::config::SyncStrategy;
use hartodb::refdata::{resolve_in, RefStore, SideFileBuilder};
use hartodb::{HartoError, RefSpan};
use tempfile::TempDir;

#[test]
fn test_append_returns_span_and_separator() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("t.bio.data.htdb");
    let store = RefStore::new(SyncStrategy::EveryWrite);

    let first = store.append(&path, b"hello").unwrap();
    let second = store.append(&path, b"world!").unwrap();

    assert_eq!(first, RefSpan::new(0, 5));
    assert_eq!(second, RefSpan::new(6, 12));
    assert_eq!(fs::read(&path).unwrap(), b"hello\nworld!\n".to_vec());
}

#[test]
fn test_resolve_reads_payload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("side");
    let store = RefStore::new(SyncStrategy::OsManaged);

    store.append(&path, b"first").unwrap();
    let span = store.append(&path, "ünïcode text".as_bytes()).unwrap();

    assert_eq!(store.resolve(&path, span).unwrap(), "ünïcode text");
}

#[test]
fn test_resolve_empty_span_is_empty_text() {
    let temp = TempDir::new().unwrap();
    let store = RefStore::new(SyncStrategy::OsManaged);

    // File need not exist for the zeroed span
    let text = store
        .resolve(&temp.path().join("missing"), RefSpan::default())
        .unwrap();
    assert_eq!(text, "");
}

#[test]
fn test_resolve_past_end_is_invalid_range() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("side");
    let store = RefStore::new(SyncStrategy::OsManaged);
    store.append(&path, b"abc").unwrap();

    match store.resolve(&path, RefSpan::new(2, 100)) {
        Err(HartoError::InvalidRefRange { start, end, len }) => {
            assert_eq!((start, end, len), (2, 100, 4));
        }
        other => panic!("expected InvalidRefRange, got {:?}", other),
    }
}

#[test]
fn test_empty_span_past_end_is_invalid_range() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("side");
    let store = RefStore::new(SyncStrategy::OsManaged);
    store.append(&path, b"first").unwrap();

    // Only the zeroed span skips the range check
    assert!(matches!(
        store.resolve(&path, RefSpan::new(100, 100)),
        Err(HartoError::InvalidRefRange { start: 100, end: 100, len: 6 })
    ));
    assert!(matches!(
        resolve_in(b"first\n", RefSpan::new(100, 100)),
        Err(HartoError::InvalidRefRange { .. })
    ));

    // An empty payload inside the file is still valid
    assert_eq!(store.resolve(&path, RefSpan::new(6, 6)).unwrap(), "");
    assert_eq!(resolve_in(b"first\n", RefSpan::new(3, 3)).unwrap(), "");
}

#[test]
fn test_resolve_in_checks_order() {
    let data = b"abc\n";
    assert_eq!(resolve_in(data, RefSpan::new(0, 3)).unwrap(), "abc");
    assert!(matches!(
        resolve_in(data, RefSpan::new(3, 1)),
        Err(HartoError::InvalidRefRange { .. })
    ));
}

#[test]
fn test_side_file_builder() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("side.compact");

    let mut builder = SideFileBuilder::new(&path).unwrap();
    let a = builder.add(b"alpha").unwrap();
    let b = builder.add(b"").unwrap();
    let c = builder.add(b"gamma").unwrap();
    assert_eq!(builder.payload_count(), 3);
    let len = builder.finish().unwrap();

    assert_eq!(a, RefSpan::new(0, 5));
    assert_eq!(b, RefSpan::new(6, 6));
    assert_eq!(c, RefSpan::new(7, 12));
    assert_eq!(len, 13);

    let data = fs::read(&path).unwrap();
    assert_eq!(data, b"alpha\n\ngamma\n".to_vec());
    assert_eq!(resolve_in(&data, c).unwrap(), "gamma");
}
