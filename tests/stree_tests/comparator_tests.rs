//! Tests for custom comparators on sorted engines
//!
//! These tests verify:
//! - Iteration and ranges follow a custom order
//! - A pool remembers its comparator name across reopen
//! - Reopening under a different comparator is refused

use std::cmp::Ordering;
use std::sync::Arc;

use pmkv::comparator::BINARY_COMPARATOR_NAME;
use pmkv::{Comparator, ComparatorRef, Config, Db, FnComparator, Status};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn reverse() -> ComparatorRef {
    Arc::new(FnComparator::new("reverse", |a: &[u8], b: &[u8]| b.cmp(a)))
}

/// Orders keys by length first, then bytewise
fn by_length() -> ComparatorRef {
    Arc::new(FnComparator::new("by_length", |a: &[u8], b: &[u8]| {
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }))
}

fn open(path: &std::path::Path, comparator: Option<ComparatorRef>) -> pmkv::Result<Db> {
    let mut builder = Config::builder()
        .path(path)
        .size(16 * 1024 * 1024)
        .create_if_missing(true);
    if let Some(cmp) = comparator {
        builder = builder.comparator(cmp);
    }
    Db::open("stree", builder.build())
}

fn all_keys(db: &Db) -> Vec<String> {
    let mut keys = Vec::new();
    db.get_all(|k, _| keys.push(String::from_utf8_lossy(k).into_owned()))
        .unwrap();
    keys
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_reverse_order_iteration() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir.path().join("pool"), Some(reverse())).unwrap();
    for k in ["a", "c", "b", "d"] {
        db.put(k, "v").unwrap();
    }

    assert_eq!(all_keys(&db), vec!["d", "c", "b", "a"]);
    // "above" follows the comparator, not byte order
    assert_eq!(db.count_above("c").unwrap(), 2);
    assert_eq!(db.count_below("c").unwrap(), 1);
    assert_eq!(db.count_between("d", "a").unwrap(), 2);
    assert_eq!(db.count_between("a", "d").unwrap(), 0);
}

#[test]
fn test_custom_order_across_splits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pool");
    let db = open(&path, Some(by_length())).unwrap();

    for i in 0..500u32 {
        db.put(i.to_string(), i.to_le_bytes()).unwrap();
    }
    let keys = all_keys(&db);
    let expected: Vec<String> = (0..500u32).map(|i| i.to_string()).collect();
    assert_eq!(keys, expected);

    // Between "9" and "10" there is nothing under length-first order
    assert_eq!(db.count_between("9", "10").unwrap(), 0);
    assert_eq!(db.count_below("10").unwrap(), 10);
}

#[test]
fn test_vsmap_uses_custom_order() {
    let config = Config::builder().comparator(reverse()).build();
    let db = Db::open("vsmap", config).unwrap();
    for k in ["x", "y", "z"] {
        db.put(k, "v").unwrap();
    }
    assert_eq!(all_keys(&db), vec!["z", "y", "x"]);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_custom_order_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pool");
    {
        let db = open(&path, Some(by_length())).unwrap();
        for k in ["ccc", "a", "bb", "dddd"] {
            db.put(k, "v").unwrap();
        }
    }

    let db = open(&path, Some(by_length())).unwrap();
    assert_eq!(all_keys(&db), vec!["a", "bb", "ccc", "dddd"]);
    db.put("e", "v").unwrap();
    assert_eq!(all_keys(&db), vec!["a", "e", "bb", "ccc", "dddd"]);
}

#[test]
fn test_default_pool_rejects_custom_comparator() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pool");
    open(&path, None).unwrap().close();

    let err = open(&path, Some(reverse())).unwrap_err();
    assert_eq!(err.status(), Status::ComparatorMismatch);
    assert_eq!(err.status().code(), 9);
    assert_eq!(
        err.to_string(),
        format!("Comparator with name: \"{BINARY_COMPARATOR_NAME}\" expected")
    );
}

#[test]
fn test_custom_pool_rejects_default_comparator() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pool");
    open(&path, Some(reverse())).unwrap().close();

    let err = open(&path, None).unwrap_err();
    assert_eq!(err.status(), Status::ComparatorMismatch);
    assert!(err.to_string().contains("\"reverse\""), "{err}");

    // Same name, same pool
    assert!(open(&path, Some(reverse())).is_ok());
}

#[test]
fn test_comparator_identity_is_its_name() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pool");
    open(&path, Some(reverse())).unwrap().close();

    // A different closure under the same name is accepted
    let impostor: ComparatorRef =
        Arc::new(FnComparator::new("reverse", |a: &[u8], b: &[u8]| -> Ordering { b.cmp(a) }));
    assert_eq!(impostor.name(), "reverse");
    assert!(open(&path, Some(impostor)).is_ok());
}
