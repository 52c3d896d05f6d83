//! Tests for the stree engine
//!
//! These tests verify:
//! - Split shape keyed to DEGREE (leaf split, root growth, multi-level)
//! - Structural invariants after inserts, overwrites and removals
//! - Removal without rebalancing
//! - Large values and pool exhaustion
//! - Space reuse after overwrite and removal

use pmkv::engine::Engine;
use pmkv::stree::{StreeEngine, DEGREE, MAX_ENTRIES};
use pmkv::{Config, KeyBound, KvError, Status};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const MB: u64 = 1024 * 1024;

fn open_engine(dir: &TempDir, size: u64) -> StreeEngine {
    let config = Config::builder()
        .path(dir.path().join("stree.pool"))
        .size(size)
        .create_if_missing(true)
        .build();
    StreeEngine::open(config).unwrap()
}

fn key(i: usize) -> Vec<u8> {
    format!("key{i:08}").into_bytes()
}

fn get(engine: &StreeEngine, key: &[u8]) -> Option<Vec<u8>> {
    let mut value = None;
    let result = engine.get(key, &mut |v: &[u8]| value = Some(v.to_vec()));
    match result {
        Ok(()) => value,
        Err(KvError::NotFound) => None,
        Err(e) => panic!("unexpected error: {e}"),
    }
}

fn collect_keys(engine: &StreeEngine) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    engine
        .get_all(&mut |k: &[u8], _v: &[u8]| keys.push(k.to_vec()))
        .unwrap();
    keys
}

// =============================================================================
// Shape Tests
// =============================================================================

#[test]
fn test_empty_tree() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 8 * MB);

    assert_eq!(engine.count_all().unwrap(), 0);
    assert_eq!(engine.height().unwrap(), 0);
    assert!(collect_keys(&engine).is_empty());
    engine.check_invariants().unwrap();
}

#[test]
fn test_leaf_split_at_degree() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 8 * MB);

    for i in 0..MAX_ENTRIES {
        engine.put(&key(i), b"v").unwrap();
    }
    assert_eq!(engine.height().unwrap(), 0, "a full leaf does not split");
    engine.check_invariants().unwrap();

    engine.put(&key(MAX_ENTRIES), b"v").unwrap();
    assert_eq!(engine.height().unwrap(), 1, "the DEGREE-th key splits the root leaf");
    assert_eq!(engine.count_all().unwrap(), DEGREE);
    engine.check_invariants().unwrap();

    // Left half ends at the separator, right half follows it
    assert_eq!(engine.count_below(KeyBound::from(&key(DEGREE / 2))).unwrap(), DEGREE / 2);
}

#[test]
fn test_overwrite_does_not_split() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 8 * MB);

    for i in 0..MAX_ENTRIES {
        engine.put(&key(i), b"v").unwrap();
    }
    for i in 0..MAX_ENTRIES {
        engine.put(&key(i), b"updated").unwrap();
    }
    assert_eq!(engine.height().unwrap(), 0);
    assert_eq!(engine.count_all().unwrap(), MAX_ENTRIES);
    assert_eq!(get(&engine, &key(10)).unwrap(), b"updated");
}

#[test]
fn test_multi_level_tree() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 64 * MB);

    // Ascending inserts leave half-full leaves: 32 per leaf, so more than
    // 64 leaves force the root to split
    let n = 32 * 70;
    for i in 0..n {
        engine.put(&key(i), &key(i)).unwrap();
    }
    assert_eq!(engine.height().unwrap(), 2);
    assert_eq!(engine.count_all().unwrap(), n);
    engine.check_invariants().unwrap();

    for i in (0..n).step_by(97) {
        assert_eq!(get(&engine, &key(i)).unwrap(), key(i));
    }
    let keys = collect_keys(&engine);
    assert_eq!(keys.len(), n);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_descending_and_interleaved_inserts() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 32 * MB);

    for i in (0..1000).rev() {
        engine.put(&key(i * 2), b"even").unwrap();
    }
    for i in 0..1000 {
        engine.put(&key(i * 2 + 1), b"odd").unwrap();
    }
    engine.check_invariants().unwrap();
    assert_eq!(engine.count_all().unwrap(), 2000);

    let keys = collect_keys(&engine);
    let expected: Vec<_> = (0..2000).map(key).collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_pseudo_random_inserts() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 32 * MB);

    // Full-period LCG over 0..4096
    let mut x = 1usize;
    for _ in 0..4096 {
        x = (x * 1103515245 + 12345) % 4096;
        engine.put(&key(x), &x.to_le_bytes()).unwrap();
    }
    engine.check_invariants().unwrap();
    assert_eq!(engine.count_all().unwrap(), 4096);
    assert_eq!(get(&engine, &key(1234)).unwrap(), 1234usize.to_le_bytes());
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_remove_without_rebalancing() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 32 * MB);

    let n = 2000;
    for i in 0..n {
        engine.put(&key(i), b"v").unwrap();
    }
    let height = engine.height().unwrap();

    for i in (0..n).filter(|i| i % 3 != 0) {
        engine.remove(&key(i)).unwrap();
    }
    engine.check_invariants().unwrap();
    assert_eq!(engine.height().unwrap(), height, "height never shrinks");
    assert_eq!(engine.count_all().unwrap(), (0..n).filter(|i| i % 3 == 0).count());

    assert!(get(&engine, &key(3)).is_some());
    assert!(get(&engine, &key(4)).is_none());
    assert!(matches!(engine.remove(&key(4)), Err(KvError::NotFound)));
}

#[test]
fn test_remove_everything_then_reinsert() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 16 * MB);

    for i in 0..500 {
        engine.put(&key(i), b"v").unwrap();
    }
    for i in 0..500 {
        engine.remove(&key(i)).unwrap();
    }
    assert_eq!(engine.count_all().unwrap(), 0);
    assert!(collect_keys(&engine).is_empty());
    assert_eq!(engine.count_between(KeyBound::Min, KeyBound::Max).unwrap(), 0);
    engine.check_invariants().unwrap();

    // Empty leaves stay linked and keep accepting keys
    for i in (0..500).step_by(5) {
        engine.put(&key(i), b"again").unwrap();
    }
    engine.check_invariants().unwrap();
    assert_eq!(engine.count_all().unwrap(), 100);
    assert_eq!(engine.count_above(KeyBound::from(&key(250))).unwrap(), 49);
}

#[test]
fn test_remove_missing_leaves_tree_unchanged() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 8 * MB);

    assert!(matches!(engine.remove(b"nothing"), Err(KvError::NotFound)));
    engine.put(b"a", b"1").unwrap();
    let used = engine.heap_used().unwrap();

    assert!(matches!(engine.remove(b"b"), Err(KvError::NotFound)));
    assert_eq!(engine.count_all().unwrap(), 1);
    assert_eq!(engine.heap_used().unwrap(), used);
}

// =============================================================================
// Value Size & Space Tests
// =============================================================================

#[test]
fn test_large_values() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 16 * MB);

    let big = vec![0x5Au8; 1024 * 1024];
    engine.put(b"big", &big).unwrap();
    engine.put(b"small", b"s").unwrap();
    assert_eq!(get(&engine, b"big").unwrap(), big);

    // Shrink, then grow again
    engine.put(b"big", b"tiny").unwrap();
    assert_eq!(get(&engine, b"big").unwrap(), b"tiny");
    engine.put(b"big", &big).unwrap();
    assert_eq!(get(&engine, b"big").unwrap().len(), big.len());
}

#[test]
fn test_overwrite_reuses_space() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 8 * MB);

    engine.put(b"k", &[1u8; 100]).unwrap();
    engine.put(b"k", &[2u8; 100]).unwrap();
    let used = engine.heap_used().unwrap();

    for i in 0..100u8 {
        engine.put(b"k", &[i; 100]).unwrap();
    }
    assert_eq!(engine.heap_used().unwrap(), used);
}

#[test]
fn test_out_of_memory_is_rolled_back() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 4 * MB);
    engine.put(b"keep", b"me").unwrap();

    let huge = vec![0u8; 8 * MB as usize];
    let err = engine.put(b"huge", &huge).unwrap_err();
    assert_eq!(err.status(), Status::OutOfMemory);

    assert!(get(&engine, b"huge").is_none());
    assert_eq!(engine.count_all().unwrap(), 1);
    engine.check_invariants().unwrap();

    // Fill until the pool runs out; every failure leaves a valid tree
    let value = vec![7u8; 16 * 1024];
    let mut stored = 1;
    for i in 0.. {
        match engine.put(&key(i), &value) {
            Ok(()) => stored += 1,
            Err(e) => {
                assert_eq!(e.status(), Status::OutOfMemory);
                break;
            }
        }
    }
    assert_eq!(engine.count_all().unwrap(), stored);
    engine.check_invariants().unwrap();

    // Space freed by removals is reusable
    engine.remove(&key(0)).unwrap();
    engine.put(&key(0), &value).unwrap();
}

// =============================================================================
// Range Tests
// =============================================================================

#[test]
fn test_ranges_across_leaves() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, 16 * MB);

    for i in 0..1000 {
        engine.put(&key(i), b"v").unwrap();
    }
    assert_eq!(engine.count_above(KeyBound::from(&key(499))).unwrap(), 500);
    assert_eq!(engine.count_below(KeyBound::from(&key(500))).unwrap(), 500);
    assert_eq!(
        engine
            .count_between(KeyBound::from(&key(100)), KeyBound::from(&key(900)))
            .unwrap(),
        799
    );

    let mut seen = Vec::new();
    engine
        .get_between(
            KeyBound::from(&key(30)),
            KeyBound::from(&key(35)),
            &mut |k: &[u8], _v: &[u8]| seen.push(k.to_vec()),
        )
        .unwrap();
    assert_eq!(seen, (31..35).map(key).collect::<Vec<_>>());
}
