//! Tests for ordered range queries
//!
//! These tests verify, on both sorted engines:
//! - above / below / between semantics and exclusivity
//! - Empty and reversed ranges
//! - Min / Max bounds and the empty key
//! - Range monotonicity over random key sets (proptest)

use std::collections::BTreeSet;

use pmkv::{Config, Db, KeyBound};
use proptest::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Both sorted engines; the TempDir keeps the stree pool alive
fn sorted_engines() -> Vec<(TempDir, Db)> {
    let dir = TempDir::new().unwrap();
    let stree = Db::open(
        "stree",
        Config::builder()
            .path(dir.path().join("pool"))
            .size(32 * 1024 * 1024)
            .create_if_missing(true)
            .build(),
    )
    .unwrap();
    let vsmap = Db::open("vsmap", Config::new()).unwrap();
    vec![(dir, stree), (TempDir::new().unwrap(), vsmap)]
}

fn load(db: &Db, pairs: &[(&str, &str)]) {
    for (k, v) in pairs {
        db.put(k, v).unwrap();
    }
}

fn keys_of(
    db: &Db,
    query: impl FnOnce(&Db, &mut dyn FnMut(&[u8], &[u8])) -> pmkv::Result<()>,
) -> Vec<String> {
    let mut keys = Vec::new();
    query(db, &mut |k: &[u8], _: &[u8]| {
        keys.push(String::from_utf8_lossy(k).into_owned())
    })
    .unwrap();
    keys
}

const SCENARIO: &[(&str, &str)] = &[("A", "1"), ("AB", "2"), ("AC", "3"), ("B", "4")];

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_between_scenario() {
    for (_dir, db) in sorted_engines() {
        load(&db, SCENARIO);

        let keys = keys_of(&db, |db, cb| db.get_between("A", "B", cb));
        assert_eq!(keys, vec!["AB", "AC"], "{}", db.engine_name());

        let mut values = Vec::new();
        db.get_between("A", "B", |_, v| values.push(v.to_vec())).unwrap();
        assert_eq!(values, vec![b"2".to_vec(), b"3".to_vec()]);

        assert_eq!(db.count_between("A", "B").unwrap(), 2);
        assert_eq!(db.count_above("B").unwrap(), 0);
        assert_eq!(db.count_below("B").unwrap(), 3);
    }
}

#[test]
fn test_above_and_below() {
    for (_dir, db) in sorted_engines() {
        load(&db, SCENARIO);

        assert_eq!(keys_of(&db, |db, cb| db.get_above("A", cb)), vec!["AB", "AC", "B"]);
        assert_eq!(keys_of(&db, |db, cb| db.get_above("AA", cb)), vec!["AB", "AC", "B"]);
        assert_eq!(keys_of(&db, |db, cb| db.get_below("AC", cb)), vec!["A", "AB"]);
        assert_eq!(keys_of(&db, |db, cb| db.get_below("A", cb)), Vec::<String>::new());

        // Bounds need not be stored keys
        assert_eq!(db.count_above("ZZZ").unwrap(), 0);
        assert_eq!(db.count_below("0").unwrap(), 0);
        assert_eq!(db.count_below("ZZZ").unwrap(), 4);
    }
}

#[test]
fn test_get_all_is_sorted() {
    for (_dir, db) in sorted_engines() {
        for k in ["delta", "alpha", "charlie", "bravo", "echo"] {
            db.put(k, "x").unwrap();
        }
        let keys = keys_of(&db, |db, cb| db.get_all(cb));
        assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta", "echo"]);
    }
}

// =============================================================================
// Empty Range Tests
// =============================================================================

#[test]
fn test_reversed_and_equal_bounds_are_empty() {
    for (_dir, db) in sorted_engines() {
        load(&db, SCENARIO);

        assert_eq!(db.count_between("B", "A").unwrap(), 0);
        assert_eq!(db.count_between("AB", "AB").unwrap(), 0);
        assert!(keys_of(&db, |db, cb| db.get_between("B", "A", cb)).is_empty());
        assert_eq!(db.count_between(KeyBound::Max, KeyBound::Min).unwrap(), 0);
    }
}

#[test]
fn test_empty_engine() {
    for (_dir, db) in sorted_engines() {
        assert_eq!(db.count_above(KeyBound::Min).unwrap(), 0);
        assert_eq!(db.count_below(KeyBound::Max).unwrap(), 0);
        assert_eq!(db.count_between("a", "z").unwrap(), 0);
        assert!(keys_of(&db, |db, cb| db.get_all(cb)).is_empty());
    }
}

#[test]
fn test_min_max_bounds() {
    for (_dir, db) in sorted_engines() {
        load(&db, SCENARIO);
        db.put("", "empty").unwrap();

        assert_eq!(db.count_above(KeyBound::Min).unwrap(), 5);
        assert_eq!(db.count_below(KeyBound::Max).unwrap(), 5);
        assert_eq!(db.count_between(KeyBound::Min, KeyBound::Max).unwrap(), 5);
        assert_eq!(db.count_above(KeyBound::Max).unwrap(), 0);
        assert_eq!(db.count_below(KeyBound::Min).unwrap(), 0);

        // The empty key is an ordinary key, not a bound
        assert_eq!(db.count_above("").unwrap(), 4);
        assert_eq!(db.count_below("").unwrap(), 0);
        assert_eq!(db.count_between(KeyBound::Min, "A").unwrap(), 1);
    }
}

#[test]
fn test_range_after_removal() {
    for (_dir, db) in sorted_engines() {
        load(&db, SCENARIO);
        db.remove("AB").unwrap();
        assert_eq!(keys_of(&db, |db, cb| db.get_between("A", "B", cb)), vec!["AC"]);
        assert_eq!(db.count_below("B").unwrap(), 2);
    }
}

// =============================================================================
// Property Tests
// =============================================================================

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(vec![0u8, 1, b'a', b'b', 0xff]), 0..4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Counts agree with a BTreeSet model and grow monotonically as the
    /// window widens
    #[test]
    fn prop_range_counts_match_model(
        keys in prop::collection::vec(key_strategy(), 0..150),
        a in key_strategy(),
        b in key_strategy(),
    ) {
        let model: BTreeSet<Vec<u8>> = keys.iter().cloned().collect();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        for (_dir, db) in sorted_engines() {
            for k in &keys {
                db.put(k, b"v").unwrap();
            }
            prop_assert_eq!(db.count_all().unwrap(), model.len());

            let above = model.iter().filter(|k| **k > lo).count();
            let below = model.iter().filter(|k| **k < hi).count();
            let between = model.iter().filter(|k| **k > lo && **k < hi).count();
            prop_assert_eq!(db.count_above(&lo).unwrap(), above);
            prop_assert_eq!(db.count_below(&hi).unwrap(), below);
            prop_assert_eq!(db.count_between(&lo, &hi).unwrap(), between);

            // Monotonic: a wider window never holds fewer keys
            prop_assert!(db.count_between(KeyBound::Min, &hi).unwrap() >= between);
            prop_assert!(db.count_between(&lo, KeyBound::Max).unwrap() >= between);

            let mut listed = Vec::new();
            db.get_between(&lo, &hi, |k, _| listed.push(k.to_vec())).unwrap();
            let expected: Vec<Vec<u8>> = model
                .iter()
                .filter(|k| **k > lo && **k < hi)
                .cloned()
                .collect();
            prop_assert_eq!(listed, expected);
        }
    }
}
