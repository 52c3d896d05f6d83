//! Comparators
//!
//! A comparator is a named total order over byte-string keys. Sorted engines
//! persist the comparator's name so a pool is never reopened under a
//! different order.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Name reserved for the default byte-lexicographic order
pub const BINARY_COMPARATOR_NAME: &str = "__pmemkv_binary_comparator";

/// A named, pluggable total order over opaque byte strings
///
/// Implementations must be deterministic across process restarts: the name
/// identifies the order in persisted pools.
pub trait Comparator: Send + Sync {
    /// Compare two keys
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Identity of this order
    fn name(&self) -> &str;
}

/// Shared comparator handle
pub type ComparatorRef = Arc<dyn Comparator>;

/// Byte-lexicographic order (the default)
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryComparator;

impl Comparator for BinaryComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        BINARY_COMPARATOR_NAME
    }
}

/// Handle to the default comparator
pub fn binary() -> ComparatorRef {
    Arc::new(BinaryComparator)
}

/// Comparator built from a name and a closure
pub struct FnComparator<F> {
    name: String,
    compare: F,
}

impl<F> FnComparator<F>
where
    F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync,
{
    pub fn new(name: impl Into<String>, compare: F) -> Self {
        Self {
            name: name.into(),
            compare,
        }
    }
}

impl<F> Comparator for FnComparator<F>
where
    F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        (self.compare)(a, b)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnComparator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComparator").field("name", &self.name).finish()
    }
}
