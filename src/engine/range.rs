//! Range-query algorithms
//!
//! Comparator-driven above/below/between over any source that can scan its
//! keys in ascending order from a starting bound. Every sorted engine
//! implements [`OrderedSource`] and delegates its range operations here.

use std::cmp::Ordering;
use std::ops::ControlFlow;

use crate::comparator::Comparator;
use crate::error::Result;

use super::{KeyBound, KvCallback};

/// Visitor used by ordered scans; `Break` stops the scan
pub type ScanVisitor<'a> = dyn FnMut(&[u8], &[u8]) -> ControlFlow<()> + 'a;

/// An ascending, comparator-ordered key space
pub trait OrderedSource {
    fn comparator(&self) -> &dyn Comparator;

    /// Visit pairs in ascending order, starting at the first key strictly
    /// greater than `after` (`Min` starts at the first key, `Max` visits
    /// nothing), until the visitor breaks or the keys run out.
    fn scan_after(&self, after: KeyBound<'_>, visitor: &mut ScanVisitor<'_>) -> Result<()>;
}

/// `key < bound` under `cmp`
pub fn key_below(cmp: &dyn Comparator, key: &[u8], bound: KeyBound<'_>) -> bool {
    match bound {
        KeyBound::Min => false,
        KeyBound::Key(b) => cmp.compare(key, b) == Ordering::Less,
        KeyBound::Max => true,
    }
}

/// `key > bound` under `cmp`
pub fn key_above(cmp: &dyn Comparator, key: &[u8], bound: KeyBound<'_>) -> bool {
    match bound {
        KeyBound::Min => true,
        KeyBound::Key(b) => cmp.compare(key, b) == Ordering::Greater,
        KeyBound::Max => false,
    }
}

/// Whether `lower < upper`, i.e. the open interval can hold keys
pub fn bounds_ordered(cmp: &dyn Comparator, lower: KeyBound<'_>, upper: KeyBound<'_>) -> bool {
    match (lower, upper) {
        (KeyBound::Max, _) | (_, KeyBound::Min) => false,
        (KeyBound::Min, _) | (_, KeyBound::Max) => true,
        (KeyBound::Key(a), KeyBound::Key(b)) => cmp.compare(a, b) == Ordering::Less,
    }
}

// =============================================================================
// Get
// =============================================================================

pub fn get_above<S: OrderedSource + ?Sized>(
    source: &S,
    key: KeyBound<'_>,
    callback: &mut KvCallback<'_>,
) -> Result<()> {
    source.scan_after(key, &mut |k: &[u8], v: &[u8]| {
        callback(k, v);
        ControlFlow::Continue(())
    })
}

pub fn get_below<S: OrderedSource + ?Sized>(
    source: &S,
    key: KeyBound<'_>,
    callback: &mut KvCallback<'_>,
) -> Result<()> {
    let cmp = source.comparator();
    source.scan_after(KeyBound::Min, &mut |k: &[u8], v: &[u8]| {
        if !key_below(cmp, k, key) {
            return ControlFlow::Break(());
        }
        callback(k, v);
        ControlFlow::Continue(())
    })
}

pub fn get_between<S: OrderedSource + ?Sized>(
    source: &S,
    lower: KeyBound<'_>,
    upper: KeyBound<'_>,
    callback: &mut KvCallback<'_>,
) -> Result<()> {
    let cmp = source.comparator();
    if !bounds_ordered(cmp, lower, upper) {
        return Ok(());
    }
    source.scan_after(lower, &mut |k: &[u8], v: &[u8]| {
        if !key_below(cmp, k, upper) {
            return ControlFlow::Break(());
        }
        callback(k, v);
        ControlFlow::Continue(())
    })
}

// =============================================================================
// Count
// =============================================================================

pub fn count_above<S: OrderedSource + ?Sized>(source: &S, key: KeyBound<'_>) -> Result<usize> {
    let mut count = 0;
    get_above(source, key, &mut |_: &[u8], _: &[u8]| count += 1)?;
    Ok(count)
}

pub fn count_below<S: OrderedSource + ?Sized>(source: &S, key: KeyBound<'_>) -> Result<usize> {
    let mut count = 0;
    get_below(source, key, &mut |_: &[u8], _: &[u8]| count += 1)?;
    Ok(count)
}

pub fn count_between<S: OrderedSource + ?Sized>(
    source: &S,
    lower: KeyBound<'_>,
    upper: KeyBound<'_>,
) -> Result<usize> {
    let mut count = 0;
    get_between(source, lower, upper, &mut |_: &[u8], _: &[u8]| count += 1)?;
    Ok(count)
}
