//! B+ tree algorithms over a pool
//!
//! Reads take a `&Pool`; mutations run inside a caller-provided
//! [`Transaction`], so a failed or interrupted insert leaves no trace.
//!
//! ## Splits
//! ```text
//!   leaf with DEGREE entries      → left keeps DEGREE/2, right gets the rest
//!                                   separator = copy of left's last key
//!   inner with DEGREE separators  → separator DEGREE/2 moves to the parent
//!   root split                    → new inner root, height + 1
//! ```
//!
//! Removal never merges or rebalances; leaves may become empty and stay
//! linked in the chain.

use std::cmp::Ordering;

use tracing::debug;

use crate::comparator::Comparator;
use crate::engine::range::ScanVisitor;
use crate::engine::KeyBound;
use crate::error::{KvError, Result};
use crate::pmem::{Pool, Transaction};

use super::node::{
    child_index, search_leaf, BlobRef, InnerNode, LeafEntry, LeafNode, Node, NodeId, DEGREE,
    MAX_ENTRIES,
};

/// Depth beyond which a descent is treated as a cycle
const MAX_HEIGHT: usize = 32;

/// Inner nodes visited on the way to a leaf, with the child index taken
type Path = Vec<(NodeId, InnerNode, usize)>;

// =============================================================================
// Reads
// =============================================================================

/// Value stored under `key`
pub fn get<'p>(pool: &'p Pool, cmp: &dyn Comparator, key: &[u8]) -> Result<Option<&'p [u8]>> {
    let root = pool.root()?;
    if root == 0 {
        return Ok(None);
    }
    let (_, _, leaf) = descend(pool, cmp, root, key, false)?;
    match search_leaf(pool, cmp, &leaf.entries, key)? {
        Ok(i) => Ok(Some(leaf.entries[i].value.load(pool)?)),
        Err(_) => Ok(None),
    }
}

/// Visit pairs in ascending order starting after `after`
pub fn scan_after(
    pool: &Pool,
    cmp: &dyn Comparator,
    after: KeyBound<'_>,
    visitor: &mut ScanVisitor<'_>,
) -> Result<()> {
    let root = pool.root()?;
    if root == 0 {
        return Ok(());
    }

    let (mut leaf, mut start) = match after {
        KeyBound::Max => return Ok(()),
        KeyBound::Min => (leftmost_leaf(pool, root)?.1, 0),
        KeyBound::Key(key) => {
            let (_, _, leaf) = descend(pool, cmp, root, key, false)?;
            let start = match search_leaf(pool, cmp, &leaf.entries, key)? {
                Ok(i) => i + 1,
                Err(i) => i,
            };
            (leaf, start)
        }
    };

    loop {
        for entry in &leaf.entries[start..] {
            let key = entry.key.load(pool)?;
            let value = entry.value.load(pool)?;
            if visitor(key, value).is_break() {
                return Ok(());
            }
        }
        if leaf.next == 0 {
            return Ok(());
        }
        leaf = read_leaf(pool, leaf.next)?;
        start = 0;
    }
}

/// Number of inner levels above the leaves (0 for a single leaf or an
/// empty tree)
pub fn height(pool: &Pool) -> Result<usize> {
    let root = pool.root()?;
    if root == 0 {
        return Ok(0);
    }
    Ok(leftmost_leaf(pool, root)?.0)
}

// =============================================================================
// Writes
// =============================================================================

/// Insert or overwrite; returns `true` when the key is new
pub fn insert(
    tx: &mut Transaction<'_>,
    cmp: &dyn Comparator,
    key: &[u8],
    value: &[u8],
) -> Result<bool> {
    let root = tx.pool().root()?;
    if root == 0 {
        let entry = LeafEntry {
            key: BlobRef::store(tx, key)?,
            value: BlobRef::store(tx, value)?,
        };
        let leaf = Node::Leaf(LeafNode {
            next: 0,
            entries: vec![entry],
        });
        let id = leaf.create(tx)?;
        tx.set_root(id)?;
        tx.set_count(1)?;
        return Ok(true);
    }

    let (path, leaf_id, mut leaf) = descend(tx.pool(), cmp, root, key, true)?;
    match search_leaf(tx.pool(), cmp, &leaf.entries, key)? {
        Ok(i) => {
            let old = leaf.entries[i].value;
            leaf.entries[i].value = BlobRef::store(tx, value)?;
            old.free(tx);
            Node::Leaf(leaf).write(tx, leaf_id)?;
            Ok(false)
        }
        Err(i) => {
            let entry = LeafEntry {
                key: BlobRef::store(tx, key)?,
                value: BlobRef::store(tx, value)?,
            };
            leaf.entries.insert(i, entry);
            if leaf.entries.len() <= MAX_ENTRIES {
                Node::Leaf(leaf).write(tx, leaf_id)?;
            } else {
                let (separator, right) = split_leaf(tx, leaf_id, leaf)?;
                propagate(tx, path, separator, right)?;
            }
            let count = tx.pool().count()?;
            tx.set_count(count + 1)?;
            Ok(true)
        }
    }
}

/// Remove `key`; `NotFound` if absent
pub fn remove(tx: &mut Transaction<'_>, cmp: &dyn Comparator, key: &[u8]) -> Result<()> {
    let root = tx.pool().root()?;
    if root == 0 {
        return Err(KvError::NotFound);
    }

    let (_, leaf_id, mut leaf) = descend(tx.pool(), cmp, root, key, false)?;
    let i = search_leaf(tx.pool(), cmp, &leaf.entries, key)?.map_err(|_| KvError::NotFound)?;
    let entry = leaf.entries.remove(i);
    entry.key.free(tx);
    entry.value.free(tx);
    Node::Leaf(leaf).write(tx, leaf_id)?;

    let count = tx.pool().count()?;
    tx.set_count(count.saturating_sub(1))
}

fn split_leaf(
    tx: &mut Transaction<'_>,
    leaf_id: NodeId,
    mut leaf: LeafNode,
) -> Result<(BlobRef, NodeId)> {
    let right = LeafNode {
        next: leaf.next,
        entries: leaf.entries.split_off(DEGREE / 2),
    };
    let right_id = Node::Leaf(right).create(tx)?;
    leaf.next = right_id;

    let last = leaf
        .entries
        .last()
        .map(|e| e.key)
        .ok_or_else(|| KvError::Corrupted(format!("split of empty leaf {leaf_id}")))?;
    let separator_key = last.load(tx.pool())?.to_vec();
    let separator = BlobRef::store(tx, &separator_key)?;
    Node::Leaf(leaf).write(tx, leaf_id)?;

    debug!(leaf = leaf_id, right = right_id, "Split leaf");
    Ok((separator, right_id))
}

/// Insert `separator`/`right` into the parents on `path`, splitting
/// full inner nodes and growing a new root if the split reaches the top
fn propagate(
    tx: &mut Transaction<'_>,
    mut path: Path,
    mut separator: BlobRef,
    mut right: NodeId,
) -> Result<()> {
    while let Some((id, mut inner, idx)) = path.pop() {
        inner.separators.insert(idx, separator);
        inner.children.insert(idx + 1, right);
        if inner.separators.len() <= MAX_ENTRIES {
            return Node::Inner(inner).write(tx, id);
        }

        let mid = DEGREE / 2;
        let right_node = InnerNode {
            separators: inner.separators.split_off(mid + 1),
            children: inner.children.split_off(mid + 1),
        };
        let promoted = inner
            .separators
            .pop()
            .ok_or_else(|| KvError::Corrupted(format!("split of empty inner node {id}")))?;
        let right_id = Node::Inner(right_node).create(tx)?;
        Node::Inner(inner).write(tx, id)?;

        debug!(node = id, right = right_id, "Split inner node");
        separator = promoted;
        right = right_id;
    }

    let old_root = tx.pool().root()?;
    let root = Node::Inner(InnerNode {
        separators: vec![separator],
        children: vec![old_root, right],
    })
    .create(tx)?;
    tx.set_root(root)?;
    debug!(root, "Tree grew a level");
    Ok(())
}

// =============================================================================
// Navigation
// =============================================================================

/// Walk from `root` to the leaf whose range holds `key`, optionally keeping
/// the inner nodes passed on the way
fn descend(
    pool: &Pool,
    cmp: &dyn Comparator,
    root: NodeId,
    key: &[u8],
    keep_path: bool,
) -> Result<(Path, NodeId, LeafNode)> {
    let mut path = Vec::new();
    let mut id = root;
    for _ in 0..=MAX_HEIGHT {
        match Node::read(pool, id)? {
            Node::Leaf(leaf) => return Ok((path, id, leaf)),
            Node::Inner(inner) => {
                let idx = child_index(pool, cmp, &inner, key)?;
                let child = *inner.children.get(idx).ok_or_else(|| {
                    KvError::Corrupted(format!("inner node {id} has no child {idx}"))
                })?;
                if keep_path {
                    path.push((id, inner, idx));
                }
                id = child;
            }
        }
    }
    Err(KvError::Corrupted(format!("tree deeper than {MAX_HEIGHT} levels")))
}

/// Leftmost leaf and its depth
fn leftmost_leaf(pool: &Pool, root: NodeId) -> Result<(usize, LeafNode)> {
    let mut id = root;
    for depth in 0..=MAX_HEIGHT {
        match Node::read(pool, id)? {
            Node::Leaf(leaf) => return Ok((depth, leaf)),
            Node::Inner(inner) => {
                id = *inner.children.first().ok_or_else(|| {
                    KvError::Corrupted(format!("inner node {id} has no children"))
                })?;
            }
        }
    }
    Err(KvError::Corrupted(format!("tree deeper than {MAX_HEIGHT} levels")))
}

fn read_leaf(pool: &Pool, id: NodeId) -> Result<LeafNode> {
    match Node::read(pool, id)? {
        Node::Leaf(leaf) => Ok(leaf),
        Node::Inner(_) => Err(KvError::Corrupted(format!(
            "leaf chain points at inner node {id}"
        ))),
    }
}

// =============================================================================
// Structural Check
// =============================================================================

/// Verify ordering, separator bounds, uniform leaf depth, the leaf chain and
/// the stored count
pub fn check_invariants(pool: &Pool, cmp: &dyn Comparator) -> Result<()> {
    let root = pool.root()?;
    let count = pool.count()?;
    if root == 0 {
        if count != 0 {
            return Err(KvError::Corrupted(format!("empty tree with count {count}")));
        }
        return Ok(());
    }

    let mut checker = Checker {
        pool,
        cmp,
        leaf_depth: None,
        leaves: Vec::new(),
        entries: 0,
    };
    checker.visit(root, None, None, 0)?;

    if checker.entries != count {
        return Err(KvError::Corrupted(format!(
            "tree holds {} entries but count is {count}",
            checker.entries
        )));
    }

    // The chain must visit the leaves in the same order as the traversal
    let mut next = checker.leaves.first().copied().unwrap_or(0);
    for (i, expected) in checker.leaves.iter().enumerate() {
        if next != *expected {
            return Err(KvError::Corrupted(format!(
                "leaf chain reaches {next} at position {i}, expected {expected}"
            )));
        }
        next = read_leaf(pool, next)?.next;
    }
    if next != 0 {
        return Err(KvError::Corrupted("last leaf has a successor".into()));
    }
    Ok(())
}

struct Checker<'p> {
    pool: &'p Pool,
    cmp: &'p dyn Comparator,
    leaf_depth: Option<usize>,
    leaves: Vec<NodeId>,
    entries: u64,
}

impl<'p> Checker<'p> {
    /// Check the subtree at `id`; every key must satisfy `lower < key <= upper`
    fn visit(
        &mut self,
        id: NodeId,
        lower: Option<&'p [u8]>,
        upper: Option<&'p [u8]>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_HEIGHT {
            return Err(KvError::Corrupted(format!("tree deeper than {MAX_HEIGHT} levels")));
        }
        match Node::read(self.pool, id)? {
            Node::Leaf(leaf) => {
                match self.leaf_depth {
                    None => self.leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(KvError::Corrupted(format!(
                            "leaf {id} at depth {depth}, expected {d}"
                        )))
                    }
                    Some(_) => {}
                }
                if leaf.entries.len() > MAX_ENTRIES {
                    return Err(KvError::Corrupted(format!("leaf {id} overfull")));
                }
                let keys = leaf
                    .entries
                    .iter()
                    .map(|e| e.key.load(self.pool))
                    .collect::<Result<Vec<_>>>()?;
                self.check_keys(id, &keys, lower, upper)?;
                self.leaves.push(id);
                self.entries += keys.len() as u64;
            }
            Node::Inner(inner) => {
                if inner.children.len() != inner.separators.len() + 1
                    || inner.separators.len() > MAX_ENTRIES
                {
                    return Err(KvError::Corrupted(format!(
                        "inner node {id} has {} separators and {} children",
                        inner.separators.len(),
                        inner.children.len()
                    )));
                }
                let seps = inner
                    .separators
                    .iter()
                    .map(|s| s.load(self.pool))
                    .collect::<Result<Vec<_>>>()?;
                self.check_keys(id, &seps, lower, upper)?;

                for (i, child) in inner.children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(seps[i - 1]) };
                    let hi = seps.get(i).copied().or(upper);
                    self.visit(*child, lo, hi, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn check_keys(
        &self,
        id: NodeId,
        keys: &[&[u8]],
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
    ) -> Result<()> {
        for pair in keys.windows(2) {
            if self.cmp.compare(pair[0], pair[1]) != Ordering::Less {
                return Err(KvError::Corrupted(format!("node {id} keys out of order")));
            }
        }
        if let (Some(lo), Some(first)) = (lower, keys.first()) {
            if self.cmp.compare(first, lo) != Ordering::Greater {
                return Err(KvError::Corrupted(format!("node {id} key below its range")));
            }
        }
        if let (Some(hi), Some(last)) = (upper, keys.last()) {
            if self.cmp.compare(last, hi) == Ordering::Greater {
                return Err(KvError::Corrupted(format!("node {id} key above its range")));
            }
        }
        Ok(())
    }
}
