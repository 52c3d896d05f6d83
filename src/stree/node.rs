//! B+ tree node layout
//!
//! Nodes are bincode-encoded into fixed-size heap blocks so a node can be
//! rewritten in place. Keys and values live in their own blocks and are
//! referenced by [`BlobRef`].
//!
//! ```text
//!   Inner: separators s0 .. s(n-1), children c0 .. cn
//!          keys in c(i) satisfy s(i-1) < key <= s(i)
//!   Leaf:  sorted (key, value) entries, linked to the next leaf
//! ```

use serde::{Deserialize, Serialize};

use crate::comparator::Comparator;
use crate::error::{KvError, Result};
use crate::pmem::{Pool, Transaction};

/// Maximum fan-out of an inner node; nodes split when they reach it
pub const DEGREE: usize = 64;

/// Most entries (leaf) or separators (inner) a stored node holds
pub const MAX_ENTRIES: usize = DEGREE - 1;

/// Byte size reserved for every node
pub const NODE_CAPACITY: u64 = 2040;

/// Pool offset of a node
pub type NodeId = u64;

/// Reference to a key or value stored in its own block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlobRef {
    pub offset: u64,
    pub len: u32,
}

impl BlobRef {
    /// Copy `data` into a new block (empty data needs no block)
    pub fn store(tx: &mut Transaction<'_>, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(BlobRef::default());
        }
        let len = u32::try_from(data.len()).map_err(|_| {
            KvError::InvalidArgument(format!("{} bytes exceed the item size limit", data.len()))
        })?;
        let offset = tx.alloc(u64::from(len))?;
        tx.write(offset, data)?;
        Ok(BlobRef { offset, len })
    }

    pub fn load<'p>(&self, pool: &'p Pool) -> Result<&'p [u8]> {
        if self.len == 0 {
            return Ok(&[]);
        }
        pool.bytes(self.offset, u64::from(self.len))
    }

    /// Release the block at commit
    pub fn free(&self, tx: &mut Transaction<'_>) {
        if self.len != 0 {
            tx.free(self.offset);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafEntry {
    pub key: BlobRef,
    pub value: BlobRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeafNode {
    /// Next leaf in key order (0 for the last leaf)
    pub next: NodeId,
    pub entries: Vec<LeafEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InnerNode {
    pub separators: Vec<BlobRef>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Leaf(LeafNode),
    Inner(InnerNode),
}

impl Node {
    pub fn read(pool: &Pool, id: NodeId) -> Result<Node> {
        let bytes = pool.bytes(id, NODE_CAPACITY)?;
        Ok(bincode::deserialize(bytes)?)
    }

    /// Rewrite the node stored at `id`
    pub fn write(&self, tx: &mut Transaction<'_>, id: NodeId) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        if bytes.len() as u64 > NODE_CAPACITY {
            return Err(KvError::Serialization(format!(
                "node of {} bytes exceeds capacity {NODE_CAPACITY}",
                bytes.len()
            )));
        }
        tx.write(id, &bytes)
    }

    /// Store the node in a new block and return its id
    pub fn create(&self, tx: &mut Transaction<'_>) -> Result<NodeId> {
        let id = tx.alloc(NODE_CAPACITY)?;
        self.write(tx, id)?;
        Ok(id)
    }
}

/// Binary search for `key` among leaf entries
///
/// `Ok(i)` if entry `i` holds the key, `Err(i)` with the insertion point
/// otherwise.
pub fn search_leaf(
    pool: &Pool,
    cmp: &dyn Comparator,
    entries: &[LeafEntry],
    key: &[u8],
) -> Result<std::result::Result<usize, usize>> {
    let (mut lo, mut hi) = (0, entries.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match cmp.compare(entries[mid].key.load(pool)?, key) {
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
            std::cmp::Ordering::Equal => return Ok(Ok(mid)),
        }
    }
    Ok(Err(lo))
}

/// Index of the child whose range contains `key`: the first separator not
/// less than `key`, or the last child
pub fn child_index(
    pool: &Pool,
    cmp: &dyn Comparator,
    inner: &InnerNode,
    key: &[u8],
) -> Result<usize> {
    let (mut lo, mut hi) = (0, inner.separators.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if cmp.compare(inner.separators[mid].load(pool)?, key) == std::cmp::Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}
