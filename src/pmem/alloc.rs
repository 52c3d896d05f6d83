//! Heap allocator
//!
//! Power-of-two size classes from 32 bytes to 2 GiB. Each block starts with
//! an 8-byte header holding its class; callers get the payload offset.
//! Free blocks form one singly linked list per class (the next pointer lives
//! in the first payload word). Unused space is carved from `HEAP_TOP`.
//!
//! All allocator state lives in the pool header and is written through the
//! transaction, so allocation and release roll back with everything else.

use crate::error::{KvError, Result};

use super::transaction::Transaction;
use super::{le_u64, offsets};

/// Block header size
pub(crate) const BLOCK_HEADER: u64 = 8;

/// log2 of the smallest block
const MIN_CLASS_SHIFT: u32 = 5;

/// Number of size classes (32 B .. 2 GiB)
pub const NUM_CLASSES: usize = 27;

/// Largest payload a single allocation can hold
pub const MAX_ALLOCATION: u64 = (1u64 << (NUM_CLASSES as u32 - 1 + MIN_CLASS_SHIFT)) - BLOCK_HEADER;

/// Total size of a block in `class`
pub fn block_size(class: usize) -> u64 {
    1u64 << (class as u32 + MIN_CLASS_SHIFT)
}

/// Smallest class whose payload holds `len` bytes
pub fn class_for(len: u64) -> Option<usize> {
    if len > MAX_ALLOCATION {
        return None;
    }
    let total = (len + BLOCK_HEADER).max(1 << MIN_CLASS_SHIFT);
    let shift = 64 - (total - 1).leading_zeros();
    Some((shift - MIN_CLASS_SHIFT) as usize)
}

pub(crate) fn free_head_offset(class: usize) -> u64 {
    offsets::FREE_HEADS + 8 * class as u64
}

/// Allocate a block able to hold `len` bytes and return its payload offset
pub(crate) fn allocate(tx: &mut Transaction<'_>, len: u64) -> Result<u64> {
    let class = class_for(len).ok_or_else(|| {
        KvError::OutOfMemory(format!("allocation of {len} bytes exceeds the largest block"))
    })?;
    let size = block_size(class);

    let head = tx.pool().read_u64(free_head_offset(class))?;
    if head != 0 {
        // Reuse a free block; its first payload word is the list link
        let payload = head + BLOCK_HEADER;
        let next = le_u64(tx.pool().bytes(payload, 8)?);
        tx.snapshot(payload, 8)?;
        tx.write_u64(free_head_offset(class), next)?;
        tx.mark_fresh(payload, head + size);
        return Ok(payload);
    }

    let top = tx.pool().read_u64(offsets::HEAP_TOP)?;
    let end = top
        .checked_add(size)
        .filter(|end| *end <= tx.pool().size())
        .ok_or_else(|| {
            KvError::OutOfMemory(format!(
                "pool exhausted: {} of {} bytes in use, {size} more requested",
                top,
                tx.pool().size()
            ))
        })?;
    tx.write_u64(offsets::HEAP_TOP, end)?;
    tx.mark_fresh(top, end);
    tx.write_u64(top, class as u64)?;

    Ok(top + BLOCK_HEADER)
}

/// Return a block to its free list (called at commit for deferred frees)
pub(crate) fn release(tx: &mut Transaction<'_>, payload: u64) -> Result<()> {
    let block = payload
        .checked_sub(BLOCK_HEADER)
        .filter(|b| *b >= super::HEAP_OFFSET)
        .ok_or_else(|| KvError::Corrupted(format!("free of non-heap offset {payload}")))?;
    let class = tx.pool().read_u64(block)? as usize;
    if class >= NUM_CLASSES {
        return Err(KvError::Corrupted(format!(
            "block at {block} has invalid size class {class}"
        )));
    }

    let head = tx.pool().read_u64(free_head_offset(class))?;
    tx.write_u64(payload, head)?;
    tx.write_u64(free_head_offset(class), block)
}
