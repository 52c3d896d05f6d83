//! Undo-log transactions
//!
//! ## Protocol
//! ```text
//!   write(off, data)
//!     ├─ range inside a block allocated by this transaction? → write in place
//!     └─ otherwise: append undo record (old bytes), msync log, write in place
//!   free(off)        → deferred until commit
//!   commit()         → apply frees, msync dirty ranges, mark log idle
//!   abort() / drop   → restore undo records in reverse, mark log idle
//! ```
//!
//! Blocks allocated inside the transaction are unreachable from committed
//! state, so their contents need no undo records: rolling back the heap
//! metadata discards them. Frees are deferred so that a rollback never finds
//! a block it still references on a free list.

use std::mem;

use tracing::warn;

use crate::error::{KvError, Result};

use super::alloc;
use super::pool::Pool;

/// An open transaction on a [`Pool`]
pub struct Transaction<'p> {
    pool: &'p mut Pool,
    /// Bytes of undo log written so far
    log_used: u64,
    /// Undo records written so far
    records: usize,
    /// `[start, end)` ranges of blocks allocated in this transaction
    fresh: Vec<(u64, u64)>,
    /// Payload offsets freed in this transaction
    deferred_free: Vec<u64>,
    /// Ranges written in place, flushed on commit
    dirty: Vec<(u64, u64)>,
    done: bool,
    #[cfg(test)]
    writes: usize,
}

impl<'p> Transaction<'p> {
    pub(crate) fn begin(pool: &'p mut Pool) -> Result<Self> {
        // Recovery runs on open and every transaction ends idle, so an active
        // log here means an earlier rollback failed.
        if pool.rollback_log()? > 0 {
            warn!(path = %pool.path().display(), "Rolled back leftover undo log");
        }
        Ok(Self {
            pool,
            log_used: 0,
            records: 0,
            fresh: Vec::new(),
            deferred_free: Vec::new(),
            dirty: Vec::new(),
            done: false,
            #[cfg(test)]
            writes: 0,
        })
    }

    /// Read access to the pool, including this transaction's writes
    pub fn pool(&self) -> &Pool {
        &*self.pool
    }

    /// Write `data` at `offset`, logging the old contents first
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let len = data.len() as u64;
        if offset < super::offsets::DYNAMIC_START
            || (offset < super::HEAP_OFFSET && offset + len > super::LOG_OFFSET)
        {
            return Err(KvError::InvalidArgument(format!(
                "write of {len} bytes at {offset} overlaps the pool header or log"
            )));
        }
        // bounds check
        self.pool.bytes(offset, len)?;
        self.inject_crash()?;

        self.snapshot(offset, len)?;
        self.pool.write_raw(offset, data);
        self.dirty.push((offset, len));
        Ok(())
    }

    pub fn write_u64(&mut self, offset: u64, value: u64) -> Result<()> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Point the pool's root at `root`
    pub fn set_root(&mut self, root: u64) -> Result<()> {
        self.write_u64(super::offsets::ROOT, root)
    }

    /// Record the element count
    pub fn set_count(&mut self, count: u64) -> Result<()> {
        self.write_u64(super::offsets::COUNT, count)
    }

    /// Allocate a block holding at least `len` bytes; returns its offset
    pub fn alloc(&mut self, len: u64) -> Result<u64> {
        alloc::allocate(self, len)
    }

    /// Free a block when the transaction commits
    pub fn free(&mut self, offset: u64) {
        if offset != 0 {
            self.deferred_free.push(offset);
        }
    }

    /// Make the transaction's effects durable
    pub fn commit(mut self) -> Result<()> {
        let frees = mem::take(&mut self.deferred_free);
        for offset in frees {
            alloc::release(&mut self, offset)?;
        }

        for (offset, len) in &self.dirty {
            self.pool.flush_range(*offset, *len)?;
        }
        self.pool.clear_log()?;
        self.done = true;
        Ok(())
    }

    /// Undo every write made by the transaction
    pub fn abort(mut self) -> Result<()> {
        self.rollback()
    }

    fn rollback(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        if self.records == 0 {
            return Ok(());
        }
        let restored = self.pool.rollback_log()?;
        warn!(records = restored, "Rolled back transaction");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Logging
    // -------------------------------------------------------------------------

    /// Save the current contents of a range unless it lies in a fresh block
    pub(crate) fn snapshot(&mut self, offset: u64, len: u64) -> Result<()> {
        if len == 0 || self.is_fresh(offset, len) {
            return Ok(());
        }
        self.log_used = self.pool.append_undo(self.log_used, offset, len)?;
        self.records += 1;
        Ok(())
    }

    pub(crate) fn mark_fresh(&mut self, start: u64, end: u64) {
        self.fresh.push((start, end));
    }

    fn is_fresh(&self, offset: u64, len: u64) -> bool {
        self.fresh
            .iter()
            .any(|&(start, end)| offset >= start && offset + len <= end)
    }

    // -------------------------------------------------------------------------
    // Crash injection
    // -------------------------------------------------------------------------

    /// Stop as a crash would: leave in-place writes and the active log
    /// behind, without rolling back
    #[cfg(test)]
    fn inject_crash(&mut self) -> Result<()> {
        if let Some(limit) = self.pool.crash_after_writes {
            if self.writes >= limit {
                self.done = true;
                return Err(KvError::Transaction("injected crash".into()));
            }
        }
        self.writes += 1;
        Ok(())
    }

    #[cfg(not(test))]
    #[inline]
    fn inject_crash(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.rollback() {
            warn!(error = %e, "Rollback on drop failed, pool will recover on reopen");
        }
    }
}
