//! The `stree` engine: a persistent, sorted B+ tree in a pool file

use std::ops::ControlFlow;
use std::path::PathBuf;

use parking_lot::RwLock;
use tracing::debug;

use crate::comparator::{self, Comparator, ComparatorRef};
use crate::config::Config;
use crate::engine::range::{self, OrderedSource, ScanVisitor};
use crate::engine::{Capabilities, Engine, KeyBound, KvCallback, ValueCallback};
use crate::error::{KvError, Result};
use crate::pmem::{Pool, PoolOptions};

use super::tree;

/// Registry name of the engine
pub const ENGINE_NAME: &str = "stree";

/// Persistent sorted engine
///
/// Readers share the pool; each mutation holds it exclusively for the
/// duration of one transaction. Callbacks run while the lock is held and
/// must not call back into the same engine.
pub struct StreeEngine {
    pool: RwLock<Pool>,
    comparator: ComparatorRef,
    /// Owns the objects handed over at open until the engine is dropped
    _config: Config,
}

impl StreeEngine {
    /// Open (or create) the pool named by `config`
    ///
    /// Recognized items: `path` (required), `size` and `create_if_missing`
    /// (for creation) and `comparator` (defaults to bytewise order). An
    /// existing pool must be reopened with a comparator of the same name.
    pub fn open(config: Config) -> Result<Self> {
        let path = config.path()?;
        let comparator = config.get_comparator()?.unwrap_or_else(comparator::binary);

        let pool = Pool::open(&PoolOptions {
            path: &path,
            size: config.size()?,
            create_if_missing: config.create_if_missing()?,
            engine: ENGINE_NAME,
            comparator: comparator.name(),
        })?;
        debug!(
            path = %path.display(),
            comparator = comparator.name(),
            "stree engine ready"
        );

        Ok(Self {
            pool: RwLock::new(pool),
            comparator,
            _config: config,
        })
    }

    /// Pool file backing the engine
    pub fn path(&self) -> PathBuf {
        self.pool.read().path().to_path_buf()
    }

    /// Inner levels above the leaves
    pub fn height(&self) -> Result<usize> {
        tree::height(&self.pool.read())
    }

    /// Full structural check of the tree; `Corrupted` on the first violation
    pub fn check_invariants(&self) -> Result<()> {
        tree::check_invariants(&self.pool.read(), &*self.comparator)
    }

    /// Bytes of heap handed out so far
    pub fn heap_used(&self) -> Result<u64> {
        self.pool.read().heap_used()
    }

    fn view<'a>(&'a self, pool: &'a Pool) -> TreeView<'a> {
        TreeView {
            pool,
            cmp: &*self.comparator,
        }
    }

    #[cfg(test)]
    pub(crate) fn crash_after_writes(&self, writes: Option<usize>) {
        self.pool.write().crash_after_writes = writes;
    }
}

impl std::fmt::Debug for StreeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreeEngine")
            .field("pool", &*self.pool.read())
            .field("comparator", &self.comparator.name())
            .finish()
    }
}

/// Ordered view of the tree under a held read lock
struct TreeView<'a> {
    pool: &'a Pool,
    cmp: &'a dyn Comparator,
}

impl OrderedSource for TreeView<'_> {
    fn comparator(&self) -> &dyn Comparator {
        self.cmp
    }

    fn scan_after(&self, after: KeyBound<'_>, visitor: &mut ScanVisitor<'_>) -> Result<()> {
        tree::scan_after(self.pool, self.cmp, after, visitor)
    }
}

impl Engine for StreeEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            sorted: true,
            concurrent: false,
            persistent: true,
        }
    }

    fn count_all(&self) -> Result<usize> {
        Ok(self.pool.read().count()? as usize)
    }

    fn get_all(&self, callback: &mut KvCallback<'_>) -> Result<()> {
        let pool = self.pool.read();
        tree::scan_after(&pool, &*self.comparator, KeyBound::Min, &mut |k: &[u8], v: &[u8]| {
            callback(k, v);
            ControlFlow::Continue(())
        })
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        let pool = self.pool.read();
        Ok(tree::get(&pool, &*self.comparator, key)?.is_some())
    }

    fn get(&self, key: &[u8], on_found: &mut ValueCallback<'_>) -> Result<()> {
        let pool = self.pool.read();
        match tree::get(&pool, &*self.comparator, key)? {
            Some(value) => {
                on_found(value);
                Ok(())
            }
            None => Err(KvError::NotFound),
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let cmp = &*self.comparator;
        self.pool
            .write()
            .run(|tx| tree::insert(tx, cmp, key, value))
            .map(|_| ())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        let cmp = &*self.comparator;
        self.pool.write().run(|tx| tree::remove(tx, cmp, key))
    }

    // -------------------------------------------------------------------------
    // Ordered operations
    // -------------------------------------------------------------------------

    fn count_above(&self, key: KeyBound<'_>) -> Result<usize> {
        let pool = self.pool.read();
        range::count_above(&self.view(&pool), key)
    }

    fn count_below(&self, key: KeyBound<'_>) -> Result<usize> {
        let pool = self.pool.read();
        range::count_below(&self.view(&pool), key)
    }

    fn count_between(&self, lower: KeyBound<'_>, upper: KeyBound<'_>) -> Result<usize> {
        let pool = self.pool.read();
        range::count_between(&self.view(&pool), lower, upper)
    }

    fn get_above(&self, key: KeyBound<'_>, callback: &mut KvCallback<'_>) -> Result<()> {
        let pool = self.pool.read();
        range::get_above(&self.view(&pool), key, callback)
    }

    fn get_below(&self, key: KeyBound<'_>, callback: &mut KvCallback<'_>) -> Result<()> {
        let pool = self.pool.read();
        range::get_below(&self.view(&pool), key, callback)
    }

    fn get_between(
        &self,
        lower: KeyBound<'_>,
        upper: KeyBound<'_>,
        callback: &mut KvCallback<'_>,
    ) -> Result<()> {
        let pool = self.pool.read();
        range::get_between(&self.view(&pool), lower, upper, callback)
    }
}
