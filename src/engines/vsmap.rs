//! Volatile sorted map engine
//!
//! Entries are kept in a vector sorted by the configured comparator; lookups
//! binary-search it and range queries go through the shared range
//! algorithms.

use parking_lot::RwLock;

use crate::comparator::{self, Comparator, ComparatorRef};
use crate::config::Config;
use crate::engine::range::{self, key_above, OrderedSource, ScanVisitor};
use crate::engine::{Capabilities, Engine, KeyBound, KvCallback, ValueCallback};
use crate::error::{KvError, Result};

pub const ENGINE_NAME: &str = "vsmap";

type Entries = Vec<(Vec<u8>, Vec<u8>)>;

pub struct VsmapEngine {
    entries: RwLock<Entries>,
    comparator: ComparatorRef,
    _config: Config,
}

impl VsmapEngine {
    /// Uses the config's comparator, or bytewise order when none is set
    pub fn open(config: Config) -> Result<Self> {
        let comparator = config.get_comparator()?.unwrap_or_else(comparator::binary);
        Ok(Self {
            entries: RwLock::new(Vec::new()),
            comparator,
            _config: config,
        })
    }

    fn search(&self, entries: &Entries, key: &[u8]) -> std::result::Result<usize, usize> {
        entries.binary_search_by(|(k, _)| self.comparator.compare(k, key))
    }
}

impl std::fmt::Debug for VsmapEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsmapEngine")
            .field("len", &self.entries.read().len())
            .field("comparator", &self.comparator.name())
            .finish()
    }
}

/// Ordered view over the entries under a held read lock
struct SortedView<'a> {
    entries: &'a Entries,
    cmp: &'a dyn Comparator,
}

impl OrderedSource for SortedView<'_> {
    fn comparator(&self) -> &dyn Comparator {
        self.cmp
    }

    fn scan_after(&self, after: KeyBound<'_>, visitor: &mut ScanVisitor<'_>) -> Result<()> {
        let start = match after {
            KeyBound::Min => 0,
            KeyBound::Max => self.entries.len(),
            KeyBound::Key(_) => self
                .entries
                .partition_point(|(k, _)| !key_above(self.cmp, k, after)),
        };
        for (key, value) in &self.entries[start..] {
            if visitor(key.as_slice(), value.as_slice()).is_break() {
                break;
            }
        }
        Ok(())
    }
}

impl Engine for VsmapEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            sorted: true,
            concurrent: false,
            persistent: false,
        }
    }

    fn count_all(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn get_all(&self, callback: &mut KvCallback<'_>) -> Result<()> {
        for (key, value) in self.entries.read().iter() {
            callback(key.as_slice(), value.as_slice());
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        let entries = self.entries.read();
        Ok(self.search(&entries, key).is_ok())
    }

    fn get(&self, key: &[u8], on_found: &mut ValueCallback<'_>) -> Result<()> {
        let entries = self.entries.read();
        let i = self.search(&entries, key).map_err(|_| KvError::NotFound)?;
        on_found(entries[i].1.as_slice());
        Ok(())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        match self.search(&entries, key) {
            Ok(i) => entries[i].1 = value.to_vec(),
            Err(i) => entries.insert(i, (key.to_vec(), value.to_vec())),
        }
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        let i = self.search(&entries, key).map_err(|_| KvError::NotFound)?;
        entries.remove(i);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Ordered operations
    // -------------------------------------------------------------------------

    fn count_above(&self, key: KeyBound<'_>) -> Result<usize> {
        let entries = self.entries.read();
        range::count_above(&self.view(&entries), key)
    }

    fn count_below(&self, key: KeyBound<'_>) -> Result<usize> {
        let entries = self.entries.read();
        range::count_below(&self.view(&entries), key)
    }

    fn count_between(&self, lower: KeyBound<'_>, upper: KeyBound<'_>) -> Result<usize> {
        let entries = self.entries.read();
        range::count_between(&self.view(&entries), lower, upper)
    }

    fn get_above(&self, key: KeyBound<'_>, callback: &mut KvCallback<'_>) -> Result<()> {
        let entries = self.entries.read();
        range::get_above(&self.view(&entries), key, callback)
    }

    fn get_below(&self, key: KeyBound<'_>, callback: &mut KvCallback<'_>) -> Result<()> {
        let entries = self.entries.read();
        range::get_below(&self.view(&entries), key, callback)
    }

    fn get_between(
        &self,
        lower: KeyBound<'_>,
        upper: KeyBound<'_>,
        callback: &mut KvCallback<'_>,
    ) -> Result<()> {
        let entries = self.entries.read();
        range::get_between(&self.view(&entries), lower, upper, callback)
    }
}

impl VsmapEngine {
    fn view<'a>(&'a self, entries: &'a Entries) -> SortedView<'a> {
        SortedView {
            entries,
            cmp: &*self.comparator,
        }
    }
}
