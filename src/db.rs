//! Db Module
//!
//! The handle applications hold. A `Db` owns one engine and is the outermost
//! error boundary: every failing call records `[operation] message` in a
//! process-wide last-error buffer readable through [`errormsg`].
//!
//! ## Example
//! ```no_run
//! use pmkv::{Config, Db};
//!
//! let config = Config::builder()
//!     .path("/tmp/pool")
//!     .size(64 * 1024 * 1024)
//!     .create_if_missing(true)
//!     .build();
//! let db = Db::open("stree", config)?;
//! db.put("key", "value")?;
//! assert_eq!(db.get_vec("key")?, b"value");
//! # Ok::<(), pmkv::KvError>(())
//! ```

use parking_lot::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::engine::{registry, Capabilities, Engine, KeyBound};
use crate::error::{KvError, Result};

/// Most recent failure, shared by every `Db` in the process
static LAST_ERROR: Mutex<String> = parking_lot::const_mutex(String::new());

/// Message of the most recent failed operation (empty if none yet)
pub fn errormsg() -> String {
    LAST_ERROR.lock().clone()
}

/// Remember a failure for `errormsg`
///
/// Absent keys and short `get_copy` buffers are ordinary outcomes, not
/// failures, and leave the previous message in place.
fn record<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if matches!(e, KvError::NotFound | KvError::BufferTooSmall { .. }) {
            return result;
        }
        let message = format!("[{operation}] {e}");
        debug!(status = %e.status(), "{message}");
        *LAST_ERROR.lock() = message;
    }
    result
}

/// An open database backed by one engine
pub struct Db {
    engine: Box<dyn Engine>,
}

impl Db {
    /// Open the engine registered as `engine`, handing it `config`
    pub fn open(engine: &str, config: Config) -> Result<Self> {
        record("open", registry::open(engine, config)).map(|engine| Self { engine })
    }

    /// Close the database, releasing the engine and its config objects
    pub fn close(self) {}

    /// Registry name of the underlying engine
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.engine.capabilities()
    }

    // -------------------------------------------------------------------------
    // Point Operations
    // -------------------------------------------------------------------------

    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        record("put", self.engine.put(key.as_ref(), value.as_ref()))
    }

    /// Visit the value stored under `key`
    pub fn get(&self, key: impl AsRef<[u8]>, on_found: impl FnMut(&[u8])) -> Result<()> {
        let mut on_found = on_found;
        record("get", self.engine.get(key.as_ref(), &mut on_found))
    }

    /// Copy of the value stored under `key`
    pub fn get_vec(&self, key: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let mut value = Vec::new();
        self.get(key, |v| value.extend_from_slice(v))?;
        Ok(value)
    }

    /// Copy the value into `buf`
    ///
    /// `buf` is zeroed first and must be strictly longer than the value, so
    /// the copy is always followed by at least one zero byte. The value's
    /// size is reported whenever the key exists; when the value does not fit,
    /// nothing is copied and the call fails.
    pub fn get_copy(
        &self,
        key: impl AsRef<[u8]>,
        buf: &mut [u8],
        value_size: &mut usize,
    ) -> Result<()> {
        buf.fill(0);
        let mut fits = true;
        let result = self.engine.get(key.as_ref(), &mut |value: &[u8]| {
            *value_size = value.len();
            if value.len() < buf.len() {
                buf[..value.len()].copy_from_slice(value);
            } else {
                fits = false;
            }
        });
        let result = result.and_then(|()| {
            if fits {
                Ok(())
            } else {
                Err(KvError::BufferTooSmall {
                    size: *value_size,
                    capacity: buf.len(),
                })
            }
        });
        record("get_copy", result)
    }

    pub fn exists(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        record("exists", self.engine.exists(key.as_ref()))
    }

    pub fn remove(&self, key: impl AsRef<[u8]>) -> Result<()> {
        record("remove", self.engine.remove(key.as_ref()))
    }

    // -------------------------------------------------------------------------
    // Iteration
    // -------------------------------------------------------------------------

    pub fn count_all(&self) -> Result<usize> {
        record("count_all", self.engine.count_all())
    }

    pub fn get_all(&self, callback: impl FnMut(&[u8], &[u8])) -> Result<()> {
        let mut callback = callback;
        record("get_all", self.engine.get_all(&mut callback))
    }

    // -------------------------------------------------------------------------
    // Range Queries
    // -------------------------------------------------------------------------

    pub fn count_above<'k>(&self, key: impl Into<KeyBound<'k>>) -> Result<usize> {
        record("count_above", self.engine.count_above(key.into()))
    }

    pub fn count_below<'k>(&self, key: impl Into<KeyBound<'k>>) -> Result<usize> {
        record("count_below", self.engine.count_below(key.into()))
    }

    pub fn count_between<'a, 'b>(
        &self,
        lower: impl Into<KeyBound<'a>>,
        upper: impl Into<KeyBound<'b>>,
    ) -> Result<usize> {
        record(
            "count_between",
            self.engine.count_between(lower.into(), upper.into()),
        )
    }

    pub fn get_above<'k>(
        &self,
        key: impl Into<KeyBound<'k>>,
        callback: impl FnMut(&[u8], &[u8]),
    ) -> Result<()> {
        let mut callback = callback;
        record("get_above", self.engine.get_above(key.into(), &mut callback))
    }

    pub fn get_below<'k>(
        &self,
        key: impl Into<KeyBound<'k>>,
        callback: impl FnMut(&[u8], &[u8]),
    ) -> Result<()> {
        let mut callback = callback;
        record("get_below", self.engine.get_below(key.into(), &mut callback))
    }

    pub fn get_between<'a, 'b>(
        &self,
        lower: impl Into<KeyBound<'a>>,
        upper: impl Into<KeyBound<'b>>,
        callback: impl FnMut(&[u8], &[u8]),
    ) -> Result<()> {
        let mut callback = callback;
        record(
            "get_between",
            self.engine
                .get_between(lower.into(), upper.into(), &mut callback),
        )
    }

    /// Direct access to the engine
    pub fn engine(&self) -> &dyn Engine {
        &*self.engine
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("engine", &self.engine.name())
            .finish()
    }
}
