//! Engine Module
//!
//! The polymorphic contract every storage backend implements.
//!
//! ## Responsibilities
//! - Point operations: put / get / exists / remove
//! - Full iteration and counting
//! - Ordered range queries, for engines whose capabilities include ordering
//!
//! Callers hold a `Box<dyn Engine>` produced by the [`registry`] and only
//! branch on [`Engine::capabilities`], never on the concrete type.
//!
//! ## Range Semantics
//! ```text
//!   above(k)        keys  > k
//!   below(k)        keys  < k
//!   between(a, b)   a < key < b      (empty when a >= b)
//! ```
//! Bounds are [`KeyBound`]s: `Min` sorts before every key (including the
//! empty key), `Max` after every key.

pub mod range;
pub mod registry;

use crate::error::{KvError, Result};

/// Callback receiving a value view, valid only during the call
pub type ValueCallback<'a> = dyn FnMut(&[u8]) + 'a;

/// Callback receiving a key/value pair, valid only during the call
pub type KvCallback<'a> = dyn FnMut(&[u8], &[u8]) + 'a;

/// What an engine can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Iterates in comparator order and supports range queries
    pub sorted: bool,
    /// Safe for concurrent mutation from several threads
    pub concurrent: bool,
    /// Survives process restart
    pub persistent: bool,
}

/// Bound of a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBound<'a> {
    /// Before every key
    Min,
    /// An ordinary key (may be empty)
    Key(&'a [u8]),
    /// After every key
    Max,
}

impl<'a> From<&'a [u8]> for KeyBound<'a> {
    fn from(key: &'a [u8]) -> Self {
        KeyBound::Key(key)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for KeyBound<'a> {
    fn from(key: &'a [u8; N]) -> Self {
        KeyBound::Key(key.as_slice())
    }
}

impl<'a> From<&'a Vec<u8>> for KeyBound<'a> {
    fn from(key: &'a Vec<u8>) -> Self {
        KeyBound::Key(key.as_slice())
    }
}

impl<'a> From<&'a str> for KeyBound<'a> {
    fn from(key: &'a str) -> Self {
        KeyBound::Key(key.as_bytes())
    }
}

impl<'a> From<&'a String> for KeyBound<'a> {
    fn from(key: &'a String) -> Self {
        KeyBound::Key(key.as_bytes())
    }
}

/// The storage engine contract
///
/// All operations block until complete. Mutations either apply fully or not
/// at all.
pub trait Engine: Send + Sync {
    /// Registry name of the engine
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Number of stored pairs
    fn count_all(&self) -> Result<usize>;

    /// Visit every pair (ascending order for sorted engines)
    fn get_all(&self, callback: &mut KvCallback<'_>) -> Result<()>;

    fn exists(&self, key: &[u8]) -> Result<bool>;

    /// Visit the value stored under `key`; `NotFound` if absent
    fn get(&self, key: &[u8], on_found: &mut ValueCallback<'_>) -> Result<()>;

    /// Insert or replace
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove; `NotFound` if absent
    fn remove(&self, key: &[u8]) -> Result<()>;

    // -------------------------------------------------------------------------
    // Ordered operations (sorted engines only)
    // -------------------------------------------------------------------------

    fn count_above(&self, _key: KeyBound<'_>) -> Result<usize> {
        Err(not_supported(self.name()))
    }

    fn count_below(&self, _key: KeyBound<'_>) -> Result<usize> {
        Err(not_supported(self.name()))
    }

    fn count_between(&self, _lower: KeyBound<'_>, _upper: KeyBound<'_>) -> Result<usize> {
        Err(not_supported(self.name()))
    }

    fn get_above(&self, _key: KeyBound<'_>, _callback: &mut KvCallback<'_>) -> Result<()> {
        Err(not_supported(self.name()))
    }

    fn get_below(&self, _key: KeyBound<'_>, _callback: &mut KvCallback<'_>) -> Result<()> {
        Err(not_supported(self.name()))
    }

    fn get_between(
        &self,
        _lower: KeyBound<'_>,
        _upper: KeyBound<'_>,
        _callback: &mut KvCallback<'_>,
    ) -> Result<()> {
        Err(not_supported(self.name()))
    }
}

/// Error for an ordered operation on an unordered engine
pub fn not_supported(engine: &str) -> KvError {
    KvError::NotSupported(engine.to_string())
}
