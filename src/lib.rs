//! # pmkv
//!
//! An embedded key-value store with interchangeable engines behind one
//! contract:
//! - Persistent sorted B+ tree (`stree`) in a memory-mapped pool file
//! - Undo-log transactions, so a crash never leaves a half-applied write
//! - Volatile engines (`vsmap`, `vcmap`, `blackhole`) for the same API
//! - Ordered range queries under pluggable, named comparators
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Db (error boundary)                       │
//! │              errormsg() / Status per failure                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Config
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Engine Registry                             │
//! │                 (name → Box<dyn Engine>)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   stree     │          │  vsmap /    │
//!   │  (B+ tree)  │          │  vcmap /    │
//!   └──────┬──────┘          │  blackhole  │
//!          │                 └─────────────┘
//!          ▼
//!   ┌─────────────┐
//!   │    Pool     │
//!   │ (mmap, undo │
//!   │  log, heap) │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod comparator;
pub mod config;
pub mod error;

pub mod db;
pub mod engine;
pub mod engines;
pub mod pmem;
pub mod stree;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use comparator::{BinaryComparator, Comparator, ComparatorRef, FnComparator};
pub use config::Config;
pub use db::{errormsg, Db};
pub use engine::{Capabilities, Engine, KeyBound};
pub use error::{KvError, Result, Status};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pmkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
