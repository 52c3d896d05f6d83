//! Sorted Persistent Engine
//!
//! A B+ tree of fan-out [`DEGREE`] stored in a pool file. Every put and
//! remove is one pool transaction, so the tree on disk is always the result
//! of some prefix of completed operations.
//!
//! ## Layout
//! ```text
//!   pool root ──► inner ──► inner ──► leaf ─► leaf ─► leaf ─► 0
//!                                     │
//!                                     └─ (key blob, value blob) ...
//! ```
//!
//! The element count lives in the pool header, so `count_all` does not walk
//! the tree.

mod engine;
mod node;
mod tree;

pub use engine::{StreeEngine, ENGINE_NAME};
pub use node::{DEGREE, MAX_ENTRIES};
