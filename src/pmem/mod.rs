//! Persistent Pool Module
//!
//! A fixed-size file mapped into memory, holding a self-describing header,
//! an undo log and an allocation heap. Every mutation of pool contents goes
//! through a [`Transaction`], so a crash at any point leaves the pool in its
//! last committed state once reopened.
//!
//! ## Responsibilities
//! - Create / open / validate pool files
//! - Undo-log transactions (snapshot before write, rollback on abort or
//!   on reopen after a crash)
//! - Size-class block allocation inside the heap
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (4 KiB)                                              │
//! │   static:  Magic "PMKVPOOL" (8) | Version u32 | CRC32 u32   │
//! │            PoolSize u64 | Engine name | Comparator name     │
//! │   dynamic: Root u64 | Count u64 | HeapTop u64               │
//! │            FreeHeads [u64; NUM_CLASSES]                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Undo Log (256 KiB)                                          │
//! │   State u32 | pad u32 | Used u64                            │
//! │   [Offset u64][Len u32][CRC u32][old bytes][pad to 8] ...   │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Heap                                                        │
//! │   [Class u64][payload ...] blocks of 2^(class+5) bytes      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Objects are addressed by their byte
//! offset in the file, so nothing depends on where the file is mapped.

mod alloc;
mod pool;
mod transaction;

pub use alloc::{block_size, class_for, MAX_ALLOCATION, NUM_CLASSES};
pub use pool::{Pool, PoolOptions};
pub use transaction::Transaction;

// =============================================================================
// Shared Constants (used by pool, transaction, allocator)
// =============================================================================

/// Magic bytes identifying a pmkv pool file
pub(crate) const MAGIC: &[u8; 8] = b"PMKVPOOL";

/// Current pool format version
pub(crate) const FORMAT_VERSION: u32 = 1;

/// Header region size
pub const HEADER_SIZE: u64 = 4096;

/// Undo log region
pub const LOG_OFFSET: u64 = HEADER_SIZE;
pub const LOG_SIZE: u64 = 256 * 1024;

/// First byte of the heap
pub const HEAP_OFFSET: u64 = LOG_OFFSET + LOG_SIZE;

/// Smallest pool accepted on creation
pub const MIN_POOL_SIZE: u64 = 2 * 1024 * 1024;

/// Longest engine name stored in the header
pub const MAX_ENGINE_NAME: usize = 31;

/// Longest comparator name stored in the header
pub const MAX_COMPARATOR_NAME: usize = 254;

/// Header field offsets
pub(crate) mod offsets {
    // static section (written once, covered by STATIC_CRC)
    pub const MAGIC: usize = 0;
    pub const FORMAT_VERSION: usize = 8;
    pub const STATIC_CRC: usize = 12;
    pub const POOL_SIZE: usize = 16;
    pub const ENGINE_NAME_LEN: usize = 24;
    pub const ENGINE_NAME: usize = 25;
    pub const COMPARATOR_NAME_LEN: usize = 56;
    pub const COMPARATOR_NAME: usize = 58;
    pub const STATIC_END: usize = 320;

    // dynamic section (modified only inside transactions)
    pub const DYNAMIC_START: u64 = 512;
    pub const ROOT: u64 = 512;
    pub const COUNT: u64 = 520;
    pub const HEAP_TOP: u64 = 528;
    pub const FREE_HEADS: u64 = 536;

    // undo log header
    pub const LOG_STATE: u64 = super::LOG_OFFSET;
    pub const LOG_USED: u64 = super::LOG_OFFSET + 8;
    pub const LOG_RECORDS: u64 = super::LOG_OFFSET + 16;
}

/// Undo log states
pub(crate) const LOG_IDLE: u32 = 0;
pub(crate) const LOG_ACTIVE: u32 = 1;

/// Undo record header: Offset (8) + Len (4) + CRC (4)
pub(crate) const UNDO_RECORD_HEADER: u64 = 16;

pub(crate) fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

pub(crate) fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

pub(crate) fn align8(n: u64) -> u64 {
    (n + 7) & !7
}

/// CRC of an undo record (offset, length and saved bytes)
pub(crate) fn undo_crc(offset: u64, old: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&offset.to_le_bytes());
    hasher.update(&(old.len() as u32).to_le_bytes());
    hasher.update(old);
    hasher.finalize()
}
