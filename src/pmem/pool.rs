//! Pool file management
//!
//! Creates, opens and validates pool files, exposes bounds-checked reads of
//! the mapping, and owns the undo log used by [`Transaction`].

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, info, warn};

use crate::error::{KvError, Result};

use super::transaction::Transaction;
use super::{
    align8, le_u32, le_u64, offsets, undo_crc, FORMAT_VERSION, HEAP_OFFSET, LOG_ACTIVE, LOG_IDLE,
    LOG_OFFSET, LOG_SIZE, MAGIC, MAX_COMPARATOR_NAME, MAX_ENGINE_NAME, MIN_POOL_SIZE,
    UNDO_RECORD_HEADER,
};

/// Parameters for opening or creating a pool
#[derive(Debug, Clone)]
pub struct PoolOptions<'a> {
    pub path: &'a Path,
    /// Size in bytes; required when the pool is created
    pub size: Option<u64>,
    pub create_if_missing: bool,
    /// Engine that owns the pool layout
    pub engine: &'a str,
    /// Name of the key order the pool's contents follow
    pub comparator: &'a str,
}

/// A mapped pool file
pub struct Pool {
    path: PathBuf,
    map: MmapMut,
    size: u64,
    engine: String,
    comparator: String,
    /// Kept open for the lifetime of the mapping
    _file: File,
    #[cfg(test)]
    pub(crate) crash_after_writes: Option<usize>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("engine", &self.engine)
            .field("comparator", &self.comparator)
            .finish()
    }
}

impl Pool {
    /// Open an existing pool, or create it when allowed
    ///
    /// Opening replays the undo log if the previous owner stopped in the
    /// middle of a transaction.
    pub fn open(options: &PoolOptions<'_>) -> Result<Self> {
        if options.path.exists() {
            Self::open_existing(options)
        } else if options.create_if_missing {
            Self::create(options)
        } else {
            Err(KvError::InvalidArgument(format!(
                "Pool file does not exist: {}",
                options.path.display()
            )))
        }
    }

    fn create(options: &PoolOptions<'_>) -> Result<Self> {
        let size = options.size.ok_or_else(|| {
            KvError::InvalidArgument("Config does not contain item: \"size\"".into())
        })?;
        if size < MIN_POOL_SIZE {
            return Err(KvError::InvalidArgument(format!(
                "Pool size {size} is below the minimum of {MIN_POOL_SIZE} bytes"
            )));
        }
        if options.engine.len() > MAX_ENGINE_NAME {
            return Err(KvError::InvalidArgument(format!(
                "Engine name too long: {}",
                options.engine
            )));
        }
        if options.comparator.len() > MAX_COMPARATOR_NAME {
            return Err(KvError::InvalidArgument(format!(
                "Comparator name too long ({} bytes, max {MAX_COMPARATOR_NAME})",
                options.comparator.len()
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(options.path)?;
        file.set_len(size)?;
        let map = map_file(&file, size)?;

        let mut pool = Pool {
            path: options.path.to_path_buf(),
            map,
            size,
            engine: options.engine.to_string(),
            comparator: options.comparator.to_string(),
            _file: file,
            #[cfg(test)]
            crash_after_writes: None,
        };
        pool.format();
        pool.map.flush()?;

        info!(
            path = %pool.path.display(),
            size,
            engine = options.engine,
            "Created pool"
        );
        Ok(pool)
    }

    fn open_existing(options: &PoolOptions<'_>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(options.path)?;
        let file_len = file.metadata()?.len();
        if file_len < MIN_POOL_SIZE {
            return Err(KvError::Corrupted(format!(
                "{} is too small to be a pool ({file_len} bytes)",
                options.path.display()
            )));
        }
        let map = map_file(&file, file_len)?;

        let (engine, comparator) = validate_header(&map, file_len)?;
        let mut pool = Pool {
            path: options.path.to_path_buf(),
            map,
            size: file_len,
            engine,
            comparator,
            _file: file,
            #[cfg(test)]
            crash_after_writes: None,
        };

        let restored = pool.rollback_log()?;
        if restored > 0 {
            info!(
                path = %pool.path.display(),
                records = restored,
                "Recovered pool from interrupted transaction"
            );
        }

        if pool.engine != options.engine {
            return Err(KvError::InvalidArgument(format!(
                "Pool was created by engine '{}', not '{}'",
                pool.engine, options.engine
            )));
        }
        if pool.comparator != options.comparator {
            return Err(KvError::ComparatorMismatch {
                expected: pool.comparator.clone(),
            });
        }

        let count = pool.count()?;
        info!(
            path = %pool.path.display(),
            size = pool.size,
            count,
            "Opened pool"
        );
        Ok(pool)
    }

    /// Write a fresh header and an idle log
    fn format(&mut self) {
        let header = &mut self.map[..offsets::STATIC_END];
        header[offsets::MAGIC..offsets::MAGIC + 8].copy_from_slice(MAGIC);
        header[offsets::FORMAT_VERSION..offsets::FORMAT_VERSION + 4]
            .copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        header[offsets::POOL_SIZE..offsets::POOL_SIZE + 8].copy_from_slice(&self.size.to_le_bytes());

        header[offsets::ENGINE_NAME_LEN] = self.engine.len() as u8;
        header[offsets::ENGINE_NAME..offsets::ENGINE_NAME + self.engine.len()]
            .copy_from_slice(self.engine.as_bytes());

        let cmp = self.comparator.as_bytes();
        header[offsets::COMPARATOR_NAME_LEN..offsets::COMPARATOR_NAME_LEN + 2]
            .copy_from_slice(&(cmp.len() as u16).to_le_bytes());
        header[offsets::COMPARATOR_NAME..offsets::COMPARATOR_NAME + cmp.len()].copy_from_slice(cmp);

        let crc = static_crc(header);
        header[offsets::STATIC_CRC..offsets::STATIC_CRC + 4].copy_from_slice(&crc.to_le_bytes());

        self.put_u64(offsets::ROOT, 0);
        self.put_u64(offsets::COUNT, 0);
        self.put_u64(offsets::HEAP_TOP, HEAP_OFFSET);
        self.put_u32(offsets::LOG_STATE, LOG_IDLE);
        self.put_u64(offsets::LOG_USED, 0);
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total pool size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Engine name recorded at creation
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Comparator name recorded at creation
    pub fn comparator(&self) -> &str {
        &self.comparator
    }

    /// Offset of the engine's root object (0 if none)
    pub fn root(&self) -> Result<u64> {
        self.read_u64(offsets::ROOT)
    }

    /// Element count maintained by the engine
    pub fn count(&self) -> Result<u64> {
        self.read_u64(offsets::COUNT)
    }

    /// Bytes of heap handed out so far (including freed blocks)
    pub fn heap_used(&self) -> Result<u64> {
        let top = self.read_u64(offsets::HEAP_TOP)?;
        top.checked_sub(HEAP_OFFSET).ok_or_else(|| {
            KvError::Corrupted(format!("heap top {top} lies below the heap start {HEAP_OFFSET}"))
        })
    }

    /// Bounds-checked view of `len` bytes at `offset`
    pub fn bytes(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.size)
            .ok_or_else(|| {
                KvError::Corrupted(format!(
                    "range {offset}+{len} outside pool of {} bytes",
                    self.size
                ))
            })?;
        Ok(&self.map[offset as usize..end as usize])
    }

    pub fn read_u64(&self, offset: u64) -> Result<u64> {
        self.bytes(offset, 8).map(le_u64)
    }

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------

    /// Start a transaction; it rolls back unless committed
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    /// Run `f` in a transaction, committing on `Ok` and rolling back on `Err`
    pub fn run<T>(&mut self, f: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut tx = self.begin()?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.abort() {
                    warn!(error = %rollback, "Rollback failed, pool will recover on reopen");
                }
                Err(e)
            }
        }
    }

    /// Flush the whole mapping to the file
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Raw access (transaction and recovery only)
    // -------------------------------------------------------------------------

    pub(crate) fn write_raw(&mut self, offset: u64, data: &[u8]) {
        let start = offset as usize;
        self.map[start..start + data.len()].copy_from_slice(data);
    }

    pub(crate) fn put_u64(&mut self, offset: u64, value: u64) {
        self.write_raw(offset, &value.to_le_bytes());
    }

    pub(crate) fn put_u32(&mut self, offset: u64, value: u32) {
        self.write_raw(offset, &value.to_le_bytes());
    }

    pub(crate) fn flush_range(&self, offset: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        self.map.flush_range(offset as usize, len as usize)?;
        Ok(())
    }

    /// Append an undo record holding the current contents of
    /// `offset..offset+len` at log position `used`; returns the new `used`
    ///
    /// The record and the log header are durable before this returns, so the
    /// caller may overwrite the range afterwards.
    pub(crate) fn append_undo(&mut self, used: u64, offset: u64, len: u64) -> Result<u64> {
        let record_len = align8(UNDO_RECORD_HEADER + len);
        let record_start = offsets::LOG_RECORDS + used;
        if record_start + record_len > LOG_OFFSET + LOG_SIZE {
            return Err(KvError::Transaction(format!(
                "undo log full ({used} bytes used, {record_len} more needed)"
            )));
        }

        let old = self.bytes(offset, len)?.to_vec();
        let crc = undo_crc(offset, &old);
        self.put_u64(record_start, offset);
        self.put_u32(record_start + 8, len as u32);
        self.put_u32(record_start + 12, crc);
        self.write_raw(record_start + UNDO_RECORD_HEADER, &old);

        let new_used = used + record_len;
        self.put_u32(offsets::LOG_STATE, LOG_ACTIVE);
        self.put_u64(offsets::LOG_USED, new_used);
        self.flush_range(LOG_OFFSET, record_start + record_len - LOG_OFFSET)?;
        Ok(new_used)
    }

    /// Mark the log idle; the transaction is committed once this is durable
    pub(crate) fn clear_log(&mut self) -> Result<()> {
        self.put_u32(offsets::LOG_STATE, LOG_IDLE);
        self.put_u64(offsets::LOG_USED, 0);
        self.flush_range(LOG_OFFSET, 16)
    }

    /// Restore every intact undo record in reverse order and clear the log;
    /// returns the number of records applied
    ///
    /// A torn trailing record (bad CRC) was never followed by an in-place
    /// write, so scanning stops there.
    pub(crate) fn rollback_log(&mut self) -> Result<usize> {
        let state = le_u32(self.bytes(offsets::LOG_STATE, 4)?);
        if state == LOG_IDLE {
            return Ok(0);
        }
        if state != LOG_ACTIVE {
            return Err(KvError::Corrupted(format!("undo log has unknown state {state}")));
        }

        let used = self
            .read_u64(offsets::LOG_USED)?
            .min(LOG_SIZE - (offsets::LOG_RECORDS - LOG_OFFSET));
        let end = offsets::LOG_RECORDS + used;

        let mut records = Vec::new();
        let mut pos = offsets::LOG_RECORDS;
        while pos + UNDO_RECORD_HEADER <= end {
            let offset = self.read_u64(pos)?;
            let len = u64::from(le_u32(self.bytes(pos + 8, 4)?));
            let crc = le_u32(self.bytes(pos + 12, 4)?);
            if pos + UNDO_RECORD_HEADER + len > end {
                break;
            }
            let old = self.bytes(pos + UNDO_RECORD_HEADER, len)?;
            if undo_crc(offset, old) != crc {
                debug!(position = pos, "Stopping log replay at torn record");
                break;
            }
            if offset < offsets::DYNAMIC_START
                || (offset < HEAP_OFFSET && offset + len > LOG_OFFSET)
                || offset + len > self.size
            {
                return Err(KvError::Corrupted(format!(
                    "undo record targets invalid range {offset}+{len}"
                )));
            }
            records.push((offset, old.to_vec()));
            pos += align8(UNDO_RECORD_HEADER + len);
        }

        for (offset, old) in records.iter().rev() {
            self.write_raw(*offset, old);
        }
        self.map.flush()?;
        self.clear_log()?;

        Ok(records.len())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if let Err(e) = self.map.flush() {
            warn!(path = %self.path.display(), error = %e, "Failed to flush pool on close");
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn map_file(file: &File, size: u64) -> Result<MmapMut> {
    let len = usize::try_from(size)
        .map_err(|_| KvError::InvalidArgument(format!("Pool size {size} not addressable")))?;
    // SAFETY: the file stays open for the lifetime of the mapping and pools
    // are not shared between processes.
    let map = unsafe { MmapOptions::new().len(len).map_mut(file)? };
    Ok(map)
}

/// CRC over the static header, skipping the CRC field itself
fn static_crc(header: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header[..offsets::STATIC_CRC]);
    hasher.update(&header[offsets::STATIC_CRC + 4..offsets::STATIC_END]);
    hasher.finalize()
}

/// Check magic, version, size and CRC; return (engine, comparator) names
fn validate_header(map: &[u8], file_len: u64) -> Result<(String, String)> {
    let header = &map[..offsets::STATIC_END];
    if &header[offsets::MAGIC..offsets::MAGIC + 8] != MAGIC {
        return Err(KvError::Corrupted("not a pmkv pool (bad magic)".into()));
    }

    let version = le_u32(&header[offsets::FORMAT_VERSION..]);
    if version != FORMAT_VERSION {
        return Err(KvError::Corrupted(format!(
            "unsupported pool format version {version}"
        )));
    }

    let stored_crc = le_u32(&header[offsets::STATIC_CRC..]);
    if static_crc(header) != stored_crc {
        return Err(KvError::Corrupted("header checksum mismatch".into()));
    }

    let size = le_u64(&header[offsets::POOL_SIZE..]);
    if size != file_len {
        return Err(KvError::Corrupted(format!(
            "header records {size} bytes but file has {file_len}"
        )));
    }

    let engine_len = usize::from(header[offsets::ENGINE_NAME_LEN]).min(MAX_ENGINE_NAME);
    let engine = String::from_utf8_lossy(
        &header[offsets::ENGINE_NAME..offsets::ENGINE_NAME + engine_len],
    )
    .into_owned();

    let mut len_bytes = [0u8; 2];
    len_bytes.copy_from_slice(&header[offsets::COMPARATOR_NAME_LEN..offsets::COMPARATOR_NAME_LEN + 2]);
    let cmp_len = usize::from(u16::from_le_bytes(len_bytes)).min(MAX_COMPARATOR_NAME);
    let comparator = String::from_utf8_lossy(
        &header[offsets::COMPARATOR_NAME..offsets::COMPARATOR_NAME + cmp_len],
    )
    .into_owned();

    Ok((engine, comparator))
}
