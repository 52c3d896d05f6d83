//! Volatile concurrent hash map engine

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::config::Config;
use crate::engine::{Capabilities, Engine, KvCallback, ValueCallback};
use crate::error::{KvError, Result};

pub const ENGINE_NAME: &str = "vcmap";

/// Unordered in-memory map; iteration order is unspecified
#[derive(Debug, Default)]
pub struct VcmapEngine {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl VcmapEngine {
    pub fn open(_config: Config) -> Result<Self> {
        Ok(Self::default())
    }
}

impl Engine for VcmapEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            sorted: false,
            concurrent: true,
            persistent: false,
        }
    }

    fn count_all(&self) -> Result<usize> {
        Ok(self.data.read().len())
    }

    fn get_all(&self, callback: &mut KvCallback<'_>) -> Result<()> {
        for (key, value) in self.data.read().iter() {
            callback(key.as_slice(), value.as_slice());
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn get(&self, key: &[u8], on_found: &mut ValueCallback<'_>) -> Result<()> {
        let data = self.data.read();
        let value = data.get(key).ok_or(KvError::NotFound)?;
        on_found(value.as_slice());
        Ok(())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.data
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or(KvError::NotFound)
    }
}
