//! Engine that accepts every write and keeps nothing

use tracing::trace;

use crate::config::Config;
use crate::engine::{Capabilities, Engine, KvCallback, ValueCallback};
use crate::error::{KvError, Result};

pub const ENGINE_NAME: &str = "blackhole";

#[derive(Debug, Default)]
pub struct BlackholeEngine;

impl BlackholeEngine {
    /// The config is accepted and released immediately
    pub fn open(_config: Config) -> Result<Self> {
        Ok(Self)
    }
}

impl Engine for BlackholeEngine {
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
        Ok(0)
    }

    fn get_all(&self, _callback: &mut KvCallback<'_>) -> Result<()> {
        Ok(())
    }

    fn exists(&self, _key: &[u8]) -> Result<bool> {
        Ok(false)
    }

    fn get(&self, _key: &[u8], _on_found: &mut ValueCallback<'_>) -> Result<()> {
        Err(KvError::NotFound)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        trace!(key_len = key.len(), value_len = value.len(), "Discarding put");
        Ok(())
    }

    fn remove(&self, _key: &[u8]) -> Result<()> {
        Err(KvError::NotFound)
    }
}
