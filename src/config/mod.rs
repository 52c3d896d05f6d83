//! Configuration for pmkv
//!
//! A `Config` is a typed property bag handed to an engine at open time. The
//! engine takes ownership: objects and comparators stored in it live as long
//! as the engine and are released when it is closed.
//!
//! ## Well-known keys
//! - `path`              (string) pool file for persistent engines
//! - `size`              (uint)   pool size in bytes, used on creation
//! - `create_if_missing` (int)    1 to create a missing pool
//! - `comparator`        (comparator) key order for sorted engines

mod json;
mod value;

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::comparator::ComparatorRef;
use crate::error::{KvError, Result};

pub use value::{ConfigValue, OwnedObject, ReleaseFn};

/// Key of the pool path
pub const PATH: &str = "path";
/// Key of the pool size
pub const SIZE: &str = "size";
/// Key of the create-if-missing flag
pub const CREATE_IF_MISSING: &str = "create_if_missing";
/// Key of the comparator
pub const COMPARATOR: &str = "comparator";

/// Engine configuration: string keys mapped to tagged values
#[derive(Debug, Default)]
pub struct Config {
    items: HashMap<String, ConfigValue>,
}

impl Config {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a config from a JSON object
    pub fn from_json(text: &str) -> Result<Self> {
        json::parse(text)
    }

    // -------------------------------------------------------------------------
    // Put
    // -------------------------------------------------------------------------

    /// Insert a value, replacing any previous value under `key`
    pub fn put(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.items.insert(key.into(), value);
    }

    pub fn put_int64(&mut self, key: impl Into<String>, value: i64) {
        self.put(key, ConfigValue::Int64(value));
    }

    pub fn put_uint64(&mut self, key: impl Into<String>, value: u64) {
        self.put(key, ConfigValue::UInt64(value));
    }

    pub fn put_double(&mut self, key: impl Into<String>, value: f64) {
        self.put(key, ConfigValue::Double(value));
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.put(key, ConfigValue::String(value.into()));
    }

    pub fn put_data(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.put(key, ConfigValue::Data(value.into()));
    }

    pub fn put_object(&mut self, key: impl Into<String>, object: OwnedObject) {
        self.put(key, ConfigValue::Object(object));
    }

    pub fn put_config(&mut self, key: impl Into<String>, config: Config) {
        self.put(key, ConfigValue::Config(Box::new(config)));
    }

    /// Set the comparator used by sorted engines
    pub fn put_comparator(&mut self, comparator: ComparatorRef) {
        self.put(COMPARATOR, ConfigValue::Comparator(comparator));
    }

    // -------------------------------------------------------------------------
    // Get
    // -------------------------------------------------------------------------

    /// Raw access to a value
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.items.get(key)
    }

    /// Signed integer; a uint64 that fits is accepted
    pub fn get_int64(&self, key: &str) -> Result<Option<i64>> {
        match self.items.get(key) {
            None => Ok(None),
            Some(ConfigValue::Int64(v)) => Ok(Some(*v)),
            Some(ConfigValue::UInt64(v)) => i64::try_from(*v)
                .map(Some)
                .map_err(|_| type_error(key, "int64")),
            Some(_) => Err(type_error(key, "int64")),
        }
    }

    /// Unsigned integer; a non-negative int64 is accepted
    pub fn get_uint64(&self, key: &str) -> Result<Option<u64>> {
        match self.items.get(key) {
            None => Ok(None),
            Some(ConfigValue::UInt64(v)) => Ok(Some(*v)),
            Some(ConfigValue::Int64(v)) => u64::try_from(*v)
                .map(Some)
                .map_err(|_| type_error(key, "uint64")),
            Some(_) => Err(type_error(key, "uint64")),
        }
    }

    pub fn get_double(&self, key: &str) -> Result<Option<f64>> {
        match self.items.get(key) {
            None => Ok(None),
            Some(ConfigValue::Double(v)) => Ok(Some(*v)),
            Some(_) => Err(type_error(key, "double")),
        }
    }

    pub fn get_string(&self, key: &str) -> Result<Option<&str>> {
        match self.items.get(key) {
            None => Ok(None),
            Some(ConfigValue::String(v)) => Ok(Some(v.as_str())),
            Some(_) => Err(type_error(key, "string")),
        }
    }

    pub fn get_data(&self, key: &str) -> Result<Option<&[u8]>> {
        match self.items.get(key) {
            None => Ok(None),
            Some(ConfigValue::Data(v)) => Ok(Some(v.as_slice())),
            Some(_) => Err(type_error(key, "data")),
        }
    }

    /// Borrow an owned object as `T`
    pub fn get_object<T: Any>(&self, key: &str) -> Result<Option<&T>> {
        match self.items.get(key) {
            None => Ok(None),
            Some(ConfigValue::Object(obj)) => obj
                .downcast_ref::<T>()
                .map(Some)
                .ok_or_else(|| type_error(key, std::any::type_name::<T>())),
            Some(_) => Err(type_error(key, "object")),
        }
    }

    pub fn get_config(&self, key: &str) -> Result<Option<&Config>> {
        match self.items.get(key) {
            None => Ok(None),
            Some(ConfigValue::Config(c)) => Ok(Some(c.as_ref())),
            Some(_) => Err(type_error(key, "config")),
        }
    }

    pub fn get_comparator(&self) -> Result<Option<ComparatorRef>> {
        match self.items.get(COMPARATOR) {
            None => Ok(None),
            Some(ConfigValue::Comparator(c)) => Ok(Some(c.clone())),
            Some(_) => Err(type_error(COMPARATOR, "comparator")),
        }
    }

    // -------------------------------------------------------------------------
    // Well-known Keys
    // -------------------------------------------------------------------------

    /// Pool path; required by persistent engines
    pub fn path(&self) -> Result<PathBuf> {
        self.get_string(PATH)?
            .map(PathBuf::from)
            .ok_or_else(|| KvError::InvalidArgument("Config does not contain item: \"path\"".into()))
    }

    /// Pool size in bytes, if given
    pub fn size(&self) -> Result<Option<u64>> {
        self.get_uint64(SIZE)
    }

    /// Whether a missing pool may be created (default: false)
    pub fn create_if_missing(&self) -> Result<bool> {
        Ok(self.get_int64(CREATE_IF_MISSING)?.unwrap_or(0) != 0)
    }

    // -------------------------------------------------------------------------
    // Misc
    // -------------------------------------------------------------------------

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Remove and return a value
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.items.remove(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn type_error(key: &str, expected: &'static str) -> KvError {
    KvError::ConfigType {
        key: key.to_string(),
        expected,
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the pool path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.config
            .put_string(PATH, path.to_string_lossy().into_owned());
        self
    }

    /// Set the pool size (in bytes)
    pub fn size(mut self, size: u64) -> Self {
        self.config.put_uint64(SIZE, size);
        self
    }

    /// Allow creating the pool when it does not exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.put_int64(CREATE_IF_MISSING, i64::from(create));
        self
    }

    /// Set the key comparator
    pub fn comparator(mut self, comparator: ComparatorRef) -> Self {
        self.config.put_comparator(comparator);
        self
    }

    /// Set an arbitrary value
    pub fn put(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.config.put(key, value);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
