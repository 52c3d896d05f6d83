//! Config values
//!
//! Tagged values stored in a [`Config`](super::Config).

use std::any::Any;
use std::fmt;

use crate::comparator::ComparatorRef;

use super::Config;

/// Release callback for an owned object
pub type ReleaseFn = Box<dyn FnOnce(Box<dyn Any + Send + Sync>) + Send + Sync>;

/// A single config value
pub enum ConfigValue {
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    /// Binary blob with explicit length
    Data(Vec<u8>),
    /// Owned object, released when the config is dropped
    Object(OwnedObject),
    /// Nested config
    Config(Box<Config>),
    Comparator(ComparatorRef),
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Int64(v) => write!(f, "Int64({v})"),
            ConfigValue::UInt64(v) => write!(f, "UInt64({v})"),
            ConfigValue::Double(v) => write!(f, "Double({v})"),
            ConfigValue::String(v) => write!(f, "String({v:?})"),
            ConfigValue::Data(v) => write!(f, "Data({} bytes)", v.len()),
            ConfigValue::Object(_) => f.write_str("Object(..)"),
            ConfigValue::Config(c) => write!(f, "Config({c:?})"),
            ConfigValue::Comparator(c) => write!(f, "Comparator({:?})", c.name()),
        }
    }
}

/// An object owned by a config, with an optional release operation
///
/// The release callback receives the object when the owning config is torn
/// down (engine close, or config dropped without being used).
pub struct OwnedObject {
    value: Option<Box<dyn Any + Send + Sync>>,
    release: Option<ReleaseFn>,
}

impl OwnedObject {
    /// Wrap a value; dropping it is the release operation
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
            release: None,
        }
    }

    /// Wrap a value with an explicit release callback
    pub fn with_release<T, F>(value: T, release: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(T) + Send + Sync + 'static,
    {
        let release: ReleaseFn = Box::new(move |boxed: Box<dyn Any + Send + Sync>| {
            if let Ok(value) = boxed.downcast::<T>() {
                release(*value);
            }
        });
        Self {
            value: Some(Box::new(value)),
            release: Some(release),
        }
    }

    /// Borrow the object as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_ref()?.downcast_ref::<T>()
    }
}

impl Drop for OwnedObject {
    fn drop(&mut self) {
        if let (Some(value), Some(release)) = (self.value.take(), self.release.take()) {
            release(value);
        }
    }
}
