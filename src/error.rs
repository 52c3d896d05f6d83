//! Error types for pmkv
//!
//! Internal code propagates `KvError` with `?`. The boundary (`Db`) turns an
//! error into a [`Status`] plus a message for the last-error buffer.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for pmkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NotFound,

    #[error("Operation not supported by engine '{0}'")]
    NotSupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Value of {size} bytes does not fit a {capacity}-byte buffer")]
    BufferTooSmall { size: usize, capacity: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Config parsing error: {0}")]
    ConfigParsing(String),

    #[error("Config item '{key}' has wrong type: expected {expected}")]
    ConfigType { key: String, expected: &'static str },

    #[error("Unknown engine name: {0}")]
    WrongEngineName(String),

    #[error("Comparator with name: \"{expected}\" expected")]
    ComparatorMismatch { expected: String },

    // -------------------------------------------------------------------------
    // Pool Errors
    // -------------------------------------------------------------------------
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Pool corrupted: {0}")]
    Corrupted(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KvError {
    /// Status code reported for this error at the API boundary
    pub fn status(&self) -> Status {
        match self {
            KvError::NotFound => Status::NotFound,
            KvError::NotSupported(_) => Status::NotSupported,
            KvError::InvalidArgument(_) => Status::InvalidArgument,
            KvError::ConfigParsing(_) => Status::ConfigParsingError,
            KvError::ConfigType { .. } => Status::ConfigTypeError,
            KvError::WrongEngineName(_) => Status::WrongEngineName,
            KvError::ComparatorMismatch { .. } => Status::ComparatorMismatch,
            KvError::OutOfMemory(_) => Status::OutOfMemory,
            KvError::BufferTooSmall { .. }
            | KvError::Corrupted(_)
            | KvError::Transaction(_)
            | KvError::Serialization(_)
            | KvError::Io(_) => Status::Failed,
        }
    }
}

impl From<bincode::Error> for KvError {
    fn from(err: bincode::Error) -> Self {
        KvError::Serialization(err.to_string())
    }
}

/// Status codes returned at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    Failed = 1,
    NotFound = 2,
    NotSupported = 3,
    InvalidArgument = 4,
    ConfigParsingError = 5,
    ConfigTypeError = 6,
    OutOfMemory = 7,
    WrongEngineName = 8,
    ComparatorMismatch = 9,
}

impl Status {
    /// Stable integer code
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::Failed => "FAILED",
            Status::NotFound => "NOT_FOUND",
            Status::NotSupported => "NOT_SUPPORTED",
            Status::InvalidArgument => "INVALID_ARGUMENT",
            Status::ConfigParsingError => "CONFIG_PARSING_ERROR",
            Status::ConfigTypeError => "CONFIG_TYPE_ERROR",
            Status::OutOfMemory => "OUT_OF_MEMORY",
            Status::WrongEngineName => "WRONG_ENGINE_NAME",
            Status::ComparatorMismatch => "COMPARATOR_MISMATCH",
        };
        f.write_str(name)
    }
}
