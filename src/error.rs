//! Error types for MeridianKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using MeridianError
pub type Result<T> = std::result::Result<T, MeridianError>;

/// Unified error type for MeridianKV operations
#[derive(Debug, Error)]
pub enum MeridianError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Data Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// Absence of a key. A normal outcome of `get`, not a failure.
    #[error("Key not found")]
    NotFound,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    /// Configuration conflicts with the persisted state, e.g. a comparator
    /// name that differs from the one the database was created with.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The database already exists and `error_if_exists` was set.
    #[error("Database already exists: {0}")]
    AlreadyExists(String),
}

impl MeridianError {
    /// True iff this error is the ordinary key-absent outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MeridianError::NotFound)
    }
}
