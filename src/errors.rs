//! # Error Types Module
//!
//! Structured error types for the profile store. Storage-level failures are carried by
//! [`PersistenceError`] and wrapped here so callers deal with a single error type.

use thiserror::Error;

use crate::persistence::PersistenceError;

/// Main error type for neurotwin operations
#[derive(Error, Debug)]
pub enum NeuroTwinError {
    /// Vector has the wrong number of components
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Bad argument from the caller, such as `k == 0` or an unknown filter key
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Persisted index exists but cannot be read as a valid index
    #[error("Corrupt index file: {0}")]
    CorruptIndex(String),

    /// Index and ledger on disk disagree in a way that cannot be recovered automatically
    #[error("Inconsistent store: {0}")]
    InconsistentStore(String),

    /// Persistence error
    #[error("Persistence error: {0}")]
    PersistenceError(#[from] PersistenceError),

    /// Lock acquisition error
    #[error("Failed to acquire lock: {0}")]
    LockError(String),
}

impl NeuroTwinError {
    /// The request itself was wrong; retrying with the same input will fail again.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NeuroTwinError::DimensionMismatch { .. } | NeuroTwinError::InvalidArgument(_)
        )
    }

    /// The store or its files are at fault.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

/// Result type for neurotwin operations
pub type NeuroTwinResult<T> = Result<T, NeuroTwinError>;

/// Helper trait for converting lock poisoning into NeuroTwinError
pub trait ToLockError<T> {
    fn to_lock_error(self, operation: &str) -> NeuroTwinResult<T>;
}

impl<'a, T> ToLockError<std::sync::RwLockReadGuard<'a, T>>
    for Result<std::sync::RwLockReadGuard<'a, T>, std::sync::PoisonError<std::sync::RwLockReadGuard<'a, T>>>
{
    fn to_lock_error(self, operation: &str) -> NeuroTwinResult<std::sync::RwLockReadGuard<'a, T>> {
        self.map_err(|_| NeuroTwinError::LockError(format!("Failed to acquire read lock for {}", operation)))
    }
}

impl<'a, T> ToLockError<std::sync::RwLockWriteGuard<'a, T>>
    for Result<std::sync::RwLockWriteGuard<'a, T>, std::sync::PoisonError<std::sync::RwLockWriteGuard<'a, T>>>
{
    fn to_lock_error(self, operation: &str) -> NeuroTwinResult<std::sync::RwLockWriteGuard<'a, T>> {
        self.map_err(|_| NeuroTwinError::LockError(format!("Failed to acquire write lock for {}", operation)))
    }
}
