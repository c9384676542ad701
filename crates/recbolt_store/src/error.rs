//! Error types for store operations.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while opening or using a [`crate::Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a backend.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The commit log is corrupted.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Another holder kept the exclusive lock past the open timeout.
    #[error("store {path} is locked by another holder (waited {timeout:?})")]
    Locked {
        /// Path of the locked store file.
        path: PathBuf,
        /// How long the open waited for the lock.
        timeout: Duration,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// A bucket operation was given an empty name.
    #[error("bucket name required")]
    BucketNameRequired,

    /// A put was given an empty key.
    #[error("key required")]
    KeyRequired,

    /// A key, value or bucket name does not fit the log's length fields.
    #[error("{what} too large: {len} bytes")]
    TooLarge {
        /// Which part of the operation was too large.
        what: &'static str,
        /// The offending length.
        len: usize,
    },
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
