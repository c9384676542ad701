//! Error types for recbolt core.

use crate::model::ModelId;
use recbolt_store::StoreError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in record, collection and registry operations.
///
/// Validation and protocol errors are never retried by this crate; they
/// indicate a programming or data error in the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The record type does not have a plain, unique name.
    #[error("invalid record type {type_name}: expected a named struct")]
    InvalidRecordType {
        /// The offending type name.
        type_name: String,
    },

    /// The record type exposes no identity slot.
    #[error("invalid record type {record}: identity slot missing")]
    MissingIdentitySlot {
        /// Record type name.
        record: String,
    },

    /// The record type's identity slot cannot hold a model.
    #[error("invalid record type {record}: identity slot has type {slot_type}")]
    IncompatibleSlotType {
        /// Record type name.
        record: String,
        /// Declared type of the slot.
        slot_type: String,
    },

    /// The record already carries an identity.
    #[error("record {record} already embedded with id {id}")]
    AlreadyEmbedded {
        /// Record type name.
        record: String,
        /// The identity already in place.
        id: ModelId,
    },

    /// A collection with this name is already registered.
    #[error("duplicate collection {name}")]
    DuplicateCollection {
        /// Collection name.
        name: String,
    },

    /// No collection with this name is registered.
    #[error("collection {name} not found")]
    CollectionNotFound {
        /// Collection name.
        name: String,
    },

    /// The record belongs to a different collection.
    #[error("save called on collection {collection} with a record of another collection")]
    IdentityMismatch {
        /// The collection asked to save.
        collection: String,
    },

    /// A different record with the same id is already indexed.
    #[error("duplicate model {id} in collection {collection}")]
    DuplicateModel {
        /// Collection name.
        collection: String,
        /// The colliding id.
        id: ModelId,
    },

    /// The record could not be encoded.
    #[error("failed to encode {record}: {message}")]
    Encode {
        /// Record type name.
        record: String,
        /// Codec error description.
        message: String,
    },

    /// Stored bytes could not be decoded into the record.
    #[error("failed to decode {record}: {message}")]
    Decode {
        /// Record type name.
        record: String,
        /// Codec error description.
        message: String,
    },

    /// The record has no identity yet.
    #[error("record {record} not initialized")]
    UninitializedRecord {
        /// Record type name.
        record: String,
    },

    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The store could not be opened because another holder keeps it locked.
    #[error("store {path} unavailable: lock not acquired within {timeout:?}")]
    StoreUnavailable {
        /// Store file path.
        path: PathBuf,
        /// How long the open waited.
        timeout: Duration,
    },

    /// The record's collection has been dropped.
    #[error("collection of record {record} is gone")]
    CollectionClosed {
        /// Record type name.
        record: String,
    },

    /// A record-level save failed; `source` is the underlying failure.
    #[error("failed to save {record}: {source}")]
    SaveFailed {
        /// Record type name.
        record: String,
        /// What went wrong.
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Creates an encode error.
    pub fn encode(record: impl Into<String>, message: impl ToString) -> Self {
        Self::Encode {
            record: record.into(),
            message: message.to_string(),
        }
    }

    /// Creates a decode error.
    pub fn decode(record: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            record: record.into(),
            message: message.to_string(),
        }
    }

    /// Wraps an error with record-level save context.
    pub fn save_failed(record: impl Into<String>, source: CoreError) -> Self {
        Self::SaveFailed {
            record: record.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through save context.
    #[must_use]
    pub fn root_cause(&self) -> &CoreError {
        let mut err = self;
        while let Self::SaveFailed { source, .. } = err {
            err = &**source;
        }
        err
    }
}
