//! Shared record handles.

use super::record::{block_mut, model_mut, Record};
use super::{ModelId, Timestamp};
use crate::error::{CoreError, CoreResult};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// A shared reference to a record.
///
/// The record lives behind its own exclusive lock. Cloning a `Rec` clones
/// the reference; the owning collection's index holds clones of the same
/// kind, so a record loaded from the store stays reachable through
/// [`crate::Collection::get`] until the next load.
pub struct Rec<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for Rec<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Record> Rec<T> {
    /// Wraps a record value.
    pub fn new(record: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(record)),
        }
    }

    /// Returns whether both handles refer to the same record.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    /// Runs `f` with shared access to the record.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Runs `f` with mutable access to the record's fields.
    ///
    /// Nothing is written; call [`Rec::save`] afterwards to persist.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.lock())
    }

    fn with_model<R>(&self, f: impl FnOnce(Option<&super::Model>) -> R) -> R {
        let mut record = self.inner.lock();
        f(model_mut(&mut *record).map(|model| &*model))
    }

    /// Returns the record id, or `None` while the record is bare.
    #[must_use]
    pub fn id(&self) -> Option<ModelId> {
        self.with_model(|model| model.and_then(super::Model::id))
    }

    /// Returns when the record was first saved.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.with_model(|model| model.map_or(Timestamp::ZERO, super::Model::created_at))
    }

    /// Returns when the record was last saved.
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.with_model(|model| model.map_or(Timestamp::ZERO, super::Model::updated_at))
    }

    /// Returns the deletion mark.
    #[must_use]
    pub fn deleted_at(&self) -> Timestamp {
        self.with_model(|model| model.map_or(Timestamp::ZERO, super::Model::deleted_at))
    }

    /// Returns whether the record has been saved at least once.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.with_model(|model| model.is_some_and(super::Model::exists))
    }

    /// Returns whether the record has an identity.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.with_model(|model| model.is_some_and(super::Model::is_embedded))
    }

    /// Returns the name of the owning collection, or `None` while bare.
    #[must_use]
    pub fn collection_name(&self) -> Option<String> {
        self.with_model(|model| model.and_then(super::Model::type_name).map(str::to_owned))
    }

    /// Encodes the record under its lock.
    ///
    /// # Errors
    ///
    /// As for [`Record::encode`].
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        self.inner.lock().encode()
    }

    /// Saves the record through its owning collection.
    ///
    /// Under the record lock: stamps `updated_at` (and `created_at` on the
    /// first save), then asks the collection to write it. If the write
    /// fails the three timestamps are put back exactly as they were.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UninitializedRecord`] for a bare record
    /// - [`CoreError::CollectionClosed`] if the owning collection is gone
    /// - [`CoreError::SaveFailed`] wrapping the collection's error otherwise
    pub fn save(&self) -> CoreResult<()> {
        let mut record = self.inner.lock();
        self.save_locked(&mut record)
    }

    pub(crate) fn save_locked(&self, record: &mut T) -> CoreResult<()> {
        let uninitialized = || CoreError::UninitializedRecord {
            record: T::type_name().into_owned(),
        };
        let block = block_mut(record).ok_or_else(uninitialized)?;

        let collection = block
            .owner::<T>()
            .ok_or_else(|| CoreError::CollectionClosed {
                record: block.name.to_string(),
            })?;

        let snapshot = block.identity.timestamps();
        block.identity.touch();

        if let Err(err) = collection.save_locked(self, record) {
            let (id, name) = match block_mut(record) {
                Some(block) => {
                    block.identity.restore(snapshot);
                    (block.identity.id(), block.name.to_string())
                }
                None => return Err(uninitialized()),
            };
            error!(parent: collection.span(), %id, error = %err, "failed to save model");
            return Err(CoreError::save_failed(name, err));
        }

        Ok(())
    }
}

impl<T: Record + fmt::Debug> fmt::Debug for Rec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(record) => f.debug_tuple("Rec").field(&*record).finish(),
            None => f.write_str("Rec(<locked>)"),
        }
    }
}
