//! Typed collections: one record type, one bucket, one in-memory index.
//!
//! A collection's index maps record ids to shared [`Rec`] handles. The
//! index only ever holds records whose latest state has been durably
//! written: [`Collection::save`] writes to the store first and updates the
//! index afterwards, under the collection lock.

use crate::error::{CoreError, CoreResult};
use crate::model::record::{block_mut, model_mut, Record};
use crate::model::{check_record, embed, unmarshal, ModelId, Rec};
use parking_lot::RwLock;
use recbolt_store::{Store, StoreResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info_span, Span};

pub(crate) struct CollectionInner<T> {
    name: String,
    store: Arc<Store>,
    index: RwLock<HashMap<ModelId, Rec<T>>>,
    span: Span,
}

/// A handle to the collection of one record type.
///
/// Handles are cheap to clone and all refer to the same index. Obtain one
/// with [`crate::Registry::register`] or [`crate::Registry::get`].
///
/// # Example
///
/// ```rust
/// use recbolt_core::{Model, Rec, Record, Registry, Slot};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Widget {
///     #[serde(skip)]
///     model: Model,
///     name: String,
///     price: i64,
/// }
///
/// impl Record for Widget {
///     fn slot(&mut self) -> Option<Slot<'_>> {
///         Some(Slot::Inline(&mut self.model))
///     }
/// }
///
/// let registry = Registry::in_memory().unwrap();
/// let widgets = registry.register::<Widget>().unwrap();
///
/// let bolt = Rec::new(Widget { name: "bolt".into(), price: 42, ..Widget::default() });
/// widgets.create(&bolt).unwrap();
///
/// assert!(bolt.exists());
/// assert_eq!(widgets.len(), 1);
/// ```
pub struct Collection<T> {
    inner: Arc<CollectionInner<T>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Record> Collection<T> {
    /// Validates `T`, then builds the collection and loads its bucket.
    pub(crate) fn register(store: Arc<Store>, parent: &Span) -> CoreResult<Self> {
        let name = check_record(&mut T::default())?.into_owned();
        let span = info_span!(parent: parent, "collection", collection = %name);

        let collection = Self {
            inner: Arc::new(CollectionInner {
                name,
                store,
                index: RwLock::new(HashMap::new()),
                span,
            }),
        };
        collection.load()?;
        Ok(collection)
    }

    pub(crate) fn from_inner(inner: Arc<CollectionInner<T>>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<CollectionInner<T>> {
        &self.inner
    }

    pub(crate) fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Returns the collection name, which is also its bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Rebuilds the index from the collection's bucket.
    ///
    /// Every stored entry is decoded into a fresh record. A missing bucket
    /// is an empty collection. Handles obtained before the load are no
    /// longer indexed; saving one of them fails with
    /// [`CoreError::DuplicateModel`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] if any entry fails to decode, or a
    /// store error. The index is left as it was on failure.
    pub fn load(&self) -> CoreResult<()> {
        let mut index = self.inner.index.write();

        let loaded = self
            .inner
            .store
            .view(|tx| -> CoreResult<HashMap<ModelId, Rec<T>>> {
                let mut loaded = HashMap::new();
                let Some(bucket) = tx.bucket(self.inner.name.as_bytes()) else {
                    return Ok(loaded);
                };

                for (_, bytes) in bucket.iter() {
                    let mut record = T::default();
                    unmarshal(bytes, &mut record, self)?;
                    let id = model_mut(&mut record)
                        .and_then(|model| model.id())
                        .ok_or_else(|| CoreError::UninitializedRecord {
                            record: self.inner.name.clone(),
                        })?;
                    loaded.insert(id, Rec::new(record));
                }
                Ok(loaded)
            })
            .inspect_err(|err| {
                error!(parent: &self.inner.span, error = %err, "failed to load collection");
            })?;

        debug!(parent: &self.inner.span, records = loaded.len(), "collection loaded");
        *index = loaded;
        Ok(())
    }

    /// Embeds a bare record into this collection and saves it.
    ///
    /// # Errors
    ///
    /// Embedding errors (see [`crate::embed`]) or the errors of
    /// [`Rec::save`]. If the save fails the record stays embedded but
    /// does not exist.
    pub fn create(&self, rec: &Rec<T>) -> CoreResult<()> {
        let mut record = rec.lock();
        embed(&mut *record, self).inspect_err(|err| {
            error!(parent: &self.inner.span, error = %err, "failed to embed model");
        })?;
        rec.save_locked(&mut record)
    }

    /// Writes a record to the store, then indexes it.
    ///
    /// This does not move the record's timestamps; application code
    /// normally calls [`Rec::save`], which does and then calls here.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UninitializedRecord`] for a bare record
    /// - [`CoreError::IdentityMismatch`] if the record belongs elsewhere
    /// - [`CoreError::Encode`] if the record does not encode
    /// - [`CoreError::DuplicateModel`] if another record holds the same id
    /// - [`CoreError::Store`] if the write fails
    ///
    /// The index is unchanged on any error.
    pub fn save(&self, rec: &Rec<T>) -> CoreResult<()> {
        let mut record = rec.lock();
        self.save_locked(rec, &mut record)
    }

    pub(crate) fn save_locked(&self, rec: &Rec<T>, record: &mut T) -> CoreResult<()> {
        self.write(rec, record).inspect_err(|err| {
            error!(parent: &self.inner.span, error = %err, "failed to write model");
        })
    }

    fn write(&self, rec: &Rec<T>, record: &mut T) -> CoreResult<()> {
        let block = block_mut(record).ok_or_else(|| CoreError::UninitializedRecord {
            record: self.inner.name.clone(),
        })?;
        if !block.is_owned_by(self) {
            return Err(CoreError::IdentityMismatch {
                collection: self.inner.name.clone(),
            });
        }
        let id = block.identity.id();

        let bytes = record.encode().map_err(|err| match err {
            CoreError::Encode { .. } => err,
            other => CoreError::encode(self.inner.name.clone(), other),
        })?;

        let mut index = self.inner.index.write();
        if index.get(&id).is_some_and(|existing| !existing.ptr_eq(rec)) {
            return Err(CoreError::DuplicateModel {
                collection: self.inner.name.clone(),
                id,
            });
        }

        self.inner.store.update(|tx| -> StoreResult<()> {
            let mut bucket = tx.create_bucket_if_not_exists(self.inner.name.as_bytes())?;
            bucket.put(id.key().as_bytes(), &bytes)
        })?;

        index.insert(id, rec.clone());
        Ok(())
    }

    /// Returns the indexed record with this id.
    #[must_use]
    pub fn get(&self, id: ModelId) -> Option<Rec<T>> {
        self.inner.index.read().get(&id).cloned()
    }

    /// Returns the number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.index.read().len()
    }

    /// Returns whether no records are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.index.read().is_empty()
    }

    /// Returns the ids of all indexed records, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<ModelId> {
        let mut ids: Vec<ModelId> = self.inner.index.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns all indexed records, sorted by id.
    #[must_use]
    pub fn records(&self) -> Vec<Rec<T>> {
        let index = self.inner.index.read();
        let mut entries: Vec<(&ModelId, &Rec<T>)> = index.iter().collect();
        entries.sort_unstable_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, rec)| rec.clone()).collect()
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.inner.name)
            .field("len", &self.inner.index.read().len())
            .finish()
    }
}
