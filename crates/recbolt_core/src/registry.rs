//! The collection registry: owner of the store and of every collection.

use crate::collection::{Collection, CollectionInner};
use crate::config::Options;
use crate::error::{CoreError, CoreResult};
use crate::model::Record;
use parking_lot::RwLock;
use recbolt_store::{Store, StoreError};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info_span, Span};

type ErasedCollection = Arc<dyn Any + Send + Sync>;

/// Owns a store and the collections registered on it.
///
/// Each record type name is registered at most once per registry. The
/// registry lock guards only the name map and is never held across a store
/// call.
///
/// # Example
///
/// ```rust,no_run
/// use recbolt_core::{Options, Registry};
///
/// let registry = Registry::open(Options::new().file("parts.db")).unwrap();
/// println!("collections: {:?}", registry.names());
/// registry.close().unwrap();
/// ```
pub struct Registry {
    name: String,
    store: Arc<Store>,
    collections: RwLock<HashMap<String, ErasedCollection>>,
    span: Span,
}

impl Registry {
    /// Opens the store file described by `options`.
    ///
    /// Log output nests under the current span.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] if another holder keeps the
    /// file locked past the open timeout, or [`CoreError::Store`] if the
    /// file cannot be read.
    pub fn open(options: Options) -> CoreResult<Self> {
        Self::open_in(options, Span::current())
    }

    /// Opens the store file described by `options`, logging under `parent`.
    ///
    /// # Errors
    ///
    /// See [`Registry::open`].
    pub fn open_in(options: Options, parent: Span) -> CoreResult<Self> {
        let store = Store::open(options.path(), options.store_options()).map_err(|err| {
            error!(
                parent: &parent,
                file = %options.file.display(),
                error = %err,
                "failed to open store"
            );
            match err {
                StoreError::Locked { path, timeout } => {
                    CoreError::StoreUnavailable { path, timeout }
                }
                other => CoreError::Store(other),
            }
        })?;

        let registry = Self::build(options.name(), store, &parent);
        debug!(parent: &registry.span, file = %options.file.display(), "registry opened");
        Ok(registry)
    }

    /// Opens a registry over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the store cannot be created.
    pub fn in_memory() -> CoreResult<Self> {
        Ok(Self::build(
            "memory".to_string(),
            Store::open_in_memory()?,
            &Span::current(),
        ))
    }

    /// Wraps an already opened store.
    #[must_use]
    pub fn with_store(store: Store, parent: Span) -> Self {
        let name = match store.path().and_then(|path| path.file_stem()) {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => "memory".to_string(),
        };
        Self::build(name, store, &parent)
    }

    fn build(name: String, store: Store, parent: &Span) -> Self {
        let span = info_span!(parent: parent, "registry", store = %name);
        Self {
            name,
            store: Arc::new(store),
            collections: RwLock::new(HashMap::new()),
            span,
        }
    }

    /// Returns the store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Registers the collection for `T` and loads it from the store.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DuplicateCollection`] if `T`'s name is taken
    /// - validation errors if `T` is not a usable record type
    /// - [`CoreError::Decode`] or a store error if loading fails
    ///
    /// A failed registration leaves no trace in the registry.
    pub fn register<T: Record>(&self) -> CoreResult<Collection<T>> {
        let name = T::type_name().into_owned();
        self.register_named::<T>(&name).inspect_err(|err| {
            error!(
                parent: &self.span,
                collection = %name,
                error = %err,
                "failed to register collection"
            );
        })
    }

    fn register_named<T: Record>(&self, name: &str) -> CoreResult<Collection<T>> {
        let duplicate = || CoreError::DuplicateCollection {
            name: name.to_string(),
        };

        if self.collections.read().contains_key(name) {
            return Err(duplicate());
        }

        let collection = Collection::<T>::register(Arc::clone(&self.store), &self.span)?;

        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(duplicate());
        }
        let erased: ErasedCollection = collection.inner().clone();
        collections.insert(name.to_string(), erased);

        debug!(
            parent: &self.span,
            collection = %name,
            records = collection.len(),
            "collection registered"
        );
        Ok(collection)
    }

    /// Returns the collection registered under `name`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::CollectionNotFound`] if nothing is registered under it
    /// - [`CoreError::InvalidRecordType`] if it holds records other than `T`
    pub fn get<T: Record>(&self, name: &str) -> CoreResult<Collection<T>> {
        let erased = self
            .collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::CollectionNotFound {
                name: name.to_string(),
            })?;

        erased
            .downcast::<CollectionInner<T>>()
            .map(Collection::from_inner)
            .map_err(|_| CoreError::InvalidRecordType {
                type_name: T::type_name().into_owned(),
            })
    }

    /// Returns the registered collection names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Closes the store.
    ///
    /// Collections stay reachable but every later save fails with a store
    /// error. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the final sync fails.
    pub fn close(&self) -> CoreResult<()> {
        self.store.close().map_err(|err| {
            error!(parent: &self.span, error = %err, "failed to close store");
            CoreError::from(err)
        })?;
        debug!(parent: &self.span, "registry closed");
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("collections", &self.names())
            .field("store", &self.store)
            .finish()
    }
}
