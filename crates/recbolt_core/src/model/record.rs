//! The record capability trait and the identity slot it exposes.

use super::{Identity, ModelId, Timestamp};
use crate::collection::{Collection, CollectionInner};
use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

/// The identity slot of a record.
///
/// A bare `Model` (the `Default`) carries nothing; embedding installs an
/// identity, the owning collection and the record's type name. Record types
/// hold it in a field marked `#[serde(skip)]` so that it is kept out of the
/// user-field section of the encoded form.
#[derive(Default, Clone)]
pub struct Model {
    pub(crate) block: Option<ControlBlock>,
}

#[derive(Clone)]
pub(crate) struct ControlBlock {
    pub(crate) identity: Identity,
    pub(crate) owner: Weak<dyn Any + Send + Sync>,
    pub(crate) name: Arc<str>,
}

impl ControlBlock {
    pub(crate) fn new<T: Record>(collection: &Collection<T>, name: &str) -> Self {
        let owner: Weak<CollectionInner<T>> = Arc::downgrade(collection.inner());
        Self {
            identity: Identity::fresh(),
            owner: owner as Weak<dyn Any + Send + Sync>,
            name: Arc::from(name),
        }
    }

    pub(crate) fn is_owned_by<T: Record>(&self, collection: &Collection<T>) -> bool {
        Weak::as_ptr(&self.owner) as *const () == Arc::as_ptr(collection.inner()) as *const ()
    }

    pub(crate) fn owner<T: Record>(&self) -> Option<Collection<T>> {
        let owner = self.owner.upgrade()?;
        owner
            .downcast::<CollectionInner<T>>()
            .ok()
            .map(Collection::from_inner)
    }
}

impl Model {
    /// Creates a bare model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether an identity has been installed.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.block.is_some()
    }

    /// Returns the identity, or `None` for a bare model.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.block.as_ref().map(|b| &b.identity)
    }

    /// Returns the record id, or `None` for a bare model.
    #[must_use]
    pub fn id(&self) -> Option<ModelId> {
        self.identity().map(Identity::id)
    }

    /// Returns when the record was first saved; zero if never or bare.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.identity().map_or(Timestamp::ZERO, Identity::created_at)
    }

    /// Returns when the record was last saved; zero if never or bare.
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.identity().map_or(Timestamp::ZERO, Identity::updated_at)
    }

    /// Returns the deletion mark; always zero in practice.
    #[must_use]
    pub fn deleted_at(&self) -> Timestamp {
        self.identity().map_or(Timestamp::ZERO, Identity::deleted_at)
    }

    /// Returns whether the record has been durably written.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.identity().is_some_and(Identity::exists)
    }

    /// Returns the record type name recorded at embedding.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.block.as_ref().map(|b| &*b.name)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.block {
            None => f.write_str("Model(bare)"),
            Some(block) => f
                .debug_struct("Model")
                .field("name", &block.name)
                .field("identity", &block.identity)
                .finish(),
        }
    }
}

/// How a record type declares its identity slot.
pub enum Slot<'a> {
    /// The model is stored inline.
    Inline(&'a mut Model),
    /// The model is stored behind a box, allocated on embedding.
    Boxed(&'a mut Option<Box<Model>>),
    /// The slot exists but has another type, named here.
    Foreign(&'static str),
}

/// A type that can be stored in a collection.
///
/// Implementors hold a [`Model`] and hand it out through [`Record::slot`].
/// Encoding defaults to a CBOR envelope with the identity under `model` and
/// the serde form of the record under `record`.
///
/// # Example
///
/// ```rust
/// use recbolt_core::{Model, Record, Slot};
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
/// assert_eq!(Widget::type_name(), "Widget");
/// ```
pub trait Record: Serialize + DeserializeOwned + Default + Send + 'static {
    /// Returns the identity slot, or `None` if the type has none.
    fn slot(&mut self) -> Option<Slot<'_>>;

    /// Returns the name used for the collection and its bucket.
    ///
    /// Defaults to the last path segment of the Rust type name.
    fn type_name() -> Cow<'static, str> {
        short_type_name::<Self>()
    }

    /// Encodes the identity and the user fields together.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UninitializedRecord`] for a bare record or
    /// [`CoreError::Encode`] if serialization fails.
    fn encode(&mut self) -> CoreResult<Vec<u8>> {
        encode_envelope(self)
    }

    /// Replaces the identity and the user fields with the decoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UninitializedRecord`] for a bare record or
    /// [`CoreError::Decode`] if the bytes do not decode; the record is left
    /// unchanged in either case.
    fn decode(&mut self, bytes: &[u8]) -> CoreResult<()> {
        decode_envelope(self, bytes)
    }
}

/// Returns the last path segment of `T`'s type name.
///
/// Names that are not a plain path (generics, tuples, references, closures)
/// are returned whole so that validation rejects them.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> Cow<'static, str> {
    let full = std::any::type_name::<T>();
    if full.contains(|c: char| matches!(c, '<' | '(' | '[' | '&' | '{' | ' ' | '*')) {
        return Cow::Borrowed(full);
    }
    Cow::Borrowed(full.rsplit("::").next().unwrap_or(full))
}

pub(crate) fn model_mut<T: Record>(record: &mut T) -> Option<&mut Model> {
    match record.slot()? {
        Slot::Inline(model) => Some(model),
        Slot::Boxed(model) => model.as_deref_mut(),
        Slot::Foreign(_) => None,
    }
}

pub(crate) fn block_mut<T: Record>(record: &mut T) -> Option<&mut ControlBlock> {
    model_mut(record)?.block.as_mut()
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    model: &'a Identity,
    record: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    model: Identity,
    record: T,
}

/// Encodes `record` as a `{ model, record }` CBOR map.
///
/// This is the default [`Record::encode`]; overriding implementations can
/// call it after their own checks.
///
/// # Errors
///
/// See [`Record::encode`].
pub fn encode_envelope<T: Record>(record: &mut T) -> CoreResult<Vec<u8>> {
    let identity = block_mut(record)
        .map(|block| block.identity)
        .ok_or_else(|| CoreError::UninitializedRecord {
            record: T::type_name().into_owned(),
        })?;

    let mut bytes = Vec::new();
    ciborium::ser::into_writer(
        &EnvelopeRef {
            model: &identity,
            record: &*record,
        },
        &mut bytes,
    )
    .map_err(|err| CoreError::encode(T::type_name(), err))?;
    Ok(bytes)
}

/// Decodes a `{ model, record }` CBOR map into `record`, keeping its owner.
///
/// This is the default [`Record::decode`].
///
/// # Errors
///
/// See [`Record::decode`].
pub fn decode_envelope<T: Record>(record: &mut T, bytes: &[u8]) -> CoreResult<()> {
    if block_mut(record).is_none() {
        return Err(CoreError::UninitializedRecord {
            record: T::type_name().into_owned(),
        });
    }

    let envelope: Envelope<T> =
        ciborium::de::from_reader(bytes).map_err(|err| CoreError::decode(T::type_name(), err))?;

    let Some(mut block) = model_mut(record).and_then(|model| model.block.take()) else {
        return Err(CoreError::UninitializedRecord {
            record: T::type_name().into_owned(),
        });
    };
    block.identity = envelope.model;

    *record = envelope.record;
    install(record, block)
}

/// Puts a control block into the record's slot, allocating a boxed slot.
pub(crate) fn install<T: Record>(record: &mut T, block: ControlBlock) -> CoreResult<()> {
    match record.slot() {
        Some(Slot::Inline(model)) => model.block = Some(block),
        Some(Slot::Boxed(model)) => model.get_or_insert_with(Box::default).block = Some(block),
        Some(Slot::Foreign(slot_type)) => {
            return Err(CoreError::IncompatibleSlotType {
                record: T::type_name().into_owned(),
                slot_type: slot_type.to_string(),
            })
        }
        None => {
            return Err(CoreError::MissingIdentitySlot {
                record: T::type_name().into_owned(),
            })
        }
    }
    Ok(())
}
