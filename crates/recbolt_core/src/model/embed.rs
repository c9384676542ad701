//! Validating record types and installing identities.

use super::record::{install, ControlBlock, Record, Slot};
use crate::collection::Collection;
use crate::error::{CoreError, CoreResult};
use std::borrow::Cow;

/// Returns whether `name` can be used as a collection and bucket name.
pub(crate) fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Checks that `record` could be embedded, without changing it.
///
/// Returns the record type name on success.
///
/// # Errors
///
/// - [`CoreError::InvalidRecordType`] if the type name is not a plain
///   identifier
/// - [`CoreError::MissingIdentitySlot`] if the type exposes no slot
/// - [`CoreError::IncompatibleSlotType`] if the slot cannot hold a model
/// - [`CoreError::AlreadyEmbedded`] if the slot already carries an identity
pub fn check_record<T: Record>(record: &mut T) -> CoreResult<Cow<'static, str>> {
    let name = T::type_name();
    if !is_plain_name(&name) {
        return Err(CoreError::InvalidRecordType {
            type_name: name.into_owned(),
        });
    }

    let model = match record.slot() {
        None => {
            return Err(CoreError::MissingIdentitySlot {
                record: name.into_owned(),
            })
        }
        Some(Slot::Foreign(slot_type)) => {
            return Err(CoreError::IncompatibleSlotType {
                record: name.into_owned(),
                slot_type: slot_type.to_string(),
            })
        }
        Some(Slot::Inline(model)) => Some(&*model),
        Some(Slot::Boxed(model)) => model.as_deref(),
    };

    if let Some(id) = model.and_then(|model| model.id()) {
        return Err(CoreError::AlreadyEmbedded {
            record: name.into_owned(),
            id,
        });
    }

    Ok(name)
}

/// Installs a fresh identity into `record` and binds it to `collection`.
///
/// The identity has a new random id and zero timestamps. Embedding never
/// touches the store.
///
/// # Errors
///
/// See [`check_record`]. A failed embed leaves the record unchanged.
pub fn embed<'r, T: Record>(
    record: &'r mut T,
    collection: &Collection<T>,
) -> CoreResult<&'r mut T> {
    let name = check_record(record)?;
    install(record, ControlBlock::new(collection, &name))?;
    Ok(record)
}

/// Embeds `record` into `collection`, then decodes `bytes` into it.
///
/// The decoded identity replaces the fresh one.
///
/// # Errors
///
/// Embedding errors as for [`embed`]; any failure of the record's own
/// decode is reported as [`CoreError::Decode`].
pub fn unmarshal<'r, T: Record>(
    bytes: &[u8],
    record: &'r mut T,
    collection: &Collection<T>,
) -> CoreResult<&'r mut T> {
    let record = embed(record, collection)?;
    match record.decode(bytes) {
        Ok(()) => Ok(record),
        Err(err @ CoreError::Decode { .. }) => Err(err),
        Err(err) => Err(CoreError::decode(T::type_name(), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, ModelId};
    use crate::registry::Registry;
    use serde::{Deserialize, Serialize};
    use std::collections::HashSet;
    use std::marker::PhantomData;

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Widget {
        #[serde(skip)]
        model: Model,
        name: String,
        price: i64,
    }

    impl Record for Widget {
        fn slot(&mut self) -> Option<Slot<'_>> {
            Some(Slot::Inline(&mut self.model))
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Sprocket {
        #[serde(skip)]
        model: Option<Box<Model>>,
        teeth: u32,
    }

    impl Record for Sprocket {
        fn slot(&mut self) -> Option<Slot<'_>> {
            Some(Slot::Boxed(&mut self.model))
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Loose {
        name: String,
    }

    impl Record for Loose {
        fn slot(&mut self) -> Option<Slot<'_>> {
            None
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Misfit {
        model: String,
    }

    impl Record for Misfit {
        fn slot(&mut self) -> Option<Slot<'_>> {
            Some(Slot::Foreign("String"))
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Tagged<K> {
        #[serde(skip)]
        model: Model,
        #[serde(skip)]
        kind: PhantomData<K>,
    }

    impl Record for Tagged<u8> {
        fn slot(&mut self) -> Option<Slot<'_>> {
            Some(Slot::Inline(&mut self.model))
        }
    }

    fn widgets() -> (Registry, Collection<Widget>) {
        let registry = Registry::in_memory().unwrap();
        let widgets = registry.register::<Widget>().unwrap();
        (registry, widgets)
    }

    #[test]
    fn plain_names() {
        assert!(is_plain_name("Widget"));
        assert!(is_plain_name("_private2"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name("2fast"));
        assert!(!is_plain_name("Tagged<u8>"));
        assert!(!is_plain_name("(u8, u8)"));
    }

    #[test]
    fn embed_installs_fresh_identity() {
        let (_registry, widgets) = widgets();
        let mut widget = Widget::default();

        embed(&mut widget, &widgets).unwrap();

        assert!(widget.model.is_embedded());
        assert!(!widget.model.id().unwrap().is_nil());
        assert!(!widget.model.exists());
        assert!(widget.model.updated_at().is_zero());
        assert_eq!(widget.model.type_name(), Some("Widget"));
    }

    #[test]
    fn embed_is_fluent() {
        let (_registry, widgets) = widgets();
        let mut widget = Widget::default();

        embed(&mut widget, &widgets).unwrap().name = "bolt".into();
        assert_eq!(widget.name, "bolt");
    }

    #[test]
    fn second_embed_fails_and_keeps_identity() {
        let (_registry, widgets) = widgets();
        let mut widget = Widget::default();
        embed(&mut widget, &widgets).unwrap();
        let id = widget.model.id().unwrap();

        let err = embed(&mut widget, &widgets).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyEmbedded { id: got, .. } if got == id));
        assert_eq!(widget.model.id(), Some(id));
    }

    #[test]
    fn embedded_ids_are_distinct() {
        let (_registry, widgets) = widgets();
        let ids: HashSet<ModelId> = (0..500)
            .map(|_| {
                let mut widget = Widget::default();
                embed(&mut widget, &widgets).unwrap();
                widget.model.id().unwrap()
            })
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn boxed_slot_is_allocated() {
        let registry = Registry::in_memory().unwrap();
        let sprockets = registry.register::<Sprocket>().unwrap();
        let mut sprocket = Sprocket::default();
        assert!(sprocket.model.is_none());

        embed(&mut sprocket, &sprockets).unwrap();
        assert!(sprocket.model.as_ref().unwrap().is_embedded());

        assert!(matches!(
            check_record(&mut sprocket),
            Err(CoreError::AlreadyEmbedded { .. })
        ));
    }

    #[test]
    fn slot_errors() {
        assert!(matches!(
            check_record(&mut Loose::default()),
            Err(CoreError::MissingIdentitySlot { record }) if record == "Loose"
        ));
        assert!(matches!(
            check_record(&mut Misfit::default()),
            Err(CoreError::IncompatibleSlotType { slot_type, .. }) if slot_type == "String"
        ));
        assert!(matches!(
            check_record(&mut Tagged::<u8>::default()),
            Err(CoreError::InvalidRecordType { type_name }) if type_name.contains('<')
        ));
    }

    #[test]
    fn check_record_does_not_embed() {
        let mut widget = Widget::default();
        assert_eq!(check_record(&mut widget).unwrap(), "Widget");
        assert!(!widget.model.is_embedded());
    }

    #[test]
    fn unmarshal_restores_identity_and_fields() {
        let (_registry, widgets) = widgets();
        let mut original = Widget {
            name: "bolt".into(),
            price: 42,
            ..Widget::default()
        };
        embed(&mut original, &widgets).unwrap();
        let bytes = original.encode().unwrap();

        let mut copy = Widget::default();
        unmarshal(&bytes, &mut copy, &widgets).unwrap();

        assert_eq!(copy.model.identity(), original.model.identity());
        assert_eq!(copy.name, "bolt");
        assert_eq!(copy.price, 42);
        assert_eq!(copy.model.type_name(), Some("Widget"));
    }

    #[test]
    fn unmarshal_reports_garbage_as_decode_error() {
        let (_registry, widgets) = widgets();
        let mut widget = Widget::default();

        let err = unmarshal(b"\xff\x00garbage", &mut widget, &widgets).unwrap_err();
        assert!(matches!(err, CoreError::Decode { record, .. } if record == "Widget"));
    }
}
