//! Record lifecycle tests across registry, collection and store.

use proptest::prelude::*;
use recbolt_core::{CoreError, Identity, ModelId, Rec, Registry};
use recbolt_store::{Store, StoreError, StoreOptions, StoreResult};
use recbolt_testkit::prelude::*;
use std::collections::HashSet;
use std::thread;
use tracing::Span;

fn identity_of(rec: &Rec<Widget>) -> Identity {
    rec.read(|w| *w.model.identity().expect("embedded"))
}

fn stored(registry: &Registry, bucket: &str, id: ModelId) -> Option<Vec<u8>> {
    registry
        .store()
        .view(|tx| -> StoreResult<Option<Vec<u8>>> {
            Ok(tx
                .bucket(bucket.as_bytes())
                .and_then(|b| b.get(id.key().as_bytes()))
                .map(<[u8]>::to_vec))
        })
        .unwrap()
}

#[test]
fn create_close_reopen_rehydrates() {
    let mut temp = TempRegistry::new();
    let widgets = temp.register::<Widget>().unwrap();
    let bolt = Widget::rec("bolt", 42);
    widgets.create(&bolt).unwrap();

    assert_eq!(widgets.len(), 1);
    assert!(bolt.exists());
    let before = identity_of(&bolt);
    drop(widgets);

    let registry = temp.reopen();
    let widgets = registry.register::<Widget>().unwrap();
    assert_eq!(widgets.len(), 1);

    let loaded = widgets.get(before.id()).expect("rehydrated");
    assert_eq!(identity_of(&loaded), before);
    loaded.read(|w| {
        assert_eq!(w.name, "bolt");
        assert_eq!(w.price, 42);
    });
}

#[test]
fn updates_survive_reopen() {
    let mut temp = TempRegistry::new();
    let widgets = temp.register::<Widget>().unwrap();
    let bolt = Widget::rec("bolt", 42);
    widgets.create(&bolt).unwrap();
    let created = bolt.created_at();

    bolt.update(|w| w.price = 45);
    bolt.save().unwrap();
    let updated = bolt.updated_at();
    assert!(updated > created);

    let registry = temp.reopen();
    let widgets = registry.register::<Widget>().unwrap();
    let loaded = widgets.get(bolt.id().unwrap()).unwrap();
    assert_eq!(loaded.created_at(), created);
    assert_eq!(loaded.updated_at(), updated);
    assert_eq!(loaded.read(|w| w.price), 45);

    loaded.update(|w| w.price = 50);
    loaded.save().unwrap();
    assert_eq!(loaded.created_at(), created);
    assert!(loaded.updated_at() > updated);
}

#[test]
fn boxed_slot_records_round_trip() {
    let mut temp = TempRegistry::new();
    let gadgets = temp.register::<Gadget>().unwrap();
    let lamp = Gadget::rec("lamp", &["desk", "led"]);
    gadgets.create(&lamp).unwrap();
    lamp.update(|g| g.weight = Some(350));
    lamp.save().unwrap();
    let id = lamp.id().unwrap();

    let registry = temp.reopen();
    let gadgets = registry.register::<Gadget>().unwrap();
    let loaded = gadgets.get(id).unwrap();
    loaded.read(|g| {
        assert_eq!(g.label, "lamp");
        assert_eq!(g.tags, ["desk", "led"]);
        assert_eq!(g.weight, Some(350));
        assert_eq!(g.model.as_ref().and_then(|m| m.id()), Some(id));
    });
}

#[test]
fn duplicate_registration_leaves_first_handle_working() {
    with_temp_registry(|registry| {
        let widgets = registry.register::<Widget>().unwrap();

        let err = registry.register::<Widget>().unwrap_err();
        assert!(matches!(err, CoreError::DuplicateCollection { name } if name == "Widget"));

        widgets.create(&Widget::rec("bolt", 42)).unwrap();
        assert_eq!(registry.get::<Widget>("Widget").unwrap().len(), 1);
    });
}

#[test]
fn duplicate_id_store_keeps_first_record() {
    with_memory_registry(|registry| {
        let widgets = registry.register::<Widget>().unwrap();
        let first = Widget::rec("bolt", 42);
        widgets.create(&first).unwrap();
        let id = first.id().unwrap();
        let first_bytes = stored(registry, "Widget", id).unwrap();

        let twin = Rec::new(first.read(Widget::clone));
        twin.update(|w| w.price = 1);
        let err = twin.save().unwrap_err();

        assert!(matches!(err, CoreError::SaveFailed { .. }));
        assert!(matches!(err.root_cause(), CoreError::DuplicateModel { .. }));
        assert_eq!(stored(registry, "Widget", id).unwrap(), first_bytes);
    });
}

#[test]
fn identity_mismatch_across_registries() {
    let left = TempRegistry::new();
    let right = TempRegistry::new();
    let left_widgets = left.register::<Widget>().unwrap();
    let right_widgets = right.register::<Widget>().unwrap();

    let bolt = Widget::rec("bolt", 42);
    left_widgets.create(&bolt).unwrap();
    let log_size = right.store().log_size().unwrap();

    assert!(matches!(
        right_widgets.save(&bolt),
        Err(CoreError::IdentityMismatch { .. })
    ));
    assert_eq!(right.store().log_size().unwrap(), log_size);
    assert!(stored(&right, "Widget", bolt.id().unwrap()).is_none());
}

#[test]
fn failed_write_restores_timestamps_and_index() {
    let backend = FailingBackend::new();
    let store =
        Store::open_with_backend(Box::new(backend.clone()), StoreOptions::default()).unwrap();
    let registry = Registry::with_store(store, Span::current());
    let widgets = registry.register::<Widget>().unwrap();

    let bolt = Widget::rec("bolt", 42);
    widgets.create(&bolt).unwrap();
    let before = identity_of(&bolt);
    let written = backend.data();

    backend.set_failing(true);
    bolt.update(|w| w.price = 99);
    let err = bolt.save().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        CoreError::Store(StoreError::Io(_))
    ));
    assert_eq!(identity_of(&bolt), before);
    assert_eq!(backend.data(), written);

    let nut = Widget::rec("nut", 7);
    assert!(widgets.create(&nut).is_err());
    assert!(nut.is_embedded());
    assert!(!nut.exists());
    assert!(widgets.get(nut.id().unwrap()).is_none());
    assert_eq!(widgets.len(), 1);

    backend.set_failing(false);
    bolt.save().unwrap();
    assert!(bolt.updated_at() > before.updated_at());
    assert_eq!(bolt.created_at(), before.created_at());
}

#[test]
fn store_unavailable_while_held() {
    let temp = TempRegistry::new();
    let err = Registry::open(temp.open_options()).unwrap_err();
    assert!(matches!(err, CoreError::StoreUnavailable { .. }));
}

#[test]
fn concurrent_creates_across_collections() {
    with_temp_registry(|registry| {
        let widgets = registry.register::<Widget>().unwrap();
        let gadgets = registry.register::<Gadget>().unwrap();

        let ids: Vec<ModelId> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let widgets = widgets.clone();
                    let gadgets = gadgets.clone();
                    s.spawn(move || {
                        let mut ids = Vec::new();
                        for i in 0..20 {
                            let widget = Widget::rec(format!("w{t}-{i}"), i);
                            widgets.create(&widget).unwrap();
                            ids.push(widget.id().unwrap());

                            let gadget = Gadget::rec(format!("g{t}-{i}"), &[]);
                            gadgets.create(&gadget).unwrap();
                        }
                        ids
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 80);
        assert_eq!(widgets.len(), 80);
        assert_eq!(gadgets.len(), 80);

        widgets.load().unwrap();
        gadgets.load().unwrap();
        assert_eq!(widgets.len(), 80);
        assert_eq!(gadgets.len(), 80);
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn saved_fields_rehydrate(batch in arb_widgets(8)) {
        let mut temp = TempRegistry::new();
        let widgets = temp.register::<Widget>().unwrap();

        let mut expected = Vec::new();
        for widget in batch {
            let fields = (widget.name.clone(), widget.price);
            let rec = Rec::new(widget);
            widgets.create(&rec).unwrap();
            expected.push((rec.id().unwrap(), fields));
        }

        let registry = temp.reopen();
        let widgets = registry.register::<Widget>().unwrap();
        prop_assert_eq!(widgets.len(), expected.len());
        for (id, (name, price)) in expected {
            let loaded = widgets.get(id).unwrap();
            prop_assert_eq!(loaded.read(|w| (w.name.clone(), w.price)), (name, price));
        }
    }
}
