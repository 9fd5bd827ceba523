//! End-to-end mapping properties: struct⇄record round trips through a
//! live backend, plus batch schema creation semantics.

use proptest::prelude::*;
use strata_core::{
    backend::{Backend, MemoryBackend},
    entity::{BindingError, Bindings, Entity, FromValue},
    error::ErrorKind,
    filter::Filter,
    model::Model,
    schema::{BatchCreateError, Collection, Field, FieldType, create_collections},
    value::Value,
};

#[derive(Clone, Debug, Default, PartialEq)]
struct Profile {
    id: i64,
    handle: String,
    karma: i64,
    bio: String,
}

impl Entity for Profile {
    fn bindings() -> Bindings<Self> {
        fn set_id(p: &mut Profile, v: Value) -> Result<(), BindingError> {
            p.id = FromValue::from_value(v)?;
            Ok(())
        }

        fn set_handle(p: &mut Profile, v: Value) -> Result<(), BindingError> {
            p.handle = FromValue::from_value(v)?;
            Ok(())
        }

        fn set_karma(p: &mut Profile, v: Value) -> Result<(), BindingError> {
            p.karma = FromValue::from_value(v)?;
            Ok(())
        }

        fn set_bio(p: &mut Profile, v: Value) -> Result<(), BindingError> {
            p.bio = FromValue::from_value(v)?;
            Ok(())
        }

        Bindings::builder()
            .bind_identity("id", |p| Value::Int(p.id), set_id)
            .bind("handle", |p| Value::Text(p.handle.clone()), set_handle)
            .bind("karma", |p| Value::Int(p.karma), set_karma)
            .bind_omit_empty("bio", |p| Value::Text(p.bio.clone()), set_bio)
            .build()
    }
}

fn profiles() -> Collection {
    Collection::new("profiles")
        .add_fields([
            Field::new("handle", FieldType::Text).required(),
            Field::new("karma", FieldType::Int),
            Field::new("bio", FieldType::Text),
        ])
        .expect("fixture fields are unique")
}

proptest! {
    /// Mapping a value to a record and populating a fresh value restores
    /// every bound field, except omit-empty zeros, which legitimately
    /// stay zero.
    #[test]
    fn record_roundtrip_preserves_bound_fields(
        id in 1i64..10_000,
        handle in "[a-z]{1,12}",
        karma in -1000i64..1000,
        bio in proptest::option::of("[a-z ]{1,24}"),
    ) {
        let profile = Profile {
            id,
            handle,
            karma,
            bio: bio.unwrap_or_default(),
        };

        let collection = profiles();
        let record = collection
            .make_record(&profile)
            .expect("mapping should succeed");
        let restored: Profile = record
            .decode(&collection)
            .expect("population should succeed");

        prop_assert_eq!(restored, profile);
    }
}

#[test]
fn model_roundtrip_through_a_live_backend() {
    let backend = MemoryBackend::new();
    let model: Model<'_, Profile> = Model::new(&backend, profiles());
    model.migrate().expect("migrate should succeed");

    let original = Profile {
        id: 0,
        handle: "ada".into(),
        karma: 42,
        bio: "analytical".into(),
    };
    model.create(&original).expect("create should succeed");

    let stored = model.get(1i64).expect("minted identity should load");
    assert_eq!(stored.handle, original.handle);
    assert_eq!(stored.karma, original.karma);
    assert_eq!(stored.bio, original.bio);
    assert_eq!(stored.id, 1);
}

#[test]
fn omitted_empty_fields_stay_zero_after_roundtrip() {
    let backend = MemoryBackend::new();
    let model: Model<'_, Profile> = Model::new(&backend, profiles());
    model.migrate().expect("migrate should succeed");

    model
        .create(&Profile {
            id: 0,
            handle: "quiet".into(),
            karma: 0,
            bio: String::new(),
        })
        .expect("create should succeed");

    let stored = model.get(1i64).expect("record should load");
    assert_eq!(stored.bio, "", "omit-empty field was never persisted");
    assert_eq!(stored.karma, 0, "plain zero persists and restores");
}

#[test]
fn parsed_filters_drive_the_model_end_to_end() {
    let backend = MemoryBackend::new();
    let model: Model<'_, Profile> = Model::new(&backend, profiles());
    model.migrate().expect("migrate should succeed");

    for (handle, karma) in [("ada", 42), ("alan", 7), ("grace", 99)] {
        model
            .create(&Profile {
                id: 0,
                handle: handle.into(),
                karma,
                bio: String::new(),
            })
            .expect("create should succeed");
    }

    let filter = Filter::parse("karma/gt/10").expect("grammar should parse");
    let found = model.find(&filter).expect("find should succeed");
    assert_eq!(found.len(), 2);

    let everyone = model
        .find(&Filter::parse("all").expect("'all' should parse"))
        .expect("find should succeed");
    assert_eq!(everyone.len(), 3, "'all' is unbounded");
}

#[test]
fn single_collection_batch_failure_returns_immediately() {
    let backend = MemoryBackend::new();
    backend
        .create_collection(&profiles())
        .expect("seed collection should create");

    let err = create_collections(&backend, vec![profiles()])
        .expect_err("duplicate creation should fail");

    match err {
        BatchCreateError::Single(inner) => {
            assert_eq!(inner.kind, ErrorKind::Exists, "the specific kind survives");
        }
        BatchCreateError::Many { .. } => panic!("one collection must fail as Single"),
    }
}

#[test]
fn multi_collection_batch_collects_failures_and_keeps_successes() {
    let backend = MemoryBackend::new();
    backend
        .create_collection(&profiles())
        .expect("seed collection should create");

    let fresh = Collection::new("settings");
    let err = create_collections(&backend, vec![profiles(), fresh])
        .expect_err("the duplicate entry should fail the batch");

    match err {
        BatchCreateError::Many { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "profiles");
        }
        BatchCreateError::Single(_) => panic!("a batch must collect failures"),
    }

    assert!(
        backend
            .list_collections()
            .expect("listing should succeed")
            .contains(&"settings".to_string()),
        "collections after the failure are still created"
    );
}
