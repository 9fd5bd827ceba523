use crate::{
    backend::Backend,
    entity::{Bindings, Entity, make_record_with, populate_with},
    error::Error,
    filter::Filter,
    record::RecordSet,
    schema::{Collection, DEFAULT_IDENTITY_FIELD},
    value::Value,
};
use std::fmt::Write as _;
use tracing::info;

///
/// Model
///
/// Per-entity handle binding a backend, a collection, and the entity's
/// binding table. The table is built once here and consulted on every
/// mapping, so registration cost is paid at construction.
///

pub struct Model<'a, E: Entity> {
    backend: &'a dyn Backend,
    collection: Collection,
    bindings: Bindings<E>,
}

impl<'a, E: Entity> Model<'a, E> {
    pub fn new(backend: &'a dyn Backend, mut collection: Collection) -> Self {
        if collection.identity_field.is_empty() {
            collection.identity_field = DEFAULT_IDENTITY_FIELD.to_string();
        }

        Self {
            backend,
            collection,
            bindings: E::bindings(),
        }
    }

    #[must_use]
    pub const fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Reconcile the desired schema with the backend.
    ///
    /// A missing collection is created and re-fetched as the new actual
    /// baseline; any other lookup failure propagates unchanged. Schema
    /// drift fails closed: the error enumerates every delta and nothing
    /// is patched implicitly.
    pub fn migrate(&self) -> Result<(), Error> {
        let name = &self.collection.name;

        let actual = match self.backend.get_collection(name) {
            Ok(collection) => collection,
            Err(err) if err.is_not_found() => {
                info!(collection = %name, "creating missing collection");
                self.backend.create_collection(&self.collection)?;
                self.backend.get_collection(name)?
            }
            Err(err) => return Err(err),
        };

        let deltas = self.collection.diff(&actual);

        if deltas.is_empty() {
            info!(collection = %name, "schema verified");
            return Ok(());
        }

        let mut message = format!(
            "actual schema for collection '{name}' differs from desired schema:\n"
        );

        for delta in &deltas {
            let _ = writeln!(message, "  {delta}");
        }

        Err(Error::schema_mismatch(message))
    }

    /// Remove the collection and its records from the backend.
    pub fn drop_collection(&self) -> Result<(), Error> {
        self.backend.delete_collection(&self.collection.name)
    }

    /// Save a new instance.
    pub fn create(&self, from: &E) -> Result<(), Error> {
        let record = make_record_with(&self.collection, &self.bindings, from)?;
        self.backend
            .insert(&self.collection.name, &RecordSet::of(record))
    }

    /// Load the instance with the given identity.
    pub fn get(&self, id: impl Into<Value>) -> Result<E, Error> {
        let record = self.backend.retrieve(&self.collection.name, &id.into(), &[])?;
        let mut target = E::default();
        populate_with(&record, &self.collection, &self.bindings, &mut target)?;
        Ok(target)
    }

    pub fn exists(&self, id: impl Into<Value>) -> bool {
        self.backend.exists(&self.collection.name, &id.into())
    }

    /// Save changes to an existing instance.
    pub fn update(&self, from: &E) -> Result<(), Error> {
        let record = make_record_with(&self.collection, &self.bindings, from)?;
        self.backend
            .update(&self.collection.name, &RecordSet::of(record))
    }

    /// Create or update depending on whether the identity exists.
    pub fn save(&self, id: impl Into<Value>, from: &E) -> Result<(), Error> {
        let id = id.into();

        if id.is_null() || !self.backend.exists(&self.collection.name, &id) {
            self.create(from)
        } else {
            self.update(from)
        }
    }

    /// Delete the instances with the given identities.
    pub fn delete(&self, ids: &[Value]) -> Result<(), Error> {
        self.backend.delete(&self.collection.name, ids)
    }

    /// Query instances matching a filter. Requires the search capability.
    pub fn find(&self, filter: &Filter) -> Result<Vec<E>, Error> {
        let results = self.find_records(filter)?;
        let mut decoded = Vec::with_capacity(results.len());

        for record in results.iter() {
            let mut target = E::default();
            populate_with(record, &self.collection, &self.bindings, &mut target)?;
            decoded.push(target);
        }

        Ok(decoded)
    }

    /// Query matching records without decoding them.
    pub fn find_records(&self, filter: &Filter) -> Result<RecordSet, Error> {
        let search = self
            .backend
            .as_search()
            .ok_or_else(|| Error::unsupported(self.backend.backend_type(), "searching"))?;

        search.query(&self.collection, filter)
    }

    /// Every instance, explicitly unbounded.
    pub fn all(&self) -> Result<Vec<E>, Error> {
        self.find(&Filter::all())
    }

    /// Count matching records. Requires the aggregator capability.
    pub fn count(&self, filter: &Filter) -> Result<u64, Error> {
        let aggregator = self
            .backend
            .as_aggregator()
            .ok_or_else(|| Error::unsupported(self.backend.backend_type(), "aggregation"))?;

        aggregator.count(&self.collection, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::MemoryBackend,
        entity::{BindingError, FromValue},
        filter::Condition,
        schema::{Field, FieldType},
    };

    #[derive(Clone, Debug, Default, PartialEq)]
    struct User {
        id: i64,
        name: String,
        age: i64,
    }

    impl Entity for User {
        fn bindings() -> Bindings<Self> {
            fn set_id(u: &mut User, v: Value) -> Result<(), BindingError> {
                u.id = FromValue::from_value(v)?;
                Ok(())
            }

            fn set_name(u: &mut User, v: Value) -> Result<(), BindingError> {
                u.name = FromValue::from_value(v)?;
                Ok(())
            }

            fn set_age(u: &mut User, v: Value) -> Result<(), BindingError> {
                u.age = FromValue::from_value(v)?;
                Ok(())
            }

            Bindings::builder()
                .bind("id", |u| Value::Int(u.id), set_id)
                .bind("name", |u| Value::Text(u.name.clone()), set_name)
                .bind("age", |u| Value::Int(u.age), set_age)
                .build()
        }
    }

    fn users() -> Collection {
        Collection::new("users")
            .add_fields([
                Field::new("name", FieldType::Text).required(),
                Field::new("age", FieldType::Int),
            ])
            .expect("fixture fields are unique")
    }

    #[test]
    fn migrate_creates_missing_collections_then_verifies() {
        let backend = MemoryBackend::new();
        let model: Model<'_, User> = Model::new(&backend, users());

        model.migrate().expect("first migrate creates the collection");
        model.migrate().expect("second migrate verifies clean");

        assert_eq!(
            backend.list_collections().expect("listing should succeed"),
            vec!["users".to_string()]
        );
    }

    #[test]
    fn migrate_fails_closed_on_schema_drift() {
        let backend = MemoryBackend::new();

        // seed the backend with a narrower schema than the model wants
        let narrow = Collection::new("users")
            .add_field(Field::new("name", FieldType::Text).required())
            .expect("field is unique");
        backend
            .create_collection(&narrow)
            .expect("seed collection should create");

        let model: Model<'_, User> = Model::new(&backend, users());
        let err = model.migrate().expect_err("drift must fail the migration");

        assert_eq!(err.kind, crate::error::ErrorKind::SchemaMismatch);
        assert!(
            err.message.contains("field 'age' is missing"),
            "the error enumerates each delta: {}",
            err.message
        );
    }

    #[test]
    fn crud_roundtrip_through_the_model() {
        let backend = MemoryBackend::new();
        let model: Model<'_, User> = Model::new(&backend, users());
        model.migrate().expect("migrate should succeed");

        model
            .create(&User {
                id: 0,
                name: "ada".into(),
                age: 36,
            })
            .expect("create should succeed");

        let mut ada = model.get(1i64).expect("record 1 should load");
        assert_eq!(ada.name, "ada");
        assert_eq!(ada.id, 1, "the minted identity writes back");

        ada.age = 37;
        model.update(&ada).expect("update should succeed");
        assert_eq!(model.get(1i64).expect("reload should succeed").age, 37);

        model.delete(&[Value::Int(1)]).expect("delete should succeed");
        assert!(!model.exists(1i64));
    }

    #[test]
    fn save_routes_to_create_or_update() {
        let backend = MemoryBackend::new();
        let model: Model<'_, User> = Model::new(&backend, users());
        model.migrate().expect("migrate should succeed");

        let user = User {
            id: 4,
            name: "grace".into(),
            age: 30,
        };
        model.save(4i64, &user).expect("first save creates");
        assert!(model.exists(4i64));

        let updated = User { age: 31, ..user };
        model.save(4i64, &updated).expect("second save updates");
        assert_eq!(model.get(4i64).expect("reload should succeed").age, 31);
    }

    #[test]
    fn find_decodes_matching_instances() {
        let backend = MemoryBackend::new();
        let model: Model<'_, User> = Model::new(&backend, users());
        model.migrate().expect("migrate should succeed");

        for (name, age) in [("ada", 36), ("alan", 41), ("grace", 30)] {
            model
                .create(&User {
                    id: 0,
                    name: name.into(),
                    age,
                })
                .expect("create should succeed");
        }

        let found = model
            .find(&Filter::new().where_(Condition::gt("age", "32")).sort_by(["age"]))
            .expect("find should succeed");
        assert_eq!(
            found.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
            vec!["ada", "alan"]
        );

        assert_eq!(model.all().expect("all should succeed").len(), 3);
    }

    #[test]
    fn count_reports_the_missing_aggregator_by_backend_type() {
        let backend = MemoryBackend::new();
        let model: Model<'_, User> = Model::new(&backend, users());
        model.migrate().expect("migrate should succeed");

        let err = model
            .count(&Filter::all())
            .expect_err("memory backend lacks aggregation");
        assert!(err.is_unsupported());
        assert!(
            err.message.contains("MemoryBackend"),
            "the error names the concrete backend type: {}",
            err.message
        );
    }
}
