use crate::{
    backend::{Backend, Capability, Migratable, Search},
    error::Error,
    filter::{Filter, eval},
    query::QueryPlan,
    record::{Record, RecordSet},
    schema::{Collection, FieldType, SchemaDelta},
    value::Value,
};
use std::{
    collections::BTreeMap,
    sync::RwLock,
};

///
/// MemoryBackend
///
/// Embedded store holding records directly. Carries the Search and
/// Migratable capabilities but not Aggregator: aggregation belongs to
/// the statement-compiling family, and a backend that lacks it must say
/// so rather than fake it.
///
/// Queries evaluate compiled plans row by row, so filter semantics here
/// and in generated statements stay aligned through the same plan pass.
///

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<BTreeMap<String, Table>>,
}

#[derive(Debug)]
struct Table {
    collection: Collection,
    rows: Vec<Record>,
    next_id: i64,
}

impl Table {
    fn new(collection: Collection) -> Self {
        Self {
            collection,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn position(&self, id: &Value) -> Option<usize> {
        self.rows.iter().position(|row| &row.id == id)
    }

    /// Mint the next identity value for a record inserted without one.
    fn mint_id(&mut self) -> Result<Value, Error> {
        if self.collection.identity_field_type != FieldType::Int {
            return Err(Error::invalid_input(format!(
                "collection '{}' has a {} identity; records must arrive with one",
                self.collection.name, self.collection.identity_field_type
            )));
        }

        let id = self.next_id;
        self.next_id += 1;
        Ok(Value::Int(id))
    }

    fn note_used_id(&mut self, id: &Value) {
        if let Value::Int(n) = id
            && *n >= self.next_id
        {
            self.next_id = n + 1;
        }
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<R>(
        &self,
        name: &str,
        f: impl FnOnce(&Table) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let tables = self.tables.read().expect("table lock poisoned");
        let table = tables
            .get(name)
            .ok_or_else(|| Error::collection_not_found(name))?;
        f(table)
    }

    fn with_table_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Table) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut tables = self.tables.write().expect("table lock poisoned");
        let table = tables
            .get_mut(name)
            .ok_or_else(|| Error::collection_not_found(name))?;
        f(table)
    }

    /// Validate and coerce an incoming record against the schema.
    fn conform(collection: &Collection, record: &Record) -> Result<Record, Error> {
        let mut conformed = Record::new(record.id.clone());

        if !conformed.id.is_null() {
            conformed.id = collection.identity_field_type.coerce(conformed.id)?;
        }

        for (name, value) in &record.fields {
            let Some(field) = collection.field(name) else {
                return Err(Error::unknown_field(name));
            };

            conformed.set(name.clone(), field.convert_value(value.clone())?);
        }

        for field in &collection.fields {
            if conformed.get(&field.name).is_none() {
                if let Some(default) = &field.default {
                    conformed.set(field.name.clone(), default.clone());
                } else if field.required {
                    return Err(Error::invalid_input(format!(
                        "field '{}' is required by collection '{}'",
                        field.name, collection.name
                    )));
                }
            }
        }

        Ok(conformed)
    }

    fn coerce_id(collection: &Collection, id: &Value) -> Result<Value, Error> {
        Ok(collection.identity_field_type.coerce(id.clone())?)
    }
}

impl Backend for MemoryBackend {
    fn backend_type(&self) -> &'static str {
        "MemoryBackend"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Migratable, Capability::Search]
    }

    fn register_collection(&self, collection: Collection) -> Result<(), Error> {
        // registration and creation coincide for an embedded store
        self.create_collection(&collection)
    }

    fn get_collection(&self, name: &str) -> Result<Collection, Error> {
        self.with_table(name, |table| Ok(table.collection.clone()))
    }

    fn create_collection(&self, collection: &Collection) -> Result<(), Error> {
        let mut tables = self.tables.write().expect("table lock poisoned");

        if tables.contains_key(&collection.name) {
            return Err(Error::exists(format!(
                "collection '{}' already exists",
                collection.name
            )));
        }

        tables.insert(collection.name.clone(), Table::new(collection.clone()));
        Ok(())
    }

    fn delete_collection(&self, name: &str) -> Result<(), Error> {
        self.tables
            .write()
            .expect("table lock poisoned")
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::collection_not_found(name))
    }

    fn list_collections(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .tables
            .read()
            .expect("table lock poisoned")
            .keys()
            .cloned()
            .collect())
    }

    fn insert(&self, name: &str, records: &RecordSet) -> Result<(), Error> {
        self.with_table_mut(name, |table| {
            for record in records.iter() {
                let mut conformed = Self::conform(&table.collection, record)?;

                if conformed.id.is_null() {
                    conformed.id = table.mint_id()?;
                } else {
                    if table.position(&conformed.id).is_some() {
                        return Err(Error::exists(format!(
                            "record '{}' already exists in collection '{name}'",
                            conformed.id
                        )));
                    }

                    let id = conformed.id.clone();
                    table.note_used_id(&id);
                }

                table.rows.push(conformed);
            }

            Ok(())
        })
    }

    fn update(&self, name: &str, records: &RecordSet) -> Result<(), Error> {
        self.with_table_mut(name, |table| {
            for record in records.iter() {
                let conformed = Self::conform(&table.collection, record)?;

                let position = table
                    .position(&conformed.id)
                    .ok_or_else(|| Error::record_not_found(&conformed.id))?;

                // merge: unmentioned fields keep their stored values
                let row = &mut table.rows[position];
                for (field, value) in conformed.fields {
                    row.set(field, value);
                }
            }

            Ok(())
        })
    }

    fn retrieve(&self, name: &str, id: &Value, fields: &[String]) -> Result<Record, Error> {
        self.with_table(name, |table| {
            let id = Self::coerce_id(&table.collection, id)?;
            let position = table
                .position(&id)
                .ok_or_else(|| Error::record_not_found(&id))?;

            let mut record = table.rows[position].clone();

            if !fields.is_empty() {
                record
                    .fields
                    .retain(|field, _| fields.iter().any(|keep| keep == field));
            }

            Ok(record)
        })
    }

    fn exists(&self, name: &str, id: &Value) -> bool {
        self.with_table(name, |table| {
            let id = Self::coerce_id(&table.collection, id)?;
            Ok(table.position(&id).is_some())
        })
        .unwrap_or(false)
    }

    fn delete(&self, name: &str, ids: &[Value]) -> Result<(), Error> {
        self.with_table_mut(name, |table| {
            for id in ids {
                let id = Self::coerce_id(&table.collection, id)?;

                if let Some(position) = table.position(&id) {
                    table.rows.remove(position);
                }
            }

            Ok(())
        })
    }

    fn delete_where(&self, name: &str, filter: &Filter) -> Result<(), Error> {
        self.with_table_mut(name, |table| {
            let plan = QueryPlan::build(&table.collection, filter)?;
            table.rows.retain(|row| !eval::plan_matches(&plan, row));
            Ok(())
        })
    }

    fn as_search(&self) -> Option<&dyn Search> {
        Some(self)
    }

    fn as_migratable(&self) -> Option<&dyn Migratable> {
        Some(self)
    }
}

impl Search for MemoryBackend {
    fn query(&self, collection: &Collection, filter: &Filter) -> Result<RecordSet, Error> {
        self.with_table(&collection.name, |table| {
            let plan = QueryPlan::build(collection, filter)?;

            let mut matched: Vec<Record> = table
                .rows
                .iter()
                .filter(|row| eval::plan_matches(&plan, row))
                .cloned()
                .collect();

            eval::sort_records(&plan, &mut matched);

            Ok(eval::apply_window(&plan, matched)
                .into_iter()
                .map(|record| eval::project(&plan, record))
                .collect())
        })
    }

    fn list_values(
        &self,
        collection: &Collection,
        fields: &[String],
        filter: &Filter,
    ) -> Result<BTreeMap<String, Vec<Value>>, Error> {
        self.with_table(&collection.name, |table| {
            let plan = QueryPlan::build(collection, filter)?;

            for field in fields {
                if !collection.resolves(field) {
                    return Err(Error::unknown_field(field));
                }
            }

            let mut listing: BTreeMap<String, Vec<Value>> = BTreeMap::new();

            for row in table.rows.iter().filter(|row| eval::plan_matches(&plan, row)) {
                for field in fields {
                    let value = eval::field_value(&plan.identity_field, row, field);

                    if value.is_null() {
                        continue;
                    }

                    let values = listing.entry(field.clone()).or_default();

                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
            }

            Ok(listing)
        })
    }
}

impl Migratable for MemoryBackend {
    fn migrate_schema(
        &self,
        collection: &Collection,
        deltas: &[SchemaDelta],
    ) -> Result<(), Error> {
        self.with_table_mut(&collection.name, |table| {
            for delta in deltas {
                match delta {
                    SchemaDelta::FieldMissing { field } => {
                        let Some(desired) = collection.field(field) else {
                            return Err(Error::unknown_field(field));
                        };

                        table.collection.fields.push(desired.clone());
                    }
                    SchemaDelta::FieldTypeMismatch { field, desired, .. } => {
                        if let Some(stored) =
                            table.collection.fields.iter_mut().find(|f| &f.name == field)
                        {
                            stored.ty = *desired;
                        }
                    }
                    SchemaDelta::FieldRequiredMismatch { field, desired, .. } => {
                        if let Some(stored) =
                            table.collection.fields.iter_mut().find(|f| &f.name == field)
                        {
                            stored.required = *desired;
                        }
                    }
                    SchemaDelta::FieldIdentityMismatch { field, desired, .. } => {
                        if let Some(stored) =
                            table.collection.fields.iter_mut().find(|f| &f.name == field)
                        {
                            stored.identity = *desired;
                        }
                    }
                    SchemaDelta::IdentityFieldMismatch { desired, .. } => {
                        table.collection.identity_field = desired.clone();
                    }
                    SchemaDelta::IdentityTypeMismatch { desired, .. } => {
                        table.collection.identity_field_type = *desired;
                    }
                }
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filter::Condition, schema::Field};

    fn backend_with_users() -> MemoryBackend {
        let backend = MemoryBackend::new();
        let users = Collection::new("users")
            .add_fields([
                Field::new("name", FieldType::Text).required(),
                Field::new("age", FieldType::Int),
            ])
            .expect("fixture fields are unique");
        backend
            .create_collection(&users)
            .expect("collection should create");
        backend
    }

    fn user(name: &str, age: i64) -> Record {
        let mut record = Record::new(Value::Null);
        record.set("name", name).set("age", age);
        record
    }

    #[test]
    fn insert_mints_sequential_identities() {
        let backend = backend_with_users();
        backend
            .insert("users", &RecordSet::of(user("ada", 36)))
            .expect("insert should succeed");
        backend
            .insert("users", &RecordSet::of(user("alan", 41)))
            .expect("insert should succeed");

        let ada = backend
            .retrieve("users", &Value::Int(1), &[])
            .expect("first record should exist");
        assert_eq!(ada.get("name"), Some(&Value::Text("ada".into())));
        assert!(backend.exists("users", &Value::Int(2)));
    }

    #[test]
    fn insert_rejects_duplicates_and_unknown_fields() {
        let backend = backend_with_users();
        let mut explicit = user("ada", 36);
        explicit.id = Value::Int(5);
        backend
            .insert("users", &RecordSet::of(explicit.clone()))
            .expect("insert should succeed");

        let err = backend
            .insert("users", &RecordSet::of(explicit))
            .expect_err("duplicate id should be rejected");
        assert!(err.is_exists());

        let mut stranger = user("x", 1);
        stranger.set("ghost", 1i64);
        let err = backend
            .insert("users", &RecordSet::of(stranger))
            .expect_err("unknown field should be rejected");
        assert_eq!(err.kind, crate::error::ErrorKind::UnknownField);
    }

    #[test]
    fn required_fields_are_enforced_on_insert() {
        let backend = backend_with_users();
        let mut nameless = Record::new(Value::Null);
        nameless.set("age", 3i64);

        let err = backend
            .insert("users", &RecordSet::of(nameless))
            .expect_err("missing required field should fail");
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidInput);
        assert!(err.message.contains("'name'"));
    }

    #[test]
    fn update_merges_into_existing_rows() {
        let backend = backend_with_users();
        backend
            .insert("users", &RecordSet::of(user("ada", 36)))
            .expect("insert should succeed");

        let mut patch = Record::new(Value::Int(1));
        patch.set("age", 37i64);
        backend
            .update("users", &RecordSet::of(patch))
            .expect("update should succeed");

        let ada = backend
            .retrieve("users", &Value::Int(1), &[])
            .expect("record should exist");
        assert_eq!(ada.get("age"), Some(&Value::Int(37)));
        assert_eq!(
            ada.get("name"),
            Some(&Value::Text("ada".into())),
            "unmentioned fields keep their stored values"
        );
    }

    #[test]
    fn query_filters_sorts_and_projects() {
        let backend = backend_with_users();
        for (name, age) in [("ada", 36), ("alan", 41), ("grace", 30)] {
            backend
                .insert("users", &RecordSet::of(user(name, age)))
                .expect("insert should succeed");
        }

        let collection = backend
            .get_collection("users")
            .expect("collection should resolve");
        let filter = Filter::new()
            .where_(Condition::gte("age", "36"))
            .sort_by(["-age"])
            .only_fields(["name"]);

        let results = backend
            .as_search()
            .expect("memory backend advertises search")
            .query(&collection, &filter)
            .expect("query should succeed");

        assert_eq!(results.len(), 2);
        assert_eq!(
            results.records[0].get("name"),
            Some(&Value::Text("alan".into()))
        );
        assert_eq!(
            results.records[0].get("age"),
            None,
            "projection drops unselected fields"
        );
    }

    #[test]
    fn list_values_returns_distinct_values_in_first_seen_order() {
        let backend = backend_with_users();
        for (name, age) in [("ada", 36), ("ada", 41), ("grace", 30)] {
            backend
                .insert("users", &RecordSet::of(user(name, age)))
                .expect("insert should succeed");
        }

        let collection = backend
            .get_collection("users")
            .expect("collection should resolve");
        let listing = backend
            .list_values(&collection, &["name".to_string()], &Filter::all())
            .expect("listing should succeed");

        assert_eq!(
            listing["name"],
            vec![Value::Text("ada".into()), Value::Text("grace".into())]
        );
    }

    #[test]
    fn aggregator_capability_is_absent() {
        let backend = backend_with_users();
        assert!(backend.as_aggregator().is_none());
        assert!(!backend.has_capability(Capability::Aggregator));
        assert!(backend.has_capability(Capability::Search));
    }

    #[test]
    fn delete_where_removes_matching_rows_only() {
        let backend = backend_with_users();
        for (name, age) in [("ada", 36), ("alan", 41), ("grace", 30)] {
            backend
                .insert("users", &RecordSet::of(user(name, age)))
                .expect("insert should succeed");
        }

        backend
            .delete_where("users", &Filter::new().where_(Condition::lt("age", "36")))
            .expect("delete should succeed");

        let collection = backend
            .get_collection("users")
            .expect("collection should resolve");
        let remaining = backend
            .query(&collection, &Filter::all())
            .expect("query should succeed");
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn migrate_schema_applies_missing_field_deltas() {
        let backend = backend_with_users();
        let desired = backend
            .get_collection("users")
            .expect("collection should resolve")
            .add_field(Field::new("email", FieldType::Text))
            .expect("field is unique");

        let actual = backend
            .get_collection("users")
            .expect("collection should resolve");
        let deltas = desired.diff(&actual);
        assert_eq!(deltas.len(), 1);

        backend
            .migrate_schema(&desired, &deltas)
            .expect("migration should apply");
        let migrated = backend
            .get_collection("users")
            .expect("collection should resolve");
        assert!(migrated.field("email").is_some());
    }
}
