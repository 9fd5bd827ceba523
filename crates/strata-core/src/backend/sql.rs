use crate::{
    backend::{Aggregator, Backend, Capability, Search},
    error::Error,
    filter::{Aggregate, Condition, Filter},
    generator::{QueryGenerator, SqlDialect, SqlGenerator, Statement},
    query::QueryPlan,
    record::{Record, RecordSet},
    schema::{Collection, SchemaRegistry},
    value::Value,
};
use std::collections::BTreeMap;
use tracing::debug;

///
/// RowCursor
///
/// Scoped view over one statement's results. Cursors are owned values
/// consumed inside the call that opened them, so driver-side handles are
/// released on every exit path.
///

pub trait RowCursor {
    fn columns(&self) -> &[String];

    fn next_row(&mut self) -> Option<Result<Vec<Value>, Error>>;
}

///
/// SqlExecutor
///
/// The opaque execution seam: how statement text and bound parameters
/// reach a relational engine is the driver's business. `describe` exposes
/// the driver's schema introspection as the actual-schema source.
///

pub trait SqlExecutor: Send + Sync {
    /// Run a statement that returns no rows; yields rows affected.
    fn execute(&self, statement: &Statement) -> Result<u64, Error>;

    fn query(&self, statement: &Statement) -> Result<Box<dyn RowCursor + '_>, Error>;

    fn describe(&self, name: &str) -> Result<Option<Collection>, Error>;
}

///
/// SqlBackend
///
/// The relational backend family: compiles every read and aggregate
/// through the plan + generator passes and hands statements to the
/// executor. Generic over the executor so drivers stay out of the core.
///

pub struct SqlBackend<X: SqlExecutor> {
    executor: X,
    generator: SqlGenerator,
    registry: SchemaRegistry,
}

impl<X: SqlExecutor> SqlBackend<X> {
    pub fn new(executor: X, dialect: SqlDialect) -> Self {
        Self {
            executor,
            generator: SqlGenerator::new(dialect),
            registry: SchemaRegistry::new(),
        }
    }

    fn run(&self, statement: &Statement) -> Result<u64, Error> {
        debug!(text = %statement.text, params = ?statement.params, "execute");
        self.executor.execute(statement)
    }

    fn run_query(&self, statement: &Statement) -> Result<Box<dyn RowCursor + '_>, Error> {
        debug!(text = %statement.text, params = ?statement.params, "query");
        self.executor.query(statement)
    }

    /// Decode cursor rows into records, splitting the identity column out
    /// of the field mapping.
    fn read_records(
        cursor: &mut dyn RowCursor,
        identity_field: &str,
    ) -> Result<RecordSet, Error> {
        let columns = cursor.columns().to_vec();
        let mut records = RecordSet::new();

        while let Some(row) = cursor.next_row() {
            let row = row?;
            let mut record = Record::new(Value::Null);

            for (column, value) in columns.iter().zip(row) {
                if column == identity_field {
                    record.id = value;
                } else {
                    record.set(column.clone(), value);
                }
            }

            records.push(record);
        }

        Ok(records)
    }

    /// Run one aggregate statement and extract a result with `extract`.
    ///
    /// The whole scalar family funnels through here: build the plan,
    /// render, execute, hand the cursor to the extractor.
    fn aggregate<R>(
        &self,
        collection: &Collection,
        groups: &[String],
        aggregates: &[Aggregate],
        filter: &Filter,
        extract: impl FnOnce(&mut dyn RowCursor) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let plan = QueryPlan::build_aggregate(collection, filter, groups, aggregates)?;
        let statement = self.generator.select(&plan)?;
        let mut cursor = self.run_query(&statement)?;
        extract(cursor.as_mut())
    }

    fn aggregate_f64(
        &self,
        collection: &Collection,
        aggregate: Aggregate,
        filter: &Filter,
    ) -> Result<f64, Error> {
        self.aggregate(collection, &[], &[aggregate], filter, |cursor| {
            extract_single_f64(cursor)
        })
    }
}

/// One numeric cell from the first row. SQL NULL reads as zero, and so
/// does an empty result: an aggregate over nothing is zero, not an error.
fn extract_single_f64(cursor: &mut dyn RowCursor) -> Result<f64, Error> {
    match cursor.next_row() {
        None => Ok(0.0),
        Some(row) => {
            let row = row?;

            let value = row.first().cloned().unwrap_or(Value::Null);
            value.as_f64().ok_or_else(|| {
                Error::invalid_input(format!(
                    "aggregate result is {}, expected a numeric cell",
                    value.type_name()
                ))
            })
        }
    }
}

impl<X: SqlExecutor> Backend for SqlBackend<X> {
    fn backend_type(&self) -> &'static str {
        "SqlBackend"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Aggregator, Capability::Search]
    }

    fn register_collection(&self, collection: Collection) -> Result<(), Error> {
        self.registry.register(collection)
    }

    fn get_collection(&self, name: &str) -> Result<Collection, Error> {
        if let Ok(collection) = self.registry.get(name) {
            return Ok((*collection).clone());
        }

        match self.executor.describe(name)? {
            Some(collection) => Ok(collection),
            None => Err(Error::collection_not_found(name)),
        }
    }

    fn create_collection(&self, collection: &Collection) -> Result<(), Error> {
        if self.executor.describe(&collection.name)?.is_some() {
            return Err(Error::exists(format!(
                "collection '{}' already exists",
                collection.name
            )));
        }

        let statement = self.generator.create_collection(collection)?;
        self.run(&statement)?;
        self.registry.put(collection.clone());
        Ok(())
    }

    fn delete_collection(&self, name: &str) -> Result<(), Error> {
        let statement = self.generator.delete_collection(name)?;
        self.run(&statement)?;
        let _ = self.registry.remove(name);
        Ok(())
    }

    fn list_collections(&self) -> Result<Vec<String>, Error> {
        Ok(self.registry.list())
    }

    fn insert(&self, name: &str, records: &RecordSet) -> Result<(), Error> {
        let collection = self.get_collection(name)?;

        for record in records.iter() {
            let statement = self.generator.insert(&collection, record)?;
            self.run(&statement)?;
        }

        Ok(())
    }

    fn update(&self, name: &str, records: &RecordSet) -> Result<(), Error> {
        let collection = self.get_collection(name)?;

        for record in records.iter() {
            let statement = self.generator.update(&collection, record)?;
            self.run(&statement)?;
        }

        Ok(())
    }

    fn retrieve(&self, name: &str, id: &Value, fields: &[String]) -> Result<Record, Error> {
        let collection = self.get_collection(name)?;

        let mut filter = Filter::new()
            .where_(Condition::new(
                collection.identity_field.clone(),
                crate::filter::Operator::Is,
                vec![id.clone()],
            ))
            .with_limit(1);
        filter.fields = fields.to_vec();

        let results = self.query(&collection, &filter)?;
        results
            .records
            .into_iter()
            .next()
            .ok_or_else(|| Error::record_not_found(id))
    }

    fn exists(&self, name: &str, id: &Value) -> bool {
        self.retrieve(name, id, &[]).is_ok()
    }

    fn delete(&self, name: &str, ids: &[Value]) -> Result<(), Error> {
        let collection = self.get_collection(name)?;

        let filter = Filter::new().where_(Condition::new(
            collection.identity_field.clone(),
            crate::filter::Operator::Is,
            ids.to_vec(),
        ));

        self.delete_where(name, &filter)
    }

    fn delete_where(&self, name: &str, filter: &Filter) -> Result<(), Error> {
        let collection = self.get_collection(name)?;
        let plan = QueryPlan::build(&collection, filter)?;
        let statement = self.generator.delete_where(&plan)?;
        self.run(&statement)?;
        Ok(())
    }

    fn as_search(&self) -> Option<&dyn Search> {
        Some(self)
    }

    fn as_aggregator(&self) -> Option<&dyn Aggregator> {
        Some(self)
    }
}

impl<X: SqlExecutor> Search for SqlBackend<X> {
    fn query(&self, collection: &Collection, filter: &Filter) -> Result<RecordSet, Error> {
        let plan = QueryPlan::build(collection, filter)?;
        let statement = self.generator.select(&plan)?;
        let mut cursor = self.run_query(&statement)?;
        Self::read_records(cursor.as_mut(), &collection.identity_field)
    }

    fn list_values(
        &self,
        collection: &Collection,
        fields: &[String],
        filter: &Filter,
    ) -> Result<BTreeMap<String, Vec<Value>>, Error> {
        let plan = QueryPlan::build(collection, filter)?;
        let mut listing = BTreeMap::new();

        for field in fields {
            if !collection.resolves(field) {
                return Err(Error::unknown_field(field));
            }

            let statement = self.generator.select(&plan.distinct_on(field))?;
            let mut cursor = self.run_query(&statement)?;
            let mut values = Vec::new();

            while let Some(row) = cursor.next_row() {
                let row = row?;

                if let Some(value) = row.into_iter().next()
                    && !value.is_null()
                {
                    values.push(value);
                }
            }

            listing.insert(field.clone(), values);
        }

        Ok(listing)
    }
}

impl<X: SqlExecutor> Aggregator for SqlBackend<X> {
    fn count(&self, collection: &Collection, filter: &Filter) -> Result<u64, Error> {
        let value = self.aggregate_f64(collection, QueryPlan::count_target(collection), filter)?;
        Ok(value.max(0.0) as u64)
    }

    fn sum(&self, collection: &Collection, field: &str, filter: &Filter) -> Result<f64, Error> {
        self.aggregate_f64(
            collection,
            Aggregate::new(crate::filter::Aggregation::Sum, field),
            filter,
        )
    }

    fn minimum(
        &self,
        collection: &Collection,
        field: &str,
        filter: &Filter,
    ) -> Result<f64, Error> {
        self.aggregate_f64(
            collection,
            Aggregate::new(crate::filter::Aggregation::Min, field),
            filter,
        )
    }

    fn maximum(
        &self,
        collection: &Collection,
        field: &str,
        filter: &Filter,
    ) -> Result<f64, Error> {
        self.aggregate_f64(
            collection,
            Aggregate::new(crate::filter::Aggregation::Max, field),
            filter,
        )
    }

    fn average(
        &self,
        collection: &Collection,
        field: &str,
        filter: &Filter,
    ) -> Result<f64, Error> {
        self.aggregate_f64(
            collection,
            Aggregate::new(crate::filter::Aggregation::Avg, field),
            filter,
        )
    }

    fn group_by(
        &self,
        collection: &Collection,
        groups: &[String],
        aggregates: &[Aggregate],
        filter: &Filter,
    ) -> Result<RecordSet, Error> {
        self.aggregate(collection, groups, aggregates, filter, |cursor| {
            // grouped rows carry no identity; every column is a plain field
            Self::read_records(cursor, "")
        })
    }
}
