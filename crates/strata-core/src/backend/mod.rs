//! Backend contracts: the executor surface every store implements, plus
//! the optional capabilities (search, aggregation, migration) a concrete
//! backend may or may not advertise.

pub mod memory;
pub mod meta_index;
pub mod sql;

pub use memory::MemoryBackend;
pub use meta_index::{JoinSpec, JoinSide, MetaIndex, QueryTarget};
pub use sql::{RowCursor, SqlBackend, SqlExecutor};

use crate::{
    error::Error,
    filter::{Aggregate, Filter},
    record::{Record, RecordSet},
    schema::{Collection, SchemaDelta},
    value::Value,
};
use derive_more::Display;
use std::collections::BTreeMap;

///
/// Capability
///
/// Optional backend features, advertised rather than assumed. Absence is
/// a first-class outcome: callers test before dispatch and surface an
/// unsupported-operation error naming the backend when they require a
/// capability it lacks.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[remain::sorted]
pub enum Capability {
    #[display("aggregation")]
    Aggregator,
    #[display("migration")]
    Migratable,
    #[display("search")]
    Search,
}

///
/// Backend
///
/// The executor surface: collection lifecycle plus record CRUD. How a
/// statement reaches the actual store is the implementation's business -
/// the core treats execution as opaque.
///

pub trait Backend: Send + Sync {
    /// Concrete type name, used verbatim in error messages.
    fn backend_type(&self) -> &'static str;

    fn capabilities(&self) -> &'static [Capability];

    /// Make a collection known without creating backing storage.
    fn register_collection(&self, collection: Collection) -> Result<(), Error>;

    fn get_collection(&self, name: &str) -> Result<Collection, Error>;

    fn create_collection(&self, collection: &Collection) -> Result<(), Error>;

    fn delete_collection(&self, name: &str) -> Result<(), Error>;

    fn list_collections(&self) -> Result<Vec<String>, Error>;

    fn insert(&self, name: &str, records: &RecordSet) -> Result<(), Error>;

    fn update(&self, name: &str, records: &RecordSet) -> Result<(), Error>;

    fn retrieve(&self, name: &str, id: &Value, fields: &[String]) -> Result<Record, Error>;

    fn exists(&self, name: &str, id: &Value) -> bool;

    fn delete(&self, name: &str, ids: &[Value]) -> Result<(), Error>;

    fn delete_where(&self, name: &str, filter: &Filter) -> Result<(), Error>;

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    fn as_search(&self) -> Option<&dyn Search> {
        None
    }

    fn as_aggregator(&self) -> Option<&dyn Aggregator> {
        None
    }

    fn as_migratable(&self) -> Option<&dyn Migratable> {
        None
    }
}

///
/// Search
///

pub trait Search {
    /// Run a filtered query and return matching records.
    fn query(&self, collection: &Collection, filter: &Filter) -> Result<RecordSet, Error>;

    /// Distinct values per requested field, under the same filter.
    fn list_values(
        &self,
        collection: &Collection,
        fields: &[String],
        filter: &Filter,
    ) -> Result<BTreeMap<String, Vec<Value>>, Error>;
}

///
/// Aggregator
///
/// Scalar aggregates resolve to one numeric cell; a missing or NULL cell
/// reads as zero, never as an error. `group_by` returns one record per
/// distinct group instead.
///

pub trait Aggregator {
    fn count(&self, collection: &Collection, filter: &Filter) -> Result<u64, Error>;

    fn sum(&self, collection: &Collection, field: &str, filter: &Filter) -> Result<f64, Error>;

    fn minimum(&self, collection: &Collection, field: &str, filter: &Filter)
    -> Result<f64, Error>;

    fn maximum(&self, collection: &Collection, field: &str, filter: &Filter)
    -> Result<f64, Error>;

    fn average(&self, collection: &Collection, field: &str, filter: &Filter)
    -> Result<f64, Error>;

    fn group_by(
        &self,
        collection: &Collection,
        groups: &[String],
        aggregates: &[Aggregate],
        filter: &Filter,
    ) -> Result<RecordSet, Error>;
}

///
/// Migratable
///
/// Explicit, opt-in schema mutation. The core's own migration path never
/// calls this: drift fails closed; a caller that wants the drift applied
/// hands the deltas over deliberately.
///

pub trait Migratable {
    fn migrate_schema(&self, collection: &Collection, deltas: &[SchemaDelta])
    -> Result<(), Error>;
}
