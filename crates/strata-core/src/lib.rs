//! Core runtime for Strata: schema descriptors, records, the entity
//! binding model, filter parsing and compilation, statement generation,
//! and the backend capability façade.
#![warn(unreachable_pub)]

pub mod backend;
pub mod entity;
pub mod error;
pub mod filter;
pub mod generator;
pub mod model;
pub mod query;
pub mod record;
pub mod schema;
pub mod value;

///
/// Prelude
///
/// Domain vocabulary only. Backends, generators, and error internals are
/// reached through their modules.
///

pub mod prelude {
    pub use crate::{
        entity::{Bindings, Entity, FromValue},
        filter::{Condition, Filter, Operator},
        model::Model,
        record::{Record, RecordSet},
        schema::{Collection, Field, FieldType},
        value::Value,
    };
}
