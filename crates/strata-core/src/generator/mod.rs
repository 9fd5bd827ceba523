//! Backend-specific statement generation. One generator per backend
//! family turns a compiled [`QueryPlan`] into executable statement text
//! plus the parallel list of parameters to bind.

pub mod sql;

pub use sql::{SqlDialect, SqlFamily, SqlGenerator};

use crate::{error::Error, query::QueryPlan, record::Record, schema::Collection, value::Value};
use serde::Serialize;

///
/// Statement
///
/// Rendered statement text and its bound parameters. User values never
/// appear in the text; they travel in `params`, in placeholder order.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Statement {
    pub text: String,
    pub params: Vec<Value>,
}

impl Statement {
    #[must_use]
    pub const fn new(text: String, params: Vec<Value>) -> Self {
        Self { text, params }
    }
}

///
/// QueryGenerator
///
/// Pure render pass from compiled plans (and records, for writes) to
/// statements. Generators hold dialect configuration only: no per-call
/// state, so render order cannot matter.
///

pub trait QueryGenerator {
    fn select(&self, plan: &QueryPlan) -> Result<Statement, Error>;

    fn delete_where(&self, plan: &QueryPlan) -> Result<Statement, Error>;

    fn insert(&self, collection: &Collection, record: &Record) -> Result<Statement, Error>;

    fn update(&self, collection: &Collection, record: &Record) -> Result<Statement, Error>;

    fn create_collection(&self, collection: &Collection) -> Result<Statement, Error>;

    fn delete_collection(&self, name: &str) -> Result<Statement, Error>;
}
