//! Backend-neutral query descriptions: conditions, sort, paging,
//! projection, and the compact string grammar the boundary speaks.

pub mod aggregate;
pub mod eval;
pub mod parse;

pub use aggregate::{Aggregate, Aggregation};
pub use parse::ParseError;

use crate::value::Value;
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// Operator
///
/// Comparison operators a condition can carry. `Is`/`Not` with several
/// values mean set membership and render as `IN`/`NOT IN`.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[remain::sorted]
pub enum Operator {
    #[display("contains")]
    Contains,
    #[display("gt")]
    Gt,
    #[display("gte")]
    Gte,
    #[display("is")]
    Is,
    #[display("lt")]
    Lt,
    #[display("lte")]
    Lte,
    #[display("not")]
    Not,
    #[display("notcontains")]
    NotContains,
    #[display("prefix")]
    Prefix,
    #[display("suffix")]
    Suffix,
}

///
/// Condition
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub values: Vec<Value>,
}

impl Condition {
    #[must_use]
    pub fn new(field: impl Into<String>, op: Operator, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            values,
        }
    }

    #[must_use]
    pub fn is(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Is, vec![value.into()])
    }

    #[must_use]
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, Operator::Is, values)
    }

    #[must_use]
    pub fn not(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Not, vec![value.into()])
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gt, vec![value.into()])
    }

    #[must_use]
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gte, vec![value.into()])
    }

    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lt, vec![value.into()])
    }

    #[must_use]
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lte, vec![value.into()])
    }

    #[must_use]
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Contains, vec![value.into()])
    }

    #[must_use]
    pub fn prefix(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Prefix, vec![value.into()])
    }

    #[must_use]
    pub fn suffix(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Suffix, vec![value.into()])
    }
}

///
/// Limit
///
/// Result-count policy. `Default` means "the caller's default applies" -
/// boundaries overlay their configured default before planning.
/// `Unbounded` is only ever produced by an explicit request (the `all`
/// token or `unbounded()`).
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Limit {
    #[default]
    Default,
    Unbounded,
    At(u64),
}

impl Limit {
    /// Resolve against a caller default. None means no LIMIT clause.
    #[must_use]
    pub const fn resolve(self, default: u64) -> Option<u64> {
        match self {
            Self::Default => Some(default),
            Self::Unbounded => None,
            Self::At(n) => Some(n),
        }
    }

    /// The explicitly requested bound, if any.
    #[must_use]
    pub const fn explicit(self) -> Option<u64> {
        match self {
            Self::At(n) => Some(n),
            Self::Default | Self::Unbounded => None,
        }
    }
}

///
/// Filter
///
/// Backend-neutral query description. Sort entries use a "-" prefix for
/// descending order; an empty `fields` projection means all fields.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Filter {
    #[serde(default)]
    pub criteria: Vec<Condition>,

    #[serde(default)]
    pub sort: Vec<String>,

    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub limit: Limit,

    #[serde(default)]
    pub offset: u64,

    #[serde(default)]
    pub identity_only: bool,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The match-everything filter with an explicitly unbounded limit.
    #[must_use]
    pub fn all() -> Self {
        Self {
            limit: Limit::Unbounded,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn where_(mut self, condition: Condition) -> Self {
        self.criteria.push(condition);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sort = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn only_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Limit::At(limit);
        self
    }

    #[must_use]
    pub const fn unbounded(mut self) -> Self {
        self.limit = Limit::Unbounded;
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub const fn identity_only(mut self) -> Self {
        self.identity_only = true;
        self
    }

    /// Overlay a caller default limit; explicit requests win.
    pub const fn apply_default_limit(&mut self, default: u64) {
        if matches!(self.limit, Limit::Default) {
            self.limit = Limit::At(default);
        }
    }

    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.criteria.is_empty()
    }
}
