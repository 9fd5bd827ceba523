use derive_more::{Display, FromStr};
use serde::{Deserialize, Serialize};

///
/// Aggregation
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, FromStr, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[remain::sorted]
pub enum Aggregation {
    #[display("avg")]
    Avg,
    #[display("count")]
    Count,
    #[display("max")]
    Max,
    #[display("min")]
    Min,
    #[display("sum")]
    Sum,
}

///
/// Aggregate
///
/// One aggregate request: the function and the field it targets.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Aggregate {
    pub op: Aggregation,
    pub field: String,
}

impl Aggregate {
    #[must_use]
    pub fn new(op: Aggregation, field: impl Into<String>) -> Self {
        Self {
            op,
            field: field.into(),
        }
    }

    /// Column alias used when aggregate results come back as records.
    #[must_use]
    pub fn alias(&self) -> String {
        format!("{}_{}", self.op, self.field)
    }
}
