//! Query compilation: the normalization pass from filter + collection to
//! a backend-neutral plan, and the statement types generators produce.

pub mod plan;

pub use plan::{PlannedCondition, QueryPlan, SortKey};
