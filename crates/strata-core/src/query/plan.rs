use crate::{
    error::Error,
    filter::{Aggregate, Aggregation, Filter, Operator},
    schema::{Collection, FieldType},
    value::Value,
};
use serde::Serialize;

///
/// QueryPlan
///
/// Normalized, backend-neutral form of a filter resolved against a
/// collection. Building the plan is the validation and coercion pass:
/// every referenced field is checked against the schema and every
/// condition value is coerced through the declared field rules, so a
/// generator can render without consulting the collection again.
///
/// The plan is a plain value. Generators take it by reference and stay
/// pure; there is no builder to feed in a particular order.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryPlan {
    pub collection: String,
    pub identity_field: String,
    pub criteria: Vec<PlannedCondition>,
    pub sort: Vec<SortKey>,
    pub projection: Vec<String>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub distinct: bool,
    pub group_by: Vec<String>,
    pub aggregates: Vec<Aggregate>,
}

///
/// PlannedCondition
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlannedCondition {
    pub field: String,
    pub op: Operator,
    pub values: Vec<Value>,

    /// Whether `field` is the collection's identity field.
    pub identity: bool,
}

///
/// SortKey
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl QueryPlan {
    /// Compile a filter against a collection into a read plan.
    pub fn build(collection: &Collection, filter: &Filter) -> Result<Self, Error> {
        Self::compile(collection, filter, &[], &[])
    }

    /// Compile a filter plus grouping and aggregate requests.
    pub fn build_aggregate(
        collection: &Collection,
        filter: &Filter,
        group_by: &[String],
        aggregates: &[Aggregate],
    ) -> Result<Self, Error> {
        Self::compile(collection, filter, group_by, aggregates)
    }

    fn compile(
        collection: &Collection,
        filter: &Filter,
        group_by: &[String],
        aggregates: &[Aggregate],
    ) -> Result<Self, Error> {
        let mut criteria = Vec::with_capacity(filter.criteria.len());

        for condition in &filter.criteria {
            if !collection.resolves(&condition.field) {
                return Err(Error::unknown_field(&condition.field));
            }

            let values = condition
                .values
                .iter()
                .map(|value| coerce_condition_value(collection, condition, value.clone()))
                .collect::<Result<Vec<_>, _>>()?;

            criteria.push(PlannedCondition {
                field: condition.field.clone(),
                op: condition.op,
                values,
                identity: condition.field == collection.identity_field,
            });
        }

        let mut sort = Vec::with_capacity(filter.sort.len());

        for entry in &filter.sort {
            let (field, descending) = entry
                .strip_prefix('-')
                .map_or((entry.as_str(), false), |stripped| (stripped, true));

            if !collection.resolves(field) {
                return Err(Error::unknown_field(field));
            }

            sort.push(SortKey {
                field: field.to_string(),
                descending,
            });
        }

        let projection = if filter.identity_only {
            vec![collection.identity_field.clone()]
        } else {
            for field in &filter.fields {
                if !collection.resolves(field) {
                    return Err(Error::unknown_field(field));
                }
            }

            filter.fields.clone()
        };

        for field in group_by {
            if !collection.resolves(field) {
                return Err(Error::unknown_field(field));
            }
        }

        for aggregate in aggregates {
            // COUNT(1) is the row-count form used when a collection has no
            // identity field to count
            if aggregate.field != "1" && !collection.resolves(&aggregate.field) {
                return Err(Error::unknown_field(&aggregate.field));
            }
        }

        Ok(Self {
            collection: collection.name.clone(),
            identity_field: collection.identity_field.clone(),
            criteria,
            sort,
            projection,
            limit: filter.limit.explicit(),
            offset: filter.offset,
            distinct: false,
            group_by: group_by.to_vec(),
            aggregates: aggregates.to_vec(),
        })
    }

    /// Derive a copy that projects distinct values of one field.
    #[must_use]
    pub fn distinct_on(&self, field: &str) -> Self {
        let mut plan = self.clone();
        plan.projection = vec![field.to_string()];
        plan.distinct = true;
        plan.group_by.clear();
        plan.aggregates.clear();
        plan
    }

    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        !self.aggregates.is_empty() || !self.group_by.is_empty()
    }

    /// The aggregate target for a count, honoring the identity fallback.
    #[must_use]
    pub fn count_target(collection: &Collection) -> Aggregate {
        if collection.identity_field.is_empty() {
            Aggregate::new(Aggregation::Count, "1")
        } else {
            Aggregate::new(Aggregation::Count, collection.identity_field.clone())
        }
    }
}

/// Coerce one condition value through the schema.
///
/// Text-match operators compare against the textual form of the field, so
/// their operands coerce to text; membership tests against array fields
/// keep the operand untyped (the element type is not declared).
fn coerce_condition_value(
    collection: &Collection,
    condition: &crate::filter::Condition,
    value: Value,
) -> Result<Value, Error> {
    match condition.op {
        Operator::Prefix | Operator::Suffix => Ok(FieldType::Text.coerce(value)?),
        Operator::Contains | Operator::NotContains => {
            match collection.field(&condition.field).map(|f| f.ty) {
                Some(FieldType::Array) => Ok(value),
                _ => Ok(FieldType::Text.coerce(value)?),
            }
        }
        _ => collection.convert_value(&condition.field, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filter::{Condition, Limit},
        schema::Field,
    };

    fn users() -> Collection {
        Collection::new("users")
            .add_fields([
                Field::new("name", FieldType::Text),
                Field::new("age", FieldType::Int),
                Field::new("tags", FieldType::Array),
            ])
            .expect("fixture fields are unique")
    }

    #[test]
    fn condition_values_coerce_through_declared_types() {
        let filter = Filter::new().where_(Condition::gt("age", "21"));
        let plan = QueryPlan::build(&users(), &filter).expect("plan should build");
        assert_eq!(
            plan.criteria[0].values,
            vec![Value::Int(21)],
            "text from the parser becomes a typed value"
        );
    }

    #[test]
    fn undeclared_fields_are_rejected_by_name() {
        let filter = Filter::new().where_(Condition::is("ghost", "x"));
        let err = QueryPlan::build(&users(), &filter).expect_err("unknown field should fail");
        assert_eq!(err.kind, crate::error::ErrorKind::UnknownField);
        assert!(err.message.contains("'ghost'"));
    }

    #[test]
    fn identity_conditions_resolve_without_declaration() {
        let filter = Filter::new().where_(Condition::is("id", "3"));
        let plan = QueryPlan::build(&users(), &filter).expect("plan should build");
        assert!(plan.criteria[0].identity);
        assert_eq!(plan.criteria[0].values, vec![Value::Int(3)]);
    }

    #[test]
    fn sort_keys_parse_descending_markers() {
        let filter = Filter::new().sort_by(["-age", "name"]);
        let plan = QueryPlan::build(&users(), &filter).expect("plan should build");
        assert_eq!(
            plan.sort,
            vec![
                SortKey {
                    field: "age".into(),
                    descending: true
                },
                SortKey {
                    field: "name".into(),
                    descending: false
                },
            ]
        );
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let filter = Filter::new().sort_by(["-ghost"]);
        let err = QueryPlan::build(&users(), &filter).expect_err("unknown sort field");
        assert_eq!(err.kind, crate::error::ErrorKind::UnknownField);
    }

    #[test]
    fn identity_only_overrides_projection() {
        let filter = Filter::new().only_fields(["name"]).identity_only();
        let plan = QueryPlan::build(&users(), &filter).expect("plan should build");
        assert_eq!(plan.projection, vec!["id".to_string()]);
    }

    #[test]
    fn unbounded_and_default_limits_render_as_no_limit() {
        for limit in [Limit::Default, Limit::Unbounded] {
            let mut filter = Filter::new();
            filter.limit = limit;
            let plan = QueryPlan::build(&users(), &filter).expect("plan should build");
            assert_eq!(plan.limit, None);
        }
    }

    #[test]
    fn count_target_falls_back_to_row_count() {
        let with_identity = users();
        assert_eq!(
            QueryPlan::count_target(&with_identity).field,
            "id",
            "count targets the identity field"
        );

        let mut anonymous = users();
        anonymous.identity_field = String::new();
        assert_eq!(QueryPlan::count_target(&anonymous).field, "1");
    }

    #[test]
    fn array_membership_operands_stay_untyped() {
        let filter = Filter::new().where_(Condition::contains("tags", "rust"));
        let plan = QueryPlan::build(&users(), &filter).expect("plan should build");
        assert_eq!(plan.criteria[0].values, vec![Value::Text("rust".into())]);
    }
}
