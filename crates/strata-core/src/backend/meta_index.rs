use crate::{
    backend::Search,
    error::Error,
    filter::{Condition, Filter, Operator},
    record::{Record, RecordSet},
    schema::Collection,
    value::Value,
};
use std::collections::BTreeMap;

///
/// JoinSpec
///
/// Parsed form of a two-collection join request:
/// `left.lfield:right.rfield`. The field part is optional and defaults to
/// each collection's identity field. Exactly two collections may be
/// joined; a third is rejected here, before any query runs.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinSpec {
    pub left: JoinSide,
    pub right: JoinSide,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinSide {
    pub collection: String,
    pub field: Option<String>,
}

impl JoinSide {
    fn parse(segment: &str) -> Result<Self, Error> {
        let (collection, field) = match segment.split_once('.') {
            Some((collection, field)) => (collection, Some(field.to_string())),
            None => (segment, None),
        };

        if collection.is_empty() {
            return Err(Error::invalid_input(
                "join segment is missing a collection name",
            ));
        }

        Ok(Self {
            collection: collection.to_string(),
            field,
        })
    }

    /// Join field, defaulting to the collection's identity field.
    #[must_use]
    pub fn field_for<'a>(&'a self, collection: &'a Collection) -> &'a str {
        self.field
            .as_deref()
            .unwrap_or(collection.identity_field.as_str())
    }
}

impl JoinSpec {
    /// Parse a join request. More than two collections fail immediately.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let segments: Vec<&str> = input.split(':').collect();

        match segments.as_slice() {
            [left, right] => Ok(Self {
                left: JoinSide::parse(left)?,
                right: JoinSide::parse(right)?,
            }),
            [_] => Err(Error::invalid_input(
                "a join request names two collections separated by ':'",
            )),
            _ => Err(Error::invalid_input(
                "only two (2) joined collections are supported",
            )),
        }
    }
}

///
/// QueryTarget
///
/// A query path segment: one collection, or a two-collection join.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryTarget {
    Single(String),
    Join(JoinSpec),
}

impl QueryTarget {
    pub fn parse(input: &str) -> Result<Self, Error> {
        if input.contains(':') {
            Ok(Self::Join(JoinSpec::parse(input)?))
        } else if input.is_empty() {
            Err(Error::invalid_input("empty collection name"))
        } else {
            Ok(Self::Single(input.to_string()))
        }
    }
}

///
/// MetaIndex
///
/// A logical join composed from two independently-queried collections,
/// possibly living on different backend instances. The left query runs
/// first; its join-field values fold into the right query's filter as a
/// membership condition, so the two round trips are inherently
/// sequential.
///

pub struct MetaIndex<'a> {
    left: &'a dyn Search,
    left_collection: Collection,
    left_field: String,
    right: &'a dyn Search,
    right_collection: Collection,
    right_field: String,
}

impl<'a> MetaIndex<'a> {
    pub fn new(
        left: &'a dyn Search,
        left_collection: Collection,
        left_field: impl Into<String>,
        right: &'a dyn Search,
        right_collection: Collection,
        right_field: impl Into<String>,
    ) -> Self {
        Self {
            left,
            left_collection,
            left_field: left_field.into(),
            right,
            right_collection,
            right_field: right_field.into(),
        }
    }

    /// Run the composed join with the stored left collection.
    pub fn query_join(&self, filter: &Filter) -> Result<RecordSet, Error> {
        self.query(&self.left_collection, filter)
    }

    fn join_value<'r>(record: &'r Record, collection: &Collection, field: &str) -> &'r Value {
        static NULL: Value = Value::Null;

        if field == collection.identity_field {
            &record.id
        } else {
            record.get(field).unwrap_or(&NULL)
        }
    }
}

impl Search for MetaIndex<'_> {
    /// Execute the join. The `collection` argument is the left side -
    /// callers pass an overlay-derived copy when request parameters
    /// adjusted it.
    fn query(&self, collection: &Collection, filter: &Filter) -> Result<RecordSet, Error> {
        let left_results = self.left.query(collection, filter)?;

        // distinct left join keys, in first-seen order
        let mut keys: Vec<Value> = Vec::new();

        for record in left_results.iter() {
            let value = Self::join_value(record, collection, &self.left_field);

            if !value.is_null() && !keys.contains(value) {
                keys.push(value.clone());
            }
        }

        // nothing to join against: skip the right-hand round trip
        if keys.is_empty() {
            return Ok(RecordSet::new());
        }

        let right_filter = Filter::new()
            .where_(Condition::new(
                self.right_field.clone(),
                Operator::Is,
                keys,
            ))
            .unbounded();

        let right_results = self.right.query(&self.right_collection, &right_filter)?;

        // bucket right rows by join key, preserving their arrival order
        let mut buckets: BTreeMap<String, Vec<&Record>> = BTreeMap::new();

        for record in right_results.iter() {
            let value = Self::join_value(record, &self.right_collection, &self.right_field);

            if !value.is_null() {
                buckets.entry(value.to_string()).or_default().push(record);
            }
        }

        let mut joined = RecordSet::new();

        for left_record in left_results.iter() {
            let key = Self::join_value(left_record, collection, &self.left_field);

            let Some(matches) = buckets.get(&key.to_string()) else {
                continue;
            };

            for right_record in matches {
                let mut merged = left_record.clone();

                // right side wins on field-name collisions; the joined
                // record keeps the left identity
                for (field, value) in &right_record.fields {
                    merged.set(field.clone(), value.clone());
                }

                if self.right_field != self.right_collection.identity_field {
                    // surface the right identity under its field name so
                    // the pairing stays visible in the merged row
                    if !right_record.id.is_null() {
                        merged.set(
                            self.right_collection.identity_field.clone(),
                            right_record.id.clone(),
                        );
                    }
                }

                joined.push(merged);
            }
        }

        Ok(joined)
    }

    fn list_values(
        &self,
        collection: &Collection,
        fields: &[String],
        filter: &Filter,
    ) -> Result<BTreeMap<String, Vec<Value>>, Error> {
        // fields resolve per side; anything the left side knows is left's
        let (left_fields, right_fields): (Vec<String>, Vec<String>) = fields
            .iter()
            .cloned()
            .partition(|field| collection.resolves(field));

        let mut listing = self.left.list_values(collection, &left_fields, filter)?;

        if !right_fields.is_empty() {
            let right_listing =
                self.right
                    .list_values(&self.right_collection, &right_fields, &Filter::all())?;
            listing.extend(right_listing);
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_spec_parses_two_sides_with_fields() {
        let spec = JoinSpec::parse("orders.customer_id:customers.id")
            .expect("two-sided spec should parse");
        assert_eq!(spec.left.collection, "orders");
        assert_eq!(spec.left.field.as_deref(), Some("customer_id"));
        assert_eq!(spec.right.collection, "customers");
    }

    #[test]
    fn join_spec_fields_default_to_identity() {
        let spec = JoinSpec::parse("orders:customers").expect("bare spec should parse");
        assert_eq!(spec.left.field, None);

        let customers = Collection::new("customers");
        assert_eq!(spec.right.field_for(&customers), "id");
    }

    #[test]
    fn three_collections_are_rejected_before_any_query() {
        let err = QueryTarget::parse("a.x:b.y:c.z").expect_err("three-way join must fail");
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidInput);
        assert!(err.message.contains("two (2)"));
    }

    #[test]
    fn single_target_passes_through() {
        assert_eq!(
            QueryTarget::parse("users").expect("single name should parse"),
            QueryTarget::Single("users".to_string())
        );
    }
}
