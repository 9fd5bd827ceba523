use crate::{
    error::Error,
    filter::{Condition, Filter, Operator},
    value::Value,
};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Token that requests the match-everything, explicitly-unbounded filter.
pub const MATCH_ALL: &str = "all";

/// Separator between values in a multi-value condition.
const VALUE_SEPARATOR: char = '|';

///
/// ParseError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ParseError {
    #[error("filter expression is empty")]
    Empty,

    #[error("incomplete condition at segment {index}: expected field/operator/value triples")]
    Incomplete { index: usize },

    #[error("empty field name at segment {index}")]
    EmptyField { index: usize },

    #[error("unknown operator '{token}' at segment {index}")]
    UnknownOperator { token: String, index: usize },
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::parse(err.to_string())
    }
}

impl Operator {
    /// Resolve a grammar token, accepting the common aliases.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "is" | "eq" => Some(Self::Is),
            "not" | "ne" => Some(Self::Not),
            "contains" => Some(Self::Contains),
            "notcontains" => Some(Self::NotContains),
            "prefix" => Some(Self::Prefix),
            "suffix" => Some(Self::Suffix),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }
}

/// Split a raw value token into condition values.
///
/// Values stay text at this stage; typed coercion happens when the filter
/// is compiled against a collection. The literal `null` is the one
/// exception: it has no textual representation after coercion.
fn parse_values(token: &str) -> Vec<Value> {
    token
        .split(VALUE_SEPARATOR)
        .map(|part| {
            if part == "null" {
                Value::Null
            } else {
                Value::Text(part.to_string())
            }
        })
        .collect()
}

impl Filter {
    /// Parse the compact string grammar: `field/operator/value` triples
    /// separated by `/`, or the literal `all`.
    ///
    /// This parser is the single source of truth for the grammar; the
    /// transport boundary URL-decodes before calling it.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim_matches('/');

        if input.is_empty() {
            return Err(ParseError::Empty);
        }

        if input == MATCH_ALL {
            return Ok(Self::all());
        }

        let segments: Vec<&str> = input.split('/').collect();

        if segments.len() % 3 != 0 {
            return Err(ParseError::Incomplete {
                index: segments.len() - (segments.len() % 3),
            });
        }

        let mut filter = Self::new();

        for (index, triple) in segments.chunks(3).enumerate() {
            let [field, op_token, value] = triple else {
                unreachable!("chunks(3) on a length divisible by 3");
            };

            if field.is_empty() {
                return Err(ParseError::EmptyField { index: index * 3 });
            }

            let op = Operator::from_token(op_token).ok_or_else(|| ParseError::UnknownOperator {
                token: (*op_token).to_string(),
                index: index * 3 + 1,
            })?;

            filter
                .criteria
                .push(Condition::new(*field, op, parse_values(value)));
        }

        Ok(filter)
    }

    /// Build a filter from a flat key→value mapping.
    ///
    /// Each key is a field; the value may carry an `op:` prefix
    /// (`"gt:21"`), defaulting to equality. Iteration order is the map's
    /// key order, so the result is deterministic.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, ParseError> {
        let mut filter = Self::new();

        for (index, (field, raw)) in map.iter().enumerate() {
            if field.is_empty() {
                return Err(ParseError::EmptyField { index });
            }

            let (op, value_token) = match raw.split_once(':') {
                Some((prefix, rest)) => match Operator::from_token(prefix) {
                    Some(op) => (op, rest),
                    None => (Operator::Is, raw.as_str()),
                },
                None => (Operator::Is, raw.as_str()),
            };

            filter
                .criteria
                .push(Condition::new(field.clone(), op, parse_values(value_token)));
        }

        Ok(filter)
    }
}
