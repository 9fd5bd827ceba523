use crate::{error::Error, value::Value};
use derive_more::{Display, FromStr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// FieldType
///
/// Declared column type. The coercion rules here are the single authority
/// for turning loosely-typed input (parsed filter text, JSON bodies,
/// application values) into the value family a backend expects.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, FromStr, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[remain::sorted]
pub enum FieldType {
    #[display("array")]
    Array,
    #[display("bool")]
    Bool,
    #[display("bytes")]
    Bytes,
    #[display("float")]
    Float,
    #[display("int")]
    Int,
    #[display("object")]
    Object,
    #[display("text")]
    Text,
    #[display("time")]
    Time,
}

impl FieldType {
    /// Zero value of the type.
    #[must_use]
    pub const fn default_value(self) -> Value {
        match self {
            Self::Array => Value::List(Vec::new()),
            Self::Bool => Value::Bool(false),
            Self::Bytes => Value::Bytes(Vec::new()),
            Self::Float => Value::Float(0.0),
            Self::Int => Value::Int(0),
            Self::Object => Value::Object(BTreeMap::new()),
            Self::Text => Value::Text(String::new()),
            Self::Time => Value::Null,
        }
    }

    /// Coerce a value into this type.
    ///
    /// Null passes through every type: absence is typed by the column, not
    /// the value. Lossy numeric conversions are rejected rather than
    /// truncated.
    pub fn coerce(self, value: Value) -> Result<Value, CoerceError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Self::Int => coerce_int(value),
            Self::Float => coerce_float(value),
            Self::Text => coerce_text(value),
            Self::Bool => coerce_bool(value),
            Self::Bytes => coerce_bytes(value),
            Self::Time => coerce_time(value),
            Self::Array => match value {
                Value::List(v) => Ok(Value::List(v)),
                other => Err(CoerceError::incompatible(&other, self)),
            },
            Self::Object => match value {
                Value::Object(v) => Ok(Value::Object(v)),
                other => Err(CoerceError::incompatible(&other, self)),
            },
        }
    }
}

fn coerce_int(value: Value) -> Result<Value, CoerceError> {
    match value {
        Value::Int(v) => Ok(Value::Int(v)),
        Value::Bool(v) => Ok(Value::Int(i64::from(v))),
        Value::Float(v) => num_traits::cast::<f64, i64>(v)
            .filter(|_| v.fract() == 0.0)
            .map(Value::Int)
            .ok_or_else(|| CoerceError::unrepresentable(v, FieldType::Int)),
        Value::Text(v) => v
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| CoerceError::unrepresentable(&v, FieldType::Int)),
        Value::Time(v) => Ok(Value::Int(v.timestamp())),
        other => Err(CoerceError::incompatible(&other, FieldType::Int)),
    }
}

fn coerce_float(value: Value) -> Result<Value, CoerceError> {
    match value {
        Value::Float(v) => Ok(Value::Float(v)),
        Value::Int(v) => Ok(Value::Float(v as f64)),
        Value::Text(v) => v
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| CoerceError::unrepresentable(&v, FieldType::Float)),
        other => Err(CoerceError::incompatible(&other, FieldType::Float)),
    }
}

fn coerce_text(value: Value) -> Result<Value, CoerceError> {
    match value {
        Value::Text(v) => Ok(Value::Text(v)),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Time(_) => {
            Ok(Value::Text(value.to_string()))
        }
        Value::Bytes(v) => String::from_utf8(v)
            .map(Value::Text)
            .map_err(|_| CoerceError::incompatible_name("bytes", FieldType::Text)),
        other => Err(CoerceError::incompatible(&other, FieldType::Text)),
    }
}

fn coerce_bool(value: Value) -> Result<Value, CoerceError> {
    match value {
        Value::Bool(v) => Ok(Value::Bool(v)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Text(v) => match v.as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(CoerceError::unrepresentable(&v, FieldType::Bool)),
        },
        other => Err(CoerceError::incompatible(&other, FieldType::Bool)),
    }
}

fn coerce_bytes(value: Value) -> Result<Value, CoerceError> {
    match value {
        Value::Bytes(v) => Ok(Value::Bytes(v)),
        Value::Text(v) => Ok(Value::Bytes(v.into_bytes())),
        other => Err(CoerceError::incompatible(&other, FieldType::Bytes)),
    }
}

fn coerce_time(value: Value) -> Result<Value, CoerceError> {
    match value {
        Value::Time(v) => Ok(Value::Time(v)),
        Value::Int(v) => chrono::DateTime::from_timestamp(v, 0)
            .map(Value::Time)
            .ok_or_else(|| CoerceError::unrepresentable(v, FieldType::Time)),
        Value::Text(v) => chrono::DateTime::parse_from_rfc3339(&v)
            .map(|t| Value::Time(t.with_timezone(&chrono::Utc)))
            .map_err(|_| CoerceError::unrepresentable(&v, FieldType::Time)),
        other => Err(CoerceError::incompatible(&other, FieldType::Time)),
    }
}

///
/// CoerceError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CoerceError {
    #[error("cannot represent '{value}' as {target}")]
    Unrepresentable { value: String, target: FieldType },

    #[error("cannot convert {from} to {target}")]
    Incompatible {
        from: &'static str,
        target: FieldType,
    },
}

impl CoerceError {
    fn unrepresentable(value: impl std::fmt::Display, target: FieldType) -> Self {
        Self::Unrepresentable {
            value: value.to_string(),
            target,
        }
    }

    fn incompatible(value: &Value, target: FieldType) -> Self {
        Self::Incompatible {
            from: value.type_name(),
            target,
        }
    }

    const fn incompatible_name(from: &'static str, target: FieldType) -> Self {
        Self::Incompatible { from, target }
    }
}

impl From<CoerceError> for Error {
    fn from(err: CoerceError) -> Self {
        Self::invalid_input(err.to_string())
    }
}

///
/// Field
///

/// Per-field value check run after type coercion. Returns a reason on
/// rejection; the field name is attached by the caller.
pub type Validator = fn(&Value) -> Result<(), String>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: FieldType,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub identity: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(skip)]
    pub validator: Option<Validator>,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            identity: false,
            default: None,
            validator: None,
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub const fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Coerce a value to this field's type, then run the validator.
    pub fn convert_value(&self, value: Value) -> Result<Value, Error> {
        let value = self.ty.coerce(value).map_err(|err| {
            Error::invalid_input(format!("field '{}': {err}", self.name))
        })?;

        if let Some(validator) = self.validator {
            validator(&value).map_err(|reason| {
                Error::invalid_input(format!("field '{}': {reason}", self.name))
            })?;
        }

        Ok(value)
    }

    /// Whether the declared attributes differ from an observed field.
    #[must_use]
    pub fn attrs_differ(&self, observed: &Self) -> bool {
        self.ty != observed.ty
            || self.required != observed.required
            || self.identity != observed.identity
    }
}
