use crate::{
    error::Error,
    record::Record,
    schema::Collection,
    value::Value,
};
use chrono::{DateTime, Utc};
use thiserror::Error as ThisError;

///
/// Field binding model
///
/// Application types map to records through an explicit, declarative
/// binding table instead of runtime reflection: one registration step per
/// type describes which struct fields correspond to which collection
/// fields, which one carries the identity, and which are skipped when
/// empty. The table is built once (see `Model`) and consulted at mapping
/// time.
///

///
/// BindingError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum BindingError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl BindingError {
    #[must_use]
    pub const fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self::Mismatch {
            expected,
            found: found.type_name(),
        }
    }
}

///
/// FromValue
///
/// Typed extraction used by binding setters. Implementations reject value
/// families they cannot represent; they do not coerce: coercion happens
/// earlier, through the collection field's rules.
///

pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, BindingError>;
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, BindingError> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(BindingError::mismatch("int", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, BindingError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as Self),
            other => Err(BindingError::mismatch("float", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, BindingError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(BindingError::mismatch("bool", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, BindingError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(BindingError::mismatch("text", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, BindingError> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(BindingError::mismatch("bytes", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, BindingError> {
        match value {
            Value::Time(v) => Ok(v),
            other => Err(BindingError::mismatch("time", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, BindingError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

///
/// FieldBinding
///

pub struct FieldBinding<E> {
    pub name: &'static str,
    pub identity: bool,
    pub omit_empty: bool,
    pub get: fn(&E) -> Value,
    pub set: fn(&mut E, Value) -> Result<(), BindingError>,
}

///
/// Bindings
///
/// Ordered binding table for one application type.
///

pub struct Bindings<E> {
    entries: Vec<FieldBinding<E>>,
}

impl<E> Bindings<E> {
    #[must_use]
    pub const fn builder() -> BindingsBuilder<E> {
        BindingsBuilder {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[FieldBinding<E>] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldBinding<E>> {
        self.entries.iter().find(|b| b.name == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binding that carries the identity for this collection, resolved by
    /// precedence: explicit identity binding, then a binding named after
    /// the collection's identity field, then one literally named "id".
    #[must_use]
    pub fn identity_binding(&self, collection: &Collection) -> Option<&FieldBinding<E>> {
        self.entries
            .iter()
            .find(|b| b.identity)
            .or_else(|| self.get(&collection.identity_field))
            .or_else(|| self.get("id"))
    }
}

///
/// BindingsBuilder
///

pub struct BindingsBuilder<E> {
    entries: Vec<FieldBinding<E>>,
}

impl<E> BindingsBuilder<E> {
    fn push(mut self, binding: FieldBinding<E>) -> Self {
        assert!(
            !self.entries.iter().any(|b| b.name == binding.name),
            "duplicate field binding '{}'",
            binding.name
        );
        self.entries.push(binding);
        self
    }

    #[must_use]
    pub fn bind(
        self,
        name: &'static str,
        get: fn(&E) -> Value,
        set: fn(&mut E, Value) -> Result<(), BindingError>,
    ) -> Self {
        self.push(FieldBinding {
            name,
            identity: false,
            omit_empty: false,
            get,
            set,
        })
    }

    /// Bind the field that explicitly carries the record identity.
    #[must_use]
    pub fn bind_identity(
        self,
        name: &'static str,
        get: fn(&E) -> Value,
        set: fn(&mut E, Value) -> Result<(), BindingError>,
    ) -> Self {
        self.push(FieldBinding {
            name,
            identity: true,
            omit_empty: false,
            get,
            set,
        })
    }

    /// Bind a field that is skipped when its value is the zero value.
    #[must_use]
    pub fn bind_omit_empty(
        self,
        name: &'static str,
        get: fn(&E) -> Value,
        set: fn(&mut E, Value) -> Result<(), BindingError>,
    ) -> Self {
        self.push(FieldBinding {
            name,
            identity: false,
            omit_empty: true,
            get,
            set,
        })
    }

    #[must_use]
    pub fn build(self) -> Bindings<E> {
        Bindings {
            entries: self.entries,
        }
    }
}

///
/// Entity
///
/// An application type that maps to records of some collection.
///

pub trait Entity: Default {
    /// The binding table for this type. Build it declaratively; callers
    /// cache the result per model, so this runs once per registration.
    fn bindings() -> Bindings<Self>
    where
        Self: Sized;
}

/// Map an application value into a record using a prebuilt binding table.
///
/// Identity resolution (first match wins): an explicitly-bound identity
/// field, then a binding named after `collection.identity_field`, then a
/// binding literally named "id". The winning value moves into
/// `record.id`; it never appears in `record.fields`. When nothing
/// matches, the id stays Null and the backend supplies one.
pub fn make_record_with<E>(
    collection: &Collection,
    bindings: &Bindings<E>,
    value: &E,
) -> Result<Record, Error> {
    if bindings.is_empty() {
        return Err(Error::invalid_input(format!(
            "cannot map a value with no field bindings into collection '{}'",
            collection.name
        )));
    }

    let mut record = Record::new(Value::Null);
    let identity = bindings.identity_binding(collection).map(|b| b.name);

    for binding in bindings.entries() {
        let field_value = (binding.get)(value);

        if binding.omit_empty && field_value.is_zero() {
            continue;
        }

        if identity == Some(binding.name) {
            // a zero identity means "not created yet": the id stays Null
            // and the backend supplies one
            record.id = if field_value.is_zero() {
                Value::Null
            } else {
                field_value
            };
        } else if collection.field(binding.name).is_some() {
            record.set(binding.name, field_value);
        }
    }

    Ok(record)
}

impl Collection {
    /// Map an application value into a record for this collection.
    pub fn make_record<E: Entity>(&self, value: &E) -> Result<Record, Error> {
        make_record_with(self, &E::bindings(), value)
    }
}

/// Fill an application value from a record using a prebuilt binding table.
///
/// Stored values coerce through the collection field's declared type
/// before assignment; a value that cannot be coerced or assigned is a
/// population failure naming the field. The identity value writes back
/// through the same precedence order used by `make_record_with`.
pub fn populate_with<E>(
    record: &Record,
    collection: &Collection,
    bindings: &Bindings<E>,
    target: &mut E,
) -> Result<(), Error> {
    if bindings.is_empty() {
        return Err(Error::invalid_input(format!(
            "cannot populate a value with no field bindings from collection '{}'",
            collection.name
        )));
    }

    for (name, stored) in &record.fields {
        let Some(binding) = bindings.get(name) else {
            continue;
        };

        let value = match collection.field(name) {
            Some(field) => field
                .convert_value(stored.clone())
                .map_err(|err| Error::population(err.message))?,
            None => stored.clone(),
        };

        (binding.set)(target, value)
            .map_err(|err| Error::population(format!("field '{name}': {err}")))?;
    }

    if !record.id.is_null()
        && let Some(binding) = bindings.identity_binding(collection)
    {
        let id = collection
            .identity_field_type
            .coerce(record.id.clone())
            .map_err(|err| Error::population(err.to_string()))?;

        (binding.set)(target, id).map_err(|err| {
            Error::population(format!("identity field '{}': {err}", binding.name))
        })?;
    }

    Ok(())
}

impl Record {
    /// Fill an application value from this record.
    pub fn populate<E: Entity>(&self, collection: &Collection, target: &mut E) -> Result<(), Error> {
        populate_with(self, collection, &E::bindings(), target)
    }

    /// Decode a fresh application value from this record.
    pub fn decode<E: Entity>(&self, collection: &Collection) -> Result<E, Error> {
        let mut target = E::default();
        self.populate(collection, &mut target)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType};

    #[derive(Debug, Default, PartialEq)]
    struct User {
        key: i64,
        id: i64,
        name: String,
        nickname: String,
    }

    impl Entity for User {
        fn bindings() -> Bindings<Self> {
            Bindings::builder()
                .bind_identity(
                    "key",
                    |u: &User| Value::Int(u.key),
                    |u, v| {
                        u.key = FromValue::from_value(v)?;
                        Ok(())
                    },
                )
                .bind(
                    "id",
                    |u| Value::Int(u.id),
                    |u, v| {
                        u.id = FromValue::from_value(v)?;
                        Ok(())
                    },
                )
                .bind(
                    "name",
                    |u| Value::Text(u.name.clone()),
                    |u, v| {
                        u.name = FromValue::from_value(v)?;
                        Ok(())
                    },
                )
                .bind_omit_empty(
                    "nickname",
                    |u| Value::Text(u.nickname.clone()),
                    |u, v| {
                        u.nickname = FromValue::from_value(v)?;
                        Ok(())
                    },
                )
                .build()
        }
    }

    fn users() -> Collection {
        Collection::new("users")
            .with_identity_field("key")
            .add_fields([
                Field::new("id", FieldType::Int),
                Field::new("name", FieldType::Text),
                Field::new("nickname", FieldType::Text),
            ])
            .expect("fixture fields are unique")
    }

    #[test]
    fn explicit_identity_binding_wins_over_literal_id() {
        let user = User {
            key: 9,
            id: 4,
            name: "ada".into(),
            nickname: String::new(),
        };

        let record = users().make_record(&user).expect("mapping should succeed");
        assert_eq!(record.id, Value::Int(9), "explicitly-bound identity wins");
        assert_eq!(
            record.get("id"),
            Some(&Value::Int(4)),
            "the literal 'id' field stays a plain field"
        );
    }

    #[test]
    fn omit_empty_skips_zero_values() {
        let user = User {
            key: 1,
            id: 0,
            name: "ada".into(),
            nickname: String::new(),
        };

        let record = users().make_record(&user).expect("mapping should succeed");
        assert_eq!(record.get("nickname"), None, "empty omit-empty field skipped");
        assert_eq!(record.get("id"), Some(&Value::Int(0)), "plain zero kept");
    }

    #[test]
    fn identity_falls_back_to_collection_identity_field_name() {
        #[derive(Debug, Default)]
        struct Plain {
            key: i64,
            name: String,
        }

        impl Entity for Plain {
            fn bindings() -> Bindings<Self> {
                Bindings::builder()
                    .bind(
                        "key",
                        |p: &Plain| Value::Int(p.key),
                        |p, v| {
                            p.key = FromValue::from_value(v)?;
                            Ok(())
                        },
                    )
                    .bind(
                        "name",
                        |p| Value::Text(p.name.clone()),
                        |p, v| {
                            p.name = FromValue::from_value(v)?;
                            Ok(())
                        },
                    )
                    .build()
            }
        }

        let record = users()
            .make_record(&Plain {
                key: 5,
                name: "x".into(),
            })
            .expect("mapping should succeed");
        assert_eq!(record.id, Value::Int(5));
        assert_eq!(record.get("key"), None, "identity never stays in fields");
    }

    #[test]
    fn roundtrip_restores_every_bound_field() {
        let user = User {
            key: 3,
            id: 7,
            name: "grace".into(),
            nickname: "g".into(),
        };

        let collection = users();
        let record = collection.make_record(&user).expect("mapping should succeed");
        let restored: User = record
            .decode(&collection)
            .expect("population should succeed");
        assert_eq!(restored, user);
    }

    #[test]
    fn population_coerces_through_declared_types() {
        let collection = users();
        let mut record = Record::new(Value::Int(1));
        record.set("id", Value::Text("12".into()));

        let restored: User = record
            .decode(&collection)
            .expect("text should coerce into the declared int field");
        assert_eq!(restored.id, 12);
    }

    #[test]
    fn population_failure_names_the_field() {
        let collection = users();
        let mut record = Record::new(Value::Int(1));
        record.set("name", Value::List(vec![]));

        let err = record
            .decode::<User>(&collection)
            .expect_err("a list cannot populate a text field");
        assert_eq!(err.kind, crate::error::ErrorKind::Population);
        assert!(err.message.contains("name"));
    }

    #[test]
    fn empty_binding_table_is_invalid_input() {
        #[derive(Debug, Default)]
        struct Hollow;

        impl Entity for Hollow {
            fn bindings() -> Bindings<Self> {
                Bindings::builder().build()
            }
        }

        let err = users()
            .make_record(&Hollow)
            .expect_err("a type with no bindings cannot map");
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidInput);
    }
}
