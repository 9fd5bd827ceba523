use crate::{
    error::Error,
    schema::{
        delta::SchemaDelta,
        field::{Field, FieldType},
    },
    value::Value,
};
use serde::{Deserialize, Serialize};

/// Identity column name used when a collection does not declare one.
pub const DEFAULT_IDENTITY_FIELD: &str = "id";

/// Identity column type used when a collection does not declare one.
pub const DEFAULT_IDENTITY_FIELD_TYPE: FieldType = FieldType::Int;

///
/// CollectionOptions
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CollectionOptions {
    #[serde(default)]
    pub fields_unordered: bool,
}

///
/// Collection
///
/// Backend-neutral schema descriptor for one entity type: an ordered set
/// of declared fields plus identity and index naming options.
///
/// The identity field is implicit: it does not have to appear in `fields`.
/// Registered collections are never mutated per request; see
/// [`CollectionOverlay`].
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Collection {
    pub name: String,

    #[serde(default)]
    pub fields: Vec<Field>,

    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    #[serde(default = "default_identity_field_type")]
    pub identity_field_type: FieldType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index_compound_fields: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_compound_field_joiner: Option<String>,

    #[serde(default)]
    pub options: CollectionOptions,
}

fn default_identity_field() -> String {
    DEFAULT_IDENTITY_FIELD.to_string()
}

const fn default_identity_field_type() -> FieldType {
    DEFAULT_IDENTITY_FIELD_TYPE
}

impl Collection {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            identity_field: default_identity_field(),
            identity_field_type: DEFAULT_IDENTITY_FIELD_TYPE,
            index_name: None,
            index_compound_fields: Vec::new(),
            index_compound_field_joiner: None,
            options: CollectionOptions::default(),
        }
    }

    /// Append a declared field. Duplicate names are rejected.
    pub fn add_field(mut self, field: Field) -> Result<Self, Error> {
        if self.field(&field.name).is_some() {
            return Err(Error::exists(format!(
                "collection '{}' already declares field '{}'",
                self.name, field.name
            )));
        }

        self.fields.push(field);
        Ok(self)
    }

    /// Append several declared fields.
    pub fn add_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Result<Self, Error> {
        for field in fields {
            self = self.add_field(field)?;
        }

        Ok(self)
    }

    #[must_use]
    pub fn with_identity_field(mut self, name: impl Into<String>) -> Self {
        self.identity_field = name.into();
        self
    }

    #[must_use]
    pub const fn with_identity_field_type(mut self, ty: FieldType) -> Self {
        self.identity_field_type = ty;
        self
    }

    /// Look up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the name resolves to the identity field or a declared one.
    #[must_use]
    pub fn resolves(&self, name: &str) -> bool {
        name == self.identity_field || self.field(name).is_some()
    }

    /// Coerce a value through the named field's rules.
    ///
    /// The identity field coerces through the identity type even when it is
    /// not declared in `fields`.
    pub fn convert_value(&self, name: &str, value: Value) -> Result<Value, Error> {
        if let Some(field) = self.field(name) {
            field.convert_value(value)
        } else if name == self.identity_field {
            Ok(self.identity_field_type.coerce(value)?)
        } else {
            Err(Error::unknown_field(name))
        }
    }

    /// Derive a request-scoped copy with index overrides applied.
    #[must_use]
    pub fn overlaid(&self, overlay: &CollectionOverlay) -> Self {
        let mut derived = self.clone();

        if let Some(index_name) = &overlay.index_name {
            derived.index_name = Some(index_name.clone());
        }

        if let Some(fields) = &overlay.index_compound_fields {
            derived.index_compound_fields = fields.clone();
        }

        if let Some(joiner) = &overlay.index_compound_field_joiner {
            derived.index_compound_field_joiner = Some(joiner.clone());
        }

        derived
    }

    /// Diff this (desired) collection against an observed one.
    ///
    /// Walks the desired fields only: schema is additive-tolerant, so
    /// fields present in `actual` but undeclared here are not flagged.
    /// An empty result means no drift.
    #[must_use]
    pub fn diff(&self, actual: &Self) -> Vec<SchemaDelta> {
        let mut deltas = Vec::new();

        if self.identity_field != actual.identity_field {
            deltas.push(SchemaDelta::IdentityFieldMismatch {
                desired: self.identity_field.clone(),
                actual: actual.identity_field.clone(),
            });
        }

        if self.identity_field_type != actual.identity_field_type {
            deltas.push(SchemaDelta::IdentityTypeMismatch {
                desired: self.identity_field_type,
                actual: actual.identity_field_type,
            });
        }

        for desired in &self.fields {
            let Some(observed) = actual.field(&desired.name) else {
                deltas.push(SchemaDelta::FieldMissing {
                    field: desired.name.clone(),
                });
                continue;
            };

            if desired.ty != observed.ty {
                deltas.push(SchemaDelta::FieldTypeMismatch {
                    field: desired.name.clone(),
                    desired: desired.ty,
                    actual: observed.ty,
                });
            }

            if desired.required != observed.required {
                deltas.push(SchemaDelta::FieldRequiredMismatch {
                    field: desired.name.clone(),
                    desired: desired.required,
                    actual: observed.required,
                });
            }

            if desired.identity != observed.identity {
                deltas.push(SchemaDelta::FieldIdentityMismatch {
                    field: desired.name.clone(),
                    desired: desired.identity,
                    actual: observed.identity,
                });
            }
        }

        deltas
    }
}

///
/// CollectionOverlay
///
/// Request-scoped index overrides. Applying one derives a new Collection
/// value; the registered original stays untouched.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CollectionOverlay {
    #[serde(default)]
    pub index_name: Option<String>,

    #[serde(default)]
    pub index_compound_fields: Option<Vec<String>>,

    #[serde(default)]
    pub index_compound_field_joiner: Option<String>,
}

impl CollectionOverlay {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.index_name.is_none()
            && self.index_compound_fields.is_none()
            && self.index_compound_field_joiner.is_none()
    }
}
