use crate::schema::field::FieldType;
use serde::Serialize;
use thiserror::Error as ThisError;

///
/// SchemaDelta
///
/// One discrepancy between a desired collection and the schema a backend
/// actually holds. Deltas are diagnostics first (Display renders the
/// human-readable line a migration failure prints) and migration input
/// second (a Migratable backend receives the full list).
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, ThisError)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaDelta {
    #[error("field '{field}' is missing")]
    FieldMissing { field: String },

    #[error("field '{field}' type is {actual}, expected {desired}")]
    FieldTypeMismatch {
        field: String,
        desired: FieldType,
        actual: FieldType,
    },

    #[error("field '{field}' required flag is {actual}, expected {desired}")]
    FieldRequiredMismatch {
        field: String,
        desired: bool,
        actual: bool,
    },

    #[error("field '{field}' identity flag is {actual}, expected {desired}")]
    FieldIdentityMismatch {
        field: String,
        desired: bool,
        actual: bool,
    },

    #[error("identity field is '{actual}', expected '{desired}'")]
    IdentityFieldMismatch { desired: String, actual: String },

    #[error("identity field type is {actual}, expected {desired}")]
    IdentityTypeMismatch {
        desired: FieldType,
        actual: FieldType,
    },
}

impl SchemaDelta {
    /// Field the delta concerns, when it concerns one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::FieldMissing { field }
            | Self::FieldTypeMismatch { field, .. }
            | Self::FieldRequiredMismatch { field, .. }
            | Self::FieldIdentityMismatch { field, .. } => Some(field),
            Self::IdentityFieldMismatch { .. } | Self::IdentityTypeMismatch { .. } => None,
        }
    }
}
