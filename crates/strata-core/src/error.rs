use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured runtime error with a stable kind classification.
/// Every failure in the core carries a kind callers can branch on
/// programmatically; the message is for humans.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Construct a not-found error for a collection.
    pub fn collection_not_found(name: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("collection '{name}' not found"))
    }

    /// Construct a not-found error for a record id.
    pub fn record_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("record '{id}' does not exist"))
    }

    pub fn exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Exists, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Construct an unknown-field error naming the undeclared field.
    pub fn unknown_field(field: impl fmt::Display) -> Self {
        Self::new(ErrorKind::UnknownField, format!("unknown field '{field}'"))
    }

    /// Construct an unsupported-capability error naming the backend type.
    pub fn unsupported(backend_type: &str, what: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Unsupported,
            format!("backend '{backend_type}' does not support {what}"),
        )
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaMismatch, message)
    }

    pub fn population(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Population, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    #[must_use]
    pub const fn is_exists(&self) -> bool {
        matches!(self.kind, ErrorKind::Exists)
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.kind, ErrorKind::Unsupported)
    }
}

///
/// ErrorKind
///
/// Kind taxonomy for runtime classification. Boundaries map these to
/// transport statuses; the core never branches on message text.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[remain::sorted]
pub enum ErrorKind {
    Exists,
    InvalidInput,
    NotFound,
    Parse,
    Population,
    SchemaMismatch,
    UnknownField,
    Unsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Exists => "exists",
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Parse => "parse",
            Self::Population => "population",
            Self::SchemaMismatch => "schema_mismatch",
            Self::UnknownField => "unknown_field",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_survive_construction() {
        let err = Error::collection_not_found("users");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not_found: collection 'users' not found");

        let err = Error::unsupported("MemoryBackend", "aggregation");
        assert!(err.is_unsupported());
        assert!(
            err.message.contains("MemoryBackend"),
            "unsupported error should name the backend type"
        );
    }

    #[test]
    fn unknown_field_names_the_field() {
        let err = Error::unknown_field("nope");
        assert_eq!(err.kind, ErrorKind::UnknownField);
        assert!(err.message.contains("'nope'"));
    }
}
