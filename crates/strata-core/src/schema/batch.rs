use crate::{backend::Backend, error::Error, schema::collection::Collection};
use thiserror::Error as ThisError;

///
/// BatchCreateError
///
/// Outcome shape for multi-collection schema creation. A single requested
/// collection fails fast with its own error (the boundary maps `Exists` to
/// a conflict status); a batch keeps going, leaves already-created
/// collections in place, and reports the failures together.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum BatchCreateError {
    #[error("{0}")]
    Single(Error),

    #[error("{} collection(s) failed to create", failures.len())]
    Many { failures: Vec<(String, Error)> },
}

impl BatchCreateError {
    /// Flatten into the failed collection names, in request order.
    #[must_use]
    pub fn failed_names(&self) -> Vec<&str> {
        match self {
            Self::Single(_) => Vec::new(),
            Self::Many { failures } => failures.iter().map(|(name, _)| name.as_str()).collect(),
        }
    }
}

/// Create a set of collections on a backend.
///
/// Exactly one requested collection returns its error immediately; more
/// than one attempts every entry and collects the failures.
pub fn create_collections(
    backend: &dyn Backend,
    collections: Vec<Collection>,
) -> Result<(), BatchCreateError> {
    let single = collections.len() == 1;
    let mut failures = Vec::new();

    for collection in collections {
        let name = collection.name.clone();

        if let Err(err) = backend.create_collection(&collection) {
            if single {
                return Err(BatchCreateError::Single(err));
            }

            failures.push((name, err));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(BatchCreateError::Many { failures })
    }
}
