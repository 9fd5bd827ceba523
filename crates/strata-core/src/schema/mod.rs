//! Schema descriptors: fields, collections, diffing, and the registry.

pub mod batch;
pub mod collection;
pub mod delta;
pub mod field;
pub mod registry;

pub use batch::{BatchCreateError, create_collections};
pub use collection::{
    Collection, CollectionOptions, CollectionOverlay, DEFAULT_IDENTITY_FIELD,
    DEFAULT_IDENTITY_FIELD_TYPE,
};
pub use delta::SchemaDelta;
pub use field::{CoerceError, Field, FieldType, Validator};
pub use registry::SchemaRegistry;
