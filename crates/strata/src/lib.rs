//! Strata: a backend-agnostic schema, record, and filter-query mapping
//! layer.
//!
//! ## Crate layout
//! - `core::schema`: collections, fields, diffing, and the registry.
//! - `core::entity`: declarative struct⇄record binding tables.
//! - `core::filter`: backend-neutral query descriptions and the compact
//!   string grammar.
//! - `core::query` / `core::generator`: plan compilation and per-family
//!   statement rendering.
//! - `core::backend`: the executor contract, optional capabilities, and
//!   the shipped backends.
//!
//! The `prelude` module mirrors the surface application code uses.

pub use strata_core as core;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use strata_core::error::{Error, ErrorKind};

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::core::{
        backend::{Aggregator, Backend, Capability, MemoryBackend, Search},
        schema::SchemaRegistry,
    };
}
