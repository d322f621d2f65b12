//! Error types for the cave biome map core.
//!
//! Most failure modes described by the specification (out-of-bounds
//! queries, refcount double-frees, allocation exhaustion) are program
//! invariant violations and are asserted on rather than returned as
//! [`CaveBiomeError`]. This type covers the conditions that are legitimate
//! runtime outcomes: duplicate generator registration and unknown named
//! biome fields.

use thiserror::Error;

use crate::registry::RegistryError;

/// Errors that can be returned from the cave biome map's public API.
#[derive(Debug, Error)]
pub enum CaveBiomeError {
    /// Two generators were registered under the same ID.
    #[error("a generator with id {0:?} is already registered")]
    DuplicateGeneratorId(String),
    /// The biome registry rejected an insertion.
    #[error("biome registry error: {0}")]
    Registry(#[from] RegistryError),
    /// A named scalar field was requested that no biome in the palette defines.
    #[error("unknown biome field {0:?}")]
    UnknownField(String),
}
