//! Configuration subtrees handed to generators at initialization time.
//!
//! Kept deliberately small: the cave biome map core doesn't know what
//! configuration any given generator plugin wants, so it just routes an
//! opaque, per-generator-id subtree of a larger settings tree through to
//! `Generator::init`.

use hashbrown::HashMap;
use kstring::KString;
use serde::{Deserialize, Serialize};

/// A single configuration value in a generator's config subtree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A text value.
    String(String),
    /// A nested table.
    Table(ConfigTable),
}

/// A table of named configuration values, keyed by [`KString`] to match the
/// rest of the crate's string-interning convention.
pub type ConfigTable = HashMap<KString, ConfigValue>;

/// The full settings tree passed to [`crate::generator::GeneratorRegistry::build_profile_list`],
/// one subtree per generator ID.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeneratorSettings {
    per_generator: HashMap<KString, ConfigTable>,
}

impl GeneratorSettings {
    /// Constructs an empty settings tree (every generator gets an empty
    /// subtree on `init`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the config subtree for a given generator ID.
    pub fn set(&mut self, generator_id: &str, table: ConfigTable) {
        self.per_generator.insert(KString::from_ref(generator_id), table);
    }

    /// Returns the config subtree for a given generator ID, or an empty
    /// table if none was configured (a generator receiving an empty subtree
    /// is expected to fall back to its own defaults).
    pub fn subtree_for(&self, generator_id: &str) -> ConfigTable {
        self.per_generator.get(generator_id).cloned().unwrap_or_default()
    }
}
