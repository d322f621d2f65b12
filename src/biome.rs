//! Biome palette: the external collaborator the specification calls
//! `BiomePalette`, made concrete so this crate is self-contained and
//! testable. Consumers outside this crate (the real game's generators)
//! are expected to build their own, richer `BiomeDefinition`; what this
//! core actually needs is the named f32 field lookup used by
//! [`crate::interpolate::interpolate_value`].

use kstring::KString;

use crate::registry::{Registry, RegistryName, RegistryNameRef, RegistryObject};

/// The stable ID of a biome inside a [`BiomeRegistry`]. `None` marks a
/// fragment cell that generators have not yet assigned.
pub type BiomeId = crate::registry::RegistryId;

/// The named f32 scalar fields every biome exposes for interpolation.
/// Addressable both at compile time (this enum, used on the hot path) and
/// by name at runtime (`BiomeDefinition::field_by_name`, used by tooling).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BiomeField {
    /// How jagged the generated cave surfaces should be.
    Roughness,
    /// How hilly this biome's local terrain should read.
    Hills,
    /// A gameplay-facing danger scalar (spawns, hazards).
    Danger,
    /// Density of decorative features (stalactites, crystals, ...).
    DecorationDensity,
}

impl BiomeField {
    /// All known fields, in declaration order.
    pub const ALL: [BiomeField; 4] = [
        BiomeField::Roughness,
        BiomeField::Hills,
        BiomeField::Danger,
        BiomeField::DecorationDensity,
    ];

    /// The name this field is addressable by at runtime.
    pub const fn name(self) -> &'static str {
        match self {
            BiomeField::Roughness => "roughness",
            BiomeField::Hills => "hills",
            BiomeField::Danger => "danger",
            BiomeField::DecorationDensity => "decoration_density",
        }
    }

    /// Looks up a field by its runtime name.
    pub fn by_name(name: &str) -> Option<BiomeField> {
        BiomeField::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// A single biome's data, as relevant to the cave biome map core.
#[derive(Clone, Debug, PartialEq)]
pub struct BiomeDefinition {
    /// The unique registry name.
    pub name: RegistryName,
    /// Named f32 scalar fields, indexed by [`BiomeField`].
    pub fields: [f32; BiomeField::ALL.len()],
}

impl std::hash::Hash for BiomeDefinition {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl BiomeDefinition {
    /// Constructs a new biome definition with the given name and field values,
    /// defaulting any field not mentioned in `fields` to `0.0`.
    pub fn new(ns: &str, key: &str, fields: &[(BiomeField, f32)]) -> Self {
        let mut values = [0.0f32; BiomeField::ALL.len()];
        for &(field, value) in fields {
            values[field as usize] = value;
        }
        Self {
            name: RegistryName::new(ns, key),
            fields: values,
        }
    }

    /// Reads a field by its compile-time enum variant. This is the hot path
    /// used by tetrahedral interpolation.
    #[inline]
    pub fn field(&self, field: BiomeField) -> f32 {
        self.fields[field as usize]
    }

    /// Reads a field by its runtime string name.
    pub fn field_by_name(&self, name: &str) -> Option<f32> {
        BiomeField::by_name(name).map(|f| self.field(f))
    }
}

impl RegistryObject for BiomeDefinition {
    fn registry_name(&self) -> RegistryNameRef {
        self.name.as_ref()
    }
}

/// A named registry of biome definitions. This is the concrete
/// implementation of the specification's `BiomePalette (external)`.
pub type BiomeRegistry = Registry<BiomeDefinition>;

/// Default namespace used by biomes defined within this crate's tests and
/// reference generators.
pub const CAVE_BIOME_DOMAIN: &str = "cave";

/// Helper for building an `ns:key` [`RegistryName`] in the crate's default
/// namespace.
pub fn cave_biome_name(key: &str) -> RegistryName {
    RegistryName::new(CAVE_BIOME_DOMAIN, key)
}

/// Interns `key` as a [`KString`], a small optimization matching the
/// teacher's use of `kstring` throughout its registry-adjacent APIs.
pub fn intern(key: &str) -> KString {
    KString::from_ref(key)
}
