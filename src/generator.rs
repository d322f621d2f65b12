//! Pluggable biome generators and the registry that orders them.

use smallvec::SmallVec;

use crate::config::{ConfigTable, GeneratorSettings};
use crate::error::CaveBiomeError;
use crate::fragment::BiomeFragment;

/// Most worlds register only a handful of generators, so the registry's
/// backing list stays inline up to this many before spilling to the heap.
const INLINE_GENERATORS: usize = 4;

/// A biome generator plugin. Implementations fill in a fragment's cells
/// given a derived seed; the concrete algorithms (noise-driven cave
/// shapes, structure placement, ...) are out of this crate's scope, only
/// the interface they're driven through lives here.
///
/// `generate` takes `&self` rather than `&mut self` so that the
/// [`crate::cache::FragmentCache`] can run it outside any lock, including
/// concurrently for unrelated fragments from multiple threads.
pub trait Generator: Send + Sync {
    /// A short, stable identifier used to key this generator's config
    /// subtree and to detect duplicate registrations.
    fn id(&self) -> &str;
    /// Generators run in ascending priority order; lower values run first.
    fn priority(&self) -> i32;
    /// This generator's contribution to the per-generator seed XOR'd with
    /// the world seed (see [`GeneratorRegistry::build_profile_list`]).
    fn generator_seed(&self) -> u64;
    /// Called once, before any `generate` call, with this generator's
    /// config subtree (empty if none was configured for its ID).
    fn init(&mut self, config: &ConfigTable);
    /// Called once at shutdown, after the last `generate` call.
    fn deinit(&mut self);
    /// Contributes this generator's biome assignments to `fragment`.
    fn generate(&self, fragment: &mut BiomeFragment, seed: u64);
}

/// A priority-ordered list of generators, built once at startup and shared
/// for the lifetime of a [`crate::service::CaveBiomeService`].
pub struct GeneratorRegistry {
    registered: SmallVec<[Box<dyn Generator>; INLINE_GENERATORS]>,
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorRegistry {
    /// Constructs an empty registry.
    pub fn new() -> Self {
        Self {
            registered: SmallVec::new(),
        }
    }

    /// Registers a generator by ID. Rejects a duplicate ID without
    /// modifying the registry.
    pub fn register(&mut self, generator: Box<dyn Generator>) -> Result<(), CaveBiomeError> {
        if self.registered.iter().any(|g| g.id() == generator.id()) {
            return Err(CaveBiomeError::DuplicateGeneratorId(generator.id().to_owned()));
        }
        self.registered.push(generator);
        Ok(())
    }

    /// Consumes the registry, calling `init` on every registered generator
    /// with its config subtree, and returns them sorted by ascending
    /// priority. Tie-breaking between generators with equal priority is
    /// unspecified but stable for a given registration order (a plain
    /// stable sort).
    pub fn build_profile_list(mut self, settings: &GeneratorSettings) -> Vec<Box<dyn Generator>> {
        for generator in &mut self.registered {
            let subtree = settings.subtree_for(generator.id());
            generator.init(&subtree);
        }
        self.registered.sort_by_key(|g| g.priority());
        self.registered.into_vec()
    }
}

/// Derives the per-generator seed fed into [`Generator::generate`], per the
/// specification: `profile.seed XOR generator.generator_seed`.
#[inline]
pub fn derive_generator_seed(world_seed: u64, generator: &dyn Generator) -> u64 {
    world_seed ^ generator.generator_seed()
}

/// A small deterministic generator used by this crate's own tests to
/// exercise the cache, grid selection, and interpolation machinery without
/// depending on a real (externally-owned) biome generator plugin.
#[cfg(test)]
pub(crate) mod reference {
    use std::num::NonZeroU32;

    use bevy_math::IVec3;

    use super::Generator;
    use crate::biome::BiomeId;
    use crate::config::ConfigTable;
    use crate::coordinates::{CELLS_PER_FRAG, CELL_SIZE};
    use crate::fragment::BiomeFragment;

    /// Assigns biome `(cellX + 3*cellY + 7*cellZ) mod palette_size` to every
    /// cell, identically on both sub-lattice layers. `palette_size` must
    /// match the number of biomes pushed into the registry under test, in
    /// push order (this generator writes `RegistryId`s `1..=palette_size`,
    /// not the registry itself, callers are responsible for keeping the
    /// two in sync).
    pub struct CheckerboardGenerator {
        palette_size: u32,
    }

    impl CheckerboardGenerator {
        pub fn new(palette_size: u32) -> Self {
            assert!(palette_size > 0, "checkerboard generator needs a non-empty palette");
            Self { palette_size }
        }

        fn biome_for_cell(&self, cell: IVec3) -> BiomeId {
            let idx = (cell.x + 3 * cell.y + 7 * cell.z).rem_euclid(self.palette_size as i32);
            BiomeId(NonZeroU32::new((idx as u32) + 1).unwrap())
        }
    }

    impl Generator for CheckerboardGenerator {
        fn id(&self) -> &str {
            "reference_checkerboard"
        }
        fn priority(&self) -> i32 {
            0
        }
        fn generator_seed(&self) -> u64 {
            0
        }
        fn init(&mut self, _config: &ConfigTable) {}
        fn deinit(&mut self) {}
        fn generate(&self, fragment: &mut BiomeFragment, _seed: u64) {
            for kx in 0..CELLS_PER_FRAG {
                for ky in 0..CELLS_PER_FRAG {
                    for kz in 0..CELLS_PER_FRAG {
                        let rotated = fragment.pos.origin + IVec3::new(kx, ky, kz) * CELL_SIZE;
                        let global_cell = IVec3::new(
                            rotated.x.div_euclid(CELL_SIZE),
                            rotated.y.div_euclid(CELL_SIZE),
                            rotated.z.div_euclid(CELL_SIZE),
                        );
                        let biome = self.biome_for_cell(global_cell);
                        fragment.set_cell(rotated, 0, biome);
                        fragment.set_cell(rotated, 1, biome);
                    }
                }
            }
        }
    }
}
