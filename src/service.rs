//! Process-lifetime (well, world-lifetime) state: the generator pipeline,
//! biome registry, and fragment cache, bundled behind one value per
//! spec.md's design notes ("replace process-wide state with an explicit
//! `CaveBiomeService` value owning the cache, profile, and registry").

use std::sync::Arc;

use bevy_math::IVec3;

use crate::biome::{BiomeId, BiomeRegistry};
use crate::cache::FragmentCache;
use crate::coordinates::FragmentPosition;
use crate::fragment::BiomeFragment;
use crate::generator::{derive_generator_seed, Generator, GeneratorRegistry};
use crate::grid;
use crate::hash::mix_position_seed;
use crate::surface::{self, SurfaceCollaborator};

/// World-seed-scoped state for the cave biome map: the generator pipeline
/// (priority-sorted, already `init`-ed), the biome palette, and the
/// fragment cache they share.
///
/// Constructed once at world start via [`CaveBiomeService::init`] and torn
/// down once at world stop via [`CaveBiomeService::deinit`]; every
/// [`crate::view::CaveBiomeMapView`] for that world borrows it.
pub struct CaveBiomeService {
    cache: FragmentCache,
    registry: BiomeRegistry,
    generators: Vec<Box<dyn Generator>>,
    world_seed: u64,
}

impl CaveBiomeService {
    /// Builds the service: runs every registered generator's `init` (via
    /// [`GeneratorRegistry::build_profile_list`]) and starts with an empty
    /// cache.
    pub fn init(
        world_seed: u64,
        registry: BiomeRegistry,
        generators: GeneratorRegistry,
        settings: &crate::config::GeneratorSettings,
    ) -> Self {
        let generators = generators.build_profile_list(settings);
        tracing::info!(world_seed, generator_count = generators.len(), "cave biome service initialized");
        Self {
            cache: FragmentCache::new(),
            registry,
            generators,
            world_seed,
        }
    }

    /// Clears the fragment cache (releasing its reference to every cached
    /// fragment) and calls `deinit` on every generator. Fragments still
    /// referenced by a live view are destroyed when that view's last
    /// reference is released, not here.
    pub fn deinit(mut self) {
        tracing::debug!(cached_fragments = self.cache.len(), "tearing down cave biome service");
        self.cache.clear();
        for generator in &mut self.generators {
            generator.deinit();
        }
    }

    /// The world seed this service was initialized with.
    pub fn world_seed(&self) -> u64 {
        self.world_seed
    }

    /// The biome palette backing this service.
    pub fn registry(&self) -> &BiomeRegistry {
        &self.registry
    }

    /// The shared fragment cache.
    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    fn produce_fragment(&self, pos: FragmentPosition) -> Arc<BiomeFragment> {
        let mut fragment = BiomeFragment::new(pos);
        for generator in &self.generators {
            let seed = derive_generator_seed(self.world_seed, generator.as_ref());
            generator.generate(&mut fragment, seed);
        }
        fragment.init_owning_reference();
        Arc::new(fragment)
    }

    /// Looks up (or generates) the fragment covering rotated-space position
    /// `pos`, with the caller's own reference already acquired.
    pub fn fragment_at(&self, pos: FragmentPosition) -> Arc<BiomeFragment> {
        self.cache.find_or_create(pos, |p| self.produce_fragment(p))
    }

    /// `getRoughBiome` (spec.md §4.10): the biome at world point `w`,
    /// optionally hashed into a deterministic per-query seed, without the
    /// bookkeeping a full [`crate::view::CaveBiomeMapView`] carries (no
    /// margin, no multi-fragment array, no cached z-perturbation).
    pub fn get_rough_biome<S: SurfaceCollaborator>(
        &self,
        surface: &S,
        w: IVec3,
        voxel_size: f32,
        want_seed: bool,
    ) -> (BiomeId, Option<u64>) {
        let tile = surface.get_or_generate_fragment_and_increase_ref_count(w.x, w.y, voxel_size);
        if let Some(biome) = surface::surface_override_single(tile.as_ref(), w.x, w.y, w.z, voxel_size) {
            let seed = want_seed.then(|| mix_position_seed(self.world_seed, w, 2));
            return (biome, seed);
        }

        let gp = grid::grid_select(crate::rotation::rotate(w));
        let frag_pos = FragmentPosition::containing(gp.g, voxel_size);
        let frag = self.fragment_at(frag_pos);
        let biome = frag
            .cell_biome(gp.g, gp.layer.index())
            .expect("fragment cell was never generated");
        let _ = frag.release();
        let seed = want_seed.then(|| mix_position_seed(self.world_seed, gp.g, gp.layer.index()));
        (biome, seed)
    }

    /// `getRoughBiomeAndHeight` (spec.md §4.10): as [`Self::get_rough_biome`],
    /// plus the vertical-extent run length along the world z-axis.
    pub fn get_rough_biome_and_height<S: SurfaceCollaborator>(
        &self,
        surface: &S,
        w: IVec3,
        voxel_size: f32,
        want_seed: bool,
        return_height: f32,
    ) -> (BiomeId, Option<u64>, f32) {
        let tile = surface.get_or_generate_fragment_and_increase_ref_count(w.x, w.y, voxel_size);
        let (override_biome, clamped_height) =
            surface::surface_override_single_with_height(tile.as_ref(), w.x, w.y, w.z, voxel_size, return_height);
        if let Some(biome) = override_biome {
            let seed = want_seed.then(|| mix_position_seed(self.world_seed, w, 2));
            return (biome, seed, clamped_height);
        }

        let (gp, height) = grid::grid_point_and_height(w, voxel_size, return_height);
        let frag_pos = FragmentPosition::containing(gp.g, voxel_size);
        let frag = self.fragment_at(frag_pos);
        let biome = frag
            .cell_biome(gp.g, gp.layer.index())
            .expect("fragment cell was never generated");
        let _ = frag.release();
        let seed = want_seed.then(|| mix_position_seed(self.world_seed, gp.g, gp.layer.index()));
        (biome, seed, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::{BiomeDefinition, BiomeField};
    use crate::config::GeneratorSettings;
    use crate::generator::reference::CheckerboardGenerator;
    use crate::surface::testing::{AlwaysAboveBandSurface, FlatSurfaceCollaborator};

    fn service(world_seed: u64) -> CaveBiomeService {
        let mut registry = BiomeRegistry::default();
        for i in 0..4u32 {
            registry
                .push_object(BiomeDefinition::new(
                    "cave",
                    &format!("b{i}"),
                    &[(BiomeField::Roughness, 1.0)],
                ))
                .unwrap();
        }
        let mut generators = GeneratorRegistry::new();
        generators.register(Box::new(CheckerboardGenerator::new(4))).unwrap();
        CaveBiomeService::init(world_seed, registry, generators, &GeneratorSettings::new())
    }

    #[test]
    fn get_rough_biome_is_deterministic_across_calls() {
        let svc = service(12345);
        let surface = FlatSurfaceCollaborator::new(AlwaysAboveBandSurface);
        let (b1, s1) = svc.get_rough_biome(&surface, IVec3::new(64, 64, 64), 1.0, true);
        let (b2, s2) = svc.get_rough_biome(&surface, IVec3::new(64, 64, 64), 1.0, true);
        assert_eq!(b1, b2);
        assert_eq!(s1, s2);
    }

    #[test]
    fn get_rough_biome_at_origin_returns_stable_biome() {
        let svc = service(12345);
        let surface = FlatSurfaceCollaborator::new(AlwaysAboveBandSurface);
        let (_biome, seed) = svc.get_rough_biome(&surface, IVec3::new(0, 0, 0), 1.0, true);
        assert!(seed.is_some());
    }
}
