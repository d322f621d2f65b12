//! The query façade bound to a chunk-sized region: [`CaveBiomeMapView`].
//!
//! A view owns references to every fragment (cave and surface) it might
//! need to answer queries over its region, acquired once at construction
//! and released once at tear-down (spec.md §4.9).

use std::sync::Arc;

use bevy_math::IVec3;

use crate::biome::{BiomeField, BiomeId};
use crate::coordinates::{floor_to_multiple, Layer, FRAG_SIZE};
use crate::fragment::BiomeFragment;
use crate::grid::{self, GridPoint};
use crate::hash::mix_position_seed;
use crate::interpolate::{self, BulkMode};
use crate::noise::{self, FractalNoise, NoiseSource};
use crate::rotation;
use crate::service::CaveBiomeService;
use crate::surface::{self, SurfaceCollaborator, SurfaceQuad};

/// Margin, in world units, a view's fragment coverage extends beyond
/// `[pos, pos+width)` on every axis. Queries outside
/// `[-margin, width+margin)` relative to `pos` are an invariant violation
/// (spec.md §7).
pub const QUERY_MARGIN: i32 = 32;

fn max_rotation_component() -> i32 {
    let r = rotation::rotate(IVec3::splat(1024));
    r.x.unsigned_abs().max(r.y.unsigned_abs()).max(r.z.unsigned_abs()) as i32
}

/// Number of fragments per axis a view must hold to cover `width` world
/// units of chunk span plus `margin` of slack, given that rotation can skew
/// the query region's bounding box in rotated space (spec.md §4.9).
pub fn fragment_span(width: i32, margin: i32) -> i32 {
    let k = max_rotation_component() as i64;
    let numerator = (width as i64 + margin as i64 + FRAG_SIZE as i64) * k;
    let denominator = 1024 * FRAG_SIZE as i64;
    1 + numerator.div_ceil(denominator) as i32
}

/// A transient, chunk-scale query interface over the rotated-lattice cave
/// biome map: [`InterpolatableView`] / `CaveBiomeMapView` from spec.md §3.
///
/// Holds one acquired reference (via [`BiomeFragment::acquire`]) per
/// fragment in its coverage cube, plus the four surface tiles covering its
/// footprint; both are released on drop.
pub struct CaveBiomeMapView<'svc, S: SurfaceCollaborator> {
    service: &'svc CaveBiomeService,
    pos: IVec3,
    width: i32,
    voxel_size: f32,
    frag_origin: IVec3,
    frag_count: i32,
    fragments: Vec<Arc<BiomeFragment>>,
    surface: SurfaceQuad<S::Fragment>,
    z_perturbation: Option<FractalNoise>,
}

impl<'svc, S: SurfaceCollaborator> CaveBiomeMapView<'svc, S> {
    /// Constructs a view covering `[pos, pos+width)` (plus
    /// [`QUERY_MARGIN`]) at `voxel_size`, acquiring every fragment its
    /// coverage cube needs from `service`'s cache and every surface tile
    /// its footprint touches from `surface`.
    pub fn new(service: &'svc CaveBiomeService, surface: &S, pos: IVec3, width: i32, voxel_size: f32) -> Self {
        debug_assert!(width > 0);
        debug_assert!(voxel_size > 0.0);

        let frag_count = fragment_span(width, QUERY_MARGIN);
        let half_span = (frag_count * FRAG_SIZE) / 2;
        let rotated_center = rotation::rotate(pos + IVec3::splat(width / 2));
        let frag_origin = floor_to_multiple(rotated_center - IVec3::splat(half_span), FRAG_SIZE);

        let mut fragments = Vec::with_capacity((frag_count * frag_count * frag_count) as usize);
        for (fx, fy, fz) in itertools::iproduct!(0..frag_count, 0..frag_count, 0..frag_count) {
            let origin = frag_origin + IVec3::new(fx, fy, fz) * FRAG_SIZE;
            let frag_pos = crate::coordinates::FragmentPosition { origin, voxel_size };
            fragments.push(service.fragment_at(frag_pos));
        }

        let surface_quad = SurfaceQuad {
            fragments: [
                surface.get_or_generate_fragment_and_increase_ref_count(pos.x, pos.y, voxel_size),
                surface.get_or_generate_fragment_and_increase_ref_count(pos.x, pos.y + width, voxel_size),
                surface.get_or_generate_fragment_and_increase_ref_count(pos.x + width, pos.y, voxel_size),
                surface.get_or_generate_fragment_and_increase_ref_count(pos.x + width, pos.y + width, voxel_size),
            ],
        };

        let z_perturbation = noise::z_perturbation_active(voxel_size).then(|| {
            FractalNoise::new(
                pos.x as f32,
                pos.y as f32,
                voxel_size,
                width as f32,
                service.world_seed() ^ noise::Z_PERTURBATION_SEED_XOR,
                noise::Z_PERTURBATION_PERIOD,
            )
        });

        Self {
            service,
            pos,
            width,
            voxel_size,
            frag_origin,
            frag_count,
            fragments,
            surface: surface_quad,
            z_perturbation,
        }
    }

    fn assert_in_bounds(&self, rel: IVec3) {
        let lo = -QUERY_MARGIN;
        let hi = self.width + QUERY_MARGIN;
        debug_assert!(
            rel.x >= lo && rel.x < hi && rel.y >= lo && rel.y < hi && rel.z >= lo && rel.z < hi,
            "query {rel:?} out of view bounds [{lo}, {hi})"
        );
    }

    fn world_point(&self, rel: IVec3) -> IVec3 {
        self.pos + rel * (self.voxel_size as i32).max(1)
    }

    fn perturbed_z(&self, w: IVec3) -> i32 {
        match &self.z_perturbation {
            Some(noise) => {
                let offset = noise.get_value(w.x as f32, w.y as f32);
                w.z + offset.round() as i32
            }
            None => w.z,
        }
    }

    fn fragment_for_rotated(&self, r: IVec3) -> &Arc<BiomeFragment> {
        let frag_aligned = floor_to_multiple(r, FRAG_SIZE) - self.frag_origin;
        let fx = frag_aligned.x / FRAG_SIZE;
        let fy = frag_aligned.y / FRAG_SIZE;
        let fz = frag_aligned.z / FRAG_SIZE;
        debug_assert!(
            (0..self.frag_count).contains(&fx) && (0..self.frag_count).contains(&fy) && (0..self.frag_count).contains(&fz),
            "rotated point {r:?} outside this view's fragment coverage"
        );
        let idx = ((fx * self.frag_count + fy) * self.frag_count + fz) as usize;
        &self.fragments[idx]
    }

    fn cell_biome_at(&self, rotated: IVec3, layer: Layer) -> Option<BiomeId> {
        self.fragment_for_rotated(rotated).cell_biome(rotated, layer.index())
    }

    fn field_value_at(&self, rotated: IVec3, layer: Layer, field: BiomeField) -> f32 {
        match self
            .cell_biome_at(rotated, layer)
            .and_then(|id| self.service.registry().lookup_id_to_object(id))
        {
            Some(def) => def.field(field),
            None => 0.0,
        }
    }

    /// `getSurfaceHeight(wx, wy)`: terrain height at a world-space column,
    /// independent of the cave biome map.
    pub fn get_surface_height(&self, wx: i32, wy: i32) -> i32 {
        self.surface.fragment_for(wx, wy, S::MAP_SIZE).get_height(wx, wy)
    }

    fn resolve(&self, rel: IVec3) -> (GridPoint, IVec3) {
        let w = self.world_point(rel);
        let wz = self.perturbed_z(w);
        let probe = IVec3::new(w.x, w.y, wz);
        (grid::grid_select(rotation::rotate(probe)), w)
    }

    /// `getBiome(rx, ry, rz)`: the biome at the given view-relative
    /// coordinate, honoring the surface override.
    pub fn get_biome(&self, rel: IVec3) -> BiomeId {
        self.assert_in_bounds(rel);
        let w = self.world_point(rel);
        if let Some(biome) = surface::surface_override(&self.surface, S::MAP_SIZE, w.x, w.y, w.z, self.voxel_size) {
            return biome;
        }
        let (gp, _) = self.resolve(rel);
        self.cell_biome_at(gp.g, gp.layer).expect("fragment cell was never generated")
    }

    /// `getBiomeAndSeed`: as [`Self::get_biome`], plus a deterministic
    /// per-query seed derived from the resolved grid point.
    pub fn get_biome_and_seed(&self, rel: IVec3) -> (BiomeId, u64) {
        self.assert_in_bounds(rel);
        let w = self.world_point(rel);
        if let Some(biome) = surface::surface_override(&self.surface, S::MAP_SIZE, w.x, w.y, w.z, self.voxel_size) {
            let seed = mix_position_seed(self.service.world_seed(), w, 2);
            return (biome, seed);
        }
        let (gp, _) = self.resolve(rel);
        let biome = self.cell_biome_at(gp.g, gp.layer).expect("fragment cell was never generated");
        let seed = mix_position_seed(self.service.world_seed(), gp.g, gp.layer.index());
        (biome, seed)
    }

    /// `getBiomeColumnAndSeed`: as [`Self::get_biome_and_seed`], plus the
    /// vertical-extent run length along the world z-axis (spec.md §4.6),
    /// clamped to `return_height`.
    pub fn get_biome_column_and_seed(&self, rel: IVec3, return_height: f32) -> (BiomeId, u64, f32) {
        self.assert_in_bounds(rel);
        let w = self.world_point(rel);
        let (surface_biome, clamped_height) = surface::surface_override_with_height(
            &self.surface,
            S::MAP_SIZE,
            w.x,
            w.y,
            w.z,
            self.voxel_size,
            return_height,
        );
        if let Some(biome) = surface_biome {
            let seed = mix_position_seed(self.service.world_seed(), w, 2);
            return (biome, seed, clamped_height);
        }

        let wz = self.perturbed_z(w);
        let (gp, height) = grid::grid_point_and_height(IVec3::new(w.x, w.y, wz), self.voxel_size, return_height);
        let biome = self.cell_biome_at(gp.g, gp.layer).expect("fragment cell was never generated");
        let seed = mix_position_seed(self.service.world_seed(), gp.g, gp.layer.index());
        (biome, seed, height)
    }

    /// `interpolateValue(wx, wy, wz, field)`: tetrahedral barycentric
    /// interpolation of `field` at the given view-relative coordinate.
    pub fn interpolate_value(&self, rel: IVec3, field: BiomeField) -> f32 {
        self.assert_in_bounds(rel);
        let w = self.world_point(rel);
        interpolate::interpolate_value(w, |anchor, layer| self.field_value_at(anchor, layer, field))
    }

    /// `bulkInterpolateValue`: evaluates [`Self::interpolate_value`]'s field
    /// over a regular grid and combines the results into `out_grid`.
    pub fn bulk_interpolate_value(
        &self,
        field: BiomeField,
        origin_rel: IVec3,
        voxel_size: f32,
        dims: (usize, usize, usize),
        out_grid: &mut [f32],
        mode: BulkMode,
        scale: f32,
    ) {
        let origin_w = self.world_point(origin_rel);
        interpolate::bulk_interpolate(
            |anchor, layer| self.field_value_at(anchor, layer, field),
            origin_w,
            voxel_size,
            dims,
            out_grid,
            mode,
            scale,
        );
    }
}

impl<'svc, S: SurfaceCollaborator> Drop for CaveBiomeMapView<'svc, S> {
    fn drop(&mut self) {
        for fragment in &self.fragments {
            let _ = fragment.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::{BiomeDefinition, BiomeField, BiomeRegistry};
    use crate::config::GeneratorSettings;
    use crate::generator::reference::CheckerboardGenerator;
    use crate::generator::GeneratorRegistry;
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
    fn get_biome_is_deterministic_across_runs() {
        let svc = service(12345);
        let surface = FlatSurfaceCollaborator::new(AlwaysAboveBandSurface);
        let view = CaveBiomeMapView::new(&svc, &surface, IVec3::new(0, 0, 0), 64, 1.0);
        let a = view.get_biome(IVec3::new(0, 0, 0));
        let b = view.get_biome(IVec3::new(0, 0, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn column_height_reports_a_consistent_run() {
        let svc = service(12345);
        let surface = FlatSurfaceCollaborator::new(AlwaysAboveBandSurface);
        let view = CaveBiomeMapView::new(&svc, &surface, IVec3::new(0, 0, 0), 2048, 1.0);
        let rel = IVec3::new(1000, 1000, 0);
        let (baseline, _seed, h) = view.get_biome_column_and_seed(rel, 1000.0);
        assert!(h > 0.0);
        let steps = (h / 1.0) as i32;
        for k in 0..=steps {
            let probe = IVec3::new(rel.x, rel.y, rel.z + k);
            assert_eq!(view.get_biome(probe), baseline, "mismatch at k={k}");
        }
    }

    #[test]
    fn interpolate_constant_field_is_constant() {
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
        let svc = CaveBiomeService::init(7, registry, generators, &GeneratorSettings::new());
        let surface = FlatSurfaceCollaborator::new(AlwaysAboveBandSurface);
        let view = CaveBiomeMapView::new(&svc, &surface, IVec3::new(0, 0, 0), 64, 1.0);
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    let rel = IVec3::new(x * 16, y * 16, z * 16);
                    let value = view.interpolate_value(rel, BiomeField::Roughness);
                    assert!((value - 1.0).abs() < 1e-3, "got {value} at {rel:?}");
                }
            }
        }
    }

    #[test]
    fn overlapping_views_share_fragment_pointers() {
        let svc = service(999);
        let surface = FlatSurfaceCollaborator::new(AlwaysAboveBandSurface);
        let a = CaveBiomeMapView::new(&svc, &surface, IVec3::new(0, 0, 0), 256, 1.0);
        let b = CaveBiomeMapView::new(&svc, &surface, IVec3::new(32, 32, 32), 256, 1.0);
        assert!(Arc::ptr_eq(&a.fragments[0], &b.fragments[0]) || a.fragments.iter().any(|fa| b.fragments.iter().any(|fb| Arc::ptr_eq(fa, fb))));
    }
}
