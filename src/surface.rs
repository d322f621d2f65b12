//! Surface/heightmap collaborator boundary and the surface-override rule.
//!
//! The surface/heightmap subsystem itself is out of scope (spec.md §1); this
//! module only defines the small interface the cave-biome core needs from
//! it, plus the band-check logic that decides when a surface biome should
//! replace a cave biome near the ground (spec.md §4.8).

use std::sync::Arc;

use crate::biome::BiomeId;

/// A single surface tile, as the cave-biome core needs it.
pub trait SurfaceFragmentHandle: Send + Sync {
    /// World-space `(x, y)` origin of this tile (its lower corner).
    fn origin(&self) -> (i32, i32);
    /// Terrain height at `(wx, wy)`, which must fall within this tile.
    fn get_height(&self, wx: i32, wy: i32) -> i32;
    /// Surface biome at `(wx, wy)`, which must fall within this tile.
    fn get_biome(&self, wx: i32, wy: i32) -> BiomeId;
}

/// The surface/heightmap subsystem, as the cave-biome core consumes it.
pub trait SurfaceCollaborator: Send + Sync {
    /// Concrete tile type this collaborator hands out.
    type Fragment: SurfaceFragmentHandle;

    /// World-space span of a single surface tile.
    const MAP_SIZE: i32;

    /// Returns (generating if necessary) the surface tile covering
    /// `(wx, wy)` at the given voxel size, with the caller's reference
    /// already accounted for. Rust's ownership makes an explicit `release`
    /// unnecessary: dropping the returned `Arc` releases the reference.
    fn get_or_generate_fragment_and_increase_ref_count(
        &self,
        wx: i32,
        wy: i32,
        voxel_size: f32,
    ) -> Arc<Self::Fragment>;
}

/// The four surface tiles (2x2 in x, y) covering a chunk's footprint, held
/// by a [`crate::view::CaveBiomeMapView`] for the lifetime of the view.
pub struct SurfaceQuad<F> {
    /// The four tiles, indexed `(dx << 1) | dy` relative to tile 0's
    /// origin.
    pub fragments: [Arc<F>; 4],
}

impl<F: SurfaceFragmentHandle> SurfaceQuad<F> {
    /// Picks the tile of the quad containing `(wx, wy)`, comparing against
    /// tile 0's origin and `map_size` to decide which half of the quad each
    /// axis falls in.
    pub fn fragment_for(&self, wx: i32, wy: i32, map_size: i32) -> &Arc<F> {
        let (ox, oy) = self.fragments[0].origin();
        let dx = usize::from(wx >= ox + map_size);
        let dy = usize::from(wy >= oy + map_size);
        &self.fragments[(dx << 1) | dy]
    }
}

/// Vertical extent below the surface height the surface biome still
/// applies, in multiples of voxel size (spec.md §4.8).
pub const SURFACE_BAND_BELOW_CELLS: f32 = 32.0;
/// Fixed vertical extent above the surface height, before the
/// voxel-size-scaled margin, that the surface biome still applies.
pub const SURFACE_BAND_ABOVE_OFFSET: f32 = 128.0;

/// The `[lower, upper]` world-z band around `surface_height` within which
/// the surface biome overrides the cave biome.
#[inline]
pub fn surface_band(surface_height: i32, voxel_size: f32) -> (f32, f32) {
    let lower = surface_height as f32 - SURFACE_BAND_BELOW_CELLS * voxel_size;
    let upper = surface_height as f32 + SURFACE_BAND_ABOVE_OFFSET + voxel_size;
    (lower, upper)
}

/// Returns the surface biome at `(wx, wy, wz)` if it falls within the
/// surface band, `None` otherwise (meaning the cave biome map should be
/// consulted instead).
pub fn surface_override<F: SurfaceFragmentHandle>(
    quad: &SurfaceQuad<F>,
    map_size: i32,
    wx: i32,
    wy: i32,
    wz: i32,
    voxel_size: f32,
) -> Option<BiomeId> {
    let frag = quad.fragment_for(wx, wy, map_size);
    let (lower, upper) = surface_band(frag.get_height(wx, wy), voxel_size);
    let wzf = wz as f32;
    (wzf >= lower && wzf <= upper).then(|| frag.get_biome(wx, wy))
}

/// Height-returning variant of [`surface_override`]: in addition to the
/// override decision, clamps `return_height` to the distance from `wz` up
/// to the nearest exit from the surface band.
pub fn surface_override_with_height<F: SurfaceFragmentHandle>(
    quad: &SurfaceQuad<F>,
    map_size: i32,
    wx: i32,
    wy: i32,
    wz: i32,
    voxel_size: f32,
    return_height: f32,
) -> (Option<BiomeId>, f32) {
    let frag = quad.fragment_for(wx, wy, map_size);
    let (lower, upper) = surface_band(frag.get_height(wx, wy), voxel_size);
    let wzf = wz as f32;
    if wzf >= lower && wzf <= upper {
        let distance_to_exit = (upper - wzf).max(0.0);
        (Some(frag.get_biome(wx, wy)), return_height.min(distance_to_exit))
    } else {
        (None, return_height)
    }
}

/// Single-tile variant of [`surface_override`], used by
/// [`crate::service::CaveBiomeService::get_rough_biome`] where there's no
/// 2x2 quad to pick from, just the one tile covering the query point.
pub fn surface_override_single<F: SurfaceFragmentHandle>(
    tile: &F,
    wx: i32,
    wy: i32,
    wz: i32,
    voxel_size: f32,
) -> Option<BiomeId> {
    let (lower, upper) = surface_band(tile.get_height(wx, wy), voxel_size);
    let wzf = wz as f32;
    (wzf >= lower && wzf <= upper).then(|| tile.get_biome(wx, wy))
}

/// Single-tile, height-returning variant, used by
/// [`crate::service::CaveBiomeService::get_rough_biome_and_height`].
pub fn surface_override_single_with_height<F: SurfaceFragmentHandle>(
    tile: &F,
    wx: i32,
    wy: i32,
    wz: i32,
    voxel_size: f32,
    return_height: f32,
) -> (Option<BiomeId>, f32) {
    let (lower, upper) = surface_band(tile.get_height(wx, wy), voxel_size);
    let wzf = wz as f32;
    if wzf >= lower && wzf <= upper {
        let distance_to_exit = (upper - wzf).max(0.0);
        (Some(tile.get_biome(wx, wy)), return_height.min(distance_to_exit))
    } else {
        (None, return_height)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::num::NonZeroU32;

    /// A fake surface tile with a constant height and biome, for tests.
    pub struct FlatSurfaceFragment {
        pub origin: (i32, i32),
        pub height: i32,
        pub biome: BiomeId,
    }

    impl SurfaceFragmentHandle for FlatSurfaceFragment {
        fn origin(&self) -> (i32, i32) {
            self.origin
        }
        fn get_height(&self, _wx: i32, _wy: i32) -> i32 {
            self.height
        }
        fn get_biome(&self, _wx: i32, _wy: i32) -> BiomeId {
            self.biome
        }
    }

    /// A fake [`SurfaceFragmentHandle`] whose band never covers any query
    /// (height pinned far below any plausible query z), so every query
    /// falls through to the cave biome map. Used by tests that only care
    /// about cave-biome behavior and want the surface override to be a
    /// reliable no-op.
    pub struct AlwaysAboveBandSurface;

    impl SurfaceFragmentHandle for AlwaysAboveBandSurface {
        fn origin(&self) -> (i32, i32) {
            (i32::MIN / 2, i32::MIN / 2)
        }
        fn get_height(&self, _wx: i32, _wy: i32) -> i32 {
            i32::MIN / 2
        }
        fn get_biome(&self, _wx: i32, _wy: i32) -> BiomeId {
            BiomeId(NonZeroU32::new(u32::MAX).unwrap())
        }
    }

    /// A [`SurfaceCollaborator`] that always hands out clones of the same
    /// tile, for tests that don't exercise real surface-tile generation.
    pub struct FlatSurfaceCollaborator<F> {
        tile: Arc<F>,
    }

    impl<F> FlatSurfaceCollaborator<F> {
        pub fn new(tile: F) -> Self {
            Self { tile: Arc::new(tile) }
        }
    }

    impl<F: SurfaceFragmentHandle> SurfaceCollaborator for FlatSurfaceCollaborator<F> {
        type Fragment = F;
        const MAP_SIZE: i32 = 1 << 20;
        fn get_or_generate_fragment_and_increase_ref_count(
            &self,
            _wx: i32,
            _wy: i32,
            _voxel_size: f32,
        ) -> Arc<Self::Fragment> {
            Arc::clone(&self.tile)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FlatSurfaceFragment;
    use super::*;
    use std::num::NonZeroU32;

    fn biome(id: u32) -> BiomeId {
        BiomeId(NonZeroU32::new(id).unwrap())
    }

    fn quad(height: i32) -> SurfaceQuad<FlatSurfaceFragment> {
        SurfaceQuad {
            fragments: [
                Arc::new(FlatSurfaceFragment {
                    origin: (0, 0),
                    height,
                    biome: biome(1),
                }),
                Arc::new(FlatSurfaceFragment {
                    origin: (0, 256),
                    height,
                    biome: biome(2),
                }),
                Arc::new(FlatSurfaceFragment {
                    origin: (256, 0),
                    height,
                    biome: biome(3),
                }),
                Arc::new(FlatSurfaceFragment {
                    origin: (256, 256),
                    height,
                    biome: biome(4),
                }),
            ],
        }
    }

    #[test]
    fn returns_surface_biome_within_band() {
        let q = quad(64);
        let got = surface_override(&q, 256, 10, 10, 64, 1.0);
        assert_eq!(got, Some(biome(1)));
    }

    #[test]
    fn returns_none_outside_band() {
        let q = quad(64);
        let got = surface_override(&q, 256, 10, 10, 64 + 200, 1.0);
        assert_eq!(got, None);
    }

    #[test]
    fn picks_correct_quadrant() {
        let q = quad(0);
        assert_eq!(
            surface_override(&q, 256, 300, 300, 0, 1.0).map(|_| ()),
            Some(())
        );
        // (300, 300) should resolve to fragment index 3 (dx=1, dy=1).
        let frag = q.fragment_for(300, 300, 256);
        assert_eq!(frag.get_biome(300, 300), biome(4));
    }
}
