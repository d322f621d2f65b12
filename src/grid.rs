//! Sub-lattice and grid-cell selection: deciding which of the two
//! sub-lattices, and which of its cells, a rotated-space point falls in,
//! plus the vertical-extent search used to avoid redundant evaluation
//! along a world-space column.

use bevy_math::IVec3;

use crate::coordinates::{floor_to_multiple, Layer, CELL_SIZE};
use crate::rotation::{self, SHIFT};

/// The sub-lattice cell a world point resolves to: a grid point (used to
/// index a fragment's cells) and which layer it belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GridPoint {
    /// Rotated-space coordinate identifying the cell.
    pub g: IVec3,
    /// Which sub-lattice this cell belongs to.
    pub layer: Layer,
}

#[inline]
fn sign(n: i32) -> i32 {
    match n.cmp(&0) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
    }
}

/// Resolves a rotated-space coordinate to its `(grid point, layer)` pair.
///
/// The layer-1 region is a regular octahedron inscribed in the layer-0
/// cell (threshold `3*CELL_SIZE/4` on the L1 distance to the layer-0
/// center), which is what gives the dual-lattice boundaries their
/// quasi-hexagonal look. The threshold and the exact tie-break must be
/// preserved bit-for-bit or interpolation develops discontinuities.
pub fn grid_select(r: IVec3) -> GridPoint {
    let half = CELL_SIZE / 2; // 64
    let mut g = floor_to_multiple(r + IVec3::splat(half), CELL_SIZE);
    let dist = r - g;
    let tot = dist.x.abs() + dist.y.abs() + dist.z.abs();
    let layer = if tot > 3 * CELL_SIZE / 4 {
        g += IVec3::new(sign(dist.x), sign(dist.y), sign(dist.z)) * half;
        Layer::One
    } else {
        Layer::Zero
    };
    GridPoint { g, layer }
}

/// Nearest layer-1 lattice center to a rotated-space coordinate, used by
/// [`crate::interpolate`] as one of the four tetrahedron anchors.
#[inline]
pub fn layer1_nearest_center(r: IVec3) -> IVec3 {
    floor_to_multiple(r, CELL_SIZE)
}

/// Upper bound on how far a single sub-lattice cell can extend along the
/// world z-axis: the diameter of a cell (`CELL_SIZE * sqrt(5)/2`, the
/// longest diagonal a rotated axis-aligned cube can project to).
fn max_column_search_distance() -> f32 {
    (CELL_SIZE as f32 * 5f32.sqrt() / 2.0).ceil()
}

/// Finds `(grid point, layer)` at world point `w`, plus the largest
/// `h <= return_height` (a multiple of `voxel_size`) such that every point
/// `w + (0, 0, k*voxel_size)` with `0 <= k*voxel_size <= h` resolves to the
/// same cell.
///
/// Implemented as a binary search over the pre-rotated coordinate, stepping
/// `Δz` along the world z-axis by adding `Δz` times the z-column of the
/// rotation matrix before the final `>> SHIFT`, rather than re-deriving
/// the full rotation on every probe.
pub fn grid_point_and_height(w: IVec3, voxel_size: f32, return_height: f32) -> (GridPoint, f32) {
    debug_assert!(voxel_size > 0.0);
    let baseline = grid_select(rotation::rotate(w));

    let upper = return_height.min(max_column_search_distance()).max(0.0);
    let max_steps = (upper / voxel_size).floor() as i64;
    if max_steps <= 0 {
        return (baseline, 0.0);
    }

    let pre = rotation::pre_rotate(w);
    let col = rotation::r_col_z();

    let grid_at_step = |steps: i64| -> GridPoint {
        let dz = (steps as f32 * voxel_size).round() as i64;
        let r = IVec3::new(
            ((pre[0] + col[0] * dz) >> SHIFT) as i32,
            ((pre[1] + col[1] * dz) >> SHIFT) as i32,
            ((pre[2] + col[2] * dz) >> SHIFT) as i32,
        );
        grid_select(r)
    };

    let mut lo: i64 = 0;
    let mut hi: i64 = max_steps;
    if grid_at_step(hi) == baseline {
        lo = hi;
    } else {
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if grid_at_step(mid) == baseline {
                lo = mid;
            } else {
                hi = mid;
            }
        }
    }

    (baseline, lo as f32 * voxel_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_select_is_piecewise_constant_near_origin() {
        let a = grid_select(rotation::rotate(IVec3::new(0, 0, 0)));
        let b = grid_select(rotation::rotate(IVec3::new(1, 0, 0)));
        // Not asserting equality (rotation mixes axes so a 1-voxel step can
        // cross a cell boundary near certain points), just that the
        // function is total and doesn't panic across a neighborhood.
        let _ = (a, b);
    }

    #[test]
    fn vertical_extent_never_exceeds_return_height() {
        let w = IVec3::new(1000, 1000, 0);
        let (_, h) = grid_point_and_height(w, 1.0, 1000.0);
        assert!(h >= 0.0 && h <= 1000.0);
    }

    #[test]
    fn vertical_extent_reports_consistent_biome_along_column() {
        let w = IVec3::new(1000, 1000, 0);
        let voxel_size = 1.0;
        let (baseline, h) = grid_point_and_height(w, voxel_size, 1000.0);
        assert!(h > 0.0, "expected a positive run length near the cell center");
        let steps = (h / voxel_size) as i32;
        for k in 0..=steps {
            let probe = IVec3::new(w.x, w.y, w.z + k);
            let got = grid_select(rotation::rotate(probe));
            assert_eq!(got, baseline, "mismatch at k={k}");
        }
    }
}
