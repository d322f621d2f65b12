//! Tetrahedral barycentric interpolation of scalar biome fields.
//!
//! From a world point, four lattice anchors are derived (two per
//! sub-lattice layer) and the point's field value is the barycentric
//! combination of the four anchors' values. The anchor and weight
//! derivation is pure integer/fixed-point arithmetic up to a single
//! floating-point division, so results are deterministic across platforms.

use bevy_math::IVec3;

use crate::coordinates::{floor_to_multiple, Layer, CELL_SIZE};
use crate::grid::layer1_nearest_center;
use crate::rotation;

/// The four lattice anchors a world point's interpolated value is drawn
/// from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Anchors {
    /// Second layer-1 anchor.
    pub r1: IVec3,
    /// Nearest layer-1 anchor.
    pub r2: IVec3,
    /// Second layer-0 anchor.
    pub r3: IVec3,
    /// Nearest layer-0 anchor.
    pub r4: IVec3,
}

/// Index (0=x, 1=y, 2=z) of the axis with the largest `|d|` component.
///
/// `strict` selects the tie-break rule: `true` (used for anchor 3, the
/// second layer-0 anchor) keeps the first axis seen on a tie; `false`
/// (anchor 1, the second layer-1 anchor) advances to later axes on a tie.
/// This asymmetry is deliberate: it prevents the two anchor pairs from
/// ever picking the same axis on a tie, which would degenerate the
/// tetrahedron.
fn argmax_abs(d: IVec3, strict: bool) -> usize {
    let abs = [d.x.abs(), d.y.abs(), d.z.abs()];
    let mut best = 0usize;
    for i in 1..3 {
        let better = if strict { abs[i] > abs[best] } else { abs[i] >= abs[best] };
        if better {
            best = i;
        }
    }
    best
}

fn axis_get(v: IVec3, axis: usize) -> i32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

fn axis_add(v: IVec3, axis: usize, delta: i32) -> IVec3 {
    match axis {
        0 => IVec3::new(v.x + delta, v.y, v.z),
        1 => IVec3::new(v.x, v.y + delta, v.z),
        _ => IVec3::new(v.x, v.y, v.z + delta),
    }
}

/// Derives the four tetrahedron anchors for rotated-space point `r`.
pub fn anchors_for(r: IVec3) -> Anchors {
    let half = CELL_SIZE / 2;
    let c0 = floor_to_multiple(r + IVec3::splat(half), CELL_SIZE);
    let d0 = r - c0;
    let axis0 = argmax_abs(d0, true);
    let sign0 = if axis_get(d0, axis0) >= 0 { CELL_SIZE } else { -CELL_SIZE };
    let r3 = axis_add(c0, axis0, sign0);

    let c1 = layer1_nearest_center(r);
    let d1 = r - c1;
    let axis1 = argmax_abs(d1, false);
    let sign1 = if axis_get(d1, axis1) >= 0 { CELL_SIZE } else { -CELL_SIZE };
    let r1 = axis_add(c1, axis1, sign1);

    Anchors { r1, r2: c1, r3, r4: c0 }
}

fn to_i64(v: IVec3) -> [i64; 3] {
    [v.x as i64, v.y as i64, v.z as i64]
}

fn cross(a: [i64; 3], b: [i64; 3]) -> [i64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [i64; 3], b: [i64; 3]) -> i64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// `det([a | b | c])` for a matrix whose columns are `a`, `b`, `c`, computed
/// exactly via the scalar triple product, entirely in `i64` (spacings
/// between anchors are at most `2*CELL_SIZE`, so this never overflows).
fn det3(a: [i64; 3], b: [i64; 3], c: [i64; 3]) -> i64 {
    dot(a, cross(b, c))
}

/// Barycentric weights `(λ1, λ2, λ3, λ4)` for rotated point `r` relative to
/// `anchors`. Always sums to exactly `1.0` by construction (`λ4` is the
/// complement of the other three); only strictly inside the anchors'
/// tetrahedron are all four guaranteed within `[0, 1]`.
pub fn barycentric_weights(r: IVec3, anchors: &Anchors) -> [f32; 4] {
    let c1 = to_i64(anchors.r1 - anchors.r4);
    let c2 = to_i64(anchors.r2 - anchors.r4);
    let c3 = to_i64(anchors.r3 - anchors.r4);
    let d = to_i64(r - anchors.r4);

    let det = det3(c1, c2, c3);
    debug_assert!(det != 0, "degenerate interpolation tetrahedron at {r:?}");
    let inv_det = 1.0f32 / (det as f32);

    let lambda1 = (det3(d, c2, c3) as f32) * inv_det;
    let lambda2 = (det3(c1, d, c3) as f32) * inv_det;
    let lambda3 = (det3(c1, c2, d) as f32) * inv_det;
    let lambda4 = 1.0 - lambda1 - lambda2 - lambda3;
    [lambda1, lambda2, lambda3, lambda4]
}

/// Interpolates a scalar biome field at world point `w`.
///
/// `field_at(rotated_anchor, layer)` must resolve the field value of
/// whatever biome occupies the cell containing `rotated_anchor` on the
/// given sub-lattice layer (callers, the [`crate::view`] façade, have the
/// fragment data needed to do that; this function only knows the lattice
/// geometry).
pub fn interpolate_value(w: IVec3, field_at: impl Fn(IVec3, Layer) -> f32) -> f32 {
    let r = rotation::rotate(w);
    let anchors = anchors_for(r);
    let [l1, l2, l3, l4] = barycentric_weights(r, &anchors);

    let b1 = field_at(anchors.r1, Layer::One);
    let b2 = field_at(anchors.r2, Layer::One);
    let b3 = field_at(anchors.r3, Layer::Zero);
    let b4 = field_at(anchors.r4, Layer::Zero);

    l1 * b1 + l2 * b2 + l3 * b3 + l4 * b4
}

/// How [`bulk_interpolate`] combines a freshly interpolated value with
/// whatever is already in the output grid. Only one mode exists today
/// (matching the specification's "mode set: initially only `addToMap`"),
/// kept as an enum so a future mode doesn't change the call signature.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BulkMode {
    /// `out[cell] += scale * interpolate_value(cell)`.
    AddToMap,
}

/// Evaluates [`interpolate_value`] on a regular `nx*ny*nz` grid starting at
/// `origin` with `voxel_size` spacing, combining each result into
/// `out_grid` (row-major, x-major: index `(ix*ny + iy)*nz + iz`) according
/// to `mode`.
pub fn bulk_interpolate(
    field_at: impl Fn(IVec3, Layer) -> f32 + Copy,
    origin: IVec3,
    voxel_size: f32,
    dims: (usize, usize, usize),
    out_grid: &mut [f32],
    mode: BulkMode,
    scale: f32,
) {
    let (nx, ny, nz) = dims;
    debug_assert_eq!(out_grid.len(), nx * ny * nz);
    for ix in 0..nx {
        let wx = origin.x + (ix as f32 * voxel_size).round() as i32;
        for iy in 0..ny {
            let wy = origin.y + (iy as f32 * voxel_size).round() as i32;
            for iz in 0..nz {
                let wz = origin.z + (iz as f32 * voxel_size).round() as i32;
                let value = interpolate_value(IVec3::new(wx, wy, wz), field_at);
                let idx = (ix * ny + iy) * nz + iz;
                match mode {
                    BulkMode::AddToMap => out_grid[idx] += scale * value,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        for w in [
            IVec3::new(0, 0, 0),
            IVec3::new(64, 64, 64),
            IVec3::new(-1000, 2000, 333),
            IVec3::new(17, -403, 8192),
        ] {
            let r = rotation::rotate(w);
            let anchors = anchors_for(r);
            let weights = barycentric_weights(r, &anchors);
            let sum: f32 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "weights {weights:?} summed to {sum}");
        }
    }

    #[test]
    fn constant_field_interpolates_to_the_constant() {
        for w in [
            IVec3::new(0, 0, 0),
            IVec3::new(500, -500, 12345),
            IVec3::new(1, 1, 1),
            IVec3::new(-64, 64, -64),
        ] {
            let value = interpolate_value(w, |_anchor, _layer| 1.0);
            assert!((value - 1.0).abs() < 1e-4, "got {value} at {w:?}");
        }
    }

    #[test]
    fn exact_at_nearest_layer0_anchor_with_matching_layer0_field() {
        // At r4 itself, d == 0, so lambda1=lambda2=lambda3=0 and lambda4=1:
        // the value must come entirely from the layer-0 anchor's field.
        let r = IVec3::new(64, 64, 64); // already a layer-0 center
        let anchors = anchors_for(r);
        assert_eq!(anchors.r4, r);
        let value = interpolate_value(rotation::rotate_inverse(r), |anchor, layer| {
            if anchor == r && layer == Layer::Zero {
                42.0
            } else {
                0.0
            }
        });
        assert!((value - 42.0).abs() < 1e-3, "got {value}");
    }

    #[test]
    fn anchor3_and_anchor1_axes_differ_on_a_tie() {
        // A point equidistant on two axes from its layer-0 center forces a
        // tie in argmax_abs; anchor3 (strict) must pick the earlier axis,
        // anchor1 (non-strict) the later one, when both distances tie.
        let d = IVec3::new(80, -80, 10);
        assert_eq!(argmax_abs(d, true), 0);
        assert_eq!(argmax_abs(d, false), 1);
    }
}
