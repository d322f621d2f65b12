//! Fixed-point rotation of world coordinates into the rotated lattice space
//! the rest of this crate operates in.
//!
//! Floating-point rotation is deliberately not used: cell boundaries must be
//! bit-identical across platforms and over time, which fixed-point integer
//! arithmetic guarantees and floating point does not.

use bevy_math::IVec3;

/// Fixed-point shift amount; all rotation matrix entries are pre-scaled by
/// `2^SHIFT` and the dot product result is shifted back down by the same
/// amount.
pub const SHIFT: u32 = 30;

/// `floor(2^SHIFT / 25)`, the fixed-point unit used to build the rotation
/// matrix below. `25` is `5^2`, the squared norm of each of `R`'s rows,
/// chosen so the rows are exactly orthogonal in integer arithmetic.
const F: i64 = (1i64 << SHIFT) / 25;

/// The forward rotation matrix, pre-scaled by `2^SHIFT`. Its rows are
/// pairwise orthogonal by construction (`20*9 + 0*20 + 15*-12 == 0`, etc.),
/// which is what lets `rotate_inverse` use its exact transpose.
const R: [[i64; 3]; 3] = [
    [20 * F, 0 * F, 15 * F],
    [9 * F, 20 * F, -12 * F],
    [-12 * F, 15 * F, 16 * F],
];

/// Transpose of [`R`], used for the inverse rotation.
const RT: [[i64; 3]; 3] = [
    [R[0][0], R[1][0], R[2][0]],
    [R[0][1], R[1][1], R[2][1]],
    [R[0][2], R[1][2], R[2][2]],
];

#[inline]
fn apply(matrix: &[[i64; 3]; 3], v: IVec3) -> IVec3 {
    let vx = v.x as i64;
    let vy = v.y as i64;
    let vz = v.z as i64;
    let mut out = [0i32; 3];
    for (i, row) in matrix.iter().enumerate() {
        // Signed arithmetic shift right implements floor division by a
        // power of two, matching the specification's `floor(dot / 2^SHIFT)`.
        let dot = row[0] * vx + row[1] * vy + row[2] * vz;
        out[i] = (dot >> SHIFT) as i32;
    }
    IVec3::new(out[0], out[1], out[2])
}

/// Maps a world-space coordinate into rotated lattice space.
///
/// Exact inverse of [`rotate_inverse`] for any `v` whose rotated image fits
/// in `i32` (a precondition tied to world-size bounds, not checked here).
#[inline]
pub fn rotate(v: IVec3) -> IVec3 {
    apply(&R, v)
}

/// Maps a rotated lattice-space coordinate back into world space. Exact
/// inverse of [`rotate`].
#[inline]
pub fn rotate_inverse(v: IVec3) -> IVec3 {
    apply(&RT, v)
}

/// The column of `R` corresponding to the world z-axis: `R * (0,0,Δz)`
/// picks out this column scaled by `Δz`, which is what lets
/// [`crate::grid::grid_point_and_height`] advance the pre-rotated
/// coordinate by `Δz` without re-deriving the full rotation each step.
pub const fn r_col_z() -> [i64; 3] {
    [R[0][2], R[1][2], R[2][2]]
}

/// Applies the forward rotation matrix to a world-space coordinate, but
/// without the final `>> SHIFT`, for callers that need to accumulate
/// several `Δz` steps worth of precision before rounding once.
#[inline]
pub fn pre_rotate(v: IVec3) -> [i64; 3] {
    let vx = v.x as i64;
    let vy = v.y as i64;
    let vz = v.z as i64;
    let mut out = [0i64; 3];
    for (i, row) in R.iter().enumerate() {
        out[i] = row[0] * vx + row[1] * vy + row[2] * vz;
    }
    out
}
