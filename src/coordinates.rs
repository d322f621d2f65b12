//! Constants and newtypes describing the rotated lattice's tiling into
//! fragments and cells.

use bevy_math::IVec3;

/// Side length of a [`crate::fragment::BiomeFragment`] in rotated space.
pub const FRAG_SIZE: i32 = 2048;
/// Side length of a lattice cell in rotated space.
pub const CELL_SIZE: i32 = 128;
/// Number of cells per fragment axis (`FRAG_SIZE / CELL_SIZE`).
pub const CELLS_PER_FRAG: i32 = FRAG_SIZE / CELL_SIZE;
/// Total number of cells in a fragment (`CELLS_PER_FRAG^3`).
pub const CELLS_PER_FRAG_CUBED: usize = (CELLS_PER_FRAG * CELLS_PER_FRAG * CELLS_PER_FRAG) as usize;

const _: () = assert!(CELLS_PER_FRAG == 16);
const _: () = assert!(CELLS_PER_FRAG_CUBED == 4096);

/// The two interleaved sub-lattices a world point's biome can be drawn from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Layer {
    /// Cell centers at `(k*128+64, l*128+64, m*128+64)`.
    Zero = 0,
    /// Cell centers at `(k*128, l*128, m*128)`.
    One = 1,
}

impl Layer {
    /// Converts to the `0`/`1` index used to index `cells[..][layer]`.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// The position of a [`crate::fragment::BiomeFragment`]: a rotated-space
/// coordinate aligned to [`FRAG_SIZE`] on each axis, plus the voxel size the
/// query that produced it was made at.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FragmentPosition {
    /// Rotated-space origin of the fragment (a multiple of [`FRAG_SIZE`] on
    /// every axis).
    pub origin: IVec3,
    /// Voxel size in world units, carried along for the vertical-extent
    /// binary search and surface-band checks.
    pub voxel_size: f32,
}

impl Eq for FragmentPosition {}

impl std::hash::Hash for FragmentPosition {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.origin.x.hash(state);
        self.origin.y.hash(state);
        self.origin.z.hash(state);
        self.voxel_size.to_bits().hash(state);
    }
}

impl FragmentPosition {
    /// Computes the fragment position covering the given rotated-space
    /// point, at the given voxel size.
    pub fn containing(rotated: IVec3, voxel_size: f32) -> Self {
        Self {
            origin: floor_to_multiple(rotated, FRAG_SIZE),
            voxel_size,
        }
    }
}

/// Floors every component of `v` down to the nearest (possibly negative)
/// multiple of `step`, which must be a power of two.
#[inline]
pub fn floor_to_multiple(v: IVec3, step: i32) -> IVec3 {
    debug_assert!(step.is_power_of_two());
    let mask = !(step - 1);
    IVec3::new(v.x & mask, v.y & mask, v.z & mask)
}

/// Converts a rotated-space point known to lie within a fragment at
/// `fragment_origin` into that fragment's flat cell index
/// (`(rx>>7)*G^2 + (ry>>7)*G + (rz>>7)`).
#[inline]
pub fn cell_index(fragment_origin: IVec3, point: IVec3) -> usize {
    let local = point - fragment_origin;
    debug_assert!(local.x >= 0 && local.x < FRAG_SIZE);
    debug_assert!(local.y >= 0 && local.y < FRAG_SIZE);
    debug_assert!(local.z >= 0 && local.z < FRAG_SIZE);
    let cx = (local.x >> 7) as usize;
    let cy = (local.y >> 7) as usize;
    let cz = (local.z >> 7) as usize;
    cx * (CELLS_PER_FRAG as usize) * (CELLS_PER_FRAG as usize) + cy * (CELLS_PER_FRAG as usize) + cz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_index_is_in_range() {
        for x in [0, 127, 128, 2047] {
            for y in [0, 127, 128, 2047] {
                for z in [0, 127, 128, 2047] {
                    let idx = cell_index(IVec3::ZERO, IVec3::new(x, y, z));
                    assert!(idx < CELLS_PER_FRAG_CUBED);
                }
            }
        }
    }

    #[test]
    fn floor_to_multiple_handles_negatives() {
        assert_eq!(floor_to_multiple(IVec3::new(-1, -2048, -2049), FRAG_SIZE), IVec3::new(-2048, -2048, -4096));
    }
}
