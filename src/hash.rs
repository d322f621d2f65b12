//! A deterministic 64-bit mixer used to derive per-query seeds.
//!
//! The specification flags its own reference mixer as provisional and
//! explicitly allows substituting "any deterministic strong 64-bit mixer".
//! This one folds the grid point, layer, and world seed into a single
//! combined seed and runs it through `rand_xoshiro`'s `SplitMix64`, the same
//! generator used elsewhere in the engine to derive per-octave noise seeds
//! from a single source seed.

use bevy_math::IVec3;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::SplitMix64;

/// Mixes a rotated-space grid point, its layer, and the world seed into a
/// single deterministic 64-bit value, for use as
/// `CaveBiomeMapView::getBiomeAndSeed`'s output seed.
pub fn mix_position_seed(world_seed: u64, grid_point: IVec3, layer: usize) -> u64 {
    let combined = world_seed
        ^ (grid_point.x as u32 as u64)
        ^ ((grid_point.y as u32 as u64).rotate_left(21))
        ^ ((grid_point.z as u32 as u64).rotate_left(42))
        ^ (layer as u64).rotate_left(11);
    SplitMix64::seed_from_u64(combined).next_u64()
}
