//! The z-perturbation noise collaborator.
//!
//! The specification treats this as an opaque `float getValue(x, y)` (see
//! spec.md §6/§4.9); [`NoiseSource`] is that boundary, kept as a trait so
//! tests can supply a deterministic fake without depending on an actual
//! noise implementation. [`FractalNoise`] is the default adapter, built on
//! the same `noise` crate (`SuperSimplex`) the teacher uses for its own
//! terrain noise (`ocg_common::voxel::generator::CellGen`,
//! `ocg_schemas::voxel::biome::Noises`).

use noise::{NoiseFn, SuperSimplex};

/// A source of 2D noise sampled at world-space `(x, y)`, used to soften
/// cave-biome cell edges by perturbing the queried world `z` before grid
/// selection. Range and smoothness are up to the implementation; the core
/// only ever reads a single scalar per `(x, y)`.
pub trait NoiseSource: Send + Sync {
    /// Samples the noise field at world-space `(wx, wy)`.
    fn get_value(&self, wx: f32, wy: f32) -> f32;
}

/// Default [`NoiseSource`] implementation: a single-octave `SuperSimplex`
/// field sampled at `1/period` frequency.
///
/// `start_x`/`start_y`/`width` describe the region this instance is valid
/// for (matching the specification's `FractalNoise::new(startX, startY,
/// voxelSize, width, seed, period)` constructor); they aren't needed to
/// evaluate `get_value` itself but are kept so a caller can validate a
/// query falls within the region it was built for.
pub struct FractalNoise {
    start_x: f32,
    start_y: f32,
    voxel_size: f32,
    width: f32,
    period: f32,
    field: SuperSimplex,
}

impl FractalNoise {
    /// Builds a noise field covering `[start_x, start_x+width) x
    /// [start_y, start_y+width)` at the given `voxel_size`, seeded with
    /// `seed` and sampled with a spatial period of `period` world units.
    pub fn new(start_x: f32, start_y: f32, voxel_size: f32, width: f32, seed: u64, period: f32) -> Self {
        Self {
            start_x,
            start_y,
            voxel_size,
            width,
            period,
            field: SuperSimplex::new(seed as u32),
        }
    }

    /// The region this noise field was constructed to cover.
    pub fn region(&self) -> (f32, f32, f32, f32) {
        (self.start_x, self.start_y, self.width, self.voxel_size)
    }
}

impl NoiseSource for FractalNoise {
    fn get_value(&self, wx: f32, wy: f32) -> f32 {
        let nx = (wx / self.period) as f64;
        let ny = (wy / self.period) as f64;
        self.field.get([nx, ny]) as f32
    }
}

/// The seed XOR mask applied to the world seed to derive the
/// z-perturbation noise's own seed (spec.md §4.9).
pub const Z_PERTURBATION_SEED_XOR: u64 = 0x764923684396;
/// Spatial period (world units) the z-perturbation noise is sampled at.
pub const Z_PERTURBATION_PERIOD: f32 = 64.0;
/// Z-perturbation is only active below this voxel size.
pub const Z_PERTURBATION_MAX_VOXEL_SIZE: f32 = 8.0;

/// `true` if the z-perturbation noise should be consulted at this voxel
/// size, per spec.md §4.9 ("active only when voxelSize < 8").
#[inline]
pub fn z_perturbation_active(voxel_size: f32) -> bool {
    voxel_size < Z_PERTURBATION_MAX_VOXEL_SIZE
}

#[cfg(test)]
pub(crate) mod testing {
    use super::NoiseSource;

    /// A fake [`NoiseSource`] returning a constant value, for tests that
    /// need to pin down perturbation behavior without depending on real
    /// noise output.
    pub struct ConstantNoise(pub f32);

    impl NoiseSource for ConstantNoise {
        fn get_value(&self, _wx: f32, _wy: f32) -> f32 {
            self.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let noise = FractalNoise::new(0.0, 0.0, 1.0, 1024.0, 12345, 64.0);
        let a = noise.get_value(17.5, -33.0);
        let b = noise.get_value(17.5, -33.0);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = FractalNoise::new(0.0, 0.0, 1.0, 1024.0, 1, 64.0);
        let b = FractalNoise::new(0.0, 0.0, 1.0, 1024.0, 2, 64.0);
        assert_ne!(a.get_value(10.0, 10.0), b.get_value(10.0, 10.0));
    }

    #[test]
    fn voxel_size_threshold() {
        assert!(z_perturbation_active(1.0));
        assert!(z_perturbation_active(7.9));
        assert!(!z_perturbation_active(8.0));
        assert!(!z_perturbation_active(16.0));
    }
}
