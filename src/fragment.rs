//! Immutable, reference-counted cubic regions of the rotated lattice.

use std::sync::atomic::{AtomicI64, Ordering};

use bevy_math::IVec3;

use crate::biome::BiomeId;
use crate::coordinates::{cell_index, FragmentPosition, CELLS_PER_FRAG_CUBED};

/// One cell's biome assignment, one entry per sub-lattice layer.
pub type CellBiomes = [Option<BiomeId>; 2];

/// A cubic, [`crate::coordinates::FRAG_SIZE`]-wide region of rotated space,
/// holding two parallel grids of biome references (one per sub-lattice
/// layer). Shared between the [`crate::cache::FragmentCache`] and every
/// live [`crate::view::CaveBiomeMapView`] that references it via an atomic
/// refcount.
///
/// Fragments are immutable after generation: once a generator has filled
/// `cells`, nothing in this crate mutates it again.
pub struct BiomeFragment {
    /// Where in rotated space this fragment sits.
    pub pos: FragmentPosition,
    cells: Box<[CellBiomes; CELLS_PER_FRAG_CUBED]>,
    ref_count: AtomicI64,
}

impl BiomeFragment {
    /// Allocates a fragment with `ref_count == 0` and every cell unset.
    /// Callers must run generators over it (via
    /// [`crate::generator::GeneratorRegistry`]) before handing out any
    /// reference to it (an ungenerated fragment is not a valid value to
    /// share).
    pub fn new(pos: FragmentPosition) -> Self {
        Self {
            pos,
            cells: Box::new([[None, None]; CELLS_PER_FRAG_CUBED]),
            ref_count: AtomicI64::new(0),
        }
    }

    /// Current refcount, for diagnostics and tests. Not meaningful for
    /// synchronization on its own.
    pub fn ref_count(&self) -> i64 {
        self.ref_count.load(Ordering::Relaxed)
    }

    /// Atomically increments the refcount. Precondition: the prior value
    /// must be `>= 1` (acquiring a reference to something with zero
    /// outstanding references is a use-after-free).
    pub fn acquire(&self) {
        let prev = self.ref_count.fetch_add(1, Ordering::Relaxed);
        debug_assert!(prev >= 1, "acquired a fragment with ref_count {prev}");
    }

    /// Atomically decrements the refcount. `Arc` is the actual owner of
    /// this fragment's memory; this counter exists so the acquire/release
    /// protocol can be asserted on independently, and every caller that
    /// drops an owned `Arc<BiomeFragment>` must call this first so the two
    /// stay in lockstep. A `true` result means this was the last reference
    /// (the paired `Arc` drop should be its last one too).
    #[must_use = "a `true` result means the caller must drop this fragment's last reference"]
    pub fn release(&self) -> bool {
        let prev = self.ref_count.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev >= 1, "released a fragment with ref_count {prev}");
        prev == 1
    }

    /// Sets the refcount to exactly `1`, representing the cache's own
    /// reference. Used once, right after a producer finishes generating a
    /// fresh fragment.
    pub(crate) fn init_owning_reference(&self) {
        self.ref_count.store(1, Ordering::Relaxed);
    }

    /// Writes a biome into a cell, given rotated-space coordinates inside
    /// this fragment. Only ever called by generators, before the fragment
    /// becomes visible to any cache or view.
    pub fn set_cell(&mut self, rotated: IVec3, layer: usize, biome: BiomeId) {
        let idx = cell_index(self.pos.origin, rotated);
        self.cells[idx][layer] = Some(biome);
    }

    /// Reads the biome at the given rotated-space coordinates and layer.
    /// `None` means no generator ever assigned this cell, which is a bug in
    /// the generator pipeline (every cell must be covered by at least one
    /// generator) rather than a normal "no biome" outcome.
    pub fn cell_biome(&self, rotated: IVec3, layer: usize) -> Option<BiomeId> {
        let idx = cell_index(self.pos.origin, rotated);
        self.cells[idx][layer]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryId;
    use std::num::NonZeroU32;

    fn pos() -> FragmentPosition {
        FragmentPosition::containing(IVec3::ZERO, 1.0)
    }

    #[test]
    fn acquire_release_tracks_refcount() {
        let frag = BiomeFragment::new(pos());
        frag.init_owning_reference();
        assert_eq!(frag.ref_count(), 1);
        frag.acquire();
        assert_eq!(frag.ref_count(), 2);
        assert!(!frag.release());
        assert_eq!(frag.ref_count(), 1);
        assert!(frag.release());
        assert_eq!(frag.ref_count(), 0);
    }

    #[test]
    fn set_and_get_cell_round_trips() {
        let mut frag = BiomeFragment::new(pos());
        let biome = RegistryId(NonZeroU32::new(7).unwrap());
        frag.set_cell(IVec3::new(130, 5, 900), 1, biome);
        assert_eq!(frag.cell_biome(IVec3::new(130, 5, 900), 1), Some(biome));
        assert_eq!(frag.cell_biome(IVec3::new(130, 5, 900), 0), None);
    }
}
