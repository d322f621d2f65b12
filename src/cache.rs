//! Set-associative, reference-counted fragment cache shared by every
//! concurrent querier.
//!
//! Keyed by [`FragmentPosition`], split into [`NUM_SETS`] independent
//! `Mutex`-guarded sets (matching `Mutex<HashMap<...>>` in
//! `gs_common::network::thread::NetworkThread`) rather than one global lock,
//! so unrelated fragments never contend. Each set holds up to [`WAYS`] slots
//! kept in MRU-first order; eviction is LRU-within-set. The refcount-aware
//! recheck-after-produce protocol this cache implements doesn't map onto a
//! generic `lru::LruCache`, so the set is hand-rolled instead.

use std::sync::{Arc, Mutex};

use crate::coordinates::FragmentPosition;
use crate::fragment::BiomeFragment;

/// Number of independent sets the cache is split into. A power of two so the
/// set index can be derived with a mask.
pub const NUM_SETS: usize = 256;
/// Maximum number of fragments held per set before the least-recently-used
/// slot is evicted.
pub const WAYS: usize = 8;

const _: () = assert!(NUM_SETS.is_power_of_two());

struct CacheSet {
    /// Slots in MRU-first order: `slots[0]` was used most recently.
    slots: Vec<(FragmentPosition, Arc<BiomeFragment>)>,
}

impl CacheSet {
    fn new() -> Self {
        Self {
            slots: Vec::with_capacity(WAYS),
        }
    }

    fn find(&mut self, pos: &FragmentPosition) -> Option<Arc<BiomeFragment>> {
        let idx = self.slots.iter().position(|(p, _)| p == pos)?;
        let entry = self.slots.remove(idx);
        let frag = Arc::clone(&entry.1);
        self.slots.insert(0, entry);
        Some(frag)
    }

    /// Inserts `frag` at the MRU position, evicting the LRU slot's own
    /// reference if the set is already full. Returns the fragment that
    /// should be handed to the caller: either `frag` itself, or a winner
    /// found by a racing insert that beat us to it.
    fn insert_or_use_racing_winner(&mut self, pos: FragmentPosition, frag: Arc<BiomeFragment>) -> Arc<BiomeFragment> {
        if let Some(winner) = self.find(&pos) {
            // Someone else's producer finished and got inserted first while
            // we were producing outside the lock. `frag` never made it into
            // a slot, so the cache's own reference it was holding (set by
            // `init_owning_reference`) is released before it's dropped.
            let _ = frag.release();
            return winner;
        }
        if self.slots.len() >= WAYS {
            // LRU slot: release the cache's reference before dropping it.
            if let Some((_, evicted)) = self.slots.pop() {
                let _ = evicted.release();
            }
        }
        self.slots.insert(0, (pos, Arc::clone(&frag)));
        frag
    }
}

/// A set-associative cache of immutable, reference-counted [`BiomeFragment`]s.
///
/// Every slot the cache holds accounts for exactly one reference via
/// [`BiomeFragment::acquire`]/[`BiomeFragment::release`]. `Arc` still owns
/// the fragment's actual memory (dropping the last clone frees it), but
/// every place a slot's `Arc` is cloned or dropped calls `acquire`/`release`
/// in lockstep, so the manual counter always reaches zero at the same
/// moment the last `Arc` does. Fragment production
/// (the `producer` closure passed to [`FragmentCache::find_or_create`])
/// always runs outside any set's lock, so one slow generator never blocks
/// lookups into unrelated sets, or even unrelated slots in the same set.
pub struct FragmentCache {
    sets: Vec<Mutex<CacheSet>>,
}

impl Default for FragmentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentCache {
    /// Constructs an empty cache with [`NUM_SETS`] sets.
    pub fn new() -> Self {
        Self {
            sets: (0..NUM_SETS).map(|_| Mutex::new(CacheSet::new())).collect(),
        }
    }

    fn set_index(pos: &FragmentPosition) -> usize {
        // FRAG_SIZE-aligned origins, divided down to per-fragment units
        // before hashing, so adjacent fragments spread across sets instead
        // of colliding on the low bits cleared by alignment.
        let ox = (pos.origin.x >> 11) as u32;
        let oy = (pos.origin.y >> 11) as u32;
        let oz = (pos.origin.z >> 11) as u32;
        let mixed = ox
            .wrapping_mul(0x9e3779b1)
            .wrapping_add(oy.wrapping_mul(0x85ebca6b))
            .wrapping_add(oz.wrapping_mul(0xc2b2ae35));
        (mixed as usize) & (NUM_SETS - 1)
    }

    /// Looks up `pos`, producing a fresh fragment via `producer` on a miss.
    ///
    /// On a hit, the found fragment is promoted to MRU within its set and
    /// returned with the caller's reference already acquired.
    ///
    /// On a miss, `producer(pos)` is called *outside* any lock to build a
    /// fully-generated fragment whose refcount is `1` (the cache's own
    /// reference; see [`BiomeFragment::init_owning_reference`]). The set
    /// lock is then taken to insert it; if a racing `find_or_create` for the
    /// same position already won, the freshly produced fragment is
    /// discarded (its sole reference, the cache's, is dropped) in favor of
    /// the winner. Either way, the caller's own reference is then acquired
    /// before returning.
    pub fn find_or_create(
        &self,
        pos: FragmentPosition,
        producer: impl FnOnce(FragmentPosition) -> Arc<BiomeFragment>,
    ) -> Arc<BiomeFragment> {
        let set = &self.sets[Self::set_index(&pos)];

        if let Some(frag) = set.lock().expect("fragment cache set mutex poisoned").find(&pos) {
            frag.acquire();
            return frag;
        }

        // Outside the lock: generation can be expensive and must not
        // serialize lookups into this set.
        let fresh = producer(pos);

        let frag = {
            let mut guard = set.lock().expect("fragment cache set mutex poisoned");
            guard.insert_or_use_racing_winner(pos, fresh)
        };
        frag.acquire();
        frag
    }

    /// Total number of fragments currently held across every set.
    pub fn len(&self) -> usize {
        self.sets
            .iter()
            .map(|s| s.lock().expect("fragment cache set mutex poisoned").slots.len())
            .sum()
    }

    /// `true` if the cache holds no fragments.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears every set, releasing the cache's own reference to every
    /// fragment it held. Fragments with no outside references are destroyed
    /// immediately; fragments still referenced by a live
    /// [`crate::view::CaveBiomeMapView`] are destroyed when that view's last
    /// reference is released.
    pub fn clear(&self) {
        for set in &self.sets {
            let mut guard = set.lock().expect("fragment cache set mutex poisoned");
            for (_, frag) in guard.slots.drain(..) {
                let _ = frag.release();
            }
        }
    }
}
