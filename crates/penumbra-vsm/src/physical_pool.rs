//! Physical page pool.
//!
//! A fixed `N x N` grid of page slots, each `P x P` depth texels. Texels are
//! stored slot-major so every slot is one contiguous chunk; the render pass
//! hands disjoint chunks to parallel workers.

use glam::UVec2;
use penumbra_core::constants::PHYSICAL_CLEAR_DEPTH;
use penumbra_core::{PageKey, PhysicalSlot};
use rayon::prelude::*;

use crate::config::VsmConfig;

/// Fixed pool of physical depth pages with a free list and an owner table.
#[derive(Clone, Debug)]
pub struct PhysicalPagePool {
    slots_per_axis: u32,
    page_resolution: u32,
    texels: Vec<f32>,
    owners: Vec<Option<PageKey>>,
    /// Free slot indices; popped from the back.
    free: Vec<u32>,
}

impl PhysicalPagePool {
    /// Create a pool with every slot free and cleared.
    pub fn new(config: &VsmConfig) -> Self {
        let slots_per_axis = config.physical_pages_per_axis;
        let page_resolution = config.page_resolution;
        let capacity = config.pool_capacity();
        let texel_count = capacity as usize * page_resolution as usize * page_resolution as usize;
        Self {
            slots_per_axis,
            page_resolution,
            texels: vec![PHYSICAL_CLEAR_DEPTH; texel_count],
            owners: vec![None; capacity as usize],
            // Reversed so slot 0 is handed out first.
            free: (0..capacity).rev().collect(),
        }
    }

    /// Slots per axis.
    #[inline]
    pub const fn slots_per_axis(&self) -> u32 {
        self.slots_per_axis
    }

    /// Page edge length in texels.
    #[inline]
    pub const fn page_resolution(&self) -> u32 {
        self.page_resolution
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.owners.len() as u32
    }

    /// Number of free slots.
    #[inline]
    pub fn free_count(&self) -> u32 {
        self.free.len() as u32
    }

    /// Number of owned slots.
    #[inline]
    pub fn used_count(&self) -> u32 {
        self.capacity() - self.free_count()
    }

    /// Texels per slot.
    #[inline]
    pub const fn texels_per_slot(&self) -> usize {
        self.page_resolution as usize * self.page_resolution as usize
    }

    /// Page that owns `slot`, if any.
    #[inline]
    pub fn owner(&self, slot: PhysicalSlot) -> Option<PageKey> {
        self.owners[self.slot_index(slot)]
    }

    /// Take a free slot for `key` and clear its texels.
    pub(crate) fn acquire(&mut self, key: PageKey) -> Option<PhysicalSlot> {
        let index = self.free.pop()?;
        debug_assert!(
            self.owners[index as usize].is_none(),
            "free slot {index} already owned"
        );
        self.owners[index as usize] = Some(key);
        self.clear_slot(index as usize);
        Some(slot_at(index, self.slots_per_axis))
    }

    /// Return `slot` to the free list. Usable again immediately.
    pub(crate) fn release(&mut self, slot: PhysicalSlot) {
        let index = self.slot_index(slot);
        debug_assert!(self.owners[index].is_some(), "double release of {slot:?}");
        if self.owners[index].take().is_some() {
            self.free.push(index as u32);
        }
    }

    /// Free every slot.
    pub(crate) fn release_all(&mut self) {
        self.owners.fill(None);
        self.free = (0..self.capacity()).rev().collect();
    }

    /// Depth stored at `offset` inside `slot`.
    #[inline]
    pub fn depth(&self, slot: PhysicalSlot, offset: UVec2) -> f32 {
        debug_assert!(offset.x < self.page_resolution && offset.y < self.page_resolution);
        let per = self.texels_per_slot();
        let local = (offset.y * self.page_resolution + offset.x) as usize;
        self.texels[self.slot_index(slot) * per + local]
    }

    /// Depth at a texel of the pool atlas (slot grid times page resolution).
    pub fn atlas_depth(&self, texel: UVec2) -> f32 {
        let page = self.page_resolution;
        let slot = PhysicalSlot::new((texel.x / page) as u16, (texel.y / page) as u16);
        self.depth(slot, texel % page)
    }

    /// Parallel mutable access to the texels of the given slots.
    ///
    /// Slots in `work` must be distinct; each callback receives exactly that
    /// slot's texels.
    pub(crate) fn par_for_slots<T, F>(&mut self, work: &[(PhysicalSlot, T)], f: F)
    where
        T: Sync,
        F: Fn(PhysicalSlot, &T, &mut [f32]) + Sync,
    {
        let per = self.texels_per_slot();
        let n = self.slots_per_axis;
        let mut wanted = vec![None; self.owners.len()];
        for (i, (slot, _)) in work.iter().enumerate() {
            wanted[slot.to_index(n) as usize] = Some(i);
        }
        self.texels
            .par_chunks_mut(per)
            .zip(wanted.par_iter())
            .for_each(|(texels, item)| {
                if let Some(i) = *item {
                    let (slot, payload) = &work[i];
                    f(*slot, payload, texels);
                }
            });
    }

    fn clear_slot(&mut self, index: usize) {
        let per = self.texels_per_slot();
        self.texels[index * per..(index + 1) * per].fill(PHYSICAL_CLEAR_DEPTH);
    }

    #[inline]
    fn slot_index(&self, slot: PhysicalSlot) -> usize {
        debug_assert!(
            u32::from(slot.x) < self.slots_per_axis && u32::from(slot.y) < self.slots_per_axis,
            "slot {slot:?} outside the pool"
        );
        slot.to_index(self.slots_per_axis) as usize
    }
}

#[inline]
fn slot_at(index: u32, slots_per_axis: u32) -> PhysicalSlot {
    PhysicalSlot::new((index % slots_per_axis) as u16, (index / slots_per_axis) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use penumbra_core::{CascadeIndex, PageCoord};

    fn small_pool() -> PhysicalPagePool {
        PhysicalPagePool::new(&VsmConfig::default().with_pages(4, 8).with_pool(2))
    }

    fn key(x: u16) -> PageKey {
        PageKey::new(CascadeIndex(0), PageCoord::new(x, 0))
    }

    #[test]
    fn acquire_hands_out_distinct_slots_until_full() {
        let mut pool = small_pool();
        let slots: Vec<_> = (0..4).map(|i| pool.acquire(key(i)).unwrap()).collect();
        assert_eq!(slots[0], PhysicalSlot::new(0, 0));
        for (i, a) in slots.iter().enumerate() {
            for b in &slots[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(pool.acquire(key(9)).is_none());
        assert_eq!(pool.used_count(), 4);
    }

    #[test]
    fn released_slot_is_reused_and_cleared() {
        let mut pool = small_pool();
        let slot = pool.acquire(key(0)).unwrap();
        pool.par_for_slots(&[(slot, ())], |_, (), texels| texels.fill(0.25));
        assert_eq!(pool.depth(slot, UVec2::new(3, 3)), 0.25);

        pool.release(slot);
        assert_eq!(pool.owner(slot), None);
        let again = pool.acquire(key(1)).unwrap();
        assert_eq!(again, slot);
        assert_eq!(pool.owner(again), Some(key(1)));
        assert_eq!(pool.depth(again, UVec2::new(3, 3)), PHYSICAL_CLEAR_DEPTH);
    }

    #[test]
    fn parallel_writes_stay_inside_their_slot() {
        let mut pool = small_pool();
        let a = pool.acquire(key(0)).unwrap();
        let b = pool.acquire(key(1)).unwrap();
        pool.par_for_slots(&[(a, 0.1f32), (b, 0.2f32)], |_, value, texels| {
            texels.fill(*value);
        });
        let untouched = PhysicalSlot::new(0, 1);
        for y in 0..4 {
            for x in 0..4 {
                let texel = UVec2::new(x, y);
                assert_eq!(pool.depth(a, texel), 0.1);
                assert_eq!(pool.depth(b, texel), 0.2);
                assert_eq!(pool.depth(untouched, texel), PHYSICAL_CLEAR_DEPTH);
            }
        }
    }

    #[test]
    fn atlas_addressing_matches_slot_addressing() {
        let mut pool = small_pool();
        let slot = PhysicalSlot::new(1, 1);
        pool.par_for_slots(&[(slot, ())], |_, (), texels| texels[4 + 2] = 0.5);
        assert_eq!(pool.depth(slot, UVec2::new(2, 1)), 0.5);
        assert_eq!(pool.atlas_depth(UVec2::new(6, 5)), 0.5);
    }

    #[test]
    fn release_all_frees_everything() {
        let mut pool = small_pool();
        for i in 0..3 {
            pool.acquire(key(i));
        }
        pool.release_all();
        assert_eq!(pool.free_count(), 4);
        assert_eq!(pool.owner(PhysicalSlot::new(0, 0)), None);
    }
}
