//! Physical page allocation.
//!
//! One ordered pass over the page table that reclaims expired pages, refreshes
//! pages still in view and hands free slots to newly requested pages. The
//! pass runs on a single thread, which makes slot assignment injective by
//! construction.

use penumbra_core::PageKey;
use tracing::trace;

use crate::config::EvictionPolicy;
use crate::page_table::PageTable;
use crate::physical_pool::PhysicalPagePool;

/// Per-frame allocation counters.
///
/// Cleared by the reset pass of every frame and never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationState {
    /// Visible pages without backing at the start of allocation.
    pub requested: u32,
    /// Requests that received a slot.
    pub allocated: u32,
    /// Backed pages that stayed visible and had their recency refreshed.
    pub refreshed: u32,
    /// Idle pages whose recency ran out.
    pub reclaimed: u32,
    /// Idle pages evicted early to satisfy requests.
    pub evicted: u32,
    /// Pages dropped because the light basis changed.
    pub invalidated: u32,
    /// Requests left without backing; retried next frame.
    pub starved: u32,
}

impl AllocationState {
    /// Zero every counter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Run the allocation pass.
///
/// Phases, in order:
/// 1. reclaim valid pages that are not visible and have zero recency,
/// 2. refresh recency of valid visible pages to `max_recency`,
/// 3. assign free slots to visible unbacked pages in table order,
/// 4. under [`EvictionPolicy::LeastRecent`], evict idle pages oldest first
///    while requests remain,
/// 5. count whatever is still unbacked as starved.
///
/// Visible pages are never evicted.
pub fn allocate_pages(
    table: &mut PageTable,
    pool: &mut PhysicalPagePool,
    state: &mut AllocationState,
    policy: EvictionPolicy,
    max_recency: u8,
) {
    let mut pending: Vec<PageKey> = Vec::new();
    let mut idle: Vec<(u8, PageKey)> = Vec::new();

    for (key, entry) in table.entries_mut() {
        match (entry.physical(), entry.is_visible()) {
            (Some(slot), false) if entry.recency() == 0 => {
                entry.unback();
                pool.release(slot);
                state.reclaimed += 1;
            }
            (Some(_), false) => idle.push((entry.recency(), key)),
            (Some(_), true) => {
                entry.set_recency(max_recency);
                state.refreshed += 1;
            }
            (None, true) => pending.push(key),
            (None, false) => {}
        }
    }
    state.requested += pending.len() as u32;

    if policy == EvictionPolicy::LeastRecent {
        // Oldest first; table order breaks ties.
        idle.sort_by_key(|&(recency, key)| (recency, key.to_index(table.grid())));
    }
    let mut victims = idle.into_iter().map(|(_, key)| key);

    for key in pending {
        let mut slot = pool.acquire(key);
        if slot.is_none() && policy == EvictionPolicy::LeastRecent {
            if let Some(victim) = victims.next() {
                if let Some(freed) = table.entry_mut(victim).unback() {
                    pool.release(freed);
                    state.evicted += 1;
                }
                slot = pool.acquire(key);
            }
        }
        match slot {
            Some(slot) => {
                table.entry_mut(key).back(slot, max_recency);
                state.allocated += 1;
            }
            None => state.starved += 1,
        }
    }

    if state.starved > 0 {
        trace!(
            starved = state.starved,
            evicted = state.evicted,
            "physical page pool exhausted"
        );
    }
}
