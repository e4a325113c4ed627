//! Virtual page table.
//!
//! One entry per page cell per cascade, laid out `[cascade][y][x]`. Entries
//! hold the physical backing of a page (if any), whether the page was seen by
//! the camera this frame, and its recency counter.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use penumbra_core::constants::{MAX_PACKED_COORD, MAX_PACKED_RECENCY, PACKED_COORD_BITS};
use penumbra_core::{PageKey, PhysicalSlot};

bitflags! {
    /// Flag bits of a packed page table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PageFlags: u32 {
        /// Page is backed by a physical slot.
        const VALID   = 1 << 31;
        /// Page was seen by the camera this frame.
        const VISIBLE = 1 << 30;
    }
}

/// State of one virtual page.
///
/// The physical slot is only reachable through [`PageTableEntry::physical`],
/// which returns `None` for unbacked pages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageTableEntry {
    physical: Option<PhysicalSlot>,
    visible: bool,
    recency: u8,
}

impl PageTableEntry {
    /// Returns true if the page has physical backing.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.physical.is_some()
    }

    /// Physical slot backing the page.
    #[inline]
    pub const fn physical(&self) -> Option<PhysicalSlot> {
        self.physical
    }

    /// Returns true if the camera needs this page this frame.
    #[inline]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Frames left before an idle page is reclaimed.
    #[inline]
    pub const fn recency(&self) -> u8 {
        self.recency
    }

    /// Visible but without backing.
    #[inline]
    pub const fn is_requested(&self) -> bool {
        self.visible && self.physical.is_none()
    }

    pub(crate) fn back(&mut self, slot: PhysicalSlot, recency: u8) {
        self.physical = Some(slot);
        self.recency = recency;
    }

    pub(crate) fn unback(&mut self) -> Option<PhysicalSlot> {
        self.recency = 0;
        self.physical.take()
    }

    pub(crate) fn set_recency(&mut self, recency: u8) {
        self.recency = recency;
    }
}

/// 32-bit packed page table entry in the upload layout.
///
/// | bits   | field           |
/// |--------|-----------------|
/// | 31     | valid           |
/// | 30     | visible         |
/// | 26..30 | recency         |
/// | 24..26 | reserved (zero) |
/// | 12..24 | physical y      |
/// | 0..12  | physical x      |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct PackedPageEntry(pub u32);

impl PackedPageEntry {
    const COORD_MASK: u32 = MAX_PACKED_COORD;
    const RECENCY_SHIFT: u32 = 26;
    const RECENCY_MASK: u32 = MAX_PACKED_RECENCY as u32;

    /// Pack an entry. Coordinates and recency are masked to their field widths.
    pub fn pack(entry: &PageTableEntry) -> Self {
        let mut flags = PageFlags::empty();
        flags.set(PageFlags::VISIBLE, entry.visible);

        let mut bits = (u32::from(entry.recency) & Self::RECENCY_MASK) << Self::RECENCY_SHIFT;
        if let Some(slot) = entry.physical {
            debug_assert!(u32::from(slot.x) <= Self::COORD_MASK);
            debug_assert!(u32::from(slot.y) <= Self::COORD_MASK);
            flags |= PageFlags::VALID;
            bits |= u32::from(slot.x) & Self::COORD_MASK;
            bits |= (u32::from(slot.y) & Self::COORD_MASK) << PACKED_COORD_BITS;
        }
        Self(bits | flags.bits())
    }

    /// Unpack into the plain entry form. Coordinate bits of invalid entries are ignored.
    pub fn unpack(self) -> PageTableEntry {
        let flags = self.flags();
        let physical = flags.contains(PageFlags::VALID).then(|| PhysicalSlot {
            x: (self.0 & Self::COORD_MASK) as u16,
            y: ((self.0 >> PACKED_COORD_BITS) & Self::COORD_MASK) as u16,
        });
        PageTableEntry {
            physical,
            visible: flags.contains(PageFlags::VISIBLE),
            recency: ((self.0 >> Self::RECENCY_SHIFT) & Self::RECENCY_MASK) as u8,
        }
    }

    /// Flag bits.
    #[inline]
    pub const fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0)
    }
}

/// The virtual page table for every cascade.
#[derive(Clone, Debug)]
pub struct PageTable {
    grid: u32,
    cascades: u32,
    entries: Vec<PageTableEntry>,
}

impl PageTable {
    /// Create an empty table: nothing backed, nothing visible.
    pub fn new(grid: u32, cascades: u32) -> Self {
        let len = grid as usize * grid as usize * cascades as usize;
        Self {
            grid,
            cascades,
            entries: vec![PageTableEntry::default(); len],
        }
    }

    /// Page cells per axis of one cascade.
    #[inline]
    pub const fn grid(&self) -> u32 {
        self.grid
    }

    /// Number of cascades.
    #[inline]
    pub const fn cascades(&self) -> u32 {
        self.cascades
    }

    /// Total number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `key` addresses an entry of this table.
    #[inline]
    pub fn contains(&self, key: PageKey) -> bool {
        u32::from(key.cascade.0) < self.cascades
            && u32::from(key.cell.x) < self.grid
            && u32::from(key.cell.y) < self.grid
    }

    /// Start-of-frame reset: clear visibility and age every page by one frame.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.visible = false;
            entry.recency = entry.recency.saturating_sub(1);
        }
    }

    /// Clear visibility without aging.
    pub fn clear_visibility(&mut self) {
        for entry in &mut self.entries {
            entry.visible = false;
        }
    }

    /// Mark a page as needed this frame. Idempotent.
    #[inline]
    pub fn mark_visible(&mut self, key: PageKey) {
        self.entry_mut(key).visible = true;
    }

    /// Copy of the entry for `key`.
    #[inline]
    pub fn lookup(&self, key: PageKey) -> PageTableEntry {
        debug_assert!(self.contains(key), "page {key:?} outside the table");
        self.entries[key.to_index(self.grid)]
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, key: PageKey) -> &mut PageTableEntry {
        debug_assert!(self.contains(key), "page {key:?} outside the table");
        &mut self.entries[key.to_index(self.grid)]
    }

    #[inline]
    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (PageKey, &mut PageTableEntry)> {
        let grid = self.grid;
        self.entries
            .iter_mut()
            .enumerate()
            .map(move |(i, e)| (PageKey::from_index(i, grid), e))
    }

    /// Iterate over every entry in table order (cascade 0 first, row-major).
    pub fn iter(&self) -> impl Iterator<Item = (PageKey, &PageTableEntry)> {
        let grid = self.grid;
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, e)| (PageKey::from_index(i, grid), e))
    }

    /// Number of backed pages.
    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_valid()).count()
    }

    /// Number of pages marked visible this frame.
    pub fn visible_count(&self) -> usize {
        self.entries.iter().filter(|e| e.visible).count()
    }

    /// Packed copy of the whole table in upload layout.
    pub fn packed(&self) -> Vec<PackedPageEntry> {
        self.entries.iter().map(PackedPageEntry::pack).collect()
    }

    /// Drop every backing and clear all state. Returns the released slots.
    pub fn invalidate_all(&mut self) -> Vec<(PageKey, PhysicalSlot)> {
        let grid = self.grid;
        let mut released = Vec::new();
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if let Some(slot) = entry.physical {
                released.push((PageKey::from_index(i, grid), slot));
            }
            *entry = PageTableEntry::default();
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penumbra_core::{CascadeIndex, PageCoord};

    fn key(c: u8, x: u16, y: u16) -> PageKey {
        PageKey::new(CascadeIndex(c), PageCoord::new(x, y))
    }

    #[test]
    fn fresh_table_is_empty() {
        let table = PageTable::new(8, 3);
        assert_eq!(table.len(), 192);
        assert_eq!(table.valid_count(), 0);
        assert_eq!(table.visible_count(), 0);
        assert!(table.iter().all(|(_, e)| e.physical().is_none()));
    }

    #[test]
    fn mark_visible_is_idempotent() {
        let mut table = PageTable::new(4, 2);
        table.mark_visible(key(1, 2, 3));
        table.mark_visible(key(1, 2, 3));
        assert_eq!(table.visible_count(), 1);
        assert!(table.lookup(key(1, 2, 3)).is_requested());
        assert!(!table.lookup(key(0, 2, 3)).is_visible());
    }

    #[test]
    fn reset_clears_visibility_and_ages() {
        let mut table = PageTable::new(4, 1);
        let k = key(0, 1, 1);
        table.entry_mut(k).back(PhysicalSlot::new(0, 0), 2);
        table.mark_visible(k);

        table.reset();
        let entry = table.lookup(k);
        assert!(!entry.is_visible());
        assert_eq!(entry.recency(), 1);

        table.reset();
        table.reset();
        assert_eq!(table.lookup(k).recency(), 0);
        assert!(table.lookup(k).is_valid());
    }

    #[test]
    fn iteration_order_is_cascade_major_row_major() {
        let table = PageTable::new(2, 2);
        let keys: Vec<_> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys[0], key(0, 0, 0));
        assert_eq!(keys[1], key(0, 1, 0));
        assert_eq!(keys[2], key(0, 0, 1));
        assert_eq!(keys[4], key(1, 0, 0));
    }

    #[test]
    fn packed_layout_matches_bit_assignment() {
        let mut entry = PageTableEntry::default();
        entry.back(PhysicalSlot::new(0xABC, 0x123), 9);
        entry.visible = true;
        let packed = PackedPageEntry::pack(&entry);

        assert_eq!(packed.0 & 0xFFF, 0xABC);
        assert_eq!((packed.0 >> 12) & 0xFFF, 0x123);
        assert_eq!((packed.0 >> 24) & 0b11, 0);
        assert_eq!((packed.0 >> 26) & 0xF, 9);
        assert!(packed.flags().contains(PageFlags::VALID | PageFlags::VISIBLE));
        assert_eq!(packed.unpack(), entry);
    }

    #[test]
    fn unpack_ignores_coordinates_of_invalid_entries() {
        let packed = PackedPageEntry(PageFlags::VISIBLE.bits() | 0x00F_FFFF);
        let entry = packed.unpack();
        assert!(!entry.is_valid());
        assert_eq!(entry.physical(), None);
        assert!(entry.is_visible());
    }

    #[test]
    fn invalidate_all_releases_every_slot() {
        let mut table = PageTable::new(4, 2);
        table.entry_mut(key(0, 0, 0)).back(PhysicalSlot::new(1, 0), 5);
        table.entry_mut(key(1, 3, 3)).back(PhysicalSlot::new(2, 0), 5);
        let released = table.invalidate_all();
        assert_eq!(released.len(), 2);
        assert_eq!(table.valid_count(), 0);
    }

    #[test]
    fn packed_table_keeps_table_order() {
        let mut table = PageTable::new(4, 3);
        let k = key(2, 1, 0);
        table.entry_mut(k).back(PhysicalSlot::new(3, 1), 7);
        table.mark_visible(k);

        let packed = table.packed();
        assert_eq!(packed.len(), table.len());
        assert_eq!(packed[k.to_index(4)].unpack(), table.lookup(k));
        let upload: &[u32] = bytemuck::cast_slice(&packed);
        assert_eq!(upload[k.to_index(4)] >> 30, 0b11);
        assert_eq!(upload[0], 0);
    }

    #[test]
    fn clearing_visibility_keeps_recency() {
        let mut table = PageTable::new(4, 1);
        let k = key(0, 2, 2);
        table.entry_mut(k).back(PhysicalSlot::new(0, 0), 4);
        table.mark_visible(k);
        table.clear_visibility();
        assert!(!table.lookup(k).is_visible());
        assert_eq!(table.lookup(k).recency(), 4);
    }
}
