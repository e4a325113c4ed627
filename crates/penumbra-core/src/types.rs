//! Identifier types shared by the page table and the physical pool.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Clipmap cascade level.
///
/// Cascade 0 is the finest; every following cascade doubles the world
/// footprint of the previous one.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct CascadeIndex(pub u8);

impl CascadeIndex {
    /// The finest cascade.
    pub const FINEST: Self = Self(0);

    /// Footprint scale of this cascade relative to cascade 0 (`2^level`).
    #[inline]
    pub fn scale(self) -> f32 {
        (1u32 << self.0) as f32
    }

    /// Inverse footprint scale (`2^-level`).
    #[inline]
    pub fn inv_scale(self) -> f32 {
        1.0 / self.scale()
    }

    /// Level as an array index.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Location of a page slot inside the physical page pool, in slot units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct PhysicalSlot {
    pub x: u16,
    pub y: u16,
}

impl PhysicalSlot {
    /// Create a slot coordinate.
    #[inline]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Linear slot index (row-major).
    #[inline]
    pub const fn to_index(self, slots_per_axis: u32) -> u32 {
        self.x as u32 + self.y as u32 * slots_per_axis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_scale_doubles() {
        assert_eq!(CascadeIndex(0).scale(), 1.0);
        assert_eq!(CascadeIndex(3).scale(), 8.0);
        assert_eq!(CascadeIndex(3).inv_scale(), 0.125);
    }

    #[test]
    fn slot_index_is_row_major() {
        let slot = PhysicalSlot::new(5, 4);
        assert_eq!(slot.to_index(8), 37);
        assert_eq!(PhysicalSlot::new(0, 1).to_index(8), 8);
    }
}
