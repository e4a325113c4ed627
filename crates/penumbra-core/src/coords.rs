//! Coordinate systems for the virtual page table.

use bytemuck::{Pod, Zeroable};
use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::types::CascadeIndex;

/// Page cell inside one cascade of the virtual page table.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct PageCoord {
    pub x: u16,
    pub y: u16,
}

impl PageCoord {
    /// Create a new page coordinate
    #[inline]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Page cell containing a virtual texel.
    #[inline]
    pub const fn from_texel(texel: UVec2, page_resolution: u32) -> Self {
        Self {
            x: (texel.x / page_resolution) as u16,
            y: (texel.y / page_resolution) as u16,
        }
    }

    /// Virtual texel of the page's top-left corner.
    #[inline]
    pub fn texel_origin(self, page_resolution: u32) -> UVec2 {
        UVec2::new(u32::from(self.x), u32::from(self.y)) * page_resolution
    }
}

/// Fully qualified virtual page: cascade plus grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageKey {
    pub cascade: CascadeIndex,
    pub cell: PageCoord,
}

impl PageKey {
    /// Create a new page key
    #[inline]
    pub const fn new(cascade: CascadeIndex, cell: PageCoord) -> Self {
        Self { cascade, cell }
    }

    /// Linear index in a `[cascade][y][x]` table with `grid` cells per axis.
    #[inline]
    pub const fn to_index(self, grid: u32) -> usize {
        let grid = grid as usize;
        self.cascade.0 as usize * grid * grid + self.cell.y as usize * grid + self.cell.x as usize
    }

    /// Inverse of [`PageKey::to_index`].
    #[inline]
    pub const fn from_index(index: usize, grid: u32) -> Self {
        let grid = grid as usize;
        let per_cascade = grid * grid;
        let local = index % per_cascade;
        Self {
            cascade: CascadeIndex((index / per_cascade) as u8),
            cell: PageCoord {
                x: (local % grid) as u16,
                y: (local / grid) as u16,
            },
        }
    }
}

/// Half-open texel rectangle `[min, max)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TexelRect {
    pub min: UVec2,
    pub max: UVec2,
}

impl TexelRect {
    /// Create a rectangle from its corners.
    #[inline]
    pub const fn new(min: UVec2, max: UVec2) -> Self {
        Self { min, max }
    }

    /// Rectangle covering `[0, size)` on both axes.
    #[inline]
    pub const fn square(size: u32) -> Self {
        Self {
            min: UVec2::ZERO,
            max: UVec2::new(size, size),
        }
    }

    /// Width in texels.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.max.x.saturating_sub(self.min.x)
    }

    /// Height in texels.
    #[inline]
    pub const fn height(&self) -> u32 {
        self.max.y.saturating_sub(self.min.y)
    }

    /// Returns true if the rectangle covers no texels.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}
