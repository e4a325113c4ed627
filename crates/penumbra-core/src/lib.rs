//! Core types, math, and traits for the Penumbra shadow engine.
//!
//! This crate provides the foundational types used throughout the engine:
//! - Page, cascade and physical slot identifiers
//! - Texel rectangles for page-local rendering
//! - Bounding volumes and frustum culling

pub mod coords;
pub mod math;
pub mod types;

pub use coords::{PageCoord, PageKey, TexelRect};
pub use types::{CascadeIndex, PhysicalSlot};

/// Engine-wide constants
pub mod constants {
    /// Bits per physical coordinate in the packed page table layout
    pub const PACKED_COORD_BITS: u32 = 12;
    /// Largest physical slot coordinate representable in the packed layout
    pub const MAX_PACKED_COORD: u32 = (1 << PACKED_COORD_BITS) - 1;
    /// Bits used for the recency counter in the packed layout
    pub const PACKED_RECENCY_BITS: u32 = 4;
    /// Largest recency value representable in the packed layout
    pub const MAX_PACKED_RECENCY: u8 = (1 << PACKED_RECENCY_BITS) - 1;
    /// Depth written into freshly assigned physical pages (never occludes)
    pub const PHYSICAL_CLEAR_DEPTH: f32 = 1024.0 * 1024.0;
    /// Maximum number of clipmap cascades
    pub const MAX_CASCADES: usize = 16;
}
