//! Virtual shadow map paging engine.
//!
//! A sparse page table maps a cascaded (clipmap) light-space shadow volume
//! onto a fixed pool of physical depth pages. Every frame runs the same
//! ordered passes over explicit resources:
//!
//! 1. resolve the page-snapped light projection,
//! 2. reset visibility and age every page,
//! 3. mark pages visible from the camera depth buffer,
//! 4. allocate physical slots (reclaim, assign, evict),
//! 5. render shadow casters into the backed pages.
//!
//! After that the [`ShadowSampler`] answers lit/shadowed queries for the rest
//! of the frame. [`VirtualShadowMap`] owns the persistent state and enforces
//! the pass order.

pub mod allocator;
pub mod caster;
pub mod clipmap;
pub mod config;
pub mod depth;
pub mod error;
pub mod frame;
pub mod page_table;
pub mod physical_pool;
pub mod projection;
pub mod sampling;

pub use allocator::{allocate_pages, AllocationState};
pub use caster::{page_regions, PageRegion, PageRenderRequest, ShadowCaster};
pub use clipmap::ClipmapSample;
pub use config::{EvictionPolicy, VsmConfig};
pub use depth::DepthView;
pub use error::{Result, VsmError};
pub use frame::{FrameInputs, FramePhase, FrameStats, VirtualShadowMap};
pub use page_table::{PackedPageEntry, PageFlags, PageTable, PageTableEntry};
pub use physical_pool::PhysicalPagePool;
pub use projection::{LightProjection, ShadowConstants};
pub use sampling::{SampleLocation, ShadowSampler};
