//! Debug visualization modes for the virtual shadow map.
//!
//! Each mode renders an image that shows one aspect of the paging state:
//! which pages are resident, what the physical pool holds, and which cascade
//! serves each pixel.

use std::str::FromStr;

use glam::Vec3;
use image::{Rgba, RgbaImage};
use penumbra_core::constants::PHYSICAL_CLEAR_DEPTH;
use penumbra_core::{CascadeIndex, PageKey};
use penumbra_vsm::{PageTable, PhysicalPagePool, ShadowSampler, VirtualShadowMap};

use crate::error::Result;
use crate::raster::GBuffer;

/// Debug visualization mode, selected with `--debug <mode>` in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    /// Normal rendering (default).
    #[default]
    None,
    /// Page table of every cascade colored by residency.
    CascadeOccupancy,
    /// Physical pool atlas depth as greyscale.
    PhysicalPool,
    /// Cascade serving each visible pixel.
    CascadeIndex,
}

impl DebugMode {
    /// Cycle to the next debug mode.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::CascadeOccupancy,
            Self::CascadeOccupancy => Self::PhysicalPool,
            Self::PhysicalPool => Self::CascadeIndex,
            Self::CascadeIndex => Self::None,
        }
    }

    /// Name used on the command line and in file names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CascadeOccupancy => "occupancy",
            Self::PhysicalPool => "pool",
            Self::CascadeIndex => "cascade",
        }
    }
}

impl FromStr for DebugMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut mode = Self::None;
        loop {
            if mode.name() == s {
                return Ok(mode);
            }
            mode = mode.next();
            if mode == Self::None {
                return Err(format!("unknown debug mode '{s}'"));
            }
        }
    }
}

const UNBACKED: Rgba<u8> = Rgba([24, 24, 28, 255]);
const STARVED: Rgba<u8> = Rgba([220, 40, 40, 255]);
const RESIDENT_VISIBLE: Rgba<u8> = Rgba([60, 210, 90, 255]);
const SEPARATOR: Rgba<u8> = Rgba([90, 90, 90, 255]);

/// Page table of every cascade side by side, `cell` pixels per page.
///
/// Decoded from the packed upload layout. Unbacked pages are dark, visible
/// resident pages green, idle resident pages blue shaded by recency and
/// visible pages left without backing red.
pub fn cascade_occupancy_image(table: &PageTable, max_recency: u8, cell: u32) -> RgbaImage {
    let grid = table.grid();
    let cascades = table.cascades();
    let cell = cell.max(1);
    let tile = grid * cell + 1;
    let mut image = RgbaImage::from_pixel(tile * cascades, grid * cell, SEPARATOR);

    for (index, packed) in table.packed().into_iter().enumerate() {
        let key = PageKey::from_index(index, grid);
        let entry = packed.unpack();
        let color = match (entry.is_valid(), entry.is_visible()) {
            (true, true) => RESIDENT_VISIBLE,
            (true, false) => {
                let t = f32::from(entry.recency()) / f32::from(max_recency.max(1));
                Rgba([30, 50, (80.0 + 150.0 * t) as u8, 255])
            }
            (false, true) => STARVED,
            (false, false) => UNBACKED,
        };
        let x0 = u32::from(key.cascade.0) * tile + u32::from(key.cell.x) * cell;
        let y0 = u32::from(key.cell.y) * cell;
        for y in y0..y0 + cell {
            for x in x0..x0 + cell {
                image.put_pixel(x, y, color);
            }
        }
    }
    image
}

/// Pool atlas depth, downsampled so neither side exceeds `max_size`.
///
/// Near depth is bright, far depth dark, cleared texels black.
pub fn physical_pool_image(pool: &PhysicalPagePool, max_size: u32) -> RgbaImage {
    let resolution = pool.slots_per_axis() * pool.page_resolution();
    let step = resolution.div_ceil(max_size.max(1)).max(1);
    let size = resolution / step;
    RgbaImage::from_fn(size, size, |x, y| {
        let depth = pool.atlas_depth(glam::UVec2::new(x * step, y * step));
        if depth >= PHYSICAL_CLEAR_DEPTH {
            Rgba([0, 0, 0, 255])
        } else {
            let v = ((1.0 - depth.clamp(0.0, 1.0)) * 255.0) as u8;
            Rgba([v, v, v, 255])
        }
    })
}

/// Per-pixel cascade color, dimmed where the page has no physical backing.
///
/// Background is black; points outside every cascade are white.
pub fn cascade_index_image(gbuffer: &GBuffer, sampler: &ShadowSampler<'_>) -> RgbaImage {
    RgbaImage::from_fn(gbuffer.width(), gbuffer.height(), |x, y| {
        let Some(world) = gbuffer.world_position(x, y) else {
            return Rgba([0, 0, 0, 255]);
        };
        let Some(location) = sampler.locate(world) else {
            return Rgba([255, 255, 255, 255]);
        };
        let lit = if location.slot.is_some() { 1.0 } else { 0.4 };
        let c = (cascade_color(location.key.cascade) * lit * 255.0).round();
        Rgba([c.x as u8, c.y as u8, c.z as u8, 255])
    })
}

fn cascade_color(cascade: CascadeIndex) -> Vec3 {
    const PALETTE: [Vec3; 8] = [
        Vec3::new(0.9, 0.2, 0.2),
        Vec3::new(0.9, 0.6, 0.1),
        Vec3::new(0.9, 0.9, 0.2),
        Vec3::new(0.3, 0.8, 0.3),
        Vec3::new(0.2, 0.8, 0.8),
        Vec3::new(0.2, 0.4, 0.9),
        Vec3::new(0.6, 0.3, 0.9),
        Vec3::new(0.9, 0.4, 0.8),
    ];
    PALETTE[cascade.as_usize() % PALETTE.len()]
}

/// Render the image for `mode`, or `None` for [`DebugMode::None`].
pub fn render_debug(
    mode: DebugMode,
    vsm: &VirtualShadowMap,
    gbuffer: &GBuffer,
) -> Result<Option<RgbaImage>> {
    let image = match mode {
        DebugMode::None => None,
        DebugMode::CascadeOccupancy => Some(cascade_occupancy_image(
            vsm.page_table(),
            vsm.config().max_recency,
            4,
        )),
        DebugMode::PhysicalPool => Some(physical_pool_image(vsm.pool(), 1024)),
        DebugMode::CascadeIndex => Some(cascade_index_image(gbuffer, &vsm.sampler()?)),
    };
    Ok(image)
}
