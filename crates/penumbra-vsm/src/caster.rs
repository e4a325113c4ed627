//! Boundary to the shadow-caster renderer.
//!
//! The engine does not rasterize geometry itself. For every page on the render
//! list it hands a [`PageRenderRequest`] and the page's physical texels to a
//! [`ShadowCaster`], which writes the nearest light-space depth per texel.
//!
//! Because the virtual texture wraps toroidally, a page can straddle the edge
//! of the cascade footprint. Such a page is split into up to four regions; each
//! region maps light NDC to page texels for the world instance of those texels
//! that lies inside the footprint.

use glam::{Affine2, Mat4, UVec2, Vec2};
use penumbra_core::{PageKey, PhysicalSlot, TexelRect};

use crate::clipmap::unwrapped_texel_transform;
use crate::config::VsmConfig;
use crate::projection::LightProjection;

/// Renders shadow casters into one physical page.
pub trait ShadowCaster: Sync {
    /// Write the minimum light-space depth of every caster covering a texel.
    ///
    /// `target` holds exactly the page's `page_resolution²` texels, row-major,
    /// every one reset to [`PHYSICAL_CLEAR_DEPTH`] before the call. Only texels
    /// inside `request.regions` may be written.
    ///
    /// [`PHYSICAL_CLEAR_DEPTH`]: penumbra_core::constants::PHYSICAL_CLEAR_DEPTH
    fn render_page(&self, request: &PageRenderRequest, target: &mut [f32]);
}

/// Part of a page with one NDC-to-texel mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageRegion {
    /// Page-local texel rectangle.
    pub clip: TexelRect,
    /// Cascade NDC XY to page-local texel coordinates.
    pub ndc_to_texel: Affine2,
}

/// Everything a caster needs to paint one page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRenderRequest {
    pub key: PageKey,
    pub slot: PhysicalSlot,
    /// Light view-projection with XY scaled into the page's cascade.
    pub view_projection: Mat4,
    pub page_resolution: u32,
    /// One to four disjoint regions that together cover the page.
    pub regions: Vec<PageRegion>,
}

impl PageRenderRequest {
    /// Build the request for `key` backed by `slot`.
    pub fn new(
        key: PageKey,
        slot: PhysicalSlot,
        projection: &LightProjection,
        config: &VsmConfig,
    ) -> Self {
        Self {
            key,
            slot,
            view_projection: projection.cascade_view_projection(key.cascade),
            page_resolution: config.page_resolution,
            regions: page_regions(key, projection, config),
        }
    }
}

/// Split a page at the footprint wrap and derive each part's texel mapping.
pub fn page_regions(key: PageKey, projection: &LightProjection, config: &VsmConfig) -> Vec<PageRegion> {
    let resolution = config.cascade_resolution();
    let page = config.page_resolution;
    let to_unwrapped =
        unwrapped_texel_transform(projection.view_projection(), key.cascade, resolution);

    // First unwrapped texel whose center lies inside the footprint.
    let footprint = to_unwrapped.transform_point2(Vec2::new(-1.0, 1.0));
    let first = (footprint - 0.5).ceil();

    let origin = key.cell.texel_origin(page);
    let xs = axis_pieces(first.x as i64, i64::from(resolution), i64::from(origin.x), i64::from(page));
    let ys = axis_pieces(first.y as i64, i64::from(resolution), i64::from(origin.y), i64::from(page));

    let mut regions = Vec::with_capacity(xs.len() * ys.len());
    for y in &ys {
        for x in &xs {
            let shift = Vec2::new(x.unwrapped_origin as f32, y.unwrapped_origin as f32);
            regions.push(PageRegion {
                clip: TexelRect::new(UVec2::new(x.start, y.start), UVec2::new(x.end, y.end)),
                ndc_to_texel: Affine2::from_translation(-shift) * to_unwrapped,
            });
        }
    }
    regions
}

/// One axis span of a page and the unwrapped texel its local origin maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AxisPiece {
    start: u32,
    end: u32,
    unwrapped_origin: i64,
}

fn axis_pieces(first: i64, resolution: i64, page_start: i64, page: i64) -> Vec<AxisPiece> {
    let wrap = first.rem_euclid(resolution);
    let base = first - wrap;
    let page_end = page_start + page;

    let whole = |unwrapped_origin| {
        vec![AxisPiece {
            start: 0,
            end: page as u32,
            unwrapped_origin,
        }]
    };
    if wrap <= page_start {
        return whole(page_start + base);
    }
    if wrap >= page_end {
        return whole(page_start + base + resolution);
    }
    // Texels before the wrap belong to the far end of the footprint.
    let split = (wrap - page_start) as u32;
    vec![
        AxisPiece {
            start: 0,
            end: split,
            unwrapped_origin: page_start + base + resolution,
        },
        AxisPiece {
            start: split,
            end: page as u32,
            unwrapped_origin: page_start + base,
        },
    ]
}
