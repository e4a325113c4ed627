//! Clipmap index math.
//!
//! Pure functions mapping a world position to a cascade, a wrapped virtual UV
//! and a light-space depth. Cascades are nested: cascade `c` covers `2^c`
//! times the light-NDC footprint of cascade 0. The XY footprint of every
//! cascade is addressed toroidally (`frac`), anchored to world space rather
//! than to the camera, so pages stay valid while the camera drifts.

use glam::{Affine2, Mat4, UVec2, Vec2, Vec3};
use penumbra_core::math::frac;
use penumbra_core::{CascadeIndex, PageCoord, PageKey};

use crate::config::VsmConfig;

/// World position resolved against the clipmap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipmapSample {
    /// Cascade covering the position.
    pub cascade: CascadeIndex,
    /// Wrapped virtual texture coordinate in `[0, 1)`.
    pub uv: Vec2,
    /// Light-space depth (not wrapped).
    pub depth: f32,
}

impl ClipmapSample {
    /// Virtual texel inside the cascade's `resolution`² texture.
    #[inline]
    pub fn virtual_texel(&self, resolution: u32) -> UVec2 {
        let texel = (self.uv * resolution as f32).floor().as_uvec2();
        // uv < 1.0 can still round up to `resolution` after the multiply.
        texel.min(UVec2::splat(resolution - 1))
    }

    /// Page holding the sample and the texel offset inside that page.
    #[inline]
    pub fn page_and_offset(&self, config: &VsmConfig) -> (PageKey, UVec2) {
        let texel = self.virtual_texel(config.cascade_resolution());
        let page = config.page_resolution;
        (
            PageKey::new(self.cascade, PageCoord::from_texel(texel, page)),
            texel % page,
        )
    }
}

/// Project a world position into light NDC and scale XY into `cascade`.
#[inline]
pub fn light_ndc(world: Vec3, light_view_projection: Mat4, cascade: CascadeIndex) -> Vec3 {
    let ndc = light_view_projection.project_point3(world);
    Vec3::new(
        ndc.x * cascade.inv_scale(),
        ndc.y * cascade.inv_scale(),
        ndc.z,
    )
}

/// Smallest cascade `c` such that `max(|x|, |y|) / 2^c <= 1`.
///
/// Ties resolve to the finer cascade: a point exactly at `2^c` selects `c`.
/// Non-finite input returns `u32::MAX`.
pub fn clipmap_index_unbounded(ndc0: Vec3) -> u32 {
    let extent = ndc0.x.abs().max(ndc0.y.abs());
    if !extent.is_finite() {
        return u32::MAX;
    }
    if extent <= 1.0 {
        return 0;
    }

    let mut level = extent.log2().ceil().max(0.0) as i32;
    // log2 is not guaranteed exact; settle on the exact boundary.
    while level > 0 && extent <= 2f32.powi(level - 1) {
        level -= 1;
    }
    while extent > 2f32.powi(level) {
        level += 1;
    }
    level as u32
}

/// Cascade covering `ndc0`, or `None` outside the coarsest cascade.
#[inline]
pub fn select_cascade(ndc0: Vec3, cascade_count: u32) -> Option<CascadeIndex> {
    let level = clipmap_index_unbounded(ndc0);
    (level < cascade_count).then(|| CascadeIndex(level as u8))
}

/// Wrapped virtual UV for a cascade-scaled NDC position.
///
/// The light's translation (scaled into the cascade) is removed first so the
/// wrap is anchored to world space; depth passes through untouched.
pub fn virtual_uv(ndc: Vec3, light_view_projection: Mat4, cascade: CascadeIndex) -> Vec3 {
    let translation = light_translation(light_view_projection) * cascade.inv_scale();
    let xy = ndc.truncate() - translation;
    let uv = xy * Vec2::new(0.5, -0.5) + 0.5;
    Vec3::new(frac(uv.x), frac(uv.y), ndc.z)
}

/// Resolve a world position to cascade, wrapped UV and depth.
pub fn resolve(
    world: Vec3,
    light_view_projection: Mat4,
    cascade_count: u32,
) -> Option<ClipmapSample> {
    let ndc0 = light_ndc(world, light_view_projection, CascadeIndex::FINEST);
    let cascade = select_cascade(ndc0, cascade_count)?;
    let ndc = Vec3::new(
        ndc0.x * cascade.inv_scale(),
        ndc0.y * cascade.inv_scale(),
        ndc0.z,
    );
    let uv = virtual_uv(ndc, light_view_projection, cascade);
    Some(ClipmapSample {
        cascade,
        uv: uv.truncate(),
        depth: uv.z,
    })
}

/// Affine map from cascade NDC XY to *unwrapped* virtual texel coordinates.
///
/// Applying `frac` to the result divided by `resolution` gives the wrapped
/// texel used by [`virtual_uv`].
pub fn unwrapped_texel_transform(
    light_view_projection: Mat4,
    cascade: CascadeIndex,
    resolution: u32,
) -> Affine2 {
    let res = resolution as f32;
    let t = light_translation(light_view_projection) * cascade.inv_scale();
    Affine2::from_cols(
        Vec2::new(0.5 * res, 0.0),
        Vec2::new(0.0, -0.5 * res),
        Vec2::new((0.5 - 0.5 * t.x) * res, (0.5 + 0.5 * t.y) * res),
    )
}

#[inline]
fn light_translation(light_view_projection: Mat4) -> Vec2 {
    Vec2::new(light_view_projection.w_axis.x, light_view_projection.w_axis.y)
}
