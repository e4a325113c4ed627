//! Software triangle rasterizer.
//!
//! Produces the camera G-buffer consumed by the mark-visible and shading
//! passes, and implements [`ShadowCaster`] so the same scene can be drawn into
//! virtual shadow map pages.

use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
use penumbra_core::math::Aabb;
use penumbra_core::TexelRect;
use penumbra_vsm::{DepthView, PageRenderRequest, ShadowCaster};
use rayon::prelude::*;

use crate::camera::Camera;
use crate::scene::Scene;

/// Depth at or beyond which a pixel is background.
pub const BACKGROUND_DEPTH: f32 = 1.0;

/// Per-pixel camera output: depth, surface normal and albedo.
#[derive(Clone, Debug)]
pub struct GBuffer {
    width: u32,
    height: u32,
    depth: Vec<f32>,
    normal: Vec<Vec3>,
    albedo: Vec<Vec3>,
    inverse_view_projection: Mat4,
}

impl GBuffer {
    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Clip depth per pixel, row-major.
    #[inline]
    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    #[inline]
    pub fn normal(&self, x: u32, y: u32) -> Vec3 {
        self.normal[self.index(x, y)]
    }

    #[inline]
    pub fn albedo(&self, x: u32, y: u32) -> Vec3 {
        self.albedo[self.index(x, y)]
    }

    /// Depth buffer view for the mark-visible pass.
    pub fn depth_view(&self) -> penumbra_vsm::Result<DepthView<'_>> {
        DepthView::new(
            self.width,
            self.height,
            &self.depth,
            self.inverse_view_projection,
        )
    }

    /// World position behind pixel `(x, y)`, or `None` for background.
    pub fn world_position(&self, x: u32, y: u32) -> Option<Vec3> {
        let depth = self.depth[self.index(x, y)];
        if !(depth < BACKGROUND_DEPTH) {
            return None;
        }
        let ndc = Vec3::new(
            (x as f32 + 0.5) / self.width as f32 * 2.0 - 1.0,
            1.0 - (y as f32 + 0.5) / self.height as f32 * 2.0,
            depth,
        );
        Some(self.inverse_view_projection.project_point3(ndc))
    }

    /// Number of foreground pixels.
    pub fn coverage(&self) -> usize {
        self.depth.iter().filter(|&&d| d < BACKGROUND_DEPTH).count()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }
}

/// Camera-space triangle already mapped to pixel coordinates.
#[derive(Clone, Copy, Debug)]
struct ScreenTriangle {
    /// Pixel x, pixel y, clip depth.
    vertices: [Vec3; 3],
    normal: Vec3,
    albedo: Vec3,
    min_y: f32,
    max_y: f32,
}

/// Rasterize `scene` as seen from `camera`.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub fn render_gbuffer(scene: &Scene, camera: &Camera, width: u32, height: u32) -> GBuffer {
    let _span = tracing::trace_span!("raster.gbuffer").entered();
    let view_projection = camera.view_projection_matrix();
    let frustum = camera.frustum();
    let size = Vec2::new(width as f32, height as f32);

    let mut triangles = Vec::new();
    for mesh in scene.meshes.iter().filter(|m| frustum.test_aabb(&m.bounds())) {
        for [a, b, c] in mesh.triangles() {
            let normal = (b - a).cross(c - a).normalize_or_zero();
            let polygon = clip_near([a, b, c].map(|p| view_projection * p.extend(1.0)));
            for i in 1..polygon.len().saturating_sub(1) {
                let vertices =
                    [polygon[0], polygon[i], polygon[i + 1]].map(|v| to_pixel(v, size));
                let (min_y, max_y) = vertices
                    .iter()
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(v.y), hi.max(v.y))
                    });
                triangles.push(ScreenTriangle {
                    vertices,
                    normal,
                    albedo: mesh.albedo,
                    min_y,
                    max_y,
                });
            }
        }
    }

    let pixels = (width * height) as usize;
    let mut depth = vec![BACKGROUND_DEPTH; pixels];
    let mut normal = vec![Vec3::ZERO; pixels];
    let mut albedo = vec![Vec3::ZERO; pixels];
    let row_len = width as usize;

    depth
        .par_chunks_mut(row_len)
        .zip(normal.par_chunks_mut(row_len))
        .zip(albedo.par_chunks_mut(row_len))
        .enumerate()
        .for_each(|(y, ((depth_row, normal_row), albedo_row))| {
            let y = y as u32;
            let center = y as f32 + 0.5;
            let clip = TexelRect::new(UVec2::new(0, y), UVec2::new(width, y + 1));
            for tri in triangles
                .iter()
                .filter(|t| t.min_y <= center && t.max_y >= center)
            {
                rasterize_triangle(tri.vertices, clip, |x, _, z| {
                    let i = x as usize;
                    // Camera faces front-to-back: nearest wins; [0, 1] only.
                    if (0.0..depth_row[i]).contains(&z) {
                        depth_row[i] = z;
                        normal_row[i] = tri.normal;
                        albedo_row[i] = tri.albedo;
                    }
                });
            }
        });

    GBuffer {
        width,
        height,
        depth,
        normal,
        albedo,
        inverse_view_projection: view_projection.inverse(),
    }
}

/// Clip a triangle in homogeneous clip space against the near plane `z >= 0`.
fn clip_near(triangle: [Vec4; 3]) -> Vec<Vec4> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let current = triangle[i];
        let next = triangle[(i + 1) % 3];
        let inside_current = current.z >= 0.0;
        let inside_next = next.z >= 0.0;
        if inside_current {
            out.push(current);
        }
        if inside_current != inside_next {
            let t = current.z / (current.z - next.z);
            out.push(current + (next - current) * t);
        }
    }
    out
}

fn to_pixel(clip: Vec4, size: Vec2) -> Vec3 {
    let ndc = clip.truncate() / clip.w;
    Vec3::new(
        (ndc.x * 0.5 + 0.5) * size.x,
        (0.5 - ndc.y * 0.5) * size.y,
        ndc.z,
    )
}

/// Visit every pixel of `clip` whose center lies inside the triangle.
///
/// Vertices are `(pixel x, pixel y, depth)`; depth is interpolated linearly in
/// screen space. Both windings are accepted.
pub fn rasterize_triangle(vertices: [Vec3; 3], clip: TexelRect, mut plot: impl FnMut(u32, u32, f32)) {
    let [v0, v1, v2] = vertices;
    let area = edge(v0, v1, v2.truncate());
    if !area.is_finite() || area.abs() < 1e-12 || clip.is_empty() {
        return;
    }
    let inv_area = 1.0 / area;

    let min = v0.truncate().min(v1.truncate()).min(v2.truncate());
    let max = v0.truncate().max(v1.truncate()).max(v2.truncate());
    let x0 = (min.x - 0.5).ceil().max(clip.min.x as f32);
    let y0 = (min.y - 0.5).ceil().max(clip.min.y as f32);
    let x1 = (max.x - 0.5).floor().min(clip.max.x as f32 - 1.0);
    let y1 = (max.y - 0.5).floor().min(clip.max.y as f32 - 1.0);
    if x1 < x0 || y1 < y0 {
        return;
    }

    for y in y0 as u32..=y1 as u32 {
        for x in x0 as u32..=x1 as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(v1, v2, p) * inv_area;
            let w1 = edge(v2, v0, p) * inv_area;
            let w2 = edge(v0, v1, p) * inv_area;
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                plot(x, y, w0 * v0.z + w1 * v1.z + w2 * v2.z);
            }
        }
    }
}

#[inline]
fn edge(a: Vec3, b: Vec3, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Draws scene geometry into shadow map pages.
#[derive(Clone, Copy, Debug)]
pub struct ShadowRasterizer<'a> {
    scene: &'a Scene,
}

impl<'a> ShadowRasterizer<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }
}

impl ShadowCaster for ShadowRasterizer<'_> {
    fn render_page(&self, request: &PageRenderRequest, target: &mut [f32]) {
        let page = request.page_resolution;
        let view_projection = request.view_projection;

        // Light NDC rectangle covered by each region.
        let region_bounds: Vec<(Vec2, Vec2)> = request
            .regions
            .iter()
            .map(|region| {
                let to_ndc = region.ndc_to_texel.inverse();
                let a = to_ndc.transform_point2(region.clip.min.as_vec2());
                let b = to_ndc.transform_point2(region.clip.max.as_vec2());
                (a.min(b), a.max(b))
            })
            .collect();

        for mesh in &self.scene.meshes {
            let bounds = mesh.bounds().transformed(view_projection);
            if !region_bounds.iter().any(|r| overlaps(&bounds, *r)) {
                continue;
            }
            for [a, b, c] in mesh.triangles() {
                let ndc = [a, b, c].map(|p| view_projection.project_point3(p));
                let tri_bounds = Aabb::from_points(ndc);
                for (region, r) in request.regions.iter().zip(&region_bounds) {
                    if !overlaps(&tri_bounds, *r) {
                        continue;
                    }
                    let texels = ndc.map(|p| {
                        region
                            .ndc_to_texel
                            .transform_point2(p.truncate())
                            .extend(p.z)
                    });
                    rasterize_triangle(texels, region.clip, |x, y, z| {
                        let texel = &mut target[(y * page + x) as usize];
                        *texel = texel.min(z);
                    });
                }
            }
        }
    }
}

fn overlaps(bounds: &Aabb, (min, max): (Vec2, Vec2)) -> bool {
    bounds.min.x <= max.x && bounds.max.x >= min.x && bounds.min.y <= max.y && bounds.max.y >= min.y
}
