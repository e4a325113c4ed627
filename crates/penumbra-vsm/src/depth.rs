//! Camera depth buffer input.

use glam::{Mat4, Vec3};

use crate::error::{Result, VsmError};

/// Borrowed camera depth buffer with the matrix needed to unproject it.
///
/// Depth is `[0, 1]` clip depth; texels at `1.0` or beyond are background.
#[derive(Clone, Copy, Debug)]
pub struct DepthView<'a> {
    width: u32,
    height: u32,
    depth: &'a [f32],
    inverse_view_projection: Mat4,
}

impl<'a> DepthView<'a> {
    /// Wrap a row-major depth buffer.
    pub fn new(
        width: u32,
        height: u32,
        depth: &'a [f32],
        inverse_view_projection: Mat4,
    ) -> Result<Self> {
        let expected = width as usize * height as usize;
        if depth.len() != expected {
            return Err(VsmError::DepthBufferSize {
                expected,
                found: depth.len(),
            });
        }
        Ok(Self {
            width,
            height,
            depth,
            inverse_view_projection,
        })
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw depth texels.
    #[inline]
    pub const fn depth(&self) -> &'a [f32] {
        self.depth
    }

    /// One row of depth texels.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [f32] {
        let w = self.width as usize;
        &self.depth[y as usize * w..(y as usize + 1) * w]
    }

    /// World position seen through pixel `(x, y)`, or `None` for background.
    pub fn world_position(&self, x: u32, y: u32) -> Option<Vec3> {
        let depth = self.depth[(y * self.width + x) as usize];
        self.unproject(x, y, depth)
    }

    pub(crate) fn unproject(&self, x: u32, y: u32, depth: f32) -> Option<Vec3> {
        if !(depth < 1.0) {
            return None;
        }
        let ndc_x = (x as f32 + 0.5) / self.width as f32 * 2.0 - 1.0;
        let ndc_y = 1.0 - (y as f32 + 0.5) / self.height as f32 * 2.0;
        let world = self
            .inverse_view_projection
            .project_point3(Vec3::new(ndc_x, ndc_y, depth));
        world.is_finite().then_some(world)
    }
}
