//! Page-snapped light view-projection.
//!
//! The shadow camera follows the viewer, but only in whole-page steps of
//! cascade 0. Between steps the XY footprint of the light matrix does not
//! change, so backed pages keep addressing the same world region while the
//! camera moves.

use glam::{IVec2, Mat4, Vec2, Vec3};

use crate::config::VsmConfig;
use crate::error::{Result, VsmError};
use penumbra_core::CascadeIndex;

/// Light matrices resolved for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightProjection {
    direction: Vec3,
    view_projection: Mat4,
    page_offset: IVec2,
    aligned_ndc: Vec2,
}

impl LightProjection {
    /// Derive the light projection for `direction` (pointing towards the light)
    /// and the camera at `camera_position`.
    ///
    /// The camera is projected with a light view anchored at the world origin,
    /// snapped up to the next page boundary in NDC and only then translated
    /// back into world space to place the shadow camera.
    pub fn new(direction: Vec3, camera_position: Vec3, config: &VsmConfig) -> Result<Self> {
        let direction = direction.try_normalize().ok_or(VsmError::InvalidLightDirection(direction))?;
        let up = light_up(direction);
        let extent = config.cascade_size_0;
        let projection = Mat4::orthographic_rh(
            -extent,
            extent,
            -extent,
            extent,
            -config.depth_range,
            config.depth_range,
        );

        let origin_view = Mat4::look_at_rh(Vec3::ZERO, -direction, up);
        let origin_view_projection = projection * origin_view;

        let camera_ndc = origin_view_projection.project_point3(camera_position);
        let page_ndc = config.page_ndc();
        let page_offset = (camera_ndc.truncate() / page_ndc).ceil().as_ivec2();
        let aligned_ndc = page_offset.as_vec2() * page_ndc;

        let aligned_world = origin_view_projection
            .inverse()
            .project_point3(aligned_ndc.extend(camera_ndc.z));
        let shadow_camera = aligned_world + direction * config.light_distance;

        let view = Mat4::look_at_rh(shadow_camera, shadow_camera - direction, up);
        Ok(Self {
            direction,
            view_projection: projection * view,
            page_offset,
            aligned_ndc,
        })
    }

    /// Wrap an arbitrary light matrix, for tests that need exact translations.
    #[cfg(test)]
    pub(crate) fn from_view_projection(view_projection: Mat4) -> Self {
        Self {
            direction: Vec3::Z,
            view_projection,
            page_offset: IVec2::ZERO,
            aligned_ndc: Vec2::ZERO,
        }
    }

    /// Normalized direction towards the light.
    #[inline]
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Light view-projection of cascade 0.
    #[inline]
    pub const fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// Light view-projection with XY scaled into `cascade`.
    pub fn cascade_view_projection(&self, cascade: CascadeIndex) -> Mat4 {
        let s = cascade.inv_scale();
        Mat4::from_scale(Vec3::new(s, s, 1.0)) * self.view_projection
    }

    /// Camera position in whole pages of cascade 0.
    #[inline]
    pub const fn page_offset(&self) -> IVec2 {
        self.page_offset
    }

    /// Page-snapped camera position in light NDC.
    #[inline]
    pub const fn aligned_ndc(&self) -> Vec2 {
        self.aligned_ndc
    }

    /// Uniform block for shader consumers.
    pub fn constants(&self, config: &VsmConfig) -> ShadowConstants {
        ShadowConstants {
            light_view_projection: self.view_projection.to_cols_array_2d(),
            light_direction: self.direction.extend(0.0).to_array(),
            page_offset: [self.page_offset.x, self.page_offset.y, 0, 0],
            layout: [
                config.page_resolution,
                config.page_table_resolution,
                config.cascade_count,
                config.physical_pages_per_axis,
            ],
        }
    }
}

/// Shadow uniform buffer data.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowConstants {
    pub light_view_projection: [[f32; 4]; 4],
    pub light_direction: [f32; 4],
    pub page_offset: [i32; 4],
    /// Page resolution, page table resolution, cascade count, pool slots per axis.
    pub layout: [u32; 4],
}

fn light_up(direction: Vec3) -> Vec3 {
    // Z up, unless the light looks straight along it.
    if direction.z.abs() > 0.999 {
        Vec3::Y
    } else {
        Vec3::Z
    }
}
