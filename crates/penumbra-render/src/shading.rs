//! Shadow mask and lit image from a G-buffer and a shadow sampler.

use glam::Vec3;
use image::{Rgba, RgbaImage};
use penumbra_vsm::{ShadowSampler, VsmConfig};
use rayon::prelude::*;

use crate::raster::GBuffer;

/// Shading parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadingConfig {
    /// Receiver offset along the surface normal, in texels of the sampled cascade.
    pub normal_offset_texels: f32,
    /// Ambient light term.
    pub ambient: f32,
    /// Color written for background pixels.
    pub sky: Vec3,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            normal_offset_texels: 2.0,
            ambient: 0.25,
            sky: Vec3::new(0.55, 0.7, 0.9),
        }
    }
}

/// Per-pixel shadow factor; `None` marks background.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowMask {
    pub width: u32,
    pub height: u32,
    pub factors: Vec<Option<f32>>,
}

impl ShadowMask {
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        self.factors[(y * self.width + x) as usize]
    }

    /// Fraction of foreground pixels in shadow.
    pub fn shadowed_fraction(&self) -> f32 {
        let (shadowed, total) = self
            .factors
            .iter()
            .flatten()
            .fold((0usize, 0usize), |(s, t), &f| (s + usize::from(f < 0.5), t + 1));
        if total == 0 {
            0.0
        } else {
            shadowed as f32 / total as f32
        }
    }

    /// White for lit, black for shadowed, the given color for background.
    pub fn to_image(&self, background: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| match self.get(x, y) {
            Some(f) => {
                let v = (f * 255.0) as u8;
                Rgba([v, v, v, 255])
            }
            None => background,
        })
    }
}

/// Receiver position pushed off the surface by a few cascade texels.
pub fn offset_receiver(
    sampler: &ShadowSampler<'_>,
    config: &VsmConfig,
    world: Vec3,
    normal: Vec3,
    texels: f32,
) -> Vec3 {
    let Some(location) = sampler.locate(world) else {
        return world;
    };
    world + normal * config.texel_world_size(location.key.cascade) * texels
}

/// Sample the shadow factor of every foreground pixel.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub fn shadow_mask(
    gbuffer: &GBuffer,
    sampler: &ShadowSampler<'_>,
    config: &VsmConfig,
    shading: &ShadingConfig,
) -> ShadowMask {
    let _span = tracing::trace_span!("shading.shadow_mask").entered();
    let width = gbuffer.width();
    let mut factors = vec![None; (width * gbuffer.height()) as usize];
    factors
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            for (x, factor) in row.iter_mut().enumerate() {
                let x = x as u32;
                *factor = gbuffer.world_position(x, y).map(|world| {
                    let receiver = offset_receiver(
                        sampler,
                        config,
                        world,
                        gbuffer.normal(x, y),
                        shading.normal_offset_texels,
                    );
                    sampler.sample_shadow_factor(receiver)
                });
            }
        });
    ShadowMask {
        width,
        height: gbuffer.height(),
        factors,
    }
}

/// Lambert shading with the shadow factor applied to the direct term.
pub fn shade(
    gbuffer: &GBuffer,
    mask: &ShadowMask,
    light_direction: Vec3,
    shading: &ShadingConfig,
) -> RgbaImage {
    let light = light_direction.normalize_or_zero();
    RgbaImage::from_fn(gbuffer.width(), gbuffer.height(), |x, y| {
        let color = match mask.get(x, y) {
            Some(factor) => {
                let normal = gbuffer.normal(x, y);
                let diffuse = normal.dot(light).max(0.0) * factor;
                gbuffer.albedo(x, y) * (shading.ambient + (1.0 - shading.ambient) * diffuse)
            }
            None => shading.sky,
        };
        let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
        Rgba([c.x as u8, c.y as u8, c.z as u8, 255])
    })
}
