//! Headless rendering and visual regression testing.
//!
//! Everything runs on the CPU: the rasterizer produces the camera G-buffer,
//! the virtual shadow map runs its passes against it and the shading pass
//! turns the result into an image that can be compared against baselines.

use std::path::Path;

use glam::Vec3;
use image::{Rgba, RgbaImage};
use penumbra_render::{
    render_gbuffer, shade, shadow_mask, shading::offset_receiver, Camera, GBuffer, Mesh, Scene,
    ShadingConfig, ShadowMask, ShadowRasterizer,
};
use penumbra_vsm::{FrameInputs, FrameStats, VirtualShadowMap, VsmConfig};

use crate::{Result, TestError, VisualTestConfig};

/// Output of one rendered frame.
pub struct RenderedFrame {
    pub gbuffer: GBuffer,
    pub mask: ShadowMask,
    pub shaded: RgbaImage,
    pub stats: FrameStats,
}

/// Headless renderer for testing.
///
/// Owns a virtual shadow map that persists across frames, so consecutive
/// calls exercise page reuse the same way an interactive loop does.
pub struct HeadlessRenderer {
    vsm: VirtualShadowMap,
    shading: ShadingConfig,
    width: u32,
    height: u32,
}

impl HeadlessRenderer {
    /// Create a new headless renderer.
    pub fn new(config: VsmConfig, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            vsm: VirtualShadowMap::new(config)?,
            shading: ShadingConfig::default(),
            width,
            height,
        })
    }

    /// Set the shading parameters.
    #[must_use]
    pub fn with_shading(mut self, shading: ShadingConfig) -> Self {
        self.shading = shading;
        self
    }

    /// Run one full frame and shade it.
    pub fn render_frame(&mut self, scene: &Scene, camera: &Camera) -> Result<RenderedFrame> {
        let gbuffer = render_gbuffer(scene, camera, self.width, self.height);
        let inputs = FrameInputs {
            camera_position: camera.position,
            light_direction: scene.light_direction,
        };
        let stats = {
            let depth = gbuffer.depth_view()?;
            self.vsm
                .run_frame(inputs, &depth, &ShadowRasterizer::new(scene))?
        };

        let sampler = self.vsm.sampler()?;
        let mask = shadow_mask(&gbuffer, &sampler, self.vsm.config(), &self.shading);
        let shaded = shade(&gbuffer, &mask, scene.light_direction, &self.shading);
        Ok(RenderedFrame {
            gbuffer,
            mask,
            shaded,
            stats,
        })
    }

    /// Render `frames` frames and return the last one.
    pub fn render_frames(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        frames: u32,
    ) -> Result<RenderedFrame> {
        let mut frame = self.render_frame(scene, camera)?;
        for _ in 1..frames {
            frame = self.render_frame(scene, camera)?;
        }
        Ok(frame)
    }

    /// Shadow factor at a surface point, offset along its normal like the
    /// shading pass does.
    pub fn shadow_factor_at(&self, world: Vec3, normal: Vec3) -> Result<f32> {
        let sampler = self.vsm.sampler()?;
        let receiver = offset_receiver(
            &sampler,
            self.vsm.config(),
            world,
            normal,
            self.shading.normal_offset_texels,
        );
        Ok(sampler.sample_shadow_factor(receiver))
    }

    /// Whether the page covering `world` is backed by a physical slot.
    pub fn is_resident(&self, world: Vec3) -> Result<bool> {
        let sampler = self.vsm.sampler()?;
        Ok(sampler.locate(world).is_some_and(|l| l.slot.is_some()))
    }

    /// The shadow map engine.
    pub fn vsm(&self) -> &VirtualShadowMap {
        &self.vsm
    }

    /// Mutable access to the shadow map engine.
    pub fn vsm_mut(&mut self) -> &mut VirtualShadowMap {
        &mut self.vsm
    }

    /// Get the output dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Visual regression test runner.
///
/// Compares shaded images against baseline images and reports differences.
pub struct VisualRegressionTest {
    config: VisualTestConfig,
    renderer: HeadlessRenderer,
}

impl VisualRegressionTest {
    /// Create a runner rendering 256x256 images.
    pub fn new(config: VisualTestConfig, vsm: VsmConfig) -> Result<Self> {
        Self::with_dimensions(config, vsm, 256, 256)
    }

    /// Create with custom dimensions.
    pub fn with_dimensions(
        config: VisualTestConfig,
        vsm: VsmConfig,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let renderer = HeadlessRenderer::new(vsm, width, height)?;
        Ok(Self { config, renderer })
    }

    /// Render `scene` after the configured warm-up and compare it with the
    /// baseline called `name`. A missing baseline is created.
    pub fn run_test(&mut self, name: &str, scene: &Scene, camera: &Camera) -> Result<()> {
        let frame = self
            .renderer
            .render_frames(scene, camera, self.config.warm_up_frames + 1)?;
        self.compare_and_save(name, &frame.shaded)
    }

    fn compare_and_save(&self, name: &str, image: &RgbaImage) -> Result<()> {
        std::fs::create_dir_all(&self.config.baseline_dir)?;
        std::fs::create_dir_all(&self.config.output_dir)?;

        let baseline_path = self.config.baseline_dir.join(format!("{name}.png"));
        let output_path = self.config.output_dir.join(format!("{name}.png"));
        image.save(&output_path)?;

        if !baseline_path.exists() {
            image.save(&baseline_path)?;
            tracing::info!("Created new baseline: {}", baseline_path.display());
            return Ok(());
        }

        let baseline = load_rgba(&baseline_path)?;
        let diff = image_difference(&baseline, image)?;
        if diff > self.config.threshold {
            let diff_path = self.config.output_dir.join(format!("{name}_diff.png"));
            diff_image(&baseline, image).save(&diff_path)?;
            return Err(TestError::ImageComparison(format!(
                "Image difference {diff:.4} exceeds threshold {:.4} (see {})",
                self.config.threshold,
                diff_path.display()
            )));
        }
        Ok(())
    }

    pub fn renderer(&self) -> &HeadlessRenderer {
        &self.renderer
    }
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}

/// Normalized RGB difference of two images (0.0-1.0).
pub fn image_difference(a: &RgbaImage, b: &RgbaImage) -> Result<f64> {
    if a.dimensions() != b.dimensions() {
        return Err(TestError::ImageComparison(format!(
            "Image dimensions don't match: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }
    let total: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| {
            (0..3)
                .map(|c| u64::from(pa[c].abs_diff(pb[c])))
                .sum::<u64>()
        })
        .sum();
    let max = u64::from(a.width()) * u64::from(a.height()) * 3 * 255;
    if max == 0 {
        return Ok(0.0);
    }
    Ok(total as f64 / max as f64)
}

/// Differences above a small tolerance in red over the dimmed first image.
pub fn diff_image(a: &RgbaImage, b: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(a.width(), a.height(), |x, y| {
        let pa = a.get_pixel(x, y);
        let Some(pb) = b.get_pixel_checked(x, y) else {
            return Rgba([255, 0, 255, 255]);
        };
        let max = (0..3).map(|c| pa[c].abs_diff(pb[c])).max().unwrap_or(0);
        if max > 10 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([pa[0] / 2, pa[1] / 2, pa[2] / 2, 255])
        }
    })
}

/// Ground plane with a slab floating above the origin.
pub fn shadow_test_scene(light_direction: Vec3) -> Scene {
    Scene::new()
        .with_light(light_direction)
        .with_mesh(Mesh::plane(Vec3::ZERO, 20.0))
        .with_mesh(
            Mesh::cuboid(Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.5, 0.15, 1.5))
                .with_albedo(Vec3::new(0.8, 0.3, 0.25)),
        )
}

/// Square-aspect camera looking at the origin from `distance` away.
pub fn create_test_camera(distance: f32) -> Camera {
    let position = Vec3::new(0.0, 0.6, 0.8) * distance;
    Camera::looking_at(position, Vec3::ZERO, 1.0)
}
