//! Viewer loop: orbit camera, shadow map frames, image capture.

use anyhow::{bail, Context};
use glam::Vec3;
use penumbra_render::{
    render_debug, render_gbuffer, save_image, shade, shadow_mask, CaptureConfig, CaptureLayers,
    Camera, DebugMode, Scene, ShadingConfig, ShadowRasterizer,
};
use penumbra_vsm::{EvictionPolicy, FrameInputs, VirtualShadowMap, VsmConfig};
use tracing::{debug, info};

/// Orbit radius around the scene center.
const ORBIT_RADIUS: f32 = 14.0;

/// Camera height above the ground.
const ORBIT_HEIGHT: f32 = 6.0;

/// Orbit angle advanced per frame, in radians.
const ORBIT_STEP: f32 = 0.02;

/// Options from the command line.
#[derive(Debug, Clone)]
pub struct ViewerParams {
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub light: Option<Vec3>,
    pub debug_mode: DebugMode,
    pub capture: CaptureConfig,
    pub vsm: VsmConfig,
}

impl Default for ViewerParams {
    fn default() -> Self {
        Self {
            frame_count: 120,
            width: 640,
            height: 360,
            light: None,
            debug_mode: DebugMode::None,
            capture: CaptureConfig::default(),
            vsm: VsmConfig::default(),
        }
    }
}

impl ViewerParams {
    /// Parse from a slice of arguments; the first one is the program name.
    pub fn parse_args(args: &[String]) -> anyhow::Result<Self> {
        let mut params = Self::default();
        let mut frames_given = false;

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut value = || next_value(args, &mut i, flag);
            match flag {
                "-n" | "--count" => params.frame_count = parse_number(flag, value()?)?,
                "-f" | "--frames" => {
                    let frames = penumbra_render::parse_frame_indices(value()?)
                        .map_err(anyhow::Error::msg)?;
                    params.capture.frames = frames;
                    frames_given = true;
                }
                "-o" | "--output" => params.capture.output_dir = value()?.into(),
                "--width" => params.width = parse_number(flag, value()?)?,
                "--height" => params.height = parse_number(flag, value()?)?,
                "--mask" => params.capture.layers |= CaptureLayers::MASK,
                "--debug" => {
                    params.debug_mode = value()?.parse().map_err(anyhow::Error::msg)?;
                    params.capture.layers |= CaptureLayers::DEBUG;
                }
                "--pool" => params.vsm.physical_pages_per_axis = parse_number(flag, value()?)?,
                "--cascades" => params.vsm.cascade_count = parse_number(flag, value()?)?,
                "--light" => params.light = Some(parse_vec3(value()?)?),
                "--evict-least-recent" => params.vsm.eviction = EvictionPolicy::LeastRecent,
                other => bail!("unknown option '{other}' (see --help)"),
            }
            i += 1;
        }

        if params.frame_count == 0 {
            bail!("--count must be at least 1");
        }
        if params.width == 0 || params.height == 0 {
            bail!("image size must be non-zero");
        }
        if !frames_given {
            params.capture.frames.insert(params.frame_count - 1);
        }
        Ok(params)
    }
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .with_context(|| format!("{flag} expects a value"))
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> anyhow::Result<T> {
    value
        .parse()
        .ok()
        .with_context(|| format!("{flag}: '{value}' is not a valid number"))
}

fn parse_vec3(value: &str) -> anyhow::Result<Vec3> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("'{value}' is not a comma separated vector"))?;
    match parts.as_slice() {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => bail!("'{value}' needs exactly three components"),
    }
}

/// Viewer state.
pub struct Viewer {
    params: ViewerParams,
    scene: Scene,
    vsm: VirtualShadowMap,
    shading: ShadingConfig,
}

impl Viewer {
    pub fn new(params: ViewerParams) -> anyhow::Result<Self> {
        let mut scene = Scene::demo();
        if let Some(light) = params.light {
            scene = scene.with_light(light);
        }
        let vsm = VirtualShadowMap::new(params.vsm.clone())
            .context("failed to initialize the virtual shadow map")?;
        info!(
            frames = params.frame_count,
            width = params.width,
            height = params.height,
            debug = params.debug_mode.name(),
            output = %params.capture.output_dir.display(),
            "Viewer initialized"
        );
        Ok(Self {
            params,
            scene,
            vsm,
            shading: ShadingConfig::default(),
        })
    }

    /// Run every frame, capturing the requested ones.
    pub fn run(mut self) -> anyhow::Result<()> {
        let aspect = self.params.width as f32 / self.params.height as f32;
        let mut starved_frames = 0u64;

        for frame in 0..self.params.frame_count {
            let _span = tracing::trace_span!("viewer.frame", frame).entered();
            let camera = Camera::orbit(
                Vec3::ZERO,
                ORBIT_RADIUS,
                ORBIT_HEIGHT,
                frame as f32 * ORBIT_STEP,
                aspect,
            );
            let stats = self.render(frame, &camera)?;
            if stats.allocation.starved > 0 {
                starved_frames += 1;
            }
            if self.params.capture.all_captured(frame) {
                debug!(frame, "All captures written");
                break;
            }
        }

        info!(
            resident = self.vsm.pool().used_count(),
            capacity = self.vsm.pool().capacity(),
            starved_frames,
            "Viewer finished"
        );
        Ok(())
    }

    fn render(&mut self, frame: u64, camera: &Camera) -> anyhow::Result<penumbra_vsm::FrameStats> {
        let gbuffer = render_gbuffer(&self.scene, camera, self.params.width, self.params.height);
        let inputs = FrameInputs {
            camera_position: camera.position,
            light_direction: self.scene.light_direction,
        };
        let stats = {
            let depth = gbuffer.depth_view()?;
            self.vsm
                .run_frame(inputs, &depth, &ShadowRasterizer::new(&self.scene))?
        };
        debug!(
            frame,
            visible = stats.visible_pages,
            allocated = stats.allocation.allocated,
            evicted = stats.allocation.evicted,
            starved = stats.allocation.starved,
            "Frame complete"
        );

        let capture = &self.params.capture;
        if !capture.should_capture(frame) {
            return Ok(stats);
        }

        let sampler = self.vsm.sampler()?;
        let mask = shadow_mask(&gbuffer, &sampler, self.vsm.config(), &self.shading);
        if capture.wants(CaptureLayers::SHADED) {
            let shaded = shade(&gbuffer, &mask, self.scene.light_direction, &self.shading);
            save_image(&shaded, capture.layer_path(frame, CaptureLayers::SHADED))?;
        }
        if capture.wants(CaptureLayers::MASK) {
            let image = mask.to_image(image::Rgba([64, 96, 160, 255]));
            save_image(&image, capture.layer_path(frame, CaptureLayers::MASK))?;
        }
        if capture.wants(CaptureLayers::DEBUG) {
            if let Some(image) = render_debug(self.params.debug_mode, &self.vsm, &gbuffer)? {
                save_image(&image, capture.layer_path(frame, CaptureLayers::DEBUG))?;
            }
        }
        info!(
            frame,
            shadowed = format!("{:.1}%", mask.shadowed_fraction() * 100.0),
            "Captured frame"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("penumbra-viewer")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_capture_the_last_frame() {
        let params = ViewerParams::parse_args(&args(&["-n", "10"])).unwrap();
        assert_eq!(params.frame_count, 10);
        assert!(params.capture.should_capture(9));
        assert!(!params.capture.should_capture(8));
        assert_eq!(params.capture.layers, CaptureLayers::SHADED);
        assert_eq!(params.vsm.eviction, EvictionPolicy::ExpiredOnly);
    }

    #[test]
    fn parses_shadow_map_options() {
        let params = ViewerParams::parse_args(&args(&[
            "--pool",
            "6",
            "--cascades",
            "4",
            "--light",
            "0, 1, 0.5",
            "--debug",
            "occupancy",
            "--evict-least-recent",
        ]))
        .unwrap();
        assert_eq!(params.vsm.physical_pages_per_axis, 6);
        assert_eq!(params.vsm.cascade_count, 4);
        assert_eq!(params.light, Some(Vec3::new(0.0, 1.0, 0.5)));
        assert_eq!(params.debug_mode, DebugMode::CascadeOccupancy);
        assert!(params.capture.wants(CaptureLayers::DEBUG));
        assert_eq!(params.vsm.eviction, EvictionPolicy::LeastRecent);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ViewerParams::parse_args(&args(&["--light", "1,2"])).is_err());
        assert!(ViewerParams::parse_args(&args(&["--pool", "many"])).is_err());
        assert!(ViewerParams::parse_args(&args(&["--pool"])).is_err());
        assert!(ViewerParams::parse_args(&args(&["--debug", "heatmap"])).is_err());
        assert!(ViewerParams::parse_args(&args(&["--frobnicate"])).is_err());
        assert!(ViewerParams::parse_args(&args(&["-n", "0"])).is_err());
    }
}
