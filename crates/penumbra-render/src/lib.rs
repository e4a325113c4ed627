//! Software rendering around the Penumbra virtual shadow map.
//!
//! This crate provides:
//! - A camera and minimal triangle scenes
//! - A CPU rasterizer for G-buffers and shadow pages
//! - Shadow sampling and Lambert shading
//! - Debug visualizations of the paging state
//! - Frame capture to image files

pub mod camera;
pub mod debug;
pub mod error;
pub mod raster;
pub mod scene;
pub mod screenshot;
pub mod shading;

pub use camera::Camera;
pub use debug::{render_debug, DebugMode};
pub use error::{RenderError, Result};
pub use raster::{render_gbuffer, GBuffer, ShadowRasterizer, BACKGROUND_DEPTH};
pub use scene::{Mesh, Scene};
pub use screenshot::{parse_frame_indices, save_image, CaptureConfig, CaptureLayers};
pub use shading::{shade, shadow_mask, ShadingConfig, ShadowMask};
