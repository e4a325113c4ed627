//! Test harness for the Penumbra shadow engine.
//!
//! Provides CPU headless rendering and visual regression testing.

pub mod harness;

pub use harness::{
    create_test_camera, diff_image, image_difference, shadow_test_scene, HeadlessRenderer,
    RenderedFrame, VisualRegressionTest,
};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("Shadow map error: {0}")]
    Vsm(#[from] penumbra_vsm::VsmError),
    #[error("Render error: {0}")]
    Render(#[from] penumbra_render::RenderError),
    #[error("Image comparison failed: {0}")]
    ImageComparison(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, TestError>;

/// Visual regression test configuration.
#[derive(Debug, Clone)]
pub struct VisualTestConfig {
    /// Maximum allowed pixel difference (0.0-1.0).
    pub threshold: f64,
    /// Directory for baseline images.
    pub baseline_dir: PathBuf,
    /// Directory for test output images.
    pub output_dir: PathBuf,
    /// Frames rendered before the compared frame.
    pub warm_up_frames: u32,
}

impl Default for VisualTestConfig {
    fn default() -> Self {
        Self {
            threshold: 0.001,
            baseline_dir: PathBuf::from("assets/test_data/baselines"),
            output_dir: PathBuf::from("target/test_output"),
            warm_up_frames: 2,
        }
    }
}
