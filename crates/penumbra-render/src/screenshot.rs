//! Frame capture to image files.
//!
//! A [`CaptureConfig`] names the frames to write and which layers (shaded
//! image, shadow mask, debug view) each capture contains.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use image::RgbaImage;
use tracing::info;

use crate::error::{RenderError, Result};

bitflags! {
    /// Image layers written for each captured frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CaptureLayers: u8 {
        /// Lit scene.
        const SHADED = 1 << 0;
        /// Per-pixel shadow factor.
        const MASK = 1 << 1;
        /// Active debug visualization.
        const DEBUG = 1 << 2;
    }
}

impl CaptureLayers {
    fn suffix(self) -> &'static str {
        if self == Self::MASK {
            "mask"
        } else if self == Self::DEBUG {
            "debug"
        } else {
            "shaded"
        }
    }
}

/// Which frames to capture and where to put them.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Directory receiving the images.
    pub output_dir: PathBuf,
    /// Frame indices to capture. Empty captures nothing.
    pub frames: BTreeSet<u64>,
    /// Layers written per captured frame.
    pub layers: CaptureLayers,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("captures"),
            frames: BTreeSet::new(),
            layers: CaptureLayers::SHADED,
        }
    }
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Add frames to capture.
    #[must_use]
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// Set the captured layers.
    #[must_use]
    pub fn with_layers(mut self, layers: CaptureLayers) -> Self {
        self.layers = layers;
        self
    }

    /// Path of one layer of one frame.
    pub fn layer_path(&self, frame: u64, layer: CaptureLayers) -> PathBuf {
        self.output_dir
            .join(format!("frame_{frame:04}_{}.png", layer.suffix()))
    }

    /// Whether `frame` should be written at all.
    pub fn should_capture(&self, frame: u64) -> bool {
        self.frames.contains(&frame)
    }

    /// Whether `frame` is past the last requested capture.
    pub fn all_captured(&self, frame: u64) -> bool {
        self.frames.last().is_some_and(|&last| frame > last)
    }

    /// Whether `layer` is enabled for captures.
    pub fn wants(&self, layer: CaptureLayers) -> bool {
        self.layers.contains(layer)
    }
}

/// Parse frame indices from a string like `"0,5,10-15,20"`.
///
/// Ranges are inclusive. Empty parts are skipped; anything else that is not a
/// number or a range is an error.
pub fn parse_frame_indices(s: &str) -> std::result::Result<BTreeSet<u64>, String> {
    let mut frames = BTreeSet::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let parse = |n: &str| {
            n.trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid frame index '{n}'"))
        };
        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(format!("empty frame range '{part}'"));
                }
                frames.extend(start..=end);
            }
            None => {
                frames.insert(parse(part)?);
            }
        }
    }
    Ok(frames)
}

/// Save an image, creating parent directories as needed.
pub fn save_image(image: &RgbaImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    info!("Saved {}", path.display());
    Ok(())
}

/// Wrap raw RGBA bytes into an image.
pub fn image_from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<RgbaImage> {
    let len = data.len();
    RgbaImage::from_raw(width, height, data).ok_or_else(|| {
        RenderError::InvalidImageData(format!(
            "{len} bytes do not form a {width}x{height} RGBA image"
        ))
    })
}
