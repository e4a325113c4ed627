//! Render error types.

use thiserror::Error;

/// Errors raised while rendering or writing images.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Image encoding or decoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shadow map error.
    #[error(transparent)]
    Vsm(#[from] penumbra_vsm::VsmError),

    /// Pixel data does not match the image dimensions.
    #[error("Invalid image data: {0}")]
    InvalidImageData(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
