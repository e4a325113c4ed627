//! Virtual shadow map error types.

use glam::Vec3;
use thiserror::Error;

use crate::frame::FramePhase;

/// Errors raised by the virtual shadow map engine.
#[derive(Error, Debug)]
pub enum VsmError {
    /// Configuration rejected at initialization.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pass was invoked before the passes it depends on.
    #[error("Pass order violated: expected phase {expected:?}, found {found:?}")]
    PassOrder {
        expected: FramePhase,
        found: FramePhase,
    },

    /// Light direction is zero or not finite.
    #[error("Light direction {0} is not a usable direction")]
    InvalidLightDirection(Vec3),

    /// Depth buffer dimensions disagree with its data.
    #[error("Depth buffer holds {found} texels, expected {expected}")]
    DepthBufferSize { expected: usize, found: usize },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, VsmError>;
