use thiserror::Error;

/// Everything the renderer core can reject. Shading itself never fails; these
/// are raised when the scene or the viewport is changed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LumenError {
    /// Zero sized viewports have no pixels to shade.
    #[error("invalid viewport {width}x{height}: both dimensions must be non-zero")]
    InvalidViewport { width: u32, height: u32 },

    /// The camera's ray cache and the output image disagree on the resolution.
    #[error("camera viewport {camera:?} does not match image size {image:?}")]
    ViewportMismatch { camera: (u32, u32), image: (u32, u32) },

    /// Camera settings that cannot produce a valid view.
    #[error("invalid camera: {0}")]
    InvalidCamera(String),

    /// A sphere would point at a material that does not exist (or no longer exists).
    #[error("scene consistency error: {0}")]
    SceneConsistency(String),

    /// A material parameter is outside of its domain.
    #[error("invalid material: {0}")]
    InvalidMaterial(String),
}

pub type Result<T> = std::result::Result<T, LumenError>;
