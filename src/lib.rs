use nalgebra::Vector4;

pub mod app;
pub mod camera;
pub mod error;
pub mod random;
pub mod renderer;

pub use app::{App, DisplaySink};
pub use camera::{Camera, CameraSettings, Movement};
pub use error::{LumenError, Result};
pub use renderer::material::{Material, MaterialKind};
pub use renderer::scene::{MaterialKey, Scene, Sphere, SphereId};
pub use renderer::{Renderer, Settings};

/// Packs a color in `[0, 1]^4` as RGBA8, red in the lowest byte.
pub fn vec4_to_rgba(color: &Vector4<f32>) -> u32 {
    let [r, g, b, a] = [color.x, color.y, color.z, color.w].map(|c| (c * 255.0) as u8 as u32);
    r | (g << 8) | (b << 16) | (a << 24)
}
