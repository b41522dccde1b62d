use bytemuck::cast_slice;
use log::{debug, warn};
use winit::event::WindowEvent;

use crate::camera::{Camera, CameraSettings};
use crate::error::{LumenError, Result};
use crate::renderer::scene::Scene;
use crate::renderer::Renderer;

/// Whatever puts the finished frame on screen (a texture upload, a file, a test capture).
pub trait DisplaySink {
    /// `pixels` holds `width * height` packed RGBA8 values, row-major from the top-left.
    fn present(&mut self, width: u32, height: u32, pixels: &[u32]);
}

/// Owns the scene, the camera and the renderer and keeps them in step:
/// camera motion, field of view changes and resizes invalidate the accumulated
/// image, and the camera's ray cache always matches the output size before a
/// frame is shaded.
pub struct App {
    pub scene: Scene,
    pub camera: Camera,
    pub renderer: Renderer,
    frame_count: u64,
}

impl App {
    pub fn new(scene: Scene, camera_settings: CameraSettings, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            scene,
            camera: Camera::new(camera_settings, width, height)?,
            renderer: Renderer::new(width, height)?,
            frame_count: 0,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.camera.viewport()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Resizes the camera and the output together. Zero sizes are rejected and
    /// leave everything untouched.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            warn!("Ignoring resize to {width}x{height}");
            return Err(LumenError::InvalidViewport { width, height });
        }

        self.camera.resize(width, height)?;
        if self.renderer.resize(width, height)? {
            self.renderer.reset_frame_index();
        }

        Ok(())
    }

    // true: 카메라가 입력을 처리했음
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        self.camera.input(event)
    }

    /// Advances the camera by one frame of `delta_time` seconds.
    pub fn update(&mut self, delta_time: f32) -> bool {
        let moved = self.camera.update(delta_time);
        if moved {
            debug!("Camera moved, restarting accumulation");
            self.renderer.reset_frame_index();
        }
        moved
    }

    pub fn render(&mut self) -> Result<&[u32]> {
        self.frame_count += 1;
        self.renderer.render(&self.scene, &self.camera)
    }

    /// Renders one frame and hands it to `sink`.
    pub fn render_to(&mut self, sink: &mut impl DisplaySink) -> Result<()> {
        let (width, height) = self.size();
        let pixels = self.render()?;
        sink.present(width, height, pixels);
        Ok(())
    }

    pub fn reset_accumulation(&mut self) {
        self.renderer.reset_frame_index();
    }

    /// Current frame as RGBA8 bytes, ready for a texture upload.
    pub fn frame_bytes(&self) -> &[u8] {
        cast_slice(self.renderer.pixels())
    }
}
