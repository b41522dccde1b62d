use log::debug;
use nalgebra::Vector4;

use crate::error::{LumenError, Result};
use crate::vec4_to_rgba;

/// Running per-pixel radiance sums and the packed image derived from them.
///
/// `frame_index` is the number of samples the next frame's mean is divided by:
/// it starts at 1 and is reset to 1 whenever the accumulated samples stop
/// being valid (camera motion, resize, explicit reset).
pub struct Accumulator {
    width: u32,
    height: u32,
    path_acc: Vec<Vector4<f32>>,
    pixels: Vec<u32>,
    frame_index: u32,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = pixel_count(width, height)?;

        Ok(Self {
            width,
            height,
            path_acc: vec![Vector4::zeros(); len],
            pixels: vec![0; len],
            frame_index: 1,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Packed RGBA8 pixels, row-major from the top-left corner.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Linear radiance sums of the current accumulation run.
    pub fn path_acc(&self) -> &[Vector4<f32>] {
        &self.path_acc
    }

    /// Reallocates both buffers. Returns `false` when the size did not change.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool> {
        let len = pixel_count(width, height)?;
        if self.width == width && self.height == height {
            return Ok(false);
        }

        self.width = width;
        self.height = height;
        self.path_acc = vec![Vector4::zeros(); len];
        self.pixels = vec![0; len];
        self.frame_index = 1;

        Ok(true)
    }

    pub fn reset(&mut self) {
        debug!("Resetting accumulated image data");
        self.frame_index = 1;
        self.clear();
    }

    /// Zeroes the sums when a new accumulation run starts.
    pub(crate) fn begin_frame(&mut self) {
        if self.frame_index == 1 {
            self.clear();
        }
    }

    pub(crate) fn end_frame(&mut self, accumulate: bool) {
        if accumulate {
            self.frame_index += 1;
        } else {
            self.frame_index = 1;
        }
    }

    /// Rows of the sum buffer paired with the matching rows of the packed image.
    pub(crate) fn rows_mut(&mut self) -> (usize, &mut [Vector4<f32>], &mut [u32]) {
        (self.width as usize, self.path_acc.as_mut_slice(), self.pixels.as_mut_slice())
    }

    fn clear(&mut self) {
        self.path_acc.iter_mut().for_each(|sum| *sum = Vector4::zeros());
    }
}

/// Adds `sample` into `sum` and returns the packed mean over `frame_index` samples.
pub fn accumulate(sum: &mut Vector4<f32>, sample: &Vector4<f32>, frame_index: u32) -> u32 {
    *sum += sample;
    let mean = *sum / frame_index as f32;
    vec4_to_rgba(&mean.map(|c| c.clamp(0.0, 1.0)))
}

/// Number of pixels of a `width` x `height` viewport. Both sides must be non-zero.
pub fn pixel_count(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .filter(|&len| len > 0)
        .ok_or(LumenError::InvalidViewport { width, height })
}
