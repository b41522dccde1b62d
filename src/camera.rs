use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Unit, Vector2, Vector3, Vector4};
use rayon::prelude::*;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent};

use crate::error::{LumenError, Result};
use crate::renderer::image::pixel_count;

const FOV_RANGE: (f32, f32) = (10.0, 90.0);
const PITCH_LIMIT: f32 = 89.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Vertical field of view in degrees.
    pub vertical_fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Point3<f32>,
    pub forward: Vector3<f32>,
    /// World units per second.
    pub movement_speed: f32,
    /// Degrees per pixel of mouse travel.
    pub mouse_sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            vertical_fov: 60.0,
            near: 0.1,
            far: 100.0,
            position: Point3::new(0.0, 0.0, 5.0),
            forward: Vector3::new(0.0, 0.0, -1.0),
            movement_speed: 2.0,
            mouse_sensitivity: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Forward,
    Left,
    Backward,
    Right,
    Up,
    Down,
}

pub struct Camera {
    projection: Perspective3<f32>,
    inverse_projection: Matrix4<f32>,
    view: Isometry3<f32>,
    inverse_view: Isometry3<f32>,

    vertical_fov: f32,
    near: f32,
    far: f32,

    position: Point3<f32>,
    forward: Unit<Vector3<f32>>,
    // degrees
    yaw: f32,
    pitch: f32,

    rays: Vec<Unit<Vector3<f32>>>,
    last_mouse: Option<PhysicalPosition<f64>>,
    mouse_delta: Vector2<f32>,

    viewport_size: PhysicalSize<u32>,

    // WASD SPACE SHIFT
    inputs: [bool; 6],
    rotating: bool,
    // FOV가 바뀌었는데 아직 update에서 보고되지 않음
    projection_changed: bool,
    movement_speed: f32,
    mouse_sensitivity: f32,
}

impl Camera {
    pub fn new(settings: CameraSettings, width: u32, height: u32) -> Result<Self> {
        pixel_count(width, height)?;

        let initial = Unit::try_new(settings.forward, f32::EPSILON)
            .filter(|forward| forward.iter().all(|c| c.is_finite()))
            .ok_or_else(|| LumenError::InvalidCamera(format!("forward vector {:?}", settings.forward.as_slice())))?;
        // 각도로 되돌려서 pitch 제한을 forward에도 반영
        let pitch = (-initial.y).clamp(-1.0, 1.0).asin().to_degrees().clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let yaw = initial.z.atan2(initial.x).to_degrees();
        let forward = forward_from_angles(yaw, pitch);
        let vertical_fov = settings.vertical_fov.clamp(FOV_RANGE.0, FOV_RANGE.1);

        let viewport_size = PhysicalSize::new(width, height);
        let projection = perspective(viewport_size, vertical_fov, settings.near, settings.far);
        let view = look_at(&settings.position, &forward);

        let mut to_return = Self {
            projection,
            inverse_projection: projection.inverse(),
            view,
            inverse_view: view.inverse(),
            vertical_fov,
            near: settings.near,
            far: settings.far,
            position: settings.position,
            forward,
            yaw,
            pitch,
            rays: vec![],
            last_mouse: None,
            mouse_delta: Vector2::zeros(),
            viewport_size,
            inputs: [false; 6],
            rotating: false,
            projection_changed: false,
            movement_speed: settings.movement_speed,
            mouse_sensitivity: settings.mouse_sensitivity,
        };

        to_return.reevaluate_rays();

        Ok(to_return)
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn forward(&self) -> Unit<Vector3<f32>> {
        self.forward
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn vertical_fov(&self) -> f32 {
        self.vertical_fov
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_size.width, self.viewport_size.height)
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection.to_homogeneous()
    }

    pub fn inverse_projection(&self) -> &Matrix4<f32> {
        &self.inverse_projection
    }

    pub fn view(&self) -> Matrix4<f32> {
        self.view.to_homogeneous()
    }

    pub fn inverse_view(&self) -> Matrix4<f32> {
        self.inverse_view.to_homogeneous()
    }

    /// World-space ray direction of every pixel, row-major from the top-left.
    pub fn ray_directions(&self) -> &[Unit<Vector3<f32>>] {
        &self.rays
    }

    /// Feeds a window event to the camera. Returns `true` when the camera used it.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(*position);
                self.rotating
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => {
                self.set_rotating(*state == ElementState::Pressed);
                true
            }
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode: Some(key),
                        ..
                    },
                ..
            } => {
                let movement = match key {
                    VirtualKeyCode::W => Movement::Forward,
                    VirtualKeyCode::A => Movement::Left,
                    VirtualKeyCode::S => Movement::Backward,
                    VirtualKeyCode::D => Movement::Right,
                    VirtualKeyCode::Space => Movement::Up,
                    VirtualKeyCode::LShift => Movement::Down,
                    _ => {
                        return false;
                    }
                };
                self.set_movement(movement, *state == ElementState::Pressed);

                true
            }
            _ => false,
        }
    }

    pub fn set_movement(&mut self, movement: Movement, held: bool) {
        self.inputs[movement as usize] = held;
    }

    /// Mouse look is only active while the rotate button is held.
    pub fn set_rotating(&mut self, rotating: bool) {
        self.rotating = rotating;
        if !rotating {
            self.mouse_delta = Vector2::zeros();
        }
    }

    pub fn cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        if let Some(last) = self.last_mouse {
            if self.rotating {
                self.mouse_delta += Vector2::new((position.x - last.x) as f32, (position.y - last.y) as f32);
            }
        }
        self.last_mouse = Some(position);
    }

    /// Applies held keys and pending mouse travel. Returns `true` when the camera
    /// moved or its field of view changed since the last update, in which case
    /// any accumulated image is stale.
    pub fn update(&mut self, delta_time: f32) -> bool {
        let fov_changed = std::mem::take(&mut self.projection_changed);
        let mut rebuild = false;

        if self.rotating && self.mouse_delta != Vector2::zeros() {
            self.yaw += self.mouse_delta.x * self.mouse_sensitivity;
            self.pitch = (self.pitch + self.mouse_delta.y * self.mouse_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
            self.forward = forward_from_angles(self.yaw, self.pitch);
            rebuild = true;
        }
        self.mouse_delta = Vector2::zeros();

        let up = Vector3::y();
        let right = self.forward.cross(&up).normalize();
        let step = self.movement_speed * delta_time;

        let directions = [
            self.forward.into_inner(),
            -right,
            -self.forward.into_inner(),
            right,
            up,
            -up,
        ];
        for (held, direction) in self.inputs.iter().zip(directions) {
            if *held {
                self.position += direction * step;
                rebuild = true;
            }
        }

        if rebuild {
            self.reevaluate_view();
            self.reevaluate_rays();
        }

        fov_changed || rebuild
    }

    /// Returns `false` when the viewport already had this size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool> {
        pixel_count(width, height)?;
        let new_size = PhysicalSize::new(width, height);
        if new_size == self.viewport_size {
            return Ok(false);
        }

        self.viewport_size = new_size;

        self.reevaluate_projection();
        self.reevaluate_view();
        self.reevaluate_rays();

        Ok(true)
    }

    /// Clamped to 10..=90 degrees. Returns `true` when the projection changed;
    /// the next [`Camera::update`] then reports motion as well.
    pub fn set_vertical_fov(&mut self, degrees: f32) -> bool {
        let degrees = degrees.clamp(FOV_RANGE.0, FOV_RANGE.1);
        if degrees == self.vertical_fov {
            return false;
        }

        self.vertical_fov = degrees;
        self.projection_changed = true;
        self.reevaluate_projection();
        self.reevaluate_rays();

        true
    }

    fn reevaluate_projection(&mut self) {
        self.projection = perspective(self.viewport_size, self.vertical_fov, self.near, self.far);
        self.inverse_projection = self.projection.inverse();
    }

    fn reevaluate_view(&mut self) {
        self.view = look_at(&self.position, &self.forward);
        self.inverse_view = self.view.inverse();
    }

    fn reevaluate_rays(&mut self) {
        let PhysicalSize { width, height } = self.viewport_size;
        let (width, height) = (width as usize, height as usize);

        self.rays = (0..width * height)
            .into_par_iter()
            .map(|index| {
                let y = index / width;
                let x = index % width;

                // 픽셀 중심을 NDC로, 위쪽 행이 +1
                let coord = Vector2::new(
                    (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
                    1.0 - (y as f32 + 0.5) / height as f32 * 2.0,
                );

                let target = self.inverse_projection * Vector4::new(coord.x, coord.y, 1.0, 1.0);
                let view_direction = (target.xyz() / target.w).normalize();

                Unit::new_normalize(self.inverse_view.transform_vector(&view_direction))
            })
            .collect();
    }
}

fn perspective(viewport_size: PhysicalSize<u32>, vertical_fov: f32, near: f32, far: f32) -> Perspective3<f32> {
    let aspect = viewport_size.width as f32 / viewport_size.height as f32;
    Perspective3::new(aspect, vertical_fov.to_radians(), near, far)
}

fn look_at(position: &Point3<f32>, forward: &Unit<Vector3<f32>>) -> Isometry3<f32> {
    let target = position + forward.as_ref();
    Isometry3::look_at_rh(position, &target, &Vector3::y())
}

fn forward_from_angles(yaw: f32, pitch: f32) -> Unit<Vector3<f32>> {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Unit::new_normalize(Vector3::new(
        yaw.cos() * pitch.cos(),
        -pitch.sin(),
        yaw.sin() * pitch.cos(),
    ))
}
