use log::{info, trace};
use nalgebra::{Unit, Vector3, Vector4};
use rayon::prelude::*;

use crate::camera::Camera;
use crate::error::{LumenError, Result};
use crate::renderer::image::{accumulate, Accumulator};
use crate::renderer::ray::{HitPayload, Ray};
use crate::renderer::scene::{Scene, Sphere};

pub mod image;
pub mod material;
pub mod ray;
pub mod scene;

/// Hits closer than this are treated as the ray's own surface.
pub const HIT_EPSILON: f32 = 1e-8;

pub struct Settings {
    pub accumulate: bool,
    pub gamma_correct: bool,
    pub multithreaded: bool,
    pub skylight: bool,
    pub sky_color: Vector3<f32>,
    pub bounce_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accumulate: true,
            gamma_correct: true,
            multithreaded: true,
            skylight: true,
            sky_color: Vector3::new(0.6, 0.75, 1.0),
            bounce_limit: 16,
        }
    }
}

pub struct Renderer {
    image: Accumulator,
    pub settings: Settings,
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            image: Accumulator::new(width, height)?,
            settings: Default::default(),
        })
    }

    pub fn image(&self) -> &Accumulator {
        &self.image
    }

    pub fn pixels(&self) -> &[u32] {
        self.image.pixels()
    }

    pub fn frame_index(&self) -> u32 {
        self.image.frame_index()
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool> {
        let resized = self.image.resize(width, height)?;
        if resized {
            info!("Output resized to {width}x{height}");
        }
        Ok(resized)
    }

    pub fn reset_frame_index(&mut self) {
        self.image.reset();
    }

    /// Shades every pixel once, folds the samples into the running mean and
    /// returns the packed image.
    ///
    /// The camera's ray cache has to match the output size.
    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<&[u32]> {
        let size = (self.image.width(), self.image.height());
        if camera.viewport() != size {
            return Err(LumenError::ViewportMismatch {
                camera: camera.viewport(),
                image: size,
            });
        }

        self.image.begin_frame();
        let integrator = Integrator {
            scene,
            camera,
            settings: &self.settings,
            width: size.0,
            frame_index: self.image.frame_index(),
        };
        trace!("Rendering frame {} ({}x{})", integrator.frame_index, size.0, size.1);

        let (row_len, path_acc, pixels) = self.image.rows_mut();
        let shade_row = |(y, (acc_row, pixel_row)): (usize, (&mut [Vector4<f32>], &mut [u32]))| {
            for (x, (sum, pixel)) in acc_row.iter_mut().zip(pixel_row.iter_mut()).enumerate() {
                let color = integrator.per_pixel(x as u32, y as u32);
                *pixel = accumulate(sum, &color, integrator.frame_index);
            }
        };

        // 픽셀마다 자기 칸에만 쓰니까 행 단위로 나눠서 병렬 처리
        if self.settings.multithreaded {
            path_acc
                .par_chunks_mut(row_len)
                .zip(pixels.par_chunks_mut(row_len))
                .enumerate()
                .for_each(shade_row);
        } else {
            path_acc
                .chunks_mut(row_len)
                .zip(pixels.chunks_mut(row_len))
                .enumerate()
                .for_each(shade_row);
        }

        self.image.end_frame(self.settings.accumulate);

        Ok(self.image.pixels())
    }

    // DirectX의 RayGen 쉐이더와 같음
    pub fn per_pixel(&self, scene: &Scene, camera: &Camera, x: u32, y: u32) -> Vector4<f32> {
        Integrator {
            scene,
            camera,
            settings: &self.settings,
            width: self.image.width(),
            frame_index: self.image.frame_index(),
        }
        .per_pixel(x, y)
    }
}

/// Read-only view of everything one frame's shading pass needs.
pub struct Integrator<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub settings: &'a Settings,
    pub width: u32,
    pub frame_index: u32,
}

impl Integrator<'_> {
    pub fn per_pixel(&self, x: u32, y: u32) -> Vector4<f32> {
        let index = x as usize + y as usize * self.width as usize;

        let mut ray = Ray::new(self.camera.position(), self.camera.ray_directions()[index]);
        let mut light = Vector3::zeros();
        let mut contribution = Vector3::repeat(1.0);

        // 픽셀과 프레임마다 다른 시드
        let mut seed = (index as u32).wrapping_mul(self.frame_index);

        for bounce in 0..self.settings.bounce_limit {
            seed = seed.wrapping_add(bounce);

            let Some(hit) = trace_ray(&ray, self.scene) else {
                if self.settings.skylight {
                    light += self.settings.sky_color.component_mul(&contribution);
                }
                break;
            };

            let material = self.scene.material_of(hit.sphere);
            let scatter = material.scatter(&ray, &hit, seed);
            ray = scatter.ray;
            seed = scatter.seed;

            contribution.component_mul_assign(&scatter.attenuation);
            light += contribution.component_mul(&material.emission());
        }

        if self.settings.gamma_correct {
            light = light.map(|c| c.powf(1.0 / 2.2));
        }

        Vector4::new(light.x, light.y, light.z, 1.0)
    }
}

/// Closest sphere in front of the ray, by brute force over the whole scene.
///
/// Only the near root of each sphere is considered, so a ray that starts inside
/// a sphere never reports that sphere. Equal distances resolve to the sphere
/// that comes first in the scene.
pub fn trace_ray(ray: &Ray, scene: &Scene) -> Option<HitPayload> {
    let mut closest: Option<(usize, f32)> = None;

    for (index, sphere) in scene.spheres().iter().enumerate() {
        if sphere.radius <= 0.0 {
            continue;
        }

        // a = 빔 시작, b = 빔 방향, r = 구 반지름
        // 구가 원점에 있다고 가정하고, 대신 빔 시작점을 옮김
        let origin = ray.origin - sphere.position;
        let direction = ray.direction.as_ref();

        let a = direction.magnitude_squared();
        let half_b = origin.dot(direction);
        let c = origin.magnitude_squared() - sphere.radius * sphere.radius;

        // 판별식
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            continue;
        }

        let distance = (-half_b - discriminant.sqrt()) / a;
        if distance > HIT_EPSILON && closest.map_or(true, |(_, previous)| distance < previous) {
            closest = Some((index, distance));
        }
    }

    closest.map(|(index, distance)| closest_hit(ray, distance, index, &scene.spheres()[index]))
}

pub fn closest_hit(ray: &Ray, distance: f32, index: usize, sphere: &Sphere) -> HitPayload {
    let position = ray.at(distance);

    HitPayload {
        distance,
        position,
        normal: Unit::new_normalize(position - sphere.position),
        sphere: index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraSettings;
    use crate::renderer::material::Material;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::Point3;

    fn ray(origin: [f32; 3], direction: [f32; 3]) -> Ray {
        Ray::new(Point3::from(origin), Unit::new_normalize(Vector3::from(direction)))
    }

    fn scene_with(material: Material, spheres: &[([f32; 3], f32)]) -> Scene {
        let mut scene = Scene::new();
        let key = scene.add_material(material).unwrap();
        for (center, radius) in spheres {
            scene.add_sphere(Point3::from(*center), *radius, key).unwrap();
        }
        scene
    }

    fn blue() -> Material {
        Material::lambertian("Blue", Vector3::new(0.2, 0.3, 1.0))
    }

    fn setup(width: u32, height: u32, scene: Scene) -> (Renderer, Camera, Scene) {
        let renderer = Renderer::new(width, height).unwrap();
        let camera = Camera::new(CameraSettings::default(), width, height).unwrap();
        (renderer, camera, scene)
    }

    #[test]
    fn negative_discriminant_misses() {
        let scene = scene_with(blue(), &[([0.0, 0.0, 0.0], 1.0)]);
        assert!(trace_ray(&ray([0.0, 2.0, 5.0], [0.0, 0.0, -1.0]), &scene).is_none());
        assert!(trace_ray(&ray([0.0, 0.0, 5.0], [0.0, 1.0, 0.0]), &scene).is_none());
    }

    #[test]
    fn center_shot_hits_at_distance_minus_radius() {
        for (distance, radius) in [(5.0, 1.0), (10.0, 2.5), (3.0, 0.1), (42.0, 41.0)] {
            let scene = scene_with(blue(), &[([1.0, -2.0, 3.0], radius)]);
            let hit = trace_ray(&ray([1.0, -2.0, 3.0 + distance], [0.0, 0.0, -1.0]), &scene).unwrap();
            assert_relative_eq!(hit.distance, distance - radius, epsilon = 1e-4);
        }
    }

    #[test]
    fn normals_are_unit_and_outward() {
        let center = Point3::new(0.5, 0.25, -1.0);
        let scene = scene_with(blue(), &[([0.5, 0.25, -1.0], 1.5)]);

        let mut seed = 1;
        for _ in 0..200 {
            let (offset, next) = crate::random::random_unit_vector(seed);
            seed = next;
            let origin = center + offset.as_ref() * 6.0;
            let aim = Unit::new_normalize(center - origin + Vector3::new(0.3, -0.2, 0.1));

            if let Some(hit) = trace_ray(&Ray::new(origin, aim), &scene) {
                assert_relative_eq!(hit.normal.norm(), 1.0, epsilon = 1e-5);
                assert!(hit.normal.dot(&(hit.position - center)) > 0.0);
                assert_relative_eq!((hit.position - center).norm(), 1.5, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn nearest_sphere_wins_and_ties_go_to_scene_order() {
        let scene = scene_with(blue(), &[([0.0, 0.0, -10.0], 1.0), ([0.0, 0.0, -4.0], 1.0)]);
        let hit = trace_ray(&ray([0.0, 0.0, 0.0], [0.0, 0.0, -1.0]), &scene).unwrap();
        assert_eq!(hit.sphere, 1);

        let twins = scene_with(blue(), &[([0.0, 0.0, -4.0], 1.0), ([0.0, 0.0, -4.0], 1.0)]);
        let hit = trace_ray(&ray([0.0, 0.0, 0.0], [0.0, 0.0, -1.0]), &twins).unwrap();
        assert_eq!(hit.sphere, 0);
    }

    #[test]
    fn spheres_behind_or_around_the_origin_are_ignored() {
        let behind = scene_with(blue(), &[([0.0, 0.0, 5.0], 1.0)]);
        assert!(trace_ray(&ray([0.0, 0.0, 0.0], [0.0, 0.0, -1.0]), &behind).is_none());

        // only the near root counts, so the inside of a sphere is invisible
        let around = scene_with(blue(), &[([0.0, 0.0, 0.0], 2.0)]);
        assert!(trace_ray(&ray([0.0, 0.0, 0.0], [0.0, 0.0, -1.0]), &around).is_none());
    }

    #[test]
    fn degenerate_radius_is_inert() {
        let scene = scene_with(blue(), &[([0.0, 0.0, -5.0], 0.0), ([0.0, 0.0, -5.0], -1.0)]);
        assert!(trace_ray(&ray([0.0, 0.0, 0.0], [0.0, 0.0, -1.0]), &scene).is_none());
    }

    #[test]
    fn single_pixel_center_ray_hits_at_four() {
        let (_, camera, scene) = setup(1, 1, scene_with(blue(), &[([0.0, 0.0, 0.0], 1.0)]));
        let center = Ray::new(camera.position(), camera.ray_directions()[0]);

        let hit = trace_ray(&center, &scene).unwrap();
        assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-4);
    }

    #[test]
    fn diffuse_bounce_into_the_sky_is_tinted_by_albedo() {
        let (renderer, camera, scene) = setup(1, 1, scene_with(blue(), &[([0.0, 0.0, 0.0], 1.0)]));

        let color = renderer.per_pixel(&scene, &camera, 0, 0);

        let sky = Settings::default().sky_color;
        let expected = sky.component_mul(&Vector3::new(0.2, 0.3, 1.0)).map(|c| c.powf(1.0 / 2.2));
        assert_relative_eq!(color.xyz(), expected, epsilon = 1e-5);
        assert_eq!(color.w, 1.0);
    }

    #[test]
    fn empty_scene_shows_the_sky() {
        let (mut renderer, camera, scene) = setup(1, 1, Scene::new());
        renderer.settings.gamma_correct = false;
        assert_eq!(renderer.per_pixel(&scene, &camera, 0, 0).xyz(), Settings::default().sky_color);

        renderer.settings.skylight = false;
        assert_eq!(renderer.per_pixel(&scene, &camera, 0, 0), Vector4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn glass_sphere_passes_the_sky_through_untouched() {
        let glass = Material::dielectric("Glass", Material::RI_GLASS);
        let (mut renderer, camera, scene) = setup(1, 1, scene_with(glass, &[([0.0, 0.0, 0.0], 1.0)]));
        renderer.settings.gamma_correct = false;

        // reflection and refraction both leave the sphere without a second hit
        for frame_index in 1..64 {
            let integrator = Integrator {
                scene: &scene,
                camera: &camera,
                settings: &renderer.settings,
                width: 1,
                frame_index,
            };
            assert_eq!(integrator.per_pixel(0, 0), Vector4::new(0.6, 0.75, 1.0, 1.0));
        }
    }

    #[test]
    fn emission_is_scaled_by_contribution() {
        let lamp = Material::lambertian("Lamp", Vector3::new(0.5, 1.0, 1.0))
            .with_emission(Vector3::new(0.25, 0.5, 1.0), 2.0);
        let (mut renderer, camera, scene) = setup(1, 1, scene_with(lamp, &[([0.0, 0.0, 0.0], 1.0)]));
        renderer.settings.gamma_correct = false;
        renderer.settings.skylight = false;

        let color = renderer.per_pixel(&scene, &camera, 0, 0);
        assert_abs_diff_eq!(color, Vector4::new(0.25, 1.0, 2.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn frames_without_accumulation_are_identical() {
        let (mut renderer, camera, scene) = setup(8, 6, Scene::demo());
        renderer.settings.accumulate = false;

        let first = renderer.render(&scene, &camera).unwrap().to_vec();
        assert_eq!(renderer.frame_index(), 1);
        let second = renderer.render(&scene, &camera).unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn accumulation_advances_frame_index() {
        let (mut renderer, camera, scene) = setup(4, 4, Scene::demo());
        for expected in 2..6 {
            renderer.render(&scene, &camera).unwrap();
            assert_eq!(renderer.frame_index(), expected);
        }
    }

    #[test]
    fn sequential_and_parallel_passes_agree() {
        let (mut parallel, camera, scene) = setup(12, 7, Scene::demo());
        let mut sequential = Renderer::new(12, 7).unwrap();
        sequential.settings.multithreaded = false;

        for _ in 0..3 {
            let a = parallel.render(&scene, &camera).unwrap().to_vec();
            let b = sequential.render(&scene, &camera).unwrap().to_vec();
            assert_eq!(a, b);
        }
        assert_eq!(parallel.image().path_acc(), sequential.image().path_acc());
    }

    #[test]
    fn reset_restarts_the_running_mean() {
        let (mut renderer, camera, scene) = setup(4, 4, Scene::demo());
        renderer.render(&scene, &camera).unwrap();
        renderer.render(&scene, &camera).unwrap();

        renderer.reset_frame_index();
        assert_eq!(renderer.frame_index(), 1);
        assert!(renderer.image().path_acc().iter().all(|sum| *sum == Vector4::zeros()));

        // the next frame holds exactly one sample again
        renderer.settings.accumulate = false;
        let fresh = renderer.render(&scene, &camera).unwrap().to_vec();
        let again = renderer.render(&scene, &camera).unwrap().to_vec();
        assert_eq!(fresh, again);
    }

    #[test]
    fn running_mean_settles_down() {
        let (mut renderer, camera, scene) = setup(6, 6, Scene::demo());
        let mut previous = vec![Vector4::<f32>::zeros(); 36];
        let mut deltas = Vec::new();

        for frame in 1..=64u32 {
            renderer.render(&scene, &camera).unwrap();
            let mean: Vec<Vector4<f32>> = renderer
                .image()
                .path_acc()
                .iter()
                .map(|sum| sum / frame as f32)
                .collect();
            if frame > 1 {
                let delta: f32 = mean.iter().zip(&previous).map(|(a, b)| (a - b).norm()).sum();
                deltas.push(delta);
            }
            previous = mean;
        }

        let early: f32 = deltas[..8].iter().sum();
        let late: f32 = deltas[deltas.len() - 8..].iter().sum();
        assert!(late < early, "late {late} >= early {early}");
    }

    #[test]
    fn mismatched_camera_is_rejected() {
        let (mut renderer, _, scene) = setup(4, 4, Scene::demo());
        let camera = Camera::new(CameraSettings::default(), 2, 2).unwrap();
        assert!(matches!(
            renderer.render(&scene, &camera),
            Err(LumenError::ViewportMismatch { .. })
        ));
        assert_eq!(renderer.frame_index(), 1);
    }
}
