use log::debug;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use slotmap::{new_key_type, SlotMap};

use crate::error::{LumenError, Result};
use crate::random::random_vec;
use crate::renderer::material::{Material, MaterialKind};

new_key_type! {
    /// Generation-checked handle to a material of a [`Scene`].
    pub struct MaterialKey;
}

/// Creation-order id shown in the inspector. Not used for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SphereId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    pub position: Point3<f32>,
    /// Spheres with a radius of zero or less are never hit.
    pub radius: f32,
    material: MaterialKey,
    id: SphereId,
}

impl Sphere {
    pub fn material(&self) -> MaterialKey {
        self.material
    }

    pub fn id(&self) -> SphereId {
        self.id
    }
}

/// Spheres in trace order plus the materials they reference.
///
/// Every sphere's material key is checked when it is assigned and a material
/// cannot be removed while a sphere still uses it, so shading can index the
/// material table directly.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    spheres: Vec<Sphere>,
    materials: SlotMap<MaterialKey, Material>,
    next_sphere_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// The showcase scene: a sun, a huge ground sphere and three unit spheres.
    pub fn demo() -> Self {
        let mut scene = Self::new();
        // 전부 유효한 재질이므로 실패할 일이 없음
        let sun = scene.materials.insert(
            Material::lambertian("THE SUN", Vector3::repeat(1.0)).with_emission(Vector3::repeat(1.0), 50.0),
        );
        let blue = scene.materials.insert(Material::lambertian("Lambertian Blue", Vector3::new(0.2, 0.3, 1.0)));
        let green = Vector3::new(0.3, 0.8, 0.2);
        let green = scene
            .materials
            .insert(Material::lambertian("Green Light", green).with_emission(green, 30.0));
        let fuchsia = scene
            .materials
            .insert(Material::metallic("Metallic Fuschia", Vector3::new(1.0, 0.0, 0.6), 0.25));
        let glass = scene.materials.insert(Material::dielectric("Clear Glass", Material::RI_GLASS));

        scene.push_sphere(Point3::new(100.0, 50.0, -100.0), 20.0, sun);
        scene.push_sphere(Point3::new(0.0, -10001.0, 0.0), 10000.0, blue);
        scene.push_sphere(Point3::new(2.5, 0.0, 0.0), 1.0, green);
        scene.push_sphere(Point3::origin(), 1.0, fuchsia);
        scene.push_sphere(Point3::new(-2.5, 0.0, 0.0), 1.0, glass);

        scene
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn sphere(&self, index: usize) -> Option<&Sphere> {
        self.spheres.get(index)
    }

    /// Mutable access for position and radius edits; the material goes through
    /// [`Scene::set_sphere_material`].
    pub fn sphere_mut(&mut self, index: usize) -> Option<&mut Sphere> {
        self.spheres.get_mut(index)
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialKey, &Material)> {
        self.materials.iter()
    }

    pub fn material(&self, key: MaterialKey) -> Option<&Material> {
        self.materials.get(key)
    }

    /// Material of the sphere at `index`. Panics when `index` is out of range.
    pub fn material_of(&self, index: usize) -> &Material {
        &self.materials[self.spheres[index].material]
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn add_material(&mut self, material: Material) -> Result<MaterialKey> {
        material.validate()?;
        debug!("Adding material {}", material.name);
        Ok(self.materials.insert(material))
    }

    pub fn set_material(&mut self, key: MaterialKey, material: Material) -> Result<()> {
        material.validate()?;
        let slot = self
            .materials
            .get_mut(key)
            .ok_or_else(|| LumenError::SceneConsistency(format!("unknown material {key:?}")))?;
        *slot = material;
        Ok(())
    }

    pub fn remove_material(&mut self, key: MaterialKey) -> Result<Material> {
        if let Some(sphere) = self.spheres.iter().find(|sphere| sphere.material == key) {
            return Err(LumenError::SceneConsistency(format!(
                "material {key:?} is still used by sphere {}",
                sphere.id.0
            )));
        }

        self.materials
            .remove(key)
            .ok_or_else(|| LumenError::SceneConsistency(format!("unknown material {key:?}")))
    }

    pub fn add_sphere(&mut self, position: Point3<f32>, radius: f32, material: MaterialKey) -> Result<SphereId> {
        self.check_material(material)?;
        Ok(self.push_sphere(position, radius, material))
    }

    pub fn remove_sphere(&mut self, index: usize) -> Result<Sphere> {
        if index >= self.spheres.len() {
            return Err(LumenError::SceneConsistency(format!(
                "sphere index {index} out of range ({} spheres)",
                self.spheres.len()
            )));
        }
        Ok(self.spheres.remove(index))
    }

    pub fn set_sphere_material(&mut self, index: usize, material: MaterialKey) -> Result<()> {
        self.check_material(material)?;
        let count = self.spheres.len();
        let sphere = self.spheres.get_mut(index).ok_or_else(|| {
            LumenError::SceneConsistency(format!("sphere index {index} out of range ({count} spheres)"))
        })?;
        sphere.material = material;
        Ok(())
    }

    /// Sphere ids as strings, in trace order, for the inspector.
    pub fn sphere_labels(&self) -> Vec<String> {
        self.spheres.iter().map(|sphere| sphere.id.0.to_string()).collect()
    }

    pub fn material_labels(&self) -> Vec<String> {
        self.materials.values().map(|material| material.name.clone()).collect()
    }

    /// Scatters `count` small spheres over the ground, each with its own material.
    pub fn scatter_random_spheres<R: Rng + ?Sized>(&mut self, rng: &mut R, count: u32) {
        for i in 0..count {
            let albedo = random_vec(rng, 0.0f32..=1.0);
            let roll: f32 = rng.gen();

            // 70% lambertian, 10% emissive, 10% metallic, 10% glass
            let mut material = if roll < 0.7 {
                Material::lambertian(format!("Random {i}"), albedo)
            } else if roll < 0.8 {
                Material::lambertian(format!("Random Light {i}"), albedo)
                    .with_emission(albedo, rng.gen_range(10.0..20.0))
            } else if roll < 0.9 {
                Material::new(
                    format!("Random Metal {i}"),
                    MaterialKind::Metallic {
                        albedo,
                        metallicness: rng.gen_range(0.0..=1.0),
                    },
                )
            } else {
                Material::dielectric(format!("Random Glass {i}"), Material::RI_GLASS)
            };
            material.emission_color = albedo;

            let radius = rng.gen_range(0.05..0.2);
            let spot = random_vec(rng, -10.0f32..10.0);
            let key = self.materials.insert(material);
            self.push_sphere(Point3::new(spot.x, radius - 1.0, spot.z), radius, key);
        }
    }

    fn check_material(&self, key: MaterialKey) -> Result<()> {
        if self.materials.contains_key(key) {
            Ok(())
        } else {
            Err(LumenError::SceneConsistency(format!("unknown material {key:?}")))
        }
    }

    fn push_sphere(&mut self, position: Point3<f32>, radius: f32, material: MaterialKey) -> SphereId {
        let id = SphereId(self.next_sphere_id);
        self.next_sphere_id += 1;
        self.spheres.push(Sphere {
            position,
            radius,
            material,
            id,
        });
        id
    }
}
