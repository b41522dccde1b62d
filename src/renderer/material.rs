use nalgebra::{Unit, Vector3};

use crate::error::{LumenError, Result};
use crate::random::{random_f32, random_unit_vector};
use crate::renderer::ray::{HitPayload, Ray};

// 표면에서 살짝 떨어뜨리는 거리
const SURFACE_OFFSET: f32 = 1e-3;
const NEAR_ZERO: f32 = 1e-8;

/// How a surface scatters light. Every variant only carries the parameters it uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialKind {
    /// Passes rays straight on; only its emission is visible.
    None,
    Lambertian {
        albedo: Vector3<f32>,
    },
    Metallic {
        albedo: Vector3<f32>,
        /// Fuzz applied around the mirror direction, in `[0, 1]`.
        metallicness: f32,
    },
    Dielectric {
        refractive_index: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    pub emission_color: Vector3<f32>,
    pub emission_strength: f32,
}

/// Outgoing ray of a scatter event, the factor applied to the path contribution,
/// and the seed for the next random draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scatter {
    pub ray: Ray,
    pub attenuation: Vector3<f32>,
    pub seed: u32,
}

impl Material {
    pub const RI_AIR: f32 = 1.0;
    pub const RI_WATER: f32 = 1.333;
    pub const RI_ICE: f32 = 1.31;
    pub const RI_GLASS: f32 = 1.52;
    pub const RI_DIAMOND: f32 = 2.417;

    pub fn new(name: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            name: name.into(),
            kind,
            emission_color: Vector3::repeat(1.0),
            emission_strength: 0.0,
        }
    }

    pub fn lambertian(name: impl Into<String>, albedo: Vector3<f32>) -> Self {
        Self::new(name, MaterialKind::Lambertian { albedo })
    }

    pub fn metallic(name: impl Into<String>, albedo: Vector3<f32>, metallicness: f32) -> Self {
        Self::new(name, MaterialKind::Metallic { albedo, metallicness })
    }

    pub fn dielectric(name: impl Into<String>, refractive_index: f32) -> Self {
        Self::new(name, MaterialKind::Dielectric { refractive_index })
    }

    pub fn with_emission(mut self, color: Vector3<f32>, strength: f32) -> Self {
        self.emission_color = color;
        self.emission_strength = strength;
        self
    }

    pub fn emission(&self) -> Vector3<f32> {
        self.emission_color * self.emission_strength
    }

    pub fn albedo(&self) -> Option<Vector3<f32>> {
        match self.kind {
            MaterialKind::Lambertian { albedo } | MaterialKind::Metallic { albedo, .. } => Some(albedo),
            _ => None,
        }
    }

    pub fn is_dielectric(&self) -> bool {
        matches!(self.kind, MaterialKind::Dielectric { .. })
    }

    /// Checks every parameter against its physical domain.
    pub fn validate(&self) -> Result<()> {
        let unit_color = |label: &str, color: &Vector3<f32>| {
            if color.iter().all(|c| c.is_finite() && (0.0..=1.0).contains(c)) {
                Ok(())
            } else {
                Err(LumenError::InvalidMaterial(format!(
                    "{}: {label} {:?} must lie in [0, 1]",
                    self.name,
                    color.as_slice()
                )))
            }
        };

        unit_color("emission color", &self.emission_color)?;
        if !self.emission_strength.is_finite() || self.emission_strength < 0.0 {
            return Err(LumenError::InvalidMaterial(format!(
                "{}: emission strength {} must be >= 0",
                self.name, self.emission_strength
            )));
        }

        match self.kind {
            MaterialKind::None => Ok(()),
            MaterialKind::Lambertian { albedo } => unit_color("albedo", &albedo),
            MaterialKind::Metallic { albedo, metallicness } => {
                unit_color("albedo", &albedo)?;
                if (0.0..=1.0).contains(&metallicness) {
                    Ok(())
                } else {
                    Err(LumenError::InvalidMaterial(format!(
                        "{}: metallicness {metallicness} must lie in [0, 1]",
                        self.name
                    )))
                }
            }
            MaterialKind::Dielectric { refractive_index } => {
                if refractive_index.is_finite() && refractive_index > 0.0 {
                    Ok(())
                } else {
                    Err(LumenError::InvalidMaterial(format!(
                        "{}: refractive index {refractive_index} must be > 0",
                        self.name
                    )))
                }
            }
        }
    }

    /// Bounces `ray` off the surface described by `hit`.
    ///
    /// Non-dielectric surfaces restart the ray slightly in front of the hit point
    /// (backed off along the incoming direction). Dielectrics skip that offset so
    /// a refracted ray starts inside the sphere; since only the near root of a
    /// sphere is ever reported, the ray then leaves the glass without hitting its
    /// far side.
    pub fn scatter(&self, ray: &Ray, hit: &HitPayload, seed: u32) -> Scatter {
        let nudged = hit.position - ray.direction.as_ref() * SURFACE_OFFSET;
        let normal = &hit.normal;

        match self.kind {
            MaterialKind::None => Scatter {
                ray: Ray::new(nudged, ray.direction),
                attenuation: Vector3::repeat(1.0),
                seed,
            },
            MaterialKind::Lambertian { albedo } => {
                let (random, seed) = random_unit_vector(seed);
                Scatter {
                    ray: Ray::new(nudged, diffuse_direction(normal, &random)),
                    attenuation: albedo,
                    seed,
                }
            }
            MaterialKind::Metallic { albedo, metallicness } => {
                let (random, seed) = random_unit_vector(seed);
                let reflected = reflect(&ray.direction, normal);
                let direction = Unit::try_new(reflected + random.as_ref() * metallicness, NEAR_ZERO)
                    .unwrap_or_else(|| Unit::new_normalize(reflected));

                // 표면 아래로 튀면 빛을 흡수한 것으로 봄. 경로는 그대로 계속됨
                let attenuation = if direction.dot(normal.as_ref()) > 0.0 {
                    albedo
                } else {
                    Vector3::repeat(1.0)
                };

                Scatter {
                    ray: Ray::new(nudged, direction),
                    attenuation,
                    seed,
                }
            }
            MaterialKind::Dielectric { refractive_index } => {
                let cos_incidence = (-ray.direction.as_ref()).dot(normal.as_ref());
                let refraction_ratio = if cos_incidence < 0.0 {
                    refractive_index
                } else {
                    1.0 / refractive_index
                };

                let cos_theta = cos_incidence.min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
                let can_refract = refraction_ratio * sin_theta <= 1.0;

                let (draw, seed) = random_f32(seed);
                let refracted = if can_refract && schlick_reflectance(cos_theta, refraction_ratio) <= draw {
                    refract(&ray.direction, normal, refraction_ratio)
                } else {
                    None
                };

                let ray = match refracted {
                    Some(direction) => Ray::new(hit.position + direction.as_ref() * SURFACE_OFFSET, direction),
                    None => Ray::new(hit.position, Unit::new_normalize(reflect(&ray.direction, normal))),
                };

                Scatter {
                    ray,
                    attenuation: Vector3::repeat(1.0),
                    seed,
                }
            }
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::lambertian("Material", Vector3::repeat(1.0))
    }
}

/// Schlick's approximation of the Fresnel reflectance.
pub fn schlick_reflectance(cosine: f32, ref_idx: f32) -> f32 {
    let r0 = ((1.0 - ref_idx) / (1.0 + ref_idx)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

pub fn reflect(direction: &Vector3<f32>, normal: &Vector3<f32>) -> Vector3<f32> {
    direction - normal * (2.0 * direction.dot(normal))
}

/// Snell refraction of a unit `direction`; `None` when no refracted ray exists.
pub fn refract(direction: &Vector3<f32>, normal: &Vector3<f32>, eta: f32) -> Option<Unit<Vector3<f32>>> {
    let cos_i = normal.dot(direction);
    let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return None;
    }

    Unit::try_new(direction * eta - normal * (eta * cos_i + k.sqrt()), NEAR_ZERO)
}

fn near_zero(v: &Vector3<f32>) -> bool {
    v.iter().all(|c| c.abs() < NEAR_ZERO)
}

fn diffuse_direction(normal: &Unit<Vector3<f32>>, random: &Unit<Vector3<f32>>) -> Unit<Vector3<f32>> {
    let scattered = normal.as_ref() + random.as_ref();
    if near_zero(&scattered) {
        return *normal;
    }
    Unit::new_normalize(scattered)
}
