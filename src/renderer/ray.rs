use nalgebra::{Point3, Unit, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Unit<Vector3<f32>>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Unit<Vector3<f32>>) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction.as_ref() * distance
    }
}

// 빛의 경로에 대한 정보만 담고, 색상은 나중에 재질로 알아냄
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitPayload {
    pub distance: f32,
    pub position: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
    /// Index of the sphere in scene order.
    pub sphere: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_walks_along_direction() {
        let ray = Ray::new(Point3::new(1.0, 2.0, 3.0), Vector3::x_axis());

        assert_eq!(ray.at(0.0), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(ray.at(2.5), Point3::new(3.5, 2.0, 3.0));
    }
}
