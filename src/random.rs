use nalgebra::{Unit, Vector3};
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::Rng;
use std::ops::RangeBounds;

// PCG 해시. 상태를 공유하지 않으니 스레드마다 잠글 필요가 없음
pub fn pcg_hash(seed: u32) -> u32 {
    let state = seed.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277803737);
    (word >> 22) ^ word
}

/// Uniform value in `[0, 1]` together with the seed for the next draw.
pub fn random_f32(seed: u32) -> (f32, u32) {
    let next = pcg_hash(seed);
    (next as f32 / u32::MAX as f32, next)
}

/// Random direction on the unit sphere, derived from `seed`.
///
/// Draws a point in the `[-1, 1]^3` cube and normalizes it, so the result is
/// not perfectly uniform over the sphere.
pub fn random_unit_vector(seed: u32) -> (Unit<Vector3<f32>>, u32) {
    let (x, seed) = random_f32(seed);
    let (y, seed) = random_f32(seed);
    let (z, seed) = random_f32(seed);

    let point = Vector3::new(x, y, z) * 2.0 - Vector3::repeat(1.0);
    let direction = Unit::try_new(point, 1e-6).unwrap_or_else(Vector3::y_axis);

    (direction, seed)
}

/// Vector with each component drawn from `range`, for scene generation.
pub fn random_vec<T, R, G>(rng: &mut G, range: R) -> Vector3<T>
where
    T: SampleUniform,
    R: RangeBounds<T> + SampleRange<T> + Clone,
    G: Rng + ?Sized,
{
    Vector3::new(
        rng.gen_range(range.clone()),
        rng.gen_range(range.clone()),
        rng.gen_range(range),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(pcg_hash(42), pcg_hash(42));
        assert_ne!(pcg_hash(42), pcg_hash(43));
    }

    #[test]
    fn random_f32_stays_in_unit_range() {
        let mut seed = 7;
        for _ in 0..10_000 {
            let (value, next) = random_f32(seed);
            assert!((0.0..=1.0).contains(&value));
            seed = next;
        }
    }

    #[test]
    fn random_f32_threads_the_seed() {
        let (_, next) = random_f32(1234);
        assert_eq!(next, pcg_hash(1234));
    }

    #[test]
    fn unit_vectors_are_normalized() {
        let mut seed = 99;
        for _ in 0..1_000 {
            let (direction, next) = random_unit_vector(seed);
            assert_relative_eq!(direction.norm(), 1.0, epsilon = 1e-5);
            seed = next;
        }
    }

    #[test]
    fn unit_vectors_cover_both_hemispheres() {
        let mut seed = 3;
        let (mut up, mut down) = (0, 0);
        for _ in 0..1_000 {
            let (direction, next) = random_unit_vector(seed);
            if direction.y > 0.0 {
                up += 1;
            } else {
                down += 1;
            }
            seed = next;
        }
        assert!(up > 300 && down > 300, "up {up}, down {down}");
    }

    #[test]
    fn random_vec_respects_range() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let v = random_vec(&mut rng, -2.0f32..2.0);
            assert!(v.iter().all(|c| (-2.0..2.0).contains(c)));
        }
    }
}
