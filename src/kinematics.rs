//! Elastic two-body collision kinematics.
//!
//! Scattering is isotropic in the center-of-mass frame and the outgoing
//! velocity is expressed in the lab frame, with the target nucleus at rest.
//! Masses are in neutron-mass units and the kinetic energy is `|v|²`.

use crate::types::Vec3;
use anyhow::{Result, bail};
use rand::prelude::*;
use rand_distr::Uniform;
use std::f64::consts::{PI, TAU};

/// Cross products shorter than this (relative to `|v_in|`) are resampled.
const DEGENERATE_TOL: f64 = 1e-9;

/// Maximum number of perpendicular directions drawn before giving up.
const MAX_DIRECTION_DRAWS: usize = 64;

/// Outcome of a single elastic collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    /// Lab-frame velocity after the collision.
    pub velocity: Vec3,
    /// Lab-frame scattering angle, in radians.
    pub angle: f64,
    /// Kinetic energy after the collision.
    pub energy: f64,
}

/// Collide a neutron with velocity `v_in` against a nucleus of mass `mass` at rest.
///
/// # Errors
/// Returns an error if `mass` is not positive, `v_in` is zero,
/// or no perpendicular direction could be drawn.
pub fn collide<R: Rng + ?Sized>(v_in: Vec3, mass: f64, rng: &mut R) -> Result<Collision> {
    if !(mass > 0.0) {
        bail!("target mass must be positive, but is {mass}");
    }
    let speed = v_in.norm();
    if !(speed > 0.0) {
        bail!("incoming velocity must be nonzero, but is {v_in:?}");
    }

    let cos_cm: f64 = Uniform::new_inclusive(-1.0, 1.0)?.sample(rng);

    let a_cos = mass * cos_cm;
    let parallel_factor = (a_cos + 1.0) / (mass + 1.0);
    // mass² - a_cos² = mass² (1 - cos_cm²) >= 0
    let perp_factor = speed * (mass * mass - a_cos * a_cos).max(0.0).sqrt() / (mass + 1.0);

    let u_perp = perpendicular_direction(v_in, rng)?;

    let velocity = parallel_factor * v_in + perp_factor * u_perp;

    let speed_out = velocity.norm();
    let angle = if speed_out > 0.0 {
        (v_in.dot(velocity) / (speed * speed_out))
            .clamp(-1.0, 1.0)
            .acos()
    } else {
        PI
    };

    Ok(Collision {
        velocity,
        angle,
        energy: velocity.dot(velocity),
    })
}

/// Sample an isotropic unit vector.
pub fn isotropic_direction<R: Rng + ?Sized>(rng: &mut R) -> Result<Vec3> {
    let cos_theta: f64 = Uniform::new_inclusive(-1.0, 1.0)?.sample(rng);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = Uniform::new(0.0, TAU)?.sample(rng);
    Ok(Vec3::new(
        phi.cos() * sin_theta,
        phi.sin() * sin_theta,
        cos_theta,
    ))
}

/// Unit vector orthogonal to `v`, built from a random isotropic direction.
fn perpendicular_direction<R: Rng + ?Sized>(v: Vec3, rng: &mut R) -> Result<Vec3> {
    let tol = DEGENERATE_TOL * v.norm();
    for _ in 0..MAX_DIRECTION_DRAWS {
        let dir = isotropic_direction(rng)?;
        match v.cross(dir).normalized(tol) {
            Some(u_perp) => return Ok(u_perp),
            None => log::trace!("resampling direction parallel to {v:?}"),
        }
    }
    bail!("failed to draw a direction perpendicular to {v:?}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand_chacha::ChaCha12Rng;
    use std::collections::VecDeque;

    /// Replays fixed 64-bit words, then repeats `fallback`.
    struct ScriptedRng {
        words: VecDeque<u64>,
        fallback: u64,
    }

    impl ScriptedRng {
        fn new(words: &[u64], fallback: u64) -> Self {
            Self {
                words: words.iter().copied().collect(),
                fallback,
            }
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            (self.next_u64() >> 32) as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.words.pop_front().unwrap_or(self.fallback)
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            for chunk in dst.chunks_mut(8) {
                let bytes = self.next_u64().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }
    }

    #[test]
    fn hydrogen_loses_half_energy_on_average() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let v_in = Vec3::new(1.0, 0.0, 0.0);
        let n_samples = 100_000;
        let mean_energy = (0..n_samples)
            .map(|_| collide(v_in, 1.0, &mut rng).unwrap().energy)
            .sum::<f64>()
            / n_samples as f64;
        assert!((mean_energy - 0.5).abs() < 0.01, "mean energy {mean_energy}");
    }

    #[test]
    fn heavy_target_energy_bounds() {
        // E_out / E_in lies in [((A-1)/(A+1))², 1].
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let alpha = (15.0_f64 / 17.0).powi(2);
        for _ in 0..10_000 {
            let collision = collide(Vec3::new(0.0, 0.6, 0.8), 16.0, &mut rng).unwrap();
            assert!(collision.energy >= alpha - 1e-12);
            assert!(collision.energy <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn hydrogen_lab_angle_is_forward() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        for _ in 0..10_000 {
            let collision = collide(Vec3::new(1.0, 0.0, 0.0), 1.0, &mut rng).unwrap();
            assert!(collision.angle <= PI / 2.0 + 1e-9 || collision.velocity.norm() < 1e-9);
        }
    }

    #[test]
    fn nonpositive_mass_fails() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        assert!(collide(Vec3::new(1.0, 0.0, 0.0), 0.0, &mut rng).is_err());
        assert!(collide(Vec3::new(1.0, 0.0, 0.0), -1.0, &mut rng).is_err());
    }

    #[test]
    fn zero_velocity_fails() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        assert!(collide(Vec3::default(), 1.0, &mut rng).is_err());
    }

    #[test]
    fn isotropic_direction_is_unit_and_centered() {
        let mut rng = ChaCha12Rng::seed_from_u64(6);
        let n_samples = 50_000;
        let mut sum = Vec3::default();
        for _ in 0..n_samples {
            let dir = isotropic_direction(&mut rng).unwrap();
            assert!((dir.norm() - 1.0).abs() < 1e-12);
            sum = sum + dir;
        }
        assert!((sum * (1.0 / n_samples as f64)).norm() < 0.02);
    }

    #[test]
    fn parallel_direction_is_resampled() {
        // Words 0, 0 give cos_theta = -1 and phi = 0, antiparallel to v.
        // Words 1 << 63, 1 << 62 then give cos_theta ~ 0 and phi ~ pi / 2.
        let v = Vec3::new(0.0, 0.0, 1.0);
        let mut rng = ScriptedRng::new(&[0, 0, 1 << 63, 1 << 62], 0);
        let u_perp = perpendicular_direction(v, &mut rng).unwrap();
        assert!((u_perp.norm() - 1.0).abs() < 1e-12);
        assert!(u_perp.dot(v).abs() < 1e-12);
        assert!((u_perp - Vec3::new(-1.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn collision_survives_parallel_first_direction() {
        let v_in = Vec3::new(0.0, 0.0, 1.0);
        let mut rng = ScriptedRng::new(&[1 << 40, 0, 0], 0x9e37_79b9_7f4a_7c15);
        let collision = collide(v_in, 1.0, &mut rng).unwrap();
        let v = collision.velocity;
        assert!([v.x, v.y, v.z].iter().all(|ele| ele.is_finite()));
        assert!(v.norm() <= 1.0 + 1e-12);
        assert_eq!(collision.energy, v.dot(v));
    }

    #[test]
    fn always_parallel_direction_fails() {
        let v = Vec3::new(0.0, 0.0, 1.0);
        let mut rng = ScriptedRng::new(&[], 0);
        let error = perpendicular_direction(v, &mut rng).unwrap_err();
        assert!(format!("{error:#}").contains("perpendicular"));
        let mut rng = ScriptedRng::new(&[], 0);
        assert!(collide(v, 16.0, &mut rng).is_err());
    }

    proptest! {
        #[test]
        fn speed_never_increases(
            x in -10.0f64..10.0,
            y in -10.0f64..10.0,
            z in -10.0f64..10.0,
            mass in 1.0f64..250.0,
            seed in any::<u64>(),
        ) {
            let v_in = Vec3::new(x, y, z);
            prop_assume!(v_in.norm() > 1e-3);
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            let collision = collide(v_in, mass, &mut rng).unwrap();
            prop_assert!(collision.velocity.norm() <= v_in.norm() * (1.0 + 1e-12));
        }

        #[test]
        fn energy_is_speed_squared(
            x in -10.0f64..10.0,
            mass in 1.0f64..250.0,
            seed in any::<u64>(),
        ) {
            let v_in = Vec3::new(x, 0.3, -0.2);
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            let collision = collide(v_in, mass, &mut rng).unwrap();
            let v = collision.velocity;
            prop_assert_eq!(collision.energy, v.dot(v));
            prop_assert!(collision.angle >= 0.0 && collision.angle <= PI);
        }
    }
}
