//! Free-flight sampling across slab regions.
//!
//! A flight draws a single optical-depth budget `-ln(U)` and spends it region
//! by region along the straight-line path, so that the optical depth of the
//! whole path equals the budget whatever cross sections it crosses.

use crate::media::MediaModel;
use crate::types::Vec3;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::Open01;

/// Draw an optical depth `-ln(U)` with `U` in the open interval (0, 1).
pub fn sample_optical_depth<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u: f64 = Open01.sample(rng);
    -u.ln()
}

/// Sample an exponential flight distance in a single medium.
pub fn sample_flight_distance<R: Rng + ?Sized>(sigma_total: f64, rng: &mut R) -> Result<f64> {
    if !(sigma_total > 0.0) {
        bail!("cross section must be positive, but is {sigma_total}");
    }
    Ok(sample_optical_depth(rng) / sigma_total)
}

/// Sample the next interaction position of a neutron at `x` moving along `v`.
pub fn advance_position<R: Rng + ?Sized>(
    x: Vec3,
    v: Vec3,
    media: &MediaModel,
    rng: &mut R,
) -> Result<Vec3> {
    if let [region] = media.regions() {
        let dir = v
            .normalized(0.0)
            .with_context(|| format!("cannot fly with zero velocity {v:?}"))?;
        let dist = sample_flight_distance(region.sigma_total, rng)?;
        return Ok(x + dist * dir);
    }
    let depth = sample_optical_depth(rng);
    advance_by_depth(x, v, depth, media)
}

/// Move from `x` along `v` until the optical depth `depth` is spent.
///
/// Each interface crossed consumes `distance · sigma_total` of the budget in
/// the region being left. Once the path leaves the domain the remainder is
/// spent with the cross section of the last region crossed.
pub fn advance_by_depth(x: Vec3, v: Vec3, depth: f64, media: &MediaModel) -> Result<Vec3> {
    let dir = v
        .normalized(0.0)
        .with_context(|| format!("cannot fly with zero velocity {v:?}"))?;
    if !(depth >= 0.0) {
        bail!("optical depth must be non-negative, but is {depth}");
    }
    let mut i_reg = media
        .locate(x.x)
        .with_context(|| format!("flight starts outside the domain at {x:?}"))?;

    let mut pos = x;
    let mut depth_left = depth;
    loop {
        let region = media.region(i_reg);
        let sigma = region.sigma_total;
        if !(sigma > 0.0) {
            bail!("region {:?} has nonpositive cross section {sigma}", region.name);
        }
        let dist = depth_left / sigma;

        // Distance to the interface the path is heading for, and the region after it.
        let (dist_bound, next) = if dir.x > 0.0 {
            let next = (i_reg + 1 < media.regions().len()).then_some(i_reg + 1);
            ((region.right - pos.x) / dir.x, next)
        } else if dir.x < 0.0 {
            let next = i_reg.checked_sub(1);
            ((region.left - pos.x) / dir.x, next)
        } else {
            (f64::INFINITY, None)
        };

        if dist < dist_bound {
            return Ok(pos + dist * dir);
        }
        let Some(next) = next else {
            // Leaving the domain: no further interfaces to correct for.
            return Ok(pos + dist * dir);
        };

        depth_left -= dist_bound * sigma;
        pos = pos + dist_bound * dir;
        // Snap onto the interface to keep region lookup exact.
        pos.x = if dir.x > 0.0 { region.right } else { region.left };
        i_reg = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::{region, two_slab};
    use rand_chacha::ChaCha12Rng;

    const SIGMA_WATER: f64 = 0.361663;

    #[test]
    fn flight_distance_is_positive_and_exponential() {
        let mut rng = ChaCha12Rng::seed_from_u64(10);
        let n_samples = 200_000;
        let mut sum = 0.0;
        for _ in 0..n_samples {
            let dist = sample_flight_distance(SIGMA_WATER, &mut rng).unwrap();
            assert!(dist > 0.0 && dist.is_finite());
            sum += dist;
        }
        let mean = sum / n_samples as f64;
        let mfp = 1.0 / SIGMA_WATER;
        assert!((mean - mfp).abs() < 0.01 * mfp, "mean {mean}, mfp {mfp}");
    }

    #[test]
    fn nonpositive_cross_section_fails() {
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        assert!(sample_flight_distance(0.0, &mut rng).is_err());
        assert!(sample_flight_distance(-0.3, &mut rng).is_err());
    }

    #[test]
    fn flight_within_region_is_unmodified() {
        let media = two_slab(0.5, 0.1);
        let x = Vec3::new(1.0, 0.0, 0.0);
        let v = Vec3::new(2.0, 0.0, 0.0);
        let pos = advance_by_depth(x, v, 1.0, &media).unwrap();
        assert!((pos.x - 3.0).abs() < 1e-12);
    }

    #[test]
    fn crossing_conserves_optical_depth() {
        let (sigma_1, sigma_2) = (0.5, 0.1);
        let media = two_slab(sigma_1, sigma_2);
        let x = Vec3::new(8.0, 1.0, -1.0);
        let v = Vec3::new(0.6, 0.8, 0.0);
        let dir = v.normalized(0.0).unwrap();
        let depth = 2.0;

        let pos = advance_by_depth(x, v, depth, &media).unwrap();

        let x_bound = x + ((10.0 - x.x) / dir.x) * dir;
        let d_1 = (x_bound - x).norm();
        let d_2 = (pos - x_bound).norm();
        assert!(pos.x > 10.0);
        assert!((d_1 * sigma_1 + d_2 * sigma_2 - depth).abs() < 1e-12);
        // The final position lies on the original straight line.
        assert!(((pos - x).normalized(0.0).unwrap() - dir).norm() < 1e-12);
    }

    #[test]
    fn crossing_leftwards_conserves_optical_depth() {
        let (sigma_1, sigma_2) = (0.5, 0.1);
        let media = two_slab(sigma_1, sigma_2);
        let x = Vec3::new(12.0, 0.0, 0.0);
        let v = Vec3::new(-1.0, 0.0, 0.0);
        let pos = advance_by_depth(x, v, 0.7, &media).unwrap();
        // 2 cm at 0.1 consumes 0.2, the remaining 0.5 at 0.5 is 1 cm.
        assert!((pos.x - 9.0).abs() < 1e-12);
    }

    #[test]
    fn several_interfaces_are_crossed() {
        let media = MediaModel::from_regions(vec![
            region("a", 0.0, 1.0, 1.0, 0.0),
            region("b", 1.0, 2.0, 2.0, 0.0),
            region("c", 2.0, 30.0, 4.0, 0.0),
        ])
        .unwrap();
        let pos =
            advance_by_depth(Vec3::default(), Vec3::new(1.0, 0.0, 0.0), 5.0, &media).unwrap();
        // 1.0 + 2.0 consumed in a and b, 2.0 left at 4.0 is 0.5 cm.
        assert!((pos.x - 2.5).abs() < 1e-12);
    }

    #[test]
    fn leaving_domain_keeps_last_cross_section() {
        let media = two_slab(0.5, 0.1);
        let x = Vec3::new(2.0, 0.0, 0.0);
        let pos = advance_by_depth(x, Vec3::new(-1.0, 0.0, 0.0), 2.0, &media).unwrap();
        assert!((pos.x - (2.0 - 4.0)).abs() < 1e-12);
    }

    #[test]
    fn transverse_flight_never_changes_region() {
        let media = two_slab(0.5, 0.1);
        let x = Vec3::new(9.9, 0.0, 0.0);
        let pos = advance_by_depth(x, Vec3::new(0.0, 1.0, 0.0), 3.0, &media).unwrap();
        assert_eq!(pos.x, 9.9);
        assert!((pos.y - 6.0).abs() < 1e-12);
    }

    #[test]
    fn start_on_interface_uses_region_ahead() {
        let media = two_slab(0.5, 0.1);
        let x = Vec3::new(10.0, 0.0, 0.0);
        let pos = advance_by_depth(x, Vec3::new(1.0, 0.0, 0.0), 1.0, &media).unwrap();
        assert!((pos.x - 20.0).abs() < 1e-12);
    }

    #[test]
    fn start_at_left_edge_moving_left_escapes() {
        let media = two_slab(0.5, 0.1);
        let mut rng = ChaCha12Rng::seed_from_u64(12);
        for _ in 0..1_000 {
            let v = Vec3::new(-1.0, 0.0, 0.0);
            let pos = advance_position(Vec3::default(), v, &media, &mut rng).unwrap();
            assert!(pos.x < 0.0);
        }
    }

    #[test]
    fn single_region_matches_multi_region_path() {
        let water = region("water", 0.0, 30.0, 0.36, 0.0);
        let single = MediaModel::from_regions(vec![water]).unwrap();
        let x = Vec3::new(3.0, 0.0, 0.0);
        let v = Vec3::new(0.3, -0.4, 0.5);
        let mut rng_a = ChaCha12Rng::seed_from_u64(15);
        let mut rng_b = ChaCha12Rng::seed_from_u64(15);
        for _ in 0..100 {
            let pos = advance_position(x, v, &single, &mut rng_a).unwrap();
            let depth = sample_optical_depth(&mut rng_b);
            let expected = advance_by_depth(x, v, depth, &single).unwrap();
            assert!((pos - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn equal_cross_sections_reduce_to_single_medium() {
        // Compare mean and the fraction beyond one mean free path.
        let sigma = 0.2;
        let media = two_slab(sigma, sigma);
        let x = Vec3::new(5.0, 0.0, 0.0);
        let v = Vec3::new(1.0, 0.0, 0.0);
        let mut rng_multi = ChaCha12Rng::seed_from_u64(13);
        let mut rng_single = ChaCha12Rng::seed_from_u64(14);
        let n_samples = 100_000;

        let mut multi = Vec::with_capacity(n_samples);
        let mut single = Vec::with_capacity(n_samples);
        for _ in 0..n_samples {
            multi.push(advance_position(x, v, &media, &mut rng_multi).unwrap().x - x.x);
            single.push(sample_flight_distance(sigma, &mut rng_single).unwrap());
        }

        let mean = |vals: &[f64]| vals.iter().sum::<f64>() / vals.len() as f64;
        let tail = |vals: &[f64]| {
            vals.iter().filter(|&&d| d > 1.0 / sigma).count() as f64 / vals.len() as f64
        };
        assert!((mean(&multi) - mean(&single)).abs() < 0.03 / sigma);
        assert!((tail(&multi) - tail(&single)).abs() < 0.01);
        assert!((tail(&multi) - (-1.0f64).exp()).abs() < 0.01);
    }
}
