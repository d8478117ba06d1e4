//! Slab media: regions along the transport axis and their cross sections.

use crate::config::{MediaConfig, RegionConfig, check_num, check_prob_vec};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::weighted::WeightedIndex;

/// Discrete distribution over target-nucleus masses.
#[derive(Debug, Clone)]
pub struct NuclideDist {
    masses: Vec<f64>,
    mass_dist: WeightedIndex<f64>,
}

impl NuclideDist {
    pub fn new(masses: Vec<f64>, probs: &[f64]) -> Result<Self> {
        if masses.len() != probs.len() {
            bail!("{} masses but {} probabilities", masses.len(), probs.len());
        }
        for (i_nuc, &mass) in masses.iter().enumerate() {
            check_num(mass, f64::MIN_POSITIVE..f64::MAX)
                .with_context(|| format!("invalid mass of nuclide {i_nuc}"))?;
        }
        check_prob_vec(probs).context("invalid nuclide probabilities")?;
        let mass_dist = WeightedIndex::new(probs)?;
        Ok(Self { masses, mass_dist })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        // A single nuclide never consumes a random number.
        if self.masses.len() == 1 {
            return self.masses[0];
        }
        self.masses[self.mass_dist.sample(rng)]
    }
}

/// Homogeneous slab region.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub left: f64,
    pub right: f64,
    pub sigma_total: f64,
    pub sigma_absorption: f64,
    pub sigma_scattering: f64,
    pub nuclides: NuclideDist,
}

impl Region {
    fn from_config(cfg: &RegionConfig) -> Result<Self> {
        let masses = cfg.nuclides.iter().map(|nuc| nuc.mass).collect();
        let probs: Vec<_> = cfg.nuclides.iter().map(|nuc| nuc.prob).collect();
        let nuclides = NuclideDist::new(masses, &probs).context("invalid nuclides")?;
        Ok(Self {
            name: cfg.name.clone(),
            left: cfg.left,
            right: cfg.right,
            sigma_total: cfg.sigma_total,
            sigma_absorption: cfg.sigma_absorption,
            sigma_scattering: cfg.sigma_scattering(),
            nuclides,
        })
    }

    fn validate(&self) -> Result<()> {
        if !(self.left < self.right) || !self.left.is_finite() || !self.right.is_finite() {
            bail!(
                "region must have finite bounds with left < right, but spans [{}, {}]",
                self.left,
                self.right
            );
        }

        check_num(self.sigma_total, f64::MIN_POSITIVE..f64::MAX)
            .context("invalid total cross section")?;
        check_num(self.sigma_absorption, 0.0..=self.sigma_total)
            .context("invalid absorption cross section")?;
        check_num(self.sigma_scattering, 0.0..f64::MAX)
            .context("invalid scattering cross section")?;
        let tol = 1e-12 * self.sigma_total;
        if self.sigma_absorption + self.sigma_scattering > self.sigma_total + tol {
            bail!(
                "absorption plus scattering cross sections must not exceed the total ({} + {} > {})",
                self.sigma_absorption,
                self.sigma_scattering,
                self.sigma_total
            );
        }
        Ok(())
    }

    /// Probability that an interaction in this region is an absorption.
    pub fn absorption_prob(&self) -> f64 {
        self.sigma_absorption / self.sigma_total
    }
}

/// Read-only lookup table of contiguous regions.
///
/// Regions are half-open `[left, right)`, except the last one which also
/// contains its right boundary.
#[derive(Debug, Clone)]
pub struct MediaModel {
    regions: Vec<Region>,
}

impl MediaModel {
    pub fn new(cfg: &MediaConfig) -> Result<Self> {
        let regions = cfg
            .regions
            .iter()
            .enumerate()
            .map(|(i_reg, reg)| {
                Region::from_config(reg).with_context(|| format!("invalid region {i_reg}"))
            })
            .collect::<Result<Vec<_>>>()?;
        for region in &regions {
            log::debug!(
                "{:?} [{}, {}]: sigma_t {} sigma_a {} sigma_s {} (mfp {:.4} cm)",
                region.name,
                region.left,
                region.right,
                region.sigma_total,
                region.sigma_absorption,
                region.sigma_scattering,
                1.0 / region.sigma_total
            );
        }
        Self::from_regions(regions)
    }

    /// Build the media from regions ordered along the transport axis.
    ///
    /// # Errors
    /// Returns an error if there are no regions, a region has invalid bounds
    /// or cross sections, or neighboring regions are not contiguous.
    pub fn from_regions(regions: Vec<Region>) -> Result<Self> {
        if regions.is_empty() {
            bail!("media must have at least one region");
        }
        for (i_reg, region) in regions.iter().enumerate() {
            region
                .validate()
                .with_context(|| format!("invalid region {i_reg} ({:?})", region.name))?;
        }
        for pair in regions.windows(2) {
            if pair[0].right != pair[1].left {
                bail!(
                    "regions {:?} and {:?} must be contiguous",
                    pair[0].name,
                    pair[1].name
                );
            }
        }
        Ok(Self { regions })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, i_reg: usize) -> &Region {
        &self.regions[i_reg]
    }

    pub fn left(&self) -> f64 {
        self.regions[0].left
    }

    pub fn right(&self) -> f64 {
        self.regions[self.regions.len() - 1].right
    }

    /// Index of the region containing `x`, or `None` outside the domain.
    pub fn locate(&self, x: f64) -> Option<usize> {
        if !(x >= self.left() && x <= self.right()) {
            return None;
        }
        let i_reg = self.regions.partition_point(|region| region.right <= x);
        Some(i_reg.min(self.regions.len() - 1))
    }
}
