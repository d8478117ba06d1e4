use crate::media::MediaModel;
use crate::types::Vec3;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source parameters.
    pub source: SourceConfig,
    /// Slab media parameters.
    pub media: MediaConfig,
    /// Transport kernel parameters.
    pub kernel: KernelConfig,
    /// Output parameters.
    pub output: OutputConfig,
    /// Analysis parameters.
    pub analysis: AnalysisConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Initial position of every neutron (cm).
    pub position: Vec3,
    /// Initial velocity of every neutron (unit speed is 1 MeV).
    pub velocity: Vec3,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Regions ordered along the transport axis.
    pub regions: Vec<RegionConfig>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,

    /// Left boundary (cm).
    pub left: f64,
    /// Right boundary (cm).
    pub right: f64,

    /// Macroscopic total cross section (1/cm).
    pub sigma_total: f64,
    /// Macroscopic absorption cross section (1/cm).
    pub sigma_absorption: f64,
    /// Macroscopic scattering cross section (1/cm), derived if absent.
    #[serde(default)]
    pub sigma_scattering: Option<f64>,

    /// Target nuclide distribution.
    pub nuclides: Vec<NuclideConfig>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NuclideConfig {
    /// Atomic mass in neutron masses.
    pub mass: f64,
    /// Probability of scattering off this nuclide.
    pub prob: f64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelMode {
    /// Free flights through the slab media.
    #[default]
    Slab,
    /// Collisions only, in the medium at the source position.
    InfiniteMedium,
    /// Stop at the first interaction site in the slab media.
    SingleCollision,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default)]
    pub mode: KernelMode,

    /// Speed below which a neutron is thermalized.
    pub thermal_speed: f64,

    /// Maximum number of collisions before a history is aborted.
    pub max_collisions: usize,

    /// Record trajectories, angles and energies.
    pub diagnostics: bool,
    /// Maximum number of energies recorded per history.
    pub max_energy_records: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of histories written per file.
    pub histories_per_file: usize,

    /// Master seed, drawn from the OS if absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of spatial buckets across the domain.
    pub n_buckets: usize,
    /// Incident flux used to normalize the flux estimate (1/(cm² s)).
    pub source_flux: f64,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_vec3(self.source.velocity, 1e-12).context("invalid source velocity")?;

        check_num(self.media.regions.len(), 1..1_000).context("invalid number of regions")?;
        let media = MediaModel::new(&self.media).context("invalid media")?;
        check_num(self.source.position.x, media.left()..=media.right())
            .context("invalid source position")?;

        check_num(self.kernel.thermal_speed, 0.0..1.0).context("invalid thermal speed")?;
        check_num(self.kernel.max_collisions, 1..=100_000_000)
            .context("invalid maximum number of collisions")?;
        check_num(self.kernel.max_energy_records, 0..=100_000)
            .context("invalid maximum number of energy records")?;

        check_num(self.output.histories_per_file, 1..=100_000_000)
            .context("invalid number of histories per file")?;

        check_num(self.analysis.n_buckets, 1..=100_000).context("invalid number of buckets")?;
        check_num(self.analysis.source_flux, f64::MIN_POSITIVE..f64::MAX)
            .context("invalid source flux")?;

        Ok(())
    }
}

impl RegionConfig {
    /// Scattering cross section, derived from total and absorption if not given.
    pub fn sigma_scattering(&self) -> f64 {
        self.sigma_scattering
            .unwrap_or(self.sigma_total - self.sigma_absorption)
    }
}

pub(crate) fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_vec3(vec: Vec3, tol: f64) -> Result<()> {
    let [x, y, z]: [f64; 3] = vec.into();
    if [x, y, z].iter().any(|ele| !ele.is_finite()) {
        bail!("vector must have only finite elements, but is {vec:?}");
    }
    let norm = vec.norm();
    if norm <= tol {
        bail!("vector norm must be greater than {tol}, but is {norm}");
    }
    Ok(())
}

pub(crate) fn check_prob_vec(vec: &[f64]) -> Result<()> {
    if vec.is_empty() {
        bail!("vector must not be empty");
    }
    // Non-negative elements and sums to ~1.0.
    if vec.iter().any(|&ele| !(ele >= 0.0)) {
        bail!("vector must have only non-negative elements");
    }
    let sum: f64 = vec.iter().sum();
    let tol = 1e-8;
    if (sum - 1.0).abs() > tol {
        bail!("vector must sum to 1.0 (tolerance: {tol}), but sums to {sum}");
    }
    Ok(())
}
