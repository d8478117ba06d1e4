use crate::config::{Config, KernelMode};
use crate::media::{MediaModel, Region};
use crate::stats::{Accumulator, AccumulatorReport, Histogram, HistogramReport};
use crate::types::{HistoryResult, TerminationClass};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Report of a single observable.
#[derive(Debug, Serialize, Deserialize)]
pub enum Report {
    TerminationFractions(Vec<(TerminationClass, AccumulatorReport)>),
    AbsorptionFlux {
        hist: HistogramReport,
        /// Scalar flux at each bin center (1/(cm² s)).
        flux: Vec<f64>,
    },
    ThermalizedPositions(HistogramReport),
    ScatteringAngle(AccumulatorReport),
    CollisionsToThermalize(AccumulatorReport),
    EnergyByCollision(Vec<AccumulatorReport>),
    FirstCollisionFlux {
        hist: HistogramReport,
        /// Uncollided scalar flux at each bin center (1/(cm² s)).
        flux: Vec<f64>,
    },
}

pub trait Obs {
    fn update(&mut self, result: &HistoryResult) -> Result<()>;
    fn report(&self) -> Report;
}

pub struct TermFrac {
    acc_vec: Vec<Accumulator>,
}

impl TermFrac {
    pub fn new() -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(TerminationClass::ALL.len(), Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for TermFrac {
    fn update(&mut self, result: &HistoryResult) -> Result<()> {
        let term = result.termination.index();
        for (i_term, acc) in self.acc_vec.iter_mut().enumerate() {
            acc.add(if i_term == term { 1.0 } else { 0.0 });
        }
        Ok(())
    }

    fn report(&self) -> Report {
        let reports = TerminationClass::ALL
            .iter()
            .zip(&self.acc_vec)
            .map(|(&term, acc)| (term, acc.report()))
            .collect();
        Report::TerminationFractions(reports)
    }
}

/// Flux estimated from the density of absorption sites.
///
/// Each bin holds `count · source_flux / (n · width · sigma_absorption)`.
pub struct AbsFlux {
    hist: Histogram,
    sigma_abs: Vec<f64>,
    source_flux: f64,
    n_histories: u64,
}

impl AbsFlux {
    pub fn new(cfg: &Config, media: &MediaModel) -> Result<Self> {
        let hist = Histogram::new(media.left(), media.right(), cfg.analysis.n_buckets);
        let sigma_abs = bucket_cross_sections(&hist, media, |region| region.sigma_absorption)?;
        Ok(Self {
            hist,
            sigma_abs,
            source_flux: cfg.analysis.source_flux,
            n_histories: 0,
        })
    }
}

impl Obs for AbsFlux {
    fn update(&mut self, result: &HistoryResult) -> Result<()> {
        self.n_histories += 1;
        if result.termination == TerminationClass::Absorbed {
            self.hist.add(result.final_position.x);
        }
        Ok(())
    }

    fn report(&self) -> Report {
        Report::AbsorptionFlux {
            hist: self.hist.report(),
            flux: bucket_flux(&self.hist, &self.sigma_abs, self.source_flux, self.n_histories),
        }
    }
}

/// Flux estimated from the density of first interaction sites.
///
/// Only meaningful for single-collision histories, where each bin holds
/// `count · source_flux / (n · width · sigma_total)`.
pub struct CollFlux {
    hist: Histogram,
    sigma_total: Vec<f64>,
    source_flux: f64,
    n_histories: u64,
}

impl CollFlux {
    pub fn new(cfg: &Config, media: &MediaModel) -> Result<Self> {
        let hist = Histogram::new(media.left(), media.right(), cfg.analysis.n_buckets);
        let sigma_total = bucket_cross_sections(&hist, media, |region| region.sigma_total)?;
        Ok(Self {
            hist,
            sigma_total,
            source_flux: cfg.analysis.source_flux,
            n_histories: 0,
        })
    }
}

impl Obs for CollFlux {
    fn update(&mut self, result: &HistoryResult) -> Result<()> {
        self.n_histories += 1;
        if matches!(
            result.termination,
            TerminationClass::Absorbed | TerminationClass::Scattered
        ) {
            self.hist.add(result.final_position.x);
        }
        Ok(())
    }

    fn report(&self) -> Report {
        Report::FirstCollisionFlux {
            hist: self.hist.report(),
            flux: bucket_flux(&self.hist, &self.sigma_total, self.source_flux, self.n_histories),
        }
    }
}

fn bucket_cross_sections<F>(hist: &Histogram, media: &MediaModel, sigma: F) -> Result<Vec<f64>>
where
    F: Fn(&Region) -> f64,
{
    hist.centers()
        .map(|center| {
            media
                .locate(center)
                .map(|i_reg| sigma(media.region(i_reg)))
                .with_context(|| format!("bucket center {center} is outside the domain"))
        })
        .collect()
}

fn bucket_flux(hist: &Histogram, sigmas: &[f64], source_flux: f64, n_histories: u64) -> Vec<f64> {
    let norm = source_flux / (n_histories as f64 * hist.width());
    hist.counts()
        .iter()
        .zip(sigmas)
        .map(|(&count, &sigma)| {
            if sigma > 0.0 {
                count as f64 * norm / sigma
            } else {
                f64::NAN
            }
        })
        .collect()
}

pub struct ThermPos {
    hist: Histogram,
}

impl ThermPos {
    pub fn new(cfg: &Config, media: &MediaModel) -> Self {
        Self {
            hist: Histogram::new(media.left(), media.right(), cfg.analysis.n_buckets),
        }
    }
}

impl Obs for ThermPos {
    fn update(&mut self, result: &HistoryResult) -> Result<()> {
        if result.termination == TerminationClass::Thermalized {
            self.hist.add(result.final_position.x);
        }
        Ok(())
    }

    fn report(&self) -> Report {
        Report::ThermalizedPositions(self.hist.report())
    }
}

pub struct ScatAngle {
    acc: Accumulator,
}

impl ScatAngle {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for ScatAngle {
    fn update(&mut self, result: &HistoryResult) -> Result<()> {
        if let Some(diag) = &result.diagnostics {
            diag.scattering_angles
                .iter()
                .for_each(|&angle| self.acc.add(angle));
        }
        Ok(())
    }

    fn report(&self) -> Report {
        Report::ScatteringAngle(self.acc.report())
    }
}

pub struct NColl {
    acc: Accumulator,
}

impl NColl {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for NColl {
    fn update(&mut self, result: &HistoryResult) -> Result<()> {
        if result.termination == TerminationClass::Thermalized {
            self.acc.add(result.n_collisions as f64);
        }
        Ok(())
    }

    fn report(&self) -> Report {
        Report::CollisionsToThermalize(self.acc.report())
    }
}

pub struct EnergyByColl {
    acc_vec: Vec<Accumulator>,
}

impl EnergyByColl {
    pub fn new(cfg: &Config) -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(cfg.kernel.max_energy_records, Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for EnergyByColl {
    fn update(&mut self, result: &HistoryResult) -> Result<()> {
        if let Some(diag) = &result.diagnostics {
            for (acc, &energy) in self.acc_vec.iter_mut().zip(&diag.energies) {
                acc.add(energy);
            }
        }
        Ok(())
    }

    fn report(&self) -> Report {
        Report::EnergyByCollision(self.acc_vec.iter().map(|acc| acc.report()).collect())
    }
}

pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Result<Self> {
        let media = MediaModel::new(&cfg.media).context("failed to construct media")?;

        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        obs_ptr_vec.push(Box::new(TermFrac::new()));
        obs_ptr_vec.push(Box::new(
            AbsFlux::new(&cfg, &media).context("failed to construct flux observable")?,
        ));
        obs_ptr_vec.push(Box::new(ThermPos::new(&cfg, &media)));
        obs_ptr_vec.push(Box::new(ScatAngle::new()));
        obs_ptr_vec.push(Box::new(NColl::new()));
        obs_ptr_vec.push(Box::new(EnergyByColl::new(&cfg)));
        if cfg.kernel.mode == KernelMode::SingleCollision {
            obs_ptr_vec.push(Box::new(
                CollFlux::new(&cfg, &media).context("failed to construct flux observable")?,
            ));
        }
        Ok(Self { cfg, obs_ptr_vec })
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.output.histories_per_file {
            let result = decode::from_read(&mut reader).context("failed to read history")?;
            self.add_result(&result)?;
        }
        Ok(())
    }

    pub fn add_result(&mut self, result: &HistoryResult) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(result).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn reports(&self) -> Vec<Report> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let reports = self.reports();
        log_summary(&reports);
        encode::write(&mut writer, &reports).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

fn log_summary(reports: &[Report]) {
    for report in reports {
        match report {
            Report::TerminationFractions(fractions) => {
                for (term, frac) in fractions {
                    log::info!("{term:?}: {:.4} +- {:.4}", frac.mean, frac.sem);
                }
            }
            Report::ScatteringAngle(angle) => {
                log::info!("mean lab scattering angle: {:.4} rad", angle.mean);
            }
            Report::CollisionsToThermalize(n_coll) => {
                log::info!("mean collisions to thermalize: {:.2}", n_coll.mean);
            }
            _ => {}
        }
    }
}
