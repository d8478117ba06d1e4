use crate::config::Config;
use crate::kernel::Kernel;
use crate::media::MediaModel;
use crate::types::HistoryResult;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Number of progress reports per history file.
const N_CHUNKS: usize = 10;

/// Simulation engine.
///
/// Holds the configuration, master seed and history counter, and provides
/// methods to run batches of histories, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    seed: u64,
    n_histories: u64,
}

impl Engine {
    /// Create a new `Engine` for run `run_idx`.
    ///
    /// The master seed is derived from the configured seed and the run index,
    /// or drawn from the OS if no seed is configured.
    pub fn generate_initial_condition(cfg: Config, run_idx: u64) -> Result<Self> {
        let seed = match cfg.output.seed {
            Some(seed) => {
                let mut rng = ChaCha12Rng::seed_from_u64(seed);
                rng.set_stream(run_idx);
                rng.random()
            }
            None => ChaCha12Rng::try_from_os_rng()?.random(),
        };
        log::info!("master seed {seed}");

        Ok(Self {
            cfg,
            seed,
            n_histories: 0,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Random number generator of history `i_hist`.
    ///
    /// Each history reads its own ChaCha stream, so results do not depend on
    /// which thread runs it.
    pub fn history_rng(seed: u64, i_hist: u64) -> ChaCha12Rng {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        rng.set_stream(i_hist);
        rng
    }

    /// Run the next batch of histories and save the results to a binary file.
    pub fn run_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let media = MediaModel::new(&self.cfg.media).context("failed to construct media")?;
        let kernel = Kernel::new(media, self.cfg.kernel.clone());

        let n_per_file = self.cfg.output.histories_per_file as u64;
        let chunk_len = n_per_file.div_ceil(N_CHUNKS as u64);
        let first = self.n_histories;
        let end = first + n_per_file;

        let mut start = first;
        while start < end {
            let stop = (start + chunk_len).min(end);

            let results = self
                .run_histories(&kernel, start..stop)
                .context("failed to run histories")?;
            for result in &results {
                encode::write(&mut writer, result).context("failed to serialize history")?;
            }

            start = stop;
            let progress = 100.0 * (start - first) as f64 / n_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        self.n_histories = end;

        Ok(())
    }

    fn run_histories(
        &self,
        kernel: &Kernel,
        range: std::ops::Range<u64>,
    ) -> Result<Vec<HistoryResult>> {
        let source = &self.cfg.source;
        range
            .into_par_iter()
            .map(|i_hist| {
                let mut rng = Self::history_rng(self.seed, i_hist);
                kernel
                    .run(source.position, source.velocity, &mut rng)
                    .with_context(|| format!("failed to run history {i_hist}"))
            })
            .collect()
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }
}
