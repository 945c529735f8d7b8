use crate::config::Config;
use crate::fetch::{Fetcher, Results};
use crate::stats::{self, History, StatsUpdate};
use crate::types::Record;
use anyhow::{Context, Result};
use ndarray::Array1;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Live post-processing loop.
///
/// Holds the configuration, the result fetcher, and the aggregator history,
/// and provides methods to start, run, save, and load acquisitions.
#[derive(Serialize, Deserialize)]
pub struct Acquisition {
    cfg: Config,
    fetcher: Fetcher,
    history: History,
}

impl Acquisition {
    /// Create a new `Acquisition` with the given configuration and a random seed.
    pub fn new(cfg: Config) -> Result<Self> {
        let rng = ChaCha12Rng::try_from_os_rng()?;
        Ok(Self::with_rng(cfg, rng))
    }

    /// Create a new `Acquisition` with the given configuration and generator.
    pub fn with_rng(cfg: Config, rng: ChaCha12Rng) -> Self {
        let fetcher = Fetcher::new(&cfg, rng);
        Self {
            cfg,
            fetcher,
            history: History::Fresh,
        }
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_fetching(&self) -> bool {
        self.fetcher.is_fetching()
    }

    /// Poll the fetcher and save a record of every non-empty poll to a binary file.
    pub fn perform_acquisition<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let polls_per_file = self.cfg.fetch.polls_per_file;
        for i_poll in 0..polls_per_file {
            if !self.fetcher.is_fetching() {
                log::info!("fetched all {} repetitions", self.cfg.fetch.reps);
                break;
            }

            let Some((num_so_far, results)) =
                self.fetcher.fetch().context("failed to fetch results")?
            else {
                log::debug!("no new results at poll {i_poll}");
                continue;
            };

            let record = self
                .process_results(num_so_far, results)
                .context("failed to process results")?;

            encode::write(&mut writer, &record).context("failed to serialize record")?;

            let progress = 100.0 * num_so_far as f64 / self.cfg.fetch.reps as f64;
            let max_std_err = record.std_err.fold(f64::NAN, |acc, &err| acc.max(err));
            log::info!("completed {progress:06.2}% (max std err {max_std_err:.3e})");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire acquisition state.
    ///
    /// Can be used to resume the acquisition later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize acquisition")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved acquisition checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let acquisition =
            decode::from_read(&mut reader).context("failed to deserialize acquisition")?;
        Ok(acquisition)
    }

    fn process_results(&mut self, num_so_far: usize, results: Results) -> Result<Record> {
        let batch = results.z_raw.view();
        let means = results.z_raw_avg.view();

        // A standard error needs two values; a lone first repetition only seeds the stream.
        let (state, std_err) = if num_so_far < 2 {
            let state = stats::absorb(batch, means, num_so_far, &self.history)?;
            let std_err = Array1::from_elem(state.n_channels(), f64::NAN);
            (state, std_err)
        } else {
            let StatsUpdate { std_err, state } =
                stats::update(batch, means, num_so_far, &self.history)?;
            (state, std_err)
        };

        let mean = state.mean().to_owned();
        self.history = History::Resumed(state);

        Ok(Record {
            num_so_far,
            z_raw: results.z_raw,
            std_err,
            mean,
            z_avg: results.z_avg,
            x: results.x,
        })
    }
}
