use crate::acquisition::Acquisition;
use crate::analysis::Analyzer;
use crate::config::Config;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    run_root: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(run_root: P) -> Result<Self> {
        let run_root = run_root.as_ref().to_path_buf();

        let cfg =
            Config::from_file(run_root.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { run_root, cfg })
    }

    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let acquisition =
            Acquisition::new(self.cfg.clone()).context("failed to start acquisition")?;

        self.run_acquisition(run_idx, acquisition)
    }

    pub fn resume_run(&self, run_idx: usize) -> Result<()> {
        let checkpoint_file = self.checkpoint_file(run_idx);
        let acquisition = Acquisition::load_checkpoint(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
        if acquisition.cfg() != &self.cfg {
            bail!("checkpoint config differs from the current config");
        }
        if !acquisition.is_fetching() {
            bail!("run {run_idx} has already fetched all repetitions");
        }
        log::info!("loaded {checkpoint_file:?}");

        self.run_acquisition(run_idx, acquisition)
    }

    pub fn analyze_runs(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new();

            let n_files = self
                .count_acquisition_files(run_idx)
                .context("failed to count acquisition files")?;
            for file_idx in 0..n_files {
                analyzer
                    .add_file(self.acquisition_file(run_idx, file_idx))
                    .context("failed to add file")?;
            }

            analyzer
                .save_results(self.results_file(run_idx))
                .with_context(|| format!("failed to save results of run {run_idx}"))?;
        }

        Ok(())
    }

    pub fn clean_runs(&self) -> Result<()> {
        let pattern = self.run_root.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for run_dir in glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
        {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        Ok(())
    }

    fn run_acquisition(&self, run_idx: usize, mut acquisition: Acquisition) -> Result<()> {
        let file_idx = self
            .count_acquisition_files(run_idx)
            .context("failed to count acquisition files")?;

        acquisition
            .perform_acquisition(self.acquisition_file(run_idx, file_idx))
            .context("failed to perform acquisition")?;

        acquisition
            .save_checkpoint(self.checkpoint_file(run_idx))
            .context("failed to save checkpoint")?;

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.run_root.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.run_root.join(format!("run-{run_idx:04}"))
    }

    fn count_acquisition_files(&self, run_idx: usize) -> Result<usize> {
        let pattern = self.run_dir(run_idx).join("acquisition-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob acquisition files")?
            .filter_map(Result::ok)
            .count();
        Ok(count)
    }

    fn checkpoint_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("checkpoint.msgpack")
    }

    fn acquisition_file(&self, run_idx: usize, file_idx: usize) -> PathBuf {
        self.run_dir(run_idx)
            .join(format!("acquisition-{file_idx:04}.msgpack"))
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }
}
