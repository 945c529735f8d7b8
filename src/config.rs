use crate::model::Sweep;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Acquisition configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Swept parameter, one channel per sweep point.
    pub sweep: Sweep,
    /// Synthetic signal parameters.
    pub source: SourceConfig,
    /// Result fetching parameters.
    pub fetch: FetchConfig,
}

/// Rabi-like I/Q signal with Gaussian readout noise.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Oscillation amplitude of the I quadrature.
    pub amp: f64,
    /// Oscillation period in sweep units.
    pub period: f64,
    /// Constant I offset.
    pub offset_i: f64,
    /// Constant Q offset.
    pub offset_q: f64,
    /// Standard deviation of the noise on each quadrature.
    pub noise: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total number of repetitions per run.
    pub reps: usize,
    /// Maximum number of repetitions returned by a single poll.
    pub max_batch: usize,
    /// Probability that a poll returns no new results.
    pub prob_idle: f64,
    /// Number of polls per acquisition file.
    pub polls_per_file: usize,
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
        let sweep = &self.sweep;
        check_num(sweep.step, 1e-12..).context("invalid sweep step")?;
        check_num(sweep.stop, sweep.start..).context("invalid sweep stop")?;
        check_num(sweep.n_points(), 1..10_000).context("invalid number of sweep points")?;

        let source = &self.source;
        check_finite(source.amp).context("invalid signal amplitude")?;
        check_num(source.period, 1e-12..).context("invalid signal period")?;
        check_finite(source.offset_i).context("invalid I offset")?;
        check_finite(source.offset_q).context("invalid Q offset")?;
        check_num(source.noise, 0.0..1e6).context("invalid noise standard deviation")?;

        let fetch = &self.fetch;
        check_num(fetch.reps, 2..100_000_000).context("invalid number of repetitions")?;
        check_num(fetch.max_batch, 1..100_000).context("invalid maximum batch size")?;
        check_num(fetch.prob_idle, 0.0..1.0).context("invalid idle probability")?;
        check_num(fetch.polls_per_file, 1..100_000).context("invalid number of polls per file")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_finite(num: f64) -> Result<()> {
    if !num.is_finite() {
        bail!("number must be finite, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) const EXAMPLE: &str = r#"
[sweep]
start = -1.9
stop = 1.9
step = 0.1

[source]
amp = 1.0
period = 2.0
offset_i = 0.0
offset_q = 0.5
noise = 0.2

[fetch]
reps = 2000
max_batch = 64
prob_idle = 0.1
polls_per_file = 32
"#;
