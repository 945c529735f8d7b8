use crate::stats::{compute_mean, compute_sem};
use crate::types::{AnalysisReport, Record};
use anyhow::{Context, Result, bail};
use ndarray::{Array2, ArrayView1, Axis, concatenate};
use rmp_serde::{decode, encode};
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

/// Checks a finished run against the closed-form two-pass computation.
pub struct Analyzer {
    z_raw_vec: Vec<Array2<f64>>,
    last_record: Option<Record>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            z_raw_vec: Vec::new(),
            last_record: None,
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        while !reader
            .fill_buf()
            .context("failed to fill reader buffer")?
            .is_empty()
        {
            let record: Record = decode::from_read(&mut reader).context("failed to read record")?;
            self.add_record(record)?;
        }
        Ok(())
    }

    pub fn add_record(&mut self, record: Record) -> Result<()> {
        let n_vals: usize = self.z_raw_vec.iter().map(|z| z.nrows()).sum();
        let expected = n_vals + record.z_raw.nrows();
        if record.num_so_far != expected {
            bail!(
                "record count must be {expected}, but is {}",
                record.num_so_far
            );
        }

        self.z_raw_vec.push(record.z_raw.clone());
        self.last_record = Some(record);
        Ok(())
    }

    pub fn report(&self) -> Result<AnalysisReport> {
        let Some(last_record) = &self.last_record else {
            bail!("no records to analyze");
        };

        let views: Vec<_> = self.z_raw_vec.iter().map(|z| z.view()).collect();
        let z_raw = concatenate(Axis(0), &views).context("failed to concatenate records")?;

        let mean = compute_mean(z_raw.view());
        let sem = compute_sem(z_raw.view());
        let max_abs_dev = nan_max(
            max_abs_diff(mean.view(), last_record.mean.view()),
            max_abs_diff(sem.view(), last_record.std_err.view()),
        );

        Ok(AnalysisReport {
            n_vals: z_raw.nrows(),
            mean,
            sem,
            stream_mean: last_record.mean.clone(),
            stream_sem: last_record.std_err.clone(),
            max_abs_dev,
        })
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let report = self.report().context("failed to build report")?;
        log::info!(
            "n_vals = {}, max_abs_dev = {:.3e}",
            report.n_vals,
            report.max_abs_dev
        );

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &report).context("failed to serialize report")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

fn max_abs_diff(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, nan_max)
}

/// Like `f64::max`, but a NaN on either side wins.
fn nan_max(acc: f64, diff: f64) -> f64 {
    if diff.is_nan() || diff > acc { diff } else { acc }
}
