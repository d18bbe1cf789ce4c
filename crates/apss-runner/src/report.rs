use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::config::ExperimentConfig;
use crate::driver::RunPlan;
use crate::engine::Plan;
use crate::measure::{CounterSeries, Statistics};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentResult {
    pub value: usize,
    /// Mean microseconds per iteration, one entry per sample.
    pub samples_us: Vec<f64>,
    pub timing: Statistics,
    pub baseline_ratio: Option<f64>,
    pub counters: Vec<CounterSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub baseline: bool,
    pub plan: Plan,
    pub experiments: Vec<ExperimentResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRecord {
    pub value: usize,
    pub threshold: f32,
    pub path: PathBuf,
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: &'static str,
    pub run_id: String,
    pub created_at: String,
    pub group: String,
    pub config: ExperimentConfig,
    pub baseline: String,
    pub references: Vec<String>,
    pub not_implemented: Vec<String>,
    pub datasets: Vec<DatasetRecord>,
    pub results: Vec<BenchmarkResult>,
}

impl Report {
    pub fn new(
        group: &str,
        config: &ExperimentConfig,
        plan: &RunPlan,
        catalog: &Catalog,
        results: Vec<BenchmarkResult>,
    ) -> Self {
        let now = Utc::now();
        Self {
            schema_version: "apss_report_v1",
            run_id: format!("run_{}", now.format("%Y%m%d_%H%M%S")),
            created_at: now.to_rfc3339(),
            group: group.to_string(),
            config: config.clone(),
            baseline: plan.baseline.clone(),
            references: plan.references.clone(),
            not_implemented: plan.not_implemented.clone(),
            datasets: dataset_records(catalog),
            results,
        }
    }

    pub fn result(&self, name: &str) -> Option<&BenchmarkResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Datasets that cannot be read get no digest; the failure surfaces when a
/// trial prepares them.
pub fn dataset_records(catalog: &Catalog) -> Vec<DatasetRecord> {
    catalog
        .entries()
        .iter()
        .enumerate()
        .map(|(value, entry)| DatasetRecord {
            value,
            threshold: entry.threshold,
            path: entry.path.clone(),
            digest: sha256_file(&entry.path).ok(),
        })
        .collect()
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

pub fn write_json(path: &Path, report: &Report) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(report)?;
    atomic_write_bytes(path, &bytes)
}

fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("report");
    let tmp = path.with_file_name(format!(
        ".{}.tmp.{}.{}",
        name,
        std::process::id(),
        Utc::now().timestamp_micros()
    ));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
}

/// Plain-text result table, one row per benchmark and experiment value,
/// followed by the raw counter values of every trial.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run_id: {}", report.run_id);
    let _ = writeln!(out, "group: {}", report.group);
    let _ = writeln!(out, "baseline: {}", report.baseline);
    if !report.references.is_empty() {
        let _ = writeln!(out, "references: {}", report.references.join(", "));
    }
    if !report.not_implemented.is_empty() {
        let _ = writeln!(out, "not_implemented: {}", report.not_implemented.join(", "));
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<12} {:>6} {:>8} {:>10} {:>14} {:>12} {:>10}",
        "benchmark", "value", "samples", "iterations", "us/iteration", "std_dev", "baseline"
    );
    for result in &report.results {
        for exp in &result.experiments {
            let ratio = exp
                .baseline_ratio
                .map(|r| format!("{:.3}", r))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{:<12} {:>6} {:>8} {:>10} {:>14.3} {:>12.3} {:>10}",
                result.name,
                exp.value,
                result.plan.samples,
                result.plan.iterations,
                exp.timing.mean,
                exp.timing.std_dev,
                ratio
            );
        }
    }
    render_counters(&mut out, report);
    out
}

fn render_counters(out: &mut String, report: &Report) {
    let rows = report
        .results
        .iter()
        .flat_map(|r| r.experiments.iter().map(move |e| (r.name.as_str(), e)))
        .flat_map(|(name, e)| e.counters.iter().map(move |s| (name, e.value, s)));
    let mut header = false;
    for (name, value, series) in rows {
        if !header {
            let _ = writeln!(out);
            let _ = writeln!(out, "counters:");
            header = true;
        }
        let raw: Vec<String> = series.values.iter().map(u64::to_string).collect();
        let _ = write!(out, "  {}[{}] {}: {}", name, value, series.name, raw.join(" "));
        let summary = series.summary();
        if !summary.is_empty() {
            let parts: Vec<String> = summary
                .iter()
                .map(|(stat, v)| format!("{}={:.3}", stat, v))
                .collect();
            let _ = write!(out, " ({})", parts.join(" "));
        }
        let _ = writeln!(out);
    }
}
