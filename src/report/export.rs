use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;
use tracing::info;

use crate::config::HarnessConfig;
use crate::env::EnvMetadata;
use crate::error::{BenchError, Result};
use crate::inserts::InsertComparison;
use crate::provision::ParityReport;
use crate::timing::AlignedSeries;

/// Run summary file name.
pub const SUMMARY_JSON: &str = "results.json";
/// Per-query timing table file name.
pub const QUERY_CSV: &str = "query_times.csv";

/// Everything one invocation measured. Phases that did not run are `null`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    /// Effective configuration with the Postgres password redacted.
    pub config: HarnessConfig,
    /// Host the run executed on.
    pub env: EnvMetadata,
    /// Row counts after provisioning.
    pub parity: Option<&'a ParityReport>,
    /// Per-query samples for both engines.
    pub queries: Option<&'a AlignedSeries>,
    /// Insert loop timings for both engines.
    pub inserts: Option<&'a InsertComparison>,
}

impl<'a> RunSummary<'a> {
    /// Summary with no phase results yet.
    pub fn new(config: &HarnessConfig, env: EnvMetadata) -> Self {
        let mut config = config.clone();
        config.postgres = config.postgres.redacted();
        Self {
            config,
            env,
            parity: None,
            queries: None,
            inserts: None,
        }
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|err| BenchError::resource("create results directory", dir, err))
}

/// Writes `results.json` into `dir`.
pub fn write_summary(dir: &Path, summary: &RunSummary<'_>) -> Result<PathBuf> {
    create_dir(dir)?;
    let path = dir.join(SUMMARY_JSON);
    let bytes = serde_json::to_vec_pretty(summary).map_err(|err| BenchError::Serialize {
        path: path.clone(),
        message: err.to_string(),
    })?;
    fs::write(&path, bytes).map_err(|err| BenchError::resource("write", &path, err))?;
    info!(path = %path.display(), "report.export.summary");
    Ok(path)
}

/// Writes one `query,engine,seconds` row per sample, pairs kept adjacent.
pub fn write_query_csv(dir: &Path, series: &AlignedSeries) -> Result<PathBuf> {
    create_dir(dir)?;
    let path = dir.join(QUERY_CSV);
    let mut writer = Writer::from_path(&path).map_err(|err| csv_error(&path, err))?;
    writer
        .write_record(["query", "engine", "seconds"])
        .map_err(|err| csv_error(&path, err))?;
    for (idx, label) in series.labels().iter().enumerate() {
        for engine in [series.left(), series.right()] {
            let seconds = format!("{:.6}", engine.samples[idx].seconds());
            writer
                .write_record([label.as_str(), engine.engine.as_str(), seconds.as_str()])
                .map_err(|err| csv_error(&path, err))?;
        }
    }
    writer
        .flush()
        .map_err(|err| BenchError::resource("write", &path, err))?;
    info!(path = %path.display(), rows = series.len() * 2, "report.export.csv");
    Ok(path)
}

fn csv_error(path: &Path, err: csv::Error) -> BenchError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => BenchError::resource("write", path, source),
        _ => BenchError::Serialize {
            path: path.to_path_buf(),
            message,
        },
    }
}
