//! Charts and machine-readable summaries of a finished run.

mod chart;
mod export;

use std::path::{Path, PathBuf};

pub use chart::{render_insert_chart, render_query_chart, ChartSize};
pub use export::{write_query_csv, write_summary, RunSummary, QUERY_CSV, SUMMARY_JSON};

use crate::config::ReportSection;
use crate::error::Result;
use crate::inserts::InsertComparison;
use crate::timing::AlignedSeries;

/// File name of the grouped query latency chart.
pub const QUERY_CHART: &str = "query_time.svg";
/// File name of the insert latency chart.
pub const INSERT_CHART: &str = "insert_time.svg";

/// Renders whichever charts have data into `section.chart_dir` and returns
/// the written paths.
pub fn render_charts(
    section: &ReportSection,
    queries: Option<&AlignedSeries>,
    inserts: Option<&InsertComparison>,
) -> Result<Vec<PathBuf>> {
    let size = ChartSize::from(section);
    let mut written = Vec::new();
    if let Some(queries) = queries {
        written.push(render_query_chart(
            &section.chart_dir.join(QUERY_CHART),
            queries,
            size,
        )?);
    }
    if let Some(inserts) = inserts {
        written.push(render_insert_chart(
            &section.chart_dir.join(INSERT_CHART),
            inserts,
            size,
        )?);
    }
    Ok(written)
}

/// Writes `results.json` and, when queries ran, `query_times.csv` into `dir`.
pub fn export_results(dir: &Path, summary: &RunSummary<'_>) -> Result<Vec<PathBuf>> {
    let mut written = vec![write_summary(dir, summary)?];
    if let Some(queries) = summary.queries {
        written.push(write_query_csv(dir, queries)?);
    }
    Ok(written)
}
