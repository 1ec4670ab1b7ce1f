//! Timed query runner.
//!
//! Every query file is read fresh for each engine, submitted whole to the
//! engine's synchronous interface and timed around that one call.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::Engine;
use crate::error::{BenchError, Result};
use crate::timing::{timed, AlignedSeries, TimingSeries};

/// Order in which the two engines work through the query set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionOrder {
    /// The first engine runs every query, then the second engine does.
    /// Caches warmed by one engine's pass are not mirrored for the other.
    #[default]
    TwoPass,
    /// Each query runs on the first engine, then on the second, before
    /// moving to the next query.
    Interleaved,
}

/// Numbered query files `q1.sql` .. `qK.sql` under a directory.
#[derive(Clone, Debug)]
pub struct QuerySet {
    dir: PathBuf,
    count: u32,
}

impl QuerySet {
    /// Query set of `count` files under `dir`.
    pub fn new(dir: impl Into<PathBuf>, count: u32) -> Self {
        Self {
            dir: dir.into(),
            count,
        }
    }

    /// Identifiers in execution order.
    pub fn ids(&self) -> impl Iterator<Item = u32> {
        1..=self.count
    }

    /// Number of queries.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// True when the set has no queries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Directory the files are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Label used for query `id` in samples and charts.
    pub fn label(id: u32) -> String {
        format!("q{id}")
    }

    /// File holding query `id`.
    pub fn path(&self, id: u32) -> PathBuf {
        self.dir.join(format!("q{id}.sql"))
    }

    /// Reads query `id` from disk. Missing or unreadable files are errors.
    pub fn read(&self, id: u32) -> Result<String> {
        let path = self.path(id);
        fs::read_to_string(&path).map_err(|err| BenchError::resource("read query file", &path, err))
    }

    /// Fails on the first missing query file without executing anything.
    pub fn check_present(&self) -> Result<()> {
        for id in self.ids() {
            let path = self.path(id);
            fs::metadata(&path)
                .map_err(|err| BenchError::resource("read query file", &path, err))?;
        }
        Ok(())
    }
}

/// Times query `id` against `engine` and appends the sample.
fn run_one(set: &QuerySet, id: u32, engine: &mut dyn Engine, series: &mut TimingSeries) -> Result<()> {
    let sql = set.read(id)?;
    let ((), elapsed) = timed(|| engine.execute(&sql))?;
    info!(
        engine = engine.name(),
        query = id,
        seconds = elapsed.as_secs_f64(),
        "queries.executed"
    );
    series.push(QuerySet::label(id), elapsed);
    Ok(())
}

/// Runs the whole set against both engines and returns the aligned series.
pub fn run_queries(
    set: &QuerySet,
    order: ExecutionOrder,
    left: &mut dyn Engine,
    right: &mut dyn Engine,
) -> Result<AlignedSeries> {
    let mut left_series = TimingSeries::new(left.name());
    let mut right_series = TimingSeries::new(right.name());
    info!(
        queries = set.len(),
        order = ?order,
        dir = %set.dir().display(),
        "queries.begin"
    );
    match order {
        ExecutionOrder::TwoPass => {
            for id in set.ids() {
                run_one(set, id, left, &mut left_series)?;
            }
            for id in set.ids() {
                run_one(set, id, right, &mut right_series)?;
            }
        }
        ExecutionOrder::Interleaved => {
            for id in set.ids() {
                run_one(set, id, left, &mut left_series)?;
                run_one(set, id, right, &mut right_series)?;
            }
        }
    }
    let aligned = AlignedSeries::new(left_series, right_series)?;
    info!(
        left_total_s = aligned.left().total().as_secs_f64(),
        right_total_s = aligned.right().total().as_secs_f64(),
        "queries.completed"
    );
    Ok(aligned)
}
