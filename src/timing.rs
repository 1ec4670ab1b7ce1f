//! Wall-clock samples and the per-engine series built from them.

use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::error::{BenchError, Result};

/// One measured statement (or statement loop).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimingSample {
    /// What was measured, e.g. `q3`.
    pub label: String,
    /// Elapsed wall-clock time.
    #[serde(rename = "seconds", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

impl TimingSample {
    /// Elapsed time in fractional seconds.
    pub fn seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

pub(crate) fn as_secs<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Runs `f` and returns its output with the elapsed time. Nothing is
/// returned when `f` fails, so a failed statement never becomes a sample.
pub fn timed<T>(f: impl FnOnce() -> Result<T>) -> Result<(T, Duration)> {
    let start = Instant::now();
    let out = f()?;
    Ok((out, start.elapsed()))
}

/// Ordered samples for one engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimingSeries {
    /// Engine label.
    pub engine: String,
    /// Samples in execution order.
    pub samples: Vec<TimingSample>,
}

impl TimingSeries {
    /// Empty series for `engine`.
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            samples: Vec::new(),
        }
    }

    /// Appends a sample.
    pub fn push(&mut self, label: impl Into<String>, elapsed: Duration) {
        self.samples.push(TimingSample {
            label: label.into(),
            elapsed,
        });
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when nothing was measured.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Elapsed seconds in sample order.
    pub fn seconds(&self) -> Vec<f64> {
        self.samples.iter().map(TimingSample::seconds).collect()
    }

    /// Largest elapsed time in seconds, 0 when empty.
    pub fn max_seconds(&self) -> f64 {
        self.samples
            .iter()
            .map(TimingSample::seconds)
            .fold(0.0, f64::max)
    }

    /// Sum of all samples.
    pub fn total(&self) -> Duration {
        self.samples.iter().map(|s| s.elapsed).sum()
    }
}

/// Two series whose i-th samples measure the same statement. Only
/// constructible from series of equal length with matching labels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlignedSeries {
    labels: Vec<String>,
    left: TimingSeries,
    right: TimingSeries,
}

impl AlignedSeries {
    /// Pairs two series, rejecting any length or label mismatch.
    pub fn new(left: TimingSeries, right: TimingSeries) -> Result<Self> {
        if left.len() != right.len() {
            return Err(BenchError::Misaligned(format!(
                "{} has {} samples, {} has {}",
                left.engine,
                left.len(),
                right.engine,
                right.len()
            )));
        }
        for (idx, (a, b)) in left.samples.iter().zip(&right.samples).enumerate() {
            if a.label != b.label {
                return Err(BenchError::Misaligned(format!(
                    "index {idx} is {} for {} but {} for {}",
                    a.label, left.engine, b.label, right.engine
                )));
            }
        }
        let labels = left.samples.iter().map(|s| s.label.clone()).collect();
        Ok(Self {
            labels,
            left,
            right,
        })
    }

    /// Shared labels in order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// First engine's series.
    pub fn left(&self) -> &TimingSeries {
        &self.left
    }

    /// Second engine's series.
    pub fn right(&self) -> &TimingSeries {
        &self.right
    }

    /// Number of aligned pairs.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when no statements were measured.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Largest sample across both engines, in seconds.
    pub fn max_seconds(&self) -> f64 {
        self.left.max_seconds().max(self.right.max_seconds())
    }
}
