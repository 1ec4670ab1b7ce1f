use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used across the harness.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Boxed driver error carried by connection and statement failures.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Process exit codes, one per failure class.
pub mod exit_code {
    /// Unclassified failure.
    pub const GENERAL: i32 = 1;
    /// Engine unreachable or misconfigured.
    pub const CONNECTION: i32 = 2;
    /// A statement failed inside an engine.
    pub const STATEMENT: i32 = 3;
    /// Missing input file or unwritable output location.
    pub const RESOURCE: i32 = 4;
    /// Row counts differ between engines under the enforce policy.
    pub const PARITY: i32 = 5;
    /// Configuration could not be loaded or is invalid.
    pub const CONFIG: i32 = 6;
    /// Chart rendering failed.
    pub const RENDER: i32 = 7;
}

/// Errors surfaced by the harness phases.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Engine connection could not be established.
    #[error("failed to connect to {engine}: {source}")]
    Connection {
        /// Engine label.
        engine: String,
        /// Driver error.
        #[source]
        source: DriverError,
    },
    /// Statement execution failed.
    #[error("{engine} failed to execute `{statement}`: {source}")]
    Statement {
        /// Engine label.
        engine: String,
        /// Abbreviated statement text.
        statement: String,
        /// Driver error.
        #[source]
        source: DriverError,
    },
    /// Filesystem input or output failed.
    #[error("failed to {action} {}: {source}", path.display())]
    Resource {
        /// What the harness was doing, e.g. "read query file".
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Row counts disagree and the verify policy is `enforce`.
    #[error("row counts differ between engines for: {}", relations.join(", "))]
    ParityMismatch {
        /// Relations whose counts disagree.
        relations: Vec<String>,
    },
    /// An insert run finished with fewer rows in the scratch table than executed.
    #[error("{engine} holds {actual} rows in {table} after replaying {expected} inserts")]
    IncompleteInsert {
        /// Engine label.
        engine: String,
        /// Scratch table name.
        table: String,
        /// Statements executed.
        expected: u64,
        /// Rows found afterwards.
        actual: u64,
    },
    /// Two timing sequences cannot be compared index by index.
    #[error("timing series are not aligned: {0}")]
    Misaligned(String),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Chart rendering failure.
    #[error("failed to render {}: {message}", path.display())]
    Render {
        /// Target image path.
        path: PathBuf,
        /// Backend message.
        message: String,
    },
    /// JSON or CSV serialization of the run summary failed.
    #[error("failed to serialize {}: {message}", path.display())]
    Serialize {
        /// Target file path.
        path: PathBuf,
        /// Serializer message.
        message: String,
    },
}

impl BenchError {
    pub(crate) fn connection(engine: &str, source: impl Into<DriverError>) -> Self {
        BenchError::Connection {
            engine: engine.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn statement(engine: &str, sql: &str, source: impl Into<DriverError>) -> Self {
        BenchError::Statement {
            engine: engine.to_string(),
            statement: preview(sql),
            source: source.into(),
        }
    }

    pub(crate) fn resource(action: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        BenchError::Resource {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Exit code for the failure class of this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Connection { .. } => exit_code::CONNECTION,
            BenchError::Statement { .. } | BenchError::IncompleteInsert { .. } => {
                exit_code::STATEMENT
            }
            BenchError::Resource { .. } | BenchError::Serialize { .. } => exit_code::RESOURCE,
            BenchError::ParityMismatch { .. } => exit_code::PARITY,
            BenchError::Config(_) => exit_code::CONFIG,
            BenchError::Render { .. } => exit_code::RENDER,
            BenchError::Misaligned(_) => exit_code::GENERAL,
        }
    }
}

const PREVIEW_CHARS: usize = 96;

/// First non-empty line of a statement, clipped for error messages.
fn preview(sql: &str) -> String {
    let line = sql
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    let mut out: String = line.chars().take(PREVIEW_CHARS).collect();
    if line.chars().count() > PREVIEW_CHARS || sql.trim().lines().count() > 1 {
        out.push_str(" ...");
    }
    out
}
