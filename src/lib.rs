//! Timed comparison harness for DuckDB and Postgres over TPC-H data.
//!
//! A run provisions the dataset in DuckDB, replicates it into Postgres,
//! times the same query files and single-row inserts against both engines,
//! and renders the collected timings as charts plus a JSON/CSV summary.

#![warn(missing_docs)]

pub mod config;
pub mod dataset;
pub mod engine;
pub mod env;
pub mod error;
pub mod inserts;
pub mod provision;
pub mod queries;
pub mod report;
pub mod timing;

pub use config::HarnessConfig;
pub use engine::{DuckEngine, Engine, PgEngine};
pub use error::{BenchError, Result};
