//! Engine handles the harness drives.
//!
//! Both engines are black boxes behind a small synchronous surface: run SQL
//! text, count rows, reset a scratch table and replay bound inserts. The
//! phases only ever see `&mut dyn Engine`, so the same code measures DuckDB
//! and Postgres, and tests can substitute in-memory engines.

mod duck;
mod pg;

pub use duck::DuckEngine;
pub(crate) use duck::sql_literal;
pub use pg::PgEngine;

use crate::error::Result;

/// A single replayed row; `None` is SQL `NULL`. Values are carried as text
/// and cast to the column type by the engine.
pub type Row = Vec<Option<String>>;

/// Synchronous SQL surface shared by both engines.
pub trait Engine {
    /// Human-readable label used in logs, charts and summaries.
    fn name(&self) -> &str;

    /// Executes one or more statements, materializing and discarding any
    /// result rows. Blocks until the engine returns.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Returns `SELECT COUNT(*)` for `table`.
    fn count_rows(&mut self, table: &str) -> Result<u64>;

    /// Leaves `scratch` as an empty table shaped like `template`.
    fn reset_scratch(&mut self, scratch: &str, template: &str) -> Result<()>;

    /// Prepares `sql` once and executes it for every row in order, with `$n`
    /// bound to the n-th value. Returns the number of statements executed.
    fn insert_bound(&mut self, sql: &str, rows: &[Row]) -> Result<u64>;
}
