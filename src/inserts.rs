//! Timed insert runner.
//!
//! Rows are read once from the source relation, turned into single-row
//! insert statements, and replayed one at a time against a freshly reset
//! scratch table in each engine. One elapsed time is recorded per engine
//! for the whole loop.

use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::{Column, Relation};
use crate::engine::{sql_literal, DuckEngine, Engine, Row};
use crate::error::{BenchError, Result};
use crate::timing::{as_secs, timed};

/// How insert statements reach the engines.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InsertMode {
    /// One prepared statement; every value bound as a parameter.
    #[default]
    Bound,
    /// One SQL text per row with values spliced in. Text containing a
    /// single quote yields malformed SQL; kept for literal-syntax runs.
    Literal,
}

/// Number of rows replayed for a requested count `n`: the replay loop
/// stops after the row at index `n`, so `n + 1` rows are used.
pub fn replay_row_limit(n: u64) -> u64 {
    n.saturating_add(1)
}

/// Where the replayed rows come from.
#[derive(Clone, Copy, Debug)]
pub enum RowSource<'a> {
    /// An interchange file written during provisioning.
    Parquet(&'a Path),
    /// A table already present in the DuckDB connection.
    Table(&'a str),
}

impl RowSource<'_> {
    fn from_clause(&self) -> String {
        match self {
            RowSource::Parquet(path) => {
                format!("read_parquet({})", sql_literal(&path.to_string_lossy()))
            }
            RowSource::Table(name) => (*name).to_string(),
        }
    }
}

/// Reads up to `replay_row_limit(n)` rows of `columns` from `source`, in
/// source order, with every value as text.
pub fn load_rows(
    duck: &mut DuckEngine,
    source: RowSource<'_>,
    columns: &[Column],
    n: u64,
) -> Result<Vec<Row>> {
    let select = columns
        .iter()
        .map(|c| format!("CAST({} AS VARCHAR)", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {select} FROM {} LIMIT {}",
        source.from_clause(),
        replay_row_limit(n)
    );
    let rows = duck.fetch_text_rows(&sql, columns.len())?;
    info!(rows = rows.len(), requested = n, "inserts.rows_loaded");
    Ok(rows)
}

/// Insert workload against one scratch table.
#[derive(Clone, Debug)]
pub struct InsertPlan {
    table: String,
    template: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
    mode: InsertMode,
    requested: u64,
}

impl InsertPlan {
    /// Plan replaying `rows` into `table`, a clone of `template`.
    pub fn new(
        table: impl Into<String>,
        template: Relation,
        columns: &[Column],
        rows: Vec<Row>,
        mode: InsertMode,
        requested: u64,
    ) -> Self {
        Self {
            table: table.into(),
            template: template.name().to_string(),
            columns: columns.to_vec(),
            rows,
            mode,
            requested,
        }
    }

    /// Statements each engine executes.
    pub fn statement_count(&self) -> u64 {
        self.rows.len() as u64
    }

    /// The replay count N the plan was built for.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Scratch table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parameterized statement; `$n` is cast from text to the n-th column's type.
    pub fn bound_statement(&self) -> String {
        let values = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                format!(
                    "CAST(CAST(${} AS VARCHAR) AS {})",
                    idx + 1,
                    c.kind.sql_type()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({values})",
            self.table,
            self.column_list()
        )
    }

    /// One statement per row with values spliced in as literals.
    pub fn literal_statements(&self) -> Vec<String> {
        let columns = self.column_list();
        self.rows
            .iter()
            .map(|row| {
                let values = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| render_literal(c, v.as_deref()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("INSERT INTO {} ({columns}) VALUES ({values});", self.table)
            })
            .collect()
    }
}

/// Renders one value: numbers bare, text and dates single-quoted, no
/// escaping of embedded quotes.
pub fn render_literal(column: &Column, value: Option<&str>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(v) if column.kind.is_quoted() => format!("'{v}'"),
        Some(v) => v.to_string(),
    }
}

/// Insert timing for one engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InsertTiming {
    /// Engine label.
    pub engine: String,
    /// Statements executed.
    pub statements: u64,
    /// Wall-clock time for the whole loop.
    #[serde(rename = "seconds", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

/// Insert timings for both engines.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InsertComparison {
    /// Replay count N.
    pub requested: u64,
    /// Statement mode used.
    pub mode: InsertMode,
    /// First engine.
    pub left: InsertTiming,
    /// Second engine.
    pub right: InsertTiming,
}

impl InsertComparison {
    /// Both timings, left first.
    pub fn timings(&self) -> [&InsertTiming; 2] {
        [&self.left, &self.right]
    }
}

/// Statement text prepared before the timed loop starts.
enum Prepared {
    Bound(String),
    Literal(Vec<String>),
}

impl Prepared {
    fn for_plan(plan: &InsertPlan) -> Self {
        match plan.mode {
            InsertMode::Bound => Prepared::Bound(plan.bound_statement()),
            InsertMode::Literal => Prepared::Literal(plan.literal_statements()),
        }
    }
}

fn replay(plan: &InsertPlan, prepared: &Prepared, engine: &mut dyn Engine) -> Result<u64> {
    match prepared {
        Prepared::Bound(sql) => engine.insert_bound(sql, &plan.rows),
        Prepared::Literal(statements) => {
            let mut executed = 0u64;
            for sql in statements {
                engine.execute(sql)?;
                executed += 1;
            }
            Ok(executed)
        }
    }
}

fn measure(plan: &InsertPlan, prepared: &Prepared, engine: &mut dyn Engine) -> Result<InsertTiming> {
    let (executed, elapsed) = timed(|| replay(plan, prepared, engine))?;
    let stored = engine.count_rows(&plan.table)?;
    if stored != executed {
        return Err(BenchError::IncompleteInsert {
            engine: engine.name().to_string(),
            table: plan.table.clone(),
            expected: executed,
            actual: stored,
        });
    }
    info!(
        engine = engine.name(),
        statements = executed,
        seconds = elapsed.as_secs_f64(),
        mode = ?plan.mode,
        "inserts.completed"
    );
    Ok(InsertTiming {
        engine: engine.name().to_string(),
        statements: executed,
        elapsed,
    })
}

/// Resets the scratch table in both engines, then times the replay loop on
/// the left engine followed by the right one.
pub fn run_inserts(
    plan: &InsertPlan,
    left: &mut dyn Engine,
    right: &mut dyn Engine,
) -> Result<InsertComparison> {
    if plan.rows.is_empty() {
        warn!(table = %plan.table, "inserts.no_source_rows");
    }
    left.reset_scratch(&plan.table, &plan.template)?;
    right.reset_scratch(&plan.table, &plan.template)?;
    let prepared = Prepared::for_plan(plan);
    info!(
        table = %plan.table,
        statements = plan.statement_count(),
        requested = plan.requested,
        "inserts.begin"
    );
    let left_timing = measure(plan, &prepared, left)?;
    let right_timing = measure(plan, &prepared, right)?;
    Ok(InsertComparison {
        requested: plan.requested,
        mode: plan.mode,
        left: left_timing,
        right: right_timing,
    })
}
