use std::path::Path;

use duckdb::{params_from_iter, Connection};
use tracing::{debug, info};

use super::{Engine, Row};
use crate::error::{BenchError, Result};

const DEFAULT_NAME: &str = "DuckDB";

/// Embedded DuckDB connection.
pub struct DuckEngine {
    name: String,
    conn: Connection,
}

impl DuckEngine {
    /// Opens (or creates) a database file; `:memory:` opens an in-memory one.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|err| BenchError::connection(DEFAULT_NAME, err))?;
        info!(path = %path.display(), "engine.duckdb.opened");
        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            conn,
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Replaces the label reported in logs and charts.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Runs a query and returns every row with each column cast to text.
    pub fn fetch_text_rows(&mut self, sql: &str, width: usize) -> Result<Vec<Row>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| BenchError::statement(&self.name, sql, err))?;
        let mut rows = stmt
            .query([])
            .map_err(|err| BenchError::statement(&self.name, sql, err))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|err| BenchError::statement(&self.name, sql, err))?
        {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                let value: Option<String> = row
                    .get(idx)
                    .map_err(|err| BenchError::statement(&self.name, sql, err))?;
                values.push(value);
            }
            out.push(values);
        }
        debug!(engine = %self.name, rows = out.len(), "engine.duckdb.fetched");
        Ok(out)
    }
}

impl Engine for DuckEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|err| BenchError::statement(&self.name, sql, err))
    }

    fn count_rows(&mut self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|err| BenchError::statement(&self.name, &sql, err))?;
        Ok(count.max(0) as u64)
    }

    fn reset_scratch(&mut self, scratch: &str, template: &str) -> Result<()> {
        self.execute(&format!(
            "DROP TABLE IF EXISTS {scratch}; CREATE TABLE {scratch} AS SELECT * FROM {template} LIMIT 0;"
        ))
    }

    fn insert_bound(&mut self, sql: &str, rows: &[Row]) -> Result<u64> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| BenchError::statement(&self.name, sql, err))?;
        let mut executed = 0u64;
        for row in rows {
            stmt.execute(params_from_iter(row.iter()))
                .map_err(|err| BenchError::statement(&self.name, sql, err))?;
            executed += 1;
        }
        Ok(executed)
    }
}

/// Single-quoted SQL string literal with embedded quotes doubled.
pub(crate) fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DuckEngine {
        let mut engine = DuckEngine::open_in_memory().expect("open duckdb");
        engine
            .execute("CREATE TABLE t (id BIGINT, label VARCHAR); INSERT INTO t VALUES (1, 'a'), (2, NULL);")
            .expect("seed");
        engine
    }

    #[test]
    fn sql_literal_doubles_quotes() {
        assert_eq!(sql_literal("data/o'brien.parquet"), "'data/o''brien.parquet'");
    }

    #[test]
    fn counts_rows() {
        let mut engine = engine();
        assert_eq!(engine.count_rows("t").expect("count"), 2);
    }

    #[test]
    fn fetches_rows_as_text_with_nulls() {
        let mut engine = engine();
        let rows = engine
            .fetch_text_rows("SELECT CAST(id AS VARCHAR), label FROM t ORDER BY id", 2)
            .expect("fetch");
        assert_eq!(
            rows,
            vec![
                vec![Some("1".to_string()), Some("a".to_string())],
                vec![Some("2".to_string()), None],
            ]
        );
    }

    #[test]
    fn scratch_reset_clones_shape_and_empties() {
        let mut engine = engine();
        engine.reset_scratch("t_copy", "t").expect("reset");
        engine
            .execute("INSERT INTO t_copy VALUES (9, 'z')")
            .expect("insert");
        engine.reset_scratch("t_copy", "t").expect("reset again");
        assert_eq!(engine.count_rows("t_copy").expect("count"), 0);
    }

    #[test]
    fn bound_inserts_execute_once_per_row() {
        let mut engine = engine();
        engine.reset_scratch("t_copy", "t").expect("reset");
        let rows = vec![
            vec![Some("7".to_string()), Some("it's quoted".to_string())],
            vec![Some("8".to_string()), None],
        ];
        let executed = engine
            .insert_bound(
                "INSERT INTO t_copy (id, label) VALUES (CAST(CAST($1 AS VARCHAR) AS BIGINT), CAST(CAST($2 AS VARCHAR) AS VARCHAR))",
                &rows,
            )
            .expect("insert");
        assert_eq!(executed, 2);
        assert_eq!(engine.count_rows("t_copy").expect("count"), 2);
    }

    #[test]
    fn statement_errors_name_the_engine() {
        let mut engine = engine().with_name("duck-a");
        let err = engine.execute("SELECT * FROM missing_table").unwrap_err();
        assert!(matches!(err, BenchError::Statement { ref engine, .. } if engine == "duck-a"));
    }
}
