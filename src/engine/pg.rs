use postgres::types::ToSql;
use postgres::{Client, NoTls};
use tracing::info;

use super::{Engine, Row};
use crate::config::PostgresSection;
use crate::error::{BenchError, Result};

const DEFAULT_NAME: &str = "Postgres";

/// Blocking Postgres client.
pub struct PgEngine {
    name: String,
    client: Client,
}

impl PgEngine {
    /// Connects with the configured endpoint and pins `search_path` to the
    /// configured schema.
    pub fn connect(cfg: &PostgresSection) -> Result<Self> {
        let mut client = postgres::Config::new()
            .host(&cfg.host)
            .port(cfg.port)
            .user(&cfg.user)
            .password(&cfg.password)
            .dbname(&cfg.dbname)
            .application_name("tpch-compare")
            .connect(NoTls)
            .map_err(|err| BenchError::connection(DEFAULT_NAME, err))?;
        let set_path = format!("SET search_path TO {}", cfg.schema);
        client
            .batch_execute(&set_path)
            .map_err(|err| BenchError::statement(DEFAULT_NAME, &set_path, err))?;
        info!(
            host = %cfg.host,
            port = cfg.port,
            dbname = %cfg.dbname,
            schema = %cfg.schema,
            "engine.postgres.connected"
        );
        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            client,
        })
    }

    /// Replaces the label reported in logs and charts.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Engine for PgEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.client
            .batch_execute(sql)
            .map_err(|err| BenchError::statement(&self.name, sql, err))
    }

    fn count_rows(&mut self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let row = self
            .client
            .query_one(sql.as_str(), &[])
            .map_err(|err| BenchError::statement(&self.name, &sql, err))?;
        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }

    fn reset_scratch(&mut self, scratch: &str, template: &str) -> Result<()> {
        self.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {scratch} (LIKE {template}); TRUNCATE {scratch};"
        ))
    }

    fn insert_bound(&mut self, sql: &str, rows: &[Row]) -> Result<u64> {
        let stmt = self
            .client
            .prepare(sql)
            .map_err(|err| BenchError::statement(&self.name, sql, err))?;
        let mut executed = 0u64;
        for row in rows {
            let params: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            self.client
                .execute(&stmt, &params)
                .map_err(|err| BenchError::statement(&self.name, sql, err))?;
            executed += 1;
        }
        Ok(executed)
    }
}
