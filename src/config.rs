//! Harness configuration: engine endpoints, workload sizes and output
//! locations, loaded from TOML and overridable from the command line.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inserts::InsertMode;
use crate::provision::VerifyPolicy;
use crate::queries::ExecutionOrder;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TPCH_COMPARE_CONFIG";

/// Complete harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Embedded engine settings.
    pub duckdb: DuckDbSection,
    /// Server engine settings.
    pub postgres: PostgresSection,
    /// Dataset generation and replication.
    pub dataset: DatasetSection,
    /// Query workload.
    pub queries: QuerySection,
    /// Insert workload.
    pub inserts: InsertSection,
    /// Chart and summary outputs.
    pub report: ReportSection,
}

/// DuckDB settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuckDbSection {
    /// Database file; `:memory:` opens an in-memory database.
    pub path: PathBuf,
}

impl Default for DuckDbSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db.duckdb"),
        }
    }
}

/// Postgres connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostgresSection {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub dbname: String,
    /// Schema the TPC-H tables live in.
    pub schema: String,
    /// Alias the Postgres database is attached under inside DuckDB.
    pub attach_alias: String,
}

impl Default for PostgresSection {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "postgres".into(),
            dbname: "postgres".into(),
            schema: "public".into(),
            attach_alias: "postgres_db".into(),
        }
    }
}

impl std::fmt::Debug for PostgresSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("schema", &self.schema)
            .field("attach_alias", &self.attach_alias)
            .finish()
    }
}

impl PostgresSection {
    /// libpq key/value connection string, as accepted by DuckDB's `ATTACH`.
    pub fn conninfo(&self) -> String {
        let port = self.port.to_string();
        [
            ("host", self.host.as_str()),
            ("port", port.as_str()),
            ("user", self.user.as_str()),
            ("password", self.password.as_str()),
            ("dbname", self.dbname.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("{key}={}", conninfo_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Copy with the password replaced, for display.
    pub fn redacted(&self) -> Self {
        Self {
            password: "<redacted>".into(),
            ..self.clone()
        }
    }
}

/// Quotes a conninfo value when it is empty or contains spaces, quotes or
/// backslashes.
fn conninfo_value(value: &str) -> String {
    let needs_quotes =
        value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Dataset provisioning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetSection {
    /// TPC-H scale factor passed to `dbgen`.
    pub scale_factor: f64,
    /// Directory receiving one Parquet file per relation.
    pub data_dir: PathBuf,
    /// Create the TPC-H tables in Postgres when they are missing.
    pub create_target_schema: bool,
    /// What to do when row counts differ after replication.
    pub verify: VerifyPolicy,
}

impl Default for DatasetSection {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            data_dir: PathBuf::from("data"),
            create_target_schema: true,
            verify: VerifyPolicy::default(),
        }
    }
}

/// Query workload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuerySection {
    /// Directory holding `q1.sql` .. `qN.sql`.
    pub dir: PathBuf,
    /// Number of query files to run, starting at `q1.sql`.
    pub count: u32,
    /// Order in which engines and queries alternate.
    pub order: ExecutionOrder,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("sql"),
            count: 5,
            order: ExecutionOrder::default(),
        }
    }
}

/// Insert workload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsertSection {
    /// Replay count N; N + 1 rows are replayed when the source has them.
    pub count: u64,
    /// How insert statements are issued.
    pub mode: InsertMode,
    /// Scratch table receiving the replayed rows.
    pub scratch_table: String,
}

impl Default for InsertSection {
    fn default() -> Self {
        Self {
            count: 10_000,
            mode: InsertMode::default(),
            scratch_table: "lineitem_copy".into(),
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSection {
    /// Directory receiving chart images.
    pub chart_dir: PathBuf,
    /// Directory receiving `results.json` and `query_times.csv`.
    pub results_dir: PathBuf,
    /// Chart width in pixels.
    pub width: u32,
    /// Chart height in pixels.
    pub height: u32,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            chart_dir: PathBuf::from("img"),
            results_dir: PathBuf::from("results"),
            width: 1024,
            height: 640,
        }
    }
}

impl HarnessConfig {
    /// Loads the configuration from `explicit`, else `$TPCH_COMPARE_CONFIG`,
    /// else the per-user default path. A missing file yields defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path);
        let config = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => HarnessConfig::default(),
        };
        Ok((config, path))
    }

    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn persist(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized =
            toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })?;
        fs::write(path, serialized).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects settings no run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dataset.scale_factor.is_finite() && self.dataset.scale_factor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "dataset.scale_factor must be positive, got {}",
                self.dataset.scale_factor
            )));
        }
        if self.queries.count == 0 {
            return Err(ConfigError::Invalid(
                "queries.count must be at least 1".into(),
            ));
        }
        if self.report.width == 0 || self.report.height == 0 {
            return Err(ConfigError::Invalid(
                "report.width and report.height must be non-zero".into(),
            ));
        }
        for (field, value) in [
            ("inserts.scratch_table", &self.inserts.scratch_table),
            ("postgres.attach_alias", &self.postgres.attach_alias),
            ("postgres.schema", &self.postgres.schema),
        ] {
            if !is_identifier(value) {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be a plain SQL identifier, got '{value}'"
                )));
            }
        }
        if self.dataset.data_dir == self.report.chart_dir {
            return Err(ConfigError::Invalid(
                "dataset.data_dir and report.chart_dir must differ".into(),
            ));
        }
        Ok(())
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn read_file(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    HarnessConfig::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Per-user config location, e.g. `~/.config/tpch-compare/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("tpch-compare").join("config.toml"))
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file unreadable.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },
    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// TOML error.
        source: toml::de::Error,
    },
    /// Config could not be serialized.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// TOML error.
        source: toml::ser::Error,
    },
    /// Config file could not be written.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// Config path.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },
    /// Config directory could not be created.
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },
    /// A setting is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// No path was given and no per-user config directory exists.
    #[error("no config directory found; pass --config or set TPCH_COMPARE_CONFIG")]
    NoConfigPath,
}
