//! Dataset provisioning: generate TPC-H in DuckDB, export one Parquet file
//! per relation, copy each file into Postgres through DuckDB's Postgres
//! attachment, then compare row counts on both sides.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::dataset::{Relation, POSTGRES_SCHEMA};
use crate::engine::{sql_literal, Engine};
use crate::error::{BenchError, Result};

/// What a row-count mismatch after replication does to the run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyPolicy {
    /// Mismatches are logged and abort the run.
    #[default]
    Enforce,
    /// Mismatches are logged and the run continues.
    Advisory,
}

/// Inputs to a provisioning run.
#[derive(Clone, Debug)]
pub struct ProvisionOptions {
    /// TPC-H scale factor.
    pub scale_factor: f64,
    /// Directory receiving the Parquet files.
    pub data_dir: PathBuf,
    /// libpq connection string for the attachment.
    pub conninfo: String,
    /// Alias the attached database is addressed by.
    pub alias: String,
    /// Postgres schema holding the tables.
    pub schema: String,
    /// Apply the TPC-H DDL to Postgres first.
    pub create_target_schema: bool,
    /// Mismatch handling.
    pub verify: VerifyPolicy,
}

impl ProvisionOptions {
    /// Options derived from the harness configuration.
    pub fn from_config(cfg: &HarnessConfig) -> Self {
        Self {
            scale_factor: cfg.dataset.scale_factor,
            data_dir: cfg.dataset.data_dir.clone(),
            conninfo: cfg.postgres.conninfo(),
            alias: cfg.postgres.attach_alias.clone(),
            schema: cfg.postgres.schema.clone(),
            create_target_schema: cfg.dataset.create_target_schema,
            verify: cfg.dataset.verify,
        }
    }
}

/// Row counts of one relation in both engines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationCount {
    /// Relation compared.
    pub relation: Relation,
    /// Rows in the source engine.
    pub source: u64,
    /// Rows in the target engine.
    pub target: u64,
}

impl RelationCount {
    /// True when both engines hold the same number of rows.
    pub fn matches(&self) -> bool {
        self.source == self.target
    }
}

/// Per-relation row counts after replication.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParityReport {
    /// Source engine label.
    pub source_engine: String,
    /// Target engine label.
    pub target_engine: String,
    /// One entry per relation, in provisioning order.
    pub counts: Vec<RelationCount>,
}

impl ParityReport {
    /// Entries whose counts differ.
    pub fn mismatches(&self) -> impl Iterator<Item = &RelationCount> {
        self.counts.iter().filter(|c| !c.matches())
    }

    /// True when every relation matches.
    pub fn is_consistent(&self) -> bool {
        self.mismatches().next().is_none()
    }

    /// Applies `policy`: always `Ok` under `advisory`, an error naming the
    /// differing relations under `enforce`.
    pub fn check(&self, policy: VerifyPolicy) -> Result<()> {
        let relations: Vec<String> = self.mismatches().map(|c| c.relation.to_string()).collect();
        if relations.is_empty() || policy == VerifyPolicy::Advisory {
            return Ok(());
        }
        Err(BenchError::ParityMismatch { relations })
    }
}

/// Step A: drops every relation in `source` so a rerun starts clean.
pub fn reset_relations(source: &mut dyn Engine) -> Result<()> {
    for relation in Relation::ALL {
        source.execute(&format!("DROP TABLE IF EXISTS {relation};"))?;
    }
    info!(engine = source.name(), "provision.reset");
    Ok(())
}

/// Step B: loads the `tpch` extension and runs `dbgen`.
pub fn generate_tpch(source: &mut dyn Engine, scale_factor: f64) -> Result<()> {
    source.execute("INSTALL tpch; LOAD tpch;")?;
    source.execute(&format!("CALL dbgen(sf = {scale_factor});"))?;
    info!(engine = source.name(), scale_factor, "provision.generated");
    Ok(())
}

/// Step C: writes every relation to `<data_dir>/<relation>.parquet`,
/// creating `data_dir` when needed. Returns the files in relation order.
pub fn export_relations(source: &mut dyn Engine, data_dir: &Path) -> Result<Vec<(Relation, PathBuf)>> {
    fs::create_dir_all(data_dir)
        .map_err(|err| BenchError::resource("create data directory", data_dir, err))?;
    let mut files = Vec::with_capacity(Relation::ALL.len());
    for relation in Relation::ALL {
        let path = relation.parquet_path(data_dir);
        source.execute(&format!(
            "COPY {relation} TO {} (FORMAT PARQUET);",
            sql_literal(&path.to_string_lossy())
        ))?;
        info!(relation = relation.name(), path = %path.display(), "provision.exported");
        files.push((relation, path));
    }
    Ok(files)
}

/// Attached database scope; detaches on drop, including after a failed copy.
struct Attachment<'a> {
    engine: &'a mut dyn Engine,
    alias: &'a str,
}

impl<'a> Attachment<'a> {
    fn open(engine: &'a mut dyn Engine, conninfo: &str, alias: &'a str, schema: &str) -> Result<Self> {
        engine.execute("INSTALL postgres; LOAD postgres;")?;
        engine.execute(&format!(
            "ATTACH {} AS {alias} (TYPE POSTGRES, SCHEMA {});",
            sql_literal(conninfo),
            sql_literal(schema)
        ))?;
        info!(alias, schema, "provision.attached");
        Ok(Self { engine, alias })
    }
}

impl Drop for Attachment<'_> {
    fn drop(&mut self) {
        match self.engine.execute(&format!("DETACH {};", self.alias)) {
            Ok(()) => info!(alias = self.alias, "provision.detached"),
            Err(err) => warn!(alias = self.alias, error = %err, "provision.detach_failed"),
        }
    }
}

/// Step D: truncates each target table and bulk-loads it from its Parquet
/// file through the attachment.
pub fn replicate(source: &mut dyn Engine, files: &[(Relation, PathBuf)], opts: &ProvisionOptions) -> Result<()> {
    let mut attachment = Attachment::open(source, &opts.conninfo, &opts.alias, &opts.schema)?;
    let alias = attachment.alias;
    for (relation, path) in files {
        info!(relation = relation.name(), "provision.replicate.begin");
        attachment
            .engine
            .execute(&format!("TRUNCATE {alias}.{relation};"))?;
        attachment.engine.execute(&format!(
            "COPY {alias}.{relation} FROM {};",
            sql_literal(&path.to_string_lossy())
        ))?;
        info!(relation = relation.name(), "provision.replicate.copied");
    }
    Ok(())
}

/// Step E: counts every relation in both engines independently. Mismatches
/// are logged here whatever the policy.
pub fn verify_parity(source: &mut dyn Engine, target: &mut dyn Engine) -> Result<ParityReport> {
    let mut counts = Vec::with_capacity(Relation::ALL.len());
    for relation in Relation::ALL {
        let entry = RelationCount {
            relation,
            source: source.count_rows(relation.name())?,
            target: target.count_rows(relation.name())?,
        };
        if entry.matches() {
            info!(
                relation = relation.name(),
                rows = entry.source,
                "provision.verify.match"
            );
        } else {
            warn!(
                relation = relation.name(),
                source_engine = source.name(),
                source_rows = entry.source,
                target_engine = target.name(),
                target_rows = entry.target,
                "provision.verify.mismatch"
            );
        }
        counts.push(entry);
    }
    Ok(ParityReport {
        source_engine: source.name().to_string(),
        target_engine: target.name().to_string(),
        counts,
    })
}

/// Runs steps A through E and returns the report whatever it found. The
/// caller applies `opts.verify` through [`ParityReport::check`] after the
/// counts have been shown and recorded.
pub fn provision(
    source: &mut dyn Engine,
    target: &mut dyn Engine,
    opts: &ProvisionOptions,
) -> Result<ParityReport> {
    info!(
        scale_factor = opts.scale_factor,
        data_dir = %opts.data_dir.display(),
        verify = ?opts.verify,
        "provision.begin"
    );
    reset_relations(source)?;
    generate_tpch(source, opts.scale_factor)?;
    let files = export_relations(source, &opts.data_dir)?;
    if opts.create_target_schema {
        target.execute(POSTGRES_SCHEMA)?;
        info!(engine = target.name(), "provision.target_schema");
    }
    replicate(source, &files, opts)?;
    let report = verify_parity(source, target)?;
    info!(consistent = report.is_consistent(), "provision.completed");
    Ok(report)
}
