//! Command-line entry point for the DuckDB/Postgres TPC-H comparison.
#![forbid(unsafe_code)]

#[path = "tpch_compare/ui.rs"]
mod ui;

use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tpch_compare::config::{default_config_path, ConfigError, CONFIG_ENV};
use tpch_compare::dataset::{Relation, LINEITEM_COLUMNS};
use tpch_compare::env::EnvMetadata;
use tpch_compare::inserts::{self, InsertComparison, InsertMode, InsertPlan, RowSource};
use tpch_compare::provision::{self, ParityReport, ProvisionOptions, VerifyPolicy};
use tpch_compare::queries::{self, ExecutionOrder, QuerySet};
use tpch_compare::report::{self, RunSummary};
use tpch_compare::timing::AlignedSeries;
use tpch_compare::{BenchError, DuckEngine, HarnessConfig, PgEngine, Result};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "tpch-compare",
    version,
    about = "Times TPC-H queries and single-row inserts on DuckDB and Postgres",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = CONFIG_ENV,
        value_name = "FILE",
        help = "Configuration file (defaults to the per-user config path)"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Plain output without spinners")]
    quiet: bool,

    #[arg(long, global = true, value_enum, default_value_t = Theme::Auto)]
    theme: Theme,

    #[arg(short, long, global = true, help = "Log at debug level unless RUST_LOG is set")]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Flags that take precedence over the configuration file.
#[derive(Args, Debug, Default)]
struct Overrides {
    #[arg(long, global = true, value_name = "PATH", help = "DuckDB database file or :memory:")]
    duckdb_path: Option<PathBuf>,

    #[arg(long, global = true, value_name = "HOST")]
    pg_host: Option<String>,

    #[arg(long, global = true, value_name = "PORT")]
    pg_port: Option<u16>,

    #[arg(long, global = true, value_name = "USER")]
    pg_user: Option<String>,

    #[arg(
        long,
        global = true,
        env = "TPCH_PG_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pg_password: Option<String>,

    #[arg(long, global = true, value_name = "NAME")]
    pg_dbname: Option<String>,

    #[arg(long, global = true, value_name = "SF")]
    scale_factor: Option<f64>,

    #[arg(long, global = true, value_name = "DIR", help = "Parquet interchange directory")]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true, value_enum, help = "Whether row-count mismatches abort the run")]
    verify: Option<VerifyPolicy>,

    #[arg(long, global = true, value_name = "DIR", help = "Directory holding q<n>.sql files")]
    query_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "K")]
    query_count: Option<u32>,

    #[arg(long, global = true, value_enum)]
    order: Option<ExecutionOrder>,

    #[arg(long, global = true, value_name = "N", help = "Replay count; N+1 rows are inserted")]
    insert_count: Option<u64>,

    #[arg(long, global = true, value_enum)]
    insert_mode: Option<InsertMode>,

    #[arg(long, global = true, value_name = "DIR")]
    chart_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "DIR")]
    results_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, cfg: &mut HarnessConfig) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        set(&mut cfg.duckdb.path, self.duckdb_path);
        set(&mut cfg.postgres.host, self.pg_host);
        set(&mut cfg.postgres.port, self.pg_port);
        set(&mut cfg.postgres.user, self.pg_user);
        set(&mut cfg.postgres.password, self.pg_password);
        set(&mut cfg.postgres.dbname, self.pg_dbname);
        set(&mut cfg.dataset.scale_factor, self.scale_factor);
        set(&mut cfg.dataset.data_dir, self.data_dir);
        set(&mut cfg.dataset.verify, self.verify);
        set(&mut cfg.queries.dir, self.query_dir);
        set(&mut cfg.queries.count, self.query_count);
        set(&mut cfg.queries.order, self.order);
        set(&mut cfg.inserts.count, self.insert_count);
        set(&mut cfg.inserts.mode, self.insert_mode);
        set(&mut cfg.report.chart_dir, self.chart_dir);
        set(&mut cfg.report.results_dir, self.results_dir);
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision, time queries and inserts, then render charts.
    Run {
        #[arg(long, help = "Reuse data already loaded by a previous run")]
        skip_provision: bool,
    },
    /// Generate TPC-H in DuckDB, replicate it into Postgres and compare row counts.
    Provision,
    /// Time the query files against both engines.
    Queries,
    /// Time single-row inserts into the scratch table of both engines.
    Inserts,
    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration with the password redacted.
    Show,
    /// Write a default configuration file.
    Init {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
    /// Print the configuration file location.
    Path,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let ui = Ui::new(cli.theme, cli.quiet);
    let (mut cfg, cfg_path) = HarnessConfig::load(cli.config)?;
    debug!(path = ?cfg_path, "config.loaded");
    cli.overrides.apply(&mut cfg);

    let phases = match cli.command {
        Command::Config { action } => return config_command(action, &cfg, cfg_path, &ui),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tpch-compare", &mut io::stdout());
            return Ok(());
        }
        Command::Run { skip_provision } => Phases {
            provision: !skip_provision,
            queries: true,
            inserts: true,
        },
        Command::Provision => Phases {
            provision: true,
            ..Phases::NONE
        },
        Command::Queries => Phases {
            queries: true,
            ..Phases::NONE
        },
        Command::Inserts => Phases {
            inserts: true,
            ..Phases::NONE
        },
    };
    cfg.validate()?;
    execute(&cfg, phases, &ui)
}

#[derive(Clone, Copy, Debug)]
struct Phases {
    provision: bool,
    queries: bool,
    inserts: bool,
}

impl Phases {
    const NONE: Phases = Phases {
        provision: false,
        queries: false,
        inserts: false,
    };
}

/// Phase outputs kept for rendering and export.
#[derive(Default)]
struct Outcome {
    parity: Option<ParityReport>,
    queries: Option<AlignedSeries>,
    inserts: Option<InsertComparison>,
}

fn execute(cfg: &HarnessConfig, phases: Phases, ui: &Ui) -> Result<()> {
    let query_set = QuerySet::new(&cfg.queries.dir, cfg.queries.count);
    if phases.queries {
        query_set.check_present()?;
    }

    let task = ui.task(format!("Opening DuckDB at {}", cfg.duckdb.path.display()));
    let mut duck = DuckEngine::open(&cfg.duckdb.path)?;
    task.finish();
    let task = ui.task(format!("Connecting to Postgres ({})", cfg.postgres.host));
    let mut pg = PgEngine::connect(&cfg.postgres)?;
    task.finish();

    let mut outcome = Outcome::default();
    if phases.provision {
        let opts = ProvisionOptions::from_config(cfg);
        let task = ui.task(format!(
            "Provisioning TPC-H sf={} into both engines",
            opts.scale_factor
        ));
        let report = provision::provision(&mut duck, &mut pg, &opts)?;
        task.finish();
        ui.parity(&report);
        let verdict = report.check(opts.verify);
        outcome.parity = Some(report);
        if let Err(err) = verdict {
            finish(cfg, outcome, ui)?;
            return Err(err);
        }
    }

    if phases.queries {
        let task = ui.task(format!(
            "Running {} queries ({:?})",
            query_set.len(),
            cfg.queries.order
        ));
        let series = queries::run_queries(&query_set, cfg.queries.order, &mut duck, &mut pg)?;
        task.finish();
        ui.query_table(&series);
        outcome.queries = Some(series);
    }

    if phases.inserts {
        outcome.inserts = Some(insert_phase(cfg, &mut duck, &mut pg, ui)?);
    }

    finish(cfg, outcome, ui)
}

fn insert_phase(
    cfg: &HarnessConfig,
    duck: &mut DuckEngine,
    pg: &mut PgEngine,
    ui: &Ui,
) -> Result<InsertComparison> {
    let source = Relation::Lineitem.parquet_path(&cfg.dataset.data_dir);
    let rows = inserts::load_rows(
        duck,
        RowSource::Parquet(&source),
        &LINEITEM_COLUMNS,
        cfg.inserts.count,
    )?;
    let plan = InsertPlan::new(
        &cfg.inserts.scratch_table,
        Relation::Lineitem,
        &LINEITEM_COLUMNS,
        rows,
        cfg.inserts.mode,
        cfg.inserts.count,
    );
    let task = ui.task(format!(
        "Replaying {} inserts into {} ({:?})",
        plan.statement_count(),
        plan.table(),
        cfg.inserts.mode
    ));
    let comparison = inserts::run_inserts(&plan, duck, pg)?;
    task.finish();
    ui.insert_summary(&comparison);
    Ok(comparison)
}

fn finish(cfg: &HarnessConfig, outcome: Outcome, ui: &Ui) -> Result<()> {
    let mut written = report::render_charts(
        &cfg.report,
        outcome.queries.as_ref(),
        outcome.inserts.as_ref(),
    )?;
    let env = EnvMetadata::collect(&cfg.dataset.data_dir, &cfg.report.results_dir);
    let mut summary = RunSummary::new(cfg, env);
    summary.parity = outcome.parity.as_ref();
    summary.queries = outcome.queries.as_ref();
    summary.inserts = outcome.inserts.as_ref();
    written.extend(report::export_results(&cfg.report.results_dir, &summary)?);
    info!(files = written.len(), "run.completed");
    ui.list(
        "Artifacts",
        written.iter().map(|path| path.display().to_string()),
    );
    Ok(())
}

fn config_command(
    action: ConfigCommand,
    cfg: &HarnessConfig,
    path: Option<PathBuf>,
    ui: &Ui,
) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            let mut shown = cfg.clone();
            shown.postgres = shown.postgres.redacted();
            let text = toml::to_string_pretty(&shown)
                .map_err(|source| BenchError::from(ConfigError::Serialize { source }))?;
            print!("{text}");
        }
        ConfigCommand::Init { force } => {
            let path = path
                .or_else(default_config_path)
                .ok_or(ConfigError::NoConfigPath)?;
            if path.exists() && !force {
                return Err(ConfigError::Invalid(format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                ))
                .into());
            }
            HarnessConfig::default().persist(&path)?;
            ui.success(&format!("Wrote default configuration to {}", path.display()));
        }
        ConfigCommand::Path => {
            let path = path.ok_or(ConfigError::NoConfigPath)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
