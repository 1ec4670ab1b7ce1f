#![allow(missing_docs)]

//! Drives every phase against two in-memory DuckDB engines standing in for
//! the DuckDB/Postgres pair.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tpch_compare::dataset::{Relation, LINEITEM_COLUMNS, POSTGRES_SCHEMA};
use tpch_compare::error::exit_code;
use tpch_compare::inserts::{self, InsertMode, InsertPlan, RowSource};
use tpch_compare::provision::{self, VerifyPolicy};
use tpch_compare::queries::{run_queries, ExecutionOrder, QuerySet};
use tpch_compare::report::{self, RunSummary, INSERT_CHART, QUERY_CHART};
use tpch_compare::config::HarnessConfig;
use tpch_compare::env::EnvMetadata;
use tpch_compare::{BenchError, DuckEngine, Engine};

const LINEITEM_ROWS: u64 = 12;

fn engine(name: &str) -> DuckEngine {
    let mut engine = DuckEngine::open_in_memory()
        .expect("open duckdb")
        .with_name(name);
    engine.execute(POSTGRES_SCHEMA).expect("schema");
    engine
}

fn seed(engine: &mut DuckEngine, comment: &str) {
    let sql = format!(
        "INSERT INTO lineitem SELECT
            i, i * 10, i % 3, 1, 17.00, 21168.23, 0.04, 0.02, 'N', 'O',
            DATE '1996-03-13', DATE '1996-02-12', DATE '1996-03-22',
            'DELIVER IN PERSON', 'TRUCK', '{comment}'
         FROM range(1, {}) t(i);
         INSERT INTO region VALUES (0, 'AFRICA', 'x'), (1, 'AMERICA', 'y');
         INSERT INTO orders SELECT i, i, 'O', 100.00, DATE '1996-01-02', '5-LOW', 'Clerk#1', 0, 'c'
         FROM range(1, 6) t(i);",
        LINEITEM_ROWS + 1
    );
    engine.execute(&sql).expect("seed");
}

fn pair() -> (DuckEngine, DuckEngine) {
    let mut left = engine("duck-left");
    let mut right = engine("duck-right");
    seed(&mut left, "carefully final");
    seed(&mut right, "carefully final");
    (left, right)
}

fn write_queries(dir: &Path) {
    fs::create_dir_all(dir).expect("query dir");
    fs::write(dir.join("q1.sql"), "SELECT l_returnflag, SUM(l_quantity) FROM lineitem GROUP BY 1;")
        .expect("q1");
    fs::write(
        dir.join("q2.sql"),
        "SELECT o_orderkey, COUNT(*) FROM orders JOIN lineitem ON l_orderkey = o_orderkey GROUP BY 1;",
    )
    .expect("q2");
    fs::write(dir.join("q3.sql"), "SELECT r_name FROM region ORDER BY r_name;").expect("q3");
}

#[test]
fn query_series_align_across_engines() {
    let dir = TempDir::new().expect("tempdir");
    write_queries(dir.path());
    let (mut left, mut right) = pair();
    let set = QuerySet::new(dir.path(), 3);

    for order in [ExecutionOrder::TwoPass, ExecutionOrder::Interleaved] {
        let series = run_queries(&set, order, &mut left, &mut right).expect("queries");
        assert_eq!(series.labels(), ["q1", "q2", "q3"]);
        assert_eq!(series.left().engine, "duck-left");
        assert_eq!(series.right().engine, "duck-right");
        assert_eq!(series.left().len(), 3);
        assert_eq!(series.right().len(), 3);
    }
}

#[test]
fn broken_query_stops_the_run() {
    let dir = TempDir::new().expect("tempdir");
    write_queries(dir.path());
    fs::write(dir.path().join("q2.sql"), "SELECT * FROM no_such_table;").expect("q2");
    let (mut left, mut right) = pair();
    let err = run_queries(&QuerySet::new(dir.path(), 3), ExecutionOrder::TwoPass, &mut left, &mut right)
        .unwrap_err();
    assert_eq!(err.exit_code(), exit_code::STATEMENT);
}

fn insert_plan(source: &mut DuckEngine, n: u64, mode: InsertMode) -> InsertPlan {
    let rows = inserts::load_rows(source, RowSource::Table("lineitem"), &LINEITEM_COLUMNS, n)
        .expect("load rows");
    InsertPlan::new("lineitem_copy", Relation::Lineitem, &LINEITEM_COLUMNS, rows, mode, n)
}

#[test]
fn bound_inserts_replay_n_plus_one_rows() {
    let (mut left, mut right) = pair();
    let plan = insert_plan(&mut left, 4, InsertMode::Bound);
    assert_eq!(plan.statement_count(), 5);

    let comparison = inserts::run_inserts(&plan, &mut left, &mut right).expect("inserts");
    assert_eq!(comparison.requested, 4);
    for timing in comparison.timings() {
        assert_eq!(timing.statements, 5);
    }
    assert_eq!(left.count_rows("lineitem_copy").expect("count"), 5);
    assert_eq!(right.count_rows("lineitem_copy").expect("count"), 5);
}

#[test]
fn insert_count_is_capped_by_available_rows() {
    let (mut left, mut right) = pair();
    let plan = insert_plan(&mut left, 100, InsertMode::Literal);
    assert_eq!(plan.statement_count(), LINEITEM_ROWS);
    let comparison = inserts::run_inserts(&plan, &mut left, &mut right).expect("inserts");
    assert_eq!(comparison.right.statements, LINEITEM_ROWS);
}

#[test]
fn rerunning_inserts_starts_from_an_empty_scratch_table() {
    let (mut left, mut right) = pair();
    let plan = insert_plan(&mut left, 2, InsertMode::Bound);
    inserts::run_inserts(&plan, &mut left, &mut right).expect("first run");
    inserts::run_inserts(&plan, &mut left, &mut right).expect("second run");
    assert_eq!(left.count_rows("lineitem_copy").expect("count"), 3);
}

#[test]
fn quotes_break_literal_inserts_but_not_bound_ones() {
    let mut left = engine("duck-left");
    let mut right = engine("duck-right");
    seed(&mut left, "don''t delay");
    seed(&mut right, "");

    let bound = insert_plan(&mut left, 1, InsertMode::Bound);
    inserts::run_inserts(&bound, &mut left, &mut right).expect("bound inserts");

    let literal = insert_plan(&mut left, 1, InsertMode::Literal);
    let err = inserts::run_inserts(&literal, &mut left, &mut right).unwrap_err();
    assert!(matches!(err, BenchError::Statement { ref engine, .. } if engine == "duck-left"));
}

#[test]
fn exported_parquet_feeds_the_insert_loader() {
    let dir = TempDir::new().expect("tempdir");
    let data_dir = dir.path().join("data");
    let (mut left, _) = pair();

    let files = provision::export_relations(&mut left, &data_dir).expect("export");
    assert_eq!(files.len(), Relation::ALL.len());
    for (relation, path) in &files {
        assert_eq!(*path, relation.parquet_path(&data_dir));
        assert!(fs::metadata(path).expect("parquet").len() > 0);
    }

    let parquet = Relation::Lineitem.parquet_path(&data_dir);
    let rows = inserts::load_rows(&mut left, RowSource::Parquet(&parquet), &LINEITEM_COLUMNS, 2)
        .expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0].as_deref(), Some("1"));
    assert_eq!(rows[0][10].as_deref(), Some("1996-03-13"));
}

#[test]
fn parity_mismatch_is_reported_under_both_policies() {
    let (mut left, mut right) = pair();
    right.execute("DELETE FROM orders WHERE o_orderkey > 2").expect("drop rows");

    let report = provision::verify_parity(&mut left, &mut right).expect("parity");
    let mismatched: Vec<_> = report.mismatches().map(|c| (c.relation, c.source, c.target)).collect();
    assert_eq!(mismatched, [(Relation::Orders, 5, 2)]);

    report.check(VerifyPolicy::Advisory).expect("advisory passes");
    let err = report.check(VerifyPolicy::Enforce).unwrap_err();
    assert_eq!(err.exit_code(), exit_code::PARITY);
    assert!(err.to_string().contains("orders"));
}

#[test]
fn enforced_parity_failure_still_exports_the_counts() {
    let dir = TempDir::new().expect("tempdir");
    let (mut left, mut right) = pair();
    right.execute("DELETE FROM region WHERE r_regionkey = 1").expect("drop row");

    let parity = provision::verify_parity(&mut left, &mut right).expect("parity");
    assert!(parity.check(VerifyPolicy::Enforce).is_err());

    let cfg = HarnessConfig::default();
    let mut summary = RunSummary::new(&cfg, EnvMetadata::collect(dir.path(), dir.path()));
    summary.parity = Some(&parity);
    let written = report::export_results(dir.path(), &summary).expect("export");
    assert_eq!(written.len(), 1);
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written[0]).expect("json")).expect("parse");
    let region = json["parity"]["counts"]
        .as_array()
        .expect("counts")
        .iter()
        .find(|c| c["relation"] == "region")
        .expect("region entry")
        .clone();
    assert_eq!(region["source"], 2);
    assert_eq!(region["target"], 1);
}

#[test]
fn consistent_engines_pass_enforced_parity() {
    let (mut left, mut right) = pair();
    let report = provision::verify_parity(&mut left, &mut right).expect("parity");
    assert!(report.is_consistent());
    assert_eq!(report.counts.len(), 8);
    report.check(VerifyPolicy::Enforce).expect("consistent");
}

#[test]
fn full_cycle_renders_charts_and_summary() {
    let dir = TempDir::new().expect("tempdir");
    let query_dir = dir.path().join("sql");
    write_queries(&query_dir);
    let (mut left, mut right) = pair();

    let parity = provision::verify_parity(&mut left, &mut right).expect("parity");
    let series = run_queries(&QuerySet::new(&query_dir, 3), ExecutionOrder::TwoPass, &mut left, &mut right)
        .expect("queries");
    let plan = insert_plan(&mut left, 3, InsertMode::Bound);
    let comparison = inserts::run_inserts(&plan, &mut left, &mut right).expect("inserts");

    let mut cfg = HarnessConfig::default();
    cfg.report.chart_dir = dir.path().join("img");
    cfg.report.results_dir = dir.path().join("results");
    let charts = report::render_charts(&cfg.report, Some(&series), Some(&comparison)).expect("charts");
    assert_eq!(charts, [cfg.report.chart_dir.join(QUERY_CHART), cfg.report.chart_dir.join(INSERT_CHART)]);
    for chart in &charts {
        assert!(fs::read_to_string(chart).expect("svg").contains("<svg"));
    }

    let mut summary = RunSummary::new(&cfg, EnvMetadata::collect(dir.path(), dir.path()));
    summary.parity = Some(&parity);
    summary.queries = Some(&series);
    summary.inserts = Some(&comparison);
    let written = report::export_results(&cfg.report.results_dir, &summary).expect("export");
    assert_eq!(written.len(), 2);
    let csv = fs::read_to_string(&written[1]).expect("csv");
    assert_eq!(csv.lines().count(), 1 + 2 * 3);
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written[0]).expect("json")).expect("parse");
    assert_eq!(json["inserts"]["left"]["statements"], 4);
}

#[test]
#[ignore = "downloads the DuckDB tpch extension"]
fn generated_dataset_survives_parquet_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let mut source = DuckEngine::open_in_memory().expect("source");
    let mut target = DuckEngine::open_in_memory().expect("target").with_name("copy");

    for _ in 0..2 {
        provision::reset_relations(&mut source).expect("reset");
        provision::generate_tpch(&mut source, 0.01).expect("dbgen");
        let files = provision::export_relations(&mut source, dir.path()).expect("export");
        for (relation, path) in &files {
            target
                .execute(&format!(
                    "CREATE OR REPLACE TABLE {relation} AS SELECT * FROM read_parquet('{}');",
                    path.display()
                ))
                .expect("load copy");
        }
        let report = provision::verify_parity(&mut source, &mut target).expect("parity");
        assert!(report.is_consistent());
        assert!(report.counts.iter().all(|c| c.source > 0));
    }
}
