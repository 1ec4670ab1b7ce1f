//! TPC-H relations and the column layout the insert workload replays.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// The eight TPC-H relations, in the order they are provisioned.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// `customer`
    Customer,
    /// `lineitem`
    Lineitem,
    /// `nation`
    Nation,
    /// `orders`
    Orders,
    /// `part`
    Part,
    /// `partsupp`
    Partsupp,
    /// `region`
    Region,
    /// `supplier`
    Supplier,
}

impl Relation {
    /// Every relation `dbgen` produces.
    pub const ALL: [Relation; 8] = [
        Relation::Customer,
        Relation::Lineitem,
        Relation::Nation,
        Relation::Orders,
        Relation::Part,
        Relation::Partsupp,
        Relation::Region,
        Relation::Supplier,
    ];

    /// Table name in both engines.
    pub fn name(self) -> &'static str {
        match self {
            Relation::Customer => "customer",
            Relation::Lineitem => "lineitem",
            Relation::Nation => "nation",
            Relation::Orders => "orders",
            Relation::Part => "part",
            Relation::Partsupp => "partsupp",
            Relation::Region => "region",
            Relation::Supplier => "supplier",
        }
    }

    /// Interchange file for this relation under `data_dir`.
    pub fn parquet_path(self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.parquet", self.name()))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a column's value is written into an insert statement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnKind {
    /// Whole number, written bare.
    Integer,
    /// Fixed-point number, written bare.
    Decimal,
    /// String, written single-quoted.
    Text,
    /// Calendar date, written single-quoted.
    Date,
}

impl ColumnKind {
    /// SQL type name understood by both engines.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer => "BIGINT",
            ColumnKind::Decimal => "DECIMAL(15,2)",
            ColumnKind::Text => "VARCHAR",
            ColumnKind::Date => "DATE",
        }
    }

    /// Whether literal rendering wraps the value in single quotes.
    pub fn is_quoted(self) -> bool {
        matches!(self, ColumnKind::Text | ColumnKind::Date)
    }
}

/// A named, typed column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Value kind.
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

/// `lineitem` columns in table order.
pub const LINEITEM_COLUMNS: [Column; 16] = [
    col("l_orderkey", ColumnKind::Integer),
    col("l_partkey", ColumnKind::Integer),
    col("l_suppkey", ColumnKind::Integer),
    col("l_linenumber", ColumnKind::Integer),
    col("l_quantity", ColumnKind::Decimal),
    col("l_extendedprice", ColumnKind::Decimal),
    col("l_discount", ColumnKind::Decimal),
    col("l_tax", ColumnKind::Decimal),
    col("l_returnflag", ColumnKind::Text),
    col("l_linestatus", ColumnKind::Text),
    col("l_shipdate", ColumnKind::Date),
    col("l_commitdate", ColumnKind::Date),
    col("l_receiptdate", ColumnKind::Date),
    col("l_shipinstruct", ColumnKind::Text),
    col("l_shipmode", ColumnKind::Text),
    col("l_comment", ColumnKind::Text),
];

/// TPC-H DDL applied to Postgres before replication when the tables are
/// missing. `IF NOT EXISTS` keeps it safe to re-run.
pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS region (
    r_regionkey  INTEGER NOT NULL,
    r_name       CHAR(25) NOT NULL,
    r_comment    VARCHAR(152)
);
CREATE TABLE IF NOT EXISTS nation (
    n_nationkey  INTEGER NOT NULL,
    n_name       CHAR(25) NOT NULL,
    n_regionkey  INTEGER NOT NULL,
    n_comment    VARCHAR(152)
);
CREATE TABLE IF NOT EXISTS part (
    p_partkey     BIGINT NOT NULL,
    p_name        VARCHAR(55) NOT NULL,
    p_mfgr        CHAR(25) NOT NULL,
    p_brand       CHAR(10) NOT NULL,
    p_type        VARCHAR(25) NOT NULL,
    p_size        INTEGER NOT NULL,
    p_container   CHAR(10) NOT NULL,
    p_retailprice DECIMAL(15,2) NOT NULL,
    p_comment     VARCHAR(23) NOT NULL
);
CREATE TABLE IF NOT EXISTS supplier (
    s_suppkey    BIGINT NOT NULL,
    s_name       CHAR(25) NOT NULL,
    s_address    VARCHAR(40) NOT NULL,
    s_nationkey  INTEGER NOT NULL,
    s_phone      CHAR(15) NOT NULL,
    s_acctbal    DECIMAL(15,2) NOT NULL,
    s_comment    VARCHAR(101) NOT NULL
);
CREATE TABLE IF NOT EXISTS partsupp (
    ps_partkey    BIGINT NOT NULL,
    ps_suppkey    BIGINT NOT NULL,
    ps_availqty   BIGINT NOT NULL,
    ps_supplycost DECIMAL(15,2) NOT NULL,
    ps_comment    VARCHAR(199) NOT NULL
);
CREATE TABLE IF NOT EXISTS customer (
    c_custkey    BIGINT NOT NULL,
    c_name       VARCHAR(25) NOT NULL,
    c_address    VARCHAR(40) NOT NULL,
    c_nationkey  INTEGER NOT NULL,
    c_phone      CHAR(15) NOT NULL,
    c_acctbal    DECIMAL(15,2) NOT NULL,
    c_mktsegment CHAR(10) NOT NULL,
    c_comment    VARCHAR(117) NOT NULL
);
CREATE TABLE IF NOT EXISTS orders (
    o_orderkey      BIGINT NOT NULL,
    o_custkey       BIGINT NOT NULL,
    o_orderstatus   CHAR(1) NOT NULL,
    o_totalprice    DECIMAL(15,2) NOT NULL,
    o_orderdate     DATE NOT NULL,
    o_orderpriority CHAR(15) NOT NULL,
    o_clerk         CHAR(15) NOT NULL,
    o_shippriority  INTEGER NOT NULL,
    o_comment       VARCHAR(79) NOT NULL
);
CREATE TABLE IF NOT EXISTS lineitem (
    l_orderkey      BIGINT NOT NULL,
    l_partkey       BIGINT NOT NULL,
    l_suppkey       BIGINT NOT NULL,
    l_linenumber    BIGINT NOT NULL,
    l_quantity      DECIMAL(15,2) NOT NULL,
    l_extendedprice DECIMAL(15,2) NOT NULL,
    l_discount      DECIMAL(15,2) NOT NULL,
    l_tax           DECIMAL(15,2) NOT NULL,
    l_returnflag    CHAR(1) NOT NULL,
    l_linestatus    CHAR(1) NOT NULL,
    l_shipdate      DATE NOT NULL,
    l_commitdate    DATE NOT NULL,
    l_receiptdate   DATE NOT NULL,
    l_shipinstruct  CHAR(25) NOT NULL,
    l_shipmode      CHAR(10) NOT NULL,
    l_comment       VARCHAR(44) NOT NULL
);
"#;
