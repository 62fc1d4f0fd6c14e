//! # SQL
//!
//! Typed statements the adapter sends to the server.
//!
//! Call sites build a `Statement` (or a `NearestQuery`) and sessions either
//! render it to text (PostgreSQL) or interpret it directly (the in-memory
//! engine). Identifiers are validated once, in `TableRef::new`, so rendering
//! never has to quote.

use std::fmt;

use crate::core::{AnnError, AnnResult, HnswParams, Metric};

/// Longest identifier PostgreSQL keeps without truncation
const MAX_IDENTIFIER_LEN: usize = 63;

/// Vector column name, fixed by the schema
pub const EMBEDDING_COLUMN: &str = "embedding";

fn validate_identifier(name: &str) -> AnnResult<()> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(AnnError::InvalidIdentifier(name.to_string()))
    }
}

// ============================================================================
// TABLE REFERENCE
// ============================================================================

/// A validated table name plus the index name the server derives from it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    table: String,
    index: String,
}

impl TableRef {
    pub fn new(table: &str) -> AnnResult<Self> {
        validate_identifier(table)?;
        // CREATE INDEX without a name yields <table>_<column>_idx
        let index = format!("{}_{}_idx", table, EMBEDDING_COLUMN);
        validate_identifier(&index)?;

        Ok(Self {
            table: table.to_string(),
            index,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// `COPY` statement that the bulk load streams rows into
    pub fn copy_in(&self) -> String {
        format!("COPY {} (id, {}) FROM STDIN", self.table, EMBEDDING_COLUMN)
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Session variables the adapter touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    MinParallelTableScanSize,
    MaintenanceWorkMem,
    MaxParallelMaintenanceWorkers,
    HnswEfSearch,
    WorkMem,
}

impl Setting {
    pub fn name(&self) -> &'static str {
        match self {
            Setting::MinParallelTableScanSize => "min_parallel_table_scan_size",
            Setting::MaintenanceWorkMem => "maintenance_work_mem",
            Setting::MaxParallelMaintenanceWorkers => "max_parallel_maintenance_workers",
            Setting::HnswEfSearch => "hnsw.ef_search",
            Setting::WorkMem => "work_mem",
        }
    }
}

/// Value of a `SET`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Integer(i64),
    /// Rendered as a quoted literal, e.g. `'4GB'`
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Integer(n) => write!(f, "{}", n),
            SettingValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

// ============================================================================
// STATEMENTS
// ============================================================================

/// A statement with no result rows
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable { table: TableRef, dimensions: usize },
    SetStoragePlain { table: TableRef },
    Set { setting: Setting, value: SettingValue },
    Reset { setting: Setting },
    CreateIndex { table: TableRef, metric: Metric, params: HnswParams },
    VacuumAnalyze { table: TableRef },
    Checkpoint,
    /// `pg_prewarm` on the table (`index == false`) or its index
    Prewarm { table: TableRef, index: bool },
    DropTable { table: TableRef },
}

impl Statement {
    pub fn set_integer(setting: Setting, value: i64) -> Self {
        Statement::Set {
            setting,
            value: SettingValue::Integer(value),
        }
    }

    pub fn set_text(setting: Setting, value: impl Into<String>) -> Self {
        Statement::Set {
            setting,
            value: SettingValue::Text(value.into()),
        }
    }

    pub fn sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateTable { table, dimensions } => write!(
                f,
                "CREATE TABLE IF NOT EXISTS {} (id int, {} vector({}))",
                table.table(),
                EMBEDDING_COLUMN,
                dimensions
            ),
            Statement::SetStoragePlain { table } => write!(
                f,
                "ALTER TABLE {} ALTER COLUMN {} SET STORAGE PLAIN",
                table.table(),
                EMBEDDING_COLUMN
            ),
            Statement::Set { setting, value } => match setting {
                // The planner GUCs read naturally with TO, the rest with =
                Setting::MinParallelTableScanSize => write!(f, "SET {} TO {}", setting.name(), value),
                _ => write!(f, "SET {} = {}", setting.name(), value),
            },
            Statement::Reset { setting } => write!(f, "RESET {}", setting.name()),
            Statement::CreateIndex { table, metric, params } => write!(
                f,
                "CREATE INDEX ON {} USING hnsw ({} {}) WITH (m = {}, ef_construction = {})",
                table.table(),
                EMBEDDING_COLUMN,
                metric.operator_class(),
                params.m,
                params.ef_construction
            ),
            Statement::VacuumAnalyze { table } => write!(f, "VACUUM ANALYZE {}", table.table()),
            Statement::Checkpoint => write!(f, "CHECKPOINT"),
            Statement::Prewarm { table, index } => {
                let relation = if *index { table.index() } else { table.table() };
                write!(f, "SELECT pg_prewarm('{}')", relation)
            }
            Statement::DropTable { table } => write!(f, "DROP TABLE {}", table.table()),
        }
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// The metric-specific k-NN query, selected once at construction
///
/// Parameters: `$1` the query vector, `$2` the row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearestQuery {
    table: TableRef,
    metric: Metric,
    sql: String,
}

impl NearestQuery {
    pub fn new(table: TableRef, metric: Metric) -> Self {
        let sql = format!(
            "SELECT id FROM {} ORDER BY {} {} $1 LIMIT $2",
            table.table(),
            EMBEDDING_COLUMN,
            metric.operator()
        );
        Self { table, metric, sql }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// On-disk size of a relation, in bytes
pub fn relation_size_sql(relation: &str) -> String {
    format!("SELECT pg_relation_size('{}')", relation)
}
