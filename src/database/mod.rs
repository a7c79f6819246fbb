use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{EarningsBatch, PeriodParseError, ReportPeriod, PERIOD_COLUMN, STOCK_CODE_COLUMN};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("cannot create table without key column '{0}'")]
    MissingKeyColumn(&'static str),

    #[error("cannot create table with no columns")]
    EmptyColumns,

    #[error("schema drift in table '{table}': unexpected columns {unexpected:?}, missing columns {missing:?}")]
    SchemaDrift {
        table: String,
        unexpected: Vec<String>,
        missing: Vec<String>,
    },

    #[error("stored period is malformed: {0}")]
    CorruptPeriod(#[from] PeriodParseError),
}

/// Outcome of one duplicate-ignoring insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub inserted: usize,
    pub ignored: usize,
}

/// Access to the earnings table in a single SQLite file.
///
/// Every operation opens its own connection; nothing is held between calls.
#[derive(Debug, Clone)]
pub struct EarningsStore {
    path: PathBuf,
    table: String,
}

impl EarningsStore {
    pub fn new(database_path: impl AsRef<Path>, table_name: &str) -> Result<Self, StoreError> {
        if table_name.trim().is_empty() || table_name.contains('\0') {
            return Err(StoreError::InvalidTableName(table_name.to_string()));
        }

        Ok(Self {
            path: database_path.as_ref().to_path_buf(),
            table: table_name.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&self.path)?)
    }

    pub fn table_exists(&self) -> Result<bool, StoreError> {
        let conn = self.open()?;
        table_exists(&conn, &self.table)
    }

    /// Create the table from `columns` unless it already exists.
    ///
    /// Every column is TEXT; the primary key is (period, stock code).
    /// Returns `true` when the table was created by this call.
    pub fn ensure_table(&self, columns: &[String]) -> Result<bool, StoreError> {
        let conn = self.open()?;
        if table_exists(&conn, &self.table)? {
            return Ok(false);
        }

        if columns.is_empty() {
            return Err(StoreError::EmptyColumns);
        }
        for key in [PERIOD_COLUMN, STOCK_CODE_COLUMN] {
            if !columns.iter().any(|c| c == key) {
                return Err(StoreError::MissingKeyColumn(key));
            }
        }

        let column_defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect();
        let sql = format!(
            "CREATE TABLE {} (\n    {},\n    PRIMARY KEY ({}, {})\n)",
            quote_ident(&self.table),
            column_defs.join(",\n    "),
            quote_ident(PERIOD_COLUMN),
            quote_ident(STOCK_CODE_COLUMN),
        );
        conn.execute(&sql, [])?;

        info!("💾 Created table {} with {} columns", self.table, columns.len());
        Ok(true)
    }

    /// Column names of the table in declaration order
    pub fn table_columns(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.open()?;
        table_columns(&conn, &self.table)
    }

    /// Insert every row of `batch`, silently skipping rows whose primary key
    /// is already stored. Runs in one transaction.
    pub fn upsert(&self, batch: &EarningsBatch) -> Result<UpsertReport, StoreError> {
        let mut conn = self.open()?;
        self.check_columns(&conn, batch.columns())?;

        if batch.is_empty() {
            return Ok(UpsertReport::default());
        }

        let column_list: Vec<String> = batch.columns().iter().map(|c| quote_ident(c)).collect();
        let placeholders = vec!["?"; column_list.len()].join(", ");
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            column_list.join(", "),
            placeholders
        );

        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in batch.rows() {
                inserted += stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        let report = UpsertReport {
            inserted,
            ignored: batch.len() - inserted,
        };
        debug!(
            "Upserted into {}: {} inserted, {} ignored",
            self.table, report.inserted, report.ignored
        );
        Ok(report)
    }

    /// Newest stored period, `None` if the table is missing or empty
    pub fn last_period(&self) -> Result<Option<ReportPeriod>, StoreError> {
        let conn = self.open()?;
        if !table_exists(&conn, &self.table)? {
            return Ok(None);
        }

        let sql = format!(
            "SELECT MAX({}) FROM {}",
            quote_ident(PERIOD_COLUMN),
            quote_ident(&self.table)
        );
        let max: Option<String> = conn.query_row(&sql, [], |row| row.get(0))?;

        match max {
            Some(value) => Ok(Some(value.parse()?)),
            None => Ok(None),
        }
    }

    /// Total rows, 0 if the table does not exist yet
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let conn = self.open()?;
        if !table_exists(&conn, &self.table)? {
            return Ok(0);
        }

        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn period_row_count(&self, period: ReportPeriod) -> Result<usize, StoreError> {
        let conn = self.open()?;
        if !table_exists(&conn, &self.table)? {
            return Ok(0);
        }

        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            quote_ident(&self.table),
            quote_ident(PERIOD_COLUMN)
        );
        let count: i64 = conn.query_row(&sql, params![period.id()], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn check_columns(&self, conn: &Connection, columns: &[String]) -> Result<(), StoreError> {
        let stored: BTreeSet<String> = table_columns(conn, &self.table)?.into_iter().collect();
        let incoming: BTreeSet<String> = columns.iter().cloned().collect();

        if stored == incoming {
            return Ok(());
        }

        Err(StoreError::SchemaDrift {
            table: self.table.clone(),
            unexpected: incoming.difference(&stored).cloned().collect(),
            missing: stored.difference(&incoming).cloned().collect(),
        })
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

/// Double-quote an SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
