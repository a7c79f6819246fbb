use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// First year the enumerator and the epoch default start from.
pub const START_YEAR: i32 = 2010;

/// Last year whose quarter-end dates still render as 8 digits.
pub const MAX_YEAR: i32 = 9999;

/// Column appended to every fetched row, part of the primary key.
pub const PERIOD_COLUMN: &str = "report_date";

/// Provider column identifying the company, the other half of the primary key.
pub const STOCK_CODE_COLUMN: &str = "stock_code";

/// Earliest period the system will ever consider.
pub const EPOCH_PERIOD: ReportPeriod = ReportPeriod {
    year: START_YEAR,
    quarter: Quarter::Q1,
};

/// Fiscal quarter, ordered chronologically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    /// Month and day of the quarter-end date
    pub fn month_day(self) -> (u32, u32) {
        match self {
            Quarter::Q1 => (3, 31),
            Quarter::Q2 => (6, 30),
            Quarter::Q3 => (9, 30),
            Quarter::Q4 => (12, 31),
        }
    }

    fn from_month_day(month: u32, day: u32) -> Option<Self> {
        Quarter::ALL
            .into_iter()
            .find(|q| q.month_day() == (month, day))
    }
}

/// A quarterly report period, rendered as the `YYYYMMDD` quarter-end date.
///
/// Ordering on `(year, quarter)` matches the lexicographic ordering of the
/// rendered identifiers, which is what the store relies on for `MAX()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportPeriod {
    year: i32,
    quarter: Quarter,
}

impl ReportPeriod {
    pub fn new(year: i32, quarter: Quarter) -> Self {
        Self { year, quarter }
    }

    /// The `YYYYMMDD` identifier used as storage key and file suffix
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// Quarter-end calendar date
    pub fn end_date(&self) -> Option<NaiveDate> {
        let (month, day) = self.quarter.month_day();
        NaiveDate::from_ymd_opt(self.year, month, day)
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (month, day) = self.quarter.month_day();
        write!(f, "{:04}{:02}{:02}", self.year, month, day)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodParseError {
    #[error("period '{0}' must be 8 digits (YYYYMMDD)")]
    Format(String),
    #[error("period '{0}' is not a quarter-end date")]
    NotQuarterEnd(String),
}

impl FromStr for ReportPeriod {
    type Err = PeriodParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PeriodParseError::Format(value.to_string()));
        }

        let parse = |range: std::ops::Range<usize>| -> Result<u32, PeriodParseError> {
            value[range]
                .parse()
                .map_err(|_| PeriodParseError::Format(value.to_string()))
        };
        let year = parse(0..4)? as i32;
        let month = parse(4..6)?;
        let day = parse(6..8)?;

        let quarter = Quarter::from_month_day(month, day)
            .ok_or_else(|| PeriodParseError::NotQuarterEnd(value.to_string()))?;

        Ok(Self { year, quarter })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("record columns {found:?} do not match batch columns {expected:?}")]
    Drift {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// One provider row: an ordered mapping of column name to text value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EarningsRecord {
    fields: Vec<(String, Option<String>)>,
}

impl EarningsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing the value if the column is already present
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, Some(value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn into_values(self) -> Vec<Option<String>> {
        self.fields.into_iter().map(|(_, value)| value).collect()
    }
}

/// Rows for a single period sharing one column list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EarningsBatch {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl EarningsBatch {
    /// Empty batch with a known column shape
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a batch whose column list is taken from the first record
    pub fn from_records(records: Vec<EarningsRecord>) -> Result<Self, SchemaError> {
        let mut batch = Self::default();
        for record in records {
            batch.push(record)?;
        }
        Ok(batch)
    }

    pub fn push(&mut self, record: EarningsRecord) -> Result<(), SchemaError> {
        if self.columns.is_empty() && self.rows.is_empty() {
            self.columns = record.columns().map(str::to_string).collect();
        } else if !record.columns().eq(self.columns.iter().map(String::as_str)) {
            return Err(SchemaError::Drift {
                expected: self.columns.clone(),
                found: record.columns().map(str::to_string).collect(),
            });
        }
        self.rows.push(record.into_values());
        Ok(())
    }

    /// Stamp every row with `value` under `column`, appending the column if absent
    pub fn stamp(&mut self, column: &str, value: &str) {
        match self.columns.iter().position(|name| name == column) {
            Some(index) => {
                for row in &mut self.rows {
                    row[index] = Some(value.to_string());
                }
            }
            None => {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.push(Some(value.to_string()));
                }
            }
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `index`
    pub fn value(&self, index: usize, column: &str) -> Option<&str> {
        let position = self.columns.iter().position(|name| name == column)?;
        self.rows.get(index)?.get(position)?.as_deref()
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub table_name: String,
    pub api_base_url: String,
    pub page_size: u32,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_delay: Duration,
    pub snapshot_dir: Option<PathBuf>,
}

pub const DEFAULT_API_URL: &str = "https://datacenter-web.eastmoney.com/api/data/v1/get";

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "yjbb.db".to_string(),
            table_name: "yjbb_data".to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            page_size: 500,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            request_delay: Duration::from_secs(2),
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Config::default();
        Ok(Config {
            database_path: std::env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            table_name: std::env::var("TABLE_NAME").unwrap_or(defaults.table_name),
            api_base_url: std::env::var("EASTMONEY_API_URL").unwrap_or(defaults.api_base_url),
            page_size: env_number("PAGE_SIZE").unwrap_or(defaults.page_size),
            max_retries: env_number("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay: env_number("RETRY_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
            request_delay: env_number("REQUEST_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_delay),
            snapshot_dir: std::env::var("SNAPSHOT_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn env_number<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
