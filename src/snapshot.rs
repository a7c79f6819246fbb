//! CSV snapshot of the rows fetched during one run.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::models::{EarningsBatch, ReportPeriod};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch for {period} has columns {found:?}, snapshot header is {expected:?}")]
    SchemaDrift {
        period: ReportPeriod,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// File name for a run ending at `last`
pub fn snapshot_file_name(last: ReportPeriod) -> String {
    format!("yjbb{}.csv", last)
}

/// Write every batch into `dir/yjbb<last period>.csv`.
///
/// The header comes from the first batch; later batches must share it.
/// Returns `None` when there is nothing to write.
pub fn write_snapshot(
    dir: &Path,
    batches: &[(ReportPeriod, EarningsBatch)],
) -> Result<Option<PathBuf>, SnapshotError> {
    let (Some((_, first)), Some((last, _))) = (batches.first(), batches.last()) else {
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(*last));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(first.columns())?;

    let mut rows = 0;
    for (period, batch) in batches {
        if batch.columns() != first.columns() {
            return Err(SnapshotError::SchemaDrift {
                period: *period,
                expected: first.columns().to_vec(),
                found: batch.columns().to_vec(),
            });
        }
        for row in batch.rows() {
            writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
            rows += 1;
        }
    }
    writer.flush()?;

    info!("📁 Saved {} rows to {}", rows, path.display());
    Ok(Some(path))
}
