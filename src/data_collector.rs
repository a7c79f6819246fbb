use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, ApiRateLimiter, EarningsProvider};
use crate::database::{EarningsStore, StoreError, UpsertReport};
use crate::models::{Config, EarningsBatch, ReportPeriod, EPOCH_PERIOD, PERIOD_COLUMN};
use crate::retry::{with_retry, RetryPolicy, Sleeper, ThreadSleeper};
use crate::snapshot::{write_snapshot, SnapshotError};
use crate::utils::{pending_periods, quarterly_periods};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Result of one incremental update run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub periods: Vec<ReportPeriod>,
    pub inserted: usize,
    pub ignored: usize,
    pub snapshot: Option<PathBuf>,
}

impl UpdateSummary {
    pub fn is_noop(&self) -> bool {
        self.periods.is_empty()
    }
}

/// Fetches earnings bulletins period by period and persists them.
pub struct DataCollector {
    provider: Box<dyn EarningsProvider>,
    store: EarningsStore,
    retry: RetryPolicy,
    rate_limiter: ApiRateLimiter,
    sleeper: Arc<dyn Sleeper>,
    snapshot_dir: Option<PathBuf>,
}

impl DataCollector {
    pub fn new(provider: Box<dyn EarningsProvider>, store: EarningsStore, config: &Config) -> Self {
        Self {
            provider,
            store,
            retry: RetryPolicy::new(config.max_retries, config.retry_delay),
            rate_limiter: ApiRateLimiter::new(config.request_delay),
            sleeper: Arc::new(ThreadSleeper),
            snapshot_dir: config.snapshot_dir.clone(),
        }
    }

    /// Replace the sleeper used for retry and courtesy delays
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn store(&self) -> &EarningsStore {
        &self.store
    }

    /// Newest stored period, or [`EPOCH_PERIOD`] when nothing is stored.
    ///
    /// A missing table is created from the shape of a probe fetch of the
    /// epoch period.
    pub fn last_stored_period(&self) -> Result<ReportPeriod, SyncError> {
        if let Some(period) = self.store.last_period()? {
            return Ok(period);
        }

        if !self.store.table_exists()? {
            info!("Database does not exist or table is missing. Rebuilding database...");
            let mut probe = self.retry.run(self.sleeper.as_ref(), "schema probe", || {
                self.provider.fetch_period(EPOCH_PERIOD)
            })?;
            self.rate_limiter.wait(self.sleeper.as_ref());
            probe.stamp(PERIOD_COLUMN, &EPOCH_PERIOD.id());
            self.store.ensure_table(probe.columns())?;
            info!("💾 Database created at {}", self.store.path().display());
        }

        Ok(EPOCH_PERIOD)
    }

    /// Fetch one period, stamp it, store it, then pause for the provider.
    /// Retried as a whole; the error is returned once attempts run out.
    pub fn fetch_and_persist(&self, period: ReportPeriod) -> Result<UpsertReport, SyncError> {
        let mut fetch = self.retrying_fetch();
        fetch(period).map(|(report, _)| report)
    }

    fn retrying_fetch(
        &self,
    ) -> impl FnMut(ReportPeriod) -> Result<(UpsertReport, EarningsBatch), SyncError> + '_ {
        with_retry(self.retry, self.sleeper.clone(), move |period| {
            self.fetch_and_persist_once(period)
        })
    }

    fn fetch_and_persist_once(
        &self,
        period: ReportPeriod,
    ) -> Result<(UpsertReport, EarningsBatch), SyncError> {
        let mut batch = self.provider.fetch_period(period)?;
        batch.stamp(PERIOD_COLUMN, &period.id());

        self.store.ensure_table(batch.columns())?;
        let report = self.store.upsert(&batch)?;

        info!(
            "✅ Finished {}: inserted {} rows, ignored {} rows",
            period, report.inserted, report.ignored
        );
        self.rate_limiter.wait(self.sleeper.as_ref());
        Ok((report, batch))
    }

    /// Bring the store up to `end_year`/`end_quarter`.
    ///
    /// Periods from the newest stored one onwards are fetched in order, the
    /// newest stored one included. Any period that still fails after its
    /// retries stops the run; earlier periods stay committed.
    pub fn incremental_update(
        &self,
        end_year: i32,
        end_quarter: u32,
    ) -> Result<UpdateSummary, SyncError> {
        let last = self.last_stored_period()?;
        let periods = pending_periods(&quarterly_periods(end_year, end_quarter), last);

        let (Some(first), Some(final_period)) = (periods.first(), periods.last()) else {
            info!("✅ No new data to update (last stored period: {})", last);
            return Ok(UpdateSummary::default());
        };
        info!("🔄 Updating data from {} to {}...", first, final_period);

        let keep_batches = self.snapshot_dir.is_some();
        let mut fetch = self.retrying_fetch();

        let mut summary = UpdateSummary::default();
        let mut batches = Vec::new();
        for (i, period) in periods.iter().enumerate() {
            info!("📈 {}/{}: fetching {}", i + 1, periods.len(), period);
            let (report, batch) = fetch(*period)?;

            summary.periods.push(*period);
            summary.inserted += report.inserted;
            summary.ignored += report.ignored;
            if keep_batches {
                batches.push((*period, batch));
            }
        }

        if let Some(dir) = &self.snapshot_dir {
            summary.snapshot = write_snapshot(dir, &batches)?;
            if summary.snapshot.is_none() {
                warn!("No rows fetched, snapshot skipped");
            }
        }

        info!(
            "🎉 All data saved: {} periods, {} rows inserted, {} ignored",
            summary.periods.len(),
            summary.inserted,
            summary.ignored
        );
        Ok(summary)
    }
}
