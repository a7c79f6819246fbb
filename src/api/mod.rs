use std::time::Duration;
use thiserror::Error;

use crate::models::{EarningsBatch, ReportPeriod, SchemaError};
use crate::retry::Sleeper;

pub mod eastmoney_client;
pub use eastmoney_client::EastMoneyClient;

/// Errors raised while fetching a period from the data provider
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for period {period}")]
    Status { status: u16, period: ReportPeriod },

    #[error("failed to decode response for period {period}: {message}")]
    Decode { period: ReportPeriod, message: String },

    #[error("provider returned code {code}: {message}")]
    Provider { code: i64, message: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A source of quarterly earnings-bulletin data.
///
/// One call returns the whole dataset for a period. The caller treats it as
/// an opaque blocking call that may fail.
#[cfg_attr(test, mockall::automock)]
pub trait EarningsProvider {
    fn fetch_period(&self, period: ReportPeriod) -> Result<EarningsBatch, ApiError>;
}

/// Fixed courtesy pause after each provider request
#[derive(Debug, Clone, Copy)]
pub struct ApiRateLimiter {
    delay: Duration,
}

impl ApiRateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn wait(&self, sleeper: &dyn Sleeper) {
        if !self.delay.is_zero() {
            sleeper.sleep(self.delay);
        }
    }
}
