pub mod api;
pub mod data_collector;
pub mod database;
pub mod models;
pub mod retry;
pub mod snapshot;
pub mod utils;

pub use api::{ApiError, EarningsProvider, EastMoneyClient};
pub use data_collector::{DataCollector, SyncError, UpdateSummary};
pub use database::{EarningsStore, StoreError, UpsertReport};
pub use models::{Config, EarningsBatch, EarningsRecord, Quarter, ReportPeriod};
