//! End-to-end update runs against a temporary database

mod incremental_update;
