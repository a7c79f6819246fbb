use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_log::test;

use yjbb_sync::models::{EPOCH_PERIOD, PERIOD_COLUMN};
use yjbb_sync::{ApiError, StoreError, SyncError};

use crate::common::test_data::{create_test_batch, period};
use crate::common::{logging, TestEnv, FAKE_COLUMNS};

#[test]
fn test_fresh_database_is_built_from_epoch() {
    logging::log_test_step("fresh database, update to 2010 Q2");
    let env = TestEnv::new();
    env.provider
        .serve(period("20100331"), create_test_batch(&["000001", "000002"], "0.1"))
        .serve(period("20100630"), create_test_batch(&["000001"], "0.2"));

    let summary = env.collector().incremental_update(2010, 2).unwrap();

    // probe, then the epoch itself, then Q2
    assert_eq!(
        env.provider.calls(),
        vec![period("20100331"), period("20100331"), period("20100630")]
    );
    assert_eq!(summary.periods, vec![period("20100331"), period("20100630")]);
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.ignored, 0);
    // a pause after every request, the schema fetch included
    assert_eq!(env.sleeper.sleeps(), vec![Duration::from_secs(2); 3]);

    let store = env.store();
    let mut expected: Vec<String> = FAKE_COLUMNS.iter().map(|c| c.to_string()).collect();
    expected.push(PERIOD_COLUMN.to_string());
    assert_eq!(store.table_columns().unwrap(), expected);
    assert_eq!(store.period_row_count(period("20100331")).unwrap(), 2);
    assert_eq!(store.last_period().unwrap(), Some(period("20100630")));
}

#[test]
fn test_second_run_for_same_quarter_adds_nothing() {
    let env = TestEnv::new();
    env.provider
        .serve(EPOCH_PERIOD, create_test_batch(&["000001", "000002", "000003"], "0.1"));

    let first = env.collector().incremental_update(2010, 1).unwrap();
    assert_eq!(first.inserted, 3);

    let second = env.collector().incremental_update(2010, 1).unwrap();
    assert_eq!(second.periods, vec![EPOCH_PERIOD]);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.ignored, 3);
    assert_eq!(env.store().row_count().unwrap(), 3);
}

#[test]
fn test_last_stored_period_is_fetched_again() {
    let env = TestEnv::new();
    env.provider
        .serve(period("20110630"), create_test_batch(&["000001"], "0.3"))
        .serve(period("20110930"), create_test_batch(&["000001"], "0.4"));
    env.collector().fetch_and_persist(period("20110630")).unwrap();

    // late filers show up in the already stored quarter
    env.provider
        .serve(period("20110630"), create_test_batch(&["000001", "600000"], "0.3"));
    let summary = env.collector().incremental_update(2011, 3).unwrap();

    assert_eq!(
        env.provider.calls(),
        vec![period("20110630"), period("20110630"), period("20110930")]
    );
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.ignored, 1);
    assert_eq!(env.store().period_row_count(period("20110630")).unwrap(), 2);
}

#[test]
fn test_existing_empty_table_skips_probe() {
    let env = TestEnv::new();
    let mut shape = create_test_batch(&["000001"], "0");
    shape.stamp(PERIOD_COLUMN, &EPOCH_PERIOD.id());
    env.store().ensure_table(shape.columns()).unwrap();

    let collector = env.collector();
    assert_eq!(collector.last_stored_period().unwrap(), EPOCH_PERIOD);
    assert!(env.provider.calls().is_empty());

    collector.incremental_update(2010, 1).unwrap();
    assert_eq!(env.provider.calls(), vec![EPOCH_PERIOD]);
}

#[test]
fn test_failing_period_aborts_and_keeps_earlier_periods() {
    let env = TestEnv::new();
    env.provider
        .serve(period("20100331"), create_test_batch(&["000001"], "0.1"))
        .serve(period("20100630"), create_test_batch(&["000001"], "0.2"))
        .serve(period("20101231"), create_test_batch(&["000001"], "0.4"))
        .fail_on(period("20100930"));

    let result = env.collector().incremental_update(2010, 4);
    assert_matches!(result, Err(SyncError::Api(ApiError::Provider { code: 503, .. })));

    assert_eq!(env.provider.call_count(period("20100930")), 3);
    assert_eq!(env.provider.call_count(period("20101231")), 0);

    let store = env.store();
    assert_eq!(store.row_count().unwrap(), 2);
    assert_eq!(store.last_period().unwrap(), Some(period("20100630")));

    // schema fetch, Q1 and Q2 pauses, then two retry waits for Q3
    assert_eq!(env.sleeper.sleeps(), vec![Duration::from_secs(2); 5]);
}

#[test]
fn test_rerun_after_failure_resumes_from_last_good_period() {
    let env = TestEnv::new();
    env.provider
        .serve(period("20100331"), create_test_batch(&["000001"], "0.1"))
        .fail_on(period("20100630"));
    assert!(env.collector().incremental_update(2010, 2).is_err());

    let healed = TestEnv {
        provider: Default::default(),
        ..env
    };
    healed
        .provider
        .serve(period("20100630"), create_test_batch(&["000001"], "0.2"));
    let summary = healed.collector().incremental_update(2010, 2).unwrap();

    assert_eq!(summary.periods, vec![period("20100331"), period("20100630")]);
    assert_eq!(healed.store().row_count().unwrap(), 2);
}

#[test]
fn test_changed_provider_columns_are_reported() {
    let env = TestEnv::new();
    env.provider
        .serve(period("20100331"), create_test_batch(&["000001"], "0.1"));
    env.collector().incremental_update(2010, 1).unwrap();

    let mut wider = create_test_batch(&["000001"], "0.2");
    wider.stamp("dividend", "0.05");
    env.provider.serve(period("20100630"), wider);

    let result = env.collector().incremental_update(2010, 2);
    assert_matches!(result, Err(SyncError::Store(StoreError::SchemaDrift { .. })));
    assert_eq!(env.store().period_row_count(period("20100630")).unwrap(), 0);
}

#[test]
fn test_snapshot_holds_every_fetched_row() {
    let env = TestEnv::new().with_snapshots();
    env.provider
        .serve(period("20100331"), create_test_batch(&["000001", "000002"], "0.1"))
        .serve(period("20100630"), create_test_batch(&["000001"], "0.2"));

    let summary = env.collector().incremental_update(2010, 2).unwrap();

    let path = summary.snapshot.expect("snapshot written");
    assert_eq!(path.file_name().unwrap(), "yjbb20100630.csv");

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "stock_code,stock_name,eps,report_date");
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[3], "000001,股票000001,0.2,20100630");
}

#[test]
fn test_up_to_date_store_makes_no_requests() {
    let env = TestEnv::new();
    env.provider
        .serve(period("20120331"), create_test_batch(&["000001"], "0.1"));
    env.collector().fetch_and_persist(period("20120331")).unwrap();

    let summary = env.collector().incremental_update(2011, 4).unwrap();
    assert!(summary.is_noop());
    assert_eq!(env.provider.calls(), vec![period("20120331")]);
}
