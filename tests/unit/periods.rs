use pretty_assertions::assert_eq;
use test_log::test;

use yjbb_sync::utils::{pending_periods, quarterly_periods};
use yjbb_sync::{Quarter, ReportPeriod};

use crate::common::test_data::period;

#[test]
fn test_enumeration_runs_from_epoch_to_requested_quarter() {
    let periods = quarterly_periods(2011, 2);
    let ids: Vec<String> = periods.iter().map(ReportPeriod::id).collect();
    assert_eq!(
        ids,
        vec!["20100331", "20100630", "20100930", "20101231", "20110331", "20110630"]
    );
}

#[test]
fn test_enumeration_of_the_first_quarter_only() {
    assert_eq!(
        quarterly_periods(2010, 1),
        vec![ReportPeriod::new(2010, Quarter::Q1)]
    );
}

#[test]
fn test_pending_keeps_last_stored_period() {
    let all = quarterly_periods(2012, 4);
    let pending = pending_periods(&all, period("20120630"));

    assert_eq!(pending, vec![period("20120630"), period("20120930"), period("20121231")]);
}

#[test]
fn test_pending_is_empty_when_store_is_ahead() {
    let all = quarterly_periods(2015, 3);
    assert!(pending_periods(&all, period("20160331")).is_empty());
}
