use crate::models::{Quarter, ReportPeriod, MAX_YEAR, START_YEAR};

/// Enumerate every quarter-end period from Q1 of [`START_YEAR`] through
/// `end_year`/`end_quarter`, oldest first.
///
/// All four quarters of each year are generated and the trailing
/// `4 - end_quarter` entries are dropped. The quarter is not validated: a
/// value above 4 drops nothing and 0 drops the whole final year. Years past
/// [`MAX_YEAR`] are cut off so every identifier stays 8 digits wide.
pub fn quarterly_periods(end_year: i32, end_quarter: u32) -> Vec<ReportPeriod> {
    if end_year > MAX_YEAR {
        return quarterly_periods(MAX_YEAR, 4);
    }
    let mut periods: Vec<ReportPeriod> = (START_YEAR..=end_year)
        .flat_map(|year| Quarter::ALL.into_iter().map(move |q| ReportPeriod::new(year, q)))
        .collect();

    let trailing = 4usize.saturating_sub(end_quarter as usize);
    periods.truncate(periods.len().saturating_sub(trailing));
    periods
}

/// Periods at or after `last_stored`.
///
/// The bound is inclusive so the newest stored quarter is fetched again on
/// every run; reports published late for that quarter get picked up and the
/// insert layer drops rows that are already present.
pub fn pending_periods(periods: &[ReportPeriod], last_stored: ReportPeriod) -> Vec<ReportPeriod> {
    periods
        .iter()
        .copied()
        .filter(|period| *period >= last_stored)
        .collect()
}
