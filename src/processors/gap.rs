use crate::utils::constants::MIN_GAP_DAYS;
use chrono::{Duration, NaiveDate};

/// Date format the station table tool's inputs expect.
pub const WINDOW_DATE_FORMAT: &str = "%m/%d/%Y";

/// Inclusive date range to request from the station table tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn start_param(&self) -> String {
        self.start.format(WINDOW_DATE_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(WINDOW_DATE_FORMAT).to_string()
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start_param(), self.end_param())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapDecision {
    /// The station is current; treated as success by the caller.
    NoUpdateNeeded,
    Window(DateWindow),
}

/// Computes the `[last + 1 day, today - 1 day]` window for a station whose
/// series ends on `last_date`.
pub fn compute_gap(last_date: NaiveDate, today: NaiveDate) -> GapDecision {
    let start = last_date + Duration::days(1);
    let end = today - Duration::days(1);

    if end - start < Duration::days(MIN_GAP_DAYS) {
        GapDecision::NoUpdateNeeded
    } else {
        GapDecision::Window(DateWindow { start, end })
    }
}

/// The day a successful refresh brings a station up to.
pub fn yesterday(today: NaiveDate) -> NaiveDate {
    today - Duration::days(1)
}
