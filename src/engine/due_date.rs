//! Maps a billing month plus a nominal day (or an offset) onto a calendar date.

use crate::model::Period;
use chrono::{Datelike, Days, NaiveDate};

/// Resolves `day` (1 through 31) in `period`, clamping to the last day of the month.
///
/// Day 31 in February is the 28th (or 29th), never a date in March. A day of 0 is treated as 1.
pub fn resolve_day(period: Period, day: u32) -> NaiveDate {
    let clamped = day.clamp(1, period.days_in_month());
    period
        .first_day()
        .with_day(clamped)
        .unwrap_or_else(|| period.last_day())
}

/// Resolves `offset` days after the first day of `period`. The result may fall in a later month.
pub fn resolve_offset(period: Period, offset: u32) -> NaiveDate {
    let first = period.first_day();
    first
        .checked_add_days(Days::new(u64::from(offset)))
        .unwrap_or(first)
}
