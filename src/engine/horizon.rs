use crate::model::Period;
use chrono::NaiveDate;
use serde::Serialize;

/// The default number of months generation may cover: the current month and the next one.
pub const DEFAULT_HORIZON_MONTHS: u32 = 2;

/// The most months a horizon may ever cover.
pub const MAX_HORIZON_MONTHS: u32 = 12;

/// The window of months, relative to an "as of" date, within which entries may be generated.
///
/// Generation never writes anything for a month after `last`. Catch-up of earlier months is
/// bounded by each rule's cursor or start date, not by the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Horizon {
    first: Period,
    last: Period,
}

impl Horizon {
    /// Builds the horizon starting at the month of `as_of` and covering `months` months, clamped
    /// to `1..=MAX_HORIZON_MONTHS`.
    pub fn new(as_of: NaiveDate, months: u32) -> Self {
        let first = Period::from_date(as_of);
        let months = months.clamp(1, MAX_HORIZON_MONTHS);
        let last = first.add_months(months - 1).unwrap_or(first);
        Self { first, last }
    }

    pub fn first(&self) -> Period {
        self.first
    }

    pub fn last(&self) -> Period {
        self.last
    }

    /// True if `period` is not later than the end of the horizon.
    pub fn allows(&self, period: Period) -> bool {
        period <= self.last
    }
}
