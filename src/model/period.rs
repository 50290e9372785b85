//! The `Period` type: one calendar month, the unit of billing.

use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A calendar month such as `2024-02`.
///
/// Internally this holds the first day of the month, so ordering and equality follow the calendar.
///
/// # Examples
///
/// ```
/// # use ledger_cadence::model::Period;
/// # use std::str::FromStr;
/// let feb = Period::from_str("2024-02").unwrap();
/// assert_eq!(feb.days_in_month(), 29);
/// assert_eq!(feb.next().unwrap().to_string(), "2024-03");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    /// Creates a `Period` from a year and a month number (1-12).
    pub fn new(year: i32, month: u32) -> crate::error::Res<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .with_context(|| format!("Invalid year/month {year}-{month:02}"))?;
        Ok(Self(first))
    }

    /// The month that contains `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 exists in every month, so this never falls back.
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// The first day of the month.
    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// The last day of the month.
    pub fn last_day(&self) -> NaiveDate {
        self.0.with_day(self.days_in_month()).unwrap_or(self.0)
    }

    /// The number of days in this month, accounting for leap years.
    pub fn days_in_month(&self) -> u32 {
        match self.month() {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            _ if self.0.leap_year() => 29,
            _ => 28,
        }
    }

    /// The following month. `None` only at the end of the representable calendar.
    pub fn next(&self) -> Option<Self> {
        self.add_months(1)
    }

    /// The month `n` months after this one.
    pub fn add_months(&self, n: u32) -> Option<Self> {
        self.0.checked_add_months(Months::new(n)).map(Self)
    }

    /// Formats the period as a first-of-month date, `YYYY-MM-01`, which is how it is stored.
    pub fn to_date_string(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl From<NaiveDate> for Period {
    fn from(value: NaiveDate) -> Self {
        Period::from_date(value)
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    /// Accepts `YYYY-MM` or a full `YYYY-MM-DD` date, in which case the day is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let date = match trimmed.len() {
            7 => NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d"),
            _ => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"),
        }
        .with_context(|| format!("Unable to parse '{s}' as a month, expected YYYY-MM"))?;
        Ok(Period::from_date(date))
    }
}

impl Serialize for Period {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Period::from_str(&s).map_err(serde::de::Error::custom)
    }
}
