//! Lazily enumerates the billing months a rule still has to be considered for.

use crate::engine::due_date;
use crate::engine::Horizon;
use crate::model::{Period, RecurringRule};
use chrono::NaiveDate;

/// A month the driver should try to generate, with its resolved due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub period: Period,
    pub due_date: NaiveDate,
}

/// Why a schedule stopped yielding candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The next month is past the horizon. The rule will continue on a later run.
    Horizon,
    /// The next due date is past the rule's end date. The rule is finished.
    EndDate,
}

/// An iterator over the `Candidate`s of one rule.
///
/// It starts at the month after `cursor` (or at the month of `start_date` when there is no
/// cursor) and walks forward one month at a time. Months whose due date falls before
/// `start_date` are passed over. It stops for good at the first month beyond the horizon or the
/// first due date after `end_date`, so it never skips past the end and resumes later.
#[derive(Debug, Clone)]
pub struct RuleSchedule {
    next: Option<Period>,
    day_of_month: u32,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    horizon: Horizon,
    stop: Option<Stop>,
}

impl RuleSchedule {
    pub fn new(
        cursor: Option<Period>,
        day_of_month: u32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        horizon: Horizon,
    ) -> Self {
        let next = match cursor {
            Some(c) => c.next(),
            None => Some(Period::from_date(start_date)),
        };
        Self {
            next,
            day_of_month,
            start_date,
            end_date,
            horizon,
            stop: None,
        }
    }

    /// Builds the schedule for `rule` using its persisted cursor.
    pub fn for_rule(rule: &RecurringRule, horizon: Horizon) -> Self {
        Self::new(
            rule.last_generated_period,
            rule.day_of_month,
            rule.start_date,
            rule.end_date,
            horizon,
        )
    }

    /// Why iteration ended, once it has.
    pub fn stop(&self) -> Option<Stop> {
        self.stop
    }

    fn halt(&mut self, stop: Stop) -> Option<Candidate> {
        self.next = None;
        self.stop = Some(stop);
        None
    }
}

impl Iterator for RuleSchedule {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let period = match self.next {
                Some(p) => p,
                None if self.stop.is_none() => return self.halt(Stop::Horizon),
                None => return None,
            };
            if !self.horizon.allows(period) {
                return self.halt(Stop::Horizon);
            }
            let due_date = due_date::resolve_day(period, self.day_of_month);
            if self.end_date.is_some_and(|end| due_date > end) {
                return self.halt(Stop::EndDate);
            }
            self.next = period.next();
            if due_date < self.start_date {
                continue;
            }
            return Some(Candidate { period, due_date });
        }
    }
}

/// Every month from `first` through the end of `horizon`.
pub fn months_through(first: Period, horizon: Horizon) -> impl Iterator<Item = Period> {
    std::iter::successors(Some(first), |p| p.next()).take_while(move |p| horizon.allows(*p))
}
