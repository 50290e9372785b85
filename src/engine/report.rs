use crate::engine::Horizon;
use crate::model::Period;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// The rule or contract a generation outcome belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Subject {
    Rule(String),
    Contract(String),
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Rule(id) => write!(f, "rule '{id}'"),
            Subject::Contract(id) => write!(f, "contract '{id}'"),
        }
    }
}

/// A month that produced new records during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generated {
    pub subject: Subject,
    pub period: Period,
    /// Number of ledger entries written for this month.
    pub entries: usize,
}

/// A rule or contract whose processing stopped early because a write failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationFailure {
    pub subject: Subject,
    pub period: Period,
    pub message: String,
}

/// The outcome of one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub as_of: NaiveDate,
    pub horizon: Horizon,
    pub rules_scanned: usize,
    pub contracts_scanned: usize,
    pub entries_created: usize,
    pub instances_created: usize,
    /// Months skipped because a record already existed.
    pub already_present: usize,
    /// Retainer months with no applicable contract version.
    pub months_without_version: usize,
    /// Rules whose schedule reached their end date during this run.
    pub rules_ended: usize,
    pub generated: Vec<Generated>,
    pub failures: Vec<GenerationFailure>,
}

impl GenerationReport {
    pub(crate) fn new(as_of: NaiveDate, horizon: Horizon) -> Self {
        Self {
            as_of,
            horizon,
            rules_scanned: 0,
            contracts_scanned: 0,
            entries_created: 0,
            instances_created: 0,
            already_present: 0,
            months_without_version: 0,
            rules_ended: 0,
            generated: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when no rule or contract was cut short by a failure.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record_generated(&mut self, subject: Subject, period: Period, entries: usize) {
        self.entries_created += entries;
        self.generated.push(Generated {
            subject,
            period,
            entries,
        });
    }

    pub(crate) fn record_failure(&mut self, subject: Subject, period: Period, err: &anyhow::Error) {
        self.failures.push(GenerationFailure {
            subject,
            period,
            message: format!("{err:#}"),
        });
    }

    /// A one-line summary suitable for a log line or command output.
    pub fn summary(&self) -> String {
        format!(
            "Generated {} entries ({} retainer instances) through {}; {} already present, \
            {} failed",
            self.entries_created,
            self.instances_created,
            self.horizon.last(),
            self.already_present,
            self.failures.len()
        )
    }
}
