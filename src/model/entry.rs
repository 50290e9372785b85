use crate::model::{EntryKind, Period};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The lifecycle status of a ledger entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Generated income that has not arrived yet.
    #[default]
    Expected,
    /// A system-generated future expense.
    Scheduled,
    Pending,
    Received,
    Overdue,
}

serde_plain::derive_display_from_serialize!(EntryStatus);
serde_plain::derive_fromstr_from_deserialize!(EntryStatus);

impl EntryStatus {
    /// The status a freshly generated entry of `kind` starts in.
    pub fn generated(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Income => EntryStatus::Expected,
            EntryKind::Expense => EntryStatus::Scheduled,
        }
    }
}

/// Where a generated entry came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EntrySource {
    /// A simple recurring income or expense rule.
    Rule { rule_id: String },
    /// One milestone of a retainer's monthly instance.
    Retainer {
        instance_id: String,
        milestone: String,
    },
}

/// A ledger entry that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NewLedgerEntry {
    pub kind: EntryKind,
    pub source: EntrySource,
    pub counterparty: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    /// The billing month this entry settles. For milestones this can differ from the month of
    /// `due_date` when an offset spills past the end of the month.
    pub billing_month: Period,
    pub status: EntryStatus,
}

/// A ledger entry as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LedgerEntry {
    pub id: String,
    #[serde(flatten)]
    pub entry: NewLedgerEntry,
    /// A user-chosen later date ("snoozed"); when present it replaces `due_date` for overdue checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_date: Option<NaiveDate>,
}

impl LedgerEntry {
    /// The date the money is actually expected.
    pub fn effective_date(&self) -> NaiveDate {
        self.expected_date.unwrap_or(self.entry.due_date)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    #[default]
    Generated,
    Partial,
    Paid,
    Skipped,
}

serde_plain::derive_display_from_serialize!(InstanceStatus);
serde_plain::derive_fromstr_from_deserialize!(InstanceStatus);

/// "This contract version was billed for this month." Unique per `(version_id, month)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NewMonthlyInstance {
    pub id: String,
    pub version_id: String,
    pub month: Period,
    pub total_due: Decimal,
    pub status: InstanceStatus,
}

/// A monthly instance as stored.
pub type MonthlyInstance = NewMonthlyInstance;
