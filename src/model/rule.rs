use crate::error::Res;
use crate::model::Period;
use anyhow::ensure;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a rule (or a ledger entry) is money coming in or going out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[default]
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(EntryKind);
serde_plain::derive_fromstr_from_deserialize!(EntryKind);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    #[default]
    Active,
    Paused,
    Ended,
}

serde_plain::derive_display_from_serialize!(RuleStatus);
serde_plain::derive_fromstr_from_deserialize!(RuleStatus);

/// A simple monthly recurring income or expense rule.
///
/// The `last_generated_period` field is the rule's cursor: when set, it is the month of the most
/// recent entry that is known to exist for this rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecurringRule {
    pub id: String,
    #[serde(default)]
    pub kind: EntryKind,
    pub name: String,
    #[serde(default)]
    pub counterparty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub amount: Decimal,
    /// The nominal day of the month the entry falls due, 1 through 31.
    pub day_of_month: u32,
    #[serde(default)]
    pub status: RuleStatus,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated_period: Option<Period>,
}

impl RecurringRule {
    pub fn validate(&self) -> Res<()> {
        ensure!(!self.id.is_empty(), "A rule must have an id");
        ensure!(
            (1..=31).contains(&self.day_of_month),
            "Rule '{}' has day_of_month {}, expected 1 through 31",
            self.id,
            self.day_of_month
        );
        ensure!(
            !self.amount.is_sign_negative(),
            "Rule '{}' has a negative amount {}",
            self.id,
            self.amount
        );
        if let Some(end) = self.end_date {
            ensure!(
                end >= self.start_date,
                "Rule '{}' ends ({end}) before it starts ({})",
                self.id,
                self.start_date
            );
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// The description written onto generated entries.
    pub fn entry_description(&self) -> String {
        match self.kind {
            EntryKind::Income if self.name.is_empty() => String::from("Monthly Retainer"),
            EntryKind::Income => self.name.clone(),
            EntryKind::Expense => format!("{} (Recurring)", self.name),
        }
    }

    /// The category written onto generated entries.
    pub fn entry_category(&self) -> Option<String> {
        match (&self.category, self.kind) {
            (Some(c), _) => Some(c.clone()),
            (None, EntryKind::Income) => Some(String::from("Retainer")),
            (None, EntryKind::Expense) => None,
        }
    }
}
