use crate::error::Res;
use crate::model::Period;
use anyhow::ensure;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    #[default]
    Active,
    Paused,
    Terminated,
}

serde_plain::derive_display_from_serialize!(ContractStatus);
serde_plain::derive_fromstr_from_deserialize!(ContractStatus);

/// A retainer agreement with a counterparty. Pricing lives in its `ContractVersion`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Contract {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub counterparty: String,
    #[serde(default)]
    pub status: ContractStatus,
}

/// How a milestone step derives its amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    /// An absolute amount.
    Fixed,
    /// A percentage of the monthly total.
    Percent,
    /// Whatever is left after all fixed and percent steps.
    Remainder,
}

serde_plain::derive_display_from_serialize!(MilestoneKind);
serde_plain::derive_fromstr_from_deserialize!(MilestoneKind);

/// One step of a payment structure, e.g. "50% deposit on day 0".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MilestoneStep {
    pub name: String,
    pub kind: MilestoneKind,
    /// The fixed amount or the percentage. Ignored for `Remainder`; a missing value counts as zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    /// Days after the first day of the billing month.
    #[serde(default)]
    pub day_offset: u32,
}

impl MilestoneStep {
    pub fn fixed(name: impl Into<String>, value: Decimal, day_offset: u32) -> Self {
        Self {
            name: name.into(),
            kind: MilestoneKind::Fixed,
            value: Some(value),
            day_offset,
        }
    }

    pub fn percent(name: impl Into<String>, value: Decimal, day_offset: u32) -> Self {
        Self {
            name: name.into(),
            kind: MilestoneKind::Percent,
            value: Some(value),
            day_offset,
        }
    }

    pub fn remainder(name: impl Into<String>, day_offset: u32) -> Self {
        Self {
            name: name.into(),
            kind: MilestoneKind::Remainder,
            value: None,
            day_offset,
        }
    }

    pub fn value_or_zero(&self) -> Decimal {
        self.value.unwrap_or(Decimal::ZERO)
    }
}

/// A pricing term of a contract, valid for a range of months. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ContractVersion {
    pub id: String,
    pub contract_id: String,
    pub monthly_amount: Decimal,
    pub effective_start: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_end: Option<NaiveDate>,
    #[serde(default)]
    pub milestones: Vec<MilestoneStep>,
}

impl ContractVersion {
    /// The month in which this version takes effect.
    pub fn start_period(&self) -> Period {
        Period::from_date(self.effective_start)
    }

    /// The last month this version covers, if it has an end.
    pub fn end_period(&self) -> Option<Period> {
        self.effective_end.map(Period::from_date)
    }

    /// True if the version's effective range contains `period`, compared at month granularity.
    pub fn covers(&self, period: Period) -> bool {
        self.start_period() <= period && self.end_period().map_or(true, |end| period <= end)
    }

    pub fn validate(&self) -> Res<()> {
        ensure!(!self.id.is_empty(), "A contract version must have an id");
        ensure!(
            !self.monthly_amount.is_sign_negative(),
            "Version '{}' has a negative monthly amount",
            self.id
        );
        if let Some(end) = self.effective_end {
            ensure!(
                end >= self.effective_start,
                "Version '{}' ends ({end}) before it starts ({})",
                self.id,
                self.effective_start
            );
        }
        let remainders = self
            .milestones
            .iter()
            .filter(|m| m.kind == MilestoneKind::Remainder)
            .count();
        ensure!(
            remainders <= 1,
            "Version '{}' has {remainders} remainder milestones, at most one is allowed",
            self.id
        );
        for step in &self.milestones {
            let value = step.value_or_zero();
            match step.kind {
                MilestoneKind::Fixed => ensure!(
                    !value.is_sign_negative(),
                    "Milestone '{}' of version '{}' has a negative amount",
                    step.name,
                    self.id
                ),
                MilestoneKind::Percent => ensure!(
                    value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED,
                    "Milestone '{}' of version '{}' has percentage {value} outside 0 to 100",
                    step.name,
                    self.id
                ),
                MilestoneKind::Remainder => {}
            }
        }
        Ok(())
    }
}
