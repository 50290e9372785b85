//! Types that represent the core data model: rules, contracts, their versions, and the ledger
//! entries and monthly instances generated from them.
mod contract;
mod entry;
mod period;
mod rule;

pub use contract::{Contract, ContractStatus, ContractVersion, MilestoneKind, MilestoneStep};
pub use entry::{
    EntrySource, EntryStatus, InstanceStatus, LedgerEntry, MonthlyInstance, NewLedgerEntry,
    NewMonthlyInstance,
};
pub use period::Period;
pub use rule::{EntryKind, RecurringRule, RuleStatus};

use serde::{Deserialize, Serialize};

/// The set of rules, contracts and versions held in an import file.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BillingData {
    #[serde(default)]
    pub rules: Vec<RecurringRule>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub versions: Vec<ContractVersion>,
}

impl BillingData {
    /// Validates every rule and version.
    pub fn validate(&self) -> crate::error::Res<()> {
        for rule in &self.rules {
            rule.validate()?;
        }
        for version in &self.versions {
            version.validate()?;
        }
        Ok(())
    }
}
