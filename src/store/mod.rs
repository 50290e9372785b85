//! The boundary between the generation engine and whatever persists rules and ledger entries.
//!
//! The engine only ever reads rules, contracts and versions, checks whether a record exists for a
//! natural key, inserts new records, and moves a rule's cursor forward. The `Store` trait is that
//! surface and nothing more. `Db` implements it over SQLite; `MemoryStore` implements it in memory
//! for tests.

mod memory;

pub use memory::MemoryStore;

use crate::error::Res;
use crate::model::{
    Contract, ContractVersion, NewLedgerEntry, NewMonthlyInstance, Period, RecurringRule,
};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// The natural key that identifies "already generated".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum GenerationKey {
    /// A simple rule billed for a month.
    Rule { rule_id: String, period: Period },
    /// A contract version billed for a month.
    Retainer { version_id: String, period: Period },
}

impl GenerationKey {
    pub fn rule(rule_id: impl Into<String>, period: Period) -> Self {
        Self::Rule {
            rule_id: rule_id.into(),
            period,
        }
    }

    pub fn retainer(version_id: impl Into<String>, period: Period) -> Self {
        Self::Retainer {
            version_id: version_id.into(),
            period,
        }
    }
}

impl Display for GenerationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationKey::Rule { rule_id, period } => write!(f, "rule {rule_id} @ {period}"),
            GenerationKey::Retainer { version_id, period } => {
                write!(f, "version {version_id} @ {period}")
            }
        }
    }
}

/// The result of an insert that is keyed on a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    /// The record was written.
    Inserted,
    /// A record with the same natural key already exists. Nothing was written. This is the
    /// expected outcome when two runs race, and it is not an error.
    AlreadyExists,
}

/// Predicate-style access to rules, contracts and generated records.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Rules whose status is `active`.
    async fn active_rules(&self) -> Res<Vec<RecurringRule>>;

    /// Contracts whose status is `active`.
    async fn active_contracts(&self) -> Res<Vec<Contract>>;

    /// The versions of a contract, ordered by effective start ascending.
    async fn contract_versions(&self, contract_id: &str) -> Res<Vec<ContractVersion>>;

    /// Whether any record already exists for `key`.
    async fn exists(&self, key: &GenerationKey) -> Res<bool>;

    /// Writes a single rule-generated entry. The store enforces uniqueness of
    /// `(rule_id, billing_month)` and reports a conflict as `AlreadyExists`.
    async fn insert_rule_entry(&self, entry: &NewLedgerEntry) -> Res<InsertOutcome>;

    /// Writes a monthly instance together with its milestone entries, all or nothing. The store
    /// enforces uniqueness of `(version_id, month)` and reports a conflict as `AlreadyExists`.
    async fn insert_retainer_instance(
        &self,
        instance: &NewMonthlyInstance,
        entries: &[NewLedgerEntry],
    ) -> Res<InsertOutcome>;

    /// Moves the cursor of `rule_id` to `period`. A cursor never moves backwards: if it already
    /// points at or past `period` this is a no-op.
    async fn advance_cursor(&self, rule_id: &str, period: Period) -> Res<()>;
}
