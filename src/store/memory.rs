//! Implements the `Store` trait in memory.
//!
//! Note: this is compiled in the library, not only in tests, so that the engine can be exercised
//! end to end without a database. Faults can be injected per natural key to simulate a store that
//! rejects writes.

use crate::error::Res;
use crate::model::{
    Contract, ContractStatus, ContractVersion, EntrySource, LedgerEntry, MonthlyInstance,
    NewLedgerEntry, NewMonthlyInstance, Period, RecurringRule,
};
use crate::store::{GenerationKey, InsertOutcome, Store};
use crate::utils;
use anyhow::bail;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    rules: BTreeMap<String, RecurringRule>,
    contracts: Vec<Contract>,
    versions: Vec<ContractVersion>,
    entries: Vec<LedgerEntry>,
    instances: Vec<MonthlyInstance>,
    fail_fetch: bool,
    fail_inserts: HashSet<GenerationKey>,
    fail_cursor: HashSet<String>,
    skip_exists_check: bool,
}

/// An in-memory `Store`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_rule(&self, rule: RecurringRule) {
        let mut state = self.state.lock().await;
        state.rules.insert(rule.id.clone(), rule);
    }

    pub async fn add_contract(&self, contract: Contract, versions: Vec<ContractVersion>) {
        let mut state = self.state.lock().await;
        state.contracts.push(contract);
        state.versions.extend(versions);
    }

    /// Replaces a rule's definition but keeps its cursor, like an edit made through the UI.
    pub async fn edit_rule(&self, rule: RecurringRule) {
        let mut state = self.state.lock().await;
        let cursor = state
            .rules
            .get(&rule.id)
            .and_then(|r| r.last_generated_period);
        let mut rule = rule;
        rule.last_generated_period = cursor;
        state.rules.insert(rule.id.clone(), rule);
    }

    pub async fn rule(&self, rule_id: &str) -> Option<RecurringRule> {
        self.state.lock().await.rules.get(rule_id).cloned()
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().await.entries.clone()
    }

    pub async fn instances(&self) -> Vec<MonthlyInstance> {
        self.state.lock().await.instances.clone()
    }

    /// Inserts an entry directly, bypassing the engine, as if another process had written it.
    pub async fn push_entry(&self, entry: NewLedgerEntry) {
        let mut state = self.state.lock().await;
        state.entries.push(LedgerEntry {
            id: utils::generate_id(),
            entry,
            expected_date: None,
        });
    }

    /// Makes every read of rules, contracts and versions fail.
    pub async fn fail_fetches(&self, fail: bool) {
        self.state.lock().await.fail_fetch = fail;
    }

    /// Makes the insert for `key` fail.
    pub async fn fail_insert(&self, key: GenerationKey) {
        self.state.lock().await.fail_inserts.insert(key);
    }

    /// Makes cursor updates for `rule_id` fail.
    pub async fn fail_cursor(&self, rule_id: impl Into<String>) {
        self.state.lock().await.fail_cursor.insert(rule_id.into());
    }

    /// Removes every injected fault.
    pub async fn clear_faults(&self) {
        let mut state = self.state.lock().await;
        state.fail_fetch = false;
        state.fail_inserts.clear();
        state.fail_cursor.clear();
        state.skip_exists_check = false;
    }

    /// Makes `exists` always answer `false`, as a concurrent run would see it just before another
    /// run's insert lands. The insert's uniqueness check is then the only protection.
    pub async fn skip_exists_check(&self, skip: bool) {
        self.state.lock().await.skip_exists_check = skip;
    }
}

impl State {
    fn has_rule_entry(&self, rule_id: &str, period: Period) -> bool {
        self.entries.iter().any(|e| match &e.entry.source {
            EntrySource::Rule { rule_id: id } => id == rule_id && e.entry.billing_month == period,
            EntrySource::Retainer { .. } => false,
        })
    }

    fn has_instance(&self, version_id: &str, period: Period) -> bool {
        self.instances
            .iter()
            .any(|i| i.version_id == version_id && i.month == period)
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn active_rules(&self) -> Res<Vec<RecurringRule>> {
        let state = self.state.lock().await;
        if state.fail_fetch {
            bail!("Simulated failure reading rules");
        }
        Ok(state
            .rules
            .values()
            .filter(|r| r.is_active())
            .cloned()
            .collect())
    }

    async fn active_contracts(&self) -> Res<Vec<Contract>> {
        let state = self.state.lock().await;
        if state.fail_fetch {
            bail!("Simulated failure reading contracts");
        }
        Ok(state
            .contracts
            .iter()
            .filter(|c| c.status == ContractStatus::Active)
            .cloned()
            .collect())
    }

    async fn contract_versions(&self, contract_id: &str) -> Res<Vec<ContractVersion>> {
        let state = self.state.lock().await;
        if state.fail_fetch {
            bail!("Simulated failure reading versions of {contract_id}");
        }
        let mut versions: Vec<ContractVersion> = state
            .versions
            .iter()
            .filter(|v| v.contract_id == contract_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.effective_start);
        Ok(versions)
    }

    async fn exists(&self, key: &GenerationKey) -> Res<bool> {
        let state = self.state.lock().await;
        if state.skip_exists_check {
            return Ok(false);
        }
        Ok(match key {
            GenerationKey::Rule { rule_id, period } => state.has_rule_entry(rule_id, *period),
            GenerationKey::Retainer { version_id, period } => {
                state.has_instance(version_id, *period)
            }
        })
    }

    async fn insert_rule_entry(&self, entry: &NewLedgerEntry) -> Res<InsertOutcome> {
        let rule_id = match &entry.source {
            EntrySource::Rule { rule_id } => rule_id.clone(),
            EntrySource::Retainer { .. } => bail!("A retainer milestone is not a rule entry"),
        };
        let mut state = self.state.lock().await;
        let key = GenerationKey::rule(rule_id.as_str(), entry.billing_month);
        if state.fail_inserts.contains(&key) {
            bail!("Simulated failure inserting {key}");
        }
        if state.has_rule_entry(&rule_id, entry.billing_month) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        state.entries.push(LedgerEntry {
            id: utils::generate_id(),
            entry: entry.clone(),
            expected_date: None,
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_retainer_instance(
        &self,
        instance: &NewMonthlyInstance,
        entries: &[NewLedgerEntry],
    ) -> Res<InsertOutcome> {
        let mut state = self.state.lock().await;
        let key = GenerationKey::retainer(instance.version_id.as_str(), instance.month);
        if state.fail_inserts.contains(&key) {
            bail!("Simulated failure inserting {key}");
        }
        if state.has_instance(&instance.version_id, instance.month) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        state.instances.push(instance.clone());
        for entry in entries {
            state.entries.push(LedgerEntry {
                id: utils::generate_id(),
                entry: entry.clone(),
                expected_date: None,
            });
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn advance_cursor(&self, rule_id: &str, period: Period) -> Res<()> {
        let mut state = self.state.lock().await;
        if state.fail_cursor.contains(rule_id) {
            bail!("Simulated failure updating the cursor of {rule_id}");
        }
        match state.rules.get_mut(rule_id) {
            Some(rule) => {
                if rule.last_generated_period.map_or(true, |c| c < period) {
                    rule.last_generated_period = Some(period);
                }
                Ok(())
            }
            None => bail!("Rule '{rule_id}' not found"),
        }
    }
}
