//! The generation engine: turns recurring rules and retainer contracts into dated ledger entries,
//! exactly once per billing month.
//!
//! A run is a sequential batch over every active rule and contract:
//!
//! - Each rule walks its `RuleSchedule` from its cursor (or start) to the end of the `Horizon`.
//!   For every month it checks the idempotency guard, writes the entry if needed, then persists
//!   the cursor before moving on. Any write failure stops that rule for the rest of the run, so
//!   the cursor never points past a month that was not durably generated.
//! - Each contract walks every month from its earliest version through the horizon, selects the
//!   version in force, and writes a monthly instance plus its milestone entries in one operation.
//!
//! Failing to read rules, contracts or versions aborts the whole run before anything is written.

pub mod due_date;
pub mod guard;
mod horizon;
pub mod milestones;
mod report;
pub mod schedule;
pub mod versions;

pub use horizon::{Horizon, DEFAULT_HORIZON_MONTHS, MAX_HORIZON_MONTHS};
pub use report::{GenerationFailure, GenerationReport, Generated, Subject};

use crate::error::Res;
use crate::model::{
    Contract, ContractVersion, EntryKind, EntrySource, EntryStatus, InstanceStatus,
    NewLedgerEntry, NewMonthlyInstance, Period, RecurringRule,
};
use crate::store::{GenerationKey, InsertOutcome, Store};
use crate::utils;
use anyhow::Context;
use chrono::NaiveDate;
use schedule::{Candidate, RuleSchedule, Stop};
use tracing::{debug, info, trace, warn};

const RETAINER_CATEGORY: &str = "Retainer";

/// What happened for one month of one rule or contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeriodOutcome {
    /// New records were written; holds the number of ledger entries.
    Created(usize),
    /// A record for the natural key was already there.
    AlreadyPresent,
}

/// Drives a generation run against a `Store`.
pub struct Generator<'a> {
    store: &'a dyn Store,
    horizon_months: u32,
}

impl<'a> Generator<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            horizon_months: DEFAULT_HORIZON_MONTHS,
        }
    }

    /// Sets how many months, starting with the month of `as_of`, may be generated.
    pub fn with_horizon_months(mut self, months: u32) -> Self {
        self.horizon_months = months;
        self
    }

    /// Runs generation for every active rule and contract as of the date `as_of`.
    ///
    /// # Errors
    /// - Returns an error if rules, contracts or versions cannot be read. Nothing has been written
    ///   at that point.
    ///
    /// Write failures are not errors of the run; they are listed in the report.
    pub async fn run(&self, as_of: NaiveDate) -> Res<GenerationReport> {
        let horizon = Horizon::new(as_of, self.horizon_months);
        let rules = self
            .store
            .active_rules()
            .await
            .context("Unable to read active rules")?;
        let contracts = self
            .store
            .active_contracts()
            .await
            .context("Unable to read active contracts")?;
        let mut retainers = Vec::with_capacity(contracts.len());
        for contract in contracts {
            let versions = self
                .store
                .contract_versions(&contract.id)
                .await
                .with_context(|| format!("Unable to read versions of contract '{}'", contract.id))?;
            retainers.push((contract, versions));
        }

        info!(
            "Generating as of {as_of} through {}: {} rules, {} contracts",
            horizon.last(),
            rules.len(),
            retainers.len()
        );

        let mut report = GenerationReport::new(as_of, horizon);
        for rule in &rules {
            self.run_rule(rule, horizon, &mut report).await;
        }
        for (contract, versions) in &retainers {
            self.run_contract(contract, versions, horizon, &mut report)
                .await;
        }

        info!("{}", report.summary());
        Ok(report)
    }

    async fn run_rule(&self, rule: &RecurringRule, horizon: Horizon, report: &mut GenerationReport) {
        trace!("{rule:?}");
        report.rules_scanned += 1;
        let mut schedule = RuleSchedule::for_rule(rule, horizon);
        for candidate in schedule.by_ref() {
            match self.generate_rule_period(rule, candidate).await {
                Ok(PeriodOutcome::Created(n)) => {
                    debug!("Rule '{}': generated {}", rule.id, candidate.period);
                    report.record_generated(Subject::Rule(rule.id.clone()), candidate.period, n);
                }
                Ok(PeriodOutcome::AlreadyPresent) => report.already_present += 1,
                Err(e) => {
                    warn!(
                        "Rule '{}': stopping at {} for this run: {e:#}",
                        rule.id, candidate.period
                    );
                    report.record_failure(Subject::Rule(rule.id.clone()), candidate.period, &e);
                    return;
                }
            }
        }
        if schedule.stop() == Some(Stop::EndDate) {
            debug!("Rule '{}' has reached its end date", rule.id);
            report.rules_ended += 1;
        }
    }

    /// Generates one month of a rule and then moves its cursor to that month. The cursor is also
    /// moved when the entry already existed, so later runs do not re-check settled months.
    async fn generate_rule_period(
        &self,
        rule: &RecurringRule,
        candidate: Candidate,
    ) -> Res<PeriodOutcome> {
        let key = GenerationKey::rule(rule.id.as_str(), candidate.period);
        let outcome = if guard::already_generated(self.store, &key).await? {
            PeriodOutcome::AlreadyPresent
        } else {
            let entry = rule_entry(rule, candidate);
            match self
                .store
                .insert_rule_entry(&entry)
                .await
                .with_context(|| format!("Unable to write the entry for {key}"))?
            {
                InsertOutcome::Inserted => PeriodOutcome::Created(1),
                InsertOutcome::AlreadyExists => PeriodOutcome::AlreadyPresent,
            }
        };
        self.store
            .advance_cursor(&rule.id, candidate.period)
            .await
            .with_context(|| format!("Unable to advance the cursor of rule '{}'", rule.id))?;
        Ok(outcome)
    }

    async fn run_contract(
        &self,
        contract: &Contract,
        versions: &[ContractVersion],
        horizon: Horizon,
        report: &mut GenerationReport,
    ) {
        trace!("{contract:?}");
        report.contracts_scanned += 1;
        let Some(first) = versions.iter().map(ContractVersion::start_period).min() else {
            debug!("Contract '{}' has no versions", contract.id);
            return;
        };
        for period in schedule::months_through(first, horizon) {
            let Some(version) = versions::select(versions, period) else {
                debug!("Contract '{}': no version applies to {period}", contract.id);
                report.months_without_version += 1;
                continue;
            };
            match self.generate_retainer_period(contract, version, period).await {
                Ok(PeriodOutcome::Created(n)) => {
                    debug!(
                        "Contract '{}': generated {period} from version '{}' with {n} milestones",
                        contract.id, version.id
                    );
                    report.instances_created += 1;
                    report.record_generated(Subject::Contract(contract.id.clone()), period, n);
                }
                Ok(PeriodOutcome::AlreadyPresent) => report.already_present += 1,
                Err(e) => {
                    warn!(
                        "Contract '{}': stopping at {period} for this run: {e:#}",
                        contract.id
                    );
                    report.record_failure(Subject::Contract(contract.id.clone()), period, &e);
                    return;
                }
            }
        }
    }

    async fn generate_retainer_period(
        &self,
        contract: &Contract,
        version: &ContractVersion,
        period: Period,
    ) -> Res<PeriodOutcome> {
        let key = GenerationKey::retainer(version.id.as_str(), period);
        if guard::already_generated(self.store, &key).await? {
            return Ok(PeriodOutcome::AlreadyPresent);
        }
        let instance = NewMonthlyInstance {
            id: utils::generate_id(),
            version_id: version.id.clone(),
            month: period,
            total_due: version.monthly_amount,
            status: InstanceStatus::Generated,
        };
        let entries = retainer_entries(contract, version, &instance);
        let outcome = self
            .store
            .insert_retainer_instance(&instance, &entries)
            .await
            .with_context(|| format!("Unable to write the monthly instance for {key}"))?;
        Ok(match outcome {
            InsertOutcome::Inserted => PeriodOutcome::Created(entries.len()),
            InsertOutcome::AlreadyExists => PeriodOutcome::AlreadyPresent,
        })
    }
}

fn rule_entry(rule: &RecurringRule, candidate: Candidate) -> NewLedgerEntry {
    NewLedgerEntry {
        kind: rule.kind,
        source: EntrySource::Rule {
            rule_id: rule.id.clone(),
        },
        counterparty: rule.counterparty.clone(),
        description: rule.entry_description(),
        category: rule.entry_category(),
        amount: rule.amount,
        due_date: candidate.due_date,
        billing_month: candidate.period,
        status: EntryStatus::generated(rule.kind),
    }
}

fn retainer_entries(
    contract: &Contract,
    version: &ContractVersion,
    instance: &NewMonthlyInstance,
) -> Vec<NewLedgerEntry> {
    milestones::apportion(version.monthly_amount, &version.milestones, instance.month)
        .into_iter()
        .map(|m| NewLedgerEntry {
            kind: EntryKind::Income,
            source: EntrySource::Retainer {
                instance_id: instance.id.clone(),
                milestone: m.name.clone(),
            },
            counterparty: contract.counterparty.clone(),
            description: format!("{} - {}", contract.name, m.name),
            category: Some(String::from(RETAINER_CATEGORY)),
            amount: m.amount,
            due_date: m.due_date,
            billing_month: instance.month,
            status: EntryStatus::Expected,
        })
        .collect()
}

#[cfg(test)]
mod tests;
