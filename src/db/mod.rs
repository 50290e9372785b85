//! This module is responsible for reading, writing and managing the SQLite database.
//!
//! All amounts are stored as decimal strings, dates as `YYYY-MM-DD` and billing months as the
//! first day of the month, so that string comparison in SQL orders them correctly.

mod migrations;

use crate::error::Res;
use crate::model::{
    BillingData, Contract, ContractVersion, EntrySource, LedgerEntry, MilestoneStep,
    MonthlyInstance, NewLedgerEntry, NewMonthlyInstance, Period, RecurringRule,
};
use crate::store::{GenerationKey, InsertOutcome, Store};
use crate::utils;
use anyhow::{bail, ensure, Context};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A handle to the SQLite database. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// What an import changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rules: usize,
    pub contracts: usize,
    pub versions_added: usize,
    /// Versions whose id was already stored. Versions are never modified once written.
    pub versions_unchanged: usize,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        ensure!(
            !path.exists(),
            "A database already exists at {}",
            path.display()
        );
        let db = Self::connect(path, true).await?;
        db.migrate().await?;
        info!("Created database at {}", path.display());
        Ok(db)
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Updates the database schema with migrations if it is out-of-date
    pub(crate) async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        ensure!(
            path.is_file(),
            "No database found at {}, run 'cadence init' first",
            path.display()
        );
        let db = Self::connect(path, false).await?;
        db.migrate().await?;
        Ok(db)
    }

    async fn connect(path: &Path, create: bool) -> Res<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Unable to open the database at {}", path.display()))?;
        Ok(Self { pool })
    }

    async fn migrate(&self) -> Res<()> {
        migrations::bootstrap(&self.pool).await?;
        let current = migrations::current_version(&self.pool).await?;
        ensure!(
            current <= migrations::CURRENT_VERSION,
            "The database schema is at version {current}, which is newer than this program \
            supports ({})",
            migrations::CURRENT_VERSION
        );
        migrations::run(&self.pool, current, migrations::CURRENT_VERSION).await
    }

    /// Writes the rules, contracts and versions of `data` in one transaction.
    ///
    /// Rules and contracts are inserted or updated by id. An existing rule keeps its cursor, so
    /// editing a rule only changes what is generated from now on. A cursor in `data` is ignored. Versions are append-only: a
    /// version id that already exists is left untouched.
    pub async fn import(&self, data: &BillingData) -> Res<ImportSummary> {
        data.validate()?;
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to begin the import transaction")?;
        let mut summary = ImportSummary::default();
        for rule in &data.rules {
            upsert_rule(&mut tx, rule).await?;
            summary.rules += 1;
        }
        for contract in &data.contracts {
            upsert_contract(&mut tx, contract).await?;
            summary.contracts += 1;
        }
        for version in &data.versions {
            match insert_version(&mut tx, version).await? {
                InsertOutcome::Inserted => summary.versions_added += 1,
                InsertOutcome::AlreadyExists => {
                    debug!("Version '{}' already exists, leaving it as is", version.id);
                    summary.versions_unchanged += 1
                }
            }
        }
        tx.commit()
            .await
            .context("Unable to commit the import transaction")?;
        Ok(summary)
    }

    pub async fn list_rules(&self) -> Res<Vec<RecurringRule>> {
        let rows = sqlx::query("SELECT * FROM recurring_rules ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Unable to query rules")?;
        rows.iter().map(rule_from_row).collect()
    }

    pub async fn list_contracts(&self) -> Res<Vec<Contract>> {
        let rows = sqlx::query("SELECT * FROM contracts ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Unable to query contracts")?;
        rows.iter().map(contract_from_row).collect()
    }

    pub async fn list_versions(&self) -> Res<Vec<ContractVersion>> {
        let rows =
            sqlx::query("SELECT * FROM contract_versions ORDER BY contract_id, effective_start, id")
                .fetch_all(&self.pool)
                .await
                .context("Unable to query contract versions")?;
        rows.iter().map(version_from_row).collect()
    }

    /// Ledger entries ordered by due date, optionally limited to one billing month.
    pub async fn list_entries(&self, month: Option<Period>) -> Res<Vec<LedgerEntry>> {
        let rows = match month {
            Some(month) => {
                sqlx::query(
                    "SELECT * FROM ledger_entries WHERE billing_month = ? \
                     ORDER BY due_date, description, id",
                )
                .bind(month.to_date_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM ledger_entries ORDER BY due_date, description, id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Unable to query ledger entries")?;
        rows.iter().map(entry_from_row).collect()
    }

    pub async fn list_instances(&self, month: Option<Period>) -> Res<Vec<MonthlyInstance>> {
        let rows = match month {
            Some(month) => {
                sqlx::query(
                    "SELECT * FROM monthly_instances WHERE month = ? \
                     ORDER BY month, contract_version_id",
                )
                .bind(month.to_date_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM monthly_instances ORDER BY month, contract_version_id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Unable to query monthly instances")?;
        rows.iter().map(instance_from_row).collect()
    }

    /// Marks income entries as overdue when their effective date (the snoozed `expected_date`,
    /// otherwise the due date) is more than `grace_days` before `as_of`. Received and already
    /// overdue entries are not touched. Returns the number of entries changed.
    pub async fn mark_overdue(&self, as_of: NaiveDate, grace_days: u32) -> Res<u64> {
        let Some(threshold) = as_of.checked_sub_days(Days::new(u64::from(grace_days))) else {
            bail!("Cannot subtract {grace_days} days from {as_of}");
        };
        let result = sqlx::query(
            "UPDATE ledger_entries SET status = 'overdue' \
             WHERE kind = 'income' \
               AND status NOT IN ('received', 'overdue') \
               AND COALESCE(expected_date, due_date) < ?",
        )
        .bind(format_date(threshold))
        .execute(&self.pool)
        .await
        .context("Unable to mark overdue entries")?;
        Ok(result.rows_affected())
    }

    /// Sets the date an income entry is now expected, which pushes back when it becomes overdue.
    /// An overdue entry goes back to `expected` until the next sweep. Returns the updated entry.
    pub async fn snooze(&self, entry_id: &str, expected: NaiveDate) -> Res<LedgerEntry> {
        let result = sqlx::query(
            "UPDATE ledger_entries SET expected_date = ?, \
               status = CASE WHEN status = 'overdue' THEN 'expected' ELSE status END \
             WHERE id = ? AND kind = 'income' AND status != 'received'",
        )
        .bind(format_date(expected))
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Unable to snooze entry '{entry_id}'"))?;
        ensure!(
            result.rows_affected() > 0,
            "No unreceived income entry with id '{entry_id}'"
        );
        let row = sqlx::query("SELECT * FROM ledger_entries WHERE id = ?")
            .bind(entry_id)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Unable to read entry '{entry_id}'"))?;
        entry_from_row(&row)
    }
}

#[async_trait::async_trait]
impl Store for Db {
    async fn active_rules(&self) -> Res<Vec<RecurringRule>> {
        let rows = sqlx::query("SELECT * FROM recurring_rules WHERE status = 'active' ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Unable to query active rules")?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn active_contracts(&self) -> Res<Vec<Contract>> {
        let rows = sqlx::query("SELECT * FROM contracts WHERE status = 'active' ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Unable to query active contracts")?;
        rows.iter().map(contract_from_row).collect()
    }

    async fn contract_versions(&self, contract_id: &str) -> Res<Vec<ContractVersion>> {
        let rows = sqlx::query(
            "SELECT * FROM contract_versions WHERE contract_id = ? ORDER BY effective_start, id",
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Unable to query versions of contract '{contract_id}'"))?;
        rows.iter().map(version_from_row).collect()
    }

    async fn exists(&self, key: &GenerationKey) -> Res<bool> {
        let query = match key {
            GenerationKey::Rule { rule_id, period } => sqlx::query_scalar::<_, i64>(
                "SELECT EXISTS (SELECT 1 FROM ledger_entries \
                 WHERE rule_id = ? AND billing_month = ?)",
            )
            .bind(rule_id)
            .bind(period.to_date_string()),
            GenerationKey::Retainer { version_id, period } => sqlx::query_scalar::<_, i64>(
                "SELECT EXISTS (SELECT 1 FROM monthly_instances \
                 WHERE contract_version_id = ? AND month = ?)",
            )
            .bind(version_id)
            .bind(period.to_date_string()),
        };
        let found = query
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Unable to look up {key}"))?;
        Ok(found != 0)
    }

    async fn insert_rule_entry(&self, entry: &NewLedgerEntry) -> Res<InsertOutcome> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Unable to acquire a database connection")?;
        let inserted = insert_entry(&mut conn, entry).await?;
        Ok(if inserted {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn insert_retainer_instance(
        &self,
        instance: &NewMonthlyInstance,
        entries: &[NewLedgerEntry],
    ) -> Res<InsertOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to begin a transaction")?;
        let result = sqlx::query(
            "INSERT INTO monthly_instances (id, contract_version_id, month, total_due, status) \
             VALUES (?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(&instance.id)
        .bind(&instance.version_id)
        .bind(instance.month.to_date_string())
        .bind(instance.total_due.to_string())
        .bind(instance.status.to_string())
        .execute(&mut *tx)
        .await
        .context("Unable to insert the monthly instance")?;
        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back; nothing was written.
            return Ok(InsertOutcome::AlreadyExists);
        }
        for entry in entries {
            insert_entry(&mut tx, entry).await?;
        }
        tx.commit()
            .await
            .context("Unable to commit the monthly instance")?;
        Ok(InsertOutcome::Inserted)
    }

    async fn advance_cursor(&self, rule_id: &str, period: Period) -> Res<()> {
        let period = period.to_date_string();
        let result = sqlx::query(
            "UPDATE recurring_rules SET last_generated_period = ? \
             WHERE id = ? AND (last_generated_period IS NULL OR last_generated_period < ?)",
        )
        .bind(&period)
        .bind(rule_id)
        .bind(&period)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Unable to update the cursor of rule '{rule_id}'"))?;
        if result.rows_affected() == 0 {
            let found: i64 =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM recurring_rules WHERE id = ?)")
                    .bind(rule_id)
                    .fetch_one(&self.pool)
                    .await
                    .with_context(|| format!("Unable to look up rule '{rule_id}'"))?;
            ensure!(found != 0, "Rule '{rule_id}' not found");
        }
        Ok(())
    }
}

/// Inserts one ledger entry, returning false if the rule/month key was already taken.
async fn insert_entry(conn: &mut SqliteConnection, entry: &NewLedgerEntry) -> Res<bool> {
    let (rule_id, instance_id, milestone) = match &entry.source {
        EntrySource::Rule { rule_id } => (Some(rule_id.as_str()), None, None),
        EntrySource::Retainer {
            instance_id,
            milestone,
        } => (None, Some(instance_id.as_str()), Some(milestone.as_str())),
    };
    let result = sqlx::query(
        "INSERT INTO ledger_entries (id, kind, rule_id, monthly_instance_id, milestone, \
         counterparty, description, category, amount, due_date, billing_month, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
    )
    .bind(utils::generate_id())
    .bind(entry.kind.to_string())
    .bind(rule_id)
    .bind(instance_id)
    .bind(milestone)
    .bind(&entry.counterparty)
    .bind(&entry.description)
    .bind(entry.category.as_deref())
    .bind(entry.amount.to_string())
    .bind(format_date(entry.due_date))
    .bind(entry.billing_month.to_date_string())
    .bind(entry.status.to_string())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Unable to insert the ledger entry '{}'", entry.description))?;
    Ok(result.rows_affected() > 0)
}

/// Only the engine moves a cursor, so a new rule always starts with none, whatever the file says.
async fn upsert_rule(conn: &mut SqliteConnection, rule: &RecurringRule) -> Res<()> {
    if let Some(cursor) = rule.last_generated_period {
        debug!("Ignoring the imported cursor {cursor} of rule '{}'", rule.id);
    }
    sqlx::query(
        "INSERT INTO recurring_rules (id, kind, name, counterparty, category, amount, \
         day_of_month, status, start_date, end_date, last_generated_period) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL) \
         ON CONFLICT (id) DO UPDATE SET \
           kind = excluded.kind, name = excluded.name, counterparty = excluded.counterparty, \
           category = excluded.category, amount = excluded.amount, \
           day_of_month = excluded.day_of_month, status = excluded.status, \
           start_date = excluded.start_date, end_date = excluded.end_date",
    )
    .bind(&rule.id)
    .bind(rule.kind.to_string())
    .bind(&rule.name)
    .bind(&rule.counterparty)
    .bind(rule.category.as_deref())
    .bind(rule.amount.to_string())
    .bind(i64::from(rule.day_of_month))
    .bind(rule.status.to_string())
    .bind(format_date(rule.start_date))
    .bind(rule.end_date.map(format_date))
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Unable to save rule '{}'", rule.id))?;
    Ok(())
}

async fn upsert_contract(conn: &mut SqliteConnection, contract: &Contract) -> Res<()> {
    sqlx::query(
        "INSERT INTO contracts (id, name, counterparty, status) VALUES (?, ?, ?, ?) \
         ON CONFLICT (id) DO UPDATE SET \
           name = excluded.name, counterparty = excluded.counterparty, status = excluded.status",
    )
    .bind(&contract.id)
    .bind(&contract.name)
    .bind(&contract.counterparty)
    .bind(contract.status.to_string())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Unable to save contract '{}'", contract.id))?;
    Ok(())
}

async fn insert_version(
    conn: &mut SqliteConnection,
    version: &ContractVersion,
) -> Res<InsertOutcome> {
    let milestones = serde_json::to_string(&version.milestones)
        .context("Unable to serialize milestone steps")?;
    let result = sqlx::query(
        "INSERT INTO contract_versions (id, contract_id, monthly_amount, effective_start, \
         effective_end, milestones) VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT (id) DO NOTHING",
    )
    .bind(&version.id)
    .bind(&version.contract_id)
    .bind(version.monthly_amount.to_string())
    .bind(format_date(version.effective_start))
    .bind(version.effective_end.map(format_date))
    .bind(milestones)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Unable to save contract version '{}'", version.id))?;
    Ok(if result.rows_affected() > 0 {
        InsertOutcome::Inserted
    } else {
        InsertOutcome::AlreadyExists
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn text(row: &SqliteRow, column: &str) -> Res<String> {
    row.try_get(column)
        .with_context(|| format!("Unable to read column '{column}'"))
}

fn optional_text(row: &SqliteRow, column: &str) -> Res<Option<String>> {
    row.try_get(column)
        .with_context(|| format!("Unable to read column '{column}'"))
}

fn parse<T>(row: &SqliteRow, column: &str) -> Res<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = text(row, column)?;
    value
        .parse()
        .with_context(|| format!("Invalid value '{value}' in column '{column}'"))
}

fn decimal(row: &SqliteRow, column: &str) -> Res<Decimal> {
    parse(row, column)
}

fn date(row: &SqliteRow, column: &str) -> Res<NaiveDate> {
    let value = text(row, column)?;
    NaiveDate::parse_from_str(&value, DATE_FORMAT)
        .with_context(|| format!("Invalid date '{value}' in column '{column}'"))
}

fn optional_date(row: &SqliteRow, column: &str) -> Res<Option<NaiveDate>> {
    optional_text(row, column)?
        .map(|value| {
            NaiveDate::parse_from_str(&value, DATE_FORMAT)
                .with_context(|| format!("Invalid date '{value}' in column '{column}'"))
        })
        .transpose()
}

fn period(row: &SqliteRow, column: &str) -> Res<Period> {
    let value = text(row, column)?;
    Period::from_str(&value).with_context(|| format!("Invalid month in column '{column}'"))
}

fn optional_period(row: &SqliteRow, column: &str) -> Res<Option<Period>> {
    optional_text(row, column)?
        .map(|value| {
            Period::from_str(&value).with_context(|| format!("Invalid month in column '{column}'"))
        })
        .transpose()
}

fn rule_from_row(row: &SqliteRow) -> Res<RecurringRule> {
    let day: i64 = row.try_get("day_of_month").context("Unable to read day_of_month")?;
    Ok(RecurringRule {
        id: text(row, "id")?,
        kind: parse(row, "kind")?,
        name: text(row, "name")?,
        counterparty: text(row, "counterparty")?,
        category: optional_text(row, "category")?,
        amount: decimal(row, "amount")?,
        day_of_month: u32::try_from(day).with_context(|| format!("Invalid day of month {day}"))?,
        status: parse(row, "status")?,
        start_date: date(row, "start_date")?,
        end_date: optional_date(row, "end_date")?,
        last_generated_period: optional_period(row, "last_generated_period")?,
    })
}

fn contract_from_row(row: &SqliteRow) -> Res<Contract> {
    Ok(Contract {
        id: text(row, "id")?,
        name: text(row, "name")?,
        counterparty: text(row, "counterparty")?,
        status: parse(row, "status")?,
    })
}

fn version_from_row(row: &SqliteRow) -> Res<ContractVersion> {
    let milestones = text(row, "milestones")?;
    let milestones: Vec<MilestoneStep> = serde_json::from_str(&milestones)
        .context("Unable to parse the milestone steps of a contract version")?;
    Ok(ContractVersion {
        id: text(row, "id")?,
        contract_id: text(row, "contract_id")?,
        monthly_amount: decimal(row, "monthly_amount")?,
        effective_start: date(row, "effective_start")?,
        effective_end: optional_date(row, "effective_end")?,
        milestones,
    })
}

fn entry_from_row(row: &SqliteRow) -> Res<LedgerEntry> {
    let source = match optional_text(row, "rule_id")? {
        Some(rule_id) => EntrySource::Rule { rule_id },
        None => EntrySource::Retainer {
            instance_id: text(row, "monthly_instance_id")?,
            milestone: optional_text(row, "milestone")?.unwrap_or_default(),
        },
    };
    Ok(LedgerEntry {
        id: text(row, "id")?,
        entry: NewLedgerEntry {
            kind: parse(row, "kind")?,
            source,
            counterparty: text(row, "counterparty")?,
            description: text(row, "description")?,
            category: optional_text(row, "category")?,
            amount: decimal(row, "amount")?,
            due_date: date(row, "due_date")?,
            billing_month: period(row, "billing_month")?,
            status: parse(row, "status")?,
        },
        expected_date: optional_date(row, "expected_date")?,
    })
}

fn instance_from_row(row: &SqliteRow) -> Res<MonthlyInstance> {
    Ok(MonthlyInstance {
        id: text(row, "id")?,
        version_id: text(row, "contract_version_id")?,
        month: period(row, "month")?,
        total_due: decimal(row, "total_due")?,
        status: parse(row, "status")?,
    })
}

#[cfg(test)]
mod tests;
