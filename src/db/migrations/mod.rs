//! Versioned schema changes.
//!
//! Each schema version `N` has a pair of files in this directory: `migration_NN_up.sql` takes the
//! schema from `N-1` to `N` and `migration_NN_down.sql` reverses it. The applied version lives in
//! the single-row `schema_version` table.

use crate::error::Res;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

/// The schema version this build of the crate expects.
pub(crate) const CURRENT_VERSION: i32 = 1;

struct Migration {
    version: i32,
    up_sql: &'static str,
    down_sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up_sql: include_str!("migration_01_up.sql"),
    down_sql: include_str!("migration_01_down.sql"),
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// One step of a migration plan: the SQL to execute and the version recorded afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    direction: Direction,
    migration_version: i32,
    resulting_version: i32,
}

/// Creates the `schema_version` table at version 0 if it does not exist yet.
pub(crate) async fn bootstrap(pool: &SqlitePool) -> Res<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .context("Unable to create the schema_version table")?;
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Unable to read the schema_version table")?;
    if row.0 == 0 {
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(pool)
            .await
            .context("Unable to initialize the schema version")?;
    }
    Ok(())
}

/// The schema version recorded in the database.
pub(crate) async fn current_version(pool: &SqlitePool) -> Res<i32> {
    let row: (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Unable to read the schema version")?;
    Ok(row.0.unwrap_or(0))
}

/// Moves the schema from `from` to `to`, one version at a time. Every step runs in its own
/// transaction together with the `schema_version` update, so an interrupted migration leaves the
/// database at the last completed version.
pub(crate) async fn run(pool: &SqlitePool, from: i32, to: i32) -> Res<()> {
    let steps = plan(from, to)?;
    if steps.is_empty() {
        debug!("Schema is at version {to}");
        return Ok(());
    }
    for step in steps {
        let Some(migration) = MIGRATIONS
            .iter()
            .find(|m| m.version == step.migration_version)
        else {
            bail!("Migration {} not found", step.migration_version);
        };
        let sql = match step.direction {
            Direction::Up => migration.up_sql,
            Direction::Down => migration.down_sql,
        };
        debug!(
            "Applying migration {:02} ({:?})",
            step.migration_version, step.direction
        );
        apply(pool, sql, step.resulting_version)
            .await
            .with_context(|| format!("Migration {:02} failed", step.migration_version))?;
    }
    debug!("Schema migrated from version {from} to {to}");
    Ok(())
}

/// Lists the steps from `from` to `to`, failing before anything runs if one is missing.
fn plan(from: i32, to: i32) -> Res<Vec<Step>> {
    let steps: Vec<Step> = if from <= to {
        ((from + 1)..=to)
            .map(|v| Step {
                direction: Direction::Up,
                migration_version: v,
                resulting_version: v,
            })
            .collect()
    } else {
        ((to + 1)..=from)
            .rev()
            .map(|v| Step {
                direction: Direction::Down,
                migration_version: v,
                resulting_version: v - 1,
            })
            .collect()
    };
    for step in &steps {
        if !MIGRATIONS
            .iter()
            .any(|m| m.version == step.migration_version)
        {
            bail!(
                "Cannot migrate the schema from version {from} to {to}: migration {} does not exist",
                step.migration_version
            );
        }
    }
    Ok(steps)
}

async fn apply(pool: &SqlitePool, sql: &str, resulting_version: i32) -> Res<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Unable to begin a migration transaction")?;
    tx.execute(sql).await.context("Unable to execute migration SQL")?;
    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(resulting_version)
        .execute(&mut *tx)
        .await
        .context("Unable to record the schema version")?;
    tx.commit()
        .await
        .context("Unable to commit a migration transaction")?;
    Ok(())
}
