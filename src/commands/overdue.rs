use crate::args::{MarkOverdueArgs, SnoozeArgs};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::LedgerEntry;
use crate::{Config, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;

/// The outcome of an overdue sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverdueSweep {
    pub as_of: NaiveDate,
    pub grace_days: u32,
    pub marked: u64,
}

/// Marks income entries that are more than `overdue_grace_days` past their effective date as
/// overdue. This is the only operation that changes the status of an existing entry.
pub async fn mark_overdue(config: &Config, args: &MarkOverdueArgs) -> Result<Out<OverdueSweep>> {
    let as_of = args.as_of().unwrap_or_else(|| Local::now().date_naive());
    let grace_days = config.overdue_grace_days();
    let marked = config
        .db()
        .mark_overdue(as_of, grace_days)
        .await
        .pub_result(ErrorType::Database)?;
    Ok(Out::new(
        format!("Marked {marked} entries as overdue as of {as_of}"),
        OverdueSweep {
            as_of,
            grace_days,
            marked,
        },
    ))
}

/// Sets a later expected date on an income entry. The overdue sweep measures lateness from that
/// date instead of the due date.
pub async fn snooze(config: &Config, args: &SnoozeArgs) -> Result<Out<LedgerEntry>> {
    let entry = config
        .db()
        .snooze(args.entry_id(), args.until())
        .await
        .pub_result(ErrorType::Database)?;
    Ok(Out::new(
        format!(
            "Entry '{}' ({}) is now expected on {}",
            entry.id,
            entry.entry.description,
            entry.effective_date()
        ),
        entry,
    ))
}
