//! Picks the contract version whose effective range covers a month.

use crate::model::{ContractVersion, Period};

/// Returns the version that applies to `period`, or `None` if no version covers it.
///
/// Ranges are compared by month. If more than one version covers the month, the one with the
/// latest `effective_start` wins; among equal starts, the one listed last wins. The input is
/// expected in ascending start order but the result does not depend on it.
pub fn select(versions: &[ContractVersion], period: Period) -> Option<&ContractVersion> {
    versions
        .iter()
        .enumerate()
        .filter(|(_, v)| v.covers(period))
        .max_by_key(|(ix, v)| (v.effective_start, *ix))
        .map(|(_, v)| v)
}
