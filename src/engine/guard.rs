//! The idempotency guard: "has this key already been generated?"
//!
//! The check is an optimization that avoids building records which would be rejected anyway.
//! Under concurrent runs the store's uniqueness constraint is what actually prevents duplicates,
//! which is why the inserts report `InsertOutcome::AlreadyExists` rather than failing.

use crate::error::Res;
use crate::store::{GenerationKey, Store};
use anyhow::Context;
use tracing::debug;

/// Returns true if the store already holds a record for `key`.
pub async fn already_generated(store: &dyn Store, key: &GenerationKey) -> Res<bool> {
    let found = store
        .exists(key)
        .await
        .with_context(|| format!("Unable to check for an existing record for {key}"))?;
    if found {
        debug!("Already generated: {key}");
    }
    Ok(found)
}
