use crate::commands::Out;
use crate::db::ImportSummary;
use crate::error::{ErrorType, IntoResult};
use crate::model::BillingData;
use crate::{utils, Config, Result};
use anyhow::Context;
use std::path::Path;
use tracing::debug;

/// Reads rules, contracts and contract versions from the JSON file at `path` and stores them.
///
/// # Errors
/// - Returns an `ErrorType::Validation` error if the file cannot be parsed or holds invalid data.
/// - Returns an `ErrorType::Database` error if the records cannot be written.
pub async fn import(config: &Config, path: &Path) -> Result<Out<ImportSummary>> {
    let data: BillingData = utils::deserialize(path)
        .await
        .pub_result(ErrorType::Validation)?;
    data.validate()
        .with_context(|| format!("Invalid data in {}", path.display()))
        .pub_result(ErrorType::Validation)?;
    debug!(
        "Importing {} rules, {} contracts and {} versions",
        data.rules.len(),
        data.contracts.len(),
        data.versions.len()
    );
    let summary = config
        .db()
        .import(&data)
        .await
        .pub_result(ErrorType::Database)?;
    Ok(Out::new(
        format!(
            "Imported {} rules, {} contracts and {} new contract versions",
            summary.rules, summary.contracts, summary.versions_added
        ),
        summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_import_file() {
        let env = TestEnv::new().await;
        let path = env.write_file(
            "billing.json",
            r#"{
                "rules": [{
                    "id": "rent",
                    "kind": "expense",
                    "name": "Office rent",
                    "amount": "1200.00",
                    "day_of_month": 1,
                    "start_date": "2024-01-01"
                }],
                "contracts": [{"id": "c1", "name": "Globex", "counterparty": "Globex Corp"}],
                "versions": [{
                    "id": "v1",
                    "contract_id": "c1",
                    "monthly_amount": "5000",
                    "effective_start": "2024-01-01",
                    "milestones": [{"name": "Balance", "kind": "remainder", "day_offset": 0}]
                }]
            }"#,
        );
        let out = import(&env.config(), &path).await.unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.rules, 1);
        assert_eq!(summary.contracts, 1);
        assert_eq!(summary.versions_added, 1);
        assert_eq!(env.config().db().list_rules().await.unwrap()[0].id, "rent");
    }

    #[tokio::test]
    async fn test_import_invalid_file() {
        let env = TestEnv::new().await;
        let bad_json = env.write_file("bad.json", "{ not json");
        let err = import(&env.config(), &bad_json).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);

        let bad_day = env.write_file(
            "bad_day.json",
            r#"{"rules": [{"id": "r", "name": "x", "amount": "1", "day_of_month": 32,
                "start_date": "2024-01-01"}]}"#,
        );
        let err = import(&env.config(), &bad_day).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
    }
}
