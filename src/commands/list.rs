use crate::args::{Entity, ListArgs};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::{Contract, ContractVersion, LedgerEntry, MonthlyInstance, RecurringRule};
use crate::{Config, Result};
use serde::Serialize;

/// The records printed by `cadence list`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Listing {
    Rules(Vec<RecurringRule>),
    Contracts(Vec<Contract>),
    Versions(Vec<ContractVersion>),
    Entries(Vec<LedgerEntry>),
    Instances(Vec<MonthlyInstance>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Listing::Rules(v) => v.len(),
            Listing::Contracts(v) => v.len(),
            Listing::Versions(v) => v.len(),
            Listing::Entries(v) => v.len(),
            Listing::Instances(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads the requested records from the database. `--month` applies to entries and instances.
pub async fn list(config: &Config, args: &ListArgs) -> Result<Out<Listing>> {
    let db = config.db();
    let listing = match args.entity() {
        Entity::Rules => db.list_rules().await.map(Listing::Rules),
        Entity::Contracts => db.list_contracts().await.map(Listing::Contracts),
        Entity::Versions => db.list_versions().await.map(Listing::Versions),
        Entity::Entries => db.list_entries(args.month()).await.map(Listing::Entries),
        Entity::Instances => db.list_instances(args.month()).await.map(Listing::Instances),
    }
    .pub_result(ErrorType::Database)?;
    let message = match args.month() {
        Some(month) => format!("Found {} {} for {month}", listing.len(), args.entity()),
        None => format!("Found {} {}", listing.len(), args.entity()),
    };
    Ok(Out::new(message, listing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::GenerateArgs;
    use crate::commands::generate;
    use crate::model::Period;
    use crate::test::TestEnv;
    use chrono::NaiveDate;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_list_entries_by_month() {
        let env = TestEnv::new().await;
        env.seed().await;
        let config = env.config();
        generate(
            &config,
            &GenerateArgs::new(NaiveDate::from_ymd_opt(2024, 2, 10), None),
        )
        .await
        .unwrap();

        let all = list(&config, &ListArgs::new(Entity::Entries, None))
            .await
            .unwrap();
        assert_eq!(all.structure().unwrap().len(), 9);

        let feb = Period::from_str("2024-02").unwrap();
        let out = list(&config, &ListArgs::new(Entity::Entries, Some(feb)))
            .await
            .unwrap();
        assert_eq!(out.message(), "Found 3 entries for 2024-02");

        let rules = list(&config, &ListArgs::new(Entity::Rules, None))
            .await
            .unwrap();
        assert_eq!(rules.structure().unwrap().len(), 1);
    }
}
