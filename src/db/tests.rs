use super::*;
use crate::engine::Generator;
use crate::model::{
    ContractStatus, EntryKind, EntryStatus, InstanceStatus, MilestoneStep, RuleStatus,
};
use tempfile::TempDir;

fn d(s: &str) -> NaiveDate {
    NaiveDate::from_str(s).unwrap()
}

fn p(s: &str) -> Period {
    Period::from_str(s).unwrap()
}

async fn new_db() -> (TempDir, Db) {
    let dir = TempDir::new().unwrap();
    let db = Db::init(dir.path().join("cadence.sqlite")).await.unwrap();
    (dir, db)
}

fn rule(id: &str) -> RecurringRule {
    RecurringRule {
        id: id.to_string(),
        kind: EntryKind::Income,
        name: String::from("Hosting"),
        counterparty: String::from("Acme"),
        category: None,
        amount: Decimal::from(250),
        day_of_month: 31,
        status: RuleStatus::Active,
        start_date: d("2024-01-01"),
        end_date: None,
        last_generated_period: None,
    }
}

fn billing_data() -> BillingData {
    BillingData {
        rules: vec![rule("r1")],
        contracts: vec![Contract {
            id: String::from("c1"),
            name: String::from("Globex"),
            counterparty: String::from("Globex Corp"),
            status: ContractStatus::Active,
        }],
        versions: vec![ContractVersion {
            id: String::from("v1"),
            contract_id: String::from("c1"),
            monthly_amount: Decimal::from(10000),
            effective_start: d("2024-01-01"),
            effective_end: None,
            milestones: vec![
                MilestoneStep::fixed("Deposit", Decimal::from(3000), 0),
                MilestoneStep::remainder("Balance", 14),
            ],
        }],
    }
}

fn rule_entry(rule_id: &str, month: &str, due: &str) -> NewLedgerEntry {
    NewLedgerEntry {
        kind: EntryKind::Income,
        source: EntrySource::Rule {
            rule_id: rule_id.to_string(),
        },
        counterparty: String::from("Acme"),
        description: String::from("Hosting"),
        category: Some(String::from("Retainer")),
        amount: Decimal::from(250),
        due_date: d(due),
        billing_month: p(month),
        status: EntryStatus::Expected,
    }
}

#[tokio::test]
async fn test_init_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cadence.sqlite");
    assert!(Db::load(&path).await.is_err());
    let db = Db::init(&path).await.unwrap();
    db.import(&billing_data()).await.unwrap();
    drop(db);

    assert!(Db::init(&path).await.is_err());
    let db = Db::load(&path).await.unwrap();
    assert_eq!(db.list_rules().await.unwrap(), vec![rule("r1")]);
}

#[tokio::test]
async fn test_import_keeps_cursor_and_versions() {
    let (_dir, db) = new_db().await;
    let summary = db.import(&billing_data()).await.unwrap();
    assert_eq!(summary.rules, 1);
    assert_eq!(summary.versions_added, 1);
    db.advance_cursor("r1", p("2024-03")).await.unwrap();

    let mut edited = billing_data();
    edited.rules[0].amount = Decimal::from(300);
    edited.versions[0].monthly_amount = Decimal::from(1);
    let summary = db.import(&edited).await.unwrap();
    assert_eq!(summary.versions_unchanged, 1);

    let rules = db.list_rules().await.unwrap();
    assert_eq!(rules[0].amount, Decimal::from(300));
    assert_eq!(rules[0].last_generated_period, Some(p("2024-03")));
    let versions = db.list_versions().await.unwrap();
    assert_eq!(versions, billing_data().versions);
}

#[tokio::test]
async fn test_import_ignores_cursor_of_new_rule() {
    let (_dir, db) = new_db().await;
    let mut data = billing_data();
    data.rules[0].last_generated_period = Some(p("2030-01"));
    db.import(&data).await.unwrap();
    assert_eq!(db.list_rules().await.unwrap()[0].last_generated_period, None);

    let report = Generator::new(&db).run(d("2024-02-10")).await.unwrap();
    assert!(report.is_success());
    let rule_entries: Vec<Period> = db
        .list_entries(None)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| matches!(e.entry.source, EntrySource::Rule { .. }))
        .map(|e| e.entry.billing_month)
        .collect();
    assert_eq!(rule_entries, vec![p("2024-01"), p("2024-02"), p("2024-03")]);
    assert_eq!(
        db.list_rules().await.unwrap()[0].last_generated_period,
        Some(p("2024-03"))
    );
}

#[tokio::test]
async fn test_import_rejects_invalid_rule() {
    let (_dir, db) = new_db().await;
    let mut data = billing_data();
    data.rules[0].day_of_month = 0;
    assert!(db.import(&data).await.is_err());
    assert!(db.list_rules().await.unwrap().is_empty());
    assert!(db.list_contracts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rule_entry_uniqueness() {
    let (_dir, db) = new_db().await;
    db.import(&billing_data()).await.unwrap();
    let key = GenerationKey::rule("r1", p("2024-02"));
    assert!(!db.exists(&key).await.unwrap());

    let entry = rule_entry("r1", "2024-02", "2024-02-29");
    assert_eq!(
        db.insert_rule_entry(&entry).await.unwrap(),
        InsertOutcome::Inserted
    );
    assert!(db.exists(&key).await.unwrap());

    // A second writer with a different due date still collides on rule and month.
    let again = rule_entry("r1", "2024-02", "2024-02-28");
    assert_eq!(
        db.insert_rule_entry(&again).await.unwrap(),
        InsertOutcome::AlreadyExists
    );
    let entries = db.list_entries(Some(p("2024-02"))).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry, entry);
}

#[tokio::test]
async fn test_retainer_instance_is_all_or_nothing() {
    let (_dir, db) = new_db().await;
    db.import(&billing_data()).await.unwrap();
    let instance = NewMonthlyInstance {
        id: String::from("i1"),
        version_id: String::from("v1"),
        month: p("2024-01"),
        total_due: Decimal::from(10000),
        status: InstanceStatus::Generated,
    };
    let good = NewLedgerEntry {
        source: EntrySource::Retainer {
            instance_id: String::from("i1"),
            milestone: String::from("Deposit"),
        },
        ..rule_entry("r1", "2024-01", "2024-01-01")
    };
    // Refers to a rule that does not exist, so the foreign key rejects it.
    let bad = rule_entry("missing", "2024-01", "2024-01-15");

    assert!(db
        .insert_retainer_instance(&instance, &[good.clone(), bad])
        .await
        .is_err());
    assert!(db.list_instances(None).await.unwrap().is_empty());
    assert!(db.list_entries(None).await.unwrap().is_empty());

    assert_eq!(
        db.insert_retainer_instance(&instance, &[good.clone()])
            .await
            .unwrap(),
        InsertOutcome::Inserted
    );
    let other = NewMonthlyInstance {
        id: String::from("i2"),
        ..instance.clone()
    };
    assert_eq!(
        db.insert_retainer_instance(&other, &[good]).await.unwrap(),
        InsertOutcome::AlreadyExists
    );
    assert_eq!(db.list_instances(None).await.unwrap(), vec![instance]);
    assert_eq!(db.list_entries(None).await.unwrap().len(), 1);
    assert!(db
        .exists(&GenerationKey::retainer("v1", p("2024-01")))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_cursor_never_moves_back() {
    let (_dir, db) = new_db().await;
    db.import(&billing_data()).await.unwrap();
    db.advance_cursor("r1", p("2024-05")).await.unwrap();
    db.advance_cursor("r1", p("2024-02")).await.unwrap();
    let rules = db.active_rules().await.unwrap();
    assert_eq!(rules[0].last_generated_period, Some(p("2024-05")));
    assert!(db.advance_cursor("nope", p("2024-05")).await.is_err());
}

#[tokio::test]
async fn test_mark_overdue() {
    let (_dir, db) = new_db().await;
    db.import(&billing_data()).await.unwrap();
    db.insert_rule_entry(&rule_entry("r1", "2024-01", "2024-01-31"))
        .await
        .unwrap();
    db.insert_rule_entry(&rule_entry("r1", "2024-02", "2024-02-29"))
        .await
        .unwrap();

    // Eight days after January's due date, nine days before February's.
    assert_eq!(db.mark_overdue(d("2024-02-08"), 7).await.unwrap(), 1);
    assert_eq!(db.mark_overdue(d("2024-02-08"), 7).await.unwrap(), 0);
    let entries = db.list_entries(None).await.unwrap();
    assert_eq!(entries[0].entry.status, EntryStatus::Overdue);
    assert_eq!(entries[1].entry.status, EntryStatus::Expected);

    // Exactly seven days late is still within the grace period.
    assert_eq!(db.mark_overdue(d("2024-03-07"), 7).await.unwrap(), 0);
}

#[tokio::test]
async fn test_generation_against_sqlite() {
    let (_dir, db) = new_db().await;
    db.import(&billing_data()).await.unwrap();
    let generator = Generator::new(&db);

    let report = generator.run(d("2024-02-10")).await.unwrap();
    assert!(report.is_success());
    // Three months for the rule, three instances with two milestones each.
    assert_eq!(report.entries_created, 9);
    assert_eq!(report.instances_created, 3);

    let again = generator.run(d("2024-02-10")).await.unwrap();
    assert_eq!(again.entries_created, 0);
    assert_eq!(db.list_entries(None).await.unwrap().len(), 9);

    let feb = db.list_entries(Some(p("2024-02"))).await.unwrap();
    let got: Vec<(NaiveDate, Decimal)> = feb
        .iter()
        .map(|e| (e.entry.due_date, e.entry.amount))
        .collect();
    assert_eq!(
        got,
        vec![
            (d("2024-02-01"), Decimal::from(3000)),
            (d("2024-02-15"), Decimal::from(7000)),
            (d("2024-02-29"), Decimal::from(250)),
        ]
    );
    assert_eq!(
        db.active_rules().await.unwrap()[0].last_generated_period,
        Some(p("2024-03"))
    );
}

#[tokio::test]
async fn test_snooze_moves_overdue_threshold() {
    let (_dir, db) = new_db().await;
    db.import(&billing_data()).await.unwrap();
    db.insert_rule_entry(&rule_entry("r1", "2024-01", "2024-01-31"))
        .await
        .unwrap();
    assert_eq!(db.mark_overdue(d("2024-02-08"), 7).await.unwrap(), 1);
    let id = db.list_entries(None).await.unwrap()[0].id.clone();

    let snoozed = db.snooze(&id, d("2024-02-20")).await.unwrap();
    assert_eq!(snoozed.expected_date, Some(d("2024-02-20")));
    assert_eq!(snoozed.entry.status, EntryStatus::Expected);
    assert_eq!(snoozed.effective_date(), d("2024-02-20"));

    assert_eq!(db.mark_overdue(d("2024-02-27"), 7).await.unwrap(), 0);
    assert_eq!(db.mark_overdue(d("2024-02-28"), 7).await.unwrap(), 1);
    assert!(db.snooze("missing", d("2024-03-01")).await.is_err());
}
