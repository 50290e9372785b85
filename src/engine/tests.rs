use super::*;
use crate::model::{ContractStatus, LedgerEntry, MilestoneStep, RuleStatus};
use crate::store::MemoryStore;
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> NaiveDate {
    NaiveDate::from_str(s).unwrap()
}

fn p(s: &str) -> Period {
    Period::from_str(s).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn rule(id: &str, start: &str, day: u32) -> RecurringRule {
    RecurringRule {
        id: id.to_string(),
        kind: EntryKind::Income,
        name: format!("{id} retainer"),
        counterparty: String::from("Acme"),
        category: None,
        amount: dec("1500"),
        day_of_month: day,
        status: RuleStatus::Active,
        start_date: d(start),
        end_date: None,
        last_generated_period: None,
    }
}

fn contract(id: &str) -> Contract {
    Contract {
        id: id.to_string(),
        name: String::from("Globex"),
        counterparty: String::from("Globex Corp"),
        status: ContractStatus::Active,
    }
}

fn version(id: &str, start: &str, end: Option<&str>, amount: &str) -> ContractVersion {
    ContractVersion {
        id: id.to_string(),
        contract_id: String::from("c1"),
        monthly_amount: dec(amount),
        effective_start: d(start),
        effective_end: end.map(d),
        milestones: Vec::new(),
    }
}

fn months_of(entries: &[LedgerEntry], rule_id: &str) -> Vec<String> {
    let mut months: Vec<String> = entries
        .iter()
        .filter(|e| e.entry.source == EntrySource::Rule { rule_id: rule_id.to_string() })
        .map(|e| e.entry.billing_month.to_string())
        .collect();
    months.sort();
    months
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2024-01-01", 15)).await;
    store
        .add_contract(contract("c1"), vec![version("v1", "2024-01-01", None, "900")])
        .await;
    let generator = Generator::new(&store);

    let first = generator.run(d("2024-03-10")).await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.entries_created, 8);
    assert_eq!(first.instances_created, 4);
    let after_first = store.entries().await;

    let second = generator.run(d("2024-03-10")).await.unwrap();
    assert_eq!(second.entries_created, 0);
    assert_eq!(second.instances_created, 0);
    // The rule is caught up, so only the contract's months are re-checked.
    assert_eq!(second.already_present, 4);
    assert_eq!(store.entries().await, after_first);
}

#[tokio::test]
async fn test_horizon_bounds_neglected_rule() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2020-01-01", 15)).await;
    let report = Generator::new(&store).run(d("2024-03-10")).await.unwrap();

    let months = months_of(&store.entries().await, "r1");
    assert_eq!(months.len(), 52);
    assert_eq!(months.first().unwrap(), "2020-01");
    assert_eq!(months.last().unwrap(), "2024-04");
    assert_eq!(report.horizon.last(), p("2024-04"));
}

#[tokio::test]
async fn test_horizon_months_is_configurable() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2024-03-01", 1)).await;
    Generator::new(&store)
        .with_horizon_months(4)
        .run(d("2024-03-10"))
        .await
        .unwrap();
    assert_eq!(
        months_of(&store.entries().await, "r1"),
        vec!["2024-03", "2024-04", "2024-05", "2024-06"]
    );
}

#[tokio::test]
async fn test_cursor_tracks_latest_generated_month() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2024-01-01", 31)).await;
    let generator = Generator::new(&store);

    generator.run(d("2024-01-05")).await.unwrap();
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, Some(p("2024-02")));

    generator.run(d("2024-04-05")).await.unwrap();
    let cursor = store.rule("r1").await.unwrap().last_generated_period;
    assert_eq!(cursor, Some(p("2024-05")));
    let months = months_of(&store.entries().await, "r1");
    assert_eq!(months.last().map(String::as_str), Some("2024-05"));

    // Running with an earlier as-of never moves the cursor back.
    generator.run(d("2024-01-05")).await.unwrap();
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, Some(p("2024-05")));
}

#[tokio::test]
async fn test_due_dates_are_clamped() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2023-01-01", 31)).await;
    Generator::new(&store).run(d("2023-02-01")).await.unwrap();
    let mut dates: Vec<NaiveDate> = store
        .entries()
        .await
        .iter()
        .map(|e| e.entry.due_date)
        .collect();
    dates.sort();
    assert_eq!(dates, vec![d("2023-01-31"), d("2023-02-28"), d("2023-03-31")]);
}

#[tokio::test]
async fn test_past_end_date_produces_nothing() {
    let store = MemoryStore::new();
    let mut r = rule("r1", "2023-01-01", 1);
    r.end_date = Some(d("2023-06-30"));
    r.last_generated_period = Some(p("2023-06"));
    store.add_rule(r).await;

    let report = Generator::new(&store).run(d("2024-03-10")).await.unwrap();
    assert_eq!(report.entries_created, 0);
    assert_eq!(report.rules_ended, 1);
    assert!(store.entries().await.is_empty());
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, Some(p("2023-06")));
}

#[tokio::test]
async fn test_end_date_within_catch_up_stops_rule() {
    let store = MemoryStore::new();
    let mut r = rule("r1", "2024-01-01", 20);
    r.end_date = Some(d("2024-02-25"));
    store.add_rule(r).await;

    let report = Generator::new(&store).run(d("2024-06-01")).await.unwrap();
    assert_eq!(months_of(&store.entries().await, "r1"), vec!["2024-01", "2024-02"]);
    assert_eq!(report.rules_ended, 1);
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, Some(p("2024-02")));
}

#[tokio::test]
async fn test_nothing_before_start_date() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2024-03-20", 10)).await;
    Generator::new(&store).run(d("2024-03-25")).await.unwrap();
    // March 10th precedes the start, so March is passed over.
    assert_eq!(months_of(&store.entries().await, "r1"), vec!["2024-04"]);
}

#[tokio::test]
async fn test_paused_and_ended_rules_are_ignored() {
    let store = MemoryStore::new();
    let mut paused = rule("paused", "2024-01-01", 1);
    paused.status = RuleStatus::Paused;
    let mut ended = rule("ended", "2024-01-01", 1);
    ended.status = RuleStatus::Ended;
    store.add_rule(paused).await;
    store.add_rule(ended).await;
    let report = Generator::new(&store).run(d("2024-03-10")).await.unwrap();
    assert_eq!(report.rules_scanned, 0);
    assert!(store.entries().await.is_empty());
}

#[tokio::test]
async fn test_existing_entry_is_skipped_and_cursor_advances() {
    let store = MemoryStore::new();
    let r = rule("r1", "2024-02-01", 5);
    store.add_rule(r.clone()).await;
    store
        .push_entry(rule_entry(
            &r,
            Candidate {
                period: p("2024-02"),
                due_date: d("2024-02-07"),
            },
        ))
        .await;

    let report = Generator::new(&store).run(d("2024-02-10")).await.unwrap();
    assert_eq!(report.already_present, 1);
    assert_eq!(report.entries_created, 1);
    assert_eq!(months_of(&store.entries().await, "r1"), vec!["2024-02", "2024-03"]);
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, Some(p("2024-03")));
}

#[tokio::test]
async fn test_insert_conflict_is_not_a_failure() {
    let store = MemoryStore::new();
    let r = rule("r1", "2024-02-01", 5);
    store.add_rule(r.clone()).await;
    store
        .push_entry(rule_entry(
            &r,
            Candidate {
                period: p("2024-02"),
                due_date: d("2024-02-05"),
            },
        ))
        .await;
    // Simulate a concurrent run: the check sees nothing, the insert hits the existing key.
    store.skip_exists_check(true).await;

    let report = Generator::new(&store).run(d("2024-02-10")).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.already_present, 1);
    assert_eq!(months_of(&store.entries().await, "r1"), vec!["2024-02", "2024-03"]);
}

#[tokio::test]
async fn test_write_failure_stops_only_that_rule() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2024-01-01", 1)).await;
    store.add_rule(rule("r2", "2024-01-01", 1)).await;
    store.fail_insert(GenerationKey::rule("r1", p("2024-03"))).await;
    let generator = Generator::new(&store);

    let report = generator.run(d("2024-04-10")).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].subject, Subject::Rule(String::from("r1")));
    assert_eq!(report.failures[0].period, p("2024-03"));
    let entries = store.entries().await;
    assert_eq!(months_of(&entries, "r1"), vec!["2024-01", "2024-02"]);
    assert_eq!(months_of(&entries, "r2").len(), 5);
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, Some(p("2024-02")));

    // The next run resumes where the failed one stopped.
    store.clear_faults().await;
    let report = generator.run(d("2024-04-10")).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.entries_created, 3);
    assert_eq!(months_of(&store.entries().await, "r1").len(), 5);
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, Some(p("2024-05")));
}

#[tokio::test]
async fn test_cursor_failure_is_recovered_by_next_run() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2024-01-01", 1)).await;
    store.fail_cursor("r1").await;
    let generator = Generator::new(&store);

    let report = generator.run(d("2024-01-10")).await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(months_of(&store.entries().await, "r1"), vec!["2024-01"]);
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, None);

    store.clear_faults().await;
    let report = generator.run(d("2024-01-10")).await.unwrap();
    assert_eq!(report.already_present, 1);
    assert_eq!(report.entries_created, 1);
    assert_eq!(months_of(&store.entries().await, "r1"), vec!["2024-01", "2024-02"]);
    assert_eq!(store.rule("r1").await.unwrap().last_generated_period, Some(p("2024-02")));
}

#[tokio::test]
async fn test_fetch_failure_aborts_run() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2024-01-01", 1)).await;
    store.fail_fetches(true).await;
    let err = Generator::new(&store).run(d("2024-01-10")).await.unwrap_err();
    assert!(format!("{err:#}").contains("Unable to read active rules"));
    assert!(store.entries().await.is_empty());
}

#[tokio::test]
async fn test_rule_edit_only_affects_future_entries() {
    let store = MemoryStore::new();
    store.add_rule(rule("r1", "2024-01-01", 1)).await;
    let generator = Generator::new(&store);
    generator.run(d("2024-01-10")).await.unwrap();

    let mut edited = rule("r1", "2024-01-01", 1);
    edited.amount = dec("2000");
    store.edit_rule(edited).await;
    generator.run(d("2024-02-10")).await.unwrap();

    let mut entries = store.entries().await;
    entries.sort_by_key(|e| e.entry.billing_month);
    let amounts: Vec<Decimal> = entries.iter().map(|e| e.entry.amount).collect();
    assert_eq!(amounts, vec![dec("1500"), dec("1500"), dec("2000")]);
}

#[tokio::test]
async fn test_expense_rule_entries() {
    let store = MemoryStore::new();
    let mut r = rule("aws", "2024-05-01", 3);
    r.kind = EntryKind::Expense;
    r.name = String::from("AWS");
    r.category = Some(String::from("Software"));
    store.add_rule(r).await;
    Generator::new(&store).run(d("2024-05-01")).await.unwrap();

    let entries = store.entries().await;
    assert_eq!(entries.len(), 2);
    for e in &entries {
        assert_eq!(e.entry.kind, EntryKind::Expense);
        assert_eq!(e.entry.status, EntryStatus::Scheduled);
        assert_eq!(e.entry.description, "AWS (Recurring)");
        assert_eq!(e.entry.category.as_deref(), Some("Software"));
    }
}

#[tokio::test]
async fn test_retainer_versions_and_milestones() {
    let store = MemoryStore::new();
    let mut b = version("B", "2024-07-01", None, "10000");
    b.milestones = vec![
        MilestoneStep::fixed("Kickoff", dec("3000"), 0),
        MilestoneStep::percent("Midpoint", dec("50"), 15),
        MilestoneStep::remainder("Balance", 28),
    ];
    store
        .add_contract(
            contract("c1"),
            vec![version("A", "2024-01-01", Some("2024-06-30"), "8000"), b],
        )
        .await;

    let report = Generator::new(&store).run(d("2024-08-05")).await.unwrap();
    assert_eq!(report.instances_created, 9);
    assert_eq!(report.entries_created, 6 + 3 * 3);

    let instances = store.instances().await;
    let may = instances.iter().find(|i| i.month == p("2024-05")).unwrap();
    assert_eq!(may.version_id, "A");
    assert_eq!(may.total_due, dec("8000"));
    let sept = instances.iter().find(|i| i.month == p("2024-09")).unwrap();
    assert_eq!(sept.version_id, "B");
    assert!(instances.iter().all(|i| i.month <= p("2024-09")));

    let july = store
        .entries()
        .await
        .into_iter()
        .filter(|e| e.entry.billing_month == p("2024-07"))
        .collect::<Vec<_>>();
    let got: Vec<(Decimal, NaiveDate, String)> = july
        .iter()
        .map(|e| (e.entry.amount, e.entry.due_date, e.entry.description.clone()))
        .collect();
    assert_eq!(
        got,
        vec![
            (dec("3000"), d("2024-07-01"), String::from("Globex - Kickoff")),
            (dec("5000"), d("2024-07-16"), String::from("Globex - Midpoint")),
            (dec("2000"), d("2024-07-29"), String::from("Globex - Balance")),
        ]
    );
}

#[tokio::test]
async fn test_retainer_month_without_version_is_skipped() {
    let store = MemoryStore::new();
    store
        .add_contract(
            contract("c1"),
            vec![
                version("A", "2024-01-01", Some("2024-02-29"), "100"),
                version("B", "2024-05-01", None, "200"),
            ],
        )
        .await;
    let report = Generator::new(&store).run(d("2024-05-10")).await.unwrap();
    assert_eq!(report.instances_created, 4);
    assert_eq!(report.months_without_version, 2);
    let months: Vec<Period> = store.instances().await.iter().map(|i| i.month).collect();
    assert!(!months.contains(&p("2024-03")));
    assert!(!months.contains(&p("2024-04")));
}

#[tokio::test]
async fn test_retainer_write_failure_stops_contract() {
    let store = MemoryStore::new();
    store
        .add_contract(contract("c1"), vec![version("A", "2024-01-01", None, "100")])
        .await;
    store.fail_insert(GenerationKey::retainer("A", p("2024-02"))).await;
    let generator = Generator::new(&store);

    let report = generator.run(d("2024-03-10")).await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].subject, Subject::Contract(String::from("c1")));
    assert_eq!(store.instances().await.len(), 1);

    store.clear_faults().await;
    let report = generator.run(d("2024-03-10")).await.unwrap();
    assert_eq!(report.instances_created, 3);
    assert_eq!(report.already_present, 1);
}

#[tokio::test]
async fn test_inactive_contract_is_ignored() {
    let store = MemoryStore::new();
    let mut c = contract("c1");
    c.status = ContractStatus::Terminated;
    store
        .add_contract(c, vec![version("A", "2024-01-01", None, "100")])
        .await;
    let report = Generator::new(&store).run(d("2024-03-10")).await.unwrap();
    assert_eq!(report.contracts_scanned, 0);
    assert!(store.instances().await.is_empty());
}
