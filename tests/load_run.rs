mod common;

use std::str::FromStr;

use common::{TestWorkspace, delimited_profile};
use price_loader::{
    config::LoaderConfig,
    data::FieldValue,
    error::LoadError,
    loader::{CANONICAL_COLUMNS, StrategyKind},
    orchestrator::Orchestrator,
    profile::{FieldMappingRule, FileKind},
    store::{
        ClearMode,
        memory::{FailPoint, MemoryStore, StoreCall},
    },
};
use rust_decimal::Decimal;

fn decimal(value: &str) -> FieldValue {
    FieldValue::Decimal(Decimal::from_str(value).expect("decimal literal"))
}

fn batched(batch_size: usize) -> Orchestrator {
    let config = LoaderConfig {
        batch_size,
        ..LoaderConfig::default()
    };
    Orchestrator::new(&config).expect("orchestrator")
}

fn key_and_price_rules() -> Vec<FieldMappingRule> {
    vec![
        FieldMappingRule::indexed("DetailNum", "varchar(40)", 1),
        FieldMappingRule::indexed("DetailPrice", "numeric(18,2)", 2),
    ]
}

#[test]
fn empty_key_rows_are_not_loaded() {
    let ws = TestWorkspace::new();
    ws.write("acme.csv", "A1;10.5\n;5.0\nB2;7.25\n");
    let mut store = MemoryStore::new()
        .with_profile(delimited_profile(1, ws.pattern("*.csv")), key_and_price_rules());

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.rows_loaded, 2);
    assert_eq!(store.target_columns(), &["DetailNum", "DetailPrice"]);
    assert_eq!(
        store.target_rows(),
        &[
            vec![FieldValue::text("A1"), decimal("10.5")],
            vec![FieldValue::text("B2"), decimal("7.25")],
        ]
    );
    assert_eq!(summary.exit_code(), 0);
}

#[test]
fn constant_brand_is_applied_to_every_row() {
    let ws = TestWorkspace::new();
    ws.write("acme.csv", "A1\nB2\nC3\n");
    let rules = vec![
        FieldMappingRule::constant("Brand", "varchar(60)", "ACME"),
        FieldMappingRule::indexed("DetailNum", "varchar(40)", 1),
    ];
    let mut store =
        MemoryStore::new().with_profile(delimited_profile(1, ws.pattern("*.csv")), rules);

    batched(1_000).run(&mut store).expect("run");

    let rows = store.target_rows();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row[0] == FieldValue::text("ACME")));
}

#[test]
fn profile_without_delimiter_reads_comma_separated_file() {
    let ws = TestWorkspace::new();
    ws.write("acme.csv", "A1,10.5\nB2,7.25\n");
    let mut profile = delimited_profile(1, ws.pattern("*.csv"));
    profile.delimiter = None;
    profile.delimiter_name = None;
    let mut store = MemoryStore::new().with_profile(profile, key_and_price_rules());

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(
        store.target_rows(),
        &[
            vec![FieldValue::text("A1"), decimal("10.5")],
            vec![FieldValue::text("B2"), decimal("7.25")],
        ]
    );
}

#[test]
fn run_without_active_profiles_finishes_cleanly() {
    let mut store = MemoryStore::new();

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.profiles_seen, 0);
    assert_eq!(summary.files_loaded, 0);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(store.calls(), &[StoreCall::ListProfiles]);
}

#[test]
fn profile_without_files_is_skipped_and_run_continues() {
    let ws = TestWorkspace::new();
    ws.write("second/prices.csv", "Z9;1\n");
    let mut store = MemoryStore::new()
        .with_profile(
            delimited_profile(1, ws.pattern("first/*.csv")),
            key_and_price_rules(),
        )
        .with_profile(
            delimited_profile(2, ws.pattern("second/*.csv")),
            key_and_price_rules(),
        );

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.profiles_seen, 2);
    assert_eq!(summary.profiles_skipped, 1);
    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(store.target_rows()[0][0], FieldValue::text("Z9"));
}

#[test]
fn batched_load_issues_three_inserts_for_2500_rows() {
    let ws = TestWorkspace::new();
    let contents: String = (0..2_500).map(|i| format!("P{i};{i}.5\n")).collect();
    ws.write("bulk.csv", &contents);
    let mut store = MemoryStore::new()
        .with_profile(delimited_profile(1, ws.pattern("*.csv")), key_and_price_rules());

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.rows_loaded, 2_500);
    assert_eq!(store.insert_sizes(), vec![1_000, 1_000, 500]);
    assert_eq!(store.count(&StoreCall::Recompute), 1);
    let recompute_at = store
        .calls()
        .iter()
        .position(|c| *c == StoreCall::Recompute)
        .expect("recompute call");
    let last_insert_at = store
        .calls()
        .iter()
        .rposition(|c| matches!(c, StoreCall::Insert { .. }))
        .expect("insert call");
    assert!(recompute_at > last_insert_at);
}

#[test]
fn bad_file_does_not_stop_the_next_one() {
    let ws = TestWorkspace::new();
    // Only one column, so DetailPrice (column 2) is out of bounds.
    ws.write("a_broken.csv", "A1\nB2\n");
    ws.write("b_good.csv", "C3;3.5\n");
    let mut store = MemoryStore::new()
        .with_profile(delimited_profile(1, ws.pattern("*.csv")), key_and_price_rules());

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.exit_code(), 2);
    assert_eq!(
        store.target_rows(),
        &[vec![FieldValue::text("C3"), decimal("3.5")]]
    );
}

#[test]
fn only_the_last_file_of_a_profile_survives() {
    let ws = TestWorkspace::new();
    ws.write("1.csv", "A1;1\nA2;2\n");
    ws.write("2.csv", "B1;3\n");
    let mut store = MemoryStore::new()
        .with_profile(delimited_profile(1, ws.pattern("*.csv")), key_and_price_rules());

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.files_loaded, 2);
    assert_eq!(summary.rows_loaded, 3);
    assert_eq!(store.count(&StoreCall::Clear(ClearMode::Delete)), 2);
    assert_eq!(store.count(&StoreCall::Recompute), 2);
    assert_eq!(store.target_rows(), &[vec![FieldValue::text("B1"), decimal("3")]]);
}

#[test]
fn profile_without_rules_is_skipped() {
    let ws = TestWorkspace::new();
    ws.write("a.csv", "A1;1\n");
    let mut store =
        MemoryStore::new().with_profile(delimited_profile(7, ws.pattern("*.csv")), Vec::new());

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.profiles_skipped, 1);
    assert_eq!(summary.files_loaded, 0);
    assert_eq!(summary.exit_code(), 0);
    assert!(!store.calls().iter().any(|c| matches!(c, StoreCall::Clear(_))));
}

#[test]
fn unusable_rules_still_clear_the_target() {
    let ws = TestWorkspace::new();
    ws.write("a.csv", "A1;1\n");
    let mut rule = FieldMappingRule::indexed("DetailNum", "varchar", 1);
    rule.value = Some("first".into());
    let mut store =
        MemoryStore::new().with_profile(delimited_profile(1, ws.pattern("*.csv")), vec![rule]);

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.rows_loaded, 0);
    assert_eq!(store.insert_sizes(), Vec::<usize>::new());
    assert_eq!(store.count(&StoreCall::Recompute), 1);
}

#[test]
fn failing_rule_query_marks_profile_failed_only() {
    let ws = TestWorkspace::new();
    ws.write("a.csv", "A1;1\n");
    let mut store = MemoryStore::new()
        .with_profile(delimited_profile(1, ws.pattern("*.csv")), key_and_price_rules())
        .with_profile(delimited_profile(2, ws.pattern("*.csv")), key_and_price_rules())
        .failing_at(FailPoint::ListRules(1));

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.profiles_failed, 1);
    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.exit_code(), 2);
}

#[test]
fn failing_profile_query_aborts_the_run() {
    let mut store = MemoryStore::new().failing_at(FailPoint::ListProfiles);
    let err = batched(1_000).run(&mut store).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Store {
            operation: "list profiles",
            ..
        }
    ));
}

#[test]
fn failed_recompute_counts_as_failed_file() {
    let ws = TestWorkspace::new();
    ws.write("a.csv", "A1;1\n");
    let mut store = MemoryStore::new()
        .with_profile(delimited_profile(1, ws.pattern("*.csv")), key_and_price_rules())
        .failing_at(FailPoint::Recompute);

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.files_loaded, 0);
}

#[test]
fn bulk_strategy_stages_canonical_columns_and_cleans_up() {
    let ws = TestWorkspace::new();
    ws.write("prices/acme.csv", "A1;10.5;Oil filter\n;1;skip\nB2;7.25;Air filter\n");
    let staging = ws.path().join("staging");
    let config = LoaderConfig {
        strategy: StrategyKind::Bulk,
        staging_dir: staging.clone(),
        ..LoaderConfig::default()
    };
    let mut rules = key_and_price_rules();
    rules.push(FieldMappingRule::indexed("DetailName", "varchar(200)", 3));
    rules.push(FieldMappingRule::constant("Brand", "varchar(60)", "ACME"));
    let mut store = MemoryStore::new()
        .with_profile(delimited_profile(1, ws.pattern("prices/*.csv")), rules);

    let summary = Orchestrator::new(&config)
        .expect("orchestrator")
        .run(&mut store)
        .expect("run");

    assert_eq!(summary.rows_loaded, 2);
    assert_eq!(store.calls()[2], StoreCall::Clear(ClearMode::Truncate));
    assert_eq!(store.target_columns().len(), CANONICAL_COLUMNS.len());
    let first = &store.target_rows()[0];
    assert_eq!(first[0], FieldValue::text("ACME"));
    assert_eq!(first[1], FieldValue::text("A1"));
    assert_eq!(first[2], FieldValue::text("10.5"));
    assert_eq!(first[3], FieldValue::text("Oil filter"));
    assert!(first[4..].iter().all(|v| *v == FieldValue::Null));
    assert_eq!(
        std::fs::read_dir(&staging).expect("staging dir").count(),
        0
    );
}

#[test]
fn spreadsheet_profile_loads_first_sheet() {
    use rust_xlsxwriter::Workbook;

    let ws = TestWorkspace::new();
    let path = ws.path().join("acme.xlsx");
    let mut wb = Workbook::new();
    let sheet = wb.add_worksheet();
    sheet.write_string(0, 0, "Number").unwrap();
    sheet.write_string(0, 1, "Price").unwrap();
    sheet.write_number(1, 0, 4711).unwrap();
    sheet.write_number(1, 1, 12.5).unwrap();
    sheet.write_string(2, 0, "X-1").unwrap();
    sheet.write_number(2, 1, 3).unwrap();
    wb.save(&path).unwrap();

    let mut profile = delimited_profile(5, ws.pattern("*.xlsx"));
    profile.file_kind = FileKind::Spreadsheet;
    profile.flags = 1;
    let mut store = MemoryStore::new().with_profile(profile, key_and_price_rules());

    let summary = batched(1_000).run(&mut store).expect("run");

    assert_eq!(summary.files_loaded, 1);
    assert_eq!(
        store.target_rows(),
        &[
            vec![FieldValue::text("4711"), decimal("12.5")],
            vec![FieldValue::text("X-1"), decimal("3")],
        ]
    );
}
