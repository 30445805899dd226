//! Template lookup plus comparison over a populated in-memory store.

use std::collections::BTreeSet;
use std::io::Write;

use chrono::NaiveDate;

use mrqa_compliance::{CheckContext, Comparator, ComparisonRules, TemplateChecker};
use mrqa_core::{FieldMap, ParamField, NULL_VALUE};
use mrqa_store::{IngestOutcome, ParameterStore, TemplateInferencer};

fn header(series: &str, tr: &str) -> FieldMap {
    let mut fields: FieldMap = ParamField::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), "x".to_string()))
        .collect();
    for (k, v) in [
        ("Project", "WPC-8620"),
        ("SequenceName", "RewardedAnti"),
        ("TR", tr),
        ("AcqTime", "154833.265000"),
        ("AcqDate", "20220913"),
        ("SubID", "11883_20220913"),
        ("SeriesNumber", series),
        ("Operator", "op"),
        ("Shims", "1174,-2475"),
        ("Station", "AWP167046"),
    ] {
        fields.insert(k.to_string(), v.to_string());
    }
    fields
}

async fn populated() -> (ParameterStore, TemplateChecker) {
    let store = ParameterStore::in_memory();
    for (series, tr) in [("1", "1300"), ("2", "1300"), ("3", "1500")] {
        let outcome = store.ingest(&header(series, tr)).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Recorded { .. }));
    }
    let checker = TemplateChecker::new(
        TemplateInferencer::new(store.clone()),
        Comparator::default(),
        BTreeSet::new(),
    );
    (store, checker)
}

#[tokio::test]
async fn header_is_checked_against_most_common_set() {
    let (_, checker) = populated().await;

    let ok = checker
        .check_header(&header("9", "1300.0"), CheckContext::Batch)
        .await
        .unwrap();
    assert!(ok.conforms);
    assert_eq!(ok.template["TR"], "1300");

    let bad = checker
        .check_header(&header("9", "1500"), CheckContext::Batch)
        .await
        .unwrap();
    assert!(!bad.conforms);
    assert_eq!(bad.error_summary(), "TR");
}

#[tokio::test]
async fn unknown_protocol_has_no_template() {
    let (_, checker) = populated().await;
    let mut fields = header("9", "9999");
    fields.insert("SequenceName".into(), "Unseen".into());
    let record = checker.check_header(&fields, CheckContext::Realtime).await.unwrap();
    assert!(record.conforms);
    assert!(!record.has_template());
}

#[tokio::test]
async fn table_and_live_lookup_agree() {
    let (store, checker) = populated().await;
    let table = checker.inferencer().recompute().await.unwrap();

    let mut fields = header("9", "1500");
    fields.insert("FoV".into(), NULL_VALUE.into());
    let live = checker.check_with_table(&table, &fields, CheckContext::Realtime);
    let direct = checker.check_header(&fields, CheckContext::Realtime).await.unwrap();
    assert_eq!(live, direct);
    assert!(!live.errors.contains_key("FoV"));

    let rows = store
        .query_instances_since(Some(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()), 1)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    let third = checker.check_stored(&table, &rows[2]).await.unwrap();
    assert_eq!(third.error_summary(), "TR");
    assert_eq!(third.input["SeriesNumber"], "3");
}

#[test]
fn rules_load_from_a_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "fuzzy_contexts: [batch, realtime]").unwrap();
    let rules = ComparisonRules::load(Some(file.path())).unwrap();
    assert!(rules.fuzzy_contexts.contains(&CheckContext::Batch));

    assert_eq!(ComparisonRules::load(None).unwrap(), ComparisonRules::default());
}
