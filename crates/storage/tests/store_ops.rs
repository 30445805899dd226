//! Store and template behavior, run against both backends.
//!
//! Every scenario takes a fresh `ParameterStore`, so the same assertions
//! hold for the in-memory map and for a `sqlite::memory:` pool. Concurrency
//! runs against a file-backed pool with several connections.

use chrono::{Duration, Local, NaiveDate};

use mrqa_core::{FieldMap, InstanceDetails, InstanceKey, ParamField, ParamSet};
use mrqa_store::{
    IngestOutcome, ParameterStore, ProtocolPattern, SqliteBackend, TemplateInferencer,
    DEFAULT_LOOKBACK_DAYS,
};

async fn stores() -> Vec<(&'static str, ParameterStore)> {
    let sqlite = SqliteBackend::in_memory().await.unwrap();
    vec![
        ("memory", ParameterStore::in_memory()),
        ("sqlite", ParameterStore::new(std::sync::Arc::new(sqlite))),
    ]
}

fn params(project: &str, sequence: &str, tr: &str) -> ParamSet {
    let mut fields = FieldMap::new();
    fields.insert("Project".into(), project.into());
    fields.insert("SequenceName".into(), sequence.into());
    fields.insert("TR".into(), tr.into());
    ParamSet::from_fields(&fields)
}

fn key(day: NaiveDate, series: u32) -> InstanceKey {
    InstanceKey {
        acq_time: format!("1548{series:02}.265000"),
        acq_date: day.format("%Y%m%d").to_string(),
        sub_id: "11883_20220913".into(),
        series_number: series.to_string(),
    }
}

async fn record(store: &ParameterStore, set: &ParamSet, day: NaiveDate, series: u32) -> i64 {
    let id = store.find_or_create(set).await.unwrap();
    assert!(store
        .record_instance(&key(day, series), InstanceDetails::default(), id)
        .await
        .unwrap());
    id
}

#[tokio::test]
async fn find_or_create_assigns_stable_increasing_ids() {
    for (name, store) in stores().await {
        let base = params("WPC-8620", "RewardedAnti", "1300");
        let first = store.find_or_create(&base).await.unwrap();
        assert_eq!(first, 1, "{name}");
        assert_eq!(store.find_or_create(&base).await.unwrap(), first, "{name}");

        let changed = params("WPC-8620", "RewardedAnti", "1300.0");
        let second = store.find_or_create(&changed).await.unwrap();
        assert!(second > first, "{name}");

        assert_eq!(store.param_set(second).await.unwrap(), Some(changed), "{name}");
        assert_eq!(store.param_set(99).await.unwrap(), None, "{name}");
    }
}

#[tokio::test]
async fn duplicate_instances_are_not_rewritten() {
    for (name, store) in stores().await {
        let set = params("WPC-8620", "RewardedAnti", "1300");
        let id = store.find_or_create(&set).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2022, 9, 13).unwrap();

        let details = InstanceDetails::default();
        assert!(store.record_instance(&key(day, 1), details.clone(), id).await.unwrap());
        assert!(!store.record_instance(&key(day, 1), details, id).await.unwrap());
        assert!(store.has_instance(&key(day, 1)).await.unwrap(), "{name}");
        assert!(!store.has_instance(&key(day, 2)).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn instances_since_is_strict_and_ordered() {
    let today = Local::now().date_naive();
    let yesterday = today - Duration::days(1);
    let two_days_ago = today - Duration::days(2);

    for (name, store) in stores().await {
        let set = params("WPC-8620", "RewardedAnti", "1300");
        record(&store, &set, two_days_ago, 1).await;
        record(&store, &set, yesterday, 2).await;
        record(&store, &set, today, 3).await;

        let recent = store.query_instances_since(Some(yesterday), 1).await.unwrap();
        assert_eq!(recent.len(), 1, "{name}");
        assert_eq!(recent[0].instance.key.series_number, "3");

        let all = store
            .query_instances_since(Some(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()), 1)
            .await
            .unwrap();
        let series: Vec<&str> = all.iter().map(|s| s.instance.key.series_number.as_str()).collect();
        assert_eq!(series, ["1", "2", "3"], "{name}");

        let default = store
            .query_instances_since(None, DEFAULT_LOOKBACK_DAYS)
            .await
            .unwrap();
        assert_eq!(default, recent, "{name}");

        let wider = store.query_instances_since(None, 2).await.unwrap();
        let series: Vec<&str> = wider
            .iter()
            .map(|s| s.instance.key.series_number.as_str())
            .collect();
        assert_eq!(series, ["2", "3"], "{name}");
    }
}

#[tokio::test]
async fn unparseable_dates_never_match_a_range() {
    for (name, store) in stores().await {
        let id = store.find_or_create(&params("P", "S", "1")).await.unwrap();
        let mut odd = key(NaiveDate::from_ymd_opt(2022, 9, 13).unwrap(), 1);
        odd.acq_date = "sometime".into();
        assert!(store.record_instance(&odd, InstanceDetails::default(), id).await.unwrap());

        let all = store
            .query_instances_since(Some(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()), 1)
            .await
            .unwrap();
        assert!(all.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn template_is_most_frequent_with_lowest_id_tie_break() {
    let day = NaiveDate::from_ymd_opt(2022, 9, 13).unwrap();
    for (name, store) in stores().await {
        let common = params("WPC-8620", "RewardedAnti", "1300");
        let rare = params("WPC-8620", "RewardedAnti", "1500");
        let other = params("WPC-8620", "HabitTask", "2000");

        let rare_id = record(&store, &rare, day, 1).await;
        let common_id = record(&store, &common, day, 2).await;
        record(&store, &common, day, 3).await;
        record(&store, &other, day, 4).await;

        let inferencer = TemplateInferencer::new(store.clone());
        let t = inferencer
            .get_template("WPC-8620", "RewardedAnti")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(t.param_id, common_id, "{name}");
        assert_eq!(t.instance_count, 2);
        assert_eq!(t.params.get(ParamField::Tr), "1300");

        assert!(inferencer.is_template(common_id).await.unwrap(), "{name}");
        assert!(!inferencer.is_template(rare_id).await.unwrap(), "{name}");

        // Bring the rare set level: the older id wins the tie.
        record(&store, &rare, day, 5).await;
        let tied = inferencer
            .get_template("WPC-8620", "RewardedAnti")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tied.param_id, rare_id, "{name}");
    }
}

#[tokio::test]
async fn missing_template_is_none() {
    for (name, store) in stores().await {
        let inferencer = TemplateInferencer::new(store);
        let t = inferencer.get_template("Nothing", "Here").await.unwrap();
        assert!(t.is_none(), "{name}");
    }
}

#[tokio::test]
async fn wildcard_patterns_aggregate_protocols() {
    let day = NaiveDate::from_ymd_opt(2022, 9, 13).unwrap();
    for (name, store) in stores().await {
        let a = params("WPC-8620", "RewardedAnti", "1300");
        let b = params("WPC-8621", "RewardedAnti_2", "1300");
        record(&store, &a, day, 1).await;
        let b_id = record(&store, &b, day, 2).await;
        record(&store, &b, day, 3).await;

        let inferencer = TemplateInferencer::new(store.clone());
        let t = inferencer.get_template("WPC*", "RewardedAnti%").await.unwrap().unwrap();
        assert_eq!(t.param_id, b_id, "{name}");

        assert!(inferencer.get_template("wpc*", "*").await.unwrap().is_none(), "{name}");

        let latest = store
            .most_recent(&ProtocolPattern::new("WPC*").unwrap())
            .await
            .unwrap();
        assert_eq!(latest, Some(day), "{name}");
    }
}

#[tokio::test]
async fn recompute_builds_one_template_per_protocol() {
    let day = NaiveDate::from_ymd_opt(2022, 9, 13).unwrap();
    for (name, store) in stores().await {
        let anti = params("WPC-8620", "RewardedAnti", "1300");
        let habit = params("WPC-8620", "HabitTask", "2000");
        let habit_alt = params("WPC-8620", "HabitTask", "2100");
        record(&store, &anti, day, 1).await;
        let habit_id = record(&store, &habit, day, 2).await;
        record(&store, &habit, day, 3).await;
        record(&store, &habit_alt, day, 4).await;

        let table = TemplateInferencer::new(store).recompute().await.unwrap();
        assert_eq!(table.len(), 2, "{name}");
        assert_eq!(table.get("WPC-8620", "HabitTask").unwrap().param_id, habit_id);
        assert!(table.get("WPC-8620", "Nope").is_none());
    }
}

/// File-backed, so the pool really holds several connections.
async fn pooled_sqlite(dir: &tempfile::TempDir) -> ParameterStore {
    let url = format!("sqlite://{}", dir.path().join("mrqa.db").display());
    let backend = SqliteBackend::connect(&url, 8).await.unwrap();
    ParameterStore::new(std::sync::Arc::new(backend))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_share_one_parameter_set_and_one_instance() {
    let dir = tempfile::tempdir().unwrap();
    let stores = [
        ("memory", ParameterStore::in_memory()),
        ("sqlite-pool", pooled_sqlite(&dir).await),
    ];

    for (name, store) in stores {
        let set = params("WPC-8620", "RewardedAnti", "1300");
        let creators: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                let set = set.clone();
                tokio::spawn(async move { store.find_or_create(&set).await })
            })
            .collect();
        let mut ids = std::collections::BTreeSet::new();
        for handle in creators {
            let id = handle.await.unwrap();
            assert!(id.is_ok(), "{name}: {id:?}");
            ids.extend(id.ok());
        }
        assert_eq!(ids.len(), 1, "{name}: {ids:?}");

        let mut header = set.to_field_map();
        for (k, v) in [
            ("AcqTime", "154833.265000"),
            ("AcqDate", "20220913"),
            ("SubID", "11883_20220913"),
            ("SeriesNumber", "7"),
        ] {
            header.insert(k.to_string(), v.to_string());
        }
        let ingesters: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                let header = header.clone();
                tokio::spawn(async move { store.ingest(&header).await })
            })
            .collect();
        let (mut recorded, mut duplicates) = (0, 0);
        for handle in ingesters {
            match handle.await.unwrap() {
                Ok(IngestOutcome::Recorded { .. }) => recorded += 1,
                Ok(IngestOutcome::Duplicate) => duplicates += 1,
                other => panic!("{name}: unexpected ingest result {other:?}"),
            }
        }
        assert_eq!((recorded, duplicates), (1, 31), "{name}");
    }
}
