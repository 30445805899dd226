//! Batch audit: every acquisition since a cutoff against its template.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use mrqa_compliance::{ComplianceRecord, FieldMismatch, TemplateChecker};
use mrqa_core::{field_or_null, ParamField};
use mrqa_ingest::sanitize_value;
use mrqa_store::StoredInstance;

pub const TSV_HEADER: &str =
    "conforms\tProject\tSequenceName\tSubID\tAcqDate\tAcqTime\tSeriesNumber\tStation\terrors";

#[derive(Debug, Clone, Serialize)]
pub struct AuditRow {
    pub conforms: bool,
    pub project: String,
    pub sequence: String,
    pub sub_id: String,
    pub acq_date: String,
    pub acq_time: String,
    pub series_number: String,
    pub station: String,
    pub param_id: i64,
    pub has_template: bool,
    pub errors: BTreeMap<String, FieldMismatch>,
}

impl AuditRow {
    fn new(stored: &StoredInstance, record: ComplianceRecord) -> Self {
        let instance = &stored.instance;
        Self {
            conforms: record.conforms,
            project: field_or_null(&record.input, ParamField::Project.as_str()).to_string(),
            sequence: field_or_null(&record.input, ParamField::SequenceName.as_str()).to_string(),
            sub_id: instance.key.sub_id.clone(),
            acq_date: instance.key.acq_date.clone(),
            acq_time: instance.key.acq_time.clone(),
            series_number: instance.key.series_number.clone(),
            station: instance.details.station.clone(),
            param_id: instance.param_id,
            has_template: record.has_template(),
            errors: record.errors,
        }
    }

    /// One tab separated line in [`TSV_HEADER`] order. Mismatches render as
    /// `field:expected!=observed`.
    pub fn to_tsv(&self) -> String {
        let errors = self
            .errors
            .iter()
            .map(|(field, m)| format!("{field}:{}!={}", m.expected, m.observed))
            .collect::<Vec<_>>()
            .join(",");
        [
            if self.conforms { "1" } else { "0" },
            &self.project,
            &self.sequence,
            &self.sub_id,
            &self.acq_date,
            &self.acq_time,
            &self.series_number,
            &self.station,
            &errors,
        ]
        .iter()
        .map(|v| sanitize_value(v))
        .collect::<Vec<_>>()
        .join("\t")
    }
}

/// Check every acquisition dated after `since`, or within the last
/// `lookback_days` when no cutoff is given.
///
/// Templates are computed once from the full history up front.
pub async fn run_audit(
    checker: &TemplateChecker,
    since: Option<NaiveDate>,
    lookback_days: u32,
) -> mrqa_store::Result<Vec<AuditRow>> {
    let table = checker.inferencer().recompute().await?;
    let instances = checker
        .inferencer()
        .store()
        .query_instances_since(since, lookback_days)
        .await?;

    let mut rows = Vec::with_capacity(instances.len());
    for stored in &instances {
        let record = checker.check_stored(&table, stored).await?;
        rows.push(AuditRow::new(stored, record));
    }

    let failing = rows.iter().filter(|r| !r.conforms).count();
    info!(
        acquisitions = rows.len(),
        nonconforming = failing,
        templates = table.len(),
        computed_at = %table.computed_at(),
        "audit complete"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrqa_compliance::Comparator;
    use mrqa_core::FieldMap;
    use mrqa_store::{ParameterStore, TemplateInferencer};

    fn header(sub: &str, date: &str, tr: &str) -> FieldMap {
        let mut fields: FieldMap = ParamField::ALL
            .iter()
            .map(|f| (f.as_str().to_string(), "x".to_string()))
            .collect();
        for (k, v) in [
            ("Project", "WPC-8620"),
            ("SequenceName", "HabitTask"),
            ("TR", tr),
            ("AcqTime", "154833.265000"),
            ("AcqDate", date),
            ("SubID", sub),
            ("SeriesNumber", "7"),
            ("Station", "AWP167046"),
        ] {
            fields.insert(k.to_string(), v.to_string());
        }
        fields
    }

    async fn checker_with(headers: &[FieldMap]) -> TemplateChecker {
        let store = ParameterStore::in_memory();
        for h in headers {
            store.ingest(h).await.unwrap();
        }
        TemplateChecker::new(
            TemplateInferencer::new(store),
            Comparator::default(),
            Default::default(),
        )
    }

    #[tokio::test]
    async fn flags_the_odd_acquisition_out() {
        let checker = checker_with(&[
            header("a", "20220901", "1300"),
            header("b", "20220902", "1300"),
            header("c", "20220913", "2000"),
        ])
        .await;
        let since = NaiveDate::from_ymd_opt(2022, 9, 1);
        let rows = run_audit(&checker, since, 1).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].conforms);
        assert_eq!(rows[1].sub_id, "c");
        assert!(!rows[1].conforms);
        assert_eq!(rows[1].errors["TR"].expected, "1300");
        assert!(rows[1].to_tsv().starts_with("0\tWPC-8620\tHabitTask\tc\t20220913"));
        assert!(rows[1].to_tsv().ends_with("TR:1300!=2000"));
    }

    #[tokio::test]
    async fn empty_history_audits_nothing() {
        let checker = checker_with(&[]).await;
        assert!(run_audit(&checker, None, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookback_applies_only_without_a_cutoff() {
        let today = chrono::Local::now().date_naive();
        let recent = (today - chrono::Duration::days(3)).format("%Y%m%d").to_string();
        let checker = checker_with(&[
            header("old", "20220901", "1300"),
            header("recent", &recent, "1300"),
        ])
        .await;

        assert!(run_audit(&checker, None, 1).await.unwrap().is_empty());
        let rows = run_audit(&checker, None, 7).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sub_id, "recent");
        let since = NaiveDate::from_ymd_opt(2022, 8, 31);
        assert_eq!(run_audit(&checker, since, 1).await.unwrap().len(), 2);
    }

    #[test]
    fn tsv_header_matches_row_width() {
        let row = AuditRow {
            conforms: true,
            project: "p".into(),
            sequence: "s".into(),
            sub_id: "id".into(),
            acq_date: "20220913".into(),
            acq_time: "t".into(),
            series_number: "1".into(),
            station: "st\tx".into(),
            param_id: 1,
            has_template: false,
            errors: BTreeMap::new(),
        };
        let line = row.to_tsv();
        assert_eq!(line.split('\t').count(), TSV_HEADER.split('\t').count());
        assert!(line.contains("st x"));
    }
}
