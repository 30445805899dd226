use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use tracing::{debug, info, warn};

use mrqa_core::{
    AcquisitionInstance, FieldMap, InstanceDetails, InstanceKey, ParamField, ParamId, ParamSet,
    DCM_PATH,
};

use crate::backend::{ParamInsert, StoreBackend, StoredInstance};
use crate::error::Result;
use crate::memory::MemoryBackend;
use crate::pattern::ProtocolPattern;
use crate::sqlite::SqliteBackend;

/// What happened to one header handed to [`ParameterStore::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Recorded { param_id: ParamId, new_param_set: bool },
    /// The acquisition is already in the log.
    Duplicate,
    /// One of AcqTime, AcqDate, SubID, SeriesNumber was absent.
    MissingIdentity,
    /// The header carried no `Project` field at all.
    MissingProject,
}

/// Parameter-set dedup and the acquisition instance log.
#[derive(Clone)]
pub struct ParameterStore {
    backend: Arc<dyn StoreBackend>,
}

impl ParameterStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub async fn sqlite(url: &str, max_connections: u32) -> Result<Self> {
        Ok(Self::new(Arc::new(SqliteBackend::connect(url, max_connections).await?)))
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Id of `params`, created on first sight. Identical sets always map to the same id.
    pub async fn find_or_create(&self, params: &ParamSet) -> Result<ParamId> {
        Ok(self.insert_params(params).await?.param_id)
    }

    async fn insert_params(&self, params: &ParamSet) -> Result<ParamInsert> {
        let inserted = self.backend.find_or_insert_params(params).await?;
        if inserted.created {
            info!(
                param_id = inserted.param_id,
                project = params.project(),
                sequence = params.sequence_name(),
                "new parameter set created"
            );
        } else {
            debug!(param_id = inserted.param_id, "parameter set repeated");
        }
        Ok(inserted)
    }

    pub async fn find(&self, params: &ParamSet) -> Result<Option<ParamId>> {
        self.backend.find_params(params).await
    }

    pub async fn param_set(&self, id: ParamId) -> Result<Option<ParamSet>> {
        self.backend.get_params(id).await
    }

    pub async fn has_instance(&self, key: &InstanceKey) -> Result<bool> {
        self.backend.has_instance(key).await
    }

    /// Append one acquisition to the log.
    ///
    /// Returns `false` without writing when the identity is incomplete or the
    /// acquisition is already recorded.
    pub async fn record_instance(
        &self,
        key: &InstanceKey,
        details: InstanceDetails,
        param_id: ParamId,
    ) -> Result<bool> {
        if !key.is_complete() {
            warn!(?key, "rejecting acquisition without a complete identity");
            return Ok(false);
        }
        let instance = AcquisitionInstance {
            key: key.clone(),
            details,
            param_id,
        };
        let inserted = self.backend.insert_instance_if_absent(&instance).await?;
        if inserted {
            debug!(
                param_id,
                sub_id = %key.sub_id,
                series = %key.series_number,
                "acquisition recorded"
            );
        } else {
            debug!(?key, "acquisition already recorded");
        }
        Ok(inserted)
    }

    /// Store one header: its parameter set (deduplicated) and its instance row.
    pub async fn ingest(&self, fields: &FieldMap) -> Result<IngestOutcome> {
        let Some(key) = InstanceKey::from_fields(fields) else {
            let path = fields.get(DCM_PATH).map(String::as_str).unwrap_or("?");
            warn!(path, "header lacks acquisition identity, skipping");
            return Ok(IngestOutcome::MissingIdentity);
        };
        if self.has_instance(&key).await? {
            debug!(?key, "have acquisition");
            return Ok(IngestOutcome::Duplicate);
        }
        if !fields.contains_key(ParamField::Project.as_str()) {
            warn!(?key, "header has no 'Project' field, skipping");
            return Ok(IngestOutcome::MissingProject);
        }

        let inserted = self.insert_params(&ParamSet::from_fields(fields)).await?;

        let recorded = self
            .record_instance(&key, InstanceDetails::from_fields(fields), inserted.param_id)
            .await?;
        if !recorded {
            // Lost a race with a concurrent writer of the same acquisition.
            return Ok(IngestOutcome::Duplicate);
        }
        Ok(IngestOutcome::Recorded {
            param_id: inserted.param_id,
            new_param_set: inserted.created,
        })
    }

    /// Acquisitions dated strictly after `cutoff`, in insertion order.
    ///
    /// Without a cutoff, looks back `lookback_days` from today.
    pub async fn query_instances_since(
        &self,
        cutoff: Option<NaiveDate>,
        lookback_days: u32,
    ) -> Result<Vec<StoredInstance>> {
        let cutoff = cutoff.unwrap_or_else(|| default_cutoff(lookback_days));
        info!(%cutoff, "finding acquisitions since");
        self.backend.instances_since(cutoff).await
    }

    /// Most recent acquisition day of any project matching `project`.
    pub async fn most_recent(&self, project: &ProtocolPattern) -> Result<Option<NaiveDate>> {
        self.backend.latest_acq_day(project).await
    }
}

/// Lookback of [`ParameterStore::query_instances_since`] when callers have no preference.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 1;

/// `days` before today, in local time.
pub fn default_cutoff(days: u32) -> NaiveDate {
    (Local::now() - Duration::days(i64::from(days))).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrqa_core::{NULL_VALUE, PARAM_FIELD_COUNT};

    fn example_params() -> ParamSet {
        ParamSet::new(std::array::from_fn::<String, PARAM_FIELD_COUNT, _>(|_| "x".to_string()))
    }

    fn header(series: &str) -> FieldMap {
        let mut fields = example_params().to_field_map();
        for (k, v) in [
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

    #[tokio::test]
    async fn find_or_create_is_stable() {
        let store = ParameterStore::in_memory();
        let example = example_params();
        assert_eq!(store.find_or_create(&example).await.unwrap(), 1);
        assert_eq!(store.find_or_create(&example).await.unwrap(), 1);

        let mut other = example.clone();
        other.set(ParamField::Project, "b");
        assert_eq!(store.find_or_create(&other).await.unwrap(), 2);
        assert_eq!(store.find(&example).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn record_instance_rejects_sentinel_identity() {
        let store = ParameterStore::in_memory();
        let key = InstanceKey {
            acq_time: NULL_VALUE.into(),
            acq_date: NULL_VALUE.into(),
            sub_id: NULL_VALUE.into(),
            series_number: NULL_VALUE.into(),
        };
        let recorded = store
            .record_instance(&key, InstanceDetails::default(), 1)
            .await
            .unwrap();
        assert!(!recorded);
        assert!(!store.has_instance(&key).await.unwrap());
    }

    #[tokio::test]
    async fn ingest_reports_each_outcome() {
        let store = ParameterStore::in_memory();

        let first = store.ingest(&header("12")).await.unwrap();
        assert_eq!(first, IngestOutcome::Recorded { param_id: 1, new_param_set: true });

        assert_eq!(store.ingest(&header("12")).await.unwrap(), IngestOutcome::Duplicate);

        let second = store.ingest(&header("13")).await.unwrap();
        assert_eq!(second, IngestOutcome::Recorded { param_id: 1, new_param_set: false });

        let mut no_identity = header("14");
        no_identity.insert("AcqDate".into(), NULL_VALUE.into());
        assert_eq!(store.ingest(&no_identity).await.unwrap(), IngestOutcome::MissingIdentity);

        let mut no_project = header("15");
        no_project.remove("Project");
        assert_eq!(store.ingest(&no_project).await.unwrap(), IngestOutcome::MissingProject);
    }

    #[tokio::test]
    async fn missing_identity_does_no_parameter_work() {
        let store = ParameterStore::in_memory();
        let mut fields = header("1");
        fields.remove("SubID");
        store.ingest(&fields).await.unwrap();
        assert_eq!(store.find(&example_params()).await.unwrap(), None);
    }
}
