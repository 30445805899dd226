//! In-process backend; a single async mutex serializes every write.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use mrqa_core::{AcquisitionInstance, InstanceKey, ParamId, ParamSet};

use crate::backend::{ParamCount, ParamInsert, ProtocolCount, StoreBackend, StoredInstance};
use crate::error::Result;
use crate::pattern::ProtocolPattern;

#[derive(Default)]
struct Inner {
    /// Index `i` holds parameter set id `i + 1`.
    params: Vec<ParamSet>,
    param_ids: HashMap<ParamSet, ParamId>,
    instances: Vec<AcquisitionInstance>,
    instance_keys: HashSet<InstanceKey>,
}

impl Inner {
    fn params_of(&self, id: ParamId) -> Option<&ParamSet> {
        usize::try_from(id - 1).ok().and_then(|i| self.params.get(i))
    }

    fn counts(&self) -> BTreeMap<ParamId, u64> {
        let mut counts = BTreeMap::new();
        for inst in &self.instances {
            *counts.entry(inst.param_id).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn find_or_insert_params(&self, params: &ParamSet) -> Result<ParamInsert> {
        let mut inner = self.inner.lock().await;
        if let Some(&param_id) = inner.param_ids.get(params) {
            return Ok(ParamInsert { param_id, created: false });
        }
        inner.params.push(params.clone());
        let param_id = inner.params.len() as ParamId;
        inner.param_ids.insert(params.clone(), param_id);
        Ok(ParamInsert { param_id, created: true })
    }

    async fn find_params(&self, params: &ParamSet) -> Result<Option<ParamId>> {
        Ok(self.inner.lock().await.param_ids.get(params).copied())
    }

    async fn get_params(&self, id: ParamId) -> Result<Option<ParamSet>> {
        Ok(self.inner.lock().await.params_of(id).cloned())
    }

    async fn has_instance(&self, key: &InstanceKey) -> Result<bool> {
        Ok(self.inner.lock().await.instance_keys.contains(key))
    }

    async fn insert_instance_if_absent(&self, instance: &AcquisitionInstance) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.instance_keys.insert(instance.key.clone()) {
            return Ok(false);
        }
        inner.instances.push(instance.clone());
        Ok(true)
    }

    async fn instances_since(&self, cutoff: NaiveDate) -> Result<Vec<StoredInstance>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .instances
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.key.acq_day().is_some_and(|day| day > cutoff))
            .map(|(i, inst)| StoredInstance {
                seq: i as i64 + 1,
                instance: inst.clone(),
            })
            .collect())
    }

    async fn count_by_param(
        &self,
        project: &ProtocolPattern,
        sequence: &ProtocolPattern,
    ) -> Result<Vec<ParamCount>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .counts()
            .into_iter()
            .filter(|(id, _)| {
                inner.params_of(*id).is_some_and(|p| {
                    project.matches(p.project()) && sequence.matches(p.sequence_name())
                })
            })
            .map(|(param_id, count)| ParamCount { param_id, count })
            .collect())
    }

    async fn count_by_protocol(&self) -> Result<Vec<ProtocolCount>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .counts()
            .into_iter()
            .filter_map(|(param_id, count)| {
                inner.params_of(param_id).map(|p| ProtocolCount {
                    project: p.project().to_string(),
                    sequence_name: p.sequence_name().to_string(),
                    param_id,
                    count,
                })
            })
            .collect())
    }

    async fn latest_acq_day(&self, project: &ProtocolPattern) -> Result<Option<NaiveDate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .instances
            .iter()
            .filter(|inst| {
                inner
                    .params_of(inst.param_id)
                    .is_some_and(|p| project.matches(p.project()))
            })
            .filter_map(|inst| inst.key.acq_day())
            .max())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
