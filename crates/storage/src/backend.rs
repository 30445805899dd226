use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use mrqa_core::{AcquisitionInstance, InstanceKey, ParamId, ParamSet};

use crate::error::Result;
use crate::pattern::ProtocolPattern;

/// An instance row together with its position in the log (1-based, insertion order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredInstance {
    pub seq: i64,
    pub instance: AcquisitionInstance,
}

/// Outcome of an insert-if-absent on the parameter-set table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamInsert {
    pub param_id: ParamId,
    /// False when an identical set already existed.
    pub created: bool,
}

/// Number of instances referencing one parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamCount {
    pub param_id: ParamId,
    pub count: u64,
}

/// Instance count of one parameter set within its exact protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolCount {
    pub project: String,
    pub sequence_name: String,
    pub param_id: ParamId,
    pub count: u64,
}

/// Storage contract for acquisition history.
///
/// Every dedup operation is a single atomic insert-if-absent: callers never
/// need a separate find before inserting.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Return the id of `params`, inserting it with the next id if unseen.
    async fn find_or_insert_params(&self, params: &ParamSet) -> Result<ParamInsert>;

    /// Exact 16-field lookup without inserting.
    async fn find_params(&self, params: &ParamSet) -> Result<Option<ParamId>>;

    async fn get_params(&self, id: ParamId) -> Result<Option<ParamSet>>;

    async fn has_instance(&self, key: &InstanceKey) -> Result<bool>;

    /// Append `instance` unless one with the same key exists. Returns whether it was written.
    async fn insert_instance_if_absent(&self, instance: &AcquisitionInstance) -> Result<bool>;

    /// Instances whose acquisition day is strictly after `cutoff`, in insertion order.
    async fn instances_since(&self, cutoff: NaiveDate) -> Result<Vec<StoredInstance>>;

    /// Instance counts per parameter set among sets matching both patterns.
    /// No particular order is guaranteed.
    async fn count_by_param(
        &self,
        project: &ProtocolPattern,
        sequence: &ProtocolPattern,
    ) -> Result<Vec<ParamCount>>;

    /// Instance counts for every parameter set, with its exact protocol names.
    async fn count_by_protocol(&self) -> Result<Vec<ProtocolCount>>;

    /// Latest acquisition day among projects matching `project`.
    async fn latest_acq_day(&self, project: &ProtocolPattern) -> Result<Option<NaiveDate>>;

    fn backend_name(&self) -> &'static str;
}
