//! Template inference: the most frequently observed parameter set of a
//! protocol is its reference.
//!
//! Templates are never materialized. Every lookup aggregates the instance log;
//! the live path keeps a [`TemplateTable`] it recomputes on a timer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use mrqa_core::{ParamId, ParamSet};

use crate::backend::{ParamCount, ProtocolCount};
use crate::error::{Result, StoreError};
use crate::params::ParameterStore;
use crate::pattern::ProtocolPattern;

/// Reference parameter set of one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub param_id: ParamId,
    /// Instances referencing this set within the matched protocol(s).
    pub instance_count: u64,
    pub params: ParamSet,
}

/// Highest count wins; equal counts go to the lowest id.
fn pick_winner<I: IntoIterator<Item = ParamCount>>(counts: I) -> Option<ParamCount> {
    counts
        .into_iter()
        .filter(|c| c.count > 0)
        .min_by(|a, b| b.count.cmp(&a.count).then(a.param_id.cmp(&b.param_id)))
}

#[derive(Clone)]
pub struct TemplateInferencer {
    store: ParameterStore,
}

impl TemplateInferencer {
    pub fn new(store: ParameterStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Template of the protocols matching both patterns.
    ///
    /// `Ok(None)` when no stored acquisition matches: nothing to compare against.
    pub async fn get_template(&self, project: &str, sequence: &str) -> Result<Option<Template>> {
        let project = ProtocolPattern::new(project)?;
        let sequence = ProtocolPattern::new(sequence)?;
        self.template_for(&project, &sequence).await
    }

    pub async fn template_for(
        &self,
        project: &ProtocolPattern,
        sequence: &ProtocolPattern,
    ) -> Result<Option<Template>> {
        let counts = self.store.backend().count_by_param(project, sequence).await?;
        let Some(winner) = pick_winner(counts) else {
            debug!(%project, %sequence, "no acquisitions, no template");
            return Ok(None);
        };
        let params = self
            .store
            .param_set(winner.param_id)
            .await?
            .ok_or(StoreError::ParamSetNotFound(winner.param_id))?;
        Ok(Some(Template {
            param_id: winner.param_id,
            instance_count: winner.count,
            params,
        }))
    }

    /// Whether `param_id` is currently the template of its own protocol.
    pub async fn is_template(&self, param_id: ParamId) -> Result<bool> {
        let Some(params) = self.store.param_set(param_id).await? else {
            return Ok(false);
        };
        let project = ProtocolPattern::exact(params.project())?;
        let sequence = ProtocolPattern::exact(params.sequence_name())?;
        let template = self.template_for(&project, &sequence).await?;
        Ok(template.is_some_and(|t| t.param_id == param_id))
    }

    /// Every protocol's template, from one grouped count over the whole log.
    pub async fn recompute(&self) -> Result<TemplateTable> {
        let counts = self.store.backend().count_by_protocol().await?;

        let mut grouped: HashMap<(String, String), Vec<ParamCount>> = HashMap::new();
        for ProtocolCount {
            project,
            sequence_name,
            param_id,
            count,
        } in counts
        {
            grouped
                .entry((project, sequence_name))
                .or_default()
                .push(ParamCount { param_id, count });
        }

        let mut by_protocol = HashMap::with_capacity(grouped.len());
        for (protocol, counts) in grouped {
            let Some(winner) = pick_winner(counts) else {
                continue;
            };
            let params = self
                .store
                .param_set(winner.param_id)
                .await?
                .ok_or(StoreError::ParamSetNotFound(winner.param_id))?;
            by_protocol.insert(
                protocol,
                Template {
                    param_id: winner.param_id,
                    instance_count: winner.count,
                    params,
                },
            );
        }

        info!(templates = by_protocol.len(), "template table recomputed");
        Ok(TemplateTable {
            by_protocol,
            computed_at: Utc::now(),
        })
    }
}

/// Snapshot of all templates keyed by exact (Project, SequenceName).
#[derive(Debug, Clone)]
pub struct TemplateTable {
    by_protocol: HashMap<(String, String), Template>,
    computed_at: DateTime<Utc>,
}

impl Default for TemplateTable {
    fn default() -> Self {
        Self {
            by_protocol: HashMap::new(),
            computed_at: Utc::now(),
        }
    }
}

impl TemplateTable {
    pub fn get(&self, project: &str, sequence: &str) -> Option<&Template> {
        self.by_protocol
            .get(&(project.to_string(), sequence.to_string()))
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn len(&self) -> usize {
        self.by_protocol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_protocol.is_empty()
    }
}
