use std::collections::BTreeSet;

use tracing::debug;

use mrqa_core::{field_or_null, FieldMap, ParamField};
use mrqa_store::{ProtocolPattern, StoredInstance, TemplateInferencer, TemplateTable};

use crate::compare::Comparator;
use crate::record::ComplianceRecord;
use crate::rules::CheckContext;

/// Looks up the template of a header's protocol and compares against it.
#[derive(Clone)]
pub struct TemplateChecker {
    inferencer: TemplateInferencer,
    comparator: Comparator,
    allow_null: BTreeSet<ParamField>,
}

impl TemplateChecker {
    pub fn new(
        inferencer: TemplateInferencer,
        comparator: Comparator,
        allow_null: BTreeSet<ParamField>,
    ) -> Self {
        Self {
            inferencer,
            comparator,
            allow_null,
        }
    }

    pub fn inferencer(&self) -> &TemplateInferencer {
        &self.inferencer
    }

    /// Compare a header against the template of its exact (Project, SequenceName).
    pub async fn check_header(
        &self,
        fields: &FieldMap,
        ctx: CheckContext,
    ) -> mrqa_store::Result<ComplianceRecord> {
        let project = ProtocolPattern::exact(field_or_null(fields, ParamField::Project.as_str()))?;
        let sequence =
            ProtocolPattern::exact(field_or_null(fields, ParamField::SequenceName.as_str()))?;
        let template = self
            .inferencer
            .template_for(&project, &sequence)
            .await?
            .map(|t| t.params.to_field_map());
        Ok(self.compare(template.as_ref(), fields, ctx))
    }

    /// Compare against a precomputed table; no storage access.
    pub fn check_with_table(
        &self,
        table: &TemplateTable,
        fields: &FieldMap,
        ctx: CheckContext,
    ) -> ComplianceRecord {
        let template = table
            .get(
                field_or_null(fields, ParamField::Project.as_str()),
                field_or_null(fields, ParamField::SequenceName.as_str()),
            )
            .map(|t| t.params.to_field_map());
        self.compare(template.as_ref(), fields, ctx)
    }

    /// Rebuild a stored acquisition's header and check it in batch context.
    pub async fn check_stored(
        &self,
        table: &TemplateTable,
        stored: &StoredInstance,
    ) -> mrqa_store::Result<ComplianceRecord> {
        let fields = self.stored_fields(stored).await?;
        Ok(self.check_with_table(table, &fields, CheckContext::Batch))
    }

    /// Parameter set plus instance columns of a stored acquisition.
    pub async fn stored_fields(&self, stored: &StoredInstance) -> mrqa_store::Result<FieldMap> {
        let param_id = stored.instance.param_id;
        let params = self
            .inferencer
            .store()
            .param_set(param_id)
            .await?
            .ok_or(mrqa_store::StoreError::ParamSetNotFound(param_id))?;
        let mut fields = params.to_field_map();
        fields.extend(stored.instance.to_field_map());
        Ok(fields)
    }

    fn compare(
        &self,
        template: Option<&FieldMap>,
        fields: &FieldMap,
        ctx: CheckContext,
    ) -> ComplianceRecord {
        let record = self.comparator.compare(template, fields, ctx, &self.allow_null);
        if !record.has_template() {
            debug!(
                project = field_or_null(fields, ParamField::Project.as_str()),
                sequence = field_or_null(fields, ParamField::SequenceName.as_str()),
                "no template, nothing to compare"
            );
        }
        record
    }
}
