use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mrqa_core::FieldMap;

/// One field that failed its rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    #[serde(rename = "expect")]
    pub expected: String,
    #[serde(rename = "have")]
    pub observed: String,
}

/// Outcome of comparing one header against its template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub conforms: bool,
    pub errors: BTreeMap<String, FieldMismatch>,
    pub input: FieldMap,
    /// Empty when no template exists for the protocol.
    pub template: FieldMap,
}

impl ComplianceRecord {
    /// Nothing to compare against: conforms by default.
    pub fn without_template(input: FieldMap) -> Self {
        Self {
            conforms: true,
            errors: BTreeMap::new(),
            input,
            template: FieldMap::new(),
        }
    }

    pub fn has_template(&self) -> bool {
        !self.template.is_empty()
    }

    /// Names of the non-conforming fields, comma separated.
    pub fn error_summary(&self) -> String {
        self.errors.keys().map(String::as_str).collect::<Vec<_>>().join(",")
    }
}
