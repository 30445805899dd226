//! Comparison rules: which tolerance each field gets, and when.
//!
//! Rules start from built-in defaults and may be overridden per field by a
//! YAML document:
//!
//! ```yaml
//! fields:
//!   TR: { rule: truncated_int }
//!   PixelResol: { rule: rounded_list, decimals: 3 }
//! realtime_optional: [FoV, TA, BWPPE]
//! fuzzy_contexts: [realtime]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use mrqa_core::ParamField;

use crate::error::{Result, RulesError};

/// Largest `rounded_list` precision accepted; beyond this f64 scaling loses meaning.
pub const MAX_DECIMALS: u32 = 9;

/// Where a comparison runs. Realtime headers come straight off the scanner
/// and are known to lack some fields that archived files carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckContext {
    Batch,
    Realtime,
}

/// Equality rule for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    /// Byte-for-byte string equality.
    Exact,
    /// Parse as float (sentinel = 0), drop the fraction, compare integers.
    TruncatedInt,
    /// Parse a `[a, b]` or `a,b` list, round each to `decimals` places.
    RoundedList { decimals: u32 },
}

impl FieldRule {
    /// Rules that only apply in the contexts listed in `fuzzy_contexts`.
    pub fn is_fuzzy(self) -> bool {
        matches!(self, FieldRule::RoundedList { .. })
    }
}

/// Rules document as written on disk. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesDocument {
    #[serde(default)]
    fields: BTreeMap<ParamField, FieldRule>,
    realtime_optional: Option<BTreeSet<ParamField>>,
    fuzzy_contexts: Option<BTreeSet<CheckContext>>,
}

/// Validated comparison configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRules {
    /// Fields absent here compare exactly.
    pub rules: BTreeMap<ParamField, FieldRule>,
    /// Fields that may be missing from a realtime header without error.
    pub realtime_optional: BTreeSet<ParamField>,
    /// Contexts in which fuzzy rules apply; elsewhere they fall back to exact.
    pub fuzzy_contexts: BTreeSet<CheckContext>,
}

impl Default for ComparisonRules {
    fn default() -> Self {
        Self {
            rules: BTreeMap::from([
                (ParamField::Tr, FieldRule::TruncatedInt),
                (ParamField::PixelResol, FieldRule::RoundedList { decimals: 3 }),
            ]),
            realtime_optional: BTreeSet::from([ParamField::FoV, ParamField::Ta, ParamField::Bwppe]),
            fuzzy_contexts: BTreeSet::from([CheckContext::Realtime]),
        }
    }
}

impl ComparisonRules {
    /// Defaults overlaid with a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let doc: RulesDocument = serde_yaml::from_str(yaml)?;
        let mut rules = Self::default();
        rules.rules.extend(doc.fields);
        if let Some(optional) = doc.realtime_optional {
            rules.realtime_optional = optional;
        }
        if let Some(contexts) = doc.fuzzy_contexts {
            rules.fuzzy_contexts = contexts;
        }
        rules.validate()?;
        Ok(rules)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::from_yaml_str(&yaml)?;
        info!(path = %path.display(), fields = rules.rules.len(), "comparison rules loaded");
        Ok(rules)
    }

    /// Built-in defaults, or the file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, rule) in &self.rules {
            if let FieldRule::RoundedList { decimals } = rule {
                if *decimals > MAX_DECIMALS {
                    return Err(RulesError::TooManyDecimals {
                        field: field.to_string(),
                        decimals: *decimals,
                        max: MAX_DECIMALS,
                    });
                }
            }
        }
        Ok(())
    }

    /// Rule in force for `field` under `ctx`.
    pub fn rule_for(&self, field: ParamField, ctx: CheckContext) -> FieldRule {
        let rule = self.rules.get(&field).copied().unwrap_or(FieldRule::Exact);
        if rule.is_fuzzy() && !self.fuzzy_contexts.contains(&ctx) {
            FieldRule::Exact
        } else {
            rule
        }
    }
}

/// Parse configured field names (e.g. `MRQA_ALLOW_NULL`) into a field set.
pub fn parse_field_list<S: AsRef<str>>(names: &[S]) -> Result<BTreeSet<ParamField>> {
    names
        .iter()
        .map(|n| {
            n.as_ref()
                .parse::<ParamField>()
                .map_err(|_| RulesError::UnknownField(n.as_ref().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_behavior() {
        let rules = ComparisonRules::default();
        assert_eq!(rules.rule_for(ParamField::Tr, CheckContext::Batch), FieldRule::TruncatedInt);
        assert_eq!(
            rules.rule_for(ParamField::PixelResol, CheckContext::Realtime),
            FieldRule::RoundedList { decimals: 3 }
        );
        assert_eq!(rules.rule_for(ParamField::PixelResol, CheckContext::Batch), FieldRule::Exact);
        assert_eq!(rules.rule_for(ParamField::IPat, CheckContext::Realtime), FieldRule::Exact);
    }

    #[test]
    fn yaml_overrides_single_fields() {
        let yaml = r#"
fields:
  TE: { rule: truncated_int }
fuzzy_contexts: [batch, realtime]
"#;
        let rules = ComparisonRules::from_yaml_str(yaml).unwrap();
        assert_eq!(rules.rule_for(ParamField::Te, CheckContext::Batch), FieldRule::TruncatedInt);
        assert_eq!(rules.rule_for(ParamField::Tr, CheckContext::Batch), FieldRule::TruncatedInt);
        assert_eq!(
            rules.rule_for(ParamField::PixelResol, CheckContext::Batch),
            FieldRule::RoundedList { decimals: 3 }
        );
        assert_eq!(rules.realtime_optional, ComparisonRules::default().realtime_optional);
    }

    #[test]
    fn unknown_field_names_are_rejected() {
        let err = ComparisonRules::from_yaml_str("fields:\n  Tr: { rule: exact }\n").unwrap_err();
        assert!(matches!(err, RulesError::Parse(_)));

        let err = ComparisonRules::from_yaml_str("colour: blue\n").unwrap_err();
        assert!(matches!(err, RulesError::Parse(_)));
    }

    #[test]
    fn excessive_decimals_are_rejected() {
        let yaml = "fields:\n  PixelResol: { rule: rounded_list, decimals: 12 }\n";
        let err = ComparisonRules::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, RulesError::TooManyDecimals { decimals: 12, .. }));
    }

    #[test]
    fn field_lists_parse_known_names_only() {
        let set = parse_field_list(&["TR", "FoV"]).unwrap();
        assert!(set.contains(&ParamField::Tr));
        assert!(matches!(
            parse_field_list(&["Nope"]),
            Err(RulesError::UnknownField(name)) if name == "Nope"
        ));
    }
}
