//! Field-by-field conformance decision.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use mrqa_core::{field_or_null, FieldMap, ParamField, NULL_VALUE};

use crate::record::{ComplianceRecord, FieldMismatch};
use crate::rules::{CheckContext, ComparisonRules, FieldRule};

/// Applies [`ComparisonRules`] to (template, observed) pairs.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    rules: ComparisonRules,
}

impl Comparator {
    pub fn new(rules: ComparisonRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ComparisonRules {
        &self.rules
    }

    /// Compare `observed` against `template` over the 16 invariant fields.
    ///
    /// `extra_allowed_null` widens the realtime-optional set for this call.
    /// With no template the record conforms trivially.
    pub fn compare(
        &self,
        template: Option<&FieldMap>,
        observed: &FieldMap,
        ctx: CheckContext,
        extra_allowed_null: &BTreeSet<ParamField>,
    ) -> ComplianceRecord {
        let Some(template) = template.filter(|t| !t.is_empty()) else {
            return ComplianceRecord::without_template(observed.clone());
        };

        let mut errors = BTreeMap::new();
        for field in ParamField::ALL {
            let expected = field_or_null(template, field.as_str());
            let have = field_or_null(observed, field.as_str());

            if ctx == CheckContext::Realtime
                && have == NULL_VALUE
                && (self.rules.realtime_optional.contains(&field)
                    || extra_allowed_null.contains(&field))
            {
                continue;
            }

            if !values_match(self.rules.rule_for(field, ctx), expected, have) {
                debug!(%field, expected, have, "field does not conform");
                errors.insert(
                    field.as_str().to_string(),
                    FieldMismatch {
                        expected: expected.to_string(),
                        observed: have.to_string(),
                    },
                );
            }
        }

        ComplianceRecord {
            conforms: errors.is_empty(),
            errors,
            input: observed.clone(),
            template: template.clone(),
        }
    }
}

/// [`Comparator::compare`] with the built-in rules.
pub fn compare(
    template: Option<&FieldMap>,
    observed: &FieldMap,
    ctx: CheckContext,
    extra_allowed_null: &BTreeSet<ParamField>,
) -> ComplianceRecord {
    Comparator::default().compare(template, observed, ctx, extra_allowed_null)
}

fn values_match(rule: FieldRule, expected: &str, have: &str) -> bool {
    match rule {
        FieldRule::Exact => expected == have,
        FieldRule::TruncatedInt => match (truncated_int(expected), truncated_int(have)) {
            (Some(a), Some(b)) => a == b,
            _ => expected == have,
        },
        FieldRule::RoundedList { decimals } => {
            match (rounded_list(expected, decimals), rounded_list(have, decimals)) {
                (Some(a), Some(b)) => a == b,
                _ => expected == have,
            }
        }
    }
}

/// Integer part of a numeric value; the sentinel reads as 0.
fn truncated_int(value: &str) -> Option<i64> {
    if value == NULL_VALUE {
        return Some(0);
    }
    let parsed: f64 = value.trim().parse().ok()?;
    parsed.is_finite().then(|| parsed.trunc() as i64)
}

/// `"[2.00001, 0.0]"` or `"2.0,0.0"` as integers scaled by `10^decimals`.
fn rounded_list(value: &str, decimals: u32) -> Option<Vec<i64>> {
    let scale = 10f64.powi(i32::try_from(decimals).ok()?);
    let inner = value.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(|item| {
            let x: f64 = item.trim().parse().ok()?;
            x.is_finite().then(|| (x * scale).round() as i64)
        })
        .collect()
}
