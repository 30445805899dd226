//! Conformance of one acquisition's parameters against its protocol template.
//!
//! - [`ComparisonRules`]: validated per-field tolerance rules, loadable from YAML
//! - [`Comparator`]: field-by-field decision producing a [`ComplianceRecord`]
//! - [`TemplateChecker`]: template lookup plus comparison for headers and stored rows

pub mod checker;
pub mod compare;
pub mod error;
pub mod record;
pub mod rules;

pub use checker::TemplateChecker;
pub use compare::{compare, Comparator};
pub use error::{Result, RulesError};
pub use record::{ComplianceRecord, FieldMismatch};
pub use rules::{parse_field_list, CheckContext, ComparisonRules, FieldRule};
