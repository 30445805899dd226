use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Marker for a header value that could not be read.
///
/// Matches the missing-value text of the legacy header-dump tools; consumers
/// pattern-match on this exact string, so it is never replaced by `None`.
pub const NULL_VALUE: &str = "null";

/// Flat header map: field name to its exact string value.
pub type FieldMap = BTreeMap<String, String>;

// ── Instance (per-acquisition) fields ─────────────────────────

pub const ACQ_TIME: &str = "AcqTime";
pub const ACQ_DATE: &str = "AcqDate";
pub const SUB_ID: &str = "SubID";
pub const SERIES_NUMBER: &str = "SeriesNumber";
pub const OPERATOR: &str = "Operator";
pub const SHIMS: &str = "Shims";
pub const STATION: &str = "Station";

/// Path echo added by field readers.
pub const DCM_PATH: &str = "dcm_path";

/// Fields that change with every acquisition (identity plus bookkeeping).
pub const INSTANCE_FIELDS: [&str; 7] =
    [ACQ_TIME, ACQ_DATE, SUB_ID, SERIES_NUMBER, OPERATOR, SHIMS, STATION];

/// Acquisition-invariant parameters: expected identical for every acquisition
/// of the same Project × SequenceName.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamField {
    Project,
    SequenceName,
    #[serde(rename = "iPAT")]
    IPat,
    Comments,
    SequenceType,
    #[serde(rename = "PED_major")]
    PedMajor,
    Phase,
    #[serde(rename = "TR")]
    Tr,
    #[serde(rename = "TE")]
    Te,
    Matrix,
    PixelResol,
    #[serde(rename = "BWP")]
    Bwp,
    #[serde(rename = "BWPPE")]
    Bwppe,
    #[serde(rename = "FA")]
    Fa,
    #[serde(rename = "TA")]
    Ta,
    FoV,
}

pub const PARAM_FIELD_COUNT: usize = 16;

impl ParamField {
    /// Canonical order; also the column order of the parameter-set table.
    pub const ALL: [ParamField; PARAM_FIELD_COUNT] = [
        ParamField::Project,
        ParamField::SequenceName,
        ParamField::IPat,
        ParamField::Comments,
        ParamField::SequenceType,
        ParamField::PedMajor,
        ParamField::Phase,
        ParamField::Tr,
        ParamField::Te,
        ParamField::Matrix,
        ParamField::PixelResol,
        ParamField::Bwp,
        ParamField::Bwppe,
        ParamField::Fa,
        ParamField::Ta,
        ParamField::FoV,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamField::Project => "Project",
            ParamField::SequenceName => "SequenceName",
            ParamField::IPat => "iPAT",
            ParamField::Comments => "Comments",
            ParamField::SequenceType => "SequenceType",
            ParamField::PedMajor => "PED_major",
            ParamField::Phase => "Phase",
            ParamField::Tr => "TR",
            ParamField::Te => "TE",
            ParamField::Matrix => "Matrix",
            ParamField::PixelResol => "PixelResol",
            ParamField::Bwp => "BWP",
            ParamField::Bwppe => "BWPPE",
            ParamField::Fa => "FA",
            ParamField::Ta => "TA",
            ParamField::FoV => "FoV",
        }
    }

    /// Position in [`ParamField::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| CoreError::UnknownField(s.to_string()))
    }
}

/// Value of `name` in `fields`, or the sentinel when absent.
pub fn field_or_null<'a>(fields: &'a FieldMap, name: &str) -> &'a str {
    fields.get(name).map(String::as_str).unwrap_or(NULL_VALUE)
}

/// True when a value is the sentinel or carries no content.
pub fn is_absent(value: &str) -> bool {
    value == NULL_VALUE || value.trim().is_empty()
}

/// A field map for `path` in which every recognized field is the sentinel.
pub fn null_fields<'a>(names: impl IntoIterator<Item = &'a str>, path: &str) -> FieldMap {
    let mut fields: FieldMap = names
        .into_iter()
        .map(|n| (n.to_string(), NULL_VALUE.to_string()))
        .collect();
    fields.insert(DCM_PATH.to_string(), path.to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip_through_from_str() {
        for field in ParamField::ALL {
            assert_eq!(field.as_str().parse::<ParamField>().unwrap(), field);
        }
        assert!("tr".parse::<ParamField>().is_err());
    }

    #[test]
    fn index_matches_canonical_order() {
        for (i, field) in ParamField::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
    }

    #[test]
    fn serde_uses_header_names() {
        let json = serde_json::to_string(&ParamField::PedMajor).unwrap();
        assert_eq!(json, "\"PED_major\"");
        let back: ParamField = serde_json::from_str("\"iPAT\"").unwrap();
        assert_eq!(back, ParamField::IPat);
    }

    #[test]
    fn missing_fields_read_as_sentinel() {
        let mut fields = FieldMap::new();
        fields.insert("TR".into(), "1300".into());
        assert_eq!(field_or_null(&fields, "TR"), "1300");
        assert_eq!(field_or_null(&fields, "TE"), NULL_VALUE);
    }

    #[test]
    fn null_fields_echo_path() {
        let fields = null_fields(["TR", "TE"], "/data/x.dcm");
        assert_eq!(fields["TR"], NULL_VALUE);
        assert_eq!(fields["TE"], NULL_VALUE);
        assert_eq!(fields[DCM_PATH], "/data/x.dcm");
    }
}
