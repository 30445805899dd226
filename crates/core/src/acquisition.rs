use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{CoreError, Result};
use crate::fields::*;

/// Stable identifier of a stored parameter set (starts at 1).
pub type ParamId = i64;

/// The 16 acquisition-invariant values of one acquisition, stored verbatim.
///
/// Two sets are the same set only when every value is byte-identical,
/// sentinel included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamSet {
    values: [String; PARAM_FIELD_COUNT],
}

impl ParamSet {
    pub fn new(values: [String; PARAM_FIELD_COUNT]) -> Self {
        Self { values }
    }

    /// Pick the invariant fields out of a header map; missing ones become the sentinel.
    pub fn from_fields(fields: &FieldMap) -> Self {
        Self {
            values: ParamField::ALL.map(|f| field_or_null(fields, f.as_str()).to_string()),
        }
    }

    pub fn get(&self, field: ParamField) -> &str {
        &self.values[field.index()]
    }

    pub fn set(&mut self, field: ParamField, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    pub fn project(&self) -> &str {
        self.get(ParamField::Project)
    }

    pub fn sequence_name(&self) -> &str {
        self.get(ParamField::SequenceName)
    }

    pub fn values(&self) -> &[String; PARAM_FIELD_COUNT] {
        &self.values
    }

    pub fn to_field_map(&self) -> FieldMap {
        ParamField::ALL
            .iter()
            .map(|f| (f.as_str().to_string(), self.get(*f).to_string()))
            .collect()
    }
}

/// Serialized as a `{field: value}` object in canonical field order.
impl Serialize for ParamSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(PARAM_FIELD_COUNT))?;
        for field in ParamField::ALL {
            map.serialize_entry(field.as_str(), self.get(field))?;
        }
        map.end()
    }
}

/// Identity of one physical acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    pub acq_time: String,
    pub acq_date: String,
    pub sub_id: String,
    pub series_number: String,
}

impl InstanceKey {
    /// Build the identity from a header map.
    ///
    /// Returns `None` if any of the four identity values is missing, blank, or
    /// the sentinel: an acquisition without a full identity is never stored.
    pub fn from_fields(fields: &FieldMap) -> Option<Self> {
        let key = Self {
            acq_time: field_or_null(fields, ACQ_TIME).to_string(),
            acq_date: field_or_null(fields, ACQ_DATE).to_string(),
            sub_id: field_or_null(fields, SUB_ID).to_string(),
            series_number: field_or_null(fields, SERIES_NUMBER).to_string(),
        };
        key.is_complete().then_some(key)
    }

    pub fn is_complete(&self) -> bool {
        [&self.acq_time, &self.acq_date, &self.sub_id, &self.series_number]
            .iter()
            .all(|v| !is_absent(v))
    }

    /// Calendar day of the acquisition, if `acq_date` parses.
    pub fn acq_day(&self) -> Option<NaiveDate> {
        parse_acq_date(&self.acq_date).ok()
    }
}

/// Per-acquisition values that are not part of the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDetails {
    pub operator: String,
    pub shims: String,
    pub station: String,
}

impl InstanceDetails {
    pub fn from_fields(fields: &FieldMap) -> Self {
        Self {
            operator: field_or_null(fields, OPERATOR).to_string(),
            shims: field_or_null(fields, SHIMS).to_string(),
            station: field_or_null(fields, STATION).to_string(),
        }
    }
}

/// An acquisition as written to the instance log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionInstance {
    pub key: InstanceKey,
    pub details: InstanceDetails,
    pub param_id: ParamId,
}

impl AcquisitionInstance {
    /// Flatten back into header-map form (instance fields only).
    pub fn to_field_map(&self) -> FieldMap {
        let pairs = [
            (ACQ_TIME, &self.key.acq_time),
            (ACQ_DATE, &self.key.acq_date),
            (SUB_ID, &self.key.sub_id),
            (SERIES_NUMBER, &self.key.series_number),
            (OPERATOR, &self.details.operator),
            (SHIMS, &self.details.shims),
            (STATION, &self.details.station),
        ];
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Parse a DICOM (`20240913`) or ISO (`2024-09-13`) acquisition date.
pub fn parse_acq_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| CoreError::InvalidDate(value.to_string()))
}
