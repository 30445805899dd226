//! One header-dump output line → one field map.

use mrqa_core::{FieldMap, DCM_PATH};

use crate::error::{ReaderError, Result};
use crate::taglist::TagList;

/// Tabs and newlines inside a value would break the line format.
pub fn sanitize_value(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

/// Parse `v1<TAB>v2...<TAB>path` in tag-list order.
///
/// The trailing path column is optional; when present it lands under
/// `dcm_path`.
pub fn parse_line(tags: &TagList, line: &str) -> Result<FieldMap> {
    let line = line.trim_end_matches(['\n', '\r']);
    let values: Vec<&str> = line.split('\t').collect();
    let expected = tags.len();
    if values.len() != expected && values.len() != expected + 1 {
        return Err(ReaderError::ColumnCount {
            expected: expected + 1,
            got: values.len(),
        });
    }

    let mut fields: FieldMap = tags
        .names()
        .iter()
        .zip(&values)
        .map(|(name, value)| (name.clone(), (*value).to_string()))
        .collect();
    if let Some(path) = values.get(expected) {
        fields.insert(DCM_PATH.to_string(), (*path).to_string());
    }
    Ok(fields)
}
