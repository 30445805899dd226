use serde::{Deserialize, Serialize};

use mrqa_compliance::ComplianceRecord;

/// Payload pushed to live subscribers.
///
/// Serialized as `{"type": "new"|"update", "station": .., "content": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveEvent {
    /// First header of a new series on this station, with its check.
    New {
        station: String,
        content: ComplianceRecord,
    },
    /// Another file of the series already reported; `content` is the repeat count.
    Update { station: String, content: u64 },
}

impl LiveEvent {
    pub fn station(&self) -> &str {
        match self {
            LiveEvent::New { station, .. } | LiveEvent::Update { station, .. } => station,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrqa_core::FieldMap;

    #[test]
    fn wire_shape() {
        let update = LiveEvent::Update {
            station: "AWP167046".into(),
            content: 3,
        };
        let json: serde_json::Value = serde_json::from_str(&update.to_json()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "update", "station": "AWP167046", "content": 3})
        );

        let new = LiveEvent::New {
            station: "AWP167046".into(),
            content: ComplianceRecord::without_template(FieldMap::new()),
        };
        let json: serde_json::Value = serde_json::from_str(&new.to_json()).unwrap();
        assert_eq!(json["type"], "new");
        assert_eq!(json["content"]["conforms"], true);
    }
}
