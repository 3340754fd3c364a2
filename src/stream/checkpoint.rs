use serde::{Deserialize, Serialize};

/// Serialized traversal state
///
/// Each field is an independent JSON document: the fragment registry, the
/// buffered-but-undelivered records, and the seen-set keys (least recently
/// used first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub bookkeeper: String,
    pub member_buffer: String,
    #[serde(rename = "processedURIs")]
    pub processed_uris: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        let checkpoint = Checkpoint {
            bookkeeper: "[]".into(),
            member_buffer: "[]".into(),
            processed_uris: "[]".into(),
        };
        let value = serde_json::to_value(&checkpoint).unwrap();
        assert!(value.get("memberBuffer").is_some());
        assert!(value.get("processedURIs").is_some());

        let restored: Checkpoint = serde_json::from_value(value).unwrap();
        assert_eq!(restored, checkpoint);
    }
}
