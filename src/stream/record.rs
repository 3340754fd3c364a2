use crate::rdf::Quad;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One emitted member
///
/// The serde form is the checkpoint buffer encoding: statements as
/// N-Triples term strings, objects as JSON, serialized text verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    /// The member's statements
    Quads { id: String, quads: Vec<Quad> },

    /// A framed (or flat JSON-LD) document
    Object { id: String, object: Value },

    /// Text in the configured media type, newline terminated
    Serialized(String),
}

impl Record {
    /// Returns the member identifier, if the representation carries one
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Quads { id, .. } | Self::Object { id, .. } => Some(id),
            Self::Serialized(_) => None,
        }
    }

    /// Renders the record as output text ending in a newline
    pub fn to_line(&self) -> serde_json::Result<String> {
        match self {
            Self::Serialized(text) if text.ends_with('\n') => Ok(text.clone()),
            Self::Serialized(text) => Ok(format!("{}\n", text)),
            other => Ok(format!("{}\n", serde_json::to_string(other)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::Term;
    use serde_json::json;

    #[test]
    fn test_checkpoint_encoding_distinguishes_shapes() {
        let records = vec![
            Record::Quads {
                id: "https://ex.org/m1".into(),
                quads: vec![Quad::new(
                    Term::named("https://ex.org/m1"),
                    Term::named("https://ex.org/p"),
                    Term::lang_literal("hallo", "nl"),
                )],
            },
            Record::Object {
                id: "https://ex.org/m2".into(),
                object: json!({"@id": "https://ex.org/m2", "name": "x"}),
            },
            Record::Serialized("<a> <b> <c> .\n".into()),
        ];

        let json = serde_json::to_string(&records).unwrap();
        let restored: Vec<Record> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, records);
    }

    #[test]
    fn test_quads_are_stored_as_term_strings() {
        let record = Record::Quads {
            id: "m".into(),
            quads: vec![Quad::new(
                Term::named("https://ex.org/s"),
                Term::named("https://ex.org/p"),
                Term::blank("b0"),
            )],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["quads"][0]["subject"], "<https://ex.org/s>");
        assert_eq!(value["quads"][0]["object"], "_:b0");
        assert_eq!(value["quads"][0]["graph"], "");
    }

    #[test]
    fn test_to_line() {
        let record = Record::Object {
            id: "m".into(),
            object: json!({"@id": "m"}),
        };
        assert_eq!(
            record.to_line().unwrap(),
            "{\"id\":\"m\",\"object\":{\"@id\":\"m\"}}\n"
        );
        assert_eq!(Record::Serialized("x\n".into()).to_line().unwrap(), "x\n");
        assert_eq!(Record::Serialized("x".into()).id(), None);
    }
}
