//! RDF terms and statements
//!
//! The stream core only needs a small slice of RDF: it must tell references
//! (named and blank nodes) apart from literal values, index statements by
//! subject, and persist statements inside checkpoints. Terms therefore
//! serialize to their N-Triples string form, one string per term.
//!
//! - `nquads`: line-based N-Quads/N-Triples parser and serializer
//! - `jsonld`: member framing and flat JSON-LD output

pub mod jsonld;
pub mod nquads;

pub use jsonld::JsonLdFramer;
pub use nquads::{NQuadsParser, QuadSerializer};

use crate::TideError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Well-known IRIs used by the stream and the default collaborators
pub mod vocab {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

    pub const TREE_RELATION: &str = "https://w3id.org/tree#relation";
    pub const TREE_NODE: &str = "https://w3id.org/tree#node";
    pub const TREE_VALUE: &str = "https://w3id.org/tree#value";
    pub const TREE_MEMBER: &str = "https://w3id.org/tree#member";
    pub const TREE_VIEW: &str = "https://w3id.org/tree#view";
    pub const TREE_LESS_THAN_RELATION: &str = "https://w3id.org/tree#LessThanRelation";

    pub const PROV_GENERATED_AT_TIME: &str = "http://www.w3.org/ns/prov#generatedAtTime";
}

/// A single RDF term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// An IRI reference
    NamedNode(String),

    /// A document-scoped blank node label (without the `_:` prefix)
    BlankNode(String),

    /// A literal value with an optional datatype or language tag
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },

    /// The default graph (only valid in graph position)
    DefaultGraph,
}

impl Term {
    pub fn named(iri: impl Into<String>) -> Self {
        Self::NamedNode(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Self::BlankNode(label.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Returns the lexical value of the term (IRI, blank label or literal text)
    pub fn value(&self) -> &str {
        match self {
            Self::NamedNode(iri) => iri,
            Self::BlankNode(label) => label,
            Self::Literal { value, .. } => value,
            Self::DefaultGraph => "",
        }
    }

    /// Returns the identifier used to key resources: the IRI of a named node,
    /// `_:label` for a blank node, the lexical value otherwise
    pub fn key(&self) -> String {
        match self {
            Self::BlankNode(label) => format!("_:{}", label),
            other => other.value().to_string(),
        }
    }

    /// Returns true if the term points at another resource rather than
    /// carrying a plain value
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::NamedNode(_) | Self::BlankNode(_))
    }

    pub fn is_named_node(&self) -> bool {
        matches!(self, Self::NamedNode(_))
    }

    pub fn is_default_graph(&self) -> bool {
        matches!(self, Self::DefaultGraph)
    }

    /// Renders the term in N-Triples syntax
    ///
    /// The default graph renders as the empty string.
    pub fn to_term_string(&self) -> String {
        match self {
            Self::NamedNode(iri) => format!("<{}>", iri),
            Self::BlankNode(label) => format!("_:{}", label),
            Self::Literal {
                value,
                datatype,
                language,
            } => {
                let mut out = String::with_capacity(value.len() + 2);
                out.push('"');
                out.push_str(&nquads::escape_literal(value));
                out.push('"');
                if let Some(lang) = language {
                    out.push('@');
                    out.push_str(lang);
                } else if let Some(dt) = datatype.as_deref().filter(|dt| *dt != vocab::XSD_STRING) {
                    out.push_str("^^<");
                    out.push_str(dt);
                    out.push('>');
                }
                out
            }
            Self::DefaultGraph => String::new(),
        }
    }

    /// Parses a term from its N-Triples string form
    pub fn from_term_string(input: &str) -> Result<Self, TideError> {
        if input.is_empty() {
            return Ok(Self::DefaultGraph);
        }
        nquads::parse_single_term(input)
            .map_err(|message| TideError::InvalidTerm(format!("{}: {}", input, message)))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term_string())
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_term_string())
    }
}

impl<'de> Deserialize<'de> for Term {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Term::from_term_string(&raw).map_err(serde::de::Error::custom)
    }
}

/// A subject/predicate/object/graph statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub graph: Term,
}

impl Quad {
    /// Creates a statement in the default graph
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: Term::DefaultGraph,
        }
    }

    pub fn in_graph(mut self, graph: Term) -> Self {
        self.graph = graph;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_string_forms() {
        assert_eq!(
            Term::named("http://example.org/a").to_term_string(),
            "<http://example.org/a>"
        );
        assert_eq!(Term::blank("b0").to_term_string(), "_:b0");
        assert_eq!(Term::literal("hi").to_term_string(), "\"hi\"");
        assert_eq!(
            Term::lang_literal("hallo", "nl").to_term_string(),
            "\"hallo\"@nl"
        );
        assert_eq!(
            Term::typed_literal("5", "http://www.w3.org/2001/XMLSchema#integer").to_term_string(),
            "\"5\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        assert_eq!(Term::DefaultGraph.to_term_string(), "");
    }

    #[test]
    fn test_term_from_string_handles_escapes() {
        let term = Term::from_term_string("\"line\\nbreak \\\"quoted\\\"\"").unwrap();
        assert_eq!(term, Term::literal("line\nbreak \"quoted\""));
        assert_eq!(Term::from_term_string("").unwrap(), Term::DefaultGraph);
        assert!(Term::from_term_string("not a term").is_err());
    }

    #[test]
    fn test_is_reference() {
        assert!(Term::named("http://example.org/a").is_reference());
        assert!(Term::blank("x").is_reference());
        assert!(!Term::literal("x").is_reference());
        assert!(!Term::DefaultGraph.is_reference());
    }

    #[test]
    fn test_quad_json_uses_term_strings() {
        let quad = Quad::new(
            Term::named("http://example.org/s"),
            Term::named("http://example.org/p"),
            Term::lang_literal("o", "en"),
        );
        let json = serde_json::to_value(&quad).unwrap();
        assert_eq!(json["subject"], "<http://example.org/s>");
        assert_eq!(json["object"], "\"o\"@en");
        assert_eq!(json["graph"], "");

        let back: Quad = serde_json::from_value(json).unwrap();
        assert_eq!(back, quad);
    }
}
