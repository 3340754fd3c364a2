//! JSON-LD output for members
//!
//! [`JsonLdFramer`] builds one JSON object per member, rooted at the member
//! identifier with referenced nodes embedded in place. [`flatten`] produces the
//! unframed form: one node object per subject, in first-appearance order.
//!
//! Property keys are compacted against the configured context using exact term
//! matches first and then namespace prefixes. Named graphs are merged into the
//! default graph.

use crate::rdf::{vocab, Quad, Term};
use crate::stream::Framer;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

/// Nesting limit for embedded nodes; deeper references stay `{"@id": ...}`
pub const MAX_EMBED_DEPTH: usize = 64;

/// Framer producing nested JSON objects rooted at the member
#[derive(Debug, Clone, Default)]
pub struct JsonLdFramer;

#[async_trait]
impl Framer for JsonLdFramer {
    async fn frame(&self, id: &str, quads: &[Quad], context: Option<&Value>) -> Result<Value> {
        Ok(frame_member(id, quads, context))
    }
}

/// Builds the framed object for `id`
pub fn frame_member(id: &str, quads: &[Quad], context: Option<&Value>) -> Value {
    let nodes = NodeMap::build(quads);
    let compactor = Compactor::new(context);

    let mut embedded = HashSet::new();
    let framed = match nodes.get(id) {
        Some(_) => nodes.embed(id, &mut embedded, 0),
        None => json!({ "@id": id }),
    };

    let mut framed = compactor.compact(framed);
    if let (Some(ctx), Value::Object(map)) = (context, &mut framed) {
        let ctx = match ctx {
            Value::Object(obj) if obj.contains_key("@context") => obj["@context"].clone(),
            other => other.clone(),
        };
        let mut with_context = Map::new();
        with_context.insert("@context".to_string(), ctx);
        with_context.extend(std::mem::take(map));
        *map = with_context;
    }
    framed
}

/// Produces the flat JSON-LD node array for a set of statements
pub fn flatten(quads: &[Quad]) -> Value {
    let nodes = NodeMap::build(quads);
    Value::Array(
        nodes
            .order
            .iter()
            .filter_map(|id| nodes.nodes.get(id))
            .map(|node| Value::Object(node.clone()))
            .collect(),
    )
}

fn node_id(term: &Term) -> String {
    match term {
        Term::BlankNode(label) => format!("_:{}", label),
        other => other.value().to_string(),
    }
}

fn value_object(term: &Term) -> Value {
    match term {
        Term::NamedNode(_) | Term::BlankNode(_) => json!({ "@id": node_id(term) }),
        Term::Literal {
            value,
            language: Some(lang),
            ..
        } => json!({ "@value": value, "@language": lang }),
        Term::Literal {
            value,
            datatype: Some(dt),
            ..
        } if dt != vocab::XSD_STRING && dt != vocab::RDF_LANG_STRING => {
            json!({ "@value": value, "@type": dt })
        }
        Term::Literal { value, .. } => Value::String(value.clone()),
        Term::DefaultGraph => Value::Null,
    }
}

fn reference_target(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get("@id").and_then(Value::as_str),
        _ => None,
    }
}

struct NodeMap {
    order: Vec<String>,
    nodes: HashMap<String, Map<String, Value>>,
}

impl NodeMap {
    fn build(quads: &[Quad]) -> Self {
        let mut order = Vec::new();
        let mut nodes: HashMap<String, Map<String, Value>> = HashMap::new();

        for quad in quads {
            let subject = node_id(&quad.subject);
            let node = nodes.entry(subject.clone()).or_insert_with(|| {
                order.push(subject.clone());
                let mut map = Map::new();
                map.insert("@id".to_string(), Value::String(subject.clone()));
                map
            });

            let (key, value) = if quad.predicate.value() == vocab::RDF_TYPE && quad.object.is_reference() {
                ("@type".to_string(), Value::String(node_id(&quad.object)))
            } else {
                (quad.predicate.value().to_string(), value_object(&quad.object))
            };

            let slot = node.entry(key).or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(values) = slot {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }

        Self { order, nodes }
    }

    fn get(&self, id: &str) -> Option<&Map<String, Value>> {
        self.nodes.get(id)
    }

    /// Embeds `id` with its referenced nodes, at most [`MAX_EMBED_DEPTH`] levels deep
    fn embed(&self, id: &str, embedded: &mut HashSet<String>, depth: usize) -> Value {
        embedded.insert(id.to_string());
        let Some(node) = self.nodes.get(id) else {
            return json!({ "@id": id });
        };

        let mut out = Map::new();
        for (key, value) in node {
            if key.starts_with('@') {
                out.insert(key.clone(), value.clone());
                continue;
            }
            let values = match value {
                Value::Array(values) => values
                    .iter()
                    .map(|v| match reference_target(v) {
                        Some(target)
                            if depth < MAX_EMBED_DEPTH
                                && self.nodes.contains_key(target)
                                && !embedded.contains(target) =>
                        {
                            self.embed(target, embedded, depth + 1)
                        }
                        _ => v.clone(),
                    })
                    .collect(),
                other => vec![other.clone()],
            };
            out.insert(key.clone(), Value::Array(values));
        }
        Value::Object(out)
    }
}

/// Compacts property IRIs using a JSON-LD context's term definitions
struct Compactor {
    terms: HashMap<String, String>,
    prefixes: Vec<(String, String)>,
}

impl Compactor {
    fn new(context: Option<&Value>) -> Self {
        let mut compactor = Self {
            terms: HashMap::new(),
            prefixes: Vec::new(),
        };
        if let Some(ctx) = context {
            compactor.collect(ctx);
        }
        // Longest namespace first so nested vocabularies win
        compactor
            .prefixes
            .sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
        compactor
    }

    fn collect(&mut self, ctx: &Value) {
        match ctx {
            Value::Array(items) => items.iter().for_each(|item| self.collect(item)),
            Value::Object(map) => {
                if let Some(inner) = map.get("@context") {
                    self.collect(inner);
                    return;
                }
                for (term, definition) in map {
                    if term.starts_with('@') {
                        continue;
                    }
                    let iri = match definition {
                        Value::String(iri) => iri.as_str(),
                        Value::Object(def) => match def.get("@id").and_then(Value::as_str) {
                            Some(iri) => iri,
                            None => continue,
                        },
                        _ => continue,
                    };
                    if iri.ends_with('/') || iri.ends_with('#') {
                        self.prefixes.push((term.clone(), iri.to_string()));
                    } else {
                        self.terms.insert(iri.to_string(), term.clone());
                    }
                }
            }
            _ => {}
        }
    }

    fn compact_iri(&self, iri: &str) -> String {
        if let Some(term) = self.terms.get(iri) {
            return term.clone();
        }
        for (prefix, namespace) in &self.prefixes {
            if let Some(local) = iri.strip_prefix(namespace.as_str()) {
                if !local.is_empty() {
                    return format!("{}:{}", prefix, local);
                }
            }
        }
        iri.to_string()
    }

    fn compact(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, value) in map {
                    let key = if key.starts_with('@') {
                        key
                    } else {
                        self.compact_iri(&key)
                    };
                    let value = match (key.as_str(), value) {
                        ("@type", Value::Array(types)) => Value::Array(
                            types
                                .into_iter()
                                .map(|t| match t {
                                    Value::String(iri) => Value::String(self.compact_iri(&iri)),
                                    other => other,
                                })
                                .collect(),
                        ),
                        (_, other) => self.compact(other),
                    };
                    out.insert(key, collapse(value));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.compact(v)).collect()),
            other => other,
        }
    }
}

fn collapse(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}
