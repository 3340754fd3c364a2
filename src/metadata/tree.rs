//! TREE vocabulary metadata extractor

use crate::metadata::{Collection, FeedMetadata, Relation};
use crate::rdf::{vocab, Quad};
use crate::stream::MetadataExtractor;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Reads `tree:relation`, `tree:member` and `tree:view` statements
#[derive(Debug, Clone, Default)]
pub struct TreeMetadataExtractor;

#[async_trait]
impl MetadataExtractor for TreeMetadataExtractor {
    async fn extract(&self, quads: &[Quad], _url: &str) -> Result<FeedMetadata> {
        Ok(extract_tree_metadata(quads))
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Extracts relations and collections from a page's statements
pub fn extract_tree_metadata(quads: &[Quad]) -> FeedMetadata {
    let mut relation_order: Vec<String> = Vec::new();
    let mut collection_order: Vec<String> = Vec::new();
    let mut collections: HashMap<String, Collection> = HashMap::new();

    // First pass: which nodes are relations, which subjects are collections
    for quad in quads {
        match quad.predicate.value() {
            vocab::TREE_RELATION if quad.object.is_reference() => {
                push_unique(&mut relation_order, quad.object.key());
            }
            vocab::TREE_MEMBER | vocab::TREE_VIEW if quad.object.is_reference() => {
                let id = quad.subject.key();
                let collection = collections.entry(id.clone()).or_insert_with(|| {
                    collection_order.push(id.clone());
                    Collection {
                        id,
                        ..Collection::default()
                    }
                });
                let target = quad.object.key();
                if quad.predicate.value() == vocab::TREE_MEMBER {
                    push_unique(&mut collection.members, target);
                } else {
                    push_unique(&mut collection.views, target);
                }
            }
            _ => {}
        }
    }

    let mut relations: HashMap<String, Relation> = relation_order
        .iter()
        .map(|id| {
            (
                id.clone(),
                Relation {
                    id: id.clone(),
                    types: Vec::new(),
                    nodes: Vec::new(),
                    values: Vec::new(),
                },
            )
        })
        .collect();

    // Second pass: describe each relation node
    for quad in quads {
        let Some(relation) = relations.get_mut(&quad.subject.key()) else {
            continue;
        };
        match quad.predicate.value() {
            vocab::RDF_TYPE => push_unique(&mut relation.types, quad.object.key()),
            vocab::TREE_NODE if quad.object.is_reference() => {
                push_unique(&mut relation.nodes, quad.object.key())
            }
            vocab::TREE_VALUE => relation.values.push(quad.object.value().to_string()),
            _ => {}
        }
    }

    FeedMetadata {
        relations: relation_order
            .iter()
            .filter_map(|id| relations.remove(id))
            .collect(),
        collections: collection_order
            .iter()
            .filter_map(|id| collections.remove(id))
            .collect(),
    }
}
