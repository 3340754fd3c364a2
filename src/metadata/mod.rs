//! Feed metadata extracted from a fragment
//!
//! The stream core only reads three things from a parsed page: relation
//! targets (to discover further fragments), collection member lists (to find
//! candidate members), and collection views (to pivot from a collection URI to
//! its first page). This module defines those shapes and the default TREE
//! vocabulary extractor.

mod tree;

pub use tree::TreeMetadataExtractor;

use serde::Serialize;

/// A typed link from one fragment to others
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relation {
    /// Identifier of the relation node itself
    pub id: String,

    /// Relation types (e.g. `tree:LessThanRelation`)
    pub types: Vec<String>,

    /// Target fragment identifiers
    pub nodes: Vec<String>,

    /// Lexical values bound to the relation (pruning conditions)
    pub values: Vec<String>,
}

impl Relation {
    /// Returns the first type, the one used for pruning decisions
    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }
}

/// A collection declared on a fragment
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Collection {
    /// The collection identifier
    pub id: String,

    /// Member identifiers in document order
    pub members: Vec<String>,

    /// Views (entry fragments) of this collection
    pub views: Vec<String>,
}

/// Relations and collections found on one fragment
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct FeedMetadata {
    pub relations: Vec<Relation>,
    pub collections: Vec<Collection>,
}

impl FeedMetadata {
    /// Looks up a collection by identifier
    pub fn collection(&self, id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Returns the member identifiers of all collections, in discovery order
    pub fn member_uris(&self) -> Vec<String> {
        self.collections
            .iter()
            .flat_map(|c| c.members.iter().cloned())
            .collect()
    }

    /// Returns the first view of the collection identified by `id`, if any
    pub fn first_view(&self, id: &str) -> Option<&str> {
        self.collection(id)
            .and_then(|c| c.views.first())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_uris_in_collection_order() {
        let metadata = FeedMetadata {
            relations: vec![],
            collections: vec![
                Collection {
                    id: "c1".into(),
                    members: vec!["m1".into(), "m2".into()],
                    views: vec![],
                },
                Collection {
                    id: "c2".into(),
                    members: vec!["m3".into()],
                    views: vec!["v".into()],
                },
            ],
        };

        assert_eq!(metadata.member_uris(), vec!["m1", "m2", "m3"]);
        assert_eq!(metadata.first_view("c2"), Some("v"));
        assert_eq!(metadata.first_view("c1"), None);
        assert!(metadata.collection("nope").is_none());
    }
}
