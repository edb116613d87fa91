//! Collects the stages that must run before the main match: existence filters
//! and array flattens for the nested documents a query reads, and a shared
//! projection for rewritten fields.

use bson::Bson;
use linked_hash_map::LinkedHashMap;

#[cfg(test)]
mod test;

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingNode {
    /// Requires the nested document at `path` to be present and not null.
    Exists { path: String },
    /// Expands the array at `path` into one document per element.
    Unwind { path: String },
    /// Adds computed fields, keyed by alias.
    Project { fragments: LinkedHashMap<String, Bson> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Document(String),
    Projection,
}

#[derive(Debug, Clone, Default)]
pub struct MergePlanner {
    nodes: LinkedHashMap<NodeKey, ProcessingNode>,
}

impl MergePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// No-op when the document is already flattened or filtered.
    pub fn add_existence_filter(&mut self, document: &str) {
        let key = NodeKey::Document(document.to_string());
        if !self.nodes.contains_key(&key) {
            self.nodes.insert(
                key,
                ProcessingNode::Exists {
                    path: document.to_string(),
                },
            );
        }
    }

    /// A flatten implies presence, so it replaces an existence filter on the
    /// same document.
    pub fn add_array_flatten(&mut self, document: &str) {
        let key = NodeKey::Document(document.to_string());
        if let Some(ProcessingNode::Unwind { .. }) = self.nodes.get(&key) {
            return;
        }
        self.nodes.remove(&key);
        self.nodes.insert(
            key,
            ProcessingNode::Unwind {
                path: document.to_string(),
            },
        );
    }

    pub fn add_projection_fragment(&mut self, fragment: Bson, alias: &str) {
        let node = self
            .nodes
            .entry(NodeKey::Projection)
            .or_insert_with(|| ProcessingNode::Project {
                fragments: LinkedHashMap::new(),
            });
        if let ProcessingNode::Project { fragments } = node {
            fragments.insert(alias.to_string(), fragment);
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ProcessingNode> {
        self.nodes.values()
    }
}
