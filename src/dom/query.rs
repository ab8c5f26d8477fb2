//! Tree queries: by id attribute, class, tag; generic predicate matching.

use super::node::{AttrValue, NodeData, NodeId};
use super::tree::Dom;

impl Dom {
    /// Find the first node whose `id` attribute matches.
    ///
    /// Iterates all nodes in the arena, including portal layers.
    pub fn query_by_id(&self, id: &str) -> Option<NodeId> {
        self.iter_nodes()
            .find(|(_, data)| data.attr("id").and_then(AttrValue::as_str) == Some(id))
            .map(|(node_id, _)| node_id)
    }

    /// Find all nodes that have the given class.
    pub fn query_by_class(&self, class: &str) -> Vec<NodeId> {
        self.query_all(|data| data.has_class(class))
    }

    /// Find all elements with the given tag.
    pub fn query_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.query_all(|data| data.tag() == Some(tag))
    }

    /// Find all nodes matching an arbitrary predicate.
    pub fn query_all(&self, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeId> {
        self.iter_nodes()
            .filter(|(_, data)| predicate(data))
            .map(|(node_id, _)| node_id)
            .collect()
    }

    /// Iterate over all `(NodeId, &NodeData)` pairs in the arena.
    ///
    /// Slotmap order is deterministic but not tree order.
    fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.nodes.iter()
    }
}
