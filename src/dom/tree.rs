//! Tree operations: insert, remove, clear, walk, listeners.

use std::collections::VecDeque;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{ListenerId, NodeData, NodeId, NodeKind};
use crate::event::Handler;

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

struct ListenerEntry {
    node: NodeId,
    event: String,
    handler: Handler,
}

/// The render tree owned by one engine, backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps so that node removal is O(subtree size) and lookup is O(1).
/// Stale ids are generation-checked, so removing a node twice is a no-op.
pub struct Dom {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    listeners: SlotMap<ListenerId, ListenerEntry>,
    /// Parentless nodes in creation order: the main root, then portal layers.
    roots: Vec<NodeId>,
}

impl Dom {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            listeners: SlotMap::with_key(),
            roots: Vec::new(),
        }
    }

    /// Insert a root-level node (no parent).
    ///
    /// The first root-level node becomes [`Dom::root`].
    pub fn insert(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        self.roots.push(id);
        id
    }

    /// Insert a node as the last child of `parent`.
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn insert_child(&mut self, parent: NodeId, data: NodeData) -> Option<NodeId> {
        if !self.nodes.contains_key(parent) {
            return None;
        }
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        self.parent.insert(id, parent);
        self.children.get_mut(parent)?.push(id);
        Some(id)
    }

    /// Remove a node and all its descendants, along with their listeners.
    ///
    /// Returns the `NodeData` for the removed node, or `None` if it didn't exist.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeData> {
        if !self.nodes.contains_key(id) {
            return None;
        }

        if let Some(parent_id) = self.parent.remove(id) {
            if let Some(siblings) = self.children.get_mut(parent_id) {
                siblings.retain(|&child| child != id);
            }
        }
        self.roots.retain(|&root| root != id);

        let mut to_remove = VecDeque::new();
        to_remove.push_back(id);
        let mut removed_root_data = None;

        while let Some(current) = to_remove.pop_front() {
            if let Some(kids) = self.children.remove(current) {
                to_remove.extend(kids);
            }
            self.parent.remove(current);
            if let Some(data) = self.nodes.remove(current) {
                for listener in &data.listeners {
                    self.listeners.remove(*listener);
                }
                if current == id {
                    removed_root_data = Some(data);
                }
            }
        }

        removed_root_data
    }

    /// Remove every child of `id`. Returns the removed direct children.
    pub fn clear_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let kids = self.children(id).to_vec();
        for &child in &kids {
            self.remove(child);
        }
        kids
    }

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no children
    /// or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Walk from `id` up to its root, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself; it starts with the
    /// immediate parent and ends at the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Whether `node` lies strictly inside the subtree of `ancestor`.
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = node;
        while let Some(p) = self.parent.get(current).copied() {
            if p == ancestor {
                return true;
            }
            current = p;
        }
        false
    }

    /// The closest element at or above `id`.
    pub fn nearest_element(&self, id: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.nodes.get(n).is_some_and(NodeData::is_element))
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// The main root: the first root-level node still alive.
    pub fn root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }

    /// All root-level nodes, main root first.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the tree contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Concatenated text of every text node under `id`, in tree order.
    pub fn text_content(&self, id: NodeId) -> String {
        self.walk_depth_first(id)
            .into_iter()
            .filter_map(|n| match &self.nodes.get(n)?.kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Attach a listener to `node`. Returns `None` if the node does not exist.
    pub fn add_listener(
        &mut self,
        node: NodeId,
        event: impl Into<String>,
        handler: Handler,
    ) -> Option<ListenerId> {
        let data = self.nodes.get_mut(node)?;
        let id = self.listeners.insert(ListenerEntry {
            node,
            event: event.into(),
            handler,
        });
        data.listeners.push(id);
        Some(id)
    }

    /// Detach a listener. Returns the node and event it was bound to.
    pub fn remove_listener(&mut self, id: ListenerId) -> Option<(NodeId, String)> {
        let entry = self.listeners.remove(id)?;
        if let Some(data) = self.nodes.get_mut(entry.node) {
            data.listeners.retain(|&l| l != id);
        }
        Some((entry.node, entry.event))
    }

    /// Handlers on `node` for `event`, in registration order.
    pub fn handlers(&self, node: NodeId, event: &str) -> Vec<Handler> {
        let Some(data) = self.nodes.get(node) else {
            return Vec::new();
        };
        data.listeners
            .iter()
            .filter_map(|&l| self.listeners.get(l))
            .filter(|entry| entry.event == event)
            .map(|entry| entry.handler.clone())
            .collect()
    }

    /// Total number of live listeners in the tree.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}
