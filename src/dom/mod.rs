//! Render tree: slotmap-backed node arena with listeners and queries.

pub mod node;
pub mod query;
pub mod tree;

pub use node::{is_valid_name, AttrValue, ListenerId, NodeData, NodeId, NodeKind};
pub use tree::Dom;
