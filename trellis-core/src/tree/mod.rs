//! Tree Skeleton
//!
//! The engine's persistent view of the output: one [`TreeNode`] per applied
//! def, arranged like the defs that produced them.
//!
//! Only `Real` nodes own an output node. Every other kind is a
//! *passthrough* that caches the nearest real node below it; see [`Tree`].

mod arena;
mod node;

pub use arena::{Tree, TreePath};
pub use node::{IdGen, NodeId, NodeKind, TreeNode};

pub(crate) use node::NodeData;
