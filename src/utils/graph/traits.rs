//! Trait definitions for graph abstractions.
//!
//! The hierarchy is deliberately small:
//!
//! - [`GraphBase`] - node count and node iteration
//! - [`Successors`] - outgoing edges
//! - [`Predecessors`] - incoming edges
//! - [`RootedGraph`] - graphs with a designated entry node
//!
//! All adjacency queries return iterators so simple traversals do not allocate.

use crate::utils::graph::NodeId;

/// Base trait providing core graph properties.
pub trait GraphBase {
    /// Returns the number of nodes in the graph.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all node identifiers, in ascending index order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs that support forward edge traversal.
pub trait Successors: GraphBase {
    /// Returns an iterator over the successor nodes of the given node.
    ///
    /// For a directed edge `(u, v)`, node `v` is a successor of `u`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs that support backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Returns an iterator over the predecessor nodes of the given node.
    ///
    /// For a directed edge `(u, v)`, node `u` is a predecessor of `v`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs with a designated entry node.
///
/// Dominator computation and reachability are defined relative to this node.
pub trait RootedGraph: Successors {
    /// Returns the entry node of the graph.
    fn entry(&self) -> NodeId;
}
