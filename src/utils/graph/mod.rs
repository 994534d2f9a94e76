//! Generic graph abstractions for control flow analysis.
//!
//! Algorithms in [`algorithms`] are written against the small trait family in
//! [`traits`], so any structure that can enumerate its nodes and edges (most
//! notably [`crate::analysis::SsaCfg`]) gets traversal orders and dominator
//! trees for free.
//!
//! - [`NodeId`] - strongly-typed node index
//! - [`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`] - adjacency queries
//! - [`algorithms`] - postorder, reverse postorder, dominators

pub mod algorithms;
mod node;
mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
