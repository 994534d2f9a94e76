//! Graph algorithms over the [`crate::utils::graph`] traits.
//!
//! - [`postorder`] / [`reverse_postorder`] - depth-first orderings from a start node
//! - [`compute_dominators`] - immediate dominators and the dominator tree

mod dominators;
mod traversal;

pub use dominators::{compute_dominators, compute_dominators_rooted, DominatorTree};
pub use traversal::{postorder, reverse_postorder};
