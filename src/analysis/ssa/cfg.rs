//! Control flow graph view of SSA functions.
//!
//! [`SsaCfg`] is derived from block terminators and implements the graph
//! traits of [`crate::utils::graph`], so traversal orders and dominator trees
//! come straight from the generic algorithms:
//!
//! ```rust,ignore
//! let cfg = SsaCfg::from_ssa(&ssa);
//! let order = cfg.reverse_postorder();
//! let dom = cfg.dominators();
//! ```
//!
//! The view is a snapshot: it owns its adjacency lists, so the function may be
//! rewritten while the view is alive as long as terminators are left alone.

use crate::{
    analysis::ssa::SsaFunction,
    utils::graph::{
        algorithms::{compute_dominators, postorder, reverse_postorder, DominatorTree},
        GraphBase, NodeId, Predecessors, RootedGraph, Successors,
    },
};

/// Control flow graph snapshot of an [`SsaFunction`]. Block 0 is the entry.
#[derive(Debug, Clone)]
pub struct SsaCfg {
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl SsaCfg {
    /// Builds the CFG from the terminators of `ssa`.
    ///
    /// Edges are deduplicated, so a branch with equal targets contributes a
    /// single edge and a single predecessor entry.
    #[must_use]
    pub fn from_ssa(ssa: &SsaFunction) -> Self {
        let block_count = ssa.block_count();
        let mut successors = vec![Vec::new(); block_count];
        let mut predecessors = vec![Vec::new(); block_count];

        for (block_idx, block) in ssa.blocks().iter().enumerate() {
            for succ in block.successors() {
                if succ >= block_count || successors[block_idx].contains(&succ) {
                    continue;
                }
                successors[block_idx].push(succ);
                predecessors[succ].push(block_idx);
            }
        }

        Self {
            successors,
            predecessors,
        }
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.successors.len()
    }

    /// Returns the successors of `block_idx`.
    #[must_use]
    pub fn block_successors(&self, block_idx: usize) -> &[usize] {
        self.successors.get(block_idx).map_or(&[], Vec::as_slice)
    }

    /// Returns the predecessors of `block_idx`, in ascending block order.
    #[must_use]
    pub fn block_predecessors(&self, block_idx: usize) -> &[usize] {
        self.predecessors.get(block_idx).map_or(&[], Vec::as_slice)
    }

    /// Returns blocks without successors.
    #[must_use]
    pub fn exits(&self) -> Vec<NodeId> {
        (0..self.block_count())
            .filter(|&idx| self.successors[idx].is_empty())
            .map(NodeId::new)
            .collect()
    }

    /// Returns the reachable blocks in postorder.
    #[must_use]
    pub fn postorder(&self) -> Vec<NodeId> {
        if self.block_count() == 0 {
            return Vec::new();
        }
        postorder(self, NodeId::new(0))
    }

    /// Returns the reachable blocks in reverse postorder.
    ///
    /// Every block appears after its immediate dominator, which makes this the
    /// visiting order for single-sweep forward analyses.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<NodeId> {
        if self.block_count() == 0 {
            return Vec::new();
        }
        reverse_postorder(self, NodeId::new(0))
    }

    /// Computes the dominator tree.
    #[must_use]
    pub fn dominators(&self) -> DominatorTree {
        compute_dominators(self, NodeId::new(0))
    }
}

impl GraphBase for SsaCfg {
    fn node_count(&self) -> usize {
        self.block_count()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.block_count()).map(NodeId::new)
    }
}

impl Successors for SsaCfg {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.block_successors(node.index())
            .iter()
            .copied()
            .map(NodeId::new)
    }
}

impl Predecessors for SsaCfg {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.block_predecessors(node.index())
            .iter()
            .copied()
            .map(NodeId::new)
    }
}

impl RootedGraph for SsaCfg {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}
