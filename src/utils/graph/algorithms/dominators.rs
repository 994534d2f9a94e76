//! Dominator tree computation.
//!
//! A node `d` **dominates** `n` if every path from the entry to `n` passes
//! through `d`. The **immediate dominator** of `n` is the closest strict
//! dominator; making it the parent of `n` yields the dominator tree.
//!
//! # Algorithm
//!
//! Iterative data-flow formulation by Cooper, Harvey and Kennedy ("A Simple,
//! Fast Dominance Algorithm"): nodes are processed in reverse postorder and
//! each immediate dominator is refined by intersecting the dominator chains of
//! already-processed predecessors until nothing changes. For the reducible,
//! modestly sized graphs produced by method bodies this converges in two or
//! three sweeps.

use crate::utils::graph::{
    algorithms::traversal::reverse_postorder, NodeId, RootedGraph, Successors,
};

/// Result of dominator tree computation.
///
/// Nodes unreachable from the entry have no immediate dominator and are
/// dominated by nothing (not even themselves).
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: NodeId,
    idom: Vec<Option<NodeId>>,
    reachable: Vec<bool>,
}

impl DominatorTree {
    /// Returns the entry node (the root of the tree).
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the immediate dominator of `node`, or `None` for the entry and
    /// for unreachable nodes.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if node == self.entry {
            return None;
        }
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns `true` if `a` dominates `b`. Every reachable node dominates itself.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut current = Some(b);
        while let Some(node) = current {
            if node == a {
                return true;
            }
            current = self.immediate_dominator(node);
        }
        false
    }

    /// Returns `true` if `a` dominates `b` and `a != b`.
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns the depth of `node` in the tree (entry = 0).
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.immediate_dominator(node);
        while let Some(parent) = current {
            depth += 1;
            current = self.immediate_dominator(parent);
        }
        depth
    }

    /// Returns the nodes immediately dominated by `node`, in ascending order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.idom
            .iter()
            .enumerate()
            .filter(|&(i, idom)| *idom == Some(node) && i != self.entry.index())
            .map(|(i, _)| NodeId::new(i))
            .collect()
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.reachable.get(node.index()).copied().unwrap_or(false)
    }

    /// Returns the number of nodes the tree was computed over.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }
}

/// Computes the dominator tree of `graph` rooted at `entry`.
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors,
{
    let node_count = graph.node_count();
    let mut idom: Vec<Option<NodeId>> = vec![None; node_count];
    let mut reachable = vec![false; node_count];

    if entry.index() >= node_count {
        return DominatorTree {
            entry,
            idom,
            reachable,
        };
    }

    let rpo = reverse_postorder(graph, entry);
    let mut rpo_index = vec![usize::MAX; node_count];
    for (i, node) in rpo.iter().enumerate() {
        rpo_index[node.index()] = i;
        reachable[node.index()] = true;
    }

    let mut preds: Vec<Vec<NodeId>> = vec![Vec::new(); node_count];
    for &node in &rpo {
        for succ in graph.successors(node) {
            if succ.index() < node_count && reachable[succ.index()] {
                preds[succ.index()].push(node);
            }
        }
    }

    idom[entry.index()] = Some(entry);
    let mut changed = true;
    while changed {
        changed = false;
        for &node in rpo.iter().skip(1) {
            let mut new_idom: Option<NodeId> = None;
            for &pred in &preds[node.index()] {
                if idom[pred.index()].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, &rpo_index, pred, current),
                });
            }
            if new_idom.is_some() && idom[node.index()] != new_idom {
                idom[node.index()] = new_idom;
                changed = true;
            }
        }
    }

    DominatorTree {
        entry,
        idom,
        reachable,
    }
}

/// Computes dominators for a [`RootedGraph`] from its own entry node.
pub fn compute_dominators_rooted<G>(graph: &G) -> DominatorTree
where
    G: RootedGraph,
{
    compute_dominators(graph, graph.entry())
}

/// Walks both dominator chains up to their nearest common ancestor.
fn intersect(idom: &[Option<NodeId>], rpo_index: &[usize], a: NodeId, b: NodeId) -> NodeId {
    let mut finger1 = a;
    let mut finger2 = b;
    while finger1 != finger2 {
        while rpo_index[finger1.index()] > rpo_index[finger2.index()] {
            match idom[finger1.index()] {
                Some(next) => finger1 = next,
                None => return finger2,
            }
        }
        while rpo_index[finger2.index()] > rpo_index[finger1.index()] {
            match idom[finger2.index()] {
                Some(next) => finger2 = next,
                None => return finger1,
            }
        }
    }
    finger1
}
