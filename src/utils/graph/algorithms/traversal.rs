//! Depth-first orderings.
//!
//! Reverse postorder is the iteration order used by every forward dataflow
//! analysis in this crate: in an acyclic region each node is visited after all
//! of its predecessors.

use crate::utils::graph::{NodeId, Successors};

/// Computes the postorder of all nodes reachable from `start`.
///
/// Successors are explored in the order the graph yields them, so the result is
/// deterministic for a given graph. An out-of-range `start` yields an empty order.
///
/// # Complexity
///
/// - Time: O(V + E)
/// - Space: O(V)
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut order = Vec::with_capacity(node_count);

    // Each frame holds the node and its not-yet-explored successors.
    let mut stack: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
    visited[start.index()] = true;
    stack.push((start, graph.successors(start).collect()));

    while let Some((node, pending)) = stack.last_mut() {
        let node = *node;
        match pending.first().copied() {
            Some(next) => {
                pending.remove(0);
                if next.index() < node_count && !visited[next.index()] {
                    visited[next.index()] = true;
                    let succs = graph.successors(next).collect();
                    stack.push((next, succs));
                }
            }
            None => {
                stack.pop();
                order.push(node);
            }
        }
    }

    order
}

/// Computes the reverse postorder of all nodes reachable from `start`.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut order = postorder(graph, start);
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use crate::utils::graph::{
        algorithms::{postorder, reverse_postorder, testgraph::TestGraph},
        NodeId,
    };

    fn ids(raw: &[usize]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId::new).collect()
    }

    #[test]
    fn test_postorder_linear() {
        let graph = TestGraph::new(3, &[(0, 1), (1, 2)]);
        assert_eq!(postorder(&graph, NodeId::new(0)), ids(&[2, 1, 0]));
    }

    #[test]
    fn test_reverse_postorder_diamond() {
        let graph = TestGraph::new(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let rpo = reverse_postorder(&graph, NodeId::new(0));
        assert_eq!(rpo.len(), 4);
        assert_eq!(rpo[0], NodeId::new(0));
        assert_eq!(rpo[3], NodeId::new(3));
    }

    #[test]
    fn test_reverse_postorder_loop() {
        // 0 -> 1 -> 2 -> 1, 1 -> 3
        let graph = TestGraph::new(4, &[(0, 1), (1, 2), (2, 1), (1, 3)]);
        let rpo = reverse_postorder(&graph, NodeId::new(0));
        let pos = |n: usize| rpo.iter().position(|&x| x == NodeId::new(n)).unwrap();
        assert!(pos(0) < pos(1));
        assert!(pos(1) < pos(2));
        assert!(pos(1) < pos(3));
    }

    #[test]
    fn test_unreachable_nodes_skipped() {
        let graph = TestGraph::new(3, &[(0, 1)]);
        assert_eq!(reverse_postorder(&graph, NodeId::new(0)), ids(&[0, 1]));
    }

    #[test]
    fn test_invalid_start() {
        let graph = TestGraph::new(2, &[(0, 1)]);
        assert!(postorder(&graph, NodeId::new(7)).is_empty());
    }
}
