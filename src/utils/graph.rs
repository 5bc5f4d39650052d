//! Depth-first orderings over control-flow graphs.
//!
//! Nodes are dense `usize` indices; the graph only has to answer successor queries.

/// Forward edge access over a graph with dense node indices.
pub(crate) trait Successors {
    /// Number of nodes; valid indices are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Successors of `node`, in edge order.
    fn successors(&self, node: usize) -> Vec<usize>;
}

/// Postorder of the nodes reachable from `start`.
///
/// Iterative, so deep graphs do not exhaust the stack. Out-of-range `start` or successor
/// indices are ignored.
#[allow(clippy::items_after_statements)]
pub(crate) fn postorder<G: Successors>(graph: &G, start: usize) -> Vec<usize> {
    let node_count = graph.node_count();
    if start >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);

    #[derive(Clone, Copy)]
    enum Visit {
        Enter,
        Exit,
    }

    let mut stack = vec![(start, Visit::Enter)];
    while let Some((node, visit)) = stack.pop() {
        match visit {
            Visit::Enter => {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                stack.push((node, Visit::Exit));

                // reversed so the first successor is entered first
                for succ in graph.successors(node).into_iter().rev() {
                    if succ < node_count && !visited[succ] {
                        stack.push((succ, Visit::Enter));
                    }
                }
            }
            Visit::Exit => result.push(node),
        }
    }

    result
}

/// Reverse postorder of the nodes reachable from `start`.
///
/// Every node comes before its successors except along back edges, which is the order a
/// forward dataflow pass wants.
pub(crate) fn reverse_postorder<G: Successors>(graph: &G, start: usize) -> Vec<usize> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Edges(Vec<Vec<usize>>);

    impl Successors for Edges {
        fn node_count(&self) -> usize {
            self.0.len()
        }

        fn successors(&self, node: usize) -> Vec<usize> {
            self.0[node].clone()
        }
    }

    #[test]
    fn test_linear() {
        let graph = Edges(vec![vec![1], vec![2], vec![]]);
        assert_eq!(postorder(&graph, 0), vec![2, 1, 0]);
        assert_eq!(reverse_postorder(&graph, 0), vec![0, 1, 2]);
    }

    #[test]
    fn test_diamond() {
        let graph = Edges(vec![vec![1, 2], vec![3], vec![3], vec![]]);
        let order = reverse_postorder(&graph, 0);
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], 0);
        assert_eq!(order[3], 3);
    }

    #[test]
    fn test_cycle_and_unreachable() {
        // 3 is unreachable, 2 -> 1 is a back edge
        let graph = Edges(vec![vec![1], vec![2], vec![1], vec![0]]);
        assert_eq!(reverse_postorder(&graph, 0), vec![0, 1, 2]);
        assert!(reverse_postorder(&graph, 9).is_empty());
    }
}
