// route_generation.rs
//
// Breadth-first route search over the edge graph. A route is a sequence of
// edge indices where each edge starts at the node the previous one ends at.

use std::collections::{HashMap, VecDeque};

/// Builds the successor list of every edge from `(from_node, to_node)` pairs.
pub fn edge_successors(endpoints: &[(&str, &str)]) -> Vec<Vec<usize>> {
    endpoints
        .iter()
        .map(|(_, to)| {
            endpoints
                .iter()
                .enumerate()
                .filter(|(_, (from, _))| from == to)
                .map(|(index, _)| index)
                .collect()
        })
        .collect()
}

/// Finds the route with the fewest edges from `start` to `target`.
/// Edges for which `blocked` returns true are never entered; `start` is
/// always usable. Neighbors are visited in index order so the result is
/// deterministic.
pub fn bfs_route<F>(
    successors: &[Vec<usize>],
    start: usize,
    target: usize,
    blocked: F,
) -> Option<Vec<usize>>
where
    F: Fn(usize) -> bool,
{
    let mut queue = VecDeque::new();
    queue.push_back(start);
    let mut came_from: HashMap<usize, usize> = HashMap::new();
    came_from.insert(start, start);

    while let Some(current) = queue.pop_front() {
        if current == target {
            let mut path = Vec::new();
            let mut cur = current;
            while cur != start {
                path.push(cur);
                cur = came_from[&cur];
            }
            path.push(start);
            path.reverse();
            return Some(path);
        }

        for &neighbor in successors.get(current)? {
            if blocked(neighbor) || came_from.contains_key(&neighbor) {
                continue;
            }
            came_from.insert(neighbor, current);
            queue.push_back(neighbor);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // a: n0->n1, b: n1->n2, c: n1->n3, d: n3->n2
    fn graph() -> Vec<Vec<usize>> {
        edge_successors(&[("n0", "n1"), ("n1", "n2"), ("n1", "n3"), ("n3", "n2")])
    }

    #[test]
    fn successors_follow_nodes() {
        let successors = graph();
        assert_eq!(successors[0], vec![1, 2]);
        assert!(successors[1].is_empty());
        assert_eq!(successors[2], vec![3]);
    }

    #[test]
    fn shortest_route() {
        assert_eq!(bfs_route(&graph(), 0, 1, |_| false), Some(vec![0, 1]));
    }

    #[test]
    fn detour_around_blocked_edge() {
        let successors = edge_successors(&[
            ("n0", "n1"),
            ("n1", "n2"),
            ("n1", "n3"),
            ("n3", "n2"),
            ("n2", "n4"),
        ]);
        assert_eq!(bfs_route(&successors, 0, 4, |_| false), Some(vec![0, 1, 4]));
        assert_eq!(bfs_route(&successors, 0, 4, |e| e == 1), Some(vec![0, 2, 3, 4]));
        assert_eq!(bfs_route(&successors, 0, 4, |e| e == 4), None);
    }

    #[test]
    fn start_is_always_usable() {
        assert_eq!(bfs_route(&graph(), 0, 0, |_| true), Some(vec![0]));
    }
}
