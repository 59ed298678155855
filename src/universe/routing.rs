//! Pathfinding: unweighted BFS (`shortest`) and weighted Dijkstra
//! (`safe`/`unsafe`) over the universe graph (spec.md §4.3).

use std::collections::{BinaryHeap, VecDeque};

use crate::cancellation::Deadline;
use crate::error::ToolError;

use super::graph::{RouteMode, UniverseGraph};

#[derive(Debug, Clone)]
pub struct RouteResult {
    pub mode: RouteMode,
    pub path: Vec<usize>,
    pub jumps: usize,
}

/// BFS shortest path, ties broken by the natural (sorted) order of the
/// adjacency list, so routes are deterministic given the build (spec.md §4.3).
/// Checks `deadline` once per frontier expansion (spec.md §5 suspension points).
pub fn shortest_path(
    graph: &UniverseGraph,
    origin: usize,
    destination: usize,
    deadline: Deadline,
) -> Result<Option<Vec<usize>>, ToolError> {
    if origin == destination {
        return Ok(Some(vec![origin]));
    }
    let n = graph.len();
    let mut visited = vec![false; n];
    let mut parent = vec![usize::MAX; n];
    let mut queue = VecDeque::new();
    visited[origin] = true;
    queue.push_back(origin);

    while let Some(u) = queue.pop_front() {
        deadline.check("routing")?;
        for &v in graph.neighbors(u) {
            if !visited[v] {
                visited[v] = true;
                parent[v] = u;
                if v == destination {
                    return Ok(Some(reconstruct(&parent, origin, destination)));
                }
                queue.push_back(v);
            }
        }
    }
    Ok(None)
}

/// Plain BFS distance (used by border search / system search / loop
/// planning bounded expansion). Returns distance-from-origin per reachable
/// vertex within `max_hops` (inclusive).
pub fn bfs_within(
    graph: &UniverseGraph,
    origin: usize,
    max_hops: usize,
    deadline: Deadline,
) -> Result<Vec<(usize, usize)>, ToolError> {
    let n = graph.len();
    let mut dist = vec![usize::MAX; n];
    let mut out = Vec::new();
    dist[origin] = 0;
    out.push((origin, 0));
    let mut queue = VecDeque::new();
    queue.push_back(origin);
    while let Some(u) = queue.pop_front() {
        deadline.check("routing")?;
        let du = dist[u];
        if du >= max_hops {
            continue;
        }
        for neighbor in graph.topology.neighbors(graph.node(u)) {
            let v = neighbor.index();
            if dist[v] == usize::MAX {
                dist[v] = du + 1;
                out.push((v, du + 1));
                queue.push_back(v);
            }
        }
    }
    Ok(out)
}

/// Unbounded BFS distance from origin to every reachable vertex; used by the
/// loop planner's pairwise-distance scoring.
pub fn bfs_all_distances(graph: &UniverseGraph, origin: usize, deadline: Deadline) -> Result<Vec<usize>, ToolError> {
    let n = graph.len();
    let mut dist = vec![usize::MAX; n];
    dist[origin] = 0;
    let mut queue = VecDeque::new();
    queue.push_back(origin);
    while let Some(u) = queue.pop_front() {
        deadline.check("routing")?;
        let du = dist[u];
        for &v in graph.neighbors(u) {
            if dist[v] == usize::MAX {
                dist[v] = du + 1;
                queue.push_back(v);
            }
        }
    }
    Ok(dist)
}

#[derive(PartialEq)]
struct HeapEntry {
    cost: f64,
    node: usize,
}
impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap via reversed partial_cmp; NaN can't occur (weights are
        // fixed positive constants), so `partial_cmp().unwrap()` is safe here.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Weighted shortest path (Dijkstra) for `safe`/`unsafe` modes, reading edge
/// weights from the per-mode directed graph cached on `UniverseGraph`.
pub fn weighted_path(
    graph: &UniverseGraph,
    mode: RouteMode,
    origin: usize,
    destination: usize,
    deadline: Deadline,
) -> Result<Option<Vec<usize>>, ToolError> {
    if origin == destination {
        return Ok(Some(vec![origin]));
    }
    let digraph = match mode {
        RouteMode::Safe => &graph.safe_digraph,
        RouteMode::Unsafe => &graph.unsafe_digraph,
        RouteMode::Shortest => return shortest_path(graph, origin, destination, deadline),
    };

    let n = graph.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut parent = vec![usize::MAX; n];
    let mut visited = vec![false; n];
    let mut heap = BinaryHeap::new();
    dist[origin] = 0.0;
    heap.push(HeapEntry {
        cost: 0.0,
        node: origin,
    });

    while let Some(HeapEntry { cost, node: u }) = heap.pop() {
        deadline.check("routing")?;
        if visited[u] {
            continue;
        }
        visited[u] = true;
        if u == destination {
            break;
        }
        for edge in digraph.edges(graph.node(u)) {
            let v = edge.target().index();
            let w = *edge.weight();
            let next = cost + w;
            if next < dist[v] {
                dist[v] = next;
                parent[v] = u;
                heap.push(HeapEntry {
                    cost: next,
                    node: v,
                });
            }
        }
    }

    if dist[destination].is_infinite() {
        Ok(None)
    } else {
        Ok(Some(reconstruct(&parent, origin, destination)))
    }
}

fn reconstruct(parent: &[usize], origin: usize, destination: usize) -> Vec<usize> {
    let mut path = vec![destination];
    let mut cur = destination;
    while cur != origin {
        cur = parent[cur];
        path.push(cur);
    }
    path.reverse();
    path
}

pub fn route(
    graph: &UniverseGraph,
    mode: RouteMode,
    origin: usize,
    destination: usize,
    deadline: Deadline,
) -> Result<Option<RouteResult>, ToolError> {
    let path = match mode {
        RouteMode::Shortest => shortest_path(graph, origin, destination, deadline)?,
        RouteMode::Safe | RouteMode::Unsafe => weighted_path(graph, mode, origin, destination, deadline)?,
    };
    Ok(path.map(|path| {
        let jumps = path.len().saturating_sub(1);
        RouteResult { mode, path, jumps }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::system::{RawGate, RawSystem, UniverseSourceDocument};
    use crate::universe::graph::build_graph;

    fn tiny_graph() -> UniverseGraph {
        // A(high) - B(low) - C(null), plus D(high) linked only to A.
        let systems = vec![
            RawSystem { id: 1, name: "A".into(), security: 0.9, constellation_id: 1, region_id: 1, constellation_name: None, region_name: None },
            RawSystem { id: 2, name: "B".into(), security: 0.3, constellation_id: 1, region_id: 1, constellation_name: None, region_name: None },
            RawSystem { id: 3, name: "C".into(), security: -0.1, constellation_id: 1, region_id: 1, constellation_name: None, region_name: None },
            RawSystem { id: 4, name: "D".into(), security: 0.8, constellation_id: 1, region_id: 1, constellation_name: None, region_name: None },
        ];
        let gates = vec![
            RawGate { from_system_id: 1, to_system_id: 2 },
            RawGate { from_system_id: 2, to_system_id: 3 },
            RawGate { from_system_id: 1, to_system_id: 4 },
        ];
        build_graph(UniverseSourceDocument { systems, gates }).unwrap()
    }

    #[test]
    fn shortest_matches_bfs_distance() {
        let g = tiny_graph();
        let a = g.index_of_name("A").unwrap();
        let c = g.index_of_name("C").unwrap();
        let r = route(&g, RouteMode::Shortest, a, c, Deadline::none()).unwrap().unwrap();
        assert_eq!(r.jumps, 2);
        assert_eq!(g.name[r.path[0]], "A");
        assert_eq!(g.name[*r.path.last().unwrap()], "C");
    }

    #[test]
    fn safe_mode_penalizes_entering_low_from_high() {
        let g = tiny_graph();
        let a = g.index_of_name("A").unwrap();
        let c = g.index_of_name("C").unwrap();
        let shortest = route(&g, RouteMode::Shortest, a, c, Deadline::none()).unwrap().unwrap();
        let safe = route(&g, RouteMode::Safe, a, c, Deadline::none()).unwrap().unwrap();
        assert!(safe.jumps >= shortest.jumps);
    }

    #[test]
    fn reversed_route_has_same_jump_count() {
        let g = tiny_graph();
        let a = g.index_of_name("A").unwrap();
        let c = g.index_of_name("C").unwrap();
        let fwd = route(&g, RouteMode::Shortest, a, c, Deadline::none()).unwrap().unwrap();
        let back = route(&g, RouteMode::Shortest, c, a, Deadline::none()).unwrap().unwrap();
        assert_eq!(fwd.jumps, back.jumps);
    }

    #[test]
    fn cancelled_before_start_returns_cancelled_error() {
        let g = tiny_graph();
        let a = g.index_of_name("A").unwrap();
        let c = g.index_of_name("C").unwrap();
        let expired = Deadline::after(std::time::Duration::from_millis(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let err = route(&g, RouteMode::Shortest, a, c, expired).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Cancelled);
    }

    #[test]
    fn no_path_when_disconnected() {
        let systems = vec![
            RawSystem { id: 1, name: "A".into(), security: 0.9, constellation_id: 1, region_id: 1, constellation_name: None, region_name: None },
            RawSystem { id: 2, name: "Z".into(), security: 0.9, constellation_id: 2, region_id: 2, constellation_name: None, region_name: None },
        ];
        let g = build_graph(UniverseSourceDocument { systems, gates: vec![] }).unwrap();
        let a = g.index_of_name("A").unwrap();
        let z = g.index_of_name("Z").unwrap();
        assert!(route(&g, RouteMode::Shortest, a, z, Deadline::none()).unwrap().is_none());
    }
}
