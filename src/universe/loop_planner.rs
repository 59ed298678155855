//! Approximate TSP loop planning: a circular route starting and ending at an
//! origin that visits a spatially diverse set of border systems
//! (spec.md §4.3 Loop planning).

use serde::Serialize;

use crate::cancellation::Deadline;
use crate::error::ToolError;

use super::enrichment::{self, EnrichedRoute};
use super::graph::UniverseGraph;
use super::routing::{bfs_all_distances, bfs_within};

#[derive(Debug, Clone, Serialize)]
pub struct LoopRoute {
    pub origin: String,
    pub systems: Vec<String>,
    pub border_systems_visited: Vec<String>,
    pub total_jumps: usize,
    pub unique_systems: usize,
    pub backtrack_jumps: usize,
    pub efficiency: f64,
    pub route: EnrichedRoute,
}

/// Step 1: border candidates within `target_jumps / 2` BFS hops, overscanned
/// to `3 * max_borders` candidates (spec.md §4.3).
fn candidate_borders(
    graph: &UniverseGraph,
    origin: usize,
    target_jumps: u32,
    max_borders: usize,
    deadline: Deadline,
) -> Result<Vec<usize>, ToolError> {
    let radius = (target_jumps as usize / 2).max(1);
    let mut candidates: Vec<(usize, usize)> = bfs_within(graph, origin, radius, deadline)?
        .into_iter()
        .filter(|&(idx, dist)| idx != origin && dist > 0 && graph.is_border(idx))
        .collect();
    candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| graph.name[a.0].cmp(&graph.name[b.0])));
    candidates.truncate(max_borders.saturating_mul(3).max(max_borders));
    Ok(candidates.into_iter().map(|(idx, _)| idx).collect())
}

/// Step 2: greedily build a spatially diverse subset — start from the
/// nearest border, then repeatedly add whichever remaining candidate
/// maximizes its minimum distance to everything already selected.
fn select_diverse(
    graph: &UniverseGraph,
    origin: usize,
    candidates: &[usize],
    min_borders: usize,
    max_borders: usize,
    deadline: Deadline,
) -> Result<Vec<usize>, ToolError> {
    if candidates.len() < min_borders {
        return Err(ToolError::new(
            crate::error::ErrorKind::RouteNotFound,
            format!(
                "only {} border candidates found, need at least {min_borders}; widen target_jumps or lower min_borders",
                candidates.len()
            ),
        )
        .with_data(serde_json::json!({
            "candidates_found": candidates.len(),
            "min_borders": min_borders,
            "suggestion": "increase target_jumps or decrease min_borders",
        })));
    }

    let mut selected = vec![candidates[0]];
    let mut remaining: Vec<usize> = candidates[1..].to_vec();
    // Cache an all-pairs distance table restricted to candidates ∪ {origin}
    // by running one BFS per selected vertex as it's added.
    let mut dist_from_selected: Vec<Vec<usize>> = vec![bfs_all_distances(graph, selected[0], deadline)?];

    while selected.len() < max_borders && !remaining.is_empty() {
        deadline.check("loop planning")?;
        let mut best_idx = 0usize;
        let mut best_score = -1i64;
        for (i, &cand) in remaining.iter().enumerate() {
            let min_dist = dist_from_selected
                .iter()
                .map(|d| d[cand])
                .min()
                .unwrap_or(usize::MAX);
            let score = min_dist as i64;
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }
        let chosen = remaining.remove(best_idx);
        dist_from_selected.push(bfs_all_distances(graph, chosen, deadline)?);
        selected.push(chosen);
    }

    if selected.len() < min_borders {
        return Err(ToolError::new(
            crate::error::ErrorKind::RouteNotFound,
            format!(
                "only found {} diverse border systems, need at least {min_borders}",
                selected.len()
            ),
        ));
    }

    Ok(selected)
}

/// Step 3: nearest-neighbor TSP tour over {origin} ∪ selected, seeded at
/// origin. The origin is not explicitly appended; closure is handled by the
/// caller during expansion.
fn nearest_neighbor_tour(
    graph: &UniverseGraph,
    origin: usize,
    selected: &[usize],
    deadline: Deadline,
) -> Result<Vec<usize>, ToolError> {
    let mut unvisited: Vec<usize> = selected.to_vec();
    let mut tour = vec![origin];
    let mut current = origin;
    while !unvisited.is_empty() {
        deadline.check("loop planning")?;
        let dist = bfs_all_distances(graph, current, deadline)?;
        let mut best_i = 0usize;
        let mut best_d = usize::MAX;
        for (i, &cand) in unvisited.iter().enumerate() {
            let d = dist[cand];
            if d < best_d {
                best_d = d;
                best_i = i;
            }
        }
        let next = unvisited.remove(best_i);
        tour.push(next);
        current = next;
    }
    Ok(tour)
}

/// Step 4: expand a tour of vertex "waypoints" into a full route by
/// concatenating shortest paths between consecutive waypoints, closing the
/// loop back to origin, without duplicating shared endpoints.
fn expand_tour(
    graph: &UniverseGraph,
    tour: &[usize],
    origin: usize,
    deadline: Deadline,
) -> Result<Option<Vec<usize>>, ToolError> {
    let mut full = Vec::new();
    let mut waypoints = tour.to_vec();
    waypoints.push(origin);

    for w in waypoints.windows(2) {
        deadline.check("loop planning")?;
        let segment = match super::routing::shortest_path(graph, w[0], w[1], deadline)? {
            Some(s) => s,
            None => return Ok(None),
        };
        if full.is_empty() {
            full.extend(segment);
        } else {
            full.extend(segment.into_iter().skip(1));
        }
    }
    Ok(Some(full))
}

pub fn plan_loop(
    graph: &UniverseGraph,
    origin: usize,
    target_jumps: u32,
    min_borders: usize,
    max_borders: usize,
    deadline: Deadline,
) -> Result<LoopRoute, ToolError> {
    let candidates = candidate_borders(graph, origin, target_jumps, max_borders, deadline)?;
    let selected = select_diverse(graph, origin, &candidates, min_borders, max_borders, deadline)?;
    let tour = nearest_neighbor_tour(graph, origin, &selected, deadline)?;
    let full_path = expand_tour(graph, &tour, origin, deadline)?.ok_or_else(|| {
        ToolError::internal("loop expansion failed to connect a selected waypoint")
    })?;

    let total_jumps = full_path.len().saturating_sub(1);
    let unique: std::collections::HashSet<usize> = full_path.iter().copied().collect();
    let unique_systems = unique.len();
    let backtrack_jumps = total_jumps.saturating_sub(unique_systems);
    let efficiency = if total_jumps == 0 {
        1.0
    } else {
        unique_systems as f64 / total_jumps as f64
    };

    // A notional "was this a safe-mode ask" is always false for loop planning
    // (there is no safe/unsafe distinction for loops), so warnings never flag
    // a safe-mode contradiction here.
    let enriched = enrichment::enrich(graph, &full_path, false);

    Ok(LoopRoute {
        origin: graph.name[origin].clone(),
        systems: full_path.iter().map(|&i| graph.name[i].clone()).collect(),
        border_systems_visited: selected.iter().map(|&i| graph.name[i].clone()).collect(),
        total_jumps,
        unique_systems,
        backtrack_jumps,
        efficiency,
        route: enriched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::graph::build_graph;
    use crate::universe::system::{RawGate, RawSystem, UniverseSourceDocument};

    fn star_graph() -> UniverseGraph {
        // Origin hub (high) connected to several arms, each ending in a
        // low/null border-adjacent system, to give the planner something
        // spatially diverse to pick from.
        let mut systems = vec![RawSystem {
            id: 1,
            name: "Hub".into(),
            security: 0.9,
            constellation_id: 1,
            region_id: 1,
            constellation_name: None,
            region_name: None,
        }];
        let mut gates = Vec::new();
        for arm in 0..6u32 {
            let border_id = 100 + arm * 2;
            let low_id = border_id + 1;
            systems.push(RawSystem {
                id: border_id,
                name: format!("Border{arm}"),
                security: 0.9,
                constellation_id: 1,
                region_id: 1,
                constellation_name: None,
                region_name: None,
            });
            systems.push(RawSystem {
                id: low_id,
                name: format!("Low{arm}"),
                security: 0.3,
                constellation_id: 1,
                region_id: 1,
                constellation_name: None,
                region_name: None,
            });
            gates.push(RawGate {
                from_system_id: 1,
                to_system_id: border_id,
            });
            gates.push(RawGate {
                from_system_id: border_id,
                to_system_id: low_id,
            });
        }
        build_graph(UniverseSourceDocument { systems, gates }).unwrap()
    }

    #[test]
    fn loop_starts_and_ends_at_origin() {
        let g = star_graph();
        let origin = g.index_of_name("Hub").unwrap();
        let result = plan_loop(&g, origin, 10, 4, 6, Deadline::none()).unwrap();
        assert_eq!(result.systems.first().unwrap(), "Hub");
        assert_eq!(result.systems.last().unwrap(), "Hub");
        assert!(result.border_systems_visited.len() >= 4);
        assert_eq!(
            result.backtrack_jumps,
            result.total_jumps - result.unique_systems
        );
        assert!(result.efficiency >= 0.0 && result.efficiency <= 1.0);
    }

    #[test]
    fn too_few_candidates_is_a_structured_error() {
        let g = star_graph();
        let origin = g.index_of_name("Hub").unwrap();
        let err = plan_loop(&g, origin, 10, 20, 20, Deadline::none()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::RouteNotFound);
    }
}
