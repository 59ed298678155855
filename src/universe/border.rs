//! Border search: nearest border systems within K jumps of an origin
//! (spec.md §4.3).

use serde::Serialize;

use crate::cancellation::Deadline;
use crate::error::ToolError;

use super::graph::UniverseGraph;
use super::routing::bfs_within;

#[derive(Debug, Clone, Serialize)]
pub struct BorderHit {
    pub name: String,
    pub jumps_from_origin: usize,
    pub security: f32,
    pub adjacent_lowsec: Vec<String>,
}

/// Up to `limit` border systems within `max_jumps`, sorted by distance
/// ascending, ties broken by canonical name. Collects 3x candidates before
/// truncating so distance ordering stays monotone with a stable tail.
pub fn find_borders(
    graph: &UniverseGraph,
    origin: usize,
    max_jumps: usize,
    limit: usize,
    deadline: Deadline,
) -> Result<Vec<BorderHit>, ToolError> {
    let reached = bfs_within(graph, origin, max_jumps, deadline)?;
    let overscan = limit.saturating_mul(3).max(limit);

    let mut candidates: Vec<(usize, usize)> = reached
        .into_iter()
        .filter(|&(idx, _)| graph.is_border(idx))
        .collect();

    candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| graph.name[a.0].cmp(&graph.name[b.0])));
    candidates.truncate(overscan);
    candidates.truncate(limit);

    Ok(candidates
        .into_iter()
        .map(|(idx, dist)| BorderHit {
            name: graph.name[idx].clone(),
            jumps_from_origin: dist,
            security: graph.security[idx],
            adjacent_lowsec: graph
                .neighbors(idx)
                .iter()
                .filter(|&&n| !matches!(graph.security_class(n), super::system::SecurityClass::High))
                .map(|&n| graph.name[n].clone())
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::graph::build_graph;
    use crate::universe::system::{RawGate, RawSystem, UniverseSourceDocument};

    #[test]
    fn finds_border_within_range() {
        let systems = vec![
            RawSystem { id: 1, name: "Alpha".into(), security: 0.9, constellation_id: 1, region_id: 1, constellation_name: None, region_name: None },
            RawSystem { id: 2, name: "Beta".into(), security: 0.9, constellation_id: 1, region_id: 1, constellation_name: None, region_name: None },
            RawSystem { id: 3, name: "Gamma".into(), security: 0.3, constellation_id: 1, region_id: 1, constellation_name: None, region_name: None },
        ];
        let gates = vec![
            RawGate { from_system_id: 1, to_system_id: 2 },
            RawGate { from_system_id: 2, to_system_id: 3 },
        ];
        let g = build_graph(UniverseSourceDocument { systems, gates }).unwrap();
        let origin = g.index_of_name("Alpha").unwrap();
        let hits = find_borders(&g, origin, 5, 5, Deadline::none()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Beta");
        assert_eq!(hits[0].jumps_from_origin, 1);
    }
}
