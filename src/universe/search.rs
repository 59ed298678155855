//! System search: filter by security range, region, border-only, and
//! optional origin+max_jumps distance (spec.md §4.3).

use serde::Serialize;

use crate::cancellation::Deadline;
use crate::error::ToolError;

use super::graph::UniverseGraph;
use super::routing::bfs_within;

#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub security_min: Option<f32>,
    pub security_max: Option<f32>,
    pub region: Option<String>,
    pub border_only: bool,
    pub origin: Option<usize>,
    pub max_jumps: Option<u32>,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub security: f32,
    pub security_class: String,
    pub region: Option<String>,
    pub is_border: bool,
    pub jumps_from_origin: Option<usize>,
}

pub fn search(graph: &UniverseGraph, filter: &SearchFilter, deadline: Deadline) -> Result<Vec<SearchHit>, ToolError> {
    if filter.max_jumps.is_some() && filter.origin.is_none() {
        return Err(ToolError::invalid_parameter(
            "origin",
            "origin is required when max_jumps is set",
        ));
    }

    let distances = match filter.origin {
        Some(o) => Some(bfs_within(graph, o, filter.max_jumps.unwrap_or(0) as usize, deadline)?),
        None => None,
    };
    let dist_map: Option<std::collections::HashMap<usize, usize>> =
        distances.map(|v| v.into_iter().collect());

    let region_id = match &filter.region {
        Some(r) => match graph.region_id_by_name(r) {
            Some(id) => Some(id),
            None => return Ok(Vec::new()),
        },
        None => None,
    };

    let mut out = Vec::new();
    for idx in 0..graph.len() {
        if let Some(min) = filter.security_min {
            if graph.security[idx] < min {
                continue;
            }
        }
        if let Some(max) = filter.security_max {
            if graph.security[idx] > max {
                continue;
            }
        }
        if filter.border_only && !graph.is_border(idx) {
            continue;
        }
        if let Some(rid) = region_id {
            if graph.region_id[idx] != rid {
                continue;
            }
        }
        let jumps_from_origin = if let Some(map) = &dist_map {
            match map.get(&idx) {
                Some(&d) => Some(d),
                None => continue,
            }
        } else {
            None
        };

        out.push(SearchHit {
            name: graph.name[idx].clone(),
            security: graph.security[idx],
            security_class: graph.security_class(idx).as_str().to_string(),
            region: graph.region_names.get(&graph.region_id[idx]).cloned(),
            is_border: graph.is_border(idx),
            jumps_from_origin,
        });
    }

    out.sort_by(|a, b| a.name.cmp(&b.name));
    out.truncate(filter.limit.clamp(1, 100));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::graph::build_graph;
    use crate::universe::system::{RawGate, RawSystem, UniverseSourceDocument};

    fn graph() -> UniverseGraph {
        let systems = vec![
            RawSystem { id: 1, name: "Alpha".into(), security: 0.9, constellation_id: 1, region_id: 1, constellation_name: None, region_name: Some("Core".into()) },
            RawSystem { id: 2, name: "Beta".into(), security: 0.2, constellation_id: 1, region_id: 1, constellation_name: None, region_name: Some("Core".into()) },
        ];
        build_graph(UniverseSourceDocument { systems, gates: vec![RawGate { from_system_id: 1, to_system_id: 2 }] }).unwrap()
    }

    #[test]
    fn max_jumps_requires_origin() {
        let g = graph();
        let filter = SearchFilter {
            security_min: None,
            security_max: None,
            region: None,
            border_only: false,
            origin: None,
            max_jumps: Some(5),
            limit: 10,
        };
        let err = search(&g, &filter, Deadline::none()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidParameter);
    }

    #[test]
    fn filters_by_security_min() {
        let g = graph();
        let filter = SearchFilter {
            security_min: Some(0.5),
            security_max: None,
            region: None,
            border_only: false,
            origin: None,
            max_jumps: None,
            limit: 10,
        };
        let hits = search(&g, &filter, Deadline::none()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Alpha");
    }
}
