//! Route enrichment: expands a vertex sequence into full system info, a
//! security summary, chokepoints, danger zones, and warnings (spec.md §4.3).

use serde::Serialize;

use super::graph::UniverseGraph;
use super::system::SecurityClass;

#[derive(Debug, Clone, Serialize)]
pub struct NeighborInfo {
    pub name: String,
    pub security_class: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub name: String,
    pub id: u32,
    pub security: f32,
    pub security_class: String,
    pub constellation: Option<String>,
    pub region: Option<String>,
    pub neighbors: Vec<NeighborInfo>,
    pub is_border: bool,
    pub adjacent_non_high: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecuritySummary {
    pub high: usize,
    pub low: usize,
    pub null: usize,
    pub min_security: f32,
    pub min_security_system: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Chokepoint {
    pub system: String,
    pub transition: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DangerZone {
    pub start: String,
    pub end: String,
    pub length: usize,
    pub lowest_security: f32,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RouteWarnings {
    pub low_or_null_count: usize,
    pub pipe_systems: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedRoute {
    pub systems: Vec<SystemInfo>,
    pub security_summary: SecuritySummary,
    pub chokepoints: Vec<Chokepoint>,
    pub danger_zones: Vec<DangerZone>,
    pub warnings: RouteWarnings,
}

fn system_info(graph: &UniverseGraph, idx: usize) -> SystemInfo {
    let neighbors = graph
        .neighbors(idx)
        .iter()
        .map(|&n| NeighborInfo {
            name: graph.name[n].clone(),
            security_class: graph.security_class(n).as_str().to_string(),
        })
        .collect();
    let adjacent_non_high = graph
        .neighbors(idx)
        .iter()
        .filter(|&&n| graph.security_class(n) != SecurityClass::High)
        .map(|&n| graph.name[n].clone())
        .collect();

    SystemInfo {
        name: graph.name[idx].clone(),
        id: graph.system_id[idx],
        security: graph.security[idx],
        security_class: graph.security_class(idx).as_str().to_string(),
        constellation: graph.constellation_names.get(&graph.constellation_id[idx]).cloned(),
        region: graph.region_names.get(&graph.region_id[idx]).cloned(),
        neighbors,
        is_border: graph.is_border(idx),
        adjacent_non_high,
    }
}

pub fn enrich(graph: &UniverseGraph, path: &[usize], requested_safe: bool) -> EnrichedRoute {
    let systems: Vec<SystemInfo> = path.iter().map(|&idx| system_info(graph, idx)).collect();

    let mut high = 0usize;
    let mut low = 0usize;
    let mut null = 0usize;
    let mut min_security = f32::MAX;
    let mut min_security_system = String::new();
    for &idx in path {
        match graph.security_class(idx) {
            SecurityClass::High => high += 1,
            SecurityClass::Low => low += 1,
            SecurityClass::Null => null += 1,
        }
        if graph.security[idx] < min_security {
            min_security = graph.security[idx];
            min_security_system = graph.name[idx].clone();
        }
    }
    let security_summary = SecuritySummary {
        high,
        low,
        null,
        min_security,
        min_security_system,
    };

    let mut chokepoints = Vec::new();
    for w in path.windows(2) {
        let (a, b) = (w[0], w[1]);
        let ca = graph.security_class(a);
        let cb = graph.security_class(b);
        if ca == SecurityClass::High && cb != SecurityClass::High {
            chokepoints.push(Chokepoint {
                system: graph.name[b].clone(),
                transition: "high_to_non_high".to_string(),
            });
        } else if ca != SecurityClass::High && cb == SecurityClass::High {
            chokepoints.push(Chokepoint {
                system: graph.name[a].clone(),
                transition: "non_high_to_high".to_string(),
            });
        }
    }

    let mut danger_zones = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut run_lowest = f32::MAX;
    for (pos, &idx) in path.iter().enumerate() {
        let non_high = graph.security_class(idx) != SecurityClass::High;
        if non_high {
            if run_start.is_none() {
                run_start = Some(pos);
                run_lowest = graph.security[idx];
            } else {
                run_lowest = run_lowest.min(graph.security[idx]);
            }
        }
        let at_end = pos == path.len() - 1;
        if (!non_high || at_end) && run_start.is_some() {
            let start_pos = run_start.take().unwrap();
            let end_pos = if non_high && at_end { pos } else { pos - 1 };
            danger_zones.push(DangerZone {
                start: graph.name[path[start_pos]].clone(),
                end: graph.name[path[end_pos]].clone(),
                length: end_pos - start_pos + 1,
                lowest_security: run_lowest,
            });
        }
    }

    let mut warnings = RouteWarnings::default();
    warnings.low_or_null_count = low + null;
    if low + null > 0 {
        for &idx in path {
            if graph.security_class(idx) != SecurityClass::High && graph.neighbors(idx).len() == 2 {
                warnings.pipe_systems.push(graph.name[idx].clone());
            }
        }
        if requested_safe {
            warnings
                .notes
                .push("safe mode was requested but the result contains non-HIGH systems".to_string());
        }
    }

    EnrichedRoute {
        systems,
        security_summary,
        chokepoints,
        danger_zones,
        warnings,
    }
}
