//! The immutable in-memory universe graph (spec.md §3/§4.3).
//!
//! Built once at process start from a JSON cache, never mutated afterwards.
//! Topology lives in a `petgraph::UnGraph` for BFS; vertex attributes live in
//! parallel index-addressed `Vec`s so attribute lookups stay O(1) and
//! independent of petgraph's internal node identifiers (SPEC_FULL §4.3).

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Result};
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};

use super::system::{ConstellationId, RegionId, SecurityClass, SystemId, UniverseSourceDocument};

pub const CURRENT_FORMAT_VERSION: u16 = 1;

/// Per-mode edge weight, assigned as a function of source/destination
/// security class transitions (spec.md §4.3). Built once per graph and
/// reused for every `safe`/`unsafe` routing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    Shortest,
    Safe,
    Unsafe,
}

impl RouteMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shortest" => Some(RouteMode::Shortest),
            "safe" => Some(RouteMode::Safe),
            "unsafe" => Some(RouteMode::Unsafe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMode::Shortest => "shortest",
            RouteMode::Safe => "safe",
            RouteMode::Unsafe => "unsafe",
        }
    }
}

fn safe_weight(from: SecurityClass, to: SecurityClass) -> f64 {
    match to {
        SecurityClass::High => 1.0,
        SecurityClass::Low => {
            if from == SecurityClass::High {
                50.0
            } else {
                10.0
            }
        }
        SecurityClass::Null => 100.0,
    }
}

fn unsafe_weight(to: SecurityClass) -> f64 {
    match to {
        SecurityClass::Null => 1.0,
        SecurityClass::Low => 2.0,
        SecurityClass::High => 10.0,
    }
}

pub struct UniverseGraph {
    pub(crate) topology: UnGraph<(), ()>,
    pub(crate) safe_digraph: DiGraph<(), f64>,
    pub(crate) unsafe_digraph: DiGraph<(), f64>,

    pub(crate) system_id: Vec<SystemId>,
    pub(crate) name: Vec<String>,
    pub(crate) security: Vec<f32>,
    pub(crate) constellation_id: Vec<ConstellationId>,
    pub(crate) region_id: Vec<RegionId>,
    /// Adjacency, sorted ascending by neighbor vertex index, for deterministic
    /// BFS tie-breaking (spec.md §4.3 routing / §8 routing laws).
    pub(crate) adjacency: Vec<Vec<usize>>,

    pub(crate) id_index: HashMap<SystemId, usize>,
    pub(crate) name_index: HashMap<String, usize>,
    pub(crate) casefold_index: HashMap<String, usize>,
    pub(crate) constellation_names: HashMap<ConstellationId, String>,
    pub(crate) region_names: HashMap<RegionId, String>,

    pub(crate) high_set: HashSet<usize>,
    pub(crate) low_set: HashSet<usize>,
    pub(crate) null_set: HashSet<usize>,
    pub(crate) border_set: HashSet<usize>,
    pub(crate) region_to_indices: HashMap<RegionId, Vec<usize>>,

    pub version: u16,
}

impl UniverseGraph {
    pub fn len(&self) -> usize {
        self.system_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.system_id.is_empty()
    }

    pub fn security_class(&self, idx: usize) -> SecurityClass {
        SecurityClass::classify(self.security[idx])
    }

    pub fn is_border(&self, idx: usize) -> bool {
        self.border_set.contains(&idx)
    }

    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.adjacency[idx]
    }

    pub fn index_of_id(&self, id: SystemId) -> Option<usize> {
        self.id_index.get(&id).copied()
    }

    /// Case-insensitive exact lookup (spec.md §4.3 name resolution).
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.casefold_index.get(&name.to_lowercase()).copied()
    }

    /// Up to `limit` canonical names whose case-folded form starts with or
    /// contains `query`, preferring prefix matches (spec.md §4.3).
    pub fn suggest_names(&self, query: &str, limit: usize) -> Vec<String> {
        let needle = query.to_lowercase();
        let mut prefix_hits = Vec::new();
        let mut contains_hits = Vec::new();
        let mut folded: Vec<&String> = self.name.iter().collect();
        folded.sort();
        for canon in folded {
            let folded_name = canon.to_lowercase();
            if folded_name.starts_with(&needle) {
                prefix_hits.push(canon.clone());
            } else if folded_name.contains(&needle) {
                contains_hits.push(canon.clone());
            }
        }
        prefix_hits.extend(contains_hits);
        prefix_hits.truncate(limit);
        prefix_hits
    }

    pub fn weight(&self, mode: RouteMode, from_idx: usize, to_idx: usize) -> f64 {
        let from = self.security_class(from_idx);
        let to = self.security_class(to_idx);
        match mode {
            RouteMode::Shortest => 1.0,
            RouteMode::Safe => safe_weight(from, to),
            RouteMode::Unsafe => unsafe_weight(to),
        }
    }

    pub fn node(&self, idx: usize) -> NodeIndex {
        NodeIndex::new(idx)
    }

    pub fn region_members(&self, region_id: RegionId) -> &[usize] {
        self.region_to_indices
            .get(&region_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn region_id_by_name(&self, name: &str) -> Option<RegionId> {
        let needle = name.to_lowercase();
        self.region_names
            .iter()
            .find(|(_, n)| n.to_lowercase() == needle)
            .map(|(id, _)| *id)
    }

    /// Validate every invariant from spec.md §8 that a build or load must hold.
    pub fn validate_invariants(&self) -> Result<()> {
        let n = self.len();
        if self.security.len() != n
            || self.constellation_id.len() != n
            || self.region_id.len() != n
            || self.name.len() != n
            || self.adjacency.len() != n
        {
            bail!("attribute array length mismatch against vertex count {n}");
        }

        let mut seen = HashSet::with_capacity(n);
        for idx in 0..n {
            let in_high = self.high_set.contains(&idx);
            let in_low = self.low_set.contains(&idx);
            let in_null = self.null_set.contains(&idx);
            let count = [in_high, in_low, in_null].iter().filter(|b| **b).count();
            if count != 1 {
                bail!("vertex {idx} is in {count} security sets, expected exactly 1");
            }
            seen.insert(idx);
        }
        if seen.len() != n {
            bail!("security sets do not cover all {n} vertices");
        }

        for &idx in &self.border_set {
            if !self.high_set.contains(&idx) {
                bail!("border vertex {idx} is not in the HIGH set");
            }
            let has_non_high_neighbor = self.adjacency[idx]
                .iter()
                .any(|&n| self.security_class(n) != SecurityClass::High);
            if !has_non_high_neighbor {
                bail!("border vertex {idx} has no non-HIGH neighbor");
            }
        }

        for (idx, neighbors) in self.adjacency.iter().enumerate() {
            for &n in neighbors {
                if n >= self.len() {
                    bail!("edge endpoint {n} out of range (len {})", self.len());
                }
                if !self.adjacency[n].contains(&idx) {
                    bail!("edge ({idx},{n}) is not bidirectional");
                }
            }
        }

        for (&region, indices) in &self.region_to_indices {
            for &idx in indices {
                if self.region_id[idx] != region {
                    bail!("region membership mismatch at vertex {idx}");
                }
            }
        }

        Ok(())
    }
}

/// Build a fresh `UniverseGraph` from the parsed source document.
///
/// Steps (spec.md §4.3 Build): dedupe edges by canonical (min,max) index
/// ordering, sort vertices by stable system id for reproducible indices,
/// then compute membership sets and the border set in one pass.
pub fn build_graph(doc: UniverseSourceDocument) -> Result<UniverseGraph> {
    let mut systems = doc.systems;
    systems.sort_by_key(|s| s.id);

    let n = systems.len();
    let mut id_index = HashMap::with_capacity(n);
    let mut system_id = Vec::with_capacity(n);
    let mut name = Vec::with_capacity(n);
    let mut security = Vec::with_capacity(n);
    let mut constellation_id = Vec::with_capacity(n);
    let mut region_id = Vec::with_capacity(n);
    let mut name_index = HashMap::with_capacity(n);
    let mut casefold_index = HashMap::with_capacity(n);
    let mut constellation_names = HashMap::new();
    let mut region_names = HashMap::new();
    let mut region_to_indices: HashMap<RegionId, Vec<usize>> = HashMap::new();

    for (idx, sys) in systems.iter().enumerate() {
        id_index.insert(sys.id, idx);
        name.push(sys.name.clone());
        security.push(sys.security);
        constellation_id.push(sys.constellation_id);
        region_id.push(sys.region_id);
        if name_index.insert(sys.name.clone(), idx).is_some() {
            bail!("duplicate system name `{}`", sys.name);
        }
        casefold_index.insert(sys.name.to_lowercase(), idx);
        if let Some(cname) = &sys.constellation_name {
            constellation_names.insert(sys.constellation_id, cname.clone());
        }
        if let Some(rname) = &sys.region_name {
            region_names.insert(sys.region_id, rname.clone());
        }
        region_to_indices.entry(sys.region_id).or_default().push(idx);
    }

    let mut edge_set: HashSet<(usize, usize)> = HashSet::new();
    for gate in &doc.gates {
        let a = *id_index
            .get(&gate.from_system_id)
            .ok_or_else(|| anyhow!("gate references unknown system {}", gate.from_system_id))?;
        let b = *id_index
            .get(&gate.to_system_id)
            .ok_or_else(|| anyhow!("gate references unknown system {}", gate.to_system_id))?;
        if a == b {
            continue;
        }
        let key = (a.min(b), a.max(b));
        edge_set.insert(key);
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(a, b) in &edge_set {
        adjacency[a].push(b);
        adjacency[b].push(a);
    }
    for adj in &mut adjacency {
        adj.sort_unstable();
        adj.dedup();
    }

    let mut topology = UnGraph::<(), ()>::with_capacity(n, edge_set.len());
    for _ in 0..n {
        topology.add_node(());
    }
    for &(a, b) in &edge_set {
        topology.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
    }

    let mut high_set = HashSet::new();
    let mut low_set = HashSet::new();
    let mut null_set = HashSet::new();
    for idx in 0..n {
        match SecurityClass::classify(security[idx]) {
            SecurityClass::High => {
                high_set.insert(idx);
            }
            SecurityClass::Low => {
                low_set.insert(idx);
            }
            SecurityClass::Null => {
                null_set.insert(idx);
            }
        }
    }

    let mut border_set = HashSet::new();
    for &idx in &high_set {
        if adjacency[idx]
            .iter()
            .any(|&n| SecurityClass::classify(security[n]) != SecurityClass::High)
        {
            border_set.insert(idx);
        }
    }

    let (safe_digraph, unsafe_digraph) = build_weighted_digraphs(&adjacency, &security);

    let graph = UniverseGraph {
        topology,
        safe_digraph,
        unsafe_digraph,
        system_id,
        name,
        security,
        constellation_id,
        region_id,
        adjacency,
        id_index,
        name_index,
        casefold_index,
        constellation_names,
        region_names,
        high_set,
        low_set,
        null_set,
        border_set,
        region_to_indices,
        version: CURRENT_FORMAT_VERSION,
    };

    graph.validate_invariants()?;
    Ok(graph)
}

fn build_weighted_digraphs(
    adjacency: &[Vec<usize>],
    security: &[f32],
) -> (DiGraph<(), f64>, DiGraph<(), f64>) {
    let n = adjacency.len();
    let mut safe = DiGraph::<(), f64>::with_capacity(n, n * 2);
    let mut unsafe_g = DiGraph::<(), f64>::with_capacity(n, n * 2);
    for _ in 0..n {
        safe.add_node(());
        unsafe_g.add_node(());
    }
    for (u, neighbors) in adjacency.iter().enumerate() {
        let from_class = SecurityClass::classify(security[u]);
        for &v in neighbors {
            let to_class = SecurityClass::classify(security[v]);
            safe.add_edge(
                NodeIndex::new(u),
                NodeIndex::new(v),
                safe_weight(from_class, to_class),
            );
            unsafe_g.add_edge(
                NodeIndex::new(u),
                NodeIndex::new(v),
                unsafe_weight(to_class),
            );
        }
    }
    (safe, unsafe_g)
}
