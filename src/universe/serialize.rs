//! Safe binary (de)serialization of the universe graph (spec.md §4.3/§9).
//!
//! A hand-written, length-prefixed binary record format: magic bytes, a
//! format-version tag, then fixed-width fields written with
//! `to_le_bytes`/`from_le_bytes`. Deliberately not `bincode`/`serde`-derived
//! object graph serialization, which could execute arbitrary code on load if
//! the type implementing `Deserialize` ever grew a custom visitor with side
//! effects — the teacher's own pickle-style predecessor format is explicitly
//! deprecated for the same reason (spec.md §4.3/§9).

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::graph::{build_graph, UniverseGraph, CURRENT_FORMAT_VERSION};
use super::system::{RawGate, RawSystem, UniverseSourceDocument};

const MAGIC: &[u8; 4] = b"STGR";

fn write_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn read_string(cursor: &mut &[u8]) -> Result<String> {
    if cursor.len() < 2 {
        bail!("truncated string length");
    }
    let (len_bytes, rest) = cursor.split_at(2);
    let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if rest.len() < len {
        bail!("truncated string body");
    }
    let (body, rest) = rest.split_at(len);
    *cursor = rest;
    Ok(String::from_utf8(body.to_vec())?)
}

fn read_u32(cursor: &mut &[u8]) -> Result<u32> {
    if cursor.len() < 4 {
        bail!("truncated u32");
    }
    let (b, rest) = cursor.split_at(4);
    *cursor = rest;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_f32(cursor: &mut &[u8]) -> Result<f32> {
    Ok(f32::from_bits(read_u32(cursor)?))
}

/// Serialize the graph's source facts (not its derived indexes — those are
/// rebuilt deterministically on load via [`build_graph`]).
pub fn serialize(graph: &UniverseGraph) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&CURRENT_FORMAT_VERSION.to_le_bytes());

    buf.extend_from_slice(&(graph.len() as u32).to_le_bytes());
    for idx in 0..graph.len() {
        buf.extend_from_slice(&graph.system_id[idx].to_le_bytes());
        buf.extend_from_slice(&graph.security[idx].to_bits().to_le_bytes());
        buf.extend_from_slice(&graph.constellation_id[idx].to_le_bytes());
        buf.extend_from_slice(&graph.region_id[idx].to_le_bytes());
        write_string(&mut buf, &graph.name[idx]);
    }

    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (idx, neighbors) in graph.adjacency.iter().enumerate() {
        for &n in neighbors {
            if n > idx {
                edges.push((idx, n));
            }
        }
    }
    buf.extend_from_slice(&(edges.len() as u32).to_le_bytes());
    for (a, b) in edges {
        buf.extend_from_slice(&graph.system_id[a].to_le_bytes());
        buf.extend_from_slice(&graph.system_id[b].to_le_bytes());
    }

    buf.extend_from_slice(&(graph.constellation_names.len() as u32).to_le_bytes());
    for (id, name) in &graph.constellation_names {
        buf.extend_from_slice(&id.to_le_bytes());
        write_string(&mut buf, name);
    }
    buf.extend_from_slice(&(graph.region_names.len() as u32).to_le_bytes());
    for (id, name) in &graph.region_names {
        buf.extend_from_slice(&id.to_le_bytes());
        write_string(&mut buf, name);
    }

    buf
}

/// Deserialize and rebuild. A wrong magic (e.g. a legacy pickle-style file)
/// is reported as a distinct, actionable error rather than silently
/// misparsed — the bootstrap tool tells the operator to rebuild rather than
/// attempting a silent auto-upgrade (no legacy corpus exists to upgrade
/// from in this repository; see DESIGN.md).
pub fn deserialize(bytes: &[u8]) -> Result<UniverseGraph> {
    let mut cursor = bytes;
    if cursor.len() < 6 || &cursor[0..4] != MAGIC {
        bail!("not a recognized universe graph file (bad magic bytes) — rebuild with `build_graph`");
    }
    cursor = &cursor[4..];
    let version = u16::from_le_bytes([cursor[0], cursor[1]]);
    cursor = &cursor[2..];
    if version != CURRENT_FORMAT_VERSION {
        bail!("unsupported universe graph format version {version}, expected {CURRENT_FORMAT_VERSION} — rebuild with `build_graph`");
    }

    let n = read_u32(&mut cursor)? as usize;
    let mut systems = Vec::with_capacity(n);
    for _ in 0..n {
        let id = read_u32(&mut cursor)?;
        let security = read_f32(&mut cursor)?;
        let constellation_id = read_u32(&mut cursor)?;
        let region_id = read_u32(&mut cursor)?;
        let name = read_string(&mut cursor)?;
        systems.push(RawSystem {
            id,
            name,
            security,
            constellation_id,
            region_id,
            constellation_name: None,
            region_name: None,
        });
    }

    let n_edges = read_u32(&mut cursor)? as usize;
    let mut gates = Vec::with_capacity(n_edges);
    for _ in 0..n_edges {
        let a = read_u32(&mut cursor)?;
        let b = read_u32(&mut cursor)?;
        gates.push(RawGate {
            from_system_id: a,
            to_system_id: b,
        });
    }

    let n_constellations = read_u32(&mut cursor)? as usize;
    let mut constellation_names = std::collections::HashMap::new();
    for _ in 0..n_constellations {
        let id = read_u32(&mut cursor)?;
        let name = read_string(&mut cursor)?;
        constellation_names.insert(id, name);
    }
    let n_regions = read_u32(&mut cursor)? as usize;
    let mut region_names = std::collections::HashMap::new();
    for _ in 0..n_regions {
        let id = read_u32(&mut cursor)?;
        let name = read_string(&mut cursor)?;
        region_names.insert(id, name);
    }

    for sys in &mut systems {
        sys.constellation_name = constellation_names.get(&sys.constellation_id).cloned();
        sys.region_name = region_names.get(&sys.region_id).cloned();
    }

    let doc = UniverseSourceDocument { systems, gates };
    build_graph(doc).context("rebuilding graph from deserialized source facts")
}

pub fn save_to_path(graph: &UniverseGraph, path: impl AsRef<Path>) -> Result<()> {
    let bytes = serialize(graph);
    let mut file = std::fs::File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<UniverseGraph> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    deserialize(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::system::{RawGate, RawSystem, UniverseSourceDocument};

    #[test]
    fn round_trips_through_bytes() {
        let systems = vec![
            RawSystem { id: 1, name: "Alpha".into(), security: 0.9, constellation_id: 1, region_id: 1, constellation_name: Some("ConA".into()), region_name: Some("RegA".into()) },
            RawSystem { id: 2, name: "Beta".into(), security: 0.3, constellation_id: 1, region_id: 1, constellation_name: Some("ConA".into()), region_name: Some("RegA".into()) },
        ];
        let gates = vec![RawGate { from_system_id: 1, to_system_id: 2 }];
        let original = build_graph(UniverseSourceDocument { systems, gates }).unwrap();

        let bytes = serialize(&original);
        assert_eq!(&bytes[0..4], MAGIC);
        let restored = deserialize(&bytes).unwrap();

        assert_eq!(restored.len(), original.len());
        assert_eq!(restored.name, original.name);
        assert_eq!(restored.security, original.security);
        restored.validate_invariants().unwrap();
    }

    #[test]
    fn bad_magic_is_rejected() {
        let err = deserialize(b"XXXX\x01\x00").unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }
}
