//! Star system value types and the three-way security classification.

use serde::Serialize;

/// A region contains constellations; a constellation contains systems
/// (spec.md GLOSSARY). IDs are the game's stable 32-bit identifiers.
pub type SystemId = u32;
pub type ConstellationId = u32;
pub type RegionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityClass {
    High,
    Low,
    Null,
}

impl SecurityClass {
    /// HIGH >= 0.45, LOW in (0.0, 0.45), NULL <= 0.0 (spec.md §3/GLOSSARY).
    pub fn classify(security: f32) -> Self {
        if security >= 0.45 {
            SecurityClass::High
        } else if security > 0.0 {
            SecurityClass::Low
        } else {
            SecurityClass::Null
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityClass::High => "high",
            SecurityClass::Low => "low",
            SecurityClass::Null => "null",
        }
    }
}

/// Source record as parsed from the universe JSON cache, before indexing.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawSystem {
    pub id: SystemId,
    pub name: String,
    pub security: f32,
    pub constellation_id: ConstellationId,
    pub region_id: RegionId,
    #[serde(default)]
    pub constellation_name: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawGate {
    pub from_system_id: SystemId,
    pub to_system_id: SystemId,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct UniverseSourceDocument {
    pub systems: Vec<RawSystem>,
    pub gates: Vec<RawGate>,
}
