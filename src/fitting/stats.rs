//! Embedded stats engine for the fitting façade (spec.md §4.8 / §9 "Fitting
//! library"). The upstream domain library the source embeds is a
//! third-party fitting engine; here that is replaced by a direct
//! re-implementation against a small static baseline table, following the
//! same closed-form-formula style `risk.rs` uses for Kelly/VaR rather than
//! shelling out to an external physics engine.
//!
//! The numbers are approximations, not a byte-for-byte dogma clone: the
//! façade's contract (ship + modules + charges + drones + skill level in,
//! EHP/DPS/capacitor/resource usage out) is what's preserved.

use std::collections::HashMap;

use super::parser::ParsedFit;

#[derive(Debug, Clone, Copy)]
struct ShipBaseline {
    shield_hp: f64,
    armor_hp: f64,
    hull_hp: f64,
    cap_capacity: f64,
    cap_recharge_s: f64,
    base_dps: f64,
    cpu: f64,
    powergrid: f64,
}

const DEFAULT_FRIGATE: ShipBaseline = ShipBaseline {
    shield_hp: 500.0,
    armor_hp: 400.0,
    hull_hp: 350.0,
    cap_capacity: 300.0,
    cap_recharge_s: 180.0,
    base_dps: 40.0,
    cpu: 130.0,
    powergrid: 40.0,
};

const DEFAULT_CRUISER: ShipBaseline = ShipBaseline {
    shield_hp: 1800.0,
    armor_hp: 1600.0,
    hull_hp: 1400.0,
    cap_capacity: 900.0,
    cap_recharge_s: 300.0,
    base_dps: 120.0,
    cpu: 220.0,
    powergrid: 110.0,
};

const DEFAULT_BATTLESHIP: ShipBaseline = ShipBaseline {
    shield_hp: 7000.0,
    armor_hp: 6500.0,
    hull_hp: 6000.0,
    cap_capacity: 5000.0,
    cap_recharge_s: 1100.0,
    base_dps: 400.0,
    cpu: 400.0,
    powergrid: 900.0,
};

/// Baseline hull stats keyed by lowercase ship name. A handful of common
/// hulls per class; anything unrecognized falls back to the frigate
/// baseline scaled by a coarse name heuristic.
fn ship_baseline(ship_type: &str) -> ShipBaseline {
    let name = ship_type.to_lowercase();
    let table: HashMap<&str, ShipBaseline> = HashMap::from([
        ("rifter", DEFAULT_FRIGATE),
        ("punisher", DEFAULT_FRIGATE),
        ("merlin", DEFAULT_FRIGATE),
        ("rupture", DEFAULT_CRUISER),
        ("stabber", DEFAULT_CRUISER),
        ("vexor", DEFAULT_CRUISER),
        ("megathron", DEFAULT_BATTLESHIP),
        ("dominix", DEFAULT_BATTLESHIP),
        ("apocalypse", DEFAULT_BATTLESHIP),
    ]);
    if let Some(baseline) = table.get(name.as_str()) {
        return *baseline;
    }
    if name.contains("battleship") || name.contains("dread") {
        DEFAULT_BATTLESHIP
    } else if name.contains("cruiser") || name.contains("destroyer") {
        DEFAULT_CRUISER
    } else {
        DEFAULT_FRIGATE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleKind {
    Weapon,
    ShieldBooster,
    ArmorRepairer,
    ResistancePlate,
    CapacitorBooster,
    Propulsion,
    Utility,
}

fn classify_module(name: &str) -> ModuleKind {
    let n = name.to_lowercase();
    if n.contains("autocannon")
        || n.contains("blaster")
        || n.contains("railgun")
        || n.contains("laser")
        || n.contains("missile")
        || n.contains("launcher")
        || n.contains("cannon")
    {
        ModuleKind::Weapon
    } else if n.contains("shield booster") || n.contains("shield extender") {
        ModuleKind::ShieldBooster
    } else if n.contains("armor repairer") || n.contains("plate") {
        ModuleKind::ArmorRepairer
    } else if n.contains("hardener") || n.contains("resist") {
        ModuleKind::ResistancePlate
    } else if n.contains("cap booster") || n.contains("capacitor") {
        ModuleKind::CapacitorBooster
    } else if n.contains("afterburner") || n.contains("microwarpdrive") || n.contains("propulsion") {
        ModuleKind::Propulsion
    } else {
        ModuleKind::Utility
    }
}

/// Skill levels are a flat 0-5 score applied uniformly to weapon and tank
/// modules, standing in for the per-skill training effects `skills::`
/// computes in detail. `None` is treated as all-zero (unskilled) training.
#[derive(Debug, Clone, Copy)]
pub struct SkillModifier {
    pub level: u8,
}

impl SkillModifier {
    fn multiplier(&self) -> f64 {
        1.0 + (self.level.min(5) as f64) * 0.04
    }
}

#[derive(Debug, Clone)]
pub struct FittingStats {
    pub ehp: f64,
    pub dps: f64,
    pub cap_stability_pct: f64,
    pub cpu_used: f64,
    pub cpu_total: f64,
    pub powergrid_used: f64,
    pub powergrid_total: f64,
}

/// Per-module CPU/powergrid draw, flat approximation by kind.
fn module_cost(kind: ModuleKind) -> (f64, f64) {
    match kind {
        ModuleKind::Weapon => (20.0, 25.0),
        ModuleKind::ShieldBooster => (30.0, 20.0),
        ModuleKind::ArmorRepairer => (25.0, 30.0),
        ModuleKind::ResistancePlate => (15.0, 10.0),
        ModuleKind::CapacitorBooster => (15.0, 5.0),
        ModuleKind::Propulsion => (10.0, 35.0),
        ModuleKind::Utility => (10.0, 10.0),
    }
}

/// Per-module capacitor drain per second, flat approximation by kind.
fn module_cap_drain(kind: ModuleKind) -> f64 {
    match kind {
        ModuleKind::Weapon => 2.0,
        ModuleKind::ShieldBooster => 6.0,
        ModuleKind::ArmorRepairer => 5.0,
        ModuleKind::CapacitorBooster => -8.0,
        ModuleKind::Propulsion => 4.0,
        ModuleKind::ResistancePlate | ModuleKind::Utility => 0.5,
    }
}

pub fn calculate(fit: &ParsedFit, skill: Option<SkillModifier>) -> FittingStats {
    let baseline = ship_baseline(&fit.ship_type);
    let skill_mult = skill.map(|s| s.multiplier()).unwrap_or(1.0);

    let mut ehp_bonus = 0.0;
    let mut dps_bonus = 0.0;
    let mut cpu_used = 0.0;
    let mut powergrid_used = 0.0;
    let mut cap_drain_per_s = 0.0;
    let mut weapon_count = 0u32;

    for module in &fit.modules {
        if module.offline {
            continue;
        }
        let kind = classify_module(&module.name);
        let (cpu, pg) = module_cost(kind);
        cpu_used += cpu;
        powergrid_used += pg;
        cap_drain_per_s += module_cap_drain(kind);

        match kind {
            ModuleKind::Weapon => {
                weapon_count += 1;
                dps_bonus += baseline.base_dps * 0.3 * skill_mult;
            }
            ModuleKind::ShieldBooster => ehp_bonus += baseline.shield_hp * 0.25,
            ModuleKind::ArmorRepairer => ehp_bonus += baseline.armor_hp * 0.2,
            ModuleKind::ResistancePlate => ehp_bonus += (baseline.armor_hp + baseline.shield_hp) * 0.05,
            _ => {}
        }
    }

    let drone_dps: f64 = fit
        .drones
        .iter()
        .map(|d| d.quantity as f64 * 8.0 * skill_mult)
        .sum();

    let total_dps = if weapon_count == 0 {
        drone_dps
    } else {
        baseline.base_dps * skill_mult + dps_bonus + drone_dps
    };

    let ehp = baseline.shield_hp + baseline.armor_hp + baseline.hull_hp + ehp_bonus;

    // Steady-state capacitor stability: recharge rate at 0% (peak at 25-33%
    // depth in the real model) approximated here as a flat capacity/recharge
    // ratio, which is a reasonable closed-form stand-in for the façade's
    // contract without simulating the full charge curve.
    let cap_recharge_per_s = baseline.cap_capacity / baseline.cap_recharge_s * 2.5;
    let cap_stability_pct = if cap_drain_per_s <= 0.0 {
        100.0
    } else {
        ((cap_recharge_per_s - cap_drain_per_s) / cap_recharge_per_s * 100.0).clamp(0.0, 100.0)
    };

    FittingStats {
        ehp,
        dps: total_dps,
        cap_stability_pct,
        cpu_used,
        cpu_total: baseline.cpu,
        powergrid_used,
        powergrid_total: baseline.powergrid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::parser::{ParsedDrone, ParsedModule};

    fn sample_fit() -> ParsedFit {
        ParsedFit {
            ship_type: "Rifter".to_string(),
            fit_name: "Tackler".to_string(),
            modules: vec![
                ParsedModule {
                    name: "200mm AutoCannon II".to_string(),
                    charge: Some("Republic Fleet EMP S".to_string()),
                    offline: false,
                },
                ParsedModule {
                    name: "Small Armor Repairer II".to_string(),
                    charge: None,
                    offline: false,
                },
            ],
            drones: vec![ParsedDrone {
                name: "Warrior I".to_string(),
                quantity: 2,
            }],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn computes_nonzero_dps_and_ehp() {
        let fit = sample_fit();
        let stats = calculate(&fit, Some(SkillModifier { level: 4 }));
        assert!(stats.dps > 0.0);
        assert!(stats.ehp > 0.0);
        assert!(stats.cap_stability_pct >= 0.0 && stats.cap_stability_pct <= 100.0);
    }

    #[test]
    fn offline_modules_do_not_contribute() {
        let mut fit = sample_fit();
        fit.modules[0].offline = true;
        let online = calculate(&sample_fit(), None);
        let with_offline = calculate(&fit, None);
        assert!(with_offline.dps < online.dps);
    }

    #[test]
    fn unknown_hull_falls_back_to_frigate_baseline() {
        let mut fit = sample_fit();
        fit.ship_type = "Totally Unknown Hull".to_string();
        let stats = calculate(&fit, None);
        assert!(stats.ehp > 0.0);
    }
}
