//! Training-time and skill-plan calculations (spec.md §4.7 `skills(action,
//! …)`). Closed-form formulas over the game's published skill-point curve,
//! in the same direct-formula style `risk.rs` uses for Kelly/VaR rather than
//! delegating to an external engine.

use serde::Serialize;

use crate::error::{ToolError, ToolResult};

/// Primary attributes drive SP/minute; a 1.0 multiplier is the unboosted
/// baseline (average of two relevant attributes at 20 each, the game's
/// "no implants" default).
const BASE_SP_PER_MINUTE: f64 = 2700.0 / 60.0;

/// Skill-point cost per level follows the published rank curve:
/// `SP(level) = 250 * rank * multiplier^(level - 1)` for level >= 1, where
/// `multiplier = 2.5^(1/2)` is the game's fixed level-to-level growth rate.
const LEVEL_GROWTH: f64 = 1.58113883; // sqrt(2.5)

fn sp_for_level(rank: u32, level: u8) -> f64 {
    if level == 0 {
        return 0.0;
    }
    250.0 * rank as f64 * LEVEL_GROWTH.powi(level as i32 - 1)
}

/// Cumulative SP required to reach `level` from scratch (levels 1..=level).
fn cumulative_sp(rank: u32, level: u8) -> f64 {
    (1..=level).map(|l| sp_for_level(rank, l)).sum()
}

#[derive(Debug, Serialize)]
pub struct TrainingTimeResult {
    pub skill_name: String,
    pub rank: u32,
    pub from_level: u8,
    pub to_level: u8,
    pub sp_required: f64,
    pub training_minutes: f64,
    pub training_days: f64,
}

#[derive(Debug, Serialize)]
pub struct PlanEntry {
    pub skill_name: String,
    pub rank: u32,
    pub to_level: u8,
    pub sp_required: f64,
    pub training_minutes: f64,
}

#[derive(Debug, Serialize)]
pub struct PlanResult {
    pub total_found: usize,
    pub entries: Vec<PlanEntry>,
    pub total_sp: f64,
    pub total_training_days: f64,
}

pub struct SkillsService;

impl SkillsService {
    pub fn new() -> Self {
        Self
    }

    /// `action="training_time"`: SP and wall-clock time to train one skill
    /// from `from_level` to `to_level`, at a given SP/minute rate.
    pub fn training_time(
        &self,
        skill_name: &str,
        rank: u32,
        from_level: u8,
        to_level: u8,
        sp_per_minute: Option<f64>,
    ) -> ToolResult<TrainingTimeResult> {
        if rank == 0 {
            return Err(ToolError::invalid_parameter("rank", "must be >= 1"));
        }
        if from_level > 5 || to_level > 5 {
            return Err(ToolError::invalid_parameter("to_level", "levels must be in 0..=5"));
        }
        if to_level <= from_level {
            return Err(ToolError::invalid_parameter(
                "to_level",
                "must be greater than from_level",
            ));
        }
        let rate = sp_per_minute.unwrap_or(BASE_SP_PER_MINUTE);
        if rate <= 0.0 {
            return Err(ToolError::invalid_parameter("sp_per_minute", "must be > 0"));
        }

        let sp_required = cumulative_sp(rank, to_level) - cumulative_sp(rank, from_level);
        let training_minutes = sp_required / rate;

        Ok(TrainingTimeResult {
            skill_name: skill_name.to_string(),
            rank,
            from_level,
            to_level,
            sp_required,
            training_minutes,
            training_days: training_minutes / (60.0 * 24.0),
        })
    }

    /// `action="plan"`: a sequence of (skill, rank, target level) entries,
    /// each trained from level 0, summed into one total SP/time cost.
    pub fn plan(
        &self,
        entries: &[(String, u32, u8)],
        sp_per_minute: Option<f64>,
    ) -> ToolResult<PlanResult> {
        if entries.is_empty() {
            return Ok(PlanResult {
                total_found: 0,
                entries: Vec::new(),
                total_sp: 0.0,
                total_training_days: 0.0,
            });
        }
        let rate = sp_per_minute.unwrap_or(BASE_SP_PER_MINUTE);
        if rate <= 0.0 {
            return Err(ToolError::invalid_parameter("sp_per_minute", "must be > 0"));
        }

        let mut out = Vec::with_capacity(entries.len());
        let mut total_sp = 0.0;
        for (name, rank, to_level) in entries {
            if *rank == 0 {
                return Err(ToolError::invalid_parameter("rank", "must be >= 1"));
            }
            if *to_level > 5 {
                return Err(ToolError::invalid_parameter("to_level", "must be in 0..=5"));
            }
            let sp_required = cumulative_sp(*rank, *to_level);
            total_sp += sp_required;
            out.push(PlanEntry {
                skill_name: name.clone(),
                rank: *rank,
                to_level: *to_level,
                sp_required,
                training_minutes: sp_required / rate,
            });
        }

        Ok(PlanResult {
            total_found: out.len(),
            entries: out,
            total_sp,
            total_training_days: (total_sp / rate) / (60.0 * 24.0),
        })
    }
}

impl Default for SkillsService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_time_scales_with_rank() {
        let svc = SkillsService::new();
        let cheap = svc.training_time("Gunnery", 1, 0, 3, None).unwrap();
        let costly = svc.training_time("Gunnery", 3, 0, 3, None).unwrap();
        assert!(costly.sp_required > cheap.sp_required);
        assert!(costly.training_minutes > cheap.training_minutes);
    }

    #[test]
    fn invalid_level_range_is_rejected() {
        let svc = SkillsService::new();
        let err = svc.training_time("Gunnery", 1, 3, 3, None).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidParameter);
    }

    #[test]
    fn plan_sums_across_entries() {
        let svc = SkillsService::new();
        let result = svc
            .plan(
                &[("Gunnery".to_string(), 1, 4), ("Spaceship Command".to_string(), 2, 3)],
                None,
            )
            .unwrap();
        assert_eq!(result.total_found, 2);
        assert!(result.total_sp > 0.0);
    }

    #[test]
    fn empty_plan_is_zero_not_an_error() {
        let svc = SkillsService::new();
        let result = svc.plan(&[], None).unwrap();
        assert_eq!(result.total_found, 0);
        assert_eq!(result.total_sp, 0.0);
    }
}
