//! # Objectives & Run End
//!
//! Win/loss evaluation at the end of every tick, the end-of-run summary, and
//! the objective line shown in the HUD for each run mode.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::pipeline::StageContext;
use super::state::{TimelineEntry, WorldState};
use super::tutorial::TUTORIAL_STEPS;
use crate::domain::{round_to, RunConfig, RunMode, Season};

/// Reliability required by a custom run at its target time
const CUSTOM_TARGET_RELIABILITY: f64 = 64.0;
const COLLAPSE_SECONDS: f64 = 15.0;
/// Timeline entries carried into the summary
const SUMMARY_TIMELINE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Victory,
    Defeat,
}

/// End-of-run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub result: RunResult,
    pub reason: String,
    pub run_label: String,
    pub run_class: RunMode,
    pub leaderboard_eligible: bool,
    pub duration_sec: f64,
    pub final_score: i64,
    pub reliability: f64,
    pub budget: f64,
    pub lawsuits: u32,
    pub demand_served_ratio: f64,
    pub season: Season,
    pub timeline: Vec<TimelineEntry>,
    pub config: RunConfig,
}

impl RunSummary {
    pub fn build(state: &WorldState, config: &RunConfig, result: RunResult, reason: impl Into<String>) -> Self {
        let final_score = (state.score + state.budget * 0.4 + state.reliability * 12.0
            - state.lawsuits as f64 * 35.0)
            .round() as i64;
        let skip = state.timeline.len().saturating_sub(SUMMARY_TIMELINE);
        Self {
            result,
            reason: reason.into(),
            run_label: config.label.clone(),
            run_class: config.mode,
            leaderboard_eligible: config.leaderboard_eligible && !config.dev_mode,
            duration_sec: state.runtime_seconds,
            final_score,
            reliability: state.reliability,
            budget: state.budget,
            lawsuits: state.lawsuits,
            demand_served_ratio: state.served_ratio(),
            season: state.season_label,
            timeline: state.timeline[skip..].to_vec(),
            config: config.clone(),
        }
    }

    pub fn is_victory(&self) -> bool {
        self.result == RunResult::Victory
    }
}

/// Towns counted towards campaign goals
pub fn stable_town_count(state: &WorldState) -> usize {
    state
        .grid
        .towns()
        .filter(|town| town.town().is_some_and(|t| t.is_served_at(0.7)))
        .count()
}

/// Check terminal conditions; returns the summary once the run ends
pub fn evaluate_end_conditions(state: &WorldState, ctx: &StageContext<'_>) -> Option<RunSummary> {
    let config = ctx.config;
    if config.is_tutorial() {
        return None;
    }
    let now = state.runtime_seconds;
    let end = |result: RunResult, reason: String| {
        info!(?result, %reason, runtime = now, score = state.score, "run ended");
        Some(RunSummary::build(state, config, result, reason))
    };

    if !config.dev_mode {
        if state.budget <= 0.0 {
            return end(RunResult::Defeat, "Bankruptcy triggered: budget reached zero.".into());
        }
        let strictness = if config.failure_strictness > 0.0 {
            config.failure_strictness
        } else {
            1.0
        };
        if state.reliability <= 16.0 / strictness && state.collapse_seconds >= COLLAPSE_SECONDS {
            return end(
                RunResult::Defeat,
                "Reliability collapse: sustained national blackout risk.".into(),
            );
        }
    }

    match (config.mode, &config.mission) {
        (RunMode::Campaign, Some(mission)) if now >= config.run_target_sec => {
            let objective = &mission.objective;
            let passed = state.reliability >= objective.reliability_floor
                && stable_town_count(state) >= objective.required_stable_towns
                && objective.budget_floor.map_or(true, |floor| state.budget >= floor)
                && objective.max_lawsuits.map_or(true, |max| state.lawsuits <= max);
            if passed {
                end(RunResult::Victory, format!("Mission complete: {}.", mission.codename))
            } else if config.dev_mode {
                end(
                    RunResult::Victory,
                    format!("Mission complete in Dev Mode: {}.", mission.codename),
                )
            } else {
                end(
                    RunResult::Defeat,
                    format!("Mission failed: {} objectives not met.", mission.codename),
                )
            }
        }
        (RunMode::Custom, _) if config.run_target_sec > 0.0 && now >= config.run_target_sec => {
            if state.reliability >= CUSTOM_TARGET_RELIABILITY && state.budget > 0.0 {
                end(
                    RunResult::Victory,
                    "Custom run target reached with stable grid performance.".into(),
                )
            } else if config.dev_mode {
                end(RunResult::Victory, "Custom run target reached in Dev Mode.".into())
            } else {
                end(
                    RunResult::Defeat,
                    "Custom run ended with unstable grid conditions.".into(),
                )
            }
        }
        _ => None,
    }
}

/// Objective line shown in the HUD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveStatus {
    pub title: String,
    pub description: String,
    /// 0-1
    pub progress: f64,
    pub detail: String,
}

fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn objective_status(state: &WorldState, config: &RunConfig) -> ObjectiveStatus {
    match config.mode {
        RunMode::Tutorial => {
            let progress = state.tutorial.clone().unwrap_or_default();
            match TUTORIAL_STEPS.get(progress.current_step).filter(|_| !progress.completed) {
                Some(step) => ObjectiveStatus {
                    title: format!("Tutorial: {}", step.title),
                    description: step.instruction.to_string(),
                    progress: progress.completed_steps as f64 / TUTORIAL_STEPS.len() as f64,
                    detail: format!("Progress {}/{}", progress.completed_steps, TUTORIAL_STEPS.len()),
                },
                None => ObjectiveStatus {
                    title: "Tutorial".into(),
                    description: "All tutorial steps complete.".into(),
                    progress: 1.0,
                    detail: format!("Progress {0}/{0}", TUTORIAL_STEPS.len()),
                },
            }
        }
        RunMode::Campaign if config.mission.is_some() => {
            let (codename, description, required) = config
                .mission
                .as_ref()
                .map(|m| (m.codename.clone(), m.description.clone(), m.objective.required_stable_towns))
                .unwrap_or_default();
            let target = config.run_target_sec.max(1.0);
            ObjectiveStatus {
                title: codename,
                description,
                progress: (state.runtime_seconds / target).clamp(0.0, 1.0),
                detail: format!(
                    "Towns stable {}/{} | Reliability {:.1}%",
                    stable_town_count(state),
                    required,
                    state.reliability
                ),
            }
        }
        RunMode::Custom if config.run_target_sec > 0.0 => ObjectiveStatus {
            title: "Custom Objective".into(),
            description: format!(
                "Survive until {} with stable reliability.",
                format_clock(config.run_target_sec)
            ),
            progress: (state.runtime_seconds / config.run_target_sec).clamp(0.0, 1.0),
            detail: format!(
                "Reliability {:.0}% | Budget {}",
                state.reliability,
                state.budget.round() as i64
            ),
        },
        _ => ObjectiveStatus {
            title: "Standard Run".into(),
            description: "Survive and maximize score before collapse conditions trigger.".into(),
            progress: 0.0,
            detail: format!(
                "Current score {} | Reliability {:.1}%",
                round_to(state.score, 0) as i64,
                state.reliability
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomOptions, StaticMap};
    use crate::grid::store::fixtures::town;
    use crate::power_flow::GridConstraints;
    use crate::terrain::FlatTerrain;
    use serde_json::json;

    fn evaluate(state: &WorldState, config: &RunConfig) -> Option<RunSummary> {
        let map = StaticMap::from_value(&json!({"towns": [{"id": "capital"}]})).unwrap();
        let constraints = GridConstraints::default();
        let ctx = StageContext {
            config,
            map: &map,
            terrain: &FlatTerrain,
            constraints: &constraints,
        };
        evaluate_end_conditions(state, &ctx)
    }

    #[test]
    fn test_bankruptcy_at_exactly_zero() {
        let config = RunConfig::standard("balanced");
        let mut state = WorldState::baseline(0.0);
        state.runtime_seconds = 12.0;
        let summary = evaluate(&state, &config).unwrap();
        assert_eq!(summary.result, RunResult::Defeat);
        assert!(summary.reason.starts_with("Bankruptcy"));

        state.budget = 0.01;
        assert!(evaluate(&state, &config).is_none());
        assert!(evaluate(&WorldState::baseline(0.0), &config.clone().with_dev_mode(true)).is_none());
    }

    #[test]
    fn test_collapse_needs_sustained_blackout() {
        let config = RunConfig::standard("balanced");
        let mut state = WorldState::baseline(500.0);
        state.reliability = 10.0;
        state.collapse_seconds = 14.9;
        assert!(evaluate(&state, &config).is_none());
        state.collapse_seconds = 15.0;
        let summary = evaluate(&state, &config).unwrap();
        assert_eq!(summary.reason, "Reliability collapse: sustained national blackout risk.");
    }

    #[test]
    fn test_campaign_objectives() {
        let config = RunConfig::campaign("first-light");
        let mut state = WorldState::baseline(2400.0);
        for (i, id) in ["capital", "harbor", "mill"].iter().enumerate() {
            let mut entity = town(id, i as f64 * 100.0, 0.0, 30.0);
            let t = entity.town_mut().unwrap();
            t.covered_by_substation = true;
            t.utilization = 0.9;
            state.grid.insert(entity);
        }
        state.reliability = 70.0;
        state.runtime_seconds = 479.9;
        assert!(evaluate(&state, &config).is_none());

        state.runtime_seconds = 480.0;
        let summary = evaluate(&state, &config).unwrap();
        assert!(summary.is_victory());
        assert_eq!(summary.reason, "Mission complete: First Light.");

        state.reliability = 50.0;
        let summary = evaluate(&state, &config).unwrap();
        assert_eq!(summary.reason, "Mission failed: First Light objectives not met.");
    }

    #[test]
    fn test_custom_target() {
        let options = CustomOptions {
            run_target_minutes: 1,
            ..Default::default()
        };
        let config = RunConfig::custom(&options).unwrap();
        let mut state = WorldState::baseline(900.0);
        state.runtime_seconds = 60.0;
        state.reliability = 64.0;
        assert!(evaluate(&state, &config).unwrap().is_victory());
        state.reliability = 63.0;
        assert_eq!(
            evaluate(&state, &config).unwrap().reason,
            "Custom run ended with unstable grid conditions."
        );
    }

    #[test]
    fn test_tutorial_never_ends() {
        let config = RunConfig::tutorial();
        let mut state = WorldState::baseline(-100.0);
        state.runtime_seconds = 10_000.0;
        assert!(evaluate(&state, &config).is_none());
    }

    #[test]
    fn test_summary_fields() {
        let config = RunConfig::standard("balanced");
        let mut state = WorldState::baseline(1000.0);
        state.score = 100.4;
        state.reliability = 50.0;
        state.lawsuits = 1;
        for i in 0..12 {
            state.log_timeline(format!("event {}", i));
        }
        let summary = RunSummary::build(&state, &config, RunResult::Defeat, "test");
        assert_eq!(summary.final_score, (100.4f64 + 400.0 + 600.0 - 35.0).round() as i64);
        assert_eq!(summary.timeline.len(), 8);
        assert_eq!(summary.timeline.last().unwrap().text, "event 11");
        assert_eq!(summary.demand_served_ratio, 1.0);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["result"], "defeat");
        assert_eq!(value["runClass"], "standard");
    }

    #[test]
    fn test_objective_text_per_mode() {
        let state = WorldState::baseline(1000.0);
        let standard = objective_status(&state, &RunConfig::standard("balanced"));
        assert_eq!(standard.title, "Standard Run");
        assert!(standard.detail.starts_with("Current score 0 | Reliability 84.0%"));

        let custom = objective_status(&state, &RunConfig::custom(&CustomOptions::default()).unwrap());
        assert_eq!(custom.description, "Survive until 15:00 with stable reliability.");

        let campaign = objective_status(&state, &RunConfig::campaign("first-light"));
        assert_eq!(campaign.title, "First Light");
        assert_eq!(campaign.detail, "Towns stable 0/3 | Reliability 84.0%");
    }
}
