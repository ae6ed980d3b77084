//! # Tutorial State Machine
//!
//! Linear checklist of core controls. Each step completes when the matching
//! player action is reported; the service step also completes passively once
//! any covered town receives power.

use tracing::info;

use super::state::{TutorialProgress, WorldState};
use crate::domain::{AlertLevel, AssetType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TutorialStep {
    pub id: &'static str,
    pub title: &'static str,
    pub instruction: &'static str,
}

pub static TUTORIAL_STEPS: [TutorialStep; 8] = [
    TutorialStep {
        id: "build_plant",
        title: "Build a Plant",
        instruction: "Use Build and Plant (1), then place it on an open map point.",
    },
    TutorialStep {
        id: "build_substation",
        title: "Build a Substation",
        instruction: "Use Build and Sub (2), then place it on an open map point.",
    },
    TutorialStep {
        id: "build_line",
        title: "Build a Line",
        instruction: "Use Line (4) to connect two valid infrastructure endpoints.",
    },
    TutorialStep {
        id: "service_town",
        title: "Serve a Town",
        instruction: "Deliver active power service to at least one town.",
    },
    TutorialStep {
        id: "resource_reveal",
        title: "Reveal Resources",
        instruction: "Hold R to reveal the Resource Layer.",
    },
    TutorialStep {
        id: "reroute",
        title: "Use Reroute",
        instruction: "Use Reroute on a town point at least once.",
    },
    TutorialStep {
        id: "demolish",
        title: "Use Demolish",
        instruction: "Demolish at least one asset.",
    },
    TutorialStep {
        id: "pause_resume",
        title: "Pause and Resume",
        instruction: "Press Space or Pause button to pause, then resume simulation.",
    },
];

/// Player or world event reported to the tutorial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorialAction {
    Build { asset: AssetType, on_open_point: bool },
    LineBuilt,
    ServiceActive,
    ResourceReveal,
    Reroute { includes_town: bool },
    Demolish,
    PauseResume,
}

impl TutorialAction {
    fn completes(&self, step_id: &str) -> bool {
        match (step_id, self) {
            ("build_plant", TutorialAction::Build { asset, on_open_point }) => {
                *asset == AssetType::Plant && *on_open_point
            }
            ("build_substation", TutorialAction::Build { asset, on_open_point }) => {
                *asset == AssetType::Substation && *on_open_point
            }
            ("build_line", TutorialAction::LineBuilt) => true,
            ("service_town", TutorialAction::ServiceActive) => true,
            ("resource_reveal", TutorialAction::ResourceReveal) => true,
            ("reroute", TutorialAction::Reroute { includes_town }) => *includes_town,
            ("demolish", TutorialAction::Demolish) => true,
            ("pause_resume", TutorialAction::PauseResume) => true,
            _ => false,
        }
    }
}

pub fn new_progress() -> TutorialProgress {
    TutorialProgress::new(TUTORIAL_STEPS.len())
}

/// Id of the step the player is working on, `None` once finished
pub fn current_step_id(progress: &TutorialProgress) -> Option<&'static str> {
    if progress.completed {
        return None;
    }
    TUTORIAL_STEPS.get(progress.current_step).map(|step| step.id)
}

/// Advance the tutorial when the action matches the current step
///
/// Returns true when a step was completed.
pub fn record_action(state: &mut WorldState, action: TutorialAction) -> bool {
    let Some(progress) = state.tutorial.as_mut() else {
        return false;
    };
    if progress.completed {
        return false;
    }
    let Some(step) = TUTORIAL_STEPS.get(progress.current_step) else {
        return false;
    };
    if !action.completes(step.id) {
        return false;
    }

    progress.completed_steps = (progress.completed_steps + 1).min(TUTORIAL_STEPS.len());
    progress.current_step = progress.completed_steps;
    progress.completed = progress.completed_steps >= TUTORIAL_STEPS.len();
    let finished = progress.completed;
    let next = TUTORIAL_STEPS.get(progress.current_step).copied();
    info!(step = step.id, finished, "tutorial step complete");

    state.push_alert(
        format!("Tutorial step complete: {}.", step.title),
        AlertLevel::Advisory,
        6.0,
    );
    state.log_timeline(format!("Tutorial step complete: {}.", step.title));
    if finished {
        state.push_alert(
            "Tutorial complete. Continue practicing or use Save & Exit from the top bar.",
            AlertLevel::Advisory,
            8.0,
        );
        state.log_timeline("Tutorial complete. Core controls verified.");
    } else if let Some(next) = next {
        state.push_alert(
            format!("Next tutorial step: {}. {}", next.title, next.instruction),
            AlertLevel::Advisory,
            8.0,
        );
    }
    true
}

/// Passive completion of the service step
pub fn check_passive_progress(state: &mut WorldState) {
    let serving = state.grid.towns().any(|town| {
        town.town()
            .is_some_and(|t| t.covered_by_substation && t.served > 0.1)
    });
    if serving {
        record_action(state, TutorialAction::ServiceActive);
    }
}

/// Track pause then resume; completes the final step once both are seen
pub fn note_pause_toggle(state: &mut WorldState, paused: bool) {
    let Some(progress) = state.tutorial.as_mut() else {
        return;
    };
    if paused {
        progress.pause_seen = true;
    } else if progress.pause_seen {
        progress.resume_seen = true;
    }
    if progress.pause_seen && progress.resume_seen {
        record_action(state, TutorialAction::PauseResume);
    }
}
