//! # World State
//!
//! The single mutable aggregate of one run. Every tick stage and every player
//! command reads and writes this struct in place; nothing else holds run state.

use serde::{Deserialize, Serialize};

use crate::domain::{AlertLevel, AssetType, Incident, Season};
use crate::grid::EntityStore;

/// Alerts kept after trimming
pub const MAX_ALERTS: usize = 9;

/// Timeline entries kept
pub const MAX_TIMELINE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    /// Set on deduplicated advisories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    pub text: String,
    pub level: AlertLevel,
    pub created_at: f64,
    pub expires_at: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Whole runtime seconds
    pub at: u64,
    pub text: String,
}

/// Timed, cancelable removal of one asset unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDemolition {
    pub id: String,
    pub region_id: String,
    pub region_name: String,
    pub asset_type: AssetType,
    pub asset_label: String,
    /// Refund estimate shown while pending
    pub refund: u32,
    /// Paid cost of the unit being removed
    pub building_value: u32,
    pub started_at: f64,
    pub completes_at: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TutorialProgress {
    pub current_step: usize,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub completed: bool,
    pub pause_seen: bool,
    pub resume_seen: bool,
}

impl TutorialProgress {
    pub fn new(total_steps: usize) -> Self {
        Self {
            total_steps,
            ..Default::default()
        }
    }

    /// Repair counters so they agree with each other and the step count
    pub fn normalized(mut self, total_steps: usize) -> Self {
        let completed_steps = self.completed_steps.max(self.current_step).min(total_steps);
        self.completed = self.completed || completed_steps >= total_steps;
        self.total_steps = total_steps;
        self.completed_steps = if self.completed { total_steps } else { completed_steps };
        self.current_step = self.completed_steps;
        self
    }
}

/// Mutable aggregate for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    pub runtime_seconds: f64,
    pub budget: f64,
    /// 0-100
    pub reliability: f64,
    pub score: f64,
    /// 0-100, never shown to the player
    pub hidden_trust: f64,
    pub lawsuits: u32,

    pub total_demand: f64,
    pub total_served: f64,
    pub total_unmet: f64,
    pub total_generation: f64,
    pub storage_charging_mw: f64,

    pub season_index: usize,
    pub season_timer: f64,
    pub season_label: Season,

    pub alerts: Vec<Alert>,
    pub incidents: Vec<Incident>,
    pub timeline: Vec<TimelineEntry>,
    pub towns_emerged: u32,
    pub pending_demolitions: Vec<PendingDemolition>,

    pub next_line_id: u64,
    pub next_town_id: u64,
    pub next_node_id: u64,
    #[serde(default)]
    pub next_alert_id: u64,
    #[serde(default)]
    pub next_incident_id: u64,
    #[serde(default)]
    pub next_demolition_id: u64,

    pub next_town_emergence_at: f64,
    pub next_event_at: f64,
    pub next_lawsuit_eligible_at: f64,
    pub collapse_seconds: f64,

    pub tutorial: Option<TutorialProgress>,

    #[serde(flatten)]
    pub grid: EntityStore,
}

impl WorldState {
    /// Baseline state before any town is seeded
    pub fn baseline(budget: f64) -> Self {
        Self {
            runtime_seconds: 0.0,
            budget,
            reliability: 84.0,
            score: 0.0,
            hidden_trust: 75.0,
            lawsuits: 0,
            total_demand: 0.0,
            total_served: 0.0,
            total_unmet: 0.0,
            total_generation: 0.0,
            storage_charging_mw: 0.0,
            season_index: 0,
            season_timer: 0.0,
            season_label: Season::Neutral,
            alerts: Vec::new(),
            incidents: Vec::new(),
            timeline: vec![TimelineEntry {
                at: 0,
                text: "Run initiated by the Energy Directory.".to_string(),
            }],
            towns_emerged: 0,
            pending_demolitions: Vec::new(),
            next_line_id: 1,
            next_town_id: 1,
            next_node_id: 1,
            next_alert_id: 1,
            next_incident_id: 1,
            next_demolition_id: 1,
            next_town_emergence_at: 0.0,
            next_event_at: 0.0,
            next_lawsuit_eligible_at: 45.0,
            collapse_seconds: 0.0,
            tutorial: None,
            grid: EntityStore::default(),
        }
    }

    /// Push an alert to the front of the feed
    pub fn push_alert(&mut self, text: impl Into<String>, level: AlertLevel, ttl: f64) -> String {
        let id = format!("alert-{}", self.next_alert_id);
        self.next_alert_id += 1;
        self.alerts.insert(
            0,
            Alert {
                id: id.clone(),
                marker: None,
                text: text.into(),
                level,
                created_at: self.runtime_seconds,
                expires_at: self.runtime_seconds + ttl,
            },
        );
        id
    }

    /// Push an alert unless one with the same marker is still live
    pub fn push_alert_once(&mut self, marker: &str, text: impl Into<String>, level: AlertLevel, ttl: f64) {
        let now = self.runtime_seconds;
        let present = self
            .alerts
            .iter()
            .any(|alert| alert.marker.as_deref() == Some(marker) && alert.expires_at > now);
        if present {
            return;
        }
        self.alerts.insert(
            0,
            Alert {
                id: format!("alert-{}", marker),
                marker: Some(marker.to_string()),
                text: text.into(),
                level,
                created_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop expired alerts and keep the newest nine
    pub fn trim_alerts(&mut self) {
        let now = self.runtime_seconds;
        self.alerts.retain(|alert| alert.expires_at > now);
        self.alerts.truncate(MAX_ALERTS);
    }

    pub fn log_timeline(&mut self, text: impl Into<String>) {
        self.timeline.push(TimelineEntry {
            at: self.runtime_seconds.max(0.0).floor() as u64,
            text: text.into(),
        });
        if self.timeline.len() > MAX_TIMELINE {
            let excess = self.timeline.len() - MAX_TIMELINE;
            self.timeline.drain(..excess);
        }
    }

    pub fn pending_for(&self, region_id: &str, asset: Option<AssetType>) -> Option<&PendingDemolition> {
        self.pending_demolitions
            .iter()
            .find(|item| item.region_id == region_id && asset.map_or(true, |a| item.asset_type == a))
    }

    /// Town-only demand and service, clamped at zero
    pub fn town_demand_and_served(&self) -> (f64, f64) {
        self.grid.towns().fold((0.0, 0.0), |(demand, served), town| {
            (demand + town.demand().max(0.0), served + town.served().max(0.0))
        })
    }

    pub fn served_ratio(&self) -> f64 {
        if self.total_demand > 0.0 {
            self.total_served / self.total_demand
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_feed_trims_to_newest() {
        let mut state = WorldState::baseline(1000.0);
        for i in 0..12 {
            state.push_alert(format!("alert {}", i), AlertLevel::Advisory, 5.0);
        }
        state.trim_alerts();
        assert_eq!(state.alerts.len(), MAX_ALERTS);
        assert_eq!(state.alerts[0].text, "alert 11");

        state.runtime_seconds = 6.0;
        state.trim_alerts();
        assert!(state.alerts.is_empty());
    }

    #[test]
    fn test_marked_alert_is_not_duplicated_while_live() {
        let mut state = WorldState::baseline(1000.0);
        state.push_alert_once("budget-low", "Treasury warning", AlertLevel::Warning, 4.0);
        state.push_alert_once("budget-low", "Treasury warning", AlertLevel::Warning, 4.0);
        assert_eq!(state.alerts.len(), 1);
        assert_eq!(state.alerts[0].id, "alert-budget-low");

        state.runtime_seconds = 4.0;
        state.push_alert_once("budget-low", "Treasury warning", AlertLevel::Warning, 4.0);
        assert_eq!(state.alerts.len(), 2);
    }

    #[test]
    fn test_timeline_keeps_last_entries() {
        let mut state = WorldState::baseline(1000.0);
        for i in 0..70 {
            state.runtime_seconds = i as f64 + 0.7;
            state.log_timeline(format!("entry {}", i));
        }
        assert_eq!(state.timeline.len(), MAX_TIMELINE);
        assert_eq!(state.timeline.last().unwrap().at, 69);
        assert_eq!(state.timeline.last().unwrap().text, "entry 69");
    }

    #[test]
    fn test_tutorial_progress_normalization() {
        let progress = TutorialProgress {
            current_step: 3,
            completed_steps: 1,
            ..Default::default()
        }
        .normalized(8);
        assert_eq!(progress.current_step, 3);
        assert_eq!(progress.completed_steps, 3);
        assert!(!progress.completed);

        let done = TutorialProgress {
            current_step: 12,
            ..Default::default()
        }
        .normalized(8);
        assert!(done.completed);
        assert_eq!(done.current_step, 8);
    }

    #[test]
    fn test_state_serializes_grid_under_legacy_keys() {
        let state = WorldState::baseline(1800.0);
        let value = serde_json::to_value(&state).unwrap();
        assert!(value["regions"].is_array());
        assert!(value["links"].is_array());
        assert_eq!(value["reliability"], 84.0);
        let back: WorldState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
