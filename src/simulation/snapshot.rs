//! # Snapshots
//!
//! Read-only views of a running simulation:
//! - [`TextSnapshot`]: the machine-readable `render_to_text` document
//! - [`HudPayload`]: pushed to observers after every tick and command
//! - [`SuspendSnapshot`]: deep copy for suspend/resume
//!
//! [`rehydrate`] rebuilds a [`WorldState`] from a possibly stale or corrupt
//! saved document, repairing what it can instead of rejecting the save.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::objective::{objective_status, ObjectiveStatus};
use super::state::{Alert, PendingDemolition, TimelineEntry, TutorialProgress, WorldState};
use super::tutorial::{current_step_id, TUTORIAL_STEPS};
use crate::domain::normalize::{array, finite, id_suffix, opt_text, text};
use crate::domain::{
    clamp, round_to, AlertLevel, AssetCounts, AssetLedger, AssetRules, AssetType, Climate, EmergenceMode,
    Entity, EntityKind, Incident, IncidentKind, NodeState, Point, Priority, ResourceKind, ResourceProfile,
    RunConfig, RunMode, Season, StaticMap, Terrain, TownState, TransmissionLine, INFRASTRUCTURE_NODE_RADIUS,
};
use crate::grid::EntityStore;
use crate::power_flow::connectivity::plant_generation;
use crate::power_flow::GridConstraints;

/// Player selection and tool state carried across suspend/resume
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolState {
    pub selected_id: Option<String>,
    pub line_start_id: Option<String>,
    pub resource_layer_visible: bool,
}

/// Everything a snapshot reads
#[derive(Clone, Copy)]
pub struct SnapshotView<'a> {
    pub state: &'a WorldState,
    pub config: &'a RunConfig,
    pub map: &'a StaticMap,
    pub constraints: &'a GridConstraints,
    pub tools: &'a ToolState,
    pub paused: bool,
}

// ============================================================================
// Selected entity popup
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPopup {
    pub id: String,
    pub name: String,
    pub kind_label: &'static str,
    pub total_demand_mw: f64,
    pub power_in_mw: f64,
    pub power_in_diff_mw: f64,
    pub total_supply_mw: f64,
    pub power_out_mw: f64,
    pub power_out_diff_mw: f64,
    #[serde(rename = "powerStoredMWh")]
    pub power_stored_mwh: f64,
    #[serde(rename = "storedCapacityMWh")]
    pub stored_capacity_mwh: f64,
    pub show_demand: bool,
    pub show_supply: bool,
    pub show_stored: bool,
}

/// Power carried into and out of an entity by built lines
fn line_flow_totals(store: &EntityStore, id: &str) -> (f64, f64) {
    let mut incoming = 0.0;
    let mut outgoing = 0.0;
    for line in store.lines.iter().filter(|line| line.built && line.used > 0.0001) {
        let has_flow_endpoints = store.contains(&line.flow_from) && store.contains(&line.flow_to);
        let (from, to) = if has_flow_endpoints {
            (line.flow_from.as_str(), line.flow_to.as_str())
        } else {
            (line.a.as_str(), line.b.as_str())
        };
        if from == id {
            outgoing += line.used;
        }
        if to == id {
            incoming += line.used;
        }
    }
    (incoming, outgoing)
}

impl SelectedPopup {
    pub fn for_entity(entity: &Entity, store: &EntityStore, rules: &AssetRules, constraints: &GridConstraints) -> Self {
        let storage_units = entity.assets().storage;
        let stored = entity.storage_charge_mwh().max(0.0);
        let storage_demand = constraints
            .storage_charge_demand_mw(storage_units, stored, super::pipeline::TICK_SECONDS)
            .max(0.0);
        let total_demand = entity.demand().max(0.0) + storage_demand;
        let charging = entity.node().map(|node| node.storage_charging_mw).unwrap_or(0.0).max(0.0);
        let local_served = entity.served().max(0.0) + charging;
        let total_supply = plant_generation(entity, rules).max(0.0);
        let (incoming, outgoing) = line_flow_totals(store, &entity.id);
        let power_in = incoming + total_supply;
        let power_out = outgoing + local_served;
        let capacity = constraints.storage_capacity_mwh(storage_units);

        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            kind_label: if entity.is_town() { "City" } else { "Structure" },
            total_demand_mw: round_to(total_demand, 2),
            power_in_mw: round_to(power_in, 2),
            power_in_diff_mw: round_to(power_in - total_demand, 2),
            total_supply_mw: round_to(total_supply, 2),
            power_out_mw: round_to(power_out, 2),
            power_out_diff_mw: round_to(power_out - total_supply, 2),
            power_stored_mwh: round_to(stored, 2),
            stored_capacity_mwh: round_to(capacity, 2),
            show_demand: total_demand > 0.05 || power_in > 0.05,
            show_supply: total_supply > 0.05 || power_out > 0.05,
            show_stored: capacity > 0.0,
        }
    }
}

// ============================================================================
// HUD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HudPayload {
    pub run_label: String,
    pub budget: f64,
    pub dev_mode: bool,
    pub reliability: f64,
    pub unmet_demand: f64,
    pub served_demand: f64,
    pub power_supply: f64,
    pub power_demand: f64,
    #[serde(rename = "storedPowerMWh")]
    pub stored_power_mwh: f64,
    pub timer: f64,
    pub season: Season,
    pub population_active: bool,
    pub lawsuits: u32,
    pub score: f64,
    pub paused: bool,
    pub tutorial_completed: bool,
    pub current_step_id: Option<&'static str>,
    pub line_selection_start_id: Option<String>,
    pub resource_layer_visible: bool,
    pub town_emergence_mode: EmergenceMode,
    pub towns_emerged: u32,
    pub substation_radius: f64,
    pub next_town_emergence_in: f64,
    pub objective: ObjectiveStatus,
    pub alerts: Vec<Alert>,
    pub incidents: Vec<Incident>,
    pub selected_entity_popup: Option<SelectedPopup>,
}

impl HudPayload {
    pub fn capture(view: &SnapshotView<'_>) -> Self {
        let state = view.state;
        let config = view.config;
        let selected = view
            .tools
            .selected_id
            .as_deref()
            .and_then(|id| state.grid.get(id))
            .map(|entity| SelectedPopup::for_entity(entity, &state.grid, &config.asset_rules, view.constraints));
        Self {
            run_label: config.label.clone(),
            budget: state.budget,
            dev_mode: config.dev_mode,
            reliability: state.reliability,
            unmet_demand: state.total_unmet,
            served_demand: state.total_served,
            power_supply: state.total_generation,
            power_demand: state.total_demand,
            stored_power_mwh: state.grid.stored_energy_mwh(),
            timer: state.runtime_seconds,
            season: state.season_label,
            population_active: config.population_enabled,
            lawsuits: state.lawsuits,
            score: state.score,
            paused: view.paused,
            tutorial_completed: config.is_tutorial() && state.tutorial.as_ref().is_some_and(|t| t.completed),
            current_step_id: state.tutorial.as_ref().and_then(current_step_id),
            line_selection_start_id: view.tools.line_start_id.clone(),
            resource_layer_visible: view.tools.resource_layer_visible,
            town_emergence_mode: config.town_emergence_mode,
            towns_emerged: state.towns_emerged,
            substation_radius: config.substation_radius,
            next_town_emergence_in: (state.next_town_emergence_at - state.runtime_seconds).max(0.0),
            objective: objective_status(state, config),
            alerts: state.alerts.clone(),
            incidents: state.incidents.clone(),
            selected_entity_popup: selected,
        }
    }
}

// ============================================================================
// Text snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateSystem {
    pub origin: &'static str,
    pub x_axis: &'static str,
    pub y_axis: &'static str,
    pub map_size: MapSize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub covered_by_substation: bool,
    pub coverage_source_id: Option<String>,
    pub coverage_distance: f64,
    pub stable_seconds: f64,
    pub outage_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub wind: f64,
    pub sun: f64,
    pub natural_gas: f64,
}

impl From<&ResourceProfile> for ProfileSnapshot {
    fn from(profile: &ResourceProfile) -> Self {
        Self {
            wind: round_to(profile.wind, 3),
            sun: round_to(profile.sun, 3),
            natural_gas: round_to(profile.natural_gas, 3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TownSnapshot {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub priority: Priority,
    pub climate: Climate,
    pub terrain: Terrain,
    pub population: f64,
    pub demand: f64,
    pub served: f64,
    pub unmet: f64,
    pub utilization: f64,
    pub service: ServiceSnapshot,
    pub resource_profile: ProfileSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub priority: Priority,
    pub terrain: Terrain,
    pub climate: Climate,
    pub assets: AssetCounts,
    #[serde(rename = "storageChargeMWh")]
    pub storage_charge_mwh: f64,
    #[serde(rename = "storageCapacityMWh")]
    pub storage_capacity_mwh: f64,
    pub storage_charging_mw: f64,
    pub plant_type: ResourceKind,
    pub cooldown_remaining: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSnapshot {
    pub id: String,
    pub a: String,
    pub b: String,
    pub flow_from: String,
    pub flow_to: String,
    pub used: f64,
    pub safe_capacity: f64,
    pub stress: f64,
    pub overload: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentSnapshot {
    pub title: String,
    pub level: AlertLevel,
    #[serde(rename = "type")]
    pub kind: IncidentKind,
    pub town_id: Option<String>,
    pub expires_in: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSnapshot {
    pub id: String,
    pub level: AlertLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSnapshot {
    pub id: String,
    pub region_id: String,
    pub region_name: String,
    pub asset_type: AssetType,
    pub asset_label: String,
    pub refund: u32,
    pub remaining_seconds: f64,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialSnapshot {
    pub completed: bool,
    pub current_step: usize,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub current_step_id: Option<&'static str>,
    pub current_step_title: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergenceSnapshot {
    pub mode: EmergenceMode,
    pub towns_emerged: u32,
    pub next_in_seconds: f64,
}

/// Complete diagnostic view of a running simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSnapshot {
    pub mode: RunMode,
    pub run_label: String,
    pub dev_mode: bool,
    pub coordinate_system: CoordinateSystem,
    pub timer_seconds: f64,
    pub paused: bool,
    pub season: Season,
    pub budget: f64,
    pub score: f64,
    pub reliability: f64,
    pub total_demand: f64,
    pub total_served: f64,
    pub total_unmet: f64,
    #[serde(rename = "storedPowerMWh")]
    pub stored_power_mwh: f64,
    pub storage_charging_mw: f64,
    pub selected_entity_id: Option<String>,
    pub line_selection_start_entity_id: Option<String>,
    pub tutorial: Option<TutorialSnapshot>,
    pub town_emergence: EmergenceSnapshot,
    pub pending_demolitions: Vec<PendingSnapshot>,
    pub towns: Vec<TownSnapshot>,
    pub infrastructure_nodes: Vec<NodeSnapshot>,
    pub links: Vec<LineSnapshot>,
    pub incidents: Vec<IncidentSnapshot>,
    pub alerts: Vec<AlertSnapshot>,
}

impl TextSnapshot {
    pub fn capture(view: &SnapshotView<'_>) -> Self {
        let state = view.state;
        let now = state.runtime_seconds;

        let towns = state
            .grid
            .towns()
            .filter_map(|entity| {
                let town = entity.town()?;
                Some(TownSnapshot {
                    id: entity.id.clone(),
                    name: entity.name.clone(),
                    x: round_to(entity.position.x, 1),
                    y: round_to(entity.position.y, 1),
                    priority: entity.priority,
                    climate: entity.climate.clone(),
                    terrain: entity.terrain.clone(),
                    population: round_to(town.population, 2),
                    demand: round_to(town.demand, 2),
                    served: round_to(town.served, 2),
                    unmet: round_to(town.unmet, 2),
                    utilization: round_to(town.utilization, 3),
                    service: ServiceSnapshot {
                        covered_by_substation: town.covered_by_substation,
                        coverage_source_id: town.coverage_source_id.clone(),
                        coverage_distance: round_to(town.coverage_distance, 2),
                        stable_seconds: round_to(town.stable_service_seconds, 2),
                        outage_seconds: round_to(town.outage_seconds, 2),
                    },
                    resource_profile: ProfileSnapshot::from(&entity.resource_profile),
                })
            })
            .collect();

        let infrastructure_nodes = state
            .grid
            .nodes()
            .filter_map(|entity| {
                let node = entity.node()?;
                Some(NodeSnapshot {
                    id: entity.id.clone(),
                    name: entity.name.clone(),
                    x: round_to(entity.position.x, 1),
                    y: round_to(entity.position.y, 1),
                    priority: entity.priority,
                    terrain: entity.terrain.clone(),
                    climate: entity.climate.clone(),
                    assets: node.assets,
                    storage_charge_mwh: round_to(node.storage_charge_mwh, 2),
                    storage_capacity_mwh: round_to(view.constraints.storage_capacity_mwh(node.assets.storage), 2),
                    storage_charging_mw: round_to(node.storage_charging_mw, 2),
                    plant_type: node.plant_type,
                    cooldown_remaining: round_to((node.cooldown_until - now).max(0.0), 2),
                })
            })
            .collect();

        let links = state
            .grid
            .lines
            .iter()
            .filter(|line| line.safe_capacity > 0.0)
            .map(|line| LineSnapshot {
                id: line.id.clone(),
                a: line.a.clone(),
                b: line.b.clone(),
                flow_from: line.flow_from.clone(),
                flow_to: line.flow_to.clone(),
                used: round_to(line.used, 2),
                safe_capacity: round_to(line.safe_capacity, 2),
                stress: round_to(line.stress, 3),
                overload: line.overload,
            })
            .collect();

        let tutorial = view
            .config
            .is_tutorial()
            .then_some(state.tutorial.as_ref())
            .flatten()
            .map(|progress| {
                let step = current_step_id(progress)
                    .and_then(|id| TUTORIAL_STEPS.iter().find(|step| step.id == id));
                TutorialSnapshot {
                    completed: progress.completed,
                    current_step: progress.current_step,
                    completed_steps: progress.completed_steps,
                    total_steps: progress.total_steps,
                    current_step_id: step.map(|step| step.id),
                    current_step_title: step.map(|step| step.title),
                }
            });

        Self {
            mode: view.config.mode,
            run_label: view.config.label.clone(),
            dev_mode: view.config.dev_mode,
            coordinate_system: CoordinateSystem {
                origin: "top-left of map world",
                x_axis: "positive right",
                y_axis: "positive down",
                map_size: MapSize {
                    width: view.map.width,
                    height: view.map.height,
                },
            },
            timer_seconds: round_to(now, 2),
            paused: view.paused,
            season: state.season_label,
            budget: round_to(state.budget, 2),
            score: round_to(state.score, 2),
            reliability: round_to(state.reliability, 2),
            total_demand: round_to(state.total_demand, 2),
            total_served: round_to(state.total_served, 2),
            total_unmet: round_to(state.total_unmet, 2),
            stored_power_mwh: round_to(state.grid.stored_energy_mwh(), 2),
            storage_charging_mw: round_to(state.storage_charging_mw, 2),
            selected_entity_id: view.tools.selected_id.clone(),
            line_selection_start_entity_id: view.tools.line_start_id.clone(),
            tutorial,
            town_emergence: EmergenceSnapshot {
                mode: view.config.town_emergence_mode,
                towns_emerged: state.towns_emerged,
                next_in_seconds: round_to((state.next_town_emergence_at - now).max(0.0), 2),
            },
            pending_demolitions: state
                .pending_demolitions
                .iter()
                .map(|item| PendingSnapshot {
                    id: item.id.clone(),
                    region_id: item.region_id.clone(),
                    region_name: item.region_name.clone(),
                    asset_type: item.asset_type,
                    asset_label: item.asset_label.clone(),
                    refund: item.refund,
                    remaining_seconds: round_to((item.completes_at - now).max(0.0), 2),
                    duration_seconds: round_to((item.completes_at - item.started_at).max(0.0), 2),
                })
                .collect(),
            towns,
            infrastructure_nodes,
            links,
            incidents: state
                .incidents
                .iter()
                .map(|incident| IncidentSnapshot {
                    title: incident.title.clone(),
                    level: incident.level,
                    kind: incident.kind,
                    town_id: incident.region_id.clone(),
                    expires_in: round_to(incident.expires_at - now, 2),
                })
                .collect(),
            alerts: state
                .alerts
                .iter()
                .map(|alert| AlertSnapshot {
                    id: alert.id.clone(),
                    level: alert.level,
                    text: alert.text.clone(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// Suspend / resume
// ============================================================================

/// Full deep copy of a run for an external persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendSnapshot {
    pub run_config: RunConfig,
    pub game_state: WorldState,
    #[serde(default)]
    pub tool: ToolState,
    #[serde(default)]
    pub paused: bool,
}

fn normalize_profile(raw: Option<&Value>) -> ResourceProfile {
    let raw = raw.unwrap_or(&Value::Null);
    let weight = |key: &str, alias: &str| {
        clamp(finite(raw.get(key).or_else(|| raw.get(alias)), 0.0), 0.0, 1.0)
    };
    ResourceProfile {
        wind: weight("wind", "wind"),
        sun: weight("sun", "sun"),
        natural_gas: weight("natural_gas", "naturalGas"),
    }
}

fn normalize_counts(raw: Option<&Value>) -> AssetCounts {
    let raw = raw.unwrap_or(&Value::Null);
    let count = |key: &str| finite(raw.get(key), 0.0).max(0.0).floor() as u32;
    AssetCounts {
        plant: count("plant"),
        substation: count("substation"),
        storage: count("storage"),
    }
}

/// Keep only the first populated slot, in slot order
fn coerce_single_occupancy(assets: AssetCounts) -> AssetCounts {
    let mut coerced = AssetCounts::default();
    if let Some(asset) = AssetType::ordered().find(|asset| assets.get(*asset) > 0) {
        *coerced.get_mut(asset) = assets.get(asset);
    }
    coerced
}

fn normalize_ledger(raw: Option<&Value>, assets: &AssetCounts) -> AssetLedger {
    let raw = raw.unwrap_or(&Value::Null);
    let costs = |key: &str| -> Vec<u32> {
        array(raw.get(key))
            .iter()
            .map(|value| finite(Some(value), 0.0).max(0.0).round() as u32)
            .collect()
    };
    let mut ledger = AssetLedger {
        plant: costs("plant"),
        substation: costs("substation"),
        storage: costs("storage"),
    };
    ledger.trim_to(assets);
    ledger
}

fn normalize_entity(raw: &Value, index: usize, constraints: &GridConstraints) -> Option<Entity> {
    let id = opt_text(raw.get("id"))?;
    let is_node = match opt_text(raw.get("entityType")).as_deref() {
        Some("node") => true,
        Some("town") => false,
        _ => id.starts_with("node-"),
    };
    let resource_profile = normalize_profile(raw.get("resourceProfile"));
    let kind = if is_node {
        let assets = coerce_single_occupancy(normalize_counts(raw.get("assets")));
        let ledger = normalize_ledger(raw.get("assetBuildCosts"), &assets);
        let capacity = constraints.storage_capacity_mwh(assets.storage);
        // Saves from before charge tracking start full
        let storage_charge_mwh = clamp(finite(raw.get("storageChargeMWh"), capacity), 0.0, capacity);
        let plant_type = match opt_text(raw.get("plantType")).and_then(|value| value.parse::<ResourceKind>().ok()) {
            Some(kind) => kind,
            None if assets.plant > 0 => resource_profile.dominant(),
            None => ResourceKind::default(),
        };
        EntityKind::Node(NodeState {
            assets,
            ledger,
            plant_type,
            storage_charge_mwh,
            storage_charging_mw: 0.0,
            cooldown_until: finite(raw.get("cooldownUntil"), 0.0).max(0.0),
        })
    } else {
        let base_demand = finite(raw.get("nominalBaseDemand").or_else(|| raw.get("baseDemand")), 0.0).max(0.0);
        let demand = finite(raw.get("demand"), base_demand).max(0.0);
        EntityKind::Town(TownState {
            base_demand,
            population: finite(raw.get("population"), 0.0).max(0.0),
            growth_rate: finite(raw.get("growthRate"), 0.0).max(0.0),
            demand,
            target_demand: finite(raw.get("targetDemand"), demand).max(0.0),
            served: finite(raw.get("served"), 0.0).max(0.0),
            unmet: finite(raw.get("unmet"), 0.0).max(0.0),
            utilization: clamp(finite(raw.get("utilization"), 0.0), 0.0, 1.0),
            covered_by_substation: raw.get("coveredBySubstation").and_then(Value::as_bool).unwrap_or(false),
            coverage_source_id: opt_text(raw.get("coverageSourceId")),
            coverage_distance: finite(raw.get("coverageDistance"), 0.0).max(0.0),
            stable_service_seconds: finite(raw.get("stableServiceSeconds"), 0.0).max(0.0),
            outage_seconds: finite(raw.get("outageSeconds"), 0.0).max(0.0),
            strategic_value: text(raw.get("strategicValue"), ""),
        })
    };

    Some(Entity {
        name: text(raw.get("name"), &format!("Location {}", index + 1)),
        position: Point::new(finite(raw.get("x"), 0.0), finite(raw.get("y"), 0.0)),
        radius: finite(raw.get("radius"), if is_node { INFRASTRUCTURE_NODE_RADIUS } else { 56.0 }).max(1.0),
        terrain: Terrain::from(text(raw.get("terrain"), "plains")),
        climate: Climate::from(text(raw.get("climate"), "temperate")),
        district_type: text(raw.get("districtType"), "Rural Cluster"),
        priority: Priority::from(text(raw.get("priority"), "nominal")),
        resource_profile,
        kind,
        id,
    })
}

fn normalize_line(raw: &Value, index: usize, store: &EntityStore) -> Option<TransmissionLine> {
    let a = opt_text(raw.get("a"))?;
    let b = opt_text(raw.get("b"))?;
    let stored_length = finite(raw.get("length"), 0.0);
    let length = if stored_length > 0.0 {
        stored_length
    } else {
        match (store.get(&a), store.get(&b)) {
            (Some(first), Some(second)) => first.position.distance_to(second.position),
            _ => 0.0,
        }
    };
    let base_capacity = finite(raw.get("baseCapacity"), 0.0);
    let mut line = TransmissionLine::new(
        text(raw.get("id"), &format!("line-{}", index + 1)),
        &a,
        &b,
        length,
        if base_capacity > 0.0 {
            base_capacity
        } else {
            TransmissionLine::capacity_for_length(length)
        },
        finite(raw.get("lineBuildCost"), 0.0).max(0.0).round() as u32,
    );
    line.flow_from = text(raw.get("flowFrom"), "");
    line.flow_to = text(raw.get("flowTo"), "");
    line.normalize_flow_endpoints();
    line.built = raw.get("built").and_then(Value::as_bool).unwrap_or(false);
    line.tier = opt_text(raw.get("tier"));
    Some(line)
}

fn normalize_pending(raw: &Value, index: usize) -> Option<PendingDemolition> {
    let asset_type = opt_text(raw.get("assetType"))?.parse::<AssetType>().ok()?;
    let region_id = opt_text(raw.get("regionId"))?;
    Some(PendingDemolition {
        id: text(raw.get("id"), &format!("demolition-{}", index + 1)),
        region_id,
        region_name: text(raw.get("regionName"), ""),
        asset_type,
        asset_label: text(raw.get("assetLabel"), AssetRules::default().get(asset_type).label),
        refund: finite(raw.get("refund"), 0.0).max(0.0).floor() as u32,
        building_value: finite(raw.get("buildingValue"), 0.0).max(0.0).floor() as u32,
        started_at: finite(raw.get("startedAt"), 0.0).max(0.0),
        completes_at: finite(raw.get("completesAt"), 0.0).max(0.0),
    })
}

fn next_counter(stored: Option<&Value>, ids: impl Iterator<Item = u64>) -> u64 {
    let from_ids = ids.max().map_or(1, |max| max + 1);
    let stored = finite(stored, 0.0);
    if stored >= 1.0 {
        (stored as u64).max(from_ids)
    } else {
        from_ids
    }
}

/// Rebuild world state from a saved `gameState` document
///
/// Missing arrays become empty, numeric fields fall back to baselines,
/// unknown enum values fall back to defaults and multi-asset nodes keep only
/// their first populated slot.
pub fn rehydrate<R: Rng>(raw: &Value, config: &RunConfig, constraints: &GridConstraints, rng: &mut R) -> WorldState {
    let mut state = WorldState::baseline(finite(raw.get("budget"), config.starting_budget));
    let runtime = finite(raw.get("runtimeSeconds"), 0.0).max(0.0);
    state.runtime_seconds = runtime;
    state.reliability = clamp(finite(raw.get("reliability"), 84.0), 0.0, 100.0);
    state.score = finite(raw.get("score"), 0.0);
    state.hidden_trust = clamp(finite(raw.get("hiddenTrust"), 75.0), 0.0, 100.0);
    state.lawsuits = finite(raw.get("lawsuits"), 0.0).max(0.0) as u32;
    state.total_demand = finite(raw.get("totalDemand"), 0.0).max(0.0);
    state.total_served = finite(raw.get("totalServed"), 0.0).max(0.0);
    state.total_unmet = finite(raw.get("totalUnmet"), 0.0).max(0.0);
    state.total_generation = finite(raw.get("totalGeneration"), 0.0).max(0.0);
    state.storage_charging_mw = finite(raw.get("storageChargingMw"), 0.0).max(0.0);
    state.season_index = finite(raw.get("seasonIndex"), 0.0).max(0.0) as usize;
    state.season_timer = finite(raw.get("seasonTimer"), 0.0).max(0.0);
    state.season_label = raw
        .get("seasonLabel")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    state.towns_emerged = finite(raw.get("townsEmerged"), 0.0).max(0.0) as u32;
    state.collapse_seconds = finite(raw.get("collapseSeconds"), 0.0).max(0.0);

    state.alerts = array(raw.get("alerts"))
        .iter()
        .filter_map(|value| serde_json::from_value(value.clone()).ok())
        .collect();
    state.incidents = array(raw.get("incidents"))
        .iter()
        .filter_map(|value| serde_json::from_value(value.clone()).ok())
        .collect();
    let timeline: Vec<TimelineEntry> = array(raw.get("timeline"))
        .iter()
        .filter_map(|value| serde_json::from_value(value.clone()).ok())
        .collect();
    if !timeline.is_empty() {
        state.timeline = timeline;
    }
    state.pending_demolitions = array(raw.get("pendingDemolitions"))
        .iter()
        .enumerate()
        .filter_map(|(index, value)| normalize_pending(value, index))
        .collect();

    let source_entities = array(raw.get("regions").or_else(|| raw.get("towns")));
    let entities: Vec<Entity> = source_entities
        .iter()
        .enumerate()
        .filter_map(|(index, value)| normalize_entity(value, index, constraints))
        .collect();
    if entities.len() < source_entities.len() {
        warn!(dropped = source_entities.len() - entities.len(), "dropped snapshot entities without ids");
    }
    state.grid = EntityStore::new(entities, Vec::new());
    state.grid.lines = array(raw.get("links"))
        .iter()
        .enumerate()
        .filter_map(|(index, value)| normalize_line(value, index, &state.grid))
        .collect();

    state.next_town_id = next_counter(
        raw.get("nextTownId"),
        state.grid.entities.iter().filter_map(|e| id_suffix(&e.id, "town-")),
    );
    state.next_node_id = next_counter(
        raw.get("nextNodeId"),
        state.grid.entities.iter().filter_map(|e| id_suffix(&e.id, "node-")),
    );
    state.next_line_id = next_counter(
        raw.get("nextLineId"),
        state.grid.lines.iter().filter_map(|line| id_suffix(&line.id, "line-")),
    );
    state.next_alert_id = next_counter(raw.get("nextAlertId"), std::iter::empty());
    state.next_incident_id = next_counter(
        raw.get("nextIncidentId"),
        state.incidents.iter().filter_map(|incident| id_suffix(&incident.id, "incident-")),
    );
    state.next_demolition_id = next_counter(
        raw.get("nextDemolitionId"),
        state.pending_demolitions.iter().filter_map(|item| id_suffix(&item.id, "demolition-")),
    );

    let timer = |key: &str| finite(raw.get(key), 0.0);
    state.next_event_at = match timer("nextEventAt") {
        at if at > 0.0 => at,
        _ => runtime + rng.gen_range(20.0..34.0),
    };
    state.next_lawsuit_eligible_at = match timer("nextLawsuitEligibleAt") {
        at if at > 0.0 => at,
        _ => runtime + 45.0,
    };
    state.next_town_emergence_at = match timer("nextTownEmergenceAt") {
        at if at > 0.0 => at,
        _ => runtime + rng.gen_range(44.0..70.0),
    };

    state.tutorial = if config.is_tutorial() {
        let progress: TutorialProgress = raw
            .get("tutorial")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        Some(progress.normalized(TUTORIAL_STEPS.len()))
    } else {
        None
    };
    state
}
