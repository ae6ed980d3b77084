//! # Construction & Demolition Lifecycle
//!
//! Player-driven mutations of the entity graph:
//! - asset builds on new or empty infrastructure nodes
//! - manual transmission lines, toggled on and off
//! - timed, cancelable asset demolitions with ledger-based refunds
//! - priority reroutes
//!
//! Every operation validates first and returns a [`Rejection`] without
//! touching state when a check fails.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::pipeline::StageContext;
use super::state::{PendingDemolition, WorldState};
use super::tutorial::{record_action, TutorialAction};
use crate::domain::{
    AlertLevel, AssetType, Entity, EntityKind, IncidentKind, Modifiers, NodeState, Point, Priority,
    ResourceKind, TransmissionLine, INFRASTRUCTURE_NODE_RADIUS,
};
use crate::error::Rejection;

/// Longest line a player may route
pub const MAX_LINE_LENGTH: f64 = 1000.0;
/// Line cost per world unit before terrain and incident factors
const LINE_COST_PER_UNIT: f64 = 0.34;
/// Surcharge per water or snow cell crossed
const LINE_CROSSING_SURCHARGE: u32 = 10;
/// Share of line cost refunded when a line is toggled off
const LINE_TOGGLE_REFUND_SHARE: f64 = 0.42;
const LINE_TOGGLE_MIN_REFUND: u32 = 12;
pub const DEMOLITION_SECONDS: f64 = 20.0;
/// Minimum spacing as a multiple of placement radius
const SPACING_FACTOR: f64 = 1.5;

/// Where a build lands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum BuildTarget {
    Point(Point),
    Node(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReceipt {
    pub node_id: String,
    pub asset: AssetType,
    pub cost: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum LineOutcome {
    Built { line_id: String, cost: u32 },
    Removed { line_id: String, refund: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DemolitionOutcome {
    Started { demolition_id: String, refund: u32 },
    Canceled { demolition_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerouteOutcome {
    pub targets: usize,
    pub elevated: usize,
    pub towns: usize,
}

// ============================================================================
// Pricing
// ============================================================================

/// Budget cost of one asset unit at an entity
pub fn asset_build_cost(entity: &Entity, asset: AssetType, state: &WorldState, ctx: &StageContext<'_>) -> u32 {
    let modifiers = Modifiers::new(&state.incidents, state.runtime_seconds);
    let rule = ctx.config.asset_rules.get(asset);
    let cost = rule.cost
        * entity.terrain.cost_multiplier()
        * ctx.config.infra_cost_multiplier
        * modifiers.global(IncidentKind::BuildCost);
    cost.ceil().max(0.0) as u32
}

/// Budget cost of a line between two entities
pub fn line_build_cost(a: &Entity, b: &Entity, state: &WorldState, ctx: &StageContext<'_>) -> u32 {
    let modifiers = Modifiers::new(&state.incidents, state.runtime_seconds);
    let distance = a.position.distance_to(b.position);
    let terrain = (a.terrain.cost_multiplier() + b.terrain.cost_multiplier()) / 2.0;
    let base = (distance
        * LINE_COST_PER_UNIT
        * terrain
        * ctx.config.infra_cost_multiplier
        * modifiers.global(IncidentKind::BuildCost))
    .ceil()
    .max(0.0) as u32;
    base + LINE_CROSSING_SURCHARGE * ctx.terrain.count_crossings(a.position, b.position)
}

/// Paid cost of a line, or a fresh estimate for lines seeded without one
fn line_value(line: &TransmissionLine, state: &WorldState, ctx: &StageContext<'_>) -> u32 {
    if line.line_build_cost > 0 {
        return line.line_build_cost;
    }
    state
        .grid
        .endpoints(line)
        .map(|(a, b)| line_build_cost(a, b, state, ctx))
        .unwrap_or(0)
}

fn half(value: u32) -> u32 {
    (value as f64 * 0.5).floor() as u32
}

// ============================================================================
// Builds
// ============================================================================

/// New empty node at a point, inheriting biome from the nearest town
pub fn create_node(state: &mut WorldState, ctx: &StageContext<'_>, point: Point) -> Entity {
    let ordinal = state.next_node_id.max(1);
    state.next_node_id = ordinal + 1;
    let position = ctx.map.clamp_point(point);
    let (terrain, climate, district_type) = state
        .grid
        .nearest_town(position)
        .map(|town| (town.terrain.clone(), town.climate.clone(), town.district_type.clone()))
        .unwrap_or_default();
    Entity {
        id: format!("node-{}", ordinal),
        name: format!("Grid Point {}", ordinal),
        position,
        radius: INFRASTRUCTURE_NODE_RADIUS,
        terrain,
        climate,
        district_type,
        priority: Priority::Nominal,
        resource_profile: ctx.map.resource_profile_at(position, INFRASTRUCTURE_NODE_RADIUS),
        kind: EntityKind::Node(NodeState::default()),
    }
}

/// Closest occupied entity that violates minimum spacing around a candidate
fn spacing_conflict<'s>(state: &'s WorldState, candidate: &Entity) -> Option<&'s Entity> {
    let build_radius = INFRASTRUCTURE_NODE_RADIUS.max(candidate.placement_radius());
    state
        .grid
        .entities
        .iter()
        .filter(|other| other.id != candidate.id && other.is_occupied())
        .find(|other| {
            let min_spacing = SPACING_FACTOR * build_radius.max(other.placement_radius());
            other.position.distance_to(candidate.position) < min_spacing
        })
}

/// Place one asset unit on an open point or an empty node
pub fn build(
    state: &mut WorldState,
    ctx: &StageContext<'_>,
    target: &BuildTarget,
    asset: AssetType,
    plant_type: ResourceKind,
) -> Result<BuildReceipt, Rejection> {
    let existing = match target {
        BuildTarget::Point(point) => {
            if !ctx.map.contains(*point) {
                return Err(Rejection::OutOfBounds);
            }
            match state.grid.entity_at(*point) {
                Some(entity) if entity.is_town() => return Err(Rejection::TownTarget),
                Some(entity) => Some(entity.clone()),
                None => None,
            }
        }
        BuildTarget::Node(id) => match state.grid.get(id) {
            Some(entity) if entity.is_town() => return Err(Rejection::TownTarget),
            Some(entity) => Some(entity.clone()),
            None => return Err(Rejection::UnknownEntity(id.clone())),
        },
    };

    let is_new = existing.is_none();
    let candidate = match existing {
        Some(entity) => entity,
        None => {
            let BuildTarget::Point(point) = target else {
                return Err(Rejection::OutOfBounds);
            };
            // Peek at the id without consuming it until validation passes
            let next_node_id = state.next_node_id;
            let entity = create_node(state, ctx, *point);
            state.next_node_id = next_node_id;
            entity
        }
    };

    if candidate.total_assets() > 0 {
        return Err(Rejection::Occupied {
            name: candidate.name.clone(),
        });
    }
    if let Some(conflict) = spacing_conflict(state, &candidate) {
        return Err(Rejection::TooClose {
            name: conflict.name.clone(),
        });
    }
    let cooldown = candidate.node().map(|node| node.cooldown_until).unwrap_or(0.0);
    if state.runtime_seconds < cooldown {
        return Err(Rejection::CoolingDown {
            name: candidate.name.clone(),
        });
    }

    let rule = *ctx.config.asset_rules.get(asset);
    let cost = asset_build_cost(&candidate, asset, state, ctx);
    if !ctx.config.dev_mode && state.budget < cost as f64 {
        return Err(Rejection::InsufficientBudget {
            what: rule.label.to_string(),
            cost,
        });
    }

    let node_id = candidate.id.clone();
    let name = candidate.name.clone();
    if is_new {
        state.next_node_id = state.next_node_id.max(1) + 1;
        state.grid.insert(candidate);
    }
    let Some(entity) = state.grid.get_mut(&node_id) else {
        return Err(Rejection::UnknownEntity(node_id));
    };
    entity.resource_profile = ctx.map.resource_profile_at(entity.position, entity.radius);
    if let Some(node) = entity.node_mut() {
        *node.assets.get_mut(asset) += 1;
        node.ledger.record(asset, cost);
        if asset == AssetType::Plant {
            node.plant_type = plant_type;
        }
    }

    if !ctx.config.dev_mode {
        state.budget -= cost as f64;
    }
    state.score += 5.0;
    info!(node = %node_id, %asset, cost, budget = state.budget, "asset built");
    state.log_timeline(format!("Built {} at {} ({} budget).", rule.label, name, cost));
    state.push_alert(
        format!("{} commissioned at {}.", rule.label, name),
        AlertLevel::Advisory,
        4.0,
    );
    record_action(
        state,
        TutorialAction::Build {
            asset,
            on_open_point: is_new,
        },
    );

    Ok(BuildReceipt { node_id, asset, cost })
}

// ============================================================================
// Lines
// ============================================================================

/// Check that an entity may terminate a line
pub fn validate_line_endpoint(entity: &Entity) -> Result<(), Rejection> {
    if entity.is_town() {
        Err(Rejection::TownEndpoint)
    } else if !entity.can_host_line() {
        Err(Rejection::EmptyEndpoint)
    } else {
        Ok(())
    }
}

/// Commission a line between two endpoints, or toggle an existing one off
pub fn build_line(state: &mut WorldState, ctx: &StageContext<'_>, a_id: &str, b_id: &str) -> Result<LineOutcome, Rejection> {
    let a = state
        .grid
        .get(a_id)
        .ok_or_else(|| Rejection::UnknownEntity(a_id.to_string()))?;
    let b = state
        .grid
        .get(b_id)
        .ok_or_else(|| Rejection::UnknownEntity(b_id.to_string()))?;
    if a.id == b.id {
        return Err(Rejection::InvalidEndpoint);
    }
    validate_line_endpoint(a)?;
    validate_line_endpoint(b)?;
    let (a_name, b_name) = (a.name.clone(), b.name.clone());

    if let Some(line) = state.grid.line_between(a_id, b_id).filter(|line| line.built) {
        let refund = ((line_value(line, state, ctx) as f64 * LINE_TOGGLE_REFUND_SHARE).floor() as u32)
            .max(LINE_TOGGLE_MIN_REFUND);
        let line_id = line.id.clone();
        if let Some(line) = state.grid.line_mut(&line_id) {
            line.decommission();
        }
        state.budget += refund as f64;
        state.score += 4.0;
        info!(line = %line_id, refund, "line removed");
        state.log_timeline(format!("Removed Line {} -> {} (+{} budget).", a_name, b_name, refund));
        state.push_alert(
            format!("Line removed between {} and {}.", a_name, b_name),
            AlertLevel::Warning,
            4.0,
        );
        return Ok(LineOutcome::Removed { line_id, refund });
    }

    let length = a.position.distance_to(b.position);
    if length > MAX_LINE_LENGTH {
        return Err(Rejection::OutOfRange {
            max: MAX_LINE_LENGTH,
            length,
        });
    }
    let cost = line_build_cost(a, b, state, ctx);
    if !ctx.config.dev_mode && state.budget < cost as f64 {
        return Err(Rejection::InsufficientBudget {
            what: "Line".to_string(),
            cost,
        });
    }

    let base_capacity = TransmissionLine::capacity_for_length(length);
    let line_id = match state.grid.line_between_mut(a_id, b_id) {
        Some(line) => {
            line.built = true;
            line.flow_from = a_id.to_string();
            line.flow_to = b_id.to_string();
            line.length = length;
            line.base_capacity = base_capacity;
            line.line_build_cost = cost;
            line.reset_flow();
            line.id.clone()
        }
        None => {
            let id = format!("line-{}", state.next_line_id);
            state.next_line_id += 1;
            state
                .grid
                .lines
                .push(TransmissionLine::new(id.clone(), a_id, b_id, length, base_capacity, cost));
            id
        }
    };

    if !ctx.config.dev_mode {
        state.budget -= cost as f64;
    }
    state.score += 10.0;
    info!(line = %line_id, cost, length, capacity = base_capacity, "line built");
    state.log_timeline(format!(
        "Built Line {} -> {} ({} budget, cap {}).",
        a_name, b_name, cost, base_capacity
    ));
    state.push_alert(
        format!("Line commissioned: {} to {}.", a_name, b_name),
        AlertLevel::Advisory,
        5.0,
    );
    record_action(state, TutorialAction::LineBuilt);
    Ok(LineOutcome::Built { line_id, cost })
}

/// Take a built line out of service immediately for half its cost
pub fn demolish_line(state: &mut WorldState, ctx: &StageContext<'_>, line_id: &str) -> Result<u32, Rejection> {
    let line = state
        .grid
        .line(line_id)
        .filter(|line| line.built)
        .ok_or_else(|| Rejection::UnknownLine(line_id.to_string()))?;
    let refund = half(line_value(line, state, ctx));
    let names = state
        .grid
        .endpoints(line)
        .map(|(a, b)| (a.name.clone(), b.name.clone()))
        .unwrap_or_else(|| (line.a.clone(), line.b.clone()));
    if let Some(line) = state.grid.line_mut(line_id) {
        line.decommission();
    }
    state.budget += refund as f64;
    info!(line = %line_id, refund, "line demolished");
    state.log_timeline(format!("Demolished Line {} -> {} (+{} budget).", names.0, names.1, refund));
    state.push_alert(
        format!("Line demolished between {} and {}.", names.0, names.1),
        AlertLevel::Warning,
        4.0,
    );
    Ok(refund)
}

// ============================================================================
// Demolition
// ============================================================================

fn refund_suffix(refund: u32) -> String {
    if refund > 0 {
        format!(" (+{} budget)", refund)
    } else {
        String::new()
    }
}

/// Latest pending completion for a node, or now when none remain
fn recompute_cooldown(state: &mut WorldState, node_id: &str) {
    let now = state.runtime_seconds;
    let cooldown = state
        .pending_demolitions
        .iter()
        .filter(|item| item.region_id == node_id)
        .map(|item| item.completes_at)
        .fold(now, f64::max);
    if let Some(node) = state.grid.get_mut(node_id).and_then(Entity::node_mut) {
        node.cooldown_until = cooldown;
    }
}

/// Arm a demolition timer, or cancel the pending one on the same target
pub fn demolish(
    state: &mut WorldState,
    ctx: &StageContext<'_>,
    node_id: &str,
    preferred: Option<AssetType>,
) -> Result<DemolitionOutcome, Rejection> {
    let entity = state
        .grid
        .get(node_id)
        .ok_or_else(|| Rejection::UnknownEntity(node_id.to_string()))?;
    let name = entity.name.clone();
    let assets = entity.assets();
    let asset = preferred
        .filter(|asset| assets.get(*asset) > 0)
        .or_else(|| assets.occupied())
        .ok_or(Rejection::NothingToDemolish { name: name.clone() })?;

    if let Some(pending) = state.pending_for(node_id, Some(asset)).cloned() {
        state.pending_demolitions.retain(|item| item.id != pending.id);
        recompute_cooldown(state, node_id);
        info!(node = %node_id, demolition = %pending.id, "demolition canceled");
        let text = format!("{} demolition canceled in {}.", pending.asset_label, name);
        state.log_timeline(text.clone());
        state.push_alert(text, AlertLevel::Advisory, 4.0);
        return Ok(DemolitionOutcome::Canceled {
            demolition_id: pending.id,
        });
    }

    let building_value = entity
        .node()
        .and_then(|node| node.ledger.peek(asset))
        .unwrap_or_else(|| asset_build_cost(entity, asset, state, ctx));
    let mut refund = half(building_value);
    if assets.total() <= 1 {
        refund += state
            .grid
            .connected_built_lines(node_id)
            .map(|line| half(line_value(line, state, ctx)))
            .sum::<u32>();
    }
    let label = entity.demolish_label(asset).to_string();

    let now = state.runtime_seconds;
    let demolition_id = format!("demolition-{}", state.next_demolition_id);
    state.next_demolition_id += 1;
    let completes_at = now + DEMOLITION_SECONDS;
    state.pending_demolitions.push(PendingDemolition {
        id: demolition_id.clone(),
        region_id: node_id.to_string(),
        region_name: name.clone(),
        asset_type: asset,
        asset_label: label.clone(),
        refund,
        building_value,
        started_at: now,
        completes_at,
    });
    if let Some(node) = state.grid.get_mut(node_id).and_then(Entity::node_mut) {
        node.cooldown_until = node.cooldown_until.max(completes_at);
    }

    info!(node = %node_id, %asset, refund, demolition = %demolition_id, "demolition started");
    state.log_timeline(format!(
        "Demolition started for {} in {} ({}s).",
        label, name, DEMOLITION_SECONDS as u32
    ));
    state.push_alert(
        format!("{} demolition started in {} ({}s).", label, name, DEMOLITION_SECONDS as u32),
        AlertLevel::Warning,
        4.0,
    );
    record_action(state, TutorialAction::Demolish);
    Ok(DemolitionOutcome::Started { demolition_id, refund })
}

/// Complete every demolition whose timer has elapsed
///
/// Returns the number of demolitions completed.
pub fn process_pending_demolitions(state: &mut WorldState, ctx: &StageContext<'_>) -> usize {
    let now = state.runtime_seconds;
    let (due, waiting): (Vec<PendingDemolition>, Vec<PendingDemolition>) =
        std::mem::take(&mut state.pending_demolitions)
            .into_iter()
            .partition(|item| item.completes_at <= now);
    state.pending_demolitions = waiting;

    let mut completed = 0;
    for item in due {
        let Some(entity) = state.grid.get(&item.region_id) else {
            continue;
        };
        let estimate = asset_build_cost(entity, item.asset_type, state, ctx);

        let Some(node) = state.grid.get_mut(&item.region_id).and_then(Entity::node_mut) else {
            continue;
        };
        let count = node.assets.get_mut(item.asset_type);
        *count = count.saturating_sub(1);
        let popped = node.ledger.pop(item.asset_type);
        if item.asset_type == AssetType::Plant && node.assets.plant == 0 {
            node.plant_type = ResourceKind::default();
        }
        let value = if item.building_value > 0 {
            item.building_value
        } else {
            popped.unwrap_or(estimate)
        };
        let mut refund = half(value);
        let left_empty = node.assets.total() == 0;

        let mut lines_removed = 0;
        if left_empty {
            let connected: Vec<String> = state
                .grid
                .connected_built_lines(&item.region_id)
                .map(|line| line.id.clone())
                .collect();
            for line_id in connected {
                let Some(line) = state.grid.line(&line_id) else {
                    continue;
                };
                refund += half(line_value(line, state, ctx));
                if let Some(line) = state.grid.line_mut(&line_id) {
                    line.decommission();
                }
                lines_removed += 1;
            }
        }

        state.budget += refund as f64;
        let cleared = left_empty && state.grid.remove_node(&item.region_id);
        completed += 1;
        info!(
            node = %item.region_id,
            asset = %item.asset_type,
            refund,
            lines_removed,
            cleared,
            "demolition completed"
        );

        let suffix = refund_suffix(refund);
        let cleared_suffix = if cleared { " Location cleared." } else { "" };
        let (timeline, alert) = if lines_removed > 0 {
            (
                format!(
                    "Demolished {} in {}; decommissioned {} connected line(s){}.{}",
                    item.asset_label, item.region_name, lines_removed, suffix, cleared_suffix
                ),
                format!(
                    "{} demolished in {}. {} connected line(s) removed{}.{}",
                    item.asset_label, item.region_name, lines_removed, suffix, cleared_suffix
                ),
            )
        } else {
            (
                format!(
                    "Demolished {} in {}{}.{}",
                    item.asset_label, item.region_name, suffix, cleared_suffix
                ),
                format!(
                    "{} demolished in {}{}.{}",
                    item.asset_label, item.region_name, suffix, cleared_suffix
                ),
            )
        };
        state.log_timeline(timeline);
        state.push_alert(alert, AlertLevel::Warning, 4.0);
    }

    let grid = &state.grid;
    state.pending_demolitions.retain(|item| grid.contains(&item.region_id));
    if completed > 0 {
        debug!(completed, pending = state.pending_demolitions.len(), "demolitions processed");
    }
    completed
}

// ============================================================================
// Priorities
// ============================================================================

/// Elevate every occupied entity within the radius
pub fn reroute(state: &mut WorldState, point: Point, radius: f64) -> Result<RerouteOutcome, Rejection> {
    let radius = radius.max(1.0);
    let targets = state.grid.priority_targets_within(point, radius);
    if targets.is_empty() {
        return Err(Rejection::NoRerouteTargets);
    }

    let mut elevated = 0;
    let mut towns = 0;
    for id in &targets {
        let Some(entity) = state.grid.get_mut(id) else {
            continue;
        };
        if entity.is_town() {
            towns += 1;
        }
        if entity.priority != Priority::Elevated {
            entity.priority = Priority::Elevated;
            elevated += 1;
        }
    }
    let total = targets.len();
    let infrastructure = total - towns;

    info!(targets = total, elevated, towns, radius, "reroute applied");
    if elevated > 0 {
        state.log_timeline(format!(
            "Reroute elevated priority for {}/{} location(s) ({} city, {} infrastructure) within {} radius.",
            elevated,
            total,
            towns,
            infrastructure,
            radius.round() as i64
        ));
        state.push_alert(
            format!("Priority elevated for {}/{} location(s) in reroute radius.", elevated, total),
            AlertLevel::Advisory,
            4.0,
        );
    } else {
        state.push_alert(
            format!("All {} location(s) in reroute radius are already elevated.", total),
            AlertLevel::Advisory,
            4.0,
        );
    }
    record_action(
        state,
        TutorialAction::Reroute {
            includes_town: towns > 0,
        },
    );
    Ok(RerouteOutcome {
        targets: total,
        elevated,
        towns,
    })
}

/// Return every entity to nominal priority; returns how many changed
pub fn clear_priorities(state: &mut WorldState) -> usize {
    let mut cleared = 0;
    for entity in state.grid.entities.iter_mut() {
        if entity.priority != Priority::Nominal {
            entity.priority = Priority::Nominal;
            cleared += 1;
        }
    }
    if cleared > 0 {
        state.log_timeline(format!("Cleared elevated priority from {} location(s).", cleared));
        state.push_alert(
            format!("Priority reset: {} location(s) returned to nominal.", cleared),
            AlertLevel::Advisory,
            4.0,
        );
    } else {
        state.push_alert(
            "Priority reset: all locations already nominal.",
            AlertLevel::Advisory,
            3.0,
        );
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RunConfig, StaticMap};
    use crate::grid::store::fixtures::{line, node, town};
    use crate::power_flow::GridConstraints;
    use crate::simulation::tutorial::{current_step_id, new_progress};
    use crate::terrain::{FlatTerrain, MockTerrainClassifier};
    use serde_json::json;

    struct Fixture {
        config: RunConfig,
        map: StaticMap,
        constraints: GridConstraints,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: RunConfig::standard("balanced"),
                map: StaticMap::from_value(&json!({
                    "world": {"width": 1600, "height": 1000},
                    "towns": [{"id": "capital", "x": 400, "y": 300}]
                }))
                .unwrap(),
                constraints: GridConstraints::default(),
            }
        }

        fn ctx(&self) -> StageContext<'_> {
            StageContext {
                config: &self.config,
                map: &self.map,
                terrain: &FlatTerrain,
                constraints: &self.constraints,
            }
        }
    }

    fn state() -> WorldState {
        let mut state = WorldState::baseline(1000.0);
        state.grid.insert(town("capital", 400.0, 300.0, 40.0));
        state
    }

    #[test]
    fn test_build_on_open_point() {
        let fixture = Fixture::new();
        let mut state = state();
        let receipt = build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Point(Point::new(700.0, 300.0)),
            AssetType::Plant,
            ResourceKind::Sun,
        )
        .unwrap();
        assert_eq!(receipt.node_id, "node-1");
        assert_eq!(receipt.cost, 180);
        assert_eq!(state.budget, 820.0);
        assert_eq!(state.score, 5.0);
        assert_eq!(state.next_node_id, 2);
        let node = state.grid.get("node-1").unwrap();
        assert_eq!(node.name, "Grid Point 1");
        assert_eq!(node.node().unwrap().plant_type, ResourceKind::Sun);
        assert_eq!(node.node().unwrap().ledger.plant, vec![180]);
        assert_eq!(state.timeline.last().unwrap().text, "Built Plant at Grid Point 1 (180 budget).");
    }

    #[test]
    fn test_rejected_build_leaves_state_untouched() {
        let fixture = Fixture::new();
        let mut state = state();
        let before = state.clone();

        let town_hit = build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Point(Point::new(410.0, 300.0)),
            AssetType::Plant,
            ResourceKind::Wind,
        );
        assert_eq!(town_hit.unwrap_err(), Rejection::TownTarget);

        let too_close = build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Point(Point::new(430.0, 300.0)),
            AssetType::Plant,
            ResourceKind::Wind,
        );
        assert!(matches!(too_close, Err(Rejection::TooClose { .. })));

        let outside = build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Point(Point::new(-5.0, 300.0)),
            AssetType::Plant,
            ResourceKind::Wind,
        );
        assert_eq!(outside.unwrap_err(), Rejection::OutOfBounds);

        state.budget = 100.0;
        let poor = build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Point(Point::new(900.0, 300.0)),
            AssetType::Substation,
            ResourceKind::Wind,
        );
        assert_eq!(
            poor.unwrap_err(),
            Rejection::InsufficientBudget {
                what: "Substation".into(),
                cost: 120
            }
        );
        state.budget = before.budget;
        assert_eq!(state, before);
    }

    #[test]
    fn test_spacing_uses_the_larger_of_both_radii() {
        let fixture = Fixture::new();
        let mut state = state();
        let near_town = build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Point(Point::new(434.0, 300.0)),
            AssetType::Plant,
            ResourceKind::Wind,
        );
        assert_eq!(
            near_town.unwrap_err(),
            Rejection::TooClose {
                name: "capital".into()
            }
        );
        assert!(state.grid.get("node-1").is_none());

        let receipt = build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Point(Point::new(437.0, 300.0)),
            AssetType::Plant,
            ResourceKind::Wind,
        )
        .unwrap();
        assert_eq!(receipt.node_id, "node-1");
    }

    #[test]
    fn test_only_new_points_count_as_open_point_builds() {
        let fixture = Fixture::new();
        let mut state = state();
        state.tutorial = Some(new_progress());
        state.grid.insert(node("node-1", 800.0, 300.0, None));
        state.next_node_id = 2;

        build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Node("node-1".into()),
            AssetType::Plant,
            ResourceKind::Wind,
        )
        .unwrap();
        assert_eq!(current_step_id(state.tutorial.as_ref().unwrap()), Some("build_plant"));

        build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Point(Point::new(1000.0, 300.0)),
            AssetType::Plant,
            ResourceKind::Wind,
        )
        .unwrap();
        assert_eq!(current_step_id(state.tutorial.as_ref().unwrap()), Some("build_substation"));
    }

    #[test]
    fn test_occupied_node_rejects_second_asset() {
        let fixture = Fixture::new();
        let mut state = state();
        state.grid.insert(node("node-1", 800.0, 300.0, Some(AssetType::Plant)));
        let result = build(
            &mut state,
            &fixture.ctx(),
            &BuildTarget::Node("node-1".into()),
            AssetType::Storage,
            ResourceKind::Wind,
        );
        assert!(matches!(result, Err(Rejection::Occupied { .. })));
        assert_eq!(state.grid.get("node-1").unwrap().assets().storage, 0);
    }

    #[test]
    fn test_line_cost_adds_crossing_surcharge() {
        let fixture = Fixture::new();
        let state = state();
        let a = node("node-1", 0.0, 0.0, Some(AssetType::Plant));
        let b = node("node-2", 100.0, 0.0, Some(AssetType::Substation));
        assert_eq!(line_build_cost(&a, &b, &state, &fixture.ctx()), 34);

        let mut terrain = MockTerrainClassifier::new();
        terrain.expect_count_crossings().returning(|_, _| 3);
        let ctx = StageContext {
            terrain: &terrain,
            ..fixture.ctx()
        };
        assert_eq!(line_build_cost(&a, &b, &state, &ctx), 64);
    }

    #[test]
    fn test_line_toggle_and_range() {
        let fixture = Fixture::new();
        let mut state = state();
        state.grid.insert(node("node-1", 100.0, 800.0, Some(AssetType::Plant)));
        state.grid.insert(node("node-2", 300.0, 800.0, Some(AssetType::Substation)));
        state.grid.insert(node("node-3", 1400.0, 800.0, Some(AssetType::Substation)));

        let built = build_line(&mut state, &fixture.ctx(), "node-1", "node-2").unwrap();
        assert_eq!(
            built,
            LineOutcome::Built {
                line_id: "line-1".into(),
                cost: 68
            }
        );
        assert_eq!(state.budget, 932.0);
        assert_eq!(state.grid.lines[0].base_capacity, 124.0);

        let removed = build_line(&mut state, &fixture.ctx(), "node-2", "node-1").unwrap();
        assert_eq!(
            removed,
            LineOutcome::Removed {
                line_id: "line-1".into(),
                refund: 28
            }
        );
        assert!(!state.grid.lines[0].built);

        let rebuilt = build_line(&mut state, &fixture.ctx(), "node-2", "node-1").unwrap();
        assert!(matches!(rebuilt, LineOutcome::Built { ref line_id, .. } if line_id == "line-1"));
        assert_eq!(state.grid.lines.len(), 1);
        assert_eq!(state.grid.lines[0].flow_from, "node-2");

        let far = build_line(&mut state, &fixture.ctx(), "node-1", "node-3");
        assert!(matches!(far, Err(Rejection::OutOfRange { .. })));
        assert_eq!(
            build_line(&mut state, &fixture.ctx(), "capital", "node-1").unwrap_err(),
            Rejection::TownEndpoint
        );
    }

    #[test]
    fn test_demolish_then_cancel_restores_state() {
        let fixture = Fixture::new();
        let mut state = state();
        state.grid.insert(node("node-1", 800.0, 300.0, Some(AssetType::Plant)));
        let before_budget = state.budget;

        let started = demolish(&mut state, &fixture.ctx(), "node-1", None).unwrap();
        assert!(matches!(started, DemolitionOutcome::Started { refund: 50, .. }));
        assert_eq!(state.pending_demolitions.len(), 1);
        assert_eq!(state.grid.get("node-1").unwrap().node().unwrap().cooldown_until, 20.0);

        let canceled = demolish(&mut state, &fixture.ctx(), "node-1", None).unwrap();
        assert!(matches!(canceled, DemolitionOutcome::Canceled { .. }));
        assert!(state.pending_demolitions.is_empty());
        assert_eq!(state.budget, before_budget);
        assert_eq!(state.grid.get("node-1").unwrap().assets().plant, 1);
        assert_eq!(state.grid.get("node-1").unwrap().node().unwrap().cooldown_until, 0.0);
    }

    #[test]
    fn test_repeated_demolish_of_unheld_asset_cancels() {
        let fixture = Fixture::new();
        let mut state = state();
        state.grid.insert(node("node-1", 800.0, 300.0, Some(AssetType::Plant)));

        let started = demolish(&mut state, &fixture.ctx(), "node-1", Some(AssetType::Storage)).unwrap();
        assert!(matches!(started, DemolitionOutcome::Started { .. }));
        assert_eq!(state.pending_demolitions[0].asset_type, AssetType::Plant);

        let canceled = demolish(&mut state, &fixture.ctx(), "node-1", Some(AssetType::Storage)).unwrap();
        assert!(matches!(canceled, DemolitionOutcome::Canceled { .. }));
        assert!(state.pending_demolitions.is_empty());
    }

    #[test]
    fn test_completed_demolition_refunds_ledger_cost() {
        let fixture = Fixture::new();
        let mut state = state();
        let mut plant = node("node-1", 800.0, 300.0, Some(AssetType::Plant));
        plant.node_mut().unwrap().ledger.plant = vec![211];
        state.grid.insert(plant);
        state.grid.insert(node("node-2", 900.0, 300.0, Some(AssetType::Substation)));
        let mut link = line("line-1", "node-1", "node-2", 100.0);
        link.line_build_cost = 41;
        state.grid.lines.push(link);

        demolish(&mut state, &fixture.ctx(), "node-1", Some(AssetType::Plant)).unwrap();
        state.runtime_seconds = 19.9;
        assert_eq!(process_pending_demolitions(&mut state, &fixture.ctx()), 0);

        state.runtime_seconds = 20.0;
        let budget = state.budget;
        assert_eq!(process_pending_demolitions(&mut state, &fixture.ctx()), 1);
        assert_eq!(state.budget, budget + 105.0 + 20.0);
        assert!(state.grid.get("node-1").is_none(), "empty node is pruned");
        assert!(state.grid.lines.is_empty());
        assert_eq!(
            state.alerts[0].text,
            "Wind Powerplant demolished in Grid Point 1. 1 connected line(s) removed (+125 budget). Location cleared."
        );
    }

    #[test]
    fn test_reroute_and_clear() {
        let mut state = state();
        state.grid.insert(node("node-1", 450.0, 300.0, Some(AssetType::Substation)));
        state.grid.insert(node("node-2", 460.0, 300.0, None));

        let outcome = reroute(&mut state, Point::new(420.0, 300.0), 100.0).unwrap();
        assert_eq!(
            outcome,
            RerouteOutcome {
                targets: 2,
                elevated: 2,
                towns: 1
            }
        );
        assert_eq!(state.grid.get("node-2").unwrap().priority, Priority::Nominal);
        let again = reroute(&mut state, Point::new(420.0, 300.0), 100.0).unwrap();
        assert_eq!(again.elevated, 0);
        assert_eq!(state.alerts[0].text, "All 2 location(s) in reroute radius are already elevated.");

        assert_eq!(
            reroute(&mut state, Point::new(1500.0, 900.0), 50.0).unwrap_err(),
            Rejection::NoRerouteTargets
        );
        assert_eq!(clear_priorities(&mut state), 2);
        assert_eq!(clear_priorities(&mut state), 0);
    }
}
