//! # Demand, Coverage & Stability
//!
//! Per-town demand model (population growth, season, climate, volatility and
//! incident boosts), the coverage pass that rates lines and assigns towns to
//! powered substations, and the stability counters read by town emergence.

use tracing::debug;

use super::pipeline::StageContext;
use super::state::WorldState;
use crate::domain::{clamp, lerp, Climate, Entity, IncidentKind, Modifiers, Point, Terrain};
use crate::grid::EntityStore;
use crate::power_flow::{rate_lines, update_coverage};

const MIN_TARGET_DEMAND: f64 = 8.0;
const MAX_TARGET_DEMAND: f64 = 420.0;
/// Share of the gap to target closed each tick
const DEMAND_SMOOTHING: f64 = 0.36;
/// Decay factor towards zero for towns without a demand anchor
const ZERO_ANCHOR_DECAY: f64 = 0.45;
/// Seconds cap for stability and outage counters
const COUNTER_CAP: f64 = 360.0;

/// Demand multiplier from short-term fluctuation, by climate and terrain
fn volatility(entity: &Entity, runtime: f64) -> f64 {
    let Point { x, y } = entity.position;
    if entity.climate == Climate::Warm {
        1.0 + (runtime * 0.19 + x * 0.008).sin() * 0.08
    } else if entity.terrain == Terrain::River {
        1.0 + (runtime * 0.14 + y * 0.008).sin() * 0.05
    } else {
        1.0 + (runtime * 0.24 + x * 0.006).sin() * 0.07
    }
}

/// Grow population and move every town's demand towards its target
pub fn update_demand(state: &mut WorldState, ctx: &StageContext<'_>, dt: f64) {
    let config = ctx.config;
    let runtime = state.runtime_seconds;
    let season = state.season_label;
    let modifiers = Modifiers::new(&state.incidents, runtime);

    // Modifiers borrow the incident list, so compute boosts before mutating towns
    let boosts: Vec<f64> = state
        .grid
        .entities
        .iter()
        .map(|entity| {
            if entity.is_town() {
                modifiers.for_region(IncidentKind::DemandBoost, &entity.id)
            } else {
                1.0
            }
        })
        .collect();

    for (entity, boost) in state.grid.entities.iter_mut().zip(boosts) {
        let climate_factor = 1.0 + (season.climate_multiplier(&entity.climate) - 1.0) * config.climate_intensity;
        let swing = volatility(entity, runtime);
        let Some(town) = entity.town_mut() else {
            continue;
        };

        if config.population_enabled {
            town.population += town.growth_rate * config.population_strength * dt;
        }

        if town.base_demand <= 0.0 {
            town.target_demand = 0.0;
            town.demand = lerp(town.demand, 0.0, ZERO_ANCHOR_DECAY);
            town.served = 0.0;
            town.unmet = 0.0;
            town.utilization = 1.0;
            continue;
        }

        let population_factor = 1.0 + ((town.population - 20.0) / 100.0) * 0.52 * config.demand_growth_multiplier;
        town.target_demand = clamp(
            town.base_demand * population_factor * climate_factor * swing * boost,
            MIN_TARGET_DEMAND,
            MAX_TARGET_DEMAND,
        );
        town.demand = lerp(town.demand, town.target_demand, DEMAND_SMOOTHING);
        town.served = 0.0;
        town.unmet = 0.0;
        town.utilization = 0.0;
    }
}

/// Rate lines for this tick and assign every town to its covering substation
pub fn update_grid_coverage(state: &mut WorldState, ctx: &StageContext<'_>) -> usize {
    let modifiers = Modifiers::new(&state.incidents, state.runtime_seconds);
    rate_lines(&mut state.grid, &modifiers, ctx.constraints);
    let covered = update_coverage(&mut state.grid, &ctx.config.asset_rules, ctx.config.substation_radius);
    debug!(covered, towns = state.grid.town_count(), "coverage updated");
    covered
}

/// Whether a town is backed by healthy service from itself or a neighbour
pub fn has_stable_neighbor_service(store: &EntityStore, town_entity: &Entity, reliability: f64) -> bool {
    let Some(town) = town_entity.town() else {
        return false;
    };
    if town_entity.id == "capital" {
        return reliability >= 58.0 || town.is_served_at(0.74);
    }
    if town.is_served_at(0.7) {
        return true;
    }

    store
        .connected_built_lines(&town_entity.id)
        .filter(|line| line.safe_capacity > 0.0 && !line.overload)
        .filter_map(|line| line.other_end(&town_entity.id))
        .filter_map(|neighbor_id| store.get(neighbor_id))
        .any(|neighbor| match neighbor.town() {
            Some(other) => other.is_served_at(0.8) && other.outage_seconds < 5.0,
            None => {
                let assets = neighbor.assets();
                assets.plant > 0 || assets.substation > 0
            }
        })
}

/// Advance per-town stable-service and outage counters
pub fn update_town_stability(state: &mut WorldState, dt: f64) {
    let reliability = state.reliability;
    let neighbor_ok: Vec<bool> = state
        .grid
        .entities
        .iter()
        .map(|entity| entity.is_town() && has_stable_neighbor_service(&state.grid, entity, reliability))
        .collect();

    for (entity, neighbor_ok) in state.grid.entities.iter_mut().zip(neighbor_ok) {
        let Some(town) = entity.town_mut() else {
            continue;
        };
        let has_demand = town.demand > 1.0;
        let locally_stable = !has_demand || town.is_served_at(0.84);
        let stable = locally_stable && neighbor_ok && reliability >= 52.0;

        town.stable_service_seconds = if stable {
            clamp(town.stable_service_seconds + dt, 0.0, COUNTER_CAP)
        } else {
            (town.stable_service_seconds - dt * 1.2).max(0.0)
        };
        town.outage_seconds = if has_demand && town.utilization < 0.5 {
            clamp(town.outage_seconds + dt, 0.0, COUNTER_CAP)
        } else {
            (town.outage_seconds - dt * 0.8).max(0.0)
        };
    }
}
