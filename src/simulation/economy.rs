//! # Economy & Reliability
//!
//! Budget cash flow, the smoothed reliability index, hidden public trust with
//! its lawsuit trigger, transient grid advisories and per-tick scoring.

use tracing::{debug, info, warn};

use super::pipeline::StageContext;
use super::state::WorldState;
use crate::domain::{clamp, lerp, AlertLevel, AssetRules, Entity, IncidentKind, Modifiers};

/// Revenue per MW served per second
const REVENUE_PER_MW: f64 = 0.108;
/// Maintenance per world unit of built line per second
const LINE_MAINTENANCE_RATE: f64 = 0.0036;
const UNMET_PENALTY_RATE: f64 = 0.12;
const OVERLOAD_PENALTY_RATE: f64 = 1.4;
const LAWSUIT_PENALTY_RATE: f64 = 0.18;

const COLLAPSE_RELIABILITY: f64 = 20.0;
const TRUST_LAWSUIT_THRESHOLD: f64 = 18.0;
const LAWSUIT_COOLDOWN: f64 = 70.0;
const LAWSUIT_FINE: f64 = 140.0;
const LAWSUIT_TRUST_RELIEF: f64 = 22.0;

/// Budget floor kept in dev mode
pub const DEV_MODE_BUDGET: f64 = 1_000_000_000.0;

/// Cash flow of one tick, per second
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CashFlow {
    pub revenue: f64,
    pub operating_cost: f64,
    pub maintenance: f64,
    pub penalties: f64,
}

impl CashFlow {
    pub fn net(&self) -> f64 {
        self.revenue - self.operating_cost - self.maintenance - self.penalties
    }
}

/// Operating cost of one node per second, before incident modifiers
fn node_operating_cost(entity: &Entity, rules: &AssetRules) -> f64 {
    let assets = entity.assets();
    assets.plant as f64 * rules.plant.operating_cost * entity.resource_profile.plant_operating_factor()
        + assets.substation as f64 * rules.substation.operating_cost
        + assets.storage as f64 * rules.storage.operating_cost
}

/// Reliability bonus contributed by built assets
fn asset_bonus(entity: &Entity, rules: &AssetRules) -> f64 {
    let assets = entity.assets();
    let plant = assets.plant as f64;
    let storage = assets.storage as f64;
    let profile = entity.resource_profile;
    plant * rules.plant.reliability_bonus
        + assets.substation as f64 * rules.substation.reliability_bonus
        + storage * rules.storage.reliability_bonus
        + (profile.wind * 0.26 + profile.sun * 0.2 + profile.natural_gas * 0.18) * (plant + storage * 0.6)
}

pub fn cash_flow(state: &WorldState, ctx: &StageContext<'_>) -> CashFlow {
    let config = ctx.config;
    let rules = &config.asset_rules;
    let modifiers = Modifiers::new(&state.incidents, state.runtime_seconds);

    let operating_cost = state
        .grid
        .nodes()
        .map(|node| node_operating_cost(node, rules))
        .sum::<f64>()
        * modifiers.global(IncidentKind::OperatingCost);
    let maintenance = state
        .grid
        .lines
        .iter()
        .filter(|line| line.built)
        .map(|line| line.length * LINE_MAINTENANCE_RATE * config.line_maintenance_multiplier)
        .sum();
    let overloaded = state.grid.lines.iter().filter(|line| line.overload).count() as f64;
    let penalties = state.total_unmet * UNMET_PENALTY_RATE * config.failure_strictness
        + overloaded * OVERLOAD_PENALTY_RATE * config.failure_strictness
        + state.lawsuits as f64 * LAWSUIT_PENALTY_RATE;

    CashFlow {
        revenue: state.total_served * REVENUE_PER_MW,
        operating_cost,
        maintenance,
        penalties,
    }
}

/// Reliability target before smoothing
pub fn reliability_target(state: &WorldState, rules: &AssetRules) -> f64 {
    let (town_demand, _) = state.town_demand_and_served();
    let town_unmet: f64 = state.grid.towns().map(|town| town.unmet().max(0.0)).sum();
    let unmet_ratio = if town_demand > 0.0 {
        town_unmet / town_demand
    } else {
        0.0
    };
    let line_count = state.grid.lines.len();
    let overload_ratio = if line_count > 0 {
        state.grid.lines.iter().filter(|line| line.overload).count() as f64 / line_count as f64
    } else {
        0.0
    };
    let bonus: f64 = state.grid.nodes().map(|node| asset_bonus(node, rules)).sum();
    clamp(100.0 - unmet_ratio * 160.0 - overload_ratio * 85.0 + bonus * 0.2, 0.0, 100.0)
}

/// Hidden trust drift from underserved towns
fn trust_pressure(state: &WorldState) -> f64 {
    state
        .grid
        .towns()
        .map(|town| {
            let demand = town.demand();
            let share = if demand > 0.0 { town.unmet() / demand } else { 0.0 };
            if share > 0.35 {
                share * 2.1
            } else {
                -0.55
            }
        })
        .sum()
}

/// Budget, reliability, collapse timer, trust, lawsuits and advisories
pub fn update_economy(state: &mut WorldState, ctx: &StageContext<'_>, dt: f64) {
    let config = ctx.config;
    let flow = cash_flow(state, ctx);
    state.budget += flow.net() * dt;

    let target = reliability_target(state, &config.asset_rules);
    state.reliability = clamp(lerp(state.reliability, target, dt * 2.0), 0.0, 100.0);
    state.collapse_seconds = if state.reliability < COLLAPSE_RELIABILITY {
        state.collapse_seconds + dt
    } else {
        (state.collapse_seconds - dt * 1.6).max(0.0)
    };
    debug!(
        budget = state.budget,
        net = flow.net(),
        reliability = state.reliability,
        target,
        "economy updated"
    );

    if config.is_tutorial() {
        state.hidden_trust = 100.0;
        state.lawsuits = 0;
    } else {
        let pressure = trust_pressure(state);
        state.hidden_trust = clamp(state.hidden_trust - pressure * dt * 1.6, 0.0, 100.0);
        let now = state.runtime_seconds;
        if state.hidden_trust < TRUST_LAWSUIT_THRESHOLD && now > state.next_lawsuit_eligible_at {
            state.lawsuits += 1;
            state.hidden_trust = clamp(state.hidden_trust + LAWSUIT_TRUST_RELIEF, 0.0, 100.0);
            state.next_lawsuit_eligible_at = now + LAWSUIT_COOLDOWN;
            state.budget -= LAWSUIT_FINE;
            warn!(lawsuits = state.lawsuits, budget = state.budget, "lawsuit filed");
            state.push_alert(
                "Underserved-town lawsuit filed against the Power Department.",
                AlertLevel::Critical,
                8.0,
            );
            state.log_timeline("Lawsuit penalty triggered after sustained underserved town service.");
        }
    }

    raise_grid_advisories(state);
}

/// Deduplicated advisories for sustained stress conditions
fn raise_grid_advisories(state: &mut WorldState) {
    let (town_demand, _) = state.town_demand_and_served();
    let town_unmet: f64 = state.grid.towns().map(|town| town.unmet().max(0.0)).sum();
    if town_demand > 0.0 && town_unmet / town_demand > 0.32 {
        state.push_alert_once(
            "grid-stress",
            "Grid stress rising: unmet demand sustained beyond warning threshold.",
            AlertLevel::Warning,
            4.0,
        );
    }

    let uncovered = state
        .grid
        .towns()
        .filter(|town| !town.town().is_some_and(|t| t.covered_by_substation))
        .count();
    if uncovered > 0 {
        state.push_alert_once(
            "coverage-gap",
            format!("Coverage gap detected: {} town(s) outside powered substation radius.", uncovered),
            AlertLevel::Warning,
            4.0,
        );
    }

    if state.reliability < 35.0 {
        state.push_alert_once(
            "reliability-critical",
            "Reliability entering critical range.",
            AlertLevel::Critical,
            4.0,
        );
    }
    if state.budget < 160.0 {
        state.push_alert_once(
            "budget-low",
            "Treasury warning: budget reserves running low.",
            AlertLevel::Warning,
            4.0,
        );
    }
}

pub fn update_score(state: &mut WorldState, dt: f64) {
    let delta = state.total_served * dt * 2.2 + state.reliability * dt * 0.6
        - state.total_unmet * dt * 0.7
        - state.lawsuits as f64 * dt * 0.4;
    state.score = (state.score + delta).max(0.0);
}

/// Keep dev-mode runs solvent and out of collapse
pub fn apply_dev_mode(state: &mut WorldState, ctx: &StageContext<'_>) {
    if !ctx.config.dev_mode {
        return;
    }
    if state.budget < DEV_MODE_BUDGET {
        info!(budget = state.budget, "dev mode budget restored");
    }
    state.budget = state.budget.max(DEV_MODE_BUDGET);
    state.collapse_seconds = 0.0;
}
