//! # Procedural Town Emergence
//!
//! Healthy, well-served towns sponsor new settlements. Candidates come from
//! unspawned map towns and from one synthetic anchor sampled on a ring around
//! a weighted sponsor; water and crowded samples are rejected. The best scoring
//! candidate becomes a new town with a fraction of its archetype's demand.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::demand::{has_stable_neighbor_service, update_grid_coverage};
use super::pipeline::StageContext;
use super::state::WorldState;
use crate::domain::{clamp, AlertLevel, Climate, EmergenceMode, Entity, MapTown, Point, RunConfig, Terrain};
use crate::power_flow::connectivity::powered_substations;
use crate::power_flow::ComponentMap;
use crate::terrain::is_water;

const EMERGENCE_TOWN_NAMES: [&str; 14] = [
    "Andersville",
    "Carsonton",
    "Ella Town",
    "Bennettburg",
    "Marlowville",
    "Parkerton",
    "Riley Borough",
    "Quinn Town",
    "Sawyerville",
    "Jordanston",
    "Averyville",
    "Logan Town",
    "Finleyburg",
    "Caseyton",
];

const MAP_PADDING: f64 = 110.0;
const MIN_TOWN_SPACING: f64 = 170.0;
const RING_MIN: f64 = 180.0;
const RING_MAX: f64 = 420.0;
const ANCHOR_ATTEMPTS: usize = 36;
const SPONSOR_MIN_UTILIZATION: f64 = 0.72;
const SPONSOR_MAX_OUTAGE: f64 = 6.0;

/// Pacing and gates for one emergence mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmergenceProfile {
    pub min_stable_seconds: f64,
    pub interval_min: f64,
    pub interval_max: f64,
    pub max_emergences: u32,
    pub reliability_floor: f64,
    pub min_demand_met_ratio: f64,
}

impl EmergenceProfile {
    /// Profile for a run, `None` when emergence is off
    pub fn for_config(config: &RunConfig) -> Option<Self> {
        let profile = match config.town_emergence_mode {
            EmergenceMode::Off => return None,
            EmergenceMode::High => Self {
                min_stable_seconds: 12.0,
                interval_min: 34.0,
                interval_max: 58.0,
                max_emergences: 14,
                reliability_floor: 52.0,
                min_demand_met_ratio: 0.62,
            },
            EmergenceMode::Low if config.is_tutorial() => Self {
                min_stable_seconds: 34.0,
                interval_min: 130.0,
                interval_max: 190.0,
                max_emergences: 6,
                reliability_floor: 58.0,
                min_demand_met_ratio: 0.9,
            },
            EmergenceMode::Low => Self {
                min_stable_seconds: 28.0,
                interval_min: 85.0,
                interval_max: 125.0,
                max_emergences: 4,
                reliability_floor: 64.0,
                min_demand_met_ratio: 0.82,
            },
            EmergenceMode::Normal => Self {
                min_stable_seconds: 16.0,
                interval_min: 48.0,
                interval_max: 82.0,
                max_emergences: 10,
                reliability_floor: 56.0,
                min_demand_met_ratio: 0.74,
            },
        };
        Some(profile)
    }
}

/// Name for the n-th emerged town (1-based), suffixed once the list wraps
pub fn emergent_town_name(ordinal: u64) -> String {
    let index = ordinal.max(1) - 1;
    let len = EMERGENCE_TOWN_NAMES.len() as u64;
    let base = EMERGENCE_TOWN_NAMES[(index % len) as usize];
    let wrap = index / len;
    if wrap > 0 {
        format!("{} {}", base, wrap + 1)
    } else {
        base.to_string()
    }
}

fn archetype(district_type: &str) -> &'static str {
    match district_type {
        "Industrial Belt" => "industrial",
        "Coastal Corridor" => "coastal",
        "Urban Core" => "metro",
        _ => "rural",
    }
}

/// Template for a town that may emerge
#[derive(Debug, Clone)]
struct TownAnchor {
    /// Map id for authored anchors; synthetic anchors get a counter id
    id: Option<String>,
    name: String,
    position: Point,
    radius: f64,
    district_type: String,
    terrain: Terrain,
    climate: Climate,
    base_demand: f64,
    population: f64,
    growth_rate: f64,
    strategic_value: String,
}

impl From<&MapTown> for TownAnchor {
    fn from(town: &MapTown) -> Self {
        Self {
            id: Some(town.id.clone()),
            name: town.name.clone(),
            position: town.position,
            radius: town.radius,
            district_type: town.district_type.clone(),
            terrain: town.terrain.clone(),
            climate: town.climate.clone(),
            base_demand: town.base_demand,
            population: town.population,
            growth_rate: town.growth_rate,
            strategic_value: town.strategic_value.clone(),
        }
    }
}

struct Candidate {
    anchor: TownAnchor,
    score: f64,
}

fn nearest_sponsor_distance(point: Point, sponsors: &[&Entity]) -> f64 {
    sponsors
        .iter()
        .map(|sponsor| sponsor.position.distance_to(point))
        .fold(f64::INFINITY, f64::min)
}

/// Towns healthy enough to sponsor a new settlement
fn sponsoring_towns<'s>(state: &'s WorldState, profile: &EmergenceProfile) -> Vec<&'s Entity> {
    state
        .grid
        .towns()
        .filter(|entity| entity.terrain.is_livable())
        .filter(|entity| {
            entity.town().is_some_and(|town| {
                town.stable_service_seconds >= profile.min_stable_seconds
                    && town.outage_seconds < SPONSOR_MAX_OUTAGE
                    && town.covered_by_substation
                    && town.utilization >= SPONSOR_MIN_UTILIZATION
            })
        })
        .filter(|entity| has_stable_neighbor_service(&state.grid, entity, state.reliability))
        .collect()
}

/// Weighted draw by terrain fertility and service quality
fn pick_sponsor<'s, R: Rng>(sponsors: &[&'s Entity], rng: &mut R) -> Option<&'s Entity> {
    if sponsors.len() <= 1 {
        return sponsors.first().copied();
    }
    let weights: Vec<f64> = sponsors
        .iter()
        .map(|sponsor| {
            let utilization = sponsor.town().map(|town| town.utilization).unwrap_or(0.0);
            sponsor.terrain.fertility() * clamp(utilization * 0.8 + 0.35, 0.35, 1.15)
        })
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0001 {
        return sponsors.choose(rng).copied();
    }

    let mut roll = rng.gen::<f64>() * total;
    for (sponsor, weight) in sponsors.iter().zip(&weights) {
        roll -= weight;
        if roll <= 0.0 {
            return Some(*sponsor);
        }
    }
    sponsors.last().copied()
}

/// Sample a free land point on a ring around a sponsor
fn synthetic_anchor<R: Rng>(
    state: &WorldState,
    ctx: &StageContext<'_>,
    sponsors: &[&Entity],
    rng: &mut R,
) -> Option<TownAnchor> {
    for _ in 0..ANCHOR_ATTEMPTS {
        let sponsor = pick_sponsor(sponsors, rng)?;
        let angle = rng.gen::<f64>() * std::f64::consts::TAU;
        let distance = rng.gen_range(RING_MIN..RING_MAX);
        let position = Point::new(
            clamp(
                sponsor.position.x + angle.cos() * distance,
                MAP_PADDING,
                (ctx.map.width - MAP_PADDING).max(MAP_PADDING),
            ),
            clamp(
                sponsor.position.y + angle.sin() * distance,
                MAP_PADDING,
                (ctx.map.height - MAP_PADDING).max(MAP_PADDING),
            ),
        );
        let crowded = state
            .grid
            .entities
            .iter()
            .any(|entity| entity.position.distance_to(position) < MIN_TOWN_SPACING);
        if crowded || is_water(ctx.terrain, position) {
            continue;
        }

        let source = state.grid.nearest_town(position).unwrap_or(sponsor);
        let (base_demand, population, growth_rate) = source
            .town()
            .map(|town| (town.base_demand, town.population, town.growth_rate))
            .unwrap_or((52.0, 34.0, 0.45));
        return Some(TownAnchor {
            id: None,
            name: emergent_town_name(state.next_town_id),
            position,
            radius: rng.gen_range(54.0..66.0),
            district_type: source.district_type.clone(),
            terrain: source.terrain.clone(),
            climate: source.climate.clone(),
            base_demand: clamp(base_demand * rng.gen_range(0.72..1.08), 26.0, 118.0),
            population: clamp(population * rng.gen_range(0.6..0.9), 14.0, 82.0),
            growth_rate: clamp(growth_rate * rng.gen_range(0.85..1.2), 0.25, 1.25),
            strategic_value: format!("{} growth settlement", archetype(&source.district_type)),
        });
    }
    None
}

/// Turn an anchor into a fresh, partially grown town
fn materialize<R: Rng>(state: &mut WorldState, ctx: &StageContext<'_>, anchor: TownAnchor, rng: &mut R) -> Entity {
    let id = match anchor.id {
        Some(id) => id,
        None => {
            let id = format!("town-{}", state.next_town_id);
            state.next_town_id += 1;
            id
        }
    };
    let base_demand = anchor.base_demand.max(0.0);
    let initial_demand = if base_demand > 0.0 {
        clamp(base_demand * rng.gen_range(0.26..0.42), 8.0_f64.min(base_demand), base_demand)
    } else {
        0.0
    };
    let population = (anchor.population * rng.gen_range(0.32..0.48)).max(8.0);
    let radius = if anchor.radius > 0.0 {
        anchor.radius
    } else {
        rng.gen_range(54.0..66.0)
    };
    let growth_rate = if anchor.growth_rate > 0.0 { anchor.growth_rate } else { 0.42 };

    let source = MapTown {
        id,
        name: anchor.name,
        position: anchor.position,
        radius,
        district_type: anchor.district_type,
        terrain: anchor.terrain,
        climate: anchor.climate,
        base_demand,
        population,
        growth_rate,
        strategic_value: anchor.strategic_value,
    };
    let mut entity = Entity::town_from_map(&source, ctx.map.resource_profile_at(source.position, radius));
    if let Some(town) = entity.town_mut() {
        town.demand = initial_demand;
        town.target_demand = initial_demand;
        town.served = 0.0;
        town.unmet = initial_demand;
        town.utilization = 0.0;
    }
    entity
}

/// Try to grow a new town; returns its id when one emerged
pub fn update_town_emergence<R: Rng>(state: &mut WorldState, ctx: &StageContext<'_>, rng: &mut R) -> Option<String> {
    let profile = EmergenceProfile::for_config(ctx.config)?;
    if state.runtime_seconds < state.next_town_emergence_at {
        return None;
    }
    state.next_town_emergence_at =
        state.runtime_seconds + rng.gen_range(profile.interval_min..profile.interval_max);

    if state.towns_emerged >= profile.max_emergences || state.reliability < profile.reliability_floor {
        return None;
    }
    let components = ComponentMap::build(&state.grid);
    if powered_substations(&state.grid, &components, &ctx.config.asset_rules).is_empty() {
        return None;
    }
    let (demand, served) = state.town_demand_and_served();
    let demand_met = if demand <= 0.01 { 1.0 } else { served / demand };
    if demand_met < profile.min_demand_met_ratio {
        debug!(demand_met, "emergence skipped: demand not met");
        return None;
    }

    let sponsors = sponsoring_towns(state, &profile);
    if sponsors.is_empty() {
        return None;
    }

    let mut candidates: Vec<Candidate> = ctx
        .map
        .towns
        .iter()
        .filter(|anchor| !state.grid.contains(&anchor.id))
        .filter(|anchor| anchor.terrain.is_livable() && !is_water(ctx.terrain, anchor.position))
        .map(|anchor| {
            let distance = nearest_sponsor_distance(anchor.position, &sponsors);
            Candidate {
                anchor: TownAnchor::from(anchor),
                score: clamp(2.4 - distance / 520.0, 0.2, 2.4)
                    + anchor.terrain.fertility() * 0.75
                    + rng.gen::<f64>() * 0.6,
            }
        })
        .collect();

    if let Some(anchor) = synthetic_anchor(state, ctx, &sponsors, rng).filter(|anchor| anchor.terrain.is_livable()) {
        let distance = nearest_sponsor_distance(anchor.position, &sponsors);
        let score = clamp(2.2 - distance / 560.0, 0.25, 2.2) + anchor.terrain.fertility() * 0.62 + rng.gen::<f64>() * 0.45;
        candidates.push(Candidate { anchor, score });
    }

    let selected = candidates
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))?
        .anchor;
    let town = materialize(state, ctx, selected, rng);
    let (id, name) = (town.id.clone(), town.name.clone());
    state.grid.insert(town);
    update_grid_coverage(state, ctx);

    state.towns_emerged += 1;
    state.score += 12.0;
    info!(town = %id, emerged = state.towns_emerged, "town emerged");
    state.log_timeline(format!("Town emerged on the map: {}. New local demand activated.", name));
    state.push_alert(
        format!("New town emerged: {}. Demand baseline increased.", name),
        AlertLevel::Warning,
        6.0,
    );
    Some(id)
}
