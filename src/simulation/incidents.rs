//! # Seasons & Incidents
//!
//! Season rotation and the random incident state machine. Incidents are
//! time-boxed multipliers read back through [`Modifiers`] by the demand,
//! flow, economy and construction stages.
//!
//! [`Modifiers`]: crate::domain::Modifiers

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use super::pipeline::StageContext;
use super::state::WorldState;
use crate::domain::{AlertLevel, Climate, Entity, Incident, IncidentKind, Season, SeasonalProfile, Terrain, SEASON_ORDER};

/// Season length outside campaign runs (s)
const SEASON_LENGTH: f64 = 100.0;
const CAMPAIGN_SEASON_LENGTH: f64 = 85.0;

/// Advance the season timer and rotate the label
pub fn update_season(state: &mut WorldState, ctx: &StageContext<'_>, dt: f64) {
    if ctx.config.seasonal_profile == SeasonalProfile::Neutral {
        state.season_label = Season::Neutral;
        return;
    }

    state.season_timer += dt;
    let length = if ctx.config.is_campaign() {
        CAMPAIGN_SEASON_LENGTH
    } else {
        SEASON_LENGTH
    };
    if state.season_timer >= length {
        state.season_timer = 0.0;
        state.season_index = (state.season_index + 1) % SEASON_ORDER.len();
        state.season_label = SEASON_ORDER[state.season_index];
        state.push_alert(
            format!(
                "Season shift: {} pressure active.",
                state.season_label.to_string().to_uppercase()
            ),
            AlertLevel::Advisory,
            6.0,
        );
    }
    if state.season_label == Season::Neutral {
        state.season_label = SEASON_ORDER[state.season_index % SEASON_ORDER.len()];
    }

    match ctx.config.seasonal_profile {
        SeasonalProfile::WinterPeak => state.season_label = Season::Winter,
        SeasonalProfile::SummerPeak => state.season_label = Season::Summer,
        _ => {}
    }
}

/// Drop incidents whose window has closed
pub fn expire_incidents(state: &mut WorldState) {
    let now = state.runtime_seconds;
    let (expired, active): (Vec<Incident>, Vec<Incident>) = std::mem::take(&mut state.incidents)
        .into_iter()
        .partition(|incident| incident.expires_at <= now);
    state.incidents = active;
    for incident in expired {
        info!(incident = %incident.id, title = %incident.title, "incident resolved");
        state.log_timeline(format!("Incident resolved: {}.", incident.title));
        state.push_alert(format!("{} resolved.", incident.title), AlertLevel::Advisory, 4.0);
    }
}

/// Incident template before it is scheduled
#[derive(Debug, Clone)]
struct IncidentTemplate {
    title: String,
    body: &'static str,
    level: AlertLevel,
    duration: f64,
    kind: IncidentKind,
    multiplier: f64,
    region_id: Option<String>,
}

/// Candidate incidents for the current town set, in catalog order
fn incident_catalog<R: Rng>(state: &WorldState, rng: &mut R) -> Vec<IncidentTemplate> {
    let towns: Vec<_> = state.grid.towns().collect();
    let pick_town = |rng: &mut R, predicate: &dyn Fn(&Entity) -> bool| {
        let matching: Vec<&Entity> = towns.iter().copied().filter(|town| predicate(town)).collect();
        matching.choose(rng).map(|town| (town.id.clone(), town.name.clone()))
    };

    let mut catalog = Vec::new();
    if let Some((id, name)) = pick_town(rng, &|town| town.climate == Climate::Warm) {
        catalog.push(IncidentTemplate {
            title: format!("Heat wave in {}", name),
            body: "Cooling demand surges across warm climate zones.",
            level: AlertLevel::Warning,
            duration: 22.0,
            kind: IncidentKind::DemandBoost,
            multiplier: 1.28,
            region_id: Some(id),
        });
    }
    if let Some((id, name)) = pick_town(rng, &|town| town.climate == Climate::Cold) {
        catalog.push(IncidentTemplate {
            title: format!("Cold snap in {}", name),
            body: "Heating pressure increases cold-climate town load.",
            level: AlertLevel::Warning,
            duration: 20.0,
            kind: IncidentKind::DemandBoost,
            multiplier: 1.25,
            region_id: Some(id),
        });
    }
    if let Some((id, name)) = pick_town(rng, &|town| town.terrain == Terrain::Coast) {
        catalog.push(IncidentTemplate {
            title: format!("Coastal storm near {}", name),
            body: "Manual line resilience is reduced around coastal routes.",
            level: AlertLevel::Critical,
            duration: 18.0,
            kind: IncidentKind::LineCap,
            multiplier: 0.65,
            region_id: Some(id),
        });
    }
    catalog.push(IncidentTemplate {
        title: "Fuel price shock".to_string(),
        body: "Operating burden rises temporarily.",
        level: AlertLevel::Warning,
        duration: 20.0,
        kind: IncidentKind::OperatingCost,
        multiplier: 1.28,
        region_id: None,
    });
    catalog.push(IncidentTemplate {
        title: "Policy rebate window".to_string(),
        body: "Infrastructure costs temporarily reduced.",
        level: AlertLevel::Advisory,
        duration: 16.0,
        kind: IncidentKind::BuildCost,
        multiplier: 0.82,
        region_id: None,
    });
    catalog
}

/// Spawn the next incident once its timer elapses; never in tutorial runs
pub fn spawn_incidents<R: Rng>(state: &mut WorldState, ctx: &StageContext<'_>, rng: &mut R) {
    if ctx.config.is_tutorial() {
        return;
    }
    let now = state.runtime_seconds;
    if now < state.next_event_at {
        return;
    }
    let intensity = if ctx.config.event_intensity > 0.0 {
        ctx.config.event_intensity
    } else {
        1.0
    };
    state.next_event_at = now + rng.gen_range(24.0..40.0) / intensity;

    if state.grid.town_count() == 0 {
        return;
    }
    let catalog = incident_catalog(state, rng);
    let Some(template) = catalog.choose(rng).cloned() else {
        return;
    };

    let id = format!("incident-{}", state.next_incident_id);
    state.next_incident_id += 1;
    info!(
        incident = %id,
        title = %template.title,
        kind = ?template.kind,
        multiplier = template.multiplier,
        region = ?template.region_id,
        "incident triggered"
    );
    state.push_alert(
        format!("{}: {}", template.title, template.body),
        template.level,
        template.duration,
    );
    state.log_timeline(format!("Incident triggered: {}.", template.title));
    state.incidents.push(Incident {
        id,
        title: template.title,
        body: template.body.to_string(),
        level: template.level,
        kind: template.kind,
        region_id: template.region_id,
        multiplier: template.multiplier,
        starts_at: now,
        expires_at: now + template.duration,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Modifiers, RunConfig, StaticMap};
    use crate::grid::store::fixtures::town;
    use crate::power_flow::GridConstraints;
    use crate::terrain::FlatTerrain;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn map() -> StaticMap {
        StaticMap::from_value(&json!({"towns": [{"id": "capital"}]})).unwrap()
    }

    fn with_ctx<T>(config: &RunConfig, f: impl FnOnce(&StageContext<'_>) -> T) -> T {
        let map = map();
        let constraints = GridConstraints::default();
        let ctx = StageContext {
            config,
            map: &map,
            terrain: &FlatTerrain,
            constraints: &constraints,
        };
        f(&ctx)
    }

    #[test]
    fn test_season_rotates_after_length() {
        let config = RunConfig::standard("balanced");
        let mut state = WorldState::baseline(1000.0);
        with_ctx(&config, |ctx| {
            update_season(&mut state, ctx, 0.1);
            assert_eq!(state.season_label, Season::Spring);
            state.season_timer = 99.95;
            update_season(&mut state, ctx, 0.1);
        });
        assert_eq!(state.season_label, Season::Summer);
        assert_eq!(state.season_timer, 0.0);
        assert_eq!(state.alerts[0].text, "Season shift: SUMMER pressure active.");
    }

    #[test]
    fn test_peak_profiles_pin_the_season() {
        let config = RunConfig::standard("austerity");
        let mut state = WorldState::baseline(1000.0);
        with_ctx(&config, |ctx| update_season(&mut state, ctx, 0.1));
        assert_eq!(state.season_label, Season::Winter);

        let calm = RunConfig::campaign("first-light");
        with_ctx(&calm, |ctx| update_season(&mut state, ctx, 0.1));
        assert_eq!(state.season_label, Season::Neutral);
    }

    #[test]
    fn test_incident_spawns_and_expires() {
        let config = RunConfig::standard("balanced");
        let mut state = WorldState::baseline(1000.0);
        state.grid.insert(town("capital", 100.0, 100.0, 40.0));
        let mut rng = StdRng::seed_from_u64(7);
        state.runtime_seconds = 30.0;
        state.next_event_at = 25.0;
        with_ctx(&config, |ctx| spawn_incidents(&mut state, ctx, &mut rng));

        assert_eq!(state.incidents.len(), 1);
        let incident = state.incidents[0].clone();
        assert!(incident.region_id.is_none(), "temperate plains town only yields global incidents");
        assert!(state.next_event_at > 30.0 + 24.0 - 1e-9);
        assert!(state.timeline.last().unwrap().text.starts_with("Incident triggered"));

        state.runtime_seconds = incident.expires_at;
        expire_incidents(&mut state);
        assert!(state.incidents.is_empty());
        assert_eq!(state.alerts[0].text, format!("{} resolved.", incident.title));
        assert_eq!(Modifiers::new(&state.incidents, state.runtime_seconds).global(IncidentKind::BuildCost), 1.0);
    }

    #[test]
    fn test_tutorial_never_spawns_incidents() {
        let config = RunConfig::tutorial();
        let mut state = WorldState::baseline(1000.0);
        state.grid.insert(town("capital", 100.0, 100.0, 40.0));
        state.runtime_seconds = 500.0;
        let mut rng = StdRng::seed_from_u64(1);
        with_ctx(&config, |ctx| spawn_incidents(&mut state, ctx, &mut rng));
        assert!(state.incidents.is_empty());
    }

    #[test]
    fn test_warm_town_can_receive_heat_wave() {
        let mut state = WorldState::baseline(1000.0);
        let mut warm = town("harbor", 100.0, 100.0, 40.0);
        warm.climate = Climate::Warm;
        warm.terrain = Terrain::Coast;
        state.grid.insert(warm);
        let mut rng = StdRng::seed_from_u64(3);
        let catalog = incident_catalog(&state, &mut rng);
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog[0].title, "Heat wave in harbor");
        assert_eq!(catalog[1].kind, IncidentKind::LineCap);
        assert_eq!(catalog[1].region_id.as_deref(), Some("harbor"));
    }
}
