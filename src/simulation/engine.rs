//! # Simulation Engine
//!
//! Owns one run: the static map, the run configuration, the mutable
//! [`WorldState`] and the player's tool selection. The engine advances the
//! world in fixed 0.1 s ticks through the ordered [`TickStage`] pipeline and
//! applies player [`Command`]s between ticks.
//!
//! Outputs are pulled ([`SimulationEngine::hud`], [`SimulationEngine::render_to_text`],
//! [`SimulationEngine::suspend`]) or pushed to an [`EngineObserver`] after
//! every tick and command.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::clock::FixedStepClock;
use super::command::{Command, CommandOutcome, CommandResult};
use super::construction::{
    build, build_line, clear_priorities, demolish, demolish_line, process_pending_demolitions, reroute,
    validate_line_endpoint,
};
use super::demand::{update_demand, update_grid_coverage, update_town_stability};
use super::economy::{apply_dev_mode, update_economy, update_score, DEV_MODE_BUDGET};
use super::emergence::update_town_emergence;
use super::incidents::{expire_incidents, spawn_incidents, update_season};
use super::objective::{evaluate_end_conditions, RunSummary};
use super::pipeline::{StageContext, TickStage, TICK_SECONDS};
use super::snapshot::{rehydrate, HudPayload, SnapshotView, SuspendSnapshot, TextSnapshot, ToolState};
use super::state::WorldState;
use super::tutorial::{check_passive_progress, new_progress, note_pause_toggle, record_action, TutorialAction};
use crate::domain::{AlertLevel, Entity, RunConfig, StaticMap, TransmissionLine};
use crate::error::{Rejection, SimError};
use crate::power_flow::{FlowResolver, FlowSummary, GridConstraints};
use crate::terrain::TerrainClassifier;

/// Towns seeded by a sparse start
const SPARSE_START_TOWN_IDS: [&str; 1] = ["capital"];
/// Seconds of stable service credited to seeded towns
const SEEDED_STABLE_SECONDS: f64 = 8.0;
const REJECTION_ALERT_SECONDS: f64 = 4.0;

/// Receives engine output as it is produced
#[cfg_attr(test, mockall::automock)]
pub trait EngineObserver: Send {
    /// Called after every tick and every command
    fn on_hud(&mut self, hud: &HudPayload);

    /// Called once when the run reaches an end condition
    fn on_run_end(&mut self, summary: &RunSummary);
}

/// One simulated run
pub struct SimulationEngine {
    config: RunConfig,
    map: StaticMap,
    terrain: Box<dyn TerrainClassifier>,
    constraints: GridConstraints,
    rng: StdRng,
    state: WorldState,
    clock: FixedStepClock,
    paused: bool,
    tools: ToolState,
    outcome: Option<RunSummary>,
    observer: Option<Box<dyn EngineObserver>>,
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Copy resolver totals into the world state
fn record_flow(state: &mut WorldState, summary: &FlowSummary) {
    state.total_demand = summary.total_demand;
    state.total_served = summary.total_served;
    state.total_unmet = summary.total_unmet;
    state.total_generation = summary.total_generation;
    state.storage_charging_mw = summary.storage_charging_mw;
}

/// Fresh world for a new run
fn fresh_state<R: Rng>(config: &RunConfig, map: &StaticMap, rng: &mut R) -> WorldState {
    let budget = if config.dev_mode {
        DEV_MODE_BUDGET
    } else {
        config.starting_budget
    };
    let mut state = WorldState::baseline(budget);
    state.next_town_emergence_at = rng.gen_range(44.0..70.0);
    state.next_event_at = rng.gen_range(20.0..34.0);
    if config.is_tutorial() {
        state.tutorial = Some(new_progress());
    }

    let mut sources: Vec<_> = if config.sparse_start {
        map.towns
            .iter()
            .filter(|town| SPARSE_START_TOWN_IDS.contains(&town.id.as_str()))
            .collect()
    } else {
        map.towns.iter().collect()
    };
    if sources.is_empty() {
        warn!(map = %map.id, "sparse start towns missing from map, seeding first town");
        sources.extend(map.towns.first());
    }
    for source in sources {
        let mut town = Entity::town_from_map(source, map.resource_profile_at(source.position, source.radius));
        if let Some(seeded) = town.town_mut() {
            seeded.stable_service_seconds = SEEDED_STABLE_SECONDS;
        }
        state.grid.insert(town);
    }

    for link in &map.links {
        let (Some(a), Some(b)) = (state.grid.get(&link.a), state.grid.get(&link.b)) else {
            continue;
        };
        let length = a.position.distance_to(b.position);
        let capacity = if link.capacity > 0.0 {
            link.capacity
        } else {
            TransmissionLine::capacity_for_length(length)
        };
        let mut line = TransmissionLine::new(link.id.clone(), &link.a, &link.b, length, capacity, 0);
        line.built = false;
        line.tier = Some(link.tier.clone());
        state.grid.lines.push(line);
    }
    state
}

/// Run one pipeline stage; returns a summary when the run ends
fn run_stage<R: Rng>(
    stage: TickStage,
    state: &mut WorldState,
    ctx: &StageContext<'_>,
    rng: &mut R,
    dt: f64,
) -> Option<RunSummary> {
    match stage {
        TickStage::Demolitions => {
            process_pending_demolitions(state, ctx);
        }
        TickStage::Season => update_season(state, ctx, dt),
        TickStage::ExpireIncidents => expire_incidents(state),
        TickStage::SpawnIncidents => spawn_incidents(state, ctx, rng),
        TickStage::Demand => update_demand(state, ctx, dt),
        TickStage::Coverage => {
            update_grid_coverage(state, ctx);
        }
        TickStage::FlowResolution => {
            let summary = FlowResolver::new(ctx.constraints, &ctx.config.asset_rules).resolve(&mut state.grid, dt);
            record_flow(state, &summary);
        }
        TickStage::TutorialPassive => check_passive_progress(state),
        TickStage::Stability => update_town_stability(state, dt),
        TickStage::Emergence => {
            update_town_emergence(state, ctx, rng);
        }
        TickStage::Economy => update_economy(state, ctx, dt),
        TickStage::Scoring => update_score(state, dt),
        TickStage::DevMode => apply_dev_mode(state, ctx),
        TickStage::EndConditions => return evaluate_end_conditions(state, ctx),
    }
    None
}

impl SimulationEngine {
    /// Start a new run on a map
    ///
    /// A fixed `seed` makes incident, emergence and timer rolls reproducible.
    pub fn new(config: RunConfig, map: StaticMap, terrain: Box<dyn TerrainClassifier>, seed: Option<u64>) -> Self {
        let mut rng = seeded_rng(seed);
        let state = fresh_state(&config, &map, &mut rng);
        info!(
            run = %config.label,
            map = %map.id,
            towns = state.grid.town_count(),
            budget = state.budget,
            "run started"
        );
        let mut engine = Self {
            config,
            map,
            terrain,
            constraints: GridConstraints::default(),
            rng,
            state,
            clock: FixedStepClock::new(),
            paused: false,
            tools: ToolState::default(),
            outcome: None,
            observer: None,
        };
        engine.refresh_grid();
        engine
    }

    /// Resume a run from a suspend document
    ///
    /// The world state is rebuilt leniently; only a missing or invalid
    /// `runConfig` is an error.
    pub fn resume(
        document: &Value,
        map: StaticMap,
        terrain: Box<dyn TerrainClassifier>,
        seed: Option<u64>,
    ) -> Result<Self, SimError> {
        let raw_config = document
            .get("runConfig")
            .cloned()
            .ok_or_else(|| SimError::Snapshot("suspend document has no runConfig".into()))?;
        let mut config: RunConfig = serde_json::from_value(raw_config)?;
        config.apply_defaults();
        let tools: ToolState = document
            .get("tool")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        let paused = document.get("paused").and_then(Value::as_bool).unwrap_or(false);

        let constraints = GridConstraints::default();
        let mut rng = seeded_rng(seed);
        let mut state = rehydrate(
            document.get("gameState").unwrap_or(&Value::Null),
            &config,
            &constraints,
            &mut rng,
        );

        let pruned = state.grid.prune_empty_nodes();
        if !pruned.is_empty() {
            warn!(count = pruned.len(), "pruned empty infrastructure nodes on resume");
        }
        for entity in state.grid.entities.iter_mut() {
            entity.resource_profile = map.resource_profile_at(entity.position, entity.radius);
        }
        info!(
            run = %config.label,
            runtime = state.runtime_seconds,
            budget = state.budget,
            entities = state.grid.entities.len(),
            "run resumed"
        );

        let mut engine = Self {
            config,
            map,
            terrain,
            constraints,
            rng,
            state,
            clock: FixedStepClock::new(),
            paused,
            tools,
            outcome: None,
            observer: None,
        };
        engine.forget_missing_selections();
        if engine.config.dev_mode {
            let ctx = StageContext {
                config: &engine.config,
                map: &engine.map,
                terrain: engine.terrain.as_ref(),
                constraints: &engine.constraints,
            };
            apply_dev_mode(&mut engine.state, &ctx);
        }
        engine.refresh_grid();
        Ok(engine)
    }

    pub fn set_observer(&mut self, observer: Box<dyn EngineObserver>) {
        self.observer = Some(observer);
    }

    pub fn with_constraints(mut self, constraints: GridConstraints) -> Self {
        self.constraints = constraints;
        self.refresh_grid();
        self
    }

    /// Recompute coverage and flows after a structural change
    fn refresh_grid(&mut self) {
        let ctx = StageContext {
            config: &self.config,
            map: &self.map,
            terrain: self.terrain.as_ref(),
            constraints: &self.constraints,
        };
        update_grid_coverage(&mut self.state, &ctx);
        let summary = FlowResolver::new(&self.constraints, &self.config.asset_rules).resolve(&mut self.state.grid, 0.0);
        record_flow(&mut self.state, &summary);
    }

    /// Drop tool selections that point at removed entities
    fn forget_missing_selections(&mut self) {
        let grid = &self.state.grid;
        if self.tools.selected_id.as_deref().is_some_and(|id| !grid.contains(id)) {
            self.tools.selected_id = None;
        }
        if self.tools.line_start_id.as_deref().is_some_and(|id| !grid.contains(id)) {
            self.tools.line_start_id = None;
        }
    }

    fn view(&self) -> SnapshotView<'_> {
        SnapshotView {
            state: &self.state,
            config: &self.config,
            map: &self.map,
            constraints: &self.constraints,
            tools: &self.tools,
            paused: self.paused,
        }
    }

    fn publish_hud(&mut self) {
        if self.observer.is_none() {
            return;
        }
        let hud = HudPayload::capture(&self.view());
        if let Some(observer) = self.observer.as_mut() {
            observer.on_hud(&hud);
        }
    }

    /// Run exactly one fixed step, regardless of pause state
    ///
    /// Does nothing once the run has ended.
    pub fn tick(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let ctx = StageContext {
            config: &self.config,
            map: &self.map,
            terrain: self.terrain.as_ref(),
            constraints: &self.constraints,
        };
        let state = &mut self.state;
        state.runtime_seconds += TICK_SECONDS;

        let mut ended = None;
        for stage in TickStage::sequence() {
            if let Some(summary) = run_stage(stage, state, &ctx, &mut self.rng, TICK_SECONDS) {
                ended = Some(summary);
                break;
            }
        }
        state.trim_alerts();
        debug!(
            runtime = state.runtime_seconds,
            budget = state.budget,
            reliability = state.reliability,
            served = state.total_served,
            "tick"
        );

        self.forget_missing_selections();
        self.publish_hud();
        if let Some(summary) = ended {
            if let Some(observer) = self.observer.as_mut() {
                observer.on_run_end(&summary);
            }
            self.outcome = Some(summary);
        }
    }

    /// Feed a real frame delta; returns the ticks run
    pub fn frame(&mut self, frame_seconds: f64) -> usize {
        if self.paused || self.is_over() {
            return 0;
        }
        let due = self.clock.advance(frame_seconds);
        self.run_ticks(due)
    }

    /// Deterministic advance by `ms` milliseconds, at least one tick
    pub fn advance_time(&mut self, ms: f64) -> usize {
        if self.paused || self.is_over() {
            return 0;
        }
        self.run_ticks(FixedStepClock::ticks_for_millis(ms))
    }

    fn run_ticks(&mut self, count: usize) -> usize {
        let mut ran = 0;
        while ran < count && !self.is_over() {
            self.tick();
            ran += 1;
        }
        ran
    }

    /// Apply one player command
    ///
    /// Rejections leave the world untouched and are mirrored to the alert
    /// feed.
    pub fn apply(&mut self, command: Command) -> CommandResult {
        let name = command.name();
        let structural = command.is_structural();
        let result = if self.is_over() {
            Err(Rejection::RunEnded)
        } else {
            self.dispatch(command)
        };

        match &result {
            Ok(outcome) => {
                debug!(command = name, ?outcome, "command applied");
                if structural {
                    self.refresh_grid();
                }
                self.forget_missing_selections();
            }
            Err(rejection) => {
                warn!(command = name, %rejection, "command rejected");
                self.state
                    .push_alert(rejection.to_string(), rejection.level(), REJECTION_ALERT_SECONDS);
            }
        }
        self.state.trim_alerts();
        self.publish_hud();
        result
    }

    fn dispatch(&mut self, command: Command) -> CommandResult {
        let ctx = StageContext {
            config: &self.config,
            map: &self.map,
            terrain: self.terrain.as_ref(),
            constraints: &self.constraints,
        };
        let state = &mut self.state;
        let tools = &mut self.tools;

        match command {
            Command::Build {
                target,
                asset,
                plant_type,
            } => build(state, &ctx, &target, asset, plant_type.unwrap_or_default()).map(CommandOutcome::Built),
            Command::Demolish { node_id, asset } => {
                demolish(state, &ctx, &node_id, asset).map(CommandOutcome::Demolition)
            }
            Command::DemolishLine { line_id } => {
                demolish_line(state, &ctx, &line_id).map(|refund| CommandOutcome::LineDemolished { line_id, refund })
            }
            Command::BuildLine { a, b } => {
                let outcome = build_line(state, &ctx, &a, &b)?;
                tools.line_start_id = None;
                Ok(CommandOutcome::Line(outcome))
            }
            Command::SelectLineEndpoint { id } => {
                let entity = state
                    .grid
                    .get(&id)
                    .ok_or_else(|| Rejection::UnknownEntity(id.clone()))?;
                match tools.line_start_id.take() {
                    None => {
                        validate_line_endpoint(entity)?;
                        let text = format!("Line start selected: {}. Choose endpoint point.", entity.name);
                        state.push_alert(text, AlertLevel::Advisory, 5.0);
                        tools.line_start_id = Some(id.clone());
                        Ok(CommandOutcome::LineStartSelected { id })
                    }
                    Some(start) if !state.grid.contains(&start) => Ok(CommandOutcome::LineSelectionCleared),
                    Some(start) if start == id => {
                        state.push_alert("Line endpoint cleared.", AlertLevel::Advisory, 3.0);
                        Ok(CommandOutcome::LineSelectionCleared)
                    }
                    Some(start) => match build_line(state, &ctx, &start, &id) {
                        Ok(outcome) => Ok(CommandOutcome::Line(outcome)),
                        Err(rejection) => {
                            tools.line_start_id = Some(start);
                            Err(rejection)
                        }
                    },
                }
            }
            Command::CancelLineSelection => {
                tools.line_start_id = None;
                Ok(CommandOutcome::LineSelectionCleared)
            }
            Command::Reroute { point, radius } => {
                reroute(state, point, radius.unwrap_or(ctx.config.substation_radius)).map(CommandOutcome::Rerouted)
            }
            Command::ClearPriorities => Ok(CommandOutcome::PrioritiesCleared {
                count: clear_priorities(state),
            }),
            Command::TogglePause => {
                self.paused = !self.paused;
                self.clock.reset();
                note_pause_toggle(state, self.paused);
                info!(paused = self.paused, "pause toggled");
                Ok(CommandOutcome::PauseToggled { paused: self.paused })
            }
            Command::RevealResources => {
                tools.resource_layer_visible = true;
                record_action(state, TutorialAction::ResourceReveal);
                Ok(CommandOutcome::ResourcesRevealed)
            }
            Command::Select { id } => {
                if let Some(id) = id.as_deref() {
                    if !state.grid.contains(id) {
                        return Err(Rejection::UnknownEntity(id.to_string()));
                    }
                }
                tools.selected_id = id.clone();
                Ok(CommandOutcome::Selected { id })
            }
        }
    }

    pub fn hud(&self) -> HudPayload {
        HudPayload::capture(&self.view())
    }

    /// Pretty JSON snapshot of the visible world
    pub fn render_to_text(&self) -> String {
        TextSnapshot::capture(&self.view()).to_json()
    }

    /// Deep copy of the run for later resumption
    pub fn suspend(&self) -> SuspendSnapshot {
        SuspendSnapshot {
            run_config: self.config.clone(),
            game_state: self.state.clone(),
            tool: self.tools.clone(),
            paused: self.paused,
        }
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn map(&self) -> &StaticMap {
        &self.map
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// End-of-run summary, once an end condition has fired
    pub fn summary(&self) -> Option<&RunSummary> {
        self.outcome.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetType, Point, Priority, ResourceKind};
    use crate::simulation::construction::{BuildTarget, LineOutcome};
    use crate::terrain::FlatTerrain;
    use serde_json::json;

    fn test_map() -> StaticMap {
        StaticMap::from_value(&json!({
            "world": {"width": 1600, "height": 1000},
            "towns": [
                {"id": "capital", "name": "Capital", "x": 400, "y": 300, "baseDemand": 40},
                {"id": "harbor", "name": "Harbor", "x": 900, "y": 600, "baseDemand": 30}
            ],
            "links": [{"id": "link-1", "a": "capital", "b": "harbor", "tier": "backbone"}]
        }))
        .unwrap()
    }

    fn engine(config: RunConfig) -> SimulationEngine {
        SimulationEngine::new(config, test_map(), Box::new(FlatTerrain), Some(7))
    }

    fn build_at(engine: &mut SimulationEngine, x: f64, y: f64, asset: AssetType) -> String {
        match engine
            .apply(Command::Build {
                target: BuildTarget::Point(Point::new(x, y)),
                asset,
                plant_type: Some(ResourceKind::NaturalGas),
            })
            .unwrap()
        {
            CommandOutcome::Built(receipt) => receipt.node_id,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    /// Plant and substation east of the capital, joined by a line
    fn powered_engine() -> SimulationEngine {
        let mut engine = engine(RunConfig::standard("balanced"));
        let plant = build_at(&mut engine, 700.0, 300.0, AssetType::Plant);
        let substation = build_at(&mut engine, 550.0, 300.0, AssetType::Substation);
        engine
            .apply(Command::SelectLineEndpoint { id: plant })
            .unwrap();
        engine
            .apply(Command::SelectLineEndpoint { id: substation })
            .unwrap();
        engine
    }

    #[test]
    fn test_sparse_start_seeds_capital_only() {
        let engine = engine(RunConfig::standard("balanced"));
        let state = engine.state();
        assert_eq!(state.grid.town_count(), 1);
        let capital = state.grid.get("capital").unwrap();
        assert_eq!(capital.town().unwrap().stable_service_seconds, 8.0);
        assert!(state.grid.lines.is_empty(), "links to unseeded towns are skipped");
        assert!((44.0..70.0).contains(&state.next_town_emergence_at));
        assert!((20.0..34.0).contains(&state.next_event_at));
        assert_eq!(state.budget, 1800.0);
    }

    #[test]
    fn test_full_start_keeps_map_links_unbuilt() {
        let mut config = RunConfig::standard("balanced");
        config.sparse_start = false;
        let engine = engine(config);
        let lines = &engine.state().grid.lines;
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].built);
        assert_eq!(lines[0].tier.as_deref(), Some("backbone"));
    }

    #[test]
    fn test_advance_time_runs_fixed_steps() {
        let mut engine = engine(RunConfig::standard("balanced"));
        assert_eq!(engine.advance_time(1000.0), 10);
        assert!((engine.state().runtime_seconds - 1.0).abs() < 1e-9);
        assert_eq!(engine.advance_time(0.0), 1);
    }

    #[test]
    fn test_paused_engine_does_not_advance() {
        let mut engine = engine(RunConfig::standard("balanced"));
        engine.apply(Command::TogglePause).unwrap();
        assert_eq!(engine.advance_time(500.0), 0);
        assert_eq!(engine.frame(0.2), 0);
        assert_eq!(engine.state().runtime_seconds, 0.0);
        engine.apply(Command::TogglePause).unwrap();
        assert_eq!(engine.frame(0.2), 2);
    }

    #[test]
    fn test_rejection_is_mirrored_without_mutation() {
        let mut engine = engine(RunConfig::standard("balanced"));
        let budget = engine.state().budget;
        let result = engine.apply(Command::Build {
            target: BuildTarget::Node("capital".into()),
            asset: AssetType::Plant,
            plant_type: None,
        });
        assert_eq!(result, Err(Rejection::TownTarget));
        assert_eq!(engine.state().budget, budget);
        assert_eq!(engine.state().grid.entities.len(), 1);
        assert_eq!(engine.state().alerts[0].text, Rejection::TownTarget.to_string());
    }

    #[test]
    fn test_line_tool_two_clicks_build_a_line() {
        let engine = powered_engine();
        assert!(engine.tools().line_start_id.is_none());
        let line = engine.state().grid.line_between("node-1", "node-2").unwrap();
        assert!(line.built);
        let capital = engine.state().grid.get("capital").unwrap().town().unwrap();
        assert!(capital.covered_by_substation);
        assert!(capital.served > 0.0, "coverage refresh serves the town immediately");
    }

    #[test]
    fn test_reroute_without_radius_uses_substation_coverage() {
        let mut engine = powered_engine();
        let center = Point::new(550.0, 100.0);
        assert_eq!(
            engine.apply(Command::Reroute {
                point: center,
                radius: Some(92.0),
            }),
            Err(Rejection::NoRerouteTargets)
        );

        let outcome = engine
            .apply(Command::Reroute {
                point: center,
                radius: None,
            })
            .unwrap();
        let CommandOutcome::Rerouted(outcome) = outcome else {
            panic!("expected a reroute outcome");
        };
        assert!(outcome.targets >= 1);
        assert_eq!(engine.state().grid.get("node-2").unwrap().priority, Priority::Elevated);
    }

    #[test]
    fn test_line_tool_rejects_town_start_and_keeps_selection_on_failure() {
        let mut engine = engine(RunConfig::standard("balanced"));
        assert_eq!(
            engine.apply(Command::SelectLineEndpoint { id: "capital".into() }),
            Err(Rejection::TownEndpoint)
        );
        let plant = build_at(&mut engine, 700.0, 300.0, AssetType::Plant);
        engine
            .apply(Command::SelectLineEndpoint { id: plant.clone() })
            .unwrap();
        assert_eq!(
            engine.apply(Command::SelectLineEndpoint { id: "capital".into() }),
            Err(Rejection::TownEndpoint)
        );
        assert_eq!(engine.tools().line_start_id.as_deref(), Some(plant.as_str()));

        let outcome = engine.apply(Command::SelectLineEndpoint { id: plant }).unwrap();
        assert_eq!(outcome, CommandOutcome::LineSelectionCleared);
        assert!(engine.tools().line_start_id.is_none());
    }

    #[test]
    fn test_second_line_click_on_existing_line_toggles_it_off() {
        let mut engine = powered_engine();
        let outcome = engine
            .apply(Command::BuildLine {
                a: "node-2".into(),
                b: "node-1".into(),
            })
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Line(LineOutcome::Removed { .. })));
        assert!(!engine.state().grid.lines[0].built);
    }

    #[test]
    fn test_observer_receives_hud_after_ticks_and_commands() {
        let mut observer = MockEngineObserver::new();
        observer.expect_on_hud().times(4).returning(|_| ());
        observer.expect_on_run_end().never();
        let mut engine = engine(RunConfig::standard("balanced"));
        engine.set_observer(Box::new(observer));
        engine.advance_time(300.0);
        engine.apply(Command::ClearPriorities).unwrap();
    }

    #[test]
    fn test_commands_rejected_after_run_end() {
        let mut engine = engine(RunConfig::standard("balanced"));
        engine.state.budget = 0.0;
        engine.tick();
        assert!(engine.is_over());
        assert!(!engine.summary().unwrap().is_victory());
        assert_eq!(engine.apply(Command::ClearPriorities), Err(Rejection::RunEnded));
        assert_eq!(engine.advance_time(1000.0), 0);
    }

    #[test]
    fn test_suspend_and_resume_preserves_the_run() {
        let mut engine = powered_engine();
        engine.advance_time(2000.0);
        engine.apply(Command::Select { id: Some("node-1".into()) }).unwrap();
        let document = serde_json::to_value(engine.suspend()).unwrap();

        let resumed = SimulationEngine::resume(&document, test_map(), Box::new(FlatTerrain), Some(1)).unwrap();
        assert_eq!(resumed.state().budget, engine.state().budget);
        assert_eq!(resumed.state().runtime_seconds, engine.state().runtime_seconds);
        assert_eq!(resumed.state().grid.entities.len(), 3);
        assert_eq!(resumed.tools().selected_id.as_deref(), Some("node-1"));
        assert_eq!(resumed.config().label, engine.config().label);
    }

    #[test]
    fn test_resume_without_run_config_fails() {
        let result = SimulationEngine::resume(&json!({"gameState": {}}), test_map(), Box::new(FlatTerrain), None);
        assert!(matches!(result, Err(SimError::Snapshot(_))));
    }

    #[test]
    fn test_tutorial_tracks_resource_reveal_and_pause() {
        let mut engine = engine(RunConfig::tutorial());
        {
            let progress = engine.state.tutorial.as_mut().unwrap();
            progress.current_step = 4;
            progress.completed_steps = 4;
        }
        engine.apply(Command::RevealResources).unwrap();
        assert!(engine.tools().resource_layer_visible);
        assert_eq!(engine.hud().current_step_id, Some("reroute"));

        engine.apply(Command::TogglePause).unwrap();
        engine.apply(Command::TogglePause).unwrap();
        let progress = engine.state().tutorial.as_ref().unwrap();
        assert!(progress.pause_seen && progress.resume_seen);
    }

    #[test]
    fn test_dev_mode_starts_with_dev_budget() {
        let engine = engine(RunConfig::standard("balanced").with_dev_mode(true));
        assert_eq!(engine.state().budget, DEV_MODE_BUDGET);
        assert!(engine.hud().dev_mode);
    }
}
