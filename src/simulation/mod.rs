//! # Grid Simulation Module
//!
//! Runs the national grid in fixed 0.1 s ticks.
//!
//! ## Components
//!
//! - **Engine**: Owns a run and drives the tick pipeline and player commands
//! - **Pipeline**: Ordered tick stages and the read-only stage context
//! - **Construction**: Builds, lines, timed demolitions and priority reroutes
//! - **Demand**: Town demand growth, coverage refresh and service stability
//! - **Economy**: Budget cash flow, reliability, trust, lawsuits and scoring
//! - **Emergence**: Procedural spawning of new towns near served ones
//! - **Incidents**: Seasons and timed demand, line and cost incidents
//! - **Objective**: End conditions, run summaries and objective text
//! - **Tutorial**: Linear checklist of core controls
//! - **Snapshot**: HUD payload, text snapshot, suspend and resume
//!
//! ## Usage
//!
//! ```rust,no_run
//! use national_grid_sim::domain::{RunConfig, StaticMap};
//! use national_grid_sim::simulation::{Command, SimulationEngine};
//! use national_grid_sim::terrain::FlatTerrain;
//!
//! let map = StaticMap::load("assets/maps/national_core.map.json")?;
//! let mut engine = SimulationEngine::new(RunConfig::standard("balanced"), map, Box::new(FlatTerrain), Some(42));
//!
//! // One simulated second
//! engine.advance_time(1000.0);
//!
//! engine.apply(Command::TogglePause).ok();
//! println!("{}", engine.render_to_text());
//! # Ok::<(), national_grid_sim::error::SimError>(())
//! ```

pub mod clock;
pub mod command;
pub mod construction;
pub mod demand;
pub mod economy;
pub mod emergence;
pub mod engine;
pub mod incidents;
pub mod objective;
pub mod pipeline;
pub mod snapshot;
pub mod state;
pub mod tutorial;

pub use clock::FixedStepClock;
pub use command::{Command, CommandOutcome, CommandResult};
pub use construction::{BuildReceipt, BuildTarget, DemolitionOutcome, LineOutcome, RerouteOutcome};
pub use engine::{EngineObserver, SimulationEngine};
pub use objective::{ObjectiveStatus, RunResult, RunSummary};
pub use pipeline::{StageContext, TickStage, TICK_SECONDS};
pub use snapshot::{HudPayload, SuspendSnapshot, TextSnapshot, ToolState};
pub use state::{Alert, PendingDemolition, TimelineEntry, TutorialProgress, WorldState};
