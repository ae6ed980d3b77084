//! # Headless Runner
//!
//! Drives a [`SimulationEngine`] from a tokio interval until the run ends, the
//! configured duration elapses, or a shutdown signal arrives. On exit it writes
//! a suspend document, the text snapshot and, when the run ended, the summary.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::StaticMap;
use crate::simulation::{EngineObserver, HudPayload, RunSummary, SimulationEngine};
use crate::telemetry::shutdown_signal;
use crate::terrain::{FlatTerrain, TerrainClassifier};

/// HUD payloads between progress log lines
const HUD_LOG_EVERY: u64 = 50;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    RunEnded,
    DurationElapsed,
    Shutdown,
}

/// Files written when the runner stops
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stop_reason: StopReason,
    pub runtime_seconds: f64,
    pub suspend_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub summary_path: Option<PathBuf>,
}

/// Logs a progress line every few HUD payloads
#[derive(Debug, Default)]
struct HudLogger {
    received: u64,
}

impl EngineObserver for HudLogger {
    fn on_hud(&mut self, hud: &HudPayload) {
        self.received += 1;
        if self.received % HUD_LOG_EVERY != 0 {
            return;
        }
        info!(
            timer = hud.timer,
            budget = hud.budget,
            reliability = hud.reliability,
            served_mw = hud.served_demand,
            unmet_mw = hud.unmet_demand,
            season = ?hud.season,
            towns_emerged = hud.towns_emerged,
            "grid status"
        );
    }

    fn on_run_end(&mut self, summary: &RunSummary) {
        info!(
            result = ?summary.result,
            reason = %summary.reason,
            score = summary.final_score,
            duration_sec = summary.duration_sec,
            "run finished"
        );
    }
}

#[cfg(feature = "raster")]
fn load_terrain(path: Option<&Path>, map: &StaticMap) -> Result<Box<dyn TerrainClassifier>> {
    match path {
        Some(path) => {
            let raster = crate::terrain::RasterTerrain::load_png(path, map.width, map.height)
                .with_context(|| format!("loading terrain raster {}", path.display()))?;
            Ok(Box::new(raster))
        }
        None => Ok(Box::new(FlatTerrain)),
    }
}

#[cfg(not(feature = "raster"))]
fn load_terrain(path: Option<&Path>, _map: &StaticMap) -> Result<Box<dyn TerrainClassifier>> {
    if let Some(path) = path {
        tracing::warn!(path = %path.display(), "raster feature disabled, using flat terrain");
    }
    Ok(Box::new(FlatTerrain))
}

/// Build the engine from config: a fresh run or a resumed one
pub async fn build_engine(config: &Config) -> Result<SimulationEngine> {
    let runner = &config.runner;
    let raw_map = tokio::fs::read_to_string(&runner.map_path)
        .await
        .with_context(|| format!("reading map {}", runner.map_path.display()))?;
    let map = StaticMap::from_json_str(&raw_map).context("parsing map document")?;
    let terrain = load_terrain(runner.terrain_path.as_deref(), &map)?;

    let engine = match &runner.resume_from {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading suspend document {}", path.display()))?;
            let document: serde_json::Value = serde_json::from_str(&raw).context("parsing suspend document")?;
            SimulationEngine::resume(&document, map, terrain, runner.seed)?
        }
        None => SimulationEngine::new(config.run.build()?, map, terrain, runner.seed),
    };
    Ok(engine)
}

/// Run the fixed-step loop until a stop condition, then write outputs
pub async fn run(config: &Config) -> Result<RunReport> {
    let mut engine = build_engine(config).await?;
    engine.set_observer(Box::new(HudLogger::default()));
    let stop_reason = drive(&mut engine, config).await;
    info!(?stop_reason, runtime = engine.state().runtime_seconds, "runner stopped");
    write_outputs(&engine, &config.runner.output_dir, stop_reason).await
}

async fn drive(engine: &mut SimulationEngine, config: &Config) -> StopReason {
    let runner = &config.runner;
    let frame = Duration::from_millis(runner.frame_millis.max(1));
    let mut interval = tokio::time::interval(frame);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = &mut shutdown => return StopReason::Shutdown,
            _ = interval.tick() => {
                let now = Instant::now();
                let ticks = engine.frame(now.duration_since(last).as_secs_f64());
                last = now;
                debug!(ticks, "frame");
            }
        }
        if engine.is_over() {
            return StopReason::RunEnded;
        }
        if runner.max_duration_seconds > 0.0 && engine.state().runtime_seconds >= runner.max_duration_seconds {
            return StopReason::DurationElapsed;
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// Write suspend document, text snapshot and summary under `output_dir`
pub async fn write_outputs(engine: &SimulationEngine, output_dir: &Path, stop_reason: StopReason) -> Result<RunReport> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");

    let suspend_path = output_dir.join(format!("suspend-{stamp}.json"));
    write_json(&suspend_path, &engine.suspend()).await?;

    let snapshot_path = output_dir.join(format!("snapshot-{stamp}.json"));
    tokio::fs::write(&snapshot_path, engine.render_to_text())
        .await
        .with_context(|| format!("writing {}", snapshot_path.display()))?;

    let summary_path = match engine.summary() {
        Some(summary) => {
            let path = output_dir.join(format!("summary-{stamp}.json"));
            write_json(&path, summary).await?;
            Some(path)
        }
        None => None,
    };
    info!(
        suspend = %suspend_path.display(),
        snapshot = %snapshot_path.display(),
        summary = ?summary_path,
        "run outputs written"
    );

    Ok(RunReport {
        stop_reason,
        runtime_seconds: engine.state().runtime_seconds,
        suspend_path,
        snapshot_path,
        summary_path,
    })
}
