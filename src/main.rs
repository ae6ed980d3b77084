use anyhow::Result;
use national_grid_sim::{config, runner, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "config/default.toml".into());
    let cfg = Config::load_from(&path)?;
    init_tracing(&cfg.logging);

    if cfg.run.dev_mode {
        warn!("Dev mode enabled - budget is pinned and the run is not leaderboard eligible");
    }
    info!(
        config = %path,
        map = %cfg.runner.map_path.display(),
        frame_millis = cfg.runner.frame_millis,
        "starting grid simulation"
    );

    let report = runner::run(&cfg).await?;

    info!(
        stop_reason = ?report.stop_reason,
        runtime_seconds = report.runtime_seconds,
        suspend = %report.suspend_path.display(),
        "shutdown complete"
    );
    Ok(())
}
