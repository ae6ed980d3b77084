use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::{CustomOptions, RunConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub runner: RunnerConfig,
    pub run: RunSelection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    pub map_path: PathBuf,
    /// PNG raster classified into water, snow and land
    #[serde(default)]
    pub terrain_path: Option<PathBuf>,
    /// Wall-clock interval between frames
    pub frame_millis: u64,
    /// Stop after this many simulated seconds; zero runs until the run ends
    #[serde(default)]
    pub max_duration_seconds: f64,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Resume from this suspend document instead of starting fresh
    #[serde(default)]
    pub resume_from: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    #[default]
    Standard,
    Campaign,
    Custom,
    Tutorial,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunSelection {
    #[serde(default)]
    pub kind: RunKind,
    /// Standard preset id
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Campaign mission id
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub custom: CustomOptions,
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_preset() -> String {
    "balanced".into()
}

impl RunSelection {
    pub fn build(&self) -> Result<RunConfig> {
        let config = match self.kind {
            RunKind::Standard => RunConfig::standard(&self.preset),
            RunKind::Campaign => RunConfig::campaign(self.mission.as_deref().unwrap_or_default()),
            RunKind::Custom => RunConfig::custom(&self.custom).context("invalid custom run options")?,
            RunKind::Tutorial => RunConfig::tutorial(),
        };
        Ok(config.with_dev_mode(self.dev_mode))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("GRIDSIM__").split("__"));
        figment
            .extract()
            .with_context(|| format!("loading config from {}", path.as_ref().display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const DEFAULT_TOML: &str = r#"
        [runner]
        map_path = "assets/maps/national_core.map.json"
        frame_millis = 100
        output_dir = "out"

        [run]
        kind = "standard"
        preset = "boom"
    "#;

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("grid.toml", DEFAULT_TOML)?;
            jail.set_env("GRIDSIM__RUNNER__SEED", "42");
            jail.set_env("GRIDSIM__RUN__DEV_MODE", "true");
            let config = Config::load_from("grid.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.runner.seed, Some(42));
            assert_eq!(config.runner.max_duration_seconds, 0.0);
            assert_eq!(config.logging.filter, "info");

            let run = config.run.build().map_err(|e| e.to_string())?;
            assert!(run.dev_mode);
            assert_eq!(run.label, "Standard Run (Population Boom)");
            Ok(())
        });
    }

    #[test]
    fn test_tutorial_selection() {
        let selection = RunSelection {
            kind: RunKind::Tutorial,
            preset: default_preset(),
            mission: None,
            custom: CustomOptions::default(),
            dev_mode: false,
        };
        assert!(selection.build().unwrap().is_tutorial());
    }
}
