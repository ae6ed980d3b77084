//! # Run Configuration
//!
//! Immutable parameters of a single run: difficulty knobs, profile choices,
//! the optional campaign mission, and per-asset economic rules.
//!
//! Four builders exist, one per game mode:
//! - [`RunConfig::standard`] from a named preset
//! - [`RunConfig::campaign`] from a mission, deriving knobs from its difficulty
//!   and map scale
//! - [`RunConfig::custom`] from validated player options
//! - [`RunConfig::tutorial`] with fixed forgiving values
//!
//! [`RunConfig::apply_defaults`] normalizes any config (including ones read
//! back from a snapshot) before the engine uses it.

use super::types::AssetType;
use crate::error::SimError;
use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Standard,
    Campaign,
    Custom,
    Tutorial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeasonalProfile {
    #[default]
    Neutral,
    Mixed,
    WinterPeak,
    SummerPeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergenceMode {
    Off,
    #[serde(alias = "limited")]
    Low,
    #[default]
    Normal,
    High,
}

impl EmergenceMode {
    /// Explicit choice, else `normal` with population growth and `low` without
    pub fn resolve(requested: Option<EmergenceMode>, population_enabled: bool) -> Self {
        requested.unwrap_or(if population_enabled {
            EmergenceMode::Normal
        } else {
            EmergenceMode::Low
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadiusProfile {
    Tight,
    #[default]
    Standard,
    Wide,
}

impl RadiusProfile {
    /// Substation coverage radius in world units
    pub fn radius(&self) -> f64 {
        match self {
            RadiusProfile::Tight => 245.0,
            RadiusProfile::Standard => 300.0,
            RadiusProfile::Wide => 370.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceProfile {
    Low,
    #[default]
    Standard,
    High,
}

impl MaintenanceProfile {
    pub fn multiplier(&self) -> f64 {
        match self {
            MaintenanceProfile::Low => 0.82,
            MaintenanceProfile::Standard => 1.0,
            MaintenanceProfile::High => 1.24,
        }
    }
}

/// Three-step intensity knob used for climate and event settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Low,
    #[default]
    Normal,
    High,
}

impl IntensityLevel {
    pub fn climate_multiplier(&self) -> f64 {
        match self {
            IntensityLevel::Low => 0.82,
            IntensityLevel::Normal => 1.0,
            IntensityLevel::High => 1.25,
        }
    }

    pub fn event_multiplier(&self) -> f64 {
        match self {
            IntensityLevel::Low => 0.75,
            IntensityLevel::Normal => 1.0,
            IntensityLevel::High => 1.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Lenient,
    #[default]
    Normal,
    Strict,
}

impl Strictness {
    pub fn multiplier(&self) -> f64 {
        match self {
            Strictness::Lenient => 0.84,
            Strictness::Normal => 1.0,
            Strictness::Strict => 1.22,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationMode {
    Off,
    #[default]
    Normal,
    High,
}

impl PopulationMode {
    /// (enabled, growth strength)
    pub fn growth(&self) -> (bool, f64) {
        match self {
            PopulationMode::Off => (false, 0.0),
            PopulationMode::Normal => (true, 1.0),
            PopulationMode::High => (true, 1.45),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MapScale {
    Small,
    #[default]
    Medium,
    Large,
}

// ============================================================================
// Asset rules
// ============================================================================

/// Economic parameters of one asset type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRule {
    pub label: &'static str,
    /// Base build cost before terrain and incident factors
    pub cost: f64,
    /// MW per unit; zero for non-generating assets
    pub generation: f64,
    /// Budget per second per unit
    pub operating_cost: f64,
    /// Reliability target bonus per unit
    pub reliability_bonus: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssetRules {
    pub plant: AssetRule,
    pub substation: AssetRule,
    pub storage: AssetRule,
}

impl Default for AssetRules {
    fn default() -> Self {
        Self {
            plant: AssetRule {
                label: "Plant",
                cost: 180.0,
                generation: 42.0,
                operating_cost: 0.42,
                reliability_bonus: 4.0,
            },
            substation: AssetRule {
                label: "Substation",
                cost: 120.0,
                generation: 0.0,
                operating_cost: 0.18,
                reliability_bonus: 3.0,
            },
            storage: AssetRule {
                label: "Storage",
                cost: 150.0,
                generation: 0.0,
                operating_cost: 0.14,
                reliability_bonus: 5.0,
            },
        }
    }
}

impl AssetRules {
    pub fn get(&self, asset: AssetType) -> &AssetRule {
        match asset {
            AssetType::Plant => &self.plant,
            AssetType::Substation => &self.substation,
            AssetType::Storage => &self.storage,
        }
    }
}

// ============================================================================
// Presets & missions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionObjective {
    pub target_duration_sec: f64,
    pub reliability_floor: f64,
    pub required_stable_towns: usize,
    #[serde(default)]
    pub budget_floor: Option<f64>,
    #[serde(default)]
    pub max_lawsuits: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    pub codename: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub map_scale: MapScale,
    pub seasonal: bool,
    pub population_mode: PopulationMode,
    #[serde(default)]
    pub town_emergence_mode: Option<EmergenceMode>,
    pub starting_budget: f64,
    pub objective: MissionObjective,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandardPreset {
    pub id: &'static str,
    pub label: &'static str,
    pub budget: f64,
    pub demand_growth: f64,
    pub event_intensity: IntensityLevel,
    pub seasonal: SeasonalProfile,
    pub climate: IntensityLevel,
    pub infra_cost: f64,
    pub strictness: Strictness,
    pub population: PopulationMode,
    pub radius: RadiusProfile,
    pub maintenance: MaintenanceProfile,
    pub emergence: Option<EmergenceMode>,
    pub leaderboard_eligible: bool,
}

pub fn standard_presets() -> Vec<StandardPreset> {
    vec![
        StandardPreset {
            id: "balanced",
            label: "Balanced",
            budget: 1800.0,
            demand_growth: 1.0,
            event_intensity: IntensityLevel::Normal,
            seasonal: SeasonalProfile::Mixed,
            climate: IntensityLevel::Normal,
            infra_cost: 1.0,
            strictness: Strictness::Normal,
            population: PopulationMode::Normal,
            radius: RadiusProfile::Standard,
            maintenance: MaintenanceProfile::Standard,
            emergence: None,
            leaderboard_eligible: true,
        },
        StandardPreset {
            id: "boom",
            label: "Population Boom",
            budget: 2200.0,
            demand_growth: 1.2,
            event_intensity: IntensityLevel::Normal,
            seasonal: SeasonalProfile::SummerPeak,
            climate: IntensityLevel::High,
            infra_cost: 1.05,
            strictness: Strictness::Normal,
            population: PopulationMode::High,
            radius: RadiusProfile::Standard,
            maintenance: MaintenanceProfile::Standard,
            emergence: Some(EmergenceMode::High),
            leaderboard_eligible: true,
        },
        StandardPreset {
            id: "austerity",
            label: "Austerity",
            budget: 1200.0,
            demand_growth: 0.95,
            event_intensity: IntensityLevel::High,
            seasonal: SeasonalProfile::WinterPeak,
            climate: IntensityLevel::Normal,
            infra_cost: 1.15,
            strictness: Strictness::Strict,
            population: PopulationMode::Normal,
            radius: RadiusProfile::Tight,
            maintenance: MaintenanceProfile::High,
            emergence: Some(EmergenceMode::Low),
            leaderboard_eligible: false,
        },
    ]
}

pub fn campaign_missions() -> Vec<Mission> {
    vec![
        Mission {
            id: "first-light".into(),
            codename: "First Light".into(),
            description: "Energize the capital region and keep the first settlements online.".into(),
            difficulty: Difficulty::Easy,
            map_scale: MapScale::Small,
            seasonal: false,
            population_mode: PopulationMode::Normal,
            town_emergence_mode: Some(EmergenceMode::Low),
            starting_budget: 2400.0,
            objective: MissionObjective {
                target_duration_sec: 480.0,
                reliability_floor: 60.0,
                required_stable_towns: 3,
                budget_floor: None,
                max_lawsuits: None,
            },
        },
        Mission {
            id: "northern-reach".into(),
            codename: "Northern Reach".into(),
            description: "Extend service north through seasonal swings without draining the treasury.".into(),
            difficulty: Difficulty::Normal,
            map_scale: MapScale::Medium,
            seasonal: true,
            population_mode: PopulationMode::Normal,
            town_emergence_mode: None,
            starting_budget: 2000.0,
            objective: MissionObjective {
                target_duration_sec: 720.0,
                reliability_floor: 66.0,
                required_stable_towns: 5,
                budget_floor: Some(400.0),
                max_lawsuits: Some(2),
            },
        },
        Mission {
            id: "iron-winter".into(),
            codename: "Iron Winter".into(),
            description: "Hold a sprawling national grid together through a hard winter cycle.".into(),
            difficulty: Difficulty::Hard,
            map_scale: MapScale::Large,
            seasonal: true,
            population_mode: PopulationMode::High,
            town_emergence_mode: Some(EmergenceMode::High),
            starting_budget: 1800.0,
            objective: MissionObjective {
                target_duration_sec: 900.0,
                reliability_floor: 70.0,
                required_stable_towns: 7,
                budget_floor: Some(0.0),
                max_lawsuits: Some(1),
            },
        },
    ]
}

/// Player-chosen options for a custom game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomOptions {
    #[validate(range(min = 200.0, max = 100000.0))]
    pub budget: f64,
    #[validate(range(min = 0.25, max = 3.0))]
    pub demand_growth_multiplier: f64,
    pub event_intensity: IntensityLevel,
    pub seasonal_profile: SeasonalProfile,
    pub population_mode: PopulationMode,
    pub climate_intensity: IntensityLevel,
    pub town_emergence_intensity: Option<EmergenceMode>,
    pub substation_radius_profile: RadiusProfile,
    pub line_maintenance_profile: MaintenanceProfile,
    #[validate(range(min = 0.25, max = 3.0))]
    pub infra_cost_multiplier: f64,
    pub failure_strictness: Strictness,
    /// Zero disables the run target
    #[validate(range(min = 0, max = 240))]
    pub run_target_minutes: u32,
}

impl Default for CustomOptions {
    fn default() -> Self {
        Self {
            budget: 1800.0,
            demand_growth_multiplier: 1.0,
            event_intensity: IntensityLevel::Normal,
            seasonal_profile: SeasonalProfile::Mixed,
            population_mode: PopulationMode::Normal,
            climate_intensity: IntensityLevel::Normal,
            town_emergence_intensity: None,
            substation_radius_profile: RadiusProfile::Standard,
            line_maintenance_profile: MaintenanceProfile::Standard,
            infra_cost_multiplier: 1.0,
            failure_strictness: Strictness::Normal,
            run_target_minutes: 15,
        }
    }
}

// ============================================================================
// Run config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub mode: RunMode,
    pub label: String,
    pub demand_growth_multiplier: f64,
    pub event_intensity: f64,
    pub seasonal_profile: SeasonalProfile,
    pub climate_intensity: f64,
    pub infra_cost_multiplier: f64,
    pub failure_strictness: f64,
    pub population_enabled: bool,
    pub population_strength: f64,
    pub substation_radius_profile: RadiusProfile,
    pub substation_radius: f64,
    pub line_maintenance_profile: MaintenanceProfile,
    pub line_maintenance_multiplier: f64,
    pub starting_budget: f64,
    /// Zero means the run has no target
    pub run_target_sec: f64,
    pub mission: Option<Mission>,
    pub sparse_start: bool,
    pub town_emergence_mode: EmergenceMode,
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default)]
    pub leaderboard_eligible: bool,
    #[serde(skip)]
    pub asset_rules: AssetRules,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::standard("balanced")
    }
}

impl RunConfig {
    /// Config from a standard preset; unknown ids fall back to the first preset
    pub fn standard(preset_id: &str) -> Self {
        let presets = standard_presets();
        let preset = presets
            .iter()
            .find(|p| p.id == preset_id)
            .unwrap_or(&presets[0]);
        let (population_enabled, population_strength) = preset.population.growth();
        let mut config = Self {
            mode: RunMode::Standard,
            label: format!("Standard Run ({})", preset.label),
            demand_growth_multiplier: preset.demand_growth,
            event_intensity: preset.event_intensity.event_multiplier(),
            seasonal_profile: preset.seasonal,
            climate_intensity: preset.climate.climate_multiplier(),
            infra_cost_multiplier: preset.infra_cost,
            failure_strictness: preset.strictness.multiplier(),
            population_enabled,
            population_strength,
            substation_radius_profile: preset.radius,
            substation_radius: preset.radius.radius(),
            line_maintenance_profile: preset.maintenance,
            line_maintenance_multiplier: preset.maintenance.multiplier(),
            starting_budget: preset.budget,
            run_target_sec: 0.0,
            mission: None,
            sparse_start: true,
            town_emergence_mode: EmergenceMode::resolve(preset.emergence, population_enabled),
            dev_mode: false,
            leaderboard_eligible: preset.leaderboard_eligible,
            asset_rules: AssetRules::default(),
        };
        config.apply_defaults();
        config
    }

    /// Config from a campaign mission; unknown ids fall back to the first mission
    pub fn campaign(mission_id: &str) -> Self {
        let missions = campaign_missions();
        let mission = missions
            .iter()
            .find(|m| m.id == mission_id)
            .unwrap_or(&missions[0])
            .clone();
        let (population_enabled, population_strength) = mission.population_mode.growth();
        let pick = |easy: f64, normal: f64, hard: f64, expert: f64| match mission.difficulty {
            Difficulty::Easy => easy,
            Difficulty::Normal => normal,
            Difficulty::Hard => hard,
            Difficulty::Expert => expert,
        };
        let radius = match mission.map_scale {
            MapScale::Large => RadiusProfile::Tight,
            MapScale::Small => RadiusProfile::Wide,
            MapScale::Medium => RadiusProfile::Standard,
        };
        let maintenance = match mission.difficulty {
            Difficulty::Expert | Difficulty::Hard => MaintenanceProfile::High,
            Difficulty::Easy => MaintenanceProfile::Low,
            Difficulty::Normal => MaintenanceProfile::Standard,
        };
        let mut config = Self {
            mode: RunMode::Campaign,
            label: format!("Campaign Mission: {}", mission.codename),
            demand_growth_multiplier: pick(0.92, 1.0, 1.15, 1.28),
            event_intensity: pick(0.85, 1.0, 1.2, 1.35),
            seasonal_profile: if mission.seasonal {
                SeasonalProfile::Mixed
            } else {
                SeasonalProfile::Neutral
            },
            climate_intensity: if mission.seasonal { 1.05 } else { 1.0 },
            infra_cost_multiplier: pick(0.95, 1.0, 1.12, 1.18),
            failure_strictness: pick(0.9, 1.0, 1.14, 1.25),
            population_enabled,
            population_strength,
            substation_radius_profile: radius,
            substation_radius: radius.radius(),
            line_maintenance_profile: maintenance,
            line_maintenance_multiplier: maintenance.multiplier(),
            starting_budget: mission.starting_budget,
            run_target_sec: mission.objective.target_duration_sec,
            town_emergence_mode: EmergenceMode::resolve(mission.town_emergence_mode, population_enabled),
            mission: Some(mission),
            sparse_start: false,
            dev_mode: false,
            leaderboard_eligible: true,
            asset_rules: AssetRules::default(),
        };
        config.apply_defaults();
        config
    }

    /// Config from custom options after range validation
    pub fn custom(options: &CustomOptions) -> Result<Self, SimError> {
        options.validate()?;
        let (population_enabled, population_strength) = options.population_mode.growth();
        let mut config = Self {
            mode: RunMode::Custom,
            label: "Custom Game".into(),
            demand_growth_multiplier: options.demand_growth_multiplier,
            event_intensity: options.event_intensity.event_multiplier(),
            seasonal_profile: options.seasonal_profile,
            climate_intensity: options.climate_intensity.climate_multiplier(),
            infra_cost_multiplier: options.infra_cost_multiplier,
            failure_strictness: options.failure_strictness.multiplier(),
            population_enabled,
            population_strength,
            substation_radius_profile: options.substation_radius_profile,
            substation_radius: options.substation_radius_profile.radius(),
            line_maintenance_profile: options.line_maintenance_profile,
            line_maintenance_multiplier: options.line_maintenance_profile.multiplier(),
            starting_budget: options.budget,
            run_target_sec: options.run_target_minutes as f64 * 60.0,
            mission: None,
            sparse_start: true,
            town_emergence_mode: EmergenceMode::resolve(options.town_emergence_intensity, population_enabled),
            dev_mode: false,
            leaderboard_eligible: false,
            asset_rules: AssetRules::default(),
        };
        config.apply_defaults();
        Ok(config)
    }

    pub fn tutorial() -> Self {
        let mut config = Self {
            mode: RunMode::Tutorial,
            label: "Tutorial".into(),
            demand_growth_multiplier: 0.72,
            event_intensity: 0.35,
            seasonal_profile: SeasonalProfile::Neutral,
            climate_intensity: 0.8,
            infra_cost_multiplier: 0.86,
            failure_strictness: 0.65,
            population_enabled: false,
            population_strength: 0.0,
            substation_radius_profile: RadiusProfile::Wide,
            substation_radius: RadiusProfile::Wide.radius(),
            line_maintenance_profile: MaintenanceProfile::Low,
            line_maintenance_multiplier: MaintenanceProfile::Low.multiplier(),
            starting_budget: 5000.0,
            run_target_sec: 0.0,
            mission: None,
            sparse_start: true,
            town_emergence_mode: EmergenceMode::Off,
            dev_mode: false,
            leaderboard_eligible: false,
            asset_rules: AssetRules::default(),
        };
        config.apply_defaults();
        config
    }

    /// Builder-style dev mode toggle
    pub fn with_dev_mode(mut self, enabled: bool) -> Self {
        self.dev_mode = enabled;
        self
    }

    pub fn is_tutorial(&self) -> bool {
        self.mode == RunMode::Tutorial
    }

    pub fn is_campaign(&self) -> bool {
        self.mode == RunMode::Campaign
    }

    /// Normalize derived fields and enforce the tutorial envelope
    pub fn apply_defaults(&mut self) {
        self.substation_radius = self.substation_radius_profile.radius();
        if !(self.line_maintenance_multiplier.is_finite() && self.line_maintenance_multiplier > 0.0) {
            self.line_maintenance_multiplier = self.line_maintenance_profile.multiplier();
        }
        if !self.population_enabled {
            self.population_strength = 0.0;
        }
        if self.is_tutorial() {
            self.population_enabled = false;
            self.population_strength = 0.0;
            self.seasonal_profile = SeasonalProfile::Neutral;
            self.town_emergence_mode = EmergenceMode::Low;
            let requested = if self.event_intensity > 0.0 {
                self.event_intensity
            } else {
                0.35
            };
            self.event_intensity = requested.min(0.35);
            self.starting_budget = self.starting_budget.max(5000.0);
            self.leaderboard_eligible = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("first-light", RadiusProfile::Wide, MaintenanceProfile::Low, 0.92)]
    #[case("northern-reach", RadiusProfile::Standard, MaintenanceProfile::Standard, 1.0)]
    #[case("iron-winter", RadiusProfile::Tight, MaintenanceProfile::High, 1.15)]
    fn test_campaign_knobs_follow_mission(
        #[case] id: &str,
        #[case] radius: RadiusProfile,
        #[case] maintenance: MaintenanceProfile,
        #[case] growth: f64,
    ) {
        let config = RunConfig::campaign(id);
        assert_eq!(config.mode, RunMode::Campaign);
        assert_eq!(config.substation_radius_profile, radius);
        assert_eq!(config.substation_radius, radius.radius());
        assert_eq!(config.line_maintenance_profile, maintenance);
        assert_eq!(config.demand_growth_multiplier, growth);
        assert!(!config.sparse_start);
        let mission = config.mission.as_ref().unwrap();
        assert_eq!(config.run_target_sec, mission.objective.target_duration_sec);
    }

    #[test]
    fn test_seasonal_mission_uses_mixed_profile() {
        let config = RunConfig::campaign("northern-reach");
        assert_eq!(config.seasonal_profile, SeasonalProfile::Mixed);
        assert_eq!(config.climate_intensity, 1.05);
        let calm = RunConfig::campaign("first-light");
        assert_eq!(calm.seasonal_profile, SeasonalProfile::Neutral);
    }

    #[test]
    fn test_tutorial_envelope() {
        let config = RunConfig::tutorial();
        assert_eq!(config.town_emergence_mode, EmergenceMode::Low);
        assert!(config.event_intensity <= 0.35);
        assert!(!config.population_enabled);
        assert_eq!(config.starting_budget, 5000.0);
        assert_eq!(config.substation_radius, 370.0);
        assert_eq!(config.line_maintenance_multiplier, 0.82);
    }

    #[test]
    fn test_custom_options_are_validated() {
        let options = CustomOptions {
            budget: -5.0,
            ..Default::default()
        };
        assert!(matches!(RunConfig::custom(&options), Err(SimError::Config(_))));

        let options = CustomOptions {
            run_target_minutes: 10,
            population_mode: PopulationMode::Off,
            failure_strictness: Strictness::Lenient,
            ..Default::default()
        };
        let config = RunConfig::custom(&options).unwrap();
        assert_eq!(config.run_target_sec, 600.0);
        assert_eq!(config.town_emergence_mode, EmergenceMode::Low);
        assert_eq!(config.failure_strictness, 0.84);
        assert!(config.sparse_start);
    }

    #[test]
    fn test_unknown_preset_falls_back() {
        let config = RunConfig::standard("does-not-exist");
        assert_eq!(config.label, "Standard Run (Balanced)");
        assert_eq!(config.town_emergence_mode, EmergenceMode::Normal);
    }

    #[test]
    fn test_emergence_label_aliases() {
        let mode: EmergenceMode = serde_json::from_str("\"limited\"").unwrap();
        assert_eq!(mode, EmergenceMode::Low);
        assert_eq!(EmergenceMode::resolve(None, false), EmergenceMode::Low);
        assert_eq!(EmergenceMode::resolve(Some(EmergenceMode::Off), true), EmergenceMode::Off);
    }
}
