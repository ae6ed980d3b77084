use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, IntoEnumIterator};

// ============================================================================
// Geometry
// ============================================================================

/// Point in map world units (origin top-left, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Round to a fixed number of decimals for text output
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============================================================================
// Assets
// ============================================================================

/// Asset kinds an infrastructure node can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Plant,
    Substation,
    Storage,
}

impl AssetType {
    /// Slot order used for occupancy coercion and demolition fallback
    pub fn ordered() -> impl Iterator<Item = AssetType> {
        AssetType::iter()
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plant" => Ok(AssetType::Plant),
            "substation" => Ok(AssetType::Substation),
            "storage" | "battery" => Ok(AssetType::Storage),
            _ => Err(format!("Unknown asset type: {}", s)),
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Plant => write!(f, "plant"),
            AssetType::Substation => write!(f, "substation"),
            AssetType::Storage => write!(f, "storage"),
        }
    }
}

/// Energy resource carried by resource zones and used as plant type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Wind,
    Sun,
    NaturalGas,
}

impl ResourceKind {
    /// Label shown when a plant of this type is demolished
    pub fn plant_label(&self) -> &'static str {
        match self {
            ResourceKind::Wind => "Wind Powerplant",
            ResourceKind::Sun => "Solar Powerplant",
            ResourceKind::NaturalGas => "Natural Gas Powerplant",
        }
    }

    /// Next plant type in the build cycle
    pub fn next(&self) -> Self {
        match self {
            ResourceKind::Wind => ResourceKind::Sun,
            ResourceKind::Sun => ResourceKind::NaturalGas,
            ResourceKind::NaturalGas => ResourceKind::Wind,
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wind" => Ok(ResourceKind::Wind),
            "sun" => Ok(ResourceKind::Sun),
            "natural_gas" => Ok(ResourceKind::NaturalGas),
            _ => Err(format!("Unknown resource: {}", s)),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Wind => write!(f, "wind"),
            ResourceKind::Sun => write!(f, "sun"),
            ResourceKind::NaturalGas => write!(f, "natural_gas"),
        }
    }
}

/// Resource-zone weights (0-1 each) for a map position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceProfile {
    pub wind: f64,
    pub sun: f64,
    #[serde(alias = "naturalGas")]
    pub natural_gas: f64,
}

impl ResourceProfile {
    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Wind => self.wind,
            ResourceKind::Sun => self.sun,
            ResourceKind::NaturalGas => self.natural_gas,
        }
    }

    /// Add zone coverage to one resource, saturating at 1
    pub fn add(&mut self, kind: ResourceKind, weight: f64) {
        let slot = match kind {
            ResourceKind::Wind => &mut self.wind,
            ResourceKind::Sun => &mut self.sun,
            ResourceKind::NaturalGas => &mut self.natural_gas,
        };
        *slot = clamp(*slot + weight, 0.0, 1.0);
    }

    /// Strongest resource; ties resolve to the earlier kind
    pub fn dominant(&self) -> ResourceKind {
        let mut best = ResourceKind::default();
        let mut best_value = f64::NEG_INFINITY;
        for kind in ResourceKind::iter() {
            let value = self.get(kind);
            if value > best_value {
                best_value = value;
                best = kind;
            }
        }
        best
    }

    /// Plant output boost in [1, 1.5]
    pub fn plant_boost(&self) -> f64 {
        clamp(
            1.0 + self.wind * 0.16 + self.sun * 0.14 + self.natural_gas * 0.2,
            1.0,
            1.5,
        )
    }

    /// Plant operating-cost discount in [0.72, 1]
    pub fn plant_operating_factor(&self) -> f64 {
        clamp(
            1.0 - self.natural_gas * 0.12 - self.wind * 0.05 - self.sun * 0.04,
            0.72,
            1.0,
        )
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Allocation priority of a town or asset node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    /// Served first during allocation
    Elevated,
    #[default]
    Nominal,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "elevated" | "high" => Ok(Priority::Elevated),
            "nominal" | "normal" | "low" => Ok(Priority::Nominal),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

impl From<String> for Priority {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl From<Priority> for String {
    fn from(value: Priority) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Elevated => write!(f, "elevated"),
            Priority::Nominal => write!(f, "nominal"),
        }
    }
}

// ============================================================================
// Terrain & Climate
// ============================================================================

/// Terrain classification of a map location
///
/// Unknown labels from map documents are preserved as [`Terrain::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Terrain {
    #[default]
    Plains,
    River,
    Coast,
    Forest,
    Hills,
    Mountain,
    Desert,
    Tundra,
    Wetland,
    Other(String),
}

impl Terrain {
    /// Build-cost factor applied to assets and line endpoints
    pub fn cost_multiplier(&self) -> f64 {
        match self {
            Terrain::Plains => 1.0,
            Terrain::River => 1.08,
            Terrain::Coast => 1.12,
            Terrain::Forest => 1.15,
            Terrain::Hills => 1.22,
            Terrain::Mountain => 1.35,
            Terrain::Desert => 1.1,
            Terrain::Tundra => 1.3,
            Terrain::Wetland => 1.25,
            Terrain::Other(_) => 1.0,
        }
    }

    /// Whether new towns may appear on this terrain
    pub fn is_livable(&self) -> bool {
        matches!(self, Terrain::Plains | Terrain::River | Terrain::Coast)
    }

    /// Settlement attractiveness used by town emergence
    pub fn fertility(&self) -> f64 {
        match self {
            Terrain::Plains => 1.35,
            Terrain::River => 1.28,
            Terrain::Coast => 1.04,
            _ => 0.85,
        }
    }
}

impl From<&str> for Terrain {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "plains" => Terrain::Plains,
            "river" => Terrain::River,
            "coast" => Terrain::Coast,
            "forest" => Terrain::Forest,
            "hills" => Terrain::Hills,
            "mountain" => Terrain::Mountain,
            "desert" => Terrain::Desert,
            "tundra" => Terrain::Tundra,
            "wetland" => Terrain::Wetland,
            "" => Terrain::Plains,
            other => Terrain::Other(other.to_string()),
        }
    }
}

impl From<String> for Terrain {
    fn from(value: String) -> Self {
        Terrain::from(value.as_str())
    }
}

impl From<Terrain> for String {
    fn from(value: Terrain) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Terrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terrain::Plains => write!(f, "plains"),
            Terrain::River => write!(f, "river"),
            Terrain::Coast => write!(f, "coast"),
            Terrain::Forest => write!(f, "forest"),
            Terrain::Hills => write!(f, "hills"),
            Terrain::Mountain => write!(f, "mountain"),
            Terrain::Desert => write!(f, "desert"),
            Terrain::Tundra => write!(f, "tundra"),
            Terrain::Wetland => write!(f, "wetland"),
            Terrain::Other(label) => write!(f, "{}", label),
        }
    }
}

/// Climate classification of a map location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Climate {
    #[default]
    Temperate,
    Warm,
    Cold,
    Arid,
    Other(String),
}

impl From<&str> for Climate {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "temperate" | "" => Climate::Temperate,
            "warm" => Climate::Warm,
            "cold" => Climate::Cold,
            "arid" => Climate::Arid,
            other => Climate::Other(other.to_string()),
        }
    }
}

impl From<String> for Climate {
    fn from(value: String) -> Self {
        Climate::from(value.as_str())
    }
}

impl From<Climate> for String {
    fn from(value: Climate) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Climate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Climate::Temperate => write!(f, "temperate"),
            Climate::Warm => write!(f, "warm"),
            Climate::Cold => write!(f, "cold"),
            Climate::Arid => write!(f, "arid"),
            Climate::Other(label) => write!(f, "{}", label),
        }
    }
}

// ============================================================================
// Seasons
// ============================================================================

/// Season label driving climate demand multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    #[default]
    Neutral,
    Spring,
    Summer,
    Autumn,
    Winter,
}

/// Rotation order for non-neutral seasonal profiles
pub const SEASON_ORDER: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

impl Season {
    /// Raw demand multiplier for a climate in this season (before intensity scaling)
    pub fn climate_multiplier(&self, climate: &Climate) -> f64 {
        match (self, climate) {
            (Season::Neutral, _) => 1.0,
            (Season::Spring, Climate::Warm) => 1.04,
            (Season::Spring, Climate::Cold) => 1.06,
            (Season::Spring, Climate::Arid) => 1.05,
            (Season::Summer, Climate::Temperate) => 1.08,
            (Season::Summer, Climate::Warm) => 1.28,
            (Season::Summer, Climate::Cold) => 0.96,
            (Season::Summer, Climate::Arid) => 1.22,
            (Season::Autumn, Climate::Temperate) => 1.02,
            (Season::Autumn, Climate::Warm) => 1.06,
            (Season::Autumn, Climate::Cold) => 1.1,
            (Season::Winter, Climate::Temperate) => 1.14,
            (Season::Winter, Climate::Warm) => 0.98,
            (Season::Winter, Climate::Cold) => 1.3,
            (Season::Winter, Climate::Arid) => 1.04,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Season::Neutral => write!(f, "neutral"),
            Season::Spring => write!(f, "spring"),
            Season::Summer => write!(f, "summer"),
            Season::Autumn => write!(f, "autumn"),
            Season::Winter => write!(f, "winter"),
        }
    }
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Advisory,
    Warning,
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_accepts_legacy_labels() {
        assert_eq!(Priority::from("high".to_string()), Priority::Elevated);
        assert_eq!(Priority::from("low".to_string()), Priority::Nominal);
        assert_eq!(Priority::from("normal".to_string()), Priority::Nominal);
        assert_eq!(Priority::from("garbage".to_string()), Priority::Nominal);
        assert!(Priority::Elevated < Priority::Nominal, "elevated sorts first");
    }

    #[test]
    fn test_priority_serde_roundtrip_uses_canonical_label() {
        let json = serde_json::to_string(&Priority::Elevated).unwrap();
        assert_eq!(json, "\"elevated\"");
        let parsed: Priority = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(parsed, Priority::Elevated);
    }

    #[test]
    fn test_unknown_terrain_is_preserved() {
        let terrain = Terrain::from("glacier");
        assert_eq!(terrain, Terrain::Other("glacier".to_string()));
        assert_eq!(terrain.to_string(), "glacier");
        assert_eq!(terrain.cost_multiplier(), 1.0);
        assert!(!terrain.is_livable());
    }

    #[test]
    fn test_resource_profile_boost_is_clamped() {
        let profile = ResourceProfile {
            wind: 1.0,
            sun: 1.0,
            natural_gas: 1.0,
        };
        assert_eq!(profile.plant_boost(), 1.5);
        assert_eq!(ResourceProfile::default().plant_boost(), 1.0);
        assert!((profile.plant_operating_factor() - 0.79).abs() < 1e-9);
    }

    #[test]
    fn test_dominant_resource_prefers_first_on_tie() {
        let profile = ResourceProfile {
            wind: 0.4,
            sun: 0.4,
            natural_gas: 0.1,
        };
        assert_eq!(profile.dominant(), ResourceKind::Wind);
        let gas = ResourceProfile {
            natural_gas: 0.7,
            ..Default::default()
        };
        assert_eq!(gas.dominant(), ResourceKind::NaturalGas);
    }

    #[test]
    fn test_resource_add_saturates() {
        let mut profile = ResourceProfile::default();
        profile.add(ResourceKind::Sun, 0.8);
        profile.add(ResourceKind::Sun, 0.8);
        assert_eq!(profile.sun, 1.0);
    }

    #[test]
    fn test_season_multipliers() {
        assert_eq!(Season::Neutral.climate_multiplier(&Climate::Cold), 1.0);
        assert_eq!(Season::Winter.climate_multiplier(&Climate::Cold), 1.3);
        assert_eq!(Season::Summer.climate_multiplier(&Climate::Warm), 1.28);
        assert_eq!(
            Season::Winter.climate_multiplier(&Climate::Other("alpine".into())),
            1.0
        );
    }

    #[test]
    fn test_asset_type_parsing() {
        assert_eq!("battery".parse::<AssetType>().unwrap(), AssetType::Storage);
        assert!("tower".parse::<AssetType>().is_err());
        let order: Vec<_> = AssetType::ordered().collect();
        assert_eq!(order, vec![AssetType::Plant, AssetType::Substation, AssetType::Storage]);
    }
}
