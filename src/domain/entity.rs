//! # Map Entities
//!
//! A map entity is either a demand-only [`TownState`] or a player-placed
//! infrastructure [`NodeState`]. Shared placement fields live on [`Entity`];
//! variant fields live on the matching [`EntityKind`] arm and serialize under
//! an `entityType` discriminator.

use super::map::MapTown;
use super::types::{AssetType, Climate, Point, Priority, ResourceKind, ResourceProfile, Terrain};
use serde::{Deserialize, Serialize};

/// Radius of a player-placed infrastructure node
pub const INFRASTRUCTURE_NODE_RADIUS: f64 = 22.0;

/// Pick radius around any map object
pub const INTERACTION_RADIUS: f64 = 24.0;

/// Asset unit counts per slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetCounts {
    pub plant: u32,
    pub substation: u32,
    pub storage: u32,
}

impl AssetCounts {
    pub fn get(&self, asset: AssetType) -> u32 {
        match asset {
            AssetType::Plant => self.plant,
            AssetType::Substation => self.substation,
            AssetType::Storage => self.storage,
        }
    }

    pub fn get_mut(&mut self, asset: AssetType) -> &mut u32 {
        match asset {
            AssetType::Plant => &mut self.plant,
            AssetType::Substation => &mut self.substation,
            AssetType::Storage => &mut self.storage,
        }
    }

    pub fn total(&self) -> u32 {
        self.plant + self.substation + self.storage
    }

    /// First populated slot in plant, substation, storage order
    pub fn occupied(&self) -> Option<AssetType> {
        AssetType::ordered().find(|asset| self.get(*asset) > 0)
    }

    /// Number of slots holding at least one unit
    pub fn occupied_slots(&self) -> usize {
        AssetType::ordered().filter(|asset| self.get(*asset) > 0).count()
    }
}

/// Paid build cost of every unit, most recent last
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetLedger {
    pub plant: Vec<u32>,
    pub substation: Vec<u32>,
    pub storage: Vec<u32>,
}

impl AssetLedger {
    pub fn history(&self, asset: AssetType) -> &Vec<u32> {
        match asset {
            AssetType::Plant => &self.plant,
            AssetType::Substation => &self.substation,
            AssetType::Storage => &self.storage,
        }
    }

    pub fn history_mut(&mut self, asset: AssetType) -> &mut Vec<u32> {
        match asset {
            AssetType::Plant => &mut self.plant,
            AssetType::Substation => &mut self.substation,
            AssetType::Storage => &mut self.storage,
        }
    }

    pub fn record(&mut self, asset: AssetType, cost: u32) {
        self.history_mut(asset).push(cost);
    }

    pub fn peek(&self, asset: AssetType) -> Option<u32> {
        self.history(asset).last().copied()
    }

    pub fn pop(&mut self, asset: AssetType) -> Option<u32> {
        self.history_mut(asset).pop()
    }

    /// Drop zero entries and keep at most the newest `counts` entries per slot
    pub fn trim_to(&mut self, counts: &AssetCounts) {
        for asset in AssetType::ordered() {
            let keep = counts.get(asset) as usize;
            let history = self.history_mut(asset);
            history.retain(|cost| *cost > 0);
            if history.len() > keep {
                let excess = history.len() - keep;
                history.drain(..excess);
            }
        }
    }
}

/// Demand-side state of a town
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TownState {
    /// Demand anchor before population, season and volatility factors (MW)
    #[serde(alias = "nominalBaseDemand")]
    pub base_demand: f64,
    pub population: f64,
    /// Population growth per second at strength 1
    pub growth_rate: f64,
    /// Smoothed instantaneous demand (MW)
    pub demand: f64,
    pub target_demand: f64,
    pub served: f64,
    pub unmet: f64,
    /// served / demand, 1 when demand is zero
    pub utilization: f64,
    pub covered_by_substation: bool,
    pub coverage_source_id: Option<String>,
    pub coverage_distance: f64,
    pub stable_service_seconds: f64,
    pub outage_seconds: f64,
    pub strategic_value: String,
}

impl TownState {
    pub fn clear_coverage(&mut self) {
        self.covered_by_substation = false;
        self.coverage_source_id = None;
        self.coverage_distance = 0.0;
    }

    /// Covered with at least the given utilization
    pub fn is_served_at(&self, utilization: f64) -> bool {
        self.covered_by_substation && self.utilization >= utilization
    }
}

/// Supply-side state of a player-placed node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeState {
    pub assets: AssetCounts,
    #[serde(rename = "assetBuildCosts")]
    pub ledger: AssetLedger,
    pub plant_type: ResourceKind,
    #[serde(rename = "storageChargeMWh")]
    pub storage_charge_mwh: f64,
    pub storage_charging_mw: f64,
    /// No new build allowed before this runtime second
    pub cooldown_until: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityType", rename_all = "lowercase")]
pub enum EntityKind {
    Town(TownState),
    Node(NodeState),
}

/// A town or infrastructure node on the live map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub position: Point,
    pub radius: f64,
    #[serde(default)]
    pub terrain: Terrain,
    #[serde(default)]
    pub climate: Climate,
    #[serde(default)]
    pub district_type: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub resource_profile: ResourceProfile,
    #[serde(flatten)]
    pub kind: EntityKind,
}

impl Entity {
    /// Seed a town from a map entry, fully served at its base demand
    pub fn town_from_map(source: &MapTown, resource_profile: ResourceProfile) -> Self {
        let demand = source.base_demand.max(0.0);
        Entity {
            id: source.id.clone(),
            name: source.name.clone(),
            position: source.position,
            radius: source.radius,
            terrain: source.terrain.clone(),
            climate: source.climate.clone(),
            district_type: source.district_type.clone(),
            priority: Priority::Nominal,
            resource_profile,
            kind: EntityKind::Town(TownState {
                base_demand: demand,
                population: source.population,
                growth_rate: source.growth_rate,
                demand,
                target_demand: demand,
                served: demand,
                unmet: 0.0,
                utilization: if demand > 0.0 { 1.0 } else { 0.0 },
                strategic_value: source.strategic_value.clone(),
                ..Default::default()
            }),
        }
    }

    pub fn is_town(&self) -> bool {
        matches!(self.kind, EntityKind::Town(_))
    }

    pub fn town(&self) -> Option<&TownState> {
        match &self.kind {
            EntityKind::Town(town) => Some(town),
            EntityKind::Node(_) => None,
        }
    }

    pub fn town_mut(&mut self) -> Option<&mut TownState> {
        match &mut self.kind {
            EntityKind::Town(town) => Some(town),
            EntityKind::Node(_) => None,
        }
    }

    pub fn node(&self) -> Option<&NodeState> {
        match &self.kind {
            EntityKind::Node(node) => Some(node),
            EntityKind::Town(_) => None,
        }
    }

    pub fn node_mut(&mut self) -> Option<&mut NodeState> {
        match &mut self.kind {
            EntityKind::Node(node) => Some(node),
            EntityKind::Town(_) => None,
        }
    }

    /// Asset counts; towns never host assets
    pub fn assets(&self) -> AssetCounts {
        self.node().map(|node| node.assets).unwrap_or_default()
    }

    pub fn total_assets(&self) -> u32 {
        self.assets().total()
    }

    /// Nodes with at least one asset; towns always count as occupied
    pub fn is_occupied(&self) -> bool {
        self.is_town() || self.total_assets() > 0
    }

    /// Whether a transmission line may terminate here
    pub fn can_host_line(&self) -> bool {
        !self.is_town() && self.total_assets() > 0
    }

    /// Whether the entity takes part in graph traversal
    pub fn is_traversable(&self) -> bool {
        self.is_occupied()
    }

    pub fn has_asset(&self, asset: AssetType) -> bool {
        self.assets().get(asset) > 0
    }

    /// Placement radius used by the build spacing rule
    pub fn placement_radius(&self) -> f64 {
        if self.is_town() {
            INTERACTION_RADIUS
        } else {
            self.radius.max(1.0)
        }
    }

    /// Demand in MW, zero for nodes
    pub fn demand(&self) -> f64 {
        self.town().map(|town| town.demand).unwrap_or(0.0)
    }

    pub fn served(&self) -> f64 {
        self.town().map(|town| town.served).unwrap_or(0.0)
    }

    pub fn unmet(&self) -> f64 {
        self.town().map(|town| town.unmet).unwrap_or(0.0)
    }

    pub fn storage_charge_mwh(&self) -> f64 {
        self.node().map(|node| node.storage_charge_mwh).unwrap_or(0.0)
    }

    /// Label used when demolishing an asset of the given type here
    pub fn demolish_label(&self, asset: AssetType) -> &'static str {
        match asset {
            AssetType::Plant => self
                .node()
                .map(|node| node.plant_type.plant_label())
                .unwrap_or("Powerplant"),
            AssetType::Substation => "Substation",
            AssetType::Storage => "Battery",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with(assets: AssetCounts) -> Entity {
        Entity {
            id: "node-1".to_string(),
            name: "Grid Point 1".to_string(),
            position: Point::new(10.0, 20.0),
            radius: INFRASTRUCTURE_NODE_RADIUS,
            terrain: Terrain::Plains,
            climate: Climate::Temperate,
            district_type: "Rural Cluster".to_string(),
            priority: Priority::Nominal,
            resource_profile: ResourceProfile::default(),
            kind: EntityKind::Node(NodeState {
                assets,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_entity_serializes_with_discriminator() {
        let entity = node_with(AssetCounts {
            substation: 1,
            ..Default::default()
        });
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["entityType"], "node");
        assert_eq!(value["x"], 10.0);
        assert_eq!(value["assets"]["substation"], 1);
        assert!(value.get("assetBuildCosts").is_some());

        let back: Entity = serde_json::from_value(value).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_town_deserializes_from_minimal_record() {
        let json = serde_json::json!({
            "id": "capital",
            "name": "Capital",
            "x": 400.0,
            "y": 300.0,
            "radius": 60.0,
            "entityType": "town",
            "nominalBaseDemand": 52.0,
            "priority": "high"
        });
        let entity: Entity = serde_json::from_value(json).unwrap();
        assert!(entity.is_town());
        assert_eq!(entity.priority, Priority::Elevated);
        assert_eq!(entity.town().unwrap().base_demand, 52.0);
        assert_eq!(entity.total_assets(), 0);
        assert!(!entity.can_host_line());
    }

    #[test]
    fn test_ledger_trim_keeps_newest_entries() {
        let mut ledger = AssetLedger {
            plant: vec![100, 0, 120, 140],
            ..Default::default()
        };
        let counts = AssetCounts {
            plant: 2,
            ..Default::default()
        };
        ledger.trim_to(&counts);
        assert_eq!(ledger.plant, vec![120, 140]);
        assert_eq!(ledger.pop(AssetType::Plant), Some(140));
        assert_eq!(ledger.peek(AssetType::Plant), Some(120));
    }

    #[test]
    fn test_occupied_slot_order() {
        let counts = AssetCounts {
            plant: 0,
            substation: 2,
            storage: 1,
        };
        assert_eq!(counts.occupied(), Some(AssetType::Substation));
        assert_eq!(counts.occupied_slots(), 2);
        assert_eq!(AssetCounts::default().occupied(), None);
    }

    #[test]
    fn test_empty_node_is_not_traversable() {
        let empty = node_with(AssetCounts::default());
        assert!(!empty.is_traversable());
        assert!(!empty.can_host_line());
        let plant = node_with(AssetCounts {
            plant: 1,
            ..Default::default()
        });
        assert!(plant.is_traversable());
        assert_eq!(plant.demolish_label(AssetType::Plant), "Wind Powerplant");
    }
}
