//! # Entity Graph Store
//!
//! Insertion-ordered collection of map entities and transmission lines.
//! Insertion order matters: component numbering, allocation tie-breaks and
//! pick-at-point resolution all follow it.

use crate::domain::{Entity, Point, TransmissionLine, INTERACTION_RADIUS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityStore {
    #[serde(rename = "regions", alias = "entities", default)]
    pub entities: Vec<Entity>,
    #[serde(rename = "links", alias = "lines", default)]
    pub lines: Vec<TransmissionLine>,
}

impl EntityStore {
    pub fn new(entities: Vec<Entity>, lines: Vec<TransmissionLine>) -> Self {
        Self { entities, lines }
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.entities.iter().position(|entity| entity.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn towns(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|entity| entity.is_town())
    }

    pub fn towns_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut().filter(|entity| entity.is_town())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|entity| !entity.is_town())
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut().filter(|entity| !entity.is_town())
    }

    pub fn town_count(&self) -> usize {
        self.towns().count()
    }

    pub fn line(&self, id: &str) -> Option<&TransmissionLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    pub fn line_mut(&mut self, id: &str) -> Option<&mut TransmissionLine> {
        self.lines.iter_mut().find(|line| line.id == id)
    }

    /// Line joining two ids in either direction, built or not
    pub fn line_between(&self, a: &str, b: &str) -> Option<&TransmissionLine> {
        self.lines.iter().find(|line| line.connects(a, b))
    }

    pub fn line_between_mut(&mut self, a: &str, b: &str) -> Option<&mut TransmissionLine> {
        self.lines.iter_mut().find(|line| line.connects(a, b))
    }

    pub fn connected_built_lines(&self, id: &str) -> impl Iterator<Item = &TransmissionLine> + '_ {
        let id = id.to_string();
        self.lines
            .iter()
            .filter(move |line| line.built && line.touches(&id))
    }

    /// Endpoint pair of a line when both entities exist
    pub fn endpoints(&self, line: &TransmissionLine) -> Option<(&Entity, &Entity)> {
        Some((self.get(&line.a)?, self.get(&line.b)?))
    }

    /// Remove an infrastructure node and every line touching it
    ///
    /// Towns are never removed; returns false for them and for unknown ids.
    pub fn remove_node(&mut self, id: &str) -> bool {
        match self.get(id) {
            Some(entity) if !entity.is_town() => {}
            _ => return false,
        }
        self.entities.retain(|entity| entity.id != id);
        self.lines.retain(|line| !line.touches(id));
        true
    }

    /// Remove every node without assets; returns the removed ids
    pub fn prune_empty_nodes(&mut self) -> Vec<String> {
        let orphans: Vec<String> = self
            .nodes()
            .filter(|node| node.total_assets() == 0)
            .map(|node| node.id.clone())
            .collect();
        if orphans.is_empty() {
            return orphans;
        }
        self.entities.retain(|entity| !orphans.contains(&entity.id));
        self.lines
            .retain(|line| !orphans.contains(&line.a) && !orphans.contains(&line.b));
        orphans
    }

    pub fn nearest_town(&self, point: Point) -> Option<&Entity> {
        self.towns().min_by(|a, b| {
            a.position
                .distance_to(point)
                .total_cmp(&b.position.distance_to(point))
        })
    }

    /// Most recently inserted entity within the interaction radius
    pub fn entity_at(&self, point: Point) -> Option<&Entity> {
        self.entities
            .iter()
            .rev()
            .find(|entity| entity.position.distance_to(point) <= INTERACTION_RADIUS)
    }

    /// Entities eligible for priority changes within a radius
    pub fn priority_targets_within(&self, center: Point, radius: f64) -> Vec<String> {
        let radius = radius.max(1.0);
        self.entities
            .iter()
            .filter(|entity| entity.is_occupied())
            .filter(|entity| entity.position.distance_to(center) <= radius)
            .map(|entity| entity.id.clone())
            .collect()
    }

    /// Stored energy across all storage nodes (MWh)
    pub fn stored_energy_mwh(&self) -> f64 {
        self.nodes().map(Entity::storage_charge_mwh).sum()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::*;

    pub fn town(id: &str, x: f64, y: f64, demand: f64) -> Entity {
        Entity {
            id: id.to_string(),
            name: id.to_string(),
            position: Point::new(x, y),
            radius: 56.0,
            terrain: Terrain::Plains,
            climate: Climate::Temperate,
            district_type: "Rural Cluster".to_string(),
            priority: Priority::Nominal,
            resource_profile: ResourceProfile::default(),
            kind: EntityKind::Town(TownState {
                base_demand: demand,
                population: 20.0,
                growth_rate: 0.3,
                demand,
                target_demand: demand,
                unmet: demand,
                ..Default::default()
            }),
        }
    }

    pub fn node(id: &str, x: f64, y: f64, asset: Option<AssetType>) -> Entity {
        let mut assets = AssetCounts::default();
        let mut ledger = AssetLedger::default();
        if let Some(asset) = asset {
            *assets.get_mut(asset) = 1;
            ledger.record(asset, 100);
        }
        Entity {
            id: id.to_string(),
            name: format!("Grid Point {}", id.trim_start_matches("node-")),
            position: Point::new(x, y),
            radius: INFRASTRUCTURE_NODE_RADIUS,
            terrain: Terrain::Plains,
            climate: Climate::Temperate,
            district_type: "Rural Cluster".to_string(),
            priority: Priority::Nominal,
            resource_profile: ResourceProfile::default(),
            kind: EntityKind::Node(NodeState {
                assets,
                ledger,
                ..Default::default()
            }),
        }
    }

    pub fn line(id: &str, a: &str, b: &str, length: f64) -> TransmissionLine {
        TransmissionLine::new(
            id.to_string(),
            a,
            b,
            length,
            TransmissionLine::capacity_for_length(length),
            60,
        )
    }
}
