//! Connected components, generation pools and substation coverage

use crate::domain::{AssetRules, Entity, Point};
use crate::grid::EntityStore;
use std::collections::{HashMap, VecDeque};

use super::constraints::POWER_EPSILON_MW;

/// Partition of entities into electrically connected groups
///
/// Components are numbered in entity insertion order. Entities that cannot
/// carry power (empty nodes) form singleton components.
#[derive(Debug, Clone, Default)]
pub struct ComponentMap {
    by_id: HashMap<String, usize>,
    count: usize,
}

impl ComponentMap {
    pub fn build(store: &EntityStore) -> Self {
        let mut adjacency: HashMap<&str, Vec<&str>> = store
            .entities
            .iter()
            .map(|entity| (entity.id.as_str(), Vec::new()))
            .collect();

        for line in store.lines.iter().filter(|line| line.is_active()) {
            let traversable = |id: &str| store.get(id).is_some_and(Entity::is_traversable);
            if !traversable(&line.a) || !traversable(&line.b) {
                continue;
            }
            if let Some(neighbors) = adjacency.get_mut(line.a.as_str()) {
                neighbors.push(line.b.as_str());
            }
            if let Some(neighbors) = adjacency.get_mut(line.b.as_str()) {
                neighbors.push(line.a.as_str());
            }
        }

        let mut by_id: HashMap<String, usize> = HashMap::with_capacity(store.entities.len());
        let mut count = 0;
        for entity in &store.entities {
            if by_id.contains_key(&entity.id) {
                continue;
            }
            let component = count;
            count += 1;
            by_id.insert(entity.id.clone(), component);
            let mut queue = VecDeque::from([entity.id.as_str()]);
            while let Some(current) = queue.pop_front() {
                for &neighbor in adjacency.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                    if by_id.contains_key(neighbor) {
                        continue;
                    }
                    by_id.insert(neighbor.to_string(), component);
                    queue.push_back(neighbor);
                }
            }
        }

        Self { by_id, count }
    }

    pub fn component_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn same_component(&self, a: &str, b: &str) -> bool {
        match (self.component_of(a), self.component_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Plant output of an entity in MW
pub fn plant_generation(entity: &Entity, rules: &AssetRules) -> f64 {
    match entity.node() {
        Some(node) => {
            node.assets.plant as f64 * rules.plant.generation * entity.resource_profile.plant_boost()
        }
        None => 0.0,
    }
}

/// Generation summed per component index
pub fn generation_by_component(store: &EntityStore, components: &ComponentMap, rules: &AssetRules) -> Vec<f64> {
    let mut pools = vec![0.0; components.len()];
    for entity in &store.entities {
        if let Some(component) = components.component_of(&entity.id) {
            pools[component] += plant_generation(entity, rules);
        }
    }
    pools
}

/// Substation nodes whose component has positive generation, in insertion order
pub fn powered_substations(store: &EntityStore, components: &ComponentMap, rules: &AssetRules) -> Vec<String> {
    let pools = generation_by_component(store, components, rules);
    store
        .nodes()
        .filter(|node| node.assets().substation > 0)
        .filter(|node| {
            components
                .component_of(&node.id)
                .is_some_and(|component| pools[component] > POWER_EPSILON_MW)
        })
        .map(|node| node.id.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub source_id: String,
    pub distance: f64,
}

/// Nearest powered substation within `radius` of a point
///
/// Ties keep the earlier substation.
pub fn coverage_for_point(store: &EntityStore, powered: &[String], point: Point, radius: f64) -> Option<Coverage> {
    let mut best: Option<Coverage> = None;
    for source_id in powered {
        let Some(source) = store.get(source_id) else {
            continue;
        };
        let distance = source.position.distance_to(point);
        if distance > radius {
            continue;
        }
        if best.as_ref().map_or(true, |b| distance < b.distance) {
            best = Some(Coverage {
                source_id: source_id.clone(),
                distance,
            });
        }
    }
    best
}

/// Recompute coverage flags for every town; returns the covered-town count
pub fn update_coverage(store: &mut EntityStore, rules: &AssetRules, radius: f64) -> usize {
    let components = ComponentMap::build(store);
    let powered = powered_substations(store, &components, rules);
    let assignments: Vec<Option<Coverage>> = store
        .entities
        .iter()
        .map(|entity| {
            entity
                .is_town()
                .then(|| coverage_for_point(store, &powered, entity.position, radius))
                .flatten()
        })
        .collect();

    let mut covered = 0;
    for (entity, coverage) in store.entities.iter_mut().zip(assignments) {
        let Some(town) = entity.town_mut() else {
            continue;
        };
        town.clear_coverage();
        if let Some(coverage) = coverage {
            town.covered_by_substation = true;
            town.coverage_source_id = Some(coverage.source_id);
            town.coverage_distance = coverage.distance;
            covered += 1;
        }
    }
    covered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetType;
    use crate::grid::store::fixtures::{line, node, town};

    fn rated(mut store: EntityStore) -> EntityStore {
        for line in store.lines.iter_mut() {
            line.safe_capacity = line.base_capacity;
        }
        store
    }

    #[test]
    fn test_components_follow_active_lines() {
        let store = rated(EntityStore::new(
            vec![
                node("node-1", 0.0, 0.0, Some(AssetType::Plant)),
                node("node-2", 100.0, 0.0, Some(AssetType::Substation)),
                node("node-3", 500.0, 0.0, Some(AssetType::Substation)),
            ],
            vec![line("line-1", "node-1", "node-2", 100.0)],
        ));
        let components = ComponentMap::build(&store);
        assert_eq!(components.len(), 2);
        assert!(components.same_component("node-1", "node-2"));
        assert!(!components.same_component("node-1", "node-3"));
        assert_eq!(components.component_of("node-1"), Some(0));
    }

    #[test]
    fn test_unbuilt_or_unrated_lines_do_not_connect() {
        let mut store = rated(EntityStore::new(
            vec![
                node("node-1", 0.0, 0.0, Some(AssetType::Plant)),
                node("node-2", 100.0, 0.0, Some(AssetType::Substation)),
            ],
            vec![line("line-1", "node-1", "node-2", 100.0)],
        ));
        store.lines[0].built = false;
        assert!(!ComponentMap::build(&store).same_component("node-1", "node-2"));
        store.lines[0].built = true;
        store.lines[0].safe_capacity = 0.0;
        assert!(!ComponentMap::build(&store).same_component("node-1", "node-2"));
    }

    #[test]
    fn test_empty_node_breaks_the_path() {
        let store = rated(EntityStore::new(
            vec![
                node("node-1", 0.0, 0.0, Some(AssetType::Plant)),
                node("node-2", 100.0, 0.0, None),
                node("node-3", 200.0, 0.0, Some(AssetType::Substation)),
            ],
            vec![
                line("line-1", "node-1", "node-2", 100.0),
                line("line-2", "node-2", "node-3", 100.0),
            ],
        ));
        let components = ComponentMap::build(&store);
        assert!(!components.same_component("node-1", "node-3"));
        assert_eq!(components.len(), 3);
    }

    #[test]
    fn test_only_energized_substations_cover() {
        let rules = AssetRules::default();
        let mut store = rated(EntityStore::new(
            vec![
                town("capital", 100.0, 200.0, 40.0),
                node("node-1", 0.0, 0.0, Some(AssetType::Plant)),
                node("node-2", 100.0, 0.0, Some(AssetType::Substation)),
                node("node-3", 150.0, 150.0, Some(AssetType::Substation)),
            ],
            vec![line("line-1", "node-1", "node-2", 100.0)],
        ));
        let components = ComponentMap::build(&store);
        assert_eq!(powered_substations(&store, &components, &rules), vec!["node-2".to_string()]);

        assert_eq!(update_coverage(&mut store, &rules, 300.0), 1);
        let capital = store.get("capital").unwrap().town().unwrap();
        assert_eq!(capital.coverage_source_id.as_deref(), Some("node-2"));
        assert_eq!(capital.coverage_distance, 200.0);

        assert_eq!(update_coverage(&mut store, &rules, 150.0), 0);
        assert!(!store.get("capital").unwrap().town().unwrap().covered_by_substation);
    }

    #[test]
    fn test_generation_uses_resource_boost() {
        let rules = AssetRules::default();
        let mut plant = node("node-1", 0.0, 0.0, Some(AssetType::Plant));
        plant.resource_profile.natural_gas = 1.0;
        assert!((plant_generation(&plant, &rules) - rules.plant.generation * 1.2).abs() < 1e-9);
        assert_eq!(plant_generation(&town("capital", 0.0, 0.0, 10.0), &rules), 0.0);
    }
}
