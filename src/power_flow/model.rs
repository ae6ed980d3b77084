use std::cmp::Reverse;
use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use tracing::debug;

use super::connectivity::{generation_by_component, ComponentMap};
use super::constraints::{GridConstraints, POWER_EPSILON_MW};
use super::snapshot::{ComponentFlow, FlowSummary};
use crate::domain::{clamp, AssetRules, Modifiers};
use crate::grid::EntityStore;

/// Recompute safe and hard capacity of every line
///
/// Unbuilt lines and lines with a missing endpoint are rated zero.
pub fn rate_lines(store: &mut EntityStore, modifiers: &Modifiers<'_>, constraints: &GridConstraints) {
    let ratings: Vec<f64> = store
        .lines
        .iter()
        .map(|line| {
            let Some((a, b)) = store.endpoints(line).filter(|_| line.built) else {
                return 0.0;
            };
            let substations = a.assets().substation + b.assets().substation;
            constraints.safe_capacity(line.base_capacity, substations, modifiers.for_line(line))
        })
        .collect();

    for (line, safe) in store.lines.iter_mut().zip(ratings) {
        line.reset_flow();
        line.safe_capacity = safe;
        line.hard_capacity = safe * constraints.hard_capacity_factor;
    }
}

/// Flow resolver: THE CORE ALGORITHM
///
/// Distributes plant generation to covered towns and storage per connected
/// component, then attributes flow to lines.
pub struct FlowResolver<'a> {
    constraints: &'a GridConstraints,
    rules: &'a AssetRules,
}

impl<'a> FlowResolver<'a> {
    pub fn new(constraints: &'a GridConstraints, rules: &'a AssetRules) -> Self {
        Self { constraints, rules }
    }

    /// Resolve one tick of power flow
    ///
    /// Line ratings must be current (see [`rate_lines`]) and town coverage
    /// must already be assigned.
    ///
    /// Algorithm steps:
    /// 1. Reset served/unmet and clamp stored energy
    /// 2. Group covered towns by the component of their substation
    /// 3. Greedy fill: elevated priority first, then largest demand
    /// 4. Offer the remainder to storage nodes in the same component
    /// 5. Attribute component flow evenly to its lines
    /// 6. Finalize utilization and world totals
    pub fn resolve(&self, store: &mut EntityStore, dt: f64) -> FlowSummary {
        let components = ComponentMap::build(store);
        let generation = generation_by_component(store, &components, self.rules);
        let mut flows: Vec<ComponentFlow> = generation
            .iter()
            .map(|&generation| ComponentFlow {
                generation,
                ..Default::default()
            })
            .collect();

        // Step 1: Reset per-tick service
        let mut covered_by_component: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut storage_by_component: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, entity) in store.entities.iter_mut().enumerate() {
            let own_component = components.component_of(&entity.id);
            if let Some(node) = entity.node_mut() {
                node.storage_charging_mw = 0.0;
                let units = node.assets.storage;
                if units > 0 {
                    let capacity = self.constraints.storage_capacity_mwh(units);
                    node.storage_charge_mwh = clamp(node.storage_charge_mwh, 0.0, capacity);
                    if let Some(component) = own_component {
                        storage_by_component.entry(component).or_default().push(index);
                    }
                } else {
                    node.storage_charge_mwh = 0.0;
                }
            }
            if let Some(town) = entity.town_mut() {
                town.served = 0.0;
                town.unmet = town.demand;

                // Step 2: Group by the source substation component
                let source = town
                    .coverage_source_id
                    .as_deref()
                    .filter(|_| town.covered_by_substation)
                    .and_then(|source| components.component_of(source));
                if let Some(component) = source {
                    covered_by_component.entry(component).or_default().push(index);
                }
            }
        }

        // Step 3: Priority-ordered greedy fill
        let mut remaining = generation.clone();
        for (&component, towns) in covered_by_component.iter_mut() {
            let mut pool = generation[component];
            if pool > POWER_EPSILON_MW {
                towns.sort_by_key(|&index| {
                    let entity = &store.entities[index];
                    (entity.priority, Reverse(OrderedFloat(entity.demand())))
                });
                for &index in towns.iter() {
                    if pool <= POWER_EPSILON_MW {
                        break;
                    }
                    if let Some(town) = store.entities[index].town_mut() {
                        let moved = town.unmet.min(pool);
                        town.served += moved;
                        town.unmet -= moved;
                        pool -= moved;
                        flows[component].town_served += moved;
                    }
                }
            }
            remaining[component] = pool;
        }

        // Step 4: Storage charging from the leftover pool
        let mut storage_charging = 0.0;
        for (&component, nodes) in storage_by_component.iter_mut() {
            let mut pool = remaining[component];
            if pool <= POWER_EPSILON_MW {
                continue;
            }
            nodes.sort_by(|&x, &y| {
                let (ex, ey) = (&store.entities[x], &store.entities[y]);
                ex.priority.cmp(&ey.priority).then_with(|| ex.id.cmp(&ey.id))
            });
            for &index in nodes.iter() {
                if pool <= POWER_EPSILON_MW {
                    break;
                }
                let Some(node) = store.entities[index].node_mut() else {
                    continue;
                };
                let requested = self.constraints.storage_charge_demand_mw(
                    node.assets.storage,
                    node.storage_charge_mwh,
                    dt,
                );
                let draw = requested.min(pool);
                if draw <= 0.0 {
                    continue;
                }
                node.storage_charge_mwh =
                    self.constraints
                        .charge_storage(node.assets.storage, node.storage_charge_mwh, draw, dt);
                node.storage_charging_mw += draw;
                storage_charging += draw;
                flows[component].storage_draw += draw;
                pool -= draw;
            }
            remaining[component] = pool;
        }

        // Step 5: Line attribution keyed by the component of endpoint `a`
        for line in store.lines.iter().filter(|line| line.is_active()) {
            if let Some(component) = components.component_of(&line.a) {
                flows[component].line_count += 1;
            }
        }
        let mut overloaded = 0;
        for line in store.lines.iter_mut().filter(|line| line.is_active()) {
            let Some(component) = components.component_of(&line.a) else {
                continue;
            };
            let flow = &flows[component];
            line.used = flow.served() / flow.line_count.max(1) as f64;
            line.stress = line.used / line.safe_capacity;
            line.overload = line.used > line.safe_capacity;
            if line.overload {
                overloaded += 1;
            }
        }

        // Step 6: Utilization and totals
        let (mut demand, mut served, mut unmet) = (0.0, 0.0, 0.0);
        for town in store.entities.iter_mut().filter_map(|entity| entity.town_mut()) {
            town.unmet = clamp(town.unmet, 0.0, town.demand.max(0.0));
            town.utilization = if town.demand > 0.0 {
                town.served / town.demand
            } else {
                1.0
            };
            demand += town.demand;
            served += town.served;
            unmet += town.unmet;
        }

        let summary = FlowSummary {
            total_demand: demand + storage_charging,
            total_served: served + storage_charging,
            total_unmet: unmet,
            total_generation: generation.iter().sum(),
            storage_charging_mw: storage_charging,
            overloaded_lines: overloaded,
            components: flows,
        };
        debug!(%summary, "grid resolved");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetType, Incident, IncidentKind, AlertLevel, Priority};
    use crate::grid::store::fixtures::{line, node, town};
    use crate::power_flow::connectivity::update_coverage;

    const DT: f64 = 0.1;

    fn resolve(store: &mut EntityStore) -> FlowSummary {
        let constraints = GridConstraints::default();
        let rules = AssetRules::default();
        rate_lines(store, &Modifiers::new(&[], 0.0), &constraints);
        update_coverage(store, &rules, 300.0);
        FlowResolver::new(&constraints, &rules).resolve(store, DT)
    }

    fn radial_store(towns: Vec<crate::domain::Entity>) -> EntityStore {
        let mut entities = vec![
            node("node-1", 0.0, 0.0, Some(AssetType::Plant)),
            node("node-2", 200.0, 0.0, Some(AssetType::Substation)),
        ];
        entities.extend(towns);
        EntityStore::new(entities, vec![line("line-1", "node-1", "node-2", 200.0)])
    }

    #[test]
    fn test_single_plant_single_town() {
        let mut store = radial_store(vec![town("capital", 250.0, 0.0, 30.0)]);
        let summary = resolve(&mut store);

        let capital = store.get("capital").unwrap().town().unwrap();
        assert_eq!(capital.served, 30.0);
        assert_eq!(capital.unmet, 0.0);
        assert_eq!(capital.utilization, 1.0);

        let line = &store.lines[0];
        assert_eq!(line.safe_capacity, 124.0 + 9.0);
        assert_eq!(line.hard_capacity, 133.0 * 1.15);
        assert_eq!(line.used, 30.0);
        assert!(!line.overload);
        assert_eq!(summary.total_served, 30.0);
        assert!(summary.verify_conservation());
    }

    #[test]
    fn test_elevated_priority_is_served_first() {
        let mut big = town("metro", 250.0, 0.0, 40.0);
        big.priority = Priority::Nominal;
        let mut small = town("hamlet", 210.0, 40.0, 20.0);
        small.priority = Priority::Elevated;
        let mut third = town("harbor", 260.0, 20.0, 30.0);
        third.priority = Priority::Nominal;
        let mut store = radial_store(vec![big, small, third]);
        resolve(&mut store);

        // 42 MW: hamlet 20, then metro (largest) gets 22, harbor nothing
        let served = |id: &str| store.get(id).unwrap().served();
        assert_eq!(served("hamlet"), 20.0);
        assert!((served("metro") - 22.0).abs() < 1e-9);
        assert_eq!(served("harbor"), 0.0);
    }

    #[test]
    fn test_storage_takes_leftover_generation() {
        let mut store = radial_store(vec![town("capital", 250.0, 0.0, 10.0)]);
        store.insert(node("node-3", 100.0, 100.0, Some(AssetType::Storage)));
        store.lines.push(line("line-2", "node-2", "node-3", 141.0));
        let summary = resolve(&mut store);

        assert_eq!(summary.storage_charging_mw, 20.0);
        assert_eq!(summary.total_demand, 30.0);
        assert_eq!(summary.total_served, 30.0);
        assert_eq!(summary.total_unmet, 0.0);
        let stored = store.get("node-3").unwrap().storage_charge_mwh();
        assert!((stored - 20.0 * DT / 120.0).abs() < 1e-12);
        // two lines share component flow
        assert_eq!(store.lines[0].used, 15.0);
        assert_eq!(store.lines[1].used, 15.0);
    }

    #[test]
    fn test_uncovered_town_is_unserved() {
        let mut store = radial_store(vec![town("faraway", 900.0, 0.0, 25.0)]);
        let summary = resolve(&mut store);
        let faraway = store.get("faraway").unwrap().town().unwrap();
        assert!(!faraway.covered_by_substation);
        assert_eq!(faraway.served, 0.0);
        assert_eq!(faraway.unmet, 25.0);
        assert_eq!(faraway.utilization, 0.0);
        assert_eq!(summary.total_unmet, 25.0);
        assert_eq!(store.lines[0].used, 0.0);
    }

    #[test]
    fn test_line_cap_incident_can_overload() {
        let mut store = radial_store(vec![town("capital", 250.0, 0.0, 41.0)]);
        store.lines[0].base_capacity = 58.0;
        let incidents = vec![Incident {
            id: "incident-1".into(),
            title: "Coastal storm".into(),
            body: String::new(),
            level: AlertLevel::Critical,
            kind: IncidentKind::LineCap,
            region_id: Some("node-2".into()),
            multiplier: 0.5,
            starts_at: 0.0,
            expires_at: 10.0,
        }];
        let constraints = GridConstraints::default();
        let rules = AssetRules::default();
        rate_lines(&mut store, &Modifiers::new(&incidents, 1.0), &constraints);
        assert_eq!(store.lines[0].safe_capacity, (58.0 + 9.0) * 0.5);
        update_coverage(&mut store, &rules, 300.0);
        let summary = FlowResolver::new(&constraints, &rules).resolve(&mut store, DT);
        assert!(store.lines[0].overload);
        assert_eq!(summary.overloaded_lines, 1);
    }

    #[test]
    fn test_unbuilt_line_is_rated_zero() {
        let mut store = radial_store(vec![town("capital", 250.0, 0.0, 30.0)]);
        store.lines[0].built = false;
        let summary = resolve(&mut store);
        assert_eq!(store.lines[0].safe_capacity, 0.0);
        assert_eq!(store.get("capital").unwrap().served(), 0.0);
        assert_eq!(summary.total_generation, 42.0);
    }
}
