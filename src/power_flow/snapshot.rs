use serde::{Deserialize, Serialize};
use std::fmt;

use super::constraints::POWER_EPSILON_MW;

/// Per-component outcome of one resolution pass
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentFlow {
    /// Plant output inside the component (MW)
    pub generation: f64,

    /// Power delivered to towns covered from this component (MW)
    pub town_served: f64,

    /// Power drawn by storage nodes in this component (MW)
    pub storage_draw: f64,

    /// Active lines attributed to this component
    pub line_count: usize,
}

impl ComponentFlow {
    pub fn served(&self) -> f64 {
        self.town_served + self.storage_draw
    }

    /// Generation not delivered anywhere; it is lost at the end of the tick
    pub fn curtailed(&self) -> f64 {
        (self.generation - self.served()).max(0.0)
    }
}

/// World-level totals of one resolution pass
///
/// Balance equation per component: served + storage ≤ generation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowSummary {
    /// Town demand plus storage charging (MW)
    pub total_demand: f64,

    /// Town service plus storage charging (MW)
    pub total_served: f64,

    /// Unserved town demand (MW)
    pub total_unmet: f64,

    pub total_generation: f64,

    pub storage_charging_mw: f64,

    pub overloaded_lines: usize,

    pub components: Vec<ComponentFlow>,
}

impl FlowSummary {
    /// No component delivers more than it generates
    pub fn verify_conservation(&self) -> bool {
        self.components
            .iter()
            .all(|component| component.served() <= component.generation + POWER_EPSILON_MW)
    }

    /// Town-only demand (MW)
    pub fn town_demand(&self) -> f64 {
        self.total_demand - self.storage_charging_mw
    }

    /// Fraction of demand served; 1 with no demand
    pub fn served_ratio(&self) -> f64 {
        if self.total_demand > 0.0 {
            self.total_served / self.total_demand
        } else {
            1.0
        }
    }
}

impl fmt::Display for FlowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FlowSummary {{ Demand: {:.2}MW, Served: {:.2}MW, Unmet: {:.2}MW, Generation: {:.2}MW, Storage: {:.2}MW, Balanced: {} }}",
            self.total_demand,
            self.total_served,
            self.total_unmet,
            self.total_generation,
            self.storage_charging_mw,
            if self.verify_conservation() { "✓" } else { "✗" }
        )
    }
}
