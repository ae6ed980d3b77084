use super::types::clamp;
use serde::{Deserialize, Serialize};

pub const LINE_MIN_CAPACITY: f64 = 58.0;
pub const LINE_MAX_CAPACITY: f64 = 140.0;
/// Capacity lost per world unit of length
const LINE_DISTANCE_CAPACITY_FACTOR: f64 = 0.08;

/// Transmission line between two map entities
///
/// A line that has been toggled off stays in the store with `built = false`
/// so it can be recommissioned; it disappears only when an endpoint node is
/// pruned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransmissionLine {
    pub id: String,
    pub a: String,
    pub b: String,
    /// Display direction of power flow
    pub flow_from: String,
    pub flow_to: String,
    pub built: bool,
    /// Euclidean endpoint distance in world units
    pub length: f64,
    /// Length-derived capacity before substation boosts (MW)
    pub base_capacity: f64,
    /// Paid cost of the most recent commissioning
    pub line_build_cost: u32,
    /// Route tier carried over from the static map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    pub used: f64,
    pub safe_capacity: f64,
    pub hard_capacity: f64,
    /// used / safe_capacity
    pub stress: f64,
    pub overload: bool,
}

impl TransmissionLine {
    pub fn new(id: String, from: &str, to: &str, length: f64, base_capacity: f64, cost: u32) -> Self {
        Self {
            id,
            a: from.to_string(),
            b: to.to_string(),
            flow_from: from.to_string(),
            flow_to: to.to_string(),
            built: true,
            length,
            base_capacity,
            line_build_cost: cost,
            ..Default::default()
        }
    }

    /// Base capacity of a new line: longer routes carry less
    pub fn capacity_for_length(length: f64) -> f64 {
        clamp(
            (LINE_MAX_CAPACITY - length * LINE_DISTANCE_CAPACITY_FACTOR).round(),
            LINE_MIN_CAPACITY,
            LINE_MAX_CAPACITY,
        )
    }

    /// Whether the line joins the two ids in either direction
    pub fn connects(&self, first: &str, second: &str) -> bool {
        (self.a == first && self.b == second) || (self.a == second && self.b == first)
    }

    pub fn touches(&self, id: &str) -> bool {
        self.a == id || self.b == id
    }

    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.a == id {
            Some(&self.b)
        } else if self.b == id {
            Some(&self.a)
        } else {
            None
        }
    }

    /// Built and carrying positive rated capacity this tick
    pub fn is_active(&self) -> bool {
        self.built && self.safe_capacity > 0.0
    }

    /// Zero all per-tick flow fields
    pub fn reset_flow(&mut self) {
        self.used = 0.0;
        self.stress = 0.0;
        self.overload = false;
    }

    /// Take the line out of service
    pub fn decommission(&mut self) {
        self.built = false;
        self.safe_capacity = 0.0;
        self.hard_capacity = 0.0;
        self.reset_flow();
    }

    /// Keep flow endpoints only when they match the line endpoints
    pub fn normalize_flow_endpoints(&mut self) {
        let matches = (self.flow_from == self.a && self.flow_to == self.b)
            || (self.flow_from == self.b && self.flow_to == self.a);
        if !matches {
            self.flow_from = self.a.clone();
            self.flow_to = self.b.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_connects_both_directions() {
        let line = TransmissionLine::new("line-1".into(), "node-1", "node-2", 200.0, 124.0, 70);
        assert!(line.connects("node-1", "node-2"));
        assert!(line.connects("node-2", "node-1"));
        assert!(!line.connects("node-1", "node-3"));
        assert_eq!(line.other_end("node-2"), Some("node-1"));
        assert_eq!(line.other_end("node-9"), None);
    }

    #[test]
    fn test_capacity_shrinks_with_length() {
        assert_eq!(TransmissionLine::capacity_for_length(0.0), 140.0);
        assert_eq!(TransmissionLine::capacity_for_length(200.0), 124.0);
        assert_eq!(TransmissionLine::capacity_for_length(1000.0), 60.0);
        assert_eq!(TransmissionLine::capacity_for_length(5000.0), 58.0);
    }

    #[test]
    fn test_flow_endpoints_are_repaired() {
        let mut line = TransmissionLine::new("line-1".into(), "node-1", "node-2", 200.0, 124.0, 70);
        line.flow_from = "node-7".into();
        line.normalize_flow_endpoints();
        assert_eq!(line.flow_from, "node-1");
        assert_eq!(line.flow_to, "node-2");

        line.flow_from = "node-2".into();
        line.flow_to = "node-1".into();
        line.normalize_flow_endpoints();
        assert_eq!(line.flow_from, "node-2", "reversed endpoints are kept");
    }

    #[test]
    fn test_decommission_clears_rating() {
        let mut line = TransmissionLine::new("line-1".into(), "node-1", "node-2", 200.0, 124.0, 70);
        line.safe_capacity = 124.0;
        line.used = 50.0;
        line.decommission();
        assert!(!line.built);
        assert!(!line.is_active());
        assert_eq!(line.used, 0.0);
    }
}
