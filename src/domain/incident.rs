//! # Incidents
//!
//! Time-bounded modifiers that scale demand, line capacity, operating cost or
//! build cost. Region-scoped incidents only affect the targeted town (and, for
//! line capacity, the lines touching it).

use super::line::TransmissionLine;
use super::types::AlertLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    DemandBoost,
    LineCap,
    OperatingCost,
    BuildCost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub level: AlertLevel,
    #[serde(rename = "type")]
    pub kind: IncidentKind,
    #[serde(default)]
    pub region_id: Option<String>,
    pub multiplier: f64,
    #[serde(default)]
    pub starts_at: f64,
    pub expires_at: f64,
}

impl Incident {
    pub fn is_active(&self, now: f64) -> bool {
        self.expires_at > now
    }
}

/// View over active incidents at a given runtime second
#[derive(Debug, Clone, Copy)]
pub struct Modifiers<'a> {
    incidents: &'a [Incident],
    now: f64,
}

impl<'a> Modifiers<'a> {
    pub fn new(incidents: &'a [Incident], now: f64) -> Self {
        Self { incidents, now }
    }

    fn active(&self, kind: IncidentKind) -> impl Iterator<Item = &'a Incident> + '_ {
        self.incidents
            .iter()
            .filter(move |incident| incident.kind == kind && incident.is_active(self.now))
    }

    /// Product of every active multiplier of this kind
    pub fn global(&self, kind: IncidentKind) -> f64 {
        self.active(kind).map(|incident| incident.multiplier).product()
    }

    /// Product of multipliers that are unscoped or scoped to this region
    pub fn for_region(&self, kind: IncidentKind, region_id: &str) -> f64 {
        self.active(kind)
            .filter(|incident| {
                incident
                    .region_id
                    .as_deref()
                    .map_or(true, |target| target == region_id)
            })
            .map(|incident| incident.multiplier)
            .product()
    }

    /// Capacity multiplier from region-scoped line incidents touching the line
    pub fn for_line(&self, line: &TransmissionLine) -> f64 {
        self.active(IncidentKind::LineCap)
            .filter(|incident| {
                incident
                    .region_id
                    .as_deref()
                    .is_some_and(|target| line.touches(target))
            })
            .map(|incident| incident.multiplier)
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(kind: IncidentKind, region: Option<&str>, multiplier: f64, expires_at: f64) -> Incident {
        Incident {
            id: "incident-1".into(),
            title: "Test".into(),
            body: String::new(),
            level: AlertLevel::Warning,
            kind,
            region_id: region.map(str::to_string),
            multiplier,
            starts_at: 0.0,
            expires_at,
        }
    }

    #[test]
    fn test_region_scoped_demand_boost() {
        let incidents = vec![
            incident(IncidentKind::DemandBoost, Some("capital"), 1.28, 20.0),
            incident(IncidentKind::DemandBoost, None, 1.1, 20.0),
        ];
        let modifiers = Modifiers::new(&incidents, 5.0);
        assert!((modifiers.for_region(IncidentKind::DemandBoost, "capital") - 1.408).abs() < 1e-9);
        assert!((modifiers.for_region(IncidentKind::DemandBoost, "harbor") - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_expired_incidents_are_ignored() {
        let incidents = vec![incident(IncidentKind::BuildCost, None, 0.82, 10.0)];
        assert_eq!(Modifiers::new(&incidents, 10.0).global(IncidentKind::BuildCost), 1.0);
        assert_eq!(Modifiers::new(&incidents, 9.9).global(IncidentKind::BuildCost), 0.82);
    }

    #[test]
    fn test_line_cap_requires_region_touch() {
        let incidents = vec![
            incident(IncidentKind::LineCap, Some("node-2"), 0.65, 30.0),
            incident(IncidentKind::LineCap, None, 0.5, 30.0),
        ];
        let modifiers = Modifiers::new(&incidents, 1.0);
        let touching = TransmissionLine::new("line-1".into(), "node-1", "node-2", 10.0, 139.0, 4);
        let other = TransmissionLine::new("line-2".into(), "node-1", "node-3", 10.0, 139.0, 4);
        assert_eq!(modifiers.for_line(&touching), 0.65);
        assert_eq!(modifiers.for_line(&other), 1.0, "unscoped line incidents do nothing");
    }
}
