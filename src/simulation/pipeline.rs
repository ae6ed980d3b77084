//! # Tick Pipeline
//!
//! Ordered list of stages run by one fixed-step tick, plus the read-only
//! context every stage receives alongside the mutable [`WorldState`].
//!
//! [`WorldState`]: super::state::WorldState

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::domain::{RunConfig, StaticMap};
use crate::power_flow::GridConstraints;
use crate::terrain::TerrainClassifier;

/// Simulation step in seconds
pub const TICK_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum TickStage {
    Demolitions,
    Season,
    ExpireIncidents,
    SpawnIncidents,
    Demand,
    Coverage,
    FlowResolution,
    TutorialPassive,
    Stability,
    Emergence,
    Economy,
    Scoring,
    DevMode,
    EndConditions,
}

impl TickStage {
    /// Every stage in execution order
    pub fn sequence() -> impl Iterator<Item = TickStage> {
        TickStage::iter()
    }
}

/// Read-only inputs shared by the stages of one tick
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a RunConfig,
    pub map: &'a StaticMap,
    pub terrain: &'a dyn TerrainClassifier,
    pub constraints: &'a GridConstraints,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let stages: Vec<_> = TickStage::sequence().collect();
        assert_eq!(stages.first(), Some(&TickStage::Demolitions));
        assert_eq!(stages.last(), Some(&TickStage::EndConditions));
        let position = |stage| stages.iter().position(|s| *s == stage).unwrap();
        assert!(position(TickStage::Coverage) < position(TickStage::FlowResolution));
        assert!(position(TickStage::Stability) < position(TickStage::Emergence));
        assert!(position(TickStage::Economy) < position(TickStage::Scoring));
        assert_eq!(TickStage::FlowResolution.to_string(), "flow_resolution");
    }
}
