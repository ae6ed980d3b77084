//! # Error Types
//!
//! Two families of failure exist in the engine:
//!
//! - [`SimError`]: loading and configuration failures (unreadable map files,
//!   malformed snapshots, invalid custom-game options). These surface as
//!   `Result` errors to the caller.
//! - [`Rejection`]: soft validation failures of player commands. These never
//!   mutate world state; the engine mirrors them into the alert feed and hands
//!   them back to the caller.

use crate::domain::AlertLevel;
use thiserror::Error;

/// Errors raised while loading maps, configs or snapshots
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Map document error: {0}")]
    Map(String),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
    #[error("Invalid run configuration: {0}")]
    Config(String),
    #[error("Terrain raster error: {0}")]
    Terrain(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<validator::ValidationErrors> for SimError {
    fn from(errors: validator::ValidationErrors) -> Self {
        SimError::Config(errors.to_string())
    }
}

/// Player command rejected during validation
///
/// The display text is what the player sees in the alert feed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("Towns are demand points. Build infrastructure on open map points.")]
    TownTarget,
    #[error("Cannot build outside map bounds.")]
    OutOfBounds,
    #[error("{name} already hosts infrastructure. Buildings must be placed on separate points.")]
    Occupied { name: String },
    #[error("Build location too close to {name}. Minimum spacing is 1.5x radius.")]
    TooClose { name: String },
    #[error("{name} location cooling down after demolition.")]
    CoolingDown { name: String },
    #[error("Insufficient budget for {what} ({cost}).")]
    InsufficientBudget { what: String, cost: u32 },
    #[error("Unknown map entity: {0}")]
    UnknownEntity(String),
    #[error("Unknown transmission line: {0}")]
    UnknownLine(String),
    #[error("Line endpoints must be infrastructure points with a plant, substation, or battery.")]
    InvalidEndpoint,
    #[error("Towns are demand points. Build a plant/substation/battery on an infrastructure point first.")]
    TownEndpoint,
    #[error("Line endpoint must have a plant, substation, or battery before connecting.")]
    EmptyEndpoint,
    #[error("Endpoint out of range. Maximum {max:.0} (current {length:.0}).")]
    OutOfRange { max: f64, length: f64 },
    #[error("No removable assets available at {name}.")]
    NothingToDemolish { name: String },
    #[error("No cities or infrastructure in reroute radius.")]
    NoRerouteTargets,
    #[error("Run has ended; commands are no longer accepted.")]
    RunEnded,
}

impl Rejection {
    /// Alert level used when the rejection is mirrored to the alert feed
    pub fn level(&self) -> AlertLevel {
        match self {
            Rejection::TownTarget
            | Rejection::TownEndpoint
            | Rejection::CoolingDown { .. }
            | Rejection::NothingToDemolish { .. }
            | Rejection::NoRerouteTargets
            | Rejection::UnknownEntity(_)
            | Rejection::UnknownLine(_)
            | Rejection::RunEnded => AlertLevel::Advisory,
            _ => AlertLevel::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_text_is_player_facing() {
        let rejection = Rejection::InsufficientBudget {
            what: "Line".to_string(),
            cost: 212,
        };
        assert_eq!(rejection.to_string(), "Insufficient budget for Line (212).");
        assert_eq!(rejection.level(), AlertLevel::Warning);

        let range = Rejection::OutOfRange {
            max: 1000.0,
            length: 1204.4,
        };
        assert_eq!(
            range.to_string(),
            "Endpoint out of range. Maximum 1000 (current 1204)."
        );
    }

    #[test]
    fn test_advisory_rejections() {
        assert_eq!(Rejection::TownTarget.level(), AlertLevel::Advisory);
        assert_eq!(Rejection::NoRerouteTargets.level(), AlertLevel::Advisory);
        assert_eq!(Rejection::OutOfBounds.level(), AlertLevel::Warning);
    }
}
