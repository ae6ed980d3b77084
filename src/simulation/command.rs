//! Player commands accepted by the engine and their outcomes

use serde::{Deserialize, Serialize};

use super::construction::{BuildReceipt, BuildTarget, DemolitionOutcome, LineOutcome, RerouteOutcome};
use crate::domain::{AssetType, Point, ResourceKind};
use crate::error::Rejection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Place one asset; plant type defaults to wind
    Build {
        target: BuildTarget,
        asset: AssetType,
        #[serde(default, rename = "plantType")]
        plant_type: Option<ResourceKind>,
    },
    /// Arm or cancel a demolition on a node
    Demolish {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(default)]
        asset: Option<AssetType>,
    },
    DemolishLine {
        #[serde(rename = "lineId")]
        line_id: String,
    },
    /// Build or toggle a line between two endpoints in one step
    BuildLine { a: String, b: String },
    /// Line tool click: first click selects, second click builds
    SelectLineEndpoint { id: String },
    CancelLineSelection,
    Reroute {
        point: Point,
        #[serde(default)]
        radius: Option<f64>,
    },
    ClearPriorities,
    TogglePause,
    RevealResources,
    Select {
        #[serde(default)]
        id: Option<String>,
    },
}

impl Command {
    /// Whether the command changes grid structure and needs a coverage refresh
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Command::Build { .. }
                | Command::Demolish { .. }
                | Command::DemolishLine { .. }
                | Command::BuildLine { .. }
                | Command::SelectLineEndpoint { .. }
                | Command::Reroute { .. }
                | Command::ClearPriorities
        )
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Build { .. } => "build",
            Command::Demolish { .. } => "demolish",
            Command::DemolishLine { .. } => "demolish_line",
            Command::BuildLine { .. } => "build_line",
            Command::SelectLineEndpoint { .. } => "select_line_endpoint",
            Command::CancelLineSelection => "cancel_line_selection",
            Command::Reroute { .. } => "reroute",
            Command::ClearPriorities => "clear_priorities",
            Command::TogglePause => "toggle_pause",
            Command::RevealResources => "reveal_resources",
            Command::Select { .. } => "select",
        }
    }
}

/// Result of an accepted command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutcome {
    Built(BuildReceipt),
    Line(LineOutcome),
    LineDemolished { line_id: String, refund: u32 },
    Demolition(DemolitionOutcome),
    LineStartSelected { id: String },
    LineSelectionCleared,
    Rerouted(RerouteOutcome),
    PrioritiesCleared { count: usize },
    PauseToggled { paused: bool },
    ResourcesRevealed,
    Selected { id: Option<String> },
}

pub type CommandResult = Result<CommandOutcome, Rejection>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commands_deserialize_from_tagged_json() {
        let build: Command = serde_json::from_value(json!({
            "type": "build",
            "target": {"kind": "point", "value": {"x": 120.0, "y": 80.0}},
            "asset": "plant",
            "plantType": "natural_gas"
        }))
        .unwrap();
        assert_eq!(
            build,
            Command::Build {
                target: BuildTarget::Point(Point::new(120.0, 80.0)),
                asset: AssetType::Plant,
                plant_type: Some(ResourceKind::NaturalGas),
            }
        );

        let demolish: Command = serde_json::from_value(json!({"type": "demolish", "nodeId": "node-3"})).unwrap();
        assert_eq!(
            demolish,
            Command::Demolish {
                node_id: "node-3".into(),
                asset: None
            }
        );

        let pause: Command = serde_json::from_value(json!({"type": "toggle_pause"})).unwrap();
        assert_eq!(pause, Command::TogglePause);
        assert!(!pause.is_structural());
    }
}
