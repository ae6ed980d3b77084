//! Power Flow Resolution
//!
//! This module contains the per-tick flow model that moves generation to
//! covered towns and storage. Delivery never exceeds the generation of the
//! connected component it comes from.

pub mod connectivity;
pub mod constraints;
pub mod model;
pub mod snapshot;

pub use connectivity::{update_coverage, ComponentMap, Coverage};
pub use constraints::{GridConstraints, POWER_EPSILON_MW};
pub use model::{rate_lines, FlowResolver};
pub use snapshot::{ComponentFlow, FlowSummary};
