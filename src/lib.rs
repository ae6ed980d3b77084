//! National grid simulation engine
//!
//! A fixed-step simulation of a national power grid: towns with growing
//! demand, player-built plants, substations, storage and transmission lines,
//! greedy priority-ordered flow allocation, incidents, an economy with
//! reliability and public trust, and procedural town emergence.

pub mod config;
pub mod domain;
pub mod error;
pub mod grid;
pub mod power_flow;
pub mod runner;
pub mod simulation;
pub mod telemetry;
pub mod terrain;
