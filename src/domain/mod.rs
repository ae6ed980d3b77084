pub mod entity;
pub mod incident;
pub mod line;
pub mod map;
pub mod normalize;
pub mod run_config;
pub mod types;

pub use entity::*;
pub use incident::*;
pub use line::*;
pub use map::{MapLink, MapTown, ResourceZone, StaticMap};
pub use run_config::*;
pub use types::*;
