//! # Terrain Raster Sampler
//!
//! Classifies world points as water, snow or land and counts water/snow cells
//! along a straight segment. Line pricing and town emergence depend only on the
//! [`TerrainClassifier`] trait, so a map without a raster uses [`FlatTerrain`]
//! and tests can substitute a mock.

pub mod raster;

pub use raster::RasterTerrain;

use crate::domain::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainClass {
    Water,
    Snow,
    Land,
}

impl TerrainClass {
    /// Water and snow both add a crossing surcharge to line cost
    pub fn is_obstacle(&self) -> bool {
        matches!(self, TerrainClass::Water | TerrainClass::Snow)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait TerrainClassifier: Send + Sync {
    /// Class of the raster cell under a world point
    fn classify(&self, point: Point) -> TerrainClass;

    /// Water or snow cells on the segment, both endpoints included
    fn count_crossings(&self, from: Point, to: Point) -> u32;
}

/// Whether a world point sits on water
pub fn is_water(terrain: &dyn TerrainClassifier, point: Point) -> bool {
    terrain.classify(point) == TerrainClass::Water
}

/// Terrain used when no raster is loaded: land everywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain;

impl TerrainClassifier for FlatTerrain {
    fn classify(&self, _point: Point) -> TerrainClass {
        TerrainClass::Land
    }

    fn count_crossings(&self, _from: Point, _to: Point) -> u32 {
        0
    }
}
