//! # Static Map Model
//!
//! Authored map documents: world bounds, seed towns, suggested link routes,
//! resource-zone polygons and the terrain image reference. Documents are
//! normalized on load so that every downstream stage can rely on complete
//! records.

use super::normalize::{array, finite, opt_text, text};
use super::types::{clamp, Climate, Point, ResourceKind, ResourceProfile, Terrain};
use crate::error::SimError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

pub const MIN_WORLD_WIDTH: f64 = 600.0;
pub const MIN_WORLD_HEIGHT: f64 = 400.0;

/// Radial sample count per ring used for zone coverage
const ZONE_SAMPLE_ANGLES: usize = 12;
const ZONE_INNER_RING: f64 = 0.55;
const ZONE_OUTER_RING: f64 = 0.92;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapTown {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub position: Point,
    pub radius: f64,
    pub district_type: String,
    pub terrain: Terrain,
    pub climate: Climate,
    pub base_demand: f64,
    pub population: f64,
    pub growth_rate: f64,
    pub strategic_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLink {
    pub id: String,
    pub a: String,
    pub b: String,
    pub tier: String,
    pub capacity: f64,
    pub build_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceZone {
    pub id: String,
    pub resource: ResourceKind,
    pub polygon: Vec<Point>,
    pub centroid: Point,
}

impl ResourceZone {
    pub fn new(id: String, resource: ResourceKind, polygon: Vec<Point>) -> Self {
        let centroid = polygon_centroid(&polygon);
        Self {
            id,
            resource,
            polygon,
            centroid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainMapRef {
    pub image_url: Option<String>,
    pub metadata_url: Option<String>,
}

/// Normalized static map document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticMap {
    pub id: String,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub towns: Vec<MapTown>,
    pub links: Vec<MapLink>,
    pub resource_zones: Vec<ResourceZone>,
    pub terrain_map: TerrainMapRef,
}

impl StaticMap {
    /// Read and normalize a map document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SimError> {
        let document: Value = serde_json::from_str(raw)?;
        Self::from_value(&document)
    }

    /// Normalize a parsed map document
    ///
    /// A document without towns is rejected; every other field falls back to
    /// defaults, and malformed links or zones are dropped.
    pub fn from_value(document: &Value) -> Result<Self, SimError> {
        if !document.is_object() {
            return Err(SimError::Map("map document must be a JSON object".into()));
        }
        let source_towns = array(document.get("towns"));
        if source_towns.is_empty() {
            return Err(SimError::Map("map document has no towns".into()));
        }

        let towns: Vec<MapTown> = source_towns
            .iter()
            .enumerate()
            .map(|(index, raw)| normalize_town(raw, index))
            .collect();

        let links: Vec<MapLink> = array(document.get("links"))
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| normalize_link(raw, index))
            .collect();

        let source_zones = array(document.get("resourceZones"));
        let resource_zones: Vec<ResourceZone> = source_zones
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| normalize_zone(raw, index))
            .collect();
        if resource_zones.len() < source_zones.len() {
            warn!(
                dropped = source_zones.len() - resource_zones.len(),
                "dropped malformed resource zones"
            );
        }

        let world = document.get("world");
        let width = finite(world.and_then(|w| w.get("width")), 1600.0).max(MIN_WORLD_WIDTH);
        let height = finite(world.and_then(|w| w.get("height")), 1000.0).max(MIN_WORLD_HEIGHT);

        let terrain = document.get("terrainMap");
        let terrain_map = TerrainMapRef {
            image_url: opt_text(terrain.and_then(|t| t.get("imageUrl"))),
            metadata_url: opt_text(terrain.and_then(|t| t.get("metadataUrl"))),
        };

        let map = Self {
            id: text(document.get("mapId"), "national-core"),
            name: text(document.get("displayName"), "National Grid Core"),
            width,
            height,
            towns,
            links,
            resource_zones,
            terrain_map,
        };
        debug!(
            map = %map.id,
            towns = map.towns.len(),
            links = map.links.len(),
            zones = map.resource_zones.len(),
            "map document normalized"
        );
        Ok(map)
    }

    pub fn town(&self, id: &str) -> Option<&MapTown> {
        self.towns.iter().find(|town| town.id == id)
    }

    /// Clamp a point into the world rectangle
    pub fn clamp_point(&self, point: Point) -> Point {
        Point::new(
            clamp(point.x, 0.0, self.width),
            clamp(point.y, 0.0, self.height),
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0.0 && point.x <= self.width && point.y >= 0.0 && point.y <= self.height
    }

    /// Replace resource zones with zones from a terrain metadata document
    ///
    /// Metadata polygons are authored in image pixels; they are scaled into
    /// world units using the metadata image size, or `image_size` when the
    /// metadata does not carry one. Returns the number of zones applied; the
    /// existing zones are kept when the metadata yields none.
    pub fn apply_zone_metadata(&mut self, metadata: &Value, image_size: Option<(u32, u32)>) -> usize {
        let raw_zones = match metadata.get("resourceZones").or_else(|| metadata.get("resource_zones")) {
            Some(Value::Array(zones)) if !zones.is_empty() => zones,
            _ => return 0,
        };

        let image = metadata.get("image");
        let (fallback_w, fallback_h) = image_size
            .map(|(w, h)| (w as f64, h as f64))
            .unwrap_or((self.width, self.height));
        let source_w = positive(finite(image.and_then(|i| i.get("width")), 0.0), fallback_w);
        let source_h = positive(finite(image.and_then(|i| i.get("height")), 0.0), fallback_h);
        let scale_x = self.width / source_w.max(1.0);
        let scale_y = self.height / source_h.max(1.0);

        let mut zones = Vec::new();
        for raw in raw_zones {
            let points = array(raw.get("polygon"));
            if points.len() < 3 {
                continue;
            }
            let Some(resource) = raw
                .get("resource")
                .and_then(Value::as_str)
                .and_then(|r| r.parse::<ResourceKind>().ok())
            else {
                continue;
            };
            let polygon: Vec<Point> = points
                .iter()
                .map(|p| {
                    Point::new(
                        clamp(finite(p.get("x"), 0.0) * scale_x, 0.0, self.width),
                        clamp(finite(p.get("y"), 0.0) * scale_y, 0.0, self.height),
                    )
                })
                .collect();
            let id = text(raw.get("id"), &format!("zone-{}", zones.len() + 1));
            zones.push(ResourceZone::new(id, resource, polygon));
        }

        if zones.is_empty() {
            return 0;
        }
        let applied = zones.len();
        self.resource_zones = zones;
        debug!(applied, scale_x, scale_y, "resource zones loaded from terrain metadata");
        applied
    }

    /// Resource weights for a circular footprint
    pub fn resource_profile_at(&self, center: Point, radius: f64) -> ResourceProfile {
        resource_profile_for(&self.resource_zones, center, radius)
    }
}

fn positive(value: f64, fallback: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        fallback
    }
}

fn normalize_town(raw: &Value, index: usize) -> MapTown {
    let ordinal = index + 1;
    MapTown {
        id: text(raw.get("id"), &format!("town-{ordinal}")),
        name: text(raw.get("name"), &format!("Town {ordinal}")),
        position: Point::new(finite(raw.get("x"), 0.0), finite(raw.get("y"), 0.0)),
        radius: finite(raw.get("radius"), 56.0).max(20.0),
        district_type: text(raw.get("districtType"), "Rural Cluster"),
        terrain: Terrain::from(text(raw.get("terrain"), "plains")),
        climate: Climate::from(text(raw.get("climate"), "temperate")),
        base_demand: finite(raw.get("baseDemand"), 40.0).max(0.0),
        population: finite(raw.get("population"), 20.0).max(0.0),
        growth_rate: finite(raw.get("growthRate"), 0.3).max(0.0),
        strategic_value: text(raw.get("strategicValue"), ""),
    }
}

fn normalize_link(raw: &Value, index: usize) -> Option<MapLink> {
    let a = opt_text(raw.get("a"))?;
    let b = opt_text(raw.get("b"))?;
    Some(MapLink {
        id: text(raw.get("id"), &format!("link-{}", index + 1)),
        a,
        b,
        tier: text(raw.get("tier"), "regional"),
        capacity: finite(raw.get("capacity"), 0.0).max(0.0),
        build_cost: finite(raw.get("buildCost"), 0.0).max(0.0),
    })
}

fn normalize_zone(raw: &Value, index: usize) -> Option<ResourceZone> {
    let polygon: Vec<Point> = array(raw.get("polygon"))
        .iter()
        .filter_map(|p| {
            let x = finite(p.get("x"), f64::NAN);
            let y = finite(p.get("y"), f64::NAN);
            (x.is_finite() && y.is_finite()).then(|| Point::new(x, y))
        })
        .collect();
    if polygon.len() < 3 {
        return None;
    }
    let resource = raw.get("resource")?.as_str()?.parse::<ResourceKind>().ok()?;
    let id = text(raw.get("id"), &format!("resource-zone-{}", index + 1));
    Some(ResourceZone::new(id, resource, polygon))
}

/// Even-odd ray cast
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n == 0 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        let crosses = (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y).max(1e-6) + pi.x;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Vertex mean; origin for an empty polygon
pub fn polygon_centroid(polygon: &[Point]) -> Point {
    if polygon.is_empty() {
        return Point::default();
    }
    let n = polygon.len() as f64;
    let (sx, sy) = polygon
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Fraction of 25 radial samples inside the polygon
pub fn zone_coverage(center: Point, radius: f64, polygon: &[Point]) -> f64 {
    let mut samples = Vec::with_capacity(1 + ZONE_SAMPLE_ANGLES * 2);
    samples.push(center);
    for i in 0..ZONE_SAMPLE_ANGLES {
        let angle = std::f64::consts::TAU * i as f64 / ZONE_SAMPLE_ANGLES as f64;
        let (sin, cos) = angle.sin_cos();
        for ring in [ZONE_INNER_RING, ZONE_OUTER_RING] {
            samples.push(Point::new(
                center.x + cos * radius * ring,
                center.y + sin * radius * ring,
            ));
        }
    }
    let inside = samples
        .iter()
        .filter(|sample| point_in_polygon(**sample, polygon))
        .count();
    inside as f64 / samples.len() as f64
}

/// Resource weights from every zone overlapping a circular footprint
pub fn resource_profile_for(zones: &[ResourceZone], center: Point, radius: f64) -> ResourceProfile {
    let mut profile = ResourceProfile::default();
    for zone in zones {
        let coverage = zone_coverage(center, radius, &zone.polygon);
        if coverage > 0.0 {
            profile.add(zone.resource, coverage);
        }
    }
    profile
}
