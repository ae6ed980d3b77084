use super::{TerrainClass, TerrainClassifier};
use crate::domain::{clamp, Point};
use crate::error::SimError;

/// Minimum alpha for a pixel to be classified at all
const MIN_ALPHA: u8 = 8;

/// RGBA terrain image stretched over the map world
#[derive(Debug, Clone)]
pub struct RasterTerrain {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    world_width: f64,
    world_height: f64,
}

impl RasterTerrain {
    /// Wrap raw RGBA8 pixels
    pub fn from_rgba(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        world_width: f64,
        world_height: f64,
    ) -> Result<Self, SimError> {
        if width == 0 || height == 0 {
            return Err(SimError::Terrain("raster has zero size".into()));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(SimError::Terrain(format!(
                "expected {} RGBA bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
            world_width,
            world_height,
        })
    }

    /// Decode a PNG terrain image
    #[cfg(feature = "raster")]
    pub fn from_png_bytes(bytes: &[u8], world_width: f64, world_height: f64) -> Result<Self, SimError> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|e| SimError::Terrain(e.to_string()))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        Self::from_rgba(decoded.into_raw(), width, height, world_width, world_height)
    }

    #[cfg(feature = "raster")]
    pub fn load_png(path: impl AsRef<std::path::Path>, world_width: f64, world_height: f64) -> Result<Self, SimError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_png_bytes(&bytes, world_width, world_height)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// World point to nearest pixel, clamped into the image
    fn to_pixel(&self, point: Point) -> (i64, i64) {
        let map_axis = |value: f64, world: f64, pixels: u32| -> i64 {
            let world = world.max(1.0);
            let max = (pixels - 1) as f64;
            let scaled = (clamp(value, 0.0, world) / world * max).round();
            clamp(scaled, 0.0, max) as i64
        };
        (
            map_axis(point.x, self.world_width, self.width),
            map_axis(point.y, self.world_height, self.height),
        )
    }

    fn rgba(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let index = (y * self.width as usize + x) * 4;
        [
            self.pixels[index],
            self.pixels[index + 1],
            self.pixels[index + 2],
            self.pixels[index + 3],
        ]
    }

    fn classify_pixel(&self, x: i64, y: i64) -> TerrainClass {
        let [r, g, b, a] = self.rgba(x, y);
        if a < MIN_ALPHA {
            return TerrainClass::Land;
        }
        let (r, g, b) = (r as i32, g as i32, b as i32);
        if b >= 150 && b >= g + 20 && b >= r + 40 {
            TerrainClass::Water
        } else if r >= 220 && g >= 220 && b >= 220 {
            TerrainClass::Snow
        } else {
            TerrainClass::Land
        }
    }
}

impl TerrainClassifier for RasterTerrain {
    fn classify(&self, point: Point) -> TerrainClass {
        let (x, y) = self.to_pixel(point);
        self.classify_pixel(x, y)
    }

    fn count_crossings(&self, from: Point, to: Point) -> u32 {
        // Bresenham walk
        let (mut x0, mut y0) = self.to_pixel(from);
        let (x1, y1) = self.to_pixel(to);
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;
        let mut crossed = 0;

        loop {
            if self.classify_pixel(x0, y0).is_obstacle() {
                crossed += 1;
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let err2 = err * 2;
            if err2 > -dy {
                err -= dy;
                x0 += sx;
            }
            if err2 < dx {
                err += dx;
                y0 += sy;
            }
        }
        crossed
    }
}
