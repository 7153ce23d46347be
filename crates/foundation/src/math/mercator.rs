//! Spherical Web Mercator helpers and ZXY tile addressing.

use std::f64::consts::PI;

use super::LngLat;

/// Equatorial circumference used by Web Mercator (meters).
pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.685_578_49;

/// Tile size in CSS pixels that map zoom levels are defined against.
pub const TILE_SIZE_PX: f64 = 512.0;

/// Web Mercator latitude limit (degrees).
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Position in the unit Mercator square: x grows east, y grows south.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MercatorCoord {
    pub x: f64,
    pub y: f64,
}

pub fn lng_lat_to_mercator(p: LngLat) -> MercatorCoord {
    let lat = p.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (p.lng + 180.0) / 360.0;
    let y = 0.5 - (PI / 4.0 + lat / 2.0).tan().ln() / (2.0 * PI);
    MercatorCoord { x, y }
}

pub fn mercator_to_lng_lat(m: MercatorCoord) -> LngLat {
    let lng = m.x * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * m.y);
    let lat = n.sinh().atan().to_degrees();
    LngLat::new(lng, lat)
}

/// Ground resolution at `lat_deg` for a fractional map zoom.
pub fn meters_per_pixel(lat_deg: f64, zoom: f64) -> f64 {
    EARTH_CIRCUMFERENCE_M * lat_deg.to_radians().cos() / (TILE_SIZE_PX * 2f64.powf(zoom))
}

/// Tile coordinate in ZXY scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Tile at zoom `z` containing `p`.
    pub fn containing(p: LngLat, z: u8) -> Self {
        let n = (1u64 << z) as f64;
        let m = lng_lat_to_mercator(p);
        let max = (1u64 << z) - 1;
        let x = ((m.x * n).floor().max(0.0) as u64).min(max) as u32;
        let y = ((m.y * n).floor().max(0.0) as u64).min(max) as u32;
        Self { z, x, y }
    }

    /// Geographic bounds as (west, south, east, north) in degrees.
    pub fn bounds_lng_lat(&self) -> (f64, f64, f64, f64) {
        let nw = self.point_to_lng_lat(0.0, 0.0, 1);
        let se = self.point_to_lng_lat(1.0, 1.0, 1);
        (nw.lng, se.lat, se.lng, nw.lat)
    }

    /// Maps a tile-local coordinate in `[0, extent]` to longitude/latitude.
    pub fn point_to_lng_lat(&self, u: f64, v: f64, extent: u32) -> LngLat {
        let extent = f64::from(extent.max(1));
        let n = (1u64 << self.z) as f64;
        mercator_to_lng_lat(MercatorCoord {
            x: (f64::from(self.x) + u / extent) / n,
            y: (f64::from(self.y) + v / extent) / n,
        })
    }

    /// All tiles at zoom `z` overlapping the (west, south, east, north) box,
    /// in row-major order.
    pub fn covering(west: f64, south: f64, east: f64, north: f64, z: u8) -> Vec<TileCoord> {
        let a = Self::containing(LngLat::new(west, north), z);
        let b = Self::containing(LngLat::new(east, south), z);
        let mut out = Vec::new();
        for y in a.y.min(b.y)..=a.y.max(b.y) {
            for x in a.x.min(b.x)..=a.x.max(b.x) {
                out.push(TileCoord::new(z, x, y));
            }
        }
        out
    }
}
