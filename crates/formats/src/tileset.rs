//! 3D Tiles `tileset.json`.

use foundation::math::{Ecef, WGS84_A, ecef_to_geodetic};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    #[serde(default)]
    pub tileset_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tileset {
    pub asset: Asset,
    pub geometric_error: f64,
    pub root: Tile,
    #[serde(default)]
    pub extras: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub bounding_volume: BoundingVolume,
    pub geometric_error: f64,
    #[serde(default)]
    pub refine: Option<String>,
    #[serde(default)]
    pub content: Option<TileContent>,
    #[serde(default)]
    pub children: Vec<Tile>,
    #[serde(default)]
    pub extras: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TileContent {
    #[serde(default)]
    pub uri: Option<String>,
    /// Pre-1.0 tilesets name the field `url`.
    #[serde(default)]
    pub url: Option<String>,
}

impl TileContent {
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref().or(self.url.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoundingVolume {
    #[serde(default)]
    pub region: Option<[f64; 6]>,
    #[serde(rename = "box", default)]
    pub obb: Option<[f64; 12]>,
    #[serde(default)]
    pub sphere: Option<[f64; 4]>,
}

/// Geographic box in degrees and meters above the ellipsoid.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Region {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub min_height: f64,
    pub max_height: f64,
}

impl BoundingVolume {
    /// The `region` volume converted from radians to degrees.
    pub fn region_lng_lat(&self) -> Option<Region> {
        let [w, s, e, n, min_h, max_h] = self.region?;
        Some(Region {
            west: w.to_degrees(),
            south: s.to_degrees(),
            east: e.to_degrees(),
            north: n.to_degrees(),
            min_height: min_h,
            max_height: max_h,
        })
    }

    /// Best geographic approximation of any volume kind.
    ///
    /// `box` and `sphere` are treated as spheres around an ECEF center. Volumes
    /// centered near the Earth's core are in a local frame and can't be placed.
    pub fn approximate_region(&self) -> Option<Region> {
        if let Some(region) = self.region_lng_lat() {
            return Some(region);
        }
        let (center, radius) = match (self.obb, self.sphere) {
            (Some(b), _) => {
                let half = |i: usize| (b[i] * b[i] + b[i + 1] * b[i + 1] + b[i + 2] * b[i + 2]).sqrt();
                let r = (half(3).powi(2) + half(6).powi(2) + half(9).powi(2)).sqrt();
                ([b[0], b[1], b[2]], r)
            }
            (None, Some(s)) => ([s[0], s[1], s[2]], s[3]),
            (None, None) => return None,
        };
        let center_norm = center.iter().map(|c| c * c).sum::<f64>().sqrt();
        if center_norm < WGS84_A * 0.5 {
            return None;
        }
        let geo = ecef_to_geodetic(Ecef::new(center[0], center[1], center[2]));
        let dlat = (radius / WGS84_A).to_degrees();
        let dlng = dlat / geo.lat_rad.cos().max(1e-6);
        let (lng, lat) = (geo.lon_rad.to_degrees(), geo.lat_rad.to_degrees());
        Some(Region {
            west: lng - dlng,
            south: lat - dlat,
            east: lng + dlng,
            north: lat + dlat,
            min_height: geo.alt_m - radius,
            max_height: geo.alt_m + radius,
        })
    }
}

#[derive(Debug)]
pub enum TilesetError {
    Json(serde_json::Error),
    UnsupportedVersion(String),
}

impl std::fmt::Display for TilesetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TilesetError::Json(err) => write!(f, "invalid tileset.json: {err}"),
            TilesetError::UnsupportedVersion(v) => write!(f, "unsupported 3D Tiles version {v}"),
        }
    }
}

impl std::error::Error for TilesetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TilesetError::Json(err) => Some(err),
            TilesetError::UnsupportedVersion(_) => None,
        }
    }
}

impl From<serde_json::Error> for TilesetError {
    fn from(err: serde_json::Error) -> Self {
        TilesetError::Json(err)
    }
}

impl Tileset {
    pub fn from_json_str(s: &str) -> Result<Self, TilesetError> {
        let tileset: Tileset = serde_json::from_str(s)?;
        if !(tileset.asset.version.starts_with("0.") || tileset.asset.version.starts_with("1.")) {
            return Err(TilesetError::UnsupportedVersion(tileset.asset.version));
        }
        Ok(tileset)
    }

    /// Tiles with content and no children, depth first.
    pub fn leaf_contents(&self) -> Vec<&Tile> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(tile) = stack.pop() {
            if tile.children.is_empty() {
                if tile.content.as_ref().and_then(TileContent::uri).is_some() {
                    out.push(tile);
                }
                continue;
            }
            stack.extend(tile.children.iter().rev());
        }
        out
    }

    pub fn tile_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(tile) = stack.pop() {
            count += 1;
            stack.extend(tile.children.iter());
        }
        count
    }
}
