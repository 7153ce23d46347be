use foundation::math::TileCoord;
use serde::{Deserialize, Serialize};

pub const OSM_RASTER_TILES: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const OSM_ATTRIBUTION: &str = "&copy; OpenStreetMap Contributors";
pub const BUILDING_VECTOR_TILES: &str = "https://tiles.stadiamaps.com/data/openmaptiles/{z}/{x}/{y}.pbf";
pub const BUILDING_MAX_ZOOM: u8 = 14;

/// A style source. Unknown source types in fetched styles are kept as `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Source {
    Raster {
        tiles: Vec<String>,
        #[serde(rename = "tileSize", default = "default_tile_size")]
        tile_size: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribution: Option<String>,
        #[serde(rename = "maxzoom", default, skip_serializing_if = "Option::is_none")]
        max_zoom: Option<u8>,
    },
    Vector {
        #[serde(default)]
        tiles: Vec<String>,
        #[serde(rename = "maxzoom", default, skip_serializing_if = "Option::is_none")]
        max_zoom: Option<u8>,
    },
    /// A 3D Tiles `tileset.json` endpoint.
    #[serde(rename = "3d-tiles")]
    Tileset { url: String },
    #[serde(other)]
    Other,
}

fn default_tile_size() -> u32 {
    512
}

impl Source {
    pub fn osm_raster() -> Self {
        Source::Raster {
            tiles: vec![OSM_RASTER_TILES.to_string()],
            tile_size: 256,
            attribution: Some(OSM_ATTRIBUTION.to_string()),
            max_zoom: Some(19),
        }
    }

    pub fn building_vector() -> Self {
        Source::Vector {
            tiles: vec![BUILDING_VECTOR_TILES.to_string()],
            max_zoom: Some(BUILDING_MAX_ZOOM),
        }
    }

    pub fn tileset(url: impl Into<String>) -> Self {
        Source::Tileset { url: url.into() }
    }

    /// First tile URL template, if this is a tiled source.
    pub fn tile_template(&self) -> Option<&str> {
        match self {
            Source::Raster { tiles, .. } | Source::Vector { tiles, .. } => {
                tiles.first().map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn max_zoom(&self) -> Option<u8> {
        match self {
            Source::Raster { max_zoom, .. } | Source::Vector { max_zoom, .. } => *max_zoom,
            _ => None,
        }
    }
}

/// Expands `{z}`, `{x}` and `{y}` in a tile URL template.
pub fn tile_url(template: &str, tile: TileCoord) -> String {
    template
        .replace("{z}", &tile.z.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
}
