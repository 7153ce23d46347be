//! Offline helpers behind the `map3d` binary.

use std::fmt;

use formats::{FeatureCollection, GeoJsonError, Region, Tileset, TilesetError};
use foundation::math::LngLat;
use layers::style::{StyleDocument, StyleError};
use layers::symbology::{Color, ColorError};
use serde::Serialize;
use tracing::info;
use viewer_web::{ConfigError, InfoDialog, MapHost, ViewerConfig};

#[derive(Debug)]
pub enum ToolError {
    Io(std::io::Error),
    Color(ColorError),
    Style(StyleError),
    GeoJson(GeoJsonError),
    Tileset(TilesetError),
    Config(ConfigError),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Io(err) => write!(f, "{err}"),
            ToolError::Color(err) => write!(f, "{err}"),
            ToolError::Style(err) => write!(f, "{err}"),
            ToolError::GeoJson(err) => write!(f, "{err}"),
            ToolError::Tileset(err) => write!(f, "{err}"),
            ToolError::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::Io(err)
    }
}

impl From<ColorError> for ToolError {
    fn from(err: ColorError) -> Self {
        ToolError::Color(err)
    }
}

impl From<StyleError> for ToolError {
    fn from(err: StyleError) -> Self {
        ToolError::Style(err)
    }
}

impl From<GeoJsonError> for ToolError {
    fn from(err: GeoJsonError) -> Self {
        ToolError::GeoJson(err)
    }
}

impl From<TilesetError> for ToolError {
    fn from(err: TilesetError) -> Self {
        ToolError::Tileset(err)
    }
}

impl From<ConfigError> for ToolError {
    fn from(err: ConfigError) -> Self {
        ToolError::Config(err)
    }
}

/// The buildings style as pretty JSON.
pub fn style_json(highlight: Option<&str>) -> Result<String, ToolError> {
    let highlight = highlight.map(Color::from_hex).transpose()?;
    Ok(StyleDocument::buildings(highlight).to_json_string()?)
}

/// Loads `geojson` and clicks top-down at `at`, as the map would.
pub fn inspect(geojson: &str, at: LngLat) -> Result<Option<InfoDialog>, ToolError> {
    let collection = FeatureCollection::from_geojson_str(geojson)?;
    let mut config = ViewerConfig::buildings();
    config.view.longitude = at.lng;
    config.view.latitude = at.lat;

    let mut host = MapHost::new(config)?;
    let report = host.load_features(&collection.features);
    info!(spawned = report.spawned, merged = report.merged, skipped = report.skipped, "features loaded");
    host.mark_loaded();
    host.click_lng_lat(at);
    Ok(host.dialog())
}

/// Plain-text rendering of a dialog for the terminal.
pub fn dialog_text(dialog: &InfoDialog) -> String {
    let mut out = format!(
        "{}\n{}\nCoordinates: {}\n",
        dialog.title, dialog.description, dialog.coordinates
    );
    let width = dialog.rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
    for row in &dialog.rows {
        out.push_str(&format!("  {:<width$}  {}\n", row.label, row.value));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafSummary {
    pub uri: String,
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub min_height: f64,
    pub max_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TilesetSummary {
    pub version: String,
    pub tiles: usize,
    pub leaves: Vec<LeafSummary>,
    /// Leaves whose bounding volume can't be placed on the globe.
    pub unplaced: usize,
}

pub fn tileset_summary(json: &str) -> Result<TilesetSummary, ToolError> {
    let tileset = Tileset::from_json_str(json)?;
    let mut leaves = Vec::new();
    let mut unplaced = 0;
    for tile in tileset.leaf_contents() {
        let uri = tile
            .content
            .as_ref()
            .and_then(|c| c.uri())
            .unwrap_or_default()
            .to_string();
        match tile.bounding_volume.approximate_region() {
            Some(Region {
                west,
                south,
                east,
                north,
                min_height,
                max_height,
            }) => leaves.push(LeafSummary {
                uri,
                west,
                south,
                east,
                north,
                min_height,
                max_height,
            }),
            None => unplaced += 1,
        }
    }
    Ok(TilesetSummary {
        version: tileset.asset.version.clone(),
        tiles: tileset.tile_count(),
        leaves,
        unplaced,
    })
}

#[cfg(test)]
mod tests {
    use super::{ToolError, dialog_text, inspect, style_json, tileset_summary};
    use foundation::math::LngLat;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn geojson() -> String {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "id": 11,
                "properties": {"name": "Tower", "height": 42, "roof_shape": "flat", "note": null},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [15.9810, 45.8140], [15.9830, 45.8140], [15.9830, 45.8160], [15.9810, 45.8160], [15.9810, 45.8140]
                ]]}
            }]
        })
        .to_string()
    }

    #[test]
    fn inspect_hits_and_misses() {
        let dialog = inspect(&geojson(), LngLat::new(15.982, 45.815)).expect("inspect").expect("dialog");
        assert_eq!(dialog.coordinates, "15.9820, 45.8150");
        assert_eq!(
            dialog_text(&dialog),
            "Building Information\nDetails about the selected building and its properties\nCoordinates: 15.9820, 45.8150\n  name        Tower\n  height      42\n  roof shape  flat\n"
        );

        assert!(inspect(&geojson(), LngLat::new(15.99, 45.815)).expect("inspect").is_none());
    }

    #[test]
    fn style_honors_highlight() {
        let text = style_json(Some("#00ff00")).expect("style");
        assert!(text.contains("#00ff00"));
        assert!(matches!(style_json(Some("green")), Err(ToolError::Color(_))));
    }

    #[test]
    fn summarizes_tileset() {
        let r = |d: f64| d.to_radians();
        let doc = json!({
            "asset": {"version": "1.0"},
            "geometricError": 10.0,
            "root": {
                "boundingVolume": {"region": [r(1.0), r(2.0), r(3.0), r(4.0), 0.0, 10.0]},
                "geometricError": 5.0,
                "children": [
                    {"boundingVolume": {"region": [r(1.0), r(2.0), r(2.0), r(3.0), 0.0, 10.0]}, "geometricError": 0.0, "content": {"uri": "a.b3dm"}},
                    {"boundingVolume": {"box": [0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1]}, "geometricError": 0.0, "content": {"uri": "b.b3dm"}}
                ]
            }
        });
        let summary = tileset_summary(&doc.to_string()).expect("summary");
        assert_eq!(summary.tiles, 3);
        assert_eq!(summary.unplaced, 1);
        assert_eq!(summary.leaves.len(), 1);
        assert_eq!(summary.leaves[0].uri, "a.b3dm");
        assert!((summary.leaves[0].east - 2.0).abs() < 1e-9);
    }
}
