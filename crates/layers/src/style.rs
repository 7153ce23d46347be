//! MapLibre-compatible style documents.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::expression::{Expression, ExpressionError, GeometryType};
use crate::source::Source;
use crate::symbology::{Color, FillExtrusionPaint};

pub const RASTER_SOURCE_ID: &str = "osm";
pub const RASTER_LAYER_ID: &str = "osm";
pub const BUILDINGS_SOURCE_ID: &str = "osm-buildings";
pub const BUILDINGS_LAYER_ID: &str = "buildings-3d";
pub const BUILDINGS_SOURCE_LAYER: &str = "building";
pub const TILESET_SOURCE_ID: &str = "tileset";
pub const TILESET_LAYER_ID: &str = "tileset-3d";

/// Layers whose features answer clicks.
pub const INTERACTIVE_LAYER_IDS: [&str; 2] = [BUILDINGS_LAYER_ID, TILESET_LAYER_ID];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    Background,
    Raster,
    FillExtrusion,
    #[serde(rename = "3d-tiles")]
    Tileset,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleLayer {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "source-layer", default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    #[serde(rename = "minzoom", default, skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Json>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub paint: Map<String, Json>,
}

impl StyleLayer {
    fn new(id: &str, kind: LayerKind, source: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            kind,
            source: source.map(str::to_string),
            source_layer: None,
            min_zoom: None,
            filter: None,
            paint: Map::new(),
        }
    }

    pub fn raster(id: &str, source: &str) -> Self {
        Self {
            min_zoom: Some(0.0),
            ..Self::new(id, LayerKind::Raster, Some(source))
        }
    }

    pub fn fill_extrusion(id: &str, source: &str, source_layer: &str, paint: &FillExtrusionPaint) -> Self {
        let paint = match paint.to_json() {
            Json::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            source_layer: Some(source_layer.to_string()),
            filter: Some(Expression::GeometryTypeEq(GeometryType::Polygon.as_str().into()).to_json()),
            paint,
            ..Self::new(id, LayerKind::FillExtrusion, Some(source))
        }
    }

    pub fn tileset(id: &str, source: &str) -> Self {
        Self::new(id, LayerKind::Tileset, Some(source))
    }

    /// Typed paint of a fill-extrusion layer.
    pub fn fill_extrusion_paint(&self) -> Option<Result<FillExtrusionPaint, ExpressionError>> {
        (self.kind == LayerKind::FillExtrusion).then(|| FillExtrusionPaint::from_json(&self.paint))
    }

    pub fn filter_expression(&self) -> Option<Result<Expression, ExpressionError>> {
        self.filter.as_ref().map(Expression::from_json)
    }
}

#[derive(Debug)]
pub enum StyleError {
    Json(serde_json::Error),
    UnsupportedVersion(u32),
}

impl fmt::Display for StyleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleError::Json(err) => write!(f, "invalid style document: {err}"),
            StyleError::UnsupportedVersion(v) => write!(f, "unsupported style version {v}, expected 8"),
        }
    }
}

impl std::error::Error for StyleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StyleError::Json(err) => Some(err),
            StyleError::UnsupportedVersion(_) => None,
        }
    }
}

impl From<serde_json::Error> for StyleError {
    fn from(err: serde_json::Error) -> Self {
        StyleError::Json(err)
    }
}

/// A style document (version 8). Keys this crate does not model (sprite,
/// glyphs, metadata) are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub sources: BTreeMap<String, Source>,
    #[serde(default)]
    pub layers: Vec<StyleLayer>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

impl StyleDocument {
    pub fn empty() -> Self {
        Self {
            version: 8,
            name: None,
            sources: BTreeMap::new(),
            layers: Vec::new(),
            extra: Map::new(),
        }
    }

    /// OSM raster base plus extruded buildings from the OpenMapTiles `building` layer.
    pub fn buildings(highlight: Option<Color>) -> Self {
        let mut doc = Self::empty();
        doc.sources.insert(RASTER_SOURCE_ID.to_string(), Source::osm_raster());
        doc.sources.insert(BUILDINGS_SOURCE_ID.to_string(), Source::building_vector());
        doc.layers.push(StyleLayer::raster(RASTER_LAYER_ID, RASTER_SOURCE_ID));
        doc.layers.push(StyleLayer::fill_extrusion(
            BUILDINGS_LAYER_ID,
            BUILDINGS_SOURCE_ID,
            BUILDINGS_SOURCE_LAYER,
            &FillExtrusionPaint::buildings(highlight),
        ));
        doc
    }

    /// `base` with a pickable 3D tileset layered on top.
    pub fn with_tileset(mut self, tileset_url: &str) -> Self {
        self.sources
            .insert(TILESET_SOURCE_ID.to_string(), Source::tileset(tileset_url));
        self.layers.retain(|l| l.id != TILESET_LAYER_ID);
        self.layers.push(StyleLayer::tileset(TILESET_LAYER_ID, TILESET_SOURCE_ID));
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, StyleError> {
        let doc: StyleDocument = serde_json::from_str(s)?;
        if doc.version != 8 {
            return Err(StyleError::UnsupportedVersion(doc.version));
        }
        Ok(doc)
    }

    pub fn to_json_string(&self) -> Result<String, StyleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn layer(&self, id: &str) -> Option<&StyleLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Color of the first `background` layer, if it is a plain hex color.
    pub fn background_color(&self) -> Option<Color> {
        self.layers
            .iter()
            .find(|l| l.kind == LayerKind::Background)
            .and_then(|l| l.paint.get("background-color"))
            .and_then(Json::as_str)
            .and_then(|s| Color::from_hex(s).ok())
    }

    pub fn interactive_layer_ids(&self) -> Vec<&str> {
        self.layers
            .iter()
            .map(|l| l.id.as_str())
            .filter(|id| INTERACTIVE_LAYER_IDS.contains(id))
            .collect()
    }

    /// Sources feeding the interactive layers; picks from other sources are ignored.
    pub fn interactive_sources(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .layers
            .iter()
            .filter(|l| INTERACTIVE_LAYER_IDS.contains(&l.id.as_str()))
            .filter_map(|l| l.source.as_deref())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerKind, StyleDocument, StyleError};
    use crate::symbology::FillExtrusionPaint;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn buildings_style_layers() {
        let doc = StyleDocument::buildings(None);
        let ids: Vec<&str> = doc.layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["osm", "buildings-3d"]);
        assert_eq!(doc.interactive_layer_ids(), vec!["buildings-3d"]);
        assert_eq!(doc.interactive_sources(), vec!["osm-buildings"]);

        let layer = doc.layer("buildings-3d").expect("layer");
        assert_eq!(layer.source_layer.as_deref(), Some("building"));
        assert_eq!(layer.filter, Some(json!(["==", "$type", "Polygon"])));
        let paint = layer.fill_extrusion_paint().expect("fill-extrusion").expect("paint");
        assert_eq!(paint, FillExtrusionPaint::buildings(None));
    }

    #[test]
    fn serializes_as_maplibre_json() {
        let json = serde_json::to_value(StyleDocument::buildings(None)).expect("json");
        assert_eq!(json["version"], json!(8));
        assert_eq!(json["layers"][1]["type"], json!("fill-extrusion"));
        assert_eq!(json["layers"][1]["paint"]["fill-extrusion-opacity"].as_f64().map(|o| (o * 100.0).round()), Some(85.0));
        assert_eq!(json["sources"]["osm-buildings"]["maxzoom"], json!(14));
        assert_eq!(
            json["layers"][1]["paint"]["fill-extrusion-height"],
            json!(["case", ["has", "height"], ["get", "height"], ["has", "levels"], ["*", ["get", "levels"], 3], 15])
        );
    }

    #[test]
    fn parses_fetched_base_style() {
        let text = json!({
            "version": 8,
            "name": "Positron",
            "glyphs": "https://example.com/{fontstack}/{range}.pbf",
            "sources": {
                "carto": {"type": "vector", "url": "https://example.com/tiles.json"},
                "dem": {"type": "raster-dem", "url": "https://example.com/dem.json"}
            },
            "layers": [
                {"id": "background", "type": "background", "paint": {"background-color": "#fafaf8"}},
                {"id": "water", "type": "fill", "source": "carto", "source-layer": "water"}
            ]
        })
        .to_string();

        let doc = StyleDocument::from_json_str(&text).expect("style").with_tileset("https://example.com/tileset.json");
        assert_eq!(doc.layers[1].kind, LayerKind::Other);
        assert_eq!(doc.background_color().map(|c| c.to_hex()), Some("#fafaf8".to_string()));
        assert_eq!(doc.interactive_layer_ids(), vec!["tileset-3d"]);
        assert_eq!(doc.interactive_sources(), vec!["tileset"]);
        assert!(doc.extra.contains_key("glyphs"));
    }

    #[test]
    fn rejects_other_versions() {
        let err = StyleDocument::from_json_str(r#"{"version": 7, "sources": {}, "layers": []}"#).unwrap_err();
        assert!(matches!(err, StyleError::UnsupportedVersion(7)));
        assert!(StyleDocument::from_json_str("not json").is_err());
    }
}
