use std::fmt;

use layers::symbology::{Color, ColorError};
use scene::camera::ViewState;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TILESET_URL: &str =
    "https://raw.githubusercontent.com/CesiumGS/3d-tiles-samples/main/1.0/TilesetWithDiscreteLOD/tileset.json";
pub const DEFAULT_STYLE_URL: &str = "https://basemaps.cartocdn.com/gl/positron-gl-style/style.json";
pub const DEFAULT_CANVAS_ID: &str = "map3d-canvas";
pub const DEFAULT_DIALOG_ROOT_ID: &str = "map3d-dialog";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Extruded OpenMapTiles buildings over an OSM raster base.
    #[default]
    Buildings,
    /// A 3D tileset over a fetched base style.
    Tileset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerConfig {
    pub variant: Variant,
    pub view: ViewState,
    pub tileset_url: Option<String>,
    pub style_url: Option<String>,
    pub highlight_color: Option<String>,
    pub canvas_id: String,
    pub dialog_root_id: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::buildings()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    HighlightColor(ColorError),
    EmptyElementId(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(err) => write!(f, "invalid viewer config: {err}"),
            ConfigError::HighlightColor(err) => write!(f, "invalid highlight color: {err}"),
            ConfigError::EmptyElementId(field) => write!(f, "{field} must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(err) => Some(err),
            ConfigError::HighlightColor(err) => Some(err),
            ConfigError::EmptyElementId(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

impl ViewerConfig {
    pub fn buildings() -> Self {
        Self {
            variant: Variant::Buildings,
            view: ViewState::initial(),
            tileset_url: None,
            style_url: None,
            highlight_color: None,
            canvas_id: DEFAULT_CANVAS_ID.to_string(),
            dialog_root_id: DEFAULT_DIALOG_ROOT_ID.to_string(),
        }
    }

    /// Tileset variant. `None` overrides fall back to the default endpoints.
    pub fn tileset(tileset_url: Option<String>, style_url: Option<String>) -> Self {
        Self {
            variant: Variant::Tileset,
            tileset_url: Some(non_blank(tileset_url).unwrap_or_else(|| DEFAULT_TILESET_URL.to_string())),
            style_url: Some(non_blank(style_url).unwrap_or_else(|| DEFAULT_STYLE_URL.to_string())),
            ..Self::buildings()
        }
    }

    /// Parses a page-provided config object and fills in missing URLs.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let mut config: ViewerConfig = serde_json::from_str(s)?;
        if config.variant == Variant::Tileset {
            let defaults = Self::tileset(config.tileset_url.take(), config.style_url.take());
            config.tileset_url = defaults.tileset_url;
            config.style_url = defaults.style_url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_id.trim().is_empty() {
            return Err(ConfigError::EmptyElementId("canvasId"));
        }
        if self.dialog_root_id.trim().is_empty() {
            return Err(ConfigError::EmptyElementId("dialogRootId"));
        }
        self.highlight()?;
        Ok(())
    }

    pub fn highlight(&self) -> Result<Option<Color>, ConfigError> {
        self.highlight_color
            .as_deref()
            .map(Color::from_hex)
            .transpose()
            .map_err(ConfigError::HighlightColor)
    }

    pub fn tileset_url(&self) -> &str {
        self.tileset_url.as_deref().unwrap_or(DEFAULT_TILESET_URL)
    }

    pub fn style_url(&self) -> &str {
        self.style_url.as_deref().unwrap_or(DEFAULT_STYLE_URL)
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
