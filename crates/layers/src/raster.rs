use foundation::math::TileCoord;

use crate::layer::Layer;
use crate::source::tile_url;
use crate::style::{RASTER_LAYER_ID, RASTER_SOURCE_ID};

/// Base map imagery. Only tile addressing lives here; drawing is left to the host page.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayer {
    id: String,
    source: String,
    pub template: String,
    pub max_zoom: u8,
}

impl RasterLayer {
    pub fn new(id: impl Into<String>, source: impl Into<String>, template: impl Into<String>, max_zoom: u8) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            template: template.into(),
            max_zoom,
        }
    }

    pub fn osm() -> Self {
        Self::new(RASTER_LAYER_ID, RASTER_SOURCE_ID, crate::source::OSM_RASTER_TILES, 19)
    }

    /// Tile URLs covering a (west, south, east, north) box at `zoom`, capped at the source max zoom.
    pub fn tile_urls(&self, bounds: (f64, f64, f64, f64), zoom: f64) -> Vec<String> {
        let z = zoom.floor().clamp(0.0, f64::from(self.max_zoom)) as u8;
        let (w, s, e, n) = bounds;
        TileCoord::covering(w, s, e, n, z)
            .into_iter()
            .map(|t| tile_url(&self.template, t))
            .collect()
    }
}

impl Layer for RasterLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::RasterLayer;
    use crate::layer::Layer;

    #[test]
    fn covering_urls_cap_zoom() {
        let layer = RasterLayer::osm();
        assert!(!layer.pickable());
        let urls = layer.tile_urls((15.98, 45.81, 15.985, 45.82), 23.4);
        assert!(!urls.is_empty());
        assert!(urls.iter().all(|u| u.starts_with("https://tile.openstreetmap.org/19/")));
    }
}
