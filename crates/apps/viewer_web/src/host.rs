use std::collections::VecDeque;

use foundation::math::{LngLat, LocalFrame, TileCoord};
use formats::{IngestReport, SourceFeature, Tileset, ingest_buildings, ingest_tileset};
use layers::buildings::{BuildingLayer, BuildingMesh};
use layers::layer::Layer;
use layers::raster::RasterLayer;
use layers::source::{BUILDING_MAX_ZOOM, tile_url};
use layers::style::{BUILDINGS_SOURCE_ID, StyleDocument, TILESET_SOURCE_ID};
use layers::symbology::FillExtrusionPaint;
use layers::tileset::TilesetLayer;
use runtime::{EventBus, MapEvent, RecordedEvent};
use scene::World;
use scene::camera::{Camera, ViewState};
use scene::feature_state::FeatureStateStore;
use scene::picking::{PickHit, PickOptions, pick_lng_lat, pick_screen};
use scene::selection::{PickedFeature, Selection, SelectionChange, SelectionState};
use tracing::{debug, info};

use crate::config::{ConfigError, Variant, ViewerConfig};
use crate::dialog::InfoDialog;

const DEFAULT_VIEWPORT: (f64, f64) = (1200.0, 800.0);
/// Above this many tiles the pitched view reaches too far; only the 3x3 block
/// around the center is fetched.
const MAX_VIEW_TILES: usize = 16;

/// The map component: data, style, camera and the single selection.
#[derive(Debug)]
pub struct MapHost {
    config: ViewerConfig,
    style: StyleDocument,
    camera: Camera,
    world: World,
    states: FeatureStateStore,
    selection: SelectionState,
    events: EventBus,
    raster: Option<RasterLayer>,
    buildings: BuildingLayer,
    tileset: Option<TilesetLayer>,
    mesh: BuildingMesh,
    stale: bool,
    changed: bool,
    loaded: bool,
}

impl MapHost {
    pub fn new(config: ViewerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let highlight = config.highlight()?;
        let (style, raster, tileset) = match config.variant {
            Variant::Buildings => (StyleDocument::buildings(highlight), Some(RasterLayer::osm()), None),
            Variant::Tileset => (
                StyleDocument::empty().with_tileset(config.tileset_url()),
                None,
                Some(TilesetLayer::new(config.tileset_url())),
            ),
        };
        let (w, h) = DEFAULT_VIEWPORT;
        Ok(Self {
            camera: Camera::from_view(config.view, w, h),
            buildings: BuildingLayer::osm(FillExtrusionPaint::buildings(highlight)),
            style,
            raster,
            tileset,
            config,
            world: World::new(),
            states: FeatureStateStore::new(),
            selection: SelectionState::new(),
            events: EventBus::new(),
            mesh: BuildingMesh::default(),
            stale: false,
            changed: false,
            loaded: false,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn style(&self) -> &StyleDocument {
        &self.style
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn feature_states(&self) -> &FeatureStateStore {
        &self.states
    }

    pub fn frame(&self) -> &LocalFrame {
        self.camera.frame()
    }

    /// Uses a fetched base style under the tileset layer.
    pub fn set_base_style(&mut self, base: StyleDocument) {
        self.style = match self.config.variant {
            Variant::Tileset => base.with_tileset(self.config.tileset_url()),
            Variant::Buildings => base,
        };
    }

    /// URLs of the building tiles under the current view, nearest zoom the source serves.
    pub fn building_tile_urls(&self) -> Vec<(TileCoord, String)> {
        let Some(template) = self
            .style
            .sources
            .get(BUILDINGS_SOURCE_ID)
            .and_then(|s| s.tile_template())
        else {
            return Vec::new();
        };
        let max_zoom = self
            .style
            .sources
            .get(BUILDINGS_SOURCE_ID)
            .and_then(|s| s.max_zoom())
            .unwrap_or(BUILDING_MAX_ZOOM);
        self.visible_tiles(max_zoom)
            .into_iter()
            .map(|tile| (tile, tile_url(template, tile)))
            .collect()
    }

    /// Base map tile URLs under the current view. Empty for the tileset variant.
    pub fn raster_tile_urls(&self) -> Vec<String> {
        let Some(raster) = &self.raster else {
            return Vec::new();
        };
        self.visible_tiles(raster.max_zoom)
            .into_iter()
            .map(|tile| tile_url(&raster.template, tile))
            .collect()
    }

    fn layers(&self) -> Vec<&dyn Layer> {
        let mut out: Vec<&dyn Layer> = Vec::new();
        if let Some(raster) = &self.raster {
            out.push(raster);
        }
        if self.config.variant == Variant::Buildings {
            out.push(&self.buildings);
        }
        if let Some(tileset) = &self.tileset {
            out.push(tileset);
        }
        out
    }

    fn visible_tiles(&self, max_zoom: u8) -> Vec<TileCoord> {
        let view = self.camera.view();
        let z = (view.zoom.floor().max(0.0) as u8).min(max_zoom);
        let center = TileCoord::containing(view.center(), z);
        let (w, h) = self.camera.viewport();

        let corners: Vec<LngLat> = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
            .into_iter()
            .filter_map(|(x, y)| self.camera.screen_ray(x, y))
            .filter_map(|ray| Camera::ground_point(&ray))
            .map(|p| self.camera.frame().to_lng_lat(p))
            .collect();
        if corners.len() == 4 {
            let west = corners.iter().map(|p| p.lng).fold(f64::INFINITY, f64::min);
            let east = corners.iter().map(|p| p.lng).fold(f64::NEG_INFINITY, f64::max);
            let south = corners.iter().map(|p| p.lat).fold(f64::INFINITY, f64::min);
            let north = corners.iter().map(|p| p.lat).fold(f64::NEG_INFINITY, f64::max);
            let tiles = TileCoord::covering(west, south, east, north, z);
            if tiles.len() <= MAX_VIEW_TILES {
                return tiles;
            }
        }

        let n = 1u32 << z;
        let mut out = Vec::new();
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let (x, y) = (i64::from(center.x) + dx, i64::from(center.y) + dy);
                if (0..i64::from(n)).contains(&x) && (0..i64::from(n)).contains(&y) {
                    out.push(TileCoord::new(z, x as u32, y as u32));
                }
            }
        }
        out
    }

    pub fn load_features(&mut self, features: &[SourceFeature]) -> IngestReport {
        let frame = *self.camera.frame();
        let report = ingest_buildings(&mut self.world, &frame, BUILDINGS_SOURCE_ID, features);
        self.invalidate();
        report
    }

    pub fn load_tileset(&mut self, tileset: &Tileset) -> IngestReport {
        let frame = *self.camera.frame();
        let report = ingest_tileset(&mut self.world, &frame, TILESET_SOURCE_ID, tileset);
        self.invalidate();
        report
    }

    /// Emits `Loaded` once.
    pub fn mark_loaded(&mut self) {
        if !self.loaded {
            self.loaded = true;
            info!(features = self.world.len(), "map loaded");
            self.events.emit(MapEvent::Loaded);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Pointer click at viewport pixel `(x, y)`.
    pub fn click_screen(&mut self, x_px: f64, y_px: f64) -> SelectionChange {
        self.refresh();
        let ray = self.camera.screen_ray(x_px, y_px);
        let ground = ray
            .as_ref()
            .and_then(Camera::ground_point)
            .map(|p| self.camera.frame().to_lng_lat(p));
        self.events.emit(MapEvent::Click {
            screen: Some([x_px, y_px]),
            coordinate: ground,
        });

        let camera = &self.camera;
        let hit = pick_screen(
            &self.world,
            x_px,
            y_px,
            |x, y| camera.screen_ray(x, y),
            PickOptions::default(),
        );
        let coordinate = match (ground, hit) {
            (Some(ground), _) => Some(ground),
            (None, Some(hit)) => Some(self.camera.frame().to_lng_lat(hit.point)),
            (None, None) => None,
        };
        self.apply_pick(hit, coordinate)
    }

    /// Click at a geographic position, picking top-down.
    pub fn click_lng_lat(&mut self, p: LngLat) -> SelectionChange {
        self.refresh();
        self.events.emit(MapEvent::Click {
            screen: None,
            coordinate: Some(p),
        });
        let hit = pick_lng_lat(&self.world, self.camera.frame(), p);
        self.apply_pick(hit, Some(p))
    }

    fn apply_pick(&mut self, hit: Option<PickHit>, coordinate: Option<LngLat>) -> SelectionChange {
        let picked = hit
            .zip(coordinate)
            .and_then(|(hit, coordinate)| self.picked_feature(hit, coordinate));
        let Some(picked) = picked else {
            self.events.emit(MapEvent::PickMissed);
            return SelectionChange::Ignored;
        };

        self.events.emit(MapEvent::FeaturePicked {
            key: picked.key.clone(),
        });
        let change = self.selection.select(Some(picked), &mut self.states);
        match &change {
            SelectionChange::Opened(key) | SelectionChange::Replaced { current: key, .. } => {
                self.events.emit(MapEvent::DialogOpened { key: key.clone() });
                self.invalidate();
            }
            SelectionChange::Ignored => {}
        }
        change
    }

    /// Picks count only on interactive layers of the current style.
    fn picked_feature(&self, hit: PickHit, coordinate: LngLat) -> Option<PickedFeature> {
        let key = self.world.feature(hit.entity)?;
        let on_pickable_layer = self
            .layers()
            .iter()
            .any(|l| l.pickable() && l.source() == key.source);
        if !on_pickable_layer || !self.style.interactive_sources().contains(&key.source.as_str()) {
            debug!(feature = %key, "pick on non-interactive source ignored");
            return None;
        }
        Some(PickedFeature {
            key: key.clone(),
            attributes: self.world.attributes(hit.entity).cloned().unwrap_or_default(),
            coordinate,
            feature_state: self.config.variant == Variant::Buildings,
        })
    }

    pub fn close_dialog(&mut self) -> Option<Selection> {
        let closed = self.selection.close(&mut self.states);
        if closed.is_some() {
            self.events.emit(MapEvent::DialogClosed);
            self.invalidate();
        }
        closed
    }

    /// The dialog's open-state callback. Only closing has an effect.
    pub fn set_dialog_open(&mut self, open: bool) -> Option<Selection> {
        if open {
            return self.selection.set_dialog_open(true, &mut self.states);
        }
        self.close_dialog()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.selection()
    }

    pub fn dialog(&self) -> Option<InfoDialog> {
        self.selection.selection().map(InfoDialog::from_selection)
    }

    /// Geometry for the current data and feature state.
    pub fn mesh(&mut self) -> &BuildingMesh {
        self.refresh();
        &self.mesh
    }

    /// True once after each change to data or feature state.
    pub fn take_mesh_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn invalidate(&mut self) {
        self.stale = true;
        self.changed = true;
    }

    /// Re-extracts geometry; extraction also writes the bounds picking needs.
    fn refresh(&mut self) {
        if !self.stale {
            return;
        }
        self.stale = false;
        let mut mesh = match self.config.variant {
            Variant::Buildings => self.buildings.extract(&mut self.world, &self.states),
            Variant::Tileset => BuildingMesh::default(),
        };
        if let Some(layer) = &self.tileset {
            mesh.append(layer.extract(&self.world));
        }
        self.mesh = mesh;
    }

    pub fn events(&self) -> &VecDeque<RecordedEvent> {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<RecordedEvent> {
        self.events.drain()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn resize(&mut self, width_px: f64, height_px: f64) {
        self.camera.resize(width_px.max(1.0), height_px.max(1.0));
    }

    pub fn orbit(&mut self, d_bearing: f64, d_pitch: f64) {
        self.camera.orbit(d_bearing, d_pitch);
    }

    pub fn pan(&mut self, dx_px: f64, dy_px: f64) {
        self.camera.pan(dx_px, dy_px);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.camera.zoom_by(delta);
    }

    pub fn reset_view(&mut self) {
        self.camera.set_view(self.config.view);
    }

    pub fn view(&self) -> ViewState {
        self.camera.view()
    }
}

#[cfg(test)]
mod tests {
    use super::MapHost;
    use crate::config::ViewerConfig;
    use formats::{FeatureCollection, Tileset};
    use foundation::math::LngLat;
    use pretty_assertions::assert_eq;
    use runtime::MapEvent;
    use scene::components::FeatureKey;
    use scene::selection::SelectionChange;
    use serde_json::json;

    /// Square of `d` degrees with its south-west corner at `(lng, lat)`.
    fn square(lng: f64, lat: f64, d: f64) -> serde_json::Value {
        json!([[[lng, lat], [lng + d, lat], [lng + d, lat + d], [lng, lat + d], [lng, lat]]])
    }

    fn zagreb_buildings() -> FeatureCollection {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": 1,
                    "properties": {"name": "Cathedral", "levels": 4, "note": ""},
                    "geometry": {"type": "Polygon", "coordinates": square(15.9816, 45.8147, 0.0006)}
                },
                {
                    "type": "Feature",
                    "id": 2,
                    "properties": {"name": "Market", "type": "commercial"},
                    "geometry": {"type": "Polygon", "coordinates": square(15.9700, 45.8100, 0.0004)}
                }
            ]
        });
        FeatureCollection::from_geojson_value(&doc).expect("features")
    }

    fn loaded_host() -> MapHost {
        let mut host = MapHost::new(ViewerConfig::buildings()).expect("host");
        let report = host.load_features(&zagreb_buildings().features);
        assert_eq!(report.spawned, 2);
        host.mark_loaded();
        host
    }

    #[test]
    fn click_on_building_opens_dialog_and_flags_feature() {
        let mut host = loaded_host();
        let (w, h) = host.camera().viewport();
        let change = host.click_screen(w / 2.0, h / 2.0);

        let key = FeatureKey::new("osm-buildings", 1);
        assert_eq!(change, SelectionChange::Opened(key.clone()));
        assert!(host.feature_states().is_selected(&key));

        let dialog = host.dialog().expect("dialog");
        let labels: Vec<&str> = dialog.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["name", "levels"]);
        assert_eq!(dialog.coordinates, "15.9819, 45.8150");
    }

    #[test]
    fn miss_changes_nothing() {
        let mut host = loaded_host();
        assert_eq!(host.click_screen(1.0, 1.0), SelectionChange::Ignored);
        assert!(host.dialog().is_none());

        host.click_lng_lat(LngLat::new(15.9819, 45.815));
        assert_eq!(host.click_lng_lat(LngLat::new(15.0, 45.0)), SelectionChange::Ignored);
        assert!(host.selection().is_some());
    }

    #[test]
    fn close_clears_selection_and_flag() {
        let mut host = loaded_host();
        host.click_lng_lat(LngLat::new(15.9702, 45.8102));
        let key = FeatureKey::new("osm-buildings", 2);
        assert!(host.feature_states().is_selected(&key));

        assert!(host.set_dialog_open(true).is_none());
        assert!(host.selection().is_some());
        let closed = host.set_dialog_open(false).expect("closed");
        assert_eq!(closed.key, key);
        assert!(host.selection().is_none());
        assert!(host.feature_states().selected_keys().is_empty());
        assert_eq!(host.feature_states().len(), 0);
        assert!(host.close_dialog().is_none());
    }

    #[test]
    fn new_selection_replaces_previous_flag() {
        let mut host = loaded_host();
        host.click_lng_lat(LngLat::new(15.9819, 45.815));
        let change = host.click_lng_lat(LngLat::new(15.9702, 45.8102));
        assert_eq!(
            change,
            SelectionChange::Replaced {
                previous: FeatureKey::new("osm-buildings", 1),
                current: FeatureKey::new("osm-buildings", 2),
            }
        );
        assert_eq!(host.feature_states().selected_keys(), vec![&FeatureKey::new("osm-buildings", 2)]);
    }

    #[test]
    fn events_follow_the_interaction() {
        let mut host = loaded_host();
        host.click_lng_lat(LngLat::new(15.0, 45.0));
        host.click_lng_lat(LngLat::new(15.9819, 45.815));
        host.close_dialog();
        host.mark_loaded();

        let kinds: Vec<&str> = host
            .drain_events()
            .iter()
            .map(|e| match &e.event {
                MapEvent::Loaded => "loaded",
                MapEvent::Click { .. } => "click",
                MapEvent::FeaturePicked { .. } => "picked",
                MapEvent::PickMissed => "missed",
                MapEvent::DialogOpened { .. } => "opened",
                MapEvent::DialogClosed => "closed",
            })
            .collect();
        assert_eq!(kinds, vec!["loaded", "click", "missed", "click", "picked", "opened", "closed"]);
    }

    #[test]
    fn selection_recolors_the_mesh() {
        let mut host = loaded_host();
        let before = host.mesh().colors.clone();
        host.take_mesh_changed();
        host.click_lng_lat(LngLat::new(15.9819, 45.815));
        assert!(host.take_mesh_changed());
        assert_ne!(host.mesh().colors, before);
    }

    #[test]
    fn building_tiles_cover_the_view_center() {
        let host = MapHost::new(ViewerConfig::buildings()).expect("host");
        let tiles = host.building_tile_urls();
        assert!(!tiles.is_empty() && tiles.len() <= 16);
        let center = foundation::math::TileCoord::containing(LngLat::new(15.9819, 45.815), 14);
        let (_, url) = tiles.iter().find(|(t, _)| *t == center).expect("center tile");
        assert_eq!(url, "https://tiles.stadiamaps.com/data/openmaptiles/14/8919/5840.pbf");

        let tileset_host = MapHost::new(ViewerConfig::tileset(None, None)).expect("host");
        assert!(tileset_host.building_tile_urls().is_empty());
        assert!(tileset_host.raster_tile_urls().is_empty());
    }

    #[test]
    fn raster_tiles_follow_the_view() {
        let host = MapHost::new(ViewerConfig::buildings()).expect("host");
        let urls = host.raster_tile_urls();
        assert!(!urls.is_empty() && urls.len() <= 16);
        assert!(urls.iter().all(|u| u.starts_with("https://tile.openstreetmap.org/15/")));
    }

    #[test]
    fn tileset_picks_do_not_touch_feature_state() {
        let r = |d: f64| d.to_radians();
        let tileset = json!({
            "asset": {"version": "1.0"},
            "geometricError": 100.0,
            "root": {
                "boundingVolume": {"region": [r(15.981), r(45.814), r(15.983), r(45.816), 0.0, 40.0]},
                "geometricError": 0.0,
                "content": {"uri": "block.b3dm"}
            }
        });
        let tileset = Tileset::from_json_str(&tileset.to_string()).expect("tileset");
        let mut host = MapHost::new(ViewerConfig::tileset(None, None)).expect("host");
        assert_eq!(host.load_tileset(&tileset).spawned, 1);

        let change = host.click_lng_lat(LngLat::new(15.982, 45.815));
        assert_eq!(change, SelectionChange::Opened(FeatureKey::new("tileset", 0)));
        assert!(host.feature_states().selected_keys().is_empty());
        let dialog = host.dialog().expect("dialog");
        assert_eq!(dialog.rows[0].label, "content uri");
        assert!(!host.mesh().is_empty());
    }
}
