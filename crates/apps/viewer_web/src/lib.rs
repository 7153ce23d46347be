use console_error_panic_hook::set_once;
use gloo_net::http::Request;
use std::cell::RefCell;
use std::fmt::Display;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use foundation::math::TileCoord;
use formats::{SourceFeature, Tileset, decode_tile, layer_features};
use layers::style::{BUILDINGS_SOURCE_LAYER, StyleDocument};

pub mod config;
pub mod dialog;
pub mod host;
mod wgpu;

pub use config::{ConfigError, Variant, ViewerConfig};
pub use dialog::{DialogRow, InfoDialog};
pub use host::MapHost;
use wgpu::{WgpuContext, init_wgpu_from_canvas_id, render_scene, resize_wgpu, set_background, upload_mesh};

/// OpenStreetMap land color, used when the style has no background layer.
const DEFAULT_GROUND: [f32; 4] = [0.949, 0.937, 0.914, 1.0];
const ORBIT_DEG_PER_PX: f64 = 0.25;
const ZOOM_PER_WHEEL_UNIT: f64 = 0.002;

#[derive(Debug)]
struct ViewerState {
    host: MapHost,
    wgpu: Option<WgpuContext>,
    /// Close-button handler, shared by every dialog render.
    on_close: Option<Closure<dyn FnMut()>>,
}

thread_local! {
    static STATE: RefCell<Option<ViewerState>> = const { RefCell::new(None) };
}

fn with_state<R>(f: impl FnOnce(&mut ViewerState) -> R) -> Option<R> {
    STATE.with(|state| state.borrow_mut().as_mut().map(f))
}

fn log(msg: &str) {
    web_sys::console::log_1(&JsValue::from_str(msg));
}

fn to_js(err: impl Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    Ok(())
}

/// Mounts the vector-building variant.
#[wasm_bindgen]
pub fn mount_buildings(canvas_id: Option<String>) -> Result<(), JsValue> {
    let mut config = ViewerConfig::buildings();
    if let Some(id) = canvas_id {
        config.canvas_id = id;
    }
    mount(config)
}

/// Mounts the 3D tileset variant; missing URLs use the defaults.
#[wasm_bindgen]
pub fn mount_tileset(tileset_url: Option<String>, style_url: Option<String>) -> Result<(), JsValue> {
    mount(ViewerConfig::tileset(tileset_url, style_url))
}

#[wasm_bindgen]
pub fn mount_with_config(config_json: &str) -> Result<(), JsValue> {
    mount(ViewerConfig::from_json_str(config_json).map_err(to_js)?)
}

fn mount(config: ViewerConfig) -> Result<(), JsValue> {
    let host = MapHost::new(config).map_err(to_js)?;
    let canvas_id = host.config().canvas_id.clone();
    STATE.with(|state| {
        *state.borrow_mut() = Some(ViewerState {
            host,
            wgpu: None,
            on_close: None,
        });
    });

    spawn_local(async move {
        if let Err(err) = init_renderer(&canvas_id).await {
            log(&format!("wgpu init error: {err:?}"));
        }
    });
    spawn_local(load_data());
    Ok(())
}

async fn init_renderer(canvas_id: &str) -> Result<(), JsValue> {
    let ground = with_state(|s| s.host.style().background_color())
        .flatten()
        .map(|c| c.to_array())
        .unwrap_or(DEFAULT_GROUND);
    let mut ctx = init_wgpu_from_canvas_id(canvas_id, ground).await?;
    with_state(|s| {
        upload_mesh(&mut ctx, s.host.mesh());
        s.wgpu = Some(ctx);
    });
    render()
}

async fn load_data() {
    let Some(config) = with_state(|s| s.host.config().clone()) else {
        return;
    };
    match config.variant {
        Variant::Buildings => {
            let tiles = with_state(|s| s.host.building_tile_urls()).unwrap_or_default();
            for (tile, url) in tiles {
                match fetch_building_tile(tile, &url).await {
                    Ok(features) => {
                        with_state(|s| s.host.load_features(&features));
                    }
                    Err(err) => log(&format!("building tile {url} failed: {err:?}")),
                }
            }
        }
        Variant::Tileset => {
            match fetch_text(config.style_url()).await.and_then(|t| StyleDocument::from_json_str(&t).map_err(to_js)) {
                Ok(base) => {
                    let background = base.background_color();
                    with_state(|s| {
                        s.host.set_base_style(base);
                        if let (Some(ctx), Some(color)) = (s.wgpu.as_mut(), background) {
                            set_background(ctx, color.to_array());
                        }
                    });
                }
                Err(err) => log(&format!("base style failed: {err:?}")),
            }
            match fetch_text(config.tileset_url()).await.and_then(|t| Tileset::from_json_str(&t).map_err(to_js)) {
                Ok(tileset) => {
                    with_state(|s| s.host.load_tileset(&tileset));
                }
                Err(err) => log(&format!("tileset failed: {err:?}")),
            }
        }
    }
    with_state(|s| s.host.mark_loaded());
    if let Err(err) = render() {
        log(&format!("render error: {err:?}"));
    }
}

async fn fetch_building_tile(tile: TileCoord, url: &str) -> Result<Vec<SourceFeature>, JsValue> {
    let resp = Request::get(url).send().await.map_err(to_js)?;
    if !resp.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", resp.status())));
    }
    let bytes = resp.binary().await.map_err(to_js)?;
    let features = decode_tile(&bytes, tile).map_err(to_js)?;
    Ok(layer_features(features, BUILDINGS_SOURCE_LAYER))
}

async fn fetch_text(url: &str) -> Result<String, JsValue> {
    let resp = Request::get(url).send().await.map_err(to_js)?;
    if !resp.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", resp.status())));
    }
    resp.text().await.map_err(to_js)
}

fn render() -> Result<(), JsValue> {
    with_state(|s| {
        let ViewerState { host, wgpu, .. } = s;
        let Some(ctx) = wgpu.as_mut() else {
            return Ok(());
        };
        if host.take_mesh_changed() {
            upload_mesh(ctx, host.mesh());
        }
        render_scene(ctx, host.camera().view_proj())
    })
    .unwrap_or(Ok(()))
}

#[cfg(target_arch = "wasm32")]
fn sync_dialog() -> Result<(), JsValue> {
    let Some((dialog, root_id, on_close)) = with_state(|s| {
        let on_close = s.on_close.get_or_insert_with(|| {
            Closure::new(|| {
                if let Err(err) = close_dialog() {
                    log(&format!("close error: {err:?}"));
                }
            })
        });
        let handler: &JsValue = on_close.as_ref();
        (s.host.dialog(), s.host.config().dialog_root_id.clone(), handler.clone())
    }) else {
        return Ok(());
    };
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("document missing"))?;
    match dialog {
        Some(dialog) => dialog.render_into(&document, &root_id, on_close),
        None => {
            dialog::clear(&document, &root_id);
            Ok(())
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn sync_dialog() -> Result<(), JsValue> {
    Ok(())
}

/// Pointer click in canvas pixels. Misses leave the dialog as it is.
#[wasm_bindgen]
pub fn on_click(x_px: f64, y_px: f64) -> Result<(), JsValue> {
    with_state(|s| s.host.click_screen(x_px, y_px));
    sync_dialog()?;
    render()
}

#[wasm_bindgen]
pub fn close_dialog() -> Result<(), JsValue> {
    with_state(|s| s.host.close_dialog());
    sync_dialog()?;
    render()
}

/// The open dialog as JSON, for pages that render it themselves.
#[wasm_bindgen]
pub fn dialog_json() -> Option<String> {
    with_state(|s| s.host.dialog())
        .flatten()
        .and_then(|d| serde_json::to_string(&d).ok())
}

/// Drains recorded map events as a JSON array.
#[wasm_bindgen]
pub fn events_json() -> String {
    let events = with_state(|s| s.host.drain_events()).unwrap_or_default();
    serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string())
}

/// Base map tile URLs for the current view, for pages that draw imagery behind the canvas.
#[wasm_bindgen]
pub fn base_tiles_json() -> String {
    let urls = with_state(|s| s.host.raster_tile_urls()).unwrap_or_default();
    serde_json::to_string(&urls).unwrap_or_else(|_| "[]".to_string())
}

#[wasm_bindgen]
pub fn is_loaded() -> bool {
    with_state(|s| s.host.is_loaded()).unwrap_or(false)
}

#[wasm_bindgen]
pub fn set_canvas_sizes(width: f64, height: f64) -> Result<(), JsValue> {
    with_state(|s| {
        s.host.resize(width, height);
        if let Some(ctx) = &mut s.wgpu {
            resize_wgpu(ctx, width as u32, height as u32);
        }
    });
    render()
}

#[wasm_bindgen]
pub fn camera_reset() -> Result<(), JsValue> {
    with_state(|s| s.host.reset_view());
    render()
}

/// Rotates the view. Call with pointer deltas in pixels.
#[wasm_bindgen]
pub fn camera_orbit(delta_x_px: f64, delta_y_px: f64) -> Result<(), JsValue> {
    with_state(|s| {
        s.host
            .orbit(delta_x_px * ORBIT_DEG_PER_PX, delta_y_px * ORBIT_DEG_PER_PX)
    });
    render()
}

/// Drags the map. Call with pointer deltas in pixels.
#[wasm_bindgen]
pub fn camera_pan(delta_x_px: f64, delta_y_px: f64) -> Result<(), JsValue> {
    with_state(|s| s.host.pan(delta_x_px, delta_y_px));
    render()
}

/// Call with wheel `deltaY`; positive zooms out.
#[wasm_bindgen]
pub fn camera_zoom(wheel_delta_y: f64) -> Result<(), JsValue> {
    with_state(|s| s.host.zoom_by(-wheel_delta_y * ZOOM_PER_WHEEL_UNIT));
    render()
}
