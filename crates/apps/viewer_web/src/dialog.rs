use foundation::math::LngLat;
use scene::selection::Selection;
use serde::Serialize;

pub const DIALOG_TITLE: &str = "Building Information";
pub const DIALOG_DESCRIPTION: &str = "Details about the selected building and its properties";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogRow {
    pub label: String,
    pub value: String,
}

/// View model of the info dialog for one selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoDialog {
    pub title: String,
    pub description: String,
    pub coordinates: String,
    pub rows: Vec<DialogRow>,
}

impl InfoDialog {
    /// Rows follow attribute order; null and empty-string values are left out.
    pub fn from_selection(selection: &Selection) -> Self {
        let rows = selection
            .attributes
            .iter()
            .filter(|(_, value)| !value.is_blank())
            .map(|(key, value)| DialogRow {
                label: humanize_key(key),
                value: value.to_string(),
            })
            .collect();
        Self {
            title: DIALOG_TITLE.to_string(),
            description: DIALOG_DESCRIPTION.to_string(),
            coordinates: format_coordinate(selection.coordinate),
            rows,
        }
    }
}

pub fn humanize_key(key: &str) -> String {
    key.replace('_', " ")
}

/// `lng, lat` with exactly four decimals each.
pub fn format_coordinate(p: LngLat) -> String {
    format!("{}, {}", fixed4(p.lng), fixed4(p.lat))
}

/// Four decimals, exact halves rounded away from zero like `Number.prototype.toFixed`.
fn fixed4(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let magnitude = v.abs();
    // Thirty digits separate an exact half from a near one at coordinate magnitudes.
    let exact = format!("{magnitude:.30}");
    let tie = exact
        .split_once('.')
        .is_some_and(|(_, frac)| frac.as_bytes()[4] == b'5' && frac.bytes().skip(5).all(|b| b == b'0'));
    let rounded = if tie {
        format!("{:.4}", magnitude + 1e-5)
    } else {
        format!("{magnitude:.4}")
    };
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}{rounded}")
}

#[cfg(target_arch = "wasm32")]
mod dom {
    use super::InfoDialog;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{Document, Element, HtmlElement};

    fn element(document: &Document, tag: &str, class: &str, text: Option<&str>) -> Result<Element, JsValue> {
        let el = document.create_element(tag)?;
        el.set_class_name(class);
        if let Some(text) = text {
            el.set_text_content(Some(text));
        }
        Ok(el)
    }

    impl InfoDialog {
        /// Replaces the contents of `root_id` with the dialog: header, then
        /// the coordinates, then one row per attribute. `on_close` is attached
        /// to the close button.
        pub fn render_into(&self, document: &Document, root_id: &str, on_close: JsValue) -> Result<(), JsValue> {
            let root = document
                .get_element_by_id(root_id)
                .ok_or_else(|| JsValue::from_str("dialog root missing"))?;
            root.set_inner_html("");

            let dialog = element(document, "div", "map3d-dialog", None)?;
            dialog.set_attribute("role", "dialog")?;
            dialog.set_attribute("aria-modal", "false")?;

            let header = element(document, "div", "map3d-dialog-header", None)?;
            header.append_child(&element(document, "h2", "map3d-dialog-title", Some(&self.title))?)?;
            header.append_child(&element(document, "p", "map3d-dialog-description", Some(&self.description))?)?;
            let close = element(document, "button", "map3d-dialog-close", Some("\u{00d7}"))?.dyn_into::<HtmlElement>()?;
            close.set_attribute("aria-label", "Close")?;
            close.set_onclick(Some(on_close.unchecked_ref()));
            header.append_child(&close)?;
            dialog.append_child(&header)?;

            dialog.append_child(&element(
                document,
                "p",
                "map3d-dialog-coordinates",
                Some(&format!("Coordinates: {}", self.coordinates)),
            )?)?;

            let list = element(document, "dl", "map3d-dialog-rows", None)?;
            for row in &self.rows {
                let entry = element(document, "div", "map3d-dialog-row", None)?;
                let label = element(document, "dt", "map3d-dialog-label", Some(&row.label))?;
                label.set_attribute("style", "text-transform: capitalize")?;
                entry.append_child(&label)?;
                entry.append_child(&element(document, "dd", "map3d-dialog-value", Some(&row.value))?)?;
                list.append_child(&entry)?;
            }
            dialog.append_child(&list)?;

            root.append_child(&dialog)?;
            Ok(())
        }
    }

    pub fn clear(document: &Document, root_id: &str) {
        if let Some(root) = document.get_element_by_id(root_id) {
            root.set_inner_html("");
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use dom::clear;
