use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::bounds::Bounds;
use crate::error::AdapterError;
use crate::geojson_features::{FeatureCollection, FeatureId};
use crate::surface::{DrawMode, DrawingSurface};
use crate::console_error;

// Host-side wrapper around the map and its draw control
#[wasm_bindgen]
extern "C" {
    pub type JsDrawSurface;

    #[wasm_bindgen(method, js_name = deleteAll)]
    fn js_delete_all(this: &JsDrawSurface);

    #[wasm_bindgen(method, js_name = add)]
    fn js_add(this: &JsDrawSurface, collection: JsValue);

    #[wasm_bindgen(method, js_name = getAll)]
    fn js_get_all(this: &JsDrawSurface) -> JsValue;

    #[wasm_bindgen(method, js_name = getSelectedIds)]
    fn js_get_selected_ids(this: &JsDrawSurface) -> js_sys::Array;

    #[wasm_bindgen(method, js_name = changeMode)]
    fn js_change_mode(this: &JsDrawSurface, mode: &str, feature_id: JsValue);

    #[wasm_bindgen(method, js_name = fitBounds)]
    fn js_fit_bounds(this: &JsDrawSurface, bounds: JsValue, padding: f64);
}

/// Plain JS objects, not `Map`s, so the toolkit can read them.
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

fn feature_id_to_js(id: &FeatureId) -> JsValue {
    match id {
        FeatureId::String(s) => JsValue::from_str(s),
        FeatureId::Number(n) => n.as_f64().map(JsValue::from_f64).unwrap_or(JsValue::UNDEFINED),
    }
}

fn feature_id_from_js(value: JsValue) -> Option<FeatureId> {
    if let Some(s) = value.as_string() {
        return Some(FeatureId::String(s));
    }
    value
        .as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(FeatureId::Number)
}

/// `DrawingSurface` backed by the browser map.
pub struct JsSurface {
    inner: JsDrawSurface,
}

impl JsSurface {
    pub fn new(inner: JsDrawSurface) -> Self {
        JsSurface { inner }
    }
}

impl DrawingSurface for JsSurface {
    fn delete_all(&mut self) {
        self.inner.js_delete_all();
    }

    fn add(&mut self, collection: &FeatureCollection) {
        match to_js(collection) {
            Ok(value) => self.inner.js_add(value),
            Err(e) => console_error!("Failed to hand features to the map: {}", e),
        }
    }

    fn get_all(&self) -> Result<FeatureCollection, AdapterError> {
        serde_wasm_bindgen::from_value(self.inner.js_get_all()).map_err(|e| {
            console_error!("Map returned unreadable features: {}", e);
            AdapterError::SurfaceRead(e.to_string())
        })
    }

    fn selected_ids(&self) -> Vec<FeatureId> {
        self.inner
            .js_get_selected_ids()
            .iter()
            .filter_map(feature_id_from_js)
            .collect()
    }

    fn change_mode(&mut self, mode: DrawMode, feature: Option<&FeatureId>) {
        let feature_id = feature.map(feature_id_to_js).unwrap_or(JsValue::UNDEFINED);
        self.inner.js_change_mode(mode.surface_name(), feature_id);
    }

    fn fit_bounds(&mut self, bounds: &Bounds, padding: f64) {
        match to_js(bounds) {
            Ok(value) => self.inner.js_fit_bounds(value, padding),
            Err(e) => console_error!("Failed to pass bounds to the map: {}", e),
        }
    }
}
