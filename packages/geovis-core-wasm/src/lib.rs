use wasm_bindgen::prelude::*;

// Create a console module for logging
pub mod console;
// Feature model and the file formats we read
pub mod geojson_features;
pub mod formats;
mod kml;
pub mod bounds;
// Drawing surface abstraction and the adapter that keeps it in sync
pub mod surface;
pub mod drawing_adapter;
pub mod controller;
// Shared session state and its local mirror
pub mod local_mirror;
pub mod state_store;
pub mod liveness;
// Remote file storage
pub mod models;
pub mod persistence;
pub mod config;
pub mod error;

#[cfg(target_arch = "wasm32")]
mod js_surface;
#[cfg(target_arch = "wasm32")]
mod session;

#[cfg(test)]
mod flow_test;

pub use bounds::{compute_bounds, Bounds};
pub use config::GeoVisConfig;
pub use controller::SessionController;
pub use drawing_adapter::{DrawingAdapter, ExportArtifact, Notice, PersistOutcome, SurfaceState};
pub use error::{AdapterError, BridgeError, ConfigError, FormatError, GeoVisError, MirrorError};
pub use geojson_features::{Feature, FeatureCollection, FeatureId, Geometry, Position};
pub use state_store::{ChangeOrigin, GeoStore, StoreChange};
pub use surface::{DrawMode, DrawingSurface, MemorySurface, SurfaceEdit};

#[cfg(target_arch = "wasm32")]
pub use js_surface::JsDrawSurface;
#[cfg(target_arch = "wasm32")]
pub use session::GeoSession;

// Enable better panic messages in console during development
#[cfg(all(target_arch = "wasm32", feature = "console_error_panic_hook"))]
pub use console_error_panic_hook::set_once as set_panic_hook;

#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => ($crate::console::warn(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => ($crate::console::error(&format!($($t)*)))
}

#[cfg(target_arch = "wasm32")]
static INIT: std::sync::Once = std::sync::Once::new();

// This sets up the wasm_bindgen start functionality
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("GeoVis WASM module initialized");
    });
}

/// Parse an uploaded `.geojson` or `.kml` file and return it as GeoJSON text.
#[wasm_bindgen]
pub fn convert_to_geojson(file_name: &str, raw_text: &str) -> Result<String, JsValue> {
    let collection = formats::parse_file(file_name, raw_text).map_err(GeoVisError::from)?;
    formats::serialize(&collection)
        .map_err(|e| GeoVisError::from(BridgeError::Encoding(e)).into())
}

/// `[west, south, east, north]` of a GeoJSON document, or `None` when nothing
/// in it has usable line or polygon coordinates.
#[wasm_bindgen]
pub fn geojson_bounds(geojson: &str) -> Result<Option<Vec<f64>>, JsValue> {
    let collection = formats::parse(geojson, formats::SourceFormat::GeoJson)
        .map_err(GeoVisError::from)?;
    Ok(compute_bounds(&collection).map(|b| {
        let [[west, south], [east, north]] = b.to_lng_lat_pairs();
        vec![west, south, east, north]
    }))
}
