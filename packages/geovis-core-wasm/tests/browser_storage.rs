#![cfg(target_arch = "wasm32")]

use geovis_core_wasm::local_mirror::{BrowserStorageMirror, LocalMirror};
use geovis_core_wasm::{Feature, FeatureCollection, GeoStore, GeoVisConfig, Geometry};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn config() -> GeoVisConfig {
    GeoVisConfig::from_json(r#"{"storageKey": "geoData-test", "listStorageKey": "geoDataList-test"}"#)
        .unwrap()
}

#[wasm_bindgen_test]
fn store_round_trips_through_local_storage() {
    let store = GeoStore::open(BrowserStorageMirror, &config());
    let collection = FeatureCollection::new(vec![Feature::new(Geometry::line_string(&[
        [0.0, 0.0],
        [1.0, 1.0],
    ]))]);
    store.set(Some(collection.clone())).unwrap();

    let reopened = GeoStore::open(BrowserStorageMirror, &config());
    assert_eq!(reopened.get(), Some(collection));

    reopened.set(None).unwrap();
    assert_eq!(BrowserStorageMirror.read("geoData-test").unwrap(), None);
}
