#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use crate::config::GeoVisConfig;
    use crate::drawing_adapter::{DrawingAdapter, Notice, PersistOutcome};
    use crate::formats;
    use crate::geojson_features::{FeatureCollection, Geometry};
    use crate::local_mirror::MemoryMirror;
    use crate::models::Credential;
    use crate::persistence::testing::RecordingTransport;
    use crate::persistence::{decode_payload, HttpMethod, PersistenceBridge};
    use crate::state_store::GeoStore;
    use crate::surface::{DrawMode, DrawingSurface, MemorySurface, SurfaceEdit};

    struct Session {
        mirror: MemoryMirror,
        store: GeoStore,
        adapter: DrawingAdapter<MemorySurface>,
        bridge: PersistenceBridge<RecordingTransport>,
    }

    fn session() -> Session {
        let config = GeoVisConfig::default();
        let mirror = MemoryMirror::new();
        let store = GeoStore::open(mirror.clone(), &config);
        let mut adapter = DrawingAdapter::new(store.clone(), &config);
        adapter.mount(MemorySurface::new());
        Session {
            mirror,
            store,
            adapter,
            bridge: PersistenceBridge::new(&config, RecordingTransport::default()),
        }
    }

    #[test]
    fn test_drawn_polygon_is_saved_exactly() {
        let mut s = session();
        assert_eq!(s.adapter.drain_notices(), vec![Notice::NoData]);

        s.adapter.set_mode(DrawMode::DrawPolygon).unwrap();
        s.adapter.surface_mut().unwrap().draw(Geometry::polygon(&[
            [10.0, 50.0],
            [10.5, 50.0],
            [10.5, 50.5],
            [10.0, 50.0],
        ]));
        s.adapter
            .edit_sender()
            .unbounded_send(SurfaceEdit::Created)
            .unwrap();
        s.adapter.pump();

        let on_surface = s.adapter.surface().unwrap().get_all().unwrap();
        assert_eq!(s.store.get(), Some(on_surface.clone()));
        assert!(s.mirror.contains("geoData"));

        let outcome = block_on(s.adapter.persist(
            &s.bridge,
            Some(&Credential::bearer("token-123")),
            "field boundaries",
        ));
        assert_eq!(outcome, PersistOutcome::Saved);
        assert_eq!(s.adapter.drain_notices(), vec![Notice::Saved]);

        let requests = s.bridge.transport().requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "http://localhost:8000/files");
        assert_eq!(requests[0].bearer, "token-123");

        let body: serde_json::Value =
            serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["file_name"], "field boundaries");
        let sent = decode_payload(body["file_data"].as_str().unwrap()).unwrap();
        assert_eq!(sent, on_surface);
    }

    #[test]
    fn test_save_without_login_fails_with_notice() {
        let mut s = session();
        s.adapter.drain_notices();

        let outcome = block_on(s.adapter.persist(&s.bridge, None, "draft"));
        assert!(matches!(outcome, PersistOutcome::Failed(_)));
        assert!(matches!(
            s.adapter.drain_notices().as_slice(),
            [Notice::SaveFailed(_)]
        ));
        assert!(s.bridge.transport().requests.borrow().is_empty());
    }

    #[test]
    fn test_server_error_is_reported_not_thrown() {
        let mut s = session();
        s.adapter.drain_notices();
        s.bridge.transport().respond(500, "Error storing file\n");

        let outcome = block_on(s.adapter.persist(
            &s.bridge,
            Some(&Credential::bearer("token-123")),
            "draft",
        ));
        assert_eq!(
            outcome,
            PersistOutcome::Failed(
                "storage server responded with status 500: Error storing file".to_string()
            )
        );
    }

    #[test]
    fn test_uploaded_file_shows_on_map_and_survives_reload() {
        let mut s = session();
        let kml = r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
            <Placemark><name>Track</name><LineString>
                <coordinates>4.0,52.0 5.0,53.0</coordinates>
            </LineString></Placemark>
        </Document></kml>"#;

        let collection = formats::parse_file("route.KML", kml).unwrap();
        s.store.set(Some(collection.clone())).unwrap();
        s.adapter.pump();

        let surface = s.adapter.surface().unwrap();
        assert_eq!(surface.get_all().unwrap().len(), 1);
        let (bounds, padding) = surface.fitted()[0];
        assert_eq!(bounds.to_lng_lat_pairs(), [[4.0, 52.0], [5.0, 53.0]]);
        assert_eq!(padding, 50.0);

        // A new page opens the store over the same mirror
        let config = GeoVisConfig::default();
        let reopened = GeoStore::open(s.mirror.clone(), &config);
        let mut adapter = DrawingAdapter::new(reopened, &config);
        adapter.mount(MemorySurface::new());
        assert_eq!(adapter.surface().unwrap().get_all().unwrap().features[0].geometry, collection.features[0].geometry);
    }

    #[test]
    fn test_clear_empties_surface_and_mirror() {
        let mut s = session();
        s.store
            .set(Some(FeatureCollection::new(vec![crate::geojson_features::Feature::new(
                Geometry::line_string(&[[0.0, 0.0], [1.0, 1.0]]),
            )])))
            .unwrap();
        s.adapter.pump();
        s.adapter.drain_notices();

        s.store.set(None).unwrap();
        s.adapter.pump();
        assert!(s.adapter.surface().unwrap().get_all().unwrap().is_empty());
        assert!(!s.mirror.contains("geoData"));
        assert_eq!(s.adapter.drain_notices(), vec![Notice::NoData]);
    }

    #[test]
    fn test_edit_selected_without_selection_keeps_mode() {
        let mut s = session();
        s.adapter.drain_notices();
        assert!(s.adapter.set_mode(DrawMode::EditSelected).is_err());
        assert_eq!(s.adapter.mode(), DrawMode::Select);
        assert_eq!(s.adapter.drain_notices(), vec![Notice::SelectFeatureFirst]);
    }
}
