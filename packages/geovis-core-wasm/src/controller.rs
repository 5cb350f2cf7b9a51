use futures::channel::mpsc::UnboundedSender;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use crate::bounds::{compute_bounds, Bounds};
use crate::config::GeoVisConfig;
use crate::drawing_adapter::{DrawingAdapter, ExportArtifact, Notice, PersistOutcome};
use crate::error::{AdapterError, BridgeError, GeoVisError};
use crate::formats;
use crate::geojson_features::FeatureCollection;
use crate::liveness::LivenessRegistry;
use crate::models::{Credential, FetchOutcome};
use crate::persistence::{FileTransport, PersistenceBridge};
use crate::state_store::GeoStore;
use crate::surface::{DrawMode, DrawingSurface, SurfaceEdit};
use crate::{console_log, console_warn};

/// Everything one page session drives: the store, the map adapter, the
/// storage API and the mounted views.
///
/// The surface may call back into the session while the adapter is working
/// (a draw control fires `draw.create` when it leaves a drawing mode). Those
/// calls only queue; the adapter is pumped again once the outer call is done.
pub struct SessionController<S, T> {
    store: GeoStore,
    adapter: Rc<RefCell<DrawingAdapter<S>>>,
    edits: UnboundedSender<SurfaceEdit>,
    bridge: Rc<PersistenceBridge<T>>,
    views: Rc<RefCell<LivenessRegistry>>,
}

impl<S, T> Clone for SessionController<S, T> {
    fn clone(&self) -> Self {
        SessionController {
            store: self.store.clone(),
            adapter: self.adapter.clone(),
            edits: self.edits.clone(),
            bridge: self.bridge.clone(),
            views: self.views.clone(),
        }
    }
}

impl<S: DrawingSurface, T: FileTransport> SessionController<S, T> {
    pub fn new(store: GeoStore, config: &GeoVisConfig, transport: T) -> Self {
        let adapter = DrawingAdapter::new(store.clone(), config);
        let edits = adapter.edit_sender();
        SessionController {
            store,
            adapter: Rc::new(RefCell::new(adapter)),
            edits,
            bridge: Rc::new(PersistenceBridge::new(config, transport)),
            views: Rc::new(RefCell::new(LivenessRegistry::new())),
        }
    }

    pub fn store(&self) -> &GeoStore {
        &self.store
    }

    pub fn bridge(&self) -> &PersistenceBridge<T> {
        &self.bridge
    }

    /// Run `f` on the adapter, then handle whatever was queued meanwhile.
    fn with_adapter<R>(&self, f: impl FnOnce(&mut DrawingAdapter<S>) -> R) -> Result<R, AdapterError> {
        let result = {
            let mut adapter = self.adapter.try_borrow_mut().map_err(|_| AdapterError::Busy)?;
            f(&mut adapter)
        };
        self.settle();
        Ok(result)
    }

    /// Pump until both channels are empty. A no-op while the adapter is in use;
    /// the call holding it settles when it returns.
    pub fn settle(&self) {
        loop {
            let Ok(mut adapter) = self.adapter.try_borrow_mut() else {
                return;
            };
            if adapter.pump() == 0 {
                return;
            }
        }
    }

    fn notify(&self, notice: Notice) {
        match self.adapter.try_borrow_mut() {
            Ok(mut adapter) => adapter.push_notice(notice),
            Err(_) => console_warn!("Dropped notice while busy: {}", notice.message()),
        }
    }

    /// Make `collection` the current one and show it.
    pub fn replace(&self, collection: Option<FeatureCollection>) {
        if let Err(e) = self.store.set(collection) {
            self.notify(Notice::CacheFailed(e.to_string()));
        }
        self.settle();
    }

    /// Parse an uploaded file and make it the current collection.
    pub fn load_file(&self, file_name: &str, raw_text: &str) -> Result<usize, GeoVisError> {
        let collection = formats::parse_file(file_name, raw_text)?;
        let count = collection.len();
        console_log!("Loaded {} features from '{}'", count, file_name);
        self.replace(Some(collection));
        Ok(count)
    }

    pub fn clear(&self) {
        self.replace(None);
    }

    /// Make a fetched file the current collection. False when `index` is out of range.
    pub fn open_remote_file(&self, index: usize) -> bool {
        match self.store.remote_files().into_iter().nth(index) {
            Some(file) => {
                self.replace(Some(file.collection));
                true
            }
            None => false,
        }
    }

    pub fn mount(&self, surface: S) -> Result<(), AdapterError> {
        self.with_adapter(|adapter| adapter.mount(surface))
    }

    pub fn mount_failed(&self, reason: &str) -> Result<(), AdapterError> {
        self.with_adapter(|adapter| adapter.mount_failed(reason))
    }

    /// Queue a surface edit. Safe to call from inside a surface callback.
    pub fn draw_event(&self, edit: SurfaceEdit) {
        if self.edits.unbounded_send(edit).is_err() {
            console_warn!("Dropped {:?}: adapter is gone", edit);
            return;
        }
        self.settle();
    }

    pub fn set_mode(&self, mode: DrawMode) -> Result<DrawMode, AdapterError> {
        self.with_adapter(|adapter| adapter.set_mode(mode))?
    }

    pub fn mode(&self) -> DrawMode {
        self.adapter
            .try_borrow()
            .map(|adapter| adapter.mode())
            .unwrap_or_default()
    }

    pub fn export(&self) -> Result<ExportArtifact, AdapterError> {
        self.with_adapter(|adapter| adapter.export())?
    }

    /// Upload the surface's features. Failures come back as an outcome with a
    /// matching notice, never as an error.
    pub async fn persist(&self, name: &str, credential: Option<&Credential>) -> PersistOutcome {
        let snapshot = self.with_adapter(|adapter| adapter.snapshot()).and_then(|r| r);
        let collection = match snapshot {
            Ok(collection) => collection,
            Err(e) => {
                let fallback = PersistOutcome::Failed(e.to_string());
                return self
                    .with_adapter(|adapter| adapter.record_persist_blocked(e))
                    .unwrap_or(fallback);
            }
        };

        // No adapter borrow is held across the request
        let result = self.bridge.upload(credential, &collection, name).await;
        match self.adapter.try_borrow_mut() {
            Ok(mut adapter) => adapter.record_persist(result),
            Err(_) => PersistOutcome::from_upload(&result),
        }
    }

    /// Fetch the account's files on behalf of `view_id`. `Ok(None)` means the
    /// view was unmounted (or fetched again) before the response arrived.
    ///
    /// The view is mounted and the store marked loading when this is called,
    /// not when the returned future is first polled.
    pub fn fetch_files(
        &self,
        view_id: &str,
        credential: Option<Credential>,
    ) -> impl Future<Output = Result<Option<FetchOutcome>, BridgeError>> + 'static
    where
        S: 'static,
        T: 'static,
    {
        let token = self.views.borrow_mut().mount(view_id);
        self.store.begin_fetch();
        let session = self.clone();
        async move {
            match session.bridge.fetch_all(credential.as_ref()).await {
                Ok(outcome) => {
                    let applied = session.store.finish_fetch(&token, outcome.clone());
                    Ok(applied.then_some(outcome))
                }
                Err(e) => {
                    console_warn!("Fetching stored files failed: {}", e);
                    if session.store.fail_fetch(&token, &e.to_string()) {
                        Err(e)
                    } else {
                        Ok(None)
                    }
                }
            }
        }
    }

    pub fn unmount_view(&self, view_id: &str) -> bool {
        self.views.borrow_mut().unmount(view_id)
    }

    pub fn drain_notices(&self) -> Vec<Notice> {
        self.with_adapter(|adapter| adapter.drain_notices())
            .unwrap_or_default()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.store.get().as_ref().and_then(compute_bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson_features::{FeatureId, Geometry};
    use crate::local_mirror::MemoryMirror;
    use crate::persistence::testing::RecordingTransport;
    use crate::surface::MemorySurface;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    type Controller<S> = SessionController<S, RecordingTransport>;

    fn controller<S: DrawingSurface>() -> Controller<S> {
        let config = GeoVisConfig::default();
        let store = GeoStore::open(MemoryMirror::new(), &config);
        SessionController::new(store, &config, RecordingTransport::default())
    }

    type Hook = Rc<RefCell<Option<Box<dyn Fn()>>>>;

    /// Fires its hook from inside `change_mode` after finishing a sketch,
    /// the way a draw control emits `draw.create` when leaving a draw mode.
    struct SketchingSurface {
        inner: MemorySurface,
        on_finish: Hook,
    }

    impl DrawingSurface for SketchingSurface {
        fn delete_all(&mut self) {
            self.inner.delete_all();
        }
        fn add(&mut self, collection: &FeatureCollection) {
            self.inner.add(collection);
        }
        fn get_all(&self) -> Result<FeatureCollection, AdapterError> {
            self.inner.get_all()
        }
        fn selected_ids(&self) -> Vec<FeatureId> {
            self.inner.selected_ids()
        }
        fn change_mode(&mut self, mode: DrawMode, feature: Option<&FeatureId>) {
            let leaving_sketch = self.inner.mode() == DrawMode::DrawPolygon;
            if leaving_sketch {
                self.inner
                    .draw(Geometry::polygon(&[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]));
            }
            self.inner.change_mode(mode, feature);
            if leaving_sketch {
                if let Some(hook) = self.on_finish.borrow().as_ref() {
                    hook();
                }
            }
        }
        fn fit_bounds(&mut self, bounds: &Bounds, padding: f64) {
            self.inner.fit_bounds(bounds, padding);
        }
    }

    #[test]
    fn test_draw_event_from_inside_mode_change_is_captured() {
        let session: Controller<SketchingSurface> = controller();
        let on_finish: Hook = Rc::new(RefCell::new(None));
        session
            .mount(SketchingSurface {
                inner: MemorySurface::new(),
                on_finish: on_finish.clone(),
            })
            .unwrap();
        let host = session.clone();
        *on_finish.borrow_mut() = Some(Box::new(move || host.draw_event(SurfaceEdit::Created)));

        session.set_mode(DrawMode::DrawPolygon).unwrap();
        assert_eq!(session.set_mode(DrawMode::Select), Ok(DrawMode::Select));

        let stored = session.store().get().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(session.mode(), DrawMode::Select);
    }

    #[test]
    fn test_reentrant_mode_change_is_refused_not_fatal() {
        let session: Controller<SketchingSurface> = controller();
        let on_finish: Hook = Rc::new(RefCell::new(None));
        session
            .mount(SketchingSurface {
                inner: MemorySurface::new(),
                on_finish: on_finish.clone(),
            })
            .unwrap();
        let host = session.clone();
        let refused = Rc::new(RefCell::new(None));
        let seen = refused.clone();
        *on_finish.borrow_mut() = Some(Box::new(move || {
            *seen.borrow_mut() = Some(host.set_mode(DrawMode::DrawPoint));
        }));

        session.set_mode(DrawMode::DrawPolygon).unwrap();
        session.set_mode(DrawMode::Select).unwrap();
        assert_eq!(*refused.borrow(), Some(Err(AdapterError::Busy)));
    }

    #[test]
    fn test_persist_before_mount_resolves_with_notice() {
        let session: Controller<MemorySurface> = controller();
        let outcome = block_on(session.persist("draft", Some(&Credential::bearer("tok"))));

        assert_eq!(outcome, PersistOutcome::Failed("drawing surface is not ready".to_string()));
        assert_eq!(session.drain_notices(), vec![Notice::NotReady]);
        assert!(session.bridge().transport().requests.borrow().is_empty());
    }

    #[test]
    fn test_persist_without_credential_is_a_failed_save() {
        let session: Controller<MemorySurface> = controller();
        session.mount(MemorySurface::new()).unwrap();
        session.drain_notices();

        let outcome = block_on(session.persist("draft", None));
        assert_eq!(outcome, PersistOutcome::Failed("no valid credential available".to_string()));
        assert_eq!(
            session.drain_notices(),
            vec![Notice::SaveFailed("no valid credential available".to_string())]
        );
    }

    #[test]
    fn test_fetch_for_unmounted_view_is_discarded() {
        let session: Controller<MemorySurface> = controller();
        let credential = Credential::bearer("tok");
        let payload = crate::persistence::encode_payload(&FeatureCollection::new(vec![
            crate::geojson_features::Feature::new(Geometry::point(1.0, 1.0)),
        ]))
        .unwrap();
        let listing = serde_json::json!([
            {"id": 1, "userId": 4, "fileName": "farm", "fileData": payload}
        ])
        .to_string();

        session.bridge().transport().respond(200, &listing);
        let fetched = block_on(session.fetch_files("profile", Some(credential.clone()))).unwrap();
        assert_eq!(fetched.map(|outcome| outcome.files.len()), Some(1));
        assert_eq!(session.store().remote_files().len(), 1);

        session.bridge().transport().respond(200, "null");
        let pending = session.fetch_files("profile", Some(credential));
        assert!(session.store().loading());
        assert!(session.unmount_view("profile"));

        assert_eq!(block_on(pending).unwrap(), None);
        assert!(!session.store().loading());
        // The stale empty listing did not replace the earlier one
        assert_eq!(session.store().remote_files().len(), 1);
    }

    #[test]
    fn test_failed_fetch_after_unmount_is_silent() {
        let session: Controller<MemorySurface> = controller();
        session.bridge().transport().fail("connection refused");

        let pending = session.fetch_files("profile", Some(Credential::bearer("tok")));
        session.unmount_view("profile");
        assert_eq!(block_on(pending).unwrap(), None);
        assert_eq!(session.store().error(), None);
        assert!(!session.store().loading());
    }

    #[test]
    fn test_load_file_shows_and_clear_empties() {
        let session: Controller<MemorySurface> = controller();
        session.mount(MemorySurface::new()).unwrap();
        session.drain_notices();

        let count = session
            .load_file(
                "line.geojson",
                r#"{"type":"LineString","coordinates":[[1,2],[3,4]]}"#,
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            session.bounds().map(|b| b.to_lng_lat_pairs()),
            Some([[1.0, 2.0], [3.0, 4.0]])
        );
        assert!(session.load_file("notes.txt", "hello").is_err());

        session.clear();
        assert_eq!(session.store().get(), None);
        assert_eq!(session.drain_notices(), vec![Notice::NoData]);
        assert!(!session.open_remote_file(0));
    }
}
