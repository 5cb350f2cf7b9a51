use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use serde::Serialize;
use std::collections::VecDeque;

use crate::bounds::compute_bounds;
use crate::config::GeoVisConfig;
use crate::error::{AdapterError, BridgeError};
use crate::formats;
use crate::geojson_features::{ring_is_closed, FeatureCollection, Geometry};
use crate::models::Credential;
use crate::persistence::{FileTransport, PersistenceBridge};
use crate::state_store::{ChangeOrigin, GeoStore, Subscription};
use crate::surface::{DrawMode, DrawingSurface, SurfaceEdit};
use crate::{console_log, console_warn};

pub const EXPORT_MIME: &str = "application/json";

/// Where the map + drawing toolkit is in its lifecycle.
pub enum SurfaceState<S> {
    Initializing,
    Ready(S),
    Failed(String),
}

/// User-facing messages produced while syncing. The UI drains and shows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum Notice {
    NoData,
    NoValidBounds,
    SelectFeatureFirst,
    NotReady,
    Saved,
    SaveFailed(String),
    MountFailed(String),
    /// The reload copy in local storage could not be written.
    CacheFailed(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::NoData => "No data available. Please upload a file.".to_string(),
            Notice::NoValidBounds => "No valid coordinates found to fit the map.".to_string(),
            Notice::SelectFeatureFirst => "Please select a feature to edit.".to_string(),
            Notice::NotReady => "The map is still loading.".to_string(),
            Notice::Saved => "File saved successfully!".to_string(),
            Notice::SaveFailed(reason) => format!("Failed to save file: {}", reason),
            Notice::MountFailed(reason) => format!("Map could not be loaded: {}", reason),
            Notice::CacheFailed(reason) => {
                format!("Changes could not be kept for the next visit: {}", reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved,
    Failed(String),
}

impl PersistOutcome {
    pub fn from_upload(result: &Result<(), BridgeError>) -> Self {
        match result {
            Ok(()) => PersistOutcome::Saved,
            Err(e) => PersistOutcome::Failed(e.to_string()),
        }
    }
}

/// A file for the browser to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime: &'static str,
    pub contents: String,
}

/// Keeps a drawing surface and the shared store showing the same features.
///
/// Store changes and surface edits queue up on two channels; `pump` drains
/// them in order, store side first.
pub struct DrawingAdapter<S> {
    state: SurfaceState<S>,
    store: GeoStore,
    subscription: Subscription,
    edits_tx: UnboundedSender<SurfaceEdit>,
    edits_rx: UnboundedReceiver<SurfaceEdit>,
    mode: DrawMode,
    notices: VecDeque<Notice>,
    fit_padding: f64,
    export_file_name: String,
}

impl<S: DrawingSurface> DrawingAdapter<S> {
    pub fn new(store: GeoStore, config: &GeoVisConfig) -> Self {
        let subscription = store.subscribe();
        let (edits_tx, edits_rx) = unbounded();
        DrawingAdapter {
            state: SurfaceState::Initializing,
            store,
            subscription,
            edits_tx,
            edits_rx,
            mode: DrawMode::default(),
            notices: VecDeque::new(),
            fit_padding: config.fit_padding,
            export_file_name: config.export_file_name.clone(),
        }
    }

    /// Sender for the host's draw.create / draw.delete / draw.update listeners.
    pub fn edit_sender(&self) -> UnboundedSender<SurfaceEdit> {
        self.edits_tx.clone()
    }

    pub fn state(&self) -> &SurfaceState<S> {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SurfaceState::Ready(_))
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn surface(&self) -> Option<&S> {
        match &self.state {
            SurfaceState::Ready(surface) => Some(surface),
            _ => None,
        }
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        match &mut self.state {
            SurfaceState::Ready(surface) => Some(surface),
            _ => None,
        }
    }

    /// The surface finished loading. Shows whatever the store holds.
    pub fn mount(&mut self, surface: S) {
        self.state = SurfaceState::Ready(surface);
        self.mode = DrawMode::default();
        // The initial load covers anything queued while initializing
        while let Ok(Some(_)) = self.subscription.changes.try_next() {}
        self.load_from_store();
    }

    pub fn mount_failed(&mut self, reason: &str) {
        console_warn!("Drawing surface failed to initialize: {}", reason);
        self.state = SurfaceState::Failed(reason.to_string());
        self.notices.push_back(Notice::MountFailed(reason.to_string()));
    }

    /// Handle every queued message. Returns how many were taken off the channels.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;

        while let Ok(Some(change)) = self.subscription.changes.try_next() {
            handled += 1;
            if change.origin == ChangeOrigin::Subscriber(self.subscription.id) {
                continue;
            }
            self.load_from_store();
        }

        while let Ok(Some(edit)) = self.edits_rx.try_next() {
            handled += 1;
            self.capture(edit);
        }

        handled
    }

    fn load_from_store(&mut self) {
        let SurfaceState::Ready(surface) = &mut self.state else {
            return;
        };

        surface.delete_all();
        let collection = match self.store.get() {
            Some(collection) if !collection.is_empty() => collection,
            _ => {
                self.notices.push_back(Notice::NoData);
                return;
            }
        };

        warn_unclosed_rings(&collection);
        surface.add(&collection);
        match compute_bounds(&collection) {
            Some(bounds) => surface.fit_bounds(&bounds, self.fit_padding),
            None => {
                console_warn!("No valid coordinates in {} features", collection.len());
                self.notices.push_back(Notice::NoValidBounds);
            }
        }
    }

    fn capture(&mut self, edit: SurfaceEdit) {
        let SurfaceState::Ready(surface) = &self.state else {
            return;
        };

        // An unreadable surface must not overwrite what the store holds
        let collection = match surface.get_all() {
            Ok(collection) => collection,
            Err(e) => {
                console_warn!("Skipping capture after {:?}: {}", edit, e);
                return;
            }
        };
        console_log!("Capturing {} features after {:?}", collection.len(), edit);
        // Tagged with our id so the resulting change is not loaded back
        if let Err(e) = self.store.set_from(
            ChangeOrigin::Subscriber(self.subscription.id),
            Some(collection),
        ) {
            self.notices.push_back(Notice::CacheFailed(e.to_string()));
        }
    }

    /// Queue a notice raised outside the adapter.
    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }

    pub fn set_mode(&mut self, mode: DrawMode) -> Result<DrawMode, AdapterError> {
        let SurfaceState::Ready(surface) = &mut self.state else {
            self.notices.push_back(Notice::NotReady);
            return Err(AdapterError::NotReady);
        };

        let target = match mode {
            DrawMode::EditSelected => match surface.selected_ids().into_iter().next() {
                Some(id) => Some(id),
                None => {
                    self.notices.push_back(Notice::SelectFeatureFirst);
                    return Err(AdapterError::ModeTransition {
                        requested: mode.name(),
                    });
                }
            },
            _ => None,
        };

        surface.change_mode(mode, target.as_ref());
        self.mode = mode;
        Ok(mode)
    }

    /// Every feature on the surface right now.
    pub fn snapshot(&self) -> Result<FeatureCollection, AdapterError> {
        self.surface()
            .ok_or(AdapterError::NotReady)?
            .get_all()
    }

    /// Turn an upload result into an outcome and its notice.
    pub fn record_persist(&mut self, result: Result<(), BridgeError>) -> PersistOutcome {
        let outcome = PersistOutcome::from_upload(&result);
        match &outcome {
            PersistOutcome::Saved => self.notices.push_back(Notice::Saved),
            PersistOutcome::Failed(reason) => {
                console_warn!("Save failed: {}", reason);
                self.notices.push_back(Notice::SaveFailed(reason.clone()));
            }
        }
        outcome
    }

    /// A save that never reached the bridge because the surface could not be read.
    pub fn record_persist_blocked(&mut self, err: AdapterError) -> PersistOutcome {
        console_warn!("Save skipped: {}", err);
        let notice = match err {
            AdapterError::NotReady => Notice::NotReady,
            ref other => Notice::SaveFailed(other.to_string()),
        };
        self.notices.push_back(notice);
        PersistOutcome::Failed(err.to_string())
    }

    /// Upload the surface's features under `name`.
    ///
    /// Hosts that keep the adapter behind a `RefCell` go through
    /// `SessionController::persist`, which holds no borrow across the request.
    pub async fn persist<T: FileTransport>(
        &mut self,
        bridge: &PersistenceBridge<T>,
        credential: Option<&Credential>,
        name: &str,
    ) -> PersistOutcome {
        let collection = match self.snapshot() {
            Ok(collection) => collection,
            Err(e) => return self.record_persist_blocked(e),
        };
        let result = bridge.upload(credential, &collection, name).await;
        self.record_persist(result)
    }

    pub fn export(&self) -> Result<ExportArtifact, AdapterError> {
        let collection = self.snapshot()?;
        let contents = formats::serialize_pretty(&collection)
            .map_err(|e| AdapterError::Export(e.to_string()))?;
        Ok(ExportArtifact {
            file_name: self.export_file_name.clone(),
            mime: EXPORT_MIME,
            contents,
        })
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }
}

fn warn_unclosed_rings(collection: &FeatureCollection) {
    for feature in &collection.features {
        let rings = match &feature.geometry {
            Geometry::Polygon { coordinates } => coordinates.iter().collect::<Vec<_>>(),
            Geometry::MultiPolygon { coordinates } => coordinates.iter().flatten().collect(),
            _ => continue,
        };
        if rings.iter().any(|ring| !ring_is_closed(ring)) {
            console_warn!(
                "Feature {} has an unclosed polygon ring",
                feature
                    .id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "(no id)".to_string())
            );
        }
    }
}
