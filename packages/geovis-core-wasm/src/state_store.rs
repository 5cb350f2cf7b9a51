use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use std::cell::RefCell;
use std::rc::Rc;

use crate::config::GeoVisConfig;
use crate::error::MirrorError;
use crate::formats::{self, SourceFormat};
use crate::geojson_features::FeatureCollection;
use crate::liveness::LivenessToken;
use crate::local_mirror::LocalMirror;
use crate::models::{FetchOutcome, RemoteFile};
use crate::{console_error, console_log, console_warn};

pub type SubscriberId = u64;

/// Who replaced the current collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Upload, reset, remote load: anything outside a subscriber.
    External,
    Subscriber(SubscriberId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub revision: u64,
    pub origin: ChangeOrigin,
}

pub struct Subscription {
    pub id: SubscriberId,
    pub changes: UnboundedReceiver<StoreChange>,
}

struct StoreInner {
    current: Option<FeatureCollection>,
    remote_files: Vec<RemoteFile>,
    // Fetches started and not yet finished, stale ones included
    in_flight: usize,
    error: Option<String>,
    revision: u64,
    next_subscriber: SubscriberId,
    subscribers: Vec<UnboundedSender<StoreChange>>,
    mirror: Box<dyn LocalMirror>,
    storage_key: String,
    list_storage_key: String,
}

/// The session's single "current feature collection" cell.
///
/// Cloning gives another handle to the same cell; every handle sees a `set`
/// immediately.
#[derive(Clone)]
pub struct GeoStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl GeoStore {
    /// Opens the store, recovering whatever the mirror holds from an earlier page.
    pub fn open(mirror: impl LocalMirror + 'static, config: &GeoVisConfig) -> Self {
        let mut mirror: Box<dyn LocalMirror> = Box::new(mirror);
        let current = recover_collection(mirror.as_mut(), &config.storage_key);
        let remote_files = recover_file_list(mirror.as_mut(), &config.list_storage_key);

        GeoStore {
            inner: Rc::new(RefCell::new(StoreInner {
                current,
                remote_files,
                in_flight: 0,
                error: None,
                revision: 0,
                next_subscriber: 1,
                subscribers: Vec::new(),
                mirror,
                storage_key: config.storage_key.clone(),
                list_storage_key: config.list_storage_key.clone(),
            })),
        }
    }

    pub fn get(&self) -> Option<FeatureCollection> {
        self.inner.borrow().current.clone()
    }

    pub fn has_data(&self) -> bool {
        self.inner
            .borrow()
            .current
            .as_ref()
            .is_some_and(|c| !c.is_empty())
    }

    pub fn revision(&self) -> u64 {
        self.inner.borrow().revision
    }

    pub fn set(&self, collection: Option<FeatureCollection>) -> Result<(), MirrorError> {
        self.set_from(ChangeOrigin::External, collection)
    }

    /// Replace the current collection and mirror it (write on `Some`, delete on `None`).
    ///
    /// The in-memory value and the notifications always go through; a mirror
    /// failure is returned afterwards.
    pub fn set_from(
        &self,
        origin: ChangeOrigin,
        collection: Option<FeatureCollection>,
    ) -> Result<(), MirrorError> {
        let mut inner = self.inner.borrow_mut();
        let key = inner.storage_key.clone();
        let mirrored = match &collection {
            Some(c) => formats::serialize(c)
                .map_err(|e| MirrorError::Io(e.to_string()))
                .and_then(|json| inner.mirror.write(&key, &json)),
            None => inner.mirror.remove(&key),
        };

        inner.current = collection;
        inner.revision += 1;
        let change = StoreChange {
            revision: inner.revision,
            origin,
        };
        inner
            .subscribers
            .retain(|tx| tx.unbounded_send(change).is_ok());

        if let Err(e) = &mirrored {
            console_error!("Failed to mirror geo data under '{}': {}", key, e);
        }
        mirrored
    }

    pub fn subscribe(&self) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let (tx, rx) = unbounded();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push(tx);
        Subscription { id, changes: rx }
    }

    pub fn remote_files(&self) -> Vec<RemoteFile> {
        self.inner.borrow().remote_files.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.borrow().in_flight > 0
    }

    pub fn error(&self) -> Option<String> {
        self.inner.borrow().error.clone()
    }

    pub fn begin_fetch(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.in_flight += 1;
        inner.error = None;
    }

    fn end_fetch(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }

    /// Apply a finished fetch, unless the view that asked for it is gone.
    /// Either way the fetch no longer counts as loading.
    pub fn finish_fetch(&self, token: &LivenessToken, outcome: FetchOutcome) -> bool {
        self.end_fetch();
        if !token.is_alive() {
            console_log!("Discarding file list for unmounted view '{}'", token.view_id);
            return false;
        }

        let mut inner = self.inner.borrow_mut();
        inner.error = None;
        match serde_json::to_string(&outcome.files) {
            Ok(json) => {
                let key = inner.list_storage_key.clone();
                if let Err(e) = inner.mirror.write(&key, &json) {
                    console_warn!("Failed to cache file list: {}", e);
                }
            }
            Err(e) => console_warn!("Failed to serialize file list: {}", e),
        }
        inner.remote_files = outcome.files;
        true
    }

    pub fn fail_fetch(&self, token: &LivenessToken, message: &str) -> bool {
        self.end_fetch();
        if !token.is_alive() {
            console_log!("Discarding fetch error for unmounted view '{}'", token.view_id);
            return false;
        }
        let mut inner = self.inner.borrow_mut();
        inner.error = Some(message.to_string());
        true
    }
}

fn recover_collection(mirror: &mut dyn LocalMirror, key: &str) -> Option<FeatureCollection> {
    let raw = match mirror.read(key) {
        Ok(raw) => raw?,
        Err(e) => {
            console_warn!("Could not read mirrored geo data: {}", e);
            return None;
        }
    };
    match formats::parse(&raw, SourceFormat::GeoJson).map_err(|e| MirrorError::Corrupt(e.to_string())) {
        Ok(collection) => {
            console_log!("Recovered {} features from local storage", collection.len());
            Some(collection)
        }
        Err(e) => {
            console_warn!("Dropping mirrored geo data under '{}': {}", key, e);
            let _ = mirror.remove(key);
            None
        }
    }
}

fn recover_file_list(mirror: &mut dyn LocalMirror, key: &str) -> Vec<RemoteFile> {
    let Ok(Some(raw)) = mirror.read(key) else {
        return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        console_warn!("Dropping cached file list under '{}': {}", key, MirrorError::Corrupt(e.to_string()));
        let _ = mirror.remove(key);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson_features::{Feature, Geometry};
    use crate::liveness::LivenessRegistry;
    use crate::local_mirror::MemoryMirror;

    fn sample() -> FeatureCollection {
        FeatureCollection::new(vec![Feature::new(Geometry::line_string(&[[0.0, 0.0], [1.0, 1.0]]))])
    }

    fn open(mirror: &MemoryMirror) -> GeoStore {
        GeoStore::open(mirror.clone(), &GeoVisConfig::default())
    }

    #[test]
    fn test_set_is_visible_to_every_handle_and_mirrored() {
        let mirror = MemoryMirror::new();
        let store = open(&mirror);
        let other_consumer = store.clone();

        store.set(Some(sample())).unwrap();
        assert_eq!(other_consumer.get(), Some(sample()));
        assert!(mirror.contains("geoData"));
        assert!(other_consumer.has_data());

        store.set(None).unwrap();
        assert_eq!(other_consumer.get(), None);
        assert!(!mirror.contains("geoData"));
    }

    #[test]
    fn test_reopen_recovers_last_state() {
        let mirror = MemoryMirror::new();
        open(&mirror).set(Some(sample())).unwrap();

        let reopened = open(&mirror);
        assert_eq!(reopened.get(), Some(sample()));
    }

    #[test]
    fn test_corrupt_mirror_entry_is_dropped() {
        let mut mirror = MemoryMirror::new();
        mirror.write("geoData", "{ definitely not geojson").unwrap();
        mirror.write("geoDataList", "42").unwrap();

        let store = open(&mirror);
        assert_eq!(store.get(), None);
        assert!(store.remote_files().is_empty());
        assert!(!mirror.contains("geoData"));
        assert!(!mirror.contains("geoDataList"));
    }

    #[test]
    fn test_subscribers_see_each_change_with_origin() {
        let store = open(&MemoryMirror::new());
        let mut first = store.subscribe();
        let second = store.subscribe();
        assert_ne!(first.id, second.id);
        drop(second);

        store.set(Some(sample())).unwrap();
        store.set_from(ChangeOrigin::Subscriber(first.id), None).unwrap();

        let changes: Vec<StoreChange> = std::iter::from_fn(|| first.changes.try_next().ok().flatten()).collect();
        assert_eq!(
            changes,
            vec![
                StoreChange { revision: 1, origin: ChangeOrigin::External },
                StoreChange { revision: 2, origin: ChangeOrigin::Subscriber(first.id) },
            ]
        );
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_fetch_results_respect_liveness() {
        let mirror = MemoryMirror::new();
        let store = open(&mirror);
        let mut views = LivenessRegistry::new();
        let files = vec![RemoteFile {
            name: "farm".to_string(),
            collection: sample(),
        }];

        let stale = views.mount("profile");
        store.begin_fetch();
        assert!(store.loading());
        views.unmount("profile");
        assert!(!store.finish_fetch(
            &stale,
            FetchOutcome { files: files.clone(), skipped: vec![] }
        ));
        assert!(store.remote_files().is_empty());

        let live = views.mount("profile");
        assert!(store.finish_fetch(&live, FetchOutcome { files: files.clone(), skipped: vec![] }));
        assert!(!store.loading());
        assert_eq!(store.remote_files(), files);
        assert!(mirror.contains("geoDataList"));

        assert_eq!(open(&mirror).remote_files(), files);

        assert!(store.fail_fetch(&live, "Failed to fetch geo data."));
        assert_eq!(store.error().as_deref(), Some("Failed to fetch geo data."));
    }

    #[test]
    fn test_stale_completion_still_ends_loading() {
        let store = open(&MemoryMirror::new());
        let mut views = LivenessRegistry::new();

        let stale = views.mount("profile");
        store.begin_fetch();
        views.unmount("profile");
        assert!(!store.finish_fetch(&stale, FetchOutcome::default()));
        assert!(!store.loading());

        let failed = views.mount("profile");
        store.begin_fetch();
        views.unmount("profile");
        assert!(!store.fail_fetch(&failed, "offline"));
        assert!(!store.loading());
        assert_eq!(store.error(), None);
    }

    #[test]
    fn test_overlapping_fetches_load_until_the_last_ends() {
        let store = open(&MemoryMirror::new());
        let mut views = LivenessRegistry::new();

        let first = views.mount("profile");
        store.begin_fetch();
        let second = views.mount("profile");
        store.begin_fetch();

        assert!(!store.finish_fetch(&first, FetchOutcome::default()));
        assert!(store.loading());
        assert!(store.finish_fetch(&second, FetchOutcome::default()));
        assert!(!store.loading());
    }
}
