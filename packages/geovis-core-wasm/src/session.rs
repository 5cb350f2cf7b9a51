use js_sys::Promise;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;

use crate::config::GeoVisConfig;
use crate::controller::SessionController;
use crate::drawing_adapter::{ExportArtifact, Notice, PersistOutcome};
use crate::error::{BridgeError, GeoVisError};
use crate::formats;
use crate::js_surface::{to_js, JsDrawSurface, JsSurface};
use crate::local_mirror::BrowserStorageMirror;
use crate::models::{Credential, SkippedFile};
use crate::persistence::{encode_payload, payload_data_url, GlooTransport};
use crate::state_store::GeoStore;
use crate::surface::{DrawMode, SurfaceEdit};
use crate::{console_log, console_warn};

#[derive(Serialize)]
struct NoticeEntry<'a> {
    notice: &'a Notice,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFileEntry<'a> {
    name: &'a str,
    download_name: String,
    feature_count: usize,
}

#[derive(Serialize)]
struct FetchSummary {
    files: usize,
    skipped: Vec<SkippedFile>,
}

fn js_error(err: impl Into<GeoVisError>) -> JsValue {
    err.into().into()
}

fn serde_error(err: serde_wasm_bindgen::Error) -> JsValue {
    err.into()
}

// Only the token is needed. Anything unreadable counts as logged out, which the
// bridge reports as an auth failure without sending a request.
fn parse_credential(value: JsValue) -> Option<Credential> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| console_warn!("Ignoring unreadable session: {}", e))
        .ok()
}

/// One browser session: the shared store, the map adapter and the storage API.
#[wasm_bindgen]
pub struct GeoSession {
    controller: SessionController<JsSurface, GlooTransport>,
}

#[wasm_bindgen]
impl GeoSession {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<GeoSession, JsValue> {
        let config = GeoVisConfig::from_js(config).map_err(js_error)?;
        let store = GeoStore::open(BrowserStorageMirror, &config);
        console_log!("GeoSession created against {}", config.files_url());
        Ok(GeoSession {
            controller: SessionController::new(store, &config, GlooTransport),
        })
    }

    /// Parse an uploaded file and make it the current collection.
    #[wasm_bindgen(js_name = loadFile)]
    pub fn load_file(&self, file_name: &str, raw_text: &str) -> Result<usize, JsValue> {
        self.controller.load_file(file_name, raw_text).map_err(js_error)
    }

    #[wasm_bindgen(js_name = currentGeoJson)]
    pub fn current_geojson(&self) -> Result<Option<String>, JsValue> {
        self.controller
            .store()
            .get()
            .map(|collection| formats::serialize(&collection))
            .transpose()
            .map_err(|e| js_error(BridgeError::Encoding(e)))
    }

    #[wasm_bindgen(js_name = hasData)]
    pub fn has_data(&self) -> bool {
        self.controller.store().has_data()
    }

    pub fn clear(&self) {
        self.controller.clear();
    }

    #[wasm_bindgen(js_name = mountSurface)]
    pub fn mount_surface(&self, surface: JsDrawSurface) -> Result<(), JsValue> {
        self.controller
            .mount(JsSurface::new(surface))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = surfaceFailed)]
    pub fn surface_failed(&self, reason: &str) -> Result<(), JsValue> {
        self.controller.mount_failed(reason).map_err(js_error)
    }

    /// Forward a draw.create / draw.delete / draw.update event. Safe to call
    /// from listeners that fire while the session is calling into the map.
    #[wasm_bindgen(js_name = drawEvent)]
    pub fn draw_event(&self, kind: &str) -> Result<(), JsValue> {
        let edit: SurfaceEdit = kind.parse().map_err(|e: String| JsValue::from_str(&e))?;
        self.controller.draw_event(edit);
        Ok(())
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&self, mode: &str) -> Result<String, JsValue> {
        let mode: DrawMode = mode.parse().map_err(|e: String| JsValue::from_str(&e))?;
        self.controller
            .set_mode(mode)
            .map(|mode| mode.name().to_string())
            .map_err(js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> String {
        self.controller.mode().name().to_string()
    }

    /// Offer the drawn features as a file download.
    #[wasm_bindgen(js_name = exportDownload)]
    pub fn export_download(&self) -> Result<(), JsValue> {
        let artifact = self.controller.export().map_err(js_error)?;
        let href = format!(
            "data:{};charset=utf-8,{}",
            artifact.mime,
            String::from(js_sys::encode_uri_component(&artifact.contents))
        );
        trigger_download(&artifact, &href)
    }

    /// Upload the drawn features under `file_name`. Resolves to whether it
    /// saved; the reason for a failure is queued as a notice.
    pub fn persist(&self, file_name: String, credential: JsValue) -> Promise {
        let controller = self.controller.clone();
        let credential = parse_credential(credential);
        future_to_promise(async move {
            let outcome = controller.persist(&file_name, credential.as_ref()).await;
            Ok(JsValue::from_bool(outcome == PersistOutcome::Saved))
        })
    }

    /// Load the account's stored files for the view `view_id`.
    ///
    /// If the view unmounts before the response arrives the result is dropped
    /// and the promise resolves to `undefined`.
    #[wasm_bindgen(js_name = fetchFiles)]
    pub fn fetch_files(&self, view_id: String, credential: JsValue) -> Promise {
        let fetch = self
            .controller
            .fetch_files(&view_id, parse_credential(credential));
        future_to_promise(async move {
            match fetch.await.map_err(js_error)? {
                Some(outcome) => to_js(&FetchSummary {
                    files: outcome.files.len(),
                    skipped: outcome.skipped,
                })
                .map_err(serde_error),
                None => Ok(JsValue::UNDEFINED),
            }
        })
    }

    #[wasm_bindgen(js_name = unmountView)]
    pub fn unmount_view(&self, view_id: &str) -> bool {
        self.controller.unmount_view(view_id)
    }

    #[wasm_bindgen(js_name = remoteFiles)]
    pub fn remote_files(&self) -> Result<JsValue, JsValue> {
        let files = self.controller.store().remote_files();
        let entries: Vec<RemoteFileEntry> = files
            .iter()
            .map(|file| RemoteFileEntry {
                name: &file.name,
                download_name: file.download_name(),
                feature_count: file.collection.len(),
            })
            .collect();
        to_js(&entries).map_err(serde_error)
    }

    /// `data:` URL for downloading a stored file, in the server's base64 encoding.
    #[wasm_bindgen(js_name = remoteFileUrl)]
    pub fn remote_file_url(&self, index: usize) -> Result<Option<String>, JsValue> {
        let files = self.controller.store().remote_files();
        let Some(file) = files.get(index) else {
            return Ok(None);
        };
        let payload = encode_payload(&file.collection).map_err(js_error)?;
        Ok(Some(payload_data_url(&payload)))
    }

    /// Make a stored file the current collection, as if it had been uploaded.
    #[wasm_bindgen(js_name = openRemoteFile)]
    pub fn open_remote_file(&self, index: usize) -> bool {
        self.controller.open_remote_file(index)
    }

    #[wasm_bindgen(js_name = isLoading)]
    pub fn is_loading(&self) -> bool {
        self.controller.store().loading()
    }

    #[wasm_bindgen(js_name = fetchError)]
    pub fn fetch_error(&self) -> Option<String> {
        self.controller.store().error()
    }

    #[wasm_bindgen(js_name = drainNotices)]
    pub fn drain_notices(&self) -> Result<JsValue, JsValue> {
        let notices = self.controller.drain_notices();
        let entries: Vec<NoticeEntry> = notices
            .iter()
            .map(|notice| NoticeEntry {
                notice,
                message: notice.message(),
            })
            .collect();
        to_js(&entries).map_err(serde_error)
    }

    /// `[[west, south], [east, north]]` of the current collection, or `null`.
    pub fn bounds(&self) -> Result<JsValue, JsValue> {
        match self.controller.bounds() {
            Some(bounds) => to_js(&bounds).map_err(serde_error),
            None => Ok(JsValue::NULL),
        }
    }
}

fn trigger_download(artifact: &ExportArtifact, href: &str) -> Result<(), JsValue> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| JsValue::from_str("no document available"))?;
    let anchor = document
        .create_element("a")?
        .dyn_into::<web_sys::HtmlAnchorElement>()?;
    anchor.set_href(href);
    anchor.set_download(&artifact.file_name);

    let body = document.body();
    if let Some(body) = &body {
        body.append_child(&anchor)?;
    }
    anchor.click();
    if body.is_some() {
        anchor.remove();
    }
    console_log!("Exported {} as {}", artifact.file_name, artifact.mime);
    Ok(())
}
