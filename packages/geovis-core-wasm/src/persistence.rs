use base64::Engine as _;

use crate::config::GeoVisConfig;
use crate::console_log;
use crate::error::BridgeError;
use crate::formats::{self, SourceFormat};
use crate::geojson_features::FeatureCollection;
use crate::models::{
    Credential, FetchOutcome, RemoteFile, SkippedFile, StoredFileRecord, UploadBody,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer: String,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one authenticated request to the storage API.
///
/// Only transport-level failures are errors here; HTTP statuses come back in
/// the response and are judged by the bridge.
#[allow(async_fn_in_trait)]
pub trait FileTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, BridgeError>;
}

/// Serialized collection wrapped in standard base64.
pub fn encode_payload(collection: &FeatureCollection) -> Result<String, BridgeError> {
    let json = formats::serialize(collection)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json.as_bytes()))
}

pub fn decode_payload(data: &str) -> Result<FeatureCollection, BridgeError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| BridgeError::Decode(format!("base64: {}", e)))?;
    let text = String::from_utf8(bytes).map_err(|e| BridgeError::Decode(format!("utf-8: {}", e)))?;
    formats::parse(&text, SourceFormat::GeoJson).map_err(|e| BridgeError::Decode(e.to_string()))
}

/// `data:` URL for offering a stored payload as a download.
pub fn payload_data_url(base64_payload: &str) -> String {
    format!("data:application/json;base64,{}", base64_payload)
}

fn bearer(credential: Option<&Credential>) -> Result<&str, BridgeError> {
    match credential {
        Some(c) if !c.access_token.trim().is_empty() => Ok(c.access_token.as_str()),
        _ => Err(BridgeError::Auth),
    }
}

fn check_status(response: TransportResponse) -> Result<TransportResponse, BridgeError> {
    match response.status {
        _ if response.is_success() => Ok(response),
        401 | 403 => Err(BridgeError::Auth),
        status => Err(BridgeError::Server {
            status,
            message: response.body.trim().to_string(),
        }),
    }
}

/// Moves feature collections to and from the account's file storage.
pub struct PersistenceBridge<T> {
    files_url: String,
    transport: T,
}

impl<T: FileTransport> PersistenceBridge<T> {
    pub fn new(config: &GeoVisConfig, transport: T) -> Self {
        PersistenceBridge {
            files_url: config.files_url(),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn upload(
        &self,
        credential: Option<&Credential>,
        collection: &FeatureCollection,
        name: &str,
    ) -> Result<(), BridgeError> {
        let token = bearer(credential)?;
        let body = serde_json::to_string(&UploadBody {
            file_name: name,
            file_data: encode_payload(collection)?,
        })?;

        console_log!(
            "Uploading {} features as '{}' ({} bytes)",
            collection.len(),
            name,
            body.len()
        );

        let response = self
            .transport
            .send(TransportRequest {
                method: HttpMethod::Post,
                url: self.files_url.clone(),
                bearer: token.to_string(),
                body: Some(body),
            })
            .await?;
        check_status(response)?;
        Ok(())
    }

    /// Every stored file for the account. Entries that fail to decode are
    /// reported in `skipped` instead of failing the whole fetch.
    pub async fn fetch_all(&self, credential: Option<&Credential>) -> Result<FetchOutcome, BridgeError> {
        let token = bearer(credential)?;
        let response = self
            .transport
            .send(TransportRequest {
                method: HttpMethod::Get,
                url: self.files_url.clone(),
                bearer: token.to_string(),
                body: None,
            })
            .await?;
        let response = check_status(response)?;

        // The server encodes an account with no files as `null`
        let entries: Option<Vec<serde_json::Value>> = serde_json::from_str(&response.body)
            .map_err(|e| BridgeError::Decode(format!("file list: {}", e)))?;

        let mut outcome = FetchOutcome::default();
        for (index, entry) in entries.unwrap_or_default().into_iter().enumerate() {
            match decode_entry(entry) {
                Ok(file) => outcome.files.push(file),
                Err(skipped) => {
                    crate::console_warn!(
                        "Skipping stored file #{} '{}': {}",
                        index,
                        skipped.name,
                        skipped.reason
                    );
                    outcome.skipped.push(skipped);
                }
            }
        }

        console_log!(
            "Fetched {} stored files ({} skipped)",
            outcome.files.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }
}

fn decode_entry(entry: serde_json::Value) -> Result<RemoteFile, SkippedFile> {
    let record: StoredFileRecord = serde_json::from_value(entry).map_err(|e| SkippedFile {
        name: String::new(),
        reason: e.to_string(),
    })?;
    let name = record.file_name.unwrap_or_default();
    let Some(data) = record.file_data else {
        return Err(SkippedFile {
            name,
            reason: "missing file data".to_string(),
        });
    };
    match decode_payload(&data) {
        Ok(collection) => Ok(RemoteFile { name, collection }),
        Err(e) => Err(SkippedFile {
            name,
            reason: e.to_string(),
        }),
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::GlooTransport;

#[cfg(target_arch = "wasm32")]
mod browser {
    use gloo_net::http::Request;

    use super::{FileTransport, HttpMethod, TransportRequest, TransportResponse};
    use crate::error::BridgeError;

    /// `fetch`-backed transport for the browser.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct GlooTransport;

    impl FileTransport for GlooTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, BridgeError> {
            let authorization = format!("Bearer {}", request.bearer);
            let builder = match request.method {
                HttpMethod::Get => Request::get(&request.url),
                HttpMethod::Post => Request::post(&request.url),
            }
            .header("Authorization", &authorization);

            let sent = match request.body {
                Some(body) => {
                    builder
                        .header("Content-Type", "application/json")
                        .body(body)
                        .map_err(|e| BridgeError::Network(e.to_string()))?
                        .send()
                        .await
                }
                None => builder.send().await,
            };
            let response = sent.map_err(|e| BridgeError::Network(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| BridgeError::Network(e.to_string()))?;
            Ok(TransportResponse { status, body })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::{FileTransport, TransportRequest, TransportResponse};
    use crate::error::BridgeError;

    /// Records every request and replays queued responses (200 `[]` when
    /// the queue is empty).
    #[derive(Default)]
    pub struct RecordingTransport {
        pub requests: RefCell<Vec<TransportRequest>>,
        responses: RefCell<VecDeque<Result<TransportResponse, BridgeError>>>,
    }

    impl RecordingTransport {
        pub fn respond(&self, status: u16, body: &str) {
            self.responses.borrow_mut().push_back(Ok(TransportResponse {
                status,
                body: body.to_string(),
            }));
        }

        pub fn fail(&self, message: &str) {
            self.responses
                .borrow_mut()
                .push_back(Err(BridgeError::Network(message.to_string())));
        }
    }

    impl FileTransport for RecordingTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, BridgeError> {
            self.requests.borrow_mut().push(request);
            self.responses.borrow_mut().pop_front().unwrap_or_else(|| {
                Ok(TransportResponse {
                    status: 200,
                    body: "[]".to_string(),
                })
            })
        }
    }
}
