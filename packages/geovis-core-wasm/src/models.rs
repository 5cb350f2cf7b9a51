// Shared records exchanged with the auth layer and the storage API
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::geojson_features::FeatureCollection;

/// User attached to an authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

// The auth server hands out numeric user ids; only the token matters here
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Session object from the external auth layer. The token is opaque here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub user: SessionUser,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credential {
            access_token: token.into(),
            user: SessionUser::default(),
        }
    }
}

/// A file stored against the account, already decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub collection: FeatureCollection,
}

impl RemoteFile {
    pub fn download_name(&self) -> String {
        format!("{}.geojson", self.name)
    }
}

// Body of POST /files
#[derive(Debug, Serialize)]
pub(crate) struct UploadBody<'a> {
    pub file_name: &'a str,
    pub file_data: String,
}

// One element of the GET /files response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredFileRecord {
    pub file_name: Option<String>,
    pub file_data: Option<String>,
}

/// Entry that could not be decoded during a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub files: Vec<RemoteFile>,
    pub skipped: Vec<SkippedFile>,
}
