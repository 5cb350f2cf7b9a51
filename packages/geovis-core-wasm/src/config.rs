use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_STORAGE_KEY: &str = "geoData";
pub const DEFAULT_LIST_STORAGE_KEY: &str = "geoDataList";
pub const DEFAULT_FIT_PADDING: f64 = 50.0;
pub const DEFAULT_EXPORT_FILE_NAME: &str = "map-data.geojson";

/// Session configuration handed in by the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoVisConfig {
    pub api_endpoint: String,
    pub storage_key: String,
    pub list_storage_key: String,
    pub fit_padding: f64,
    pub export_file_name: String,
}

impl Default for GeoVisConfig {
    fn default() -> Self {
        GeoVisConfig {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            list_storage_key: DEFAULT_LIST_STORAGE_KEY.to_string(),
            fit_padding: DEFAULT_FIT_PADDING,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
        }
    }
}

impl GeoVisConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GeoVisConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validated()
    }

    #[cfg(target_arch = "wasm32")]
    pub fn from_js(value: wasm_bindgen::JsValue) -> Result<Self, ConfigError> {
        if value.is_undefined() || value.is_null() {
            return Ok(Self::default());
        }
        let config: GeoVisConfig = serde_wasm_bindgen::from_value(value)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validated()
    }

    /// Trims the endpoint and rejects unusable values.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.api_endpoint = self.api_endpoint.trim().trim_end_matches('/').to_string();
        if self.api_endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if !self.fit_padding.is_finite() || self.fit_padding < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "fitPadding must be a non-negative number, got {}",
                self.fit_padding
            )));
        }
        Ok(self)
    }

    pub fn files_url(&self) -> String {
        format!("{}/files", self.api_endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = GeoVisConfig::from_json(r#"{"apiEndpoint": "https://api.example.org/"}"#).unwrap();
        assert_eq!(config.api_endpoint, "https://api.example.org");
        assert_eq!(config.files_url(), "https://api.example.org/files");
        assert_eq!(config.storage_key, "geoData");
        assert_eq!(config.list_storage_key, "geoDataList");
        assert_eq!(config.fit_padding, 50.0);
        assert_eq!(config.export_file_name, "map-data.geojson");
    }

    #[test]
    fn test_rejects_empty_endpoint_and_bad_padding() {
        assert!(matches!(
            GeoVisConfig::from_json(r#"{"apiEndpoint": " / "}"#),
            Err(ConfigError::EmptyEndpoint)
        ));
        assert!(matches!(
            GeoVisConfig::from_json(r#"{"fitPadding": -4}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GeoVisConfig::from_json("not json"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
