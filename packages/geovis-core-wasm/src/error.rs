use thiserror::Error;

/// Upload or stored content that cannot be decoded.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid GeoJSON: {0}")]
    InvalidGeoJson(#[from] serde_json::Error),
    #[error("invalid KML: {0}")]
    InvalidKml(String),
    #[error("expected a FeatureCollection, Feature or Geometry, found {0}")]
    Unexpected(String),
}

/// Conditions the drawing adapter reports instead of acting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("drawing surface is not ready")]
    NotReady,
    #[error("cannot switch to {requested}: select a feature first")]
    ModeTransition { requested: &'static str },
    #[error("no feature data to show")]
    NoData,
    #[error("failed to serialize drawn features: {0}")]
    Export(String),
    #[error("drawing surface returned unreadable features: {0}")]
    SurfaceRead(String),
    #[error("drawing surface is busy handling another call")]
    Busy,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no valid credential available")]
    Auth,
    #[error("network error: {0}")]
    Network(String),
    #[error("storage server responded with status {status}: {message}")]
    Server { status: u16, message: String },
    #[error("failed to encode payload: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("failed to decode payload: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("browser storage unavailable")]
    Unavailable,
    #[error("storage error: {0}")]
    Io(String),
    #[error("stored entry is corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("apiEndpoint must not be empty")]
    EmptyEndpoint,
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Aggregate error surfaced at the wasm boundary.
#[derive(Debug, Error)]
pub enum GeoVisError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<GeoVisError> for wasm_bindgen::JsValue {
    fn from(err: GeoVisError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
