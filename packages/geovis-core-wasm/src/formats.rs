use serde_json::Value;

use crate::error::FormatError;
use crate::geojson_features::{Feature, FeatureCollection, Geometry};
use crate::kml;

/// Input formats accepted by the upload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Native structured format, decoded as-is.
    GeoJson,
    /// Keyhole markup, converted placemark by placemark.
    Kml,
}

impl SourceFormat {
    pub fn from_file_name(name: &str) -> Result<Self, FormatError> {
        let lower = name.trim().to_ascii_lowercase();
        if lower.ends_with(".geojson") {
            Ok(SourceFormat::GeoJson)
        } else if lower.ends_with(".kml") {
            Ok(SourceFormat::Kml)
        } else {
            Err(FormatError::UnsupportedFormat(name.to_string()))
        }
    }
}

pub fn parse(raw_text: &str, format: SourceFormat) -> Result<FeatureCollection, FormatError> {
    match format {
        SourceFormat::GeoJson => parse_geojson(raw_text),
        SourceFormat::Kml => kml::parse_kml(raw_text),
    }
}

/// Parse using the file extension to pick the format.
pub fn parse_file(file_name: &str, raw_text: &str) -> Result<FeatureCollection, FormatError> {
    parse(raw_text, SourceFormat::from_file_name(file_name)?)
}

// A bare Feature or Geometry is accepted and wrapped, the same inputs the
// drawing toolkit takes in `add`.
fn parse_geojson(raw_text: &str) -> Result<FeatureCollection, FormatError> {
    let value: Value = serde_json::from_str(raw_text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FormatError::Unexpected("an object without a \"type\"".to_string()))?;

    match kind.as_str() {
        "FeatureCollection" => Ok(serde_json::from_value(value)?),
        "Feature" => {
            let feature: Feature = serde_json::from_value(value)?;
            Ok(FeatureCollection::new(vec![feature]))
        }
        "Point" | "MultiPoint" | "LineString" | "MultiLineString" | "Polygon" | "MultiPolygon"
        | "GeometryCollection" => {
            let geometry: Geometry = serde_json::from_value(value)?;
            Ok(FeatureCollection::new(vec![Feature::new(geometry)]))
        }
        other => Err(FormatError::Unexpected(format!("\"{}\"", other))),
    }
}

pub fn serialize(collection: &FeatureCollection) -> Result<String, serde_json::Error> {
    serde_json::to_string(collection)
}

pub fn serialize_pretty(collection: &FeatureCollection) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(collection)
}
