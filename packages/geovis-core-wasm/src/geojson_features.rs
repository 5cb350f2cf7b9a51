use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One ordinate of a position. Numbers are kept as `f64`; anything else the
/// input carried (strings, nulls) is preserved so an editor never drops data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ordinate {
    Number(f64),
    Other(Value),
}

impl Ordinate {
    pub fn as_finite(&self) -> Option<f64> {
        match self {
            Ordinate::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

/// A coordinate tuple: `[lng, lat]` or `[lng, lat, alt]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub Vec<Ordinate>);

impl Position {
    pub fn new(lng: f64, lat: f64) -> Self {
        Position(vec![Ordinate::Number(lng), Ordinate::Number(lat)])
    }

    pub fn with_altitude(lng: f64, lat: f64, alt: f64) -> Self {
        Position(vec![
            Ordinate::Number(lng),
            Ordinate::Number(lat),
            Ordinate::Number(alt),
        ])
    }

    /// `(lng, lat)` when the first two ordinates are finite numbers.
    pub fn lng_lat(&self) -> Option<(f64, f64)> {
        match self.0.as_slice() {
            [lng, lat, ..] => Some((lng.as_finite()?, lat.as_finite()?)),
            _ => None,
        }
    }
}

impl From<[f64; 2]> for Position {
    fn from(pair: [f64; 2]) -> Self {
        Position::new(pair[0], pair[1])
    }
}

/// Closed set of GeoJSON geometry kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    pub fn point(lng: f64, lat: f64) -> Self {
        Geometry::Point {
            coordinates: Position::new(lng, lat),
        }
    }

    pub fn line_string(coords: &[[f64; 2]]) -> Self {
        Geometry::LineString {
            coordinates: coords.iter().copied().map(Position::from).collect(),
        }
    }

    /// Polygon with a single outer ring, given as written (not auto-closed).
    pub fn polygon(outer: &[[f64; 2]]) -> Self {
        Geometry::Polygon {
            coordinates: vec![outer.iter().copied().map(Position::from).collect()],
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
            Geometry::GeometryCollection { .. } => "GeometryCollection",
        }
    }
}

/// First and last positions of a ring are equal.
pub fn ring_is_closed(ring: &[Position]) -> bool {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) => ring.len() >= 4 && first == last,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    String(String),
    Number(serde_json::Number),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::String(s) => write!(f, "{}", s),
            FeatureId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        FeatureId::String(s.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(s: String) -> Self {
        FeatureId::String(s)
    }
}

// Tag values written into the "type" member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureCollectionTag {
    #[default]
    FeatureCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    pub kind: FeatureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Feature {
            kind: FeatureTag::Feature,
            id: None,
            geometry,
            properties: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }
}

/// An ordered group of features treated as one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    pub kind: FeatureCollectionTag,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureCollection {
            kind: FeatureCollectionTag::FeatureCollection,
            features,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }
}
