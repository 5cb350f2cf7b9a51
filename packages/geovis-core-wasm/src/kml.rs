// KML → feature collection conversion.
//
// Each <Placemark> with a geometry becomes one feature. Name, description and
// ExtendedData values are copied into the feature properties.

use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use crate::error::FormatError;
use crate::geojson_features::{Feature, FeatureCollection, Geometry, Position};

const GEOMETRY_TAGS: [&str; 6] = [
    "Point",
    "LineString",
    "LinearRing",
    "Polygon",
    "MultiGeometry",
    "Track",
];

pub fn parse_kml(raw_text: &str) -> Result<FeatureCollection, FormatError> {
    let doc = Document::parse(raw_text).map_err(|e| FormatError::InvalidKml(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "kml" {
        return Err(FormatError::InvalidKml(format!(
            "root element is <{}>, expected <kml>",
            root.tag_name().name()
        )));
    }

    let mut features = Vec::new();
    for placemark in root.descendants().filter(|n| is_element(n, "Placemark")) {
        let Some(geometry_node) = placemark
            .children()
            .find(|n| n.is_element() && GEOMETRY_TAGS.contains(&n.tag_name().name()))
        else {
            continue;
        };

        let Some(geometry) = convert_geometry(geometry_node)? else {
            continue;
        };

        let mut feature = Feature::new(geometry);
        if let Some(id) = placemark.attribute("id") {
            feature.id = Some(id.into());
        }
        feature.properties = Some(placemark_properties(placemark));
        features.push(feature);
    }

    Ok(FeatureCollection::new(features))
}

fn is_element(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_element(n, name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text()).map(str::trim)
}

fn placemark_properties(placemark: Node) -> Map<String, Value> {
    let mut properties = Map::new();
    if let Some(name) = child_text(placemark, "name") {
        properties.insert("name".to_string(), Value::String(name.to_string()));
    }
    if let Some(description) = child_text(placemark, "description") {
        properties.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
    }

    if let Some(extended) = child(placemark, "ExtendedData") {
        for data in extended.descendants().filter(|n| n.is_element()) {
            let value = match data.tag_name().name() {
                "Data" => child_text(data, "value"),
                "SimpleData" => data.text().map(str::trim),
                _ => continue,
            };
            if let (Some(key), Some(value)) = (data.attribute("name"), value) {
                properties.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
    }
    properties
}

// Returns Ok(None) for geometries that carry no coordinates at all.
fn convert_geometry(node: Node) -> Result<Option<Geometry>, FormatError> {
    let geometry = match node.tag_name().name() {
        "Point" => {
            let mut coords = coordinates_of(node)?;
            if coords.is_empty() {
                return Ok(None);
            }
            Geometry::Point {
                coordinates: coords.swap_remove(0),
            }
        }
        "LineString" => {
            let coords = coordinates_of(node)?;
            if coords.is_empty() {
                return Ok(None);
            }
            Geometry::LineString { coordinates: coords }
        }
        "LinearRing" => {
            let ring = coordinates_of(node)?;
            if ring.is_empty() {
                return Ok(None);
            }
            Geometry::Polygon {
                coordinates: vec![ring],
            }
        }
        "Polygon" => {
            let mut rings = Vec::new();
            for boundary in ["outerBoundaryIs", "innerBoundaryIs"] {
                for edge in node.children().filter(|n| is_element(n, boundary)) {
                    if let Some(ring) = child(edge, "LinearRing") {
                        rings.push(coordinates_of(ring)?);
                    }
                }
            }
            if rings.first().map_or(true, |outer| outer.is_empty()) {
                return Ok(None);
            }
            Geometry::Polygon { coordinates: rings }
        }
        "Track" => {
            let coords = track_coordinates(node)?;
            if coords.is_empty() {
                return Ok(None);
            }
            Geometry::LineString { coordinates: coords }
        }
        "MultiGeometry" => {
            let mut parts = Vec::new();
            for part in node
                .children()
                .filter(|n| n.is_element() && GEOMETRY_TAGS.contains(&n.tag_name().name()))
            {
                if let Some(geometry) = convert_geometry(part)? {
                    parts.push(geometry);
                }
            }
            if parts.is_empty() {
                return Ok(None);
            }
            collapse_multi(parts)
        }
        other => {
            return Err(FormatError::InvalidKml(format!(
                "unsupported geometry <{}>",
                other
            )))
        }
    };
    Ok(Some(geometry))
}

// Homogeneous parts become the matching Multi* geometry.
fn collapse_multi(parts: Vec<Geometry>) -> Geometry {
    if parts.iter().all(|g| matches!(g, Geometry::Point { .. })) {
        let coordinates = parts
            .into_iter()
            .filter_map(|g| match g {
                Geometry::Point { coordinates } => Some(coordinates),
                _ => None,
            })
            .collect();
        return Geometry::MultiPoint { coordinates };
    }
    if parts.iter().all(|g| matches!(g, Geometry::LineString { .. })) {
        let coordinates = parts
            .into_iter()
            .filter_map(|g| match g {
                Geometry::LineString { coordinates } => Some(coordinates),
                _ => None,
            })
            .collect();
        return Geometry::MultiLineString { coordinates };
    }
    if parts.iter().all(|g| matches!(g, Geometry::Polygon { .. })) {
        let coordinates = parts
            .into_iter()
            .filter_map(|g| match g {
                Geometry::Polygon { coordinates } => Some(coordinates),
                _ => None,
            })
            .collect();
        return Geometry::MultiPolygon { coordinates };
    }
    Geometry::GeometryCollection { geometries: parts }
}

fn coordinates_of(node: Node) -> Result<Vec<Position>, FormatError> {
    let Some(text) = child_text(node, "coordinates") else {
        return Ok(Vec::new());
    };
    text.split_whitespace()
        .map(|tuple| parse_tuple(tuple, ','))
        .collect()
}

// gx:Track carries one <gx:coord>"lng lat alt"</gx:coord> per sample.
fn track_coordinates(node: Node) -> Result<Vec<Position>, FormatError> {
    node.children()
        .filter(|n| is_element(n, "coord"))
        .filter_map(|n| n.text())
        .map(|text| parse_tuple(text.trim(), ' '))
        .collect()
}

fn parse_tuple(tuple: &str, separator: char) -> Result<Position, FormatError> {
    let values = tuple
        .split(separator)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| FormatError::InvalidKml(format!("bad coordinate \"{}\"", tuple)))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    match values.as_slice() {
        [lng, lat] => Ok(Position::new(*lng, *lat)),
        [lng, lat, alt, ..] => Ok(Position::with_altitude(*lng, *lat, *alt)),
        _ => Err(FormatError::InvalidKml(format!(
            "coordinate \"{}\" needs at least longitude and latitude",
            tuple
        ))),
    }
}
