use geo_types::{coord, Coord, Rect};
use serde::Serialize;

use crate::geojson_features::{FeatureCollection, Geometry, Position};

/// Lng/lat box used to fit the map viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds(Rect<f64>);

impl Bounds {
    pub fn new(southwest: Coord<f64>, northeast: Coord<f64>) -> Self {
        Bounds(Rect::new(southwest, northeast))
    }

    pub fn southwest(&self) -> Coord<f64> {
        self.0.min()
    }

    pub fn northeast(&self) -> Coord<f64> {
        self.0.max()
    }

    pub fn rect(&self) -> Rect<f64> {
        self.0
    }

    /// `[[west, south], [east, north]]`, the shape map libraries take in `fitBounds`.
    pub fn to_lng_lat_pairs(&self) -> [[f64; 2]; 2] {
        let sw = self.southwest();
        let ne = self.northeast();
        [[sw.x, sw.y], [ne.x, ne.y]]
    }
}

impl Serialize for Bounds {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_lng_lat_pairs().serialize(serializer)
    }
}

#[derive(Default)]
struct BoundsBuilder {
    min_lng: f64,
    min_lat: f64,
    max_lng: f64,
    max_lat: f64,
    accepted: usize,
}

impl BoundsBuilder {
    fn extend(&mut self, position: &Position) {
        // Malformed positions are skipped, the rest of the feature still counts
        let Some((lng, lat)) = position.lng_lat() else {
            return;
        };
        if self.accepted == 0 {
            self.min_lng = lng;
            self.max_lng = lng;
            self.min_lat = lat;
            self.max_lat = lat;
        } else {
            self.min_lng = self.min_lng.min(lng);
            self.max_lng = self.max_lng.max(lng);
            self.min_lat = self.min_lat.min(lat);
            self.max_lat = self.max_lat.max(lat);
        }
        self.accepted += 1;
    }

    fn finish(self) -> Option<Bounds> {
        if self.accepted == 0 {
            return None;
        }
        Some(Bounds::new(
            coord! { x: self.min_lng, y: self.min_lat },
            coord! { x: self.max_lng, y: self.max_lat },
        ))
    }
}

/// Smallest box around every polygon outer ring and line string in the
/// collection. Points and multi-geometries do not contribute.
pub fn compute_bounds(collection: &FeatureCollection) -> Option<Bounds> {
    let mut builder = BoundsBuilder::default();

    for feature in &collection.features {
        match &feature.geometry {
            Geometry::Polygon { coordinates } => {
                // Only the outer ring matters; a polygon without rings is skipped
                if let Some(outer) = coordinates.first() {
                    outer.iter().for_each(|p| builder.extend(p));
                }
            }
            Geometry::LineString { coordinates } => {
                coordinates.iter().for_each(|p| builder.extend(p));
            }
            Geometry::Point { .. }
            | Geometry::MultiPoint { .. }
            | Geometry::MultiLineString { .. }
            | Geometry::MultiPolygon { .. }
            | Geometry::GeometryCollection { .. } => {}
        }
    }

    builder.finish()
}
