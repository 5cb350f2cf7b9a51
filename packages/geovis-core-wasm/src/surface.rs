use std::str::FromStr;

use crate::bounds::Bounds;
use crate::error::AdapterError;
use crate::geojson_features::{Feature, FeatureCollection, FeatureId, Geometry};

/// Drawing modes offered by the toolbar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrawMode {
    #[default]
    Select,
    DrawPoint,
    DrawLine,
    DrawPolygon,
    EditSelected,
}

impl DrawMode {
    pub const ALL: [DrawMode; 5] = [
        DrawMode::Select,
        DrawMode::DrawPoint,
        DrawMode::DrawLine,
        DrawMode::DrawPolygon,
        DrawMode::EditSelected,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DrawMode::Select => "select",
            DrawMode::DrawPoint => "draw-point",
            DrawMode::DrawLine => "draw-line",
            DrawMode::DrawPolygon => "draw-polygon",
            DrawMode::EditSelected => "edit-selected",
        }
    }

    /// Mode identifier understood by the map drawing toolkit.
    pub fn surface_name(self) -> &'static str {
        match self {
            DrawMode::Select => "simple_select",
            DrawMode::DrawPoint => "draw_point",
            DrawMode::DrawLine => "draw_line_string",
            DrawMode::DrawPolygon => "draw_polygon",
            DrawMode::EditSelected => "direct_select",
        }
    }
}

impl FromStr for DrawMode {
    type Err = String;

    // Accepts both our names and the toolkit's
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DrawMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s || mode.surface_name() == s)
            .ok_or_else(|| format!("unknown draw mode: {}", s))
    }
}

/// Kinds of user edit reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEdit {
    Created,
    Deleted,
    Updated,
}

impl FromStr for SurfaceEdit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" | "draw.create" => Ok(SurfaceEdit::Created),
            "delete" | "draw.delete" => Ok(SurfaceEdit::Deleted),
            "update" | "draw.update" => Ok(SurfaceEdit::Updated),
            other => Err(format!("unknown draw event: {}", other)),
        }
    }
}

/// An interactive map with a drawing tool on top.
pub trait DrawingSurface {
    fn delete_all(&mut self);
    fn add(&mut self, collection: &FeatureCollection);
    /// Every feature currently on the surface. Fails when the surface hands
    /// back something that is not a feature collection.
    fn get_all(&self) -> Result<FeatureCollection, AdapterError>;
    fn selected_ids(&self) -> Vec<FeatureId>;
    fn change_mode(&mut self, mode: DrawMode, feature: Option<&FeatureId>);
    fn fit_bounds(&mut self, bounds: &Bounds, padding: f64);
}

/// Headless surface, for native hosts and tests.
///
/// Like the browser toolkit it assigns ids to features added without one.
#[derive(Debug, Default)]
pub struct MemorySurface {
    features: Vec<Feature>,
    selected: Vec<FeatureId>,
    mode: DrawMode,
    mode_target: Option<FeatureId>,
    fitted: Vec<(Bounds, f64)>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_id() -> FeatureId {
        FeatureId::String(uuid::Uuid::new_v4().simple().to_string())
    }

    fn assign_id(mut feature: Feature) -> Feature {
        if feature.id.is_none() {
            feature.id = Some(Self::new_id());
        }
        feature
    }

    /// Simulate the user finishing a drawing.
    pub fn draw(&mut self, geometry: Geometry) -> FeatureId {
        let id = Self::new_id();
        self.features.push(Feature::new(geometry).with_id(id.clone()));
        id
    }

    pub fn update(&mut self, id: &FeatureId, geometry: Geometry) -> bool {
        match self.features.iter_mut().find(|f| f.id.as_ref() == Some(id)) {
            Some(feature) => {
                feature.geometry = geometry;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &FeatureId) -> bool {
        let before = self.features.len();
        self.features.retain(|f| f.id.as_ref() != Some(id));
        self.selected.retain(|s| s != id);
        self.features.len() != before
    }

    pub fn select(&mut self, ids: Vec<FeatureId>) {
        self.selected = ids;
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn mode_target(&self) -> Option<&FeatureId> {
        self.mode_target.as_ref()
    }

    /// Every `fit_bounds` call received, oldest first.
    pub fn fitted(&self) -> &[(Bounds, f64)] {
        &self.fitted
    }
}

impl DrawingSurface for MemorySurface {
    fn delete_all(&mut self) {
        self.features.clear();
        self.selected.clear();
    }

    fn add(&mut self, collection: &FeatureCollection) {
        for feature in &collection.features {
            let feature = Self::assign_id(feature.clone());
            // Same id replaces, as the toolkit does
            self.features.retain(|f| f.id != feature.id);
            self.features.push(feature);
        }
    }

    fn get_all(&self) -> Result<FeatureCollection, AdapterError> {
        Ok(FeatureCollection::new(self.features.clone()))
    }

    fn selected_ids(&self) -> Vec<FeatureId> {
        self.selected.clone()
    }

    fn change_mode(&mut self, mode: DrawMode, feature: Option<&FeatureId>) {
        self.mode = mode;
        self.mode_target = feature.cloned();
    }

    fn fit_bounds(&mut self, bounds: &Bounds, padding: f64) {
        self.fitted.push((*bounds, padding));
    }
}
