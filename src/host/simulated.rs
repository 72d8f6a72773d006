//! In-memory design implementing [`HostApi`].
//!
//! A [`SimulatedHost`] holds one active [`Design`] loaded from a JSON
//! snapshot (see `config/sample-design.json`). Geometry is tracked at the
//! level the scripting API reports it: profile shapes, body topology counts,
//! bounding boxes and mass properties. Lengths are in centimetres.

use std::f64::consts::PI;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{Rgb, RgbImage};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

use super::error::{HostError, HostResult};
use super::model::{
    BodyInfo, BoundingBox, ComponentNode, ComponentTree, DataFileInfo, DesignSummary, DesignType,
    DocumentInfo, FeatureOperation, Plane, Point2, Screenshot, SketchDimension, SketchInfo,
    UserParameter, VersionHistory, VersionInfo,
};
use super::png;
use super::HostApi;

/// Product type reported for design documents.
pub const DESIGN_PRODUCT_TYPE: &str = "DesignProductType";

/// Occurrence nesting beyond this depth is not expanded in the component tree.
pub const MAX_TREE_DEPTH: usize = 5;

const SAMPLE_DESIGN: &str = include_str!("../../config/sample-design.json");

const BACKGROUND_TOP: Rgb<u8> = Rgb([214, 224, 235]);
const BACKGROUND_BOTTOM: Rgb<u8> = Rgb([150, 165, 184]);
const BODY_COLOURS: [Rgb<u8>; 4] = [
    Rgb([96, 120, 148]),
    Rgb([176, 122, 72]),
    Rgb([88, 140, 96]),
    Rgb([150, 92, 128]),
];

fn default_units() -> String {
    "mm".to_string()
}

fn default_product_type() -> String {
    DESIGN_PRODUCT_TYPE.to_string()
}

const fn default_true() -> bool {
    true
}

/// Snapshot of a design document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Design {
    /// Document name.
    pub name: String,
    /// Whether all changes are saved.
    #[serde(default)]
    pub is_saved: bool,
    /// Parametric or direct modelling.
    #[serde(default)]
    pub design_type: DesignType,
    /// Default length units.
    #[serde(default = "default_units")]
    pub units: String,
    /// Product type of the active product.
    #[serde(default = "default_product_type")]
    pub product_type: String,
    /// Name of the root component.
    pub root_component: String,
    /// Every component in the design, root included.
    pub components: IndexMap<String, Component>,
    /// User parameters.
    #[serde(default)]
    pub parameters: Vec<UserParameter>,
    /// Cloud data file; `None` for documents never saved to the cloud.
    #[serde(default)]
    pub data_file: Option<DataFile>,
    /// Component currently being edited.
    #[serde(default)]
    pub active_component: Option<String>,
    /// Number of timeline features created so far.
    #[serde(default)]
    pub features: usize,
}

/// A component and its contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Component {
    /// Sketches by name.
    #[serde(default)]
    pub sketches: IndexMap<String, Sketch>,
    /// Bodies by name.
    #[serde(default)]
    pub bodies: IndexMap<String, Body>,
    /// Child occurrences.
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
    /// State of the bodies folder light bulb.
    #[serde(default = "default_true")]
    pub bodies_visible: bool,
}

/// Placement of a component inside another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Occurrence {
    /// Occurrence name, e.g. `Bracket:1`.
    pub name: String,
    /// Name of the placed component.
    pub component: String,
}

/// A sketch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sketch {
    /// Construction plane.
    #[serde(default)]
    pub plane: Plane,
    /// Number of sketch curves.
    #[serde(default)]
    pub curves: usize,
    /// Number of geometric constraints.
    #[serde(default)]
    pub constraints: usize,
    /// Whether the sketch is fully constrained.
    #[serde(default)]
    pub fully_constrained: bool,
    /// Closed profiles, in creation order.
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Sketch dimensions.
    #[serde(default)]
    pub dimensions: Vec<SketchDimension>,
}

/// A closed sketch profile in sketch coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Profile {
    /// Axis-aligned rectangle.
    Rectangle {
        /// Lower-left corner.
        min: Point2,
        /// Upper-right corner.
        max: Point2,
    },
    /// Circle.
    Circle {
        /// Centre.
        center: Point2,
        /// Radius.
        radius: f64,
    },
}

impl Profile {
    fn area(&self) -> f64 {
        match *self {
            Self::Rectangle { min, max } => (max.x - min.x) * (max.y - min.y),
            Self::Circle { radius, .. } => PI * radius * radius,
        }
    }

    fn perimeter(&self) -> f64 {
        match *self {
            Self::Rectangle { min, max } => 2.0 * ((max.x - min.x) + (max.y - min.y)),
            Self::Circle { radius, .. } => 2.0 * PI * radius,
        }
    }

    fn extent(&self) -> (Point2, Point2) {
        match *self {
            Self::Rectangle { min, max } => (min, max),
            Self::Circle { center, radius } => (
                Point2::new(center.x - radius, center.y - radius),
                Point2::new(center.x + radius, center.y + radius),
            ),
        }
    }

    /// Faces, edges and vertices of a prism extruded from this profile.
    const fn prism_topology(&self) -> (usize, usize, usize) {
        match self {
            Self::Rectangle { .. } => (6, 12, 8),
            Self::Circle { .. } => (3, 2, 0),
        }
    }
}

/// A B-Rep body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Body {
    /// Solid or surface body.
    #[serde(default = "default_true")]
    pub is_solid: bool,
    /// Body light bulb.
    #[serde(default = "default_true")]
    pub is_visible: bool,
    /// Face count.
    pub faces: usize,
    /// Edge count.
    pub edges: usize,
    /// Vertex count.
    pub vertices: usize,
    /// Bounding box.
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    /// Volume (cm³).
    #[serde(default)]
    pub volume_cm3: Option<f64>,
    /// Surface area (cm²).
    #[serde(default)]
    pub area_cm2: Option<f64>,
}

/// Cloud data file of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataFile {
    /// Data file name.
    pub name: String,
    /// Lineage ID.
    pub id: String,
    /// Saved versions, oldest first.
    #[serde(default)]
    pub versions: Vec<Version>,
}

impl DataFile {
    fn current_version(&self) -> u32 {
        self.versions.iter().map(|v| v.number).max().unwrap_or(0)
    }
}

/// One saved version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Version {
    /// Version number (1-based).
    pub number: u32,
    /// Version ID.
    pub id: String,
    /// Version name.
    pub name: String,
    /// Save time.
    #[serde(default)]
    pub created: Option<chrono::DateTime<chrono::Utc>>,
    /// Save comment.
    #[serde(default)]
    pub description: Option<String>,
}

impl Design {
    /// The bundled sample design.
    ///
    /// # Panics
    ///
    /// Panics if the bundled snapshot is malformed, which its tests rule out.
    #[must_use]
    pub fn sample() -> Self {
        serde_json::from_str(SAMPLE_DESIGN).expect("bundled sample design is valid")
    }

    /// Loads a design snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a valid snapshot,
    /// or references components that do not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let design: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;
        design.validate()?;
        Ok(design)
    }

    /// Checks that every component reference resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first dangling reference.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dangling = |what: String| ConfigError::ValidationError {
            message: format!("design '{}': {what}", self.name),
        };

        if !self.components.contains_key(&self.root_component) {
            return Err(dangling(format!(
                "root component '{}' is not defined",
                self.root_component
            )));
        }
        for (name, component) in &self.components {
            for occurrence in &component.occurrences {
                if !self.components.contains_key(&occurrence.component) {
                    return Err(dangling(format!(
                        "occurrence '{}' in '{name}' places unknown component '{}'",
                        occurrence.name, occurrence.component
                    )));
                }
            }
        }
        if let Some(active) = &self.active_component {
            if !self.components.contains_key(active) {
                return Err(dangling(format!("active component '{active}' is not defined")));
            }
        }
        Ok(())
    }

    fn is_design(&self) -> bool {
        self.product_type == DESIGN_PRODUCT_TYPE
    }

    fn root(&self) -> HostResult<&Component> {
        self.components
            .get(&self.root_component)
            .ok_or_else(|| HostError::not_found("Component", &self.root_component))
    }

    fn component_mut(&mut self, name: &str) -> HostResult<&mut Component> {
        self.components
            .get_mut(name)
            .ok_or_else(|| HostError::not_found("Component", name))
    }

    /// Finds a sketch in any component; returns the owning component's name.
    fn find_sketch(&self, name: &str) -> HostResult<(&str, &Sketch)> {
        self.components
            .iter()
            .find_map(|(owner, component)| {
                component
                    .sketches
                    .get(name)
                    .map(|sketch| (owner.as_str(), sketch))
            })
            .ok_or_else(|| HostError::not_found("Sketch", name))
    }

    fn find_sketch_mut(&mut self, name: &str) -> HostResult<&mut Sketch> {
        self.components
            .values_mut()
            .find_map(|component| component.sketches.get_mut(name))
            .ok_or_else(|| HostError::not_found("Sketch", name))
    }

    fn next_name(&self, prefix: &str, count: usize, taken: impl Fn(&str) -> bool) -> String {
        let mut n = count + 1;
        loop {
            let candidate = format!("{prefix}{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn node(&self, name: &str, depth: usize) -> ComponentNode {
        let component = self.components.get(name);
        let occurrences = match component {
            Some(component) if depth < MAX_TREE_DEPTH => component
                .occurrences
                .iter()
                .map(|occurrence| {
                    let mut child = self.node(&occurrence.component, depth + 1);
                    child.occurrence_name = Some(occurrence.name.clone());
                    child.is_visible = Some(
                        self.components
                            .get(&occurrence.component)
                            .is_none_or(|c| c.bodies_visible),
                    );
                    child
                })
                .collect(),
            _ => Vec::new(),
        };

        ComponentNode {
            name: name.to_string(),
            bodies: component.map_or(0, |c| c.bodies.len()),
            sketches: component.map_or(0, |c| c.sketches.len()),
            occurrences,
            occurrence_name: None,
            is_visible: None,
        }
    }
}

/// Script execution hook: receives the code and the active design.
pub type ScriptRunner = Box<dyn FnMut(&str, &mut Design) -> HostResult<Value>>;

/// [`HostApi`] over an in-memory [`Design`].
pub struct SimulatedHost {
    document: Option<Design>,
    opened: Vec<String>,
    script_runner: Option<ScriptRunner>,
}

impl fmt::Debug for SimulatedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedHost")
            .field("document", &self.document.as_ref().map(|d| &d.name))
            .field("opened", &self.opened)
            .field("script_runner", &self.script_runner.is_some())
            .finish()
    }
}

impl SimulatedHost {
    /// Creates a host with `design` as the active document.
    #[must_use]
    pub const fn new(design: Design) -> Self {
        Self {
            document: Some(design),
            opened: Vec::new(),
            script_runner: None,
        }
    }

    /// Creates a host with no open document.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            document: None,
            opened: Vec::new(),
            script_runner: None,
        }
    }

    /// Installs the hook used by [`HostApi::run_script`].
    #[must_use]
    pub fn with_script_runner(
        mut self,
        runner: impl FnMut(&str, &mut Design) -> HostResult<Value> + 'static,
    ) -> Self {
        self.script_runner = Some(Box::new(runner));
        self
    }

    /// The active document, if any.
    pub const fn document(&self) -> Option<&Design> {
        self.document.as_ref()
    }

    /// Documents opened by [`HostApi::restore_version`], in order.
    pub fn opened_documents(&self) -> &[String] {
        &self.opened
    }

    fn active(&self) -> HostResult<&Design> {
        self.document.as_ref().ok_or(HostError::NoActiveDocument)
    }

    fn design(&self) -> HostResult<&Design> {
        let design = self.active()?;
        if design.is_design() {
            Ok(design)
        } else {
            Err(HostError::NotADesign)
        }
    }

    fn design_mut(&mut self) -> HostResult<&mut Design> {
        let design = self.document.as_mut().ok_or(HostError::NoActiveDocument)?;
        if design.is_design() {
            Ok(design)
        } else {
            Err(HostError::NotADesign)
        }
    }

    fn data_file(&self) -> HostResult<&DataFile> {
        self.active()?
            .data_file
            .as_ref()
            .ok_or(HostError::NotSavedToCloud)
    }
}

impl HostApi for SimulatedHost {
    fn document_info(&self) -> HostResult<DocumentInfo> {
        let document = self.active()?;
        let design = document.is_design().then(|| DesignSummary {
            design_type: document.design_type,
            units: document.units.clone(),
            component_count: document.components.len(),
            body_count: document
                .components
                .get(&document.root_component)
                .map_or(0, |root| root.bodies.len()),
        });

        Ok(DocumentInfo {
            name: document.name.clone(),
            is_saved: document.is_saved,
            data_file: document.data_file.as_ref().map(|file| DataFileInfo {
                name: file.name.clone(),
                id: file.id.clone(),
                version: file.current_version(),
            }),
            product_type: Some(document.product_type.clone()),
            design,
        })
    }

    fn component_tree(&self) -> HostResult<ComponentTree> {
        let design = self.design()?;
        Ok(ComponentTree {
            root_component: design.node(&design.root_component, 0),
            total_components: design.components.len(),
        })
    }

    fn sketches(&self, name: Option<&str>) -> HostResult<Vec<SketchInfo>> {
        let root = self.design()?.root()?;
        Ok(root
            .sketches
            .iter()
            .filter(|(sketch_name, _)| name.is_none_or(|wanted| wanted == sketch_name.as_str()))
            .map(|(sketch_name, sketch)| SketchInfo {
                name: sketch_name.clone(),
                is_fully_constrained: sketch.fully_constrained,
                profile_count: sketch.profiles.len(),
                curves_count: sketch.curves,
                dimensions_count: sketch.dimensions.len(),
                constraints_count: sketch.constraints,
                dimensions: sketch.dimensions.clone(),
            })
            .collect())
    }

    fn bodies(&self, name: Option<&str>) -> HostResult<Vec<BodyInfo>> {
        let design = self.design()?;
        let mut bodies = Vec::new();
        for (component_name, component) in &design.components {
            for (body_name, body) in &component.bodies {
                if name.is_some_and(|wanted| wanted != body_name) {
                    continue;
                }
                bodies.push(BodyInfo {
                    name: body_name.clone(),
                    component: component_name.clone(),
                    is_solid: body.is_solid,
                    is_visible: body.is_visible && component.bodies_visible,
                    face_count: body.faces,
                    edge_count: body.edges,
                    vertex_count: body.vertices,
                    bounding_box: body.bounding_box,
                    volume_cm3: body.volume_cm3.filter(|_| body.is_solid),
                    area_cm2: body.area_cm2,
                });
            }
        }
        Ok(bodies)
    }

    fn user_parameters(&self) -> HostResult<Vec<UserParameter>> {
        Ok(self.design()?.parameters.clone())
    }

    fn export_screenshot(&mut self, width: u32, height: u32) -> HostResult<Screenshot> {
        let document = self.active()?;
        if width == 0 || height == 0 {
            return Err(HostError::invalid_argument(format!(
                "Invalid screenshot size {width}x{height}"
            )));
        }

        let image = render_viewport(document, width, height);
        let bytes = png::encode_png(&image)
            .map_err(|e| HostError::ApiFailure(format!("Screenshot failed: {e}")))?;

        Ok(Screenshot {
            format: "png".to_string(),
            width: image.width(),
            height: image.height(),
            data_base64: BASE64.encode(bytes),
        })
    }

    fn run_script(&mut self, code: &str) -> HostResult<Value> {
        let design = self
            .document
            .as_mut()
            .filter(|d| d.is_design())
            .ok_or_else(|| HostError::Unsupported("No active design".to_string()))?;
        let runner = self.script_runner.as_mut().ok_or_else(|| {
            HostError::Unsupported("Script execution requires a live Fusion 360 host".to_string())
        })?;
        runner(code, design)
    }

    fn create_sketch(&mut self, component: Option<&str>, plane: Plane) -> HostResult<String> {
        let design = self.design_mut()?;
        let owner = component.map_or_else(|| design.root_component.clone(), str::to_string);
        if !design.components.contains_key(&owner) {
            return Err(HostError::not_found("Component", owner));
        }

        let count = design.components.values().map(|c| c.sketches.len()).sum();
        let name = design.next_name("Sketch", count, |candidate| {
            design
                .components
                .values()
                .any(|c| c.sketches.contains_key(candidate))
        });

        design.component_mut(&owner)?.sketches.insert(
            name.clone(),
            Sketch {
                plane,
                ..Sketch::default()
            },
        );
        design.is_saved = false;
        tracing::debug!(sketch = %name, component = %owner, plane = %plane, "Created sketch");
        Ok(name)
    }

    fn draw_circle(&mut self, sketch: &str, center: Point2, radius: f64) -> HostResult<()> {
        if radius <= 0.0 || !radius.is_finite() {
            return Err(HostError::invalid_argument(format!(
                "Radius must be positive, got {radius}"
            )));
        }
        let design = self.design_mut()?;
        let target = design.find_sketch_mut(sketch)?;
        target.curves += 1;
        target.profiles.push(Profile::Circle { center, radius });
        design.is_saved = false;
        Ok(())
    }

    fn draw_rectangle(
        &mut self,
        sketch: &str,
        corner: Point2,
        opposite: Point2,
    ) -> HostResult<()> {
        if corner.x == opposite.x || corner.y == opposite.y {
            return Err(HostError::invalid_argument(
                "Rectangle corners must differ in both x and y",
            ));
        }
        let design = self.design_mut()?;
        let target = design.find_sketch_mut(sketch)?;
        target.curves += 4;
        // Two horizontal and two vertical constraints
        target.constraints += 4;
        target.profiles.push(Profile::Rectangle {
            min: Point2::new(corner.x.min(opposite.x), corner.y.min(opposite.y)),
            max: Point2::new(corner.x.max(opposite.x), corner.y.max(opposite.y)),
        });
        design.is_saved = false;
        Ok(())
    }

    fn extrude(
        &mut self,
        sketch: &str,
        profile_index: usize,
        distance: f64,
        operation: FeatureOperation,
    ) -> HostResult<String> {
        if distance == 0.0 || !distance.is_finite() {
            return Err(HostError::invalid_argument(format!(
                "Extrude distance must be non-zero, got {distance}"
            )));
        }

        let design = self.design_mut()?;
        let (owner, plane, profile) = {
            let (owner, found) = design.find_sketch(sketch)?;
            let profile = found.profiles.get(profile_index).copied().ok_or_else(|| {
                HostError::invalid_argument(format!(
                    "Profile index {profile_index} out of range (0-{})",
                    found.profiles.len() as i64 - 1
                ))
            })?;
            (owner.to_string(), found.plane, profile)
        };

        let solid = Prism::new(&profile, plane, distance);
        let body_count: usize = design.components.values().map(|c| c.bodies.len()).sum();
        let new_body_name = design.next_name("Body", body_count, |candidate| {
            design
                .components
                .values()
                .any(|c| c.bodies.contains_key(candidate))
        });

        let component = design.component_mut(&owner)?;
        match operation {
            FeatureOperation::NewBody => {
                component.bodies.insert(new_body_name, solid.into_body());
            }
            FeatureOperation::Join | FeatureOperation::Cut => {
                let (_, body) = component.bodies.last_mut().ok_or_else(|| {
                    HostError::invalid_argument(format!(
                        "No body in component '{owner}' to {}",
                        if operation == FeatureOperation::Join { "join" } else { "cut" }
                    ))
                })?;
                if operation == FeatureOperation::Join {
                    solid.join_into(body);
                } else {
                    solid.cut_from(body);
                }
            }
        }

        design.features += 1;
        design.is_saved = false;
        let feature = format!("Extrude{}", design.features);
        tracing::debug!(feature = %feature, sketch = %sketch, ?operation, "Extruded profile");
        Ok(feature)
    }

    fn activate_component(&mut self, name: &str) -> HostResult<String> {
        let design = self.design_mut()?;
        if !design.components.contains_key(name) {
            return Err(HostError::not_found("Component", name));
        }
        design.active_component = Some(name.to_string());
        Ok(name.to_string())
    }

    fn set_visibility(&mut self, component: &str, visible: bool) -> HostResult<()> {
        let design = self.design_mut()?;
        design.component_mut(component)?.bodies_visible = visible;
        Ok(())
    }

    fn versions(&self) -> HostResult<VersionHistory> {
        let document = self.active()?;
        let data_file = self.data_file()?;
        Ok(VersionHistory {
            document_name: document.name.clone(),
            current_version: data_file.current_version(),
            total_versions: data_file.versions.len(),
            versions: data_file
                .versions
                .iter()
                .map(|version| VersionInfo {
                    version_number: version.number,
                    version_id: version.id.clone(),
                    name: version.name.clone(),
                    date_created: version.created,
                    description: version.description.clone(),
                })
                .collect(),
        })
    }

    fn restore_version(&mut self, version_number: u32) -> HostResult<String> {
        let data_file = self.data_file()?;
        let version = data_file
            .versions
            .iter()
            .find(|v| v.number == version_number)
            .ok_or_else(|| HostError::not_found("Version", version_number.to_string()))?;

        let opened = format!("{} v{}", data_file.name, version.number);
        tracing::info!(document = %opened, "Opened saved version");
        self.opened.push(opened.clone());
        Ok(opened)
    }
}

/// Solid swept from a profile along its sketch plane's normal.
struct Prism {
    bounds: BoundingBox,
    volume: f64,
    area: f64,
    topology: (usize, usize, usize),
}

impl Prism {
    fn new(profile: &Profile, plane: Plane, distance: f64) -> Self {
        let height = distance.abs();
        let (lo, hi) = profile.extent();
        let (w0, w1) = (distance.min(0.0), distance.max(0.0));

        Self {
            bounds: BoundingBox {
                min: lift(plane, lo.x, lo.y, w0),
                max: lift(plane, hi.x, hi.y, w1),
            },
            volume: profile.area() * height,
            area: 2.0f64.mul_add(profile.area(), profile.perimeter() * height),
            topology: profile.prism_topology(),
        }
    }

    fn into_body(self) -> Body {
        let (faces, edges, vertices) = self.topology;
        Body {
            is_solid: true,
            is_visible: true,
            faces,
            edges,
            vertices,
            bounding_box: Some(self.bounds),
            volume_cm3: Some(self.volume),
            area_cm2: Some(self.area),
        }
    }

    fn join_into(&self, body: &mut Body) {
        let (faces, edges, vertices) = self.topology;
        body.faces += faces;
        body.edges += edges;
        body.vertices += vertices;
        body.bounding_box = Some(
            body.bounding_box
                .map_or(self.bounds, |existing| existing.union(&self.bounds)),
        );
        body.volume_cm3 = Some(body.volume_cm3.unwrap_or(0.0) + self.volume);
        body.area_cm2 = Some(body.area_cm2.unwrap_or(0.0) + self.area);
    }

    fn cut_from(&self, body: &mut Body) {
        let (faces, edges, vertices) = self.topology;
        // Cut walls become new faces; the caps are subtracted
        body.faces += faces.saturating_sub(2);
        body.edges += edges;
        body.vertices += vertices;
        body.volume_cm3 = body.volume_cm3.map(|v| (v - self.volume).max(0.0));
    }
}

/// Maps sketch coordinates plus an offset along the plane normal to model space.
const fn lift(plane: Plane, u: f64, v: f64, w: f64) -> [f64; 3] {
    match plane {
        Plane::XY => [u, v, w],
        Plane::XZ => [u, w, v],
        Plane::YZ => [w, u, v],
    }
}

/// Renders visible bodies as a top view (looking down -Z).
fn render_viewport(document: &Design, width: u32, height: u32) -> RgbImage {
    let mut image = png::gradient(width, height, BACKGROUND_TOP, BACKGROUND_BOTTOM);

    let boxes: Vec<(usize, BoundingBox)> = document
        .components
        .values()
        .enumerate()
        .filter(|(_, component)| component.bodies_visible)
        .flat_map(|(index, component)| {
            component
                .bodies
                .values()
                .filter(|body| body.is_visible)
                .filter_map(move |body| body.bounding_box.map(|bounds| (index, bounds)))
        })
        .collect();

    let Some(scene) = boxes
        .iter()
        .map(|(_, bounds)| *bounds)
        .reduce(|a, b| a.union(&b))
    else {
        return image;
    };

    let span_x = (scene.max[0] - scene.min[0]).max(f64::EPSILON);
    let span_y = (scene.max[1] - scene.min[1]).max(f64::EPSILON);
    let (w, h) = (f64::from(width), f64::from(height));
    let scale = (w * 0.8 / span_x).min(h * 0.8 / span_y);
    let offset_x = (w - span_x * scale) / 2.0;
    let offset_y = (h - span_y * scale) / 2.0;

    let to_px = |value: f64, limit: f64| value.round().clamp(0.0, limit) as u32;
    for (index, bounds) in boxes {
        let x0 = to_px((bounds.min[0] - scene.min[0]).mul_add(scale, offset_x), w);
        let x1 = to_px((bounds.max[0] - scene.min[0]).mul_add(scale, offset_x), w);
        // Image rows grow downwards
        let y0 = to_px(h - (bounds.max[1] - scene.min[1]).mul_add(scale, offset_y), h);
        let y1 = to_px(h - (bounds.min[1] - scene.min[1]).mul_add(scale, offset_y), h);
        png::fill_rect(
            &mut image,
            x0,
            y0,
            x1.max(x0 + 1),
            y1.max(y0 + 1),
            BODY_COLOURS[index % BODY_COLOURS.len()],
        );
    }

    image
}
