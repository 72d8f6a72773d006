//! Records returned by host API calls.
//!
//! These map one-to-one onto the JSON objects delivered to callers. Lengths
//! are in the host's internal unit (centimetres).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::HostError;

/// A point in sketch coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    /// X coordinate (cm).
    pub x: f64,
    /// Y coordinate (cm).
    pub y: f64,
}

impl Point2 {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Origin construction plane for a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Plane {
    /// The XY plane.
    #[default]
    XY,
    /// The XZ plane.
    XZ,
    /// The YZ plane.
    YZ,
}

impl FromStr for Plane {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "XY" => Ok(Self::XY),
            "XZ" => Ok(Self::XZ),
            "YZ" => Ok(Self::YZ),
            other => Err(HostError::invalid_argument(format!(
                "Invalid plane '{other}'. Use 'XY', 'XZ', or 'YZ'"
            ))),
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::XY => "XY",
            Self::XZ => "XZ",
            Self::YZ => "YZ",
        })
    }
}

/// How an extrusion combines with existing bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureOperation {
    /// Create a new body.
    #[default]
    NewBody,
    /// Add material to an existing body.
    Join,
    /// Remove material from an existing body.
    Cut,
}

impl FromStr for FeatureOperation {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::NewBody),
            "join" => Ok(Self::Join),
            "cut" => Ok(Self::Cut),
            other => Err(HostError::invalid_argument(format!(
                "Invalid operation '{other}'. Use 'new', 'join', or 'cut'"
            ))),
        }
    }
}

/// Parametric or direct modelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignType {
    /// Timeline-based design.
    #[default]
    Parametric,
    /// Direct modelling, no timeline.
    Direct,
}

/// Cloud data file backing a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataFileInfo {
    /// Data file name.
    pub name: String,
    /// Data file ID.
    pub id: String,
    /// Current version number.
    pub version: u32,
}

/// Summary of the active design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignSummary {
    /// Parametric or direct.
    pub design_type: DesignType,
    /// Default length units (e.g. "mm").
    pub units: String,
    /// Number of components, root included.
    pub component_count: usize,
    /// Number of bodies in the root component.
    pub body_count: usize,
}

/// Active document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    /// Document name.
    pub name: String,
    /// Whether all changes are saved.
    pub is_saved: bool,
    /// Cloud data file, if the document has been saved to the cloud.
    pub data_file: Option<DataFileInfo>,
    /// Product type of the active product.
    pub product_type: Option<String>,
    /// Design summary, if the active product is a design.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design: Option<DesignSummary>,
}

/// One node of the component tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentNode {
    /// Component name.
    pub name: String,
    /// Number of bodies.
    pub bodies: usize,
    /// Number of sketches.
    pub sketches: usize,
    /// Child occurrences (empty beyond the depth limit).
    pub occurrences: Vec<ComponentNode>,
    /// Name of the occurrence that placed this component (children only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrence_name: Option<String>,
    /// Occurrence visibility (children only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
}

/// Component hierarchy of the active design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentTree {
    /// The root component and its descendants.
    pub root_component: ComponentNode,
    /// Number of distinct components in the design.
    pub total_components: usize,
}

/// A sketch dimension and its driving parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchDimension {
    /// Dimension name.
    pub name: String,
    /// Parameter value (cm for lengths).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Parameter expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Parameter unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Sketch metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SketchInfo {
    /// Sketch name.
    pub name: String,
    /// Whether every curve is fully constrained.
    pub is_fully_constrained: bool,
    /// Closed profiles available for features.
    pub profile_count: usize,
    /// Sketch curves.
    pub curves_count: usize,
    /// Sketch dimensions.
    pub dimensions_count: usize,
    /// Geometric constraints.
    pub constraints_count: usize,
    /// Dimension values.
    pub dimensions: Vec<SketchDimension>,
}

/// Axis-aligned bounding box (cm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: [f64; 3],
    /// Maximum corner.
    pub max: [f64; 3],
}

impl BoundingBox {
    /// Smallest box containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..3 {
            min[axis] = min[axis].min(other.min[axis]);
            max[axis] = max[axis].max(other.max[axis]);
        }
        Self { min, max }
    }
}

/// B-Rep body metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyInfo {
    /// Body name.
    pub name: String,
    /// Owning component.
    pub component: String,
    /// Solid or surface body.
    pub is_solid: bool,
    /// Visibility.
    pub is_visible: bool,
    /// Number of faces.
    pub face_count: usize,
    /// Number of edges.
    pub edge_count: usize,
    /// Number of vertices.
    pub vertex_count: usize,
    /// Bounding box, when the body has geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Volume (cm³); absent for surface bodies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_cm3: Option<f64>,
    /// Surface area (cm²).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_cm2: Option<f64>,
}

/// A user parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserParameter {
    /// Parameter name.
    pub name: String,
    /// Expression as typed by the user.
    pub expression: String,
    /// Evaluated value in internal units.
    pub value: f64,
    /// Unit of the expression.
    #[serde(default)]
    pub unit: String,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
}

/// A captured viewport image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screenshot {
    /// Image format, always "png".
    pub format: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Base64-encoded image bytes.
    pub data_base64: String,
}

/// One saved version of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Version number (1-based).
    pub version_number: u32,
    /// Version ID.
    pub version_id: String,
    /// Version name.
    pub name: String,
    /// When the version was saved.
    pub date_created: Option<DateTime<Utc>>,
    /// Save comment.
    pub description: Option<String>,
}

/// Version history of the active document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionHistory {
    /// Document name.
    pub document_name: String,
    /// Version the document is currently at.
    pub current_version: u32,
    /// Number of saved versions.
    pub total_versions: usize,
    /// Saved versions, oldest first.
    pub versions: Vec<VersionInfo>,
}
