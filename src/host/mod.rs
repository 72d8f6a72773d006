//! Host application capabilities.
//!
//! [`HostApi`] is the typed surface of the CAD application's scripting API.
//! Implementations are not expected to be thread-safe: the bridge only ever
//! calls them from the privileged thread, through a [`CapabilityTable`].
//!
//! - [`operation`] — operation identifiers resolved from function names
//! - [`capabilities`] — argument decoding and dispatch onto a [`HostApi`]
//! - [`simulated`] — an in-memory design implementing [`HostApi`]

pub mod capabilities;
pub mod error;
pub mod model;
pub mod operation;
mod png;
pub mod simulated;

pub use capabilities::CapabilityTable;
pub use error::{HostError, HostResult};
pub use model::{FeatureOperation, Plane, Point2};
pub use operation::Operation;
pub use simulated::{Design, SimulatedHost};

use serde_json::Value;

use model::{
    BodyInfo, ComponentTree, DocumentInfo, Screenshot, SketchInfo, UserParameter, VersionHistory,
};

/// The host application's scripting API.
///
/// Every method maps to one [`Operation`]. Lookups by name are exact.
pub trait HostApi {
    /// Metadata of the active document.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NoActiveDocument`] if nothing is open.
    fn document_info(&self) -> HostResult<DocumentInfo>;

    /// Component hierarchy of the active design.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active design.
    fn component_tree(&self) -> HostResult<ComponentTree>;

    /// Sketches of the root component, or only the one named `name`.
    ///
    /// An unmatched `name` yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active design.
    fn sketches(&self, name: Option<&str>) -> HostResult<Vec<SketchInfo>>;

    /// Bodies of every component, or only those named `name`.
    ///
    /// An unmatched `name` yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active design.
    fn bodies(&self, name: Option<&str>) -> HostResult<Vec<BodyInfo>>;

    /// User parameters of the active design.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active design.
    fn user_parameters(&self) -> HostResult<Vec<UserParameter>>;

    /// Captures the active viewport as a PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active document or the capture fails.
    fn export_screenshot(&mut self, width: u32, height: u32) -> HostResult<Screenshot>;

    /// Executes scripting code; returns the value the script assigned to `result`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script fails or scripting is unavailable.
    fn run_script(&mut self, code: &str) -> HostResult<Value>;

    /// Creates a sketch in `component` (root if `None`); returns its name.
    ///
    /// # Errors
    ///
    /// Returns an error if the component does not exist.
    fn create_sketch(&mut self, component: Option<&str>, plane: Plane) -> HostResult<String>;

    /// Adds a circle to a sketch.
    ///
    /// # Errors
    ///
    /// Returns an error if the sketch does not exist or the radius is invalid.
    fn draw_circle(&mut self, sketch: &str, center: Point2, radius: f64) -> HostResult<()>;

    /// Adds a two-point rectangle to a sketch.
    ///
    /// # Errors
    ///
    /// Returns an error if the sketch does not exist or the rectangle is degenerate.
    fn draw_rectangle(&mut self, sketch: &str, corner: Point2, opposite: Point2)
        -> HostResult<()>;

    /// Extrudes a sketch profile; returns the feature name.
    ///
    /// # Errors
    ///
    /// Returns an error if the sketch or profile does not exist, or the
    /// operation has nothing to act on.
    fn extrude(
        &mut self,
        sketch: &str,
        profile_index: usize,
        distance: f64,
        operation: FeatureOperation,
    ) -> HostResult<String>;

    /// Makes `name` the active component; returns its name.
    ///
    /// # Errors
    ///
    /// Returns an error if the component does not exist.
    fn activate_component(&mut self, name: &str) -> HostResult<String>;

    /// Shows or hides a component's bodies.
    ///
    /// # Errors
    ///
    /// Returns an error if the component does not exist.
    fn set_visibility(&mut self, component: &str, visible: bool) -> HostResult<()>;

    /// Saved versions of the active document.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NotSavedToCloud`] for documents without a data file.
    fn versions(&self) -> HostResult<VersionHistory>;

    /// Opens a saved version in a new document; returns that document's name.
    ///
    /// # Errors
    ///
    /// Returns an error if the version does not exist.
    fn restore_version(&mut self, version_number: u32) -> HostResult<String>;
}
