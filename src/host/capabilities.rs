//! Capability table: decodes positional arguments and dispatches onto a [`HostApi`].
//!
//! The table is the bridge's [`Executor`] on the privileged thread. Argument
//! positions follow the host function signatures:
//!
//! | Operation            | Arguments                                          |
//! |----------------------|----------------------------------------------------|
//! | `get_sketch_info`    | `[name?]`                                          |
//! | `get_body_info`      | `[name?]`                                          |
//! | `export_screenshot`  | `[width?, height?]`                                |
//! | `run_script`         | `[code]`                                           |
//! | `create_sketch`      | `[component_name?, plane?]`                        |
//! | `draw_circle`        | `[sketch_name, center_x?, center_y?, radius?]`     |
//! | `draw_rectangle`     | `[sketch_name, x1?, y1?, x2?, y2?]`                |
//! | `extrude`            | `[sketch_name, profile_index?, distance?, operation?]` |
//! | `activate_component` | `[name]`                                           |
//! | `set_visibility`     | `[component_name, visible?]`                       |
//! | `restore_version`    | `[version_number]`                                 |
//!
//! `null` counts as absent.

use serde::Serialize;
use serde_json::{json, Value};

use crate::bridge::{error_result, Executor};

use super::error::{HostError, HostResult};
use super::model::{FeatureOperation, Plane, Point2};
use super::operation::Operation;
use super::HostApi;

/// Default screenshot size, matching a full-HD viewport.
pub const DEFAULT_SCREENSHOT_SIZE: (u32, u32) = (1920, 1080);

const RESTORE_NOTE: &str = "Version opened in new tab. Save to make it the current version.";

/// Typed dispatch from [`Operation`] to a [`HostApi`] implementation.
#[derive(Debug)]
pub struct CapabilityTable<H> {
    host: H,
    screenshot_size: (u32, u32),
}

impl<H: HostApi> CapabilityTable<H> {
    /// Creates a table over `host`.
    #[must_use]
    pub const fn new(host: H) -> Self {
        Self {
            host,
            screenshot_size: DEFAULT_SCREENSHOT_SIZE,
        }
    }

    /// Sets the screenshot size used when the caller gives none.
    #[must_use]
    pub const fn with_screenshot_size(mut self, width: u32, height: u32) -> Self {
        self.screenshot_size = (width, height);
        self
    }

    /// The wrapped host.
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Runs one operation against the host.
    ///
    /// # Errors
    ///
    /// Returns the host's error, or [`HostError::InvalidArgument`] if the
    /// arguments do not fit the operation.
    pub fn dispatch(&mut self, operation: &Operation, args: &[Value]) -> HostResult<Value> {
        let args = Args::new(operation, args);

        match operation {
            Operation::GetDocumentInfo => to_json(&self.host.document_info()?),
            Operation::GetComponentTree => to_json(&self.host.component_tree()?),
            Operation::GetSketchInfo => {
                let name = args.opt_str(0, "sketch_name")?;
                let sketches = self.host.sketches(name)?;
                if let (Some(name), true) = (name, sketches.is_empty()) {
                    return Err(HostError::not_found("Sketch", name));
                }
                Ok(json!({ "sketches": sketches }))
            }
            Operation::GetBodyInfo => {
                let name = args.opt_str(0, "body_name")?;
                let bodies = self.host.bodies(name)?;
                if let (Some(name), true) = (name, bodies.is_empty()) {
                    return Err(HostError::not_found("Body", name));
                }
                Ok(json!({ "bodies": bodies }))
            }
            Operation::GetParameters => {
                let parameters = self.host.user_parameters()?;
                Ok(json!({
                    "count": parameters.len(),
                    "user_parameters": parameters,
                }))
            }
            Operation::ExportScreenshot => {
                let (default_width, default_height) = self.screenshot_size;
                let width = args.dimension_or(0, "width", default_width)?;
                let height = args.dimension_or(1, "height", default_height)?;
                to_json(&self.host.export_screenshot(width, height)?)
            }
            Operation::RunScript => {
                let code = args.required_str(0, "code")?;
                let result = self.host.run_script(code)?;
                Ok(json!({ "success": true, "result": result }))
            }
            Operation::CreateSketch => {
                let component = args
                    .opt_str(0, "component_name")?
                    .filter(|name| !name.is_empty() && *name != "root");
                let plane = args
                    .opt_str(1, "plane")?
                    .map_or(Ok(Plane::default()), str::parse)?;
                let sketch_name = self.host.create_sketch(component, plane)?;
                Ok(json!({ "success": true, "sketch_name": sketch_name }))
            }
            Operation::DrawCircle => {
                let sketch = args.required_str(0, "sketch_name")?;
                let center = Point2::new(
                    args.f64_or(1, "center_x", 0.0)?,
                    args.f64_or(2, "center_y", 0.0)?,
                );
                let radius = args.f64_or(3, "radius", 1.0)?;
                self.host.draw_circle(sketch, center, radius)?;
                Ok(json!({ "success": true, "sketch_name": sketch }))
            }
            Operation::DrawRectangle => {
                let sketch = args.required_str(0, "sketch_name")?;
                let corner = Point2::new(args.f64_or(1, "x1", 0.0)?, args.f64_or(2, "y1", 0.0)?);
                let opposite =
                    Point2::new(args.f64_or(3, "x2", 1.0)?, args.f64_or(4, "y2", 1.0)?);
                self.host.draw_rectangle(sketch, corner, opposite)?;
                Ok(json!({ "success": true, "sketch_name": sketch }))
            }
            Operation::Extrude => {
                let sketch = args.required_str(0, "sketch_name")?;
                let index = args.i64_or(1, "profile_index", 0)?;
                let profile_index = usize::try_from(index).map_err(|_| {
                    HostError::invalid_argument(format!("Profile index {index} out of range"))
                })?;
                let distance = args.f64_or(2, "distance", 1.0)?;
                let feature_op = args
                    .opt_str(3, "operation")?
                    .map_or(Ok(FeatureOperation::default()), str::parse)?;
                let feature_name =
                    self.host
                        .extrude(sketch, profile_index, distance, feature_op)?;
                Ok(json!({ "success": true, "feature_name": feature_name }))
            }
            Operation::ActivateComponent => {
                let name = args.required_str(0, "name")?;
                let component_name = self.host.activate_component(name)?;
                Ok(json!({ "success": true, "component_name": component_name }))
            }
            Operation::SetVisibility => {
                let component = args.required_str(0, "component_name")?;
                let visible = args.bool_or(1, "visible", true)?;
                self.host.set_visibility(component, visible)?;
                Ok(json!({
                    "success": true,
                    "component_name": component,
                    "visible": visible,
                }))
            }
            Operation::ListVersions => to_json(&self.host.versions()?),
            Operation::RestoreVersion => {
                let number = args.required_i64(0, "version_number")?;
                let version_number = u32::try_from(number)
                    .map_err(|_| HostError::not_found("Version", number.to_string()))?;
                let opened = self.host.restore_version(version_number)?;
                Ok(json!({
                    "success": true,
                    "opened_document": opened,
                    "version_number": version_number,
                    "note": RESTORE_NOTE,
                }))
            }
            Operation::Unknown(name) => Ok(error_result(format!("Unknown function: {name}"))),
        }
    }
}

impl<H: HostApi> Executor for CapabilityTable<H> {
    type Error = HostError;

    fn execute(&mut self, operation: &Operation, args: &[Value]) -> HostResult<Value> {
        tracing::debug!(
            operation = %operation,
            args = args.len(),
            mutating = operation.is_mutating(),
            "Executing host operation"
        );
        self.dispatch(operation, args)
    }
}

fn to_json<T: Serialize>(record: &T) -> HostResult<Value> {
    serde_json::to_value(record)
        .map_err(|e| HostError::ApiFailure(format!("failed to serialise result: {e}")))
}

/// Positional argument accessor with typed, named errors.
struct Args<'a> {
    operation: &'a Operation,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    const fn new(operation: &'a Operation, values: &'a [Value]) -> Self {
        Self { operation, values }
    }

    fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index).filter(|value| !value.is_null())
    }

    fn missing(&self, name: &str) -> HostError {
        HostError::invalid_argument(format!(
            "Missing required argument '{name}' for {}",
            self.operation
        ))
    }

    fn wrong_type(&self, name: &str, expected: &str) -> HostError {
        HostError::invalid_argument(format!(
            "Argument '{name}' of {} must be {expected}",
            self.operation
        ))
    }

    fn opt_str(&self, index: usize, name: &str) -> HostResult<Option<&'a str>> {
        self.get(index)
            .map(|value| value.as_str().ok_or_else(|| self.wrong_type(name, "a string")))
            .transpose()
    }

    fn required_str(&self, index: usize, name: &str) -> HostResult<&'a str> {
        self.opt_str(index, name)?
            .ok_or_else(|| self.missing(name))
    }

    fn f64_or(&self, index: usize, name: &str, default: f64) -> HostResult<f64> {
        self.get(index).map_or(Ok(default), |value| {
            value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| self.wrong_type(name, "a finite number"))
        })
    }

    fn opt_i64(&self, index: usize, name: &str) -> HostResult<Option<i64>> {
        self.get(index)
            .map(|value| {
                value
                    .as_i64()
                    .or_else(|| {
                        // Integral floats (e.g. 2.0) are accepted
                        value
                            .as_f64()
                            .filter(|v| v.fract() == 0.0 && v.abs() < 9.0e15)
                            .map(|v| v as i64)
                    })
                    .ok_or_else(|| self.wrong_type(name, "an integer"))
            })
            .transpose()
    }

    fn i64_or(&self, index: usize, name: &str, default: i64) -> HostResult<i64> {
        Ok(self.opt_i64(index, name)?.unwrap_or(default))
    }

    fn required_i64(&self, index: usize, name: &str) -> HostResult<i64> {
        self.opt_i64(index, name)?
            .ok_or_else(|| self.missing(name))
    }

    fn dimension_or(&self, index: usize, name: &str, default: u32) -> HostResult<u32> {
        match self.opt_i64(index, name)? {
            None => Ok(default),
            Some(v) => u32::try_from(v)
                .ok()
                .filter(|v| (1..=8192).contains(v))
                .ok_or_else(|| self.wrong_type(name, "between 1 and 8192")),
        }
    }

    fn bool_or(&self, index: usize, name: &str, default: bool) -> HostResult<bool> {
        self.get(index).map_or(Ok(default), |value| {
            value
                .as_bool()
                .ok_or_else(|| self.wrong_type(name, "a boolean"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::error_message;
    use crate::host::simulated::{Design, SimulatedHost};

    fn table() -> CapabilityTable<SimulatedHost> {
        CapabilityTable::new(SimulatedHost::new(Design::sample())).with_screenshot_size(8, 6)
    }

    fn run(table: &mut CapabilityTable<SimulatedHost>, name: &str, args: Value) -> HostResult<Value> {
        let args = args.as_array().cloned().unwrap_or_default();
        table.execute(&Operation::from_name(name), &args)
    }

    #[test]
    fn unknown_function_is_error_shaped_not_a_failure() {
        let mut table = table();
        let result = run(&mut table, "launch_rocket", json!([])).unwrap();
        assert_eq!(error_message(&result), Some("Unknown function: launch_rocket"));
    }

    #[test]
    fn document_info_reports_design_summary() {
        let mut table = table();
        let info = run(&mut table, "get_document_info", json!([])).unwrap();
        assert_eq!(info["name"], "Bracket Assembly");
        assert_eq!(info["design"]["design_type"], "parametric");
        assert_eq!(info["design"]["units"], "mm");
        assert!(info["data_file"]["version"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn named_sketch_lookup_fails_when_missing() {
        let mut table = table();
        let err = run(&mut table, "get_sketch_info", json!(["Nope"])).unwrap_err();
        assert_eq!(err, HostError::not_found("Sketch", "Nope"));

        let all = run(&mut table, "get_sketch_info", json!([])).unwrap();
        assert!(!all["sketches"].as_array().unwrap().is_empty());
    }

    #[test]
    fn named_body_lookup() {
        let mut table = table();
        let bodies = run(&mut table, "get_body_info", json!(["Base Plate"])).unwrap();
        let bodies = bodies["bodies"].as_array().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["component"], "Bracket Assembly");

        let err = run(&mut table, "get_body_info", json!(["Ghost"])).unwrap_err();
        assert_eq!(err.to_string(), "Body 'Ghost' not found");
    }

    #[test]
    fn parameters_include_count() {
        let mut table = table();
        let params = run(&mut table, "get_parameters", json!([])).unwrap();
        assert_eq!(
            params["count"].as_u64().unwrap() as usize,
            params["user_parameters"].as_array().unwrap().len()
        );
    }

    #[test]
    fn sketch_circle_extrude_workflow() {
        let mut table = table();

        let created = run(&mut table, "create_sketch", json!(["root", "xz"])).unwrap();
        assert_eq!(created["success"], true);
        let sketch = created["sketch_name"].as_str().unwrap().to_string();

        let drawn = run(&mut table, "draw_circle", json!([sketch, 0.0, 0.0, 2.0])).unwrap();
        assert_eq!(drawn["sketch_name"], sketch.as_str());

        let extruded = run(&mut table, "extrude", json!([sketch, 0, 1.5, "new"])).unwrap();
        let feature = extruded["feature_name"].as_str().unwrap();
        assert!(feature.starts_with("Extrude"));

        let sketches = run(&mut table, "get_sketch_info", json!([sketch])).unwrap();
        assert_eq!(sketches["sketches"][0]["profile_count"], 1);
    }

    #[test]
    fn draw_rectangle_uses_defaults_for_missing_corners() {
        let mut table = table();
        let created = run(&mut table, "create_sketch", json!([null, null])).unwrap();
        let sketch = created["sketch_name"].as_str().unwrap().to_string();

        run(&mut table, "draw_rectangle", json!([sketch])).unwrap();
        let info = run(&mut table, "get_sketch_info", json!([sketch])).unwrap();
        assert_eq!(info["sketches"][0]["curves_count"], 4);
    }

    #[test]
    fn invalid_plane_is_rejected() {
        let mut table = table();
        let err = run(&mut table, "create_sketch", json!(["root", "AB"])).unwrap_err();
        assert!(err.to_string().starts_with("Invalid plane 'AB'"));
    }

    #[test]
    fn negative_profile_index_is_rejected() {
        let mut table = table();
        let err = run(&mut table, "extrude", json!(["Base Sketch", -1, 1.0, "new"])).unwrap_err();
        assert_eq!(err.to_string(), "Profile index -1 out of range");
    }

    #[test]
    fn missing_and_mistyped_arguments() {
        let mut table = table();
        let err = run(&mut table, "draw_circle", json!([])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required argument 'sketch_name' for draw_circle"
        );

        let err = run(&mut table, "draw_circle", json!(["Base Sketch", "left"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument 'center_x' of draw_circle must be a finite number"
        );
    }

    #[test]
    fn visibility_round_trip() {
        let mut table = table();
        let result = run(&mut table, "set_visibility", json!(["Bracket", false])).unwrap();
        assert_eq!(result["visible"], false);

        let tree = run(&mut table, "get_component_tree", json!([])).unwrap();
        let child = &tree["root_component"]["occurrences"][0];
        assert_eq!(child["name"], "Bracket");
        assert_eq!(child["is_visible"], false);
    }

    #[test]
    fn screenshot_uses_configured_default_size() {
        let mut table = table();
        let shot = run(&mut table, "export_screenshot", json!([])).unwrap();
        assert_eq!(shot["format"], "png");
        assert_eq!(shot["width"], 8);
        assert_eq!(shot["height"], 6);
        assert!(!shot["data_base64"].as_str().unwrap().is_empty());

        let err = run(&mut table, "export_screenshot", json!([0, 10])).unwrap_err();
        assert!(matches!(err, HostError::InvalidArgument(_)));
    }

    #[test]
    fn restore_version_opens_new_document() {
        let mut table = table();
        let restored = run(&mut table, "restore_version", json!([1])).unwrap();
        assert_eq!(restored["version_number"], 1);
        assert_eq!(restored["note"], RESTORE_NOTE);
        assert_eq!(
            table.host().opened_documents(),
            [restored["opened_document"].as_str().unwrap()]
        );

        let err = run(&mut table, "restore_version", json!([99])).unwrap_err();
        assert_eq!(err.to_string(), "Version '99' not found");
    }
}
