//! Tool catalogue and routing from MCP tool calls to host operations.
//!
//! Every tool except `fusion360_health` becomes one bridge request: a host
//! [`Operation`] plus positional arguments in the order the capability table
//! expects. Absent arguments are passed as `null` so the table applies its
//! defaults.

use serde_json::{json, Map, Value};

use crate::host::Operation;

use super::server::ToolDefinition;

/// Where a tool call goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRoute {
    /// Answered by the server itself, without touching the host.
    Health,
    /// Forwarded to the main thread through the bridge.
    Host {
        /// Host operation.
        operation: Operation,
        /// Positional arguments.
        args: Vec<Value>,
    },
}

/// Tool name, host operation, and argument names in positional order.
const HOST_TOOLS: &[(&str, Operation, &[&str])] = &[
    ("fusion360_document_info", Operation::GetDocumentInfo, &[]),
    ("fusion360_components", Operation::GetComponentTree, &[]),
    ("fusion360_sketches", Operation::GetSketchInfo, &[]),
    ("fusion360_sketch_details", Operation::GetSketchInfo, &["name"]),
    ("fusion360_bodies", Operation::GetBodyInfo, &[]),
    ("fusion360_body_details", Operation::GetBodyInfo, &["name"]),
    ("fusion360_parameters", Operation::GetParameters, &[]),
    ("fusion360_screenshot", Operation::ExportScreenshot, &["width", "height"]),
    ("fusion360_run_script", Operation::RunScript, &["code"]),
    (
        "fusion360_create_sketch",
        Operation::CreateSketch,
        &["component_name", "plane"],
    ),
    (
        "fusion360_draw_circle",
        Operation::DrawCircle,
        &["sketch_name", "center_x", "center_y", "radius"],
    ),
    (
        "fusion360_extrude",
        Operation::Extrude,
        &["sketch_name", "profile_index", "distance", "operation"],
    ),
    (
        "fusion360_draw_rectangle",
        Operation::DrawRectangle,
        &["sketch_name", "x1", "y1", "x2", "y2"],
    ),
    (
        "fusion360_activate_component",
        Operation::ActivateComponent,
        &["name"],
    ),
    (
        "fusion360_set_visibility",
        Operation::SetVisibility,
        &["component_name", "visible"],
    ),
    ("fusion360_list_versions", Operation::ListVersions, &[]),
    (
        "fusion360_restore_version",
        Operation::RestoreVersion,
        &["version_number"],
    ),
];

/// Name of the tool answered without the bridge.
pub const HEALTH_TOOL: &str = "fusion360_health";

/// Tools whose argument named here must be present.
const REQUIRED: &[(&str, &str)] = &[
    ("fusion360_sketch_details", "name"),
    ("fusion360_body_details", "name"),
    ("fusion360_run_script", "code"),
    ("fusion360_draw_circle", "sketch_name"),
    ("fusion360_extrude", "sketch_name"),
    ("fusion360_draw_rectangle", "sketch_name"),
    ("fusion360_activate_component", "name"),
    ("fusion360_set_visibility", "component_name"),
    ("fusion360_restore_version", "version_number"),
];

/// Resolves a tool call.
///
/// # Errors
///
/// Returns the message to show the caller for an unknown tool, non-object
/// arguments, or a missing required argument.
pub fn route(name: &str, arguments: &Value) -> Result<ToolRoute, String> {
    if name == HEALTH_TOOL {
        return Ok(ToolRoute::Health);
    }

    let (_, operation, parameters) = HOST_TOOLS
        .iter()
        .find(|(tool, _, _)| *tool == name)
        .ok_or_else(|| format!("Unknown tool: {name}"))?;

    let empty = Map::new();
    let arguments = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(format!("Arguments for {name} must be an object")),
    };

    for (_, required) in REQUIRED.iter().filter(|(tool, _)| *tool == name) {
        if arguments.get(*required).is_none_or(Value::is_null) {
            return Err(format!("Missing required argument: {required}"));
        }
    }

    Ok(ToolRoute::Host {
        operation: operation.clone(),
        args: parameters
            .iter()
            .map(|parameter| arguments.get(*parameter).cloned().unwrap_or(Value::Null))
            .collect(),
    })
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    }
}

/// Every tool the server offers.
#[allow(clippy::too_many_lines)]
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            HEALTH_TOOL,
            "Check that the MCP server and the Fusion 360 bridge are running. \
             Reports queued requests and waiting callers.",
            no_arguments(),
        ),
        tool(
            "fusion360_document_info",
            "Get information about the currently open Fusion 360 document: name, save \
             state, cloud data file and a design summary.",
            no_arguments(),
        ),
        tool(
            "fusion360_components",
            "Get the component tree of the current design (nested up to 5 levels).",
            no_arguments(),
        ),
        tool(
            "fusion360_sketches",
            "List all sketches in the root component with profile, curve, constraint and \
             dimension counts.",
            no_arguments(),
        ),
        tool(
            "fusion360_sketch_details",
            "Get detailed information about a specific sketch in the root component.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Name of the sketch" }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "fusion360_bodies",
            "List all bodies in the design with topology counts, bounding box (cm), \
             volume (cm³) and area (cm²).",
            no_arguments(),
        ),
        tool(
            "fusion360_body_details",
            "Get detailed information about bodies with a specific name.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Name of the body" }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "fusion360_parameters",
            "Get all user parameters in the current design.",
            no_arguments(),
        ),
        tool(
            "fusion360_screenshot",
            "Take a screenshot of the current Fusion 360 viewport. Returns a PNG image.",
            json!({
                "type": "object",
                "properties": {
                    "width": {
                        "type": "integer",
                        "description": "Image width in pixels (default: configured width)"
                    },
                    "height": {
                        "type": "integer",
                        "description": "Image height in pixels (default: configured height)"
                    }
                }
            }),
        ),
        tool(
            "fusion360_run_script",
            "Execute Python code directly in the Fusion 360 context. The code has access to \
             adsk (Fusion API module), app (Application), design (active Design) and ui \
             (UserInterface). Set the 'result' variable to return data.",
            json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "description": "Python code to execute" }
                },
                "required": ["code"]
            }),
        ),
        tool(
            "fusion360_create_sketch",
            "Create a new sketch on an origin construction plane.",
            json!({
                "type": "object",
                "properties": {
                    "component_name": {
                        "type": "string",
                        "description": "Component to create the sketch in (omit or \"root\" for the root component)"
                    },
                    "plane": {
                        "type": "string",
                        "enum": ["XY", "XZ", "YZ"],
                        "description": "Construction plane (default: XY)"
                    }
                }
            }),
        ),
        tool(
            "fusion360_draw_circle",
            "Draw a circle in an existing sketch. Coordinates are in centimetres.",
            json!({
                "type": "object",
                "properties": {
                    "sketch_name": { "type": "string", "description": "Name of the sketch" },
                    "center_x": { "type": "number", "description": "X of the centre (default: 0)" },
                    "center_y": { "type": "number", "description": "Y of the centre (default: 0)" },
                    "radius": { "type": "number", "description": "Radius (default: 1)" }
                },
                "required": ["sketch_name"]
            }),
        ),
        tool(
            "fusion360_extrude",
            "Extrude a sketch profile to create 3D geometry.",
            json!({
                "type": "object",
                "properties": {
                    "sketch_name": { "type": "string", "description": "Name of the sketch" },
                    "profile_index": {
                        "type": "integer",
                        "description": "Index of the profile to extrude (default: 0)"
                    },
                    "distance": {
                        "type": "number",
                        "description": "Extrusion distance in centimetres (default: 1)"
                    },
                    "operation": {
                        "type": "string",
                        "enum": ["new", "join", "cut"],
                        "description": "Feature operation (default: new)"
                    }
                },
                "required": ["sketch_name"]
            }),
        ),
        tool(
            "fusion360_draw_rectangle",
            "Draw a two-point rectangle in an existing sketch. Coordinates are in centimetres.",
            json!({
                "type": "object",
                "properties": {
                    "sketch_name": { "type": "string", "description": "Name of the sketch" },
                    "x1": { "type": "number", "description": "X of the first corner (default: 0)" },
                    "y1": { "type": "number", "description": "Y of the first corner (default: 0)" },
                    "x2": { "type": "number", "description": "X of the opposite corner (default: 1)" },
                    "y2": { "type": "number", "description": "Y of the opposite corner (default: 1)" }
                },
                "required": ["sketch_name"]
            }),
        ),
        tool(
            "fusion360_activate_component",
            "Activate a component for editing.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Name of the component" }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "fusion360_set_visibility",
            "Show or hide a component's bodies.",
            json!({
                "type": "object",
                "properties": {
                    "component_name": { "type": "string", "description": "Name of the component" },
                    "visible": { "type": "boolean", "description": "True to show (default), false to hide" }
                },
                "required": ["component_name"]
            }),
        ),
        tool(
            "fusion360_list_versions",
            "List all saved versions of the current document. Only works for cloud-saved \
             documents.",
            no_arguments(),
        ),
        tool(
            "fusion360_restore_version",
            "Open a specific version of the document in a new tab. Save it to make it the \
             current version.",
            json!({
                "type": "object",
                "properties": {
                    "version_number": {
                        "type": "integer",
                        "description": "Version number to restore (1-based)"
                    }
                },
                "required": ["version_number"]
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_tool_is_defined_and_routable() {
        let definitions = definitions();
        assert_eq!(definitions.len(), HOST_TOOLS.len() + 1);

        let names: HashSet<_> = definitions.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), definitions.len());

        for definition in &definitions {
            assert!(definition.input_schema.is_object());
            let required = definition.input_schema["required"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            let arguments: Map<String, Value> = required
                .iter()
                .map(|name| (name.as_str().unwrap().to_string(), json!("x")))
                .collect();
            assert!(
                route(&definition.name, &Value::Object(arguments)).is_ok(),
                "{} is not routable",
                definition.name
            );
        }
    }

    #[test]
    fn health_bypasses_the_host() {
        assert_eq!(route(HEALTH_TOOL, &Value::Null), Ok(ToolRoute::Health));
    }

    #[test]
    fn arguments_become_positional() {
        let routed = route(
            "fusion360_draw_rectangle",
            &json!({ "y2": 4.0, "sketch_name": "Sketch1", "x1": -1.0 }),
        )
        .unwrap();
        assert_eq!(
            routed,
            ToolRoute::Host {
                operation: Operation::DrawRectangle,
                args: vec![json!("Sketch1"), json!(-1.0), Value::Null, Value::Null, json!(4.0)],
            }
        );
    }

    #[test]
    fn details_tools_pass_the_name() {
        let routed = route("fusion360_body_details", &json!({ "name": "Base Plate" })).unwrap();
        assert_eq!(
            routed,
            ToolRoute::Host {
                operation: Operation::GetBodyInfo,
                args: vec![json!("Base Plate")],
            }
        );
    }

    #[test]
    fn missing_required_argument() {
        assert_eq!(
            route("fusion360_run_script", &json!({})),
            Err("Missing required argument: code".to_string())
        );
        assert_eq!(
            route("fusion360_restore_version", &json!({ "version_number": null })),
            Err("Missing required argument: version_number".to_string())
        );
    }

    #[test]
    fn unknown_tool_and_bad_arguments() {
        assert_eq!(
            route("fusion360_teleport", &json!({})),
            Err("Unknown tool: fusion360_teleport".to_string())
        );
        assert!(route("fusion360_sketches", &json!([1, 2])).is_err());
    }
}
