//! Host operation identifiers.
//!
//! Function names are resolved to an [`Operation`] once, when a request is
//! submitted. Names that match no host capability become
//! [`Operation::Unknown`] and are answered with an error-shaped result
//! instead of failing.

use std::fmt;

/// A host capability the main thread can run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Active document metadata.
    GetDocumentInfo,
    /// Component hierarchy of the active design.
    GetComponentTree,
    /// Sketches of the root component, optionally filtered by name.
    GetSketchInfo,
    /// Bodies of all components, optionally filtered by name.
    GetBodyInfo,
    /// User parameters of the active design.
    GetParameters,
    /// PNG capture of the active viewport.
    ExportScreenshot,
    /// Execute scripting code in the host.
    RunScript,
    /// New sketch on a construction plane.
    CreateSketch,
    /// Circle in an existing sketch.
    DrawCircle,
    /// Two-point rectangle in an existing sketch.
    DrawRectangle,
    /// Extrusion of a sketch profile.
    Extrude,
    /// Make a component the active edit target.
    ActivateComponent,
    /// Show or hide a component's bodies.
    SetVisibility,
    /// Saved versions of the active document.
    ListVersions,
    /// Open a saved version in a new document.
    RestoreVersion,
    /// A name that matches no capability.
    Unknown(String),
}

impl Operation {
    /// Every known operation, in tool-listing order.
    pub const KNOWN: &'static [Self] = &[
        Self::GetDocumentInfo,
        Self::GetComponentTree,
        Self::GetSketchInfo,
        Self::GetBodyInfo,
        Self::GetParameters,
        Self::ExportScreenshot,
        Self::RunScript,
        Self::CreateSketch,
        Self::DrawCircle,
        Self::DrawRectangle,
        Self::Extrude,
        Self::ActivateComponent,
        Self::SetVisibility,
        Self::ListVersions,
        Self::RestoreVersion,
    ];

    /// Resolves a function name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|op| op.name() == name)
            .cloned()
            .unwrap_or_else(|| Self::Unknown(name.to_string()))
    }

    /// The function name this operation is addressed by.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::GetDocumentInfo => "get_document_info",
            Self::GetComponentTree => "get_component_tree",
            Self::GetSketchInfo => "get_sketch_info",
            Self::GetBodyInfo => "get_body_info",
            Self::GetParameters => "get_parameters",
            Self::ExportScreenshot => "export_screenshot",
            Self::RunScript => "run_script",
            Self::CreateSketch => "create_sketch",
            Self::DrawCircle => "draw_circle",
            Self::DrawRectangle => "draw_rectangle",
            Self::Extrude => "extrude",
            Self::ActivateComponent => "activate_component",
            Self::SetVisibility => "set_visibility",
            Self::ListVersions => "list_versions",
            Self::RestoreVersion => "restore_version",
            Self::Unknown(name) => name,
        }
    }

    /// Returns `true` for operations that change host state.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::RunScript
                | Self::CreateSketch
                | Self::DrawCircle
                | Self::DrawRectangle
                | Self::Extrude
                | Self::ActivateComponent
                | Self::SetVisibility
                | Self::RestoreVersion
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Operation {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl From<String> for Operation {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}
