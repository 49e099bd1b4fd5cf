//! Tools the assistant can call against an open project.
//!
//! The model is shown every [`ToolSignature`] and answers with a tool name
//! plus string parameters; [`ToolRegistry::execute`] dispatches the call.

use std::collections::{BTreeMap, HashMap};

use crate::error::ToolError;
use crate::project::Project;

use super::tools::{ListServicesTool, ProgressSummaryTool, UpdateProgressTool};

pub type ToolResult<T> = std::result::Result<T, ToolError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSignature {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ToolParam>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParam {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// String parameters of one call, as sent by the model.
#[derive(Debug, Clone, Default)]
pub struct ToolInput(HashMap<String, String>);

impl ToolInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str, tool_name: &str) -> ToolResult<&str> {
        self.get(name).ok_or_else(|| ToolError::Execution {
            tool_name: tool_name.into(),
            message: format!("missing required parameter: {name}"),
        })
    }
}

/// What a call reports back to the model.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// False when nothing useful happened; `message` says why.
    pub success: bool,
    pub message: String,
    /// Budget item ids written or reported.
    pub items: Vec<String>,
}

impl ToolOutput {
    pub fn ok(message: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            items,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            items: Vec::new(),
        }
    }
}

pub trait Tool: Send + Sync {
    fn signature(&self) -> ToolSignature;

    /// Read-only tools leave `project` untouched.
    fn execute(&self, project: &mut Project, input: ToolInput) -> ToolResult<ToolOutput>;
}

/// Tools keyed by name.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn with_builtin() -> Self {
        let builtin: [Box<dyn Tool>; 3] = [
            Box::new(UpdateProgressTool),
            Box::new(ProgressSummaryTool),
            Box::new(ListServicesTool),
        ];
        Self {
            tools: builtin
                .into_iter()
                .map(|tool| (tool.signature().name, tool))
                .collect(),
        }
    }

    /// Signatures in name order, for the model prompt.
    pub fn signatures(&self) -> Vec<ToolSignature> {
        self.tools.values().map(|tool| tool.signature()).collect()
    }

    pub fn execute(
        &self,
        name: &str,
        input: ToolInput,
        project: &mut Project,
    ) -> ToolResult<ToolOutput> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound { name: name.into() })?;
        tracing::debug!(tool = name, project = %project.id, "executing assistant tool");
        tool.execute(project, input)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ProjectData, ProjectId};

    #[test]
    fn builtin_signatures_in_name_order() {
        let names: Vec<_> = ToolRegistry::with_builtin()
            .signatures()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["list_services", "progress_summary", "update_progress"]);
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let mut project = Project::from_data(
            ProjectId::new("p-1"),
            "owner",
            chrono::Utc::now(),
            ProjectData::new("Villa", 100_000.0, 2),
        );
        let err = ToolRegistry::with_builtin()
            .execute("demolish", ToolInput::new(), &mut project)
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[test]
    fn missing_parameter_names_the_tool() {
        let input = ToolInput::new().with_param("updates", "[]");
        assert_eq!(input.get("updates"), Some("[]"));
        let err = input.require("category", "progress_summary").unwrap_err();
        assert!(err.to_string().contains("progress_summary"));
        assert!(err.to_string().contains("category"));
    }
}
