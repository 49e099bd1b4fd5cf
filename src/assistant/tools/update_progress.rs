//! Progress mutation tool: apply a batch of assistant update requests.

use crate::assistant::ProgressUpdateRequest;
use crate::assistant::tool::{Tool, ToolInput, ToolOutput, ToolParam, ToolResult, ToolSignature};
use crate::error::ToolError;
use crate::project::Project;

/// Set progress for named services on named housing units.
pub struct UpdateProgressTool;

impl Tool for UpdateProgressTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "update_progress",
            description: "Set the execution percentage of budget services on housing units. \
                          Use the exact service and unit names; \"all\" selects every unit.",
            parameters: vec![ToolParam {
                name: "updates",
                description: "JSON array of {serviceName, unitNames, progress} objects; \
                              progress is 0-100.",
                required: true,
            }],
        }
    }

    fn execute(&self, project: &mut Project, input: ToolInput) -> ToolResult<ToolOutput> {
        let raw = input.require("updates", "update_progress")?;
        let requests: Vec<ProgressUpdateRequest> =
            serde_json::from_str(raw).map_err(|e| ToolError::Execution {
                tool_name: "update_progress".into(),
                message: format!("updates is not a valid request list: {e}"),
            })?;

        let report = project.apply_assistant_updates(&requests);
        if report.applied.is_empty()
            && (!report.unresolved_services.is_empty()
                || !report.unresolved_units.is_empty()
                || !report.rejected.is_empty())
        {
            return Ok(ToolOutput::failed(report.summary));
        }

        let mut items: Vec<String> = report.applied.iter().map(|a| a.item_id.clone()).collect();
        items.sort();
        items.dedup();
        Ok(ToolOutput::ok(report.summary, items))
    }
}
