//! Read-only tool listing the exact names the assistant must use.

use crate::assistant::tool::{Tool, ToolInput, ToolOutput, ToolResult, ToolSignature};
use crate::project::Project;

/// List every budget service and housing unit by exact name.
pub struct ListServicesTool;

impl Tool for ListServicesTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "list_services",
            description: "List the exact service names of the budget and the housing unit names.",
            parameters: vec![],
        }
    }

    fn execute(&self, project: &mut Project, _input: ToolInput) -> ToolResult<ToolOutput> {
        let mut lines = vec!["Services:".to_string()];
        let mut items = Vec::new();
        for item in project.budget().items() {
            lines.push(format!("- {} ({})", item.name, item.id));
            items.push(item.id.clone());
        }
        lines.push("Units:".to_string());
        for unit in project.units() {
            lines.push(format!("- {}", unit.name));
        }
        Ok(ToolOutput::ok(lines.join("\n"), items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ProjectData, ProjectId};

    #[test]
    fn lists_items_and_units() {
        let mut project = Project::from_data(
            ProjectId::new("p-1"),
            "owner",
            chrono::Utc::now(),
            ProjectData::new("Villa", 100_000.0, 3),
        );
        let out = ListServicesTool.execute(&mut project, ToolInput::new()).unwrap();
        assert_eq!(out.items.len(), project.budget().item_count());
        assert!(out.message.contains("- Walls (4.1)"));
        assert!(out.message.contains("- Unit 3"));
    }
}
