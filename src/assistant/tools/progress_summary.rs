//! Read-only tool reporting current progress figures.

use crate::assistant::tool::{Tool, ToolInput, ToolOutput, ToolParam, ToolResult, ToolSignature};
use crate::project::Project;

/// Report overall, per-category and per-unit progress.
pub struct ProgressSummaryTool;

impl Tool for ProgressSummaryTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "progress_summary",
            description: "Report overall progress, progress per category and per housing unit.",
            parameters: vec![ToolParam {
                name: "category",
                description: "Restrict the report to one category id (optional).",
                required: false,
            }],
        }
    }

    fn execute(&self, project: &mut Project, input: ToolInput) -> ToolResult<ToolOutput> {
        let snapshot = project.snapshot();
        let filter = input.get("category");

        let mut lines = vec![format!(
            "Project \"{}\": {:.2}% complete, {:.2} released of {:.2}.",
            project.name, snapshot.total_progress, snapshot.total_released, snapshot.total_cost
        )];
        let mut items = Vec::new();
        for category in &snapshot.categories {
            if filter.is_some_and(|id| id != category.id) {
                continue;
            }
            lines.push(format!(
                "{} {}: {:.2}% ({:.2} of {:.2} incidence)",
                category.id,
                category.name,
                category.progress,
                category.measured_incidence,
                category.incidence
            ));
            if filter.is_some() {
                for item in &category.items {
                    lines.push(format!(
                        "  {} {}: {:.2}% average",
                        item.id, item.name, item.average_progress
                    ));
                    items.push(item.id.clone());
                }
            }
        }
        if filter.is_none() {
            for (unit, figures) in project.units().iter().zip(&snapshot.units) {
                lines.push(format!("{}: {:.2}%", unit.name, figures.progress));
            }
        } else if lines.len() == 1 {
            return Ok(ToolOutput::failed(format!(
                "No category with id \"{}\".",
                filter.unwrap_or_default()
            )));
        }

        Ok(ToolOutput::ok(lines.join("\n"), items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ProjectData, ProjectId};

    fn project() -> Project {
        let mut project = Project::from_data(
            ProjectId::new("p-1"),
            "owner",
            chrono::Utc::now(),
            ProjectData::new("Villa", 100_000.0, 2),
        );
        project.set_progress("4.1", "u1", 100.0).unwrap();
        project
    }

    #[test]
    fn reports_units() {
        let mut project = project();
        let out = ProgressSummaryTool.execute(&mut project, ToolInput::new()).unwrap();
        assert!(out.success);
        assert!(out.message.contains("Unit 1: 10.00%"));
        assert!(out.message.contains("Unit 2: 0.00%"));
    }

    #[test]
    fn category_filter_lists_items() {
        let mut project = project();
        let input = ToolInput::new().with_param("category", "4");
        let out = ProgressSummaryTool.execute(&mut project, input).unwrap();
        assert!(out.items.contains(&"4.1".to_string()));
        assert!(out.message.contains("4.1 Walls: 50.00% average"));
    }

    #[test]
    fn unknown_category_fails() {
        let mut project = project();
        let input = ToolInput::new().with_param("category", "99");
        let out = ProgressSummaryTool.execute(&mut project, input).unwrap();
        assert!(!out.success);
    }
}
