//! JSON backup of whole projects.
//!
//! A backup is a JSON array with one full [`Project`] record per element,
//! progress matrix and change log included. Import checks the minimal shape
//! of every element before deserialising any of them, so a bad file imports
//! nothing.

use serde_json::Value;

use crate::error::BackupError;
use crate::project::Project;

pub type BackupResult<T> = std::result::Result<T, BackupError>;

/// Serialise projects as a pretty-printed JSON array.
pub fn export(projects: &[Project]) -> BackupResult<String> {
    serde_json::to_string_pretty(projects).map_err(|e| BackupError::Parse {
        message: e.to_string(),
    })
}

/// Parse a backup file into projects, conforming each matrix to its template.
pub fn import(text: &str) -> BackupResult<Vec<Project>> {
    let root: Value = serde_json::from_str(text).map_err(|e| BackupError::Parse {
        message: e.to_string(),
    })?;
    let Value::Array(entries) = root else {
        return Err(BackupError::NotArray);
    };

    for (index, entry) in entries.iter().enumerate() {
        check_shape(entry).map_err(|reason| BackupError::InvalidEntry { index, reason })?;
    }

    let mut projects = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let mut project: Project =
            serde_json::from_value(entry).map_err(|e| BackupError::InvalidEntry {
                index,
                reason: e.to_string(),
            })?;
        project.ensure_consistent();
        projects.push(project);
    }
    tracing::info!(count = projects.len(), "backup parsed");
    Ok(projects)
}

fn check_shape(entry: &Value) -> Result<(), String> {
    let Value::Object(fields) = entry else {
        return Err("not an object".into());
    };
    for key in ["id", "name", "created_at"] {
        if !fields.get(key).is_some_and(Value::is_string) {
            return Err(format!("`{key}` must be a string"));
        }
    }
    if !fields.get("cost_of_works").is_some_and(Value::is_number) {
        return Err("`cost_of_works` must be a number".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ProjectData, ProjectId};

    fn sample() -> Project {
        let mut project = Project::from_data(
            ProjectId::new("p-7"),
            "alice",
            chrono::Utc::now(),
            ProjectData::new("Villa", 150_000.0, 3),
        );
        project.set_progress("4.1", "u2", 33.3).unwrap();
        project.set_progress("7.3", "u3", 0.1).unwrap();
        project.members.push("bob".into());
        project
    }

    #[test]
    fn export_then_import_preserves_projects() {
        let original = vec![sample()];
        let text = export(&original).unwrap();
        let restored = import(&text).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn non_array_root_is_rejected() {
        let err = import(r#"{"id":"p-1"}"#).unwrap_err();
        assert!(matches!(err, BackupError::NotArray));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(import("[{"), Err(BackupError::Parse { .. })));
    }

    #[test]
    fn bad_entry_reports_its_index() {
        let good = serde_json::to_value(sample()).unwrap();
        let bad = serde_json::json!({
            "id": "p-2",
            "name": "X",
            "created_at": "2024-01-01T00:00:00Z",
            "cost_of_works": "lots"
        });
        let text = serde_json::json!([good, bad]).to_string();
        let err = import(&text).unwrap_err();
        let BackupError::InvalidEntry { index, reason } = err else {
            panic!("expected invalid entry");
        };
        assert_eq!(index, 1);
        assert!(reason.contains("cost_of_works"));
    }

    #[test]
    fn missing_matrix_rows_are_filled() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["progress"] = serde_json::json!({});
        let text = Value::Array(vec![value]).to_string();
        let restored = import(&text).unwrap();
        let project = &restored[0];
        assert!(
            project
                .progress()
                .is_consistent(project.budget(), project.units().len())
        );
    }
}
