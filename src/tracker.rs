//! Tracker facade: top-level API for the obra system.
//!
//! The `Tracker` owns the project store and the identity of the current user,
//! and is the single entry point the CLI (or any other front end) uses to
//! open, edit, save and report on projects. Edits are made on an owned
//! [`Project`] and written back whole.

use std::sync::Arc;

use chrono::Utc;

use crate::assistant::tool::{ToolInput, ToolOutput, ToolRegistry};
use crate::assistant::{MutationReport, ProgressUpdateRequest};
use crate::backup;
use crate::config::{ObraConfig, StorageBackend};
use crate::error::{BackupError, ObraResult, StoreError};
use crate::export::ProjectReport;
use crate::extract::{self, DocumentExtractor, Extraction, ExtractionKind, ImportGate};
use crate::paths::ObraPaths;
use crate::project::{Project, ProjectData, ProjectId};
use crate::store::{self, DurableProjectStore, MemProjectStore, ProjectStore};

pub struct Tracker {
    store: Arc<dyn ProjectStore>,
    user_id: String,
    imports: ImportGate,
    tools: ToolRegistry,
}

impl Tracker {
    pub fn new(store: Arc<dyn ProjectStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            imports: ImportGate::new(),
            tools: ToolRegistry::with_builtin(),
        }
    }

    /// A tracker over a throwaway in-memory store.
    pub fn in_memory(user_id: impl Into<String>) -> Self {
        Self::new(Arc::new(MemProjectStore::new()), user_id)
    }

    /// Open the backend selected by the configuration.
    pub fn open(config: &ObraConfig, paths: &ObraPaths) -> ObraResult<Self> {
        let store: Arc<dyn ProjectStore> = match config.backend {
            StorageBackend::Durable => {
                Arc::new(DurableProjectStore::open(&config.store_dir(paths))?)
            }
            StorageBackend::Memory => Arc::new(MemProjectStore::new()),
        };
        tracing::info!(backend = ?config.backend, user = %config.owner_id, "tracker ready");
        Ok(Self::new(store, config.owner_id.clone()))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn imports(&self) -> &ImportGate {
        &self.imports
    }

    // -- project lifecycle --------------------------------------------------

    /// Projects the current user owns or is a member of.
    pub fn list_projects(&self) -> ObraResult<Vec<Project>> {
        Ok(self.store.load(&self.user_id)?)
    }

    pub fn create_project(&self, data: ProjectData) -> ObraResult<Project> {
        data.validate()?;
        let project = self.store.create(data, &self.user_id)?;
        tracing::info!(project = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    /// Load a project the current user may access, with its matrix conformed.
    ///
    /// A project the user cannot access is reported as not found.
    pub fn open_project(&self, id: &ProjectId) -> ObraResult<Project> {
        let mut project = self.store.get(id)?;
        if !project.is_accessible_by(&self.user_id) {
            return Err(StoreError::NotFound { id: id.to_string() }.into());
        }
        project.ensure_consistent();
        Ok(project)
    }

    pub fn save_project(&self, project: &Project) -> ObraResult<()> {
        Ok(self.store.update(project)?)
    }

    /// Open, edit and save a project in one step. Nothing is saved if `edit` fails.
    pub fn with_project<T>(
        &self,
        id: &ProjectId,
        edit: impl FnOnce(&mut Project) -> ObraResult<T>,
    ) -> ObraResult<T> {
        let mut project = self.open_project(id)?;
        let out = edit(&mut project)?;
        self.save_project(&project)?;
        Ok(out)
    }

    /// Delete a project. Only its owner may do so.
    pub fn delete_project(&self, id: &ProjectId) -> ObraResult<()> {
        let project = self.open_project(id)?;
        if project.owner_id != self.user_id {
            return Err(StoreError::NotFound { id: id.to_string() }.into());
        }
        Ok(self.store.delete(id)?)
    }

    pub fn add_member(&self, id: &ProjectId, user_id: &str) -> ObraResult<()> {
        self.open_project(id)?;
        self.store.add_member(id, user_id)?;
        tracing::info!(project = %id, member = user_id, "member added");
        Ok(())
    }

    pub fn remove_member(&self, id: &ProjectId, user_id: &str) -> ObraResult<()> {
        self.open_project(id)?;
        self.store.remove_member(id, user_id)?;
        tracing::info!(project = %id, member = user_id, "member removed");
        Ok(())
    }

    // -- assistant ----------------------------------------------------------

    /// Apply an assistant batch and save the project if anything was written.
    pub fn assist(
        &self,
        id: &ProjectId,
        requests: &[ProgressUpdateRequest],
    ) -> ObraResult<MutationReport> {
        let mut project = self.open_project(id)?;
        let report = project.apply_assistant_updates(requests);
        if !report.applied.is_empty() {
            self.save_project(&project)?;
        }
        Ok(report)
    }

    /// Run one assistant tool call against a project and save the result.
    pub fn run_tool(&self, id: &ProjectId, name: &str, input: ToolInput) -> ObraResult<ToolOutput> {
        let mut project = self.open_project(id)?;
        let before = project.change_log().len();
        let output = self.tools.execute(name, input, &mut project)?;
        if project.change_log().len() != before {
            self.save_project(&project)?;
        }
        Ok(output)
    }

    // -- reports and backups ------------------------------------------------

    pub fn report(&self, id: &ProjectId) -> ObraResult<ProjectReport> {
        let project = self.open_project(id)?;
        Ok(ProjectReport::build(&project, Utc::now()))
    }

    /// Serialise every project the user can access.
    pub fn export_backup(&self) -> ObraResult<String> {
        let projects = self.list_projects()?;
        Ok(backup::export(&projects)?)
    }

    /// Restore every project in a backup. Returns how many were written.
    ///
    /// An entry whose id names an existing project the current user cannot
    /// access rejects the whole backup before anything is written.
    pub fn import_backup(&self, text: &str) -> ObraResult<usize> {
        let projects = backup::import(text)?;
        for (index, project) in projects.iter().enumerate() {
            store::check_restorable(&project.id)?;
            match self.store.get(&project.id) {
                Ok(existing) if !existing.is_accessible_by(&self.user_id) => {
                    return Err(BackupError::ForeignProject {
                        index,
                        id: project.id.to_string(),
                    }
                    .into());
                }
                Ok(_) | Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        let count = projects.len();
        for project in projects {
            self.store.restore(project)?;
        }
        tracing::info!(count, "backup imported");
        Ok(count)
    }

    // -- document import ----------------------------------------------------

    /// Run an extraction. Returns `None` when a newer import superseded this one.
    pub fn extract_document(
        &self,
        extractor: &dyn DocumentExtractor,
        kind: ExtractionKind,
        file: &[u8],
    ) -> ObraResult<Option<Extraction>> {
        let ticket = self.imports.begin();
        let extraction = extract::extract(extractor, kind, file)?;
        Ok(self.imports.accept(ticket, extraction))
    }

    /// Apply an accepted extraction: metadata creates a project, a budget
    /// (with or without schedule) replaces the template of `target`.
    pub fn apply_extraction(
        &self,
        extraction: Extraction,
        target: Option<&ProjectId>,
    ) -> ObraResult<Project> {
        match (extraction, target) {
            (Extraction::ProjectMetadata(metadata), _) => {
                self.create_project(metadata.into_project_data())
            }
            (Extraction::Budget(budget), Some(id)) => self.with_project(id, |project| {
                project.replace_budget(budget)?;
                Ok(project.clone())
            }),
            (Extraction::BudgetWithSchedule { budget, schedule }, Some(id)) => {
                self.with_project(id, |project| {
                    project.replace_budget(budget)?;
                    project.schedule = Some(schedule);
                    Ok(project.clone())
                })
            }
            (_, None) => Err(crate::error::ValidationError::Fields {
                fields: vec!["project".into()],
            }
            .into()),
        }
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("user_id", &self.user_id)
            .field("tools", &self.tools)
            .finish()
    }
}
