//! Project persistence.
//!
//! Two backends implement [`ProjectStore`]:
//!
//! - [`MemProjectStore`]: concurrent hashmap (DashMap), lost on exit
//! - [`DurableProjectStore`]: ACID transactions (redb), one JSON document per project
//!
//! Writes are whole-document and last-write-wins. The store assigns project
//! ids (`p-1`, `p-2`, ...) and creation timestamps.

pub mod durable;
pub mod mem;

pub use durable::DurableProjectStore;
pub use mem::MemProjectStore;

use crate::error::StoreError;
use crate::project::{Project, ProjectData, ProjectId};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence boundary for projects.
pub trait ProjectStore: Send + Sync {
    /// Projects the user owns or is a member of, oldest first.
    fn load(&self, user_id: &str) -> StoreResult<Vec<Project>>;

    fn get(&self, id: &ProjectId) -> StoreResult<Project>;

    /// Persist a new project; the store assigns its id and creation time.
    fn create(&self, data: ProjectData, owner_id: &str) -> StoreResult<Project>;

    /// Overwrite an existing project.
    fn update(&self, project: &Project) -> StoreResult<()>;

    fn delete(&self, id: &ProjectId) -> StoreResult<()>;

    /// Insert or overwrite a project under its own id (backup import).
    fn restore(&self, project: Project) -> StoreResult<()>;

    fn add_member(&self, id: &ProjectId, user_id: &str) -> StoreResult<()> {
        let mut project = self.get(id)?;
        if project.owner_id != user_id && !project.members.iter().any(|m| m == user_id) {
            project.members.push(user_id.to_string());
            self.update(&project)?;
        }
        Ok(())
    }

    fn remove_member(&self, id: &ProjectId, user_id: &str) -> StoreResult<()> {
        let mut project = self.get(id)?;
        let before = project.members.len();
        project.members.retain(|m| m != user_id);
        if project.members.len() != before {
            self.update(&project)?;
        }
        Ok(())
    }
}

fn format_id(n: u64) -> ProjectId {
    ProjectId::new(format!("p-{n}"))
}

/// Numeric part of a store-assigned id, if it has that shape.
fn id_number(id: &ProjectId) -> Option<u64> {
    id.as_str().strip_prefix("p-")?.parse().ok()
}

/// Whether a project can be restored under `id` without exhausting the
/// id counter. Ids outside the `p-N` shape always can.
pub fn check_restorable(id: &ProjectId) -> StoreResult<()> {
    match id_number(id) {
        Some(n) => next_after(n).map(|_| ()),
        None => Ok(()),
    }
}

/// The counter value that must follow `n`.
fn next_after(n: u64) -> StoreResult<u64> {
    n.checked_add(1).ok_or_else(|| StoreError::IdExhausted {
        id: format_id(n).to_string(),
    })
}

fn sort_projects(projects: &mut [Project]) {
    projects.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
