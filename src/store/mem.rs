//! In-memory project store backed by DashMap.
//!
//! Used for tests and for throwaway sessions. All data is lost on process
//! exit.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::project::{Project, ProjectData, ProjectId};

use super::{ProjectStore, StoreResult, format_id, id_number, next_after, sort_projects};

/// Concurrent in-memory store using a sharded hashmap.
#[derive(Debug)]
pub struct MemProjectStore {
    projects: DashMap<ProjectId, Project>,
    next_id: AtomicU64,
}

impl MemProjectStore {
    pub fn new() -> Self {
        Self {
            projects: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl Default for MemProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectStore for MemProjectStore {
    fn load(&self, user_id: &str) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .projects
            .iter()
            .filter(|entry| entry.value().is_accessible_by(user_id))
            .map(|entry| entry.value().clone())
            .collect();
        sort_projects(&mut projects);
        Ok(projects)
    }

    fn get(&self, id: &ProjectId) -> StoreResult<Project> {
        self.projects
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn create(&self, data: ProjectData, owner_id: &str) -> StoreResult<Project> {
        let n = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map_err(|n| StoreError::IdExhausted {
                id: format_id(n).to_string(),
            })?;
        let id = format_id(n);
        let project = Project::from_data(id.clone(), owner_id, Utc::now(), data);
        self.projects.insert(id, project.clone());
        tracing::debug!(project = %project.id, owner = owner_id, "project created in memory");
        Ok(project)
    }

    fn update(&self, project: &Project) -> StoreResult<()> {
        match self.projects.get_mut(&project.id) {
            Some(mut entry) => {
                *entry = project.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                id: project.id.to_string(),
            }),
        }
    }

    fn delete(&self, id: &ProjectId) -> StoreResult<()> {
        self.projects
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn restore(&self, project: Project) -> StoreResult<()> {
        if let Some(n) = id_number(&project.id) {
            self.next_id.fetch_max(next_after(n)?, Ordering::SeqCst);
        }
        self.projects.insert(project.id.clone(), project);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn create_get_update() {
        let store = MemProjectStore::new();
        let mut project = store.create(ProjectData::new("Villa", 90_000.0, 2), "alice").unwrap();
        assert_eq!(project.id.as_str(), "p-1");

        project.set_progress("4.1", "u1", 40.0).unwrap();
        store.update(&project).unwrap();
        assert_eq!(store.get(&project.id).unwrap(), project);
    }

    #[test]
    fn load_filters_by_access() {
        let store = MemProjectStore::new();
        let a = store.create(ProjectData::new("A", 1.0, 1), "alice").unwrap();
        store.create(ProjectData::new("B", 1.0, 1), "bob").unwrap();
        store.add_member(&a.id, "carol").unwrap();

        assert_eq!(store.load("alice").unwrap().len(), 1);
        assert_eq!(store.load("carol").unwrap()[0].name, "A");
        assert!(store.load("dave").unwrap().is_empty());

        store.remove_member(&a.id, "carol").unwrap();
        assert!(store.load("carol").unwrap().is_empty());
    }

    #[test]
    fn owner_is_not_added_as_member() {
        let store = MemProjectStore::new();
        let a = store.create(ProjectData::new("A", 1.0, 1), "alice").unwrap();
        store.add_member(&a.id, "alice").unwrap();
        assert!(store.get(&a.id).unwrap().members.is_empty());
    }

    #[test]
    fn missing_project_errors() {
        let store = MemProjectStore::new();
        let ghost = ProjectId::new("p-99");
        assert!(matches!(store.get(&ghost), Err(StoreError::NotFound { .. })));
        assert!(store.delete(&ghost).is_err());
    }

    #[test]
    fn restore_advances_id_allocator() {
        let store = MemProjectStore::new();
        let source = MemProjectStore::new();
        for _ in 0..5 {
            source.create(ProjectData::new("X", 1.0, 1), "alice").unwrap();
        }
        let last = source.get(&ProjectId::new("p-5")).unwrap();
        store.restore(last).unwrap();
        let next = store.create(ProjectData::new("Y", 1.0, 1), "alice").unwrap();
        assert_eq!(next.id.as_str(), "p-6");
    }

    #[test]
    fn restore_rejects_id_at_counter_limit() {
        let store = MemProjectStore::new();
        let project = Project::from_data(
            ProjectId::new(format!("p-{}", u64::MAX)),
            "alice",
            Utc::now(),
            ProjectData::new("Edge", 1.0, 1),
        );
        let err = store.restore(project).unwrap_err();
        assert!(matches!(err, StoreError::IdExhausted { .. }));
        assert!(store.is_empty());

        let fresh = store.create(ProjectData::new("Next", 1.0, 1), "alice").unwrap();
        assert_eq!(fresh.id.as_str(), "p-1");
    }

    #[test]
    fn create_fails_once_counter_is_exhausted() {
        let store = MemProjectStore::new();
        let project = Project::from_data(
            ProjectId::new(format!("p-{}", u64::MAX - 1)),
            "alice",
            Utc::now(),
            ProjectData::new("Edge", 1.0, 1),
        );
        store.restore(project).unwrap();
        assert!(matches!(
            store.create(ProjectData::new("Over", 1.0, 1), "alice"),
            Err(StoreError::IdExhausted { .. })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_creates_get_distinct_ids() {
        let store = Arc::new(MemProjectStore::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .create(ProjectData::new(format!("P{i}"), 1.0, 1), "alice")
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 32);
    }
}
