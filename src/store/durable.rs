//! ACID-durable project store backed by redb.
//!
//! Each project is one JSON document in the `projects` table, keyed by id.
//! The id counter lives in the `meta` table and is advanced in the same
//! write transaction that inserts the project.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use crate::error::StoreError;
use crate::project::{Project, ProjectData, ProjectId};

use super::{ProjectStore, StoreResult, format_id, id_number, next_after, sort_projects};

/// Project documents (id → JSON).
const PROJECTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");

/// Store counters.
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID_KEY: &str = "next_project_id";

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "obra.redb";

fn redb_err(op: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

/// ACID-durable store using redb.
///
/// All writes go through transactions. Reads use MVCC snapshots.
pub struct DurableProjectStore {
    db: Arc<Database>,
}

impl DurableProjectStore {
    /// Open or create a store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create both tables up front so read transactions never miss them.
        let txn = db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        {
            txn.open_table(PROJECTS_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            txn.open_table(META_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;

        tracing::info!(path = %db_path.display(), "project store opened");
        Ok(Self { db: Arc::new(db) })
    }

    fn encode(project: &Project) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(project).map_err(|e| StoreError::Serialization {
            message: format!("failed to encode project {}: {e}", project.id),
        })
    }

    fn decode(id: &str, bytes: &[u8]) -> StoreResult<Project> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
            message: format!("failed to decode project {id}: {e}"),
        })
    }

    /// Write a document. With `must_exist`, a missing id is an error.
    fn put(&self, project: &Project, must_exist: bool) -> StoreResult<()> {
        let bytes = Self::encode(project)?;
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        {
            let mut table = txn
                .open_table(PROJECTS_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            let existed = table
                .insert(project.id.as_str(), bytes.as_slice())
                .map_err(|e| redb_err("insert", e))?
                .is_some();
            if must_exist && !existed {
                // Dropping the transaction uncommitted discards the insert.
                return Err(StoreError::NotFound {
                    id: project.id.to_string(),
                });
            }
            if let Some(n) = id_number(&project.id) {
                let mut meta = txn
                    .open_table(META_TABLE)
                    .map_err(|e| redb_err("open_table", e))?;
                let next = meta
                    .get(NEXT_ID_KEY)
                    .map_err(|e| redb_err("get", e))?
                    .map(|guard| guard.value())
                    .unwrap_or(1);
                if n >= next {
                    meta.insert(NEXT_ID_KEY, next_after(n)?)
                        .map_err(|e| redb_err("insert", e))?;
                }
            }
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    /// Number of stored projects, across all owners.
    pub fn len(&self) -> StoreResult<u64> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(PROJECTS_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        table.len().map_err(|e| redb_err("len", e))
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        self.len().map(|n| n == 0)
    }
}

impl ProjectStore for DurableProjectStore {
    fn load(&self, user_id: &str) -> StoreResult<Vec<Project>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(PROJECTS_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let mut projects = Vec::new();
        for entry in table.iter().map_err(|e| redb_err("iter", e))? {
            let (key, value) = entry.map_err(|e| redb_err("iter", e))?;
            let project = Self::decode(key.value(), value.value())?;
            if project.is_accessible_by(user_id) {
                projects.push(project);
            }
        }
        sort_projects(&mut projects);
        Ok(projects)
    }

    fn get(&self, id: &ProjectId) -> StoreResult<Project> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(PROJECTS_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let guard = table
            .get(id.as_str())
            .map_err(|e| redb_err("get", e))?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        Self::decode(id.as_str(), guard.value())
    }

    fn create(&self, data: ProjectData, owner_id: &str) -> StoreResult<Project> {
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        let project = {
            let mut meta = txn
                .open_table(META_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            let n = meta
                .get(NEXT_ID_KEY)
                .map_err(|e| redb_err("get", e))?
                .map(|guard| guard.value())
                .unwrap_or(1);
            meta.insert(NEXT_ID_KEY, next_after(n)?)
                .map_err(|e| redb_err("insert", e))?;

            let project = Project::from_data(format_id(n), owner_id, Utc::now(), data);
            let bytes = Self::encode(&project)?;
            let mut table = txn
                .open_table(PROJECTS_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            table
                .insert(project.id.as_str(), bytes.as_slice())
                .map_err(|e| redb_err("insert", e))?;
            project
        };
        txn.commit().map_err(|e| redb_err("commit", e))?;
        tracing::info!(project = %project.id, owner = owner_id, "project created");
        Ok(project)
    }

    fn update(&self, project: &Project) -> StoreResult<()> {
        self.put(project, true)?;
        tracing::debug!(project = %project.id, "project saved");
        Ok(())
    }

    fn delete(&self, id: &ProjectId) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        let existed = {
            let mut table = txn
                .open_table(PROJECTS_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            let result = table
                .remove(id.as_str())
                .map_err(|e| redb_err("remove", e))?;
            result.is_some()
        };
        if !existed {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        tracing::info!(project = %id, "project deleted");
        Ok(())
    }

    fn restore(&self, project: Project) -> StoreResult<()> {
        self.put(&project, false)?;
        tracing::info!(project = %project.id, "project restored");
        Ok(())
    }
}

impl std::fmt::Debug for DurableProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableProjectStore").finish()
    }
}
