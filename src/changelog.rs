//! Change log: append-only audit trail of progress changes.
//!
//! One entry per committed cell change. Items and units are recorded by
//! display name so entries stay readable after ids are edited. Entries are
//! never mutated or compacted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: u64,
    pub item_id: String,
    pub item_name: String,
    pub unit_name: String,
    pub old_progress: f64,
    pub new_progress: f64,
    pub timestamp: DateTime<Utc>,
}

impl ChangeLogEntry {
    fn matches(&self, needle: &str) -> bool {
        self.item_name.to_lowercase().contains(needle)
            || self.unit_name.to_lowercase().contains(needle)
    }
}

/// Fields of a change before it is stamped with an id.
#[derive(Debug, Clone)]
pub struct ProgressChange {
    pub item_id: String,
    pub item_name: String,
    pub unit_name: String,
    pub old_progress: f64,
    pub new_progress: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeLog {
    entries: Vec<ChangeLogEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change stamped with the given time.
    pub fn record(&mut self, change: ProgressChange, timestamp: DateTime<Utc>) -> &ChangeLogEntry {
        let id = self.entries.last().map_or(1, |last| last.id + 1);
        self.entries.push(ChangeLogEntry {
            id,
            item_id: change.item_id,
            item_name: change.item_name,
            unit_name: change.unit_name,
            old_progress: change.old_progress,
            new_progress: change.new_progress,
            timestamp,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ChangeLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose item or unit name contains `needle` (case-insensitive).
    /// An empty needle matches everything.
    pub fn filter(&self, needle: &str) -> Vec<&ChangeLogEntry> {
        let needle = needle.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|entry| needle.is_empty() || entry.matches(&needle))
            .collect()
    }

    /// Group entries by calendar date (UTC), newest date first. Entries keep
    /// their recorded order within a day.
    pub fn by_date<'a>(
        entries: &[&'a ChangeLogEntry],
    ) -> Vec<(NaiveDate, Vec<&'a ChangeLogEntry>)> {
        let mut groups: Vec<(NaiveDate, Vec<&'a ChangeLogEntry>)> = Vec::new();
        for &entry in entries {
            let date = entry.timestamp.date_naive();
            match groups.iter_mut().find(|(d, _)| *d == date) {
                Some((_, group)) => group.push(entry),
                None => groups.push((date, vec![entry])),
            }
        }
        groups.sort_by(|a, b| b.0.cmp(&a.0));
        groups
    }
}
