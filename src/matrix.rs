//! Progress matrix: per-item, per-unit completion percentages.
//!
//! Rows are keyed by line-item id; slot `i` of a row belongs to the housing
//! unit at position `i`. Missing rows and slots beyond a row's end read as 0.
//! Values are stored as given; range validation belongs to the input boundary
//! ([`crate::project::Project::set_progress`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::budget::BudgetTemplate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMatrix {
    rows: BTreeMap<String, Vec<f64>>,
}

impl ProgressMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero-filled matrix with one row per template item.
    pub fn zeroed(template: &BudgetTemplate, unit_count: usize) -> Self {
        Self {
            rows: template
                .items()
                .map(|item| (item.id.clone(), vec![0.0; unit_count]))
                .collect(),
        }
    }

    pub fn row(&self, item_id: &str) -> Option<&[f64]> {
        self.rows.get(item_id).map(Vec::as_slice)
    }

    /// Value at a slot, 0 when absent.
    pub fn value_at(&self, item_id: &str, position: usize) -> f64 {
        self.rows
            .get(item_id)
            .and_then(|row| row.get(position).copied())
            .unwrap_or(0.0)
    }

    /// Write a slot, growing the row with zeros if needed. Returns the old value.
    pub fn set(&mut self, item_id: &str, position: usize, value: f64) -> f64 {
        let row = self.rows.entry(item_id.to_string()).or_default();
        if row.len() <= position {
            row.resize(position + 1, 0.0);
        }
        std::mem::replace(&mut row[position], value)
    }

    pub fn insert_row(&mut self, item_id: impl Into<String>, row: Vec<f64>) {
        self.rows.insert(item_id.into(), row);
    }

    pub fn remove_row(&mut self, item_id: &str) -> Option<Vec<f64>> {
        self.rows.remove(item_id)
    }

    /// Move a row to a new key; used when an item id is edited.
    pub fn rename_row(&mut self, old_id: &str, new_id: &str) {
        if let Some(row) = self.rows.remove(old_id) {
            self.rows.insert(new_id.to_string(), row);
        }
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pad or truncate every row to `unit_count` slots (positional).
    pub fn resize(&mut self, unit_count: usize) {
        for row in self.rows.values_mut() {
            row.resize(unit_count, 0.0);
        }
    }

    /// Restore the consistency invariant against a template: one row per
    /// template item, each exactly `unit_count` long. Rows of items not in
    /// the template are dropped.
    pub fn conform(&mut self, template: &BudgetTemplate, unit_count: usize) {
        let mut rows = BTreeMap::new();
        for item in template.items() {
            let mut row = self.rows.remove(&item.id).unwrap_or_default();
            row.resize(unit_count, 0.0);
            rows.insert(item.id.clone(), row);
        }
        self.rows = rows;
    }

    /// Whether every template item has a row of exactly `unit_count` slots.
    pub fn is_consistent(&self, template: &BudgetTemplate, unit_count: usize) -> bool {
        template
            .items()
            .all(|item| self.rows.get(&item.id).is_some_and(|row| row.len() == unit_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetCategory, BudgetLineItem};

    fn template() -> BudgetTemplate {
        BudgetTemplate::new(vec![BudgetCategory::new("1", "Foundations")
            .with_item(BudgetLineItem::new("1.1", "Footings", 60.0, "m³"))
            .with_item(BudgetLineItem::new("1.2", "Beams", 40.0, "m³"))])
    }

    #[test]
    fn zeroed_matches_template() {
        let matrix = ProgressMatrix::zeroed(&template(), 3);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.row("1.1"), Some(&[0.0, 0.0, 0.0][..]));
        assert!(matrix.is_consistent(&template(), 3));
        assert!(!matrix.is_consistent(&template(), 4));
    }

    #[test]
    fn missing_values_read_as_zero() {
        let matrix = ProgressMatrix::new();
        assert_eq!(matrix.value_at("9.9", 5), 0.0);
    }

    #[test]
    fn set_grows_row_and_returns_old_value() {
        let mut matrix = ProgressMatrix::new();
        assert_eq!(matrix.set("1.1", 2, 75.0), 0.0);
        assert_eq!(matrix.row("1.1"), Some(&[0.0, 0.0, 75.0][..]));
        assert_eq!(matrix.set("1.1", 2, 80.0), 75.0);
    }

    #[test]
    fn conform_restores_invariant() {
        let mut matrix = ProgressMatrix::new();
        matrix.insert_row("1.1", vec![10.0, 20.0, 30.0, 40.0]);
        matrix.insert_row("stale", vec![1.0]);
        matrix.conform(&template(), 2);
        assert_eq!(matrix.row("1.1"), Some(&[10.0, 20.0][..]));
        assert_eq!(matrix.row("1.2"), Some(&[0.0, 0.0][..]));
        assert!(matrix.row("stale").is_none());
        assert!(matrix.is_consistent(&template(), 2));
    }

    #[test]
    fn rename_row_moves_values() {
        let mut matrix = ProgressMatrix::zeroed(&template(), 1);
        matrix.set("1.1", 0, 42.0);
        matrix.rename_row("1.1", "1.10");
        assert!(matrix.row("1.1").is_none());
        assert_eq!(matrix.value_at("1.10", 0), 42.0);
    }

    #[test]
    fn serializes_as_plain_map() {
        let mut matrix = ProgressMatrix::new();
        matrix.insert_row("1.1", vec![100.0, 0.0]);
        let json = serde_json::to_string(&matrix).unwrap();
        assert_eq!(json, r#"{"1.1":[100.0,0.0]}"#);
    }
}
