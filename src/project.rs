//! Project aggregate: budget, housing units, progress and change log.
//!
//! Every progress edit (single cell, bulk, assistant batch) and every
//! structural edit (units, categories, items) goes through [`Project`], which
//! keeps the progress matrix consistent with the template and the unit list
//! and appends one change-log entry per changed cell. Figures are never
//! stored; [`Project::snapshot`] recomputes them from the current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, ProgressSnapshot};
use crate::assistant::{self, AppliedUpdate, MutationReport, ProgressUpdateRequest};
use crate::budget::{BudgetCategory, BudgetLineItem, BudgetTemplate, ItemEdit};
use crate::changelog::{ChangeLog, ProgressChange};
use crate::error::{BudgetError, ObraResult, UnitError, ValidationError};
use crate::matrix::ProgressMatrix;
use crate::reconcile;
use crate::schedule::Schedule;
use crate::unit::{HousingUnit, HousingUnits};

/// Opaque project identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// Descriptive fields that do not take part in any computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetails {
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub contractor: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
}

/// Everything needed to create a project, before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectData {
    pub name: String,
    pub cost_of_works: f64,
    pub details: ProjectDetails,
    /// `None` selects [`BudgetTemplate::default_housing`].
    pub budget: Option<BudgetTemplate>,
    pub units: HousingUnits,
    pub schedule: Option<Schedule>,
}

impl ProjectData {
    /// A project on the default template with `unit_count` numbered units.
    pub fn new(name: impl Into<String>, cost_of_works: f64, unit_count: usize) -> Self {
        Self {
            name: name.into(),
            cost_of_works,
            details: ProjectDetails::default(),
            budget: None,
            units: HousingUnits::numbered(unit_count),
            schedule: None,
        }
    }

    pub fn with_budget(mut self, budget: BudgetTemplate) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_units(mut self, units: HousingUnits) -> Self {
        self.units = units;
        self
    }

    /// Required-field check; every failing field is reported at once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut fields = Vec::new();
        if self.name.trim().is_empty() {
            fields.push("name".to_string());
        }
        if !(self.cost_of_works.is_finite() && self.cost_of_works > 0.0) {
            fields.push("cost_of_works".to_string());
        }
        if let Some(budget) = &self.budget {
            fields.extend(budget.field_errors().into_iter().map(|f| format!("budget.{f}")));
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields { fields })
        }
    }
}

/// Which cells a bulk edit writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkScope {
    /// One item across every unit.
    Item(String),
    /// One unit across every item.
    Unit(String),
    /// Every cell of the matrix.
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub cost_of_works: f64,
    #[serde(default)]
    pub details: ProjectDetails,
    budget: BudgetTemplate,
    units: HousingUnits,
    progress: ProgressMatrix,
    #[serde(default)]
    change_log: ChangeLog,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

impl Project {
    /// Build a project with a zeroed progress matrix sized to its units.
    pub fn from_data(
        id: ProjectId,
        owner_id: impl Into<String>,
        created_at: DateTime<Utc>,
        data: ProjectData,
    ) -> Self {
        let budget = data.budget.unwrap_or_else(BudgetTemplate::default_housing);
        let progress = ProgressMatrix::zeroed(&budget, data.units.len());
        Self {
            id,
            name: data.name,
            owner_id: owner_id.into(),
            members: Vec::new(),
            created_at,
            cost_of_works: data.cost_of_works,
            details: data.details,
            budget,
            units: data.units,
            progress,
            change_log: ChangeLog::new(),
            schedule: data.schedule,
        }
    }

    pub fn budget(&self) -> &BudgetTemplate {
        &self.budget
    }

    pub fn units(&self) -> &HousingUnits {
        &self.units
    }

    pub fn progress(&self) -> &ProgressMatrix {
        &self.progress
    }

    pub fn change_log(&self) -> &ChangeLog {
        &self.change_log
    }

    /// Whether `user_id` owns the project or is a member of it.
    pub fn is_accessible_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.members.iter().any(|m| m == user_id)
    }

    /// Derived figures for every view and export.
    pub fn snapshot(&self) -> ProgressSnapshot {
        aggregate::aggregate(
            &self.budget,
            &self.progress,
            self.units.len(),
            self.cost_of_works,
        )
    }

    /// Restore the matrix invariant after loading a document from outside.
    pub fn ensure_consistent(&mut self) {
        if !self.progress.is_consistent(&self.budget, self.units.len()) {
            tracing::warn!(project = %self.id, "progress matrix out of shape, conforming");
            self.progress.conform(&self.budget, self.units.len());
        }
    }

    pub fn set_cost_of_works(&mut self, cost: f64) -> ObraResult<()> {
        if !(cost.is_finite() && cost > 0.0) {
            return Err(ValidationError::InvalidCost { value: cost }.into());
        }
        self.cost_of_works = cost;
        Ok(())
    }

    // -- progress edits ---------------------------------------------------

    fn write_cell(
        &mut self,
        item_id: &str,
        position: usize,
        value: f64,
        now: DateTime<Utc>,
    ) -> Option<(f64, f64)> {
        let old = self.progress.set(item_id, position, value);
        if old == value {
            return None;
        }
        let item_name = self
            .budget
            .item(item_id)
            .map(|item| item.name.clone())
            .unwrap_or_else(|| item_id.to_string());
        let unit_name = self
            .units
            .get(position)
            .map(|unit| unit.name.clone())
            .unwrap_or_default();
        self.change_log.record(
            ProgressChange {
                item_id: item_id.to_string(),
                item_name,
                unit_name,
                old_progress: old,
                new_progress: value,
            },
            now,
        );
        Some((old, value))
    }

    /// Set one cell. Returns whether the value changed.
    pub fn set_progress(&mut self, item_id: &str, unit_id: &str, value: f64) -> ObraResult<bool> {
        validate_progress(value)?;
        if self.budget.item(item_id).is_none() {
            return Err(BudgetError::ItemNotFound { id: item_id.into() }.into());
        }
        let position = self
            .units
            .position_of(unit_id)
            .ok_or_else(|| UnitError::NotFound { id: unit_id.into() })?;
        Ok(self.write_cell(item_id, position, value, Utc::now()).is_some())
    }

    /// Set every cell in `scope`. Returns the number of cells that changed.
    pub fn bulk_set_progress(&mut self, scope: BulkScope, value: f64) -> ObraResult<usize> {
        validate_progress(value)?;
        let cells: Vec<(String, usize)> = match &scope {
            BulkScope::Item(item_id) => {
                if self.budget.item(item_id).is_none() {
                    return Err(BudgetError::ItemNotFound { id: item_id.clone() }.into());
                }
                (0..self.units.len()).map(|p| (item_id.clone(), p)).collect()
            }
            BulkScope::Unit(unit_id) => {
                let position = self
                    .units
                    .position_of(unit_id)
                    .ok_or_else(|| UnitError::NotFound { id: unit_id.clone() })?;
                self.budget.items().map(|item| (item.id.clone(), position)).collect()
            }
            BulkScope::All => self
                .budget
                .items()
                .flat_map(|item| (0..self.units.len()).map(move |p| (item.id.clone(), p)))
                .collect(),
        };

        let now = Utc::now();
        let changed = cells
            .into_iter()
            .filter(|(item_id, position)| self.write_cell(item_id, *position, value, now).is_some())
            .count();
        tracing::info!(project = %self.id, ?scope, value, changed, "bulk progress edit");
        Ok(changed)
    }

    /// Resolve and commit an assistant batch.
    ///
    /// Planning is pure, so the commit either writes every resolved pair or,
    /// if nothing resolved, nothing at all.
    pub fn apply_assistant_updates(
        &mut self,
        requests: &[ProgressUpdateRequest],
    ) -> MutationReport {
        let plan = assistant::plan_updates(&self.budget, &self.units, requests);
        let summary = plan.summary();
        let now = Utc::now();

        let mut applied = Vec::with_capacity(plan.writes.len());
        for write in &plan.writes {
            let old = self.progress.value_at(&write.item_id, write.position);
            self.write_cell(&write.item_id, write.position, write.progress, now);
            applied.push(AppliedUpdate {
                item_id: write.item_id.clone(),
                item_name: write.item_name.clone(),
                unit_name: write.unit_name.clone(),
                old_progress: old,
                new_progress: write.progress,
            });
        }

        if plan.has_problems() {
            tracing::warn!(project = %self.id, %summary, "assistant batch partially resolved");
        } else {
            tracing::info!(project = %self.id, writes = applied.len(), "assistant batch committed");
        }

        MutationReport {
            applied,
            unresolved_services: plan.unresolved_services,
            unresolved_units: plan.unresolved_units,
            rejected: plan.rejected,
            summary,
        }
    }

    // -- housing units ----------------------------------------------------

    /// Replace the unit list, reconciling progress by unit id.
    pub fn set_units(&mut self, units: HousingUnits) {
        self.progress = reconcile::reconcile(
            &self.budget,
            self.units.as_slice(),
            units.as_slice(),
            &self.progress,
        );
        tracing::info!(
            project = %self.id,
            from = self.units.len(),
            to = units.len(),
            "housing units changed"
        );
        self.units = units;
    }

    /// Append a unit with a fresh id.
    pub fn add_unit(&mut self, name: impl Into<String>) -> ObraResult<HousingUnit> {
        let mut units = self.units.clone();
        let unit = HousingUnit::new(units.next_id(), name);
        units.push(unit.clone())?;
        self.set_units(units);
        Ok(unit)
    }

    pub fn remove_unit(&mut self, unit_id: &str) -> ObraResult<HousingUnit> {
        let mut units = self.units.clone();
        let removed = units.remove(unit_id)?;
        self.set_units(units);
        Ok(removed)
    }

    pub fn rename_unit(&mut self, unit_id: &str, name: impl Into<String>) -> ObraResult<()> {
        self.units.rename(unit_id, name)?;
        Ok(())
    }

    // -- budget structure -------------------------------------------------

    pub fn add_category(&mut self, category: BudgetCategory) -> ObraResult<()> {
        let item_ids: Vec<String> = category.sub_items.iter().map(|i| i.id.clone()).collect();
        self.budget.add_category(category)?;
        for id in item_ids {
            self.progress.insert_row(id, vec![0.0; self.units.len()]);
        }
        Ok(())
    }

    pub fn remove_category(&mut self, category_id: &str) -> ObraResult<BudgetCategory> {
        let removed = self.budget.remove_category(category_id)?;
        for item in &removed.sub_items {
            self.progress.remove_row(&item.id);
        }
        Ok(removed)
    }

    pub fn rename_category(
        &mut self,
        category_id: &str,
        name: impl Into<String>,
    ) -> ObraResult<()> {
        Ok(self.budget.rename_category(category_id, name)?)
    }

    pub fn add_item(&mut self, category_id: &str, item: BudgetLineItem) -> ObraResult<()> {
        let id = item.id.clone();
        self.budget.add_item(category_id, item)?;
        self.progress.insert_row(id, vec![0.0; self.units.len()]);
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &str) -> ObraResult<BudgetLineItem> {
        let removed = self.budget.remove_item(item_id)?;
        self.progress.remove_row(item_id);
        Ok(removed)
    }

    /// Edit an item; an id change moves its progress row.
    pub fn edit_item(&mut self, item_id: &str, edit: ItemEdit) -> ObraResult<()> {
        let new_id = edit.id.clone();
        if let Some(old_id) = self.budget.edit_item(item_id, edit)? {
            if let Some(new_id) = new_id {
                self.progress.rename_row(&old_id, &new_id);
            }
        }
        Ok(())
    }

    /// Swap in a new template (document import). Rows of items whose ids
    /// survive keep their progress; the rest start at zero. A structurally
    /// broken template leaves the project untouched.
    pub fn replace_budget(&mut self, budget: BudgetTemplate) -> ObraResult<()> {
        budget.validate()?;
        self.budget = budget;
        self.progress.conform(&self.budget, self.units.len());
        tracing::info!(project = %self.id, items = self.budget.item_count(), "budget replaced");
        Ok(())
    }
}

fn validate_progress(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::ProgressOutOfRange { value })
    }
}
