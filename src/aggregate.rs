//! Weighted progress and financial aggregation.
//!
//! Given a budget template, a progress matrix, the number of housing units
//! and the total cost of works, [`aggregate`] derives every displayed
//! percentage and currency figure. It is recomputed on each read; nothing here
//! is cached.
//!
//! The quantities, for an item with incidence `w` and progress row `p`:
//!
//! ```text
//! avg(item)            = Σ p[u] / unit_count           (0 when unit_count = 0)
//! measured(item)       = w · avg(item) / 100
//! category_progress    = Σ measured / Σ w · 100        (0 when Σ w = 0)
//! total_progress       = Σ measured over every item
//! total_released       = total_cost · total_progress / 100
//! balance_to_measure   = total_cost − total_released
//! ```
//!
//! Because a balanced template sums to 100% incidence, `total_progress` reads
//! directly as percent-of-project-complete. Inputs are not range-checked here.

use serde::{Deserialize, Serialize};

use crate::budget::{BudgetCategory, BudgetLineItem, BudgetTemplate, IncidenceBalance};
use crate::matrix::ProgressMatrix;

/// Mean progress of an item over `unit_count` slots.
pub fn average_progress(matrix: &ProgressMatrix, item_id: &str, unit_count: usize) -> f64 {
    if unit_count == 0 {
        return 0.0;
    }
    let sum: f64 = (0..unit_count)
        .map(|position| matrix.value_at(item_id, position))
        .sum();
    sum / unit_count as f64
}

/// An item's contribution to project progress, in incidence points.
pub fn measured_incidence(
    item: &BudgetLineItem,
    matrix: &ProgressMatrix,
    unit_count: usize,
) -> f64 {
    item.incidence * average_progress(matrix, &item.id, unit_count) / 100.0
}

/// Share of the category's own weight that has been delivered, in percent.
pub fn category_progress(incidence: f64, measured: f64) -> f64 {
    if incidence == 0.0 {
        0.0
    } else {
        measured / incidence * 100.0
    }
}

/// Amount corresponding to `incidence` percent of `total_cost`.
pub fn cost_share(total_cost: f64, incidence: f64) -> f64 {
    total_cost * incidence / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub incidence: f64,
    pub average_progress: f64,
    pub measured_incidence: f64,
    pub total_cost: f64,
    pub released: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub id: String,
    pub name: String,
    pub incidence: f64,
    pub measured_incidence: f64,
    pub progress: f64,
    pub total_cost: f64,
    pub released: f64,
    pub items: Vec<ItemProgress>,
}

/// Weighted progress of one housing unit across every item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitProgress {
    pub position: usize,
    pub progress: f64,
}

/// Read-only roll-up of a project, consumed by every view and exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub unit_count: usize,
    pub total_cost: f64,
    pub total_incidence: f64,
    pub balance: IncidenceBalance,
    pub total_progress: f64,
    pub total_released: f64,
    pub balance_to_measure: f64,
    pub categories: Vec<CategoryProgress>,
    pub units: Vec<UnitProgress>,
}

impl ProgressSnapshot {
    pub fn category(&self, id: &str) -> Option<&CategoryProgress> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&ItemProgress> {
        self.categories
            .iter()
            .flat_map(|c| c.items.iter())
            .find(|item| item.id == id)
    }
}

fn aggregate_category(
    category: &BudgetCategory,
    matrix: &ProgressMatrix,
    unit_count: usize,
    total_cost: f64,
) -> CategoryProgress {
    let items: Vec<ItemProgress> = category
        .sub_items
        .iter()
        .map(|item| {
            let average = average_progress(matrix, &item.id, unit_count);
            let measured = item.incidence * average / 100.0;
            ItemProgress {
                id: item.id.clone(),
                name: item.name.clone(),
                unit: item.unit.clone(),
                incidence: item.incidence,
                average_progress: average,
                measured_incidence: measured,
                total_cost: cost_share(total_cost, item.incidence),
                released: cost_share(total_cost, measured),
            }
        })
        .collect();

    let incidence = category.incidence();
    let measured: f64 = items.iter().map(|item| item.measured_incidence).sum();
    CategoryProgress {
        id: category.id.clone(),
        name: category.name.clone(),
        incidence,
        measured_incidence: measured,
        progress: category_progress(incidence, measured),
        total_cost: cost_share(total_cost, incidence),
        released: cost_share(total_cost, measured),
        items,
    }
}

/// Weighted progress per housing unit: `Σ w · p[u] / 100`.
///
/// The mean over all units equals the snapshot's `total_progress`.
pub fn unit_progress(
    template: &BudgetTemplate,
    matrix: &ProgressMatrix,
    unit_count: usize,
) -> Vec<UnitProgress> {
    (0..unit_count)
        .map(|position| UnitProgress {
            position,
            progress: template
                .items()
                .map(|item| item.incidence * matrix.value_at(&item.id, position) / 100.0)
                .sum(),
        })
        .collect()
}

/// Compute the full roll-up. This is the single aggregation entry point.
pub fn aggregate(
    template: &BudgetTemplate,
    matrix: &ProgressMatrix,
    unit_count: usize,
    total_cost: f64,
) -> ProgressSnapshot {
    let categories: Vec<CategoryProgress> = template
        .categories
        .iter()
        .map(|category| aggregate_category(category, matrix, unit_count, total_cost))
        .collect();

    let total_incidence = template.total_incidence();
    let total_progress: f64 = categories.iter().map(|c| c.measured_incidence).sum();
    let total_released = cost_share(total_cost, total_progress);

    ProgressSnapshot {
        unit_count,
        total_cost,
        total_incidence,
        balance: IncidenceBalance::classify(total_incidence),
        total_progress,
        total_released,
        balance_to_measure: total_cost - total_released,
        categories,
        units: unit_progress(template, matrix, unit_count),
    }
}
