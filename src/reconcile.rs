//! Unit reconciliation: keep progress rows aligned with the housing unit list.
//!
//! Runs whenever the unit list changes, before the project is persisted.
//! Units are matched by id: a unit that survives the edit carries its values
//! to its new position, a new unit starts at 0, and a removed unit's values
//! are discarded. When units are only appended or truncated at the end this is
//! the same as copying the first `min(old, new)` slots and zero-filling.

use crate::budget::BudgetTemplate;
use crate::matrix::ProgressMatrix;
use crate::unit::HousingUnit;

/// Build a matrix sized to `new_units` from one sized to `old_units`.
///
/// The result has exactly one row per template item, each `new_units.len()`
/// long; rows for items missing from the template are dropped.
pub fn reconcile(
    template: &BudgetTemplate,
    old_units: &[HousingUnit],
    new_units: &[HousingUnit],
    matrix: &ProgressMatrix,
) -> ProgressMatrix {
    // Slot mapping: new position -> old position of the same unit id.
    let sources: Vec<Option<usize>> = new_units
        .iter()
        .map(|unit| old_units.iter().position(|old| old.id == unit.id))
        .collect();

    let mut reconciled = ProgressMatrix::new();
    for item in template.items() {
        let row = sources
            .iter()
            .map(|source| match source {
                Some(old_position) => matrix.value_at(&item.id, *old_position),
                None => 0.0,
            })
            .collect();
        reconciled.insert_row(item.id.clone(), row);
    }

    let moved = sources
        .iter()
        .enumerate()
        .filter(|(new_position, source)| source.is_some_and(|old| old != *new_position))
        .count();
    tracing::debug!(
        old_units = old_units.len(),
        new_units = new_units.len(),
        moved,
        "reconciled progress matrix"
    );
    reconciled
}
