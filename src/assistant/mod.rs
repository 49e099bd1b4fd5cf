//! Assistant-driven progress updates.
//!
//! An assistant (an AI model given the exact service and unit names as
//! context) issues batches of [`ProgressUpdateRequest`]s. [`plan_updates`]
//! resolves them against the budget template and the housing units without
//! touching any state; the project then commits the whole plan at once.
//!
//! Resolution is exact after trimming and Unicode NFC normalisation, so a
//! decomposed "Fundações" still matches its composed spelling. Names that do
//! not resolve are reported, never silently skipped, and never abort the other
//! pairs of the batch.

pub mod tool;
pub mod tools;

use serde::{Deserialize, Deserializer, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::budget::BudgetTemplate;
use crate::unit::HousingUnits;

/// Sentinel unit name selecting every housing unit.
pub const ALL_UNITS: &str = "all";

/// One instruction: set `service_name` to `progress` on the named units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateRequest {
    pub service_name: String,
    /// Unit names, or the single sentinel `"all"` (bare string or one-element list).
    #[serde(deserialize_with = "one_or_many")]
    pub unit_names: Vec<String>,
    pub progress: f64,
}

impl ProgressUpdateRequest {
    pub fn new(service_name: impl Into<String>, unit_names: &[&str], progress: f64) -> Self {
        Self {
            service_name: service_name.into(),
            unit_names: unit_names.iter().map(|s| s.to_string()).collect(),
            progress,
        }
    }

    fn targets_all(&self) -> bool {
        matches!(
            self.unit_names.as_slice(),
            [only] if normalize(only).eq_ignore_ascii_case(ALL_UNITS)
        )
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

fn normalize(name: &str) -> String {
    name.trim().nfc().collect()
}

/// A resolved (item, unit) write.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    pub item_id: String,
    pub item_name: String,
    pub position: usize,
    pub unit_name: String,
    pub progress: f64,
}

/// Outcome of resolving a batch, before anything is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePlan {
    pub writes: Vec<PlannedWrite>,
    pub unresolved_services: Vec<String>,
    pub unresolved_units: Vec<String>,
    /// Requests refused outright (non-finite progress, no unit names).
    pub rejected: Vec<String>,
}

impl UpdatePlan {
    fn push_write(&mut self, write: PlannedWrite) {
        // A later request for the same cell wins.
        match self
            .writes
            .iter_mut()
            .find(|w| w.item_id == write.item_id && w.position == write.position)
        {
            Some(existing) => *existing = write,
            None => self.writes.push(write),
        }
    }

    fn note_unresolved(list: &mut Vec<String>, name: &str) {
        if !list.iter().any(|n| n == name) {
            list.push(name.to_string());
        }
    }

    pub fn has_problems(&self) -> bool {
        !self.unresolved_services.is_empty()
            || !self.unresolved_units.is_empty()
            || !self.rejected.is_empty()
    }

    /// Human-readable summary of the batch.
    pub fn summary(&self) -> String {
        let services = {
            let mut names: Vec<&str> = self.writes.iter().map(|w| w.item_name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            names.len()
        };
        let mut summary = format!(
            "Updated {} progress value(s) across {} service(s).",
            self.writes.len(),
            services
        );
        if !self.unresolved_services.is_empty() {
            summary.push_str(&format!(
                " Service(s) not found: {}.",
                quoted(&self.unresolved_services)
            ));
        }
        if !self.unresolved_units.is_empty() {
            summary.push_str(&format!(
                " Unit(s) not found: {}.",
                quoted(&self.unresolved_units)
            ));
        }
        if !self.rejected.is_empty() {
            summary.push_str(&format!(" Rejected: {}.", self.rejected.join("; ")));
        }
        summary
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve a batch of requests into cell writes. Pure: no state is touched.
pub fn plan_updates(
    template: &BudgetTemplate,
    units: &HousingUnits,
    requests: &[ProgressUpdateRequest],
) -> UpdatePlan {
    let mut plan = UpdatePlan::default();

    for request in requests {
        if !request.progress.is_finite() {
            plan.rejected.push(format!(
                "\"{}\" has a non-numeric progress value",
                request.service_name
            ));
            continue;
        }
        if request.unit_names.is_empty() {
            plan.rejected
                .push(format!("\"{}\" names no housing unit", request.service_name));
            continue;
        }

        let service = normalize(&request.service_name);
        let Some(item) = template.items().find(|item| normalize(&item.name) == service) else {
            UpdatePlan::note_unresolved(&mut plan.unresolved_services, &request.service_name);
            continue;
        };
        let progress = request.progress.clamp(0.0, 100.0);

        let positions: Vec<usize> = if request.targets_all() {
            (0..units.len()).collect()
        } else {
            request
                .unit_names
                .iter()
                .filter_map(|name| {
                    let wanted = normalize(name);
                    let found = units.iter().position(|u| normalize(&u.name) == wanted);
                    if found.is_none() {
                        UpdatePlan::note_unresolved(&mut plan.unresolved_units, name);
                    }
                    found
                })
                .collect()
        };

        for position in positions {
            let Some(unit) = units.get(position) else {
                continue;
            };
            plan.push_write(PlannedWrite {
                item_id: item.id.clone(),
                item_name: item.name.clone(),
                position,
                unit_name: unit.name.clone(),
                progress,
            });
        }
    }

    plan
}

/// A committed write, as reported back to the assistant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedUpdate {
    pub item_id: String,
    pub item_name: String,
    pub unit_name: String,
    pub old_progress: f64,
    pub new_progress: f64,
}

/// Result of committing an [`UpdatePlan`] to a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationReport {
    pub applied: Vec<AppliedUpdate>,
    pub unresolved_services: Vec<String>,
    pub unresolved_units: Vec<String>,
    pub rejected: Vec<String>,
    pub summary: String,
}
