//! Report types for serializing project state.
//!
//! A [`ProjectReport`] is the read-only view handed to writers (JSON here;
//! spreadsheet and PDF renderers consume the same structure). The formatting
//! helpers produce the Brazilian presentation used in every report:
//! `R$ 1.234,56` and `12.34%`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::ProgressSnapshot;
use crate::project::{Project, ProjectDetails};
use crate::schedule::Schedule;

/// Exported project header with its figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub id: String,
    pub name: String,
    pub details: ProjectDetails,
    /// Unit names, in matrix column order.
    pub units: Vec<String>,
    pub snapshot: ProgressSnapshot,
    /// Stage the project is in, when a schedule is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<u32>,
    pub generated_at: DateTime<Utc>,
}

impl ProjectReport {
    pub fn build(project: &Project, generated_at: DateTime<Utc>) -> Self {
        let snapshot = project.snapshot();
        let current_stage = project
            .schedule
            .as_ref()
            .and_then(|schedule: &Schedule| schedule.current_stage(snapshot.total_progress));
        Self {
            id: project.id.to_string(),
            name: project.name.clone(),
            details: project.details.clone(),
            units: project.units().iter().map(|u| u.name.clone()).collect(),
            snapshot,
            current_stage,
            generated_at,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Format an amount as Brazilian reais: `R$ 1.234,56`.
pub fn format_brl(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let integer = group_thousands(cents / 100);
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}R$ {integer},{:02}", cents % 100)
}

/// Format a percentage with two decimals: `12.34%`.
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

fn group_thousands(mut n: u64) -> String {
    let mut groups = Vec::new();
    loop {
        if n < 1000 {
            groups.push(n.to_string());
            break;
        }
        groups.push(format!("{:03}", n % 1000));
        n /= 1000;
    }
    groups.reverse();
    groups.join(".")
}
