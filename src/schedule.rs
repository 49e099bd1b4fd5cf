//! Physical/financial stage schedule extracted from contract documents.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Planned share of work and of disbursement for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStage {
    pub stage: u32,
    pub physical_percent: f64,
    pub financial_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub stage_count: u32,
    pub stages: Vec<ScheduleStage>,
}

impl Schedule {
    /// Check stage count and percentage ranges, collecting every bad field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut fields = Vec::new();
        if self.stage_count as usize != self.stages.len() {
            fields.push("stageCount".to_string());
        }
        for (index, stage) in self.stages.iter().enumerate() {
            if !in_percent_range(stage.physical_percent) {
                fields.push(format!("stages[{index}].physicalPercent"));
            }
            if !in_percent_range(stage.financial_percent) {
                fields.push(format!("stages[{index}].financialPercent"));
            }
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields { fields })
        }
    }

    /// Cumulative planned physical progress through the given stage (1-based).
    pub fn cumulative_physical(&self, through_stage: u32) -> f64 {
        self.stages
            .iter()
            .filter(|s| s.stage <= through_stage)
            .map(|s| s.physical_percent)
            .sum()
    }

    /// Cumulative planned disbursement through the given stage (1-based).
    pub fn cumulative_financial(&self, through_stage: u32) -> f64 {
        self.stages
            .iter()
            .filter(|s| s.stage <= through_stage)
            .map(|s| s.financial_percent)
            .sum()
    }

    /// First stage whose cumulative physical target exceeds `progress`,
    /// i.e. the stage currently being worked on. `None` once all are met.
    pub fn current_stage(&self, progress: f64) -> Option<u32> {
        let mut cumulative = 0.0;
        for stage in &self.stages {
            cumulative += stage.physical_percent;
            if progress < cumulative {
                return Some(stage.stage);
            }
        }
        None
    }
}

fn in_percent_range(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}
