//! Extraction boundary: structured data read from contract documents.
//!
//! The extraction service (a generative model reading PDFs and spreadsheets)
//! is an external collaborator behind [`DocumentExtractor`]. Its untyped JSON
//! is validated here into an [`Extraction`] before it reaches any project;
//! a result that fails validation is rejected as a whole, with every failing
//! field listed.
//!
//! Extraction calls are slow and may be superseded (the user closes the
//! import dialog). [`ImportGate`] hands out tickets so a late result from a
//! cancelled import is dropped instead of applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::budget::{BudgetTemplate, IncidenceBalance};
use crate::error::{ExtractError, ValidationError};
use crate::project::{Address, ProjectData, ProjectDetails};
use crate::schedule::Schedule;
use crate::unit::HousingUnits;

pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// The external document-reading service.
pub trait DocumentExtractor: Send + Sync {
    /// Project name, costs, address and parties.
    fn project_metadata(&self, file: &[u8]) -> ExtractResult<Value>;
    /// A budget template (categories with weighted line items).
    fn budget(&self, file: &[u8]) -> ExtractResult<Value>;
    /// A budget template plus its physical/financial schedule.
    fn budget_with_schedule(&self, file: &[u8]) -> ExtractResult<Value>;
}

/// Project metadata as returned by the extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub name: String,
    pub cost_of_works: f64,
    #[serde(default)]
    pub total_investment: Option<f64>,
    pub address: ExtractedAddress,
    pub contractor: String,
    pub client: String,
    pub unit_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedAddress {
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl ProjectMetadata {
    /// Turn validated metadata into creation data on the default template.
    pub fn into_project_data(self) -> ProjectData {
        ProjectData {
            name: self.name,
            cost_of_works: self.cost_of_works,
            details: ProjectDetails {
                address: Some(Address {
                    street: self.address.street,
                    number: self.address.number,
                    district: self.address.district,
                    city: self.address.city,
                    state: self.address.state,
                    postal_code: self.address.postal_code,
                }),
                contractor: Some(self.contractor),
                client: Some(self.client),
            },
            budget: None,
            units: HousingUnits::numbered(self.unit_count as usize),
            schedule: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BudgetWithScheduleShape {
    budget: BudgetTemplate,
    schedule: Schedule,
}

/// Which extraction function produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    ProjectMetadata,
    Budget,
    BudgetWithSchedule,
}

/// A validated extraction result.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    ProjectMetadata(ProjectMetadata),
    Budget(BudgetTemplate),
    BudgetWithSchedule {
        budget: BudgetTemplate,
        schedule: Schedule,
    },
}

/// Run one extraction function and validate its output.
pub fn extract(
    extractor: &dyn DocumentExtractor,
    kind: ExtractionKind,
    file: &[u8],
) -> ExtractResult<Extraction> {
    let raw = match kind {
        ExtractionKind::ProjectMetadata => extractor.project_metadata(file)?,
        ExtractionKind::Budget => extractor.budget(file)?,
        ExtractionKind::BudgetWithSchedule => extractor.budget_with_schedule(file)?,
    };
    let extraction = validate(kind, raw)?;
    tracing::info!(?kind, bytes = file.len(), "document extracted");
    Ok(extraction)
}

/// Validate untyped extraction output into its typed shape.
pub fn validate(kind: ExtractionKind, raw: Value) -> ExtractResult<Extraction> {
    match kind {
        ExtractionKind::ProjectMetadata => {
            let fields = metadata_field_errors(&raw);
            if !fields.is_empty() {
                return Err(ValidationError::Fields { fields }.into());
            }
            let metadata: ProjectMetadata = from_value(raw)?;
            Ok(Extraction::ProjectMetadata(metadata))
        }
        ExtractionKind::Budget => {
            let budget: BudgetTemplate = from_value(raw)?;
            validate_budget(&budget)?;
            Ok(Extraction::Budget(budget))
        }
        ExtractionKind::BudgetWithSchedule => {
            let shape: BudgetWithScheduleShape = from_value(raw)?;
            validate_budget(&shape.budget)?;
            shape.schedule.validate()?;
            Ok(Extraction::BudgetWithSchedule {
                budget: shape.budget,
                schedule: shape.schedule,
            })
        }
    }
}

fn from_value<T: serde::de::DeserializeOwned>(raw: Value) -> ExtractResult<T> {
    serde_json::from_value(raw).map_err(|e| ExtractError::Malformed {
        message: e.to_string(),
    })
}

/// Brazilian CEP, with or without the hyphen.
static RE_POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}-?\d{3}$").unwrap());

fn non_empty_str(value: &Value, pointer: &str) -> bool {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn positive_number(value: &Value, pointer: &str) -> bool {
    value
        .pointer(pointer)
        .and_then(Value::as_f64)
        .is_some_and(|n| n.is_finite() && n > 0.0)
}

/// Collect every required metadata field that is missing or malformed.
fn metadata_field_errors(raw: &Value) -> Vec<String> {
    let mut fields = Vec::new();
    for (pointer, name) in [
        ("/name", "name"),
        ("/contractor", "contractor"),
        ("/client", "client"),
        ("/address/street", "address.street"),
        ("/address/city", "address.city"),
        ("/address/state", "address.state"),
    ] {
        if !non_empty_str(raw, pointer) {
            fields.push(name.to_string());
        }
    }
    if !positive_number(raw, "/costOfWorks") {
        fields.push("costOfWorks".to_string());
    }
    if raw.get("totalInvestment").is_some_and(|v| !v.is_null())
        && !positive_number(raw, "/totalInvestment")
    {
        fields.push("totalInvestment".to_string());
    }
    let postal_ok = raw
        .pointer("/address/postalCode")
        .and_then(Value::as_str)
        .is_some_and(|code| RE_POSTAL_CODE.is_match(code.trim()));
    if !postal_ok {
        fields.push("address.postalCode".to_string());
    }
    if raw.get("unitCount").and_then(Value::as_u64).is_none_or(|n| n > u32::MAX as u64) {
        fields.push("unitCount".to_string());
    }
    fields
}

fn validate_budget(budget: &BudgetTemplate) -> Result<(), ValidationError> {
    budget.validate()?;
    if budget.balance() != IncidenceBalance::Balanced {
        tracing::warn!(
            total = budget.total_incidence(),
            balance = %budget.balance(),
            "extracted budget does not sum to 100%"
        );
    }
    Ok(())
}

/// Hands out tickets so superseded extraction results can be discarded.
#[derive(Debug, Default)]
pub struct ImportGate {
    generation: AtomicU64,
}

/// Proof that an import was started at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportTicket(u64);

impl ImportGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new import; any earlier ticket becomes stale.
    pub fn begin(&self) -> ImportTicket {
        ImportTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Abandon the current import.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Return the result only if its ticket is still current.
    pub fn accept<T>(&self, ticket: ImportTicket, result: T) -> Option<T> {
        if self.generation.load(Ordering::SeqCst) == ticket.0 {
            Some(result)
        } else {
            tracing::debug!(ticket = ticket.0, "discarding superseded extraction result");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata_json() -> Value {
        json!({
            "name": "Residencial Aurora",
            "costOfWorks": 1_250_000.0,
            "address": {
                "street": "Rua das Flores",
                "number": "120",
                "city": "Campinas",
                "state": "SP",
                "postalCode": "13010-050"
            },
            "contractor": "Construtora Alfa",
            "client": "Caixa",
            "unitCount": 12
        })
    }

    struct CannedExtractor;
    impl DocumentExtractor for CannedExtractor {
        fn project_metadata(&self, _file: &[u8]) -> ExtractResult<Value> {
            Ok(metadata_json())
        }
        fn budget(&self, _file: &[u8]) -> ExtractResult<Value> {
            Ok(serde_json::to_value(BudgetTemplate::default_housing()).unwrap())
        }
        fn budget_with_schedule(&self, _file: &[u8]) -> ExtractResult<Value> {
            Err(ExtractError::Service {
                message: "quota exceeded".into(),
            })
        }
    }

    #[test]
    fn valid_metadata_becomes_project_data() {
        let Extraction::ProjectMetadata(meta) =
            extract(&CannedExtractor, ExtractionKind::ProjectMetadata, b"%PDF").unwrap()
        else {
            panic!("expected metadata");
        };
        let data = meta.into_project_data();
        assert_eq!(data.units.len(), 12);
        assert_eq!(
            data.details.address.unwrap().postal_code,
            "13010-050"
        );
        assert!(data.budget.is_none());
    }

    #[test]
    fn metadata_lists_every_bad_field() {
        let mut raw = metadata_json();
        raw["name"] = json!("");
        raw["costOfWorks"] = json!(-10);
        raw["address"]["postalCode"] = json!("1301");
        raw["unitCount"] = json!(-3);
        let err = validate(ExtractionKind::ProjectMetadata, raw).unwrap_err();
        let ExtractError::Validation(ValidationError::Fields { fields }) = err else {
            panic!("expected field list, got {err:?}");
        };
        assert_eq!(
            fields,
            vec!["name", "costOfWorks", "address.postalCode", "unitCount"]
        );
    }

    #[test]
    fn postal_code_accepts_both_spellings() {
        assert!(RE_POSTAL_CODE.is_match("13010-050"));
        assert!(RE_POSTAL_CODE.is_match("13010050"));
        assert!(!RE_POSTAL_CODE.is_match("1301-0050"));
    }

    #[test]
    fn budget_extraction_round_trips_default_template() {
        let extraction = extract(&CannedExtractor, ExtractionKind::Budget, b"xlsx").unwrap();
        assert_eq!(
            extraction,
            Extraction::Budget(BudgetTemplate::default_housing())
        );
    }

    #[test]
    fn budget_with_duplicate_ids_is_rejected() {
        let raw = json!([
            {"id": "1", "name": "A", "subItems": [{"id": "1.1", "name": "x", "incidence": 50, "unit": "un"}]},
            {"id": "2", "name": "B", "subItems": [{"id": "1.1", "name": "y", "incidence": 50, "unit": "un"}]}
        ]);
        let err = validate(ExtractionKind::Budget, raw).unwrap_err();
        assert!(err.to_string().contains("categories[1].subItems[0].id"));
    }

    #[test]
    fn schedule_shape_is_validated() {
        let raw = json!({
            "budget": [{"id": "1", "name": "A", "subItems": [{"id": "1.1", "name": "x", "incidence": 100, "unit": "un"}]}],
            "schedule": {"stageCount": 2, "stages": [{"stage": 1, "physicalPercent": 100, "financialPercent": 100}]}
        });
        let err = validate(ExtractionKind::BudgetWithSchedule, raw).unwrap_err();
        assert!(err.to_string().contains("stageCount"));
    }

    #[test]
    fn service_failure_propagates() {
        let err = extract(&CannedExtractor, ExtractionKind::BudgetWithSchedule, b"").unwrap_err();
        assert!(matches!(err, ExtractError::Service { .. }));
    }

    #[test]
    fn cancelled_import_result_is_discarded() {
        let gate = ImportGate::new();
        let first = gate.begin();
        gate.cancel();
        assert_eq!(gate.accept(first, "late"), None);

        let second = gate.begin();
        let third = gate.begin();
        assert_eq!(gate.accept(second, 1), None);
        assert_eq!(gate.accept(third, 2), Some(2));
    }
}
