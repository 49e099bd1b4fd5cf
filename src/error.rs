//! Rich diagnostic error types for the obra tracker.
//!
//! Each boundary defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong
//! and how to fix it. Arithmetic edge cases of the aggregation engine are
//! defined behaviour and never surface here; neither do unresolved names in
//! assistant updates, which are reported in the mutation summary instead.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::paths::PathError;

/// Top-level error type for the obra tracker.
///
/// Each variant wraps a boundary-specific error, preserving the full
/// diagnostic chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum ObraError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

// ---------------------------------------------------------------------------
// Budget template errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BudgetError {
    #[error("budget category not found: \"{id}\"")]
    #[diagnostic(
        code(obra::budget::category_not_found),
        help("List the template categories with `obra project show <id>` and use one of their ids.")
    )]
    CategoryNotFound { id: String },

    #[error("budget item not found: \"{id}\"")]
    #[diagnostic(
        code(obra::budget::item_not_found),
        help("Item ids are unique across the whole template. Check the id printed by `obra project show`.")
    )]
    ItemNotFound { id: String },

    #[error("duplicate budget id: \"{id}\"")]
    #[diagnostic(
        code(obra::budget::duplicate_id),
        help("Category ids and item ids must be unique. Pick an id that is not already used.")
    )]
    DuplicateId { id: String },

    #[error("invalid incidence {value} for item \"{id}\"")]
    #[diagnostic(
        code(obra::budget::invalid_incidence),
        help("Incidence is a percentage weight and must be a finite number between 0 and 100.")
    )]
    InvalidIncidence { id: String, value: f64 },
}

// ---------------------------------------------------------------------------
// Housing unit errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum UnitError {
    #[error("housing unit not found: \"{id}\"")]
    #[diagnostic(
        code(obra::unit::not_found),
        help("Housing units are addressed by id. Check the ids printed by `obra project show`.")
    )]
    NotFound { id: String },

    #[error("duplicate housing unit id: \"{id}\"")]
    #[diagnostic(
        code(obra::unit::duplicate_id),
        help("Each housing unit needs its own id; progress values are reconciled by id.")
    )]
    DuplicateId { id: String },
}

// ---------------------------------------------------------------------------
// Input validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("missing or invalid fields: {}", .fields.join(", "))]
    #[diagnostic(
        code(obra::validation::fields),
        help("Nothing was applied. Fix every listed field and submit the whole input again.")
    )]
    Fields { fields: Vec<String> },

    #[error("progress value {value} is outside 0..=100")]
    #[diagnostic(
        code(obra::validation::progress_range),
        help("Progress is a completion percentage; use a finite value between 0 and 100.")
    )]
    ProgressOutOfRange { value: f64 },

    #[error("total cost {value} is not a positive amount")]
    #[diagnostic(
        code(obra::validation::cost),
        help("The total cost of works must be a finite amount greater than zero.")
    )]
    InvalidCost { value: f64 },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(obra::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(obra::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             If the problem persists, restore the latest backup into a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(obra::store::serde),
        help(
            "Failed to serialize or deserialize a project document. \
             This usually means the stored format changed between versions."
        )
    )]
    Serialization { message: String },

    #[error("project not found: {id}")]
    #[diagnostic(
        code(obra::store::not_found),
        help("List the projects you can access with `obra project list`.")
    )]
    NotFound { id: String },

    #[error("project id {id} leaves no room for further ids")]
    #[diagnostic(
        code(obra::store::id_exhausted),
        help("Edit the backup so the project id has a smaller number, then import it again.")
    )]
    IdExhausted { id: String },
}

// ---------------------------------------------------------------------------
// Extraction boundary errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    #[error("document extraction failed: {message}")]
    #[diagnostic(
        code(obra::extract::service),
        help("The extraction service could not read the document. Try a clearer scan or a text PDF.")
    )]
    Service { message: String },

    #[error("extraction returned malformed data: {message}")]
    #[diagnostic(
        code(obra::extract::malformed),
        help("The extracted JSON does not have the expected shape. Nothing was imported.")
    )]
    Malformed { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),
}

// ---------------------------------------------------------------------------
// Backup errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BackupError {
    #[error("backup is not valid JSON: {message}")]
    #[diagnostic(
        code(obra::backup::parse),
        help("Backup files are produced by `obra backup export`. Check the file was not truncated.")
    )]
    Parse { message: String },

    #[error("backup root must be an array of projects")]
    #[diagnostic(
        code(obra::backup::not_array),
        help("A backup file is a JSON array with one object per project.")
    )]
    NotArray,

    #[error("backup entry {index} is not a project record: {reason}")]
    #[diagnostic(
        code(obra::backup::invalid_entry),
        help(
            "Every entry needs a string `id`, string `name`, string `created_at` \
             and a numeric `cost_of_works`. Nothing was imported."
        )
    )]
    InvalidEntry { index: usize, reason: String },

    #[error("backup entry {index} would overwrite project {id}, which you cannot access")]
    #[diagnostic(
        code(obra::backup::foreign_project),
        help(
            "A project with this id already exists and belongs to someone else. \
             Import as its owner, or remove the entry from the backup. Nothing was imported."
        )
    )]
    ForeignProject { index: usize, id: String },
}

// ---------------------------------------------------------------------------
// Assistant tool errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("tool not found: \"{name}\"")]
    #[diagnostic(
        code(obra::tool::not_found),
        help("List the registered tools with `ToolRegistry::signatures()`.")
    )]
    NotFound { name: String },

    #[error("tool execution failed: {tool_name}: {message}")]
    #[diagnostic(
        code(obra::tool::execution),
        help("The tool rejected its input. Check the parameter values sent by the assistant.")
    )]
    Execution { tool_name: String, message: String },
}

/// Convenience alias for functions returning obra results.
pub type ObraResult<T> = std::result::Result<T, ObraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_error_converts_to_obra_error() {
        let err: ObraError = BudgetError::ItemNotFound { id: "9.9".into() }.into();
        assert!(matches!(err, ObraError::Budget(_)));
        assert!(err.to_string().contains("9.9"));
    }

    #[test]
    fn validation_error_lists_every_field() {
        let err = ValidationError::Fields {
            fields: vec!["name".into(), "postal_code".into()],
        };
        assert_eq!(
            err.to_string(),
            "missing or invalid fields: name, postal_code"
        );
    }

    #[test]
    fn store_error_carries_diagnostic_code() {
        let err = StoreError::NotFound { id: "p-1".into() };
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("obra::store::not_found"));
    }
}
