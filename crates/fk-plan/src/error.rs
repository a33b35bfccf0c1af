//! Error types for fk-plan

use crate::validate::Violation;
use thiserror::Error;

/// Planning error type
///
/// These use the `P` prefix; validator findings carry their own `V` codes
/// and are wrapped in [`PlanError::InternalPlanInconsistency`].
#[derive(Error, Debug)]
pub enum PlanError {
    /// P001: A cycle cannot be populated without deferred constraints
    #[error("[P001] Unsatisfiable cycle at '{table}': column(s) {columns} cannot be left NULL on insert (cycle: {cycle}). Make them NULLable or give them a default")]
    UnsatisfiableCycle {
        table: String,
        columns: String,
        cycle: String,
    },

    /// P002: The validator rejected a plan produced by the builder
    #[error("[P002] Internal plan inconsistency: {}", summarize(.violations))]
    InternalPlanInconsistency { violations: Vec<Violation> },

    /// P003: A plan was requested for a table the schema does not contain
    #[error("[P003] Unknown table '{table}'")]
    UnknownTable { table: String },

    /// P004: Core error propagation
    #[error("[P004] Core error: {0}")]
    Core(#[from] fk_core::CoreError),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for PlanError
pub type PlanResult<T> = Result<T, PlanError>;
