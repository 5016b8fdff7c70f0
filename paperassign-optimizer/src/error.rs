use crate::model::ModelSummary;
use paperassign_domain::PropertyViolation;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No assignment satisfies the constraints ({summary})")]
    Infeasible { summary: ModelSummary },
    #[error("No feasible assignment found within the {time_limit:?} time limit")]
    NoIncumbent { time_limit: Duration },
    #[error("Solver failed: {0}")]
    Solver(String),
    #[error(
        "Solver returned an assignment violating {} hard constraints (first: {})",
        .violations.len(),
        .violations.first().map(ToString::to_string).unwrap_or_default()
    )]
    InconsistentSolution { violations: Vec<PropertyViolation> },
}
