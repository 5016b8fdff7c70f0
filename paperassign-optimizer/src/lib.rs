#![warn(clippy::uninlined_format_args)]

mod builder;
mod engine;
mod error;
mod extract;
mod model;
mod solver;

pub use builder::{
    ConstraintBuilder, CountryConflictCap, CountryDiversityCap, ExactCoverage, LastMinuteCap,
    ModelBuilder, NoBidTierCap, ReviewerLoadBounds, default_builders,
};
pub use engine::{AssignmentEngine, AssignmentOutcome};
pub use error::EngineError;
pub use extract::{DEFAULT_SELECTION_THRESHOLD, extract_assignment};
pub use model::{
    AssignmentModel, ConstraintClass, ConstraintSense, LinearConstraint, ModelSummary,
    VariableLayout,
};
pub use solver::{AssignmentSolver, HighsSolver, SolveOptions, SolveStatus, SolverRun};
