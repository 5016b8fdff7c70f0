use crate::{
    builder::ModelBuilder,
    error::EngineError,
    extract::extract_assignment,
    model::ModelSummary,
    solver::{AssignmentSolver, HighsSolver, SolveOptions, SolveStatus},
};
use paperassign_domain::{Assignment, AssignmentAudit, AssignmentInstance, PropertyViolation};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct AssignmentOutcome {
    pub assignment: Assignment,
    /// `Optimal` or `Feasible`; the other statuses are reported as errors.
    pub status: SolveStatus,
    /// Sum of scores over the selected pairs.
    pub objective: i64,
    pub summary: ModelSummary,
    pub elapsed: Duration,
}

impl AssignmentOutcome {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

/// Builds the model, runs the solver once and extracts the assignment.
///
/// Ties between equally scoring assignments are left to the solver, so two
/// runs may return different assignments with the same objective.
pub struct AssignmentEngine<S = HighsSolver> {
    solver: S,
    options: SolveOptions,
}

impl AssignmentEngine<HighsSolver> {
    pub fn new(options: SolveOptions) -> Self {
        Self::with_solver(HighsSolver, options)
    }
}

impl Default for AssignmentEngine<HighsSolver> {
    fn default() -> Self {
        Self::new(SolveOptions::default())
    }
}

impl<S: AssignmentSolver> AssignmentEngine<S> {
    pub fn with_solver(solver: S, options: SolveOptions) -> Self {
        Self { solver, options }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    pub fn assign(&self, instance: &AssignmentInstance) -> Result<AssignmentOutcome, EngineError> {
        let model = ModelBuilder::new(instance).build();
        let summary = model.summary();
        debug!("Built assignment model: {summary}");
        info!(
            "Solving {} papers x {} reviewers",
            instance.papers().len(),
            instance.reviewers().len()
        );

        let run = self.solver.solve(&model, &self.options)?;
        match run.status {
            SolveStatus::Infeasible => return Err(EngineError::Infeasible { summary }),
            SolveStatus::NoSolution => {
                return Err(EngineError::NoIncumbent {
                    time_limit: self.options.time_limit,
                });
            }
            SolveStatus::Optimal | SolveStatus::Feasible => {}
        }

        let assignment = extract_assignment(&model, &run.values, self.options.selection_threshold);
        let audit = AssignmentAudit::run(instance, &assignment);
        let hard: Vec<PropertyViolation> = audit.hard_violations().cloned().collect();
        if !hard.is_empty() {
            let uncovered = hard
                .iter()
                .any(|violation| matches!(violation, PropertyViolation::Coverage { .. }));
            if run.status == SolveStatus::Feasible && uncovered {
                return Err(EngineError::NoIncumbent {
                    time_limit: self.options.time_limit,
                });
            }
            return Err(EngineError::InconsistentSolution { violations: hard });
        }
        for violation in &audit.violations {
            warn!("{violation}");
        }

        if run.status == SolveStatus::Feasible {
            warn!(
                "Time limit reached after {:?}; using best assignment found (objective {}), optimality not proven",
                run.elapsed, audit.objective
            );
        } else {
            info!(
                "Optimal assignment found in {:?} (objective {})",
                run.elapsed, audit.objective
            );
        }

        Ok(AssignmentOutcome {
            assignment,
            status: run.status,
            objective: audit.objective,
            summary,
            elapsed: run.elapsed,
        })
    }
}
