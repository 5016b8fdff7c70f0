use crate::{
    error::EngineError,
    model::{AssignmentModel, ConstraintSense},
};
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    solvers::{SolutionStatus, highs::highs},
    variable,
};
use std::{
    num::NonZeroUsize,
    thread,
    time::{Duration, Instant},
};
use tracing::debug;

/// Wall-clock ceiling used when nothing else is configured.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, PartialEq)]
pub struct SolveOptions {
    pub time_limit: Duration,
    /// Parallelism hint forwarded to the solver.
    pub threads: NonZeroUsize,
    pub verbose: bool,
    /// Relative MIP gap at which the solver may stop. `None` keeps the
    /// solver's own default.
    pub mip_rel_gap: Option<f64>,
    /// Resolved values above this count as selected.
    pub selection_threshold: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit: DEFAULT_TIME_LIMIT,
            threads: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            verbose: false,
            mip_rel_gap: None,
            selection_threshold: crate::extract::DEFAULT_SELECTION_THRESHOLD,
        }
    }
}

impl SolveOptions {
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_threads(mut self, threads: NonZeroUsize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_mip_rel_gap(mut self, gap: f64) -> Self {
        self.mip_rel_gap = Some(gap);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal, up to the relative MIP gap.
    Optimal,
    /// Stopped on the time limit with an incumbent.
    Feasible,
    Infeasible,
    /// Stopped on the time limit before any incumbent was found.
    NoSolution,
}

/// What the solver handed back: a status and one value per model variable.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverRun {
    pub status: SolveStatus,
    pub values: Vec<f64>,
    pub elapsed: Duration,
}

impl SolverRun {
    pub fn without_values(status: SolveStatus, elapsed: Duration) -> Self {
        Self {
            status,
            values: Vec::new(),
            elapsed,
        }
    }
}

/// The single blocking call into an external optimizer.
pub trait AssignmentSolver {
    fn solve(
        &self,
        model: &AssignmentModel,
        options: &SolveOptions,
    ) -> Result<SolverRun, EngineError>;
}

/// Maximizes the model with HiGHS through `good_lp`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HighsSolver;

impl AssignmentSolver for HighsSolver {
    fn solve(
        &self,
        model: &AssignmentModel,
        options: &SolveOptions,
    ) -> Result<SolverRun, EngineError> {
        let mut vars = ProblemVariables::new();
        let x: Vec<Variable> = (0..model.variable_count())
            .map(|_| vars.add(variable().binary()))
            .collect();

        let mut objective = Expression::with_capacity(x.len());
        for (&var, &score) in x.iter().zip(model.objective()) {
            if score != 0 {
                objective.add_mul(score as f64, var);
            }
        }

        let threads = i32::try_from(options.threads.get()).unwrap_or(i32::MAX);
        let mut problem = vars
            .maximise(objective)
            .using(highs)
            .set_verbose(options.verbose)
            .set_option("time_limit", options.time_limit.as_secs_f64())
            .set_option("threads", threads);
        if let Some(gap) = options.mip_rel_gap {
            problem = problem.set_option("mip_rel_gap", gap);
        }

        for constraint in model.constraints() {
            let mut lhs = Expression::with_capacity(constraint.variables.len());
            for &var in &constraint.variables {
                lhs.add_mul(1.0, x[var]);
            }
            let rhs = f64::from(constraint.rhs);
            problem = problem.with(match constraint.sense {
                ConstraintSense::Equal => lhs.eq(rhs),
                ConstraintSense::AtMost => lhs.leq(rhs),
                ConstraintSense::AtLeast => lhs.geq(rhs),
            });
        }

        debug!(
            "HiGHS: {} variables, {} constraints, {} threads, {:?} limit",
            x.len(),
            model.constraints().len(),
            threads,
            options.time_limit
        );

        let started = Instant::now();
        let solved = problem.solve();
        let elapsed = started.elapsed();

        match solved {
            Ok(solution) => {
                let values = x.iter().map(|&var| solution.value(var)).collect();
                Ok(SolverRun {
                    status: solved_status(solution.status()),
                    values,
                    elapsed,
                })
            }
            Err(err) => match failed_status(&err) {
                Some(status) => Ok(SolverRun::without_values(status, elapsed)),
                None => Err(EngineError::Solver(err.to_string())),
            },
        }
    }
}

/// A gap-limit stop is HiGHS finishing within its relative MIP gap, which it
/// reports even on runs that never came near the time limit.
fn solved_status(status: SolutionStatus) -> SolveStatus {
    match status {
        SolutionStatus::Optimal | SolutionStatus::GapLimit => SolveStatus::Optimal,
        SolutionStatus::TimeLimit => SolveStatus::Feasible,
    }
}

/// HiGHS stopping without a primal solution surfaces as `NoSolutionFound`.
fn failed_status(err: &ResolutionError) -> Option<SolveStatus> {
    match err {
        ResolutionError::Infeasible => Some(SolveStatus::Infeasible),
        ResolutionError::Other("NoSolutionFound") => Some(SolveStatus::NoSolution),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::optimal(SolutionStatus::Optimal, SolveStatus::Optimal)]
    #[case::within_gap(SolutionStatus::GapLimit, SolveStatus::Optimal)]
    #[case::time_limit(SolutionStatus::TimeLimit, SolveStatus::Feasible)]
    fn maps_solution_status(#[case] status: SolutionStatus, #[case] expected: SolveStatus) {
        assert_eq!(solved_status(status), expected);
    }

    #[rstest]
    #[case::infeasible(ResolutionError::Infeasible, Some(SolveStatus::Infeasible))]
    #[case::no_incumbent(
        ResolutionError::Other("NoSolutionFound"),
        Some(SolveStatus::NoSolution)
    )]
    #[case::unbounded(ResolutionError::Unbounded, None)]
    #[case::empty_model(ResolutionError::Other("ModelEmpty"), None)]
    fn maps_resolution_errors(
        #[case] err: ResolutionError,
        #[case] expected: Option<SolveStatus>,
    ) {
        assert_eq!(failed_status(&err), expected);
    }
}
