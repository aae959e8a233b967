//! L-shaped (Benders) decomposition engines for two-stage stochastic
//! linear programs.
//!
//! A first-stage decision x minimizes `c·x + E[Q(x, ξ)]` where `Q` is the
//! value of a scenario LP. The engines approximate `E[Q]` from below with
//! optimality cuts on auxiliary θ variables, add feasibility cuts when a
//! scenario is infeasible at the current x, and stabilize the iteration
//! with regularized, trust-region or level-set localization. A distributed
//! driver overlaps subproblem evaluation with master updates.
//!
//! ```no_run
//! use lshaped_engine::{solve, SolverKind, SolverParams, StochasticProgram};
//! # fn demo<S: lshaped_core::Solver + Clone + Send + 'static>(
//! #     program: StochasticProgram,
//! #     adapter: S,
//! # ) -> Result<(), lshaped_engine::EngineError> {
//! let report = solve(&program, SolverKind::Tr, adapter, SolverParams::new())?;
//! println!("{}: {}", report.status, report.objective);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extensive;
pub mod program;
pub mod progress;

mod engine;
mod localization;
mod master;
mod parallel;
mod state;

pub use config::{Crash, LocalizationKind, SolverKind, SolverParams};
pub use error::{EngineError, Report, ShapeError, TerminationStatus};
pub use extensive::{expected_value_model, extensive_form};
pub use program::{Scenario, StochasticProgram};
pub use progress::{LogSink, NullSink, ProgressSink, ProgressUpdate};

pub use lshaped_core::subproblem::Linkage;

use lshaped_core::solver::Solver;

/// Drive a program to termination with the chosen engine.
///
/// The adapter is cloned per owning entity (master, projection, one per
/// subproblem / worker); models never cross those boundaries.
pub fn solve<S: Solver + Clone + Send + 'static>(
    program: &StochasticProgram,
    kind: SolverKind,
    solver: S,
    params: SolverParams,
) -> Result<Report, EngineError> {
    if kind.is_distributed() {
        parallel::solve_distributed(program, kind, solver, &params)
    } else {
        engine::solve_serial(program, kind, solver, &params)
    }
}
