//! Solver-capability gating: QP-needing variants over an LP-only adapter.

mod common;

use common::{assert_close, simple_program};
use lshaped_clarabel::ClarabelSolver;
use lshaped_core::model::Model;
use lshaped_core::solver::{Solution, Solver, SolverError};
use lshaped_engine::{solve, SolverKind, SolverParams, TerminationStatus};

/// Clarabel with the quadratic capability masked off.
#[derive(Clone)]
struct LpOnly(ClarabelSolver);

impl LpOnly {
    fn new() -> Self {
        Self(ClarabelSolver::new())
    }
}

impl Solver for LpOnly {
    fn solve(&mut self, model: &Model) -> Result<Solution, SolverError> {
        if model.has_quadratic() {
            return Err(SolverError::QuadraticUnsupported { solver: "lp-only" });
        }
        self.0.solve(model)
    }

    fn supports_quadratic_objective(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "lp-only"
    }
}

#[test]
fn test_regularized_requires_qp() {
    let program = simple_program();
    let params = SolverParams::new().with_initial_point(vec![0.0, 0.0]);
    let err = solve(&program, SolverKind::Rd, LpOnly::new(), params).unwrap_err();
    assert_eq!(err.code(), "ENGINE_NO_QP");
    let message = err.to_string();
    assert!(message.contains("regularized"));
    assert!(message.contains("lp-only"));
    assert!(message.contains("quadratic"));
}

#[test]
fn test_level_set_requires_qp_unless_linearized() {
    let program = simple_program();

    let params = SolverParams::new().with_initial_point(vec![0.0, 0.0]);
    let err = solve(&program, SolverKind::Lv, LpOnly::new(), params).unwrap_err();
    assert_eq!(err.code(), "ENGINE_NO_QP");
    assert!(err.to_string().contains("projection"));

    // The 1-norm projection keeps the whole run LP-only.
    let params = SolverParams::new()
        .with_initial_point(vec![0.0, 0.0])
        .with_linearize(true);
    let report = solve(&program, SolverKind::Lv, LpOnly::new(), params).unwrap();
    assert_eq!(report.status, TerminationStatus::Optimal);
    assert_close(report.objective, 8.0, 1e-5);
}

#[test]
fn test_plain_runs_on_lp_only_adapter() {
    let program = simple_program();
    let params = SolverParams::new().with_initial_point(vec![0.0, 0.0]);
    let report = solve(&program, SolverKind::Ls, LpOnly::new(), params).unwrap();
    assert_eq!(report.status, TerminationStatus::Optimal);
    assert_close(report.objective, 8.0, 1e-5);
}
