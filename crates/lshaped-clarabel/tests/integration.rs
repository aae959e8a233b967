#![allow(clippy::float_cmp)]

use lshaped_clarabel::ClarabelSolver;
use lshaped_core::model::{Bounds, Model, Variable};
use lshaped_core::solver::{SolveStatus, Solver};

const TOL: f64 = 1e-6;

/// minimize 2x + 3y subject to x + y ≥ 5, x, y ≥ 0.
#[test]
fn test_simple_lp() {
    let mut model = Model::new();
    let x = model
        .add_variable(Variable::new(Bounds::at_least(0.0), 2.0))
        .unwrap();
    let y = model
        .add_variable(Variable::new(Bounds::at_least(0.0), 3.0))
        .unwrap();
    model
        .add_row(
            vec![x as u32, y as u32],
            vec![1.0, 1.0],
            Bounds::at_least(5.0),
        )
        .unwrap();

    let mut solver = ClarabelSolver::new();
    let solution = solver.solve(&model).expect("solve failed");

    assert_eq!(solution.status, SolveStatus::Optimal);
    assert!((solution.objective - 10.0).abs() < TOL);
    assert!((solution.get_primal(x).unwrap() - 5.0).abs() < 1e-5);
    assert!(solution.get_primal(y).unwrap().abs() < 1e-5);
    // Shadow price of the ≥ row: tightening the demand by one costs 2.
    assert!((solution.get_row_dual(0).unwrap() - 2.0).abs() < 1e-5);
}

/// Equality row dual: minimize x + 2y subject to x + y = 3, 0 ≤ x,y ≤ 3.
#[test]
fn test_equality_dual() {
    let mut model = Model::new();
    model
        .add_variable(Variable::new(Bounds::new(0.0, 3.0), 1.0))
        .unwrap();
    model
        .add_variable(Variable::new(Bounds::new(0.0, 3.0), 2.0))
        .unwrap();
    model
        .add_row(vec![0, 1], vec![1.0, 1.0], Bounds::fixed(3.0))
        .unwrap();

    let mut solver = ClarabelSolver::new();
    let solution = solver.solve(&model).expect("solve failed");

    assert_eq!(solution.status, SolveStatus::Optimal);
    assert!((solution.objective - 3.0).abs() < 1e-5);
    // All of the requirement lands on the cheap variable.
    assert!((solution.get_row_dual(0).unwrap() - 1.0).abs() < 1e-5);
}

/// ≤-row dual: minimize −y subject to y ≤ 5, y ≥ 0.
#[test]
fn test_less_equal_dual() {
    let mut model = Model::new();
    model
        .add_variable(Variable::new(Bounds::at_least(0.0), -1.0))
        .unwrap();
    model
        .add_row(vec![0], vec![1.0], Bounds::at_most(5.0))
        .unwrap();

    let mut solver = ClarabelSolver::new();
    let solution = solver.solve(&model).expect("solve failed");

    assert_eq!(solution.status, SolveStatus::Optimal);
    assert!((solution.objective + 5.0).abs() < 1e-5);
    // Relaxing the cap by one improves the objective by one.
    assert!((solution.get_row_dual(0).unwrap() + 1.0).abs() < 1e-5);
}

/// Diagonal QP: minimize ½(x − 2)² expressed as ½x² − 2x.
#[test]
fn test_quadratic_diagonal() {
    let mut model = Model::new();
    let x = model
        .add_variable(Variable::new(Bounds::free(), -2.0))
        .unwrap();
    model.set_quadratic(x, 1.0).unwrap();
    // Anchor row keeping the problem constrained: x ≤ 10.
    model
        .add_row(vec![0], vec![1.0], Bounds::at_most(10.0))
        .unwrap();

    let mut solver = ClarabelSolver::new();
    let solution = solver.solve(&model).expect("solve failed");

    assert_eq!(solution.status, SolveStatus::Optimal);
    assert!((solution.get_primal(x).unwrap() - 2.0).abs() < 1e-5);
    assert!((solution.objective + 2.0).abs() < 1e-5);
    assert!(solver.supports_quadratic_objective());
}

/// Infeasible system y ∈ [0, 2], y ≥ 4 yields a usable certificate whose
/// normalized ray points the right way: raising the requirement hurts.
#[test]
fn test_infeasibility_certificate() {
    let mut model = Model::new();
    model
        .add_variable(Variable::new(Bounds::new(0.0, 2.0), 1.0))
        .unwrap();
    model
        .add_row(vec![0], vec![1.0], Bounds::at_least(4.0))
        .unwrap();

    let mut solver = ClarabelSolver::new();
    let solution = solver.solve(&model).expect("solve failed");

    assert_eq!(solution.status, SolveStatus::Infeasible);
    assert!(solution.objective > 0.0, "measure must be positive");
    let ray = solution.dual_ray.expect("certificate missing");
    assert!(
        ray[0] < 0.0,
        "∂V/∂rhs must be negative for the binding ≥ row, got {}",
        ray[0]
    );
    // The certificate vanishes exactly where the system becomes feasible:
    // measure / |ray| = distance from rhs 4 down to the attainable 2.
    assert!((solution.objective / ray[0].abs() - 2.0).abs() < 1e-4);
}

/// minimize −x with x ≥ 0 unbounded above.
#[test]
fn test_unbounded() {
    let mut model = Model::new();
    model
        .add_variable(Variable::new(Bounds::at_least(0.0), -1.0))
        .unwrap();
    // A slack row that never binds, so the model still has a constraint.
    model
        .add_row(vec![0], vec![1.0], Bounds::at_least(-1.0))
        .unwrap();

    let mut solver = ClarabelSolver::new();
    let solution = solver.solve(&model).expect("solve failed");
    assert_eq!(solution.status, SolveStatus::Unbounded);
}

#[test]
fn test_empty_model_rejected() {
    let model = Model::new();
    let mut solver = ClarabelSolver::new();
    let err = solver.solve(&model).unwrap_err();
    assert!(err.to_string().contains("SOLVER_EMPTY_MODEL"));
}
