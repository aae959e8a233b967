#![allow(clippy::float_cmp)]

use lshaped_core::model::{Bounds, Model, Variable};
use lshaped_core::solver::{SolveStatus, Solver};
use lshaped_highs::HighsSolver;

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

    let mut solver = HighsSolver::new();
    let solution = solver.solve(&model).expect("solve failed");

    assert_eq!(solution.status, SolveStatus::Optimal);
    assert!((solution.objective - 10.0).abs() < 1e-6);
    assert!((solution.get_primal(x).unwrap() - 5.0).abs() < 1e-6);
    // Shadow price of the demand row.
    assert!((solution.get_row_dual(0).unwrap() - 2.0).abs() < 1e-6);
}

#[test]
fn test_infeasible_without_certificate() {
    let mut model = Model::new();
    model
        .add_variable(Variable::new(Bounds::new(0.0, 2.0), 1.0))
        .unwrap();
    model
        .add_row(vec![0], vec![1.0], Bounds::at_least(4.0))
        .unwrap();

    let mut solver = HighsSolver::new();
    let solution = solver.solve(&model).expect("solve failed");
    assert_eq!(solution.status, SolveStatus::Infeasible);
    assert!(solution.dual_ray.is_none());
}

#[test]
fn test_quadratic_rejected() {
    let mut model = Model::new();
    let x = model
        .add_variable(Variable::new(Bounds::free(), 1.0))
        .unwrap();
    model.set_quadratic(x, 1.0).unwrap();

    let mut solver = HighsSolver::new();
    assert!(!solver.supports_quadratic_objective());
    let err = solver.solve(&model).unwrap_err();
    assert!(err.to_string().contains("SOLVER_NO_QP"));
    assert!(err.to_string().contains("highs"));
}

#[test]
fn test_empty_model_rejected() {
    let model = Model::new();
    let mut solver = HighsSolver::new();
    let err = solver.solve(&model).unwrap_err();
    assert!(err.to_string().contains("SOLVER_EMPTY_MODEL"));
}
