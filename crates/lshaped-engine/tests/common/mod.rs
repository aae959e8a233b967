//! Shared test programs.
//!
//! `simple` and `infeasible` have hand-checked optima; `farmer` is the
//! classic three-crop planting problem whose extensive form optimizes to
//! −108390. The extensive form solved directly on the adapter is the
//! reference oracle for parity checks.
#![allow(dead_code)]

use lshaped_clarabel::ClarabelSolver;
use lshaped_core::model::{Bounds, Model, Variable};
use lshaped_core::solver::Solver;
use lshaped_engine::{extensive_form, Linkage, Scenario, StochasticProgram};

/// Two scenarios, two first-stage variables; optimum 8.0 at x = (4, 0).
///
/// minimize 2x₁ + 3x₂ + E[5y] with x ∈ [0, 5]², x₁ + x₂ ≥ 1,
/// y ∈ [0, 10], y ≥ d − x₁ − x₂, d ∈ {2, 4} equiprobable.
pub fn simple_program() -> StochasticProgram {
    let mut first = Model::new();
    first
        .add_variable(Variable::new(Bounds::new(0.0, 5.0), 2.0))
        .unwrap();
    first
        .add_variable(Variable::new(Bounds::new(0.0, 5.0), 3.0))
        .unwrap();
    first
        .add_row(vec![0, 1], vec![1.0, 1.0], Bounds::at_least(1.0))
        .unwrap();

    let mut program = StochasticProgram::new(first);
    for demand in [2.0, 4.0] {
        let mut sub = Model::new();
        sub.add_variable(Variable::new(Bounds::new(0.0, 10.0), 5.0))
            .unwrap();
        let row = sub
            .add_row(vec![0], vec![1.0], Bounds::at_least(demand))
            .unwrap();
        program.add_scenario(Scenario::new(
            0.5,
            sub,
            vec![
                Linkage {
                    row,
                    column: 0,
                    coefficient: 1.0,
                },
                Linkage {
                    row,
                    column: 1,
                    coefficient: 1.0,
                },
            ],
        ));
    }
    program
}

/// The classic farmer problem: three crops, three yield scenarios,
/// optimum −108390 at x = (170, 80, 250).
pub fn farmer_program() -> StochasticProgram {
    let mut first = Model::new();
    for cost in [150.0, 230.0, 260.0] {
        first
            .add_variable(Variable::new(Bounds::at_least(0.0), cost))
            .unwrap();
    }
    first
        .add_row(vec![0, 1, 2], vec![1.0, 1.0, 1.0], Bounds::at_most(500.0))
        .unwrap();

    let mut program = StochasticProgram::new(first);
    for yield_factor in [1.2, 1.0, 0.8] {
        let mut sub = Model::new();
        // Purchases y₁ (wheat), y₂ (corn); sales w₁ (wheat), w₂ (corn),
        // w₃ (beets at the quota price, capped), w₄ (beets beyond quota).
        let y1 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), 238.0))
            .unwrap();
        let y2 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), 210.0))
            .unwrap();
        let w1 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), -170.0))
            .unwrap();
        let w2 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), -150.0))
            .unwrap();
        let w3 = sub
            .add_variable(Variable::new(Bounds::new(0.0, 6000.0), -36.0))
            .unwrap();
        let w4 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), -10.0))
            .unwrap();

        // Wheat requirement: 2.5ξ·x₁ + y₁ − w₁ ≥ 200.
        let wheat = sub
            .add_row(
                vec![y1 as u32, w1 as u32],
                vec![1.0, -1.0],
                Bounds::at_least(200.0),
            )
            .unwrap();
        // Corn requirement: 3ξ·x₂ + y₂ − w₂ ≥ 240.
        let corn = sub
            .add_row(
                vec![y2 as u32, w2 as u32],
                vec![1.0, -1.0],
                Bounds::at_least(240.0),
            )
            .unwrap();
        // Beet balance: w₃ + w₄ ≤ 20ξ·x₃.
        let beets = sub
            .add_row(
                vec![w3 as u32, w4 as u32],
                vec![1.0, 1.0],
                Bounds::at_most(0.0),
            )
            .unwrap();

        program.add_scenario(Scenario::new(
            1.0 / 3.0,
            sub,
            vec![
                Linkage {
                    row: wheat,
                    column: 0,
                    coefficient: 2.5 * yield_factor,
                },
                Linkage {
                    row: corn,
                    column: 1,
                    coefficient: 3.0 * yield_factor,
                },
                Linkage {
                    row: beets,
                    column: 2,
                    coefficient: -20.0 * yield_factor,
                },
            ],
        ));
    }
    program
}

/// Second stage infeasible near x = 0; with feasibility cuts the optimum
/// is 5.5 at x = 2.
///
/// minimize 2x + E[y] with x ∈ [0, 10], y ∈ [0, 2], y ≥ d − x,
/// d ∈ {4, 3} equiprobable. Feasibility requires x ≥ 2.
pub fn infeasible_program() -> StochasticProgram {
    let mut first = Model::new();
    first
        .add_variable(Variable::new(Bounds::new(0.0, 10.0), 2.0))
        .unwrap();
    let mut program = StochasticProgram::new(first);
    for demand in [4.0, 3.0] {
        let mut sub = Model::new();
        sub.add_variable(Variable::new(Bounds::new(0.0, 2.0), 1.0))
            .unwrap();
        let row = sub
            .add_row(vec![0], vec![1.0], Bounds::at_least(demand))
            .unwrap();
        program.add_scenario(Scenario::new(
            0.5,
            sub,
            vec![Linkage {
                row,
                column: 0,
                coefficient: 1.0,
            }],
        ));
    }
    program
}

/// Reference objective: the extensive form solved directly.
pub fn reference_objective(program: &StochasticProgram) -> f64 {
    let model = extensive_form(program).expect("extensive form");
    let mut solver = ClarabelSolver::new();
    let solution = solver.solve(&model).expect("reference solve");
    assert!(
        solution.status.is_optimal(),
        "reference solve ended {}",
        solution.status
    );
    solution.objective
}

/// Relative agreement within `tol`.
pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol * (1.0 + expected.abs()),
        "expected {expected}, got {actual} (tol {tol})"
    );
}
