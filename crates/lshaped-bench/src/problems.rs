//! Built-in example programs.

use lshaped_core::model::{Bounds, Model, Variable};
use lshaped_engine::{Linkage, Scenario, StochasticProgram};

/// Two scenarios, two first-stage variables, optimum 8.
pub fn simple() -> StochasticProgram {
    let mut first = Model::new();
    first
        .add_variable(Variable::new(Bounds::new(0.0, 5.0), 2.0))
        .expect("first-stage variable");
    first
        .add_variable(Variable::new(Bounds::new(0.0, 5.0), 3.0))
        .expect("first-stage variable");
    first
        .add_row(vec![0, 1], vec![1.0, 1.0], Bounds::at_least(1.0))
        .expect("first-stage row");

    let mut program = StochasticProgram::new(first);
    for demand in [2.0, 4.0] {
        let mut sub = Model::new();
        sub.add_variable(Variable::new(Bounds::new(0.0, 10.0), 5.0))
            .expect("scenario variable");
        let row = sub
            .add_row(vec![0], vec![1.0], Bounds::at_least(demand))
            .expect("scenario row");
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

/// The classic three-crop farmer problem, optimum −108390.
pub fn farmer() -> StochasticProgram {
    let mut first = Model::new();
    for cost in [150.0, 230.0, 260.0] {
        first
            .add_variable(Variable::new(Bounds::at_least(0.0), cost))
            .expect("first-stage variable");
    }
    first
        .add_row(vec![0, 1, 2], vec![1.0, 1.0, 1.0], Bounds::at_most(500.0))
        .expect("land row");

    let mut program = StochasticProgram::new(first);
    for yield_factor in [1.2, 1.0, 0.8] {
        let mut sub = Model::new();
        let y1 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), 238.0))
            .expect("purchase wheat");
        let y2 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), 210.0))
            .expect("purchase corn");
        let w1 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), -170.0))
            .expect("sell wheat");
        let w2 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), -150.0))
            .expect("sell corn");
        let w3 = sub
            .add_variable(Variable::new(Bounds::new(0.0, 6000.0), -36.0))
            .expect("sell beets in quota");
        let w4 = sub
            .add_variable(Variable::new(Bounds::at_least(0.0), -10.0))
            .expect("sell beets over quota");

        let wheat = sub
            .add_row(
                vec![y1 as u32, w1 as u32],
                vec![1.0, -1.0],
                Bounds::at_least(200.0),
            )
            .expect("wheat requirement");
        let corn = sub
            .add_row(
                vec![y2 as u32, w2 as u32],
                vec![1.0, -1.0],
                Bounds::at_least(240.0),
            )
            .expect("corn requirement");
        let beets = sub
            .add_row(
                vec![w3 as u32, w4 as u32],
                vec![1.0, 1.0],
                Bounds::at_most(0.0),
            )
            .expect("beet balance");

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
