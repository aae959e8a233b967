//! Master model management.
//!
//! The master owns the first-stage columns, one θ column per slot, the
//! first-stage rows, and every cut row inserted so far. Stabilization
//! mutates it in place: trust-region boxes tighten the x bounds, the
//! regularizer installs a quadratic diagonal, and the level-set variant
//! derives a projection model from a clone.

use crate::error::EngineError;
use crate::program::StochasticProgram;
use lshaped_core::cut::{Cut, Hyperplane, SparseVec, SENTINEL_FLOOR, THETA_SENTINEL};
use lshaped_core::model::{Bounds, Model, Variable};
use lshaped_core::solver::{SolveStatus, Solution, Solver};
use lshaped_core::RowId;
use tracing::{debug, warn};

pub(crate) struct Master<S> {
    model: Model,
    solver: S,
    n_first: usize,
    num_slots: usize,
    base_costs: Vec<f64>,
    first_stage_bounds: Vec<Bounds>,
    /// Slot has at least one optimality cut.
    supported: Vec<bool>,
    /// Slot's θ column carries cost 1 and free bounds. Starts false only in
    /// linearize mode.
    promoted: Vec<bool>,
    linearize: bool,
}

impl<S> Master<S> {
    /// Build the master model and the committee mirrors of the first-stage
    /// rows (normalized to ≥ form; equalities become two one-sided cuts).
    pub fn new(
        program: &StochasticProgram,
        num_slots: usize,
        linearize: bool,
        solver: S,
    ) -> Result<(Self, Vec<Cut>), EngineError> {
        let mut model = Model::new();
        let mut base_costs = Vec::new();
        let mut first_stage_bounds = Vec::new();

        for variable in program.first_stage.variables() {
            model.add_variable(*variable)?;
            base_costs.push(variable.cost);
            first_stage_bounds.push(variable.bounds);
        }
        let n_first = model.num_variables();

        // θ columns. In linearize mode they start pinned at zero with no
        // cost and get promoted on their first optimality cut; otherwise
        // they are free with cost one from the start.
        for _ in 0..num_slots {
            let (bounds, cost) = if linearize {
                (Bounds::fixed(0.0), 0.0)
            } else {
                (Bounds::free(), 1.0)
            };
            model.add_variable(Variable::new(bounds, cost))?;
        }

        let mut mirrors = Vec::new();
        for (_, row) in program.first_stage.rows() {
            model.add_row(row.indices.clone(), row.values.clone(), row.bounds)?;

            let terms = SparseVec::new(row.indices.clone(), row.values.clone());
            let negated = SparseVec::new(
                row.indices.clone(),
                row.values.iter().map(|v| -v).collect(),
            );
            if row.bounds.is_equality() {
                let target = row.bounds.lower;
                mirrors.push(Cut::LinearConstraint(Hyperplane::new(
                    terms,
                    target,
                    mirrors.len(),
                )));
                mirrors.push(Cut::LinearConstraint(Hyperplane::new(
                    negated,
                    -target,
                    mirrors.len(),
                )));
            } else if row.bounds.lower.is_finite() {
                mirrors.push(Cut::LinearConstraint(Hyperplane::new(
                    terms,
                    row.bounds.lower,
                    mirrors.len(),
                )));
            } else if row.bounds.upper.is_finite() {
                mirrors.push(Cut::LinearConstraint(Hyperplane::new(
                    negated,
                    -row.bounds.upper,
                    mirrors.len(),
                )));
            }
        }

        debug!(
            component = "master",
            operation = "init",
            status = "success",
            n_first,
            num_slots,
            first_stage_rows = program.first_stage.num_rows(),
            linearize,
            "Master model assembled"
        );

        Ok((
            Self {
                model,
                solver,
                n_first,
                num_slots,
                base_costs,
                first_stage_bounds,
                supported: vec![false; num_slots],
                promoted: vec![!linearize; num_slots],
                linearize,
            },
            mirrors,
        ))
    }

    pub fn n_first(&self) -> usize {
        self.n_first
    }

    /// First-stage cost at a point, independent of any installed
    /// regularizer.
    pub fn base_objective(&self, x: &[f64]) -> f64 {
        self.base_costs.iter().zip(x).map(|(c, v)| c * v).sum()
    }

    /// The master is solvable: every θ column is either supported by a cut
    /// or still pinned at zero.
    pub fn ready(&self) -> bool {
        self.linearize || self.all_supported()
    }

    pub fn all_supported(&self) -> bool {
        self.supported.iter().all(|&s| s)
    }

    /// Serialize a cut into the master. Signals produce no row.
    pub fn insert_cut(&mut self, cut: &Cut) -> Result<Option<RowId>, EngineError> {
        let Some(row) = cut.lowlevel(self.n_first) else {
            return Ok(None);
        };
        let id = self.model.add_row(
            row.indices,
            row.values,
            Bounds::new(row.lower, row.upper),
        )?;
        if let Cut::Optimality(h) = cut {
            self.mark_supported(h.id)?;
        }
        Ok(Some(id))
    }

    fn mark_supported(&mut self, slot: usize) -> Result<(), EngineError> {
        self.supported[slot] = true;
        if !self.promoted[slot] {
            let column = self.n_first + slot;
            self.model.set_cost(column, 1.0)?;
            self.model.set_variable_bounds(column, Bounds::free())?;
            self.promoted[slot] = true;
            debug!(
                component = "master",
                operation = "promote_theta",
                status = "success",
                slot,
                "Promoted θ column after first optimality cut"
            );
        }
        Ok(())
    }

    pub fn delete_rows(&mut self, rows: &[RowId]) {
        self.model.delete_rows(rows);
    }

    /// Clamp the x block into `[max(L, ξ−Δ), min(U, ξ+Δ)]`.
    pub fn set_trust_region(&mut self, xi: &[f64], delta: f64) -> Result<(), EngineError> {
        for column in 0..self.n_first {
            let original = self.first_stage_bounds[column];
            let bounds = Bounds::new(
                original.lower.max(xi[column] - delta),
                original.upper.min(xi[column] + delta),
            );
            self.model.set_variable_bounds(column, bounds)?;
        }
        Ok(())
    }

    /// Install the proximal objective `½(1/σ)‖x‖² − (1/σ)ξ·x` on the x
    /// block on top of the base costs.
    pub fn set_regularizer(&mut self, sigma: f64, xi: &[f64]) -> Result<(), EngineError> {
        for column in 0..self.n_first {
            self.model.set_quadratic(column, 1.0 / sigma)?;
            self.model
                .set_cost(column, self.base_costs[column] - xi[column] / sigma)?;
        }
        Ok(())
    }
}

impl<S: Solver> Master<S> {
    pub fn solve(&mut self) -> Result<Solution, EngineError> {
        Ok(self.solver.solve(&self.model)?)
    }

    /// Split a master solution into `(x, θs)`, with sentinels in
    /// unsupported slots.
    pub fn read_decision(&self, solution: &Solution) -> (Vec<f64>, Vec<f64>) {
        let x = solution.primal[..self.n_first].to_vec();
        let thetas = (0..self.num_slots)
            .map(|slot| {
                if self.supported[slot] {
                    solution.primal[self.n_first + slot]
                } else {
                    THETA_SENTINEL
                }
            })
            .collect();
        (x, thetas)
    }

    /// Lower model value `c·x + Σθ`; sentinel while any slot is
    /// unpopulated.
    pub fn lower_model(&self, x: &[f64], thetas: &[f64]) -> f64 {
        if thetas.iter().any(|&t| t <= SENTINEL_FLOOR) {
            return THETA_SENTINEL;
        }
        self.base_objective(x) + thetas.iter().sum::<f64>()
    }

    /// Project onto the level set `c·x + Σθ ≤ level`, minimizing the
    /// distance to ξ (squared 2-norm, or 1-norm in linearize mode). Solved
    /// on the dedicated projection solver. Returns the projected `(x, θs)`
    /// or `None` when the projection solve fails.
    pub fn project_level(
        &self,
        level: f64,
        xi: &[f64],
        solver: &mut S,
    ) -> Result<Option<(Vec<f64>, Vec<f64>)>, EngineError> {
        let mut projection = self.model.clone();

        for column in 0..self.n_first {
            if self.linearize {
                projection.set_cost(column, 0.0)?;
                projection.set_quadratic(column, 0.0)?;
            } else {
                // ‖x − ξ‖² up to the constant ξ².
                projection.set_cost(column, -2.0 * xi[column])?;
                projection.set_quadratic(column, 2.0)?;
            }
        }
        for slot in 0..self.num_slots {
            projection.set_cost(self.n_first + slot, 0.0)?;
        }

        // Level row over the original objective.
        let mut indices: Vec<u32> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for (column, &cost) in self.base_costs.iter().enumerate() {
            if cost != 0.0 {
                indices.push(column as u32);
                values.push(cost);
            }
        }
        for slot in 0..self.num_slots {
            indices.push((self.n_first + slot) as u32);
            values.push(1.0);
        }
        projection.add_row(indices, values, Bounds::at_most(level))?;

        if self.linearize {
            // 1-norm: one slack per x column with t ≥ ±(x − ξ).
            for column in 0..self.n_first {
                let t = projection.add_variable(Variable::new(Bounds::at_least(0.0), 1.0))?;
                projection.add_row(
                    vec![t as u32, column as u32],
                    vec![1.0, -1.0],
                    Bounds::at_least(-xi[column]),
                )?;
                projection.add_row(
                    vec![t as u32, column as u32],
                    vec![1.0, 1.0],
                    Bounds::at_least(xi[column]),
                )?;
            }
        }

        let solution = solver.solve(&projection)?;
        if solution.status != SolveStatus::Optimal {
            warn!(
                component = "master",
                operation = "project",
                status = "warn",
                solver_status = %solution.status,
                level,
                "Level projection did not solve; keeping the master point"
            );
            return Ok(None);
        }
        Ok(Some(self.read_decision(&solution)))
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::program::{Scenario, StochasticProgram};
    use lshaped_core::model::ModelError;
    use lshaped_core::solver::SolverError;
    use lshaped_core::subproblem::Linkage;

    /// Backend that never solves; master structure tests only.
    #[derive(Clone)]
    struct InertSolver;

    impl Solver for InertSolver {
        fn solve(&mut self, _model: &Model) -> Result<Solution, SolverError> {
            Err(SolverError::Backend {
                message: "inert".to_string(),
            })
        }

        fn supports_quadratic_objective(&self) -> bool {
            false
        }

        fn name(&self) -> &'static str {
            "inert"
        }
    }

    fn program() -> StochasticProgram {
        let mut first = Model::new();
        first
            .add_variable(Variable::new(Bounds::new(0.0, 10.0), 2.0))
            .unwrap();
        first
            .add_variable(Variable::new(Bounds::new(0.0, 10.0), 3.0))
            .unwrap();
        first
            .add_row(vec![0, 1], vec![1.0, 1.0], Bounds::at_least(1.0))
            .unwrap();
        first
            .add_row(vec![0], vec![1.0], Bounds::fixed(4.0))
            .unwrap();

        let mut program = StochasticProgram::new(first);
        let mut sub = Model::new();
        sub.add_variable(Variable::new(Bounds::at_least(0.0), 1.0))
            .unwrap();
        let row = sub
            .add_row(vec![0], vec![1.0], Bounds::at_least(2.0))
            .unwrap();
        program.add_scenario(Scenario::new(
            1.0,
            sub,
            vec![Linkage {
                row,
                column: 0,
                coefficient: 1.0,
            }],
        ));
        program
    }

    fn optimality(slot: usize) -> Cut {
        Cut::Optimality(Hyperplane::new(
            SparseVec::new(vec![0], vec![-1.0]),
            2.0,
            slot,
        ))
    }

    #[test]
    fn test_committee_mirrors_normalized() {
        let (_, mirrors) = Master::new(&program(), 1, false, InertSolver).unwrap();
        // One ≥ row → one mirror; one equality row → two mirrors.
        assert_eq!(mirrors.len(), 3);
        let (gval, q) = mirrors[1].evaluate(&[4.0, 0.0]);
        assert_eq!((gval, q), (4.0, 4.0));
        let (gval, q) = mirrors[2].evaluate(&[4.0, 0.0]);
        assert_eq!((gval, q), (-4.0, -4.0));
    }

    #[test]
    fn test_theta_columns_default_mode() {
        let (master, _) = Master::new(&program(), 2, false, InertSolver).unwrap();
        let theta = &master.model.variables()[master.n_first()];
        assert_eq!(theta.cost, 1.0);
        assert!(theta.bounds.lower.is_infinite());
        assert!(!master.ready());
    }

    #[test]
    fn test_theta_promotion_in_linearize_mode() {
        let (mut master, _) = Master::new(&program(), 1, true, InertSolver).unwrap();
        assert!(master.ready());
        let theta = &master.model.variables()[master.n_first()];
        assert_eq!(theta.cost, 0.0);
        assert!(theta.bounds.is_equality());

        master.insert_cut(&optimality(0)).unwrap();
        let theta = &master.model.variables()[master.n_first()];
        assert_eq!(theta.cost, 1.0);
        assert!(theta.bounds.lower.is_infinite());
        assert!(master.all_supported());
    }

    #[test]
    fn test_insert_cut_returns_row_and_signals_do_not() {
        let (mut master, _) = Master::new(&program(), 1, false, InertSolver).unwrap();
        let row = master.insert_cut(&optimality(0)).unwrap();
        assert!(row.is_some());
        assert!(master.insert_cut(&Cut::Unbounded(0)).unwrap().is_none());
    }

    #[test]
    fn test_trust_region_clamps_to_original_bounds() {
        let (mut master, _) = Master::new(&program(), 1, false, InertSolver).unwrap();
        master.set_trust_region(&[9.5, 0.5], 2.0).unwrap();
        let bounds = master.model.variables()[0].bounds;
        assert_eq!(bounds.lower, 7.5);
        assert_eq!(bounds.upper, 10.0);
        let bounds = master.model.variables()[1].bounds;
        assert_eq!(bounds.lower, 0.0);
        assert_eq!(bounds.upper, 2.5);
    }

    #[test]
    fn test_regularizer_objective() {
        let (mut master, _) = Master::new(&program(), 1, false, InertSolver).unwrap();
        master.set_regularizer(2.0, &[4.0, 0.0]).unwrap();
        assert_eq!(master.model.quadratic()[0], 0.5);
        assert_eq!(master.model.variables()[0].cost, 2.0 - 4.0 / 2.0);
        // θ block untouched.
        assert_eq!(master.model.quadratic()[master.n_first()], 0.0);
        // Base objective ignores the regularizer.
        assert_eq!(master.base_objective(&[1.0, 1.0]), 5.0);
    }

    #[test]
    fn test_lower_model_requires_population() {
        let (master, _) = Master::new(&program(), 2, false, InertSolver).unwrap();
        assert_eq!(
            master.lower_model(&[0.0, 0.0], &[1.0, THETA_SENTINEL]),
            THETA_SENTINEL
        );
        assert_eq!(master.lower_model(&[1.0, 0.0], &[1.0, 2.0]), 5.0);
    }

    #[test]
    fn test_cut_rows_survive_model_validation() {
        let (mut master, _) = Master::new(&program(), 1, false, InertSolver).unwrap();
        // A feasibility cut with colliding indices must not error.
        let cut = Cut::Feasibility(Hyperplane::new(
            SparseVec::new(vec![0, 0], vec![1.0, 1.0]),
            2.0,
            0,
        ));
        let row = master.insert_cut(&cut).unwrap();
        assert!(row.is_some());
    }

    #[test]
    fn test_delete_rows_ignores_missing() {
        let (mut master, _) = Master::new(&program(), 1, false, InertSolver).unwrap();
        let row = master.insert_cut(&optimality(0)).unwrap().unwrap();
        master.delete_rows(&[row, RowId::new(999)]);
    }

    #[test]
    fn test_invalid_cut_column_is_model_error() {
        let (mut master, _) = Master::new(&program(), 1, false, InertSolver).unwrap();
        let cut = Cut::Feasibility(Hyperplane::new(
            SparseVec::new(vec![40], vec![1.0]),
            0.0,
            0,
        ));
        let err = master.insert_cut(&cut).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Model(ModelError::InvalidColumn { .. })
        ));
    }
}
