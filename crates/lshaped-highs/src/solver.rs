//! HiGHS solver implementation.

use crate::status::map_status;
use highs::{RowProblem, Sense};
use lshaped_core::model::Model;
use lshaped_core::solver::{SolveStatus, Solution, Solver, SolverError};
use std::time::Instant;
use tracing::{debug, trace};

/// Solver adapter over the HiGHS simplex/interior-point engine.
///
/// The model is rebuilt into a fresh `RowProblem` on every solve; the cut
/// loop mutates the model container, not the backend.
#[derive(Debug, Clone)]
pub struct HighsSolver {
    verbose: bool,
    time_limit: Option<f64>,
}

impl HighsSolver {
    pub fn new() -> Self {
        Self {
            verbose: false,
            time_limit: None,
        }
    }

    /// Enable HiGHS console output.
    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Set a wall-clock time limit in seconds for each solve.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for HighsSolver {
    fn solve(&mut self, model: &Model) -> Result<Solution, SolverError> {
        if model.num_variables() == 0 {
            return Err(SolverError::EmptyModel);
        }
        if model.has_quadratic() {
            return Err(SolverError::QuadraticUnsupported { solver: "highs" });
        }

        let started = Instant::now();
        let mut problem = RowProblem::default();

        let mut columns = Vec::with_capacity(model.num_variables());
        for variable in model.variables() {
            let col = problem.add_column(
                variable.cost,
                variable.bounds.lower..=variable.bounds.upper,
            );
            columns.push(col);
        }

        for (id, row) in model.rows() {
            let factors: Vec<_> = row
                .indices
                .iter()
                .zip(&row.values)
                .map(|(&index, &value)| (columns[index as usize], value))
                .collect();
            problem.add_row(row.bounds.lower..=row.bounds.upper, factors);
            trace!(
                component = "solver",
                operation = "add_row",
                status = "success",
                row_id = id.inner(),
                "Added row to HiGHS"
            );
        }

        let mut highs_model = problem.optimise(Sense::Minimise);
        if !self.verbose {
            highs_model.make_quiet();
        }
        if let Some(limit) = self.time_limit {
            highs_model.set_option("time_limit", limit);
        }

        let solved = highs_model.solve();
        let status = map_status(solved.status());
        let solve_time_seconds = started.elapsed().as_secs_f64();

        debug!(
            component = "solver",
            operation = "solve",
            status = "success",
            solver = "highs",
            solver_status = ?solved.status(),
            num_cols = model.num_variables(),
            num_rows = model.num_rows(),
            duration_ms = solve_time_seconds * 1000.0,
            "HiGHS solve completed"
        );

        // HiGHS only exposes solution data once it found one; the crate
        // surface has no Farkas ray, so infeasible solves come back bare.
        let solution = if status == SolveStatus::Optimal {
            let raw = solved.get_solution();
            let primal = raw.columns().to_vec();
            let objective = model.linear_objective(&primal);
            Solution {
                status,
                primal,
                row_duals: raw.dual_rows().to_vec(),
                dual_ray: None,
                objective,
                solve_time_seconds,
            }
        } else {
            Solution {
                status,
                primal: Vec::new(),
                row_duals: Vec::new(),
                dual_ray: None,
                objective: f64::NAN,
                solve_time_seconds,
            }
        };
        Ok(solution)
    }

    fn supports_quadratic_objective(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "highs"
    }
}
