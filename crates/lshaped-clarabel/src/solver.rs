//! Clarabel solver implementation.

use crate::conic;
use crate::status::map_status;
use clarabel::solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver};
use lshaped_core::model::Model;
use lshaped_core::solver::{SolveStatus, Solution, Solver, SolverError};
use std::time::Instant;
use tracing::{debug, warn};

/// Solver adapter over Clarabel's interior-point method.
#[derive(Debug, Clone)]
pub struct ClarabelSolver {
    verbose: bool,
    max_iterations: Option<u32>,
}

impl ClarabelSolver {
    pub fn new() -> Self {
        Self {
            verbose: false,
            max_iterations: None,
        }
    }

    /// Enable Clarabel's iteration output.
    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Cap the interior-point iteration count.
    pub fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
}

impl Default for ClarabelSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for ClarabelSolver {
    fn solve(&mut self, model: &Model) -> Result<Solution, SolverError> {
        if model.num_variables() == 0 {
            return Err(SolverError::EmptyModel);
        }

        let started = Instant::now();
        let form = conic::lower(model);

        let mut builder = DefaultSettingsBuilder::<f64>::default();
        builder.verbose(self.verbose);
        if let Some(iterations) = self.max_iterations {
            builder.max_iter(iterations);
        }
        let settings = builder.build().map_err(|err| SolverError::Backend {
            message: format!("Clarabel settings error: {err:?}"),
        })?;

        let mut solver = DefaultSolver::new(
            &form.quadratic,
            &form.linear,
            &form.constraints,
            &form.rhs,
            &form.cones,
            settings,
        );
        solver.solve();

        let raw = &solver.solution;
        let status = map_status(raw.status);
        let solve_time_seconds = started.elapsed().as_secs_f64();

        debug!(
            component = "solver",
            operation = "solve",
            status = "success",
            solver = "clarabel",
            solver_status = ?raw.status,
            iterations = raw.iterations,
            num_cols = model.num_variables(),
            num_rows = model.num_rows(),
            duration_ms = solve_time_seconds * 1000.0,
            "Clarabel solve completed"
        );

        let solution = match status {
            SolveStatus::Optimal => Solution {
                status,
                primal: raw.x.clone(),
                row_duals: form.row_duals(&raw.z),
                dual_ray: None,
                objective: raw.obj_val,
                solve_time_seconds,
            },
            SolveStatus::Infeasible => {
                // The dual variable is the primal-infeasibility certificate;
                // its measure b'z is strictly negative for a usable one.
                let measure = -form.certificate_value(&raw.z);
                let (objective, dual_ray) = if measure.is_finite() && measure > 0.0 {
                    (measure, Some(form.dual_ray(&raw.z)))
                } else {
                    warn!(
                        component = "solver",
                        operation = "solve",
                        status = "warn",
                        solver = "clarabel",
                        measure,
                        "Unusable infeasibility certificate"
                    );
                    (f64::NAN, None)
                };
                Solution {
                    status,
                    primal: Vec::new(),
                    row_duals: Vec::new(),
                    dual_ray,
                    objective,
                    solve_time_seconds,
                }
            }
            SolveStatus::Unbounded | SolveStatus::Other => Solution {
                status,
                primal: Vec::new(),
                row_duals: Vec::new(),
                dual_ray: None,
                objective: f64::NAN,
                solve_time_seconds,
            },
        };
        Ok(solution)
    }

    fn supports_quadratic_objective(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "clarabel"
    }
}
