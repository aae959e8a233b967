//! Second-stage subproblem evaluator.
//!
//! A subproblem owns its LP model and its solver instance. Evaluation at a
//! first-stage point shifts the linked row bounds by the linkage terms,
//! solves, and emits exactly one cut. The emitted cut is pure data and
//! references neither the subproblem nor the solver.

use crate::cut::{Cut, Hyperplane, SparseVec};
use crate::ids::RowId;
use crate::model::{Model, ModelError};
use crate::solver::{SolveStatus, Solver, SolverError};
use std::collections::BTreeMap;

/// One linkage term: first-stage column `column` enters linked row `row`
/// with `coefficient`, i.e. the row's effective rhs is
/// `base − coefficient·x[column]` (summed over terms sharing the row).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linkage {
    pub row: RowId,
    pub column: usize,
    pub coefficient: f64,
}

/// Result of one subproblem evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The single cut emitted for this evaluation.
    pub cut: Cut,
    /// Probability-weighted recourse value: `π·obj` when optimal, `+∞` when
    /// infeasible, `−∞` when unbounded.
    pub value: f64,
}

/// A second-stage scenario LP with its linkage into the first stage.
#[derive(Debug, Clone)]
pub struct Subproblem<S> {
    id: usize,
    probability: f64,
    model: Model,
    links: Vec<Linkage>,
    base_bounds: BTreeMap<RowId, crate::model::Bounds>,
    n_master_cols: usize,
    solver: S,
}

impl<S> Subproblem<S> {
    /// Build a subproblem, validating the linkage against both models.
    pub fn new(
        id: usize,
        probability: f64,
        model: Model,
        links: Vec<Linkage>,
        n_master_cols: usize,
        solver: S,
    ) -> Result<Self, ModelError> {
        let mut base_bounds = BTreeMap::new();
        for link in &links {
            if link.column >= n_master_cols {
                return Err(ModelError::InvalidColumn {
                    column: link.column,
                    num_variables: n_master_cols,
                });
            }
            let row = model.get_row(link.row)?;
            base_bounds.insert(link.row, row.bounds);
        }
        Ok(Self {
            id,
            probability,
            model,
            links,
            base_bounds,
            n_master_cols,
            solver,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl<S: Solver> Subproblem<S> {
    /// Evaluate the subproblem at a first-stage point and emit one cut.
    ///
    /// `feasibility_cuts` decides what an infeasible scenario produces: a
    /// feasibility cut from the Farkas ray, or the `Infeasible` signal.
    pub fn evaluate(&mut self, x: &[f64], feasibility_cuts: bool) -> Result<Evaluation, SolverError> {
        assert_eq!(
            x.len(),
            self.n_master_cols,
            "first-stage point length {} does not match linkage width {}",
            x.len(),
            self.n_master_cols
        );

        self.push_decision(x);
        let solution = self.solver.solve(&self.model)?;

        match solution.status {
            SolveStatus::Optimal => self.optimality_cut(x, &solution),
            SolveStatus::Infeasible => {
                if !feasibility_cuts {
                    tracing::debug!(
                        component = "subproblem",
                        operation = "evaluate",
                        status = "infeasible",
                        subproblem = self.id,
                        "Scenario infeasible and feasibility generation is off"
                    );
                    return Ok(Evaluation {
                        cut: Cut::Infeasible(self.id),
                        value: f64::INFINITY,
                    });
                }
                self.feasibility_cut(x, &solution)
            }
            SolveStatus::Unbounded => {
                tracing::warn!(
                    component = "subproblem",
                    operation = "evaluate",
                    status = "unbounded",
                    subproblem = self.id,
                    "Scenario unbounded at the query point"
                );
                Ok(Evaluation {
                    cut: Cut::Unbounded(self.id),
                    value: f64::NEG_INFINITY,
                })
            }
            SolveStatus::Other => Err(SolverError::Backend {
                message: format!(
                    "subproblem {} solve ended with status '{}'",
                    self.id,
                    solution.status
                ),
            }),
        }
    }

    /// Shift each linked row's bounds to `base − T·x`.
    fn push_decision(&mut self, x: &[f64]) {
        let mut shifts: BTreeMap<RowId, f64> = BTreeMap::new();
        for link in &self.links {
            *shifts.entry(link.row).or_insert(0.0) += link.coefficient * x[link.column];
        }
        for (row, shift) in shifts {
            let base = self.base_bounds[&row];
            self.model
                .set_row_bounds(row, base.shifted(-shift))
                .expect("linked row disappeared from subproblem model");
        }
    }

    fn optimality_cut(
        &self,
        x: &[f64],
        solution: &crate::solver::Solution,
    ) -> Result<Evaluation, SolverError> {
        let mut entries: BTreeMap<u32, f64> = BTreeMap::new();
        for link in &self.links {
            let position = self
                .model
                .row_position(link.row)
                .expect("linked row disappeared from subproblem model");
            let lambda = solution.get_row_dual(position).ok_or_else(|| {
                SolverError::Backend {
                    message: format!(
                        "subproblem {} solution is missing the dual for row {}",
                        self.id,
                        link.row.inner()
                    ),
                }
            })?;
            // rhs moves as base − T·x, so ∇Q = −π·T'λ and the stored
            // coefficients are the negated gradient.
            *entries.entry(link.column as u32).or_insert(0.0) +=
                self.probability * lambda * link.coefficient;
        }

        let terms = SparseVec::from_entries(entries);
        if !terms.is_finite() || !solution.objective.is_finite() {
            return Err(SolverError::Backend {
                message: format!("subproblem {} produced non-finite cut data", self.id),
            });
        }

        let value = self.probability * solution.objective;
        let q = value + terms.dot(x);
        tracing::trace!(
            component = "subproblem",
            operation = "evaluate",
            status = "optimal",
            subproblem = self.id,
            value,
            q,
            "Emitting optimality cut"
        );
        Ok(Evaluation {
            cut: Cut::Optimality(Hyperplane::new(terms, q, self.id)),
            value,
        })
    }

    fn feasibility_cut(
        &self,
        x: &[f64],
        solution: &crate::solver::Solution,
    ) -> Result<Evaluation, SolverError> {
        let ray = solution.dual_ray.as_deref().ok_or_else(|| SolverError::Backend {
            message: format!(
                "solver '{}' reported subproblem {} infeasible without an \
                 infeasibility certificate; cannot build a feasibility cut",
                self.solver.name(),
                self.id
            ),
        })?;

        let mut entries: BTreeMap<u32, f64> = BTreeMap::new();
        for link in &self.links {
            let position = self
                .model
                .row_position(link.row)
                .expect("linked row disappeared from subproblem model");
            let lambda = ray.get(position).copied().ok_or_else(|| SolverError::Backend {
                message: format!(
                    "subproblem {} certificate is missing the entry for row {}",
                    self.id,
                    link.row.inner()
                ),
            })?;
            *entries.entry(link.column as u32).or_insert(0.0) += -lambda * link.coefficient;
        }

        let mut terms = SparseVec::from_entries(entries);
        if !terms.is_finite() || !solution.objective.is_finite() {
            return Err(SolverError::Backend {
                message: format!("subproblem {} produced a non-finite certificate", self.id),
            });
        }
        let mut g = solution.objective + terms.dot(x);

        // Tame extreme certificate magnitudes. Degenerate all-zero data is
        // left alone rather than divided by zero.
        let scale = if g != 0.0 { g.abs() } else { terms.max_abs() };
        if scale != 0.0 {
            terms.rescale(scale);
            g /= scale;
        }

        tracing::debug!(
            component = "subproblem",
            operation = "evaluate",
            status = "infeasible",
            subproblem = self.id,
            g,
            "Emitting feasibility cut"
        );
        Ok(Evaluation {
            cut: Cut::Feasibility(Hyperplane::new(terms, g, self.id)),
            value: f64::INFINITY,
        })
    }
}
