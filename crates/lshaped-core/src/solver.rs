//! Solver adapter contract and solver-agnostic solution types.
//!
//! The decomposition engines treat the LP/QP solver as a black box behind
//! the [`Solver`] trait. Status codes are exactly the four the engines
//! dispatch on; anything a backend reports beyond these maps to
//! [`SolveStatus::Other`].
//!
//! Dual conventions are part of the contract so cut construction stays
//! backend-independent:
//!
//! - `row_duals[r]` is the marginal of the optimal objective with respect to
//!   shifting row `r`'s right-hand side (both bounds together).
//! - `dual_ray[r]`, present for infeasible solves when the backend exposes a
//!   certificate, is the marginal of the infeasibility measure `V` with
//!   respect to row `r`'s right-hand side, where `V ≥ 0` holds for every
//!   feasible right-hand side and the reported `objective` equals
//!   `−V(current rhs) > 0`.
//!
//! Both vectors are laid out in ascending row-id order of the solved model.

use crate::model::Model;

/// Status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Problem is infeasible.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// Anything else: limits, numerical trouble, solver did not finish.
    Other,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }

    pub fn is_infeasible(self) -> bool {
        matches!(self, SolveStatus::Infeasible)
    }

    pub fn is_unbounded(self) -> bool {
        matches!(self, SolveStatus::Unbounded)
    }

    /// Get a human-readable string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Other => "other",
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type for solver adapter operations.
#[derive(Debug, Clone)]
pub enum SolverError {
    /// Model has no variables.
    EmptyModel,
    /// The model carries a quadratic objective the backend cannot handle.
    QuadraticUnsupported {
        /// Adapter name for the message.
        solver: &'static str,
    },
    /// Backend-specific failure.
    Backend { message: String },
}

impl SolverError {
    /// Returns a semantic error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            SolverError::EmptyModel => "SOLVER_EMPTY_MODEL",
            SolverError::QuadraticUnsupported { .. } => "SOLVER_NO_QP",
            SolverError::Backend { .. } => "SOLVER_BACKEND",
        }
    }
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::EmptyModel => write!(f, "[{}] Model has no variables", self.code()),
            SolverError::QuadraticUnsupported { solver } => write!(
                f,
                "[{}] Solver '{}' does not support quadratic objectives",
                self.code(),
                solver
            ),
            SolverError::Backend { message } => {
                write!(f, "[{}] Solver backend error: {}", self.code(), message)
            }
        }
    }
}

impl std::error::Error for SolverError {}

/// Solver-agnostic result of one solve.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Status of the solve.
    pub status: SolveStatus,
    /// Primal values per column.
    pub primal: Vec<f64>,
    /// Row duals (∂objective/∂rhs), ascending row-id order. Empty unless Optimal.
    pub row_duals: Vec<f64>,
    /// Farkas ray (∂V/∂rhs), present for Infeasible when the backend exposes one.
    pub dual_ray: Option<Vec<f64>>,
    /// Objective value; the infeasibility measure for Infeasible-with-ray;
    /// NaN when no value is meaningful.
    pub objective: f64,
    /// Wall-clock solve time in seconds.
    pub solve_time_seconds: f64,
}

impl Solution {
    /// Get the primal value at the given column.
    pub fn get_primal(&self, column: usize) -> Option<f64> {
        self.primal.get(column).copied()
    }

    /// Get the row dual at the given position.
    pub fn get_row_dual(&self, position: usize) -> Option<f64> {
        self.row_duals.get(position).copied()
    }
}

/// Trait all solver backends implement.
pub trait Solver {
    /// Solve the given model and return a solver-agnostic solution.
    fn solve(&mut self, model: &Model) -> Result<Solution, SolverError>;

    /// Whether the backend accepts a quadratic diagonal objective.
    fn supports_quadratic_objective(&self) -> bool;

    /// Backend name for logging and error messages.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(SolveStatus::Optimal.is_optimal());
        assert!(!SolveStatus::Optimal.is_infeasible());
        assert!(SolveStatus::Infeasible.is_infeasible());
        assert!(SolveStatus::Unbounded.is_unbounded());
        assert!(!SolveStatus::Other.is_optimal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", SolveStatus::Optimal), "optimal");
        assert_eq!(format!("{}", SolveStatus::Other), "other");
    }

    #[test]
    fn test_error_display() {
        let err = SolverError::QuadraticUnsupported { solver: "fixture" };
        assert!(err.to_string().contains("SOLVER_NO_QP"));
        assert!(err.to_string().contains("fixture"));
        assert!(err.to_string().contains("quadratic"));

        let err = SolverError::Backend {
            message: "exploded".to_string(),
        };
        assert!(err.to_string().contains("SOLVER_BACKEND"));
        assert!(err.to_string().contains("exploded"));
    }

    #[test]
    fn test_solution_accessors() {
        let solution = Solution {
            status: SolveStatus::Optimal,
            primal: vec![1.0, 2.0],
            row_duals: vec![0.5],
            dual_ray: None,
            objective: 4.0,
            solve_time_seconds: 0.0,
        };
        assert_eq!(solution.get_primal(1), Some(2.0));
        assert_eq!(solution.get_primal(2), None);
        assert_eq!(solution.get_row_dual(0), Some(0.5));
        assert_eq!(solution.get_row_dual(1), None);
    }
}
