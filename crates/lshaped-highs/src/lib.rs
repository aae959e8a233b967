//! HiGHS adapter for the L-shaped solver contract.
//!
//! HiGHS covers the linear side of the contract: masters and subproblems
//! solve fast, and row duals come back in the ∂objective/∂rhs convention
//! the cut builder expects. Two capabilities are missing from the crate
//! surface and reported as such: quadratic objectives (the regularized
//! variant must error descriptively) and infeasibility certificates
//! (feasibility-cut generation needs a different backend).

mod solver;
mod status;

pub use solver::HighsSolver;
