//! Core containers for L-shaped decomposition.
//!
//! This crate holds everything the decomposition engines share without
//! owning the iteration itself:
//!
//! - [`model`]: minimize-only LP/QP container handed to solver adapters
//! - [`solver`]: the adapter contract and solver-agnostic solution types
//! - [`cut`]: hyperplane algebra (optimality / feasibility / linear cuts)
//! - [`bundle`]: aggregation of optimality cuts into θ slots
//! - [`subproblem`]: the second-stage evaluator emitting one cut per solve
//! - [`committee`]: active / inactive / violating cut pools

pub mod bundle;
pub mod committee;
pub mod cut;
pub mod ids;
pub mod model;
pub mod solver;
pub mod subproblem;

pub use bundle::{BundleAccumulator, Bundler, CutBundle};
pub use committee::CutPools;
pub use cut::{Cut, CutKind, Hyperplane, LowLevelRow, SparseVec, SENTINEL_FLOOR, THETA_SENTINEL};
pub use ids::RowId;
pub use model::{Bounds, Model, ModelError, Row, Variable};
pub use solver::{SolveStatus, Solution, Solver, SolverError};
pub use subproblem::{Evaluation, Linkage, Subproblem};
