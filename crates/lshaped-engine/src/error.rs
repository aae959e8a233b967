//! Engine error and termination types.

use lshaped_core::model::ModelError;
use lshaped_core::solver::SolverError;

/// Terminal status of a decomposition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationStatus {
    /// Converged within tolerance.
    Optimal,
    /// The program (first stage, or some scenario with feasibility
    /// generation off) is infeasible.
    Infeasible,
    /// The program is unbounded below.
    Unbounded,
    /// Iteration cap or solver trouble; the report carries the gap reached.
    StoppedPrematurely,
}

impl TerminationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationStatus::Optimal => "optimal",
            TerminationStatus::Infeasible => "infeasible",
            TerminationStatus::Unbounded => "unbounded",
            TerminationStatus::StoppedPrematurely => "stopped_prematurely",
        }
    }
}

impl std::fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a run, observable after termination.
#[derive(Debug, Clone)]
pub struct Report {
    pub status: TerminationStatus,
    /// Best incumbent value Q̃ (NaN when no evaluation completed).
    pub objective: f64,
    /// Final lower model value θ.
    pub lower_bound: f64,
    /// Relative gap |θ − Q̃| / (1 + |θ|) at termination.
    pub gap: f64,
    /// Incumbent first-stage point.
    pub x: Vec<f64>,
    /// Iterations (timestamps) driven.
    pub iterations: usize,
    /// Cuts generated across the run.
    pub num_cuts: usize,
    /// Upper value per completed evaluation pass.
    pub q_history: Vec<f64>,
    /// Lower model value per master resolve.
    pub theta_history: Vec<f64>,
    /// Incumbent value per pass.
    pub incumbent_history: Vec<f64>,
    /// Stabilization parameter trace: Δ (trust region), σ (regularized),
    /// level L (level set); empty for plain.
    pub delta_history: Vec<f64>,
}

/// Shape errors in the program or options.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// Initial point length does not match the first stage.
    InitialPointLength { expected: usize, got: usize },
    /// A scenario probability is non-positive or non-finite.
    InvalidProbability { scenario: usize, probability: f64 },
    /// The program has no scenarios.
    NoScenarios,
    /// EVP crash requires structurally identical scenarios.
    EvpStructureMismatch { detail: String },
}

impl ShapeError {
    pub fn code(&self) -> &'static str {
        match self {
            ShapeError::InitialPointLength { .. } => "SHAPE_INITIAL_POINT",
            ShapeError::InvalidProbability { .. } => "SHAPE_PROBABILITY",
            ShapeError::NoScenarios => "SHAPE_NO_SCENARIOS",
            ShapeError::EvpStructureMismatch { .. } => "SHAPE_EVP_MISMATCH",
        }
    }
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeError::InitialPointLength { expected, got } => write!(
                f,
                "[{}] Initial point has length {}, first stage has {} columns",
                self.code(),
                got,
                expected
            ),
            ShapeError::InvalidProbability {
                scenario,
                probability,
            } => write!(
                f,
                "[{}] Scenario {} has invalid probability {}",
                self.code(),
                scenario,
                probability
            ),
            ShapeError::NoScenarios => {
                write!(f, "[{}] Program has no scenarios", self.code())
            }
            ShapeError::EvpStructureMismatch { detail } => write!(
                f,
                "[{}] EVP crash needs structurally identical scenarios: {}",
                self.code(),
                detail
            ),
        }
    }
}

impl std::error::Error for ShapeError {}

/// Error type for engine construction and iteration.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// Program or option shape error.
    Shape(ShapeError),
    /// Model container error.
    Model(ModelError),
    /// Solver adapter error.
    Solver(SolverError),
    /// A variant needs a capability the adapter does not have.
    Capability {
        solver: &'static str,
        variant: &'static str,
    },
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Shape(err) => err.code(),
            EngineError::Model(err) => err.code(),
            EngineError::Solver(err) => err.code(),
            EngineError::Capability { .. } => "ENGINE_NO_QP",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Shape(err) => err.fmt(f),
            EngineError::Model(err) => err.fmt(f),
            EngineError::Solver(err) => err.fmt(f),
            EngineError::Capability { solver, variant } => write!(
                f,
                "[{}] The {} variant needs a QP-capable solver; '{}' does not \
                 support quadratic objectives",
                self.code(),
                variant,
                solver
            ),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ShapeError> for EngineError {
    fn from(err: ShapeError) -> Self {
        EngineError::Shape(err)
    }
}

impl From<ModelError> for EngineError {
    fn from(err: ModelError) -> Self {
        EngineError::Model(err)
    }
}

impl From<SolverError> for EngineError {
    fn from(err: SolverError) -> Self {
        EngineError::Solver(err)
    }
}
