//! Engine configuration.

/// Which engine to run: serial or distributed, crossed with the
/// localization variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    /// Serial L-shaped, no localization.
    Ls,
    /// Serial regularized decomposition.
    Rd,
    /// Serial trust region.
    Tr,
    /// Serial level sets.
    Lv,
    /// Distributed L-shaped.
    Dls,
    /// Distributed regularized decomposition.
    Drd,
    /// Distributed trust region.
    Dtr,
    /// Distributed level sets (asynchronous).
    Dlv,
}

/// The localization half of a [`SolverKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalizationKind {
    Plain,
    Regularized,
    TrustRegion,
    LevelSet,
}

impl LocalizationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LocalizationKind::Plain => "plain",
            LocalizationKind::Regularized => "regularized",
            LocalizationKind::TrustRegion => "trust_region",
            LocalizationKind::LevelSet => "level_set",
        }
    }
}

impl SolverKind {
    pub fn is_distributed(self) -> bool {
        matches!(
            self,
            SolverKind::Dls | SolverKind::Drd | SolverKind::Dtr | SolverKind::Dlv
        )
    }

    pub fn localization(self) -> LocalizationKind {
        match self {
            SolverKind::Ls | SolverKind::Dls => LocalizationKind::Plain,
            SolverKind::Rd | SolverKind::Drd => LocalizationKind::Regularized,
            SolverKind::Tr | SolverKind::Dtr => LocalizationKind::TrustRegion,
            SolverKind::Lv | SolverKind::Dlv => LocalizationKind::LevelSet,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SolverKind::Ls => "ls",
            SolverKind::Rd => "rd",
            SolverKind::Tr => "tr",
            SolverKind::Lv => "lv",
            SolverKind::Dls => "dls",
            SolverKind::Drd => "drd",
            SolverKind::Dtr => "dtr",
            SolverKind::Dlv => "dlv",
        }
    }
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How to pick the initial first-stage point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Crash {
    /// User-supplied point, or random within the first-stage bounds.
    #[default]
    None,
    /// Solve the expected-value problem and start from its first stage.
    Evp,
}

/// Engine parameters with per-variant defaults.
#[derive(Debug, Clone)]
pub struct SolverParams {
    /// Progress / optimality tolerance.
    pub tau: f64,
    /// Step-acceptance parameter. `None` picks the variant default
    /// (0.5 regularized, 1e−4 trust region).
    pub gamma: Option<f64>,
    /// Level parameter for the level-set variant.
    pub lambda: f64,
    /// Fraction of subproblems that must report before the asynchronous
    /// coordinator advances its timestamp.
    pub kappa: f64,
    /// Optimality cuts aggregated per master row.
    pub bundle: usize,
    /// Initial regularization weight.
    pub sigma: f64,
    /// Trust-region radius cap. `None` picks 1e3 (or the autotuned value).
    pub max_radius: Option<f64>,
    /// Initial-point strategy.
    pub crash: Crash,
    /// Heuristic initialization of σ / Δ̄ from ‖x₀‖∞.
    pub autotune: bool,
    /// Emit per-iteration progress through the tracing sink.
    pub log: bool,
    /// Keep the master LP-only: delayed θ costs and 1-norm projection.
    pub linearize: bool,
    /// Turn infeasible subproblems into feasibility cuts instead of
    /// terminating.
    pub checkfeas: bool,
    /// Iteration (timestamp) cap before giving up.
    pub max_iterations: usize,
    /// Worker count for the distributed engines. `None` uses the number of
    /// CPUs, clamped to the subproblem count.
    pub workers: Option<usize>,
    /// Starting point; validated against the first-stage length and clamped
    /// into the first-stage bounds.
    pub initial_point: Option<Vec<f64>>,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            tau: 1e-6,
            gamma: None,
            lambda: 0.5,
            kappa: 0.3,
            bundle: 1,
            sigma: 1.0,
            max_radius: None,
            crash: Crash::None,
            autotune: false,
            log: false,
            linearize: false,
            checkfeas: false,
            max_iterations: 500,
            workers: None,
            initial_point: None,
        }
    }
}

impl SolverParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_kappa(mut self, kappa: f64) -> Self {
        self.kappa = kappa;
        self
    }

    pub fn with_bundle(mut self, bundle: usize) -> Self {
        self.bundle = bundle;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn with_max_radius(mut self, radius: f64) -> Self {
        self.max_radius = Some(radius);
        self
    }

    pub fn with_crash(mut self, crash: Crash) -> Self {
        self.crash = crash;
        self
    }

    pub fn with_autotune(mut self, enabled: bool) -> Self {
        self.autotune = enabled;
        self
    }

    pub fn with_log(mut self, enabled: bool) -> Self {
        self.log = enabled;
        self
    }

    pub fn with_linearize(mut self, enabled: bool) -> Self {
        self.linearize = enabled;
        self
    }

    pub fn with_checkfeas(mut self, enabled: bool) -> Self {
        self.checkfeas = enabled;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_initial_point(mut self, point: Vec<f64>) -> Self {
        self.initial_point = Some(point);
        self
    }

    /// γ with the variant default filled in.
    pub fn gamma_for(&self, kind: LocalizationKind) -> f64 {
        self.gamma.unwrap_or(match kind {
            LocalizationKind::TrustRegion => 1e-4,
            _ => 0.5,
        })
    }
}
