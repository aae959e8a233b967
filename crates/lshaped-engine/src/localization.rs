//! Localization state machines.
//!
//! One tagged variant per stabilization scheme, each with the same
//! three-method surface the drivers call: install itself on the master,
//! digest a completed evaluation pass (`take_step`), and test optimality.
//! The level-set variant additionally prepares the level for the
//! projection step. Serial and distributed drivers share these machines
//! unchanged.

use crate::config::{LocalizationKind, SolverParams};
use crate::error::EngineError;
use crate::master::Master;
use crate::state::LShapedState;
use lshaped_core::solver::Solver;
use tracing::debug;

/// What a `take_step` call decided, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// First finite pass; incumbent seeded unconditionally.
    Bootstrap,
    /// Regularized: model matches the evaluation within tolerance.
    ExactSerious,
    /// Regularized: sufficient decrease against the convex target.
    ApproximateSerious,
    /// Regularized: no progress, proximal weight halved.
    Null,
    /// Trust region: sufficient decrease, incumbent moved.
    Major,
    /// Trust region: step rejected, radius possibly reduced.
    Minor,
    /// Plain / level set: incumbent improved.
    Incumbent,
    /// Nothing to record.
    None,
}

#[derive(Debug)]
pub(crate) struct Regularized {
    sigma: f64,
    gamma: f64,
}

#[derive(Debug)]
pub(crate) struct TrustRegion {
    delta: f64,
    max_delta: f64,
    consecutive_null: u32,
    gamma: f64,
}

#[derive(Debug)]
pub(crate) struct LevelSet {
    lambda: f64,
    last_level: f64,
}

/// The active stabilization scheme.
#[derive(Debug)]
pub(crate) enum Localization {
    Plain,
    Regularized(Regularized),
    TrustRegion(TrustRegion),
    LevelSet(LevelSet),
}

fn linf(x: &[f64]) -> f64 {
    x.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

fn linf_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .fold(0.0_f64, |m, (x, y)| m.max((x - y).abs()))
}

impl Localization {
    pub fn new(kind: LocalizationKind, params: &SolverParams, x0: &[f64]) -> Self {
        let scale = (0.01 * linf(x0)).max(1.0);
        match kind {
            LocalizationKind::Plain => Localization::Plain,
            LocalizationKind::Regularized => Localization::Regularized(Regularized {
                sigma: if params.autotune { scale } else { params.sigma },
                gamma: params.gamma_for(kind),
            }),
            LocalizationKind::TrustRegion => Localization::TrustRegion(TrustRegion {
                delta: scale,
                max_delta: params
                    .max_radius
                    .unwrap_or(if params.autotune { 1e3 * scale } else { 1e3 }),
                consecutive_null: 0,
                gamma: params.gamma_for(kind),
            }),
            LocalizationKind::LevelSet => Localization::LevelSet(LevelSet {
                lambda: params.lambda,
                last_level: f64::NAN,
            }),
        }
    }

    pub fn kind(&self) -> LocalizationKind {
        match self {
            Localization::Plain => LocalizationKind::Plain,
            Localization::Regularized(_) => LocalizationKind::Regularized,
            Localization::TrustRegion(_) => LocalizationKind::TrustRegion,
            Localization::LevelSet(_) => LocalizationKind::LevelSet,
        }
    }

    /// Plain runs without committee maintenance or an incumbent region.
    pub fn is_localized(&self) -> bool {
        !matches!(self, Localization::Plain)
    }

    /// Regularized installs a quadratic proximal term on the master.
    pub fn requires_master_qp(&self) -> bool {
        matches!(self, Localization::Regularized(_))
    }

    /// Level sets project on a QP unless linearized.
    pub fn requires_projection_qp(&self) -> bool {
        matches!(self, Localization::LevelSet(_))
    }

    /// Install the variant's initial shape on the master.
    pub fn init_master<S>(
        &self,
        master: &mut Master<S>,
        state: &LShapedState,
    ) -> Result<(), EngineError> {
        match self {
            Localization::Regularized(rd) => master.set_regularizer(rd.sigma, &state.xi),
            Localization::TrustRegion(tr) => master.set_trust_region(&state.xi, tr.delta),
            Localization::Plain | Localization::LevelSet(_) => Ok(()),
        }
    }

    /// Digest a completed evaluation pass with upper value `q`.
    pub fn take_step<S: Solver>(
        &mut self,
        state: &mut LShapedState,
        master: &mut Master<S>,
        q: f64,
        tau: f64,
    ) -> Result<StepKind, EngineError> {
        let kind = match self {
            Localization::Plain => {
                if q < state.q_incumbent {
                    state.q_incumbent = q;
                    state.xi = state.x.clone();
                    StepKind::Incumbent
                } else {
                    StepKind::None
                }
            }
            Localization::Regularized(rd) => {
                if !state.q_incumbent.is_finite() {
                    if q.is_finite() {
                        state.q_incumbent = q;
                        state.xi = state.x.clone();
                    }
                    master.set_regularizer(rd.sigma, &state.xi)?;
                    StepKind::Bootstrap
                } else if !q.is_finite() {
                    // Feasibility-only round; leave the weight alone.
                    StepKind::None
                } else {
                    let theta = state.theta;
                    if state.theta_populated() && (theta - q).abs() <= tau * (1.0 + theta.abs()) {
                        state.xi = state.x.clone();
                        state.q_incumbent = q;
                        rd.sigma = (rd.sigma * 2.0).min(1e6);
                        master.set_regularizer(rd.sigma, &state.xi)?;
                        StepKind::ExactSerious
                    } else if q + tau * (1.0 + q.abs())
                        <= rd.gamma * state.q_incumbent + (1.0 - rd.gamma) * theta
                    {
                        state.xi = state.x.clone();
                        state.q_incumbent = q;
                        master.set_regularizer(rd.sigma, &state.xi)?;
                        StepKind::ApproximateSerious
                    } else {
                        rd.sigma = (rd.sigma / 2.0).max(1e-6);
                        master.set_regularizer(rd.sigma, &state.xi)?;
                        StepKind::Null
                    }
                }
            }
            Localization::TrustRegion(tr) => {
                if !state.q_incumbent.is_finite() {
                    if q.is_finite() {
                        state.q_incumbent = q;
                        state.xi = state.x.clone();
                    }
                    master.set_trust_region(&state.xi, tr.delta)?;
                    StepKind::Bootstrap
                } else if !q.is_finite() || !state.theta_populated() {
                    master.set_trust_region(&state.xi, tr.delta)?;
                    StepKind::None
                } else {
                    let theta = state.theta;
                    let q_incumbent = state.q_incumbent;
                    let step;
                    if q <= q_incumbent - tr.gamma * (q_incumbent - theta).abs() {
                        let enlarge = (q - q_incumbent).abs() <= 0.5 * (q_incumbent - theta)
                            && linf_dist(&state.xi, &state.x) - tr.delta <= tau;
                        tr.consecutive_null = 0;
                        state.xi = state.x.clone();
                        state.q_incumbent = q;
                        if enlarge {
                            tr.delta = (2.0 * tr.delta).min(tr.max_delta);
                            debug!(
                                component = "localization",
                                operation = "enlarge_radius",
                                status = "success",
                                delta = tr.delta,
                                "Trust region enlarged"
                            );
                        }
                        step = StepKind::Major;
                    } else {
                        let predicted = q_incumbent - theta;
                        if predicted > tau {
                            let rho = tr.delta.min(1.0) * (q - q_incumbent) / predicted;
                            if rho > 0.0 {
                                tr.consecutive_null += 1;
                            }
                            // The two reduce clauses are disjoint; exactly
                            // one division happens.
                            if rho > 3.0
                                || (tr.consecutive_null >= 3 && 1.0 < rho && rho <= 3.0)
                            {
                                tr.consecutive_null = 0;
                                tr.delta /= rho.min(4.0);
                                debug!(
                                    component = "localization",
                                    operation = "reduce_radius",
                                    status = "success",
                                    delta = tr.delta,
                                    rho,
                                    "Trust region reduced"
                                );
                            }
                        }
                        step = StepKind::Minor;
                    }
                    master.set_trust_region(&state.xi, tr.delta)?;
                    step
                }
            }
            Localization::LevelSet(_) => {
                if q.is_finite() && q <= state.q_incumbent {
                    state.q_incumbent = q;
                    StepKind::Incumbent
                } else {
                    StepKind::None
                }
            }
        };
        Ok(kind)
    }

    /// Level for the next projection, once both anchors are populated.
    pub fn prepare_level(&mut self, state: &LShapedState) -> Option<f64> {
        if let Localization::LevelSet(lv) = self {
            if state.theta_populated() && state.q_incumbent.is_finite() {
                let level = lv.lambda * state.q_incumbent + (1.0 - lv.lambda) * state.theta;
                lv.last_level = level;
                return Some(level);
            }
        }
        None
    }

    /// Optimality test. Plain compares the lower model against the latest
    /// upper value; the localized variants compare against the incumbent.
    pub fn check_optimality(&self, state: &LShapedState, tau: f64) -> bool {
        if !state.theta_populated() {
            return false;
        }
        let reference = match self {
            Localization::Plain => state.q_current,
            _ => state.q_incumbent,
        };
        reference.is_finite() && (state.theta - reference).abs() <= tau * (1.0 + state.theta.abs())
    }

    /// The variant's stabilization parameter for the Δ history.
    pub fn stability_parameter(&self) -> Option<f64> {
        match self {
            Localization::Plain => None,
            Localization::Regularized(rd) => Some(rd.sigma),
            Localization::TrustRegion(tr) => Some(tr.delta),
            Localization::LevelSet(lv) => Some(lv.last_level),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::program::{Scenario, StochasticProgram};
    use lshaped_core::model::{Bounds, Model, Variable};
    use lshaped_core::solver::{Solution, SolverError};
    use lshaped_core::subproblem::Linkage;

    const TAU: f64 = 1e-6;

    #[derive(Clone)]
    struct InertSolver;

    impl Solver for InertSolver {
        fn solve(&mut self, _model: &Model) -> Result<Solution, SolverError> {
            Err(SolverError::Backend {
                message: "inert".to_string(),
            })
        }

        fn supports_quadratic_objective(&self) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "inert"
        }
    }

    fn master() -> Master<InertSolver> {
        let mut first = Model::new();
        first
            .add_variable(Variable::new(Bounds::new(-100.0, 100.0), 1.0))
            .unwrap();
        let mut program = StochasticProgram::new(first);
        let mut sub = Model::new();
        sub.add_variable(Variable::new(Bounds::at_least(0.0), 1.0))
            .unwrap();
        let row = sub
            .add_row(vec![0], vec![1.0], Bounds::at_least(0.0))
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
        Master::new(&program, 1, false, InertSolver).unwrap().0
    }

    fn populated_state(x: f64, q_incumbent: f64, theta: f64) -> LShapedState {
        let mut state = LShapedState::new(vec![0.0], 1);
        state.x = vec![x];
        state.q_incumbent = q_incumbent;
        state.theta = theta;
        state.thetas = vec![theta];
        state
    }

    fn trust_region(delta: f64, max_delta: f64) -> Localization {
        let params = SolverParams::new().with_max_radius(max_delta);
        let mut loc = Localization::new(LocalizationKind::TrustRegion, &params, &[0.0]);
        if let Localization::TrustRegion(tr) = &mut loc {
            tr.delta = delta;
        }
        loc
    }

    #[test]
    fn test_plain_tracks_incumbent() {
        let mut loc = Localization::new(LocalizationKind::Plain, &SolverParams::new(), &[0.0]);
        let mut state = populated_state(2.0, f64::INFINITY, 5.0);
        state.q_current = 6.0;

        let step = loc
            .take_step(&mut state, &mut master(), 6.0, TAU)
            .unwrap();
        assert_eq!(step, StepKind::Incumbent);
        assert_eq!(state.q_incumbent, 6.0);
        assert_eq!(state.xi, vec![2.0]);

        // Plain checks against the current value, not the incumbent.
        state.q_current = 5.0 + 1e-8;
        assert!(loc.check_optimality(&state, TAU));
        state.q_current = 5.5;
        assert!(!loc.check_optimality(&state, TAU));
    }

    #[test]
    fn test_regularized_sigma_doubles_on_exact_serious() {
        let params = SolverParams::new().with_sigma(1.0);
        let mut loc = Localization::new(LocalizationKind::Regularized, &params, &[0.0]);
        let mut state = populated_state(1.0, 10.0, 8.0);

        // Exact serious: θ matches Q.
        let step = loc
            .take_step(&mut state, &mut master(), 8.0 + 1e-9, TAU)
            .unwrap();
        assert_eq!(step, StepKind::ExactSerious);
        match &loc {
            Localization::Regularized(rd) => assert_eq!(rd.sigma, 2.0),
            _ => unreachable!(),
        }
        assert_eq!(state.xi, vec![1.0]);
    }

    #[test]
    fn test_regularized_null_step_halves_sigma() {
        let params = SolverParams::new().with_sigma(4.0).with_gamma(0.9);
        let mut loc = Localization::new(LocalizationKind::Regularized, &params, &[0.0]);
        let mut state = populated_state(1.0, 10.0, 8.0);

        // q = 9.9 > γ·10 + 0.1·8 = 9.8 → null.
        let step = loc.take_step(&mut state, &mut master(), 9.9, TAU).unwrap();
        assert_eq!(step, StepKind::Null);
        match &loc {
            Localization::Regularized(rd) => assert_eq!(rd.sigma, 2.0),
            _ => unreachable!(),
        }
        // Incumbent untouched on a null step.
        assert_eq!(state.q_incumbent, 10.0);
        assert_eq!(state.xi, vec![0.0]);
    }

    #[test]
    fn test_regularized_approximate_serious() {
        let params = SolverParams::new().with_sigma(4.0).with_gamma(0.9);
        let mut loc = Localization::new(LocalizationKind::Regularized, &params, &[0.0]);
        let mut state = populated_state(1.0, 10.0, 8.0);

        // q = 9.0 ≤ 9.8 → approximate serious; σ unchanged.
        let step = loc.take_step(&mut state, &mut master(), 9.0, TAU).unwrap();
        assert_eq!(step, StepKind::ApproximateSerious);
        match &loc {
            Localization::Regularized(rd) => assert_eq!(rd.sigma, 4.0),
            _ => unreachable!(),
        }
        assert_eq!(state.q_incumbent, 9.0);
    }

    #[test]
    fn test_trust_region_doubles_and_caps() {
        let mut loc = trust_region(1.0, 3.0);
        let mut master = master();

        // Major step at the boundary with a good model fit: Δ doubles.
        let mut state = populated_state(1.0, 10.0, 8.0);
        let step = loc.take_step(&mut state, &mut master, 9.2, TAU).unwrap();
        assert_eq!(step, StepKind::Major);
        match &loc {
            Localization::TrustRegion(tr) => assert_eq!(tr.delta, 2.0),
            _ => unreachable!(),
        }

        // Again from the new incumbent: 2Δ = 4 is capped at Δ̄ = 3.
        state.x = vec![3.0];
        state.theta = 7.5;
        state.thetas = vec![7.5];
        let step = loc.take_step(&mut state, &mut master, 8.5, TAU).unwrap();
        assert_eq!(step, StepKind::Major);
        match &loc {
            Localization::TrustRegion(tr) => assert_eq!(tr.delta, 3.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_trust_region_major_without_fit_keeps_radius() {
        let mut loc = trust_region(1.0, 8.0);
        // |q − q̃| = 1.1 > ½(q̃ − θ) = 1.0 → accept the step, keep Δ.
        let mut state = populated_state(1.0, 10.0, 8.0);
        let step = loc
            .take_step(&mut state, &mut master(), 8.9, TAU)
            .unwrap();
        assert_eq!(step, StepKind::Major);
        match &loc {
            Localization::TrustRegion(tr) => assert_eq!(tr.delta, 1.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_trust_region_reduce_on_large_rho() {
        let mut loc = trust_region(1.0, 8.0);
        // ρ = (16.2 − 10)/2 = 3.1 > 3 → Δ /= min(ρ, 4).
        let mut state = populated_state(1.0, 10.0, 8.0);
        let step = loc
            .take_step(&mut state, &mut master(), 16.2, TAU)
            .unwrap();
        assert_eq!(step, StepKind::Minor);
        match &loc {
            Localization::TrustRegion(tr) => {
                assert!(tr.delta < 1.0);
                assert!((tr.delta - 1.0 / 3.1).abs() < 1e-9);
                assert_eq!(tr.consecutive_null, 0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_trust_region_reduce_after_consecutive_nulls() {
        let mut loc = trust_region(1.0, 8.0);
        let mut master = master();

        // ρ = (14 − 10)/2 = 2 ∈ (1, 3]: needs three consecutive nulls.
        for expected_consecutive in 1..=2u32 {
            let mut state = populated_state(1.0, 10.0, 8.0);
            let step = loc.take_step(&mut state, &mut master, 14.0, TAU).unwrap();
            assert_eq!(step, StepKind::Minor);
            match &loc {
                Localization::TrustRegion(tr) => {
                    assert_eq!(tr.delta, 1.0);
                    assert_eq!(tr.consecutive_null, expected_consecutive);
                }
                _ => unreachable!(),
            }
        }
        let mut state = populated_state(1.0, 10.0, 8.0);
        loc.take_step(&mut state, &mut master, 14.0, TAU).unwrap();
        match &loc {
            Localization::TrustRegion(tr) => {
                assert_eq!(tr.delta, 0.5);
                assert_eq!(tr.consecutive_null, 0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bootstrap_seeds_incumbent() {
        for kind in [
            LocalizationKind::Regularized,
            LocalizationKind::TrustRegion,
        ] {
            let mut loc = Localization::new(kind, &SolverParams::new(), &[0.0]);
            let mut state = LShapedState::new(vec![2.0], 1);
            let step = loc.take_step(&mut state, &mut master(), 7.0, TAU).unwrap();
            assert_eq!(step, StepKind::Bootstrap);
            assert_eq!(state.q_incumbent, 7.0);
            assert_eq!(state.xi, vec![2.0]);
        }
    }

    #[test]
    fn test_level_set_prepares_level() {
        let params = SolverParams::new().with_lambda(0.25);
        let mut loc = Localization::new(LocalizationKind::LevelSet, &params, &[0.0]);
        let mut state = populated_state(0.0, 12.0, 8.0);

        assert_eq!(loc.take_step(&mut state, &mut master(), 11.0, TAU).unwrap(), StepKind::Incumbent);
        let level = loc.prepare_level(&state).unwrap();
        // 0.25·11 + 0.75·8 = 8.75
        assert_eq!(level, 8.75);
        assert_eq!(loc.stability_parameter(), Some(8.75));

        // Unpopulated θ → no level.
        let fresh = LShapedState::new(vec![0.0], 1);
        assert!(loc.prepare_level(&fresh).is_none());
    }

    #[test]
    fn test_autotune_scales_from_initial_point() {
        let params = SolverParams::new().with_autotune(true);
        let x0 = vec![400.0, -900.0];

        match Localization::new(LocalizationKind::Regularized, &params, &x0) {
            Localization::Regularized(rd) => assert_eq!(rd.sigma, 9.0),
            _ => unreachable!(),
        }
        match Localization::new(LocalizationKind::TrustRegion, &params, &x0) {
            Localization::TrustRegion(tr) => {
                assert_eq!(tr.delta, 9.0);
                assert_eq!(tr.max_delta, 9000.0);
            }
            _ => unreachable!(),
        }
        // Small starting points fall back to the unit scale.
        match Localization::new(LocalizationKind::TrustRegion, &SolverParams::new(), &[0.5]) {
            Localization::TrustRegion(tr) => {
                assert_eq!(tr.delta, 1.0);
                assert_eq!(tr.max_delta, 1e3);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_capability_flags() {
        let params = SolverParams::new();
        assert!(Localization::new(LocalizationKind::Regularized, &params, &[0.0])
            .requires_master_qp());
        assert!(!Localization::new(LocalizationKind::TrustRegion, &params, &[0.0])
            .requires_master_qp());
        assert!(Localization::new(LocalizationKind::LevelSet, &params, &[0.0])
            .requires_projection_qp());
        assert!(!Localization::new(LocalizationKind::Plain, &params, &[0.0]).is_localized());
    }
}
