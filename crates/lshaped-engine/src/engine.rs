//! Shared run setup and the serial master loop.

use crate::config::{Crash, SolverKind, SolverParams};
use crate::error::{EngineError, Report, ShapeError, TerminationStatus};
use crate::extensive::evp_point;
use crate::localization::Localization;
use crate::master::Master;
use crate::progress::{LogSink, NullSink, ProgressSink, ProgressUpdate};
use crate::program::StochasticProgram;
use crate::state::LShapedState;
use lshaped_core::bundle::{BundleAccumulator, Bundler};
use lshaped_core::committee::CutPools;
use lshaped_core::cut::Cut;
use lshaped_core::solver::{SolveStatus, Solver};
use lshaped_core::subproblem::Subproblem;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the serial and distributed drivers share.
pub(crate) struct Setup<S> {
    pub master: Master<S>,
    pub pools: CutPools,
    pub localization: Localization,
    pub state: LShapedState,
    pub bundler: Bundler,
    pub checkfeas: bool,
    pub tau: f64,
    pub max_iterations: usize,
    pub sink: Box<dyn ProgressSink>,
}

pub(crate) fn setup<S: Solver + Clone>(
    program: &StochasticProgram,
    kind: SolverKind,
    solver: &S,
    params: &SolverParams,
) -> Result<Setup<S>, EngineError> {
    program.validate()?;

    let bundler = Bundler::new(params.bundle, program.num_scenarios());
    let linearize = params.linearize || params.checkfeas;
    if params.checkfeas && !params.linearize {
        debug!(
            component = "engine",
            operation = "init",
            status = "success",
            "Feasibility generation enables delayed θ costs"
        );
    }

    let (mut master, mirrors) =
        Master::new(program, bundler.num_slots(), linearize, solver.clone())?;
    let x0 = initial_point(program, params, solver)?;
    let state = LShapedState::new(x0, bundler.num_slots());
    let localization = Localization::new(kind.localization(), params, &state.xi);

    if localization.requires_master_qp() && !solver.supports_quadratic_objective() {
        return Err(EngineError::Capability {
            solver: solver.name(),
            variant: "regularized decomposition",
        });
    }
    if localization.requires_projection_qp()
        && !linearize
        && !solver.supports_quadratic_objective()
    {
        return Err(EngineError::Capability {
            solver: solver.name(),
            variant: "level-set projection",
        });
    }
    localization.init_master(&mut master, &state)?;

    let pools = CutPools::new(mirrors, bundler.num_slots());
    let sink: Box<dyn ProgressSink> = if params.log {
        Box::new(LogSink)
    } else {
        Box::new(NullSink)
    };

    info!(
        component = "engine",
        operation = "init",
        status = "success",
        kind = %kind,
        variant = localization.kind().as_str(),
        scenarios = program.num_scenarios(),
        slots = bundler.num_slots(),
        bundle = bundler.bundle_size(),
        linearize,
        checkfeas = params.checkfeas,
        "Engine assembled"
    );

    Ok(Setup {
        master,
        pools,
        localization,
        state,
        bundler,
        checkfeas: params.checkfeas,
        tau: params.tau,
        max_iterations: params.max_iterations,
        sink,
    })
}

/// Initial point: user-supplied (clamped into bounds), EVP crash, or random
/// within the first-stage bounds.
fn initial_point<S: Solver + Clone>(
    program: &StochasticProgram,
    params: &SolverParams,
    solver: &S,
) -> Result<Vec<f64>, EngineError> {
    let n_first = program.first_stage_columns();
    if let Some(point) = &params.initial_point {
        if point.len() != n_first {
            return Err(ShapeError::InitialPointLength {
                expected: n_first,
                got: point.len(),
            }
            .into());
        }
        return Ok(point
            .iter()
            .zip(program.first_stage.variables())
            .map(|(value, variable)| value.clamp(variable.bounds.lower, variable.bounds.upper))
            .collect());
    }

    if params.crash == Crash::Evp {
        let mut crash_solver = solver.clone();
        return evp_point(program, &mut crash_solver);
    }

    let mut rng = StdRng::from_entropy();
    Ok(program
        .first_stage
        .variables()
        .iter()
        .map(|variable| {
            let bounds = variable.bounds;
            if bounds.lower.is_finite() && bounds.upper.is_finite() {
                rng.gen_range(bounds.lower..=bounds.upper)
            } else if bounds.lower.is_finite() {
                bounds.lower
            } else if bounds.upper.is_finite() {
                bounds.upper
            } else {
                0.0
            }
        })
        .collect())
}

pub(crate) fn build_report(
    state: &LShapedState,
    status: TerminationStatus,
    iterations: usize,
) -> Report {
    Report {
        status,
        objective: if state.q_incumbent.is_finite() {
            state.q_incumbent
        } else {
            f64::NAN
        },
        lower_bound: state.theta,
        gap: state.gap(),
        x: state.xi.clone(),
        iterations,
        num_cuts: state.num_cuts,
        q_history: state.q_history.clone(),
        theta_history: state.theta_history.clone(),
        incumbent_history: state.incumbent_history.clone(),
        delta_history: state.delta_history.clone(),
    }
}

pub(crate) fn solve_serial<S: Solver + Clone>(
    program: &StochasticProgram,
    kind: SolverKind,
    solver: S,
    params: &SolverParams,
) -> Result<Report, EngineError> {
    let mut run = setup(program, kind, &solver, params)?;

    let n_first = run.master.n_first();
    let mut subproblems = Vec::with_capacity(program.num_scenarios());
    for (index, scenario) in program.scenarios.iter().enumerate() {
        subproblems.push(Subproblem::new(
            index,
            scenario.probability,
            scenario.model.clone(),
            scenario.links.clone(),
            n_first,
            solver.clone(),
        )?);
    }
    let mut projection_solver = solver.clone();

    for iteration in 0..run.max_iterations {
        if let Some(status) = iterate(&mut run, &mut subproblems, &mut projection_solver, iteration)?
        {
            info!(
                component = "engine",
                operation = "terminate",
                status = %status,
                iteration,
                objective = run.state.q_incumbent,
                gap = run.state.gap(),
                "Serial engine finished"
            );
            return Ok(build_report(&run.state, status, iteration + 1));
        }
    }

    warn!(
        component = "engine",
        operation = "terminate",
        status = "stopped_prematurely",
        iterations = run.max_iterations,
        gap = run.state.gap(),
        "Iteration cap reached"
    );
    Ok(build_report(
        &run.state,
        TerminationStatus::StoppedPrematurely,
        run.max_iterations,
    ))
}

/// One serial iteration: evaluate, cut, step, resolve, project, prune,
/// check.
fn iterate<S: Solver + Clone>(
    run: &mut Setup<S>,
    subproblems: &mut [Subproblem<S>],
    projection_solver: &mut S,
    iteration: usize,
) -> Result<Option<TerminationStatus>, EngineError> {
    let Setup {
        master,
        pools,
        localization,
        state,
        bundler,
        checkfeas,
        tau,
        sink,
        ..
    } = run;
    let tau = *tau;

    // Revive cuts that went violated while parked in the inactive pool.
    if localization.is_localized() {
        for cut in pools.drain_violating() {
            if let Some(row) = master.insert_cut(&cut)? {
                pools.insert(cut, row);
            }
        }
    }

    // Evaluate every subproblem at the current point; cuts flow through the
    // bundler into the master.
    let mut accumulator = BundleAccumulator::new(*bundler);
    let mut total_value = 0.0;
    let mut unbounded = None;
    let mut infeasible = None;
    let mut finished_cuts = Vec::new();
    for subproblem in subproblems.iter_mut() {
        let evaluation = subproblem.evaluate(&state.x, *checkfeas)?;
        total_value += evaluation.value;
        match &evaluation.cut {
            Cut::Unbounded(id) => unbounded = Some(*id),
            Cut::Infeasible(id) => infeasible = Some(*id),
            _ => {}
        }
        if let Some(cut) = accumulator.push(subproblem.id(), evaluation.cut, evaluation.value) {
            finished_cuts.push(cut);
        }
    }
    finished_cuts.extend(accumulator.finish());

    for cut in finished_cuts {
        let cut = Arc::new(cut);
        if let Some(row) = master.insert_cut(&cut)? {
            state.num_cuts += 1;
            if localization.is_localized() {
                pools.insert(cut, row);
            }
        }
    }

    // Upper value at the evaluated point, then the terminal signals.
    let q = master.base_objective(&state.x) + total_value;
    state.q_current = q;
    state.q_history.push(q);
    if let Some(id) = unbounded {
        info!(
            component = "engine",
            operation = "terminate",
            status = "unbounded",
            subproblem = id,
            "Subproblem unbounded"
        );
        return Ok(Some(TerminationStatus::Unbounded));
    }
    if let Some(id) = infeasible {
        info!(
            component = "engine",
            operation = "terminate",
            status = "infeasible",
            subproblem = id,
            "Subproblem infeasible and feasibility generation is off"
        );
        return Ok(Some(TerminationStatus::Infeasible));
    }

    // Stabilization update from (Q, Q̃, θ).
    let step = localization.take_step(state, master, q, tau)?;
    state.incumbent_history.push(state.q_incumbent);
    debug!(
        component = "engine",
        operation = "take_step",
        status = "success",
        iteration,
        step = ?step,
        q,
        q_incumbent = state.q_incumbent,
        theta = state.theta,
        "Stabilization step"
    );

    // Resolve the master.
    let solution = master.solve()?;
    match solution.status {
        SolveStatus::Optimal => {}
        SolveStatus::Infeasible => return Ok(Some(TerminationStatus::Infeasible)),
        SolveStatus::Unbounded => return Ok(Some(TerminationStatus::Unbounded)),
        SolveStatus::Other => {
            warn!(
                component = "engine",
                operation = "solve_master",
                status = "error",
                gap = state.gap(),
                "Master solve failed; surrendering with the gap reached so far"
            );
            return Ok(Some(TerminationStatus::StoppedPrematurely));
        }
    }

    // Mirror the decision and the lower model.
    let (x, thetas) = master.read_decision(&solution);
    state.x = x;
    state.thetas = thetas;
    state.theta = master.lower_model(&state.x, &state.thetas);
    state.theta_history.push(state.theta);

    // Level-set projection onto λQ̃ + (1−λ)θ.
    if let Some(level) = localization.prepare_level(state) {
        if let Some((px, pthetas)) = master.project_level(level, &state.xi, projection_solver)? {
            state.x = px;
            state.thetas = pthetas;
            state.xi = state.x.clone();
        }
    }
    if let Some(parameter) = localization.stability_parameter() {
        if parameter.is_finite() {
            state.delta_history.push(parameter);
        }
    }

    // Committee maintenance: age out inactive cuts, queue revived ones.
    if localization.is_localized() {
        let evicted = pools.remove_inactive(&state.x, &state.thetas, tau);
        master.delete_rows(&evicted);
        pools.queue_violated(&state.x, &state.thetas, tau);
    }

    sink.update(&ProgressUpdate {
        iteration,
        objective: state.q_incumbent,
        lower_bound: state.theta,
        gap: state.gap(),
        num_cuts: state.num_cuts,
    });

    if localization.check_optimality(state, tau) {
        return Ok(Some(TerminationStatus::Optimal));
    }
    Ok(None)
}
