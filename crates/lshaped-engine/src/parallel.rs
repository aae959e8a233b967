//! Distributed master loop: one coordinator, W workers.
//!
//! Workers own disjoint subproblem subsets and never touch master state;
//! the coordinator owns the master, the pools and the histories and never
//! holds a subproblem LP. They talk over three typed channels:
//!
//! - `decisions`: coordinator → every worker, `(t, x_t)` snapshots by value
//! - `work`: coordinator → each worker, "compute at t" or the shutdown
//!   poison
//! - `cutqueue`: workers → coordinator, `(t, Q_sub, cut)` messages
//!
//! The coordinator advances its timestamp once a κ-fraction of subproblems
//! reported for the current one (κ = 1 for the synchronous variants) and
//! the master has support under every θ. Late cuts from older timestamps
//! are still applied to the master (they stay valid lower supports) and
//! attribute to their own timestamp's accounting.

use crate::config::{SolverKind, SolverParams};
use crate::engine::{build_report, setup, Setup};
use crate::error::{EngineError, Report, TerminationStatus};
use crate::progress::ProgressUpdate;
use crate::program::StochasticProgram;
use crossbeam_channel::{unbounded, Receiver, Sender};
use lshaped_core::bundle::BundleAccumulator;
use lshaped_core::cut::Cut;
use lshaped_core::solver::{SolveStatus, Solver, SolverError};
use lshaped_core::subproblem::Subproblem;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Coordinator → worker orders. `Shutdown` is the poison value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkOrder {
    Evaluate(u64),
    Shutdown,
}

/// One subproblem result, stamped with the timestamp it was computed for.
#[derive(Debug)]
struct CutMessage {
    timestamp: u64,
    subproblem: usize,
    value: f64,
    cut: Cut,
}

#[derive(Debug)]
enum WorkerMessage {
    Cut(CutMessage),
    Fault { message: String },
}

struct Worker<S> {
    id: usize,
    subproblems: Vec<Subproblem<S>>,
    work: Receiver<WorkOrder>,
    decisions: Receiver<(u64, Vec<f64>)>,
    cuts: Sender<WorkerMessage>,
    checkfeas: bool,
    cache: BTreeMap<u64, Vec<f64>>,
}

impl<S: Solver> Worker<S> {
    fn run(mut self) {
        debug!(
            component = "worker",
            operation = "start",
            status = "success",
            worker = self.id,
            subproblems = self.subproblems.len(),
            "Worker online"
        );
        while let Ok(order) = self.work.recv() {
            let timestamp = match order {
                WorkOrder::Shutdown => break,
                WorkOrder::Evaluate(timestamp) => timestamp,
            };
            let Some(x) = self.decision(timestamp) else {
                break;
            };
            for subproblem in &mut self.subproblems {
                match subproblem.evaluate(&x, self.checkfeas) {
                    Ok(evaluation) => {
                        let message = WorkerMessage::Cut(CutMessage {
                            timestamp,
                            subproblem: subproblem.id(),
                            value: evaluation.value,
                            cut: evaluation.cut,
                        });
                        if self.cuts.send(message).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = self.cuts.send(WorkerMessage::Fault {
                            message: err.to_string(),
                        });
                        return;
                    }
                }
            }
        }
        debug!(
            component = "worker",
            operation = "stop",
            status = "success",
            worker = self.id,
            "Worker offline"
        );
    }

    /// Block until the decision for `timestamp` arrived, draining the
    /// decisions channel into the local snapshot cache.
    fn decision(&mut self, timestamp: u64) -> Option<Vec<f64>> {
        loop {
            if let Some(x) = self.cache.get(&timestamp) {
                let x = x.clone();
                self.cache.retain(|&t, _| t >= timestamp);
                return Some(x);
            }
            match self.decisions.recv() {
                Ok((t, x)) => {
                    self.cache.insert(t, x);
                }
                Err(_) => return None,
            }
        }
    }
}

/// Per-timestamp accounting on the coordinator.
struct PassState {
    x: Vec<f64>,
    accumulator: BundleAccumulator,
    values: Vec<Option<f64>>,
    finished: usize,
}

struct Coordinator<S: Solver> {
    run: Setup<S>,
    projection_solver: S,
    num_subproblems: usize,
    /// Reports required for the current timestamp before advancing.
    threshold: usize,
    work_txs: Vec<Sender<WorkOrder>>,
    decision_txs: Vec<Sender<(u64, Vec<f64>)>>,
    cuts_rx: Receiver<WorkerMessage>,
    passes: BTreeMap<u64, PassState>,
    current: u64,
    /// Cut rows inserted into the master so far.
    cut_rows: usize,
}

impl<S: Solver + Clone> Coordinator<S> {
    fn dispatch(&mut self, timestamp: u64) {
        self.passes.insert(
            timestamp,
            PassState {
                x: self.run.state.x.clone(),
                accumulator: BundleAccumulator::new(self.run.bundler),
                values: vec![None; self.num_subproblems],
                finished: 0,
            },
        );
        for tx in &self.decision_txs {
            let _ = tx.send((timestamp, self.run.state.x.clone()));
        }
        for tx in &self.work_txs {
            let _ = tx.send(WorkOrder::Evaluate(timestamp));
        }
    }

    fn run_loop(&mut self) -> Result<(TerminationStatus, usize), EngineError> {
        self.dispatch(0);
        loop {
            // Wait for one message, then drain what is already queued;
            // bounded consumption so a full pass cannot starve the advance.
            let message = self.cuts_rx.recv().map_err(|_| {
                EngineError::Solver(SolverError::Backend {
                    message: "all workers disconnected".to_string(),
                })
            })?;
            if let Some(status) = self.handle(message)? {
                return Ok((status, self.current as usize + 1));
            }
            for _ in 0..self.num_subproblems {
                match self.cuts_rx.try_recv() {
                    Ok(message) => {
                        if let Some(status) = self.handle(message)? {
                            return Ok((status, self.current as usize + 1));
                        }
                    }
                    Err(_) => break,
                }
            }

            if self.ready_to_advance() {
                if let Some(status) = self.advance()? {
                    return Ok((status, self.current as usize + 1));
                }
                if self.current as usize >= self.run.max_iterations {
                    warn!(
                        component = "coordinator",
                        operation = "terminate",
                        status = "stopped_prematurely",
                        timestamp = self.current,
                        gap = self.run.state.gap(),
                        "Timestamp cap reached"
                    );
                    return Ok((TerminationStatus::StoppedPrematurely, self.current as usize));
                }
            }
        }
    }

    fn handle(
        &mut self,
        message: WorkerMessage,
    ) -> Result<Option<TerminationStatus>, EngineError> {
        match message {
            WorkerMessage::Fault { message } => {
                Err(EngineError::Solver(SolverError::Backend { message }))
            }
            WorkerMessage::Cut(cut) => self.apply(cut),
        }
    }

    fn apply(&mut self, message: CutMessage) -> Result<Option<TerminationStatus>, EngineError> {
        let CutMessage {
            timestamp,
            subproblem,
            value,
            cut,
        } = message;

        match &cut {
            Cut::Unbounded(id) => {
                info!(
                    component = "coordinator",
                    operation = "terminate",
                    status = "unbounded",
                    subproblem = *id,
                    "Subproblem unbounded"
                );
                return Ok(Some(TerminationStatus::Unbounded));
            }
            Cut::Infeasible(id) => {
                info!(
                    component = "coordinator",
                    operation = "terminate",
                    status = "infeasible",
                    subproblem = *id,
                    "Subproblem infeasible and feasibility generation is off"
                );
                return Ok(Some(TerminationStatus::Infeasible));
            }
            _ => {}
        }

        let pass = self
            .passes
            .get_mut(&timestamp)
            .expect("cut for a timestamp that was never dispatched");
        let finished_cut = pass.accumulator.push(subproblem, cut, value);
        pass.values[subproblem] = Some(value);
        pass.finished += 1;
        let complete = pass.finished == self.num_subproblems;
        let pass_x = if complete { pass.x.clone() } else { Vec::new() };
        let total: f64 = if complete {
            pass.values
                .iter()
                .map(|v| v.unwrap_or(f64::INFINITY))
                .sum()
        } else {
            0.0
        };

        if let Some(cut) = finished_cut {
            let cut = Arc::new(cut);
            if let Some(row) = self.run.master.insert_cut(&cut)? {
                self.run.state.num_cuts += 1;
                self.cut_rows += 1;
                if self.run.localization.is_localized() {
                    self.run.pools.insert(cut, row);
                }
            }
        }

        if complete {
            // The pass's upper value attributes to its own timestamp even
            // when the clock has moved on.
            let q = self.run.master.base_objective(&pass_x) + total;
            self.run.state.x = pass_x;
            self.run.state.q_current = q;
            self.run.state.q_history.push(q);
            self.run
                .localization
                .take_step(&mut self.run.state, &mut self.run.master, q, self.run.tau)?;
            self.run
                .state
                .incumbent_history
                .push(self.run.state.q_incumbent);
            debug!(
                component = "coordinator",
                operation = "take_step",
                status = "success",
                timestamp,
                q,
                q_incumbent = self.run.state.q_incumbent,
                "Completed evaluation pass"
            );
            if timestamp < self.current {
                self.passes.remove(&timestamp);
            }
        }
        Ok(None)
    }

    fn ready_to_advance(&self) -> bool {
        let Some(pass) = self.passes.get(&self.current) else {
            return false;
        };
        pass.finished >= self.threshold
            && self.cut_rows >= self.run.bundler.num_slots()
            && self.run.master.ready()
    }

    fn advance(&mut self) -> Result<Option<TerminationStatus>, EngineError> {
        let tau = self.run.tau;

        if self.run.localization.is_localized() {
            for cut in self.run.pools.drain_violating() {
                if let Some(row) = self.run.master.insert_cut(&cut)? {
                    self.run.pools.insert(cut, row);
                }
            }
        }

        let solution = self.run.master.solve()?;
        match solution.status {
            SolveStatus::Optimal => {}
            SolveStatus::Infeasible => return Ok(Some(TerminationStatus::Infeasible)),
            SolveStatus::Unbounded => return Ok(Some(TerminationStatus::Unbounded)),
            SolveStatus::Other => {
                warn!(
                    component = "coordinator",
                    operation = "solve_master",
                    status = "error",
                    gap = self.run.state.gap(),
                    "Master solve failed; surrendering with the gap reached so far"
                );
                return Ok(Some(TerminationStatus::StoppedPrematurely));
            }
        }

        let (x, thetas) = self.run.master.read_decision(&solution);
        self.run.state.x = x;
        self.run.state.thetas = thetas;
        self.run.state.theta = self
            .run
            .master
            .lower_model(&self.run.state.x, &self.run.state.thetas);
        self.run.state.theta_history.push(self.run.state.theta);

        if let Some(level) = self.run.localization.prepare_level(&self.run.state) {
            if let Some((px, pthetas)) =
                self.run
                    .master
                    .project_level(level, &self.run.state.xi, &mut self.projection_solver)?
            {
                self.run.state.x = px;
                self.run.state.thetas = pthetas;
                self.run.state.xi = self.run.state.x.clone();
            }
        }
        if let Some(parameter) = self.run.localization.stability_parameter() {
            if parameter.is_finite() {
                self.run.state.delta_history.push(parameter);
            }
        }

        if self.run.localization.is_localized() {
            let evicted = self
                .run
                .pools
                .remove_inactive(&self.run.state.x, &self.run.state.thetas, tau);
            self.run.master.delete_rows(&evicted);
            self.run
                .pools
                .queue_violated(&self.run.state.x, &self.run.state.thetas, tau);
        }

        self.run.sink.update(&ProgressUpdate {
            iteration: self.current as usize,
            objective: self.run.state.q_incumbent,
            lower_bound: self.run.state.theta,
            gap: self.run.state.gap(),
            num_cuts: self.run.state.num_cuts,
        });

        if self.run.localization.check_optimality(&self.run.state, tau) {
            return Ok(Some(TerminationStatus::Optimal));
        }

        self.current += 1;
        // Passes behind the clock stay only while stragglers are owed.
        let num_subproblems = self.num_subproblems;
        let current = self.current;
        self.passes
            .retain(|&t, pass| t >= current || pass.finished < num_subproblems);
        self.dispatch(self.current);
        Ok(None)
    }
}

pub(crate) fn solve_distributed<S: Solver + Clone + Send + 'static>(
    program: &StochasticProgram,
    kind: SolverKind,
    solver: S,
    params: &SolverParams,
) -> Result<Report, EngineError> {
    let run = setup(program, kind, &solver, params)?;
    let n_first = run.master.n_first();
    let num_subproblems = program.num_scenarios();

    let mut subproblems = Vec::with_capacity(num_subproblems);
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

    let worker_count = params
        .workers
        .unwrap_or_else(num_cpus::get)
        .clamp(1, num_subproblems);
    let chunk = num_subproblems.div_ceil(worker_count);

    let (cuts_tx, cuts_rx) = unbounded();
    let mut work_txs = Vec::new();
    let mut decision_txs = Vec::new();
    let mut handles = Vec::new();

    let mut remaining = subproblems.into_iter();
    for worker_id in 0..worker_count {
        let owned: Vec<_> = remaining.by_ref().take(chunk).collect();
        if owned.is_empty() {
            break;
        }
        let (work_tx, work_rx) = unbounded();
        let (decision_tx, decision_rx) = unbounded();
        let worker = Worker {
            id: worker_id,
            subproblems: owned,
            work: work_rx,
            decisions: decision_rx,
            cuts: cuts_tx.clone(),
            checkfeas: params.checkfeas,
            cache: BTreeMap::new(),
        };
        work_txs.push(work_tx);
        decision_txs.push(decision_tx);
        handles.push(thread::spawn(move || worker.run()));
    }
    drop(cuts_tx);

    // The asynchronous level-set coordinator advances at a κ-fraction of
    // reports; every other variant synchronizes on the full pass.
    let threshold = if kind == SolverKind::Dlv {
        ((params.kappa * num_subproblems as f64).ceil() as usize).clamp(1, num_subproblems)
    } else {
        num_subproblems
    };

    info!(
        component = "coordinator",
        operation = "start",
        status = "success",
        kind = %kind,
        workers = handles.len(),
        threshold,
        "Distributed engine online"
    );

    let mut coordinator = Coordinator {
        run,
        projection_solver: solver,
        num_subproblems,
        threshold,
        work_txs,
        decision_txs,
        cuts_rx,
        passes: BTreeMap::new(),
        current: 0,
        cut_rows: 0,
    };

    let outcome = coordinator.run_loop();

    // Poison the work channels and discard whatever is still queued.
    for tx in &coordinator.work_txs {
        let _ = tx.send(WorkOrder::Shutdown);
    }
    let report = match &outcome {
        Ok((status, iterations)) => Ok(build_report(&coordinator.run.state, *status, *iterations)),
        Err(err) => Err(err.clone()),
    };
    drop(coordinator);
    for handle in handles {
        let _ = handle.join();
    }
    report
}
