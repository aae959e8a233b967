//! Runner for the built-in example programs across engine variants.

mod problems;

use clap::{Parser, Subcommand, ValueEnum};
use lshaped_clarabel::ClarabelSolver;
use lshaped_engine::{extensive_form, solve, SolverKind, SolverParams, StochasticProgram};
use lshaped_core::solver::Solver;
use serde::Serialize;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "L-shaped decomposition runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve a built-in program with one or more engine variants
    Run(RunArgs),
    /// List the built-in programs
    List,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Program to solve
    #[arg(long, value_enum, default_value = "farmer")]
    problem: Problem,

    /// Engine variants to run
    #[arg(long = "kind", value_enum, value_delimiter = ',', default_value = "ls")]
    kinds: Vec<Kind>,

    /// Optimality cuts aggregated per master row
    #[arg(long, default_value_t = 1)]
    bundle: usize,

    /// Worker count for the distributed variants
    #[arg(long)]
    workers: Option<usize>,

    /// Turn infeasible subproblems into feasibility cuts
    #[arg(long)]
    checkfeas: bool,

    /// Keep the run LP-only (delayed θ costs, 1-norm projection)
    #[arg(long)]
    linearize: bool,

    /// Emit per-iteration progress through tracing
    #[arg(long)]
    log: bool,

    /// Output format for stdout
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Problem {
    Simple,
    Farmer,
}

impl Problem {
    fn build(self) -> StochasticProgram {
        match self {
            Problem::Simple => problems::simple(),
            Problem::Farmer => problems::farmer(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Problem::Simple => "simple",
            Problem::Farmer => "farmer",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Ls,
    Rd,
    Tr,
    Lv,
    Dls,
    Drd,
    Dtr,
    Dlv,
}

impl From<Kind> for SolverKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Ls => SolverKind::Ls,
            Kind::Rd => SolverKind::Rd,
            Kind::Tr => SolverKind::Tr,
            Kind::Lv => SolverKind::Lv,
            Kind::Dls => SolverKind::Dls,
            Kind::Drd => SolverKind::Drd,
            Kind::Dtr => SolverKind::Dtr,
            Kind::Dlv => SolverKind::Dlv,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize, Debug)]
struct RunRecord {
    problem: &'static str,
    kind: &'static str,
    status: &'static str,
    objective: f64,
    reference: f64,
    lower_bound: f64,
    gap: f64,
    iterations: usize,
    num_cuts: usize,
    duration_ms: f64,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Command::List => {
            println!("simple  2 scenarios, 2 first-stage variables, optimum 8");
            println!("farmer  3 scenarios, 3 crops, optimum -108390");
        }
        Command::Run(args) => run(args),
    }
}

fn run(args: RunArgs) {
    let program = args.problem.build();
    let reference = reference_objective(&program);

    let mut records = Vec::new();
    for kind in &args.kinds {
        let kind = SolverKind::from(*kind);
        let mut params = SolverParams::new()
            .with_bundle(args.bundle)
            .with_checkfeas(args.checkfeas)
            .with_linearize(args.linearize)
            .with_log(args.log);
        if let Some(workers) = args.workers {
            params = params.with_workers(workers);
        }

        let started = Instant::now();
        match solve(&program, kind, ClarabelSolver::new(), params) {
            Ok(report) => records.push(RunRecord {
                problem: args.problem.name(),
                kind: kind.as_str(),
                status: report.status.as_str(),
                objective: report.objective,
                reference,
                lower_bound: report.lower_bound,
                gap: report.gap,
                iterations: report.iterations,
                num_cuts: report.num_cuts,
                duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            }),
            Err(err) => {
                eprintln!("{kind}: {err}");
                std::process::exit(1);
            }
        }
    }

    match args.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&records).expect("serialize records")
            );
        }
        OutputFormat::Table => {
            println!(
                "{:<8} {:<6} {:<20} {:<14} {:<10} {:>6} {:>6} {:>10}",
                "problem", "kind", "status", "objective", "gap", "iters", "cuts", "ms"
            );
            for record in &records {
                println!(
                    "{:<8} {:<6} {:<20} {:<14.4} {:<10.2e} {:>6} {:>6} {:>10.1}",
                    record.problem,
                    record.kind,
                    record.status,
                    record.objective,
                    record.gap,
                    record.iterations,
                    record.num_cuts,
                    record.duration_ms
                );
            }
        }
    }
}

fn reference_objective(program: &StochasticProgram) -> f64 {
    let model = extensive_form(program).expect("extensive form");
    let mut solver = ClarabelSolver::new();
    match solver.solve(&model) {
        Ok(solution) if solution.status.is_optimal() => solution.objective,
        _ => f64::NAN,
    }
}
