use std::{
    sync::{Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Sender};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{HhcError, Result},
    grasp::{
        construction::{validate_alpha, CostModel},
        grasp::{Grasp, GraspParams},
        Candidate, Incumbent,
    },
    model::{
        evaluation::LatenessScope,
        problem_instance::{load_problem_instance, Problem},
    },
};

#[derive(Serialize, Clone, Debug)]
pub struct SolverConfig {
    pub problem_instance_location: String,
    /// Total GRASP iterations across all workers. Zero means "until the time limit".
    pub iterations: usize,
    pub alpha: f64,
    pub neighborhood_size: usize,
    pub local_search_rounds: usize,
    pub nbr_threads: usize,
    pub seed: u64,
    pub time_limit: Option<Duration>,
    pub cost_model: CostModel,
    pub lateness_scope: LatenessScope,

    #[serde(skip)]
    pub show_progress: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let params = GraspParams::default();
        SolverConfig {
            problem_instance_location: String::new(),
            iterations: 100,
            alpha: params.alpha,
            neighborhood_size: params.neighborhood_size,
            local_search_rounds: params.local_search_rounds,
            nbr_threads: 1,
            seed: 0,
            time_limit: None,
            cost_model: params.cost_model,
            lateness_scope: params.lateness_scope,
            show_progress: false,
        }
    }
}

impl SolverConfig {
    pub fn grasp_params(&self) -> GraspParams {
        GraspParams {
            alpha: self.alpha,
            neighborhood_size: self.neighborhood_size,
            local_search_rounds: self.local_search_rounds,
            cost_model: self.cost_model,
            lateness_scope: self.lateness_scope,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_alpha(self.alpha)?;
        if self.nbr_threads == 0 {
            return Err(HhcError::InvalidParameter("at least one thread is required".to_string()));
        }
        if self.iterations == 0 && self.time_limit.is_none() {
            return Err(HhcError::InvalidParameter(
                "an iteration budget or a time limit is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SolverResult {
    pub best: Candidate,
    /// Per worker, the incumbent objective after each of its iterations.
    pub histories: Vec<Vec<f64>>,
    pub iterations_run: usize,
}

/// The best candidates published by any worker. Publication is the only point where workers
/// synchronize.
#[derive(Default)]
pub struct SharedBest {
    incumbent: Mutex<Incumbent>,
}

impl SharedBest {
    /// Returns whether `candidate` became the recorded best.
    pub fn offer(&self, candidate: &Candidate) -> bool {
        self.incumbent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offer(candidate)
    }

    pub fn into_inner(self) -> Option<Candidate> {
        self.incumbent
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_candidate()
    }
}

struct WorkerOutcome {
    history: Vec<f64>,
    iterations: usize,
}

pub fn solve_problem(config: &SolverConfig) -> Result<SolverResult> {
    let problem_instance = load_problem_instance(&config.problem_instance_location)?;
    let problem = Problem::new(problem_instance)?;
    solve(&problem, config)
}

/// Runs the configured GRASP iterations over `nbr_threads` workers. Worker `w` runs
/// iterations `w, w + threads, ...` seeded with `seed + w`.
pub fn solve(problem: &Problem, config: &SolverConfig) -> Result<SolverResult> {
    config.validate()?;
    problem.check_coverage()?;

    info!(
        nodes = problem.instance.nbr_nodes,
        vehicles = problem.instance.nbr_vehicles,
        services = problem.instance.nbr_services,
        visits = problem.nbr_required_visits(),
        iterations = config.iterations,
        threads = config.nbr_threads,
        "solving"
    );

    let shared = SharedBest::default();
    let deadline = config.time_limit.map(|limit| Instant::now() + limit);

    let outcomes = thread::scope(|scope| {
        let (progress_sender, progress_receiver) = unbounded::<()>();

        let handles = (0..config.nbr_threads)
            .map(|worker| {
                let sender = progress_sender.clone();
                let shared = &shared;
                scope.spawn(move || run_worker(problem, config, worker, deadline, shared, sender))
            })
            .collect::<Vec<_>>();
        drop(progress_sender);

        let progress = if !config.show_progress {
            ProgressBar::hidden()
        } else if config.iterations > 0 {
            ProgressBar::new(config.iterations as u64)
        } else {
            ProgressBar::new_spinner()
        };
        for () in progress_receiver.iter() {
            progress.inc(1);
        }
        progress.finish_and_clear();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect::<Result<Vec<_>>>()
    })?;

    let iterations_run = outcomes.iter().map(|outcome| outcome.iterations).sum();
    let histories = outcomes.into_iter().map(|outcome| outcome.history).collect();

    let best = shared.into_inner().ok_or(HhcError::NoIterationCompleted)?;

    info!(
        objective = best.objective(),
        travel_distance = best.evaluation.travel_distance,
        total_lateness = best.evaluation.total_lateness,
        feasible = best.is_feasible(),
        iterations = iterations_run,
        "solved"
    );
    if !best.is_feasible() {
        warn!(
            violations = best.report.violations.len(),
            "no feasible solution found, reporting the best infeasible one"
        );
    }

    Ok(SolverResult {
        best,
        histories,
        iterations_run,
    })
}

fn run_worker(
    problem: &Problem,
    config: &SolverConfig,
    worker: usize,
    deadline: Option<Instant>,
    shared: &SharedBest,
    progress: Sender<()>,
) -> Result<WorkerOutcome> {
    let mut grasp = Grasp::with_seed(problem, config.grasp_params(), config.seed.wrapping_add(worker as u64))?;
    let mut iteration = worker;

    loop {
        if config.iterations > 0 && iteration >= config.iterations {
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        let candidate = grasp.iterate()?;
        if shared.offer(&candidate) {
            debug!(worker, iteration, objective = candidate.objective(), "new best");
        }

        // the receiver only goes away once every worker has finished
        let _ = progress.send(());
        iteration += config.nbr_threads;
    }

    Ok(WorkerOutcome {
        history: grasp.history().to_vec(),
        iterations: grasp.iterations(),
    })
}
