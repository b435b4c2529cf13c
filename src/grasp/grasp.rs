use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, trace};

use super::{
    construction::{construct, validate_alpha, CostModel},
    local_search::LocalSearch,
    Candidate, Incumbent,
};
use crate::{
    error::Result,
    model::{evaluation::LatenessScope, problem_instance::Problem},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraspState {
    Constructing,
    Evaluating,
    Searching,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GraspParams {
    pub alpha: f64,
    pub neighborhood_size: usize,
    pub local_search_rounds: usize,
    pub cost_model: CostModel,
    pub lateness_scope: LatenessScope,
}

impl Default for GraspParams {
    fn default() -> Self {
        GraspParams {
            alpha: 0.3,
            neighborhood_size: 10,
            local_search_rounds: 20,
            cost_model: CostModel::default(),
            lateness_scope: LatenessScope::default(),
        }
    }
}

/// One GRASP stream: construction, scoring and local search per iteration, keeping the best
/// candidates seen. All randomness comes from the owned `rng`.
pub struct Grasp<'a, R> {
    problem: &'a Problem,
    params: GraspParams,
    local_search: LocalSearch,
    rng: R,
    state: GraspState,
    incumbent: Incumbent,
    history: Vec<f64>,
    iterations: usize,
}

impl<'a> Grasp<'a, StdRng> {
    pub fn with_seed(problem: &'a Problem, params: GraspParams, seed: u64) -> Result<Self> {
        Grasp::new(problem, params, StdRng::seed_from_u64(seed))
    }
}

impl<'a, R: Rng> Grasp<'a, R> {
    pub fn new(problem: &'a Problem, params: GraspParams, rng: R) -> Result<Self> {
        validate_alpha(params.alpha)?;
        Ok(Grasp {
            problem,
            params,
            local_search: LocalSearch {
                neighborhood_size: params.neighborhood_size,
                rounds: params.local_search_rounds,
                lateness_scope: params.lateness_scope,
            },
            rng,
            state: GraspState::Constructing,
            incumbent: Incumbent::default(),
            history: Vec::new(),
            iterations: 0,
        })
    }

    pub fn state(&self) -> GraspState {
        self.state
    }

    /// The best feasible candidate, or the best infeasible one while no feasible candidate
    /// has been seen.
    pub fn best(&self) -> Option<&Candidate> {
        self.incumbent.candidate()
    }

    /// Objective of the recorded best after each iteration, from the first iteration that
    /// produced a feasible candidate on. Never increases.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn transition(&mut self, next: GraspState) {
        trace!(from = ?self.state, to = ?next, iteration = self.iterations, "grasp state");
        self.state = next;
    }

    /// Runs one full iteration and returns the local search result. Local search only moves
    /// to strictly lower objectives and keeps a feasible start feasible, so the result is
    /// never worse than the constructed candidate.
    pub fn iterate(&mut self) -> Result<Candidate> {
        self.transition(GraspState::Constructing);
        let solution = construct(self.problem, self.params.alpha, self.params.cost_model, &mut self.rng)?;

        self.transition(GraspState::Evaluating);
        let constructed = Candidate::score(self.problem, solution, self.params.lateness_scope);
        self.record(&constructed);

        self.transition(GraspState::Searching);
        let searched = self
            .local_search
            .improve(self.problem, constructed.clone(), &mut self.rng);
        self.record(&searched);

        self.iterations += 1;
        if let Some(best) = self.incumbent.best() {
            self.history.push(best.objective());
        }

        debug!(
            iteration = self.iterations,
            constructed = constructed.objective(),
            searched = searched.objective(),
            feasible = searched.is_feasible(),
            "grasp iteration"
        );

        Ok(searched)
    }

    /// Runs `max_iterations` iterations and ends in [`GraspState::Done`].
    pub fn run(&mut self, max_iterations: usize) -> Result<Option<&Candidate>> {
        for _ in 0..max_iterations {
            self.iterate()?;
        }
        self.transition(GraspState::Done);
        Ok(self.incumbent.candidate())
    }

    fn record(&mut self, candidate: &Candidate) {
        if self.incumbent.offer(candidate) {
            trace!(objective = candidate.objective(), "recorded best");
        }
    }
}
