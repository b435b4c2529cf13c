use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};
use tracing::trace;

use super::Candidate;
use crate::model::{
    evaluation::{LatenessScope, Predicate},
    problem_instance::Problem,
    solution::{Route, Solution},
};

/// Vehicle pair draws allowed per requested neighbor before a round gives up.
const SAMPLES_PER_NEIGHBOR: usize = 10;

/// Inter-route service swap neighborhood with best-of-round, strict-improvement acceptance.
#[derive(Debug, Clone, Copy)]
pub struct LocalSearch {
    pub neighborhood_size: usize,
    pub rounds: usize,
    pub lateness_scope: LatenessScope,
}

impl LocalSearch {
    pub fn improve<R: Rng + ?Sized>(&self, problem: &Problem, current: Candidate, rng: &mut R) -> Candidate {
        if problem.instance.nbr_vehicles < 2 || self.neighborhood_size == 0 {
            return current;
        }

        let mut current = current;
        for round in 0..self.rounds {
            let best = self
                .neighbors(&current.solution, rng)
                .into_iter()
                .map(|solution| Candidate::score(problem, solution, self.lateness_scope))
                .filter(|neighbor| is_acceptable(&current, neighbor))
                .min_by(|a, b| a.objective().total_cmp(&b.objective()));

            match best {
                Some(neighbor) if neighbor.objective() < current.objective() => {
                    trace!(
                        round,
                        from = current.objective(),
                        to = neighbor.objective(),
                        "local search improved"
                    );
                    current = neighbor;
                }
                _ => {}
            }
        }

        current
    }

    /// Up to `neighborhood_size` distinct swap neighbors of `solution`.
    pub fn neighbors<R: Rng + ?Sized>(&self, solution: &Solution, rng: &mut R) -> Vec<Solution> {
        let mut seen = HashSet::new();
        let mut neighbors = Vec::with_capacity(self.neighborhood_size);

        for _ in 0..self.neighborhood_size * SAMPLES_PER_NEIGHBOR {
            if neighbors.len() >= self.neighborhood_size {
                break;
            }
            let Some(neighbor) = random_service_swap(solution, rng) else {
                continue;
            };
            if seen.insert(neighbor.clone()) {
                neighbors.push(neighbor);
            }
        }

        neighbors
    }
}

/// A feasible neighbor is always acceptable. From an infeasible state a neighbor may still be
/// taken when it stays qualified and carries no more violations.
pub fn is_acceptable(current: &Candidate, neighbor: &Candidate) -> bool {
    if neighbor.is_feasible() {
        return true;
    }
    !current.is_feasible()
        && !neighbor.report.violates(Predicate::Qualification)
        && neighbor.report.violations.len() <= current.report.violations.len()
}

/// Service types present on both routes, ascending.
pub fn common_services(a: &Route, b: &Route) -> Vec<usize> {
    a.services().intersection(&b.services()).copied().collect()
}

/// Picks two distinct vehicles and a service type both of them perform, then exchanges one
/// patient of that service between the two routes. `None` when the pair shares no service.
pub fn random_service_swap<R: Rng + ?Sized>(solution: &Solution, rng: &mut R) -> Option<Solution> {
    let nbr_routes = solution.routes.len();
    if nbr_routes < 2 {
        return None;
    }

    let first = rng.gen_range(0..nbr_routes);
    let mut second = rng.gen_range(0..nbr_routes - 1);
    if second >= first {
        second += 1;
    }

    let common = common_services(&solution.routes[first], &solution.routes[second]);
    let &service = common.choose(rng)?;

    let &position_a = solution.routes[first].positions_of_service(service).choose(rng)?;
    let &position_b = solution.routes[second].positions_of_service(service).choose(rng)?;

    let mut neighbor = solution.clone();
    neighbor.swap_stops((first, position_a), (second, position_b));
    Some(neighbor)
}
