pub mod construction;
pub mod grasp;
pub mod local_search;

use crate::model::{
    evaluation::{check_feasibility, evaluate, FeasibilityReport, LatenessScope, SolutionEvaluation},
    problem_instance::Problem,
    schedule::{build_schedule, Schedule},
    solution::Solution,
};

/// A route set together with its schedule, score and feasibility report.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub solution: Solution,
    pub schedule: Schedule,
    pub evaluation: SolutionEvaluation,
    pub report: FeasibilityReport,
}

impl Candidate {
    pub fn score(problem: &Problem, solution: Solution, scope: LatenessScope) -> Candidate {
        let schedule = build_schedule(problem, &solution);
        let evaluation = evaluate(problem, &solution, &schedule, scope);
        let report = check_feasibility(problem, &solution, &schedule);
        Candidate {
            solution,
            schedule,
            evaluation,
            report,
        }
    }

    pub fn objective(&self) -> f64 {
        self.evaluation.objective
    }

    pub fn is_feasible(&self) -> bool {
        self.report.is_feasible()
    }
}

/// Best candidates seen so far. Only feasible candidates become the recorded best; the
/// lowest-objective infeasible candidate is kept apart as a fallback for runs that never
/// find a feasible one. Either slot changes only on a strictly lower objective, so ties
/// keep the earlier candidate.
#[derive(Debug, Clone, Default)]
pub struct Incumbent {
    best: Option<Candidate>,
    fallback: Option<Candidate>,
}

impl Incumbent {
    /// Returns whether `candidate` became the recorded best.
    pub fn offer(&mut self, candidate: &Candidate) -> bool {
        let feasible = candidate.is_feasible();
        let slot = if feasible {
            &mut self.best
        } else {
            &mut self.fallback
        };
        let improves = slot
            .as_ref()
            .map_or(true, |current| candidate.objective() < current.objective());
        if improves {
            *slot = Some(candidate.clone());
        }
        improves && feasible
    }

    /// The recorded best. Always feasible.
    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    /// The recorded best, or the fallback when nothing feasible has been seen.
    pub fn candidate(&self) -> Option<&Candidate> {
        self.best.as_ref().or(self.fallback.as_ref())
    }

    pub fn into_candidate(self) -> Option<Candidate> {
        self.best.or(self.fallback)
    }
}
