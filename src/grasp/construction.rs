use clap::ValueEnum;
use itertools::iproduct;
use rand::Rng;
use serde::Serialize;

use crate::{
    error::{HhcError, Result},
    model::{
        problem_instance::Problem,
        solution::{AssignmentMatrix, Solution, Visit},
    },
    util::sorting::argsort,
};

/// How a candidate insertion is scored in the restricted candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CostModel {
    /// Processing time of the (patient, vehicle, service) triple only.
    #[default]
    ProcessingTime,
    /// Processing time plus the leg from the vehicle's current last stop.
    ProcessingAndTravel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RclEntry {
    pub vehicle: usize,
    pub visit: Visit,
    pub cost: f64,
}

pub fn validate_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(HhcError::InvalidParameter(format!(
            "alpha must lie in (0, 1], got {alpha}"
        )))
    }
}

/// Unassigned required visits, earliest window end first. Ties are broken by node, then service.
pub fn pending_visits(problem: &Problem, assignments: &AssignmentMatrix) -> Vec<Visit> {
    let mut pending: Vec<Visit> = assignments.unassigned(problem).collect();
    pending.sort_by(|a, b| {
        let window_end = |visit: &Visit| {
            problem
                .patient(visit.node)
                .map_or(f64::INFINITY, |patient| patient.time_window_end)
        };
        let (end_a, end_b) = (window_end(a), window_end(b));
        end_a.total_cmp(&end_b).then_with(|| a.cmp(b))
    });
    pending
}

/// Every qualified (vehicle, pending visit) pairing with its cost, in pending-list order.
pub fn candidate_list(
    problem: &Problem,
    solution: &Solution,
    pending: &[Visit],
    cost_model: CostModel,
) -> Vec<RclEntry> {
    let instance = &problem.instance;
    iproduct!(pending.iter(), 0..instance.nbr_vehicles)
        .filter(|(visit, vehicle)| instance.is_qualified(*vehicle, visit.service))
        .filter_map(|(visit, vehicle)| {
            let processing = instance.processing_time(visit.node, vehicle, visit.service)?;
            let cost = match cost_model {
                CostModel::ProcessingTime => processing,
                CostModel::ProcessingAndTravel => {
                    let from = solution.routes[vehicle]
                        .last_node()
                        .unwrap_or(instance.depot_departure());
                    processing + instance.distance(from, visit.node)
                }
            };
            Some(RclEntry {
                vehicle,
                visit: *visit,
                cost,
            })
        })
        .collect()
}

/// Size of the restricted prefix: `ceil(alpha * len)`, at least one entry.
pub fn restricted_len(alpha: f64, len: usize) -> usize {
    ((alpha * len as f64).ceil() as usize).clamp(1, len.max(1))
}

/// Builds a complete route set by repeatedly drawing a random entry among the cheapest
/// `alpha` fraction of candidate insertions.
pub fn construct<R: Rng + ?Sized>(
    problem: &Problem,
    alpha: f64,
    cost_model: CostModel,
    rng: &mut R,
) -> Result<Solution> {
    validate_alpha(alpha)?;

    let mut solution = Solution::empty(problem);
    let mut assignments = AssignmentMatrix::new(problem);
    let mut pending = pending_visits(problem, &assignments);

    while !pending.is_empty() {
        let candidates = candidate_list(problem, &solution, &pending, cost_model);
        if candidates.is_empty() {
            let stuck = pending[0];
            return Err(HhcError::NoQualifiedVehicle {
                node: stuck.node,
                service: stuck.service,
            });
        }

        let ranked = argsort(&candidates.iter().map(|entry| entry.cost).collect::<Vec<_>>());
        let chosen = candidates[ranked[rng.gen_range(0..restricted_len(alpha, ranked.len()))]];

        solution.routes[chosen.vehicle].push(chosen.visit);
        assignments.assign(chosen.visit, chosen.vehicle);
        pending.retain(|visit| *visit != chosen.visit);
    }

    solution.close_routes(problem);
    Ok(solution)
}
