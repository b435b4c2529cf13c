use std::{collections::HashMap, fmt};

use clap::ValueEnum;
use itertools::Itertools;
use serde::Serialize;

use super::{
    problem_instance::Problem,
    schedule::{build_schedule, Schedule},
    solution::{AssignmentMatrix, Solution},
};

/// Tolerance for comparisons between accumulated floating point times.
const EPSILON: f64 = 1e-6;

/// Where the largest single lateness enters the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LatenessScope {
    /// Added once for the whole solution.
    #[default]
    Global,
    /// Each route adds its own maximum.
    PerRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SolutionEvaluation {
    pub travel_distance: f64,
    pub total_lateness: f64,
    pub max_lateness: f64,
    pub late_visits: usize,
    pub objective: f64,
}

/// Sum of every leg between consecutive stops, depot legs included. Nodes outside the
/// instance are skipped.
pub fn travel_distance(problem: &Problem, solution: &Solution) -> f64 {
    solution
        .routes
        .iter()
        .map(|route| {
            route
                .nodes()
                .filter(|&node| node < problem.instance.nbr_nodes)
                .tuple_windows()
                .map(|(from, to)| problem.instance.distance(from, to))
                .sum::<f64>()
        })
        .sum()
}

/// Objective = travel distance + summed lateness + largest lateness.
pub fn evaluate(
    problem: &Problem,
    solution: &Solution,
    schedule: &Schedule,
    scope: LatenessScope,
) -> SolutionEvaluation {
    let travel_distance = travel_distance(problem, solution);

    let mut total_lateness = 0.0;
    let mut max_lateness: f64 = 0.0;
    let mut summed_route_maxima = 0.0;
    let mut late_visits = 0;

    for route in &schedule.routes {
        let mut route_max: f64 = 0.0;
        for visit in route.visits() {
            let lateness = problem
                .patient(visit.node)
                .map_or(0.0, |patient| patient.lateness(visit.end));
            if lateness > 0.0 {
                late_visits += 1;
            }
            total_lateness += lateness;
            route_max = route_max.max(lateness);
        }
        max_lateness = max_lateness.max(route_max);
        summed_route_maxima += route_max;
    }

    let max_term = match scope {
        LatenessScope::Global => max_lateness,
        LatenessScope::PerRoute => summed_route_maxima,
    };

    SolutionEvaluation {
        travel_distance,
        total_lateness,
        max_lateness,
        late_visits,
        objective: travel_distance + total_lateness + max_term,
    }
}

/// The hard constraints a solution is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Predicate {
    DepotClosure,
    WindowBegin,
    NonNegative,
    Monotonic,
    Qualification,
    Coverage,
    DualServiceGap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "violation", rename_all = "kebab-case")]
pub enum Violation {
    RouteCount { expected: usize, found: usize },
    DepotClosure { vehicle: usize },
    StartBeforeWindow { vehicle: usize, node: usize, service: usize, start: f64, window_begin: f64 },
    NegativeStart { vehicle: usize, node: usize, service: usize, start: f64 },
    DecreasingStart { vehicle: usize, position: usize },
    Unqualified { vehicle: usize, node: usize, service: usize },
    MissingService { node: usize, service: usize },
    DuplicateService { node: usize, service: usize },
    UnrequiredService { vehicle: usize, node: usize, service: usize },
    DualServiceGap { node: usize, gap: f64, min_gap: f64, max_gap: f64 },
}

impl Violation {
    pub fn predicate(&self) -> Predicate {
        match self {
            Violation::RouteCount { .. } | Violation::DepotClosure { .. } => Predicate::DepotClosure,
            Violation::StartBeforeWindow { .. } => Predicate::WindowBegin,
            Violation::NegativeStart { .. } => Predicate::NonNegative,
            Violation::DecreasingStart { .. } => Predicate::Monotonic,
            Violation::Unqualified { .. } => Predicate::Qualification,
            Violation::MissingService { .. }
            | Violation::DuplicateService { .. }
            | Violation::UnrequiredService { .. } => Predicate::Coverage,
            Violation::DualServiceGap { .. } => Predicate::DualServiceGap,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::RouteCount { expected, found } => {
                write!(f, "expected {expected} routes, found {found}")
            }
            Violation::DepotClosure { vehicle } => {
                write!(f, "route of vehicle {vehicle} does not start and end at the depot")
            }
            Violation::StartBeforeWindow { vehicle, node, service, start, window_begin } => write!(
                f,
                "vehicle {vehicle} starts service {service} at node {node} at {start}, before the window opens at {window_begin}"
            ),
            Violation::NegativeStart { vehicle, node, service, start } => write!(
                f,
                "vehicle {vehicle} starts service {service} at node {node} at negative time {start}"
            ),
            Violation::DecreasingStart { vehicle, position } => write!(
                f,
                "route of vehicle {vehicle} goes back in time at stop {position}"
            ),
            Violation::Unqualified { vehicle, node, service } => write!(
                f,
                "vehicle {vehicle} is not qualified for service {service} at node {node}"
            ),
            Violation::MissingService { node, service } => {
                write!(f, "service {service} at node {node} is not assigned")
            }
            Violation::DuplicateService { node, service } => {
                write!(f, "service {service} at node {node} is assigned more than once")
            }
            Violation::UnrequiredService { vehicle, node, service } => write!(
                f,
                "vehicle {vehicle} performs service {service} at node {node}, which is not required"
            ),
            Violation::DualServiceGap { node, gap, min_gap, max_gap } => write!(
                f,
                "services at node {node} are {gap} apart, outside [{min_gap}, {max_gap}]"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct FeasibilityReport {
    pub violations: Vec<Violation>,
}

impl FeasibilityReport {
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violates(&self, predicate: Predicate) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.predicate() == predicate)
    }
}

pub fn check_depot_closure(problem: &Problem, solution: &Solution) -> Vec<Violation> {
    let instance = &problem.instance;
    let mut violations = Vec::new();

    if solution.routes.len() != instance.nbr_vehicles {
        violations.push(Violation::RouteCount {
            expected: instance.nbr_vehicles,
            found: solution.routes.len(),
        });
    }

    for (vehicle, route) in solution.routes.iter().enumerate() {
        let first = route.stops.first();
        let last = route.stops.last();
        let closed = route.stops.len() >= 2
            && first.is_some_and(|stop| stop.is_depot() && instance.is_depot(stop.node()))
            && last.is_some_and(|stop| stop.is_depot() && instance.is_depot(stop.node()));
        if !closed {
            violations.push(Violation::DepotClosure { vehicle });
        }
    }

    violations
}

pub fn check_window_begin(problem: &Problem, schedule: &Schedule) -> Vec<Violation> {
    schedule
        .visits()
        .filter_map(|(vehicle, visit)| {
            let window_begin = problem.patient(visit.node)?.time_window_begin;
            (visit.start < window_begin - EPSILON).then_some(Violation::StartBeforeWindow {
                vehicle,
                node: visit.node,
                service: visit.service,
                start: visit.start,
                window_begin,
            })
        })
        .collect()
}

pub fn check_non_negative(schedule: &Schedule) -> Vec<Violation> {
    schedule
        .visits()
        .filter(|(_, visit)| visit.start < 0.0)
        .map(|(vehicle, visit)| Violation::NegativeStart {
            vehicle,
            node: visit.node,
            service: visit.service,
            start: visit.start,
        })
        .collect()
}

pub fn check_monotonic(schedule: &Schedule) -> Vec<Violation> {
    let mut violations = Vec::new();
    for route in &schedule.routes {
        let timed = route
            .stops
            .iter()
            .enumerate()
            .filter_map(|(position, stop)| stop.visit().map(|visit| (position, visit.start)));
        for ((_, before), (position, after)) in timed.tuple_windows() {
            if after < before - EPSILON {
                violations.push(Violation::DecreasingStart {
                    vehicle: route.vehicle,
                    position,
                });
            }
        }
    }
    violations
}

pub fn check_qualification(problem: &Problem, solution: &Solution) -> Vec<Violation> {
    solution
        .visits()
        .filter(|(vehicle, visit)| !problem.instance.is_qualified(*vehicle, visit.service))
        .map(|(vehicle, visit)| Violation::Unqualified {
            vehicle,
            node: visit.node,
            service: visit.service,
        })
        .collect()
}

/// Every required (patient, service) is served exactly once and nothing else is served.
pub fn check_coverage(problem: &Problem, solution: &Solution) -> Vec<Violation> {
    let assignments = AssignmentMatrix::from_solution(problem, solution);

    let missing = assignments
        .unassigned(problem)
        .map(|visit| Violation::MissingService {
            node: visit.node,
            service: visit.service,
        });
    let duplicated = assignments
        .duplicates()
        .iter()
        .unique()
        .map(|visit| Violation::DuplicateService {
            node: visit.node,
            service: visit.service,
        });
    let unrequired = solution
        .visits()
        .filter(|(_, visit)| {
            problem
                .patient(visit.node)
                .map_or(true, |patient| !patient.requires(visit.service))
        })
        .map(|(vehicle, visit)| Violation::UnrequiredService {
            vehicle,
            node: visit.node,
            service: visit.service,
        });

    missing.chain(duplicated).chain(unrequired).collect()
}

/// The gap between the start of a dual-service patient's two services must lie within
/// `[min_gap, max_gap]`. Both services must be scheduled for the gap to be checked.
pub fn check_dual_service_gaps(problem: &Problem, schedule: &Schedule) -> Vec<Violation> {
    let starts: HashMap<(usize, usize), f64> = schedule
        .visits()
        .map(|(_, visit)| ((visit.node, visit.service), visit.start))
        .collect();

    problem
        .patients
        .iter()
        .filter(|patient| patient.dual_service)
        .filter_map(|patient| {
            let (first, second) = patient.required().collect_tuple()?;
            let gap = (starts.get(&(patient.node, second))? - starts.get(&(patient.node, first))?).abs();
            let within = gap >= patient.min_gap - EPSILON && gap <= patient.max_gap + EPSILON;
            (!within).then_some(Violation::DualServiceGap {
                node: patient.node,
                gap,
                min_gap: patient.min_gap,
                max_gap: patient.max_gap,
            })
        })
        .collect()
}

pub fn check_feasibility(problem: &Problem, solution: &Solution, schedule: &Schedule) -> FeasibilityReport {
    let mut violations = check_depot_closure(problem, solution);
    violations.extend(check_window_begin(problem, schedule));
    violations.extend(check_non_negative(schedule));
    violations.extend(check_monotonic(schedule));
    violations.extend(check_qualification(problem, solution));
    violations.extend(check_coverage(problem, solution));
    violations.extend(check_dual_service_gaps(problem, schedule));
    FeasibilityReport { violations }
}

pub fn is_solution_valid(problem: &Problem, solution: &Solution) -> bool {
    let schedule = build_schedule(problem, solution);
    check_feasibility(problem, solution, &schedule).is_feasible()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schedule::{RouteSchedule, TimedStop, TimedVisit};
    use crate::model::solution::{Route, Stop, Visit};
    use crate::test_utils::{dual_problem, example_problem, lateness_problem, random_problem};

    fn scored(problem: &Problem, solution: &Solution) -> (SolutionEvaluation, FeasibilityReport) {
        let schedule = build_schedule(problem, solution);
        (
            evaluate(problem, solution, &schedule, LatenessScope::Global),
            check_feasibility(problem, solution, &schedule),
        )
    }

    #[test]
    fn example_objective_is_pure_distance() {
        let problem = example_problem();
        let solution = Solution::from_visits(&problem, &[vec![(1, 0), (2, 0)]]);

        let (evaluation, report) = scored(&problem, &solution);

        assert_eq!(evaluation.travel_distance, 7.0);
        assert_eq!(evaluation.total_lateness, 0.0);
        assert_eq!(evaluation.max_lateness, 0.0);
        assert_eq!(evaluation.objective, 7.0);
        assert!(report.is_feasible(), "{:?}", report.violations);
    }

    #[test]
    fn late_service_adds_sum_and_max() {
        let problem = lateness_problem();
        let solution = Solution::from_visits(&problem, &[vec![(1, 0)]]);

        let (evaluation, _) = scored(&problem, &solution);

        assert_eq!(evaluation.max_lateness, 5.0);
        assert_eq!(evaluation.total_lateness, 5.0);
        assert_eq!(evaluation.late_visits, 1);
        assert_eq!(evaluation.objective, 20.0 + 5.0 + 5.0);
    }

    #[test]
    fn lateness_totals_dominate_maximum() {
        for seed in 0..20 {
            let problem = random_problem(seed, 15, 3, 3);
            let mut rng = crate::test_utils::rng(seed);
            let solution =
                crate::grasp::construction::construct(&problem, 1.0, Default::default(), &mut rng)
                    .unwrap();
            let (evaluation, _) = scored(&problem, &solution);

            assert!(evaluation.max_lateness >= 0.0);
            assert!(evaluation.total_lateness >= evaluation.max_lateness);
            if evaluation.late_visits == 1 {
                assert_eq!(evaluation.total_lateness, evaluation.max_lateness);
            }
            if evaluation.late_visits > 1 {
                assert!(evaluation.total_lateness > evaluation.max_lateness);
            }
        }
    }

    #[test]
    fn per_route_scope_sums_route_maxima() {
        let problem = random_problem(4, 10, 2, 1);
        let solution = Solution::from_visits(
            &problem,
            &[(1..=5).map(|node| (node, 0)).collect(), (6..=10).map(|node| (node, 0)).collect()],
        );
        let schedule = build_schedule(&problem, &solution);

        let global = evaluate(&problem, &solution, &schedule, LatenessScope::Global);
        let per_route = evaluate(&problem, &solution, &schedule, LatenessScope::PerRoute);

        assert!(per_route.objective >= global.objective);
        assert_eq!(global, evaluate(&problem, &solution, &schedule, LatenessScope::Global));
    }

    #[test]
    fn detects_open_routes() {
        let problem = example_problem();
        let mut solution = Solution::from_visits(&problem, &[vec![(1, 0), (2, 0)]]);
        solution.routes[0].stops.pop();

        let violations = check_depot_closure(&problem, &solution);
        assert_eq!(violations, vec![Violation::DepotClosure { vehicle: 0 }]);

        solution.routes.push(Route::default());
        let violations = check_depot_closure(&problem, &solution);
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn detects_uncovered_duplicated_and_unrequired_visits() {
        let problem = example_problem();
        let solution = Solution {
            routes: vec![Route {
                stops: vec![
                    Stop::Depot { node: 0 },
                    Stop::Visit(Visit { node: 1, service: 0 }),
                    Stop::Visit(Visit { node: 1, service: 0 }),
                    Stop::Depot { node: 3 },
                ],
            }],
        };

        let violations = check_coverage(&problem, &solution);

        assert!(violations.contains(&Violation::MissingService { node: 2, service: 0 }));
        assert!(violations.contains(&Violation::DuplicateService { node: 1, service: 0 }));
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn visit_to_the_closing_depot_is_reported_as_unrequired() {
        let problem = example_problem();
        let solution = Solution::from_visits(&problem, &[vec![(1, 0), (2, 0), (3, 0)]]);

        let schedule = build_schedule(&problem, &solution);
        let (evaluation, report) = scored(&problem, &solution);

        assert_eq!(schedule.routes[0].visits().count(), 2);
        assert_eq!(evaluation.objective, 7.0);
        assert_eq!(
            report.violations,
            vec![Violation::UnrequiredService { vehicle: 0, node: 3, service: 0 }]
        );
    }

    #[test]
    fn unknown_nodes_services_and_vehicles_are_reported() {
        let problem = example_problem();
        let mut solution = Solution::from_visits(&problem, &[vec![(1, 0), (2, 0)]]);
        solution.routes.push(Route {
            stops: vec![
                Stop::Depot { node: 0 },
                Stop::Visit(Visit { node: 9, service: 0 }),
                Stop::Visit(Visit { node: 1, service: 2 }),
                Stop::Depot { node: 3 },
            ],
        });

        let schedule = build_schedule(&problem, &solution);
        let (evaluation, report) = scored(&problem, &solution);

        assert_eq!(schedule.routes[1].visits().count(), 0);
        assert_eq!(evaluation.travel_distance, 7.0 + 4.0);
        let violations = &report.violations;
        assert!(violations.contains(&Violation::RouteCount { expected: 1, found: 2 }));
        assert!(violations.contains(&Violation::Unqualified { vehicle: 1, node: 9, service: 0 }));
        assert!(violations.contains(&Violation::UnrequiredService { vehicle: 1, node: 9, service: 0 }));
        assert!(violations.contains(&Violation::UnrequiredService { vehicle: 1, node: 1, service: 2 }));
        assert!(!report.violates(Predicate::WindowBegin));
    }

    #[test]
    fn detects_unqualified_vehicle() {
        let mut problem = example_problem();
        problem.instance.qualifications[0][0] = false;
        let solution = Solution::from_visits(&problem, &[vec![(1, 0), (2, 0)]]);

        let (_, report) = scored(&problem, &solution);

        assert!(report.violates(Predicate::Qualification));
        assert_eq!(check_qualification(&problem, &solution).len(), 2);
    }

    #[test]
    fn detects_times_not_produced_by_the_builder() {
        let mut problem = example_problem();
        problem.patients[1].time_window_begin = 4.0;
        let visit = |node, start| {
            TimedStop::Visit(TimedVisit {
                node,
                service: 0,
                start,
                end: start + 1.0,
            })
        };
        let schedule = Schedule {
            routes: vec![RouteSchedule {
                vehicle: 0,
                stops: vec![TimedStop::Depot { node: 0 }, visit(1, -1.0), visit(2, -2.0), TimedStop::Depot { node: 3 }],
                return_time: 0.0,
            }],
        };

        assert_eq!(check_non_negative(&schedule).len(), 2);
        assert_eq!(
            check_monotonic(&schedule),
            vec![Violation::DecreasingStart { vehicle: 0, position: 2 }]
        );
        assert_eq!(check_window_begin(&problem, &schedule).len(), 2);
    }

    #[test]
    fn dual_service_gap_is_checked_on_start_times() {
        let problem = dual_problem(0.0, 5.0);

        // both services on one vehicle: the second starts right after the first ends
        let close = Solution::from_visits(&problem, &[vec![(1, 0), (1, 1)], vec![]]);
        let (_, report) = scored(&problem, &close);
        assert!(!report.violates(Predicate::DualServiceGap), "{:?}", report.violations);

        let problem = dual_problem(10.0, 20.0);
        let (_, report) = scored(&problem, &close);
        assert!(report.violates(Predicate::DualServiceGap));
        assert!(!is_solution_valid(&problem, &close));
    }
}
