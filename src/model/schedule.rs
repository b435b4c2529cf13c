use serde::Serialize;

use super::{
    problem_instance::Problem,
    solution::{Route, Solution, Stop},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedVisit {
    pub node: usize,
    pub service: usize,
    pub start: f64,
    pub end: f64,
}

/// Depot bookends carry no service and therefore no start or end time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimedStop {
    Depot { node: usize },
    Visit(TimedVisit),
}

impl TimedStop {
    pub fn visit(&self) -> Option<&TimedVisit> {
        match self {
            TimedStop::Depot { .. } => None,
            TimedStop::Visit(visit) => Some(visit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSchedule {
    pub vehicle: usize,
    pub stops: Vec<TimedStop>,
    /// Arrival at the closing depot, or the last service end on an open route.
    pub return_time: f64,
}

impl RouteSchedule {
    pub fn visits(&self) -> impl Iterator<Item = &TimedVisit> + '_ {
        self.stops.iter().filter_map(TimedStop::visit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schedule {
    pub routes: Vec<RouteSchedule>,
}

impl Schedule {
    /// Every timed visit with the vehicle serving it.
    pub fn visits(&self) -> impl Iterator<Item = (usize, &TimedVisit)> + '_ {
        self.routes
            .iter()
            .flat_map(|route| route.visits().map(move |visit| (route.vehicle, visit)))
    }

    pub fn start_of(&self, node: usize, service: usize) -> Option<f64> {
        self.visits()
            .find(|(_, visit)| visit.node == node && visit.service == service)
            .map(|(_, visit)| visit.start)
    }
}

/// Turns route orderings into start and end times. A visit starts once the vehicle has
/// arrived and the patient's window has opened; arriving early means waiting. Stops on
/// nodes outside the instance, and visits that are not a patient service the vehicle has a
/// processing time for, are left out of the schedule.
pub fn build_schedule(problem: &Problem, solution: &Solution) -> Schedule {
    Schedule {
        routes: solution
            .routes
            .iter()
            .enumerate()
            .map(|(vehicle, route)| schedule_route(problem, vehicle, route))
            .collect(),
    }
}

fn schedule_route(problem: &Problem, vehicle: usize, route: &Route) -> RouteSchedule {
    let instance = &problem.instance;
    let mut stops = Vec::with_capacity(route.stops.len());
    let mut previous: Option<usize> = None;
    let mut ready = 0.0;

    for stop in &route.stops {
        match *stop {
            Stop::Depot { node } if node >= instance.nbr_nodes => continue,
            Stop::Depot { node } => {
                if let Some(from) = previous {
                    ready += instance.distance(from, node);
                }
                stops.push(TimedStop::Depot { node });
                previous = Some(node);
            }
            Stop::Visit(visit) => {
                // untimed: the coverage and qualification checks report these visits
                let (Some(patient), Some(processing)) = (
                    problem.patient(visit.node),
                    instance.processing_time(visit.node, vehicle, visit.service),
                ) else {
                    continue;
                };

                let from = previous.unwrap_or(instance.depot_departure());
                let available = ready + instance.distance(from, visit.node);
                let start = available.max(patient.time_window_begin);
                let end = start + processing;

                stops.push(TimedStop::Visit(TimedVisit {
                    node: visit.node,
                    service: visit.service,
                    start,
                    end,
                }));
                previous = Some(visit.node);
                ready = end;
            }
        }
    }

    RouteSchedule {
        vehicle,
        stops,
        return_time: ready,
    }
}
