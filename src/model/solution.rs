use std::{collections::BTreeSet, fmt};

use itertools::Itertools;
use serde::Serialize;

use super::problem_instance::Problem;

/// A (patient node, service type) pair placed on a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Visit {
    pub node: usize,
    pub service: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stop {
    Depot { node: usize },
    Visit(Visit),
}

impl Stop {
    pub fn node(&self) -> usize {
        match self {
            Stop::Depot { node } => *node,
            Stop::Visit(visit) => visit.node,
        }
    }

    pub fn visit(&self) -> Option<&Visit> {
        match self {
            Stop::Depot { .. } => None,
            Stop::Visit(visit) => Some(visit),
        }
    }

    pub fn is_depot(&self) -> bool {
        matches!(self, Stop::Depot { .. })
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stop::Depot { node } => write!(f, "{node}"),
            Stop::Visit(visit) => write!(f, "{}[{}]", visit.node, visit.service),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Route {
    pub stops: Vec<Stop>,
}

impl Route {
    /// A route holding only its departure from the depot.
    pub fn open(depot: usize) -> Route {
        Route {
            stops: vec![Stop::Depot { node: depot }],
        }
    }

    pub fn close(&mut self, depot: usize) {
        self.stops.push(Stop::Depot { node: depot });
    }

    pub fn push(&mut self, visit: Visit) {
        self.stops.push(Stop::Visit(visit));
    }

    pub fn last_node(&self) -> Option<usize> {
        self.stops.last().map(Stop::node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.stops.iter().map(Stop::node)
    }

    pub fn visits(&self) -> impl Iterator<Item = &Visit> + '_ {
        self.stops.iter().filter_map(Stop::visit)
    }

    /// Service types appearing on this route, ascending.
    pub fn services(&self) -> BTreeSet<usize> {
        self.visits().map(|visit| visit.service).collect()
    }

    /// Stop positions holding a visit of `service`.
    pub fn positions_of_service(&self, service: usize) -> Vec<usize> {
        self.stops
            .iter()
            .positions(|stop| stop.visit().is_some_and(|visit| visit.service == service))
            .collect()
    }
}

/// One route per vehicle, indexed by vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Solution {
    pub routes: Vec<Route>,
}

impl Solution {
    pub fn empty(problem: &Problem) -> Solution {
        let depot = problem.instance.depot_departure();
        Solution {
            routes: (0..problem.instance.nbr_vehicles)
                .map(|_| Route::open(depot))
                .collect(),
        }
    }

    /// Builds closed routes from per-vehicle `(node, service)` lists.
    pub fn from_visits(problem: &Problem, visits: &[Vec<(usize, usize)>]) -> Solution {
        let mut solution = Solution::empty(problem);
        for (route, visits) in solution.routes.iter_mut().zip(visits) {
            for &(node, service) in visits {
                route.push(Visit { node, service });
            }
        }
        solution.close_routes(problem);
        solution
    }

    pub fn close_routes(&mut self, problem: &Problem) {
        let depot = problem.instance.depot_arrival();
        for route in &mut self.routes {
            route.close(depot);
        }
    }

    /// Exchanges the stops at `(vehicle, position)` `a` and `b`.
    pub fn swap_stops(&mut self, a: (usize, usize), b: (usize, usize)) {
        let stop_a = self.routes[a.0].stops[a.1];
        let stop_b = self.routes[b.0].stops[b.1];
        self.routes[a.0].stops[a.1] = stop_b;
        self.routes[b.0].stops[b.1] = stop_a;
    }

    pub fn visits(&self) -> impl Iterator<Item = (usize, &Visit)> + '_ {
        self.routes
            .iter()
            .enumerate()
            .flat_map(|(vehicle, route)| route.visits().map(move |visit| (vehicle, visit)))
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (vehicle, route) in self.routes.iter().enumerate() {
            writeln!(f, "vehicle {vehicle}: {}", route.stops.iter().join(" "))?;
        }
        Ok(())
    }
}

/// `(node, service) -> vehicle` index over a route set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentMatrix {
    cells: Vec<Vec<Option<usize>>>,
    duplicates: Vec<Visit>,
}

impl AssignmentMatrix {
    pub fn new(problem: &Problem) -> AssignmentMatrix {
        AssignmentMatrix {
            cells: vec![vec![None; problem.instance.nbr_services]; problem.instance.nbr_nodes],
            duplicates: Vec::new(),
        }
    }

    pub fn from_solution(problem: &Problem, solution: &Solution) -> AssignmentMatrix {
        let mut assignments = AssignmentMatrix::new(problem);
        for (vehicle, visit) in solution.visits() {
            assignments.assign(*visit, vehicle);
        }
        assignments
    }

    /// Records `visit` on `vehicle`. A visit assigned twice keeps its first vehicle and is
    /// remembered as a duplicate.
    pub fn assign(&mut self, visit: Visit, vehicle: usize) {
        let Some(cell) = self
            .cells
            .get_mut(visit.node)
            .and_then(|row| row.get_mut(visit.service))
        else {
            return;
        };

        match cell {
            Some(_) => self.duplicates.push(visit),
            None => *cell = Some(vehicle),
        }
    }

    pub fn vehicle(&self, node: usize, service: usize) -> Option<usize> {
        self.cells
            .get(node)
            .and_then(|row| row.get(service))
            .copied()
            .flatten()
    }

    pub fn is_assigned(&self, visit: &Visit) -> bool {
        self.vehicle(visit.node, visit.service).is_some()
    }

    pub fn duplicates(&self) -> &[Visit] {
        &self.duplicates
    }

    /// Required visits with no vehicle yet, in node then service order.
    pub fn unassigned<'a>(&'a self, problem: &'a Problem) -> impl Iterator<Item = Visit> + 'a {
        problem.patients.iter().flat_map(move |patient| {
            patient
                .required()
                .map(move |service| Visit {
                    node: patient.node,
                    service,
                })
                .filter(move |visit| !self.is_assigned(visit))
        })
    }
}
