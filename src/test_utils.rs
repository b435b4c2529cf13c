use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::model::problem_instance::{Problem, ProblemInstance};

/// Two patients on a line between the depot ends, one vehicle, one service.
pub const EXAMPLE_TEXT: &str = "nbNodes
4
nbVehi
1
nbServi
1
r
0
1
1
0
DS

a
1
x
0 1 2 0
y
0 0 0 0
d
0 2 2 0
2 0 3 2
2 3 0 2
0 2 2 0
p
0
1
1
0
mind
0 0 0 0
maxd
0 0 0 0
e
0 0 0 0
l
100 100 100 100
";

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

struct Layout {
    distances: Vec<Vec<f64>>,
    nbr_vehicles: usize,
    requirements: Vec<Vec<bool>>,
    qualifications: Vec<Vec<bool>>,
    processing_time: f64,
    windows: Vec<(f64, f64)>,
}

fn build(layout: Layout) -> ProblemInstance {
    let nbr_nodes = layout.distances.len();
    let nbr_services = layout.qualifications[0].len();
    ProblemInstance {
        nbr_nodes,
        nbr_vehicles: layout.nbr_vehicles,
        nbr_services,
        requirements: layout.requirements,
        dual_service_patients: Vec::new(),
        qualifications: layout.qualifications,
        x_coords: vec![0.0; nbr_nodes],
        y_coords: vec![0.0; nbr_nodes],
        distances: layout.distances,
        processing_times: (0..nbr_nodes * layout.nbr_vehicles)
            .map(|row| {
                let node = row / layout.nbr_vehicles;
                let time = if node == 0 || node == nbr_nodes - 1 {
                    0.0
                } else {
                    layout.processing_time
                };
                vec![time; nbr_services]
            })
            .collect(),
        min_gap: vec![0.0; nbr_nodes],
        max_gap: vec![0.0; nbr_nodes],
        window_begin: layout.windows.iter().map(|w| w.0).collect(),
        window_end: layout.windows.iter().map(|w| w.1).collect(),
    }
}

pub fn example_instance() -> ProblemInstance {
    let mut instance = build(Layout {
        distances: vec![
            vec![0.0, 2.0, 2.0, 0.0],
            vec![2.0, 0.0, 3.0, 2.0],
            vec![2.0, 3.0, 0.0, 2.0],
            vec![0.0, 2.0, 2.0, 0.0],
        ],
        nbr_vehicles: 1,
        requirements: vec![vec![false], vec![true], vec![true], vec![false]],
        qualifications: vec![vec![true]],
        processing_time: 1.0,
        windows: vec![(0.0, 100.0); 4],
    });
    instance.x_coords = vec![0.0, 1.0, 2.0, 0.0];
    instance
}

pub fn example_problem() -> Problem {
    Problem::new(example_instance()).unwrap()
}

/// One patient with window [0, 5] reached at time 10, served instantly.
pub fn lateness_problem() -> Problem {
    Problem::new(build(Layout {
        distances: vec![
            vec![0.0, 10.0, 0.0],
            vec![10.0, 0.0, 10.0],
            vec![0.0, 10.0, 0.0],
        ],
        nbr_vehicles: 1,
        requirements: vec![vec![false], vec![true], vec![false]],
        qualifications: vec![vec![true]],
        processing_time: 0.0,
        windows: vec![(0.0, 100.0), (0.0, 5.0), (0.0, 100.0)],
    }))
    .unwrap()
}

/// The only patient needs service 1, which no vehicle provides.
pub fn uncovered_problem() -> Problem {
    Problem::new(build(Layout {
        distances: vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 1.0], vec![0.0, 1.0, 0.0]],
        nbr_vehicles: 2,
        requirements: vec![vec![false, false], vec![false, true], vec![false, false]],
        qualifications: vec![vec![true, false], vec![true, false]],
        processing_time: 1.0,
        windows: vec![(0.0, 100.0); 3],
    }))
    .unwrap()
}

/// One dual-service patient needing services 0 and 1, two fully qualified vehicles.
pub fn dual_problem(min_gap: f64, max_gap: f64) -> Problem {
    let mut instance = build(Layout {
        distances: vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 1.0], vec![0.0, 1.0, 0.0]],
        nbr_vehicles: 2,
        requirements: vec![vec![false, false], vec![true, true], vec![false, false]],
        qualifications: vec![vec![true, true], vec![true, true]],
        processing_time: 2.0,
        windows: vec![(0.0, 100.0); 3],
    });
    instance.dual_service_patients = vec![1];
    instance.min_gap[1] = min_gap;
    instance.max_gap[1] = max_gap;
    Problem::new(instance).unwrap()
}

/// Random euclidean instance where every service has a qualified vehicle. Every fourth
/// patient is dual-service with a wide gap range when there are at least two services.
pub fn random_problem(seed: u64, nbr_patients: usize, nbr_vehicles: usize, nbr_services: usize) -> Problem {
    let mut rng = rng(seed);
    let nbr_nodes = nbr_patients + 2;

    let mut points: Vec<(f64, f64)> = (0..nbr_nodes)
        .map(|_| (rng.gen_range(0..100) as f64, rng.gen_range(0..100) as f64))
        .collect();
    points[nbr_nodes - 1] = points[0];

    let distances = points
        .iter()
        .map(|a| {
            points
                .iter()
                .map(|b| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt())
                .collect()
        })
        .collect();

    let mut dual_service_patients = Vec::new();
    let requirements = (0..nbr_nodes)
        .map(|node| {
            let mut row = vec![false; nbr_services];
            if node == 0 || node == nbr_nodes - 1 {
                return row;
            }
            let first = rng.gen_range(0..nbr_services);
            row[first] = true;
            if nbr_services >= 2 && node % 4 == 0 {
                row[(first + 1) % nbr_services] = true;
                dual_service_patients.push(node);
            }
            row
        })
        .collect();

    let qualifications = (0..nbr_vehicles)
        .map(|vehicle| {
            (0..nbr_services)
                .map(|service| service % nbr_vehicles == vehicle || rng.gen_bool(0.5))
                .collect()
        })
        .collect();

    let processing_times = (0..nbr_nodes * nbr_vehicles)
        .map(|_| (0..nbr_services).map(|_| rng.gen_range(5..20) as f64).collect())
        .collect();

    let window_begin: Vec<f64> = (0..nbr_nodes).map(|_| rng.gen_range(0..120) as f64).collect();
    let window_end = window_begin
        .iter()
        .map(|begin| begin + rng.gen_range(60..240) as f64)
        .collect();

    let instance = ProblemInstance {
        nbr_nodes,
        nbr_vehicles,
        nbr_services,
        requirements,
        dual_service_patients,
        qualifications,
        x_coords: points.iter().map(|p| p.0).collect(),
        y_coords: points.iter().map(|p| p.1).collect(),
        distances,
        processing_times,
        min_gap: vec![0.0; nbr_nodes],
        max_gap: vec![10_000.0; nbr_nodes],
        window_begin,
        window_end,
    };

    Problem::new(instance).unwrap()
}
