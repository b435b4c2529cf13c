use std::io::{self, Write};

use clap::ValueEnum;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    model::schedule::TimedStop,
    solver::solver::{SolverConfig, SolverResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn write_solution<W: Write>(
    out: &mut W,
    result: &SolverResult,
    configuration: &SolverConfig,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => print_solution(out, result),
        OutputFormat::Json => save_solution_json(out, result, configuration),
    }
}

/// One line per vehicle: `vehicle <v>: <depot> <node>[<service>]@<start>-<end> ... <depot>`.
pub fn print_solution<W: Write>(out: &mut W, result: &SolverResult) -> io::Result<()> {
    let best = &result.best;
    let eval = &best.evaluation;

    writeln!(out, "objective: {}", eval.objective)?;
    writeln!(out, "travel_distance: {}", eval.travel_distance)?;
    writeln!(out, "total_lateness: {}", eval.total_lateness)?;
    writeln!(out, "max_lateness: {}", eval.max_lateness)?;
    writeln!(out, "feasible: {}", best.is_feasible())?;
    for violation in &best.report.violations {
        writeln!(out, "violation: {violation}")?;
    }

    for route in &best.schedule.routes {
        let stops = route
            .stops
            .iter()
            .map(|stop| match stop {
                TimedStop::Depot { node } => node.to_string(),
                TimedStop::Visit(visit) => format!(
                    "{}[{}]@{}-{}",
                    visit.node, visit.service, visit.start, visit.end
                ),
            })
            .join(" ");
        writeln!(out, "vehicle {}: {}", route.vehicle, stops)?;
    }

    Ok(())
}

#[derive(Serialize)]
struct JsonStop {
    node: usize,
    service: Option<usize>,
    start: Option<f64>,
    end: Option<f64>,
}

#[derive(Serialize)]
struct SolutionJsonSummary<'a> {
    routes: Vec<Vec<JsonStop>>,
    objective: f64,
    travel_distance: f64,
    total_lateness: f64,
    max_lateness: f64,
    feasible: bool,
    violations: Vec<String>,
    iterations_run: usize,
    configuration: &'a SolverConfig,
}

pub fn save_solution_json<W: Write>(
    out: &mut W,
    result: &SolverResult,
    configuration: &SolverConfig,
) -> io::Result<()> {
    let best = &result.best;
    let routes = best
        .schedule
        .routes
        .iter()
        .map(|route| {
            route
                .stops
                .iter()
                .map(|stop| match stop {
                    TimedStop::Depot { node } => JsonStop {
                        node: *node,
                        service: None,
                        start: None,
                        end: None,
                    },
                    TimedStop::Visit(visit) => JsonStop {
                        node: visit.node,
                        service: Some(visit.service),
                        start: Some(visit.start),
                        end: Some(visit.end),
                    },
                })
                .collect()
        })
        .collect();

    let summary = SolutionJsonSummary {
        routes,
        objective: best.evaluation.objective,
        travel_distance: best.evaluation.travel_distance,
        total_lateness: best.evaluation.total_lateness,
        max_lateness: best.evaluation.max_lateness,
        feasible: best.is_feasible(),
        violations: best.report.violations.iter().map(ToString::to_string).collect(),
        iterations_run: result.iterations_run,
        configuration,
    };

    serde_json::to_writer_pretty(&mut *out, &summary)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grasp::Candidate,
        model::{evaluation::LatenessScope, solution::Solution},
        test_utils::example_problem,
    };

    fn example_result() -> SolverResult {
        let problem = example_problem();
        let solution = Solution::from_visits(&problem, &[vec![(1, 0), (2, 0)]]);
        SolverResult {
            best: Candidate::score(&problem, solution, LatenessScope::Global),
            histories: vec![vec![7.0]],
            iterations_run: 1,
        }
    }

    #[test]
    fn text_lists_routes_with_times() {
        let mut out = Vec::new();
        print_solution(&mut out, &example_result()).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "objective: 7\ntravel_distance: 7\ntotal_lateness: 0\nmax_lateness: 0\nfeasible: true\n\
             vehicle 0: 0 1[0]@2-3 2[0]@6-7 3\n"
        );
    }

    #[test]
    fn json_carries_score_and_configuration() {
        let mut out = Vec::new();
        let configuration = SolverConfig {
            problem_instance_location: "example.txt".to_string(),
            ..SolverConfig::default()
        };
        write_solution(&mut out, &example_result(), &configuration, OutputFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["objective"], 7.0);
        assert_eq!(value["feasible"], true);
        assert_eq!(value["routes"][0][1]["node"], 1);
        assert_eq!(value["routes"][0][1]["start"], 2.0);
        assert_eq!(value["routes"][0][0]["service"], serde_json::Value::Null);
        assert_eq!(value["configuration"]["problem_instance_location"], "example.txt");
        assert_eq!(value["configuration"]["cost_model"], "processing-time");
    }
}
