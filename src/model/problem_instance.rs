use std::{fmt, fs, iter::Peekable, ops::Range, path::Path, str::FromStr, str::Lines};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::patient::{build_patients, Patient};
use crate::error::{HhcError, Result};

/// Immutable HHCRSP input. Node `0` and node `nbr_nodes - 1` are the two ends of the
/// depot; every other node is a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemInstance {
    pub nbr_nodes: usize,
    pub nbr_vehicles: usize,
    pub nbr_services: usize,
    /// `requirements[node][service]`
    pub requirements: Vec<Vec<bool>>,
    pub dual_service_patients: Vec<usize>,
    /// `qualifications[vehicle][service]`
    pub qualifications: Vec<Vec<bool>>,
    pub x_coords: Vec<f64>,
    pub y_coords: Vec<f64>,
    pub distances: Vec<Vec<f64>>,
    /// Row `node * nbr_vehicles + vehicle`, one column per service.
    pub processing_times: Vec<Vec<f64>>,
    pub min_gap: Vec<f64>,
    pub max_gap: Vec<f64>,
    pub window_begin: Vec<f64>,
    pub window_end: Vec<f64>,
}

/// Loads an instance from the labeled text format, or from JSON when the path ends in `.json`.
pub fn load_problem_instance(path: impl AsRef<Path>) -> Result<ProblemInstance> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|source| HhcError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let problem_instance: ProblemInstance = serde_json::from_str(&data)?;
        problem_instance.validate()?;
        Ok(problem_instance)
    } else {
        data.parse()
    }
}

impl ProblemInstance {
    pub fn depot_departure(&self) -> usize {
        0
    }

    pub fn depot_arrival(&self) -> usize {
        self.nbr_nodes - 1
    }

    pub fn is_depot(&self, node: usize) -> bool {
        node == self.depot_departure() || node == self.depot_arrival()
    }

    pub fn patient_nodes(&self) -> Range<usize> {
        1..self.nbr_nodes - 1
    }

    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from][to]
    }

    /// `None` when the node, vehicle or service is out of range.
    pub fn processing_time(&self, node: usize, vehicle: usize, service: usize) -> Option<f64> {
        if vehicle >= self.nbr_vehicles {
            return None;
        }
        self.processing_times
            .get(node * self.nbr_vehicles + vehicle)?
            .get(service)
            .copied()
    }

    pub fn is_qualified(&self, vehicle: usize, service: usize) -> bool {
        self.qualifications
            .get(vehicle)
            .and_then(|row| row.get(service))
            .copied()
            .unwrap_or(false)
    }

    pub fn qualified_vehicles(&self, service: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.nbr_vehicles).filter(move |&vehicle| self.is_qualified(vehicle, service))
    }

    /// Checks every table against the declared counts.
    pub fn validate(&self) -> Result<()> {
        if self.nbr_nodes < 2 {
            return Err(HhcError::InvalidInstance(format!(
                "at least the two depot nodes are required, found {} nodes",
                self.nbr_nodes
            )));
        }
        if self.nbr_vehicles == 0 {
            return Err(HhcError::InvalidInstance("no vehicles".to_string()));
        }
        if self.nbr_services == 0 {
            return Err(HhcError::InvalidInstance("no service types".to_string()));
        }

        check_matrix("r", &self.requirements, self.nbr_nodes, self.nbr_services)?;
        check_matrix("a", &self.qualifications, self.nbr_vehicles, self.nbr_services)?;
        check_len("x", self.x_coords.len(), self.nbr_nodes)?;
        check_len("y", self.y_coords.len(), self.nbr_nodes)?;
        check_matrix("d", &self.distances, self.nbr_nodes, self.nbr_nodes)?;
        check_matrix(
            "p",
            &self.processing_times,
            self.nbr_nodes * self.nbr_vehicles,
            self.nbr_services,
        )?;
        check_len("mind", self.min_gap.len(), self.nbr_nodes)?;
        check_len("maxd", self.max_gap.len(), self.nbr_nodes)?;
        check_len("e", self.window_begin.len(), self.nbr_nodes)?;
        check_len("l", self.window_end.len(), self.nbr_nodes)?;

        if let Some(&node) = self
            .dual_service_patients
            .iter()
            .find(|&&node| node == 0 || node >= self.nbr_nodes - 1)
        {
            return Err(HhcError::InvalidInstance(format!(
                "dual service node {node} is not a patient node"
            )));
        }

        Ok(())
    }
}

fn check_len(section: &'static str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(HhcError::MalformedInstance {
            section,
            reason: format!("expected {expected} values, found {found}"),
        });
    }
    Ok(())
}

fn check_matrix<T>(section: &'static str, rows: &[Vec<T>], nbr_rows: usize, width: usize) -> Result<()> {
    check_len(section, rows.len(), nbr_rows)?;
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(HhcError::MalformedInstance {
                section,
                reason: format!("row {i}: expected {width} values, found {}", row.len()),
            });
        }
    }
    Ok(())
}

fn is_data_line(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|token| token.parse::<f64>().is_ok())
}

/// Walks the labeled sections of an instance file. Each section is a label line followed by
/// whitespace separated data lines.
struct SectionReader<'a> {
    lines: Peekable<Lines<'a>>,
}

impl<'a> SectionReader<'a> {
    fn new(data: &'a str) -> Self {
        SectionReader {
            lines: data.lines().peekable(),
        }
    }

    fn label(&mut self, section: &'static str) -> Result<()> {
        let line = self.next_non_blank().ok_or_else(|| HhcError::MalformedInstance {
            section,
            reason: "section is missing".to_string(),
        })?;

        if is_data_line(line) {
            return Err(HhcError::MalformedInstance {
                section,
                reason: format!("expected a section label, found `{}`", line.trim()),
            });
        }
        if line.trim() != section {
            warn!(expected = section, found = line.trim(), "unexpected section label");
        }
        Ok(())
    }

    fn next_non_blank(&mut self) -> Option<&'a str> {
        self.lines.by_ref().find(|line| !line.trim().is_empty())
    }

    fn row<T: FromStr>(&mut self, section: &'static str, row: usize, width: usize) -> Result<Vec<T>> {
        let line = self.next_non_blank().ok_or_else(|| HhcError::MalformedInstance {
            section,
            reason: format!("row {row} is missing"),
        })?;
        let values = parse_values(section, row, line)?;
        if values.len() != width {
            return Err(HhcError::MalformedInstance {
                section,
                reason: format!("row {row}: expected {width} values, found {}", values.len()),
            });
        }
        Ok(values)
    }

    fn scalar(&mut self, section: &'static str) -> Result<usize> {
        self.label(section)?;
        Ok(self.row::<usize>(section, 0, 1)?[0])
    }

    fn vector(&mut self, section: &'static str, width: usize) -> Result<Vec<f64>> {
        self.label(section)?;
        self.row(section, 0, width)
    }

    fn matrix<T: FromStr>(
        &mut self,
        section: &'static str,
        nbr_rows: usize,
        width: usize,
    ) -> Result<Vec<Vec<T>>> {
        self.label(section)?;
        (0..nbr_rows).map(|row| self.row(section, row, width)).collect()
    }

    fn flags(&mut self, section: &'static str, nbr_rows: usize, width: usize) -> Result<Vec<Vec<bool>>> {
        let rows = self.matrix::<u8>(section, nbr_rows, width)?;
        rows.into_iter()
            .enumerate()
            .map(|(row, values)| {
                values
                    .into_iter()
                    .map(|value| match value {
                        0 => Ok(false),
                        1 => Ok(true),
                        other => Err(HhcError::MalformedInstance {
                            section,
                            reason: format!("row {row}: expected 0 or 1, found {other}"),
                        }),
                    })
                    .collect()
            })
            .collect()
    }

    /// A list of any length on a single line. The line may be blank or absent altogether.
    fn open_list(&mut self, section: &'static str) -> Result<Vec<usize>> {
        self.label(section)?;
        match self.lines.peek().copied() {
            Some(line) if line.trim().is_empty() => {
                self.lines.next();
                Ok(Vec::new())
            }
            Some(line) if is_data_line(line) => {
                self.lines.next();
                parse_values(section, 0, line)
            }
            _ => Ok(Vec::new()),
        }
    }
}

fn parse_values<T: FromStr>(section: &'static str, row: usize, line: &str) -> Result<Vec<T>> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<T>().map_err(|_| HhcError::MalformedInstance {
                section,
                reason: format!("row {row}: `{token}` is not a valid number"),
            })
        })
        .collect()
}

impl FromStr for ProblemInstance {
    type Err = HhcError;

    fn from_str(data: &str) -> Result<Self> {
        let mut reader = SectionReader::new(data);

        let nbr_nodes = reader.scalar("nbNodes")?;
        let nbr_vehicles = reader.scalar("nbVehi")?;
        let nbr_services = reader.scalar("nbServi")?;

        let requirements = reader.flags("r", nbr_nodes, nbr_services)?;
        let dual_service_patients = reader.open_list("DS")?;
        let qualifications = reader.flags("a", nbr_vehicles, nbr_services)?;
        let x_coords = reader.vector("x", nbr_nodes)?;
        let y_coords = reader.vector("y", nbr_nodes)?;
        let distances = reader.matrix("d", nbr_nodes, nbr_nodes)?;
        let processing_times = reader.matrix("p", nbr_nodes * nbr_vehicles, nbr_services)?;
        let min_gap = reader.vector("mind", nbr_nodes)?;
        let max_gap = reader.vector("maxd", nbr_nodes)?;
        let window_begin = reader.vector("e", nbr_nodes)?;
        let window_end = reader.vector("l", nbr_nodes)?;

        let problem_instance = ProblemInstance {
            nbr_nodes,
            nbr_vehicles,
            nbr_services,
            requirements,
            dual_service_patients,
            qualifications,
            x_coords,
            y_coords,
            distances,
            processing_times,
            min_gap,
            max_gap,
            window_begin,
            window_end,
        };
        problem_instance.validate()?;
        Ok(problem_instance)
    }
}

/// Writes the labeled text format read by [`load_problem_instance`].
impl fmt::Display for ProblemInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = |row: &Vec<bool>| row.iter().map(|&flag| u8::from(flag)).join(" ");

        writeln!(f, "nbNodes\n{}", self.nbr_nodes)?;
        writeln!(f, "nbVehi\n{}", self.nbr_vehicles)?;
        writeln!(f, "nbServi\n{}", self.nbr_services)?;
        writeln!(f, "r\n{}", self.requirements.iter().map(flags).join("\n"))?;
        writeln!(f, "DS\n{}", self.dual_service_patients.iter().join(" "))?;
        writeln!(f, "a\n{}", self.qualifications.iter().map(flags).join("\n"))?;
        writeln!(f, "x\n{}", self.x_coords.iter().join(" "))?;
        writeln!(f, "y\n{}", self.y_coords.iter().join(" "))?;
        writeln!(f, "d\n{}", self.distances.iter().map(|row| row.iter().join(" ")).join("\n"))?;
        writeln!(
            f,
            "p\n{}",
            self.processing_times
                .iter()
                .map(|row| row.iter().join(" "))
                .join("\n")
        )?;
        writeln!(f, "mind\n{}", self.min_gap.iter().join(" "))?;
        writeln!(f, "maxd\n{}", self.max_gap.iter().join(" "))?;
        writeln!(f, "e\n{}", self.window_begin.iter().join(" "))?;
        write!(f, "l\n{}", self.window_end.iter().join(" "))
    }
}

/// The instance together with its derived patient list. Every solver phase reads this and
/// nothing else.
#[derive(Debug, Clone)]
pub struct Problem {
    pub instance: ProblemInstance,
    pub patients: Vec<Patient>,
}

impl Problem {
    pub fn new(instance: ProblemInstance) -> Result<Self> {
        instance.validate()?;
        let patients = build_patients(&instance)?;
        Ok(Problem { instance, patients })
    }

    /// `None` for depot nodes and nodes outside the instance.
    pub fn patient(&self, node: usize) -> Option<&Patient> {
        self.patients.get(node.checked_sub(1)?)
    }

    /// Fails on the first required (patient, service) pair no vehicle is qualified for.
    pub fn check_coverage(&self) -> Result<()> {
        for patient in &self.patients {
            for service in patient.required() {
                if self.instance.qualified_vehicles(service).next().is_none() {
                    return Err(HhcError::NoQualifiedVehicle {
                        node: patient.node,
                        service,
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of (patient, service) pairs a complete solution covers.
    pub fn nbr_required_visits(&self) -> usize {
        self.patients.iter().map(|patient| patient.required().count()).sum()
    }
}
