use serde::Serialize;

use super::problem_instance::ProblemInstance;
use crate::error::{HhcError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patient {
    pub node: usize,
    pub time_window_begin: f64,
    pub time_window_end: f64,
    pub required_services: Vec<bool>,
    pub dual_service: bool,
    pub min_gap: f64,
    pub max_gap: f64,
}

impl Patient {
    pub fn requires(&self, service: usize) -> bool {
        self.required_services.get(service).copied().unwrap_or(false)
    }

    /// Required service types in ascending order.
    pub fn required(&self) -> impl Iterator<Item = usize> + '_ {
        self.required_services
            .iter()
            .enumerate()
            .filter(|&(_, &required)| required)
            .map(|(service, _)| service)
    }

    pub fn lateness(&self, end_time: f64) -> f64 {
        (end_time - self.time_window_end).max(0.0)
    }
}

/// One patient per non-depot node, in node order.
pub fn build_patients(problem_instance: &ProblemInstance) -> Result<Vec<Patient>> {
    problem_instance
        .patient_nodes()
        .map(|node| {
            let patient = Patient {
                node,
                time_window_begin: problem_instance.window_begin[node],
                time_window_end: problem_instance.window_end[node],
                required_services: problem_instance.requirements[node].clone(),
                dual_service: problem_instance.dual_service_patients.contains(&node),
                min_gap: problem_instance.min_gap[node],
                max_gap: problem_instance.max_gap[node],
            };

            if patient.dual_service && patient.required().count() != 2 {
                return Err(HhcError::InvalidInstance(format!(
                    "dual service patient {node} requires {} services instead of 2",
                    patient.required().count()
                )));
            }
            if patient.dual_service && patient.min_gap > patient.max_gap {
                return Err(HhcError::InvalidInstance(format!(
                    "dual service patient {node} has an empty gap range [{}, {}]",
                    patient.min_gap, patient.max_gap
                )));
            }

            Ok(patient)
        })
        .collect()
}
