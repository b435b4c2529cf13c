//! GRASP solver for the home health care routing and scheduling problem.

pub mod error;
pub mod grasp;
pub mod model;
pub mod solver;
pub mod util;

#[cfg(test)]
mod test_utils;
