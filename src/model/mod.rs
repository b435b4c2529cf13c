pub mod evaluation;
pub mod patient;
pub mod problem_instance;
pub mod schedule;
pub mod solution;
