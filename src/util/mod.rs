pub mod output;
pub mod sorting;
