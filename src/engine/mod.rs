pub mod runner;

pub use runner::{run_experiment, RunSummary};
