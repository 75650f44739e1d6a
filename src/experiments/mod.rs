use std::time::Duration;

use crate::utils::supervisor::Timing;

pub mod aggregate_distances;
pub mod benchmark;
pub mod generate_folders;
pub mod generate_models;
pub mod run_cpoptimizer;
pub mod summarize;

#[derive(clap::Args, Debug, Clone)]
pub struct TimingArgs {
    /// Time limit of a single solver run, in seconds
    #[arg(long, default_value_t = 120)]
    exec_time_sec: u64,

    /// How long to wait past the time limit before killing the solver, in seconds
    #[arg(long, default_value_t = 2)]
    extra_time_sec: u64,

    /// Pause between two consecutive runs, in seconds
    #[arg(long, default_value_t = 2)]
    pause_time_sec: u64,
}

impl TimingArgs {
    pub fn timing(&self) -> Timing {
        Timing {
            budget: Duration::from_secs(self.exec_time_sec),
            grace: Duration::from_secs(self.extra_time_sec),
            pause: Duration::from_secs(self.pause_time_sec),
        }
    }
}
