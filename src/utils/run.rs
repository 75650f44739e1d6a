use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use super::{
    layout::{file_stem, Layout},
    problem::Problem,
};

/// One solver invocation: a configuration applied to an instance with a seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDescriptor {
    pub problem: Problem,
    pub config: PathBuf,
    pub instance: PathBuf,
    pub seed: u64,
    pub log: PathBuf,
}

impl RunDescriptor {
    pub fn instance_name(&self) -> String {
        self.instance
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Where the solver's own stdout/stderr is kept.
    pub fn console_path(&self) -> PathBuf {
        self.log.with_extension("out")
    }
}

/// Command line of the line-log producing solver:
/// `<program> [leading args] <config> <instance> <log> --randomSeed <seed>
/// [--workers N] [--timeLimit S]`
#[derive(Clone, Debug)]
pub struct SolverCommand {
    pub program: OsString,
    pub leading_args: Vec<OsString>,
    pub workers: Option<u32>,
    pub time_limit: Option<Duration>,
}

impl SolverCommand {
    pub fn argv(&self, run: &RunDescriptor) -> Vec<OsString> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.leading_args.iter().cloned());
        argv.push(run.config.clone().into());
        argv.push(run.instance.clone().into());
        argv.push(run.log.clone().into());
        argv.push("--randomSeed".into());
        argv.push(run.seed.to_string().into());
        if let Some(workers) = self.workers {
            argv.push("--workers".into());
            argv.push(workers.to_string().into());
        }
        if let Some(limit) = self.time_limit {
            argv.push("--timeLimit".into());
            argv.push(limit.as_secs().to_string().into());
        }
        argv
    }
}

/// All runs of one configuration over the instances of a problem.
#[derive(Clone, Debug)]
pub struct RunBatch {
    pub config_name: String,
    pub runs: Vec<RunDescriptor>,
}

impl RunBatch {
    /// Instance-major, seed-minor, in the order given.
    pub fn enumerate(
        layout: &Layout,
        problem: Problem,
        config: &Path,
        instances: &[String],
        seeds: &[u64],
    ) -> RunBatch {
        let config_name = file_stem(&config.to_string_lossy());
        let data_dir = layout.data_dir(problem);

        let mut runs = Vec::with_capacity(instances.len() * seeds.len());
        for instance in instances {
            for &seed in seeds {
                runs.push(RunDescriptor {
                    problem,
                    config: config.to_owned(),
                    instance: data_dir.join(instance),
                    seed,
                    log: layout.run_log(problem, instance, &config_name, seed),
                });
            }
        }

        RunBatch { config_name, runs }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
