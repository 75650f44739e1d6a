//! Benchmarks a solver that reads exported `.cpo` models and reports its
//! progress as a JSON document. The document is converted into the same
//! per-run log format the line-log solvers write.
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use clap::Parser;

use crate::utils::{
    errors::ConfigError,
    harvest::{parse_document, Trajectory},
    layout::{list_sorted, Layout},
    problem::Problem,
    progress::Progress,
    supervisor::{ExitKind, ProcessOutcome, Supervisor, Timing},
};

#[derive(Parser, Debug)]
pub struct RunCpoptimizerArgs {
    #[arg(value_enum, required = true)]
    problems: Vec<Problem>,

    /// Solver executable
    #[arg(long, default_value = "solve_CPOs/solveCPOs")]
    solver: PathBuf,

    /// Name the results are filed under in logs/<problem>/<instance>/
    #[arg(long, default_value_t = String::from("12CPO"))]
    config_name: String,

    #[arg(long, default_value_t = 12)]
    workers: u32,

    /// Seeds every instance is solved with
    #[arg(long, value_delimiter = ',', default_values_t = [0, 1, 2])]
    seeds: Vec<u64>,

    /// Time limit passed to the solver, in seconds
    #[arg(long, default_value_t = 120)]
    time_limit_sec: u64,

    /// How long to wait past the time limit before killing the solver, in seconds
    #[arg(long, default_value_t = 2)]
    extra_time_sec: u64,

    /// Pause between two consecutive runs, in seconds
    #[arg(long, default_value_t = 0)]
    pause_time_sec: u64,
}

pub struct CpoSolver {
    pub program: OsString,
    pub leading_args: Vec<OsString>,
    pub workers: u32,
    pub time_limit: Duration,
}

impl CpoSolver {
    /// `<program> [leading args] --output <json> --workers N --timeLimit S
    /// --RandomSeed <seed> <model>`
    pub fn argv(&self, model: &Path, output: &Path, seed: u64) -> Vec<OsString> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.leading_args.iter().cloned());
        argv.extend([
            "--output".into(),
            output.as_os_str().to_owned(),
            "--workers".into(),
            self.workers.to_string().into(),
            "--timeLimit".into(),
            self.time_limit.as_secs().to_string().into(),
            "--RandomSeed".into(),
            seed.to_string().into(),
            model.as_os_str().to_owned(),
        ]);
        argv
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CpoReport {
    pub finished: usize,
    pub total: usize,
    pub failed: usize,
    pub empty: usize,
}

/// Solves every instance model of `problem` once per seed and writes
/// `logs/<problem>/<instance>/<config_name>/<seed>.log`.
pub fn run_problem(
    layout: &Layout,
    problem: Problem,
    config_name: &str,
    seeds: &[u64],
    solver: &CpoSolver,
    supervisor: &Supervisor,
) -> anyhow::Result<CpoReport> {
    if seeds.is_empty() {
        return Err(ConfigError::NoSeeds.into());
    }
    let data_dir = layout.data_dir(problem);
    if !data_dir.is_dir() {
        return Err(ConfigError::MissingDataDir(data_dir).into());
    }
    let instances = list_sorted(&data_dir)?;
    layout.create_run_dirs(problem, &instances, [config_name])?;

    let per_run = supervisor.timing().per_run();
    let mut progress = Progress::new(instances.len() * seeds.len());
    let mut report = CpoReport {
        total: progress.total(),
        ..Default::default()
    };

    'instances: for instance in &instances {
        let model = layout.model_path(problem, instance);

        for &seed in seeds {
            info!("Running experiment: {}", progress.describe(per_run));
            info!("{} seed: {}", instance, seed);

            let log = layout.run_log(problem, instance, config_name, seed);
            let document = log.with_extension("json");
            // never harvest a document left over from an earlier run
            _ = fs::remove_file(&document);

            let outcome = if model.is_file() {
                let argv = solver.argv(&model, &document, seed);
                supervisor.execute(&argv, &log.with_extension("out"))
            } else {
                ProcessOutcome::launch_failed(format!("model '{}' does not exist", model.display()))
            };

            match &outcome.status {
                ExitKind::Success | ExitKind::StillRunningAtDeadline => {}
                ExitKind::NonZeroExit(code) => {
                    report.failed += 1;
                    warn!("Instance crashed! exit code {}", code);
                }
                ExitKind::LaunchFailed(reason) => {
                    report.failed += 1;
                    error!("failed to launch the solver: {}", reason);
                }
                ExitKind::Interrupted => {
                    warn!("interrupted, stopping");
                    break 'instances;
                }
            }

            progress = progress.advance();

            let trajectory = parse_document(&document, problem).unwrap_or_else(|e| {
                warn!("  no usable solver output: {}", e);
                Trajectory::new()
            });
            if trajectory.is_empty() {
                report.empty += 1;
            }
            trajectory.write_log(&log)?;
            debug!("  {} points written to '{}'", trajectory.len(), log.display());
        }
    }

    report.finished = progress.finished();
    Ok(report)
}

pub fn run(args: RunCpoptimizerArgs, layout: &Layout, stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    let solver = CpoSolver {
        program: args.solver.into(),
        leading_args: Vec::new(),
        workers: args.workers,
        time_limit: Duration::from_secs(args.time_limit_sec),
    };
    let supervisor = Supervisor::new(
        Timing {
            budget: solver.time_limit,
            grace: Duration::from_secs(args.extra_time_sec),
            pause: Duration::from_secs(args.pause_time_sec),
        },
        stop,
    );

    for problem in args.problems {
        let report = run_problem(
            layout,
            problem,
            &args.config_name,
            &args.seeds,
            &solver,
            &supervisor,
        )?;
        info!(
            "{}: {}/{} runs, {} failed, {} without a solution",
            problem, report.finished, report.total, report.failed, report.empty
        );
        if supervisor.interrupted() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> Supervisor {
        Supervisor::new(
            Timing {
                budget: Duration::from_secs(5),
                grace: Duration::from_millis(100),
                pause: Duration::ZERO,
            },
            Arc::new(AtomicBool::new(false)),
        )
    }

    /// Writes a two-entry history into the --output file ($2), the second
    /// objective depends on the seed ($8).
    fn fake_solver() -> CpoSolver {
        let script = r#"
printf '[{"objectiveHistory": [{"objective": 12000500, "solveTime": 0.5}, ' > "$2"
printf '{"objective": %d, "solveTime": 2.25}]}]' $((11000000 + $8)) >> "$2"
"#;
        CpoSolver {
            program: "sh".into(),
            leading_args: vec!["-c".into(), script.into(), "solveCPOs".into()],
            workers: 12,
            time_limit: Duration::from_secs(1),
        }
    }

    fn project(with_models: bool) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data/VRP-TW")).unwrap();
        fs::write(tmp.path().join("data/VRP-TW/C101.txt"), "").unwrap();
        if with_models {
            fs::create_dir_all(tmp.path().join("ilog_models/VRP-TW")).unwrap();
            fs::write(tmp.path().join("ilog_models/VRP-TW/C101.cpo"), "").unwrap();
        }
        tmp
    }

    #[test]
    fn packed_history_is_decoded_into_logs() {
        let tmp = project(true);
        let layout = Layout::new(tmp.path());
        let solver = fake_solver();

        let report =
            run_problem(&layout, Problem::VrpTw, "12CPO", &[0, 1], &solver, &supervisor()).unwrap();
        assert_eq!(
            report,
            CpoReport {
                finished: 2,
                total: 2,
                failed: 0,
                empty: 0
            }
        );

        let log = layout.run_log(Problem::VrpTw, "C101.txt", "12CPO", 1);
        assert_eq!(
            fs::read_to_string(log).unwrap(),
            "0.5 500 12\n2.25 1 11\n"
        );
    }

    #[test]
    fn missing_model_leaves_empty_log() {
        let tmp = project(false);
        let layout = Layout::new(tmp.path());
        let solver = fake_solver();

        let seeds = [0, 1, 2];
        let report =
            run_problem(&layout, Problem::VrpTw, "12CPO", &seeds, &solver, &supervisor()).unwrap();
        assert_eq!(report.finished, 3);
        assert_eq!(report.failed, 3);
        assert_eq!(report.empty, 3);

        let log = layout.run_log(Problem::VrpTw, "C101.txt", "12CPO", 0);
        assert_eq!(fs::read_to_string(log).unwrap(), "");
    }

    #[test]
    fn interrupt_stops_before_any_solver_runs() {
        let tmp = project(true);
        let layout = Layout::new(tmp.path());
        let stopped = Supervisor::new(*supervisor().timing(), Arc::new(AtomicBool::new(true)));

        let report =
            run_problem(&layout, Problem::VrpTw, "12CPO", &[0, 1], &fake_solver(), &stopped)
                .unwrap();
        assert_eq!(report.finished, 0);
        assert_eq!(report.failed, 0);
        let log = layout.run_log(Problem::VrpTw, "C101.txt", "12CPO", 0);
        assert!(!log.exists());
        assert!(!log.with_extension("json").exists());
    }
}
