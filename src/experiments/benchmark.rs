//! Runs one solver configuration over every instance of a problem, once per
//! seed, strictly one process at a time.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;

use crate::utils::{
    errors::ConfigError,
    harvest::parse_line_log,
    layout::{list_sorted, Layout},
    problem::{validate_config, Problem},
    progress::Progress,
    run::{RunBatch, SolverCommand},
    supervisor::{ExitKind, Supervisor, Timing},
};

use super::TimingArgs;

#[derive(Parser, Debug)]
pub struct BenchmarkArgs {
    #[arg(value_enum)]
    problem: Problem,

    /// Solver configuration file (JSON)
    config: PathBuf,

    /// Seeds every instance is solved with
    #[arg(long, value_delimiter = ',', default_values_t = [0, 1, 2])]
    seeds: Vec<u64>,

    /// Program that runs the solver
    #[arg(long, default_value_t = String::from("node"))]
    solver: String,

    /// Arguments placed before the per-run arguments, repeatable
    #[arg(
        long = "solver-arg",
        allow_hyphen_values = true,
        default_values_t = [String::from("scripts/run.js")]
    )]
    solver_args: Vec<String>,

    /// Pass --workers to the solver
    #[arg(long)]
    workers: Option<u32>,

    /// Pass the execution time as --timeLimit to the solver
    #[arg(long, action)]
    pass_time_limit: bool,

    #[command(flatten)]
    timing: TimingArgs,
}

impl BenchmarkArgs {
    pub fn timing(&self) -> Timing {
        self.timing.timing()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub finished: usize,
    pub total: usize,
    pub crashed: usize,
    pub killed: usize,
    pub launch_failures: usize,
    pub harvest_failures: usize,
    pub interrupted: bool,
}

/// Validates the inputs of a batch and enumerates its runs. Nothing is
/// spawned and no directory is created here.
pub fn prepare_batch(
    layout: &Layout,
    problem: Problem,
    config: &Path,
    seeds: &[u64],
) -> anyhow::Result<RunBatch> {
    if seeds.is_empty() {
        return Err(ConfigError::NoSeeds.into());
    }
    validate_config(config, problem)?;
    let config = fs::canonicalize(config)
        .with_context(|| format!("failed to resolve '{}'", config.display()))?;

    let data_dir = layout.data_dir(problem);
    if !data_dir.is_dir() {
        return Err(ConfigError::MissingDataDir(data_dir).into());
    }
    let instances = list_sorted(&data_dir)?;
    if instances.is_empty() {
        warn!("no instances in '{}'", data_dir.display());
    }

    Ok(RunBatch::enumerate(layout, problem, &config, &instances, seeds))
}

/// Executes every run of the batch in order. Failures of single runs are
/// logged and counted, they never stop the batch; only an interrupt does.
pub fn run_batch(
    layout: &Layout,
    batch: &RunBatch,
    solver: &SolverCommand,
    supervisor: &Supervisor,
) -> anyhow::Result<BatchReport> {
    if batch.is_empty() {
        return Ok(BatchReport::default());
    }
    let problem = batch.runs[0].problem;

    let mut instances: Vec<String> = batch.runs.iter().map(|r| r.instance_name()).collect();
    instances.dedup();
    layout.create_run_dirs(problem, &instances, [batch.config_name.as_str()])?;

    let per_run = supervisor.timing().per_run();
    let mut progress = Progress::new(batch.len());
    let mut report = BatchReport {
        total: batch.len(),
        ..Default::default()
    };

    for run in &batch.runs {
        info!("Running experiment: {}", progress.describe(per_run));
        info!("{} seed: {}", run.instance_name(), run.seed);

        // a solver that dies before opening its log must not leave an older
        // batch's log behind to be harvested
        match fs::remove_file(&run.log) {
            Ok(()) => debug!("removed stale '{}'", run.log.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                let context = format!("failed to remove '{}'", run.log.display());
                return Err(anyhow::Error::new(e).context(context));
            }
        }

        let outcome = supervisor.execute(&solver.argv(run), &run.console_path());

        match &outcome.status {
            ExitKind::Success => debug!("solver finished after {:?}", outcome.wall_time),
            ExitKind::StillRunningAtDeadline => {
                report.killed += 1;
                debug!("solver killed after {:?}", outcome.wall_time);
            }
            ExitKind::NonZeroExit(code) => {
                report.crashed += 1;
                warn!(
                    "Instance crashed! exit code {}, see '{}'",
                    code,
                    run.console_path().display()
                );
            }
            ExitKind::LaunchFailed(reason) => {
                report.launch_failures += 1;
                error!("failed to launch the solver: {}", reason);
            }
            ExitKind::Interrupted => {
                report.interrupted = true;
                warn!("interrupted, stopping the batch");
                break;
            }
        }

        progress = progress.advance();

        match parse_line_log(&run.log, run.problem) {
            Ok(t) => match t.best() {
                Some(best) => info!(
                    "  {} solutions, best {} at {:.2}s",
                    t.len(),
                    best.objective,
                    best.time
                ),
                None => info!("  no solution found"),
            },
            Err(e) => {
                report.harvest_failures += 1;
                warn!("  no usable log: {}", e);
            }
        }
    }

    report.finished = progress.finished();
    Ok(report)
}

pub fn run(args: BenchmarkArgs, layout: &Layout, supervisor: &Supervisor) -> anyhow::Result<()> {
    let batch = prepare_batch(layout, args.problem, &args.config, &args.seeds)?;
    let time_limit = args.pass_time_limit.then(|| args.timing().budget);
    let solver = SolverCommand {
        program: args.solver.into(),
        leading_args: args.solver_args.into_iter().map(Into::into).collect(),
        workers: args.workers,
        time_limit,
    };

    info!(
        "{} runs of '{}' on {} instances",
        batch.len(),
        batch.config_name,
        args.problem
    );
    let report = run_batch(layout, &batch, &solver, supervisor)?;
    info!(
        "finished {}/{} runs: {} crashed, {} killed at deadline, {} failed to launch, \
         {} without a usable log",
        report.finished,
        report.total,
        report.crashed,
        report.killed,
        report.launch_failures,
        report.harvest_failures
    );
    if report.interrupted {
        warn!(
            "the batch was interrupted, {} runs were not executed",
            report.total - report.finished
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{atomic::AtomicBool, Arc},
        time::Duration,
    };

    use super::*;

    fn project(instances: &[&str]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data/TSP")).unwrap();
        fs::create_dir_all(tmp.path().join("configs/TSP")).unwrap();
        for i in instances {
            fs::write(tmp.path().join("data/TSP").join(i), "").unwrap();
        }
        fs::write(
            tmp.path().join("configs/TSP/1LNS.json"),
            r#"{"problem": "TSP", "optal": {"LNS": 1, "FDS": 0}}"#,
        )
        .unwrap();
        tmp
    }

    fn sh(script: &str) -> SolverCommand {
        SolverCommand {
            program: "sh".into(),
            leading_args: vec!["-c".into(), script.into(), "solver".into()],
            workers: None,
            time_limit: None,
        }
    }

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

    #[test]
    fn every_run_writes_its_log() {
        let tmp = project(&["b.tsp", "a.tsp"]);
        let layout = Layout::new(tmp.path());
        let batch = prepare_batch(
            &layout,
            Problem::Tsp,
            &tmp.path().join("configs/TSP/1LNS.json"),
            &[0, 1, 2],
        )
        .unwrap();
        assert_eq!(batch.len(), 6);
        assert_eq!(batch.runs[0].instance_name(), "a.tsp");

        let solver = sh(r#"printf '0.5 100\n1.5 90 1\n' > "$3"; echo "seed $5""#);
        let report = run_batch(&layout, &batch, &solver, &supervisor()).unwrap();

        assert_eq!(report.finished, 6);
        assert_eq!(report.total, 6);
        assert_eq!(report.harvest_failures, 0);
        let log = layout.run_log(Problem::Tsp, "b.tsp", "1LNS", 2);
        assert_eq!(fs::read_to_string(&log).unwrap(), "0.5 100\n1.5 90 1\n");
        assert_eq!(
            fs::read_to_string(log.with_extension("out")).unwrap(),
            "seed 2\n"
        );
    }

    #[test]
    fn missing_outputs_do_not_stop_the_batch() {
        let tmp = project(&["a.tsp", "b.tsp", "c.tsp"]);
        let layout = Layout::new(tmp.path());
        let batch = prepare_batch(
            &layout,
            Problem::Tsp,
            &tmp.path().join("configs/TSP/1LNS.json"),
            &[0, 1],
        )
        .unwrap();

        let report = run_batch(&layout, &batch, &sh("exit 7"), &supervisor()).unwrap();
        assert_eq!(report.finished, report.total);
        assert_eq!(report.crashed, 6);
        assert_eq!(report.harvest_failures, 6);
        assert!(layout.run_dir(Problem::Tsp, "c.tsp", "1LNS").is_dir());
    }

    #[test]
    fn log_of_an_earlier_batch_is_not_harvested() {
        let tmp = project(&["a.tsp"]);
        let layout = Layout::new(tmp.path());
        let batch = prepare_batch(
            &layout,
            Problem::Tsp,
            &tmp.path().join("configs/TSP/1LNS.json"),
            &[0],
        )
        .unwrap();
        let log = layout.run_log(Problem::Tsp, "a.tsp", "1LNS", 0);
        fs::create_dir_all(log.parent().unwrap()).unwrap();
        fs::write(&log, "1.0 12345\n").unwrap();

        let report = run_batch(&layout, &batch, &sh("exit 9"), &supervisor()).unwrap();
        assert_eq!(report.crashed, 1);
        assert_eq!(report.harvest_failures, 1);
        assert!(!log.exists());
    }

    #[test]
    fn interrupted_batch_launches_nothing() {
        let tmp = project(&["a.tsp", "b.tsp"]);
        let layout = Layout::new(tmp.path());
        let batch = prepare_batch(
            &layout,
            Problem::Tsp,
            &tmp.path().join("configs/TSP/1LNS.json"),
            &[0, 1],
        )
        .unwrap();
        let marker = tmp.path().join("launched");
        let solver = sh(&format!("touch '{}'", marker.display()));
        let stopped = Supervisor::new(*supervisor().timing(), Arc::new(AtomicBool::new(true)));

        let report = run_batch(&layout, &batch, &solver, &stopped).unwrap();
        assert!(report.interrupted);
        assert_eq!(report.finished, 0);
        assert_eq!(report.crashed, 0);
        assert!(!marker.exists());
    }

    #[test]
    fn unspawnable_solver_is_counted_as_finished() {
        let tmp = project(&["a.tsp"]);
        let layout = Layout::new(tmp.path());
        let batch = prepare_batch(
            &layout,
            Problem::Tsp,
            &tmp.path().join("configs/TSP/1LNS.json"),
            &[0, 1, 2],
        )
        .unwrap();
        let solver = SolverCommand {
            program: "/nonexistent/solver".into(),
            leading_args: vec![],
            workers: None,
            time_limit: None,
        };

        let report = run_batch(&layout, &batch, &solver, &supervisor()).unwrap();
        assert_eq!(report.launch_failures, 3);
        assert_eq!(report.finished, 3);
    }

    #[test]
    fn setup_errors_fail_fast() {
        let tmp = project(&["a.tsp"]);
        let layout = Layout::new(tmp.path());
        let config = tmp.path().join("configs/TSP/1LNS.json");

        let err = prepare_batch(&layout, Problem::Cvrp, &config, &[0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ProblemMismatch { .. })
        ));

        let missing = tmp.path().join("nope.json");
        let err = prepare_batch(&layout, Problem::Tsp, &missing, &[0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingConfig(_))
        ));

        fs::remove_dir_all(tmp.path().join("data/TSP")).unwrap();
        let err = prepare_batch(&layout, Problem::Tsp, &config, &[0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingDataDir(_))
        ));

        assert!(!tmp.path().join("logs").exists());
    }
}
