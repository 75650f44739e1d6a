//! Computes a per-instance metric (the largest distance of the instance by
//! default) with an external tool and collects the results into one report.
use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::Context;
use clap::Parser;
use subprocess::{Exec, Redirection};

use crate::utils::{
    errors::ConfigError,
    layout::{list_sorted, Layout},
    problem::Problem,
    progress::Progress,
};

#[derive(Parser, Debug)]
pub struct AggregateDistancesArgs {
    /// Configuration file name looked up in configs/<problem>/
    #[arg(long, default_value_t = String::from("1LNS.json"))]
    reference_config: String,

    /// Report file, relative to the project root
    #[arg(long, default_value = "logs/max_dist.txt")]
    report: PathBuf,

    /// Program computing the metric
    #[arg(long, default_value_t = String::from("node"))]
    metric: String,

    /// Arguments placed before `<config> <instance> <report>`, repeatable
    #[arg(
        long = "metric-arg",
        allow_hyphen_values = true,
        default_values_t = [String::from("scripts/calculate_average_dist.js")]
    )]
    metric_args: Vec<String>,
}

/// Tool appending one `<problem> <instance> <value>` line to the report it
/// is given as its last argument.
pub struct MetricCommand {
    pub program: OsString,
    pub leading_args: Vec<OsString>,
}

impl MetricCommand {
    fn append(&self, config: &Path, instance: &Path, report: &Path) -> anyhow::Result<()> {
        let captured = Exec::cmd(&self.program)
            .args(self.leading_args.as_slice())
            .arg(config)
            .arg(instance)
            .arg(report)
            .stdout(Redirection::Pipe)
            .stderr(Redirection::Merge)
            .capture()?;

        if !captured.success() {
            return Err(anyhow::format_err!(
                "metric tool exited with {:?}: {}",
                captured.exit_status,
                captured.stdout_str().trim()
            ));
        }
        Ok(())
    }
}

fn line_count(path: &Path) -> anyhow::Result<usize> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    Ok(contents.lines().count())
}

/// Fills in `<problem> <instance> NA` for an instance the tool wrote nothing
/// for.
fn append_missing(report: &Path, problem: Problem, instance: &str) -> anyhow::Result<()> {
    let mut out = OpenOptions::new()
        .append(true)
        .open(report)
        .with_context(|| format!("failed to open '{}'", report.display()))?;
    writeln!(out, "{} {} NA", problem, instance)?;
    Ok(())
}

/// Collects one `<problem> <instance> <value>` line per instance, problem-major.
/// The report is truncated once up front and the tool appends to it; an
/// instance the tool fails on gets the value `NA`. Stops early once `stop` is
/// raised. Returns the number of lines in the report.
pub fn aggregate(
    layout: &Layout,
    problems: &[Problem],
    reference_config: &str,
    metric: &MetricCommand,
    report: &Path,
    stop: &AtomicBool,
) -> anyhow::Result<usize> {
    // everything is checked before the old report is thrown away
    let mut plan = Vec::with_capacity(problems.len());
    for &problem in problems {
        let config = layout.configs_dir(problem).join(reference_config);
        if !config.is_file() {
            return Err(ConfigError::MissingConfig(config).into());
        }
        let data_dir = layout.data_dir(problem);
        if !data_dir.is_dir() {
            return Err(ConfigError::MissingDataDir(data_dir).into());
        }
        let instances = list_sorted(&data_dir)?;
        plan.push((problem, config, data_dir, instances));
    }

    if let Some(parent) = report.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(report).with_context(|| format!("failed to create '{}'", report.display()))?;

    let mut written = 0;
    'problems: for (problem, config, data_dir, instances) in plan {
        let mut progress = Progress::new(instances.len());
        for instance in &instances {
            if stop.load(Ordering::Relaxed) {
                warn!("interrupted, the report is incomplete");
                break 'problems;
            }
            info!("{} {}/{}: {}", problem, progress.finished() + 1, progress.total(), instance);

            let result = metric.append(&config, &data_dir.join(instance), report);
            if stop.load(Ordering::Relaxed) {
                warn!("interrupted, the report is incomplete");
                break 'problems;
            }

            let added = line_count(report)?.saturating_sub(written);
            match result {
                Ok(()) if added == 1 => {}
                Ok(()) if added == 0 => {
                    warn!("metric tool wrote nothing for {} {}", problem, instance);
                }
                Ok(()) => warn!("metric tool wrote {} lines for {}", added, instance),
                Err(e) => warn!("metric for {} {} failed: {:#}", problem, instance, e),
            }
            if added == 0 {
                append_missing(report, problem, instance)?;
            }

            written = line_count(report)?;
            progress = progress.advance();
        }
    }

    Ok(written)
}

pub fn run(
    args: AggregateDistancesArgs,
    layout: &Layout,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    let metric = MetricCommand {
        program: args.metric.into(),
        leading_args: args.metric_args.into_iter().map(Into::into).collect(),
    };
    let report = layout.root().join(&args.report);

    let written = aggregate(
        layout,
        &Problem::ALL,
        &args.reference_config,
        &metric,
        &report,
        stop,
    )?;
    info!("{} lines in '{}'", written, report.display());
    Ok(())
}
