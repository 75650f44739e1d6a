//! Collects every per-run log into one CSV table, one row per
//! (problem, instance, configuration).
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use csv::WriterBuilder;
use serde::Serialize;

use crate::utils::{
    harvest::{parse_line_log, TrajectoryPoint},
    layout::{list_sorted, Layout},
    problem::Problem,
};

#[derive(Parser, Debug)]
pub struct SummarizeArgs {
    /// Output file, relative to the project root
    #[arg(long, default_value = "logs/summary.csv")]
    output: PathBuf,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SummaryRow {
    pub problem: String,
    pub instance: String,
    pub configuration: String,
    pub runs: usize,
    pub solved: usize,
    pub best: String,
    pub mean_best_primary: Option<f64>,
    pub mean_best_secondary: Option<f64>,
    pub mean_time_to_best: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn summarize_runs(
    problem: Problem,
    run_dir: &Path,
) -> anyhow::Result<(usize, Vec<TrajectoryPoint>)> {
    let mut runs = 0;
    let mut bests = Vec::new();

    for name in list_sorted(run_dir)? {
        if !name.ends_with(".log") {
            continue;
        }
        runs += 1;
        match parse_line_log(&run_dir.join(&name), problem) {
            Ok(t) => bests.extend(t.best().copied()),
            Err(e) => warn!("skipping '{}': {}", run_dir.join(&name).display(), e),
        }
    }

    Ok((runs, bests))
}

/// Builds the rows for every problem that has a log directory.
pub fn collect(layout: &Layout) -> anyhow::Result<Vec<SummaryRow>> {
    let mut rows = Vec::new();

    for problem in Problem::ALL {
        let logs = layout.logs_dir(problem);
        if !logs.is_dir() {
            continue;
        }
        for instance in list_sorted(&logs)? {
            if !logs.join(&instance).is_dir() {
                continue;
            }
            for config in list_sorted(&logs.join(&instance))? {
                let run_dir = layout.run_dir(problem, &instance, &config);
                if !run_dir.is_dir() {
                    continue;
                }
                let (runs, bests) = summarize_runs(problem, &run_dir)?;
                if runs == 0 {
                    continue;
                }

                let component = |i: usize| {
                    mean(
                        bests
                            .iter()
                            .filter_map(|b| b.objective.components().get(i).copied()),
                    )
                };
                rows.push(SummaryRow {
                    problem: problem.to_string(),
                    instance: instance.clone(),
                    configuration: config,
                    runs,
                    solved: bests.len(),
                    best: bests
                        .iter()
                        .map(|b| b.objective)
                        .min()
                        .map(|o| o.to_string())
                        .unwrap_or_default(),
                    mean_best_primary: component(0),
                    mean_best_secondary: component(1),
                    mean_time_to_best: mean(bests.iter().map(|b| b.time)),
                });
            }
        }
    }

    Ok(rows)
}

pub fn run(args: SummarizeArgs, layout: &Layout) -> anyhow::Result<()> {
    let rows = collect(layout)?;
    let output = layout.root().join(&args.output);

    let mut writer = WriterBuilder::new()
        .from_path(&output)
        .with_context(|| format!("failed to create '{}'", output.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("{} rows written to '{}'", rows.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn rows_per_configuration() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());

        let dir = layout.run_dir(Problem::Tsp, "a280.tsp", "1LNS");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("0.log"), "1 3000 1\n2 2600 1\n").unwrap();
        fs::write(dir.join("1.log"), "1 2800 1\n3 2700 1\n").unwrap();
        fs::write(dir.join("2.log"), "").unwrap();
        fs::write(dir.join("2.out"), "solver chatter").unwrap();

        let dir = layout.run_dir(Problem::VrpTw, "C101.txt", "12CPO");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("0.log"), "0.5 900 11\n4 850 10\n").unwrap();
        fs::write(layout.logs_root().join("max_dist.txt"), "TSP a280.tsp 42\n").unwrap();

        let rows = collect(&layout).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(
            rows[0],
            SummaryRow {
                problem: "TSP".into(),
                instance: "a280.tsp".into(),
                configuration: "1LNS".into(),
                runs: 3,
                solved: 2,
                best: "2600".into(),
                mean_best_primary: Some(2650.0),
                mean_best_secondary: None,
                mean_time_to_best: Some(2.5),
            }
        );
        assert_eq!(rows[1].best, "850 10");
        assert_eq!(rows[1].mean_best_secondary, Some(10.0));
    }

    #[test]
    fn writes_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        let dir = layout.run_dir(Problem::Cvrp, "X-n101.vrp", "1LNS");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("0.log"), "1.5 27591 26\n").unwrap();

        run(
            SummarizeArgs {
                output: PathBuf::from("logs/summary.csv"),
            },
            &layout,
        )
        .unwrap();

        let csv = fs::read_to_string(tmp.path().join("logs/summary.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "problem,instance,configuration,runs,solved,best,\
             mean_best_primary,mean_best_secondary,mean_time_to_best"
        );
        assert_eq!(lines.next().unwrap(), "CVRP,X-n101.vrp,1LNS,1,1,27591,27591.0,,1.5");
    }
}
