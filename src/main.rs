#[macro_use]
extern crate log;

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;
use utils::{
    layout::Layout,
    supervisor::{interrupt_flag, Supervisor},
};

mod experiments;
mod utils;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project root containing data/, configs/, ilog_models/ and logs/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// More output, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    experiment: Experiments,
}

#[derive(clap::Subcommand, Debug)]
enum Experiments {
    /// Benchmark one solver configuration on every instance of a problem
    ///
    /// Every instance is solved once per seed, one solver process at a time.
    /// Each run gets the execution time plus a short grace period, after which
    /// the solver is killed. Results go to logs/<problem>/<instance>/<config>/<seed>.log
    Benchmark(experiments::benchmark::BenchmarkArgs),

    /// Create the log directory tree for all problems, instances and configurations
    GenerateFolders(experiments::generate_folders::GenerateFoldersArgs),

    /// Export a solver model for every instance of a problem
    ///
    /// Models are written to ilog_models/<problem>/<instance>.cpo and are the
    /// input of the run-cpoptimizer subcommand.
    GenerateModels(experiments::generate_models::GenerateModelsArgs),

    /// Compute the maximal distance of every instance into logs/max_dist.txt
    AggregateDistances(experiments::aggregate_distances::AggregateDistancesArgs),

    /// Benchmark the exported models with a JSON-reporting solver
    ///
    /// The objective history of every run is converted to the usual per-run
    /// log format. VRP-TW objectives are split into distance and vehicle count.
    RunCpoptimizer(experiments::run_cpoptimizer::RunCpoptimizerArgs),

    /// Summarize all per-run logs into a CSV table
    Summarize(experiments::summarize::SummarizeArgs),
}

fn main() -> anyhow::Result<()> {
    // parse command line arguments
    let args = Args::parse();

    // init logging
    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .map_err(|e| anyhow::format_err!("failed to initialize logging: {}", e))?;

    let layout = Layout::new(args.root);

    // only the commands that poll the flag take over Ctrl+C
    match args.experiment {
        Experiments::Benchmark(ev) => {
            let supervisor = Supervisor::new(ev.timing(), interrupt_flag()?);
            experiments::benchmark::run(ev, &layout, &supervisor)?
        }
        Experiments::GenerateFolders(ev) => experiments::generate_folders::run(ev, &layout)?,
        Experiments::GenerateModels(ev) => {
            let supervisor = Supervisor::new(Default::default(), interrupt_flag()?);
            experiments::generate_models::run(ev, &layout, &supervisor)?
        }
        Experiments::AggregateDistances(ev) => {
            let stop = interrupt_flag()?;
            experiments::aggregate_distances::run(ev, &layout, &stop)?
        }
        Experiments::RunCpoptimizer(ev) => {
            experiments::run_cpoptimizer::run(ev, &layout, interrupt_flag()?)?
        }
        Experiments::Summarize(ev) => experiments::summarize::run(ev, &layout)?,
    };

    Ok(())
}
