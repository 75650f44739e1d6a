//! Exports the solver model of every instance of a problem, so that other
//! solvers can be benchmarked on exactly the same model.
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;

use crate::utils::{
    errors::ConfigError,
    layout::{list_sorted, Layout},
    problem::{validate_config, Problem},
    progress::Progress,
    supervisor::{ExitKind, Supervisor},
};

#[derive(Parser, Debug)]
pub struct GenerateModelsArgs {
    #[arg(value_enum)]
    problem: Problem,

    /// Solver configuration file (JSON)
    config: PathBuf,

    /// Program that runs the model generator
    #[arg(long, default_value_t = String::from("node"))]
    generator: String,

    /// Arguments placed before the per-instance arguments, repeatable
    #[arg(
        long = "generator-arg",
        allow_hyphen_values = true,
        default_values_t = [String::from("scripts/generate_ilog_models.js")]
    )]
    generator_args: Vec<String>,
}

pub struct ModelGenerator {
    pub program: OsString,
    pub leading_args: Vec<OsString>,
}

impl ModelGenerator {
    /// `<program> [leading args] <config> <instance> <log> --dontSolve --exportTxt <model>`
    pub fn argv(&self, config: &Path, instance: &Path, log: &Path, model: &Path) -> Vec<OsString> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.leading_args.iter().cloned());
        argv.extend([
            config.as_os_str().to_owned(),
            instance.as_os_str().to_owned(),
            log.as_os_str().to_owned(),
            "--dontSolve".into(),
            "--exportTxt".into(),
            model.as_os_str().to_owned(),
        ]);
        argv
    }
}

/// Returns how many models were exported successfully.
pub fn generate(
    layout: &Layout,
    problem: Problem,
    config: &Path,
    generator: &ModelGenerator,
    supervisor: &Supervisor,
) -> anyhow::Result<usize> {
    validate_config(config, problem)?;
    let data_dir = layout.data_dir(problem);
    if !data_dir.is_dir() {
        return Err(ConfigError::MissingDataDir(data_dir).into());
    }
    let instances = list_sorted(&data_dir)?;

    let models_dir = layout.models_dir(problem);
    fs::create_dir_all(&models_dir)
        .with_context(|| format!("failed to create '{}'", models_dir.display()))?;
    fs::create_dir_all(layout.logs_root())?;
    let scratch_log = layout.logs_root().join("generate_models.log");
    let console = layout.logs_root().join("generate_models.out");

    let mut progress = Progress::new(instances.len());
    let mut exported = 0;

    for instance in &instances {
        info!("Generating model: {}/{} {}", progress.finished() + 1, progress.total(), instance);
        let model = layout.model_path(problem, instance);
        let argv = generator.argv(config, &data_dir.join(instance), &scratch_log, &model);

        let outcome = supervisor.run_to_completion(&argv, &console);
        progress = progress.advance();

        match outcome.status {
            ExitKind::Success if model.is_file() => exported += 1,
            ExitKind::Success => {
                warn!("generator succeeded but '{}' was not written", model.display())
            }
            ExitKind::Interrupted => {
                warn!("interrupted");
                break;
            }
            ExitKind::LaunchFailed(reason) => {
                // the same command will fail for every other instance as well
                return Err(anyhow::format_err!("failed to launch the model generator: {}", reason));
            }
            other => warn!("model generation for {} failed: {:?}", instance, other),
        }
    }

    Ok(exported)
}

pub fn run(
    args: GenerateModelsArgs,
    layout: &Layout,
    supervisor: &Supervisor,
) -> anyhow::Result<()> {
    let config = fs::canonicalize(&args.config)
        .map_err(|_| ConfigError::MissingConfig(args.config.clone()))?;
    let generator = ModelGenerator {
        program: args.generator.into(),
        leading_args: args.generator_args.into_iter().map(Into::into).collect(),
    };

    let exported = generate(layout, args.problem, &config, &generator, supervisor)?;
    info!(
        "{} models written to '{}'",
        exported,
        layout.models_dir(args.problem).display()
    );
    Ok(())
}
