use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;

use super::problem::Problem;

/// Directory conventions of a benchmark project:
///
/// ```text
/// data/<problem>/<instance>
/// configs/<problem>/<config>.json
/// ilog_models/<problem>/<instance stem>.cpo
/// logs/<problem>/<instance>/<config name>/<seed>.log
/// ```
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Layout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self, problem: Problem) -> PathBuf {
        self.root.join("data").join(problem.name())
    }

    pub fn configs_dir(&self, problem: Problem) -> PathBuf {
        self.root.join("configs").join(problem.name())
    }

    pub fn models_dir(&self, problem: Problem) -> PathBuf {
        self.root.join("ilog_models").join(problem.name())
    }

    pub fn model_path(&self, problem: Problem, instance: &str) -> PathBuf {
        self.models_dir(problem)
            .join(format!("{}.cpo", file_stem(instance)))
    }

    pub fn logs_root(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn logs_dir(&self, problem: Problem) -> PathBuf {
        self.logs_root().join(problem.name())
    }

    pub fn run_dir(&self, problem: Problem, instance: &str, config_name: &str) -> PathBuf {
        self.logs_dir(problem).join(instance).join(config_name)
    }

    pub fn run_log(
        &self,
        problem: Problem,
        instance: &str,
        config_name: &str,
        seed: u64,
    ) -> PathBuf {
        self.run_dir(problem, instance, config_name)
            .join(format!("{}.log", seed))
    }

    /// Creates `logs/<problem>/<instance>/<config>/` for every pair. Existing
    /// directories are left alone, missing parents are created.
    pub fn create_run_dirs<I, C>(
        &self,
        problem: Problem,
        instances: I,
        config_names: C,
    ) -> anyhow::Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        C: IntoIterator + Clone,
        C::Item: AsRef<str>,
    {
        for instance in instances {
            for config in config_names.clone() {
                let dir = self.run_dir(problem, instance.as_ref(), config.as_ref());
                fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create '{}'", dir.display()))?;
            }
        }
        Ok(())
    }
}

/// File name without its last extension, `"C101.txt"` -> `"C101"`.
pub fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_owned())
}

/// Names of the entries of a directory, sorted so that runs are enumerated in
/// the same order on every machine.
pub fn list_sorted(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list '{}'", dir.display()))? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
