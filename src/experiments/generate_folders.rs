use clap::Parser;

use crate::utils::{
    errors::ConfigError,
    layout::{file_stem, list_sorted, Layout},
    problem::Problem,
};

#[derive(Parser, Debug)]
pub struct GenerateFoldersArgs {}

/// Creates the log directory of every problem × instance × configuration
/// combination. Returns how many combinations there are.
pub fn generate(layout: &Layout) -> anyhow::Result<usize> {
    let mut count = 0;

    for problem in Problem::ALL {
        let data_dir = layout.data_dir(problem);
        if !data_dir.is_dir() {
            return Err(ConfigError::MissingDataDir(data_dir).into());
        }
        let instances = list_sorted(&data_dir)?;

        let configs_dir = layout.configs_dir(problem);
        let configs: Vec<String> = if configs_dir.is_dir() {
            list_sorted(&configs_dir)?.iter().map(|c| file_stem(c)).collect()
        } else {
            warn!("no configurations for {}", problem);
            Vec::new()
        };

        layout.create_run_dirs(problem, &instances, &configs)?;
        debug!(
            "{}: {} instances × {} configurations",
            problem,
            instances.len(),
            configs.len()
        );
        count += instances.len() * configs.len();
    }

    Ok(count)
}

pub fn run(_args: GenerateFoldersArgs, layout: &Layout) -> anyhow::Result<()> {
    let count = generate(layout)?;
    info!("{} log directories in '{}'", count, layout.logs_root().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn creates_every_combination() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let instances = [
            ("TSP", "a280.tsp"),
            ("CVRP", "X-n101.vrp"),
            ("VRP-TW", "C101.txt"),
            ("VRP-TW", "R101.txt"),
        ];
        for (problem, instance) in instances {
            fs::create_dir_all(root.join("data").join(problem)).unwrap();
            fs::write(root.join("data").join(problem).join(instance), "").unwrap();
        }
        fs::create_dir_all(root.join("configs/VRP-TW")).unwrap();
        fs::write(root.join("configs/VRP-TW/1LNS.json"), "{}").unwrap();
        fs::write(root.join("configs/VRP-TW/4LNS.json"), "{}").unwrap();
        fs::create_dir_all(root.join("configs/TSP")).unwrap();
        fs::write(root.join("configs/TSP/1LNS.json"), "{}").unwrap();

        let layout = Layout::new(root);
        assert_eq!(generate(&layout).unwrap(), 5);
        assert!(layout.run_dir(Problem::VrpTw, "R101.txt", "4LNS").is_dir());
        assert!(layout.run_dir(Problem::Tsp, "a280.tsp", "1LNS").is_dir());
        assert!(!layout.logs_dir(Problem::Cvrp).join("X-n101.vrp").exists());

        // second pass changes nothing and does not fail
        assert_eq!(generate(&layout).unwrap(), 5);
    }

    #[test]
    fn missing_data_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = generate(&Layout::new(tmp.path())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingDataDir(_))
        ));
    }
}
