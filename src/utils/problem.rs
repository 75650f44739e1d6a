use std::{
    fmt::{self, Display},
    fs,
    path::Path,
    str::FromStr,
};

use serde::Deserialize;

use super::errors::ConfigError;

/// The routing problems the harness knows how to benchmark.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Problem {
    #[value(name = "TSP")]
    Tsp,
    #[value(name = "CVRP")]
    Cvrp,
    #[value(name = "VRP-TW")]
    VrpTw,
}

impl Problem {
    pub const ALL: [Problem; 3] = [Problem::Tsp, Problem::Cvrp, Problem::VrpTw];

    pub fn name(self) -> &'static str {
        match self {
            Problem::Tsp => "TSP",
            Problem::Cvrp => "CVRP",
            Problem::VrpTw => "VRP-TW",
        }
    }

    /// VRP-TW solvers minimize vehicles first and distance second, and report
    /// both as a single packed integer.
    pub fn packs_objective(self) -> bool {
        matches!(self, Problem::VrpTw)
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Problem {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Problem::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownProblem(s.to_owned()))
    }
}

#[derive(Deserialize)]
struct SolverConfig {
    problem: String,
}

/// Checks that a solver configuration file exists, parses, and declares the
/// expected problem.
pub fn validate_config(path: &Path, expected: Problem) -> Result<(), ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::MissingConfig(path.to_owned()));
    }

    let contents =
        fs::read_to_string(path).map_err(|_| ConfigError::MissingConfig(path.to_owned()))?;
    let config: SolverConfig =
        serde_json::from_str(&contents).map_err(|source| ConfigError::MalformedConfig {
            path: path.to_owned(),
            source,
        })?;

    let found: Problem = config.problem.parse()?;
    if found != expected {
        return Err(ConfigError::ProblemMismatch {
            path: path.to_owned(),
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for p in Problem::ALL {
            assert_eq!(p.name().parse::<Problem>().unwrap(), p);
        }
        assert!(matches!(
            "VRPTW".parse::<Problem>(),
            Err(ConfigError::UnknownProblem(_))
        ));
    }

    #[test]
    fn only_vrptw_is_packed() {
        assert!(Problem::VrpTw.packs_objective());
        assert!(!Problem::Tsp.packs_objective());
        assert!(!Problem::Cvrp.packs_objective());
    }

    #[test]
    fn config_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1LNS.json");

        assert!(matches!(
            validate_config(&path, Problem::Tsp),
            Err(ConfigError::MissingConfig(_))
        ));

        fs::write(&path, r#"{"problem": "CVRP", "optal": {"LNS": 1, "FDS": 0}}"#).unwrap();
        validate_config(&path, Problem::Cvrp).unwrap();
        assert!(matches!(
            validate_config(&path, Problem::Tsp),
            Err(ConfigError::ProblemMismatch { .. })
        ));

        fs::write(&path, "{\"problem\": ").unwrap();
        assert!(matches!(
            validate_config(&path, Problem::Cvrp),
            Err(ConfigError::MalformedConfig { .. })
        ));
    }
}
