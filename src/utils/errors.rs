use std::path::PathBuf;

use thiserror::Error;

/// Problems detected while setting up a batch. These abort the whole
/// invocation before any solver process is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown problem '{0}', expected one of TSP, CVRP, VRP-TW")]
    UnknownProblem(String),

    #[error("configuration file '{0}' does not exist")]
    MissingConfig(PathBuf),

    #[error("configuration file '{path}' is not valid JSON: {source}")]
    MalformedConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration '{path}' is for {found}, but {expected} was requested")]
    ProblemMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("data directory '{0}' does not exist")]
    MissingDataDir(PathBuf),

    #[error("no seeds given")]
    NoSeeds,
}

/// Failure to turn solver output into a trajectory. Never fatal to a batch.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("output file '{0}' does not exist")]
    Missing(PathBuf),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("document '{0}' contains no run record")]
    NoRecord(PathBuf),

    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("objective {0} is not a non-negative integer")]
    BadObjective(f64),

    #[error("time went backwards: {previous}s followed by {next}s")]
    TimeBackwards { previous: f64, next: f64 },
}
