use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use serde::Deserialize;

use super::{
    errors::HarvestError,
    objective::{Objective, PackedObjective, PACK_SCALE},
    problem::Problem,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectoryPoint {
    /// seconds since the solver started
    pub time: f64,
    pub objective: Objective,
}

/// Improving solutions of one run, ordered by time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: f64, objective: Objective) -> Result<(), HarvestError> {
        if let Some(last) = self.points.last() {
            if time < last.time {
                return Err(HarvestError::TimeBackwards {
                    previous: last.time,
                    next: time,
                });
            }
        }
        self.points.push(TrajectoryPoint { time, objective });
        Ok(())
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Best objective found, earliest point on ties.
    pub fn best(&self) -> Option<&TrajectoryPoint> {
        self.points
            .iter()
            .reduce(|best, p| if p.objective < best.objective { p } else { best })
    }

    /// Writes one `<time> <objective>` line per point, whole seconds without a
    /// fraction as the solvers print them.
    pub fn write_log(&self, path: &Path) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for p in self.points() {
            writeln!(out, "{} {}", p.time, p.objective)?;
        }
        out.flush()
    }
}

#[derive(Deserialize)]
struct RunRecord {
    #[serde(rename = "objectiveHistory")]
    objective_history: Vec<HistoryItem>,
}

#[derive(Deserialize)]
struct HistoryItem {
    objective: f64,
    #[serde(rename = "solveTime")]
    solve_time: f64,
}

fn integral(value: f64) -> Result<i64, HarvestError> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 2f64.powi(53) {
        Ok(value as i64)
    } else {
        Err(HarvestError::BadObjective(value))
    }
}

fn to_objective(value: i64, problem: Problem) -> Result<Objective, HarvestError> {
    if problem.packs_objective() {
        let raw = u64::try_from(value).map_err(|_| HarvestError::BadObjective(value as f64))?;
        Ok(Objective::Packed(PackedObjective::decode(raw)))
    } else {
        Ok(Objective::Single(value))
    }
}

fn read(path: &Path) -> Result<String, HarvestError> {
    if !path.exists() {
        return Err(HarvestError::Missing(path.to_owned()));
    }
    fs::read_to_string(path).map_err(|source| HarvestError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Reads the JSON summary written by the structured-output solver. The
/// history of the first run record is taken as is, packed objectives are
/// decoded when the problem uses them.
pub fn parse_document(path: &Path, problem: Problem) -> Result<Trajectory, HarvestError> {
    let contents = read(path)?;
    let records: Vec<RunRecord> =
        serde_json::from_str(&contents).map_err(|source| HarvestError::Json {
            path: path.to_owned(),
            source,
        })?;
    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| HarvestError::NoRecord(path.to_owned()))?;

    let mut trajectory = Trajectory::new();
    for item in record.objective_history {
        let objective = to_objective(integral(item.objective)?, problem)?;
        trajectory.push(item.solve_time, objective)?;
    }
    Ok(trajectory)
}

/// Reads a line log of `<time> <objective> [<vehicles>]` entries. For packed
/// problems the third column is the secondary component, otherwise it is
/// informational and dropped.
pub fn parse_line_log(path: &Path, problem: Problem) -> Result<Trajectory, HarvestError> {
    let contents = read(path)?;
    let mut trajectory = Trajectory::new();

    for (idx, line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let malformed = |reason: String| HarvestError::MalformedLine {
            line: line_no,
            reason,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 2 || fields.len() > 3 {
            return Err(malformed(format!("expected 2 or 3 fields, got {}", fields.len())));
        }

        let time: f64 = fields[0]
            .parse()
            .map_err(|e| malformed(format!("bad time '{}': {}", fields[0], e)))?;
        let value: f64 = fields[1]
            .parse()
            .map_err(|e| malformed(format!("bad objective '{}': {}", fields[1], e)))?;
        let value = integral(value)?;

        let objective = if problem.packs_objective() {
            let secondary = match fields.get(2) {
                Some(s) => s
                    .parse()
                    .map_err(|e| malformed(format!("bad second component '{}': {}", s, e)))?,
                None => 0,
            };
            let primary =
                u64::try_from(value).map_err(|_| HarvestError::BadObjective(value as f64))?;
            let packed = PackedObjective { secondary, primary };
            if packed.encode().is_none() {
                return Err(malformed(format!(
                    "first component {} does not fit below {}",
                    primary, PACK_SCALE
                )));
            }
            Objective::Packed(packed)
        } else {
            Objective::Single(value)
        };

        trajectory.push(time, objective)?;
    }

    Ok(trajectory)
}
