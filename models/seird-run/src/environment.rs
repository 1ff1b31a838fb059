use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use seird::{
    Parameters, SimulationError, SimulationOutput, SolverStats, Summary, Trajectory, simulate,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const TRAJECTORY_FILE: &str = "seird_trajectory.csv";
pub const SUMMARY_FILE: &str = "seird_summary.json";

const TRAJECTORY_HEADERS: [&str; 6] = [
    "day",
    "susceptible",
    "exposed",
    "infected",
    "recovered",
    "dead",
];

// Protocol keys that make no difference to a deterministic model.
const IGNORED_KEYS: [&str; 2] = ["seed", "replicate"];

#[derive(Error, Debug)]
pub enum RunError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("no run document on stdin")]
    EmptyInput,

    #[error("unsupported input format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// The `input` section of a run document.
///
/// Mean periods, when given, take precedence over the raw rates.
#[derive(Debug, Clone, Deserialize)]
struct RunInput {
    #[serde(flatten)]
    parameters: Parameters,
    incubation_days: Option<f64>,
    infectious_days: Option<f64>,
}

impl RunInput {
    fn into_parameters(self) -> Parameters {
        let mut parameters = self.parameters;
        if let Some(days) = self.incubation_days {
            parameters.sigma = 1.0 / days;
        }
        if let Some(days) = self.infectious_days {
            parameters.gamma = 1.0 / days;
        }
        parameters
    }
}

/// What gets written next to the trajectory when an output directory is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub parameters: Parameters,
    /// SHA-256 of the parameters' JSON encoding, hex encoded.
    pub fingerprint: String,
    /// Absent when γ is zero.
    pub basic_reproduction_number: Option<f64>,
    pub summary: Summary,
    pub stats: SolverStats,
}

/// One model run: its parameters and where its outputs go.
pub struct RunEnvironment {
    pub parameters: Parameters,
    output: Value,
    output_dir_override: Option<PathBuf>,
}

impl RunEnvironment {
    pub fn from_json(data: Value) -> Result<Self, RunError> {
        let mut input_json = data
            .get("input")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        for key in IGNORED_KEYS {
            if input_json.remove(key).is_some() {
                debug!("ignoring `{key}`: the model is deterministic");
            }
        }
        let input: RunInput = serde_json::from_value(Value::Object(input_json))?;
        let output = data.get("output").cloned().unwrap_or(Value::Null);

        Ok(Self {
            parameters: input.into_parameters(),
            output,
            output_dir_override: None,
        })
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, RunError> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;
        if raw.trim().is_empty() {
            return Err(RunError::EmptyInput);
        }
        Self::from_json(serde_json::from_str(&raw)?)
    }

    pub fn from_stdin() -> Result<Self, RunError> {
        Self::from_reader(io::stdin().lock())
    }

    /// Reads a run document from a `.json` or `.toml` file.
    pub fn from_path(path: &Path) -> Result<Self, RunError> {
        let raw = fs::read_to_string(path)?;
        let data: Value = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            Some("toml") => toml::from_str(&raw)?,
            _ => return Err(RunError::UnsupportedFormat(path.to_path_buf())),
        };
        Self::from_json(data)
    }

    /// Sends outputs to `dir` regardless of the document's `output` section.
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir_override = Some(dir);
        self
    }

    /// Where outputs go: the override, else the document's `output` section,
    /// either flat or under `profile` (the `default` profile, else the first).
    pub fn output_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.output_dir_override {
            return Some(dir.clone());
        }
        filesystem_dir(&self.output).or_else(|| {
            let profiles = self.output.get("profile")?.as_object()?;
            profiles
                .get("default")
                .or_else(|| profiles.values().next())
                .and_then(filesystem_dir)
        })
    }

    /// Writes `data` to `filename` in the output directory, or to stdout
    /// when there is none.
    pub fn write(&self, filename: &str, data: &[u8]) -> Result<(), RunError> {
        match self.output_dir() {
            Some(dir) => {
                fs::create_dir_all(&dir)?;
                fs::write(dir.join(filename), data)?;
            }
            None => io::stdout().lock().write_all(data)?,
        }
        Ok(())
    }

    pub fn write_trajectory(&self, trajectory: &Trajectory) -> Result<(), RunError> {
        match self.output_dir() {
            Some(dir) => {
                fs::create_dir_all(&dir)?;
                let file = fs::File::create(dir.join(TRAJECTORY_FILE))?;
                write_trajectory_csv(file, trajectory)
            }
            None => write_trajectory_csv(io::stdout().lock(), trajectory),
        }
    }

    /// Simulates the configured parameters and writes the trajectory and,
    /// when there is an output directory, the run report. The report is
    /// encoded before anything is written.
    pub fn run(&self) -> Result<SimulationOutput, RunError> {
        let output = simulate(&self.parameters)?;
        let report = self.encode_report(&output)?;
        self.write_trajectory(&output.trajectory)?;
        if let Some(report) = report {
            self.write(SUMMARY_FILE, &report)?;
        }
        Ok(output)
    }

    pub fn report(&self, output: &SimulationOutput) -> Result<RunReport, RunError> {
        Ok(RunReport {
            parameters: self.parameters.clone(),
            fingerprint: fingerprint(&self.parameters)?,
            basic_reproduction_number: Some(self.parameters.basic_reproduction_number())
                .filter(|r0| r0.is_finite()),
            summary: output.summary,
            stats: output.stats,
        })
    }

    /// Pretty JSON of the run report, or `None` when there is no output
    /// directory to put it in.
    fn encode_report(&self, output: &SimulationOutput) -> Result<Option<Vec<u8>>, RunError> {
        if self.output_dir().is_none() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_vec_pretty(&self.report(output)?)?))
    }

    /// Writes the run report. Returns its path, or `None` when there is no
    /// output directory to put it in.
    pub fn write_summary(&self, output: &SimulationOutput) -> Result<Option<PathBuf>, RunError> {
        let (Some(dir), Some(report)) = (self.output_dir(), self.encode_report(output)?) else {
            return Ok(None);
        };
        self.write(SUMMARY_FILE, &report)?;
        Ok(Some(dir.join(SUMMARY_FILE)))
    }
}

/// `dir` of a `{"spec": "filesystem", "dir": ...}` output description.
fn filesystem_dir(spec: &Value) -> Option<PathBuf> {
    if spec.get("spec")?.as_str()? != "filesystem" {
        return None;
    }
    spec.get("dir")?.as_str().map(PathBuf::from)
}

/// Identifies a parameter set independently of how the run document spelled it.
pub fn fingerprint(parameters: &Parameters) -> Result<String, RunError> {
    let encoded = serde_json::to_vec(parameters)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

fn write_trajectory_csv<W: Write>(writer: W, trajectory: &Trajectory) -> Result<(), RunError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(TRAJECTORY_HEADERS)?;
    for (day, c) in trajectory.iter() {
        wtr.write_record([
            day.to_string(),
            c.susceptible.to_string(),
            c.exposed.to_string(),
            c.infected.to_string(),
            c.recovered.to_string(),
            c.dead.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
