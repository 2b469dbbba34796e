use anyhow::{Context, Result};
use scanstim_lib::{KeySet, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERIAL_PATH: &str = "/dev/cu.USA19H62P1.1";

/// Experiment variant a run follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Sketch/photo morph runs: 48 trials, fixation-dim task, repeat detection.
    Morph,
    /// Sketch identification runs: 72 trials with identity questions.
    Identify,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Morph => "morph",
            Protocol::Identify => "identify",
        }
    }

    /// Rows a trial table must have.
    pub fn expected_trials(&self) -> usize {
        match self {
            Protocol::Morph => 48,
            Protocol::Identify => 72,
        }
    }

    pub fn response_keys(&self) -> &'static [char] {
        match self {
            Protocol::Morph => &['1', '2'],
            Protocol::Identify => &['1', '2', '3', '4'],
        }
    }

    pub fn hold_base(&self) -> Option<f64> {
        match self {
            Protocol::Morph => Some(2.0),
            Protocol::Identify => None,
        }
    }

    /// Fixation shown after the last trial.
    pub fn tail_secs(&self) -> f64 {
        match self {
            Protocol::Morph => 8.0,
            Protocol::Identify => 6.0,
        }
    }

    pub fn clip_secs(&self) -> f64 {
        match self {
            Protocol::Morph => 6.0,
            Protocol::Identify => 8.0,
        }
    }

    pub fn clip_suffix(&self) -> &'static str {
        match self {
            Protocol::Morph => "_6s.mov",
            Protocol::Identify => "_8s.mov",
        }
    }

    /// Whether the events log carries a `repetition` column.
    pub fn logs_repetition(&self) -> bool {
        matches!(self, Protocol::Morph)
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            Protocol::Morph => {
                "Please observe the following objects.\n\n\
                 When an object appears twice in a row, press the yellow button.\n\
                 When the fixation dot dims, press the blue button."
            }
            Protocol::Identify => {
                "Please observe the following sketches of objects.\n\n\
                 Press any button as soon as you recognize the object's identity\n\n\
                 After each trial, you will indicate what you saw."
            }
        }
    }
}

/// Optional overrides read from a TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub serial_path: Option<PathBuf>,
    #[serde(default)]
    pub stim_dir: Option<PathBuf>,
    #[serde(default)]
    pub runs_dir: Option<PathBuf>,
    #[serde(default)]
    pub res_dir: Option<PathBuf>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub trigger_timeout_secs: Option<f64>,
    #[serde(default)]
    pub clip_secs: Option<f64>,
    #[serde(default)]
    pub tail_secs: Option<f64>,
}

pub fn read_config(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: RunConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

/// Upper bound on any configured or tabled time, in seconds.
pub(crate) const MAX_SECONDS: f64 = 86_400.0;

/// Protocol preset with config overrides applied.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub protocol: Protocol,
    pub poll_interval: Duration,
    pub serial_path: PathBuf,
    pub stim_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub res_dir: PathBuf,
    pub seed: Option<u64>,
    pub trigger_timeout: Option<Duration>,
    pub clip_secs: f64,
    pub tail_secs: f64,
}

impl RunSettings {
    pub fn resolve(protocol: Protocol, config: &RunConfig) -> Result<Self> {
        let poll_ms = config.poll_interval_ms.unwrap_or(10);
        if poll_ms == 0 {
            anyhow::bail!("poll_interval_ms must be at least 1");
        }
        let trigger_timeout = match config.trigger_timeout_secs {
            Some(secs) if secs > 0.0 && secs <= MAX_SECONDS => Some(Duration::from_secs_f64(secs)),
            Some(secs) => anyhow::bail!(
                "trigger_timeout_secs must be in (0, {}], got {}",
                MAX_SECONDS,
                secs
            ),
            None => None,
        };
        let clip_secs = config.clip_secs.unwrap_or_else(|| protocol.clip_secs());
        if clip_secs.is_nan() || clip_secs <= 0.0 || clip_secs > MAX_SECONDS {
            anyhow::bail!("clip_secs must be in (0, {}], got {}", MAX_SECONDS, clip_secs);
        }
        let tail_secs = config.tail_secs.unwrap_or_else(|| protocol.tail_secs());
        if tail_secs.is_nan() || tail_secs < 0.0 || tail_secs > MAX_SECONDS {
            anyhow::bail!("tail_secs must be in [0, {}], got {}", MAX_SECONDS, tail_secs);
        }
        Ok(Self {
            protocol,
            poll_interval: Duration::from_millis(poll_ms),
            serial_path: config
                .serial_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SERIAL_PATH)),
            stim_dir: config.stim_dir.clone().unwrap_or_else(|| "stim".into()),
            runs_dir: config.runs_dir.clone().unwrap_or_else(|| "runs".into()),
            res_dir: config.res_dir.clone().unwrap_or_else(|| "res".into()),
            seed: config.seed,
            trigger_timeout,
            clip_secs,
            tail_secs,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval,
            response_keys: KeySet::new(self.protocol.response_keys()),
            hold_base: self.protocol.hold_base(),
            trigger_timeout: self.trigger_timeout,
        }
    }

    pub fn trials_path(&self, id: &RunIdentity) -> PathBuf {
        self.runs_dir.join(format!(
            "Sub{:02}_Run{:02}.csv",
            id.participant, id.run
        ))
    }

    pub fn events_path(&self, id: &RunIdentity) -> PathBuf {
        self.res_dir.join(format!(
            "sub-{:02}_run-{:02}_events.tsv",
            id.participant, id.run
        ))
    }

    pub fn manifest_path(&self, id: &RunIdentity) -> PathBuf {
        self.res_dir
            .join(format!("sub-{:02}_run-{:02}_run.json", id.participant, id.run))
    }

    pub fn log_path(&self, id: &RunIdentity) -> PathBuf {
        self.res_dir
            .join(format!("log_p{:02}_r{:02}.txt", id.participant, id.run))
    }

    /// Log of the familiarization session, which has no participant or run.
    pub fn practice_log_path(&self) -> PathBuf {
        self.res_dir.join("log_practice.txt")
    }
}

/// Who and what is being scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    pub operator_id: String,
    pub accession: String,
    pub participant: u32,
    pub run: u32,
}

impl RunIdentity {
    pub fn parse(operator_id: &str, accession: &str, participant: &str, run: &str) -> Result<Self> {
        let participant = participant
            .trim()
            .parse()
            .with_context(|| format!("participant must be a number, got {:?}", participant))?;
        let run = run
            .trim()
            .parse()
            .with_context(|| format!("run must be a number, got {:?}", run))?;
        Ok(Self {
            operator_id: operator_id.trim().to_string(),
            accession: accession.trim().to_string(),
            participant,
            run,
        })
    }
}
