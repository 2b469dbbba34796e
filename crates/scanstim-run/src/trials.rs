use crate::config::{Protocol, RunSettings, MAX_SECONDS};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use log::info;
use scanstim_lib::window::PHOTO_SECS;
use scanstim_lib::{QuestionChoices, ScanError, StimType, Stimulus, StimulusKind, TrialSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct TrialRow {
    #[serde(rename = "ObjectID")]
    object_id: String,
    #[serde(rename = "StimNo", default)]
    stim_no: u32,
    #[serde(rename = "StimType")]
    stim_type: String,
    #[serde(rename = "Repeat", default)]
    repeat: Option<String>,
    #[serde(rename = "Onset")]
    onset: f64,
    #[serde(rename = "Duration")]
    duration: f64,
    #[serde(rename = "Jitter", default)]
    jitter: Option<f64>,
    #[serde(rename = "FixChange", default)]
    fix_change: Option<String>,
    #[serde(rename = "WhereAnimate", default)]
    where_animate: Option<String>,
}

impl TrialRow {
    fn into_spec(self, row: usize, protocol: Protocol) -> Result<TrialSpec, ScanError> {
        let stim_type: StimType = self.stim_type.parse()?;
        let jitter = self.jitter.unwrap_or(0.0);
        for (name, value, min) in [
            ("Onset", self.onset, 0.0),
            ("Duration", self.duration, 0.0),
            ("Jitter", jitter, -MAX_SECONDS),
        ] {
            if !value.is_finite() || value < min || value > MAX_SECONDS {
                return Err(ScanError::InvalidTrial {
                    row,
                    reason: format!(
                        "{} must be a number in [{}, {}], got {}",
                        name, min, MAX_SECONDS, value
                    ),
                });
            }
        }
        if stim_type == StimType::Photo && self.duration < PHOTO_SECS {
            return Err(ScanError::InvalidTrial {
                row,
                reason: format!(
                    "photo Duration {} is shorter than the {}s photo schedule",
                    self.duration, PHOTO_SECS
                ),
            });
        }
        let repeat = parse_flag(self.repeat.as_deref(), row, "Repeat")?;
        let fixation_change = parse_flag(self.fix_change.as_deref(), row, "FixChange")?;
        Ok(TrialSpec {
            object_id: self.object_id.trim().to_string(),
            stim_number: self.stim_no,
            stim_type,
            onset: self.onset,
            duration: self.duration,
            jitter,
            fixation_change,
            where_correct: self.where_animate.filter(|s| !s.trim().is_empty()),
            repeat: protocol
                .logs_repetition()
                .then(|| if repeat { "1" } else { "0" }.to_string()),
        })
    }
}

fn parse_flag(value: Option<&str>, row: usize, column: &str) -> Result<bool, ScanError> {
    match value.map(str::trim).unwrap_or("") {
        "" | "0" | "0.0" | "false" | "False" | "FALSE" => Ok(false),
        "1" | "1.0" | "true" | "True" | "TRUE" => Ok(true),
        other => Err(ScanError::InvalidTrial {
            row,
            reason: format!("{} must be 0 or 1, got {:?}", column, other),
        }),
    }
}

/// Read a run's trial table, failing unless it has exactly the protocol's row count.
pub fn read_trials(path: &Path, protocol: Protocol) -> Result<Vec<TrialSpec>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening trials {}", path.display()))?;
    let mut trials = Vec::new();
    for (idx, row) in reader.deserialize::<TrialRow>().enumerate() {
        let row = row.with_context(|| format!("parsing trial row {}", idx + 1))?;
        let spec = row
            .into_spec(idx + 1, protocol)
            .with_context(|| format!("in {}", path.display()))?;
        trials.push(spec);
    }
    let expected = protocol.expected_trials();
    if trials.len() != expected {
        return Err(ScanError::TrialCount {
            expected,
            found: trials.len(),
        })
        .with_context(|| format!("in {}", path.display()));
    }
    Ok(trials)
}

/// Resolve every trial's stimulus, failing on the first missing media file.
pub fn load_stimuli(trials: &[TrialSpec], settings: &RunSettings) -> Result<Vec<Stimulus>> {
    trials
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            info!("Loading {}", spec.object_id);
            load_stimulus(spec, settings, idx + 1)
                .with_context(|| format!("loading trial {}", idx + 1))
        })
        .collect()
}

fn load_stimulus(
    spec: &TrialSpec,
    settings: &RunSettings,
    row: usize,
) -> Result<Stimulus, ScanError> {
    let kind = match spec.stim_type {
        StimType::Fixation => StimulusKind::Fixation,
        StimType::Photo => {
            let path = settings
                .stim_dir
                .join(format!("{}_{}.png", spec.object_id, spec.stim_number));
            StimulusKind::Photo {
                path: existing(path)?,
            }
        }
        StimType::Sketch => {
            let path = settings.stim_dir.join(format!(
                "{}_{}{}",
                spec.object_id,
                spec.stim_number,
                settings.protocol.clip_suffix()
            ));
            StimulusKind::Sketch {
                path: existing(path)?,
                clip_secs: settings.clip_secs,
            }
        }
        StimType::Question => {
            let question = QuestionChoices::from_object_id(&spec.object_id, spec.where_correct.as_deref())
                .ok_or_else(|| ScanError::InvalidTrial {
                    row,
                    reason: format!(
                        "question object {:?} is not of the form animate_inanimate",
                        spec.object_id
                    ),
                })?;
            StimulusKind::Question(question)
        }
        StimType::Instructions => StimulusKind::Instructions {
            text: settings.protocol.instructions().to_string(),
        },
    };
    Ok(Stimulus::new(spec.object_id.clone(), kind, spec.duration))
}

pub(crate) fn existing(path: PathBuf) -> Result<PathBuf, ScanError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(ScanError::MissingMedia(path))
    }
}
