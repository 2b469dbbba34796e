use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stimulus category of a trial row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimType {
    Fixation,
    Photo,
    Sketch,
    Question,
    Instructions,
}

impl StimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StimType::Fixation => "fixation",
            StimType::Photo => "photo",
            StimType::Sketch => "sketch",
            StimType::Question => "question",
            StimType::Instructions => "instructions",
        }
    }

    /// Range (seconds after stimulus start) the fixation-dim offset is drawn from.
    pub fn dim_offset_range(&self) -> (f64, f64) {
        match self {
            StimType::Photo => (1.0, 5.5),
            _ => (0.5, 5.5),
        }
    }
}

impl fmt::Display for StimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StimType {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fixation" => Ok(StimType::Fixation),
            "photo" => Ok(StimType::Photo),
            "sketch" => Ok(StimType::Sketch),
            "question" => Ok(StimType::Question),
            "instructions" => Ok(StimType::Instructions),
            other => Err(ScanError::UnknownStimType(other.to_string())),
        }
    }
}

/// One row of the run's trial table.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSpec {
    /// Category label, logged as `stim_fn` in the summary record.
    pub object_id: String,
    /// Exemplar index.
    pub stim_number: u32,
    pub stim_type: StimType,
    /// Seconds from the scanner trigger.
    pub onset: f64,
    pub duration: f64,
    /// Seconds removed from the post-stimulus fixation hold.
    pub jitter: f64,
    pub fixation_change: bool,
    /// Side of the animate option on question trials.
    pub where_correct: Option<String>,
    pub repeat: Option<String>,
}

impl TrialSpec {
    /// Fixation-only trial with no dim, mostly useful for tests and padding.
    pub fn fixation(object_id: &str, onset: f64, duration: f64) -> Self {
        Self {
            object_id: object_id.to_string(),
            stim_number: 0,
            stim_type: StimType::Fixation,
            onset,
            duration,
            jitter: 0.0,
            fixation_change: false,
            where_correct: None,
            repeat: None,
        }
    }
}
