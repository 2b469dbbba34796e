use log::debug;
use std::path::PathBuf;

/// Capability every stimulus variant provides to the trial runner.
pub trait Presentation {
    /// Start presenting at clock time `start`.
    fn begin(&mut self, start: f64);
    /// Whether presentation is over `elapsed` seconds after `begin`.
    fn is_finished(&self, elapsed: f64) -> bool;
}

/// Three-way identity choices shown on question trials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionChoices {
    pub prompt: String,
    pub left: String,
    pub right: String,
    pub center: String,
}

impl QuestionChoices {
    /// Build from an `animate_inanimate` object id; `where_animate == "right"`
    /// puts the animate name on the right, anything else on the left.
    pub fn from_object_id(object_id: &str, where_animate: Option<&str>) -> Option<Self> {
        let (animate, inanimate) = object_id.split_once('_')?;
        if animate.is_empty() || inanimate.is_empty() {
            return None;
        }
        let (left, right) = match where_animate.map(str::trim) {
            Some(side) if side.eq_ignore_ascii_case("right") => (inanimate, animate),
            _ => (animate, inanimate),
        };
        Some(Self {
            prompt: "What object identity did you see?".into(),
            left: left.into(),
            right: right.into(),
            center: "neither".into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StimulusKind {
    Fixation,
    Photo { path: PathBuf },
    Sketch { path: PathBuf, clip_secs: f64 },
    Question(QuestionChoices),
    Instructions { text: String },
}

/// A loaded, ready-to-present stimulus for one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Stimulus {
    pub label: String,
    pub kind: StimulusKind,
    duration: f64,
    started: Option<f64>,
}

impl Stimulus {
    pub fn new(label: impl Into<String>, kind: StimulusKind, duration: f64) -> Self {
        Self {
            label: label.into(),
            kind,
            duration,
            started: None,
        }
    }

    pub fn started_at(&self) -> Option<f64> {
        self.started
    }

    /// Seconds this stimulus stays up once begun.
    pub fn length(&self) -> f64 {
        match &self.kind {
            StimulusKind::Sketch { clip_secs, .. } => *clip_secs,
            _ => self.duration,
        }
    }
}

impl Presentation for Stimulus {
    fn begin(&mut self, start: f64) {
        self.started = Some(start);
        if let StimulusKind::Sketch { path, .. } = &self.kind {
            debug!("playing clip {}", path.display());
        }
    }

    fn is_finished(&self, elapsed: f64) -> bool {
        elapsed >= self.length()
    }
}
