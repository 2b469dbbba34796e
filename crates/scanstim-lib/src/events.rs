use crate::trial::TrialSpec;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const BUTTON_PRESS: &str = "button_press";

/// One row of the run's BIDS events log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Seconds since the scanner trigger.
    pub onset: f64,
    pub duration: f64,
    pub stim_type: String,
    pub stim_fn: String,
    #[serde(default)]
    pub repeat: Option<String>,
}

impl EventRecord {
    pub fn button_press(onset: f64, key: char) -> Self {
        Self {
            onset,
            duration: 0.0,
            stim_type: BUTTON_PRESS.into(),
            stim_fn: key.to_string(),
            repeat: None,
        }
    }

    /// Summary row for a finished trial.
    pub fn trial(spec: &TrialSpec, onset: f64, duration: f64) -> Self {
        Self {
            onset,
            duration,
            stim_type: spec.stim_type.as_str().into(),
            stim_fn: spec.object_id.clone(),
            repeat: spec.repeat.clone(),
        }
    }

    pub fn is_button_press(&self) -> bool {
        self.stim_type == BUTTON_PRESS
    }
}

/// Append-only destination for event records.
pub trait EventSink {
    fn record(&mut self, event: &EventRecord) -> Result<()>;
}

impl EventSink for Vec<EventRecord> {
    fn record(&mut self, event: &EventRecord) -> Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn record(&mut self, event: &EventRecord) -> Result<()> {
        (**self).record(event)
    }
}
