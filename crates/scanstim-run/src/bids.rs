use crate::config::{Protocol, RunIdentity};
use crate::session::RunSummary;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, Writer, WriterBuilder};
use scanstim_lib::{EventRecord, EventSink};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Tab-separated BIDS events writer. Every row is flushed as soon as it is written.
pub struct EventLogWriter<W: Write> {
    writer: Writer<W>,
    with_repetition: bool,
    written: usize,
}

impl EventLogWriter<fs::File> {
    pub fn create(path: &Path, with_repetition: bool) -> Result<Self> {
        let file = fs::File::create(path)
            .with_context(|| format!("creating events log {}", path.display()))?;
        Self::new(file, with_repetition)
    }
}

impl<W: Write> EventLogWriter<W> {
    pub fn new(inner: W, with_repetition: bool) -> Result<Self> {
        let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(inner);
        let mut header = vec!["onset", "duration", "stim_type", "stim_fn"];
        if with_repetition {
            header.push("repetition");
        }
        writer.write_record(&header)?;
        writer.flush()?;
        Ok(Self {
            writer,
            with_repetition,
            written: 0,
        })
    }

    /// Rows written so far, header excluded.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("flushing events log: {}", err.error()))
    }
}

impl<W: Write> EventSink for EventLogWriter<W> {
    fn record(&mut self, event: &EventRecord) -> Result<()> {
        let mut row = vec![
            format!("{:.3}", event.onset),
            format!("{:.3}", event.duration),
            event.stim_type.clone(),
            event.stim_fn.clone(),
        ];
        if self.with_repetition {
            row.push(event.repeat.clone().unwrap_or_default());
        }
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EventRow {
    onset: f64,
    duration: f64,
    stim_type: String,
    stim_fn: String,
    #[serde(default)]
    repetition: Option<String>,
}

pub fn read_event_log(path: &Path) -> Result<Vec<EventRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening events {}", path.display()))?;
    let mut events = Vec::new();
    for row in reader.deserialize::<EventRow>() {
        let row = row.with_context(|| format!("parsing events in {}", path.display()))?;
        events.push(EventRecord {
            onset: row.onset,
            duration: row.duration,
            stim_type: row.stim_type,
            stim_fn: row.stim_fn,
            repeat: row.repetition.filter(|s| !s.is_empty()),
        });
    }
    Ok(events)
}

/// Column descriptions written next to the events log.
pub fn write_events_json(path: &Path, with_repetition: bool) -> Result<()> {
    let mut columns = serde_json::json!({
        "onset": { "units": "seconds", "Description": "time since the scanner trigger" },
        "duration": { "units": "seconds" },
        "stim_type": { "Description": "fixation, photo, sketch, question, instructions or button_press" },
        "stim_fn": { "Description": "object identity, or the button pressed" },
    });
    if with_repetition {
        columns["repetition"] = serde_json::json!({
            "Levels": { "0": "first presentation", "1": "immediate repeat" }
        });
    }
    let metadata = serde_json::json!({ "columns": columns });
    fs::write(path, serde_json::to_string_pretty(&metadata)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub operator_id: String,
    pub accession: String,
    pub participant: u32,
    pub run: u32,
    pub protocol: String,
    pub trigger_source: String,
    pub total_trials: usize,
    pub total_events: usize,
    pub button_presses: usize,
    pub seed: u64,
    pub start_time_unix: u64,
}

impl RunManifest {
    pub fn new(
        id: &RunIdentity,
        protocol: Protocol,
        summary: &RunSummary,
        seed: u64,
        start_time_unix: u64,
    ) -> Self {
        Self {
            operator_id: id.operator_id.clone(),
            accession: id.accession.clone(),
            participant: id.participant,
            run: id.run,
            protocol: protocol.name().into(),
            trigger_source: summary.source.to_string(),
            total_trials: summary.trials_run,
            total_events: summary.events,
            button_presses: summary.button_presses,
            seed,
            start_time_unix,
        }
    }
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("creating manifest {}", path.display()))?;
    serde_json::to_writer_pretty(file, manifest)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let file =
        fs::File::open(path).with_context(|| format!("opening manifest {}", path.display()))?;
    let manifest = serde_json::from_reader::<_, RunManifest>(file)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    Ok(manifest)
}
