use crate::clock::{wait_until, Clock};
use crate::display::Display;
use crate::events::{EventRecord, EventSink};
use crate::input::{classify, InputDevice, InputEvent, KeySet};
use crate::stimulus::{Presentation, Stimulus};
use crate::trial::{StimType, TrialSpec};
use crate::window::{window_at, DrawState, DrawWindow};
use anyhow::{Context, Result};
use log::{debug, info};
use std::time::Duration;

/// Knobs of the polling loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between polls. Smaller values buy timing precision with CPU.
    pub poll_interval: Duration,
    /// Buttons recorded as responses; question trials add `3` and `4`.
    pub response_keys: KeySet,
    /// Post-stimulus fixation lasts until `onset + duration + hold_base - jitter`.
    /// Without it the runner polls once for a trailing press and moves on.
    pub hold_base: Option<f64>,
    /// Give up waiting for the scanner after this long.
    pub trigger_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            response_keys: KeySet::new(&['1', '2']),
            hold_base: Some(2.0),
            trigger_timeout: None,
        }
    }
}

/// Records produced by one trial, in emission order.
#[derive(Debug, Clone, Default)]
pub struct TrialEventLog {
    pub records: Vec<EventRecord>,
    /// Stimulus start, seconds since the trigger.
    pub stim_start: f64,
    /// Measured presentation time.
    pub presented: f64,
}

impl TrialEventLog {
    pub fn button_presses(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter().filter(|r| r.is_button_press())
    }

    pub fn summary(&self) -> Option<&EventRecord> {
        self.records.iter().find(|r| !r.is_button_press())
    }
}

/// Everything a run needs: time, input, output and the run-relative time zero.
pub struct RunContext<C, I, D> {
    pub clock: C,
    pub input: I,
    pub display: D,
    pub config: SchedulerConfig,
    pub(crate) zero_time: Option<f64>,
}

impl<C: Clock, I: InputDevice, D: Display> RunContext<C, I, D> {
    pub fn new(clock: C, input: I, display: D, config: SchedulerConfig) -> Self {
        Self {
            clock,
            input,
            display,
            config,
            zero_time: None,
        }
    }

    /// Clock time of the scanner trigger, once synchronized.
    pub fn zero_time(&self) -> Option<f64> {
        self.zero_time
    }

    /// Seconds since the trigger (or since clock start before sync).
    pub fn run_time(&self) -> f64 {
        self.clock.now() - self.zero_time.unwrap_or(0.0)
    }

    /// Present one trial and collect its events, writing them to `sink` as they settle.
    pub fn run_trial(
        &mut self,
        spec: &TrialSpec,
        stimulus: &mut Stimulus,
        windows: &[DrawWindow],
        sink: &mut dyn EventSink,
    ) -> Result<TrialEventLog> {
        let zero = self
            .zero_time
            .context("trial started before scanner synchronization")?;
        let poll = self.config.poll_interval;
        let keys = if spec.stim_type == StimType::Question {
            self.config.response_keys.with(&['3', '4'])
        } else {
            self.config.response_keys.clone()
        };

        self.input.flush()?;
        wait_until(&self.clock, zero + spec.onset, poll);

        let stim_start = self.clock.now();
        stimulus.begin(stim_start);
        debug!(
            "{} {} started at {:.3}s",
            spec.stim_type,
            spec.object_id,
            stim_start - zero
        );

        // Presses during the stimulus are held back so the summary row, whose
        // onset is the stimulus start, is written first.
        let mut during = Vec::new();
        let mut shown: Option<DrawState> = None;
        loop {
            let elapsed = self.clock.now() - stim_start;
            if stimulus.is_finished(elapsed) {
                break;
            }
            if let Some(window) = window_at(windows, elapsed) {
                if shown != Some(window.state) {
                    if window.state.is_dim() && !shown.is_some_and(|s| s.is_dim()) {
                        debug!("fixation change onset at {:.3}s", elapsed);
                    }
                    shown = Some(window.state);
                }
                self.display.draw(window.state, stimulus)?;
            }
            if let Some(press) = self.poll_response(&keys, zero)? {
                during.push(press);
            }
            self.clock.sleep(poll);
        }

        self.display.show_fixation()?;
        let presented = self.clock.now() - stim_start;
        info!(
            "{}_{} was on for {:.3}s",
            spec.object_id, spec.stim_type, presented
        );

        let mut log = TrialEventLog {
            records: Vec::with_capacity(during.len() + 1),
            stim_start: stim_start - zero,
            presented,
        };
        emit(
            EventRecord::trial(spec, stim_start - zero, presented),
            &mut log,
            sink,
        )?;
        for press in during {
            emit(press, &mut log, sink)?;
        }

        match self.config.hold_base {
            Some(base) => {
                let hold_end = stim_start + spec.duration + base - spec.jitter;
                loop {
                    let remaining = hold_end - self.clock.now();
                    if remaining.is_nan() || remaining <= 0.0 {
                        break;
                    }
                    self.display.show_fixation()?;
                    if let Some(press) = self.poll_response(&keys, zero)? {
                        emit(press, &mut log, sink)?;
                    }
                    let slice = poll.min(Duration::try_from_secs_f64(remaining).unwrap_or(Duration::MAX));
                    if slice.is_zero() {
                        break;
                    }
                    self.clock.sleep(slice);
                }
                debug!(
                    "fixation held for {:.3}s",
                    self.clock.now() - stim_start - presented
                );
            }
            None => {
                if let Some(press) = self.poll_response(&keys, zero)? {
                    emit(press, &mut log, sink)?;
                }
            }
        }
        Ok(log)
    }

    /// Poll the input once; a button press becomes a record, a trigger is only logged.
    fn poll_response(&mut self, keys: &KeySet, zero: f64) -> Result<Option<EventRecord>> {
        let pending = self.input.poll()?;
        match classify(&pending, keys) {
            Some(InputEvent::Button(key)) => {
                let onset = self.clock.now() - zero;
                Ok(Some(EventRecord::button_press(onset, key)))
            }
            Some(InputEvent::Trigger) => {
                info!("scanner_trigger at {:.3}s", self.clock.now() - zero);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

fn emit(record: EventRecord, log: &mut TrialEventLog, sink: &mut dyn EventSink) -> Result<()> {
    sink.record(&record)?;
    log.records.push(record);
    Ok(())
}
