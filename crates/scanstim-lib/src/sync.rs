use crate::clock::Clock;
use crate::display::Display;
use crate::error::ScanError;
use crate::input::{InputDevice, RawKey, TriggerSource, TRIGGER_KEY};
use crate::scheduler::RunContext;
use anyhow::Result;
use log::info;

/// Result of waiting for the first scanner pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOutcome {
    /// Clock time of the pulse; run time zero.
    pub zero_time: f64,
    pub source: TriggerSource,
}

impl<C: Clock, I: InputDevice, D: Display> RunContext<C, I, D> {
    /// Block until the trigger character arrives and make that instant time zero.
    ///
    /// On the keyboard fallback the quit key aborts the wait. With a configured
    /// `trigger_timeout` an overlong wait fails instead of blocking forever.
    pub fn synchronize(&mut self) -> Result<SyncOutcome> {
        let source = self.input.source();
        match source {
            TriggerSource::Serial => {
                info!("Serial device detected");
                self.display.show_text("Waiting for scanner...")?;
            }
            TriggerSource::Keyboard => {
                info!("No serial device detected, using keyboard");
                self.display.show_text("Waiting for (fake) scanner...")?;
            }
        }

        self.input.flush()?;
        let started = self.clock.now();
        let timeout = self.config.trigger_timeout.map(|d| d.as_secs_f64());
        loop {
            let keys = self.input.poll()?;
            if keys.contains(&RawKey::Char(TRIGGER_KEY)) {
                break;
            }
            if source == TriggerSource::Keyboard && keys.iter().any(RawKey::is_quit) {
                info!("Quit command was detected while waiting for the scanner");
                return Err(ScanError::Quit.into());
            }
            if let Some(limit) = timeout {
                if self.clock.now() - started >= limit {
                    return Err(ScanError::TriggerTimeout(limit).into());
                }
            }
            self.clock.sleep(self.config.poll_interval);
        }

        let zero_time = self.clock.now();
        self.zero_time = Some(zero_time);
        match source {
            TriggerSource::Serial => info!("Got sync from scanner! Resetting clocks"),
            TriggerSource::Keyboard => info!("Got sync from keyboard. Resetting clocks"),
        }
        Ok(SyncOutcome { zero_time, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::display::{Frame, RecordingDisplay};
    use crate::input::ScriptedInput;
    use crate::scheduler::SchedulerConfig;
    use std::time::Duration;

    #[test]
    fn zero_time_is_first_trigger() {
        let clock = SimClock::starting_at(0.0);
        let script = [
            (0.4, RawKey::Char('1')),
            (1.25, RawKey::Char('5')),
            (3.25, RawKey::Char('5')),
        ];
        let input = ScriptedInput::new(&clock, TriggerSource::Serial, &script);
        let mut ctx = RunContext::new(
            &clock,
            input,
            RecordingDisplay::default(),
            SchedulerConfig::default(),
        );

        let outcome = ctx.synchronize().unwrap();

        assert_eq!(outcome.source, TriggerSource::Serial);
        assert!(outcome.zero_time >= 1.25 && outcome.zero_time < 1.27);
        assert_eq!(ctx.zero_time(), Some(outcome.zero_time));
        assert!(ctx.run_time().abs() < 1e-9);
        assert_eq!(ctx.input.remaining(), 1);
        assert_eq!(
            ctx.display.frames,
            vec![Frame::Text("Waiting for scanner...".into())]
        );
    }

    #[test]
    fn keyboard_quit_aborts_wait() {
        let clock = SimClock::starting_at(0.0);
        let input = ScriptedInput::new(&clock, TriggerSource::Keyboard, &[(0.2, RawKey::Escape)]);
        let mut ctx = RunContext::new(
            &clock,
            input,
            RecordingDisplay::default(),
            SchedulerConfig::default(),
        );

        let err = ctx.synchronize().unwrap_err();

        assert!(ScanError::is_quit(&err));
        assert!(ctx.zero_time().is_none());
    }

    #[test]
    fn timeout_ends_an_idle_wait() {
        let clock = SimClock::starting_at(0.0);
        let input = ScriptedInput::new(&clock, TriggerSource::Serial, &[]);
        let config = SchedulerConfig {
            trigger_timeout: Some(Duration::from_secs(3)),
            ..SchedulerConfig::default()
        };
        let mut ctx = RunContext::new(&clock, input, RecordingDisplay::default(), config);

        let err = ctx.synchronize().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::TriggerTimeout(_))
        ));
        assert!(clock.now() >= 3.0);
    }
}
