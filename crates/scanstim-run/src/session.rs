use crate::config::{Protocol, RunSettings};
use anyhow::{ensure, Context, Result};
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};
use scanstim_lib::clock::wait_until;
use scanstim_lib::window::{draw_dim_offset, plan_windows};
use scanstim_lib::{
    Clock, Display, EventSink, InputDevice, RawKey, RunContext, ScanError, Stimulus, TrialSpec,
    TriggerSource,
};
use std::time::Duration;

/// Trials of one run with their resolved stimuli.
#[derive(Debug)]
pub struct RunPlan {
    pub protocol: Protocol,
    pub trials: Vec<TrialSpec>,
    pub stimuli: Vec<Stimulus>,
    /// Fixation held after the last trial.
    pub tail_secs: f64,
    /// Seeds the fixation-change offsets.
    pub seed: u64,
}

impl RunPlan {
    pub fn new(
        settings: &RunSettings,
        trials: Vec<TrialSpec>,
        stimuli: Vec<Stimulus>,
        seed: u64,
    ) -> Result<Self> {
        ensure!(
            trials.len() == stimuli.len(),
            "{} trials but {} stimuli",
            trials.len(),
            stimuli.len()
        );
        Ok(Self {
            protocol: settings.protocol,
            trials,
            stimuli,
            tail_secs: settings.tail_secs,
            seed,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub source: TriggerSource,
    /// Clock time of the scanner trigger.
    pub zero_time: f64,
    pub trials_run: usize,
    pub events: usize,
    pub button_presses: usize,
}

/// Drive a whole run: instructions, scanner sync, every trial in order, then the tail.
///
/// `keyboard` is the operator's keyboard, read only while the instructions are up.
/// The quit key there aborts with [`ScanError::Quit`].
pub fn run_session<C, I, D, K>(
    ctx: &mut RunContext<C, I, D>,
    keyboard: &mut K,
    plan: &mut RunPlan,
    sink: &mut dyn EventSink,
) -> Result<RunSummary>
where
    C: Clock,
    I: InputDevice,
    D: Display,
    K: InputDevice + ?Sized,
{
    wait_for_confirm(
        &ctx.clock,
        &mut ctx.display,
        keyboard,
        ctx.config.poll_interval,
        plan.protocol.instructions(),
        "instructions",
    )?;

    let sync = ctx.synchronize()?;
    ctx.display.show_fixation()?;

    let mut rng = StdRng::seed_from_u64(plan.seed);
    let mut events = 0;
    let mut button_presses = 0;
    for (idx, (spec, stimulus)) in plan
        .trials
        .iter()
        .zip(plan.stimuli.iter_mut())
        .enumerate()
    {
        let offset = draw_dim_offset(spec, &mut rng);
        if let Some(at) = offset {
            debug!("trial {} fixation change planned at {:.3}s", idx + 1, at);
        }
        let windows = plan_windows(spec, stimulus.length(), offset);
        let log = ctx
            .run_trial(spec, stimulus, &windows, sink)
            .with_context(|| format!("trial {} ({})", idx + 1, spec.object_id))?;
        events += log.records.len();
        button_presses += log.button_presses().count();
    }

    ctx.display.show_fixation()?;
    let tail_end = ctx.clock.now() + plan.tail_secs;
    wait_until(&ctx.clock, tail_end, ctx.config.poll_interval);
    info!("Finished run successfully!");

    Ok(RunSummary {
        source: sync.source,
        zero_time: sync.zero_time,
        trials_run: plan.trials.len(),
        events,
        button_presses,
    })
}

/// Show `text` until the operator confirms; the quit key aborts with [`ScanError::Quit`].
pub(crate) fn wait_for_confirm<C, D, K>(
    clock: &C,
    display: &mut D,
    keyboard: &mut K,
    poll: Duration,
    text: &str,
    what: &str,
) -> Result<()>
where
    C: Clock + ?Sized,
    D: Display + ?Sized,
    K: InputDevice + ?Sized,
{
    display.show_text(text)?;
    keyboard.flush()?;
    loop {
        let keys = keyboard.poll()?;
        if keys.iter().any(RawKey::is_quit) {
            info!("Quit command was detected during {}", what);
            return Err(ScanError::Quit.into());
        }
        if keys.iter().any(RawKey::is_confirm) {
            break;
        }
        clock.sleep(poll);
    }
    info!("Finished {}", what);
    Ok(())
}
