use crate::config::RunSettings;
use crate::session::wait_for_confirm;
use crate::trials::existing;
use anyhow::{Context, Result};
use log::info;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use scanstim_lib::{
    Clock, Display, DrawState, InputDevice, Presentation, QuestionChoices, RawKey, ScanError,
    Stimulus, StimulusKind,
};
use std::time::Duration;

/// Ambiguous sketches shown once each during familiarization, exemplar 0.
pub const PRACTICE_OBJECTS: [&str; 8] = [
    "pig_alarm-clock",
    "hedgehog_bush",
    "hand_cactus",
    "face_radio",
    "face_strawberry",
    "foot_hockey-stick",
    "rabbit_scissors",
    "lion_sun",
];

pub const PRACTICE_INSTRUCTIONS: &str = "In this experiment, you will view ambiguous sketches of objects.\n\n\
For each ambiguous sketch, there are two alternative interpretations.\n\n\
Each of these alternatives is an object category\n\
from the first experiment.\n\n\
Next, you will see some examples of the ambiguous sketches.";

pub const LAY_STILL: &str = "Please lay still for the rest of the anatomical scan,\n\
After that, we will begin the experiment.\n\n\
In part one, you will view ambiguous sketches\n\
and report what you saw.\n\n\
In part two, you will attempt to interpret each ambiguous sketch\n\
as a specific alternative.";

const CHOICES_PROMPT: &str = "Possible interpretations for sketch identity:";
const LEAD_IN_SECS: f64 = 2.0;
const CHOICES_SECS: f64 = 2.0;
const GAP_SECS: f64 = 2.0;
const OUTRO_SECS: f64 = 4.0;

/// One familiarization sketch: its two readings, then the clip.
#[derive(Debug, Clone)]
pub struct PracticeItem {
    pub choices: Stimulus,
    pub clip: Stimulus,
}

#[derive(Debug)]
pub struct PracticePlan {
    pub items: Vec<PracticeItem>,
    pub seed: u64,
}

impl PracticePlan {
    /// Shuffle the practice objects and pick a side for each animate name.
    ///
    /// Fails with [`ScanError::MissingMedia`] when a clip is not in the stimulus directory.
    pub fn new(settings: &RunSettings, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut objects = PRACTICE_OBJECTS.to_vec();
        objects.shuffle(&mut rng);
        let mut items = Vec::with_capacity(objects.len());
        for object_id in objects {
            let side = if rng.gen_bool(0.5) { "right" } else { "left" };
            let mut question = QuestionChoices::from_object_id(object_id, Some(side))
                .with_context(|| format!("practice object {}", object_id))?;
            question.prompt = CHOICES_PROMPT.to_string();
            question.center.clear();
            let path = settings.stim_dir.join(format!(
                "{}_0{}",
                object_id,
                settings.protocol.clip_suffix()
            ));
            let path = existing(path).with_context(|| format!("loading practice {}", object_id))?;
            items.push(PracticeItem {
                choices: Stimulus::new(object_id, StimulusKind::Question(question), CHOICES_SECS),
                clip: Stimulus::new(
                    object_id,
                    StimulusKind::Sketch {
                        path,
                        clip_secs: settings.clip_secs,
                    },
                    settings.clip_secs,
                ),
            });
        }
        Ok(Self { items, seed })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeSummary {
    /// Object ids in the order shown.
    pub shown: Vec<String>,
}

/// Familiarization before the anatomical scan: instructions, each practice
/// sketch with its two readings, then the lay-still screen.
///
/// Untimed against the scanner; only the operator keyboard is read, and its
/// quit key aborts with [`ScanError::Quit`] at any point.
pub fn run_practice<C, D, K>(
    clock: &C,
    display: &mut D,
    keyboard: &mut K,
    plan: &mut PracticePlan,
    poll: Duration,
) -> Result<PracticeSummary>
where
    C: Clock + ?Sized,
    D: Display + ?Sized,
    K: InputDevice + ?Sized,
{
    wait_for_confirm(clock, display, keyboard, poll, PRACTICE_INSTRUCTIONS, "instructions")?;
    display.show_fixation()?;
    pause(clock, keyboard, LEAD_IN_SECS, poll)?;

    let total = plan.items.len();
    let mut shown = Vec::with_capacity(total);
    for (idx, item) in plan.items.iter_mut().enumerate() {
        info!("Practice sketch {} of {}: {}", idx + 1, total, item.clip.label);
        display.draw(DrawState::Stimulus, &item.choices)?;
        pause(clock, keyboard, CHOICES_SECS, poll)?;
        display.show_fixation()?;
        pause(clock, keyboard, GAP_SECS, poll)?;

        let start = clock.now();
        item.clip.begin(start);
        loop {
            display.draw(DrawState::StimulusFixation, &item.clip)?;
            if item.clip.is_finished(clock.now() - start) {
                break;
            }
            check_quit(keyboard)?;
            clock.sleep(poll);
        }

        display.show_fixation()?;
        pause(clock, keyboard, GAP_SECS, poll)?;
        shown.push(item.clip.label.clone());
    }

    pause(clock, keyboard, OUTRO_SECS, poll)?;
    wait_for_confirm(clock, display, keyboard, poll, LAY_STILL, "lay_still")?;
    info!("Finished instructions successfully!");
    Ok(PracticeSummary { shown })
}

fn check_quit<K: InputDevice + ?Sized>(keyboard: &mut K) -> Result<()> {
    if keyboard.poll()?.iter().any(RawKey::is_quit) {
        info!("Quit command was detected during familiarization");
        return Err(ScanError::Quit.into());
    }
    Ok(())
}

/// Hold the current screen for `secs`, watching for the quit key.
fn pause<C, K>(clock: &C, keyboard: &mut K, secs: f64, poll: Duration) -> Result<()>
where
    C: Clock + ?Sized,
    K: InputDevice + ?Sized,
{
    let end = clock.now() + secs;
    loop {
        check_quit(keyboard)?;
        let remaining = end - clock.now();
        if remaining <= 0.0 {
            return Ok(());
        }
        let slice = poll.min(Duration::from_secs_f64(remaining));
        if slice.is_zero() {
            return Ok(());
        }
        clock.sleep(slice);
    }
}
