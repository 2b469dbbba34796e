pub mod clock;
pub mod display;
pub mod error;
pub mod events;
pub mod input;
pub mod scheduler;
pub mod stimulus;
pub mod sync;
pub mod trial;
pub mod window;

pub use clock::{Clock, MonotonicClock, SimClock};
pub use display::{Display, RecordingDisplay};
pub use error::ScanError;
pub use events::{EventRecord, EventSink};
pub use input::{InputDevice, InputEvent, KeySet, RawKey, ScriptedInput, TriggerSource};
pub use scheduler::{RunContext, SchedulerConfig, TrialEventLog};
pub use stimulus::{Presentation, QuestionChoices, Stimulus, StimulusKind};
pub use sync::SyncOutcome;
pub use trial::{StimType, TrialSpec};
pub use window::{DrawState, DrawWindow, Epoch, EpochKind};
