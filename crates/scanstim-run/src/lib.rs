pub mod bids;
pub mod config;
pub mod practice;
pub mod session;
pub mod trials;

pub use bids::{
    read_event_log, read_manifest, write_events_json, write_manifest, EventLogWriter, RunManifest,
};
pub use config::{read_config, Protocol, RunConfig, RunIdentity, RunSettings};
pub use practice::{run_practice, PracticePlan, PracticeSummary};
pub use session::{run_session, RunPlan, RunSummary};
pub use trials::{load_stimuli, read_trials};
