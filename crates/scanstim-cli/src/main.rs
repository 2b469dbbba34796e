use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use scanstim_lib::{InputDevice, MonotonicClock, RunContext, ScanError};
use scanstim_run::{
    load_stimuli, read_config, read_trials, run_practice, run_session, write_events_json,
    write_manifest, EventLogWriter, PracticePlan, Protocol, RunConfig, RunIdentity, RunManifest,
    RunPlan, RunSettings,
};
use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

mod keyboard;
#[cfg(unix)]
mod serial;
mod terminal;

use keyboard::KeyboardInput;
use terminal::TerminalDisplay;

#[derive(Parser)]
#[command(
    name = "scanstim",
    version,
    about = "Scanner-synchronized stimulus presentation for fMRI runs"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = ProtocolArg::Morph)]
    protocol: ProtocolArg,
    /// TOML file overriding the protocol defaults
    #[arg(long)]
    config: Option<PathBuf>,
    operator_id: Option<String>,
    accession: Option<String>,
    participant: Option<String>,
    run: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ProtocolArg {
    Morph,
    Identify,
    /// Practice sketches shown before the first run; needs no participant or run
    Familiarize,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Morph => Protocol::Morph,
            ProtocolArg::Identify | ProtocolArg::Familiarize => Protocol::Identify,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => read_config(path)?,
        None => RunConfig::default(),
    };
    let settings = RunSettings::resolve(cli.protocol.into(), &config)?;
    if let ProtocolArg::Familiarize = cli.protocol {
        create_res_dir(&settings)?;
        init_logging(&settings.practice_log_path())?;
        info!("familiarization with {} clips", settings.protocol.clip_suffix());
        return quit_is_success(familiarize(&settings));
    }
    let id = identify(&cli)?;

    create_res_dir(&settings)?;
    init_logging(&settings.log_path(&id))?;
    info!(
        "{} run {} for participant {:02} (operator {}, accession {})",
        settings.protocol.name(),
        id.run,
        id.participant,
        id.operator_id,
        id.accession
    );

    quit_is_success(run(&settings, &id))
}

fn create_res_dir(settings: &RunSettings) -> Result<()> {
    fs::create_dir_all(&settings.res_dir)
        .with_context(|| format!("creating {}", settings.res_dir.display()))
}

fn quit_is_success(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if ScanError::is_quit(&err) => {
            info!("Run quit by operator");
            eprintln!("Run quit by operator");
            Ok(())
        }
        other => other,
    }
}

fn familiarize(settings: &RunSettings) -> Result<()> {
    let seed = settings.seed.unwrap_or_else(rand::random);
    debug!("practice seed {}", seed);
    let mut plan = PracticePlan::new(settings, seed)?;

    let mut display = TerminalDisplay::enter()?;
    let clock = MonotonicClock::new();
    let summary = run_practice(
        &clock,
        &mut display,
        &mut KeyboardInput,
        &mut plan,
        settings.poll_interval,
    );
    drop(display);
    let summary = summary?;
    info!("Practice order: {}", summary.shown.join(", "));
    Ok(())
}

fn run(settings: &RunSettings, id: &RunIdentity) -> Result<()> {
    let trials = read_trials(&settings.trials_path(id), settings.protocol)?;
    let stimuli = load_stimuli(&trials, settings)?;
    let seed = settings.seed.unwrap_or_else(rand::random);
    debug!("fixation-change seed {}", seed);
    let mut plan = RunPlan::new(settings, trials, stimuli, seed)?;

    let events_path = settings.events_path(id);
    let with_repetition = settings.protocol.logs_repetition();
    let mut writer = EventLogWriter::create(&events_path, with_repetition)?;
    write_events_json(&events_path.with_extension("json"), with_repetition)?;
    let start_time_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let input = open_trigger_input(&settings.serial_path);
    let display = TerminalDisplay::enter()?;
    let mut ctx = RunContext::new(
        MonotonicClock::new(),
        input,
        display,
        settings.scheduler_config(),
    );
    let mut keyboard = KeyboardInput;
    let summary = run_session(&mut ctx, &mut keyboard, &mut plan, &mut writer);
    drop(ctx);
    let summary = summary?;

    let manifest = RunManifest::new(id, settings.protocol, &summary, seed, start_time_unix);
    write_manifest(&settings.manifest_path(id), &manifest)?;
    info!(
        "{} events ({} button presses) written to {}",
        summary.events,
        summary.button_presses,
        events_path.display()
    );
    Ok(())
}

/// Serial trigger box when it opens, the keyboard otherwise.
#[cfg(unix)]
fn open_trigger_input(path: &Path) -> Box<dyn InputDevice> {
    match serial::SerialInput::open(path) {
        Ok(port) => Box::new(port),
        Err(err) => {
            debug!("{:#}", err);
            Box::new(KeyboardInput)
        }
    }
}

#[cfg(not(unix))]
fn open_trigger_input(path: &Path) -> Box<dyn InputDevice> {
    debug!("no serial support on this platform; ignoring {}", path.display());
    Box::new(KeyboardInput)
}

fn init_logging(path: &Path) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("creating log {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .write_style(env_logger::WriteStyle::Never)
        .init();
    Ok(())
}

/// Run identity from the positionals, prompting on stdin for any that are missing.
fn identify(cli: &Cli) -> Result<RunIdentity> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut ask = |value: &Option<String>, label: &str, default: &str| -> Result<String> {
        match value {
            Some(v) => Ok(v.clone()),
            None => prompt(&mut input, label, default),
        }
    };
    let operator_id = ask(&cli.operator_id, "Operator ID", "SID000001")?;
    let accession = ask(&cli.accession, "Accession", "A000000")?;
    let participant = ask(&cli.participant, "Participant", "00")?;
    let run = ask(&cli.run, "Run", "00")?;
    RunIdentity::parse(&operator_id, &accession, &participant, &run)
}

fn prompt<R: BufRead>(input: &mut R, label: &str, default: &str) -> Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{} [{}]: ", label, default)?;
    stderr.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}
