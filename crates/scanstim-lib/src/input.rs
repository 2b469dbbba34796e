use crate::clock::{Clock, SimClock};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Character the scanner sends (or the operator types) on every volume.
pub const TRIGGER_KEY: char = '5';

/// When several accepted keys arrive in one tick, the first listed wins.
// TODO: confirm the button-first ordering with the experiment designers.
const KEY_PRIORITY: [char; 5] = ['1', '2', '3', '4', TRIGGER_KEY];

/// One key or byte observed by an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKey {
    Char(char),
    Enter,
    Escape,
}

impl RawKey {
    pub fn is_quit(&self) -> bool {
        matches!(self, RawKey::Char('q') | RawKey::Escape)
    }

    pub fn is_confirm(&self) -> bool {
        matches!(self, RawKey::Char(' ') | RawKey::Enter)
    }
}

/// Semantic meaning of a poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Button(char),
    Trigger,
}

/// Response buttons accepted during a trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    buttons: Vec<char>,
}

impl KeySet {
    pub fn new(buttons: &[char]) -> Self {
        let mut set = Self {
            buttons: Vec::with_capacity(buttons.len()),
        };
        set.extend(buttons);
        set
    }

    /// Copy of this set with `extra` buttons added.
    pub fn with(&self, extra: &[char]) -> Self {
        let mut set = self.clone();
        set.extend(extra);
        set
    }

    pub fn contains(&self, key: char) -> bool {
        self.buttons.contains(&key)
    }

    pub fn buttons(&self) -> &[char] {
        &self.buttons
    }

    fn extend(&mut self, keys: &[char]) {
        for &key in keys {
            if key != TRIGGER_KEY && !self.buttons.contains(&key) {
                self.buttons.push(key);
            }
        }
    }
}

/// Map everything pending in one tick to at most one event.
pub fn classify(pending: &[RawKey], keys: &KeySet) -> Option<InputEvent> {
    KEY_PRIORITY
        .iter()
        .copied()
        .filter(|&key| key == TRIGGER_KEY || keys.contains(key))
        .find(|&key| pending.contains(&RawKey::Char(key)))
        .map(|key| {
            if key == TRIGGER_KEY {
                InputEvent::Trigger
            } else {
                InputEvent::Button(key)
            }
        })
}

/// Where trigger pulses and button presses come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Serial,
    Keyboard,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Serial => f.write_str("serial"),
            TriggerSource::Keyboard => f.write_str("keyboard"),
        }
    }
}

/// Polled source of keys: the scanner's serial line or the keyboard.
pub trait InputDevice {
    fn source(&self) -> TriggerSource;

    /// Everything that arrived since the last poll; never blocks.
    fn poll(&mut self) -> Result<Vec<RawKey>>;

    /// Drop anything pending.
    fn flush(&mut self) -> Result<()> {
        self.poll().map(|_| ())
    }
}

impl<T: InputDevice + ?Sized> InputDevice for Box<T> {
    fn source(&self) -> TriggerSource {
        (**self).source()
    }

    fn poll(&mut self) -> Result<Vec<RawKey>> {
        (**self).poll()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Input replaying keys at fixed times on a `SimClock`.
pub struct ScriptedInput<'a> {
    clock: &'a SimClock,
    source: TriggerSource,
    pending: VecDeque<(f64, RawKey)>,
}

impl<'a> ScriptedInput<'a> {
    pub fn new(clock: &'a SimClock, source: TriggerSource, script: &[(f64, RawKey)]) -> Self {
        let mut events = script.to_vec();
        events.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            clock,
            source,
            pending: events.into(),
        }
    }

    /// Keys not yet delivered.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl InputDevice for ScriptedInput<'_> {
    fn source(&self) -> TriggerSource {
        self.source
    }

    fn poll(&mut self) -> Result<Vec<RawKey>> {
        let now = self.clock.now();
        let mut due = Vec::new();
        while let Some(&(t, key)) = self.pending.front() {
            if t > now {
                break;
            }
            due.push(key);
            self.pending.pop_front();
        }
        Ok(due)
    }
}
