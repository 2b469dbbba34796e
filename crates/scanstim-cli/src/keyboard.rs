use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use scanstim_lib::{InputDevice, RawKey, TriggerSource};
use std::time::Duration;

/// Terminal keyboard in raw mode. Stands in for the trigger box when no serial
/// device is attached, and always serves the operator prompts.
#[derive(Debug, Default)]
pub struct KeyboardInput;

impl InputDevice for KeyboardInput {
    fn source(&self) -> TriggerSource {
        TriggerSource::Keyboard
    }

    fn poll(&mut self) -> Result<Vec<RawKey>> {
        let mut keys = Vec::new();
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if let Some(raw) = map_key(key) {
                    keys.push(raw);
                }
            }
        }
        Ok(keys)
    }
}

fn map_key(key: KeyEvent) -> Option<RawKey> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(RawKey::Escape),
        KeyCode::Char(c) => Some(RawKey::Char(c)),
        KeyCode::Enter => Some(RawKey::Enter),
        KeyCode::Esc => Some(RawKey::Escape),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn maps_digits_and_controls() {
        assert_eq!(
            map_key(press(KeyCode::Char('5'), KeyModifiers::NONE)),
            Some(RawKey::Char('5'))
        );
        assert_eq!(
            map_key(press(KeyCode::Enter, KeyModifiers::NONE)),
            Some(RawKey::Enter)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(RawKey::Escape)
        );
        assert_eq!(map_key(press(KeyCode::Tab, KeyModifiers::NONE)), None);
    }

    #[test]
    fn ignores_key_release() {
        let mut key = press(KeyCode::Char('1'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(key), None);
    }
}
