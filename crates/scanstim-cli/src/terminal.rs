use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{
        self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use scanstim_lib::{Display, DrawState, Stimulus, StimulusKind};
use std::io::{self, Stdout, Write};

const FIXATION: &str = "+";

#[derive(Debug, Clone, PartialEq)]
enum Screen {
    Text(String),
    Trial(DrawState, String),
    Fixation,
}

/// Full-screen terminal output. Raw mode and the alternate screen are held
/// until the display is dropped.
pub struct TerminalDisplay {
    out: Stdout,
    shown: Option<Screen>,
}

impl TerminalDisplay {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("enabling raw mode")?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, Hide)?;
        Ok(Self { out, shown: None })
    }

    /// Skip the repaint when `screen` is already up.
    fn repaint(&mut self, screen: Screen, lines: &[(String, Color)]) -> Result<()> {
        if self.shown.as_ref() == Some(&screen) {
            return Ok(());
        }
        let (cols, rows) = terminal::size().unwrap_or((80, 24));
        queue!(self.out, Clear(ClearType::All))?;
        let top = (rows / 2).saturating_sub(lines.len() as u16 / 2);
        for (i, (line, color)) in lines.iter().enumerate() {
            let width = line.chars().count() as u16;
            let col = (cols / 2).saturating_sub(width / 2);
            queue!(
                self.out,
                MoveTo(col, top + i as u16),
                SetForegroundColor(*color),
                Print(line),
                ResetColor
            )?;
        }
        self.out.flush()?;
        self.shown = Some(screen);
        Ok(())
    }
}

fn stimulus_lines(stimulus: &Stimulus) -> Vec<(String, Color)> {
    match &stimulus.kind {
        StimulusKind::Fixation => Vec::new(),
        StimulusKind::Photo { path } | StimulusKind::Sketch { path, .. } => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| stimulus.label.clone());
            vec![(format!("[ {} ]", name), Color::White)]
        }
        StimulusKind::Question(question) => vec![
            (question.prompt.clone(), Color::White),
            (String::new(), Color::White),
            (
                if question.center.is_empty() {
                    format!("{}        {}", question.left, question.right)
                } else {
                    format!("{}    {}    {}", question.left, question.center, question.right)
                },
                Color::White,
            ),
        ],
        StimulusKind::Instructions { text } => {
            text.lines().map(|l| (l.to_string(), Color::White)).collect()
        }
    }
}

impl Display for TerminalDisplay {
    fn show_text(&mut self, text: &str) -> Result<()> {
        let lines: Vec<_> = text.lines().map(|l| (l.to_string(), Color::White)).collect();
        self.repaint(Screen::Text(text.to_string()), &lines)
    }

    fn draw(&mut self, state: DrawState, stimulus: &Stimulus) -> Result<()> {
        let mut lines = if state.shows_stimulus() {
            stimulus_lines(stimulus)
        } else {
            Vec::new()
        };
        if state.shows_fixation() {
            let color = if state.is_dim() {
                Color::DarkGrey
            } else {
                Color::White
            };
            lines.push((FIXATION.to_string(), color));
        }
        self.repaint(Screen::Trial(state, stimulus.label.clone()), &lines)
    }

    fn show_fixation(&mut self) -> Result<()> {
        self.repaint(
            Screen::Fixation,
            &[(FIXATION.to_string(), Color::White)],
        )
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanstim_lib::QuestionChoices;

    fn choices_line(question: QuestionChoices) -> String {
        let stimulus = Stimulus::new("lion_sun", StimulusKind::Question(question), 2.0);
        stimulus_lines(&stimulus).remove(2).0
    }

    #[test]
    fn question_lists_three_choices() {
        let question = QuestionChoices::from_object_id("lion_sun", Some("left")).unwrap();
        assert_eq!(choices_line(question), "lion    neither    sun");
    }

    #[test]
    fn two_choice_question_drops_the_center() {
        let mut question = QuestionChoices::from_object_id("lion_sun", Some("right")).unwrap();
        question.center.clear();
        assert_eq!(choices_line(question), "sun        lion");
    }
}
