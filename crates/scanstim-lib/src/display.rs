use crate::stimulus::Stimulus;
use crate::window::DrawState;
use anyhow::Result;

/// Output side of the run: whatever puts pixels (or characters) in front of the participant.
pub trait Display {
    /// Full-screen message such as instructions or "Waiting for scanner...".
    fn show_text(&mut self, text: &str) -> Result<()>;

    /// One frame of a trial.
    fn draw(&mut self, state: DrawState, stimulus: &Stimulus) -> Result<()>;

    /// Fixation marker alone, between trials.
    fn show_fixation(&mut self) -> Result<()>;
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn show_text(&mut self, text: &str) -> Result<()> {
        (**self).show_text(text)
    }

    fn draw(&mut self, state: DrawState, stimulus: &Stimulus) -> Result<()> {
        (**self).draw(state, stimulus)
    }

    fn show_fixation(&mut self) -> Result<()> {
        (**self).show_fixation()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Trial { state: DrawState, label: String },
    Fixation,
}

/// Display that remembers what it was asked to show, collapsing repeated frames.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub frames: Vec<Frame>,
    pub draw_calls: usize,
}

impl RecordingDisplay {
    fn push(&mut self, frame: Frame) {
        self.draw_calls += 1;
        if self.frames.last() != Some(&frame) {
            self.frames.push(frame);
        }
    }

    /// Distinct trial states in presentation order.
    pub fn states(&self) -> Vec<DrawState> {
        self.frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Trial { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }
}

impl Display for RecordingDisplay {
    fn show_text(&mut self, text: &str) -> Result<()> {
        self.push(Frame::Text(text.to_string()));
        Ok(())
    }

    fn draw(&mut self, state: DrawState, stimulus: &Stimulus) -> Result<()> {
        self.push(Frame::Trial {
            state,
            label: stimulus.label.clone(),
        });
        Ok(())
    }

    fn show_fixation(&mut self) -> Result<()> {
        self.push(Frame::Fixation);
        Ok(())
    }
}
