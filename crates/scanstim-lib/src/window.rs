use crate::trial::{StimType, TrialSpec};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How long the fixation marker stays dimmed once a change fires.
pub const DIM_SECS: f64 = 0.3;

/// What the display shows during one window of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawState {
    Stimulus,
    StimulusFixation,
    StimulusFixationDim,
    Fixation,
    FixationDim,
}

impl DrawState {
    pub fn is_dim(&self) -> bool {
        matches!(self, DrawState::StimulusFixationDim | DrawState::FixationDim)
    }

    pub fn shows_stimulus(&self) -> bool {
        matches!(
            self,
            DrawState::Stimulus | DrawState::StimulusFixation | DrawState::StimulusFixationDim
        )
    }

    pub fn shows_fixation(&self) -> bool {
        !matches!(self, DrawState::Stimulus)
    }
}

/// Content class of a presentation epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochKind {
    /// Stimulus with the fixation marker on top.
    Stimulus,
    /// Fixation marker alone.
    Blank,
    /// Stimulus without a fixation marker (questions, instruction screens).
    Bare,
}

impl EpochKind {
    fn base(self) -> DrawState {
        match self {
            EpochKind::Stimulus => DrawState::StimulusFixation,
            EpochKind::Blank => DrawState::Fixation,
            EpochKind::Bare => DrawState::Stimulus,
        }
    }

    fn dimmed(self) -> DrawState {
        match self {
            EpochKind::Stimulus | EpochKind::Bare => DrawState::StimulusFixationDim,
            EpochKind::Blank => DrawState::FixationDim,
        }
    }
}

/// A span of the trial timeline, relative to stimulus start, with fixed content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    pub start: f64,
    pub end: f64,
    pub kind: EpochKind,
}

impl Epoch {
    pub const fn new(start: f64, end: f64, kind: EpochKind) -> Self {
        Self { start, end, kind }
    }

    /// Epoch starting at zero and running to the end of whatever span it is clipped to.
    pub const fn open(kind: EpochKind) -> Self {
        Self::new(0.0, f64::INFINITY, kind)
    }
}

/// End of the last photo presentation.
pub const PHOTO_SECS: f64 = 6.0;

/// Three 1.5s photo presentations separated by 0.5s blanks.
pub const PHOTO_SCHEDULE: [Epoch; 6] = [
    Epoch::new(0.0, 0.5, EpochKind::Blank),
    Epoch::new(0.5, 2.0, EpochKind::Stimulus),
    Epoch::new(2.0, 2.5, EpochKind::Blank),
    Epoch::new(2.5, 4.0, EpochKind::Stimulus),
    Epoch::new(4.0, 4.5, EpochKind::Blank),
    Epoch::new(4.5, PHOTO_SECS, EpochKind::Stimulus),
];

/// Presentation schedule used for a stimulus type.
pub fn schedule_for(stim_type: StimType) -> Vec<Epoch> {
    match stim_type {
        StimType::Fixation => vec![Epoch::open(EpochKind::Blank)],
        StimType::Photo => PHOTO_SCHEDULE.to_vec(),
        StimType::Sketch => vec![Epoch::open(EpochKind::Stimulus)],
        StimType::Question | StimType::Instructions => vec![Epoch::open(EpochKind::Bare)],
    }
}

/// Constant-state segment `[start, end)` of a trial, in seconds after stimulus start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawWindow {
    pub start: f64,
    pub end: f64,
    pub state: DrawState,
}

impl DrawWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// Draw the fixation-dim offset for a trial, or `None` when the trial has no change.
pub fn draw_dim_offset<R: Rng + ?Sized>(spec: &TrialSpec, rng: &mut R) -> Option<f64> {
    if !spec.fixation_change {
        return None;
    }
    let (lo, hi) = spec.stim_type.dim_offset_range();
    Some(rng.gen_range(lo..hi))
}

/// Windows for a stimulus-plus-fixation trial covering `[0, total)`.
///
/// With `fixation_change` set, the 0.3s dim starts at `offset`; when no offset
/// is supplied one is drawn from the thread RNG.
pub fn build_windows(spec: &TrialSpec, total: f64, offset: Option<f64>) -> Vec<DrawWindow> {
    let dim = resolve_offset(spec, offset);
    build_epoch_windows(&[Epoch::open(EpochKind::Stimulus)], total, dim)
}

/// Windows for a trial using its stimulus type's presentation schedule.
pub fn plan_windows(spec: &TrialSpec, total: f64, offset: Option<f64>) -> Vec<DrawWindow> {
    let dim = resolve_offset(spec, offset);
    build_epoch_windows(&schedule_for(spec.stim_type), total, dim)
}

fn resolve_offset(spec: &TrialSpec, offset: Option<f64>) -> Option<f64> {
    if !spec.fixation_change {
        return None;
    }
    offset.or_else(|| draw_dim_offset(spec, &mut rand::thread_rng()))
}

/// Partition `[0, total)` by `epochs`, overlaying a dim of `DIM_SECS` starting at `dim_at`.
///
/// Epochs are clipped to the span; gaps and any time past the last epoch are
/// blank. A dim crossing an epoch boundary is split and continues into the
/// next epoch with that epoch's dimmed state.
pub fn build_epoch_windows(epochs: &[Epoch], total: f64, dim_at: Option<f64>) -> Vec<DrawWindow> {
    let mut windows: Vec<DrawWindow> = Vec::new();
    if total <= 0.0 {
        return windows;
    }
    let dim = dim_at.map(|t| (t, t + DIM_SECS));
    let mut cursor = 0.0;
    for epoch in epochs {
        let start = epoch.start.max(cursor);
        let end = epoch.end.min(total);
        if end <= start {
            continue;
        }
        if start > cursor {
            push_epoch(&mut windows, cursor, start, EpochKind::Blank, dim);
        }
        push_epoch(&mut windows, start, end, epoch.kind, dim);
        cursor = end;
        if cursor >= total {
            break;
        }
    }
    if cursor < total {
        push_epoch(&mut windows, cursor, total, EpochKind::Blank, dim);
    }
    windows
}

fn push_epoch(
    windows: &mut Vec<DrawWindow>,
    start: f64,
    end: f64,
    kind: EpochKind,
    dim: Option<(f64, f64)>,
) {
    match dim {
        Some((dim_start, dim_end)) => {
            push_segment(windows, start, end.min(dim_start), kind.base());
            push_segment(windows, start.max(dim_start), end.min(dim_end), kind.dimmed());
            push_segment(windows, start.max(dim_end), end, kind.base());
        }
        None => push_segment(windows, start, end, kind.base()),
    }
}

fn push_segment(windows: &mut Vec<DrawWindow>, start: f64, end: f64, state: DrawState) {
    if end - start <= 0.0 {
        return;
    }
    if let Some(last) = windows.last_mut() {
        if last.state == state && last.end == start {
            last.end = end;
            return;
        }
    }
    windows.push(DrawWindow { start, end, state });
}

/// Window active at `elapsed`; past the end the last window stays active.
pub fn window_at(windows: &[DrawWindow], elapsed: f64) -> Option<&DrawWindow> {
    let idx = windows.partition_point(|w| w.end <= elapsed);
    windows.get(idx).or_else(|| windows.last())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const EPS: f64 = 1e-9;

    fn sketch(fixation_change: bool) -> TrialSpec {
        TrialSpec {
            object_id: "hand_cactus".into(),
            stim_number: 2,
            stim_type: StimType::Sketch,
            onset: 0.0,
            duration: 6.0,
            jitter: 0.0,
            fixation_change,
            where_correct: None,
            repeat: None,
        }
    }

    fn assert_partition(windows: &[DrawWindow], total: f64) {
        assert!(!windows.is_empty());
        assert!(windows[0].start.abs() < EPS);
        assert!((windows.last().unwrap().end - total).abs() < EPS);
        for pair in windows.windows(2) {
            assert!((pair[0].end - pair[1].start).abs() < EPS, "gap in {:?}", pair);
        }
        let sum: f64 = windows.iter().map(DrawWindow::duration).sum();
        assert!((sum - total).abs() < 1e-6);
    }

    #[test]
    fn no_change_is_single_window() {
        let windows = build_windows(&sketch(false), 6.0, Some(2.0));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].state, DrawState::StimulusFixation);
        assert_eq!(windows[0].start, 0.0);
        assert_eq!(windows[0].end, 6.0);
    }

    #[test]
    fn change_inside_span_gives_three_windows() {
        for offset in [0.1, 1.7, 3.33, 5.6] {
            let windows = build_windows(&sketch(true), 6.0, Some(offset));
            assert_eq!(windows.len(), 3, "offset {}", offset);
            assert_eq!(windows[1].state, DrawState::StimulusFixationDim);
            assert!((windows[1].duration() - DIM_SECS).abs() < EPS);
            assert_eq!(windows[0].state, DrawState::StimulusFixation);
            assert_eq!(windows[2].state, DrawState::StimulusFixation);
            assert_partition(&windows, 6.0);
        }
    }

    #[test]
    fn dim_is_clipped_at_trial_end() {
        let windows = build_windows(&sketch(true), 6.0, Some(5.9));
        assert_eq!(windows.len(), 2);
        assert!((windows[1].duration() - 0.1).abs() < EPS);
        assert!(windows[1].state.is_dim());

        let past_end = build_windows(&sketch(true), 6.0, Some(6.5));
        assert_eq!(past_end.len(), 1);
    }

    #[test]
    fn missing_offset_is_drawn_from_type_range() {
        let windows = build_windows(&sketch(true), 6.0, None);
        let dim = windows.iter().find(|w| w.state.is_dim()).unwrap();
        assert!(dim.start >= 0.5 && dim.start < 5.5);
    }

    #[test]
    fn photo_schedule_alternates_without_change() {
        let mut spec = sketch(false);
        spec.stim_type = StimType::Photo;
        let windows = plan_windows(&spec, 6.0, None);
        let states: Vec<_> = windows.iter().map(|w| w.state).collect();
        assert_eq!(
            states,
            vec![
                DrawState::Fixation,
                DrawState::StimulusFixation,
                DrawState::Fixation,
                DrawState::StimulusFixation,
                DrawState::Fixation,
                DrawState::StimulusFixation,
            ]
        );
        assert_partition(&windows, 6.0);
    }

    #[test]
    fn photo_dim_carries_into_blank_epoch() {
        let mut spec = sketch(true);
        spec.stim_type = StimType::Photo;
        let windows = plan_windows(&spec, 6.0, Some(1.9));
        let dims: Vec<_> = windows.iter().filter(|w| w.state.is_dim()).collect();
        assert_eq!(dims.len(), 2);
        assert_eq!(dims[0].state, DrawState::StimulusFixationDim);
        assert!((dims[0].start - 1.9).abs() < EPS);
        assert!((dims[0].end - 2.0).abs() < EPS);
        assert_eq!(dims[1].state, DrawState::FixationDim);
        assert!((dims[1].end - 2.2).abs() < EPS);
        let dim_total: f64 = dims.iter().map(|w| w.duration()).sum();
        assert!((dim_total - DIM_SECS).abs() < EPS);
        assert_partition(&windows, 6.0);
    }

    #[test]
    fn photo_windows_partition_for_random_offsets() {
        let mut spec = sketch(true);
        spec.stim_type = StimType::Photo;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let offset = draw_dim_offset(&spec, &mut rng).unwrap();
            assert!((1.0..5.5).contains(&offset));
            let windows = plan_windows(&spec, 6.0, Some(offset));
            assert_partition(&windows, 6.0);
            let dim_total: f64 = windows
                .iter()
                .filter(|w| w.state.is_dim())
                .map(|w| w.duration())
                .sum();
            assert!((dim_total - DIM_SECS).abs() < 1e-6);
        }
    }

    #[test]
    fn span_past_schedule_is_blank() {
        let mut spec = sketch(false);
        spec.stim_type = StimType::Photo;
        let windows = plan_windows(&spec, 7.0, None);
        let last = windows.last().unwrap();
        assert_eq!(last.state, DrawState::Fixation);
        assert!((last.start - 6.0).abs() < EPS);
        assert_partition(&windows, 7.0);
    }

    #[test]
    fn fixation_trial_dims_the_marker_only() {
        let mut spec = sketch(true);
        spec.stim_type = StimType::Fixation;
        let windows = plan_windows(&spec, 8.0, Some(2.0));
        let states: Vec<_> = windows.iter().map(|w| w.state).collect();
        assert_eq!(
            states,
            vec![DrawState::Fixation, DrawState::FixationDim, DrawState::Fixation]
        );
    }

    #[test]
    fn lookup_finds_active_window() {
        let windows = build_windows(&sketch(true), 6.0, Some(2.0));
        assert_eq!(window_at(&windows, 0.0).unwrap().state, DrawState::StimulusFixation);
        assert_eq!(window_at(&windows, 2.0).unwrap().state, DrawState::StimulusFixationDim);
        assert_eq!(window_at(&windows, 2.29).unwrap().state, DrawState::StimulusFixationDim);
        assert_eq!(window_at(&windows, 2.31).unwrap().state, DrawState::StimulusFixation);
        assert_eq!(window_at(&windows, 9.0).unwrap().state, DrawState::StimulusFixation);
        assert!(window_at(&[], 1.0).is_none());
    }
}
