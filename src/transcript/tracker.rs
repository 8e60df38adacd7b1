use super::{resolver, Transcript};

/// Outcome of feeding a clock tick to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveChange {
    /// Same segment (or same absence) as the previous tick
    Unchanged,
    /// A different segment became active
    Entered(usize),
    /// The previously active segment is no longer active and none replaced it
    Cleared,
}

/// Remembers the last resolved segment so highlight and scroll work only
/// happens when the active segment identity changes
#[derive(Debug, Default, Clone)]
pub struct ActiveSegmentTracker {
    last_time: Option<f64>,
    active: Option<usize>,
}

impl ActiveSegmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `time` against `transcript` and report what changed
    pub fn update(&mut self, transcript: &Transcript, time: f64) -> ActiveChange {
        if self.last_time == Some(time) {
            return ActiveChange::Unchanged;
        }
        self.last_time = Some(time);

        let next = resolver::resolve_index(&transcript.segments, time);
        if next == self.active {
            return ActiveChange::Unchanged;
        }
        self.active = next;

        match next {
            Some(index) => ActiveChange::Entered(index),
            None => ActiveChange::Cleared,
        }
    }

    /// Forget everything; call when the transcript is replaced
    pub fn reset(&mut self) {
        self.last_time = None;
        self.active = None;
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }
}
