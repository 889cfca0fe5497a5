use std::time::Duration;

use tokio::time::Instant;

/// What happens when the armed deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Delay elapsed: draw the selected record.
    Reveal,
    /// Pause elapsed: start hiding.
    Expire,
    /// In-place update window elapsed without a settle event.
    Settle,
    /// Hide window elapsed: complete and move on.
    Advance,
    /// Retry a failed attach.
    Reattach,
}

/// The scheduler's only timer. Arming replaces whatever was pending.
#[derive(Debug, Default)]
pub struct Timer {
    slot: Option<(Instant, Step)>,
}

impl Timer {
    pub fn arm(&mut self, after: Duration, step: Step) {
        self.slot = Some((Instant::now() + after, step));
    }

    pub fn cancel(&mut self) {
        self.slot = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.slot.map(|(at, _)| at)
    }

    pub fn step(&self) -> Option<Step> {
        self.slot.map(|(_, step)| step)
    }

    pub fn is_pending(&self, step: Step) -> bool {
        self.step() == Some(step)
    }

    /// Disarms and returns the pending step.
    pub fn take(&mut self) -> Option<Step> {
        self.slot.take().map(|(_, step)| step)
    }
}
