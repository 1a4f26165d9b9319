use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::time::MIN_SECONDS;

use super::scheduler::{Tick, TickSource};

/// Progress made below this fraction means an edit starts the session over.
pub const FRESH_PROGRESS_THRESHOLD: f64 = 0.05;
/// An edit changing remaining time by more than this fraction is major.
pub const MAJOR_CHANGE_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ClockStatus {
    #[default]
    Idle,
    Running,
    Paused,
    /// Reached zero. Only lingers while an auto-start is pending.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Counted { remaining_secs: u32 },
    Completed,
    Ignored,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ManualEdit {
    /// Baseline kept, progress bar does not jump.
    Minor,
    /// Baseline replaced; the session counts as started over.
    Major,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClockState {
    pub status: ClockStatus,
    pub remaining_secs: u32,
    /// Progress denominator. Never zero.
    pub baseline_secs: u32,
    /// Set once when the countdown reaches zero; cleared on the next load.
    pub completed_this_session: bool,
}

impl ClockState {
    pub fn new(total_secs: u32) -> Self {
        let total = total_secs.max(MIN_SECONDS);
        Self {
            status: ClockStatus::Idle,
            remaining_secs: total,
            baseline_secs: total,
            completed_this_session: false,
        }
    }

    /// Back to idle at the full duration. Used for new sessions and resets.
    pub fn load(&mut self, total_secs: u32) {
        *self = Self::new(total_secs);
    }

    /// Like [`load`](Self::load) but keeps running/paused/idle as it was.
    pub fn rebase(&mut self, total_secs: u32) {
        let status = match self.status {
            ClockStatus::Completed => ClockStatus::Idle,
            other => other,
        };
        self.load(total_secs);
        self.status = status;
    }

    pub fn start(&mut self) -> bool {
        match self.status {
            ClockStatus::Idle | ClockStatus::Paused => {
                self.status = ClockStatus::Running;
                true
            }
            ClockStatus::Running | ClockStatus::Completed => false,
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.status == ClockStatus::Running {
            self.status = ClockStatus::Paused;
            true
        } else {
            false
        }
    }

    /// One second elapsed. Reaching zero completes the session exactly once;
    /// any further ticks are ignored.
    pub fn apply_tick(&mut self) -> TickOutcome {
        if self.status != ClockStatus::Running || self.completed_this_session {
            return TickOutcome::Ignored;
        }

        if self.remaining_secs <= 1 {
            self.remaining_secs = 0;
            self.completed_this_session = true;
            self.status = ClockStatus::Completed;
            return TickOutcome::Completed;
        }

        self.remaining_secs -= 1;
        TickOutcome::Counted {
            remaining_secs: self.remaining_secs,
        }
    }

    /// Expects an already validated value.
    pub fn set_manual_time(&mut self, seconds: u32) -> ManualEdit {
        let seconds = seconds.max(MIN_SECONDS);
        let baseline = f64::from(self.baseline_secs.max(MIN_SECONDS));
        let remaining = f64::from(self.remaining_secs);
        let progress_made = (baseline - remaining) / baseline;
        let change_ratio = (f64::from(seconds) - remaining).abs() / remaining.max(1.0);

        self.remaining_secs = seconds;
        if progress_made < FRESH_PROGRESS_THRESHOLD || change_ratio > MAJOR_CHANGE_RATIO {
            self.baseline_secs = seconds;
            ManualEdit::Major
        } else {
            ManualEdit::Minor
        }
    }

    /// Percentage of the baseline already elapsed, always within `0..=100`.
    pub fn progress(&self) -> f64 {
        let baseline = f64::from(self.baseline_secs.max(MIN_SECONDS));
        let done = (baseline - f64::from(self.remaining_secs)) / baseline;
        done.clamp(0.0, 1.0) * 100.0
    }
}

/// Countdown state plus the tick stream that drives it.
pub struct SessionClock {
    state: ClockState,
    ticker: TickSource,
    period: Duration,
}

impl SessionClock {
    pub fn new(total_secs: u32, ticker: TickSource, period: Duration) -> Self {
        Self {
            state: ClockState::new(total_secs),
            ticker,
            period,
        }
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    pub fn status(&self) -> ClockStatus {
        self.state.status
    }

    pub fn ticker(&self) -> &TickSource {
        &self.ticker
    }

    pub fn accepts(&self, tick: &Tick) -> bool {
        self.ticker.accepts(tick)
    }

    pub fn load(&mut self, total_secs: u32) {
        self.ticker.stop();
        self.state.load(total_secs);
    }

    pub fn rebase(&mut self, total_secs: u32) {
        self.ticker.stop();
        self.state.rebase(total_secs);
        self.resume_ticking();
    }

    pub fn start(&mut self) -> bool {
        if !self.state.start() {
            return false;
        }
        self.ticker.start(self.period);
        true
    }

    pub fn pause(&mut self) -> bool {
        self.ticker.stop();
        self.state.pause()
    }

    pub fn apply_tick(&mut self) -> TickOutcome {
        let outcome = self.state.apply_tick();
        if outcome == TickOutcome::Completed {
            self.ticker.stop();
        }
        outcome
    }

    /// The tick stream is torn down before the write and brought back with a
    /// fresh generation afterwards, so no tick straddles the edit.
    pub fn set_manual_time(&mut self, seconds: u32) -> ManualEdit {
        self.ticker.stop();
        let edit = self.state.set_manual_time(seconds);
        self.resume_ticking();
        edit
    }

    pub fn stop_ticking(&mut self) {
        self.ticker.stop();
    }

    fn resume_ticking(&mut self) {
        if self.state.status == ClockStatus::Running {
            self.ticker.start(self.period);
        }
    }
}
