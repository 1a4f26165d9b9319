use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::scheduler::{Tick, TickSource};

/// Time spent paused within the current session.
///
/// Two feeds keep it honest: the periodic pause tick adds a second each time
/// it fires, and ending a pause reconciles against the wall clock so seconds
/// lost to a stalled or throttled tick are still counted.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PauseState {
    pub accrued_secs: u64,
    #[serde(skip)]
    pub started_at: Option<Instant>,
    /// Seconds the periodic tick has already added for the open interval.
    #[serde(skip)]
    pub ticks_this_interval: u64,
}

impl PauseState {
    pub fn is_tracking(&self) -> bool {
        self.started_at.is_some()
    }

    /// Opens a pause interval. An interval that is already open is closed first.
    pub fn begin(&mut self, now: Instant) {
        if self.is_tracking() {
            self.end(now);
        }
        self.started_at = Some(now);
        self.ticks_this_interval = 0;
    }

    pub fn apply_tick(&mut self) -> Option<u64> {
        if !self.is_tracking() {
            return None;
        }
        self.accrued_secs += 1;
        self.ticks_this_interval += 1;
        Some(self.accrued_secs)
    }

    /// Closes the open interval and returns the seconds reconciliation added.
    pub fn end(&mut self, now: Instant) -> u64 {
        let Some(started_at) = self.started_at.take() else {
            return 0;
        };
        let elapsed = now.saturating_duration_since(started_at).as_secs();
        let missed = elapsed.saturating_sub(self.ticks_this_interval);
        self.accrued_secs += missed;
        self.ticks_this_interval = 0;
        missed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Pause state plus the tick stream that feeds it while paused.
pub struct PauseAccountant {
    state: PauseState,
    ticker: TickSource,
    period: Duration,
}

impl PauseAccountant {
    pub fn new(ticker: TickSource, period: Duration) -> Self {
        Self {
            state: PauseState::default(),
            ticker,
            period,
        }
    }

    pub fn accrued_secs(&self) -> u64 {
        self.state.accrued_secs
    }

    pub fn is_tracking(&self) -> bool {
        self.state.is_tracking()
    }

    pub fn accepts(&self, tick: &Tick) -> bool {
        self.ticker.accepts(tick)
    }

    pub fn ticker(&self) -> &TickSource {
        &self.ticker
    }

    pub fn start_tracking(&mut self, now: Instant) {
        self.ticker.stop();
        self.state.begin(now);
        self.ticker.start(self.period);
    }

    /// Replaces the pause tick stream without closing the open interval, so
    /// ticks queued by the old stream are dropped and no elapsed time is lost.
    pub fn restart_ticker(&mut self) {
        if self.state.is_tracking() {
            self.ticker.start(self.period);
        }
    }

    pub fn stop_tracking(&mut self, now: Instant) -> u64 {
        self.ticker.stop();
        self.state.end(now)
    }

    pub fn apply_tick(&mut self) -> Option<u64> {
        self.state.apply_tick()
    }

    pub fn reset(&mut self) {
        self.ticker.stop();
        self.state.reset();
    }
}
