use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::CuePlayer,
    models::CompletedSessionRecord,
    session::{derive_session, SessionConfig, SessionKind},
    settings::{EngineSettings, SettingsChange},
    stats::StatsCollector,
    utils::time::{parse_time_input, validate_seconds, TimeInputError},
};

use super::{
    pause::PauseAccountant,
    scheduler::{Tick, TickKind, TickSource, TokioScheduler},
    state::{ClockStatus, ManualEdit, SessionClock, TickOutcome},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: ClockStatus,
    pub session_index: u32,
    pub session_kind: SessionKind,
    pub label: String,
    pub duration_seconds: u32,
    pub carryover_seconds: u32,
    pub remaining_seconds: u32,
    pub baseline_seconds: u32,
    pub progress: f64,
    pub pause_seconds: u64,
    pub manual_override: bool,
    pub auto_start_pending: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(
    tag = "event",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum TimerEvent {
    Tick {
        remaining_seconds: u32,
        progress: f64,
    },
    PauseTick {
        pause_seconds: u64,
    },
    StateChanged {
        status: ClockStatus,
    },
    SessionComplete {
        record: CompletedSessionRecord,
    },
    SessionChanged {
        session_index: u32,
        label: String,
        duration_seconds: u32,
    },
}

struct EngineState {
    settings: EngineSettings,
    config: SessionConfig,
    clock: SessionClock,
    pause: PauseAccountant,
    /// Pause time waiting to be folded into the next session.
    pending_carryover: u32,
    manual_override: bool,
    auto_start: Option<CancellationToken>,
}

/// Sequences sessions around a [`SessionClock`] and a [`PauseAccountant`].
///
/// Cheap to clone; every clone drives the same engine. Ticks from both tick
/// sources arrive on one channel and are applied by a single driver task, so
/// state changes are serialised through the inner mutex.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<EngineState>>,
    cue: Arc<dyn CuePlayer>,
    stats: Arc<dyn StatsCollector>,
    events: broadcast::Sender<TimerEvent>,
    shutdown: CancellationToken,
}

impl TimerController {
    /// Must be called from inside a tokio runtime.
    pub fn new(
        settings: EngineSettings,
        cue: Arc<dyn CuePlayer>,
        stats: Arc<dyn StatsCollector>,
    ) -> Self {
        Self::with_tick_interval(settings, cue, stats, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(
        settings: EngineSettings,
        cue: Arc<dyn CuePlayer>,
        stats: Arc<dyn StatsCollector>,
        tick_interval: Duration,
    ) -> Self {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let config = session_config(0, &settings, 0);

        let clock = SessionClock::new(
            config.total_secs(),
            TickSource::new(
                TickKind::Countdown,
                Box::new(TokioScheduler::default()),
                tick_tx.clone(),
            ),
            tick_interval,
        );
        let pause = PauseAccountant::new(
            TickSource::new(TickKind::Pause, Box::new(TokioScheduler::default()), tick_tx),
            tick_interval,
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let controller = Self {
            state: Arc::new(Mutex::new(EngineState {
                settings,
                config,
                clock,
                pause,
                pending_carryover: 0,
                manual_override: false,
                auto_start: None,
            })),
            cue,
            stats,
            events,
            shutdown: CancellationToken::new(),
        };
        controller.spawn_tick_driver(tick_rx);
        controller
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let state = self.state.lock().await;
        snapshot_of(&state)
    }

    pub async fn settings(&self) -> EngineSettings {
        self.state.lock().await.settings.clone()
    }

    /// Starts an idle session or resumes a paused one.
    pub async fn start(&self) -> TimerSnapshot {
        let mut state = self.state.lock().await;
        self.settle_completed(&mut state);
        self.start_locked(&mut state);
        snapshot_of(&state)
    }

    pub async fn pause(&self) -> TimerSnapshot {
        let mut state = self.state.lock().await;
        if !self.settle_completed(&mut state) && state.clock.pause() {
            state.pause.start_tracking(Instant::now());
            log_info!(
                "paused session {} at {}s remaining",
                state.config.index,
                state.clock.state().remaining_secs
            );
            self.emit(TimerEvent::StateChanged {
                status: ClockStatus::Paused,
            });
        }
        snapshot_of(&state)
    }

    /// Back to idle at the session's full duration with pause time cleared.
    pub async fn reset(&self) -> TimerSnapshot {
        let mut state = self.state.lock().await;
        if !self.settle_completed(&mut state) {
            self.reload_clock(&mut state);
            log_info!("reset session {}", state.config.index);
            self.emit(TimerEvent::StateChanged {
                status: ClockStatus::Idle,
            });
            self.emit_tick(&state);
        }
        snapshot_of(&state)
    }

    /// Moves on to the next session without recording the current one.
    pub async fn skip(&self) -> TimerSnapshot {
        let mut state = self.state.lock().await;
        if !self.settle_completed(&mut state) {
            state.clock.stop_ticking();
            state.pause.reset();
            state.pending_carryover = 0;
            log_info!("skipped session {}", state.config.index);
            self.advance_session(&mut state);
        }
        snapshot_of(&state)
    }

    /// Overrides the remaining time. Out-of-range values are rejected and
    /// leave the engine untouched.
    pub async fn set_manual_time(&self, seconds: i64) -> Result<ManualEdit, TimeInputError> {
        let seconds = validate_seconds(seconds)?;
        let mut state = self.state.lock().await;
        self.settle_completed(&mut state);
        Ok(self.apply_manual_time(&mut state, seconds))
    }

    /// Same as [`set_manual_time`](Self::set_manual_time) for `MM:SS`,
    /// `HH:MM:SS`, or bare-number text.
    pub async fn set_manual_time_text(&self, input: &str) -> Result<ManualEdit, TimeInputError> {
        let seconds = parse_time_input(input)?;
        let mut state = self.state.lock().await;
        self.settle_completed(&mut state);
        Ok(self.apply_manual_time(&mut state, seconds))
    }

    /// Applies new settings. The clock is only reloaded when the derived
    /// session actually changes, and never underneath a running manual override.
    pub async fn update_settings(&self, settings: EngineSettings) -> SettingsChange {
        let mut state = self.state.lock().await;
        let change = state.settings.diff(&settings);
        if change.is_empty() {
            return change;
        }
        state.settings = settings;
        log_debug!("settings changed: {:?}", change);

        if change.auto_start && !state.settings.auto_start_next {
            self.settle_completed(&mut state);
        }

        if change.affects_session() {
            let config = session_config(
                state.config.index,
                &state.settings,
                state.config.carryover_secs,
            );
            if config != state.config {
                state.config = config;
                let status = state.clock.status();
                let keep_override = status == ClockStatus::Running && state.manual_override;
                if !keep_override && status != ClockStatus::Completed {
                    let total = state.config.total_secs();
                    state.clock.rebase(total);
                    state.pause.reset();
                    if status == ClockStatus::Paused {
                        state.pause.start_tracking(Instant::now());
                    }
                    state.manual_override = false;
                }
                self.emit_session_changed(&state);
                self.emit_tick(&state);
            }
        }

        change
    }

    /// Applies one tick. Ticks from a stopped or restarted stream are dropped.
    pub async fn handle_tick(&self, tick: Tick) {
        let completed = {
            let mut state = self.state.lock().await;
            match tick.kind {
                TickKind::Pause => {
                    if state.pause.accepts(&tick) {
                        if let Some(pause_seconds) = state.pause.apply_tick() {
                            self.emit(TimerEvent::PauseTick { pause_seconds });
                        }
                    }
                    None
                }
                TickKind::Countdown if !state.clock.accepts(&tick) => {
                    log_debug!("dropping stale countdown tick {}", tick.generation);
                    None
                }
                TickKind::Countdown => match state.clock.apply_tick() {
                    TickOutcome::Counted { .. } => {
                        self.emit_tick(&state);
                        None
                    }
                    TickOutcome::Completed => Some(self.finish_session(&mut state)),
                    TickOutcome::Ignored => None,
                },
            }
        };

        if let Some(record) = completed {
            self.dispatch_completion(record).await;
        }
    }

    /// Stops every tick stream and any pending auto-start. The controller is
    /// inert afterwards.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut state = self.state.lock().await;
        if let Some(token) = state.auto_start.take() {
            token.cancel();
        }
        state.clock.stop_ticking();
        state.pause.stop_tracking(Instant::now());
        self.cue.stop();
        log_info!("timer controller shut down");
    }

    fn spawn_tick_driver(&self, mut tick_rx: mpsc::UnboundedReceiver<Tick>) {
        let weak_state: Weak<Mutex<EngineState>> = Arc::downgrade(&self.state);
        let cue = self.cue.clone();
        let stats = self.stats.clone();
        let events = self.events.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let tick = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    tick = tick_rx.recv() => match tick {
                        Some(tick) => tick,
                        None => break,
                    },
                };

                // Every handle dropped: nothing left to drive.
                let Some(state) = weak_state.upgrade() else {
                    break;
                };
                let controller = TimerController {
                    state,
                    cue: cue.clone(),
                    stats: stats.clone(),
                    events: events.clone(),
                    shutdown: shutdown.clone(),
                };
                controller.handle_tick(tick).await;
            }
            log_debug!("tick driver stopped");
        });
    }

    fn start_locked(&self, state: &mut EngineState) {
        let resuming = match state.clock.status() {
            ClockStatus::Idle => false,
            ClockStatus::Paused => true,
            ClockStatus::Running | ClockStatus::Completed => return,
        };

        let reconciled = state.pause.stop_tracking(Instant::now());
        if !state.clock.start() {
            return;
        }

        if resuming {
            log_info!(
                "resumed session {} ({}s paused so far, {}s reconciled)",
                state.config.index,
                state.pause.accrued_secs(),
                reconciled
            );
        } else {
            log_info!(
                "started session {} ({}s)",
                state.config.index,
                state.clock.state().remaining_secs
            );
        }
        self.emit(TimerEvent::StateChanged {
            status: ClockStatus::Running,
        });
    }

    fn apply_manual_time(&self, state: &mut EngineState, seconds: u32) -> ManualEdit {
        let paused = state.clock.status() == ClockStatus::Paused;
        let edit = state.clock.set_manual_time(seconds);
        match edit {
            ManualEdit::Major => {
                state.pause.reset();
                if paused {
                    state.pause.start_tracking(Instant::now());
                }
            }
            // The open pause interval survives a minor edit; only its tick
            // stream is replaced.
            ManualEdit::Minor if paused => state.pause.restart_ticker(),
            ManualEdit::Minor => {}
        }
        state.manual_override = true;

        log_info!(
            "manual time {}s on session {} ({:?})",
            seconds,
            state.config.index,
            edit
        );
        self.emit_tick(state);
        edit
    }

    /// Builds the record at the instant the countdown hit zero.
    fn finish_session(&self, state: &mut EngineState) -> CompletedSessionRecord {
        let record = CompletedSessionRecord {
            session_type: state.config.kind.into(),
            duration_seconds: state.config.total_secs(),
            pause_seconds: state.pause.accrued_secs(),
            completed_at: Utc::now(),
        };

        state.pending_carryover = if state.settings.carryover_pause {
            u32::try_from(record.pause_seconds).unwrap_or(u32::MAX)
        } else {
            0
        };

        log_info!(
            "session {} complete ({}s, {}s paused)",
            state.config.index,
            record.duration_seconds,
            record.pause_seconds
        );
        self.emit_tick(state);
        record
    }

    async fn dispatch_completion(&self, record: CompletedSessionRecord) {
        if let Err(err) = self.cue.play_completion_cue() {
            log_warn!("completion cue failed: {err:#}");
        }
        if let Err(err) = self.stats.append(&record) {
            log_error!("failed to record completed session: {err:#}");
        }
        self.emit(TimerEvent::SessionComplete { record });
        self.emit(TimerEvent::StateChanged {
            status: ClockStatus::Completed,
        });

        let mut state = self.state.lock().await;
        // A command may have settled the session while the lock was released.
        if state.clock.status() != ClockStatus::Completed {
            return;
        }
        if state.settings.auto_start_next {
            self.schedule_auto_start(&mut state);
        } else {
            self.advance_session(&mut state);
        }
    }

    fn schedule_auto_start(&self, state: &mut EngineState) {
        let token = CancellationToken::new();
        if let Some(previous) = state.auto_start.replace(token.clone()) {
            previous.cancel();
        }

        let delay = state.settings.auto_start_delay();
        let expected_index = state.config.index;
        let controller = self.clone();
        log_info!("next session starts in {}s", delay.as_secs());

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = time::sleep(delay) => {}
            }
            controller.run_auto_start(token, expected_index).await;
        });
    }

    async fn run_auto_start(&self, token: CancellationToken, expected_index: u32) {
        let mut state = self.state.lock().await;
        if token.is_cancelled()
            || state.config.index != expected_index
            || state.clock.status() != ClockStatus::Completed
        {
            log_debug!("auto-start for session {} superseded", expected_index);
            return;
        }
        state.auto_start = None;
        self.advance_session(&mut state);
        self.start_locked(&mut state);
    }

    /// Ends the post-completion window: cancels a pending auto-start and moves
    /// to the next session, idle. Returns whether there was a window to end.
    fn settle_completed(&self, state: &mut EngineState) -> bool {
        if state.clock.status() != ClockStatus::Completed {
            return false;
        }
        if let Some(token) = state.auto_start.take() {
            token.cancel();
        }
        self.advance_session(state);
        true
    }

    fn advance_session(&self, state: &mut EngineState) {
        let index = state.config.index.saturating_add(1);
        let carryover = std::mem::take(&mut state.pending_carryover);
        state.config = session_config(index, &state.settings, carryover);
        self.reload_clock(state);

        log_info!(
            "session {} ready: {} ({}s{})",
            index,
            state.config.label,
            state.config.total_secs(),
            if carryover > 0 {
                format!(", {carryover}s carried over")
            } else {
                String::new()
            }
        );
        self.emit_session_changed(state);
        self.emit(TimerEvent::StateChanged {
            status: ClockStatus::Idle,
        });
        self.emit_tick(state);
    }

    fn reload_clock(&self, state: &mut EngineState) {
        let total = state.config.total_secs();
        state.clock.load(total);
        state.pause.reset();
        state.manual_override = false;
    }

    fn emit_tick(&self, state: &EngineState) {
        let clock = state.clock.state();
        self.emit(TimerEvent::Tick {
            remaining_seconds: clock.remaining_secs,
            progress: clock.progress(),
        });
    }

    fn emit_session_changed(&self, state: &EngineState) {
        self.emit(TimerEvent::SessionChanged {
            session_index: state.config.index,
            label: state.config.label.clone(),
            duration_seconds: state.config.total_secs(),
        });
    }

    fn emit(&self, event: TimerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn session_config(index: u32, settings: &EngineSettings, carryover_secs: u32) -> SessionConfig {
    SessionConfig::new(
        index,
        derive_session(index, &settings.preset, settings.policy),
        carryover_secs,
    )
}

fn snapshot_of(state: &EngineState) -> TimerSnapshot {
    let clock = state.clock.state();
    TimerSnapshot {
        status: clock.status,
        session_index: state.config.index,
        session_kind: state.config.kind,
        label: state.config.label.clone(),
        duration_seconds: state.config.total_secs(),
        carryover_seconds: state.config.carryover_secs,
        remaining_seconds: clock.remaining_secs,
        baseline_seconds: clock.baseline_secs,
        progress: clock.progress(),
        pause_seconds: state.pause.accrued_secs(),
        manual_override: state.manual_override,
        auto_start_pending: state.auto_start.is_some(),
    }
}
