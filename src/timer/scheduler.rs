use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// Delay between tearing down a tick stream and the next one starting.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickKind {
    /// Main countdown, active while running.
    Countdown,
    /// Pause accounting, active while paused.
    Pause,
}

/// One tick delivery. `generation` identifies the stream that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub kind: TickKind,
    pub generation: u64,
}

/// Recurring-timer capability. `stop` is best effort; callers that need a hard
/// guarantee wrap it in a [`TickSource`].
pub trait PeriodicScheduler: Send {
    fn start(&mut self, period: Duration, on_tick: Box<dyn FnMut() + Send + 'static>);
    fn stop(&mut self);
}

/// Runs the callback from a spawned tokio task. Must be started from inside a
/// runtime.
pub struct TokioScheduler {
    grace: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl TokioScheduler {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            handle: None,
            cancel_token: None,
        }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE)
    }
}

impl PeriodicScheduler for TokioScheduler {
    fn start(&mut self, period: Duration, mut on_tick: Box<dyn FnMut() + Send + 'static>) {
        self.stop();

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let first_tick = Instant::now() + self.grace + period;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(first_tick, period);
            // A throttled runtime catches up in a burst; the consumer clamps.
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => on_tick(),
                }
            }
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A scheduler plus a generation counter. Every start and stop bumps the
/// generation, so a tick that was already queued when the stream was stopped
/// no longer [`accepts`](TickSource::accepts) and is dropped by the consumer.
pub struct TickSource {
    kind: TickKind,
    generation: u64,
    active: bool,
    scheduler: Box<dyn PeriodicScheduler>,
    sink: mpsc::UnboundedSender<Tick>,
}

impl TickSource {
    pub fn new(
        kind: TickKind,
        scheduler: Box<dyn PeriodicScheduler>,
        sink: mpsc::UnboundedSender<Tick>,
    ) -> Self {
        Self {
            kind,
            generation: 0,
            active: false,
            scheduler,
            sink,
        }
    }

    /// Stops any current stream, then starts a fresh one.
    pub fn start(&mut self, period: Duration) -> u64 {
        self.stop();
        self.generation += 1;
        self.active = true;

        let tick = Tick {
            kind: self.kind,
            generation: self.generation,
        };
        let sink = self.sink.clone();
        self.scheduler.start(
            period,
            Box::new(move || {
                // Receiver gone means the controller shut down.
                let _ = sink.send(tick);
            }),
        );
        self.generation
    }

    pub fn stop(&mut self) {
        if self.active {
            self.scheduler.stop();
            self.active = false;
        }
        self.generation += 1;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn accepts(&self, tick: &Tick) -> bool {
        self.active && tick.kind == self.kind && tick.generation == self.generation
    }

    /// The tick the current stream would deliver, if one is running.
    pub fn current_tick(&self) -> Option<Tick> {
        self.active.then_some(Tick {
            kind: self.kind,
            generation: self.generation,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ManualScheduler;
    use super::*;

    fn source() -> (TickSource, ManualScheduler, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = ManualScheduler::default();
        let source = TickSource::new(TickKind::Countdown, Box::new(scheduler.clone()), tx);
        (source, scheduler, rx)
    }

    #[test]
    fn ticks_carry_current_generation() {
        let (mut source, scheduler, mut rx) = source();
        let generation = source.start(Duration::from_secs(1));

        assert!(scheduler.fire());
        let tick = rx.try_recv().unwrap();
        assert_eq!(tick.generation, generation);
        assert!(source.accepts(&tick));
    }

    #[test]
    fn queued_ticks_go_stale_after_stop() {
        let (mut source, scheduler, mut rx) = source();
        source.start(Duration::from_secs(1));
        scheduler.fire();
        source.stop();

        let late = rx.try_recv().unwrap();
        assert!(!source.accepts(&late));
        assert!(!scheduler.fire());
        assert_eq!(source.current_tick(), None);
    }

    #[test]
    fn restart_supersedes_previous_stream() {
        let (mut source, scheduler, mut rx) = source();
        source.start(Duration::from_secs(1));
        scheduler.fire();
        let old = rx.try_recv().unwrap();

        source.start(Duration::from_secs(1));
        assert_eq!(*scheduler.starts.lock().unwrap(), 2);
        assert!(!source.accepts(&old));

        scheduler.fire();
        let fresh = rx.try_recv().unwrap();
        assert!(source.accepts(&fresh));
    }

    #[test]
    fn rejects_ticks_of_other_kind() {
        let (mut source, _scheduler, _rx) = source();
        let generation = source.start(Duration::from_secs(1));
        assert!(!source.accepts(&Tick {
            kind: TickKind::Pause,
            generation,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_waits_out_grace_then_ticks_each_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = TickSource::new(
            TickKind::Pause,
            Box::new(TokioScheduler::new(Duration::from_millis(10))),
            tx,
        );
        source.start(Duration::from_secs(1));

        time::sleep(Duration::from_millis(1005)).await;
        assert!(rx.try_recv().is_err());

        time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        source.stop();
        time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
