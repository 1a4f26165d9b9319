use std::{fs, sync::Arc, time::Duration};

use pomodoro_engine::{
    audio::SilentCuePlayer,
    settings::SettingsStore,
    stats::SessionHistory,
    timer::{TimerController, TimerEvent},
    ClockStatus, EngineSettings, Preset, SessionKind, SessionPolicy, SessionType,
};
use tokio::time;

fn preset(work: u32, short_break: u32, long_break: u32, cycle: u32) -> Preset {
    Preset {
        name: "test".into(),
        work,
        short_break,
        long_break,
        cycle,
    }
}

fn controller(settings: EngineSettings) -> (TimerController, Arc<SessionHistory>) {
    let history = Arc::new(SessionHistory::new());
    let controller = TimerController::new(settings, Arc::new(SilentCuePlayer), history.clone());
    (controller, history)
}

async fn advance(secs: f64) {
    time::sleep(Duration::from_secs_f64(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn alternating_cycle_runs_unattended() {
    let (controller, history) = controller(EngineSettings {
        preset: preset(3, 2, 4, 2),
        policy: SessionPolicy::Alternating,
        auto_start_next: true,
        delay_next: 0,
        ..EngineSettings::default()
    });

    controller.start().await;
    // work 3s, short break 2s, work 3s, long break 4s
    advance(12.5).await;

    let stats = history.snapshot();
    assert_eq!(stats.completed_sessions, 4);
    let types: Vec<SessionType> = stats
        .session_history
        .iter()
        .map(|r| r.session_type)
        .collect();
    assert_eq!(
        types,
        vec![
            SessionType::Work,
            SessionType::Break,
            SessionType::Work,
            SessionType::Break
        ]
    );
    let durations: Vec<u32> = stats
        .session_history
        .iter()
        .map(|r| r.duration_seconds)
        .collect();
    assert_eq!(durations, vec![3, 2, 3, 4]);
    assert_eq!(stats.total_work_time, 6);
    assert_eq!(stats.total_break_time, 6);

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.session_index, 4);
    assert_eq!(snapshot.session_kind, SessionKind::Work);
    assert_eq!(snapshot.status, ClockStatus::Running);
    assert_eq!(snapshot.remaining_seconds, 3);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn paused_time_is_recorded_and_carried_over() {
    let (controller, history) = controller(EngineSettings {
        preset: preset(5, 1, 1, 4),
        auto_start_next: false,
        carryover_pause: true,
        ..EngineSettings::default()
    });
    let mut events = controller.subscribe();

    controller.start().await;
    advance(2.5).await;
    assert_eq!(controller.pause().await.remaining_seconds, 3);
    advance(4.0).await;

    let resumed = controller.start().await;
    assert_eq!(resumed.status, ClockStatus::Running);
    assert_eq!(resumed.pause_seconds, 4);

    advance(3.5).await;

    let stats = history.snapshot();
    assert_eq!(stats.completed_sessions, 1);
    assert_eq!(stats.session_history[0].duration_seconds, 5);
    assert_eq!(stats.session_history[0].pause_seconds, 4);
    assert_eq!(stats.total_pause_time, 4);

    let next = controller.snapshot().await;
    assert_eq!(next.session_index, 1);
    assert_eq!(next.status, ClockStatus::Idle);
    assert_eq!(next.carryover_seconds, 4);
    assert_eq!(next.duration_seconds, 9);
    assert_eq!(next.remaining_seconds, 9);
    assert_eq!(next.pause_seconds, 0);

    let mut completions = 0;
    let mut pause_ticks = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            TimerEvent::SessionComplete { record } => {
                completions += 1;
                assert_eq!(record.pause_seconds, 4);
            }
            TimerEvent::PauseTick { .. } => pause_ticks += 1,
            _ => {}
        }
    }
    assert_eq!(completions, 1);
    assert_eq!(pause_ticks, 3);
}

#[tokio::test(start_paused = true)]
async fn settings_file_drives_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(
        &path,
        r#"{ "preset": { "name": "short", "work": 120, "shortBreak": 30, "longBreak": 60, "cycle": 2 }, "autoStartNext": false }"#,
    )
    .unwrap();

    let store = SettingsStore::new(path.clone()).unwrap();
    let (controller, _history) = controller(store.settings());
    assert_eq!(controller.snapshot().await.remaining_seconds, 120);

    let mut next = store.settings();
    next.preset = Preset::builtin()[1].clone();
    let stored = store.update(next.clone()).unwrap();
    assert!(stored.preset);

    let applied = controller.update_settings(next).await;
    assert!(applied.affects_session());
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.remaining_seconds, 3000);
    assert_eq!(snapshot.status, ClockStatus::Idle);

    let reloaded = SettingsStore::new(path).unwrap().settings();
    assert_eq!(reloaded.preset.name, "50/10/20");
    assert!(!reloaded.auto_start_next);
}

#[tokio::test(start_paused = true)]
async fn text_edit_then_completion() {
    let (controller, history) = controller(EngineSettings {
        auto_start_next: false,
        ..EngineSettings::default()
    });

    controller.set_manual_time_text("0:03").await.unwrap();
    assert!(controller.set_manual_time_text("9:00:00").await.is_err());
    assert_eq!(controller.snapshot().await.remaining_seconds, 3);

    controller.start().await;
    advance(3.5).await;

    let stats = history.snapshot();
    assert_eq!(stats.completed_sessions, 1);
    assert_eq!(stats.session_history[0].duration_seconds, 1500);
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.session_index, 1);
    assert_eq!(snapshot.remaining_seconds, 1500);
    assert!(!snapshot.manual_override);
}
