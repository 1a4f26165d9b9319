pub mod audio;
pub mod models;
pub mod session;
pub mod settings;
pub mod stats;
pub mod timer;
pub mod utils;

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};

use audio::CuePlayer;
use settings::SettingsStore;
use stats::SessionHistory;
use timer::{commands, TimerCommand, TimerController, TimerEvent, TimerSnapshot};
use utils::time::format_time;

pub use models::{CompletedSessionRecord, SessionType};
pub use session::{Preset, SessionKind, SessionPolicy};
pub use settings::EngineSettings;
pub use stats::{SessionStats, StatsCollector};
pub use timer::{ClockStatus, ManualEdit};

const SETTINGS_ENV: &str = "POMODORO_SETTINGS";
const TICK_ENV: &str = "POMODORO_TICK_MS";
const DEFAULT_SETTINGS_FILE: &str = "pomodoro-settings.json";

/// Initialise logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

fn settings_path() -> PathBuf {
    env::var_os(SETTINGS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

fn tick_interval() -> Duration {
    match env::var(TICK_ENV) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => {
                warn!("Ignoring {TICK_ENV}={raw}; expected a positive number of milliseconds");
                timer::controller::DEFAULT_TICK_INTERVAL
            }
        },
        Err(_) => timer::controller::DEFAULT_TICK_INTERVAL,
    }
}

#[cfg(feature = "audio")]
fn cue_player() -> Arc<dyn CuePlayer> {
    Arc::new(audio::AudioCuePlayer::new())
}

#[cfg(not(feature = "audio"))]
fn cue_player() -> Arc<dyn CuePlayer> {
    Arc::new(audio::SilentCuePlayer)
}

fn print_snapshot(snapshot: &TimerSnapshot) {
    println!(
        "[{:?}] {} {} / {} (pause {}s)",
        snapshot.status,
        snapshot.label,
        format_time(snapshot.remaining_seconds),
        format_time(snapshot.duration_seconds),
        snapshot.pause_seconds,
    );
}

async fn print_events(mut events: broadcast::Receiver<TimerEvent>) {
    loop {
        match events.recv().await {
            Ok(TimerEvent::Tick {
                remaining_seconds, ..
            }) => println!("  {}", format_time(remaining_seconds)),
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => println!("{json}"),
                Err(err) => warn!("Failed to serialise event: {err}"),
            },
            Err(RecvError::Lagged(skipped)) => warn!("Event printer skipped {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Interactive front end: reads one command per line from stdin and prints
/// engine events as they arrive.
pub async fn run() -> Result<()> {
    init_logging();
    info!("Pomodoro engine starting up...");

    let store = SettingsStore::new(settings_path())?;
    let history = Arc::new(SessionHistory::new());
    let controller = TimerController::with_tick_interval(
        store.settings(),
        cue_player(),
        history.clone(),
        tick_interval(),
    );
    let printer = tokio::spawn(print_events(controller.subscribe()));

    print_snapshot(&controller.snapshot().await);

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "stats" => {
                let stats = history.snapshot();
                println!("{}", serde_json::to_string_pretty(&stats)?);
                continue;
            }
            "reload" => {
                match store.reload() {
                    Ok(settings) => {
                        let change = controller.update_settings(settings).await;
                        info!("Reloaded settings: {change:?}");
                    }
                    Err(err) => warn!("Failed to reload settings: {err:#}"),
                }
                continue;
            }
            _ => {}
        }

        match line.parse::<TimerCommand>() {
            Ok(command) => match commands::execute(&controller, &store, command).await {
                Ok(snapshot) => print_snapshot(&snapshot),
                Err(err) => eprintln!("error: {err}"),
            },
            Err(err) => eprintln!("error: {err}"),
        }
    }

    controller.shutdown().await;
    printer.abort();
    info!("Pomodoro engine stopped");
    Ok(())
}
