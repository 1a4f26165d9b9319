use std::str::FromStr;

use crate::{
    session::Preset,
    settings::SettingsStore,
    timer::{ClockStatus, TimerController, TimerSnapshot},
    utils::time::validate_seconds,
};

const PRESET_USAGE: &str =
    "usage: preset <25/5/15 | 50/10/20> or preset custom <work> <short> <long> <cycle> (minutes)";

/// Inbound commands from a UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Pause,
    /// Start when idle or paused, pause when running.
    Toggle,
    Reset,
    Skip,
    SetTime(String),
    /// Switch to a built-in or custom preset and persist it.
    SetPreset(Preset),
    Status,
}

impl FromStr for TimerCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (verb, rest) = match input.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (input, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "start" | "resume" => Ok(TimerCommand::Start),
            "pause" => Ok(TimerCommand::Pause),
            "toggle" | "t" => Ok(TimerCommand::Toggle),
            "reset" => Ok(TimerCommand::Reset),
            "skip" | "next" => Ok(TimerCommand::Skip),
            "set" if rest.is_empty() => Err("usage: set <MM:SS | HH:MM:SS | minutes>".into()),
            "set" => Ok(TimerCommand::SetTime(rest.to_string())),
            "preset" => parse_preset(rest).map(TimerCommand::SetPreset),
            "status" | "s" => Ok(TimerCommand::Status),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

fn parse_preset(args: &str) -> Result<Preset, String> {
    let mut words = args.split_whitespace();
    match words.next() {
        None => Err(PRESET_USAGE.into()),
        Some(name) if name.eq_ignore_ascii_case("custom") => {
            let values = words
                .map(|w| w.parse::<u32>().map_err(|_| format!("'{w}' is not a number")))
                .collect::<Result<Vec<_>, _>>()?;
            let &[work, short_break, long_break, cycle] = values.as_slice() else {
                return Err(PRESET_USAGE.into());
            };
            let minutes = |value: u32| {
                validate_seconds(i64::from(value) * 60).map_err(|e| e.to_string())
            };
            if cycle == 0 {
                return Err("cycle must be at least 1".into());
            }
            Ok(Preset {
                name: format!("{work}/{short_break}/{long_break}"),
                work: minutes(work)?,
                short_break: minutes(short_break)?,
                long_break: minutes(long_break)?,
                cycle,
            })
        }
        Some(name) => Preset::builtin()
            .into_iter()
            .find(|preset| preset.name == name)
            .ok_or_else(|| format!("unknown preset '{name}'; {PRESET_USAGE}")),
    }
}

pub async fn get_timer_state(controller: &TimerController) -> Result<TimerSnapshot, String> {
    Ok(controller.snapshot().await)
}

pub async fn start_timer(controller: &TimerController) -> Result<TimerSnapshot, String> {
    Ok(controller.start().await)
}

pub async fn pause_timer(controller: &TimerController) -> Result<TimerSnapshot, String> {
    Ok(controller.pause().await)
}

pub async fn toggle_timer(controller: &TimerController) -> Result<TimerSnapshot, String> {
    match controller.snapshot().await.status {
        ClockStatus::Running => pause_timer(controller).await,
        ClockStatus::Idle | ClockStatus::Paused | ClockStatus::Completed => {
            start_timer(controller).await
        }
    }
}

pub async fn reset_timer(controller: &TimerController) -> Result<TimerSnapshot, String> {
    Ok(controller.reset().await)
}

pub async fn skip_session(controller: &TimerController) -> Result<TimerSnapshot, String> {
    Ok(controller.skip().await)
}

pub async fn set_timer_time(
    controller: &TimerController,
    input: &str,
) -> Result<TimerSnapshot, String> {
    controller
        .set_manual_time_text(input)
        .await
        .map_err(|e| e.to_string())?;
    Ok(controller.snapshot().await)
}

/// Saves the preset first, so a failed write leaves the engine as it was.
pub async fn set_preset(
    controller: &TimerController,
    store: &SettingsStore,
    preset: Preset,
) -> Result<TimerSnapshot, String> {
    let mut settings = controller.settings().await;
    settings.preset = preset;
    store.update(settings.clone()).map_err(|e| e.to_string())?;
    controller.update_settings(settings).await;
    Ok(controller.snapshot().await)
}

pub async fn execute(
    controller: &TimerController,
    store: &SettingsStore,
    command: TimerCommand,
) -> Result<TimerSnapshot, String> {
    match command {
        TimerCommand::Start => start_timer(controller).await,
        TimerCommand::Pause => pause_timer(controller).await,
        TimerCommand::Toggle => toggle_timer(controller).await,
        TimerCommand::Reset => reset_timer(controller).await,
        TimerCommand::Skip => skip_session(controller).await,
        TimerCommand::SetTime(input) => set_timer_time(controller, &input).await,
        TimerCommand::SetPreset(preset) => set_preset(controller, store, preset).await,
        TimerCommand::Status => get_timer_state(controller).await,
    }
}
