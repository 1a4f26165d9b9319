//! Session typing: which kind of session a given index is and how long it lasts.
//!
//! Two policies are supported. `Uniform` treats every session as work and only
//! tracks breaks as incidental pause time. `Alternating` interleaves work and
//! break sessions, promoting every `cycle`-th break to a long break. They give
//! different record types and cycle totals, so the choice is explicit.

use serde::{Deserialize, Serialize};

use crate::utils::time::{MAX_SECONDS, MIN_SECONDS};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionPolicy {
    /// Every session is a work session of `preset.work` seconds.
    #[default]
    Uniform,
    /// Even indices are work, odd indices are breaks.
    Alternating,
}

/// Named bundle of durations, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: String,
    pub work: u32,
    pub short_break: u32,
    pub long_break: u32,
    /// Work sessions per long break.
    pub cycle: u32,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            name: "25/5/15".into(),
            work: 25 * 60,
            short_break: 5 * 60,
            long_break: 15 * 60,
            cycle: 4,
        }
    }
}

impl Preset {
    pub fn builtin() -> Vec<Preset> {
        vec![
            Preset::default(),
            Preset {
                name: "50/10/20".into(),
                work: 50 * 60,
                short_break: 10 * 60,
                long_break: 20 * 60,
                cycle: 3,
            },
        ]
    }

    fn effective_cycle(&self) -> u32 {
        self.cycle.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub kind: SessionKind,
    pub label: String,
    pub duration_secs: u32,
}

/// Pure and deterministic: same inputs, same session.
pub fn derive_session(index: u32, preset: &Preset, policy: SessionPolicy) -> SessionInfo {
    match policy {
        SessionPolicy::Uniform => SessionInfo {
            kind: SessionKind::Work,
            label: format!("Work Session {}", u64::from(index) + 1),
            duration_secs: preset.work,
        },
        SessionPolicy::Alternating => {
            let is_work = index % 2 == 0;
            let cycle_len = u64::from(preset.effective_cycle()) * 2;
            let is_long = !is_work && (u64::from(index) + 1) % cycle_len == 0;
            let (kind, label, duration_secs) = if is_work {
                (SessionKind::Work, "Work", preset.work)
            } else if is_long {
                (SessionKind::LongBreak, "Long break", preset.long_break)
            } else {
                (SessionKind::ShortBreak, "Short break", preset.short_break)
            };
            SessionInfo {
                kind,
                label: label.to_string(),
                duration_secs,
            }
        }
    }
}

pub fn derive_session_duration(index: u32, preset: &Preset, policy: SessionPolicy) -> u32 {
    derive_session(index, preset, policy).duration_secs
}

/// Seconds in one full cycle under the given policy.
pub fn cycle_total_seconds(preset: &Preset, policy: SessionPolicy) -> u64 {
    let cycle = u64::from(preset.effective_cycle());
    let work = u64::from(preset.work) * cycle;
    match policy {
        SessionPolicy::Uniform => work,
        SessionPolicy::Alternating => {
            work + u64::from(preset.short_break) * (cycle - 1) + u64::from(preset.long_break)
        }
    }
}

/// Fixed for the lifetime of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub index: u32,
    pub kind: SessionKind,
    pub label: String,
    pub duration_secs: u32,
    /// Pause time rolled over from the previous session.
    pub carryover_secs: u32,
}

impl SessionConfig {
    pub fn new(index: u32, info: SessionInfo, carryover_secs: u32) -> Self {
        Self {
            index,
            kind: info.kind,
            label: info.label,
            duration_secs: info.duration_secs,
            carryover_secs,
        }
    }

    /// Countdown length and progress denominator. Never zero.
    pub fn total_secs(&self) -> u32 {
        self.duration_secs
            .saturating_add(self.carryover_secs)
            .clamp(MIN_SECONDS, MAX_SECONDS)
    }
}
