use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::session::{Preset, SessionPolicy};

/// Everything the engine needs from the settings layer. Partial JSON fills in
/// defaults field by field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub preset: Preset,
    pub policy: SessionPolicy,
    pub auto_start_next: bool,
    /// Seconds to wait before auto-starting the next session. Negative is read as zero.
    pub delay_next: i64,
    /// Roll a finished session's pause time into the next session's duration.
    pub carryover_pause: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            policy: SessionPolicy::default(),
            auto_start_next: true,
            delay_next: 0,
            carryover_pause: false,
        }
    }
}

impl EngineSettings {
    pub fn auto_start_delay(&self) -> Duration {
        Duration::from_secs(self.delay_next.max(0) as u64)
    }

    pub fn diff(&self, next: &EngineSettings) -> SettingsChange {
        SettingsChange {
            preset: self.preset != next.preset,
            policy: self.policy != next.policy,
            auto_start: self.auto_start_next != next.auto_start_next,
            delay: self.auto_start_delay() != next.auto_start_delay(),
            carryover: self.carryover_pause != next.carryover_pause,
        }
    }
}

/// Which settings fields differ between two versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub preset: bool,
    pub policy: bool,
    pub auto_start: bool,
    pub delay: bool,
    pub carryover: bool,
}

impl SettingsChange {
    /// Session derivation depends only on preset and policy.
    pub fn affects_session(&self) -> bool {
        self.preset || self.policy
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// JSON file backing for [`EngineSettings`].
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {}: {err}; using defaults",
                    path.display()
                );
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> EngineSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<SettingsChange> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let change = guard.diff(&settings);
        *guard = settings;
        self.persist(&guard)?;
        Ok(change)
    }

    pub fn reload(&self) -> Result<EngineSettings> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: EngineSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data.clone();
        Ok(data)
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "autoStartNext": false, "delayNext": -4 }"#).unwrap();
        assert!(!settings.auto_start_next);
        assert_eq!(settings.preset, Preset::default());
        assert_eq!(settings.auto_start_delay(), Duration::ZERO);
    }

    #[test]
    fn diff_flags_only_changed_fields() {
        let base = EngineSettings::default();
        let mut next = base.clone();
        next.delay_next = 3;
        let change = base.diff(&next);
        assert!(change.delay);
        assert!(!change.affects_session());

        next.preset.work = 50 * 60;
        assert!(base.diff(&next).affects_session());
        assert!(base.diff(&base).is_empty());
    }

    #[test]
    fn store_round_trips_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.settings(), EngineSettings::default());

        let mut updated = store.settings();
        updated.policy = SessionPolicy::Alternating;
        updated.carryover_pause = true;
        let change = store.update(updated.clone()).unwrap();
        assert!(change.policy && change.carryover);

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.settings(), updated);
        assert_eq!(reopened.reload().unwrap(), updated);
    }

    #[test]
    fn corrupt_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.settings(), EngineSettings::default());
        assert!(store.reload().is_err());
    }
}
