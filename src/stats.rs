use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

use crate::models::{CompletedSessionRecord, SessionType};

/// Most recent records kept in the history.
pub const HISTORY_LIMIT: usize = 100;

/// Append-only sink for finished sessions. The engine never reads back.
pub trait StatsCollector: Send + Sync {
    fn append(&self, record: &CompletedSessionRecord) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionStats {
    pub completed_sessions: u64,
    pub total_work_time: u64,
    pub total_break_time: u64,
    pub total_pause_time: u64,
    pub session_history: Vec<CompletedSessionRecord>,
}

impl SessionStats {
    pub fn record(&mut self, record: &CompletedSessionRecord) {
        self.completed_sessions += 1;
        let duration = u64::from(record.duration_seconds);
        match record.session_type {
            SessionType::Work => self.total_work_time += duration,
            SessionType::Break => self.total_break_time += duration,
        }
        self.total_pause_time += record.pause_seconds;

        self.session_history.push(record.clone());
        if self.session_history.len() > HISTORY_LIMIT {
            let excess = self.session_history.len() - HISTORY_LIMIT;
            self.session_history.drain(..excess);
        }
    }
}

/// In-memory collector.
#[derive(Default)]
pub struct SessionHistory {
    inner: Mutex<SessionStats>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionStats {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StatsCollector for SessionHistory {
    fn append(&self, record: &CompletedSessionRecord) -> Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(record);
        Ok(())
    }
}
