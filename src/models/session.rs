use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionKind;

/// Category a finished session is counted under in statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionType {
    Work,
    Break,
}

impl From<SessionKind> for SessionType {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Work => SessionType::Work,
            SessionKind::ShortBreak | SessionKind::LongBreak => SessionType::Break,
        }
    }
}

/// Emitted once when a session runs down to zero. The engine keeps no copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSessionRecord {
    #[serde(rename = "type")]
    pub session_type: SessionType,
    /// Full session length including any carried-over pause time.
    pub duration_seconds: u32,
    pub pause_seconds: u64,
    pub completed_at: DateTime<Utc>,
}
