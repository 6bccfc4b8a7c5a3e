//! Activity log: bounded, timestamped feed of what the monitor has seen
//! and done. The dashboard renders it; background loops append to it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

pub const DEFAULT_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Transport,
    Event,
    Fire,
    SilentReset,
    Selection,
    Error,
    Info,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogKind::Transport => "mqtt",
            LogKind::Event => "event",
            LogKind::Fire => "fire",
            LogKind::SilentReset => "reset",
            LogKind::Selection => "pick",
            LogKind::Error => "error",
            LogKind::Info => "info",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
}

#[derive(Clone)]
pub struct ActivityLog {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&self, kind: LogKind, message: impl Into<String>) {
        let entry = LogEntry {
            at: Utc::now(),
            kind,
            message: message.into(),
        };
        tracing::debug!("[Activity] {}: {}", entry.kind, entry.message);

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let log = ActivityLog::new(3);
        for i in 0..5 {
            log.push(LogKind::Event, format!("Received: {}", i));
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<_> = log.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["Received: 2", "Received: 3", "Received: 4"]);
    }

    #[test]
    fn recent_returns_newest_in_order() {
        let log = ActivityLog::default();
        log.push(LogKind::Info, "a");
        log.push(LogKind::Fire, "b");
        log.push(LogKind::SilentReset, "c");

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "b");
        assert_eq!(recent[1].kind, LogKind::SilentReset);
    }

    #[test]
    fn clones_share_entries() {
        let log = ActivityLog::new(10);
        let other = log.clone();
        other.push(LogKind::Transport, "Connected");
        assert!(!log.is_empty());
    }
}
