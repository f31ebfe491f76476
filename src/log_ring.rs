//! Bounded in-memory log ring (spec §4.1).
//!
//! A side sink the core owns itself, distinct from `tracing` output: every
//! call site emits to both, but neither is derived from the other.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
}

/// Fixed-capacity ring buffer. Appenders never await while holding the
/// lock, satisfying the concurrency discipline in spec §5.
pub struct LogRing {
    clock: Arc<dyn Clock>,
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogRing {
    pub fn new(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            clock,
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn append(&self, level: Level, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: self.clock.now(),
            level,
            message: message.into(),
        };
        match entry.level {
            Level::Debug => tracing::debug!("{}", entry.message),
            Level::Info => tracing::info!("{}", entry.message),
            Level::Warning => tracing::warn!("{}", entry.message),
            Level::Error => tracing::error!("{}", entry.message),
        }

        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Returns (up to) the `n` most recently appended entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
