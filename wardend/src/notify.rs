//! Bounded in-memory record of operator-facing events.
//!
//! The daemon has no attached UI; whatever it wants the operator to see is
//! kept here and surfaced through `/status`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub timestamp: u64,
    pub level: NoticeLevel,
    pub message: String,
}

pub struct NoticeStore {
    inner: Mutex<VecDeque<Notice>>,
    capacity: usize,
}

impl NoticeStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            timestamp: current_epoch_secs(),
            level,
            message: message.into(),
        };
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.len() == self.capacity {
            inner.pop_front();
        }
        inner.push_back(notice);
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<Notice> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.iter().rev().take(limit).cloned().collect()
    }
}

fn current_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
