//! Log capture ring buffer (spec.md §4.8).
//!
//! The teacher's shared-memory ring buffer
//! (`router-api::module::memory_log::core`) solves cross-process IPC with
//! hand-rolled atomics and `unsafe` `mmap`; this supervisor's log buffer is
//! in-process only, so the same fixed-capacity-with-oldest-eviction
//! discipline (plus its overflow counter) is kept but implemented safely
//! over a `VecDeque` behind a read-write lock, matching `EndpointRegistry`'s
//! lock shape rather than the teacher's shared-memory one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Which of the child's standard streams a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTag {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: StreamTag,
    pub text: String,
}

/// Fixed-capacity FIFO. Writes past capacity drop the oldest line
/// (§4.8); `tail(n)` is O(n) and returns newest-first.
pub struct LogBuffer {
    capacity: usize,
    lines: RwLock<VecDeque<LogLine>>,
    overflow_count: AtomicUsize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: RwLock::new(VecDeque::with_capacity(capacity.max(1))),
            overflow_count: AtomicUsize::new(0),
        }
    }

    pub fn append(&self, stream: StreamTag, text: impl Into<String>) {
        let mut guard = self.lines.write();
        if guard.len() == self.capacity {
            guard.pop_front();
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        }
        guard.push_back(LogLine {
            timestamp: Utc::now(),
            stream,
            text: text.into(),
        });
    }

    /// Lines dropped to stay within capacity since construction (or the
    /// last [`Self::clear`]). Not part of spec.md's `LogBuffer` contract but
    /// carried over from the teacher's shared-memory ring buffer, which
    /// tracks the same count for the same reason: a diagnostic signal for
    /// "this process is noisier than the buffer can hold."
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// The most recent `n` lines, newest-first.
    pub fn tail(&self, n: usize) -> Vec<LogLine> {
        let guard = self.lines.read();
        guard.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lines.write().clear();
        self.overflow_count.store(0, Ordering::Relaxed);
    }
}
