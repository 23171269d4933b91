//! Process state machine (spec.md §4.9 `ProcessStatus`).
//!
//! Transitions are driven externally (by `launcher`, `prober`, and
//! `restart`) rather than self-triggered — this type only records the
//! current state and rejects transitions the spec doesn't allow.

use std::fmt;

use chrono::{DateTime, Utc};

/// The supervised process's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    NotStarted,
    Starting,
    RunningHealthy,
    RunningUnhealthy,
    Stopped,
    Failed,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessState::NotStarted => "not_started",
            ProcessState::Starting => "starting",
            ProcessState::RunningHealthy => "running_healthy",
            ProcessState::RunningUnhealthy => "running_unhealthy",
            ProcessState::Stopped => "stopped",
            ProcessState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A point-in-time, JSON-serialisable copy of the supervised process's
/// status, served by the host runtime's own status surface (§4.9).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessStatus {
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub restart_count: u32,
    pub last_exit_code: Option<i32>,
    pub last_transition_at: DateTime<Utc>,
    pub consecutive_healthy_probes: u32,
    /// When the current run of the process started (spec.md §3 "start
    /// instant"). Reset on every `STARTING` transition, including restarts.
    pub started_at: Option<DateTime<Utc>>,
    /// When the most recent health probe completed (spec.md §3, "last
    /// health-probe instant").
    pub last_probe_at: Option<DateTime<Utc>>,
    /// Outcome of the most recent health probe (spec.md §3, "last
    /// health-probe message") — e.g. the response status or the error that
    /// made the probe fail.
    pub last_probe_message: Option<String>,
}

impl ProcessStatus {
    pub fn initial() -> Self {
        Self {
            state: ProcessState::NotStarted,
            pid: None,
            restart_count: 0,
            last_exit_code: None,
            last_transition_at: Utc::now(),
            consecutive_healthy_probes: 0,
            started_at: None,
            last_probe_at: None,
            last_probe_message: None,
        }
    }

    /// Records the outcome of a completed health probe (spec.md §4.9's
    /// probe policy). Independent of `transition_to`: a probe result is
    /// observed on every tick, whether or not it changes the state.
    pub fn record_probe(&mut self, message: impl Into<String>) {
        self.last_probe_at = Some(Utc::now());
        self.last_probe_message = Some(message.into());
    }

    /// Validates that `next` is a legal transition from the current state
    /// (spec.md §4.9's transition table). Illegal transitions are a no-op
    /// returning `false`, leaving `self` untouched.
    pub fn transition_to(&mut self, next: ProcessState) -> bool {
        let legal = match (self.state, next) {
            (ProcessState::NotStarted, ProcessState::Starting) => true,
            (ProcessState::Starting, ProcessState::RunningHealthy) => true,
            (ProcessState::Starting, ProcessState::RunningUnhealthy) => true,
            (ProcessState::Starting, ProcessState::Failed) => true,
            (ProcessState::RunningHealthy, ProcessState::RunningUnhealthy) => true,
            (ProcessState::RunningHealthy, ProcessState::Stopped) => true,
            (ProcessState::RunningHealthy, ProcessState::Failed) => true,
            (ProcessState::RunningUnhealthy, ProcessState::RunningHealthy) => true,
            (ProcessState::RunningUnhealthy, ProcessState::Starting) => true,
            (ProcessState::RunningUnhealthy, ProcessState::Stopped) => true,
            (ProcessState::RunningUnhealthy, ProcessState::Failed) => true,
            (ProcessState::Failed, ProcessState::Starting) => true,
            (ProcessState::Stopped, ProcessState::Starting) => true,
            _ => false,
        };
        if legal {
            self.state = next;
            self.last_transition_at = Utc::now();
            if next == ProcessState::Starting {
                self.started_at = Some(Utc::now());
            }
            if next == ProcessState::RunningHealthy {
                self.consecutive_healthy_probes = self.consecutive_healthy_probes.saturating_add(1);
            } else if next == ProcessState::RunningUnhealthy {
                self.consecutive_healthy_probes = 0;
            }
        }
        legal
    }

    /// Records another consecutive successful probe while already in
    /// `RUNNING_HEALTHY` — a same-state tick, not a transition, so it
    /// doesn't touch `last_transition_at` (§4.9: the state machine forbids
    /// implicit transitions; staying healthy isn't one).
    pub fn note_still_healthy(&mut self) {
        if self.state == ProcessState::RunningHealthy {
            self.consecutive_healthy_probes = self.consecutive_healthy_probes.saturating_add(1);
        }
    }
}
