//! State machine for tracking the phases of a publish run
//!
//! Phases advance strictly in order. The machine is in-memory only; a run
//! that dies halfway is rerun from scratch by the CI system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Phase of a publish run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Initial,
    PreflightFileGuard,
    ToolVerification,
    ConfigWrite,
    Authentication,
    WorkspaceDiscovery,
    VersionConflictCheck,
    Audit,
    Publish,
    Success,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::PreflightFileGuard => "preflight file guard",
            Self::ToolVerification => "tool verification",
            Self::ConfigWrite => "config write",
            Self::Authentication => "authentication",
            Self::WorkspaceDiscovery => "workspace discovery",
            Self::VersionConflictCheck => "version conflict check",
            Self::Audit => "audit",
            Self::Publish => "publish",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Phase transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseTransition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub timestamp: DateTime<Utc>,

    /// Error message when entering `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tracks the current phase and its history
#[derive(Debug)]
pub struct RunStateMachine {
    current: RunPhase,
    transitions: Vec<PhaseTransition>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            current: RunPhase::Initial,
            transitions: Vec::new(),
        }
    }

    /// Enter the next phase
    ///
    /// Returns `false` and stays put when `to` would move backwards or leave
    /// a terminal phase.
    pub fn transition(&mut self, to: RunPhase) -> bool {
        if self.current.is_terminal() || to <= self.current {
            return false;
        }

        self.record(to, None);
        true
    }

    /// Enter `Failed` from any non-terminal phase
    pub fn fail(&mut self, error: impl Into<String>) {
        if !self.current.is_terminal() {
            self.record(RunPhase::Failed, Some(error.into()));
        }
    }

    fn record(&mut self, to: RunPhase, error: Option<String>) {
        debug!(from = %self.current, to = %to, "phase transition");
        self.transitions.push(PhaseTransition {
            from: self.current,
            to,
            timestamp: Utc::now(),
            error,
        });
        self.current = to;
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// Phase that was active when the run failed
    pub fn failed_phase(&self) -> Option<RunPhase> {
        self.transitions
            .iter()
            .rev()
            .find(|t| t.to == RunPhase::Failed)
            .map(|t| t.from)
    }

    /// Log the history with elapsed time per phase
    pub fn log_history(&self) {
        for pair in self.transitions.windows(2) {
            let elapsed = pair[1].timestamp - pair[0].timestamp;
            debug!(
                phase = %pair[0].to,
                elapsed_ms = elapsed.num_milliseconds(),
                "phase completed"
            );
        }

        if let Some(last) = self.transitions.last() {
            debug!(
                state = %last.to,
                error = last.error.as_deref().unwrap_or(""),
                "run finished"
            );
        }
    }
}
