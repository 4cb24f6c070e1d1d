//! Progress state machine for one analysis run
//!
//! ```text
//! Idle -> Starting -> SearchingWeb -> Analyzing -> Saving -> Complete
//!                                                        \-> Failed
//! ```
//!
//! States only move forward. Complete and Failed are terminal: every later
//! event is ignored, so stray network data cannot revive a finished run.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{Linked, PlagiarismReport, SavedProject, StreamEvent};

use crate::error::{EngineError, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    Starting,
    SearchingWeb,
    Analyzing,
    Saving,
    Complete,
    Failed,
}

impl AnalysisState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisState::Complete | AnalysisState::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            AnalysisState::Idle => 0,
            AnalysisState::Starting => 1,
            AnalysisState::SearchingWeb => 2,
            AnalysisState::Analyzing => 3,
            AnalysisState::Saving => 4,
            AnalysisState::Complete | AnalysisState::Failed => 5,
        }
    }
}

impl std::fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnalysisState::Idle => "idle",
            AnalysisState::Starting => "starting",
            AnalysisState::SearchingWeb => "searching_web",
            AnalysisState::Analyzing => "analyzing",
            AnalysisState::Saving => "saving",
            AnalysisState::Complete => "complete",
            AnalysisState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a run ended in `Failed`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The analyzer reported an error step
    Remote {
        step: String,
        message: Option<String>,
    },
    /// Reading the stream failed
    Transport { message: String },
    /// The caller aborted the run or its time budget ran out
    Cancelled { reason: String },
    /// The stream ended without a terminal event
    Incomplete,
}

impl From<&FailureReason> for EngineError {
    fn from(reason: &FailureReason) -> Self {
        match reason {
            FailureReason::Remote { step, message } => EngineError::Remote {
                step: step.clone(),
                message: message
                    .clone()
                    .unwrap_or_else(|| format!("analyzer reported {}", step)),
            },
            FailureReason::Transport { message } => EngineError::Transport(message.clone()),
            FailureReason::Cancelled { reason } => EngineError::Cancelled(reason.clone()),
            FailureReason::Incomplete => EngineError::Incomplete,
        }
    }
}

/// Observable status of a run. Only [`ReportStateMachine`] mutates it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisStatus {
    pub state: AnalysisState,
    pub message: Option<String>,
    /// Search queries reported so far; cleared on completion
    pub searches: Vec<String>,
    /// Raw `data.data` of the `analysis_complete` event
    pub report: Option<Value>,
    pub saved_project: Option<Linked<SavedProject>>,
    pub failure: Option<FailureReason>,
    pub events_applied: usize,
}

impl AnalysisStatus {
    fn idle() -> Self {
        Self {
            state: AnalysisState::Idle,
            message: None,
            searches: Vec::new(),
            report: None,
            saved_project: None,
            failure: None,
            events_applied: 0,
        }
    }

    /// Decode the stored payload as a plagiarism report.
    pub fn plagiarism_report(&self) -> Result<PlagiarismReport, EngineError> {
        let payload = self.report.as_ref().ok_or(EngineError::NoReport)?;
        PlagiarismReport::deserialize(payload)
            .map_err(|e| EngineError::InvalidReport(e.to_string()))
    }
}

/// Result of feeding one event or failure to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The run is terminal; nothing changed
    Ignored,
    Applied {
        from: AnalysisState,
        to: AnalysisState,
    },
}

impl Transition {
    /// True when this transition moved the machine into `state`
    pub fn entered(&self, state: AnalysisState) -> bool {
        matches!(self, Transition::Applied { from, to } if *to == state && *from != state)
    }
}

enum StepKind {
    Starting,
    WebSearch,
    Error,
    Saved,
    Complete,
    Progress,
}

impl StepKind {
    fn of(step: &str) -> Self {
        match step {
            "starting" => StepKind::Starting,
            "web_search_performed" => StepKind::WebSearch,
            "database_saved" => StepKind::Saved,
            "analysis_complete" => StepKind::Complete,
            s if s.contains("error") => StepKind::Error,
            _ => StepKind::Progress,
        }
    }
}

pub struct ReportStateMachine {
    status: AnalysisStatus,
    terminal_at: Option<Instant>,
    reset_grace: Duration,
}

impl ReportStateMachine {
    pub fn new(reset_grace: Duration) -> Self {
        Self {
            status: AnalysisStatus::idle(),
            terminal_at: None,
            reset_grace,
        }
    }

    pub fn status(&self) -> &AnalysisStatus {
        &self.status
    }

    pub fn state(&self) -> AnalysisState {
        self.status.state
    }

    /// Start a run in this slot. Only an idle machine may start.
    pub fn begin(&mut self) -> Result<(), TransitionError> {
        match self.status.state {
            AnalysisState::Idle => {
                self.move_to(AnalysisState::Starting);
                Ok(())
            }
            state if state.is_terminal() => Err(TransitionError::NeedsReset(state)),
            state => Err(TransitionError::AlreadyRunning(state)),
        }
    }

    /// Fold one stream event into the status.
    pub fn apply(&mut self, event: &StreamEvent) -> Transition {
        let from = self.status.state;
        if from.is_terminal() {
            tracing::debug!(step = %event.step, "ignoring event after terminal state");
            return Transition::Ignored;
        }

        self.status.events_applied += 1;
        if let Some(message) = event.message() {
            self.status.message = Some(message.to_string());
        }

        match StepKind::of(&event.step) {
            StepKind::Starting => self.advance(AnalysisState::Starting),
            StepKind::WebSearch => {
                if let Some(searches) = event
                    .payload()
                    .and_then(|payload| payload.get("searches"))
                    .and_then(Value::as_array)
                {
                    self.status.searches.extend(searches.iter().map(search_text));
                }
                self.advance(AnalysisState::SearchingWeb);
            }
            StepKind::Error => {
                self.fail(FailureReason::Remote {
                    step: event.step.clone(),
                    message: event.message().map(str::to_string),
                });
            }
            StepKind::Saved => {
                if let Some(payload) = event.payload() {
                    match Linked::<SavedProject>::deserialize(payload) {
                        Ok(project) => self.status.saved_project = Some(project),
                        Err(e) => tracing::debug!("unrecognized saved project payload: {}", e),
                    }
                }
                self.advance(AnalysisState::Saving);
            }
            StepKind::Complete => {
                self.status.report = event.payload().cloned();
                self.status.searches.clear();
                self.move_to(AnalysisState::Complete);
            }
            StepKind::Progress => self.advance(AnalysisState::Analyzing),
        }

        Transition::Applied {
            from,
            to: self.status.state,
        }
    }

    /// The stream could not be read any further.
    pub fn fail_transport(&mut self, message: impl Into<String>) -> Transition {
        self.fail_with(FailureReason::Transport {
            message: message.into(),
        })
    }

    /// The caller aborted the run (teardown, time budget).
    pub fn cancel(&mut self, reason: impl Into<String>) -> Transition {
        self.fail_with(FailureReason::Cancelled {
            reason: reason.into(),
        })
    }

    /// The stream ended before a terminal event arrived.
    pub fn fail_incomplete(&mut self) -> Transition {
        self.fail_with(FailureReason::Incomplete)
    }

    /// Clear the slot for a new scan. Rejected while a run is active and
    /// during the grace period right after a run ended.
    pub fn reset(&mut self) -> Result<(), TransitionError> {
        self.reset_at(Instant::now())
    }

    pub fn reset_at(&mut self, now: Instant) -> Result<(), TransitionError> {
        let state = self.status.state;
        if state == AnalysisState::Idle {
            return Ok(());
        }
        if !state.is_terminal() {
            return Err(TransitionError::RunInProgress(state));
        }
        if let Some(ended) = self.terminal_at {
            let elapsed = now.saturating_duration_since(ended);
            if elapsed < self.reset_grace {
                let remaining = self.reset_grace - elapsed;
                return Err(TransitionError::GracePeriod {
                    remaining_ms: remaining.as_millis().max(1) as u64,
                });
            }
        }

        self.status = AnalysisStatus::idle();
        self.terminal_at = None;
        Ok(())
    }

    fn fail_with(&mut self, reason: FailureReason) -> Transition {
        let from = self.status.state;
        if from.is_terminal() {
            return Transition::Ignored;
        }
        self.fail(reason);
        Transition::Applied {
            from,
            to: AnalysisState::Failed,
        }
    }

    fn fail(&mut self, reason: FailureReason) {
        tracing::info!(?reason, "analysis failed");
        self.status.failure = Some(reason);
        self.move_to(AnalysisState::Failed);
    }

    /// Move forward to `target`, never back to a lower-ranked state.
    fn advance(&mut self, target: AnalysisState) {
        if target.rank() > self.status.state.rank() {
            self.move_to(target);
        }
    }

    fn move_to(&mut self, target: AnalysisState) {
        tracing::debug!(from = %self.status.state, to = %target, "state transition");
        self.status.state = target;
        if target.is_terminal() {
            self.terminal_at = Some(Instant::now());
            if target == AnalysisState::Complete {
                tracing::info!(events = self.status.events_applied, "analysis complete");
            }
        }
    }
}

fn search_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
