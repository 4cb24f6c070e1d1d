use thiserror::Error;

use crate::state::AnalysisState;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Stream transport failed: {0}")]
    Transport(String),

    #[error("Analysis failed: {message}")]
    Remote { step: String, message: String },

    #[error("Analysis cancelled: {0}")]
    Cancelled(String),

    #[error("Stream ended before the analysis completed")]
    Incomplete,

    #[error("No completed report available")]
    NoReport,

    #[error("Invalid report payload: {0}")]
    InvalidReport(String),
}

/// Rejected state-machine requests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("An analysis is already running (state: {0})")]
    AlreadyRunning(AnalysisState),

    #[error("Previous analysis ended in state {0}; reset before starting a new one")]
    NeedsReset(AnalysisState),

    #[error("Cannot reset while the analysis is running (state: {0})")]
    RunInProgress(AnalysisState),

    #[error("Analysis just finished; reset allowed in {remaining_ms}ms")]
    GracePeriod { remaining_ms: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Stream read failed: {0}")]
    Transport(String),
}
