//! Streaming analysis ingestion and source alignment
//!
//! Shared by the AI detector and the plagiarism checker:
//! - `ingest`: NDJSON progress stream → decoded events, chunking-invariant
//! - `state`: progress state machine over those events
//! - `locator`: relocate a source snippet inside user-edited text
//! - `highlight`: report → ordered, de-duplicated highlight ranges
//! - `score`: perplexity → severity band (the only place thresholds live)

pub mod config;
pub mod error;
pub mod highlight;
pub mod ingest;
pub mod locator;
pub mod score;
pub mod session;
pub mod state;

pub use config::EngineConfig;
pub use error::{EngineError, IngestError, TransitionError};
pub use highlight::{
    build_highlight_ranges, build_sentence_ranges, coverage_percent, HighlightRangeBuilder,
    ReportView, SentenceRange,
};
pub use ingest::{cancellation, ingest, CancelHandle, CancelReason, CancelSignal, IngestOutcome};
pub use locator::{locate, locate_snippet, MatchTier};
pub use score::{classify, classify_sentence, Band, BandTally};
pub use session::{AnalysisSession, NoopProjectCache, ProjectListCache};
pub use state::{AnalysisState, AnalysisStatus, FailureReason, ReportStateMachine, Transition};
