//! One analysis slot: a state machine fed by a live stream
//!
//! A session owns exactly one [`ReportStateMachine`]. Starting a second run
//! while the first is still active is rejected, and a finished slot must be
//! cleared (after the grace period) before it accepts a new scan.

use futures::Stream;
use shared_types::StreamEvent;

use crate::config::EngineConfig;
use crate::error::{EngineError, IngestError};
use crate::highlight::ReportView;
use crate::ingest::{ingest, CancelSignal, IngestOutcome};
use crate::state::{AnalysisState, AnalysisStatus, ReportStateMachine};

/// Hook for the external project-list cache, called when the service
/// reports the scan as saved.
pub trait ProjectListCache {
    fn invalidate_projects(&self);
}

impl<F: Fn()> ProjectListCache for F {
    fn invalidate_projects(&self) {
        self()
    }
}

/// Cache hook that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProjectCache;

impl ProjectListCache for NoopProjectCache {
    fn invalidate_projects(&self) {}
}

pub struct AnalysisSession<C = NoopProjectCache> {
    machine: ReportStateMachine,
    config: EngineConfig,
    cache: C,
}

impl AnalysisSession<NoopProjectCache> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_cache(config, NoopProjectCache)
    }
}

impl<C: ProjectListCache> AnalysisSession<C> {
    pub fn with_cache(config: EngineConfig, cache: C) -> Self {
        Self {
            machine: ReportStateMachine::new(config.session.reset_grace()),
            config,
            cache,
        }
    }

    pub fn status(&self) -> &AnalysisStatus {
        self.machine.status()
    }

    pub fn state(&self) -> AnalysisState {
        self.machine.state()
    }

    /// Consume a progress stream until it ends, fails or is cancelled.
    ///
    /// Returns the final status when the run completed. Every other ending
    /// leaves the machine in `Failed` and is reported as an error.
    pub async fn run<S, B, E>(
        &mut self,
        stream: S,
        cancel: CancelSignal,
    ) -> Result<&AnalysisStatus, EngineError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        self.machine.begin()?;
        tracing::info!("analysis run started");

        let Self {
            machine,
            config,
            cache,
        } = self;

        let outcome = ingest(stream, &config.ingest, cancel, |event: StreamEvent| {
            let transition = machine.apply(&event);
            if transition.entered(AnalysisState::Saving) {
                cache.invalidate_projects();
            }
        })
        .await;

        match outcome {
            Ok(IngestOutcome::Finished(summary)) => {
                if summary.malformed > 0 {
                    tracing::warn!(skipped = summary.malformed, "stream contained malformed lines");
                }
                if !machine.state().is_terminal() {
                    machine.fail_incomplete();
                }
            }
            Ok(IngestOutcome::Cancelled { reason, .. }) => {
                machine.cancel(reason.to_string());
            }
            Err(IngestError::Transport(message)) => {
                machine.fail_transport(message);
            }
        }

        self.conclude()
    }

    /// Clear the slot for a new scan ("clear" / "new scan" action).
    pub fn clear(&mut self) -> Result<(), EngineError> {
        self.machine.reset()?;
        Ok(())
    }

    /// Highlight view of the completed report against the current text.
    /// Safe to call repeatedly as the user edits; the report is unchanged.
    pub fn report_view(&self, text: &str) -> Result<ReportView, EngineError> {
        if self.state() != AnalysisState::Complete {
            return Err(EngineError::NoReport);
        }
        let report = self.status().plagiarism_report()?;
        Ok(ReportView::build(&report, text))
    }

    fn conclude(&self) -> Result<&AnalysisStatus, EngineError> {
        let status = self.machine.status();
        match (&status.state, &status.failure) {
            (AnalysisState::Complete, _) => Ok(status),
            (_, Some(reason)) => Err(EngineError::from(reason)),
            (state, None) => Err(EngineError::Transport(format!(
                "run stopped in unexpected state {}",
                state
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransitionError;
    use crate::ingest::{cancellation, CancelReason};
    use std::cell::Cell;

    fn stream_of(
        chunks: &[&'static str],
    ) -> impl Stream<Item = Result<&'static [u8], std::io::Error>> {
        let chunks: Vec<Result<&'static [u8], std::io::Error>> = chunks
            .iter()
            .copied()
            .map(|c: &'static str| Ok(c.as_bytes()))
            .collect();
        futures::stream::iter(chunks)
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.session.reset_grace_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_run_completes_and_invalidates_cache_once() {
        let invalidations = Cell::new(0);
        let mut session = AnalysisSession::with_cache(config(), || {
            invalidations.set(invalidations.get() + 1)
        });

        let status = session
            .run(
                stream_of(&[
                    "{\"step\":\"starting\"}\n",
                    "{\"step\":\"database_saved\",\"data\":{\"data\":\"p1\"}}\n",
                    "{\"step\":\"database_saved\"}\n",
                    "{\"step\":\"analysis_complete\",\"data\":{\"data\":{\"score\":7}}}\n",
                ]),
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(status.state, AnalysisState::Complete);
        assert_eq!(invalidations.get(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_is_terminal() {
        let mut session = AnalysisSession::new(config());
        let err = session
            .run(
                stream_of(&[
                    "{\"step\":\"starting\"}\n",
                    "{\"step\":\"scan_error\",\"data\":{\"message\":\"Text too short\"}}\n",
                    "{\"step\":\"analysis_complete\",\"data\":{\"data\":{}}}\n",
                ]),
                CancelSignal::never(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Remote { ref message, .. } if message == "Text too short"));
        assert_eq!(session.state(), AnalysisState::Failed);
        assert!(session.status().report.is_none());
    }

    #[tokio::test]
    async fn test_stream_without_terminal_event_fails() {
        let mut session = AnalysisSession::new(config());
        let err = session
            .run(stream_of(&["{\"step\":\"starting\"}\n"]), CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Incomplete));
    }

    #[tokio::test]
    async fn test_cancel_before_start_fails_with_reason() {
        let (handle, signal) = cancellation();
        handle.cancel(CancelReason::BudgetExceeded { budget_ms: 30000 });

        let mut session = AnalysisSession::new(config());
        let err = session
            .run(stream_of(&["{\"step\":\"starting\"}\n"]), signal)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled(ref r) if r.contains("30000ms")));
        assert_eq!(session.status().events_applied, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_chunk_prevents_completion() {
        let (handle, signal) = cancellation();
        let mut session = AnalysisSession::with_cache(config(), move || {
            handle.cancel(CancelReason::Aborted)
        });

        let err = session
            .run(
                stream_of(&[concat!(
                    "{\"step\":\"database_saved\",\"data\":{\"data\":\"p1\"}}\n",
                    "{\"step\":\"analysis_complete\",\"data\":{\"data\":{\"score\":7}}}\n",
                )]),
                signal,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled(ref r) if r == "aborted by the client"));
        assert_eq!(session.state(), AnalysisState::Failed);
        assert!(session.status().report.is_none());
        assert_eq!(session.status().events_applied, 1);
    }

    #[tokio::test]
    async fn test_transport_error_fails_run() {
        let mut session = AnalysisSession::new(config());
        let stream = futures::stream::iter(vec![
            Ok(b"{\"step\":\"starting\"}\n".to_vec()),
            Err("connection dropped"),
        ]);
        let err = session.run(stream, CancelSignal::never()).await.unwrap_err();

        assert!(matches!(err, EngineError::Transport(ref m) if m == "connection dropped"));
        assert_eq!(session.state(), AnalysisState::Failed);
    }

    #[tokio::test]
    async fn test_second_run_requires_clear() {
        let mut session = AnalysisSession::new(config());
        let complete = ["{\"step\":\"analysis_complete\",\"data\":{\"data\":{\"score\":1}}}\n"];
        session
            .run(stream_of(&complete), CancelSignal::never())
            .await
            .unwrap();

        let err = session
            .run(stream_of(&complete), CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transition(TransitionError::NeedsReset(AnalysisState::Complete))
        ));

        session.clear().unwrap();
        assert_eq!(session.state(), AnalysisState::Idle);
        assert!(session.status().report.is_none());
        session
            .run(stream_of(&complete), CancelSignal::never())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_report_view_requires_complete_run() {
        let session = AnalysisSession::new(config());
        assert!(matches!(
            session.report_view("text"),
            Err(EngineError::NoReport)
        ));
    }
}
