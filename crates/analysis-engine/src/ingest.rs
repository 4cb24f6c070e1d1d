//! Newline-delimited JSON ingestion
//!
//! Chunks arrive split at arbitrary byte boundaries. Lines are cut on raw
//! bytes before decoding, so the decoded sequence does not depend on how the
//! transport split the body (a UTF-8 sequence split across two chunks is
//! reassembled first).

use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::config::IngestConfig;
use crate::error::IngestError;

/// Counters for one ingested stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub dispatched: usize,
    pub malformed: usize,
    pub trailing_dispatched: bool,
}

/// Incremental decoder: feed chunks, receive complete values in wire order.
pub struct NdjsonDecoder<T> {
    pending: Vec<u8>,
    max_line_bytes: usize,
    skipping_oversized: bool,
    line_no: usize,
    summary: IngestSummary,
    halted: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> NdjsonDecoder<T> {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes: config.max_line_bytes,
            skipping_oversized: false,
            line_no: 0,
            summary: IngestSummary::default(),
            halted: false,
            _marker: PhantomData,
        }
    }

    /// Decode every line completed by `chunk`; the trailing fragment is
    /// kept until the next chunk or [`finish`](Self::finish).
    pub fn feed(&mut self, chunk: &[u8], sink: &mut impl FnMut(T)) {
        let _ = self.feed_until(chunk, sink, &|| false);
    }

    /// Like [`feed`](Self::feed), but `halt` is consulted before each line.
    /// Once it returns true the decoder stops for good: the rest of the
    /// chunk, later chunks and the trailing fragment are discarded.
    pub fn feed_until(
        &mut self,
        chunk: &[u8],
        sink: &mut impl FnMut(T),
        halt: &impl Fn() -> bool,
    ) -> ControlFlow<()> {
        if self.halted {
            return ControlFlow::Break(());
        }
        let mut rest = chunk;

        while let Some(newline) = rest.iter().position(|&b| b == b'\n') {
            let head = &rest[..newline];
            rest = &rest[newline + 1..];
            self.line_no += 1;

            if self.skipping_oversized {
                // Already counted when the line overflowed
                self.skipping_oversized = false;
                self.pending.clear();
                continue;
            }
            if self.pending.len() + head.len() > self.max_line_bytes {
                self.reject_oversized();
                self.pending.clear();
                continue;
            }

            self.pending.extend_from_slice(head);
            let line = std::mem::take(&mut self.pending);
            self.decode_line(&line, sink, halt)?;
        }

        if self.skipping_oversized {
            return ControlFlow::Continue(());
        }
        if self.pending.len() + rest.len() > self.max_line_bytes {
            self.reject_oversized();
            self.skipping_oversized = true;
            self.pending.clear();
            return ControlFlow::Continue(());
        }
        self.pending.extend_from_slice(rest);
        ControlFlow::Continue(())
    }

    /// Flush the trailing fragment at end of stream. It is dispatched only
    /// when it is a complete JSON value; otherwise it is dropped.
    pub fn finish(&mut self, sink: &mut impl FnMut(T)) -> IngestSummary {
        self.finish_until(sink, &|| false)
    }

    /// Like [`finish`](Self::finish); nothing is dispatched once halted.
    pub fn finish_until(
        &mut self,
        sink: &mut impl FnMut(T),
        halt: &impl Fn() -> bool,
    ) -> IngestSummary {
        let fragment = std::mem::take(&mut self.pending);
        let skipped = std::mem::replace(&mut self.skipping_oversized, false);

        if skipped || self.halted {
            return self.summary;
        }
        let line = trim_line(&fragment);
        if line.is_empty() {
            return self.summary;
        }
        if halt() {
            self.halted = true;
            return self.summary;
        }
        match serde_json::from_slice::<T>(line) {
            Ok(value) => {
                self.summary.dispatched += 1;
                self.summary.trailing_dispatched = true;
                sink(value);
            }
            Err(e) => {
                tracing::debug!(
                    bytes = line.len(),
                    "dropping incomplete trailing fragment: {}",
                    e
                );
            }
        }

        self.summary
    }

    pub fn summary(&self) -> IngestSummary {
        self.summary
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn decode_line(
        &mut self,
        line: &[u8],
        sink: &mut impl FnMut(T),
        halt: &impl Fn() -> bool,
    ) -> ControlFlow<()> {
        let line = trim_line(line);
        if line.is_empty() {
            return ControlFlow::Continue(());
        }
        if halt() {
            self.halted = true;
            return ControlFlow::Break(());
        }
        match serde_json::from_slice::<T>(line) {
            Ok(value) => {
                self.summary.dispatched += 1;
                sink(value);
            }
            Err(e) => {
                self.summary.malformed += 1;
                tracing::warn!(line = self.line_no, "skipping malformed stream line: {}", e);
            }
        }
        ControlFlow::Continue(())
    }

    fn reject_oversized(&mut self) {
        self.summary.malformed += 1;
        tracing::warn!(
            line = self.line_no,
            limit = self.max_line_bytes,
            "skipping stream line over size limit"
        );
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}

/// Why a stream was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// The consumer went away (page teardown, user abort)
    Aborted,
    /// The caller's wall-clock budget ran out
    BudgetExceeded { budget_ms: u64 },
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Aborted => write!(f, "aborted by the client"),
            CancelReason::BudgetExceeded { budget_ms } => {
                write!(f, "time budget of {}ms exceeded", budget_ms)
            }
        }
    }
}

/// Caller-side handle; the first `cancel` wins.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
}

/// Ingestor-side signal
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<Option<CancelReason>>,
}

pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(None);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self, reason: CancelReason) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        cancellation().1
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.rx.borrow().clone()
    }

    /// Resolves once cancelled. Pending forever if every handle is dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) -> CancelReason {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// How an ingestion ended without a transport error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Finished(IngestSummary),
    Cancelled {
        reason: CancelReason,
        summary: IngestSummary,
    },
}

/// Read `stream` to the end, handing each decoded value to `on_event` in
/// wire order.
///
/// The only suspension point is waiting for the next chunk. Once `cancel`
/// fires no further values are delivered: the signal is checked before each
/// line, so the rest of a chunk being decoded is dropped too.
pub async fn ingest<T, S, B, E, F>(
    stream: S,
    config: &IngestConfig,
    mut cancel: CancelSignal,
    mut on_event: F,
) -> Result<IngestOutcome, IngestError>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    F: FnMut(T),
{
    let mut decoder = NdjsonDecoder::<T>::new(config);
    let signal = cancel.clone();
    let halt = move || signal.reason().is_some();
    futures::pin_mut!(stream);

    loop {
        let next = tokio::select! {
            biased;
            reason = cancel.cancelled() => {
                tracing::debug!(%reason, "stream ingestion cancelled");
                return Ok(IngestOutcome::Cancelled { reason, summary: decoder.summary() });
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                let flow = decoder.feed_until(chunk.as_ref(), &mut on_event, &halt);
                if let (ControlFlow::Break(()), Some(reason)) = (flow, cancel.reason()) {
                    tracing::debug!(%reason, "stream ingestion cancelled mid-chunk");
                    return Ok(IngestOutcome::Cancelled {
                        reason,
                        summary: decoder.summary(),
                    });
                }
            }
            Some(Err(e)) => {
                tracing::warn!("stream read failed: {}", e);
                return Err(IngestError::Transport(e.to_string()));
            }
            None => break,
        }
    }

    let summary = decoder.finish_until(&mut on_event, &halt);
    if let Some(reason) = cancel.reason().filter(|_| decoder.is_halted()) {
        return Ok(IngestOutcome::Cancelled { reason, summary });
    }
    tracing::debug!(
        dispatched = summary.dispatched,
        malformed = summary.malformed,
        "stream ended"
    );
    Ok(IngestOutcome::Finished(summary))
}
