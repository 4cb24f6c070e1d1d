//! Scan Replay Binary
//!
//! Feeds a captured analysis progress stream through an `AnalysisSession`
//! and prints the final status as JSON.

mod replay;

use std::path::PathBuf;
use std::time::Duration;

use analysis_engine::{
    cancellation, AnalysisSession, AnalysisStatus, CancelReason, EngineConfig, ProjectListCache,
    ReportView,
};
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "scan-replay")]
#[command(
    version,
    about = "Replay a captured NDJSON analysis stream and align its report"
)]
struct Args {
    /// Captured stream, or `-` for stdin
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Text to align the finished report against
    #[arg(short, long)]
    text: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bytes per replayed chunk
    #[arg(long, default_value = "4096")]
    chunk_size: usize,

    /// Cancel the run after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct Output<'a> {
    status: &'a AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    view: Option<ReportView>,
}

impl<'a> Output<'a> {
    /// The status is always reported. The view is added only for a
    /// completed run whose payload decodes as a plagiarism report.
    fn new<C: ProjectListCache>(
        session: &'a AnalysisSession<C>,
        completed: bool,
        text: Option<&str>,
    ) -> Self {
        let view = match text {
            Some(text) if completed => session
                .report_view(text)
                .map_err(|e| tracing::warn!("No report view: {}", e))
                .ok(),
            _ => None,
        };
        Self {
            status: session.status(),
            view,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the JSON result, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting scan replay v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let text = match &args.text {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read text: {}", path.display()))?,
        ),
        None => None,
    };

    let reader = replay::open(&args.input).await?;
    let stream = replay::chunks(reader, args.chunk_size);

    let (handle, signal) = cancellation();
    let timer = args.timeout_ms.map(|budget_ms| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(budget_ms)).await;
            handle.cancel(CancelReason::BudgetExceeded { budget_ms });
        })
    });

    let mut session = AnalysisSession::with_cache(config, || {
        tracing::info!("Scan saved; project list is stale")
    });
    let result = session.run(stream, signal).await.map(|_| ());

    if let Some(timer) = timer {
        timer.abort();
    }

    let output = Output::new(&session, result.is_ok(), text.as_deref());
    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Err(e) = result {
        tracing::error!("Replay did not complete: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_engine::CancelSignal;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn completed_with(payload: &str) -> AnalysisSession {
        let body = format!(
            "{{\"step\":\"analysis_complete\",\"data\":{{\"data\":{}}}}}\n",
            payload
        );
        let mut session = AnalysisSession::new(EngineConfig::default());
        session
            .run(replay::chunks(body.as_bytes(), 8), CancelSignal::never())
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_status_printed_when_payload_is_not_a_report() {
        let session = completed_with("{\"score\":42}").await;
        let output = Output::new(&session, true, Some("hello"));

        assert!(output.view.is_none());
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["status"]["state"], json!("complete"));
        assert_eq!(value["status"]["report"], json!({"score": 42}));
        assert!(value.get("view").is_none());
    }

    #[tokio::test]
    async fn test_view_included_for_full_report() {
        let session = completed_with(
            "{\"score\":12,\"riskLevel\":\"LOW\",\"exactMatches\":[{\"sources\":[{\"snippet\":\"hello\"}]}]}",
        )
        .await;
        let output = Output::new(&session, true, Some("say hello"));

        let view = output.view.unwrap();
        assert_eq!(view.ranges.len(), 1);
        assert_eq!((view.ranges[0].start, view.ranges[0].end), (4, 9));
    }
}
