//! Highlight spans for the rendered text and the PDF export
//!
//! Both renderers consume these ranges as-is; nothing downstream re-runs the
//! alignment or re-derives bands.

use std::collections::HashSet;

use serde::Serialize;
use shared_types::{
    Finding, HighlightRange, PlagiarismReport, RiskLevel, SentenceClassification, TextSpan,
};

use crate::locator::locate_snippet;
use crate::score::{classify_sentence, Band};

/// Similarity assigned to ranges coming from exact matches
pub const EXACT_SIMILARITY: f64 = 100.0;

/// Collects ranges tier by tier; the first tier to claim a span keeps it.
pub struct HighlightRangeBuilder<'a> {
    text: &'a str,
    used: HashSet<TextSpan>,
    ranges: Vec<HighlightRange>,
}

impl<'a> HighlightRangeBuilder<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            used: HashSet::new(),
            ranges: Vec::new(),
        }
    }

    /// Priority tier: every located span gets similarity 100.
    pub fn add_exact_matches(&mut self, matches: &[Finding]) -> &mut Self {
        for finding in matches {
            self.add_finding(finding, EXACT_SIMILARITY);
        }
        self
    }

    /// Paraphrase tier: spans already claimed are skipped.
    pub fn add_sections(&mut self, sections: &[Finding]) -> &mut Self {
        for section in sections {
            self.add_finding(section, section.similarity.unwrap_or(0.0));
        }
        self
    }

    fn add_finding(&mut self, finding: &Finding, similarity: f64) {
        for source in &finding.sources {
            let Some(snippet) = source.snippet() else {
                continue;
            };

            let Some(span) = locate_snippet(self.text, snippet) else {
                tracing::debug!(
                    snippet = %snippet.chars().take(40).collect::<String>(),
                    "source snippet not found in input text"
                );
                continue;
            };

            if self.used.insert(span) {
                self.ranges.push(HighlightRange {
                    start: span.start,
                    end: span.end,
                    similarity,
                });
            }
        }
    }

    /// Ranges sorted by start; ties keep insertion order.
    pub fn finish(&mut self) -> Vec<HighlightRange> {
        let mut ranges = std::mem::take(&mut self.ranges);
        ranges.sort_by_key(|range| range.start);
        ranges
    }
}

/// Highlight ranges for a whole report: exact matches first, then sections.
pub fn build_highlight_ranges(report: &PlagiarismReport, text: &str) -> Vec<HighlightRange> {
    HighlightRangeBuilder::new(text)
        .add_exact_matches(&report.exact_matches)
        .add_sections(&report.sections)
        .finish()
}

/// Percentage (0-100) of `text_len` characters covered by at least one range.
pub fn coverage_percent(ranges: &[HighlightRange], text_len: usize) -> f64 {
    if text_len == 0 {
        return 0.0;
    }

    let mut spans: Vec<(usize, usize)> = ranges
        .iter()
        .map(|r| (r.start.min(text_len), r.end.min(text_len)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort_unstable();

    let mut covered = 0;
    let mut cursor = 0;
    for (start, end) in spans {
        let start = start.max(cursor);
        if end > start {
            covered += end - start;
            cursor = end;
        }
    }

    covered as f64 * 100.0 / text_len as f64
}

/// A classified sentence located in the input text
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentenceRange {
    pub start: usize,
    pub end: usize,
    pub band: Band,
}

/// Locate each classified sentence and attach its band. Sentences that no
/// longer appear in the text are dropped; a span claimed twice keeps the
/// first sentence.
pub fn build_sentence_ranges(
    text: &str,
    sentences: &[SentenceClassification],
) -> Vec<SentenceRange> {
    let mut used = HashSet::new();
    let mut ranges = Vec::new();

    for sentence in sentences {
        let Some(span) = locate_snippet(text, &sentence.sentence) else {
            tracing::debug!(
                sentence = %sentence.sentence.chars().take(40).collect::<String>(),
                "classified sentence not found in input text"
            );
            continue;
        };
        if used.insert(span) {
            ranges.push(SentenceRange {
                start: span.start,
                end: span.end,
                band: classify_sentence(sentence),
            });
        }
    }

    ranges.sort_by_key(|range| range.start);
    ranges
}

/// Everything a renderer needs to paint a completed plagiarism report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub score: f64,
    pub risk_level: RiskLevel,
    /// Reported percentage, or exact-match coverage when the report has none
    pub exact_percentage: f64,
    pub ranges: Vec<HighlightRange>,
}

impl ReportView {
    pub fn build(report: &PlagiarismReport, text: &str) -> Self {
        let exact_percentage = report.exact_plagiarism_percentage.unwrap_or_else(|| {
            let exact = HighlightRangeBuilder::new(text)
                .add_exact_matches(&report.exact_matches)
                .finish();
            coverage_percent(&exact, text.chars().count())
        });

        Self {
            score: report.score,
            risk_level: report.risk_level,
            exact_percentage,
            ranges: build_highlight_ranges(report, text),
        }
    }
}
