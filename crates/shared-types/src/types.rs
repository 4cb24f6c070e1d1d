use serde::{Deserialize, Serialize};

/// Half-open character interval `[start, end)` into a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize, // Character offset, not byte offset
    pub end: usize,
}

impl TextSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

/// Completed plagiarism report, as delivered by the `analysis_complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismReport {
    pub score: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub exact_matches: Vec<ExactMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_plagiarism_percentage: Option<f64>,
}

/// A finding in the report: an excerpt of the user's text and the external
/// sources it overlaps with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(default)]
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<TextSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Paraphrase finding (below 100% similarity)
pub type Section = Finding;

/// Literal finding (100% overlap)
pub type ExactMatch = Finding;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Verbatim text from the external index; the alignment target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl Source {
    /// Snippet text, or `None` when the source carries no usable snippet.
    pub fn snippet(&self) -> Option<&str> {
        self.snippet
            .as_deref()
            .filter(|snippet| !snippet.trim().is_empty())
    }

    /// How the source should be attributed when displayed.
    pub fn label(&self) -> SourceLabel<'_> {
        let title = self.title.as_deref().filter(|t| !t.trim().is_empty());
        let url = self.url.as_deref().filter(|u| !u.trim().is_empty());
        match (title, url) {
            (Some(title), url) => SourceLabel::Titled { title, url },
            (None, Some(url)) => SourceLabel::Link(url),
            (None, None) => SourceLabel::Unattributed,
        }
    }
}

/// Display form of a source attribution, decided once from the optional
/// title/url pair so renderers match on it instead of probing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLabel<'a> {
    Titled { title: &'a str, url: Option<&'a str> },
    Link(&'a str),
    Unattributed,
}

/// A highlight to paint over the input text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
    pub similarity: f64,
}

impl HighlightRange {
    pub fn span(&self) -> TextSpan {
        TextSpan {
            start: self.start,
            end: self.end,
        }
    }
}

/// Per-sentence verdict from the AI-detection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceClassification {
    pub sentence: String,
    pub perplexity: f64,
    #[serde(default)]
    pub highlight_sentence_for_ai: bool,
}
