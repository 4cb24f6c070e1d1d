pub mod event;
pub mod linked;
pub mod types;

pub use event::{EventData, StreamEvent};
pub use linked::{Identified, Linked, SavedProject};
pub use types::{
    ExactMatch, Finding, HighlightRange, PlagiarismReport, RiskLevel, Section,
    SentenceClassification, Source, SourceLabel, TextSpan,
};
