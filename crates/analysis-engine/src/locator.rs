//! Snippet relocation
//!
//! Finds where a third-party snippet sits inside text the user may have
//! edited since the scan. Offsets are in characters of the original text.
//!
//! Tiers, first hit wins:
//! 1. case-insensitive exact substring
//! 2. same, after collapsing whitespace runs to a single space
//! 3. the first [`PARTIAL_ANCHOR_CHARS`] normalized characters as an anchor
//!    (only for longer snippets); the span still extends by the full snippet
//!    length from the anchor hit

use shared_types::TextSpan;

/// Length of the search key used by the partial-anchor tier
pub const PARTIAL_ANCHOR_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Normalized,
    PartialAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub span: TextSpan,
    pub tier: MatchTier,
}

/// Locate `snippet` inside `text`, or `None` when no tier matches.
pub fn locate_snippet(text: &str, snippet: &str) -> Option<TextSpan> {
    locate(text, snippet).map(|located| located.span)
}

/// Like [`locate_snippet`], also reporting which tier produced the span.
pub fn locate(text: &str, snippet: &str) -> Option<Located> {
    let needle: Vec<char> = snippet.trim().chars().map(fold_char).collect();
    if needle.is_empty() {
        return None;
    }
    let haystack: Vec<char> = text.chars().map(fold_char).collect();
    let text_len = haystack.len();
    let snippet_len = needle.len();

    if let Some(start) = find_chars(&haystack, &needle) {
        return clamp_span(start, snippet_len, text_len).map(|span| Located {
            span,
            tier: MatchTier::Exact,
        });
    }

    let text_norm = Normalized::new(&haystack);
    let needle_norm = Normalized::new(&needle);

    if let Some(start) = text_norm.find(&needle_norm.chars) {
        return clamp_span(start, snippet_len, text_len).map(|span| Located {
            span,
            tier: MatchTier::Normalized,
        });
    }

    if needle_norm.chars.len() > PARTIAL_ANCHOR_CHARS {
        let anchor = &needle_norm.chars[..PARTIAL_ANCHOR_CHARS];
        if let Some(start) = text_norm.find(anchor) {
            return clamp_span(start, snippet_len, text_len).map(|span| Located {
                span,
                tier: MatchTier::PartialAnchor,
            });
        }
    }

    None
}

/// Lower-case a single character, keeping it unchanged when its lower-case
/// form is more than one character so offsets stay aligned with the input.
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn clamp_span(start: usize, len: usize, text_len: usize) -> Option<TextSpan> {
    let end = start.saturating_add(len).min(text_len);
    (start < end).then_some(TextSpan { start, end })
}

/// Whitespace-collapsed text with a map back to original offsets
struct Normalized {
    chars: Vec<char>,
    origin: Vec<usize>, // origin[i] = original offset of normalized char i
}

impl Normalized {
    fn new(folded: &[char]) -> Self {
        let mut chars = Vec::with_capacity(folded.len());
        let mut origin = Vec::with_capacity(folded.len());
        let mut in_whitespace = false;

        for (offset, &c) in folded.iter().enumerate() {
            if c.is_whitespace() {
                // Only the first char of a run is kept
                if !in_whitespace {
                    chars.push(' ');
                    origin.push(offset);
                }
                in_whitespace = true;
            } else {
                chars.push(c);
                origin.push(offset);
                in_whitespace = false;
            }
        }

        Self { chars, origin }
    }

    /// Original offset of the first occurrence of `needle`
    fn find(&self, needle: &[char]) -> Option<usize> {
        find_chars(&self.chars, needle).map(|index| self.origin[index])
    }
}
