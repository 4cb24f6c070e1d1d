//! Property-based tests for analysis-engine
//!
//! Covers decoder chunking, snippet alignment and band ordering.

use analysis_engine::config::IngestConfig;
use analysis_engine::ingest::NdjsonDecoder;
use analysis_engine::{build_highlight_ranges, classify, locate_snippet};
use proptest::prelude::*;
use shared_types::{Finding, PlagiarismReport, RiskLevel, Source, StreamEvent};

// ============================================================
// Helpers
// ============================================================

fn event_line() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => ("[a-z_]{1,16}", proptest::option::of("\\PC{0,12}")).prop_map(|(step, message)| {
            let event = match message {
                Some(m) => StreamEvent::new(step).with_message(m),
                None => StreamEvent::new(step),
            };
            serde_json::to_string(&event).unwrap()
        }),
        1 => Just("not json at all".to_string()),
        1 => Just(String::new()),
    ]
}

fn decode_in_pieces(body: &[u8], cuts: &[usize]) -> (Vec<StreamEvent>, usize) {
    let mut decoder = NdjsonDecoder::<StreamEvent>::new(&IngestConfig::default());
    let mut events = Vec::new();
    let mut sink = |event: StreamEvent| events.push(event);

    let mut points: Vec<usize> = cuts.iter().map(|c| c % (body.len() + 1)).collect();
    points.sort_unstable();

    let mut last = 0;
    for point in points {
        decoder.feed(&body[last..point], &mut sink);
        last = point;
    }
    decoder.feed(&body[last..], &mut sink);
    let summary = decoder.finish(&mut sink);

    (events, summary.malformed)
}

fn finding(snippet: String) -> Finding {
    Finding {
        excerpt: snippet.clone(),
        sources: vec![Source {
            snippet: Some(snippet),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end - start).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // ============================================================
    // Ingestion
    // ============================================================

    #[test]
    fn decoding_is_independent_of_chunking(
        lines in prop::collection::vec(event_line(), 0..10),
        cuts in prop::collection::vec(any::<usize>(), 0..12)
    ) {
        let body = lines.iter().map(|l| format!("{}\n", l)).collect::<String>();
        let body = body.as_bytes();

        let whole = decode_in_pieces(body, &[]);
        let split = decode_in_pieces(body, &cuts);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn unterminated_final_event_is_still_dispatched(
        step in "[a-z_]{1,16}",
        cut in any::<usize>()
    ) {
        let line = serde_json::to_string(&StreamEvent::new(step.clone())).unwrap();
        let (events, malformed) = decode_in_pieces(line.as_bytes(), &[cut]);

        prop_assert_eq!(malformed, 0);
        prop_assert_eq!(events.len(), 1);
        prop_assert_eq!(&events[0].step, &step);
    }

    // ============================================================
    // Snippet Alignment
    // ============================================================

    #[test]
    fn exact_substring_is_found_case_insensitively(
        text in "[a-zA-Z .,]{1,60}",
        a in any::<usize>(),
        b in any::<usize>(),
        upper in any::<bool>()
    ) {
        let len = text.chars().count();
        let (start, end) = {
            let (x, y) = (a % len, b % len);
            (x.min(y), x.max(y) + 1)
        };
        let snippet = char_slice(&text, start, end);
        prop_assume!(!snippet.trim().is_empty());
        let snippet = if upper { snippet.to_uppercase() } else { snippet };

        let span = locate_snippet(&text, &snippet).unwrap();
        let expected = snippet.trim().to_lowercase();

        prop_assert_eq!(span.len(), expected.chars().count());
        prop_assert_eq!(char_slice(&text, span.start, span.end).to_lowercase(), expected);
    }

    #[test]
    fn whitespace_drift_still_locates(
        prefix in "[a-z]{0,10}",
        words in prop::collection::vec("[a-z]{1,8}", 2..6),
        gaps in prop::collection::vec(1usize..4, 5),
        suffix in "[a-z]{0,10}"
    ) {
        let text = format!("{} {} {}", prefix, words.join(" "), suffix);
        let mut snippet = words[0].to_uppercase();
        for (word, gap) in words[1..].iter().zip(&gaps) {
            snippet.push_str(&" ".repeat(*gap));
            snippet.push_str(word);
        }

        let span = locate_snippet(&text, &snippet).unwrap();
        let text_len = text.chars().count();

        prop_assert!(span.end <= text_len);
        prop_assert_eq!(span.len(), snippet.chars().count().min(text_len - span.start));
    }

    #[test]
    fn text_without_overlap_yields_none(
        text in "[a-m ]{0,40}",
        snippet in "[n-z]{1,30}"
    ) {
        prop_assert!(locate_snippet(&text, &snippet).is_none());
    }

    // ============================================================
    // Highlight Ranges
    // ============================================================

    #[test]
    fn ranges_are_sorted_unique_and_in_bounds(
        text in "[a-z ]{1,60}",
        picks in prop::collection::vec((any::<usize>(), 1usize..12, any::<bool>()), 0..8)
    ) {
        let len = text.chars().count();
        let mut exact = Vec::new();
        let mut sections = Vec::new();
        for (start, width, is_exact) in picks {
            let start = start % len;
            let end = (start + width).min(len);
            let f = finding(char_slice(&text, start, end));
            if is_exact { exact.push(f) } else { sections.push(f) }
        }
        let report = PlagiarismReport {
            score: 0.0,
            risk_level: RiskLevel::Low,
            sections,
            exact_matches: exact.clone(),
            summary: None,
            exact_plagiarism_percentage: None,
        };

        let ranges = build_highlight_ranges(&report, &text);

        for pair in ranges.windows(2) {
            prop_assert!(pair[0].start <= pair[1].start);
        }
        let mut spans: Vec<_> = ranges.iter().map(|r| (r.start, r.end)).collect();
        let total = spans.len();
        spans.sort_unstable();
        spans.dedup();
        prop_assert_eq!(spans.len(), total);

        for r in &ranges {
            prop_assert!(r.start < r.end && r.end <= len);
        }
        for f in &exact {
            let snippet = f.sources[0].snippet.as_deref().unwrap_or_default();
            if let Some(span) = locate_snippet(&text, snippet) {
                let claimed = ranges.iter().find(|r| r.start == span.start && r.end == span.end);
                prop_assert_eq!(claimed.map(|r| r.similarity), Some(100.0));
            }
        }
    }

    // ============================================================
    // Score Bands
    // ============================================================

    #[test]
    fn ai_severity_never_drops_as_score_rises(a in -1000.0f64..1000.0, b in -1000.0f64..1000.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify(true, lo).severity() <= classify(true, hi).severity());
        prop_assert!(classify(true, lo).is_ai());
    }

    #[test]
    fn human_severity_never_rises_as_score_rises(a in -1000.0f64..1000.0, b in -1000.0f64..1000.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify(false, lo).severity() >= classify(false, hi).severity());
        prop_assert!(!classify(false, hi).is_ai());
    }
}
