//! Perplexity score banding
//!
//! Every consumer (inline highlighting, summary badge, PDF export) goes
//! through [`classify`] and [`Band::color`]. Thresholds are not configurable
//! so on-screen and exported classifications always agree.

use serde::{Deserialize, Serialize};
use shared_types::SentenceClassification;

/// AI-flagged sentences at or above this score are `AiHigh`
pub const AI_HIGH_MIN: f64 = 400.0;
/// AI-flagged sentences at or above this score are `AiMedium`
pub const AI_MEDIUM_MIN: f64 = 250.0;
/// Human sentences at or below this score are `HumanHigh`
pub const HUMAN_HIGH_MAX: f64 = 40.0;
/// Human sentences at or below this score are `HumanMedium`
pub const HUMAN_MEDIUM_MAX: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Band {
    AiHigh,
    AiMedium,
    AiLow,
    HumanLow,
    HumanMedium,
    HumanHigh,
}

impl Band {
    pub const ALL: [Band; 6] = [
        Band::AiHigh,
        Band::AiMedium,
        Band::AiLow,
        Band::HumanLow,
        Band::HumanMedium,
        Band::HumanHigh,
    ];

    /// Stable key shared with the renderers (`"aiHigh"`, ...)
    pub fn key(self) -> &'static str {
        match self {
            Band::AiHigh => "aiHigh",
            Band::AiMedium => "aiMedium",
            Band::AiLow => "aiLow",
            Band::HumanLow => "humanLow",
            Band::HumanMedium => "humanMedium",
            Band::HumanHigh => "humanHigh",
        }
    }

    /// Display color for this band
    pub fn color(self) -> &'static str {
        match self {
            Band::AiHigh => "#F87171",
            Band::AiMedium => "#FB923C",
            Band::AiLow => "#FDE68A",
            Band::HumanLow => "#D9F99D",
            Band::HumanMedium => "#86EFAC",
            Band::HumanHigh => "#4ADE80",
        }
    }

    pub fn is_ai(self) -> bool {
        matches!(self, Band::AiHigh | Band::AiMedium | Band::AiLow)
    }

    /// Severity within the band's polarity: 0 = low, 1 = medium, 2 = high
    pub fn severity(self) -> u8 {
        match self {
            Band::AiLow | Band::HumanLow => 0,
            Band::AiMedium | Band::HumanMedium => 1,
            Band::AiHigh | Band::HumanHigh => 2,
        }
    }

    fn index(self) -> usize {
        match self {
            Band::AiHigh => 0,
            Band::AiMedium => 1,
            Band::AiLow => 2,
            Band::HumanLow => 3,
            Band::HumanMedium => 4,
            Band::HumanHigh => 5,
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Map a score and its polarity flag to a band.
///
/// AI scores grow more severe as they rise, human scores as they fall.
/// Anything outside the high/medium cutoffs (NaN included) lands in the
/// low band of its polarity.
pub fn classify(is_ai: bool, score: f64) -> Band {
    if is_ai {
        if score >= AI_HIGH_MIN {
            Band::AiHigh
        } else if score >= AI_MEDIUM_MIN {
            Band::AiMedium
        } else {
            Band::AiLow
        }
    } else if score <= HUMAN_HIGH_MAX {
        Band::HumanHigh
    } else if score <= HUMAN_MEDIUM_MAX {
        Band::HumanMedium
    } else {
        Band::HumanLow
    }
}

pub fn classify_sentence(sentence: &SentenceClassification) -> Band {
    classify(sentence.highlight_sentence_for_ai, sentence.perplexity)
}

/// Sentence counts per band, for summary badges and exported reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BandTally {
    counts: [usize; 6],
}

impl BandTally {
    pub fn from_sentences(sentences: &[SentenceClassification]) -> Self {
        let mut tally = Self::default();
        for sentence in sentences {
            tally.record(classify_sentence(sentence));
        }
        tally
    }

    pub fn record(&mut self, band: Band) {
        self.counts[band.index()] += 1;
    }

    pub fn count(&self, band: Band) -> usize {
        self.counts[band.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Percentage (0-100) of sentences in an AI band
    pub fn ai_share(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let ai: usize = Band::ALL
            .iter()
            .filter(|band| band.is_ai())
            .map(|band| self.count(*band))
            .sum();
        ai as f64 * 100.0 / total as f64
    }

    /// Bands with at least one sentence, in `Band::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Band, usize)> + '_ {
        Band::ALL
            .into_iter()
            .map(|band| (band, self.count(band)))
            .filter(|(_, count)| *count > 0)
    }
}
