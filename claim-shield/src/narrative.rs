use serde::{Deserialize, Serialize};

/// Phrases that tend to show up in fabricated accounts.
pub const DECEPTION_TRIGGERS: [&str; 4] = ["guarantee", "honestly", "truthfully", "believe me"];

pub const TRIGGER_WEIGHT: f64 = 0.2;

/// Narratives shorter than this many words are considered evasive.
pub const MIN_NARRATIVE_WORDS: usize = 10;

pub const BRIEF_NARRATIVE_WEIGHT: f64 = 0.15;

pub const BRIEF_NARRATIVE_INDICATOR: &str = "Suspiciously brief description for high-damage claim.";

/// Heuristic score of the claimant's free-text account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinguisticAnalysis {
    pub score: f64,
    pub indicators: Vec<String>,
}

pub fn analyze_narrative(description: Option<&str>) -> LinguisticAnalysis {
    let Some(text) = description.map(str::trim).filter(|t| !t.is_empty()) else {
        return LinguisticAnalysis::default();
    };

    let mut analysis = LinguisticAnalysis::default();
    let lowered = text.to_lowercase();

    for word in DECEPTION_TRIGGERS {
        if lowered.contains(word) {
            analysis
                .indicators
                .push(format!("Use of suggestive word: '{word}'"));
            analysis.score += TRIGGER_WEIGHT;
        }
    }

    if text.split_whitespace().count() < MIN_NARRATIVE_WORDS {
        analysis.indicators.push(BRIEF_NARRATIVE_INDICATOR.to_string());
        analysis.score += BRIEF_NARRATIVE_WEIGHT;
    }

    analysis
}
