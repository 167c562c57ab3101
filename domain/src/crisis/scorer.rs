//! Deterministic keyword-tier risk scorer.
//!
//! Used as a safety net whenever the language-generation path for risk
//! analysis fails. It is a pure function of the message text: the same
//! input always yields the same tier, and the tier is the maximum of all
//! matched phrases.

use super::tier::RiskTier;
use serde::{Deserialize, Serialize};

const CRISIS_PHRASES: &[&str] = &[
    "kill myself",
    "killing myself",
    "end my life",
    "ending my life",
    "take my own life",
    "taking my own life",
    "suicide",
    "suicidal",
    "want to die",
    "wanna die",
    "better off dead",
    "no reason to live",
    "hang myself",
    "overdose",
    "end it all",
    "don't want to be alive",
    "dont want to be alive",
    "don't want to live",
    "dont want to live",
];

const HIGH_PHRASES: &[&str] = &[
    "self harm",
    "selfharm",
    "cutting myself",
    "cut myself",
    "hurt myself",
    "hurting myself",
    "can't go on",
    "cant go on",
    "hopeless",
    "no way out",
    "nobody would miss me",
    "burden to everyone",
    "can't take it anymore",
    "cant take it anymore",
    "give up on life",
];

const MODERATE_PHRASES: &[&str] = &[
    "depressed",
    "depression",
    "panic attack",
    "panic attacks",
    "anxious",
    "anxiety",
    "worthless",
    "can't sleep",
    "cant sleep",
    "lonely",
    "overwhelmed",
    "numb",
    "crying",
];

const LOW_PHRASES: &[&str] = &[
    "stress",
    "stressed",
    "stressful",
    "worried",
    "worry",
    "tired",
    "sad",
    "upset",
    "frustrated",
    "nervous",
];

/// Result of scoring one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisAssessment {
    pub tier: RiskTier,
    /// Numeric score of `tier`
    pub score: u8,
    /// Phrases that matched, highest tier first
    pub matched: Vec<String>,
    /// True for high and crisis tiers
    pub escalation_needed: bool,
}

impl CrisisAssessment {
    fn none() -> Self {
        Self {
            tier: RiskTier::None,
            score: RiskTier::None.score(),
            matched: Vec::new(),
            escalation_needed: false,
        }
    }
}

/// Keyword-tier scorer.
///
/// Tiers are checked from most to least severe; every tier is scanned so
/// `matched` lists all hits, but the returned tier is the highest one.
#[derive(Debug, Clone)]
pub struct CrisisFallbackScorer {
    tiers: Vec<(RiskTier, Vec<String>)>,
}

impl Default for CrisisFallbackScorer {
    fn default() -> Self {
        Self::new(vec![
            (RiskTier::Crisis, to_owned(CRISIS_PHRASES)),
            (RiskTier::High, to_owned(HIGH_PHRASES)),
            (RiskTier::Moderate, to_owned(MODERATE_PHRASES)),
            (RiskTier::Low, to_owned(LOW_PHRASES)),
        ])
    }
}

impl CrisisFallbackScorer {
    /// Build a scorer from explicit tiers. Phrases are normalized the same
    /// way as input text.
    pub fn new(tiers: Vec<(RiskTier, Vec<String>)>) -> Self {
        let mut tiers: Vec<(RiskTier, Vec<String>)> = tiers
            .into_iter()
            .map(|(tier, phrases)| (tier, phrases.iter().map(|p| normalize(p)).collect()))
            .collect();
        tiers.sort_by(|a, b| b.0.cmp(&a.0));
        Self { tiers }
    }

    /// Score a message.
    pub fn score(&self, text: &str) -> CrisisAssessment {
        let haystack = format!(" {} ", normalize(text));
        if haystack.trim().is_empty() {
            return CrisisAssessment::none();
        }

        let mut tier = RiskTier::None;
        let mut matched = Vec::new();

        for (candidate, phrases) in &self.tiers {
            for phrase in phrases {
                if phrase.is_empty() {
                    continue;
                }
                if haystack.contains(&format!(" {} ", phrase)) {
                    matched.push(phrase.clone());
                    tier = tier.max(*candidate);
                }
            }
        }

        CrisisAssessment {
            tier,
            score: tier.score(),
            matched,
            escalation_needed: tier >= RiskTier::High,
        }
    }
}

fn to_owned(phrases: &[&str]) -> Vec<String> {
    phrases.iter().map(|p| p.to_string()).collect()
}

/// Lowercase, unify apostrophes, and collapse everything that is not a
/// letter, digit or apostrophe into single spaces.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        let ch = match ch {
            '\u{2018}' | '\u{2019}' | '`' => '\'',
            other => other,
        };
        if ch.is_alphanumeric() || ch == '\'' {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}
