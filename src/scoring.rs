//! Relevance / priority scoring for candidate articles.
//!
//! A score is the weighted sum of four sub-scores, each bounded to `[0, 1]`:
//!
//! | Factor | Input | Shape |
//! |--------|-------|-------|
//! | urgency | publish time | linear decay over 30 days |
//! | relevance | keyword hits in title + body | step: 0.3 / 0.6 / 0.8 / 1.0 |
//! | credibility | domain rank | piecewise linear, lower rank scores higher |
//! | diversity | high-value categories | step: 0.4 / 0.7 / 1.0 |
//!
//! Every factor has a neutral fallback for missing input, so scoring never fails.
//! The reference time is passed in by the caller.

use crate::config::{ScoreWeights, ScoringSettings};
use crate::models::Candidate;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::fmt;
use tracing::debug;

const URGENCY_HORIZON_DAYS: f64 = 30.0;
const NEUTRAL: f64 = 0.5;

/// Observability label derived from a score. Never used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
    VeryLow,
}

impl PriorityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            PriorityLevel::Critical
        } else if score >= 0.7 {
            PriorityLevel::High
        } else if score >= 0.5 {
            PriorityLevel::Medium
        } else if score >= 0.3 {
            PriorityLevel::Low
        } else {
            PriorityLevel::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Critical => "critical",
            PriorityLevel::High => "high",
            PriorityLevel::Medium => "medium",
            PriorityLevel::Low => "low",
            PriorityLevel::VeryLow => "very_low",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One factor of a score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Component {
    pub score: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl Component {
    fn new(score: f64, weight: f64) -> Self {
        Self {
            score,
            weight,
            contribution: score * weight,
        }
    }
}

/// Full breakdown of how a score was reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub priority: PriorityLevel,
    pub urgency: Component,
    pub relevance: Component,
    pub credibility: Component,
    pub diversity: Component,
}

/// Urgency: 1.0 at age zero, falling linearly to 0.0 at 30 days.
/// Publish times in the future count as "now".
pub fn urgency(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - published_at).num_milliseconds() as f64 / 86_400_000.0;
    if age_days < 0.0 {
        return 1.0;
    }
    (1.0 - age_days / URGENCY_HORIZON_DAYS).clamp(0.0, 1.0)
}

/// Number of distinct keywords found (case-insensitively) in `text`.
pub fn keyword_hits(text: &str, keywords: &[String]) -> usize {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .unique()
        .filter(|k| haystack.contains(k.as_str()))
        .count()
}

/// Relevance tiers: no match still earns the 0.3 base.
pub fn relevance(text: &str, keywords: &[String]) -> f64 {
    match keyword_hits(text, keywords) {
        0 => 0.3,
        1 => 0.6,
        2 => 0.8,
        _ => 1.0,
    }
}

/// Credibility from the domain rank; unknown or non-positive ranks are neutral.
pub fn credibility(domain_rank: Option<i64>) -> f64 {
    let rank = match domain_rank {
        Some(rank) if rank > 0 => rank as f64,
        _ => return NEUTRAL,
    };
    let score = if rank <= 1_000.0 {
        0.9 + 0.1 * (1_000.0 - rank) / 1_000.0
    } else if rank <= 10_000.0 {
        0.7 + 0.2 * (10_000.0 - rank) / 9_000.0
    } else if rank <= 100_000.0 {
        0.4 + 0.3 * (100_000.0 - rank) / 90_000.0
    } else if rank <= 1_000_000.0 {
        0.1 + 0.3 * (1_000_000.0 - rank) / 900_000.0
    } else {
        0.1 * (2_000_000.0 - rank) / 1_000_000.0
    };
    score.clamp(0.0, 1.0)
}

/// Diversity from how many distinct categories are high-value.
pub fn diversity(categories: &[String], high_value: &[String]) -> f64 {
    let distinct: Vec<&str> = categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .unique()
        .collect();
    if distinct.is_empty() {
        return NEUTRAL;
    }
    let hits = distinct
        .iter()
        .filter(|c| high_value.iter().any(|h| h.eq_ignore_ascii_case(c)))
        .count();
    match hits {
        0 => 0.4,
        1 => 0.7,
        _ => 1.0,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Scores candidates against a fixed keyword list, category set and weights.
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoreWeights,
    keywords: Vec<String>,
    high_value_categories: Vec<String>,
    high_priority: f64,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(&ScoringSettings::default())
    }
}

impl Scorer {
    pub fn new(settings: &ScoringSettings) -> Self {
        Self {
            weights: settings.weights,
            keywords: settings.keywords.clone(),
            high_value_categories: settings.high_value_categories.clone(),
            high_priority: settings.high_priority,
        }
    }

    /// Score in `[0, 1]`, rounded to three decimals.
    pub fn score(&self, candidate: &Candidate, now: DateTime<Utc>) -> f64 {
        self.explain(candidate, now).total
    }

    pub fn explain(&self, candidate: &Candidate, now: DateTime<Utc>) -> ScoreBreakdown {
        let text = format!("{} {}", candidate.title, candidate.body_text);
        let w = &self.weights;
        let urgency = Component::new(urgency(candidate.published_at, now), w.urgency);
        let relevance = Component::new(relevance(&text, &self.keywords), w.relevance);
        let credibility = Component::new(credibility(candidate.domain_rank), w.credibility);
        let diversity = Component::new(
            diversity(&candidate.categories, &self.high_value_categories),
            w.diversity,
        );

        let sum = urgency.contribution
            + relevance.contribution
            + credibility.contribution
            + diversity.contribution;
        let total = round3(sum.clamp(0.0, 1.0));

        debug!(
            total,
            urgency = urgency.score,
            relevance = relevance.score,
            credibility = credibility.score,
            diversity = diversity.score,
            "Scored candidate"
        );

        ScoreBreakdown {
            total,
            priority: PriorityLevel::from_score(total),
            urgency,
            relevance,
            credibility,
            diversity,
        }
    }

    pub fn is_high_priority(&self, score: f64) -> bool {
        score >= self.high_priority
    }
}
