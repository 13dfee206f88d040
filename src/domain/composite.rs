//! Composite scoring over the six signal domains.
//!
//! Each domain contributes a sub-score on a common [-100, +100] scale. Absent
//! domains are dropped and the weights of the present ones are rescaled so the
//! composite stays on the same scale regardless of coverage.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::TradegateError;

pub const SCORE_MIN: f64 = -100.0;
pub const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Technical,
    Sentiment,
    Fundamental,
    Volume,
    News,
    FundFlow,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Technical,
        Domain::Sentiment,
        Domain::Fundamental,
        Domain::Volume,
        Domain::News,
        Domain::FundFlow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Technical => "technical",
            Domain::Sentiment => "sentiment",
            Domain::Fundamental => "fundamental",
            Domain::Volume => "volume",
            Domain::News => "news",
            Domain::FundFlow => "fund_flow",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown domain '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        };
        f.write_str(s)
    }
}

/// One domain's normalized input for a single evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub domain: Domain,
    pub value: Option<f64>,
    pub confidence: Confidence,
    pub observed_at: Option<NaiveDateTime>,
}

impl SubScore {
    pub fn present(domain: Domain, value: f64, confidence: Confidence) -> Self {
        SubScore {
            domain,
            value: Some(value),
            confidence,
            observed_at: None,
        }
    }

    pub fn absent(domain: Domain) -> Self {
        SubScore {
            domain,
            value: None,
            confidence: Confidence::Low,
            observed_at: None,
        }
    }

    pub fn observed(mut self, at: NaiveDateTime) -> Self {
        self.observed_at = Some(at);
        self
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some_and(f64::is_finite)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub technical: f64,
    pub sentiment: f64,
    pub fundamental: f64,
    pub volume: f64,
    pub news: f64,
    pub fund_flow: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            technical: 0.25,
            sentiment: 0.20,
            fundamental: 0.20,
            volume: 0.15,
            news: 0.10,
            fund_flow: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn weight(&self, domain: Domain) -> f64 {
        match domain {
            Domain::Technical => self.technical,
            Domain::Sentiment => self.sentiment,
            Domain::Fundamental => self.fundamental,
            Domain::Volume => self.volume,
            Domain::News => self.news,
            Domain::FundFlow => self.fund_flow,
        }
    }

    pub fn total(&self) -> f64 {
        Domain::ALL.iter().map(|d| self.weight(*d)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub domain: Domain,
    pub value: f64,
    pub configured_weight: f64,
    pub effective_weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub symbol: String,
    pub value: f64,
    pub contributing_domains: BTreeSet<Domain>,
    pub confidence: Confidence,
    pub breakdown: Vec<Contribution>,
    pub observed_at: Option<NaiveDateTime>,
}

/// Confidence from the number of contributing domains.
pub fn coverage_confidence(present: usize) -> Confidence {
    match present {
        n if n >= 5 => Confidence::High,
        3 | 4 => Confidence::Medium,
        _ => Confidence::Low,
    }
}

pub fn compute_composite(
    symbol: &str,
    scores: &[SubScore],
    weights: &ScoringWeights,
) -> Result<CompositeScore, TradegateError> {
    let mut seen = BTreeSet::new();
    let mut present: Vec<&SubScore> = Vec::with_capacity(scores.len());

    for score in scores {
        if !seen.insert(score.domain) {
            return Err(TradegateError::Input {
                source_name: symbol.to_string(),
                reason: format!("duplicate sub-score for domain {}", score.domain),
            });
        }
        if score.is_present() {
            present.push(score);
        }
    }

    let observed_at = check_same_observation(symbol, &present)?;

    let weight_sum: f64 = present.iter().map(|s| weights.weight(s.domain)).sum();
    if present.is_empty() || weight_sum <= 0.0 {
        return Err(TradegateError::InsufficientSignal {
            symbol: symbol.to_string(),
        });
    }

    let mut breakdown = Vec::with_capacity(present.len());
    let mut composite = 0.0;
    for score in &present {
        let value = score.value.unwrap_or(0.0).clamp(SCORE_MIN, SCORE_MAX);
        let configured_weight = weights.weight(score.domain);
        let effective_weight = configured_weight / weight_sum;
        let contribution = value * effective_weight;
        composite += contribution;
        breakdown.push(Contribution {
            domain: score.domain,
            value,
            configured_weight,
            effective_weight,
            contribution,
        });
    }

    Ok(CompositeScore {
        symbol: symbol.to_string(),
        value: composite.clamp(SCORE_MIN, SCORE_MAX),
        contributing_domains: present.iter().map(|s| s.domain).collect(),
        confidence: coverage_confidence(present.len()),
        breakdown,
        observed_at,
    })
}

fn check_same_observation(
    symbol: &str,
    present: &[&SubScore],
) -> Result<Option<NaiveDateTime>, TradegateError> {
    let mut anchor: Option<(Domain, NaiveDateTime)> = None;
    for score in present {
        let Some(at) = score.observed_at else {
            continue;
        };
        match anchor {
            None => anchor = Some((score.domain, at)),
            Some((_, expected)) if expected != at => {
                return Err(TradegateError::MismatchedObservation {
                    symbol: symbol.to_string(),
                    domain: score.domain.to_string(),
                    expected: expected.to_string(),
                    found: at.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(anchor.map(|(_, at)| at))
}
