//! Position sizing from conviction, Kelly fraction and the risk-approved amount.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::composite::Confidence;
use super::metrics::JournalStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    pub min_ticket: f64,
    pub default_kelly: f64,
    pub min_trades_for_kelly: usize,
    /// Board lot; 1 disables lot rounding.
    pub lot_size: u64,
    pub conviction_floor: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        SizingConfig {
            min_ticket: 5_000.0,
            default_kelly: 0.10,
            min_trades_for_kelly: 20,
            lot_size: 1,
            conviction_floor: 0.3,
        }
    }
}

pub fn confidence_factor(confidence: Confidence) -> f64 {
    match confidence {
        Confidence::High => 1.0,
        Confidence::Medium => 0.75,
        Confidence::Low => 0.5,
    }
}

/// `|composite| * confidence factor`, in [0, 100].
pub fn conviction(composite: f64, confidence: Confidence) -> f64 {
    composite.abs().min(100.0) * confidence_factor(confidence)
}

/// Conviction as a budget multiplier, floored so a qualifying signal never
/// sizes to nothing.
pub fn conviction_weight(composite: f64, confidence: Confidence, config: &SizingConfig) -> f64 {
    (conviction(composite, confidence) / 100.0).clamp(config.conviction_floor, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KellySource {
    Journal,
    Default,
}

/// The journal's Kelly fraction once enough trades are closed, else the default.
pub fn kelly_for_sizing(stats: Option<&JournalStats>, config: &SizingConfig) -> (f64, KellySource) {
    match stats {
        Some(s) if s.total_trades >= config.min_trades_for_kelly => {
            (s.kelly_fraction, KellySource::Journal)
        }
        _ => (config.default_kelly, KellySource::Default),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingRequest {
    pub budget: f64,
    pub approved_amount: f64,
    pub composite: f64,
    pub confidence: Confidence,
    pub total_value: f64,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "UPPERCASE")]
pub enum SizingDecision {
    Order { amount: f64, shares: Option<u64> },
    Hold { reason: String },
}

impl fmt::Display for SizingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingDecision::Order {
                amount,
                shares: Some(shares),
            } => write!(f, "ORDER {:.2} ({} shares)", amount, shares),
            SizingDecision::Order { amount, .. } => write!(f, "ORDER {:.2}", amount),
            SizingDecision::Hold { reason } => write!(f, "HOLD ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizedOrder {
    pub conviction: f64,
    pub conviction_weight: f64,
    pub kelly_fraction: f64,
    pub kelly_source: KellySource,
    pub budget_amount: f64,
    pub kelly_cap: f64,
    pub approved_amount: f64,
    pub decision: SizingDecision,
}

impl SizedOrder {
    pub fn amount(&self) -> f64 {
        match self.decision {
            SizingDecision::Order { amount, .. } => amount,
            SizingDecision::Hold { .. } => 0.0,
        }
    }
}

pub fn size(request: &SizingRequest, stats: Option<&JournalStats>, config: &SizingConfig) -> SizedOrder {
    let conviction = conviction(request.composite, request.confidence);
    let conviction_weight = conviction_weight(request.composite, request.confidence, config);
    let (kelly_fraction, kelly_source) = kelly_for_sizing(stats, config);

    let budget_amount = request.budget.max(0.0) * conviction_weight;
    let kelly_cap = kelly_fraction * request.total_value.max(0.0);
    let approved_amount = request.approved_amount.max(0.0);
    let mut amount = budget_amount.min(approved_amount).min(kelly_cap);

    let mut shares = None;
    if let Some(price) = request.price.filter(|p| *p > 0.0) {
        let lot = config.lot_size.max(1);
        let lots = (amount / price / lot as f64 + 1e-9).floor().max(0.0) as u64;
        let rounded = lots * lot;
        amount = rounded as f64 * price;
        shares = Some(rounded);
    }

    let decision = if amount <= 0.0 || amount < config.min_ticket {
        SizingDecision::Hold {
            reason: format!(
                "below minimum size: {:.2} is under the {:.2} minimum ticket",
                amount, config.min_ticket
            ),
        }
    } else {
        SizingDecision::Order { amount, shares }
    };

    SizedOrder {
        conviction,
        conviction_weight,
        kelly_fraction,
        kelly_source,
        budget_amount,
        kelly_cap,
        approved_amount,
        decision,
    }
}
