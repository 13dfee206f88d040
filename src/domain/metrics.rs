//! Journal performance statistics.
//!
//! Computed over CLOSED entries only. A flat trade counts as a loss.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::journal::{ExitReason, JournalEntry, Outcome};

/// Ceiling on the Kelly fraction used for sizing.
pub const KELLY_CEILING: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfitFactor {
    Finite(f64),
    /// Gross profit with no losing trades.
    Infinite,
}

impl ProfitFactor {
    pub fn from_gross(gross_profit: f64, gross_loss: f64) -> Self {
        if gross_loss > 0.0 {
            ProfitFactor::Finite(gross_profit / gross_loss)
        } else if gross_profit > 0.0 {
            ProfitFactor::Infinite
        } else {
            ProfitFactor::Finite(0.0)
        }
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Finite(v) => write!(f, "{:.2}", v),
            ProfitFactor::Infinite => f.write_str("inf"),
        }
    }
}

impl Serialize for ProfitFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProfitFactor::Finite(v) => serializer.serialize_f64(*v),
            ProfitFactor::Infinite => serializer.serialize_str("inf"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub stopped_out: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub total_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: ProfitFactor,
    /// Average win over average loss; absent without losses.
    pub payoff_ratio: Option<f64>,
    pub kelly_fraction: f64,
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Kelly fraction `W - (1 - W) / R`, clamped to `[0, KELLY_CEILING]`.
/// With no losses on record the payoff is unbounded and the fraction tends to `W`.
pub fn kelly_fraction(win_rate: f64, payoff_ratio: Option<f64>) -> f64 {
    let raw = match payoff_ratio {
        None => win_rate,
        Some(r) if r > 0.0 => win_rate - (1.0 - win_rate) / r,
        Some(_) => 0.0,
    };
    raw.clamp(0.0, KELLY_CEILING)
}

impl JournalStats {
    pub fn compute<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> Self {
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut stopped_out = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut win_pct_sum = 0.0_f64;
        let mut loss_pct_sum = 0.0_f64;

        for entry in entries {
            let (Some(outcome), Some(pnl)) = (entry.outcome, entry.realized_pnl) else {
                continue;
            };
            let pct = entry.pnl_pct.unwrap_or(0.0);
            match outcome {
                Outcome::Win => {
                    wins += 1;
                    gross_profit += pnl;
                    win_pct_sum += pct;
                }
                Outcome::Loss => {
                    losses += 1;
                    gross_loss += pnl.abs();
                    loss_pct_sum += pct.abs();
                }
            }
            if entry.exit_reason == Some(ExitReason::StopLoss) {
                stopped_out += 1;
            }
        }

        let total_trades = wins + losses;
        let win_rate = mean(wins as f64, total_trades);
        let avg_win = mean(gross_profit, wins);
        let avg_loss = mean(gross_loss, losses);
        let payoff_ratio = (avg_loss > 0.0).then(|| avg_win / avg_loss);
        let kelly = if total_trades == 0 {
            0.0
        } else {
            kelly_fraction(win_rate, payoff_ratio)
        };

        JournalStats {
            total_trades,
            wins,
            losses,
            stopped_out,
            win_rate,
            avg_win,
            avg_loss,
            avg_win_pct: mean(win_pct_sum, wins),
            avg_loss_pct: mean(loss_pct_sum, losses),
            total_pnl: gross_profit - gross_loss,
            gross_profit,
            gross_loss,
            profit_factor: ProfitFactor::from_gross(gross_profit, gross_loss),
            payoff_ratio,
            kelly_fraction: kelly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStats {
    pub strategy: String,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
}

/// Closed-trade results per strategy tag, best total P&L first.
pub fn strategy_breakdown<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> Vec<StrategyStats> {
    let mut groups: BTreeMap<&str, Vec<&JournalEntry>> = BTreeMap::new();
    for entry in entries {
        if entry.outcome.is_some() {
            groups.entry(entry.strategy.as_str()).or_default().push(entry);
        }
    }

    let mut rows: Vec<StrategyStats> = groups
        .into_iter()
        .map(|(strategy, group)| {
            let stats = JournalStats::compute(group);
            StrategyStats {
                strategy: strategy.to_string(),
                trades: stats.total_trades,
                wins: stats.wins,
                losses: stats.losses,
                win_rate: stats.win_rate,
                total_pnl: stats.total_pnl,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total_pnl.total_cmp(&a.total_pnl));
    rows
}
