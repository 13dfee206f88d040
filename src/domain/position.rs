//! Positions and ledger transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            other => Err(format!("unknown trade action '{}'", other)),
        }
    }
}

/// Immutable record of one fill. `amount` is always `shares * price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub shares: u64,
    pub price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: u64,
    pub avg_cost: f64,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.shares as f64 * self.avg_cost
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.shares as f64 * (price - self.avg_cost)
    }

    /// Fractional return against average cost, e.g. -0.15 for a 15% loss.
    pub fn pnl_pct(&self, price: f64) -> f64 {
        if self.avg_cost <= 0.0 {
            return 0.0;
        }
        (price - self.avg_cost) / self.avg_cost
    }

    pub fn should_stop_loss(&self, price: f64, stop_loss_pct: f64) -> bool {
        self.pnl_pct(price) <= stop_loss_pct
    }

    /// Weighted-average cost after adding `shares` at `price`.
    pub fn averaged_with(&self, shares: u64, price: f64) -> f64 {
        let total = self.shares + shares;
        if total == 0 {
            return self.avg_cost;
        }
        (self.cost_basis() + shares as f64 * price) / total as f64
    }
}
