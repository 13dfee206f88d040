//! Portfolio ledger: append-only transactions folded into cash and positions.
//!
//! `Ledger` never mutates state except through `apply`, which is also what
//! `replay` uses, so a ledger rebuilt from its transactions is identical to
//! the one that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::error::TradegateError;
use super::position::{Position, TradeAction, Transaction};

pub const CASH_EPSILON: f64 = 1e-6;
pub const UNKNOWN_SECTOR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    initial_cash: f64,
    cash: f64,
    positions: BTreeMap<String, Position>,
    transactions: Vec<Transaction>,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn whole_shares(amount: f64, price: f64) -> u64 {
    // Tolerate representation error so 3000 / 30 is 100 shares, not 99.
    ((amount / price) + 1e-9).floor().max(0.0) as u64
}

fn check_order_inputs(symbol: &str, amount: f64, price: f64) -> Result<(), TradegateError> {
    if symbol.is_empty() {
        return Err(TradegateError::invalid_order("symbol is empty"));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TradegateError::invalid_order(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(TradegateError::invalid_order(format!(
            "price must be positive, got {}",
            price
        )));
    }
    Ok(())
}

impl Ledger {
    pub fn new(initial_cash: f64) -> Self {
        Ledger {
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }

    pub fn replay(
        initial_cash: f64,
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> Result<Self, TradegateError> {
        let mut ledger = Ledger::new(initial_cash);
        for tx in transactions {
            ledger.apply(tx)?;
        }
        Ok(ledger)
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Most recent transactions first.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().rev().take(limit)
    }

    pub fn next_transaction_id(&self) -> u64 {
        self.transactions.last().map(|t| t.id + 1).unwrap_or(1)
    }

    pub fn prepare_buy(
        &self,
        symbol: &str,
        amount: f64,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<Transaction, TradegateError> {
        let symbol = normalize_symbol(symbol);
        check_order_inputs(&symbol, amount, price)?;
        // The requested amount is what must be covered, not the floored cost.
        if amount > self.cash + CASH_EPSILON {
            return Err(TradegateError::invalid_order(format!(
                "insufficient cash: requested {:.2}, have {:.2}",
                amount, self.cash
            )));
        }

        let shares = whole_shares(amount, price);
        if shares == 0 {
            return Err(TradegateError::invalid_order(format!(
                "{:.2} buys zero shares of {} at {:.2}",
                amount, symbol, price
            )));
        }
        let cost = shares as f64 * price;

        Ok(Transaction {
            id: self.next_transaction_id(),
            timestamp: at,
            symbol,
            action: TradeAction::Buy,
            shares,
            price,
            amount: cost,
        })
    }

    pub fn prepare_sell(
        &self,
        symbol: &str,
        amount: f64,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<Transaction, TradegateError> {
        let symbol = normalize_symbol(symbol);
        check_order_inputs(&symbol, amount, price)?;

        let held = self
            .positions
            .get(&symbol)
            .map(|p| p.shares)
            .ok_or_else(|| TradegateError::invalid_order(format!("no position in {}", symbol)))?;

        let shares = whole_shares(amount, price).min(held);
        if shares == 0 {
            return Err(TradegateError::invalid_order(format!(
                "{:.2} sells zero shares of {} at {:.2}",
                amount, symbol, price
            )));
        }

        Ok(Transaction {
            id: self.next_transaction_id(),
            timestamp: at,
            symbol,
            action: TradeAction::Sell,
            shares,
            price,
            amount: shares as f64 * price,
        })
    }

    /// Fold one transaction into cash and positions.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), TradegateError> {
        let expected_id = self.next_transaction_id();
        if tx.id != expected_id {
            return Err(TradegateError::invalid_order(format!(
                "transaction id {} out of sequence, expected {}",
                tx.id, expected_id
            )));
        }
        if tx.shares == 0 || tx.price.is_nan() || tx.price <= 0.0 {
            return Err(TradegateError::invalid_order(format!(
                "transaction {} has no shares or no price",
                tx.id
            )));
        }
        if (tx.amount - tx.shares as f64 * tx.price).abs() > CASH_EPSILON {
            return Err(TradegateError::invalid_order(format!(
                "transaction {} amount {} is not shares x price",
                tx.id, tx.amount
            )));
        }

        match tx.action {
            TradeAction::Buy => {
                if tx.amount > self.cash + CASH_EPSILON {
                    return Err(TradegateError::invalid_order(format!(
                        "transaction {} spends {:.2} with only {:.2} cash",
                        tx.id, tx.amount, self.cash
                    )));
                }
                let position = self
                    .positions
                    .entry(tx.symbol.clone())
                    .or_insert_with(|| Position {
                        symbol: tx.symbol.clone(),
                        shares: 0,
                        avg_cost: tx.price,
                    });
                position.avg_cost = position.averaged_with(tx.shares, tx.price);
                position.shares += tx.shares;
                self.cash -= tx.amount;
            }
            TradeAction::Sell => {
                let Some(position) = self.positions.get_mut(&tx.symbol) else {
                    return Err(TradegateError::invalid_order(format!(
                        "transaction {} sells {} with no position",
                        tx.id, tx.symbol
                    )));
                };
                if tx.shares > position.shares {
                    return Err(TradegateError::invalid_order(format!(
                        "transaction {} sells {} shares of {} with only {} held",
                        tx.id, tx.shares, tx.symbol, position.shares
                    )));
                }
                position.shares -= tx.shares;
                if position.shares == 0 {
                    self.positions.remove(&tx.symbol);
                }
                self.cash += tx.amount;
            }
        }

        self.transactions.push(tx);
        Ok(())
    }

    pub fn value(&self, quotes: &Quotes) -> Valuation {
        let holdings: Vec<Holding> = self
            .positions
            .values()
            .map(|p| Holding::of(p, quotes.get(&p.symbol)))
            .collect();
        let holdings_value = holdings.iter().map(|h| h.market_value).sum();
        Valuation {
            cash: self.cash,
            holdings_value,
            total_value: self.cash + holdings_value,
            holdings,
        }
    }
}

/// Latest market data for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub volatility: Option<f64>,
    pub sector: Option<String>,
}

pub type Quotes = HashMap<String, Quote>;

pub fn quotes_from(list: impl IntoIterator<Item = Quote>) -> Quotes {
    list.into_iter().map(|q| (q.symbol.clone(), q)).collect()
}

pub fn sector_of(quotes: &Quotes, symbol: &str) -> String {
    quotes
        .get(symbol)
        .and_then(|q| q.sector.clone())
        .unwrap_or_else(|| UNKNOWN_SECTOR.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Quote,
    Cost,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub symbol: String,
    pub shares: u64,
    pub avg_cost: f64,
    pub price: f64,
    pub price_source: PriceSource,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub pnl_pct: f64,
    pub sector: String,
    pub volatility: f64,
}

impl Holding {
    fn of(position: &Position, quote: Option<&Quote>) -> Self {
        let (price, price_source) = match quote {
            Some(q) if q.price > 0.0 => (q.price, PriceSource::Quote),
            _ => (position.avg_cost, PriceSource::Cost),
        };
        Holding {
            symbol: position.symbol.clone(),
            shares: position.shares,
            avg_cost: position.avg_cost,
            price,
            price_source,
            market_value: position.market_value(price),
            unrealized_pnl: position.unrealized_pnl(price),
            pnl_pct: position.pnl_pct(price),
            sector: quote
                .and_then(|q| q.sector.clone())
                .unwrap_or_else(|| UNKNOWN_SECTOR.to_string()),
            volatility: quote.and_then(|q| q.volatility).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Valuation {
    pub cash: f64,
    pub holdings_value: f64,
    pub total_value: f64,
    pub holdings: Vec<Holding>,
}

impl Valuation {
    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    pub fn market_value_of(&self, symbol: &str) -> f64 {
        self.holding(symbol).map(|h| h.market_value).unwrap_or(0.0)
    }

    pub fn deployment_pct(&self) -> f64 {
        if self.total_value <= 0.0 {
            return 0.0;
        }
        self.holdings_value / self.total_value
    }

    pub fn sector_values(&self) -> BTreeMap<String, f64> {
        let mut sectors = BTreeMap::new();
        for h in &self.holdings {
            *sectors.entry(h.sector.clone()).or_insert(0.0) += h.market_value;
        }
        sectors
    }
}
