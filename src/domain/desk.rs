//! Operations over a persisted book.
//!
//! Every mutation computes its changes against the book read inside the
//! store's exclusive transaction, so two writers can never act on the same
//! stale state. Read operations work on one consistent load.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::book::{Book, Change};
use super::config::EngineConfig;
use super::error::TradegateError;
use super::journal::{CloseTarget, ExitReason, JournalEntry, TradeMeta};
use super::metrics::{strategy_breakdown, JournalStats, StrategyStats};
use super::plan::{build_plan, ActionPlan};
use super::portfolio::{normalize_symbol, quotes_from, Quote, Quotes, Valuation};
use super::position::{Position, TradeAction, Transaction};
use super::risk::{self, RiskReport, RiskVerdict, Severity, VerdictStatus};
use super::snapshot::{session_date, PortfolioSnapshot};
use crate::ports::market_port::MarketPort;
use crate::ports::store_port::BookStore;

/// How much of a position to sell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SellQuantity {
    Shares(u64),
    Amount(f64),
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReceipt {
    pub transaction: Transaction,
    /// Entries the trade opened, exited or booked.
    pub entries: Vec<JournalEntry>,
    pub cash_after: f64,
    pub position_after: Option<Position>,
    /// Pre-trade check a BUY went through.
    pub verdict: Option<RiskVerdict>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub session: NaiveDate,
    pub initial_cash: f64,
    pub valuation: Valuation,
    pub unrealized_pnl: f64,
    /// Total value against initial cash, as a fraction.
    pub total_return: f64,
    pub recent: Vec<Transaction>,
    pub open_entries: Vec<JournalEntry>,
}

pub struct Desk<'a> {
    store: &'a dyn BookStore,
    config: &'a EngineConfig,
}

impl<'a> Desk<'a> {
    pub fn new(store: &'a dyn BookStore, config: &'a EngineConfig) -> Self {
        Desk { store, config }
    }

    fn trade(
        &self,
        prepare: impl Fn(&Book) -> Result<(Change, Option<RiskVerdict>), TradegateError>,
    ) -> Result<TradeReceipt, TradegateError> {
        let mut made: Option<(Change, Option<RiskVerdict>)> = None;
        let book = self.store.transact(&mut |book: &Book| {
            let (change, verdict) = prepare(book)?;
            made = Some((change.clone(), verdict));
            Ok(vec![change])
        })?;
        let (transaction, entries, verdict) = match made {
            Some((Change::Trade { transaction, entry }, verdict)) => {
                (transaction, vec![entry], verdict)
            }
            Some((Change::Exit { transaction, entries }, verdict)) => {
                (transaction, entries, verdict)
            }
            _ => {
                return Err(TradegateError::Database {
                    reason: "store committed without running the trade".to_string(),
                });
            }
        };

        info!(
            id = transaction.id,
            symbol = %transaction.symbol,
            action = %transaction.action,
            shares = transaction.shares,
            price = transaction.price,
            cash = book.ledger.cash(),
            "trade recorded"
        );
        Ok(TradeReceipt {
            cash_after: book.ledger.cash(),
            position_after: book.ledger.position(&transaction.symbol).cloned(),
            transaction,
            entries,
            verdict,
        })
    }

    /// Pre-trade check run against the book inside the write transaction.
    /// The traded symbol is valued at the order price; other holdings
    /// without a quote fall back to cost. A REDUCED verdict's adjusted
    /// amount is what the BUY may spend.
    fn gate_buy(
        &self,
        book: &Book,
        symbol: &str,
        amount: f64,
        price: f64,
    ) -> Result<RiskVerdict, TradegateError> {
        let quotes = quotes_from(vec![Quote {
            symbol: normalize_symbol(symbol),
            price,
            volatility: None,
            sector: None,
        }]);
        let verdict = risk::check_buy(
            symbol,
            amount,
            &book.ledger.value(&quotes),
            &quotes,
            book.snapshots.latest(),
            &self.config.limits,
        )?;
        let refusal = match verdict.status {
            VerdictStatus::Blocked => {
                verdict.findings.iter().find(|f| f.severity == Severity::Block)
            }
            VerdictStatus::Reduced if verdict.adjusted_amount <= 0.0 => {
                verdict.findings.iter().find(|f| f.severity == Severity::Reduce)
            }
            _ => None,
        };
        if let Some(f) = refusal {
            return Err(TradegateError::invalid_order(format!(
                "risk check refused BUY {}: {} (margin {:.4}): {}",
                verdict.symbol, f.rule, f.margin, f.message
            )));
        }
        if verdict.status == VerdictStatus::Reduced {
            warn!(
                symbol = %verdict.symbol,
                requested = amount,
                approved = verdict.adjusted_amount,
                "BUY reduced to the position limit"
            );
        }
        Ok(verdict)
    }

    pub fn buy(
        &self,
        symbol: &str,
        amount: f64,
        price: f64,
        meta: &TradeMeta,
        now: DateTime<Utc>,
    ) -> Result<TradeReceipt, TradegateError> {
        self.trade(|book| {
            let requested = book.ledger.prepare_buy(symbol, amount, price, now)?;
            let verdict = self.gate_buy(book, symbol, amount, price)?;
            let transaction = if verdict.status == VerdictStatus::Reduced {
                book.ledger
                    .prepare_buy(symbol, verdict.adjusted_amount, price, now)?
            } else {
                requested
            };
            let entry = book
                .journal
                .prepare_open(&transaction, meta, &self.config.default_strategy);
            Ok((Change::Trade { transaction, entry }, Some(verdict)))
        })
    }

    pub fn sell(
        &self,
        symbol: &str,
        quantity: SellQuantity,
        price: f64,
        meta: &TradeMeta,
        now: DateTime<Utc>,
    ) -> Result<TradeReceipt, TradegateError> {
        self.trade(|book| {
            let amount = match quantity {
                SellQuantity::Amount(a) => a,
                SellQuantity::Shares(n) => n as f64 * price,
                SellQuantity::All => {
                    let held = book
                        .ledger
                        .position(&normalize_symbol(symbol))
                        .map(|p| p.shares)
                        .unwrap_or(0);
                    held as f64 * price
                }
            };
            let transaction = book.ledger.prepare_sell(symbol, amount, price, now)?;
            let avg_cost = book
                .ledger
                .position(&transaction.symbol)
                .map(|p| p.avg_cost)
                .unwrap_or(transaction.price);
            let entries = book.journal.prepare_exit(
                &transaction,
                avg_cost,
                meta,
                &self.config.default_strategy,
            );
            Ok((Change::Exit { transaction, entries }, None))
        })
    }

    pub fn close(
        &self,
        target: &CloseTarget,
        exit_price: f64,
        reason: ExitReason,
        lessons: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, TradegateError> {
        let mut closed: Option<JournalEntry> = None;
        self.store.transact(&mut |book: &Book| {
            let entry = book
                .journal
                .prepare_close(target, exit_price, reason, lessons, now)?;
            closed = Some(entry.clone());
            Ok(vec![Change::CloseEntry(entry)])
        })?;
        let entry = closed.ok_or_else(|| TradegateError::Database {
            reason: "store committed without closing the entry".to_string(),
        })?;
        info!(
            id = entry.id,
            symbol = %entry.symbol,
            pnl = entry.realized_pnl.unwrap_or(0.0),
            reason = %reason,
            "journal entry closed"
        );
        Ok(entry)
    }

    pub fn add_lessons(&self, entry_id: u64, text: &str) -> Result<JournalEntry, TradegateError> {
        if text.trim().is_empty() {
            return Err(TradegateError::invalid_order("lessons text is empty"));
        }
        let book = self.store.transact(&mut |book: &Book| {
            if book.journal.get(entry_id).is_none() {
                return Err(TradegateError::NotFound {
                    what: format!("journal entry #{}", entry_id),
                });
            }
            Ok(vec![Change::AppendLessons {
                entry_id,
                text: text.to_string(),
            }])
        })?;
        book.journal
            .get(entry_id)
            .cloned()
            .ok_or_else(|| TradegateError::NotFound {
                what: format!("journal entry #{}", entry_id),
            })
    }

    /// Record today's session snapshot, overwriting an earlier one for the
    /// same session date.
    pub fn record_snapshot(
        &self,
        quotes: &Quotes,
        now: DateTime<Utc>,
    ) -> Result<PortfolioSnapshot, TradegateError> {
        let date = session_date(now, self.config.utc_offset_hours);
        let mut recorded: Option<PortfolioSnapshot> = None;
        self.store.transact(&mut |book: &Book| {
            let valuation = book.ledger.value(quotes);
            let snapshot = book.snapshots.prepare(date, &valuation, now);
            recorded = Some(snapshot.clone());
            Ok(vec![Change::UpsertSnapshot(snapshot)])
        })?;
        let snapshot = recorded.ok_or_else(|| TradegateError::Database {
            reason: "store committed without a snapshot".to_string(),
        })?;
        info!(
            date = %snapshot.date,
            total = snapshot.total_value,
            daily_pnl_pct = snapshot.daily_pnl_pct,
            "snapshot recorded"
        );
        Ok(snapshot)
    }

    pub fn check_buy(&self, symbol: &str, amount: f64, quotes: &Quotes) -> Result<RiskVerdict, TradegateError> {
        let book = self.store.load()?;
        let valuation = book.ledger.value(quotes);
        risk::check_buy(
            symbol,
            amount,
            &valuation,
            quotes,
            book.snapshots.latest(),
            &self.config.limits,
        )
    }

    pub fn report(&self, quotes: &Quotes, now: DateTime<Utc>) -> Result<RiskReport, TradegateError> {
        let book = self.store.load()?;
        Ok(risk::report(
            session_date(now, self.config.utc_offset_hours),
            &book.ledger.value(quotes),
            book.snapshots.latest(),
            &self.config.limits,
            &self.config.heat,
            self.config.sizing.min_ticket,
        ))
    }

    pub fn status(&self, quotes: &Quotes, recent: usize, now: DateTime<Utc>) -> Result<StatusView, TradegateError> {
        let book = self.store.load()?;
        let valuation = book.ledger.value(quotes);
        let initial_cash = book.ledger.initial_cash();
        Ok(StatusView {
            session: session_date(now, self.config.utc_offset_hours),
            initial_cash,
            unrealized_pnl: valuation.holdings.iter().map(|h| h.unrealized_pnl).sum(),
            total_return: if initial_cash > 0.0 {
                valuation.total_value / initial_cash - 1.0
            } else {
                0.0
            },
            recent: book.ledger.recent(recent).cloned().collect(),
            open_entries: book.journal.open_entries().cloned().collect(),
            valuation,
        })
    }

    pub fn winrate(&self) -> Result<JournalStats, TradegateError> {
        let book = self.store.load()?;
        Ok(JournalStats::compute(book.journal.entries()))
    }

    pub fn strategies(&self) -> Result<Vec<StrategyStats>, TradegateError> {
        let book = self.store.load()?;
        Ok(strategy_breakdown(book.journal.entries()))
    }

    /// Journal entries, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<JournalEntry>, TradegateError> {
        let book = self.store.load()?;
        Ok(book.journal.history(limit).into_iter().cloned().collect())
    }

    pub fn plan(
        &self,
        market: &dyn MarketPort,
        budget: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<ActionPlan, TradegateError> {
        let book = self.store.load()?;
        build_plan(&book, market, self.config, budget, now)
    }
}

/// Book action of a receipt's transaction, for display.
pub fn receipt_verb(receipt: &TradeReceipt) -> &'static str {
    match receipt.transaction.action {
        TradeAction::Buy => "Bought",
        TradeAction::Sell => "Sold",
    }
}
