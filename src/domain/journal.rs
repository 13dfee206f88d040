//! Trade journal.
//!
//! A BUY opens one entry. A SELL exits open BUY entries for its symbol
//! oldest first at the sale price, settling each entry once all of its shares
//! are gone. Entries can also be closed explicitly, and once closed only the
//! lessons text may change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::TradegateError;
use super::portfolio::normalize_symbol;
use super::position::{TradeAction, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Manual,
    StopLoss,
}

macro_rules! str_enum {
    ($ty:ident { $($variant:path => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($ty), other)),
                }
            }
        }
    };
}

str_enum!(EntryStatus { EntryStatus::Open => "OPEN", EntryStatus::Closed => "CLOSED" });
str_enum!(Outcome { Outcome::Win => "WIN", Outcome::Loss => "LOSS" });
str_enum!(ExitReason { ExitReason::Manual => "manual", ExitReason::StopLoss => "stop_loss" });

/// Caller-supplied context recorded with a new trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeMeta {
    pub strategy: Option<String>,
    pub reasoning: String,
    pub signal_context: Option<serde_json::Value>,
}

/// Shares of an entry taken out by one SELL transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryExit {
    pub transaction_id: u64,
    pub shares: u64,
    pub price: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: u64,
    pub transaction_id: u64,
    pub symbol: String,
    pub action: TradeAction,
    pub entry_price: f64,
    pub shares: u64,
    pub amount: f64,
    pub strategy: String,
    pub reasoning: String,
    pub signal_context: Option<serde_json::Value>,
    pub status: EntryStatus,
    pub opened_at: DateTime<Utc>,
    pub exit_price: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_pnl: Option<f64>,
    pub pnl_pct: Option<f64>,
    pub outcome: Option<Outcome>,
    pub exit_reason: Option<ExitReason>,
    pub lessons: Option<String>,
    #[serde(default)]
    pub exits: Vec<EntryExit>,
}

impl JournalEntry {
    pub fn is_open(&self) -> bool {
        self.status == EntryStatus::Open
    }

    /// Shares not yet taken out by a SELL.
    pub fn open_shares(&self) -> u64 {
        let exited: u64 = self.exits.iter().map(|x| x.shares).sum();
        self.shares.saturating_sub(exited)
    }

    /// Realized P&L if the open shares were closed at `exit_price`, on top of
    /// what earlier exits already realized.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        let exited: f64 = self
            .exits
            .iter()
            .map(|x| (x.price - self.entry_price) * x.shares as f64)
            .sum();
        exited + (exit_price - self.entry_price) * self.open_shares() as f64
    }

    /// Mark closed with the remaining shares going out at `exit_price`. The
    /// recorded exit price is the share-weighted average over all exits.
    fn settle(&mut self, exit_price: f64, reason: ExitReason, at: DateTime<Utc>) {
        let pnl = self.pnl_at(exit_price);
        let proceeds: f64 = self
            .exits
            .iter()
            .map(|x| x.price * x.shares as f64)
            .sum::<f64>()
            + exit_price * self.open_shares() as f64;
        let basis = self.entry_price * self.shares as f64;
        self.status = EntryStatus::Closed;
        self.exit_price = Some(if self.shares > 0 {
            proceeds / self.shares as f64
        } else {
            exit_price
        });
        self.closed_at = Some(at);
        self.realized_pnl = Some(pnl);
        self.pnl_pct = Some(if basis > 0.0 { pnl / basis * 100.0 } else { 0.0 });
        self.outcome = Some(if pnl > 0.0 { Outcome::Win } else { Outcome::Loss });
        self.exit_reason = Some(reason);
    }
}

/// How to pick the entry to close.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseTarget {
    /// Oldest open entry for the symbol.
    Symbol(String),
    Id(u64),
}

impl fmt::Display for CloseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseTarget::Symbol(s) => write!(f, "open journal entry for {}", s),
            CloseTarget::Id(id) => write!(f, "open journal entry #{}", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn from_entries(mut entries: Vec<JournalEntry>) -> Self {
        entries.sort_by_key(|e| e.id);
        Journal { entries }
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn get(&self, id: u64) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn next_entry_id(&self) -> u64 {
        self.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }

    pub fn open_entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter().filter(|e| e.is_open())
    }

    pub fn closed_entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter().filter(|e| !e.is_open())
    }

    /// Newest first.
    pub fn history(&self, limit: usize) -> Vec<&JournalEntry> {
        let mut all: Vec<&JournalEntry> = self.entries.iter().collect();
        all.sort_by(|a, b| b.opened_at.cmp(&a.opened_at).then(b.id.cmp(&a.id)));
        all.truncate(limit);
        all
    }

    pub fn for_transaction(&self, transaction_id: u64) -> Option<&JournalEntry> {
        self.entries
            .iter()
            .find(|e| e.transaction_id == transaction_id)
    }

    pub fn prepare_open(&self, tx: &Transaction, meta: &TradeMeta, default_strategy: &str) -> JournalEntry {
        let strategy = meta
            .strategy
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_strategy)
            .to_string();
        JournalEntry {
            id: self.next_entry_id(),
            transaction_id: tx.id,
            symbol: tx.symbol.clone(),
            action: tx.action,
            entry_price: tx.price,
            shares: tx.shares,
            amount: tx.amount,
            strategy,
            reasoning: meta.reasoning.clone(),
            signal_context: meta.signal_context.clone(),
            status: EntryStatus::Open,
            opened_at: tx.timestamp,
            exit_price: None,
            closed_at: None,
            realized_pnl: None,
            pnl_pct: None,
            outcome: None,
            exit_reason: None,
            lessons: None,
            exits: Vec::new(),
        }
    }

    /// Journal side of a SELL. Open BUY entries for the symbol give up shares
    /// oldest first at the sale price; an entry with no shares left is
    /// settled. Shares no open entry covers are booked as one closed entry of
    /// the SELL itself, priced against the position's average cost.
    pub fn prepare_exit(
        &self,
        tx: &Transaction,
        avg_cost: f64,
        meta: &TradeMeta,
        default_strategy: &str,
    ) -> Vec<JournalEntry> {
        let mut open: Vec<&JournalEntry> = self
            .open_entries()
            .filter(|e| e.symbol == tx.symbol && e.action == TradeAction::Buy)
            .collect();
        open.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then(a.id.cmp(&b.id)));

        let mut remaining = tx.shares;
        let mut touched = Vec::new();
        for entry in open {
            let take = remaining.min(entry.open_shares());
            if take == 0 {
                continue;
            }
            let mut updated = entry.clone();
            updated.exits.push(EntryExit {
                transaction_id: tx.id,
                shares: take,
                price: tx.price,
                at: tx.timestamp,
            });
            if updated.open_shares() == 0 {
                updated.settle(tx.price, ExitReason::Manual, tx.timestamp);
            }
            touched.push(updated);
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }

        if remaining > 0 {
            let mut booked = self.prepare_open(tx, meta, default_strategy);
            booked.shares = remaining;
            booked.entry_price = avg_cost;
            booked.amount = remaining as f64 * avg_cost;
            booked.settle(tx.price, ExitReason::Manual, tx.timestamp);
            touched.push(booked);
        }
        touched
    }

    fn find_open(&self, target: &CloseTarget) -> Option<&JournalEntry> {
        match target {
            CloseTarget::Id(id) => self.get(*id).filter(|e| e.is_open()),
            CloseTarget::Symbol(symbol) => {
                let symbol = normalize_symbol(symbol);
                self.open_entries()
                    .filter(|e| e.symbol == symbol)
                    .min_by(|a, b| a.opened_at.cmp(&b.opened_at).then(a.id.cmp(&b.id)))
            }
        }
    }

    /// Build the closed form of the matching open entry.
    pub fn prepare_close(
        &self,
        target: &CloseTarget,
        exit_price: f64,
        reason: ExitReason,
        lessons: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<JournalEntry, TradegateError> {
        if !exit_price.is_finite() || exit_price <= 0.0 {
            return Err(TradegateError::invalid_order(format!(
                "exit price must be positive, got {}",
                exit_price
            )));
        }
        let open = self.find_open(target).ok_or_else(|| TradegateError::NotFound {
            what: target.to_string(),
        })?;

        let mut closed = open.clone();
        closed.settle(exit_price, reason, at);
        if let Some(text) = lessons.filter(|t| !t.trim().is_empty()) {
            closed.lessons = Some(append_lessons(open.lessons.as_deref(), text));
        }
        Ok(closed)
    }

    pub fn apply_open(&mut self, entry: JournalEntry) -> Result<(), TradegateError> {
        if self.get(entry.id).is_some() {
            return Err(TradegateError::invalid_order(format!(
                "journal entry #{} already exists",
                entry.id
            )));
        }
        if self.for_transaction(entry.transaction_id).is_some() {
            return Err(TradegateError::invalid_order(format!(
                "transaction {} already has a journal entry",
                entry.transaction_id
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Store an entry a SELL exited, or the closed entry it booked.
    pub fn apply_exit(&mut self, entry: JournalEntry) -> Result<(), TradegateError> {
        match self.entries.iter().position(|e| e.id == entry.id) {
            Some(i) if !self.entries[i].is_open() => Err(TradegateError::invalid_order(format!(
                "journal entry #{} is already closed",
                entry.id
            ))),
            Some(i) => {
                self.entries[i] = entry;
                Ok(())
            }
            None => self.apply_open(entry),
        }
    }

    pub fn apply_close(&mut self, closed: JournalEntry) -> Result<(), TradegateError> {
        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.id == closed.id)
            .ok_or_else(|| TradegateError::NotFound {
                what: format!("journal entry #{}", closed.id),
            })?;
        if !slot.is_open() {
            return Err(TradegateError::invalid_order(format!(
                "journal entry #{} is already closed",
                closed.id
            )));
        }
        *slot = closed;
        Ok(())
    }

    pub fn apply_lessons(&mut self, id: u64, text: &str) -> Result<&JournalEntry, TradegateError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| TradegateError::NotFound {
                what: format!("journal entry #{}", id),
            })?;
        entry.lessons = Some(append_lessons(entry.lessons.as_deref(), text));
        Ok(&*entry)
    }
}

fn append_lessons(existing: Option<&str>, text: &str) -> String {
    match existing {
        Some(prev) if !prev.is_empty() => format!("{}\n{}", prev, text.trim()),
        _ => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 3, 0, 0).unwrap()
    }

    fn tx(id: u64, symbol: &str, action: TradeAction, shares: u64, price: f64, day: u32) -> Transaction {
        Transaction {
            id,
            timestamp: at(day),
            symbol: symbol.to_string(),
            action,
            shares,
            price,
            amount: shares as f64 * price,
        }
    }

    fn open(journal: &mut Journal, t: &Transaction) -> u64 {
        let entry = journal.prepare_open(t, &TradeMeta::default(), "composite");
        let id = entry.id;
        journal.apply_open(entry).unwrap();
        id
    }

    #[test]
    fn open_entry_references_transaction() {
        let mut journal = Journal::default();
        let t = tx(1, "PTT", TradeAction::Buy, 140, 35.5, 1);
        let meta = TradeMeta {
            strategy: Some("breakout".into()),
            reasoning: "volume spike".into(),
            signal_context: Some(serde_json::json!({"composite": 65.0})),
        };
        let entry = journal.prepare_open(&t, &meta, "composite");
        assert_eq!(entry.id, 1);
        assert_eq!(entry.transaction_id, 1);
        assert_eq!(entry.strategy, "breakout");
        assert!(entry.is_open());
        journal.apply_open(entry).unwrap();
        assert!(journal.for_transaction(1).is_some());
    }

    #[test]
    fn default_strategy_when_blank() {
        let journal = Journal::default();
        let t = tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1);
        let meta = TradeMeta {
            strategy: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(journal.prepare_open(&t, &meta, "composite").strategy, "composite");
    }

    #[test]
    fn close_buy_win() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        let closed = journal
            .prepare_close(&CloseTarget::Symbol("ptt".into()), 12.0, ExitReason::Manual, None, at(5))
            .unwrap();
        assert!((closed.realized_pnl.unwrap() - 200.0).abs() < 1e-9);
        assert!((closed.pnl_pct.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(closed.outcome, Some(Outcome::Win));
        assert_eq!(closed.status, EntryStatus::Closed);
    }

    fn exit(journal: &mut Journal, t: &Transaction, avg_cost: f64) -> Vec<JournalEntry> {
        let touched = journal.prepare_exit(t, avg_cost, &TradeMeta::default(), "composite");
        for entry in touched.clone() {
            journal.apply_exit(entry).unwrap();
        }
        touched
    }

    #[test]
    fn full_sell_settles_the_buy_entry() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 140, 35.5, 1));
        let touched = exit(&mut journal, &tx(2, "PTT", TradeAction::Sell, 140, 38.0, 2), 35.5);

        assert_eq!(touched.len(), 1);
        let settled = journal.get(1).unwrap();
        assert_eq!(settled.status, EntryStatus::Closed);
        assert_eq!(settled.exit_price, Some(38.0));
        assert!((settled.realized_pnl.unwrap() - 350.0).abs() < 1e-9);
        assert_eq!(settled.outcome, Some(Outcome::Win));
        assert_eq!(settled.closed_at, Some(at(2)));
        assert_eq!(journal.entries().len(), 1);
        assert_eq!(journal.open_entries().count(), 0);
    }

    #[test]
    fn partial_sell_then_close_realizes_both_legs() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 140, 35.5, 1));
        exit(&mut journal, &tx(2, "PTT", TradeAction::Sell, 83, 36.0, 2), 35.5);

        let entry = journal.get(1).unwrap();
        assert!(entry.is_open());
        assert_eq!(entry.open_shares(), 57);

        let closed = journal
            .prepare_close(&CloseTarget::Symbol("PTT".into()), 38.0, ExitReason::Manual, None, at(3))
            .unwrap();
        // 83 x 0.5 + 57 x 2.5
        assert!((closed.realized_pnl.unwrap() - 184.0).abs() < 1e-9);
        let avg_exit = (83.0 * 36.0 + 57.0 * 38.0) / 140.0;
        assert!((closed.exit_price.unwrap() - avg_exit).abs() < 1e-9);
    }

    #[test]
    fn sell_exits_oldest_entries_first() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        open(&mut journal, &tx(2, "PTT", TradeAction::Buy, 100, 12.0, 2));
        open(&mut journal, &tx(3, "AOT", TradeAction::Buy, 100, 50.0, 2));
        let touched = exit(&mut journal, &tx(4, "PTT", TradeAction::Sell, 150, 11.0, 3), 11.0);

        let ids: Vec<u64> = touched.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        let first = journal.get(1).unwrap();
        assert_eq!(first.outcome, Some(Outcome::Win));
        assert!((first.realized_pnl.unwrap() - 100.0).abs() < 1e-9);
        let second = journal.get(2).unwrap();
        assert!(second.is_open());
        assert_eq!(second.open_shares(), 50);
        assert!(journal.get(3).unwrap().is_open());
    }

    #[test]
    fn uncovered_sell_shares_are_booked_closed() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        let closed = journal
            .prepare_close(&CloseTarget::Id(1), 10.5, ExitReason::Manual, None, at(2))
            .unwrap();
        journal.apply_close(closed).unwrap();

        let touched = exit(&mut journal, &tx(2, "PTT", TradeAction::Sell, 100, 11.0, 3), 10.0);
        assert_eq!(touched.len(), 1);
        let booked = &touched[0];
        assert_eq!(booked.id, 2);
        assert_eq!(booked.transaction_id, 2);
        assert_eq!(booked.action, TradeAction::Sell);
        assert_eq!(booked.status, EntryStatus::Closed);
        assert!((booked.realized_pnl.unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(journal.open_entries().count(), 0);
    }

    #[test]
    fn settled_entry_rejects_another_exit() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        let touched = exit(&mut journal, &tx(2, "PTT", TradeAction::Sell, 100, 11.0, 2), 10.0);
        assert!(journal.apply_exit(touched[0].clone()).is_err());
    }

    #[test]
    fn flat_close_is_a_loss() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        let closed = journal
            .prepare_close(&CloseTarget::Id(1), 10.0, ExitReason::Manual, None, at(2))
            .unwrap();
        assert_eq!(closed.outcome, Some(Outcome::Loss));
    }

    #[test]
    fn close_is_fifo_by_symbol() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 3));
        open(&mut journal, &tx(2, "PTT", TradeAction::Buy, 100, 11.0, 1));
        open(&mut journal, &tx(3, "AOT", TradeAction::Buy, 100, 50.0, 1));
        let closed = journal
            .prepare_close(&CloseTarget::Symbol("PTT".into()), 12.0, ExitReason::StopLoss, None, at(6))
            .unwrap();
        assert_eq!(closed.id, 2);
        assert_eq!(closed.exit_reason, Some(ExitReason::StopLoss));
    }

    #[test]
    fn closing_twice_is_not_found() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        let target = CloseTarget::Symbol("PTT".into());
        let closed = journal
            .prepare_close(&target, 11.0, ExitReason::Manual, None, at(2))
            .unwrap();
        journal.apply_close(closed).unwrap();
        let err = journal
            .prepare_close(&target, 11.0, ExitReason::Manual, None, at(3))
            .unwrap_err();
        assert!(matches!(err, TradegateError::NotFound { .. }));
        let err = journal
            .prepare_close(&CloseTarget::Id(1), 11.0, ExitReason::Manual, None, at(3))
            .unwrap_err();
        assert!(matches!(err, TradegateError::NotFound { .. }));
    }

    #[test]
    fn closed_entry_cannot_be_reclosed_directly() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        let closed = journal
            .prepare_close(&CloseTarget::Id(1), 11.0, ExitReason::Manual, None, at(2))
            .unwrap();
        journal.apply_close(closed.clone()).unwrap();
        assert!(journal.apply_close(closed).is_err());
    }

    #[test]
    fn lessons_append_after_close() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        let closed = journal
            .prepare_close(&CloseTarget::Id(1), 9.0, ExitReason::StopLoss, Some("cut early"), at(2))
            .unwrap();
        journal.apply_close(closed).unwrap();
        let entry = journal.apply_lessons(1, "respect the stop").unwrap();
        assert_eq!(entry.lessons.as_deref(), Some("cut early\nrespect the stop"));
        assert_eq!(entry.exit_price, Some(9.0));
    }

    #[test]
    fn lessons_on_missing_entry() {
        let mut journal = Journal::default();
        assert!(matches!(
            journal.apply_lessons(42, "x"),
            Err(TradegateError::NotFound { .. })
        ));
    }

    #[test]
    fn duplicate_transaction_rejected() {
        let mut journal = Journal::default();
        let t = tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1);
        open(&mut journal, &t);
        let mut again = journal.prepare_open(&t, &TradeMeta::default(), "composite");
        again.id = 99;
        assert!(journal.apply_open(again).is_err());
    }

    #[test]
    fn history_newest_first_with_limit() {
        let mut journal = Journal::default();
        for (i, day) in [1u32, 4, 2].iter().enumerate() {
            open(&mut journal, &tx(i as u64 + 1, "PTT", TradeAction::Buy, 100, 10.0, *day));
        }
        let ids: Vec<u64> = journal.history(2).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn invalid_exit_price() {
        let mut journal = Journal::default();
        open(&mut journal, &tx(1, "PTT", TradeAction::Buy, 100, 10.0, 1));
        let err = journal
            .prepare_close(&CloseTarget::Id(1), 0.0, ExitReason::Manual, None, at(1) + Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err, TradegateError::InvalidOrder { .. }));
    }

    #[test]
    fn status_strings() {
        assert_eq!("CLOSED".parse::<EntryStatus>().unwrap(), EntryStatus::Closed);
        assert_eq!(ExitReason::StopLoss.as_str(), "stop_loss");
        assert!("DRAW".parse::<Outcome>().is_err());
    }
}
