//! The persisted state as one value: ledger, journal and snapshots.
//!
//! Mutations are expressed as `Change` values computed against a consistent
//! `Book` and then applied; a store commits the changes of one operation
//! atomically.

use serde::Serialize;
use std::collections::BTreeSet;

use super::error::TradegateError;
use super::journal::{Journal, JournalEntry};
use super::portfolio::Ledger;
use super::position::{TradeAction, Transaction};
use super::snapshot::{PortfolioSnapshot, SnapshotSeries};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Book {
    pub ledger: Ledger,
    pub journal: Journal,
    pub snapshots: SnapshotSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// A ledger transaction together with the journal entry it opens.
    Trade {
        transaction: Transaction,
        entry: JournalEntry,
    },
    /// A SELL together with the journal entries it exits or books.
    Exit {
        transaction: Transaction,
        entries: Vec<JournalEntry>,
    },
    CloseEntry(JournalEntry),
    AppendLessons { entry_id: u64, text: String },
    UpsertSnapshot(PortfolioSnapshot),
}

impl Book {
    pub fn new(initial_cash: f64) -> Self {
        Book {
            ledger: Ledger::new(initial_cash),
            journal: Journal::default(),
            snapshots: SnapshotSeries::default(),
        }
    }

    pub fn apply(&mut self, change: &Change) -> Result<(), TradegateError> {
        match change {
            Change::Trade { transaction, entry } => {
                if entry.transaction_id != transaction.id {
                    return Err(TradegateError::invalid_order(format!(
                        "journal entry #{} references transaction {}, not {}",
                        entry.id, entry.transaction_id, transaction.id
                    )));
                }
                self.ledger.apply(transaction.clone())?;
                self.journal.apply_open(entry.clone())
            }
            Change::Exit {
                transaction,
                entries,
            } => {
                for entry in entries {
                    let linked = entry.transaction_id == transaction.id
                        || entry.exits.iter().any(|x| x.transaction_id == transaction.id);
                    if !linked {
                        return Err(TradegateError::invalid_order(format!(
                            "journal entry #{} is not linked to transaction {}",
                            entry.id, transaction.id
                        )));
                    }
                }
                self.ledger.apply(transaction.clone())?;
                entries
                    .iter()
                    .try_for_each(|e| self.journal.apply_exit(e.clone()))
            }
            Change::CloseEntry(entry) => self.journal.apply_close(entry.clone()),
            Change::AppendLessons { entry_id, text } => {
                self.journal.apply_lessons(*entry_id, text).map(|_| ())
            }
            Change::UpsertSnapshot(snapshot) => {
                self.snapshots.upsert(snapshot.clone());
                Ok(())
            }
        }
    }

    pub fn apply_all(&mut self, changes: &[Change]) -> Result<(), TradegateError> {
        changes.iter().try_for_each(|c| self.apply(c))
    }

    /// Every BUY opened exactly one journal entry, and every share a SELL
    /// moved is accounted for by entry exits or by the entry it booked.
    pub fn verify_journal_coverage(&self) -> Result<(), TradegateError> {
        let entries = self.journal.entries();
        for tx in self.ledger.transactions() {
            let own: Vec<&JournalEntry> =
                entries.iter().filter(|e| e.transaction_id == tx.id).collect();
            let covered = match tx.action {
                TradeAction::Buy => own.len() == 1,
                TradeAction::Sell => {
                    let exited: u64 = entries
                        .iter()
                        .flat_map(|e| &e.exits)
                        .filter(|x| x.transaction_id == tx.id)
                        .map(|x| x.shares)
                        .sum();
                    let booked: u64 = own.iter().map(|e| e.shares).sum();
                    own.len() <= 1 && exited + booked == tx.shares
                }
            };
            if !covered {
                return Err(TradegateError::corrupt(format!(
                    "{} transaction {} does not match the journal",
                    tx.action, tx.id
                )));
            }
        }

        let known: BTreeSet<u64> = self.ledger.transactions().iter().map(|t| t.id).collect();
        for entry in entries {
            let dangling = !known.contains(&entry.transaction_id)
                || entry.exits.iter().any(|x| !known.contains(&x.transaction_id));
            if dangling {
                return Err(TradegateError::corrupt(format!(
                    "journal entry #{} references a transaction the ledger does not have",
                    entry.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::journal::TradeMeta;
    use chrono::{TimeZone, Utc};

    fn trade(book: &Book, symbol: &str, amount: f64, price: f64) -> Change {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        let transaction = book.ledger.prepare_buy(symbol, amount, price, at).unwrap();
        let entry = book
            .journal
            .prepare_open(&transaction, &TradeMeta::default(), "composite");
        Change::Trade { transaction, entry }
    }

    #[test]
    fn trade_updates_ledger_and_journal_together() {
        let mut book = Book::new(100_000.0);
        let change = trade(&book, "PTT", 5000.0, 35.5);
        book.apply(&change).unwrap();
        assert_eq!(book.ledger.transactions().len(), 1);
        assert_eq!(book.journal.entries().len(), 1);
        book.verify_journal_coverage().unwrap();
    }

    #[test]
    fn mismatched_trade_rejected() {
        let mut book = Book::new(100_000.0);
        let mut change = trade(&book, "PTT", 5000.0, 35.5);
        if let Change::Trade { entry, .. } = &mut change {
            entry.transaction_id = 9;
        }
        assert!(book.apply(&change).is_err());
        assert!(book.ledger.transactions().is_empty());
    }

    fn sell(book: &Book, symbol: &str, shares: u64, price: f64) -> Change {
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 3, 0, 0).unwrap();
        let transaction = book
            .ledger
            .prepare_sell(symbol, shares as f64 * price, price, at)
            .unwrap();
        let avg_cost = book.ledger.position(symbol).unwrap().avg_cost;
        let entries = book
            .journal
            .prepare_exit(&transaction, avg_cost, &TradeMeta::default(), "composite");
        Change::Exit { transaction, entries }
    }

    #[test]
    fn sell_updates_the_buy_entry_instead_of_opening_one() {
        let mut book = Book::new(100_000.0);
        let change = trade(&book, "PTT", 5000.0, 35.5);
        book.apply(&change).unwrap();
        let change = sell(&book, "PTT", 140, 38.0);
        book.apply(&change).unwrap();

        assert_eq!(book.ledger.transactions().len(), 2);
        assert_eq!(book.journal.entries().len(), 1);
        assert_eq!(book.journal.open_entries().count(), 0);
        book.verify_journal_coverage().unwrap();
    }

    #[test]
    fn unlinked_exit_rejected() {
        let mut book = Book::new(100_000.0);
        let change = trade(&book, "PTT", 5000.0, 35.5);
        book.apply(&change).unwrap();
        let mut change = sell(&book, "PTT", 100, 38.0);
        if let Change::Exit { entries, .. } = &mut change {
            entries[0].exits.clear();
        }
        assert!(book.apply(&change).is_err());
        assert_eq!(book.ledger.transactions().len(), 1);
    }

    #[test]
    fn coverage_detects_unjournaled_sell() {
        let mut book = Book::new(100_000.0);
        let change = trade(&book, "PTT", 5000.0, 35.5);
        book.apply(&change).unwrap();
        if let Change::Exit { transaction, .. } = sell(&book, "PTT", 100, 38.0) {
            book.ledger.apply(transaction).unwrap();
        }
        assert!(matches!(
            book.verify_journal_coverage(),
            Err(TradegateError::StoreCorrupt { .. })
        ));
    }

    #[test]
    fn coverage_detects_orphan_transaction() {
        let mut book = Book::new(100_000.0);
        let change = trade(&book, "PTT", 5000.0, 35.5);
        if let Change::Trade { transaction, .. } = change {
            book.ledger.apply(transaction).unwrap();
        }
        assert!(matches!(
            book.verify_journal_coverage(),
            Err(TradegateError::StoreCorrupt { .. })
        ));
    }
}
