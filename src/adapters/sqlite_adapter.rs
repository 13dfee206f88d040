//! SQLite book store.
//!
//! Transactions are the source of truth; `ledger_meta.cash` and `positions`
//! are a cache written alongside them. Every load replays the transactions
//! and refuses to continue if the cache disagrees.

use crate::domain::book::{Book, Change};
use crate::domain::config::StoreConfig;
use crate::domain::error::TradegateError;
use crate::domain::journal::{EntryExit, Journal, JournalEntry};
use crate::domain::portfolio::{Ledger, CASH_EPSILON};
use crate::domain::position::{Position, Transaction};
use crate::domain::snapshot::{PortfolioSnapshot, SnapshotSeries};
use crate::ports::store_port::BookStore;
use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ledger_meta (
    key TEXT PRIMARY KEY,
    value REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    timestamp TEXT NOT NULL,
    symbol TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('BUY', 'SELL')),
    shares INTEGER NOT NULL CHECK (shares > 0),
    price REAL NOT NULL,
    amount REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS positions (
    symbol TEXT PRIMARY KEY,
    shares INTEGER NOT NULL,
    avg_cost REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS journal (
    id INTEGER PRIMARY KEY,
    transaction_id INTEGER NOT NULL UNIQUE REFERENCES transactions(id),
    symbol TEXT NOT NULL,
    action TEXT NOT NULL,
    entry_price REAL NOT NULL,
    shares INTEGER NOT NULL,
    amount REAL NOT NULL,
    strategy TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    signal_context TEXT,
    status TEXT NOT NULL CHECK (status IN ('OPEN', 'CLOSED')),
    opened_at TEXT NOT NULL,
    exit_price REAL,
    closed_at TEXT,
    realized_pnl REAL,
    pnl_pct REAL,
    outcome TEXT,
    exit_reason TEXT,
    lessons TEXT
);
CREATE INDEX IF NOT EXISTS idx_journal_symbol_status ON journal(symbol, status);
CREATE TABLE IF NOT EXISTS journal_exits (
    entry_id INTEGER NOT NULL REFERENCES journal(id),
    transaction_id INTEGER NOT NULL REFERENCES transactions(id),
    shares INTEGER NOT NULL CHECK (shares > 0),
    price REAL NOT NULL,
    exited_at TEXT NOT NULL,
    PRIMARY KEY (entry_id, transaction_id)
);
CREATE TABLE IF NOT EXISTS snapshots (
    date TEXT PRIMARY KEY,
    cash REAL NOT NULL,
    holdings_value REAL NOT NULL,
    total_value REAL NOT NULL,
    daily_pnl REAL NOT NULL,
    daily_pnl_pct REAL NOT NULL,
    recorded_at TEXT NOT NULL
);";

pub struct SqliteBookStore {
    pool: Pool<SqliteConnectionManager>,
    lock_timeout_ms: u64,
}

fn db_err(e: rusqlite::Error) -> TradegateError {
    TradegateError::Database {
        reason: e.to_string(),
    }
}

fn pool_err(e: r2d2::Error) -> TradegateError {
    TradegateError::Database {
        reason: e.to_string(),
    }
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == ErrorCode::DatabaseBusy || f.code == ErrorCode::DatabaseLocked
    )
}

fn parse<T: FromStr>(column: &str, raw: &str) -> Result<T, TradegateError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| TradegateError::corrupt(format!("bad {} '{}': {}", column, raw, e)))
}

fn parse_time(column: &str, raw: &str) -> Result<DateTime<Utc>, TradegateError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TradegateError::corrupt(format!("bad {} '{}': {}", column, raw, e)))
}

fn parse_date(raw: &str) -> Result<NaiveDate, TradegateError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| TradegateError::corrupt(format!("bad snapshot date '{}': {}", raw, e)))
}

impl SqliteBookStore {
    /// Open or create the store at `config.path`. `initial_cash` only seeds
    /// a new store; an existing one keeps the value it was created with.
    pub fn open(config: &StoreConfig, initial_cash: f64) -> Result<Self, TradegateError> {
        let timeout = Duration::from_millis(config.lock_timeout_ms);
        let wal = config.wal;
        let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
            conn.busy_timeout(timeout)?;
            if wal {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")
        });
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(timeout.max(Duration::from_millis(1)))
            .build(manager)
            .map_err(pool_err)?;

        let store = Self {
            pool,
            lock_timeout_ms: config.lock_timeout_ms,
        };
        store.initialize_schema(initial_cash)?;
        Ok(store)
    }

    pub fn in_memory(initial_cash: f64) -> Result<Self, TradegateError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.pragma_update(None, "foreign_keys", "ON"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        let store = Self {
            pool,
            lock_timeout_ms: 0,
        };
        store.initialize_schema(initial_cash)?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TradegateError> {
        self.pool.get().map_err(pool_err)
    }

    fn busy_or_db(&self, e: rusqlite::Error) -> TradegateError {
        if is_busy(&e) {
            TradegateError::StoreBusy {
                waited_ms: self.lock_timeout_ms,
            }
        } else {
            db_err(e)
        }
    }

    fn initialize_schema(&self, initial_cash: f64) -> Result<(), TradegateError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.busy_or_db(e))?;
        tx.execute_batch(SCHEMA).map_err(db_err)?;
        tx.execute(
            "INSERT OR IGNORE INTO ledger_meta (key, value) VALUES ('initial_cash', ?1)",
            params![initial_cash],
        )
        .map_err(db_err)?;
        tx.execute(
            "INSERT OR IGNORE INTO ledger_meta (key, value) VALUES ('cash', ?1)",
            params![initial_cash],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)
    }
}

fn meta(conn: &Connection, key: &str) -> Result<f64, TradegateError> {
    conn.query_row(
        "SELECT value FROM ledger_meta WHERE key = ?1",
        params![key],
        |row| row.get::<_, f64>(0),
    )
    .optional()
    .map_err(db_err)?
    .ok_or_else(|| TradegateError::corrupt(format!("ledger_meta has no '{}'", key)))
}

fn read_transactions(conn: &Connection) -> Result<Vec<Transaction>, TradegateError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, timestamp, symbol, action, shares, price, amount
             FROM transactions ORDER BY id ASC",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, u64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, f64>(6)?,
            ))
        })
        .map_err(db_err)?;

    let mut transactions = Vec::new();
    for row in rows {
        let (id, timestamp, symbol, action, shares, price, amount) = row.map_err(db_err)?;
        transactions.push(Transaction {
            id,
            timestamp: parse_time("transaction timestamp", &timestamp)?,
            symbol,
            action: parse("transaction action", &action)?,
            shares,
            price,
            amount,
        });
    }
    Ok(transactions)
}

fn read_positions(conn: &Connection) -> Result<BTreeMap<String, Position>, TradegateError> {
    let mut stmt = conn
        .prepare("SELECT symbol, shares, avg_cost FROM positions")
        .map_err(db_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Position {
                symbol: row.get(0)?,
                shares: row.get(1)?,
                avg_cost: row.get(2)?,
            })
        })
        .map_err(db_err)?;
    let mut positions = BTreeMap::new();
    for row in rows {
        let p = row.map_err(db_err)?;
        positions.insert(p.symbol.clone(), p);
    }
    Ok(positions)
}

struct JournalRow {
    id: u64,
    transaction_id: u64,
    symbol: String,
    action: String,
    entry_price: f64,
    shares: u64,
    amount: f64,
    strategy: String,
    reasoning: String,
    signal_context: Option<String>,
    status: String,
    opened_at: String,
    exit_price: Option<f64>,
    closed_at: Option<String>,
    realized_pnl: Option<f64>,
    pnl_pct: Option<f64>,
    outcome: Option<String>,
    exit_reason: Option<String>,
    lessons: Option<String>,
}

impl JournalRow {
    fn into_entry(self) -> Result<JournalEntry, TradegateError> {
        Ok(JournalEntry {
            id: self.id,
            transaction_id: self.transaction_id,
            symbol: self.symbol,
            action: parse("journal action", &self.action)?,
            entry_price: self.entry_price,
            shares: self.shares,
            amount: self.amount,
            strategy: self.strategy,
            reasoning: self.reasoning,
            signal_context: self
                .signal_context
                .map(|raw| {
                    serde_json::from_str(&raw).map_err(|e| {
                        TradegateError::corrupt(format!("bad signal_context: {}", e))
                    })
                })
                .transpose()?,
            status: parse("journal status", &self.status)?,
            opened_at: parse_time("opened_at", &self.opened_at)?,
            exit_price: self.exit_price,
            closed_at: self
                .closed_at
                .as_deref()
                .map(|t| parse_time("closed_at", t))
                .transpose()?,
            realized_pnl: self.realized_pnl,
            pnl_pct: self.pnl_pct,
            outcome: self
                .outcome
                .as_deref()
                .map(|o| parse("outcome", o))
                .transpose()?,
            exit_reason: self
                .exit_reason
                .as_deref()
                .map(|r| parse("exit_reason", r))
                .transpose()?,
            lessons: self.lessons,
            exits: Vec::new(),
        })
    }
}

fn read_exits(conn: &Connection) -> Result<BTreeMap<u64, Vec<EntryExit>>, TradegateError> {
    let mut stmt = conn
        .prepare(
            "SELECT entry_id, transaction_id, shares, price, exited_at
             FROM journal_exits ORDER BY entry_id ASC, transaction_id ASC",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, u64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .map_err(db_err)?;

    let mut exits: BTreeMap<u64, Vec<EntryExit>> = BTreeMap::new();
    for row in rows {
        let (entry_id, transaction_id, shares, price, exited_at) = row.map_err(db_err)?;
        exits.entry(entry_id).or_default().push(EntryExit {
            transaction_id,
            shares,
            price,
            at: parse_time("exited_at", &exited_at)?,
        });
    }
    Ok(exits)
}

fn read_journal(conn: &Connection) -> Result<Journal, TradegateError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, transaction_id, symbol, action, entry_price, shares, amount,
                    strategy, reasoning, signal_context, status, opened_at, exit_price,
                    closed_at, realized_pnl, pnl_pct, outcome, exit_reason, lessons
             FROM journal ORDER BY id ASC",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(JournalRow {
                id: row.get(0)?,
                transaction_id: row.get(1)?,
                symbol: row.get(2)?,
                action: row.get(3)?,
                entry_price: row.get(4)?,
                shares: row.get(5)?,
                amount: row.get(6)?,
                strategy: row.get(7)?,
                reasoning: row.get(8)?,
                signal_context: row.get(9)?,
                status: row.get(10)?,
                opened_at: row.get(11)?,
                exit_price: row.get(12)?,
                closed_at: row.get(13)?,
                realized_pnl: row.get(14)?,
                pnl_pct: row.get(15)?,
                outcome: row.get(16)?,
                exit_reason: row.get(17)?,
                lessons: row.get(18)?,
            })
        })
        .map_err(db_err)?;

    let mut exits = read_exits(conn)?;
    let mut entries = Vec::new();
    for row in rows {
        let mut entry = row.map_err(db_err)?.into_entry()?;
        entry.exits = exits.remove(&entry.id).unwrap_or_default();
        entries.push(entry);
    }
    if let Some(orphan) = exits.keys().next() {
        return Err(TradegateError::corrupt(format!(
            "exits recorded for missing journal entry #{}",
            orphan
        )));
    }
    Ok(Journal::from_entries(entries))
}

fn read_snapshots(conn: &Connection) -> Result<SnapshotSeries, TradegateError> {
    let mut stmt = conn
        .prepare(
            "SELECT date, cash, holdings_value, total_value, daily_pnl, daily_pnl_pct, recorded_at
             FROM snapshots ORDER BY date ASC",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .map_err(db_err)?;

    let mut snapshots = Vec::new();
    for row in rows {
        let (date, cash, holdings_value, total_value, daily_pnl, daily_pnl_pct, recorded_at) =
            row.map_err(db_err)?;
        snapshots.push(PortfolioSnapshot {
            date: parse_date(&date)?,
            cash,
            holdings_value,
            total_value,
            daily_pnl,
            daily_pnl_pct,
            recorded_at: parse_time("recorded_at", &recorded_at)?,
        });
    }
    Ok(SnapshotSeries::from_snapshots(snapshots))
}

/// Compare the cached cash and positions with the transaction fold.
fn verify_cache(
    ledger: &Ledger,
    cached_cash: f64,
    cached: &BTreeMap<String, Position>,
) -> Result<(), TradegateError> {
    if (ledger.cash() - cached_cash).abs() > CASH_EPSILON {
        return Err(TradegateError::corrupt(format!(
            "cached cash {:.2} differs from transaction fold {:.2}",
            cached_cash,
            ledger.cash()
        )));
    }
    let folded: Vec<&Position> = ledger.positions().collect();
    if folded.len() != cached.len() {
        return Err(TradegateError::corrupt(format!(
            "{} cached positions, {} from transactions",
            cached.len(),
            folded.len()
        )));
    }
    for p in folded {
        match cached.get(&p.symbol) {
            Some(c) if c.shares == p.shares && (c.avg_cost - p.avg_cost).abs() <= CASH_EPSILON => {}
            Some(c) => {
                return Err(TradegateError::corrupt(format!(
                    "cached position {} is {} @ {:.4}, transactions give {} @ {:.4}",
                    p.symbol, c.shares, c.avg_cost, p.shares, p.avg_cost
                )));
            }
            None => {
                return Err(TradegateError::corrupt(format!(
                    "position {} missing from cache",
                    p.symbol
                )));
            }
        }
    }
    Ok(())
}

fn load_book(conn: &Connection) -> Result<Book, TradegateError> {
    let initial_cash = meta(conn, "initial_cash")?;
    let cached_cash = meta(conn, "cash")?;
    let ledger = Ledger::replay(initial_cash, read_transactions(conn)?)
        .map_err(|e| TradegateError::corrupt(format!("transaction replay failed: {}", e)))?;
    verify_cache(&ledger, cached_cash, &read_positions(conn)?)?;

    let book = Book {
        ledger,
        journal: read_journal(conn)?,
        snapshots: read_snapshots(conn)?,
    };
    book.verify_journal_coverage()?;
    Ok(book)
}

fn insert_transaction(conn: &Connection, t: &Transaction) -> Result<(), TradegateError> {
    conn.execute(
        "INSERT INTO transactions (id, timestamp, symbol, action, shares, price, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            t.id,
            t.timestamp.to_rfc3339(),
            t.symbol,
            t.action.as_str(),
            t.shares,
            t.price,
            t.amount
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

fn context_json(entry: &JournalEntry) -> Result<Option<String>, TradegateError> {
    entry
        .signal_context
        .as_ref()
        .map(|v| {
            serde_json::to_string(v).map_err(|e| TradegateError::Database {
                reason: format!("cannot encode signal_context: {}", e),
            })
        })
        .transpose()
}

fn insert_entry(conn: &Connection, e: &JournalEntry) -> Result<(), TradegateError> {
    conn.execute(
        "INSERT INTO journal (id, transaction_id, symbol, action, entry_price, shares, amount,
                              strategy, reasoning, signal_context, status, opened_at,
                              exit_price, closed_at, realized_pnl, pnl_pct, outcome,
                              exit_reason, lessons)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                 ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            e.id,
            e.transaction_id,
            e.symbol,
            e.action.as_str(),
            e.entry_price,
            e.shares,
            e.amount,
            e.strategy,
            e.reasoning,
            context_json(e)?,
            e.status.as_str(),
            e.opened_at.to_rfc3339(),
            e.exit_price,
            e.closed_at.map(|t| t.to_rfc3339()),
            e.realized_pnl,
            e.pnl_pct,
            e.outcome.map(|o| o.as_str()),
            e.exit_reason.map(|r| r.as_str()),
            e.lessons
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

fn insert_exits(conn: &Connection, e: &JournalEntry, transaction_id: u64) -> Result<(), TradegateError> {
    for x in e.exits.iter().filter(|x| x.transaction_id == transaction_id) {
        conn.execute(
            "INSERT INTO journal_exits (entry_id, transaction_id, shares, price, exited_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![e.id, x.transaction_id, x.shares, x.price, x.at.to_rfc3339()],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

/// Rewrite the state columns of an entry that was open before this change.
fn update_open_entry(conn: &Connection, e: &JournalEntry) -> Result<(), TradegateError> {
    let updated = conn
        .execute(
            "UPDATE journal
             SET status = ?2, exit_price = ?3, closed_at = ?4, realized_pnl = ?5,
                 pnl_pct = ?6, outcome = ?7, exit_reason = ?8, lessons = ?9
             WHERE id = ?1 AND status = 'OPEN'",
            params![
                e.id,
                e.status.as_str(),
                e.exit_price,
                e.closed_at.map(|t| t.to_rfc3339()),
                e.realized_pnl,
                e.pnl_pct,
                e.outcome.map(|o| o.as_str()),
                e.exit_reason.map(|r| r.as_str()),
                e.lessons
            ],
        )
        .map_err(db_err)?;
    if updated != 1 {
        return Err(TradegateError::NotFound {
            what: format!("open journal entry #{}", e.id),
        });
    }
    Ok(())
}

fn write_change(conn: &Connection, book: &Book, change: &Change) -> Result<(), TradegateError> {
    match change {
        Change::Trade { transaction, entry } => {
            insert_transaction(conn, transaction)?;
            insert_entry(conn, entry)
        }
        Change::Exit {
            transaction,
            entries,
        } => {
            insert_transaction(conn, transaction)?;
            for entry in entries {
                if entry.transaction_id == transaction.id {
                    insert_entry(conn, entry)?;
                } else {
                    insert_exits(conn, entry, transaction.id)?;
                    update_open_entry(conn, entry)?;
                }
            }
            Ok(())
        }
        Change::CloseEntry(entry) => update_open_entry(conn, entry),
        Change::AppendLessons { entry_id, .. } => {
            let lessons = book.journal.get(*entry_id).and_then(|e| e.lessons.clone());
            conn.execute(
                "UPDATE journal SET lessons = ?2 WHERE id = ?1",
                params![entry_id, lessons],
            )
            .map_err(db_err)?;
            Ok(())
        }
        Change::UpsertSnapshot(s) => {
            conn.execute(
                "INSERT OR REPLACE INTO snapshots
                 (date, cash, holdings_value, total_value, daily_pnl, daily_pnl_pct, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    s.date.format("%Y-%m-%d").to_string(),
                    s.cash,
                    s.holdings_value,
                    s.total_value,
                    s.daily_pnl,
                    s.daily_pnl_pct,
                    s.recorded_at.to_rfc3339()
                ],
            )
            .map_err(db_err)?;
            Ok(())
        }
    }
}

fn write_cache(conn: &Connection, ledger: &Ledger) -> Result<(), TradegateError> {
    conn.execute(
        "UPDATE ledger_meta SET value = ?1 WHERE key = 'cash'",
        params![ledger.cash()],
    )
    .map_err(db_err)?;
    conn.execute("DELETE FROM positions", []).map_err(db_err)?;
    for p in ledger.positions() {
        conn.execute(
            "INSERT INTO positions (symbol, shares, avg_cost) VALUES (?1, ?2, ?3)",
            params![p.symbol, p.shares, p.avg_cost],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

impl BookStore for SqliteBookStore {
    fn load(&self) -> Result<Book, TradegateError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(db_err)?;
        let book = load_book(&tx).inspect_err(|e| {
            if matches!(e, TradegateError::StoreCorrupt { .. }) {
                error!(error = %e, "store verification failed");
            }
        })?;
        tx.commit().map_err(db_err)?;
        Ok(book)
    }

    fn transact(
        &self,
        op: &mut dyn FnMut(&Book) -> Result<Vec<Change>, TradegateError>,
    ) -> Result<Book, TradegateError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.busy_or_db(e))?;

        let mut book = load_book(&tx)?;
        let changes = op(&book)?;
        book.apply_all(&changes)?;
        for change in &changes {
            write_change(&tx, &book, change)?;
        }
        write_cache(&tx, &book.ledger)?;
        tx.commit().map_err(|e| self.busy_or_db(e))?;

        debug!(changes = changes.len(), "store transaction committed");
        Ok(book)
    }
}
