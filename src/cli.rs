//! CLI definition and dispatch.

use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

use crate::adapters::csv_adapter::CsvMarketAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteBookStore;
use crate::domain::config::{load_engine_config, EngineConfig};
use crate::domain::desk::{receipt_verb, Desk, SellQuantity, StatusView, TradeReceipt};
use crate::domain::error::TradegateError;
use crate::domain::fundamental::{grade, CriterionResult, FundamentalGrade};
use crate::domain::journal::{CloseTarget, ExitReason, JournalEntry, TradeMeta};
use crate::domain::metrics::{JournalStats, StrategyStats};
use crate::domain::plan::{score_symbols, ActionPlan, Evaluation, PlanStep};
use crate::domain::risk::{RiskReport, RiskVerdict, Severity, VerdictStatus};
use crate::logging::init_logging;
use crate::ports::market_port::MarketPort;

#[derive(Parser, Debug)]
#[command(
    name = "tradegate",
    about = "Signal scoring, risk gating and trade journaling for an equity portfolio"
)]
pub struct Cli {
    /// INI configuration file; built-in defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Portfolio store file, overriding [store] path
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
    /// Raise log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

/// CSV market inputs.
#[derive(Args, Debug, Clone, Default)]
pub struct MarketArgs {
    /// symbol,price,volatility,sector
    #[arg(long)]
    pub quotes: Option<PathBuf>,
    /// Indicator, sentiment, volume, news and fund-flow readings
    #[arg(long)]
    pub observations: Option<PathBuf>,
    /// Financial statement periods, oldest first per symbol
    #[arg(long)]
    pub statements: Option<PathBuf>,
}

impl MarketArgs {
    pub fn adapter(&self) -> CsvMarketAdapter {
        let mut adapter = CsvMarketAdapter::new();
        if let Some(p) = &self.quotes {
            adapter = adapter.with_quotes(p);
        }
        if let Some(p) = &self.observations {
            adapter = adapter.with_observations(p);
        }
        if let Some(p) = &self.statements {
            adapter = adapter.with_statements(p);
        }
        adapter
    }
}

/// Journal context recorded with a trade.
#[derive(Args, Debug, Clone, Default)]
pub struct TradeArgs {
    /// Strategy tag; [journal] default_strategy when omitted
    #[arg(long)]
    pub strategy: Option<String>,
    #[arg(long, default_value = "")]
    pub reason: String,
    /// Signal context as a JSON document
    #[arg(long)]
    pub context: Option<String>,
}

impl TradeArgs {
    pub fn meta(&self) -> Result<TradeMeta, TradegateError> {
        let signal_context = self
            .context
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| TradegateError::Input {
                source_name: "--context".to_string(),
                reason: e.to_string(),
            })?;
        Ok(TradeMeta {
            strategy: self.strategy.clone(),
            reasoning: self.reason.clone(),
            signal_context,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score and classify symbols from their latest observations
    Score {
        /// Symbols to score; every observed symbol when empty
        symbols: Vec<String>,
        #[command(flatten)]
        market: MarketArgs,
    },
    /// Run the pre-trade risk checks for a proposed BUY
    CheckBuy {
        symbol: String,
        amount: f64,
        #[arg(long)]
        quotes: Option<PathBuf>,
    },
    /// Portfolio risk report
    Report {
        #[arg(long)]
        quotes: Option<PathBuf>,
    },
    /// Record today's portfolio snapshot
    Snapshot {
        #[arg(long)]
        quotes: Option<PathBuf>,
    },
    /// Buy shares for a cash amount
    Buy {
        symbol: String,
        amount: f64,
        #[arg(long)]
        price: f64,
        #[command(flatten)]
        trade: TradeArgs,
    },
    /// Sell shares of a held position
    Sell {
        symbol: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        shares: Option<u64>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        trade: TradeArgs,
    },
    /// Close an open journal entry
    Close {
        /// Closes the oldest open entry for this symbol
        symbol: Option<String>,
        #[arg(long)]
        id: Option<u64>,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        stop_loss: bool,
        #[arg(long)]
        lessons: Option<String>,
    },
    /// Append lessons to a journal entry
    Lessons { id: u64, text: String },
    /// Closed-trade statistics
    Winrate,
    /// Closed-trade results per strategy
    Strategies,
    /// Most recent journal entries
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Portfolio valuation, recent transactions and open trades
    Status {
        #[arg(long)]
        quotes: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        recent: usize,
    },
    /// Piotroski F-Score and fundamental grade
    Fscore {
        symbol: String,
        #[arg(long)]
        statements: PathBuf,
    },
    /// Daily action plan over the latest observations
    Plan {
        #[command(flatten)]
        market: MarketArgs,
        /// Cash available per BUY; current cash when omitted
        #[arg(long)]
        budget: Option<f64>,
    },
    /// Validate the configuration and print the signal rules
    Validate,
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match execute(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Typed engine configuration from an optional INI file, with the store
/// path optionally overridden.
pub fn load_engine(config: Option<&Path>, store: Option<&Path>) -> Result<EngineConfig, TradegateError> {
    let mut engine = match config {
        Some(path) => load_engine_config(&FileConfigAdapter::from_file(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(path) = store {
        engine.store.path = path.to_path_buf();
    }
    Ok(engine)
}

pub fn sell_quantity(shares: Option<u64>, amount: Option<f64>, all: bool) -> Result<SellQuantity, TradegateError> {
    match (shares, amount, all) {
        (Some(n), None, false) => Ok(SellQuantity::Shares(n)),
        (None, Some(a), false) => Ok(SellQuantity::Amount(a)),
        (None, None, true) => Ok(SellQuantity::All),
        _ => Err(TradegateError::Input {
            source_name: "sell".to_string(),
            reason: "give exactly one of --shares, --amount or --all".to_string(),
        }),
    }
}

pub fn close_target(symbol: Option<&str>, id: Option<u64>) -> Result<CloseTarget, TradegateError> {
    match (symbol, id) {
        (Some(s), None) => Ok(CloseTarget::Symbol(s.to_string())),
        (None, Some(id)) => Ok(CloseTarget::Id(id)),
        _ => Err(TradegateError::Input {
            source_name: "close".to_string(),
            reason: "give either a symbol or --id".to_string(),
        }),
    }
}

fn quotes_adapter(quotes: Option<&PathBuf>) -> CsvMarketAdapter {
    match quotes {
        Some(p) => CsvMarketAdapter::new().with_quotes(p),
        None => CsvMarketAdapter::new(),
    }
}

/// Run one command, writing its output to `out`.
pub fn execute(cli: &Cli, out: &mut dyn Write) -> Result<(), TradegateError> {
    let config = load_engine(cli.config.as_deref(), cli.store.as_deref())?;
    let json = cli.json;
    let now = Utc::now();

    // Commands that never touch the store.
    match &cli.command {
        Command::Score { symbols, market } => {
            let evaluations = score_symbols(&market.adapter(), symbols, &config)?;
            return emit(out, json, &evaluations, |w| {
                for e in &evaluations {
                    render_evaluation(w, e)?;
                }
                Ok(())
            });
        }
        Command::Fscore { symbol, statements } => {
            let periods = CsvMarketAdapter::new()
                .with_statements(statements)
                .statements(symbol)?;
            let graded = grade(&periods, &config.grading)?;
            return emit(out, json, &graded, |w| render_grade(w, symbol, &graded));
        }
        Command::Validate => {
            let rules: Vec<(String, String)> = config
                .signals
                .rules()
                .iter()
                .map(|r| (r.action.to_string(), r.rule.to_string()))
                .collect();
            return emit(out, json, &rules, |w| {
                for (action, rule) in &rules {
                    writeln!(w, "{:<6} {}", action, rule)?;
                }
                writeln!(w, "Configuration is valid.")
            });
        }
        _ => {}
    }

    debug!(path = %config.store.path.display(), "opening store");
    let store = SqliteBookStore::open(&config.store, config.initial_cash)?;
    let desk = Desk::new(&store, &config);

    match &cli.command {
        Command::CheckBuy {
            symbol,
            amount,
            quotes,
        } => {
            let quotes = quotes_adapter(quotes.as_ref()).quotes()?;
            let verdict = desk.check_buy(symbol, *amount, &quotes)?;
            emit(out, json, &verdict, |w| render_verdict(w, &verdict))
        }
        Command::Report { quotes } => {
            let quotes = quotes_adapter(quotes.as_ref()).quotes()?;
            let report = desk.report(&quotes, now)?;
            emit(out, json, &report, |w| render_report(w, &report))
        }
        Command::Snapshot { quotes } => {
            let quotes = quotes_adapter(quotes.as_ref()).quotes()?;
            let snap = desk.record_snapshot(&quotes, now)?;
            emit(out, json, &snap, |w| {
                writeln!(
                    w,
                    "Snapshot {}: total {:.2} (cash {:.2}, holdings {:.2}), day {:+.2} ({:+.2}%)",
                    snap.date,
                    snap.total_value,
                    snap.cash,
                    snap.holdings_value,
                    snap.daily_pnl,
                    snap.daily_pnl_pct * 100.0
                )
            })
        }
        Command::Buy {
            symbol,
            amount,
            price,
            trade,
        } => {
            let receipt = desk.buy(symbol, *amount, *price, &trade.meta()?, now)?;
            emit(out, json, &receipt, |w| render_receipt(w, &receipt))
        }
        Command::Sell {
            symbol,
            price,
            shares,
            amount,
            all,
            trade,
        } => {
            let quantity = sell_quantity(*shares, *amount, *all)?;
            let receipt = desk.sell(symbol, quantity, *price, &trade.meta()?, now)?;
            emit(out, json, &receipt, |w| render_receipt(w, &receipt))
        }
        Command::Close {
            symbol,
            id,
            price,
            stop_loss,
            lessons,
        } => {
            let target = close_target(symbol.as_deref(), *id)?;
            let reason = if *stop_loss {
                ExitReason::StopLoss
            } else {
                ExitReason::Manual
            };
            let entry = desk.close(&target, *price, reason, lessons.as_deref(), now)?;
            emit(out, json, &entry, |w| render_entry(w, &entry))
        }
        Command::Lessons { id, text } => {
            let entry = desk.add_lessons(*id, text)?;
            emit(out, json, &entry, |w| render_entry(w, &entry))
        }
        Command::Winrate => {
            let stats = desk.winrate()?;
            emit(out, json, &stats, |w| render_stats(w, &stats))
        }
        Command::Strategies => {
            let rows = desk.strategies()?;
            emit(out, json, &rows, |w| render_strategies(w, &rows))
        }
        Command::History { limit } => {
            let entries = desk.history(*limit)?;
            emit(out, json, &entries, |w| {
                if entries.is_empty() {
                    return writeln!(w, "No journal entries.");
                }
                for e in &entries {
                    render_entry(w, e)?;
                }
                Ok(())
            })
        }
        Command::Status { quotes, recent } => {
            let quotes = quotes_adapter(quotes.as_ref()).quotes()?;
            let status = desk.status(&quotes, *recent, now)?;
            emit(out, json, &status, |w| render_status(w, &status))
        }
        Command::Plan { market, budget } => {
            let plan = desk.plan(&market.adapter(), *budget, now)?;
            emit(out, json, &plan, |w| render_plan(w, &plan))
        }
        Command::Score { .. } | Command::Fscore { .. } | Command::Validate => Ok(()),
    }
}

fn emit<T: Serialize>(
    out: &mut dyn Write,
    json: bool,
    value: &T,
    text: impl FnOnce(&mut dyn Write) -> io::Result<()>,
) -> Result<(), TradegateError> {
    if json {
        serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::from)?;
        writeln!(out)?;
    } else {
        text(out)?;
    }
    Ok(())
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn render_evaluation(w: &mut dyn Write, e: &Evaluation) -> io::Result<()> {
    writeln!(
        w,
        "{} {} composite {:.1} ({} confidence, {} domains) at {}",
        e.symbol,
        e.signal.action,
        e.composite.value,
        e.composite.confidence,
        e.composite.contributing_domains.len(),
        e.observed_at
    )?;
    for c in &e.composite.breakdown {
        writeln!(
            w,
            "  {:<12} {:>7.1} x {:.3} = {:>7.2}",
            c.domain, c.value, c.effective_weight, c.contribution
        )?;
    }
    if let Some(g) = &e.fundamental {
        writeln!(w, "  fundamental  grade {} F-Score {}", g.grade, g.fscore)?;
    }
    for c in e.signal.satisfied_conditions() {
        writeln!(w, "  met: {}", c.condition)?;
    }
    Ok(())
}

fn render_verdict(w: &mut dyn Write, v: &RiskVerdict) -> io::Result<()> {
    writeln!(
        w,
        "{} BUY {}: requested {:.2}, allowed {:.2}",
        v.status, v.symbol, v.requested_amount, v.adjusted_amount
    )?;
    for f in v.findings.iter().filter(|f| f.severity != Severity::Pass) {
        writeln!(w, "  [{:?}] {}: {}", f.severity, f.rule, f.message)?;
    }
    Ok(())
}

fn render_report(w: &mut dyn Write, r: &RiskReport) -> io::Result<()> {
    writeln!(w, "Risk report {} - {}", r.session, r.level)?;
    writeln!(
        w,
        "  value {:.2}, cash {:.2}, deployed {:.1}% (limit {:.1}%)",
        r.total_value,
        r.cash,
        r.deployment_pct * 100.0,
        r.deployment_limit * 100.0
    )?;
    if r.halt.active {
        writeln!(w, "  TRADING HALTED: daily P&L {:.2}%", r.halt.daily_pnl_pct.unwrap_or(0.0) * 100.0)?;
    }
    writeln!(w, "  heat {:.3} ({})", r.heat.total, r.heat.level)?;
    for s in &r.sectors {
        let flag = if s.over_limit { " OVER" } else { "" };
        writeln!(w, "  sector {:<16} {:>12.2} {:>5.1}%{}", s.sector, s.value, s.pct * 100.0, flag)?;
    }
    for a in r.triggered_stops() {
        writeln!(
            w,
            "  STOP {} {} shares at {:.2} ({:+.1}%)",
            a.symbol,
            a.shares,
            a.price,
            a.pnl_pct * 100.0
        )?;
    }
    for warning in &r.warnings {
        writeln!(w, "  warning: {}", warning)?;
    }
    Ok(())
}

fn render_receipt(w: &mut dyn Write, r: &TradeReceipt) -> io::Result<()> {
    let tx = &r.transaction;
    writeln!(
        w,
        "{} {} {} shares at {:.2} = {:.2} (tx #{}, journal {})",
        receipt_verb(r),
        tx.shares,
        tx.symbol,
        tx.price,
        tx.amount,
        tx.id,
        r.entries
            .iter()
            .map(|e| format!("#{}", e.id))
            .collect::<Vec<_>>()
            .join(", ")
    )?;
    if let Some(v) = r.verdict.as_ref().filter(|v| v.status == VerdictStatus::Reduced) {
        writeln!(
            w,
            "  reduced from {:.2} to {:.2} by the position limit",
            v.requested_amount, v.adjusted_amount
        )?;
    }
    match &r.position_after {
        Some(p) => writeln!(
            w,
            "  cash {:.2}, holding {} at avg {:.2}",
            r.cash_after, p.shares, p.avg_cost
        )?,
        None => writeln!(w, "  cash {:.2}, position closed", r.cash_after)?,
    }
    for settled in r.entries.iter().filter(|e| !e.is_open()) {
        write!(w, "  ")?;
        render_entry(w, settled)?;
    }
    Ok(())
}

fn render_entry(w: &mut dyn Write, e: &JournalEntry) -> io::Result<()> {
    write!(
        w,
        "#{} {} {} {} x {:.2} [{}] {}",
        e.id, e.action, e.symbol, e.shares, e.entry_price, e.strategy, e.status
    )?;
    if let (Some(exit), Some(pnl)) = (e.exit_price, e.realized_pnl) {
        write!(
            w,
            " exit {:.2} pnl {:+.2} ({:+.2}%)",
            exit,
            pnl,
            e.pnl_pct.unwrap_or(0.0)
        )?;
    }
    if let Some(outcome) = e.outcome {
        write!(w, " {}", outcome)?;
    }
    writeln!(w)?;
    if let Some(lessons) = &e.lessons {
        writeln!(w, "  lessons: {}", lessons)?;
    }
    Ok(())
}

fn render_stats(w: &mut dyn Write, s: &JournalStats) -> io::Result<()> {
    if s.total_trades == 0 {
        return writeln!(w, "No closed trades.");
    }
    writeln!(
        w,
        "Trades {} ({} wins, {} losses, {} stopped out), win rate {:.1}%",
        s.total_trades,
        s.wins,
        s.losses,
        s.stopped_out,
        s.win_rate * 100.0
    )?;
    writeln!(
        w,
        "  avg win {:.2} ({:.2}%), avg loss {:.2} ({:.2}%)",
        s.avg_win, s.avg_win_pct, s.avg_loss, s.avg_loss_pct
    )?;
    writeln!(
        w,
        "  total pnl {:+.2}, profit factor {}, payoff {}, kelly {:.3}",
        s.total_pnl,
        s.profit_factor,
        opt(s.payoff_ratio),
        s.kelly_fraction
    )
}

fn render_strategies(w: &mut dyn Write, rows: &[StrategyStats]) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(w, "No closed trades.");
    }
    for r in rows {
        writeln!(
            w,
            "{:<20} {:>4} trades {:>5.1}% win  pnl {:+.2}",
            r.strategy,
            r.trades,
            r.win_rate * 100.0,
            r.total_pnl
        )?;
    }
    Ok(())
}

fn render_status(w: &mut dyn Write, s: &StatusView) -> io::Result<()> {
    let v = &s.valuation;
    writeln!(
        w,
        "Portfolio {}: total {:.2} (cash {:.2}, holdings {:.2}), return {:+.2}%",
        s.session,
        v.total_value,
        v.cash,
        v.holdings_value,
        s.total_return * 100.0
    )?;
    writeln!(w, "  unrealized {:+.2}", s.unrealized_pnl)?;
    for h in &v.holdings {
        writeln!(
            w,
            "  {:<8} {:>8} @ {:>9.2} now {:>9.2} value {:>12.2} pnl {:+.2} ({:+.1}%)",
            h.symbol,
            h.shares,
            h.avg_cost,
            h.price,
            h.market_value,
            h.unrealized_pnl,
            h.pnl_pct * 100.0
        )?;
    }
    if !s.recent.is_empty() {
        writeln!(w, "Recent transactions:")?;
        for tx in &s.recent {
            writeln!(
                w,
                "  #{} {} {} {} x {:.2} = {:.2} at {}",
                tx.id,
                tx.action,
                tx.symbol,
                tx.shares,
                tx.price,
                tx.amount,
                tx.timestamp.format("%Y-%m-%d %H:%M")
            )?;
        }
    }
    if !s.open_entries.is_empty() {
        writeln!(w, "Open trades:")?;
        for e in &s.open_entries {
            render_entry(w, e)?;
        }
    }
    Ok(())
}

fn render_grade(w: &mut dyn Write, symbol: &str, g: &FundamentalGrade) -> io::Result<()> {
    writeln!(
        w,
        "{} grade {} ({:.1} points, {} confidence)",
        symbol.to_uppercase(),
        g.grade,
        g.points,
        g.confidence
    )?;
    writeln!(w, "  F-Score {} normalized {:.1}", g.fscore, g.fscore.normalized())?;
    for (criterion, result) in &g.fscore.criteria {
        let mark = match result {
            CriterionResult::Pass => "pass",
            CriterionResult::Fail => "fail",
            CriterionResult::Unknown => "n/a",
        };
        writeln!(w, "    {:<4} {:?}", mark, criterion)?;
    }
    writeln!(
        w,
        "  ROE {}%, D/E {}, current ratio {}, profit growth {}%",
        opt(g.return_on_equity_pct),
        opt(g.debt_to_equity),
        opt(g.current_ratio),
        opt(g.profit_growth_pct)
    )
}

fn render_plan(w: &mut dyn Write, p: &ActionPlan) -> io::Result<()> {
    writeln!(
        w,
        "Action plan {}: value {:.2}, cash {:.2}, budget {:.2}",
        p.session, p.total_value, p.cash, p.budget
    )?;
    if p.halt.active {
        writeln!(w, "  TRADING HALTED: no new BUY orders this session")?;
    }
    for a in &p.stop_losses {
        writeln!(w, "  STOP {} {} shares ({:+.1}%)", a.symbol, a.shares, a.pnl_pct * 100.0)?;
    }
    for item in &p.items {
        let action = item.action.map_or_else(|| "-".to_string(), |a| a.to_string());
        write!(w, "  {:<8} {:<5} {:<7}", item.symbol, action, item.step.label())?;
        match &item.step {
            PlanStep::Order { amount, shares, .. } => match shares {
                Some(n) => write!(w, " {} shares, {:.2}", n, amount)?,
                None => write!(w, " {:.2}", amount)?,
            },
            PlanStep::Hold { reason, .. } => write!(w, " {}", reason)?,
            PlanStep::Blocked { verdict } => {
                if let Some(f) = verdict.findings.iter().find(|f| f.severity == Severity::Block) {
                    write!(w, " {}", f.message)?;
                }
            }
            PlanStep::Skip { error } => write!(w, " {}", error)?,
            PlanStep::Halted { .. } | PlanStep::Signal => {}
        }
        if let Some(e) = &item.evaluation {
            write!(w, " (composite {:.1})", e.composite.value)?;
        }
        writeln!(w)?;
    }
    Ok(())
}
