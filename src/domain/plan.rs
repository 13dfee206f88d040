//! Symbol evaluation and the daily action plan.
//!
//! `evaluate` turns one observation (plus optional statements) into a
//! composite score and a classified signal. `build_plan` runs that for every
//! observed symbol against one consistent book, routing BUY signals through
//! the halt check, `risk::check_buy` and the sizer. Symbols are independent:
//! a failure is recorded as a skipped step and the plan carries on.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::book::Book;
use super::classifier::{Signal, SignalAction};
use super::composite::{compute_composite, CompositeScore, Domain, SubScore};
use super::config::EngineConfig;
use super::error::TradegateError;
use super::fundamental::{grade, FundamentalGrade, StatementPeriod};
use super::normalizer::{normalize, Observation};
use super::portfolio::{normalize_symbol, Quotes};
use super::risk::{check_buy, daily_halt, stop_loss_scan, HaltStatus, RiskVerdict, StopLossAlert, VerdictStatus};
use super::rule_eval::SignalInputs;
use super::sizing::{conviction_weight, size, SizedOrder, SizingDecision, SizingRequest};
use super::metrics::JournalStats;
use super::snapshot::session_date;
use crate::ports::market_port::MarketPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub symbol: String,
    pub observed_at: NaiveDateTime,
    pub sub_scores: Vec<SubScore>,
    pub composite: CompositeScore,
    pub fundamental: Option<FundamentalGrade>,
    pub inputs: SignalInputs,
    pub signal: Signal,
}

/// Values the signal rules see. Sentiment is the normalized sub-score, so
/// rule thresholds share the [-100, 100] scale with the composite.
pub fn signal_inputs(
    obs: &Observation,
    composite: &CompositeScore,
    sub_scores: &[SubScore],
    fundamental: Option<&FundamentalGrade>,
) -> SignalInputs {
    SignalInputs {
        composite: composite.value,
        rsi: obs.rsi,
        sentiment: sub_scores
            .iter()
            .find(|s| s.domain == Domain::Sentiment)
            .and_then(|s| s.value),
        volume_ratio: obs.volume_ratio,
        fscore: fundamental.map(|g| g.fscore.normalized()),
        price_change_pct: obs.price_change_pct,
    }
}

/// Score and classify one symbol. Fewer than two statement periods leaves
/// the fundamental domain absent rather than failing.
pub fn evaluate(
    obs: &Observation,
    periods: &[StatementPeriod],
    config: &EngineConfig,
) -> Result<Evaluation, TradegateError> {
    let symbol = normalize_symbol(&obs.symbol);
    let fundamental = if periods.len() >= 2 {
        Some(grade(periods, &config.grading)?)
    } else {
        None
    };

    let sub_scores = normalize(obs, fundamental.as_ref().map(|g| &g.fscore));
    let composite = compute_composite(&symbol, &sub_scores, &config.weights)?;
    let inputs = signal_inputs(obs, &composite, &sub_scores, fundamental.as_ref());
    let signal = config.signals.classify(&composite, &inputs);

    debug!(
        symbol = %symbol,
        composite = composite.value,
        domains = composite.contributing_domains.len(),
        action = %signal.action,
        "evaluated"
    );

    Ok(Evaluation {
        symbol,
        observed_at: obs.observed_at,
        sub_scores,
        composite,
        fundamental,
        inputs,
        signal,
    })
}

/// The newest observation per symbol, ordered by symbol.
pub fn latest_observations(observations: Vec<Observation>) -> Vec<Observation> {
    let mut latest: BTreeMap<String, Observation> = BTreeMap::new();
    for mut obs in observations {
        let symbol = normalize_symbol(&obs.symbol);
        obs.symbol = symbol.clone();
        match latest.get(&symbol) {
            Some(existing) if existing.observed_at >= obs.observed_at => {}
            _ => {
                latest.insert(symbol, obs);
            }
        }
    }
    latest.into_values().collect()
}

/// Evaluate the latest observation of each requested symbol, or of every
/// observed symbol when `symbols` is empty.
pub fn score_symbols(
    market: &dyn MarketPort,
    symbols: &[String],
    config: &EngineConfig,
) -> Result<Vec<Evaluation>, TradegateError> {
    let wanted: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
    let observations: Vec<Observation> = latest_observations(market.observations()?)
        .into_iter()
        .filter(|o| wanted.is_empty() || wanted.contains(&o.symbol))
        .collect();
    if let Some(missing) = wanted
        .iter()
        .find(|w| !observations.iter().any(|o| &o.symbol == *w))
    {
        return Err(TradegateError::NotFound {
            what: format!("observation for {}", missing),
        });
    }
    observations
        .iter()
        .map(|obs| evaluate(obs, &market.statements(&obs.symbol)?, config))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    /// A sized BUY that passed risk.
    Order {
        amount: f64,
        shares: Option<u64>,
        verdict: RiskVerdict,
        sizing: SizedOrder,
    },
    /// A BUY signal the sizer turned into HOLD.
    Hold {
        reason: String,
        verdict: Option<RiskVerdict>,
        sizing: Option<SizedOrder>,
    },
    Blocked { verdict: RiskVerdict },
    Halted { halt: HaltStatus },
    /// SELL, WATCH and HOLD signals are reported as is.
    Signal,
    Skip { error: String },
}

impl PlanStep {
    pub fn label(&self) -> &'static str {
        match self {
            PlanStep::Order { .. } => "ORDER",
            PlanStep::Hold { .. } => "HOLD",
            PlanStep::Blocked { .. } => "BLOCKED",
            PlanStep::Halted { .. } => "HALTED",
            PlanStep::Signal => "SIGNAL",
            PlanStep::Skip { .. } => "SKIP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanItem {
    pub symbol: String,
    pub action: Option<SignalAction>,
    pub evaluation: Option<Evaluation>,
    pub step: PlanStep,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionPlan {
    pub session: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub total_value: f64,
    pub cash: f64,
    pub budget: f64,
    pub halt: HaltStatus,
    /// Holdings at or through the stop; candidates for an exit.
    pub stop_losses: Vec<StopLossAlert>,
    pub items: Vec<PlanItem>,
}

impl ActionPlan {
    pub fn orders(&self) -> impl Iterator<Item = &PlanItem> {
        self.items
            .iter()
            .filter(|i| matches!(i.step, PlanStep::Order { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &PlanItem> {
        self.items
            .iter()
            .filter(|i| matches!(i.step, PlanStep::Skip { .. }))
    }
}

struct PlanContext<'a> {
    book: &'a Book,
    quotes: &'a Quotes,
    stats: Option<&'a JournalStats>,
    config: &'a EngineConfig,
    total_value: f64,
    budget: f64,
    halt: &'a HaltStatus,
}

fn plan_buy(ctx: &PlanContext<'_>, evaluation: &Evaluation) -> Result<PlanStep, TradegateError> {
    if ctx.halt.active {
        return Ok(PlanStep::Halted {
            halt: ctx.halt.clone(),
        });
    }

    let weight = conviction_weight(
        evaluation.composite.value,
        evaluation.composite.confidence,
        &ctx.config.sizing,
    );
    let requested = ctx.budget * weight;
    if requested <= 0.0 {
        return Ok(PlanStep::Hold {
            reason: "no budget available".to_string(),
            verdict: None,
            sizing: None,
        });
    }

    let valuation = ctx.book.ledger.value(ctx.quotes);
    let verdict = check_buy(
        &evaluation.symbol,
        requested,
        &valuation,
        ctx.quotes,
        ctx.book.snapshots.latest(),
        &ctx.config.limits,
    )?;
    if verdict.status == VerdictStatus::Blocked {
        return Ok(PlanStep::Blocked { verdict });
    }

    let request = SizingRequest {
        budget: ctx.budget,
        approved_amount: verdict.adjusted_amount,
        composite: evaluation.composite.value,
        confidence: evaluation.composite.confidence,
        total_value: ctx.total_value,
        price: ctx
            .quotes
            .get(&evaluation.symbol)
            .map(|q| q.price)
            .filter(|p| *p > 0.0),
    };
    let sizing = size(&request, ctx.stats, &ctx.config.sizing);
    Ok(match sizing.decision.clone() {
        SizingDecision::Order { amount, shares } => PlanStep::Order {
            amount,
            shares,
            verdict,
            sizing,
        },
        SizingDecision::Hold { reason } => PlanStep::Hold {
            reason,
            verdict: Some(verdict),
            sizing: Some(sizing),
        },
    })
}

/// Evaluate every observed symbol against `book`. `budget` defaults to the
/// available cash and applies to each BUY independently.
pub fn build_plan(
    book: &Book,
    market: &dyn MarketPort,
    config: &EngineConfig,
    budget: Option<f64>,
    now: DateTime<Utc>,
) -> Result<ActionPlan, TradegateError> {
    let quotes = market.quotes()?;
    let observations = latest_observations(market.observations()?);
    let valuation = book.ledger.value(&quotes);
    let halt = daily_halt(book.snapshots.latest(), &config.limits);
    let stats = JournalStats::compute(book.journal.entries());
    let budget = budget.unwrap_or(valuation.cash).max(0.0);

    let ctx = PlanContext {
        book,
        quotes: &quotes,
        stats: Some(&stats),
        config,
        total_value: valuation.total_value,
        budget,
        halt: &halt,
    };

    let mut items = Vec::with_capacity(observations.len());
    for obs in &observations {
        let evaluated = market
            .statements(&obs.symbol)
            .and_then(|periods| evaluate(obs, &periods, config));
        let evaluation = match evaluated {
            Ok(e) => e,
            Err(e) => {
                warn!(symbol = %obs.symbol, error = %e, "skipping symbol");
                items.push(PlanItem {
                    symbol: obs.symbol.clone(),
                    action: None,
                    evaluation: None,
                    step: PlanStep::Skip {
                        error: e.to_string(),
                    },
                });
                continue;
            }
        };

        let step = match evaluation.signal.action {
            SignalAction::Buy => plan_buy(&ctx, &evaluation).unwrap_or_else(|e| {
                warn!(symbol = %evaluation.symbol, error = %e, "buy step failed");
                PlanStep::Skip {
                    error: e.to_string(),
                }
            }),
            _ => PlanStep::Signal,
        };
        info!(
            symbol = %evaluation.symbol,
            action = %evaluation.signal.action,
            step = step.label(),
            "plan step"
        );
        items.push(PlanItem {
            symbol: evaluation.symbol.clone(),
            action: Some(evaluation.signal.action),
            evaluation: Some(evaluation),
            step,
        });
    }

    Ok(ActionPlan {
        session: session_date(now, config.utc_offset_hours),
        generated_at: now,
        total_value: valuation.total_value,
        cash: valuation.cash,
        budget,
        halt,
        stop_losses: stop_loss_scan(&valuation, &config.limits)
            .into_iter()
            .filter(|s| s.triggered)
            .collect(),
        items,
    })
}
