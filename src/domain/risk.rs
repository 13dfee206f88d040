//! Portfolio risk checks.
//!
//! `check_buy` validates one proposed purchase against the position limit,
//! deployment cap, daily loss halt, sector concentration and available cash.
//! `report` runs the portfolio-wide scans on demand. Limit comparisons are
//! done in value space with a small tolerance, so an order that lands exactly
//! on a limit is allowed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::error::TradegateError;
use super::portfolio::{normalize_symbol, sector_of, PriceSource, Quotes, Valuation};
use super::snapshot::PortfolioSnapshot;

const VALUE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_pct: f64,
    pub max_deployment_pct: f64,
    pub stop_loss_pct: f64,
    pub daily_loss_halt_pct: f64,
    pub max_sector_pct: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            max_position_pct: 0.15,
            max_deployment_pct: 0.50,
            stop_loss_pct: -0.15,
            daily_loss_halt_pct: -0.05,
            max_sector_pct: 0.40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatBands {
    pub medium: f64,
    pub high: f64,
}

impl Default for HeatBands {
    fn default() -> Self {
        HeatBands {
            medium: 0.08,
            high: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRule {
    DailyLossHalt,
    PositionLimit,
    DeploymentCap,
    SectorConcentration,
    CashAvailable,
}

impl fmt::Display for RiskRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskRule::DailyLossHalt => "daily_loss_halt",
            RiskRule::PositionLimit => "position_limit",
            RiskRule::DeploymentCap => "deployment_cap",
            RiskRule::SectorConcentration => "sector_concentration",
            RiskRule::CashAvailable => "cash_available",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Pass,
    Warning,
    Reduce,
    Block,
}

/// Result of one check. `margin` is the headroom left under the limit in
/// the rule's own unit; negative means the limit is breached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFinding {
    pub rule: RiskRule,
    pub severity: Severity,
    pub margin: f64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Approved,
    Reduced,
    Blocked,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictStatus::Approved => "APPROVED",
            VerdictStatus::Reduced => "REDUCED",
            VerdictStatus::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskVerdict {
    pub symbol: String,
    pub requested_amount: f64,
    pub adjusted_amount: f64,
    pub status: VerdictStatus,
    pub findings: Vec<RiskFinding>,
}

impl RiskVerdict {
    pub fn warnings(&self) -> impl Iterator<Item = &RiskFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn finding(&self, rule: RiskRule) -> Option<&RiskFinding> {
        self.findings.iter().find(|f| f.rule == rule)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HaltStatus {
    pub active: bool,
    pub session: Option<NaiveDate>,
    pub daily_pnl_pct: Option<f64>,
    pub threshold: f64,
}

impl HaltStatus {
    pub fn margin(&self) -> f64 {
        self.daily_pnl_pct
            .map(|p| p - self.threshold)
            .unwrap_or(-self.threshold)
    }
}

/// Halt state from the most recent snapshot; it persists until a later
/// session's snapshot is back above the threshold.
pub fn daily_halt(latest: Option<&PortfolioSnapshot>, limits: &RiskLimits) -> HaltStatus {
    HaltStatus {
        active: latest.is_some_and(|s| s.daily_pnl_pct <= limits.daily_loss_halt_pct),
        session: latest.map(|s| s.date),
        daily_pnl_pct: latest.map(|s| s.daily_pnl_pct),
        threshold: limits.daily_loss_halt_pct,
    }
}

fn pct(value: f64, total: f64) -> f64 {
    if total > 0.0 { value / total } else { 0.0 }
}

pub fn check_buy(
    symbol: &str,
    amount: f64,
    valuation: &Valuation,
    quotes: &Quotes,
    latest: Option<&PortfolioSnapshot>,
    limits: &RiskLimits,
) -> Result<RiskVerdict, TradegateError> {
    let symbol = normalize_symbol(symbol);
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TradegateError::invalid_order(format!(
            "requested amount must be positive, got {}",
            amount
        )));
    }
    let total = valuation.total_value;
    if total <= 0.0 {
        return Err(TradegateError::invalid_order(
            "portfolio has no value to size against",
        ));
    }

    let mut findings = Vec::with_capacity(5);

    let halt = daily_halt(latest, limits);
    findings.push(RiskFinding {
        rule: RiskRule::DailyLossHalt,
        severity: if halt.active { Severity::Block } else { Severity::Pass },
        margin: halt.margin(),
        message: match (halt.active, halt.daily_pnl_pct) {
            (true, Some(p)) => format!(
                "trading halted: session P&L {:.2}% at or below {:.2}%",
                p * 100.0,
                limits.daily_loss_halt_pct * 100.0
            ),
            (_, Some(p)) => format!("session P&L {:.2}%", p * 100.0),
            (_, None) => "no snapshot recorded".to_string(),
        },
    });

    let existing = valuation.market_value_of(&symbol);
    let position_limit = limits.max_position_pct * total;
    let mut adjusted = amount;
    if existing + amount > position_limit + VALUE_EPSILON {
        adjusted = (position_limit - existing).max(0.0);
        findings.push(RiskFinding {
            rule: RiskRule::PositionLimit,
            severity: Severity::Reduce,
            margin: pct(position_limit - existing - amount, total),
            message: if adjusted > 0.0 {
                format!(
                    "{} would be {:.2}% of portfolio (limit {:.2}%); reduced to {:.2}",
                    symbol,
                    pct(existing + amount, total) * 100.0,
                    limits.max_position_pct * 100.0,
                    adjusted
                )
            } else {
                format!(
                    "{} already at {:.2}% of portfolio (limit {:.2}%); no headroom, nothing approved",
                    symbol,
                    pct(existing, total) * 100.0,
                    limits.max_position_pct * 100.0
                )
            },
        });
    } else {
        findings.push(RiskFinding {
            rule: RiskRule::PositionLimit,
            severity: Severity::Pass,
            margin: pct(position_limit - existing - amount, total),
            message: format!(
                "{} at {:.2}% of portfolio",
                symbol,
                pct(existing + amount, total) * 100.0
            ),
        });
    }

    let deployment_cap = limits.max_deployment_pct * total;
    let deployed_after = valuation.holdings_value + adjusted;
    let over_cap = deployed_after > deployment_cap + VALUE_EPSILON;
    findings.push(RiskFinding {
        rule: RiskRule::DeploymentCap,
        severity: if over_cap { Severity::Block } else { Severity::Pass },
        margin: pct(deployment_cap - deployed_after, total),
        message: format!(
            "deployment would be {:.2}% (cap {:.2}%)",
            pct(deployed_after, total) * 100.0,
            limits.max_deployment_pct * 100.0
        ),
    });

    let sector = sector_of(quotes, &symbol);
    let sector_after = valuation.sector_values().get(&sector).copied().unwrap_or(0.0) + adjusted;
    let sector_limit = limits.max_sector_pct * total;
    let sector_over = sector_after > sector_limit + VALUE_EPSILON;
    findings.push(RiskFinding {
        rule: RiskRule::SectorConcentration,
        severity: if sector_over { Severity::Warning } else { Severity::Pass },
        margin: pct(sector_limit - sector_after, total),
        message: format!(
            "sector {} would be {:.2}% (limit {:.2}%)",
            sector,
            pct(sector_after, total) * 100.0,
            limits.max_sector_pct * 100.0
        ),
    });

    let short_cash = adjusted > valuation.cash + VALUE_EPSILON;
    findings.push(RiskFinding {
        rule: RiskRule::CashAvailable,
        severity: if short_cash { Severity::Warning } else { Severity::Pass },
        margin: valuation.cash - adjusted,
        message: if short_cash {
            format!(
                "insufficient cash: {:.2} needed, {:.2} available",
                adjusted, valuation.cash
            )
        } else {
            format!("{:.2} cash available", valuation.cash)
        },
    });

    let status = if findings.iter().any(|f| f.severity == Severity::Block) {
        adjusted = 0.0;
        VerdictStatus::Blocked
    } else if findings.iter().any(|f| f.severity == Severity::Reduce) {
        VerdictStatus::Reduced
    } else {
        VerdictStatus::Approved
    };

    info!(
        symbol = %symbol,
        requested = amount,
        adjusted,
        status = %status,
        "risk verdict"
    );

    Ok(RiskVerdict {
        symbol,
        requested_amount: amount,
        adjusted_amount: adjusted,
        status,
        findings,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopLossAlert {
    pub symbol: String,
    pub shares: u64,
    pub avg_cost: f64,
    pub price: f64,
    pub price_source: PriceSource,
    pub market_value: f64,
    pub pnl_pct: f64,
    /// How far the return sits above the stop; zero or negative once hit.
    pub distance_to_stop: f64,
    pub triggered: bool,
}

pub fn stop_loss_scan(valuation: &Valuation, limits: &RiskLimits) -> Vec<StopLossAlert> {
    valuation
        .holdings
        .iter()
        .map(|h| StopLossAlert {
            symbol: h.symbol.clone(),
            shares: h.shares,
            avg_cost: h.avg_cost,
            price: h.price,
            price_source: h.price_source,
            market_value: h.market_value,
            pnl_pct: h.pnl_pct,
            distance_to_stop: h.pnl_pct - limits.stop_loss_pct,
            triggered: h.pnl_pct <= limits.stop_loss_pct,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorExposure {
    pub sector: String,
    pub value: f64,
    pub pct: f64,
    pub over_limit: bool,
}

/// Sector weights of the whole portfolio, largest first.
pub fn sector_exposure(valuation: &Valuation, limits: &RiskLimits) -> Vec<SectorExposure> {
    let mut rows: Vec<SectorExposure> = valuation
        .sector_values()
        .into_iter()
        .map(|(sector, value)| {
            let share = pct(value, valuation.total_value);
            SectorExposure {
                sector,
                value,
                pct: share,
                over_limit: share > limits.max_sector_pct + VALUE_EPSILON,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.value.total_cmp(&a.value));
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeatLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for HeatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeatLevel::Low => "LOW",
            HeatLevel::Medium => "MEDIUM",
            HeatLevel::High => "HIGH",
        };
        f.write_str(s)
    }
}

impl HeatBands {
    pub fn level(&self, heat: f64) -> HeatLevel {
        if heat >= self.high {
            HeatLevel::High
        } else if heat >= self.medium {
            HeatLevel::Medium
        } else {
            HeatLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatContribution {
    pub symbol: String,
    pub weight: f64,
    pub volatility: f64,
    pub heat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioHeat {
    pub total: f64,
    pub level: HeatLevel,
    pub contributions: Vec<HeatContribution>,
}

/// Sum of position weight times volatility. Missing volatility counts as zero.
pub fn portfolio_heat(valuation: &Valuation, bands: &HeatBands) -> PortfolioHeat {
    let contributions: Vec<HeatContribution> = valuation
        .holdings
        .iter()
        .map(|h| {
            let weight = pct(h.market_value, valuation.total_value);
            HeatContribution {
                symbol: h.symbol.clone(),
                weight,
                volatility: h.volatility,
                heat: weight * h.volatility,
            }
        })
        .collect();
    let total = contributions.iter().map(|c| c.heat).sum();
    PortfolioHeat {
        total,
        level: bands.level(total),
        contributions,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Ok,
    Elevated,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Ok => f.write_str("OK"),
            RiskLevel::Elevated => f.write_str("ELEVATED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub session: NaiveDate,
    pub total_value: f64,
    pub cash: f64,
    pub holdings_value: f64,
    pub deployment_pct: f64,
    pub deployment_limit: f64,
    pub halt: HaltStatus,
    pub stop_losses: Vec<StopLossAlert>,
    pub sectors: Vec<SectorExposure>,
    pub heat: PortfolioHeat,
    pub warnings: Vec<String>,
    pub level: RiskLevel,
}

impl RiskReport {
    pub fn triggered_stops(&self) -> impl Iterator<Item = &StopLossAlert> {
        self.stop_losses.iter().filter(|s| s.triggered)
    }
}

pub fn report(
    session: NaiveDate,
    valuation: &Valuation,
    latest: Option<&PortfolioSnapshot>,
    limits: &RiskLimits,
    bands: &HeatBands,
    min_ticket: f64,
) -> RiskReport {
    let halt = daily_halt(latest, limits);
    let stop_losses = stop_loss_scan(valuation, limits);
    let sectors = sector_exposure(valuation, limits);
    let heat = portfolio_heat(valuation, bands);
    let deployment_pct = valuation.deployment_pct();

    let mut warnings = Vec::new();
    if halt.active {
        warnings.push(format!(
            "daily loss halt active since {}: new buys blocked",
            halt.session.map(|d| d.to_string()).unwrap_or_default()
        ));
    }
    for stop in stop_losses.iter().filter(|s| s.triggered) {
        warnings.push(format!(
            "stop-loss triggered for {}: {:.2}% at {:.2}",
            stop.symbol,
            stop.pnl_pct * 100.0,
            stop.price
        ));
    }
    if deployment_pct > limits.max_deployment_pct + VALUE_EPSILON {
        warnings.push(format!(
            "deployment {:.2}% exceeds cap {:.2}%",
            deployment_pct * 100.0,
            limits.max_deployment_pct * 100.0
        ));
    }
    for sector in sectors.iter().filter(|s| s.over_limit) {
        warnings.push(format!(
            "sector {} at {:.2}% exceeds {:.2}%",
            sector.sector,
            sector.pct * 100.0,
            limits.max_sector_pct * 100.0
        ));
    }
    if heat.level == HeatLevel::High {
        warnings.push(format!("portfolio heat {:.4} is HIGH", heat.total));
    }
    if valuation.cash < min_ticket {
        warnings.push(format!(
            "insufficient cash: {:.2} is below the minimum ticket {:.2}",
            valuation.cash, min_ticket
        ));
    }

    let level = if warnings.is_empty() {
        RiskLevel::Ok
    } else {
        RiskLevel::Elevated
    };
    debug!(%session, warnings = warnings.len(), level = %level, "risk report");

    RiskReport {
        session,
        total_value: valuation.total_value,
        cash: valuation.cash,
        holdings_value: valuation.holdings_value,
        deployment_pct,
        deployment_limit: limits.max_deployment_pct,
        halt,
        stop_losses,
        sectors,
        heat,
        warnings,
        level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::portfolio::{quotes_from, Ledger, Quote};
    use chrono::{TimeZone, Utc};

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap()
    }

    fn quote(symbol: &str, price: f64, vol: f64, sector: &str) -> Quote {
        Quote {
            symbol: symbol.into(),
            price,
            volatility: Some(vol),
            sector: Some(sector.into()),
        }
    }

    /// 100,000 total with PTT at 14%.
    fn fourteen_pct_ptt() -> (Ledger, Quotes) {
        let mut ledger = Ledger::new(100_000.0);
        let tx = ledger.prepare_buy("PTT", 14_000.0, 35.0, at()).unwrap();
        ledger.apply(tx).unwrap();
        let quotes = quotes_from(vec![quote("PTT", 35.0, 0.30, "Energy")]);
        (ledger, quotes)
    }

    fn snapshot(pct: f64) -> PortfolioSnapshot {
        PortfolioSnapshot {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            cash: 0.0,
            holdings_value: 0.0,
            total_value: 100_000.0,
            daily_pnl: pct * 100_000.0,
            daily_pnl_pct: pct,
            recorded_at: at(),
        }
    }

    #[test]
    fn reduces_to_exact_position_limit() {
        let (ledger, quotes) = fourteen_pct_ptt();
        let v = ledger.value(&quotes);
        let verdict = check_buy("PTT", 3_000.0, &v, &quotes, None, &RiskLimits::default()).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Reduced);
        assert!((verdict.adjusted_amount - 1_000.0).abs() < 1e-9);
        let after = (v.market_value_of("PTT") + verdict.adjusted_amount) / v.total_value;
        assert!((after - 0.15).abs() < 1e-12);
        let finding = verdict.finding(RiskRule::PositionLimit).unwrap();
        assert_eq!(finding.severity, Severity::Reduce);
        assert!((finding.margin + 0.02).abs() < 1e-12);
    }

    #[test]
    fn exactly_at_limit_is_approved() {
        let (ledger, quotes) = fourteen_pct_ptt();
        let v = ledger.value(&quotes);
        let verdict = check_buy("PTT", 1_000.0, &v, &quotes, None, &RiskLimits::default()).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Approved);
        assert!((verdict.adjusted_amount - 1_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn already_at_limit_reduces_to_zero() {
        let (ledger, quotes) = fourteen_pct_ptt();
        let mut limits = RiskLimits::default();
        limits.max_position_pct = 0.10;
        let v = ledger.value(&quotes);
        let verdict = check_buy("PTT", 2_000.0, &v, &quotes, None, &limits).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Reduced);
        assert!((verdict.adjusted_amount).abs() < f64::EPSILON);
        let finding = verdict.finding(RiskRule::PositionLimit).unwrap();
        assert!(finding.message.contains("no headroom"), "{}", finding.message);
    }

    #[test]
    fn daily_halt_blocks() {
        let (ledger, quotes) = fourteen_pct_ptt();
        let v = ledger.value(&quotes);
        let snap = snapshot(-0.05);
        let verdict =
            check_buy("AOT", 1_000.0, &v, &quotes, Some(&snap), &RiskLimits::default()).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Blocked);
        assert!((verdict.adjusted_amount).abs() < f64::EPSILON);
        assert_eq!(
            verdict.finding(RiskRule::DailyLossHalt).unwrap().severity,
            Severity::Block
        );
    }

    #[test]
    fn small_loss_does_not_halt() {
        let snap = snapshot(-0.049);
        assert!(!daily_halt(Some(&snap), &RiskLimits::default()).active);
        assert!(!daily_halt(None, &RiskLimits::default()).active);
    }

    #[test]
    fn deployment_cap_blocks() {
        let mut ledger = Ledger::new(100_000.0);
        for (sym, amt) in [("A", 15_000.0), ("B", 15_000.0), ("C", 15_000.0)] {
            let tx = ledger.prepare_buy(sym, amt, 10.0, at()).unwrap();
            ledger.apply(tx).unwrap();
        }
        let quotes = Quotes::new();
        let v = ledger.value(&quotes);
        let verdict = check_buy("D", 10_000.0, &v, &quotes, None, &RiskLimits::default()).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Blocked);
        let cap = verdict.finding(RiskRule::DeploymentCap).unwrap();
        assert!((cap.margin + 0.05).abs() < 1e-12);

        let ok = check_buy("D", 5_000.0, &v, &quotes, None, &RiskLimits::default()).unwrap();
        assert_eq!(ok.status, VerdictStatus::Approved);
    }

    #[test]
    fn sector_concentration_warns_without_blocking() {
        let mut ledger = Ledger::new(100_000.0);
        for sym in ["PTT", "PTTEP", "TOP"] {
            let tx = ledger.prepare_buy(sym, 13_000.0, 10.0, at()).unwrap();
            ledger.apply(tx).unwrap();
        }
        let quotes = quotes_from(vec![
            quote("PTT", 10.0, 0.2, "Energy"),
            quote("PTTEP", 10.0, 0.2, "Energy"),
            quote("TOP", 10.0, 0.2, "Energy"),
            quote("BANPU", 10.0, 0.2, "Energy"),
        ]);
        let v = ledger.value(&quotes);
        let verdict = check_buy("BANPU", 5_000.0, &v, &quotes, None, &RiskLimits::default()).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Approved);
        assert_eq!(verdict.warnings().count(), 1);
        assert_eq!(
            verdict.finding(RiskRule::SectorConcentration).unwrap().severity,
            Severity::Warning
        );
    }

    #[test]
    fn invalid_amount_rejected() {
        let (ledger, quotes) = fourteen_pct_ptt();
        let v = ledger.value(&quotes);
        assert!(check_buy("PTT", 0.0, &v, &quotes, None, &RiskLimits::default()).is_err());
        assert!(check_buy("PTT", f64::NAN, &v, &quotes, None, &RiskLimits::default()).is_err());
    }

    #[test]
    fn stop_loss_scan_flags_at_threshold() {
        let mut ledger = Ledger::new(100_000.0);
        let tx = ledger.prepare_buy("PTT", 10_000.0, 40.0, at()).unwrap();
        ledger.apply(tx).unwrap();
        let quotes = quotes_from(vec![quote("PTT", 34.0, 0.3, "Energy")]);
        let alerts = stop_loss_scan(&ledger.value(&quotes), &RiskLimits::default());
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].triggered);
        assert!(alerts[0].distance_to_stop <= 0.0);

        let quotes = quotes_from(vec![quote("PTT", 38.0, 0.3, "Energy")]);
        let alerts = stop_loss_scan(&ledger.value(&quotes), &RiskLimits::default());
        assert!(!alerts[0].triggered);
        assert!((alerts[0].distance_to_stop - 0.10).abs() < 1e-12);
    }

    #[test]
    fn heat_bands() {
        let bands = HeatBands::default();
        assert_eq!(bands.level(0.0), HeatLevel::Low);
        assert_eq!(bands.level(0.0799), HeatLevel::Low);
        assert_eq!(bands.level(0.08), HeatLevel::Medium);
        assert_eq!(bands.level(0.15), HeatLevel::High);
    }

    #[test]
    fn heat_is_weight_times_volatility() {
        let (ledger, quotes) = fourteen_pct_ptt();
        let heat = portfolio_heat(&ledger.value(&quotes), &HeatBands::default());
        assert!((heat.total - 0.14 * 0.30).abs() < 1e-12);
        assert_eq!(heat.level, HeatLevel::Low);
    }

    #[test]
    fn report_collects_warnings() {
        let mut ledger = Ledger::new(100_000.0);
        let tx = ledger.prepare_buy("PTT", 45_000.0, 40.0, at()).unwrap();
        ledger.apply(tx).unwrap();
        let quotes = quotes_from(vec![quote("PTT", 32.0, 0.5, "Energy")]);
        let session = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let snap = snapshot(-0.06);
        let r = report(
            session,
            &ledger.value(&quotes),
            Some(&snap),
            &RiskLimits::default(),
            &HeatBands::default(),
            5_000.0,
        );
        assert_eq!(r.level, RiskLevel::Elevated);
        assert!(r.halt.active);
        assert_eq!(r.triggered_stops().count(), 1);
        assert!(r.warnings.iter().any(|w| w.contains("stop-loss")));
        assert!(r.warnings.iter().any(|w| w.contains("halt")));
    }

    #[test]
    fn quiet_report_is_ok() {
        let (ledger, quotes) = fourteen_pct_ptt();
        let r = report(
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            &ledger.value(&quotes),
            None,
            &RiskLimits::default(),
            &HeatBands::default(),
            5_000.0,
        );
        assert_eq!(r.level, RiskLevel::Ok);
        assert!(r.warnings.is_empty());
        assert!((r.deployment_pct - 0.14).abs() < 1e-12);
    }
}
