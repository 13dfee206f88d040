//! Engine configuration.
//!
//! Reads every section through `ConfigPort`, falls back to defaults for
//! absent keys and validates ranges once at startup. A present but malformed
//! value is an error, never silently replaced by the default.

use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::classifier::{SignalAction, SignalRuleSet};
use crate::domain::composite::ScoringWeights;
use crate::domain::error::TradegateError;
use crate::domain::fundamental::GradeTable;
use crate::domain::risk::{HeatBands, RiskLimits};
use crate::domain::sizing::SizingConfig;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub lock_timeout_ms: u64,
    pub pool_size: u32,
    pub wal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: PathBuf::from("tradegate.db"),
            lock_timeout_ms: 5_000,
            pool_size: 4,
            wal: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub initial_cash: f64,
    pub utc_offset_hours: i32,
    pub weights: ScoringWeights,
    pub signals: SignalRuleSet,
    pub limits: RiskLimits,
    pub heat: HeatBands,
    pub sizing: SizingConfig,
    pub grading: GradeTable,
    pub default_strategy: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            store: StoreConfig::default(),
            initial_cash: 100_000.0,
            utc_offset_hours: 7,
            weights: ScoringWeights::default(),
            signals: SignalRuleSet::default(),
            limits: RiskLimits::default(),
            heat: HeatBands::default(),
            sizing: SizingConfig::default(),
            grading: GradeTable::default(),
            default_strategy: "composite".to_string(),
        }
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TradegateError {
    TradegateError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn value<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, TradegateError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw.trim()))),
    }
}

fn in_range(
    section: &str,
    key: &str,
    v: f64,
    ok: bool,
    expectation: &str,
) -> Result<f64, TradegateError> {
    if v.is_finite() && ok {
        Ok(v)
    } else {
        Err(invalid(section, key, format!("{} must be {}, got {}", key, expectation, v)))
    }
}

fn fraction(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, TradegateError> {
    let v = value(config, section, key, default)?;
    in_range(section, key, v, v > 0.0 && v <= 1.0, "in (0, 1]")
}

fn negative_fraction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TradegateError> {
    let v = value(config, section, key, default)?;
    in_range(section, key, v, v > -1.0 && v < 0.0, "in (-1, 0)")
}

pub fn load_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, TradegateError> {
    let defaults = EngineConfig::default();
    Ok(EngineConfig {
        store: load_store(config, &defaults.store)?,
        initial_cash: load_initial_cash(config, defaults.initial_cash)?,
        utc_offset_hours: load_utc_offset(config, defaults.utc_offset_hours)?,
        weights: load_weights(config, &defaults.weights)?,
        signals: load_signals(config, defaults.signals)?,
        limits: load_limits(config, &defaults.limits)?,
        heat: load_heat(config, &defaults.heat)?,
        sizing: load_sizing(config, &defaults.sizing)?,
        grading: load_grading(config, defaults.grading)?,
        default_strategy: load_default_strategy(config, &defaults.default_strategy)?,
    })
}

fn load_store(config: &dyn ConfigPort, d: &StoreConfig) -> Result<StoreConfig, TradegateError> {
    let path = match config.get_string("store", "path") {
        Some(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
        Some(_) => return Err(invalid("store", "path", "path must not be empty")),
        None => d.path.clone(),
    };
    let lock_timeout_ms: u64 = value(config, "store", "lock_timeout_ms", d.lock_timeout_ms)?;
    let pool_size: u32 = value(config, "store", "pool_size", d.pool_size)?;
    if pool_size == 0 {
        return Err(invalid("store", "pool_size", "pool_size must be at least 1"));
    }
    Ok(StoreConfig {
        path,
        lock_timeout_ms,
        pool_size,
        wal: config.get_bool("store", "wal", d.wal),
    })
}

fn load_initial_cash(config: &dyn ConfigPort, default: f64) -> Result<f64, TradegateError> {
    let v = value(config, "portfolio", "initial_cash", default)?;
    in_range("portfolio", "initial_cash", v, v > 0.0, "positive")
}

fn load_utc_offset(config: &dyn ConfigPort, default: i32) -> Result<i32, TradegateError> {
    let v: i32 = value(config, "market", "utc_offset_hours", default)?;
    if !(-12..=14).contains(&v) {
        return Err(invalid(
            "market",
            "utc_offset_hours",
            format!("utc_offset_hours must be between -12 and 14, got {}", v),
        ));
    }
    Ok(v)
}

fn load_weights(config: &dyn ConfigPort, d: &ScoringWeights) -> Result<ScoringWeights, TradegateError> {
    let read = |key: &str, default: f64| -> Result<f64, TradegateError> {
        let v = value(config, "weights", key, default)?;
        in_range("weights", key, v, v >= 0.0, "non-negative")
    };
    let weights = ScoringWeights {
        technical: read("technical", d.technical)?,
        sentiment: read("sentiment", d.sentiment)?,
        fundamental: read("fundamental", d.fundamental)?,
        volume: read("volume", d.volume)?,
        news: read("news", d.news)?,
        fund_flow: read("fund_flow", d.fund_flow)?,
    };
    let total = weights.total();
    if (total - 1.0).abs() > 1e-6 {
        return Err(invalid(
            "weights",
            "*",
            format!("weights must sum to 1, got {}", total),
        ));
    }
    Ok(weights)
}

fn load_signals(config: &dyn ConfigPort, defaults: SignalRuleSet) -> Result<SignalRuleSet, TradegateError> {
    let mut rules = defaults;
    for (key, action) in [
        ("buy", SignalAction::Buy),
        ("sell", SignalAction::Sell),
        ("watch", SignalAction::Watch),
    ] {
        if let Some(text) = config.get_string("signals", key).filter(|t| !t.trim().is_empty()) {
            // Rule syntax errors point a caret at the offending column.
            rules = rules.with_override(action, &text).map_err(|e| match e {
                TradegateError::RuleParse(parse) => TradegateError::ConfigInvalid {
                    section: "signals".to_string(),
                    key: key.to_string(),
                    reason: format!("\n{}", parse.display_with_context(&text)),
                },
                other => other,
            })?;
        }
    }
    Ok(rules)
}

fn load_limits(config: &dyn ConfigPort, d: &RiskLimits) -> Result<RiskLimits, TradegateError> {
    Ok(RiskLimits {
        max_position_pct: fraction(config, "risk", "max_position_pct", d.max_position_pct)?,
        max_deployment_pct: fraction(config, "risk", "max_deployment_pct", d.max_deployment_pct)?,
        stop_loss_pct: negative_fraction(config, "risk", "stop_loss_pct", d.stop_loss_pct)?,
        daily_loss_halt_pct: negative_fraction(
            config,
            "risk",
            "daily_loss_halt_pct",
            d.daily_loss_halt_pct,
        )?,
        max_sector_pct: fraction(config, "risk", "max_sector_pct", d.max_sector_pct)?,
    })
}

fn load_heat(config: &dyn ConfigPort, d: &HeatBands) -> Result<HeatBands, TradegateError> {
    let medium = value(config, "heat", "medium", d.medium)?;
    let high = value(config, "heat", "high", d.high)?;
    in_range("heat", "medium", medium, medium > 0.0, "positive")?;
    in_range("heat", "high", high, high > medium, "greater than medium")?;
    Ok(HeatBands { medium, high })
}

fn load_sizing(config: &dyn ConfigPort, d: &SizingConfig) -> Result<SizingConfig, TradegateError> {
    let min_ticket = value(config, "sizing", "min_ticket", d.min_ticket)?;
    in_range("sizing", "min_ticket", min_ticket, min_ticket >= 0.0, "non-negative")?;

    let default_kelly = value(config, "sizing", "default_kelly", d.default_kelly)?;
    in_range(
        "sizing",
        "default_kelly",
        default_kelly,
        (0.0..=crate::domain::metrics::KELLY_CEILING).contains(&default_kelly),
        "in [0, 0.25]",
    )?;

    let min_trades_for_kelly: usize =
        value(config, "sizing", "min_trades_for_kelly", d.min_trades_for_kelly)?;
    if min_trades_for_kelly == 0 {
        return Err(invalid(
            "sizing",
            "min_trades_for_kelly",
            "min_trades_for_kelly must be at least 1",
        ));
    }

    let lot_size: u64 = value(config, "sizing", "lot_size", d.lot_size)?;
    if lot_size == 0 {
        return Err(invalid("sizing", "lot_size", "lot_size must be at least 1"));
    }

    let conviction_floor = value(config, "sizing", "conviction_floor", d.conviction_floor)?;
    in_range(
        "sizing",
        "conviction_floor",
        conviction_floor,
        (0.0..=1.0).contains(&conviction_floor),
        "in [0, 1]",
    )?;

    Ok(SizingConfig {
        min_ticket,
        default_kelly,
        min_trades_for_kelly,
        lot_size,
        conviction_floor,
    })
}

fn load_grading(config: &dyn ConfigPort, defaults: GradeTable) -> Result<GradeTable, TradegateError> {
    let mut table = defaults;
    let keys = ["a", "b", "c", "d"];
    for (i, key) in keys.iter().enumerate() {
        table.cutoffs[i] = value(config, "grading", key, table.cutoffs[i])?;
    }
    for (i, key) in keys.iter().enumerate() {
        let cutoff = table.cutoffs[i];
        let below = table.cutoffs.get(i + 1).copied().unwrap_or(0.0);
        in_range(
            "grading",
            key,
            cutoff,
            cutoff > below || (i == keys.len() - 1 && cutoff >= 0.0),
            "greater than the next grade's cutoff",
        )?;
    }
    Ok(table)
}

fn load_default_strategy(config: &dyn ConfigPort, default: &str) -> Result<String, TradegateError> {
    match config.get_string("journal", "default_strategy") {
        None => Ok(default.to_string()),
        Some(s) if s.trim().is_empty() => Err(invalid(
            "journal",
            "default_strategy",
            "default_strategy must not be empty",
        )),
        Some(s) => Ok(s.trim().to_string()),
    }
}
