#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tradegate::adapters::sqlite_adapter::SqliteBookStore;
use tradegate::domain::config::{EngineConfig, StoreConfig};
use tradegate::domain::error::TradegateError;
use tradegate::domain::fundamental::StatementPeriod;
use tradegate::domain::normalizer::Observation;
use tradegate::domain::portfolio::{quotes_from, Quote, Quotes};
use tradegate::ports::market_port::MarketPort;

pub struct MockMarketPort {
    pub quotes: Vec<Quote>,
    pub observations: Vec<Observation>,
    pub statements: HashMap<String, Vec<StatementPeriod>>,
    pub errors: HashMap<String, String>,
}

impl MockMarketPort {
    pub fn new() -> Self {
        Self {
            quotes: Vec::new(),
            observations: Vec::new(),
            statements: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quotes.push(quote);
        self
    }

    pub fn with_observation(mut self, obs: Observation) -> Self {
        self.observations.push(obs);
        self
    }

    pub fn with_statements(mut self, symbol: &str, periods: Vec<StatementPeriod>) -> Self {
        self.statements.insert(symbol.to_string(), periods);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketPort for MockMarketPort {
    fn quotes(&self) -> Result<Quotes, TradegateError> {
        Ok(quotes_from(self.quotes.clone()))
    }

    fn observations(&self) -> Result<Vec<Observation>, TradegateError> {
        Ok(self.observations.clone())
    }

    fn statements(&self, symbol: &str) -> Result<Vec<StatementPeriod>, TradegateError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TradegateError::Input {
                source_name: "statements".to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.statements.get(symbol).cloned().unwrap_or_default())
    }
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

pub fn observed(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

pub fn quote(symbol: &str, price: f64, volatility: f64, sector: &str) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price,
        volatility: Some(volatility),
        sector: Some(sector.to_string()),
    }
}

/// Every default BUY condition holds for this reading.
pub fn bullish(symbol: &str) -> Observation {
    Observation {
        symbol: symbol.to_string(),
        observed_at: observed(1),
        rsi: Some(20.0),
        macd_histogram: Some(0.5),
        bb_position: Some(0.0),
        price_vs_sma50: Some(1.06),
        sentiment: Some(0.9),
        sentiment_samples: Some(12),
        volume_ratio: Some(3.0),
        price_change_pct: Some(5.0),
        news_positive: Some(10),
        news_negative: Some(0),
        fund_flow_net: Some(90.0),
        fund_flow_gross: Some(100.0),
    }
}

pub fn quiet(symbol: &str) -> Observation {
    Observation {
        symbol: symbol.to_string(),
        observed_at: observed(1),
        rsi: Some(50.0),
        volume_ratio: Some(1.0),
        price_change_pct: Some(0.5),
        ..Default::default()
    }
}

pub fn period(label: &str, net_income: f64, cash_flow: f64, liabilities: f64) -> StatementPeriod {
    StatementPeriod {
        period: label.to_string(),
        revenue: Some(1_000.0),
        net_income: Some(net_income),
        operating_cash_flow: Some(cash_flow),
        total_assets: Some(2_000.0),
        total_liabilities: Some(liabilities),
        current_assets: Some(600.0),
        current_liabilities: Some(400.0),
        shares_outstanding: Some(100.0),
        gross_margin: Some(0.3),
        asset_turnover: Some(0.5),
        long_term_debt: Some(liabilities / 2.0),
        total_equity: Some(2_000.0 - liabilities),
    }
}

pub fn store_config(path: &Path, lock_timeout_ms: u64) -> StoreConfig {
    StoreConfig {
        path: path.to_path_buf(),
        lock_timeout_ms,
        ..StoreConfig::default()
    }
}

pub fn open_store(path: &Path, lock_timeout_ms: u64) -> SqliteBookStore {
    SqliteBookStore::open(&store_config(path, lock_timeout_ms), 100_000.0).unwrap()
}

pub fn engine_with_store(path: &Path) -> EngineConfig {
    EngineConfig {
        store: store_config(path, 1_000),
        ..EngineConfig::default()
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.flush().unwrap();
    path
}
