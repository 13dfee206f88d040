//! CSV market input adapter.
//!
//! Three optional files, each with a header row:
//!
//! - quotes: `symbol,price,volatility,sector`
//! - observations: `symbol,observed_at,rsi,macd_histogram,bb_position,
//!   price_vs_sma50,sentiment,sentiment_samples,volume_ratio,price_change_pct,
//!   news_positive,news_negative,fund_flow_net,fund_flow_gross`
//! - statements: `symbol,period,revenue,net_income,operating_cash_flow,
//!   total_assets,total_liabilities,current_assets,current_liabilities,
//!   shares_outstanding,gross_margin,asset_turnover,long_term_debt,total_equity`
//!
//! Columns are matched by header name; absent columns and empty cells are
//! missing values. Statement rows must be in period order, oldest first.

use crate::domain::error::TradegateError;
use crate::domain::fundamental::StatementPeriod;
use crate::domain::normalizer::Observation;
use crate::domain::portfolio::{normalize_symbol, quotes_from, Quote, Quotes};
use crate::ports::market_port::MarketPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub struct CsvMarketAdapter {
    quotes: Option<PathBuf>,
    observations: Option<PathBuf>,
    statements: Option<PathBuf>,
}

struct Table {
    source: String,
    columns: HashMap<String, usize>,
    records: Vec<(u64, csv::StringRecord)>,
}

struct Row<'a> {
    table: &'a Table,
    line: u64,
    record: &'a csv::StringRecord,
}

impl Table {
    fn read(path: &Path) -> Result<Table, TradegateError> {
        let source = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| TradegateError::Input {
            source_name: source.clone(),
            reason: format!("failed to read: {}", e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let columns = rdr
            .headers()
            .map_err(|e| TradegateError::Input {
                source_name: source.clone(),
                reason: format!("CSV header error: {}", e),
            })?
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_lowercase(), i))
            .collect();

        let mut records = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TradegateError::Input {
                source_name: source.clone(),
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            records.push((line, record));
        }
        Ok(Table {
            source,
            columns,
            records,
        })
    }

    fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records.iter().map(move |(line, record)| Row {
            table: self,
            line: *line,
            record,
        })
    }
}

impl Row<'_> {
    fn error(&self, reason: String) -> TradegateError {
        TradegateError::Input {
            source_name: self.table.source.clone(),
            reason: format!("line {}: {}", self.line, reason),
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.table
            .columns
            .get(name)
            .and_then(|i| self.record.get(*i))
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<&str, TradegateError> {
        self.field(name)
            .ok_or_else(|| self.error(format!("missing {} value", name)))
    }

    fn value<T: FromStr>(&self, name: &str) -> Result<Option<T>, TradegateError> {
        self.field(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| self.error(format!("invalid {} value '{}'", name, raw)))
            })
            .transpose()
    }

    fn symbol(&self) -> Result<String, TradegateError> {
        Ok(normalize_symbol(self.required("symbol")?))
    }

    fn timestamp(&self, name: &str) -> Result<NaiveDateTime, TradegateError> {
        let raw = self.required(name)?;
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .ok_or_else(|| self.error(format!("invalid {} value '{}'", name, raw)))
    }
}

impl CsvMarketAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quotes(mut self, path: impl Into<PathBuf>) -> Self {
        self.quotes = Some(path.into());
        self
    }

    pub fn with_observations(mut self, path: impl Into<PathBuf>) -> Self {
        self.observations = Some(path.into());
        self
    }

    pub fn with_statements(mut self, path: impl Into<PathBuf>) -> Self {
        self.statements = Some(path.into());
        self
    }

    fn read_quote(row: &Row<'_>) -> Result<Quote, TradegateError> {
        let price: f64 = row
            .value("price")?
            .ok_or_else(|| row.error("missing price value".to_string()))?;
        if !price.is_finite() || price <= 0.0 {
            return Err(row.error(format!("price must be positive, got {}", price)));
        }
        Ok(Quote {
            symbol: row.symbol()?,
            price,
            volatility: row.value("volatility")?,
            sector: row.field("sector").map(str::to_string),
        })
    }

    fn read_observation(row: &Row<'_>) -> Result<Observation, TradegateError> {
        Ok(Observation {
            symbol: row.symbol()?,
            observed_at: row.timestamp("observed_at")?,
            rsi: row.value("rsi")?,
            macd_histogram: row.value("macd_histogram")?,
            bb_position: row.value("bb_position")?,
            price_vs_sma50: row.value("price_vs_sma50")?,
            sentiment: row.value("sentiment")?,
            sentiment_samples: row.value("sentiment_samples")?,
            volume_ratio: row.value("volume_ratio")?,
            price_change_pct: row.value("price_change_pct")?,
            news_positive: row.value("news_positive")?,
            news_negative: row.value("news_negative")?,
            fund_flow_net: row.value("fund_flow_net")?,
            fund_flow_gross: row.value("fund_flow_gross")?,
        })
    }

    fn read_period(row: &Row<'_>) -> Result<StatementPeriod, TradegateError> {
        Ok(StatementPeriod {
            period: row.required("period")?.to_string(),
            revenue: row.value("revenue")?,
            net_income: row.value("net_income")?,
            operating_cash_flow: row.value("operating_cash_flow")?,
            total_assets: row.value("total_assets")?,
            total_liabilities: row.value("total_liabilities")?,
            current_assets: row.value("current_assets")?,
            current_liabilities: row.value("current_liabilities")?,
            shares_outstanding: row.value("shares_outstanding")?,
            gross_margin: row.value("gross_margin")?,
            asset_turnover: row.value("asset_turnover")?,
            long_term_debt: row.value("long_term_debt")?,
            total_equity: row.value("total_equity")?,
        })
    }
}

impl MarketPort for CsvMarketAdapter {
    fn quotes(&self) -> Result<Quotes, TradegateError> {
        let Some(path) = &self.quotes else {
            return Ok(Quotes::new());
        };
        let table = Table::read(path)?;
        let quotes = table
            .rows()
            .map(|row| Self::read_quote(&row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(quotes_from(quotes))
    }

    fn observations(&self) -> Result<Vec<Observation>, TradegateError> {
        let path = self.observations.as_ref().ok_or_else(|| TradegateError::Input {
            source_name: "observations".to_string(),
            reason: "no observations file given".to_string(),
        })?;
        let table = Table::read(path)?;
        table.rows().map(|row| Self::read_observation(&row)).collect()
    }

    fn statements(&self, symbol: &str) -> Result<Vec<StatementPeriod>, TradegateError> {
        let Some(path) = &self.statements else {
            return Ok(Vec::new());
        };
        let symbol = normalize_symbol(symbol);
        let table = Table::read(path)?;
        let mut periods = Vec::new();
        for row in table.rows() {
            if row.symbol()? == symbol {
                periods.push(Self::read_period(&row)?);
            }
        }
        Ok(periods)
    }
}
