//! Market input port: quotes, indicator observations and statements.

use crate::domain::error::TradegateError;
use crate::domain::fundamental::StatementPeriod;
use crate::domain::normalizer::Observation;
use crate::domain::portfolio::Quotes;

pub trait MarketPort {
    /// Latest quotes keyed by symbol. Missing input yields an empty map.
    fn quotes(&self) -> Result<Quotes, TradegateError>;

    fn observations(&self) -> Result<Vec<Observation>, TradegateError>;

    /// Statement periods for one symbol, oldest first.
    fn statements(&self, symbol: &str) -> Result<Vec<StatementPeriod>, TradegateError>;
}
