//! Domain error types.

/// A parse error with position information for signal rule parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for tradegate.
#[derive(Debug, thiserror::Error)]
pub enum TradegateError {
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("insufficient signal for {symbol}: no scoring domain present")]
    InsufficientSignal { symbol: String },

    #[error("mismatched observation for {symbol}: {domain} observed at {found}, expected {expected}")]
    MismatchedObservation {
        symbol: String,
        domain: String,
        expected: String,
        found: String,
    },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("store busy: another mutation holds the portfolio store (waited {waited_ms} ms)")]
    StoreBusy { waited_ms: u64 },

    #[error("store corrupt: {reason}; mutations halted until the store is repaired by hand")]
    StoreCorrupt { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid input {source_name}: {reason}")]
    Input { source_name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradegateError {
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        TradegateError::InvalidOrder {
            reason: reason.into(),
        }
    }

    pub fn corrupt(reason: impl Into<String>) -> Self {
        TradegateError::StoreCorrupt {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the same operation after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TradegateError::StoreBusy { .. })
    }
}

impl From<&TradegateError> for std::process::ExitCode {
    fn from(err: &TradegateError) -> Self {
        let code: u8 = match err {
            TradegateError::Io(_) | TradegateError::Input { .. } => 1,
            TradegateError::ConfigParse { .. }
            | TradegateError::ConfigMissing { .. }
            | TradegateError::ConfigInvalid { .. } => 2,
            TradegateError::Database { .. } => 3,
            TradegateError::RuleParse(_) => 4,
            TradegateError::InsufficientData { .. }
            | TradegateError::InsufficientSignal { .. }
            | TradegateError::MismatchedObservation { .. } => 5,
            TradegateError::InvalidOrder { .. } | TradegateError::NotFound { .. } => 6,
            TradegateError::StoreBusy { .. } => 7,
            TradegateError::StoreCorrupt { .. } => 8,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_context_points_at_position() {
        let err = ParseError {
            message: "expected ')'".into(),
            position: 6,
        };
        let shown = err.display_with_context("ABOVE(rsi");
        let lines: Vec<&str> = shown.lines().collect();
        assert_eq!(lines[0], "ABOVE(rsi");
        assert_eq!(lines[1], "      ^");
        assert!(lines[2].contains("position 6"));
    }

    #[test]
    fn only_store_busy_is_retryable() {
        assert!(TradegateError::StoreBusy { waited_ms: 10 }.is_retryable());
        assert!(!TradegateError::corrupt("bad row").is_retryable());
        assert!(!TradegateError::invalid_order("zero shares").is_retryable());
    }

    #[test]
    fn corrupt_message_mentions_halt() {
        let err = TradegateError::corrupt("cash mismatch");
        assert!(err.to_string().contains("cash mismatch"));
        assert!(err.to_string().contains("halted"));
    }
}
