use thiserror::Error;

/// Main error type for the EconoPulse options pipeline
#[derive(Error, Debug)]
pub enum EpError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl EpError {
    /// True when the error means "no data for this symbol" rather than a fault.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            EpError::Analytics(AnalyticsError::MissingData { .. })
                | EpError::Data(DataError::SymbolNotFound { .. })
                | EpError::Data(DataError::EmptyChain { .. })
        )
    }
}

/// Market-data fetch errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("No provider available for symbol: {symbol}")]
    ProviderUnavailable { symbol: String },

    #[error("HTTP request failed: {message}")]
    Http { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Option chain is empty for symbol: {symbol}")]
    EmptyChain { symbol: String },
}

/// Chain analytics errors.
///
/// Numeric degeneracy never shows up here: the pricing primitives floor
/// their inputs instead of failing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Metrics unavailable for {symbol}: {reason}")]
    MissingData { symbol: String, reason: String },
}

impl AnalyticsError {
    pub fn missing(symbol: &str, reason: &str) -> Self {
        AnalyticsError::MissingData {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for EconoPulse operations
pub type EpResult<T> = Result<T, EpError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::EpError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::EpError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AnalyticsError::missing("SPY", "empty chain");
        assert!(error.to_string().contains("SPY"));
        assert!(error.to_string().contains("empty chain"));
    }

    #[test]
    fn test_error_conversion() {
        let data_error = DataError::Http {
            message: "timeout".to_string(),
        };
        let ep_error: EpError = data_error.into();

        match ep_error {
            EpError::Data(_) => (),
            _ => panic!("Expected Data error"),
        }
    }

    #[test]
    fn test_is_unavailable() {
        let missing: EpError = AnalyticsError::missing("QQQ", "no quote").into();
        assert!(missing.is_unavailable());

        let http: EpError = DataError::Http {
            message: "502".to_string(),
        }
        .into();
        assert!(!http.is_unavailable());
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(matches!(validation_err, EpError::Validation(_)));
        let config_err = config_error!("Missing required field: {}", "risk_free_rate");
        assert!(config_err.to_string().contains("risk_free_rate"));
    }
}
