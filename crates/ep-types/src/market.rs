use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EpError;

/// Exchange-traded funds with listed options that the dashboard tracks by default.
const KNOWN_ETFS: &[&str] = &["SPY", "QQQ", "IWM", "DIA", "TLT", "GLD", "XLF", "XLE", "XLK", "EEM"];

/// An optionable underlying, identified by its ticker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub symbol: String,
    pub exchange: String,
    pub asset_class: AssetClass,
}

impl Symbol {
    pub fn new(symbol: &str, exchange: &str, asset_class: AssetClass) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            asset_class,
        }
    }

    pub fn equity(symbol: &str) -> Self {
        Self::new(symbol, AssetClass::Equity.default_exchange(), AssetClass::Equity)
    }

    pub fn etf(symbol: &str) -> Self {
        Self::new(symbol, AssetClass::Etf.default_exchange(), AssetClass::Etf)
    }

    pub fn index(symbol: &str) -> Self {
        Self::new(symbol, AssetClass::Index.default_exchange(), AssetClass::Index)
    }

    /// Parse a user-supplied ticker (query strings, config files).
    ///
    /// Tickers are trimmed and upper-cased. A leading `^` marks an index
    /// (Yahoo convention). Returns `None` for blank input or tickers with
    /// characters outside `[A-Z0-9.^-]`.
    pub fn parse(raw: &str) -> Option<Self> {
        let ticker = raw.trim().to_ascii_uppercase();
        if ticker.is_empty() || ticker.len() > 16 {
            return None;
        }
        let valid = ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'));
        if !valid || ticker[1..].contains('^') {
            return None;
        }

        if ticker.starts_with('^') {
            Some(Self::index(&ticker))
        } else if KNOWN_ETFS.contains(&ticker.as_str()) {
            Some(Self::etf(&ticker))
        } else {
            Some(Self::equity(&ticker))
        }
    }
}

impl FromStr for Symbol {
    type Err = EpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s).ok_or_else(|| crate::validation_error!("invalid ticker '{}'", s.trim()))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

/// Asset classes with listed options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Equity,
    Etf,
    Index,
}

impl AssetClass {
    /// Default exchange identifier for this asset class.
    pub fn default_exchange(&self) -> &'static str {
        match self {
            AssetClass::Equity => "NASDAQ",
            AssetClass::Etf => "ARCA",
            AssetClass::Index => "CBOE",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetClass::Equity => "Equity",
            AssetClass::Etf => "ETF",
            AssetClass::Index => "Index",
        };
        write!(f, "{}", s)
    }
}
