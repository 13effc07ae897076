use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use ep_types::market::Symbol;

const SECONDS_PER_YEAR: f64 = 365.0 * 86400.0;

/// Option side: call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    /// Dealer gamma sign convention: calls add, puts subtract.
    pub fn gex_sign(&self) -> f64 {
        match self {
            OptionSide::Call => 1.0,
            OptionSide::Put => -1.0,
        }
    }
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionSide::Call => write!(f, "Call"),
            OptionSide::Put => write!(f, "Put"),
        }
    }
}

/// One row of a fetched option chain.
///
/// Immutable snapshot: built once per request by a provider and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying symbol.
    pub underlying: Symbol,
    /// Call or put.
    pub side: OptionSide,
    /// Strike price.
    pub strike: Decimal,
    /// Expiration timestamp (UTC).
    pub expiration: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub open_interest: u64,
    pub volume: u64,
    /// Annualised implied volatility as a decimal (0.45 = 45 %).
    /// May be NaN or non-positive when the provider did not quote one.
    pub implied_volatility: f64,
    /// Contract multiplier (typically 100 for equity options).
    pub multiplier: Decimal,
}

impl OptionContract {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        underlying: Symbol,
        side: OptionSide,
        strike: Decimal,
        expiration: DateTime<Utc>,
        bid: Decimal,
        ask: Decimal,
        open_interest: u64,
        volume: u64,
        implied_volatility: f64,
    ) -> Self {
        Self {
            underlying,
            side,
            strike,
            expiration,
            bid,
            ask,
            open_interest,
            volume,
            implied_volatility,
            multiplier: Decimal::from(100),
        }
    }

    /// Override the default 100-share multiplier (mini or adjusted contracts).
    pub fn with_multiplier(mut self, multiplier: Decimal) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Years remaining until expiration from `now` on a 365-day count.
    /// Returns 0 if already expired.
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        let secs = (self.expiration - now).num_seconds();
        if secs <= 0 {
            0.0
        } else {
            secs as f64 / SECONDS_PER_YEAR
        }
    }

    /// True if the option has expired relative to `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }

    /// Implied volatility is finite and strictly positive.
    pub fn has_usable_iv(&self) -> bool {
        self.implied_volatility.is_finite() && self.implied_volatility > 0.0
    }

    pub fn strike_f64(&self) -> f64 {
        self.strike.to_f64().unwrap_or(0.0)
    }

    pub fn multiplier_f64(&self) -> f64 {
        self.multiplier.to_f64().unwrap_or(100.0)
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.underlying.symbol,
            self.expiration.format("%Y-%m-%d"),
            self.strike,
            self.side,
        )
    }
}

/// Spot quote for the underlying, captured alongside the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingQuote {
    pub symbol: Symbol,
    pub spot_price: Decimal,
    /// Annualised risk-free rate assumed constant over the chain (0.03 = 3 %).
    pub risk_free_rate: f64,
    pub as_of: DateTime<Utc>,
}

impl UnderlyingQuote {
    pub fn new(symbol: Symbol, spot_price: Decimal, risk_free_rate: f64, as_of: DateTime<Utc>) -> Self {
        Self {
            symbol,
            spot_price,
            risk_free_rate,
            as_of,
        }
    }

    /// Spot as `f64` when it is strictly positive, the only case the greeks accept.
    pub fn usable_spot(&self) -> Option<f64> {
        if self.spot_price <= Decimal::ZERO {
            return None;
        }
        self.spot_price.to_f64().filter(|s| s.is_finite() && *s > 0.0)
    }
}
