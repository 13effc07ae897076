//! Policy knobs for chain aggregation and flow classification.
//!
//! None of these numbers are derived; they are calibrations. Keeping them in
//! one structure lets tests and deployments tune them without touching the
//! aggregation code.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ep_types::{config_error, EpResult};

/// Configuration for [`crate::metrics::compute_chain_metrics`] and the classifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Annualised risk-free rate used when the quote does not carry one.
    pub risk_free_rate: f64,
    /// Nearest expirations aggregated per symbol (rate-limit tunable).
    pub max_expirations: usize,
    /// Floor on time to expiry (years) fed to the greeks; one calendar day.
    pub min_time_years: f64,
    /// Implied volatility is clamped to `[iv_floor, iv_cap]` before pricing.
    pub iv_floor: f64,
    pub iv_cap: f64,
    /// |delta| band treated as at-the-money. Below the band is OTM, above is deep ITM.
    pub atm_delta_low: f64,
    pub atm_delta_high: f64,
    /// Target |delta| for the skew wings.
    pub skew_target_delta: f64,
    /// Minimum call-minus-put IV gap (vol points as a decimal) to call a skew.
    pub skew_epsilon: f64,
    /// Scale applied to spot² in the per-contract GEX term (0.01 = per 1 % move).
    pub gex_move_scale: f64,
    /// |GEX| boundaries for Medium, High and Extreme. Must be increasing.
    pub gex_medium: Decimal,
    pub gex_high: Decimal,
    pub gex_extreme: Decimal,
    /// Put/call volume ratio below which flow reads bullish.
    pub bullish_ratio: Decimal,
    /// Put/call volume ratio above which flow reads bearish.
    pub bearish_ratio: Decimal,
    /// Volume-share boundaries for Medium and High unusual activity.
    pub activity_medium: Decimal,
    pub activity_high: Decimal,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.03,
            max_expirations: 3,
            min_time_years: 1.0 / 365.0,
            iv_floor: 0.01,
            iv_cap: 3.0,
            atm_delta_low: 0.40,
            atm_delta_high: 0.60,
            skew_target_delta: 0.25,
            skew_epsilon: 0.02,
            gex_move_scale: 0.01,
            gex_medium: Decimal::from(10_000_000u64),  // $10M per 1 % move
            gex_high: Decimal::from(100_000_000u64),   // $100M
            gex_extreme: Decimal::from(500_000_000u64), // $500M
            bullish_ratio: Decimal::new(8, 1),          // 0.8
            bearish_ratio: Decimal::new(13, 1),         // 1.3
            activity_medium: Decimal::new(20, 2),       // 20 %
            activity_high: Decimal::new(35, 2),         // 35 %
        }
    }
}

impl SentimentConfig {
    /// Reject orderings that would make the buckets overlap or invert.
    pub fn validate(&self) -> EpResult<()> {
        if self.max_expirations == 0 {
            return Err(config_error!("max_expirations must be at least 1"));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(config_error!("risk_free_rate must be finite"));
        }
        if !(self.min_time_years.is_finite() && self.min_time_years > 0.0) {
            return Err(config_error!("min_time_years must be positive"));
        }
        if !(self.iv_floor > 0.0 && self.iv_floor < self.iv_cap) {
            return Err(config_error!(
                "iv bounds must satisfy 0 < iv_floor < iv_cap, got [{}, {}]",
                self.iv_floor,
                self.iv_cap
            ));
        }
        if !(0.0 < self.atm_delta_low && self.atm_delta_low < self.atm_delta_high && self.atm_delta_high <= 1.0) {
            return Err(config_error!(
                "ATM delta band must satisfy 0 < low < high <= 1, got [{}, {}]",
                self.atm_delta_low,
                self.atm_delta_high
            ));
        }
        if !(self.skew_target_delta > 0.0 && self.skew_target_delta < 1.0) {
            return Err(config_error!("skew_target_delta must lie in (0, 1)"));
        }
        if !(self.skew_epsilon >= 0.0) {
            return Err(config_error!("skew_epsilon must be non-negative"));
        }
        if !(self.gex_move_scale.is_finite() && self.gex_move_scale > 0.0) {
            return Err(config_error!("gex_move_scale must be positive"));
        }
        if !(Decimal::ZERO < self.gex_medium && self.gex_medium < self.gex_high && self.gex_high < self.gex_extreme) {
            return Err(config_error!(
                "GEX thresholds must be increasing: medium {} < high {} < extreme {}",
                self.gex_medium,
                self.gex_high,
                self.gex_extreme
            ));
        }
        if self.bullish_ratio > self.bearish_ratio {
            return Err(config_error!(
                "bullish_ratio {} exceeds bearish_ratio {}",
                self.bullish_ratio,
                self.bearish_ratio
            ));
        }
        if !(Decimal::ZERO <= self.activity_medium && self.activity_medium < self.activity_high) {
            return Err(config_error!(
                "activity thresholds must satisfy 0 <= medium < high, got {} / {}",
                self.activity_medium,
                self.activity_high
            ));
        }
        Ok(())
    }

    /// Bound IV to `[iv_floor, iv_cap]`. Never panics: with inverted bounds the cap wins.
    pub fn clamp_iv(&self, iv: f64) -> f64 {
        iv.max(self.iv_floor).min(self.iv_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_is_valid() {
        SentimentConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_inverted_atm_band() {
        let cfg = SentimentConfig {
            atm_delta_low: 0.6,
            atm_delta_high: 0.4,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_non_monotonic_gex_thresholds() {
        let cfg = SentimentConfig {
            gex_high: dec!(5000000),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("GEX thresholds"));
    }

    #[test]
    fn test_rejects_crossed_ratio_thresholds() {
        let cfg = SentimentConfig {
            bullish_ratio: dec!(1.5),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_expirations() {
        let cfg = SentimentConfig {
            max_expirations: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_clamp_iv() {
        let cfg = SentimentConfig::default();
        assert_eq!(cfg.clamp_iv(0.001), 0.01);
        assert_eq!(cfg.clamp_iv(7.5), 3.0);
        assert_eq!(cfg.clamp_iv(0.45), 0.45);
    }

    #[test]
    fn test_clamp_iv_with_inverted_bounds() {
        let cfg: SentimentConfig = serde_json::from_str(r#"{"iv_floor": 0.5, "iv_cap": 0.1}"#).unwrap();
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.clamp_iv(0.3), 0.1);
        assert_eq!(cfg.clamp_iv(2.0), 0.1);

        let nan_floor = SentimentConfig {
            iv_floor: f64::NAN,
            ..Default::default()
        };
        assert_eq!(nan_floor.clamp_iv(0.45), 0.45);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: SentimentConfig = serde_json::from_str(r#"{"max_expirations": 2}"#).unwrap();
        assert_eq!(cfg.max_expirations, 2);
        assert_eq!(cfg.bullish_ratio, dec!(0.8));
        assert_eq!(cfg.skew_epsilon, 0.02);
    }
}
