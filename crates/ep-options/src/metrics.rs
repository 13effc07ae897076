//! Chain aggregation: put/call ratios, gamma exposure, moneyness shares and skew.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ep_types::errors::AnalyticsError;
use ep_types::market::Symbol;

use crate::chain::OptionChain;
use crate::config::SentimentConfig;
use crate::contract::{OptionContract, OptionSide};
use crate::greeks::Greeks;
use crate::sentiment::{classify, classify_gex, classify_skew, CallSkew, GexLabel, SentimentLabel};

const RATIO_DP: u32 = 6;

/// Per-symbol aggregates over the selected expirations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainMetrics {
    pub symbol: Symbol,
    pub as_of: DateTime<Utc>,
    pub underlying_price: Decimal,
    pub total_call_volume: u64,
    pub total_put_volume: u64,
    pub total_call_oi: u64,
    pub total_put_oi: u64,
    /// `None` when there is no call volume.
    pub put_call_volume_ratio: Option<Decimal>,
    /// `None` when there is no call open interest.
    pub put_call_oi_ratio: Option<Decimal>,
    /// Signed dealer gamma exposure in dollars per 1 % move.
    pub gex: Option<Decimal>,
    pub gex_label: GexLabel,
    pub iv_call_25d: Option<f64>,
    pub iv_put_25d: Option<f64>,
    pub call_skew: CallSkew,
    pub atm_volume_share: Option<Decimal>,
    pub otm_volume_share: Option<Decimal>,
    pub expirations_used: Vec<DateTime<Utc>>,
}

impl ChainMetrics {
    pub fn total_volume(&self) -> u64 {
        self.total_call_volume + self.total_put_volume
    }

    pub fn sentiment(&self, config: &SentimentConfig) -> SentimentLabel {
        classify(self.put_call_volume_ratio, self.total_volume(), self.gex, config)
    }
}

/// Skew candidate: implied vol of the contract whose |delta| sits closest to the target.
#[derive(Debug, Clone, Copy)]
struct WingPick {
    distance: f64,
    iv: f64,
}

impl WingPick {
    fn offer(slot: &mut Option<WingPick>, distance: f64, iv: f64) {
        match slot {
            Some(current) if current.distance <= distance => {}
            _ => *slot = Some(WingPick { distance, iv }),
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    call_volume: u64,
    put_volume: u64,
    call_oi: u64,
    put_oi: u64,
    atm_volume: u64,
    otm_volume: u64,
    gex: f64,
    call_wing: Option<WingPick>,
    put_wing: Option<WingPick>,
}

impl Accumulator {
    fn add(&mut self, contract: &OptionContract, spot: f64, rate: f64, now: DateTime<Utc>, config: &SentimentConfig) {
        match contract.side {
            OptionSide::Call => {
                self.call_volume += contract.volume;
                self.call_oi += contract.open_interest;
            }
            OptionSide::Put => {
                self.put_volume += contract.volume;
                self.put_oi += contract.open_interest;
            }
        }

        // Totals above include every contract; the model-based figures need a usable IV.
        if !contract.has_usable_iv() {
            return;
        }

        let sigma = config.clamp_iv(contract.implied_volatility);
        let t = contract.time_to_expiry(now).max(config.min_time_years);
        let greeks = Greeks::compute(contract.side, spot, contract.strike_f64(), rate, sigma, t);
        let abs_delta = greeks.abs_delta();

        if abs_delta < config.atm_delta_low {
            self.otm_volume += contract.volume;
        } else if abs_delta <= config.atm_delta_high {
            self.atm_volume += contract.volume;
        }

        self.gex += contract.side.gex_sign()
            * greeks.gamma
            * contract.open_interest as f64
            * contract.multiplier_f64()
            * spot
            * spot
            * config.gex_move_scale;

        let distance = (abs_delta - config.skew_target_delta).abs();
        match contract.side {
            OptionSide::Call => WingPick::offer(&mut self.call_wing, distance, sigma),
            OptionSide::Put => WingPick::offer(&mut self.put_wing, distance, sigma),
        }
    }

    fn volume(&self) -> u64 {
        self.call_volume + self.put_volume
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<Decimal> {
    if denominator == 0 {
        return None;
    }
    Some((Decimal::from(numerator) / Decimal::from(denominator)).round_dp(RATIO_DP))
}

/// Aggregate one chain into [`ChainMetrics`].
///
/// Fails with [`AnalyticsError::MissingData`] when there is nothing to
/// aggregate: no quote, a non-positive spot, or no contracts. Degenerate model
/// inputs are floored by the pricing primitives and never fail.
pub fn compute_chain_metrics(
    chain: &OptionChain,
    now: DateTime<Utc>,
    config: &SentimentConfig,
) -> Result<ChainMetrics, AnalyticsError> {
    let symbol = chain.underlying.symbol.as_str();
    let quote = chain
        .quote
        .as_ref()
        .ok_or_else(|| AnalyticsError::missing(symbol, "no underlying quote"))?;
    let spot = quote
        .usable_spot()
        .ok_or_else(|| AnalyticsError::missing(symbol, "underlying price is not positive"))?;
    if chain.is_empty() {
        return Err(AnalyticsError::missing(symbol, "option chain has no contracts"));
    }

    let rate = if quote.risk_free_rate.is_finite() {
        quote.risk_free_rate
    } else {
        config.risk_free_rate
    };

    let mut expirations = chain.select_expirations(now, config.max_expirations);
    let mut acc = Accumulator::default();
    for contract in chain.contracts_for(&expirations) {
        acc.add(contract, spot, rate, now, config);
    }

    // A dead front end (e.g. pre-open) gets one more expiration before giving up on flow.
    if acc.volume() == 0 {
        if let Some(next) = expirations.last().and_then(|last| chain.next_expiration(*last)) {
            debug!("No volume in nearest expirations for {}, adding {}", symbol, next.format("%Y-%m-%d"));
            let extra = [next];
            for contract in chain.contracts_for(&extra) {
                acc.add(contract, spot, rate, now, config);
            }
            expirations.push(next);
        }
    }

    let gex = if acc.gex.is_finite() {
        Decimal::from_f64(acc.gex).map(|g| g.round_dp(2))
    } else {
        None
    };

    let iv_call_25d = acc.call_wing.map(|w| w.iv);
    let iv_put_25d = acc.put_wing.map(|w| w.iv);
    let total_volume = acc.volume();

    let metrics = ChainMetrics {
        symbol: chain.underlying.clone(),
        as_of: now,
        underlying_price: quote.spot_price,
        total_call_volume: acc.call_volume,
        total_put_volume: acc.put_volume,
        total_call_oi: acc.call_oi,
        total_put_oi: acc.put_oi,
        put_call_volume_ratio: ratio(acc.put_volume, acc.call_volume),
        put_call_oi_ratio: ratio(acc.put_oi, acc.call_oi),
        gex,
        gex_label: classify_gex(gex, config),
        iv_call_25d,
        iv_put_25d,
        call_skew: classify_skew(iv_call_25d, iv_put_25d, config),
        atm_volume_share: ratio(acc.atm_volume, total_volume),
        otm_volume_share: ratio(acc.otm_volume, total_volume),
        expirations_used: expirations,
    };

    debug!(
        "Chain metrics for {}: P/C vol {:?}, GEX {:?} ({}), {} expirations",
        symbol,
        metrics.put_call_volume_ratio,
        metrics.gex,
        metrics.gex_label,
        metrics.expirations_used.len()
    );

    Ok(metrics)
}

/// Aggregate several chains in parallel. Results keep the input order.
pub fn compute_many(
    chains: &[OptionChain],
    now: DateTime<Utc>,
    config: &SentimentConfig,
) -> Vec<Result<ChainMetrics, AnalyticsError>> {
    chains
        .par_iter()
        .map(|chain| compute_chain_metrics(chain, now, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{build_synthetic_chain, SyntheticChainParams};
    use crate::contract::UnderlyingQuote;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()
    }

    fn contract(side: OptionSide, strike: Decimal, days: i64, volume: u64, oi: u64, iv: f64) -> OptionContract {
        OptionContract::new(
            Symbol::etf("SPY"),
            side,
            strike,
            now() + Duration::days(days),
            dec!(1.00),
            dec!(1.10),
            oi,
            volume,
            iv,
        )
    }

    fn chain_with(contracts: Vec<OptionContract>) -> OptionChain {
        let quote = UnderlyingQuote::new(Symbol::etf("SPY"), dec!(100), 0.03, now());
        OptionChain {
            underlying: Symbol::etf("SPY"),
            quote: Some(quote),
            contracts,
            fetched_at: now(),
        }
    }

    #[test]
    fn test_put_call_ratios() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 30, 500, 1000, 0.2),
            contract(OptionSide::Put, dec!(100), 30, 600, 1200, 0.2),
        ]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        assert_eq!(m.total_call_volume, 500);
        assert_eq!(m.total_put_volume, 600);
        assert_eq!(m.put_call_volume_ratio, Some(dec!(1.2)));
        assert_eq!(m.put_call_oi_ratio, Some(dec!(1.2)));
        assert_eq!(m.total_volume(), 1100);
        assert_eq!(m.sentiment(&SentimentConfig::default()), SentimentLabel::NeutralFlow);
    }

    #[test]
    fn test_zero_call_volume_gives_no_ratio() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 30, 0, 0, 0.2),
            contract(OptionSide::Put, dec!(100), 30, 600, 1200, 0.2),
        ]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        assert_eq!(m.put_call_volume_ratio, None);
        assert_eq!(m.put_call_oi_ratio, None);
        assert_eq!(m.sentiment(&SentimentConfig::default()), SentimentLabel::NeutralFlow);
    }

    #[test]
    fn test_missing_quote_is_unavailable() {
        let mut chain = chain_with(vec![contract(OptionSide::Call, dec!(100), 30, 10, 10, 0.2)]);
        chain.quote = None;
        let err = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingData { .. }));
    }

    #[test]
    fn test_non_positive_spot_is_unavailable() {
        let mut chain = chain_with(vec![contract(OptionSide::Call, dec!(100), 30, 10, 10, 0.2)]);
        if let Some(q) = chain.quote.as_mut() {
            q.spot_price = Decimal::ZERO;
        }
        assert!(compute_chain_metrics(&chain, now(), &SentimentConfig::default()).is_err());
    }

    #[test]
    fn test_empty_chain_is_unavailable() {
        let chain = chain_with(Vec::new());
        let err = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap_err();
        assert_eq!(err, AnalyticsError::missing("SPY", "option chain has no contracts"));
    }

    #[test]
    fn test_gex_sign_follows_side() {
        let cfg = SentimentConfig::default();
        let calls = chain_with(vec![contract(OptionSide::Call, dec!(100), 30, 100, 5000, 0.2)]);
        let puts = chain_with(vec![contract(OptionSide::Put, dec!(100), 30, 100, 5000, 0.2)]);
        let call_gex = compute_chain_metrics(&calls, now(), &cfg).unwrap().gex.unwrap();
        let put_gex = compute_chain_metrics(&puts, now(), &cfg).unwrap().gex.unwrap();
        assert!(call_gex > Decimal::ZERO);
        assert!(put_gex < Decimal::ZERO);
        assert_eq!(call_gex, -put_gex);
    }

    #[test]
    fn test_gex_magnitude() {
        // gamma(100, 100, 0.03, 0.2, 30/365) ~= 0.0692
        // 0.0692 * 5000 OI * 100 * 100^2 * 0.01 ~= 3.46M
        let chain = chain_with(vec![contract(OptionSide::Call, dec!(100), 30, 100, 5000, 0.2)]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        let gex = m.gex.unwrap();
        assert!(gex > dec!(3300000) && gex < dec!(3600000), "gex = {gex}");
        assert_eq!(m.gex_label, GexLabel::Low);
    }

    #[test]
    fn test_moneyness_shares() {
        let chain = chain_with(vec![
            // ATM on both sides
            contract(OptionSide::Call, dec!(100), 30, 300, 0, 0.2),
            contract(OptionSide::Put, dec!(100), 30, 200, 0, 0.2),
            // OTM wings
            contract(OptionSide::Call, dec!(110), 30, 250, 0, 0.2),
            contract(OptionSide::Put, dec!(90), 30, 150, 0, 0.2),
            // Deep ITM call counts only in the denominator
            contract(OptionSide::Call, dec!(80), 30, 100, 0, 0.2),
        ]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        assert_eq!(m.total_volume(), 1000);
        assert_eq!(m.atm_volume_share, Some(dec!(0.5)));
        assert_eq!(m.otm_volume_share, Some(dec!(0.4)));
    }

    #[test]
    fn test_invalid_iv_counts_in_totals_only() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 30, 400, 100, 0.2),
            contract(OptionSide::Call, dec!(100), 30, 600, 100, f64::NAN),
            contract(OptionSide::Put, dec!(100), 30, 0, 100, -0.5),
        ]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        assert_eq!(m.total_call_volume, 1000);
        assert_eq!(m.total_put_oi, 100);
        assert_eq!(m.atm_volume_share, Some(dec!(0.4)));
        assert_eq!(m.iv_put_25d, None);
        assert_eq!(m.call_skew, CallSkew::Neutral);
        // Only the valid call contributes gamma.
        assert!(m.gex.unwrap() > Decimal::ZERO);
    }

    #[test]
    fn test_zero_volume_shares_are_none() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 30, 0, 10, 0.2),
            contract(OptionSide::Put, dec!(100), 30, 0, 10, 0.2),
        ]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        assert_eq!(m.atm_volume_share, None);
        assert_eq!(m.otm_volume_share, None);
        assert_eq!(m.put_call_volume_ratio, None);
        assert_eq!(m.put_call_oi_ratio, Some(dec!(1)));
    }

    #[test]
    fn test_skew_picks_quarter_delta_wings() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 30, 10, 10, 0.2),
            contract(OptionSide::Call, dec!(104), 30, 10, 10, 0.2),
            contract(OptionSide::Call, dec!(110), 30, 10, 10, 0.2),
            contract(OptionSide::Put, dec!(100), 30, 10, 10, 0.3),
            contract(OptionSide::Put, dec!(96), 30, 10, 10, 0.3),
            contract(OptionSide::Put, dec!(90), 30, 10, 10, 0.3),
        ]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        assert_eq!(m.iv_call_25d, Some(0.2));
        assert_eq!(m.iv_put_25d, Some(0.3));
        assert_eq!(m.call_skew, CallSkew::PutSkew);
    }

    #[test]
    fn test_selects_nearest_expirations() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 7, 10, 10, 0.2),
            contract(OptionSide::Call, dec!(100), 14, 20, 10, 0.2),
            contract(OptionSide::Call, dec!(100), 21, 30, 10, 0.2),
            contract(OptionSide::Call, dec!(100), 60, 1000, 10, 0.2),
        ]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        assert_eq!(m.total_call_volume, 60);
        assert_eq!(m.expirations_used.len(), 3);
    }

    #[test]
    fn test_zero_volume_adds_next_expiration_once() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 7, 0, 10, 0.2),
            contract(OptionSide::Put, dec!(100), 14, 0, 10, 0.2),
            contract(OptionSide::Call, dec!(100), 21, 0, 10, 0.2),
            contract(OptionSide::Put, dec!(100), 45, 0, 10, 0.2),
            contract(OptionSide::Put, dec!(100), 60, 900, 10, 0.2),
        ]);
        let m = compute_chain_metrics(&chain, now(), &SentimentConfig::default()).unwrap();
        assert_eq!(m.expirations_used.len(), 4);
        assert_eq!(m.expirations_used[3], now() + Duration::days(45));
        assert_eq!(m.total_volume(), 0);
        assert_eq!(m.total_put_oi, 20);
    }

    #[test]
    fn test_fallback_expiration_supplies_volume() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 7, 0, 10, 0.2),
            contract(OptionSide::Call, dec!(100), 30, 400, 10, 0.2),
            contract(OptionSide::Put, dec!(100), 30, 200, 10, 0.2),
        ]);
        let cfg = SentimentConfig {
            max_expirations: 1,
            ..Default::default()
        };
        let m = compute_chain_metrics(&chain, now(), &cfg).unwrap();
        assert_eq!(m.expirations_used.len(), 2);
        assert_eq!(m.put_call_volume_ratio, Some(dec!(0.5)));
    }

    #[test]
    fn test_expired_chain_still_finite() {
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 1, 50, 10, 0.2),
            contract(OptionSide::Put, dec!(100), 1, 50, 10, 0.2),
        ]);
        let later = now() + Duration::days(5);
        let m = compute_chain_metrics(&chain, later, &SentimentConfig::default()).unwrap();
        assert_eq!(m.total_volume(), 100);
        assert!(m.gex.is_some());
        assert_ne!(m.gex_label, GexLabel::Unknown);
    }

    #[test]
    fn test_inverted_iv_bounds_do_not_panic() {
        let cfg = SentimentConfig {
            iv_floor: 0.5,
            iv_cap: 0.1,
            ..Default::default()
        };
        let chain = chain_with(vec![
            contract(OptionSide::Call, dec!(100), 30, 500, 1000, 0.3),
            contract(OptionSide::Put, dec!(95), 30, 400, 800, 0.3),
        ]);
        let m = compute_chain_metrics(&chain, now(), &cfg).unwrap();
        assert_eq!(m.total_volume(), 900);
        assert!(m.gex.is_some());
    }

    #[test]
    fn test_low_put_call_with_positive_gamma_is_fomo() {
        let params = SyntheticChainParams {
            put_volume_bias: 0.4,
            ..Default::default()
        };
        let chain = build_synthetic_chain(Symbol::etf("SPY"), &params, now());
        let cfg = SentimentConfig::default();
        let m = compute_chain_metrics(&chain, now(), &cfg).unwrap();
        assert!(m.put_call_volume_ratio.unwrap() < dec!(0.8));
        assert!(m.gex.unwrap() > Decimal::ZERO);
        assert_eq!(m.sentiment(&cfg), SentimentLabel::FomoBuying);
    }

    #[test]
    fn test_compute_many_keeps_order() {
        let ok = build_synthetic_chain(Symbol::etf("QQQ"), &SyntheticChainParams::default(), now());
        let mut missing = chain_with(Vec::new());
        missing.underlying = Symbol::equity("XYZ");
        let results = compute_many(&[ok, missing], now(), &SentimentConfig::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().symbol.symbol, "QQQ");
        assert!(results[1].is_err());
    }
}
