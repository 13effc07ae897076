//! Option chain: every contract fetched for one underlying, plus its spot quote.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use ep_types::market::Symbol;

use crate::contract::{OptionContract, OptionSide, UnderlyingQuote};
use crate::pricing::{d1, d2, normal_cdf};

/// A normalized option chain for a single underlying across expirations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub underlying: Symbol,
    /// `None` when the provider returned no usable spot price.
    pub quote: Option<UnderlyingQuote>,
    pub contracts: Vec<OptionContract>,
    pub fetched_at: DateTime<Utc>,
}

impl OptionChain {
    pub fn new(underlying: Symbol, quote: Option<UnderlyingQuote>, contracts: Vec<OptionContract>) -> Self {
        Self {
            underlying,
            quote,
            contracts,
            fetched_at: Utc::now(),
        }
    }

    /// Distinct expirations, ascending.
    pub fn expirations(&self) -> Vec<DateTime<Utc>> {
        self.contracts
            .iter()
            .map(|c| c.expiration)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The nearest `n` expirations that have not expired at `now`.
    ///
    /// Falls back to the earliest `n` listed when every expiration is in the
    /// past, so a stale snapshot still yields something to aggregate.
    pub fn select_expirations(&self, now: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        let all = self.expirations();
        let n = n.max(1);
        let live: Vec<_> = all.iter().copied().filter(|e| *e > now).take(n).collect();
        if live.is_empty() {
            all.into_iter().take(n).collect()
        } else {
            live
        }
    }

    /// The first listed expiration strictly after `after`, if any.
    pub fn next_expiration(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expirations().into_iter().find(|e| *e > after)
    }

    /// Contracts whose expiration is in `expirations`.
    pub fn contracts_for<'a>(&'a self, expirations: &'a [DateTime<Utc>]) -> impl Iterator<Item = &'a OptionContract> + 'a {
        self.contracts
            .iter()
            .filter(move |c| expirations.contains(&c.expiration))
    }

    /// Merge another fetch of the same underlying (e.g. a dated expiration page).
    /// Contracts already present for an expiration are not duplicated.
    pub fn merge(&mut self, other: OptionChain) {
        let known: BTreeSet<_> = self.contracts.iter().map(|c| c.expiration).collect();
        self.contracts
            .extend(other.contracts.into_iter().filter(|c| !known.contains(&c.expiration)));
        if self.quote.is_none() {
            self.quote = other.quote;
        }
    }

    /// Number of contracts in the chain.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// True if the chain holds no contracts.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Parameters for a deterministic synthetic chain (demo and offline testing).
#[derive(Debug, Clone)]
pub struct SyntheticChainParams {
    pub spot: f64,
    pub risk_free_rate: f64,
    /// At-the-money implied volatility.
    pub base_vol: f64,
    /// IV change per unit of log-moneyness; positive makes puts richer.
    pub skew_slope: f64,
    /// Calendar days to each generated expiration.
    pub expiry_days: Vec<i64>,
    /// Total number of strikes (centered around ATM).
    pub num_strikes: usize,
    /// Spacing between consecutive strikes.
    pub strike_step: f64,
    /// Peak volume at the money; wings decay from there.
    pub peak_volume: u64,
    /// Put volume relative to call volume (1.0 = balanced).
    pub put_volume_bias: f64,
    pub seed: u64,
}

impl Default for SyntheticChainParams {
    fn default() -> Self {
        Self {
            spot: 100.0,
            risk_free_rate: 0.03,
            base_vol: 0.22,
            skew_slope: 0.35,
            expiry_days: vec![7, 14, 30],
            num_strikes: 21,
            strike_step: 1.0,
            peak_volume: 5_000,
            put_volume_bias: 1.0,
            seed: 12345,
        }
    }
}

/// Build a chain with strikes spaced evenly around the spot price.
///
/// Prices come from Black-Scholes on a skewed smile; volume and open interest
/// follow a bell around the money perturbed by a fixed-seed LCG, so the
/// same parameters always produce the same chain.
pub fn build_synthetic_chain(underlying: Symbol, params: &SyntheticChainParams, now: DateTime<Utc>) -> OptionChain {
    let half = params.num_strikes / 2;
    let atm_strike = (params.spot / params.strike_step).round() * params.strike_step;
    let mut rng_state = params.seed;
    let mut next_noise = move || {
        rng_state = rng_state.wrapping_mul(1103515245).wrapping_add(12345);
        ((rng_state >> 16) & 0xffff) as f64 / 65536.0 // 0.0 .. 1.0
    };

    let mut contracts = Vec::with_capacity(params.num_strikes * params.expiry_days.len() * 2);

    for &days in &params.expiry_days {
        let expiration = now + Duration::days(days);
        let t = days.max(0) as f64 / 365.0;

        for i in 0..params.num_strikes {
            let offset = i as f64 - half as f64;
            let strike_f = atm_strike + offset * params.strike_step;
            if strike_f <= 0.0 {
                continue;
            }
            let strike = Decimal::from_f64(strike_f).unwrap_or_default().round_dp(2);
            let log_moneyness = (strike_f / params.spot).ln();
            let iv = (params.base_vol - params.skew_slope * log_moneyness + 0.8 * log_moneyness * log_moneyness)
                .max(0.05);

            // Liquidity concentrates at the money and in nearer expirations.
            let distance = offset / half.max(1) as f64;
            let bell = (-4.0 * distance * distance).exp();
            let term_decay = 1.0 / (1.0 + t * 12.0);

            for side in [OptionSide::Call, OptionSide::Put] {
                let bias = match side {
                    OptionSide::Call => 1.0,
                    OptionSide::Put => params.put_volume_bias,
                };
                let volume = (params.peak_volume as f64 * bell * term_decay * bias * (0.75 + 0.5 * next_noise())) as u64;
                let open_interest = (volume as f64 * (3.0 + 4.0 * next_noise())) as u64;

                let price = theoretical_price(side, params.spot, strike_f, params.risk_free_rate, iv, t);
                let half_spread = (price * 0.02).max(0.01);
                let bid = Decimal::from_f64((price - half_spread).max(0.0)).unwrap_or_default().round_dp(2);
                let ask = Decimal::from_f64(price + half_spread).unwrap_or_default().round_dp(2);

                contracts.push(OptionContract::new(
                    underlying.clone(),
                    side,
                    strike,
                    expiration,
                    bid,
                    ask,
                    open_interest,
                    volume,
                    iv,
                ));
            }
        }
    }

    let spot = Decimal::from_f64(params.spot).unwrap_or_default();
    let quote = UnderlyingQuote::new(underlying.clone(), spot, params.risk_free_rate, now);
    OptionChain {
        underlying,
        quote: Some(quote),
        contracts,
        fetched_at: now,
    }
}

fn theoretical_price(side: OptionSide, s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let disc = (-r * t).exp();
    let call = s * normal_cdf(d1(s, k, r, sigma, t)) - k * disc * normal_cdf(d2(s, k, r, sigma, t));
    match side {
        OptionSide::Call => call.max(0.0),
        // Put via put-call parity.
        OptionSide::Put => (call - s + k * disc).max(0.0),
    }
}
