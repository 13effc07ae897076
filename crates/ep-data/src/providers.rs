use async_trait::async_trait;
use chrono::Utc;

use ep_options::chain::{build_synthetic_chain, OptionChain, SyntheticChainParams};
use ep_types::{DataError, EpResult, Symbol};

/// Source of option chains (HTTP APIs, fixtures, synthetic data).
#[async_trait]
pub trait OptionChainProvider: Send + Sync + std::fmt::Debug {
    /// Check if this provider can serve the given underlying
    fn supports_symbol(&self, symbol: &Symbol) -> bool;

    /// Fetch the chain and the underlying quote for `symbol`
    async fn fetch_chain(&self, symbol: &Symbol) -> EpResult<OptionChain>;

    /// Get provider name
    fn name(&self) -> &str;

    /// Get provider configuration
    fn config(&self) -> serde_json::Value;
}

/// Synthetic chains for offline runs and tests.
#[derive(Debug)]
pub struct SampleChainProvider {
    pub name: String,
    pub risk_free_rate: f64,
    pub expiry_days: Vec<i64>,
}

impl SampleChainProvider {
    pub fn new() -> Self {
        Self {
            name: "Sample Chain Provider".to_string(),
            risk_free_rate: 0.03,
            expiry_days: vec![7, 14, 30, 60],
        }
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// Per-symbol shape: spot, strike spacing, ATM vol, put bias.
    fn profile(symbol: &str) -> Option<(f64, f64, f64, f64)> {
        match symbol {
            "SPY" => Some((510.0, 5.0, 0.14, 1.15)),
            "QQQ" => Some((440.0, 5.0, 0.18, 0.95)),
            "IWM" => Some((205.0, 1.0, 0.21, 1.45)),
            "AAPL" => Some((190.0, 2.5, 0.24, 0.6)),
            "MSFT" => Some((420.0, 5.0, 0.22, 0.75)),
            "TSLA" => Some((250.0, 5.0, 0.55, 0.7)),
            "NVDA" => Some((880.0, 10.0, 0.48, 0.55)),
            _ => None,
        }
    }

    fn seed_for(symbol: &str) -> u64 {
        symbol
            .bytes()
            .fold(12345u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
    }
}

impl Default for SampleChainProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OptionChainProvider for SampleChainProvider {
    fn supports_symbol(&self, symbol: &Symbol) -> bool {
        Self::profile(&symbol.symbol).is_some()
    }

    async fn fetch_chain(&self, symbol: &Symbol) -> EpResult<OptionChain> {
        let (spot, strike_step, base_vol, put_volume_bias) =
            Self::profile(&symbol.symbol).ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.symbol.clone(),
            })?;

        let params = SyntheticChainParams {
            spot,
            risk_free_rate: self.risk_free_rate,
            base_vol,
            expiry_days: self.expiry_days.clone(),
            strike_step,
            put_volume_bias,
            seed: Self::seed_for(&symbol.symbol),
            ..Default::default()
        };

        let chain = build_synthetic_chain(symbol.clone(), &params, Utc::now());
        tracing::debug!("Generated {} sample contracts for {}", chain.len(), symbol);
        Ok(chain)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "sample",
            "supported_symbols": ["SPY", "QQQ", "IWM", "AAPL", "MSFT", "TSLA", "NVDA"],
            "expiry_days": self.expiry_days,
        })
    }
}
