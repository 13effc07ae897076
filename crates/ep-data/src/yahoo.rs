//! Yahoo Finance v7 options endpoint.
//!
//! The undated request returns the list of expirations plus contracts for the
//! front expiration only; later expirations are fetched with `?date=`.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

use ep_options::chain::OptionChain;
use ep_options::contract::{OptionContract, OptionSide, UnderlyingQuote};
use ep_types::{AssetClass, DataError, EpError, EpResult, Symbol};

use crate::providers::OptionChainProvider;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; EconopulseBot/1.0)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsEnvelope {
    option_chain: OptionChainBody,
}

#[derive(Debug, Deserialize)]
struct OptionChainBody {
    #[serde(default)]
    result: Vec<ChainResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainResult {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    quote: Option<WireQuote>,
    #[serde(default)]
    options: Vec<ExpirationBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQuote {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpirationBlock {
    expiration_date: i64,
    #[serde(default)]
    calls: Vec<WireOption>,
    #[serde(default)]
    puts: Vec<WireOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOption {
    strike: Option<f64>,
    volume: Option<f64>,
    open_interest: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    contract_size: Option<String>,
    implied_volatility: Option<f64>,
}

impl WireOption {
    fn into_contract(self, symbol: &Symbol, side: OptionSide, expiration: DateTime<Utc>) -> Option<OptionContract> {
        let strike = self.strike.filter(|k| k.is_finite() && *k > 0.0)?;
        let multiplier = match self.contract_size.as_deref() {
            Some("MINI") => Decimal::from(10),
            _ => Decimal::from(100),
        };
        Some(
            OptionContract::new(
                symbol.clone(),
                side,
                Decimal::from_f64(strike)?,
                expiration,
                price_field(self.bid),
                price_field(self.ask),
                count_field(self.open_interest),
                count_field(self.volume),
                self.implied_volatility.unwrap_or(f64::NAN),
            )
            .with_multiplier(multiplier),
        )
    }
}

fn price_field(v: Option<f64>) -> Decimal {
    v.filter(|p| p.is_finite() && *p > 0.0)
        .and_then(Decimal::from_f64)
        .map(|d| d.round_dp(4))
        .unwrap_or_default()
}

fn count_field(v: Option<f64>) -> u64 {
    v.filter(|n| n.is_finite() && *n > 0.0).map(|n| n as u64).unwrap_or(0)
}

fn epoch(secs: i64) -> EpResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
        DataError::ParseError {
            message: format!("Invalid expiration timestamp {}", secs),
        }
        .into()
    })
}

/// One parsed response page.
#[derive(Debug)]
pub struct OptionsPage {
    pub expirations: Vec<DateTime<Utc>>,
    pub chain: OptionChain,
}

/// Parse a raw `/v7/finance/options` body into a normalized chain page.
///
/// Missing volume and open interest read as 0; missing IV reads as NaN and
/// is ignored downstream. The quote is dropped unless the price is positive.
pub fn parse_options_response(
    body: &str,
    symbol: &Symbol,
    risk_free_rate: f64,
    now: DateTime<Utc>,
) -> EpResult<OptionsPage> {
    let envelope: OptionsEnvelope = serde_json::from_str(body).map_err(|e| DataError::ParseError {
        message: format!("Failed to parse options response: {}", e),
    })?;
    let result = envelope
        .option_chain
        .result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.symbol.clone(),
        })?;

    let quote = result
        .quote
        .and_then(|q| q.regular_market_price)
        .filter(|p| p.is_finite() && *p > 0.0)
        .and_then(Decimal::from_f64)
        .map(|spot| UnderlyingQuote::new(symbol.clone(), spot, risk_free_rate, now));

    let expirations = result
        .expiration_dates
        .iter()
        .map(|&ts| epoch(ts))
        .collect::<EpResult<Vec<_>>>()?;

    let mut contracts = Vec::new();
    for block in result.options {
        let expiration = epoch(block.expiration_date)?;
        contracts.extend(
            block
                .calls
                .into_iter()
                .filter_map(|o| o.into_contract(symbol, OptionSide::Call, expiration)),
        );
        contracts.extend(
            block
                .puts
                .into_iter()
                .filter_map(|o| o.into_contract(symbol, OptionSide::Put, expiration)),
        );
    }

    let mut chain = OptionChain::new(symbol.clone(), quote, contracts);
    chain.fetched_at = now;
    Ok(OptionsPage { expirations, chain })
}

/// Option chains from Yahoo Finance.
#[derive(Debug)]
pub struct YahooOptionsProvider {
    pub name: String,
    pub base_url: String,
    pub client: reqwest::Client,
    pub risk_free_rate: f64,
    pub max_expirations: usize,
    /// Total requests per page, the first try included (0 behaves as 1).
    pub retry_attempts: usize,
    pub retry_backoff: Duration,
}

impl YahooOptionsProvider {
    pub fn new(timeout: Duration) -> EpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Http {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            name: "Yahoo Finance Options".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
            risk_free_rate: 0.03,
            max_expirations: 3,
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(300),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_max_expirations(mut self, n: usize) -> Self {
        self.max_expirations = n.max(1);
        self
    }

    pub fn with_retry(mut self, attempts: usize, backoff: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_backoff = backoff;
        self
    }

    fn url(&self, symbol: &Symbol, date: Option<i64>) -> String {
        let ticker = symbol.symbol.replace('^', "%5E");
        let base = format!("{}/v7/finance/options/{}", self.base_url, ticker);
        match date {
            Some(ts) => format!("{}?date={}", base, ts),
            None => base,
        }
    }

    async fn get_once(&self, url: &str, symbol: &Symbol) -> EpResult<String> {
        let response = self.client.get(url).send().await.map_err(|e| DataError::Http {
            message: format!("Request to {} failed: {}", url, e),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.symbol.clone(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(DataError::Http {
                message: format!("HTTP error: {}", status),
            }
            .into());
        }

        response.text().await.map_err(|e| {
            DataError::Http {
                message: format!("Failed to read body: {}", e),
            }
            .into()
        })
    }

    /// GET with a fixed-interval retry on transport and status failures.
    async fn fetch_page(&self, symbol: &Symbol, date: Option<i64>) -> EpResult<OptionsPage> {
        let url = self.url(symbol, date);
        let url = url.as_str();
        let strategy = FixedInterval::new(self.retry_backoff).take(self.retry_attempts.saturating_sub(1));
        let body = RetryIf::spawn(
            strategy,
            move || self.get_once(url, symbol),
            |e: &EpError| matches!(e, EpError::Data(DataError::Http { .. })),
        )
        .await?;

        parse_options_response(&body, symbol, self.risk_free_rate, Utc::now())
    }
}

#[async_trait]
impl OptionChainProvider for YahooOptionsProvider {
    fn supports_symbol(&self, symbol: &Symbol) -> bool {
        // Index chains are only listed under the caret ticker (^SPX, ^NDX).
        !matches!(symbol.asset_class, AssetClass::Index) || symbol.symbol.starts_with('^')
    }

    async fn fetch_chain(&self, symbol: &Symbol) -> EpResult<OptionChain> {
        tracing::info!("Fetching option chain from Yahoo for {}", symbol);

        let first = self.fetch_page(symbol, None).await?;
        let mut chain = first.chain;
        let now = Utc::now();

        // Later expirations, plus one spare for the zero-volume fallback.
        let wanted: Vec<_> = first
            .expirations
            .iter()
            .filter(|e| **e > now)
            .take(self.max_expirations + 1)
            .copied()
            .collect();
        let have = chain.expirations();

        for expiration in wanted.into_iter().filter(|e| !have.contains(e)) {
            match self.fetch_page(symbol, Some(expiration.timestamp())).await {
                Ok(page) => chain.merge(page.chain),
                Err(e) => tracing::warn!(
                    "Skipping {} expiration {} for {}: {}",
                    self.name,
                    expiration.format("%Y-%m-%d"),
                    symbol,
                    e
                ),
            }
        }

        if chain.is_empty() {
            return Err(DataError::EmptyChain {
                symbol: symbol.symbol.clone(),
            }
            .into());
        }

        tracing::info!(
            "Retrieved {} contracts across {} expirations for {}",
            chain.len(),
            chain.expirations().len(),
            symbol
        );
        Ok(chain)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "yahoo",
            "base_url": self.base_url,
            "max_expirations": self.max_expirations,
            "retry_attempts": self.retry_attempts,
        })
    }
}
