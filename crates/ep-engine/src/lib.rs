// EconoPulse options sentiment engine
// Fetch -> aggregate -> classify, with a TTL cache in front of the providers.

pub mod config;
pub mod logging;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use ep_data::{CachedMetrics, MetricsCache, OptionChainProvider, SampleChainProvider, YahooOptionsProvider};
use ep_options::metrics::{compute_chain_metrics, ChainMetrics};
use ep_options::report::OptionsReport;
use ep_types::{DataError, EpError, EpResult, Symbol};

pub use config::{EngineConfig, ProviderKind};

/// Options sentiment engine shared by the HTTP service and batch callers
#[derive(Debug)]
pub struct SentimentEngine {
    config: EngineConfig,
    providers: Vec<Arc<dyn OptionChainProvider>>,
    cache: MetricsCache,
}

impl SentimentEngine {
    pub fn new(config: EngineConfig, providers: Vec<Arc<dyn OptionChainProvider>>) -> EpResult<Self> {
        let ttl = config.cache_ttl()?;
        Ok(Self {
            config,
            providers,
            cache: MetricsCache::with_ttl(ttl),
        })
    }

    /// Build the engine with the provider named in the configuration.
    pub fn from_config(config: EngineConfig) -> EpResult<Self> {
        info!("Initializing options sentiment engine ({:?} provider)", config.provider);

        let provider: Arc<dyn OptionChainProvider> = match config.provider {
            ProviderKind::Yahoo => Arc::new(
                YahooOptionsProvider::new(Duration::from_secs(config.http_timeout_secs))?
                    .with_risk_free_rate(config.sentiment.risk_free_rate)
                    .with_max_expirations(config.sentiment.max_expirations)
                    .with_retry(config.retry_attempts, Duration::from_millis(config.retry_backoff_ms)),
            ),
            ProviderKind::Sample => {
                Arc::new(SampleChainProvider::new().with_risk_free_rate(config.sentiment.risk_free_rate))
            }
        };

        Self::new(config, vec![provider])
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &MetricsCache {
        &self.cache
    }

    fn provider_for(&self, symbol: &Symbol) -> Option<&Arc<dyn OptionChainProvider>> {
        self.providers.iter().find(|p| p.supports_symbol(symbol))
    }

    /// Metrics for one symbol. Unavailable outcomes are cached like successes;
    /// transport failures are not.
    pub async fn metrics(&self, symbol: &Symbol) -> EpResult<ChainMetrics> {
        let depth = self.config.sentiment.max_expirations;
        if let Some(cached) = self.cache.get(&symbol.symbol, depth) {
            return cached.map_err(EpError::from);
        }

        let provider = self.provider_for(symbol).ok_or_else(|| DataError::ProviderUnavailable {
            symbol: symbol.symbol.clone(),
        })?;

        let outcome: CachedMetrics = match provider.fetch_chain(symbol).await {
            Ok(chain) => compute_chain_metrics(&chain, Utc::now(), &self.config.sentiment),
            Err(e) if e.is_unavailable() => Err(ep_types::AnalyticsError::missing(&symbol.symbol, &e.to_string())),
            Err(e) => return Err(e),
        };

        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!("Purged {} stale metrics cache entries", purged);
        }
        self.cache.store(&symbol.symbol, depth, outcome.clone());
        outcome.map_err(EpError::from)
    }

    /// Report for one symbol; any failure degrades to an unavailable row.
    pub async fn report(&self, symbol: &Symbol) -> OptionsReport {
        match self.metrics(symbol).await {
            Ok(metrics) => OptionsReport::from_metrics(&metrics, &self.config.sentiment),
            Err(e) => {
                warn!("Options metrics unavailable for {}: {}", symbol, e);
                OptionsReport::unavailable(&symbol.symbol)
            }
        }
    }

    /// Reports for many symbols, at most `max_concurrent` fetches in flight.
    /// Output order matches input order.
    pub async fn reports(self: &Arc<Self>, symbols: &[Symbol]) -> Vec<OptionsReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let engine = Arc::clone(self);
            let sem = Arc::clone(&semaphore);
            let symbol = symbol.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                engine.report(&symbol).await
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (handle, symbol) in handles.into_iter().zip(symbols) {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("Report task for {} failed: {}", symbol, e);
                    reports.push(OptionsReport::unavailable(&symbol.symbol));
                }
            }
        }
        reports
    }
}
