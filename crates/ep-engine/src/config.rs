use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use ep_options::config::SentimentConfig;
use ep_types::{config_error, EpResult};

pub const CONFIG_PATH_VAR: &str = "ECONOPULSE_CONFIG";

/// Longest metrics cache TTL accepted: one week.
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Which option-chain source the engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Yahoo,
    Sample,
}

impl FromStr for ProviderKind {
    type Err = ep_types::EpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(ProviderKind::Yahoo),
            "sample" => Ok(ProviderKind::Sample),
            other => Err(config_error!("unknown provider '{}', expected yahoo or sample", other)),
        }
    }
}

/// Service-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sentiment: SentimentConfig,
    pub provider: ProviderKind,
    pub cache_ttl_secs: u64,
    /// Upper bound on concurrent chain fetches.
    pub max_concurrent: usize,
    pub http_timeout_secs: u64,
    /// Total upstream requests per page, the first try included.
    pub retry_attempts: usize,
    pub retry_backoff_ms: u64,
    pub listen_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sentiment: SentimentConfig::default(),
            provider: ProviderKind::Yahoo,
            cache_ttl_secs: 120,
            max_concurrent: 4,
            http_timeout_secs: 9,
            retry_attempts: 2,
            retry_backoff_ms: 300,
            listen_addr: "0.0.0.0:8081".to_string(),
        }
    }
}

impl EngineConfig {
    /// File named by `ECONOPULSE_CONFIG` (if any), then environment overrides.
    pub fn load() -> EpResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> EpResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> EpResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ECONOPULSE_PROVIDER") {
            self.provider = v.parse()?;
        }
        if let Some(v) = lookup("ECONOPULSE_ADDR") {
            self.listen_addr = v.trim().to_string();
        }
        if let Some(v) = lookup("OPTIONS_RF_RATE") {
            self.sentiment.risk_free_rate = v
                .trim()
                .parse()
                .map_err(|_| config_error!("OPTIONS_RF_RATE is not a number: '{}'", v))?;
        }
        if let Some(v) = lookup("ECONOPULSE_MAX_CONCURRENT") {
            let n: usize = v
                .trim()
                .parse()
                .map_err(|_| config_error!("ECONOPULSE_MAX_CONCURRENT is not an integer: '{}'", v))?;
            self.max_concurrent = n.clamp(1, 32);
        }
        if let Some(v) = lookup("ECONOPULSE_CACHE_TTL_SECS") {
            self.cache_ttl_secs = v
                .trim()
                .parse()
                .map_err(|_| config_error!("ECONOPULSE_CACHE_TTL_SECS is not an integer: '{}'", v))?;
        }
        Ok(())
    }

    /// Metrics cache TTL as a chrono duration.
    pub fn cache_ttl(&self) -> EpResult<chrono::Duration> {
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(config_error!(
                "cache_ttl_secs {} exceeds the maximum of {}",
                self.cache_ttl_secs,
                MAX_CACHE_TTL_SECS
            ));
        }
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| config_error!("cache_ttl_secs {} is out of range", self.cache_ttl_secs))
    }

    pub fn validate(&self) -> EpResult<()> {
        self.sentiment.validate()?;
        self.cache_ttl()?;
        if self.max_concurrent == 0 {
            return Err(config_error!("max_concurrent must be at least 1"));
        }
        if self.http_timeout_secs == 0 {
            return Err(config_error!("http_timeout_secs must be at least 1"));
        }
        if self.listen_addr.is_empty() {
            return Err(config_error!("listen_addr is empty"));
        }
        Ok(())
    }
}
