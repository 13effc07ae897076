//! Flow sentiment, gamma-regime and skew labels derived from chain aggregates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SentimentConfig;

/// Headline label for options flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "FOMO Buying")]
    FomoBuying,
    #[serde(rename = "Stealth Bull")]
    StealthBull,
    #[serde(rename = "Put Storm")]
    PutStorm,
    #[serde(rename = "Neutral Flow")]
    NeutralFlow,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentimentLabel::FomoBuying => "FOMO Buying",
            SentimentLabel::StealthBull => "Stealth Bull",
            SentimentLabel::PutStorm => "Put Storm",
            SentimentLabel::NeutralFlow => "Neutral Flow",
        };
        write!(f, "{}", s)
    }
}

/// Magnitude bucket for absolute gamma exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GexLabel {
    Low,
    Medium,
    High,
    Extreme,
    Unknown,
}

impl fmt::Display for GexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GexLabel::Low => "Low",
            GexLabel::Medium => "Medium",
            GexLabel::High => "High",
            GexLabel::Extreme => "Extreme",
            GexLabel::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Which wing carries the richer implied volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallSkew {
    #[serde(rename = "Call Skew")]
    CallSkew,
    #[serde(rename = "Put Skew")]
    PutSkew,
    Neutral,
}

impl fmt::Display for CallSkew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallSkew::CallSkew => "Call Skew",
            CallSkew::PutSkew => "Put Skew",
            CallSkew::Neutral => "Neutral",
        };
        write!(f, "{}", s)
    }
}

/// Unusual-activity level for a volume share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivityLevel {
    Low,
    Medium,
    High,
}

impl ActivityLevel {
    /// Bucket a volume share; a missing share reads as `Low`.
    pub fn from_share(share: Option<Decimal>, config: &SentimentConfig) -> Self {
        match share {
            Some(v) if v > config.activity_high => ActivityLevel::High,
            Some(v) if v > config.activity_medium => ActivityLevel::Medium,
            _ => ActivityLevel::Low,
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityLevel::Low => "Low",
            ActivityLevel::Medium => "Medium",
            ActivityLevel::High => "High",
        };
        write!(f, "{}", s)
    }
}

/// Classify options flow.
///
/// Check order matters: the FOMO condition is a strict subset of the
/// Stealth Bull condition and must win when both hold.
pub fn classify(
    put_call_volume_ratio: Option<Decimal>,
    total_volume: u64,
    gex: Option<Decimal>,
    config: &SentimentConfig,
) -> SentimentLabel {
    let Some(ratio) = put_call_volume_ratio else {
        return SentimentLabel::NeutralFlow;
    };

    let positive_gamma = gex.map_or(false, |g| g > Decimal::ZERO);
    if positive_gamma && ratio < config.bullish_ratio && total_volume > 0 {
        return SentimentLabel::FomoBuying;
    }
    if ratio < config.bullish_ratio {
        return SentimentLabel::StealthBull;
    }
    if ratio > config.bearish_ratio {
        return SentimentLabel::PutStorm;
    }
    SentimentLabel::NeutralFlow
}

/// Bucket signed gamma exposure by absolute magnitude.
pub fn classify_gex(gex: Option<Decimal>, config: &SentimentConfig) -> GexLabel {
    let Some(g) = gex else {
        return GexLabel::Unknown;
    };
    let magnitude = g.abs();
    if magnitude >= config.gex_extreme {
        GexLabel::Extreme
    } else if magnitude >= config.gex_high {
        GexLabel::High
    } else if magnitude >= config.gex_medium {
        GexLabel::Medium
    } else {
        GexLabel::Low
    }
}

/// Compare ~25-delta call and put implied volatility.
pub fn classify_skew(iv_call: Option<f64>, iv_put: Option<f64>, config: &SentimentConfig) -> CallSkew {
    match (iv_call, iv_put) {
        (Some(call), Some(put)) if call.is_finite() && put.is_finite() => {
            let diff = call - put;
            if diff > config.skew_epsilon {
                CallSkew::CallSkew
            } else if diff < -config.skew_epsilon {
                CallSkew::PutSkew
            } else {
                CallSkew::Neutral
            }
        }
        _ => CallSkew::Neutral,
    }
}
