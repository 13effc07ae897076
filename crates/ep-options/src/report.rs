//! JSON view of [`ChainMetrics`] served to dashboards.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::SentimentConfig;
use crate::metrics::ChainMetrics;
use crate::sentiment::{ActivityLevel, CallSkew, GexLabel, SentimentLabel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsReport {
    pub symbol: String,
    pub available: bool,
    pub as_of: DateTime<Utc>,
    /// Two-decimal string, `null` without call volume.
    pub put_call_ratio_vol: Option<String>,
    #[serde(rename = "putCallRatioOI")]
    pub put_call_ratio_oi: Option<String>,
    pub gamma_exposure: Option<f64>,
    pub gamma_label: GexLabel,
    pub call_skew: CallSkew,
    pub options_sentiment: SentimentLabel,
    pub unusual_atm: ActivityLevel,
    pub unusual_otm: ActivityLevel,
    pub unusual_combo: String,
}

fn two_dp(value: Option<Decimal>) -> Option<String> {
    value.map(|v| format!("{:.2}", v.round_dp(2)))
}

impl OptionsReport {
    pub fn from_metrics(metrics: &ChainMetrics, config: &SentimentConfig) -> Self {
        let unusual_atm = ActivityLevel::from_share(metrics.atm_volume_share, config);
        let unusual_otm = ActivityLevel::from_share(metrics.otm_volume_share, config);
        Self {
            symbol: metrics.symbol.symbol.clone(),
            available: true,
            as_of: metrics.as_of,
            put_call_ratio_vol: two_dp(metrics.put_call_volume_ratio),
            put_call_ratio_oi: two_dp(metrics.put_call_oi_ratio),
            gamma_exposure: metrics.gex.and_then(|g| g.to_f64()),
            gamma_label: metrics.gex_label,
            call_skew: metrics.call_skew,
            options_sentiment: metrics.sentiment(config),
            unusual_atm,
            unusual_otm,
            unusual_combo: format!("{} / {}", unusual_atm, unusual_otm),
        }
    }

    /// Placeholder row for a symbol with no chain or no quote.
    pub fn unavailable(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            available: false,
            as_of: Utc::now(),
            put_call_ratio_vol: None,
            put_call_ratio_oi: None,
            gamma_exposure: None,
            gamma_label: GexLabel::Unknown,
            call_skew: CallSkew::Neutral,
            options_sentiment: SentimentLabel::NeutralFlow,
            unusual_atm: ActivityLevel::Low,
            unusual_otm: ActivityLevel::Low,
            unusual_combo: format!("{} / {}", ActivityLevel::Low, ActivityLevel::Low),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ep_types::market::Symbol;
    use rust_decimal_macros::dec;

    fn metrics() -> ChainMetrics {
        ChainMetrics {
            symbol: Symbol::etf("SPY"),
            as_of: Utc::now(),
            underlying_price: dec!(512.30),
            total_call_volume: 1500,
            total_put_volume: 1000,
            total_call_oi: 9000,
            total_put_oi: 11000,
            put_call_volume_ratio: Some(dec!(0.666667)),
            put_call_oi_ratio: Some(dec!(1.222222)),
            gex: Some(dec!(125000000.50)),
            gex_label: GexLabel::High,
            iv_call_25d: Some(0.18),
            iv_put_25d: Some(0.24),
            call_skew: CallSkew::PutSkew,
            atm_volume_share: Some(dec!(0.40)),
            otm_volume_share: Some(dec!(0.25)),
            expirations_used: Vec::new(),
        }
    }

    #[test]
    fn test_from_metrics() {
        let report = OptionsReport::from_metrics(&metrics(), &SentimentConfig::default());
        assert!(report.available);
        assert_eq!(report.put_call_ratio_vol.as_deref(), Some("0.67"));
        assert_eq!(report.put_call_ratio_oi.as_deref(), Some("1.22"));
        assert_eq!(report.gamma_exposure, Some(125000000.5));
        assert_eq!(report.options_sentiment, SentimentLabel::FomoBuying);
        assert_eq!(report.unusual_atm, ActivityLevel::High);
        assert_eq!(report.unusual_otm, ActivityLevel::Medium);
        assert_eq!(report.unusual_combo, "High / Medium");
    }

    #[test]
    fn test_integer_ratio_keeps_two_decimals() {
        let mut m = metrics();
        m.put_call_volume_ratio = Some(dec!(1));
        let report = OptionsReport::from_metrics(&m, &SentimentConfig::default());
        assert_eq!(report.put_call_ratio_vol.as_deref(), Some("1.00"));
    }

    #[test]
    fn test_unavailable_shape() {
        let report = OptionsReport::unavailable("XYZ");
        assert!(!report.available);
        assert_eq!(report.gamma_label, GexLabel::Unknown);
        assert_eq!(report.options_sentiment, SentimentLabel::NeutralFlow);
        assert_eq!(report.unusual_combo, "Low / Low");
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(OptionsReport::unavailable("XYZ")).unwrap();
        assert!(json["putCallRatioVol"].is_null());
        assert!(json["putCallRatioOI"].is_null());
        assert!(json["gammaExposure"].is_null());
        assert_eq!(json["gammaLabel"], "Unknown");
        assert_eq!(json["callSkew"], "Neutral");
        assert_eq!(json["optionsSentiment"], "Neutral Flow");
        assert_eq!(json["unusualAtm"], "Low");
        assert!(json.get("asOf").is_some());
    }
}
