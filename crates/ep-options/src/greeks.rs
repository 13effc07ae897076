use serde::{Deserialize, Serialize};

use crate::contract::OptionSide;
use crate::pricing::{call_delta, gamma, put_delta};

/// Greeks the sentiment pipeline needs for one contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Signed delta: positive for calls, negative for puts.
    pub delta: f64,
    /// Rate of change of delta w.r.t. underlying price.
    pub gamma: f64,
}

impl Greeks {
    /// Evaluate delta and gamma from the Black-Scholes primitives.
    pub fn compute(side: OptionSide, spot: f64, strike: f64, rate: f64, sigma: f64, t: f64) -> Self {
        let delta = match side {
            OptionSide::Call => call_delta(spot, strike, rate, sigma, t),
            OptionSide::Put => put_delta(spot, strike, rate, sigma, t),
        };
        Self {
            delta,
            gamma: gamma(spot, strike, rate, sigma, t),
        }
    }

    pub fn abs_delta(&self) -> f64 {
        self.delta.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_signs() {
        let call = Greeks::compute(OptionSide::Call, 100.0, 100.0, 0.03, 0.2, 0.25);
        let put = Greeks::compute(OptionSide::Put, 100.0, 100.0, 0.03, 0.2, 0.25);
        assert!(call.delta > 0.0);
        assert!(put.delta < 0.0);
        assert_eq!(call.gamma, put.gamma);
        assert!((call.delta - put.delta - 1.0).abs() < 1e-15);
    }
}
