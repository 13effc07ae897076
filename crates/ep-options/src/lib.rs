//! Option-chain analytics for EconoPulse: Black-Scholes greeks, chain
//! aggregation and flow sentiment labels.

pub mod chain;
pub mod config;
pub mod contract;
pub mod greeks;
pub mod metrics;
pub mod pricing;
pub mod report;
pub mod sentiment;

pub use chain::*;
pub use config::*;
pub use contract::*;
pub use greeks::*;
pub use metrics::*;
pub use pricing::*;
pub use report::*;
pub use sentiment::*;
